use crate::config::RouterConfig;
use crate::error::envelope::EnvelopeError;
use crate::error::handler::HandlerError;
use crate::router::{CommandRouter, NoParams};

use common::wire::{AckStatus, error_codes};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct RenameParams {
    name: String,
}

fn router() -> CommandRouter {
    CommandRouter::new(&RouterConfig::default())
}

fn open_router() -> CommandRouter {
    let mut router = router();
    router.set_gate_enabled(false);
    router
}

#[tokio::test]
async fn given_malformed_json_when_dispatching_then_parse_error_without_response() {
    let router = router();

    let outcome = router.dispatch("{not json").await;

    assert_eq!(outcome.error.unwrap().code, error_codes::PARSE_ERROR);
    assert!(outcome.response.is_none());
    assert!(outcome.ack.is_none());
}

/// **VALUE**: Batches are rejected outright instead of being partially processed.
#[tokio::test]
async fn given_batch_array_when_dispatching_then_invalid_request() {
    let router = open_router();
    let raw = json!([{"jsonrpc": "2.0", "method": "a", "id": 1}]).to_string();

    let outcome = router.dispatch(&raw).await;

    let error = outcome.error.unwrap();
    assert_eq!(error.code, error_codes::INVALID_REQUEST);
    assert!(error.message.contains("Batch"));
}

#[tokio::test]
async fn given_object_id_when_dispatching_then_invalid_request_without_id() {
    let router = open_router();
    let raw = json!({"jsonrpc": "2.0", "method": "a", "id": {"nested": true}}).to_string();

    let outcome = router.dispatch(&raw).await;

    let error = outcome.error.unwrap();
    assert_eq!(error.code, error_codes::INVALID_REQUEST);
    assert!(error.id.is_none());
    assert!(outcome.response.is_none());
}

/// **VALUE**: An envelope rejected for its `id` is still acked by command id.
#[tokio::test]
async fn given_bool_id_with_command_id_when_dispatching_then_rejected_ack() {
    let router = open_router();
    let raw = json!({"jsonrpc": "2.0", "method": "a", "id": true, "__commandId": "c-1"}).to_string();

    let outcome = router.dispatch(&raw).await;

    assert_eq!(outcome.error.unwrap().code, error_codes::INVALID_REQUEST);
    assert!(outcome.response.is_none());
    let ack = outcome.ack.expect("rejected envelope with a command id must be acked");
    assert_eq!(ack.command_id, "c-1");
    assert_eq!(ack.status, AckStatus::Rejected);
    assert_eq!(router.dedup_len().await, 0);
}

#[tokio::test]
async fn given_missing_method_when_dispatching_then_invalid_request_with_response() {
    let router = open_router();
    let raw = json!({"jsonrpc": "2.0", "id": 7, "__commandId": "c-1"}).to_string();

    let outcome = router.dispatch(&raw).await;

    let response = outcome.response.unwrap();
    assert_eq!(response.error_code(), Some(error_codes::INVALID_REQUEST));
    let ack = outcome.ack.unwrap();
    assert_eq!(ack.status, AckStatus::Rejected);
    assert_eq!(ack.command_id, "c-1");
}

#[tokio::test]
async fn given_wrong_jsonrpc_version_when_dispatching_then_invalid_request() {
    let router = open_router();
    let raw = json!({"jsonrpc": "1.0", "method": "a", "id": "x"}).to_string();

    let outcome = router.dispatch(&raw).await;

    assert_eq!(
        outcome.response.unwrap().error_code(),
        Some(error_codes::INVALID_REQUEST)
    );
}

/// **VALUE**: Commands arriving before the handshake never reach a handler.
#[tokio::test]
async fn given_closed_gate_when_dispatching_then_not_ready_and_handler_skipped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut router = router();
    let counter = Arc::clone(&calls);
    router.register("workspace.rename", move |_: NoParams| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, HandlerError>(())
        }
    });
    let raw = json!({
        "jsonrpc": "2.0",
        "method": "workspace.rename",
        "id": 1,
        "__commandId": "early"
    })
    .to_string();

    let outcome = router.dispatch(&raw).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        outcome.response.unwrap().error_code(),
        Some(error_codes::BRIDGE_NOT_READY)
    );
    assert_eq!(outcome.ack.unwrap().reason.as_deref(), Some("bridge_not_ready"));
    assert_eq!(router.dedup_len().await, 0, "rejected commands are not recorded");
}

#[tokio::test]
async fn given_ready_without_handler_when_dispatching_then_gate_opens() {
    let router = router();
    let raw = json!({"jsonrpc": "2.0", "method": "bridge.ready", "id": 1}).to_string();

    let outcome = router.dispatch(&raw).await;

    assert!(outcome.handshake);
    assert!(router.is_gate_open());
    assert_eq!(outcome.response.unwrap().result(), Some(&serde_json::Value::Null));
}

#[tokio::test]
async fn given_open_gate_when_closed_then_commands_are_rejected_again() {
    let router = router();
    router
        .dispatch(&json!({"jsonrpc": "2.0", "method": "bridge.ready"}).to_string())
        .await;

    router.close_gate();

    let outcome = router
        .dispatch(&json!({"jsonrpc": "2.0", "method": "x", "id": 2}).to_string())
        .await;
    assert_eq!(outcome.error.unwrap().code, error_codes::BRIDGE_NOT_READY);
}

/// **VALUE**: A retried command id runs its handler exactly once.
#[tokio::test]
async fn given_duplicate_command_id_when_dispatching_then_handler_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut router = open_router();
    let counter = Arc::clone(&calls);
    assert!(!router.has_handler("documents.remove"));
    router.register("documents.remove", move |_: NoParams| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, HandlerError>(true)
        }
    });
    let raw = json!({
        "jsonrpc": "2.0",
        "method": "documents.remove",
        "id": 3,
        "__commandId": "same"
    })
    .to_string();

    let first = router.dispatch(&raw).await;
    let second = router.dispatch(&raw).await;

    assert!(router.has_handler("documents.remove"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.ack.unwrap().status, AckStatus::Ok);
    assert!(second.duplicate);
    assert!(second.ack.is_none());
    assert!(second.response.is_none());
}

#[tokio::test]
async fn given_command_id_alias_when_dispatching_then_used_for_dedup() {
    let mut router = open_router();
    router.register("noop", |_: NoParams| async { Ok::<_, HandlerError>(()) });
    let raw = json!({"jsonrpc": "2.0", "method": "noop", "commandId": "alias"}).to_string();

    let first = router.dispatch(&raw).await;
    let second = router.dispatch(&raw).await;

    assert_eq!(first.ack.unwrap().command_id, "alias");
    assert!(second.duplicate);
}

/// **VALUE**: Unknown methods are reported to the error callback with their name.
#[tokio::test]
async fn given_unknown_method_when_dispatching_then_method_not_found_reaches_callback() {
    let seen: Arc<Mutex<Vec<EnvelopeError>>> = Arc::new(Mutex::new(Vec::new()));
    let mut router = open_router();
    let sink = Arc::clone(&seen);
    router.set_error_callback(Arc::new(move |error: &EnvelopeError| {
        sink.lock().unwrap().push(error.clone());
    }));
    let raw = json!({"jsonrpc": "2.0", "method": "nonexistent.method", "id": "q"}).to_string();

    let outcome = router.dispatch(&raw).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].code, error_codes::METHOD_NOT_FOUND);
    assert!(seen[0].message.contains("nonexistent.method"));
    assert_eq!(
        outcome.response.unwrap().error_code(),
        Some(error_codes::METHOD_NOT_FOUND)
    );
}

#[tokio::test]
async fn given_null_params_when_dispatching_then_invalid_params() {
    let mut router = open_router();
    router.register("workspace.rename", |params: RenameParams| async move {
        Ok::<_, HandlerError>(params.name)
    });
    let raw = json!({
        "jsonrpc": "2.0",
        "method": "workspace.rename",
        "params": null,
        "id": 1,
        "__commandId": "n"
    })
    .to_string();

    let outcome = router.dispatch(&raw).await;

    assert_eq!(
        outcome.response.unwrap().error_code(),
        Some(error_codes::INVALID_PARAMS)
    );
    let reason = outcome.ack.unwrap().reason.unwrap();
    assert!(reason.starts_with("invalid_params"));
}

#[tokio::test]
async fn given_typed_params_when_dispatching_then_result_is_returned() {
    let mut router = open_router();
    router.register("workspace.rename", |params: RenameParams| async move {
        Ok::<_, HandlerError>(params.name.to_uppercase())
    });
    let raw = json!({
        "jsonrpc": "2.0",
        "method": "workspace.rename",
        "params": {"name": "atlas"},
        "id": 42,
        "__commandId": "r-1"
    })
    .to_string();

    let outcome = router.dispatch(&raw).await;

    assert_eq!(outcome.response.unwrap().result(), Some(&json!("ATLAS")));
    let ack = outcome.ack.unwrap();
    assert_eq!(ack.status, AckStatus::Ok);
    assert_eq!(ack.canonical_id.as_deref(), Some("42"));
}

#[tokio::test]
async fn given_failing_handler_when_dispatching_then_internal_error() {
    let mut router = open_router();
    router.register("documents.upsert", |_: NoParams| async {
        Err::<(), _>(HandlerError::failed("disk full"))
    });
    let raw = json!({
        "jsonrpc": "2.0",
        "method": "documents.upsert",
        "id": 5,
        "__commandId": "f"
    })
    .to_string();

    let outcome = router.dispatch(&raw).await;

    assert_eq!(
        outcome.response.unwrap().error_code(),
        Some(error_codes::INTERNAL_ERROR)
    );
    assert_eq!(
        outcome.ack.unwrap().reason.as_deref(),
        Some("handler_failed: disk full")
    );
    assert!(outcome.failure.is_some());
}

#[tokio::test]
async fn given_notification_when_dispatching_then_no_response_is_built() {
    let mut router = open_router();
    router.register("noop", |_: NoParams| async { Ok::<_, HandlerError>(()) });

    let outcome = router
        .dispatch(&json!({"jsonrpc": "2.0", "method": "noop"}).to_string())
        .await;

    assert!(outcome.response.is_none());
    assert!(outcome.ack.is_none());
    assert!(outcome.error.is_none());
}

use crate::helpers::{BOARD_STORE, Board, drain, envelope, next_message, next_push, pushes};

use bridge_core::push::{ChannelTransport, OutboundFrame, PlanSpec, Slice, StateRoot};
use bridge_core::{BridgeConfig, BridgeController, EnvelopeError, HandlerError, NoParams};

use common::wire::{PushLevel, error_codes};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;

#[derive(Deserialize)]
struct RetitleParams {
    title: String,
}

struct Session {
    controller: BridgeController<Board, ChannelTransport>,
    state: Arc<StateRoot<Board>>,
    rx: UnboundedReceiver<OutboundFrame>,
    retitles: Arc<AtomicUsize>,
    errors: Arc<Mutex<Vec<EnvelopeError>>>,
}

fn session() -> Session {
    let state = StateRoot::new(Board::default());
    let (transport, rx) = ChannelTransport::new();
    let retitles = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let spec = PlanSpec::builder("board", Arc::clone(&state))
        .slice(Slice::new("title", BOARD_STORE, PushLevel::Hot, |b: &Board| {
            b.title.clone()
        }))
        .epoch(|b: &Board| b.epoch)
        .build();

    let handler_state = Arc::clone(&state);
    let counter = Arc::clone(&retitles);
    let sink = Arc::clone(&errors);
    let controller = BridgeController::builder(&BridgeConfig::default(), Arc::new(transport))
        .plan(spec)
        .handler("board.retitle", move |params: RetitleParams| {
            let state = Arc::clone(&handler_state);
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                state.mutate(|b| b.title = params.title).await;
                Ok::<_, HandlerError>(true)
            }
        })
        .handler("board.fail", |_: NoParams| async {
            Err::<(), _>(HandlerError::failed("nope"))
        })
        .on_error(move |error| {
            if let Ok(mut errors) = sink.lock() {
                errors.push(error.clone());
            }
        })
        .build();

    Session {
        controller,
        state,
        rx,
        retitles,
        errors,
    }
}

fn ready(id: u64) -> String {
    json!({"jsonrpc": "2.0", "method": "bridge.ready", "id": id}).to_string()
}

fn retitle(command_id: &str, title: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "board.retitle",
        "params": {"title": title},
        "id": command_id,
        "__commandId": command_id
    })
    .to_string()
}

// ============================================================================
// Handshake
// ============================================================================

/// **VALUE**: Nothing is pushed and no handler runs before the ready handshake.
///
/// **BUG THIS CATCHES**: Would catch if plans were started at construction time,
/// or if the gate let commands through before the surface could receive pushes.
#[tokio::test]
async fn given_no_handshake_when_command_arrives_then_rejected_and_no_pushes() {
    // GIVEN: A fresh session
    let mut session = session();

    // WHEN: A command arrives first
    let outcome = session.controller.handle_inbound(&retitle("c-1", "x")).await;

    // THEN: It is rejected as not ready and acked as such
    assert_eq!(outcome.error.map(|e| e.code), Some(error_codes::BRIDGE_NOT_READY));
    let ack = next_message(&mut session.rx).await;
    assert_eq!(ack["__ack"]["status"], "rejected");
    assert_eq!(ack["__ack"]["reason"], "bridge_not_ready");
    let response = next_message(&mut session.rx).await;
    assert_eq!(response["error"]["code"], error_codes::BRIDGE_NOT_READY);

    sleep(Duration::from_millis(20)).await;
    assert!(pushes(&drain(&mut session.rx)).is_empty());
    assert_eq!(session.retitles.load(Ordering::SeqCst), 0);
    assert!(!session.controller.is_bridge_ready());
}

#[tokio::test]
async fn given_handshake_then_response_precedes_initial_snapshot() {
    let mut session = session();

    let outcome = session.controller.handle_inbound(&ready(1)).await;

    assert!(outcome.handshake);
    assert!(session.controller.is_bridge_ready());
    match session.rx.recv().await {
        Some(OutboundFrame::Message(bytes)) => {
            let response: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(response["id"], 1);
            assert!(response.get("result").is_some());
        }
        other => panic!("Expected the ready response first, got {other:?}"),
    }
    let snapshot = next_push(&mut session.rx).await;
    assert_eq!(snapshot.revision, 1);
    assert_eq!(session.controller.plan_generations().await, vec![1]);
}

#[tokio::test]
async fn given_repeated_handshake_then_plans_are_not_restarted() {
    let mut session = session();
    session.controller.handle_inbound(&ready(1)).await;
    next_push(&mut session.rx).await;

    let repeated = session.controller.handle_inbound(&ready(2)).await;
    next_message(&mut session.rx).await;
    sleep(Duration::from_millis(20)).await;

    assert!(repeated.handshake);
    assert_eq!(session.controller.plan_generations().await, vec![1]);
    assert!(pushes(&drain(&mut session.rx)).is_empty());
}

// ============================================================================
// Commands
// ============================================================================

/// **VALUE**: A retried command is acknowledged once and applied once.
#[tokio::test]
async fn given_duplicate_command_id_then_handler_runs_once_and_state_pushes_once() {
    let mut session = session();
    session.controller.handle_inbound(&ready(1)).await;
    next_push(&mut session.rx).await;

    let first = session.controller.handle_inbound(&retitle("c-9", "Roadmap")).await;
    let second = session.controller.handle_inbound(&retitle("c-9", "Roadmap")).await;

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(session.retitles.load(Ordering::SeqCst), 1);

    let push = next_push(&mut session.rx).await;
    assert_eq!(envelope(&push)["payload"], "Roadmap");
    sleep(Duration::from_millis(20)).await;
    let frames = drain(&mut session.rx);
    assert!(pushes(&frames).is_empty());
    let acks = frames
        .iter()
        .filter_map(|frame| match frame {
            OutboundFrame::Message(bytes) => serde_json::from_slice::<serde_json::Value>(bytes).ok(),
            OutboundFrame::Push(_) => None,
        })
        .filter(|message| message.get("__ack").is_some())
        .count();
    assert!(acks <= 1, "duplicate command was acknowledged again");
}

#[tokio::test]
async fn given_failing_handler_then_ack_rejected_with_reason() {
    let mut session = session();
    session.controller.handle_inbound(&ready(1)).await;
    next_push(&mut session.rx).await;

    let raw = json!({"jsonrpc": "2.0", "method": "board.fail", "id": 3, "__commandId": "f-1"});
    session.controller.handle_inbound(&raw.to_string()).await;

    let ack = next_message(&mut session.rx).await;
    assert_eq!(ack["__ack"]["commandId"], "f-1");
    assert_eq!(ack["__ack"]["reason"], "handler_failed: nope");
    assert_eq!(ack["__ack"]["canonicalId"], "3");
    let response = next_message(&mut session.rx).await;
    assert_eq!(response["error"]["code"], error_codes::INTERNAL_ERROR);
}

#[tokio::test]
async fn given_unknown_method_notification_then_error_callback_sees_method_not_found() {
    let session = session();
    session.controller.handle_inbound(&ready(1)).await;

    let raw = r#"{"jsonrpc":"2.0","method":"nonexistent.method","params":{}}"#;
    session.controller.handle_inbound(raw).await;

    let errors = session.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, error_codes::METHOD_NOT_FOUND);
}

// ============================================================================
// Teardown
// ============================================================================

/// **VALUE**: A torn-down controller can serve a new session on the same transport.
#[tokio::test]
async fn given_teardown_when_handshake_repeats_then_snapshot_is_resent() {
    // GIVEN: A session that has pushed its snapshot
    let mut session = session();
    session.state.mutate(|b| b.title = "Kept".to_string()).await;
    session.controller.handle_inbound(&ready(1)).await;
    let first = next_push(&mut session.rx).await;

    // WHEN: The session is torn down and the surface reconnects
    session.controller.teardown().await;
    assert!(!session.controller.is_bridge_ready());
    assert!(session.controller.plan_generations().await.is_empty());
    let rejected = session.controller.handle_inbound(&retitle("c-2", "x")).await;
    assert!(rejected.error.is_some());
    drain(&mut session.rx);

    session.controller.handle_inbound(&ready(2)).await;

    // THEN: The unchanged snapshot is delivered again with a later revision
    let second = next_push(&mut session.rx).await;
    assert_eq!(envelope(&second)["payload"], "Kept");
    assert!(second.revision > first.revision);
    let stats = session
        .controller
        .ledger_stats()
        .await
        .expect("Failed to read ledger stats");
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.deduplicated, 0);
}

use crate::workspace::{self, DOCUMENTS_STORE, WORKSPACE_STORE, Workspace};

use bridge_core::BridgeConfig;
use bridge_core::push::{ChannelTransport, OutboundFrame, PushFrame, StateRoot};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

#[test]
fn given_same_content_when_upserting_then_version_is_kept() {
    let mut workspace = Workspace::new("Notes");

    assert_eq!(workspace.upsert("a", "One".into(), String::new()), 1);
    assert_eq!(workspace.upsert("a", "One".into(), String::new()), 1);
    assert_eq!(workspace.upsert("a", "Uno".into(), String::new()), 2);
}

/// **VALUE**: A reload bumps every surviving document so the delta carries all of them.
#[test]
fn given_documents_when_reloaded_then_versions_and_epoch_advance() {
    let mut workspace = Workspace::new("Notes");
    workspace.upsert("a", "A".into(), String::new());
    workspace.upsert("b", "B".into(), String::new());

    let epoch = workspace.reload(vec![
        ("a".into(), "A".into(), String::new()),
        ("c".into(), "C".into(), String::new()),
    ]);

    assert_eq!(epoch, 1);
    assert_eq!(workspace.documents["a"].version, 2);
    assert_eq!(workspace.documents["c"].version, 1);
    assert!(!workspace.documents.contains_key("b"));
}

struct Harness {
    controller: bridge_core::BridgeController<Workspace, ChannelTransport>,
    rx: UnboundedReceiver<OutboundFrame>,
}

async fn ready_harness() -> Harness {
    let state = StateRoot::new(Workspace::new("Notes"));
    let (transport, rx) = ChannelTransport::new();
    let controller = workspace::controller(&BridgeConfig::default(), &state, Arc::new(transport));
    controller
        .handle_inbound(&json!({"jsonrpc": "2.0", "method": "bridge.ready", "id": 0}).to_string())
        .await;
    Harness { controller, rx }
}

async fn next_push_on(rx: &mut UnboundedReceiver<OutboundFrame>, store: &str) -> PushFrame {
    loop {
        let frame = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Timed out waiting for a push")
            .expect("Transport closed");
        if let OutboundFrame::Push(push) = frame
            && push.store.as_str() == store
        {
            return push;
        }
    }
}

fn payload(frame: &PushFrame) -> Value {
    let envelope: Value = serde_json::from_slice(&frame.bytes).unwrap();
    envelope["payload"].clone()
}

fn call(method: &str, params: Value, id: u64) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id,
        "__commandId": format!("cmd-{id}")
    })
    .to_string()
}

#[tokio::test]
async fn given_ready_session_when_renamed_then_workspace_store_receives_replace() {
    let mut harness = ready_harness().await;
    let initial = next_push_on(&mut harness.rx, WORKSPACE_STORE.as_str()).await;
    assert_eq!(payload(&initial)["name"], "Notes");

    let outcome = harness
        .controller
        .handle_inbound(&call("workspace.rename", json!({"name": "  Plans "}), 1))
        .await;

    assert_eq!(outcome.response.unwrap().result(), Some(&json!("Plans")));
    let renamed = next_push_on(&mut harness.rx, WORKSPACE_STORE.as_str()).await;
    assert_eq!(payload(&renamed), json!({"name": "Plans", "documentCount": 0}));
    let envelope: Value = serde_json::from_slice(&renamed.bytes).unwrap();
    assert_eq!(envelope["op"], "replace");
    assert_eq!(envelope["level"], "warm");
}

#[tokio::test]
async fn given_blank_name_when_renaming_then_invalid_params() {
    let harness = ready_harness().await;

    let outcome = harness
        .controller
        .handle_inbound(&call("workspace.rename", json!({"name": "   "}), 1))
        .await;

    assert_eq!(outcome.response.unwrap().error_code(), Some(-32602));
}

/// **VALUE**: Document handlers produce entity deltas on the documents store.
#[tokio::test]
async fn given_documents_when_upserted_and_removed_then_deltas_follow() {
    let mut harness = ready_harness().await;

    harness
        .controller
        .handle_inbound(&call(
            "documents.upsert",
            json!({"id": "d1", "title": "Draft", "body": "..."}),
            1,
        ))
        .await;
    let added = next_push_on(&mut harness.rx, DOCUMENTS_STORE.as_str()).await;
    assert_eq!(payload(&added)["changed"]["d1"]["title"], "Draft");

    let outcome = harness
        .controller
        .handle_inbound(&call("documents.remove", json!({"id": "d1"}), 2))
        .await;
    assert_eq!(outcome.response.unwrap().result(), Some(&json!(true)));
    let removed = next_push_on(&mut harness.rx, DOCUMENTS_STORE.as_str()).await;
    assert_eq!(payload(&removed), json!({"removed": ["d1"]}));
    assert!(removed.revision > added.revision);

    let missing = harness
        .controller
        .handle_inbound(&call("documents.remove", json!({"id": "d1"}), 3))
        .await;
    assert_eq!(missing.response.unwrap().error_code(), Some(-32603));
}

#[tokio::test]
async fn given_reload_then_documents_push_carries_new_epoch() {
    let mut harness = ready_harness().await;
    harness
        .controller
        .handle_inbound(&call(
            "documents.upsert",
            json!({"id": "d1", "title": "Draft"}),
            1,
        ))
        .await;
    next_push_on(&mut harness.rx, DOCUMENTS_STORE.as_str()).await;

    let outcome = harness
        .controller
        .handle_inbound(&call("workspace.reload", json!({}), 2))
        .await;

    assert_eq!(outcome.response.unwrap().result(), Some(&json!(1)));
    let reloaded = next_push_on(&mut harness.rx, DOCUMENTS_STORE.as_str()).await;
    assert_eq!(reloaded.epoch, 1);
    assert_eq!(payload(&reloaded)["changed"]["d1"]["version"], 2);
}

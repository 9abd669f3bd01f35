use bridge_host::workspace::{self, Workspace};

use bridge_core::config::ServerConfig;
use bridge_core::push::StateRoot;
use bridge_core::ws::start_bridge_server;
use bridge_core::BridgeConfig;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn send(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send message");
}

/// Read frames until one satisfies `matches`.
async fn receive_until(client: &mut Client, matches: impl Fn(&Value) -> bool) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Connection closed")
            .expect("Error receiving message");
        let text = message.into_text().expect("Frame was not text");
        let value: Value = serde_json::from_str(text.as_str()).expect("Frame was not JSON");
        if matches(&value) {
            return value;
        }
    }
}

// ============================================================================
// End-to-end: demo workspace served over WebSocket
// ============================================================================

/// **VALUE**: Two sessions share one workspace; a change made through one is
/// pushed to the other.
///
/// **BUG THIS CATCHES**: Would catch if sessions got private copies of the
/// state, or if a second connection's controller never started its plans.
#[tokio::test]
async fn given_two_sessions_when_one_upserts_then_other_receives_delta() {
    // GIVEN: The host's workspace served on an ephemeral port
    let state = StateRoot::new(Workspace::new("Shared"));
    let config = BridgeConfig::default();
    let handle = start_bridge_server(&ServerConfig { port: 0 }, move |transport| {
        workspace::controller(&config, &state, transport)
    })
    .await
    .expect("Failed to start bridge server");
    let url = format!("ws://{}", handle.local_addr());

    let (mut writer, _) = connect_async(&url).await.expect("Failed to connect");
    let (mut watcher, _) = connect_async(&url).await.expect("Failed to connect");
    for client in [&mut writer, &mut watcher] {
        send(client, json!({"jsonrpc": "2.0", "method": "bridge.ready", "id": 1})).await;
        receive_until(client, |v| v["store"] == "workspace").await;
    }

    // WHEN: The first session adds a document
    send(
        &mut writer,
        json!({
            "jsonrpc": "2.0",
            "method": "documents.upsert",
            "params": {"id": "d1", "title": "Spec"},
            "id": 2,
            "__commandId": "w-1"
        }),
    )
    .await;

    // THEN: The writer is acked and the watcher sees the delta
    let ack = receive_until(&mut writer, |v| v.get("__ack").is_some()).await;
    assert_eq!(ack["__ack"]["status"], "ok");
    let delta = receive_until(&mut watcher, |v| v["store"] == "documents").await;
    assert_eq!(delta["payload"]["changed"]["d1"]["title"], "Spec");
    assert_eq!(delta["__revision"], 1);

    writer.close(None).await.ok();
    watcher.close(None).await.ok();
    handle.shutdown().await;
}

#[tokio::test]
async fn given_command_before_ready_then_not_ready_error_is_returned() {
    let state = StateRoot::new(Workspace::new("Gated"));
    let config = BridgeConfig::default();
    let handle = start_bridge_server(&ServerConfig { port: 0 }, move |transport| {
        workspace::controller(&config, &state, transport)
    })
    .await
    .expect("Failed to start bridge server");
    let (mut client, _) = connect_async(format!("ws://{}", handle.local_addr()))
        .await
        .expect("Failed to connect");

    send(
        &mut client,
        json!({"jsonrpc": "2.0", "method": "workspace.rename", "params": {"name": "x"}, "id": 9}),
    )
    .await;

    let response = receive_until(&mut client, |v| v.get("id").is_some()).await;
    assert_eq!(response["error"]["code"], -32002);

    client.close(None).await.ok();
    handle.shutdown().await;
}

use crate::helpers::{BOARD_STORE, Board};

use bridge_core::config::ServerConfig;
use bridge_core::push::{PlanSpec, Slice, StateRoot};
use bridge_core::ws::{WsTransport, start_bridge_server};
use bridge_core::{BridgeConfig, BridgeController, HandlerError};

use common::wire::PushLevel;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Deserialize)]
struct RetitleParams {
    title: String,
}

fn board_controller(
    state: &Arc<StateRoot<Board>>,
    transport: Arc<WsTransport>,
) -> BridgeController<Board, WsTransport> {
    let spec = PlanSpec::builder("board", Arc::clone(state))
        .slice(Slice::new("title", BOARD_STORE, PushLevel::Hot, |b: &Board| {
            b.title.clone()
        }))
        .build();
    let handler_state = Arc::clone(state);

    BridgeController::builder(&BridgeConfig::default(), transport)
        .plan(spec)
        .handler("board.retitle", move |params: RetitleParams| {
            let state = Arc::clone(&handler_state);
            async move {
                state.mutate(|b| b.title = params.title).await;
                Ok::<_, HandlerError>(())
            }
        })
        .build()
}

async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send message");
}

async fn receive_json(client: &mut Client) -> Value {
    let message = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("Timed out waiting for a frame")
        .expect("Connection closed")
        .expect("Error receiving message");
    let text = message.into_text().expect("Frame was not text");
    serde_json::from_str(text.as_str()).expect("Frame was not JSON")
}

// ============================================================================
// Public API tests for the bridge WebSocket server
// ============================================================================

/// **VALUE**: A surface connecting over WebSocket completes the handshake and
/// receives pushes for state changed by its own commands.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The server fails to bind an ephemeral port
/// - Inbound text frames are not routed to the controller
/// - Pushes or acks are not written back on the same socket
#[tokio::test]
async fn given_running_server_when_surface_sends_commands_then_receives_acks_and_pushes() {
    // GIVEN: A server on an ephemeral port
    let state = StateRoot::new(Board::default());
    let factory_state = Arc::clone(&state);
    let handle = start_bridge_server(&ServerConfig { port: 0 }, move |transport| {
        board_controller(&factory_state, transport)
    })
    .await
    .expect("Failed to start bridge server");
    assert_ne!(handle.port(), 0);

    let url = format!("ws://{}", handle.local_addr());
    let (mut client, _) = connect_async(&url)
        .await
        .expect("Failed to connect to bridge server");

    // WHEN: The surface sends the ready handshake
    send_json(
        &mut client,
        json!({"jsonrpc": "2.0", "method": "bridge.ready", "id": 1}),
    )
    .await;

    // THEN: The response arrives, followed by the initial snapshot
    let response = receive_json(&mut client).await;
    assert_eq!(response["id"], 1);
    let snapshot = receive_json(&mut client).await;
    assert_eq!(snapshot["__revision"], 1);
    assert_eq!(snapshot["store"], "board");
    assert_eq!(snapshot["payload"], "");

    // WHEN: The surface retitles the board
    send_json(
        &mut client,
        json!({
            "jsonrpc": "2.0",
            "method": "board.retitle",
            "params": {"title": "Launch"},
            "id": 2,
            "__commandId": "c-1"
        }),
    )
    .await;

    // THEN: Ack, response and push all arrive (the push may overtake the ack)
    let mut ack = None;
    let mut push = None;
    while ack.is_none() || push.is_none() {
        let frame = receive_json(&mut client).await;
        if frame.get("__ack").is_some() {
            ack = Some(frame);
        } else if frame.get("__revision").is_some() {
            push = Some(frame);
        }
    }
    assert_eq!(ack.unwrap()["__ack"]["status"], "ok");
    let push = push.unwrap();
    assert_eq!(push["__revision"], 2);
    assert_eq!(push["payload"], "Launch");

    client.close(None).await.ok();
    handle.shutdown().await;
}

#[tokio::test]
async fn given_batch_frame_when_sent_then_no_response_and_connection_stays_open() {
    let state = StateRoot::new(Board::default());
    let handle = start_bridge_server(&ServerConfig { port: 0 }, move |transport| {
        board_controller(&state, transport)
    })
    .await
    .expect("Failed to start bridge server");
    let (mut client, _) = connect_async(format!("ws://{}", handle.local_addr()))
        .await
        .expect("Failed to connect to bridge server");

    send_json(
        &mut client,
        json!([{"jsonrpc": "2.0", "method": "bridge.ready", "id": 1}]),
    )
    .await;
    send_json(
        &mut client,
        json!({"jsonrpc": "2.0", "method": "bridge.ready", "id": 2}),
    )
    .await;

    // The batch is dropped without a response; the next request is served.
    let response = receive_json(&mut client).await;
    assert_eq!(response["id"], 2);

    client.close(None).await.ok();
    handle.shutdown().await;
}

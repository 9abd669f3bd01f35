use crate::error::transport::TransportError;
use crate::push::{PushFrame, PushTransport};

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// [`PushTransport`] writing text frames to one WebSocket connection.
///
/// Frames are queued to the connection's writer task; the transport fails
/// with [`TransportError::Closed`] once that task has gone away.
pub struct WsTransport {
    outgoing: mpsc::Sender<Message>,
}

impl WsTransport {
    pub(crate) fn new(outgoing: mpsc::Sender<Message>) -> Self {
        Self { outgoing }
    }

    async fn send_text(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let text = String::from_utf8(bytes)
            .map_err(|e| TransportError::send(format!("Frame is not UTF-8: {e}")))?;

        self.outgoing
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| TransportError::closed("WebSocket writer closed"))
    }
}

impl PushTransport for WsTransport {
    async fn push_json(&self, frame: PushFrame) -> Result<(), TransportError> {
        self.send_text(frame.bytes).await
    }

    async fn send_message(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.send_text(bytes).await
    }
}

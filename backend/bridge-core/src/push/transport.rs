//! The sink side of the push pipeline.

use crate::error::transport::TransportError;

use common::wire::{PushLevel, PushOp, StoreKey};

use std::future::Future;

use tokio::sync::mpsc;

/// One encoded push envelope plus the metadata it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct PushFrame {
    pub store: StoreKey,
    pub op: PushOp,
    pub level: PushLevel,
    pub revision: u64,
    pub epoch: u64,
    pub push_id: String,
    /// The complete envelope, JSON-encoded.
    pub bytes: Vec<u8>,
}

/// Delivery channel to the content surface.
///
/// Implementations are called from a single task (the push ledger), so they
/// never see concurrent calls.
pub trait PushTransport: Send + Sync + 'static {
    fn push_json(
        &self,
        frame: PushFrame,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Deliver a non-push frame (command ack or response envelope).
    fn send_message(
        &self,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Push(PushFrame),
    Message(Vec<u8>),
}

/// In-process transport that forwards every frame to an unbounded channel.
///
/// Used to embed the bridge behind a custom delivery mechanism.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PushTransport for ChannelTransport {
    async fn push_json(&self, frame: PushFrame) -> Result<(), TransportError> {
        self.tx
            .send(OutboundFrame::Push(frame))
            .map_err(|_| TransportError::closed("Push receiver dropped"))
    }

    async fn send_message(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.tx
            .send(OutboundFrame::Message(bytes))
            .map_err(|_| TransportError::closed("Message receiver dropped"))
    }
}

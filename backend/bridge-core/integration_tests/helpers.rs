//! Shared fixtures for bridge-core integration tests.
//!
//! - A small observable state (`Board`) with snapshot and entity slices
//! - Channel-backed ledgers so tests can await individual frames
//! - Polling helpers for conditions reached by background watchers

use bridge_core::error::transport::TransportError;
use bridge_core::push::{
    ChannelTransport, HealthMonitor, OutboundFrame, PushFrame, PushLedger, PushTransport,
};

use common::wire::StoreKey;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, sleep, timeout};

pub const BOARD_STORE: StoreKey = StoreKey::new("board");
pub const CARDS_STORE: StoreKey = StoreKey::new("cards");

const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
pub struct Board {
    pub title: String,
    pub counter: u64,
    pub epoch: u64,
    pub cards: std::collections::HashMap<String, Card>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub text: String,
    pub version: u64,
}

impl Card {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            version: 1,
        }
    }
}

/// Ledger over a [`ChannelTransport`] plus the receiving end of its frames.
pub fn channel_ledger() -> (PushLedger<ChannelTransport>, UnboundedReceiver<OutboundFrame>) {
    let (transport, rx) = ChannelTransport::new();
    let ledger = PushLedger::new(Arc::new(transport), HealthMonitor::new(3), 64);
    (ledger, rx)
}

/// Wait for the next push frame, skipping acks and responses.
pub async fn next_push(rx: &mut UnboundedReceiver<OutboundFrame>) -> PushFrame {
    loop {
        let frame = timeout(FRAME_TIMEOUT, rx.recv())
            .await
            .expect("Timed out waiting for a push")
            .expect("Transport channel closed");
        if let OutboundFrame::Push(push) = frame {
            return push;
        }
    }
}

/// Wait for the next non-push frame and decode it.
pub async fn next_message(rx: &mut UnboundedReceiver<OutboundFrame>) -> Value {
    loop {
        let frame = timeout(FRAME_TIMEOUT, rx.recv())
            .await
            .expect("Timed out waiting for a message")
            .expect("Transport channel closed");
        if let OutboundFrame::Message(bytes) = frame {
            return serde_json::from_slice(&bytes).expect("Message was not JSON");
        }
    }
}

/// Collect every frame already delivered, without waiting.
pub fn drain(rx: &mut UnboundedReceiver<OutboundFrame>) -> Vec<OutboundFrame> {
    let mut frames = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(frame) => frames.push(frame),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return frames,
        }
    }
}

pub fn pushes(frames: &[OutboundFrame]) -> Vec<&PushFrame> {
    frames
        .iter()
        .filter_map(|frame| match frame {
            OutboundFrame::Push(push) => Some(push),
            OutboundFrame::Message(_) => None,
        })
        .collect()
}

pub fn envelope(frame: &PushFrame) -> Value {
    serde_json::from_slice(&frame.bytes).expect("Push envelope was not JSON")
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + FRAME_TIMEOUT;
    while Instant::now() < deadline {
        if condition().await {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Transport that rejects every frame.
#[derive(Default)]
pub struct FailingTransport {
    pub attempts: AtomicUsize,
}

impl PushTransport for FailingTransport {
    async fn push_json(&self, _frame: PushFrame) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::send("surface unavailable"))
    }

    async fn send_message(&self, _bytes: Vec<u8>) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::send("surface unavailable"))
    }
}

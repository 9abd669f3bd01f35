use crate::helpers::{BOARD_STORE, Board, FailingTransport, channel_ledger, eventually};

use bridge_core::push::{
    ConnectionHealth, Emission, HealthMonitor, PlanGate, PlanSpec, PushLedger, PushPlan, Slice,
    StateRoot,
};

use common::wire::{PushLevel, PushOp};

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::value::to_raw_value;
use tokio::time::timeout;

#[tokio::test]
async fn given_gate_never_started_when_emitting_then_push_counted_stale() {
    let (ledger, mut rx) = channel_ledger();
    let emission = Emission {
        gate: Arc::new(PlanGate::new()),
        generation: 0,
        slice: Arc::from("orphan"),
        store: BOARD_STORE,
        op: PushOp::Merge,
        level: PushLevel::Hot,
        epoch: 0,
        payload: to_raw_value(&1).expect("Failed to encode payload"),
    };

    ledger.emit(emission).await.expect("Failed to queue emission");
    ledger.flush().await.expect("Failed to flush ledger");

    let stats = ledger.stats().await.expect("Failed to read stats");
    assert_eq!(stats.stale, 1);
    assert_eq!(stats.delivered, 0);
    assert!(rx.try_recv().is_err());
    assert_eq!(ledger.current_revision(BOARD_STORE).await.ok(), Some(0));
}

#[tokio::test]
async fn given_queued_messages_when_flushed_then_delivered_in_order() {
    let (ledger, mut rx) = channel_ledger();

    for n in 0..3u8 {
        ledger
            .send_message(vec![b'0' + n])
            .await
            .expect("Failed to queue message");
    }
    ledger.flush().await.expect("Failed to flush ledger");

    let mut received = Vec::new();
    while let Ok(bridge_core::push::OutboundFrame::Message(bytes)) = rx.try_recv() {
        received.extend(bytes);
    }
    assert_eq!(received, b"012");
}

/// **VALUE**: Repeated transport failures surface as a disconnected health status.
#[tokio::test]
async fn given_failing_transport_when_pushing_then_health_reports_disconnected() {
    // GIVEN: A transport that always fails and a threshold of one failure
    let transport = Arc::new(FailingTransport::default());
    let ledger = PushLedger::new(Arc::clone(&transport), HealthMonitor::new(1), 8);
    let mut health = ledger.health().subscribe();
    let state = StateRoot::new(Board::default());
    let spec = PlanSpec::builder("board", state)
        .slice(Slice::new("counter", BOARD_STORE, PushLevel::Hot, |b: &Board| {
            b.counter
        }))
        .build();
    let mut plan = PushPlan::new(spec, ledger.clone());

    // WHEN: The initial snapshot is pushed
    plan.start();

    // THEN: The failure is recorded and nothing is cached for dedup
    timeout(Duration::from_secs(2), health.wait_for(|r| r.status == ConnectionHealth::Disconnected))
        .await
        .expect("Health never reported disconnected")
        .expect("Health channel closed");
    let ledger_ref = &ledger;
    assert!(
        eventually(|| async move { ledger_ref.stats().await.map(|s| s.failed).ok() == Some(1) }).await
    );
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    plan.stop().await.expect("Failed to stop plan");
}

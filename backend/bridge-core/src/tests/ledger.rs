use crate::push::{ChannelTransport, Emission, HealthMonitor, OutboundFrame, PlanGate, PushLedger};

use common::wire::{PushLevel, PushOp, StoreKey};

use std::sync::Arc;

use serde_json::value::to_raw_value;

const BOARD: StoreKey = StoreKey::new("board");

fn emission(gate: &Arc<PlanGate>, generation: u64, value: u32) -> Emission {
    Emission {
        gate: Arc::clone(gate),
        generation,
        slice: Arc::from("counter"),
        store: BOARD,
        op: PushOp::Merge,
        level: PushLevel::Hot,
        epoch: 0,
        payload: to_raw_value(&value).unwrap(),
    }
}

/// **VALUE**: A watcher still holding an old generation cannot deliver after a restart.
///
/// **BUG THIS CATCHES**: Would catch if the gate only checked `running`, letting a
/// superseded watcher push stale state under the new generation's revisions.
#[tokio::test]
async fn given_superseded_generation_when_emitting_then_dropped_as_stale() {
    // GIVEN: A running gate that has moved from generation 1 to 2
    let (transport, mut rx) = ChannelTransport::new();
    let ledger = PushLedger::new(Arc::new(transport), HealthMonitor::new(3), 8);
    let gate = Arc::new(PlanGate::new());
    let superseded = gate.advance();
    let current = gate.advance();
    assert!(gate.is_running());
    assert_ne!(superseded, current);

    // WHEN: An emission tagged with the old generation reaches the ledger
    ledger.emit(emission(&gate, superseded, 1)).await.unwrap();
    ledger.flush().await.unwrap();

    // THEN: It is counted stale, consumes no revision and never reaches the transport
    let stats = ledger.stats().await.unwrap();
    assert_eq!(stats.stale, 1);
    assert_eq!(stats.delivered, 0);
    assert_eq!(ledger.current_revision(BOARD).await.unwrap(), 0);
    assert!(rx.try_recv().is_err());

    // AND: The current generation still delivers with the first revision
    ledger.emit(emission(&gate, current, 2)).await.unwrap();
    ledger.flush().await.unwrap();

    match rx.try_recv() {
        Ok(OutboundFrame::Push(frame)) => assert_eq!(frame.revision, 1),
        other => panic!("expected a push frame, got {other:?}"),
    }
    assert_eq!(ledger.stats().await.unwrap().delivered, 1);
}

#[tokio::test]
async fn given_halted_gate_when_emitting_current_generation_then_dropped_as_stale() {
    let (transport, mut rx) = ChannelTransport::new();
    let ledger = PushLedger::new(Arc::new(transport), HealthMonitor::new(3), 8);
    let gate = Arc::new(PlanGate::new());
    let generation = gate.advance();
    gate.halt();

    ledger.emit(emission(&gate, generation, 1)).await.unwrap();
    ledger.flush().await.unwrap();

    assert_eq!(ledger.stats().await.unwrap().stale, 1);
    assert!(rx.try_recv().is_err());
}

use crate::helpers::{
    BOARD_STORE, Board, channel_ledger, drain, envelope, eventually, next_push, pushes,
};

use bridge_core::push::{PlanSpec, PlanState, PushPlan, Slice, StateRoot};

use common::wire::{PushLevel, PushOp};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

fn counter_spec(state: Arc<StateRoot<Board>>, level: PushLevel) -> PlanSpec<Board> {
    PlanSpec::builder("board", state)
        .slice(Slice::new("counter", BOARD_STORE, level, |board: &Board| {
            board.counter
        }))
        .epoch(|board: &Board| board.epoch)
        .build()
}

// ============================================================================
// Revisions and generations
// ============================================================================

/// **VALUE**: Every push on a store carries a revision one higher than the last.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The initial snapshot is not stamped with revision 1
/// - Two slices on the same store get independent counters
#[tokio::test]
async fn given_two_slices_on_one_store_when_mutating_then_revisions_strictly_increase() {
    // GIVEN: Two hot slices sharing the board store
    let state = StateRoot::new(Board::default());
    let spec = PlanSpec::builder("board", Arc::clone(&state))
        .slice(Slice::new("counter", BOARD_STORE, PushLevel::Hot, |b: &Board| {
            b.counter
        }))
        .slice(
            Slice::new("title", BOARD_STORE, PushLevel::Hot, |b: &Board| {
                b.title.clone()
            })
            .with_op(PushOp::Replace),
        )
        .build();
    let (ledger, mut rx) = channel_ledger();
    let mut plan = PushPlan::new(spec, ledger);

    // WHEN: The plan starts and the state changes three times
    plan.start();
    let mut revisions = vec![next_push(&mut rx).await.revision, next_push(&mut rx).await.revision];
    for n in 1..=3 {
        state
            .mutate(|b| {
                b.counter = n;
                b.title = format!("title {n}");
            })
            .await;
        revisions.push(next_push(&mut rx).await.revision);
        revisions.push(next_push(&mut rx).await.revision);
    }

    // THEN: Revisions run 1..=8 with no gaps or repeats
    assert_eq!(revisions, (1..=8).collect::<Vec<u64>>());
    plan.stop().await.expect("Failed to stop plan");
}

#[tokio::test]
async fn given_repeated_starts_then_generation_counts_starts() {
    let state = StateRoot::new(Board::default());
    let (ledger, _rx) = channel_ledger();
    let mut plan = PushPlan::new(counter_spec(state, PushLevel::Hot), ledger);
    assert_eq!(plan.generation(), 0);
    assert_eq!(plan.state(), PlanState::Created);

    for expected in 1..=4 {
        assert_eq!(plan.start(), expected);
        if expected % 2 == 0 {
            plan.stop().await.expect("Failed to stop plan");
            assert_eq!(plan.state(), PlanState::Stopped);
        }
    }

    assert_eq!(plan.generation(), 4);
}

#[tokio::test]
async fn given_envelope_when_pushed_then_metadata_matches_frame() {
    let state = StateRoot::new(Board::default());
    state.mutate(|b| b.epoch = 9).await;
    let (ledger, mut rx) = channel_ledger();
    let mut plan = PushPlan::new(counter_spec(state, PushLevel::Hot), ledger);

    plan.start();
    let frame = next_push(&mut rx).await;
    let body = envelope(&frame);

    assert_eq!(body["__v"], 1);
    assert_eq!(body["__revision"], 1);
    assert_eq!(body["__epoch"], 9);
    assert_eq!(body["__pushId"], frame.push_id.as_str());
    assert_eq!(body["store"], "board");
    assert_eq!(body["op"], "merge");
    assert_eq!(body["level"], "hot");
    assert_eq!(body["payload"], 0);
    plan.stop().await.expect("Failed to stop plan");
}

// ============================================================================
// Content dedup
// ============================================================================

/// **VALUE**: Identical payloads on the same channel and epoch reach the transport once.
#[tokio::test]
async fn given_unchanged_payload_when_state_mutates_then_push_is_deduplicated() {
    // GIVEN: A slice that ignores the field being mutated
    let state = StateRoot::new(Board::default());
    let spec = PlanSpec::builder("board", Arc::clone(&state))
        .slice(Slice::new("title", BOARD_STORE, PushLevel::Hot, |b: &Board| {
            b.title.clone()
        }))
        .epoch(|b: &Board| b.epoch)
        .build();
    let (ledger, mut rx) = channel_ledger();
    let mut plan = PushPlan::new(spec, ledger.clone());
    plan.start();
    next_push(&mut rx).await;

    // WHEN: A mutation leaves the captured value untouched
    state.mutate(|b| b.counter += 1).await;

    // THEN: The ledger drops it without consuming a revision
    let ledger_ref = &ledger;
    assert!(
        eventually(|| async move {
            ledger_ref.stats().await.map(|s| s.deduplicated).ok() == Some(1)
        })
        .await,
        "Duplicate payload was never observed"
    );
    assert!(pushes(&drain(&mut rx)).is_empty());
    assert_eq!(ledger.current_revision(BOARD_STORE).await.ok(), Some(1));

    // WHEN: Only the epoch changes
    state.mutate(|b| b.epoch = 1).await;

    // THEN: The identical payload is delivered under the new epoch
    let frame = next_push(&mut rx).await;
    assert_eq!(frame.epoch, 1);
    assert_eq!(frame.revision, 2);
    plan.stop().await.expect("Failed to stop plan");
}

// ============================================================================
// Debounce
// ============================================================================

/// **VALUE**: Hot slices push once per mutation without coalescing.
#[tokio::test]
async fn given_hot_slice_when_mutated_five_times_then_five_pushes() {
    let state = StateRoot::new(Board::default());
    let (ledger, mut rx) = channel_ledger();
    let mut plan = PushPlan::new(counter_spec(Arc::clone(&state), PushLevel::Hot), ledger);
    plan.start();
    next_push(&mut rx).await;

    let mut payloads = Vec::new();
    for n in 1..=5 {
        state.mutate(|b| b.counter = n).await;
        payloads.push(envelope(&next_push(&mut rx).await)["payload"].clone());
    }

    assert_eq!(payloads, vec![1, 2, 3, 4, 5]);
    assert_eq!(state.mutation_count(), 5);
    plan.stop().await.expect("Failed to stop plan");
}

async fn pushes_after_burst(level: PushLevel, mutations: u64, spacing: Duration) -> usize {
    let state = StateRoot::new(Board::default());
    let (ledger, mut rx) = channel_ledger();
    let mut plan = PushPlan::new(counter_spec(Arc::clone(&state), level), ledger);
    plan.start();
    next_push(&mut rx).await;

    for n in 1..=mutations {
        state.mutate(|b| b.counter = n).await;
        sleep(spacing).await;
    }
    sleep(level.debounce() * 4 + Duration::from_millis(100)).await;
    plan.stop().await.expect("Failed to stop plan");

    let frames = drain(&mut rx);
    let delivered = pushes(&frames);
    let last = delivered.last().map(|frame| envelope(frame)["payload"].clone());
    assert_eq!(last, Some(mutations.into()), "Trailing edge must carry the final state");
    delivered.len()
}

#[tokio::test]
async fn given_warm_slice_when_five_mutations_within_window_then_fewer_pushes() {
    let delivered = pushes_after_burst(PushLevel::Warm, 5, Duration::from_millis(1)).await;

    assert!(delivered < 5, "warm slice pushed {delivered} times");
}

#[tokio::test]
async fn given_cold_slice_when_ten_mutations_within_window_then_fewer_pushes() {
    let delivered = pushes_after_burst(PushLevel::Cold, 10, Duration::from_millis(2)).await;

    assert!(delivered < 10, "cold slice pushed {delivered} times");
}

// ============================================================================
// Stop
// ============================================================================

/// **VALUE**: Nothing reaches the transport once `stop` has returned.
///
/// **BUG THIS CATCHES**: Would catch if a watcher that sampled before the stop
/// still delivered its payload afterwards.
#[tokio::test]
async fn given_mutations_racing_stop_when_stopped_then_no_later_push() {
    // GIVEN: A running plan and a writer mutating as fast as it can
    let state = StateRoot::new(Board::default());
    let (ledger, mut rx) = channel_ledger();
    let mut plan = PushPlan::new(counter_spec(Arc::clone(&state), PushLevel::Hot), ledger);
    plan.start();
    next_push(&mut rx).await;

    let writer_state = Arc::clone(&state);
    let writer = tokio::spawn(async move {
        for n in 1..=200 {
            writer_state.mutate(|b| b.counter = n).await;
            tokio::task::yield_now().await;
        }
    });

    // WHEN: The plan stops mid-burst
    sleep(Duration::from_millis(2)).await;
    plan.stop().await.expect("Failed to stop plan");
    drain(&mut rx);

    writer.await.expect("Writer task panicked");
    state.mutate(|b| b.counter = 1_000).await;
    sleep(Duration::from_millis(50)).await;

    // THEN: No push arrived after stop returned
    assert!(pushes(&drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn given_stopped_plan_when_restarted_then_pushes_resume_with_new_generation() {
    let state = StateRoot::new(Board::default());
    let (ledger, mut rx) = channel_ledger();
    let mut plan = PushPlan::new(counter_spec(Arc::clone(&state), PushLevel::Hot), ledger);
    plan.start();
    next_push(&mut rx).await;
    plan.stop().await.expect("Failed to stop plan");

    state.mutate(|b| b.counter = 3).await;
    let generation = plan.start();

    let frame = next_push(&mut rx).await;
    assert_eq!(generation, 2);
    assert_eq!(envelope(&frame)["payload"], 3);
    assert_eq!(frame.revision, 2);
    plan.stop().await.expect("Failed to stop plan");
}

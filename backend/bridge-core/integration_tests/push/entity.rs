use crate::helpers::{Board, CARDS_STORE, Card, channel_ledger, envelope, next_push};

use bridge_core::push::{EntitySlice, PlanSpec, PushPlan, StateRoot};

use common::wire::PushLevel;

use std::sync::Arc;

fn cards_spec(state: Arc<StateRoot<Board>>) -> PlanSpec<Board> {
    PlanSpec::builder("cards", state)
        .slice(EntitySlice::new(
            "cards",
            CARDS_STORE,
            PushLevel::Hot,
            |board: &Board| board.cards.clone(),
            |card: &Card| card.version,
            |key: &String| key.clone(),
        ))
        .build()
}

/// **VALUE**: A bulk load is one push; a single edit afterwards is a one-key delta.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Unchanged entities leak into `changed`
/// - An empty `removed` list is serialized instead of omitted
#[tokio::test]
async fn given_hundred_entities_when_one_is_edited_then_delta_has_one_key() {
    // GIVEN: An empty board, so the initial sample has nothing to push
    let state = StateRoot::new(Board::default());
    let (ledger, mut rx) = channel_ledger();
    let mut plan = PushPlan::new(cards_spec(Arc::clone(&state)), ledger);
    plan.start();

    // WHEN: 100 cards are loaded in one mutation
    state
        .mutate(|board| {
            for n in 0..100 {
                board.cards.insert(format!("card-{n}"), Card::new("draft"));
            }
        })
        .await;

    // THEN: One push carries all of them
    let bulk = envelope(&next_push(&mut rx).await);
    assert_eq!(bulk["__revision"], 1);
    assert_eq!(bulk["payload"]["changed"].as_object().map(|m| m.len()), Some(100));
    assert!(bulk["payload"].get("removed").is_none());

    // WHEN: One card is edited and its version bumped
    state
        .mutate(|board| {
            if let Some(card) = board.cards.get_mut("card-42") {
                card.text = "final".to_string();
                card.version += 1;
            }
        })
        .await;

    // THEN: Only that card is in the delta
    let edit = envelope(&next_push(&mut rx).await);
    let changed = edit["payload"]["changed"].as_object().expect("changed map");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed["card-42"]["text"], "final");
    assert!(edit["payload"].get("removed").is_none());
    plan.stop().await.expect("Failed to stop plan");
}

#[tokio::test]
async fn given_edit_without_version_bump_then_nothing_is_pushed() {
    let state = StateRoot::new(Board::default());
    state
        .mutate(|board| {
            board.cards.insert("a".to_string(), Card::new("one"));
            board.cards.insert("b".to_string(), Card::new("two"));
        })
        .await;
    let (ledger, mut rx) = channel_ledger();
    let mut plan = PushPlan::new(cards_spec(Arc::clone(&state)), ledger);
    plan.start();
    next_push(&mut rx).await;

    // Same version: not a change.
    state
        .mutate(|board| {
            if let Some(card) = board.cards.get_mut("a") {
                card.text = "silent".to_string();
            }
        })
        .await;
    state
        .mutate(|board| {
            board.cards.remove("b");
        })
        .await;

    let delta = envelope(&next_push(&mut rx).await);
    assert!(delta["payload"].get("changed").is_none());
    assert_eq!(delta["payload"]["removed"], serde_json::json!(["b"]));
    plan.stop().await.expect("Failed to stop plan");
}

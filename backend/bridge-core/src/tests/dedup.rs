use crate::push::ContentDedup;

use common::wire::{PushOp, StoreKey};

const SESSION: StoreKey = StoreKey::new("session");

#[test]
fn given_recorded_payload_when_same_epoch_and_bytes_then_is_duplicate() {
    let mut dedup = ContentDedup::new();
    dedup.record(SESSION, PushOp::Merge, 1, b"{\"a\":1}".to_vec());

    assert!(dedup.is_duplicate(SESSION, PushOp::Merge, 1, b"{\"a\":1}"));
    assert!(!dedup.is_duplicate(SESSION, PushOp::Merge, 1, b"{\"a\":2}"));
}

/// **VALUE**: An epoch change always bypasses dedup, even for identical bytes.
#[test]
fn given_recorded_payload_when_epoch_differs_then_is_not_duplicate() {
    let mut dedup = ContentDedup::new();
    dedup.record(SESSION, PushOp::Merge, 1, b"{}".to_vec());

    assert!(!dedup.is_duplicate(SESSION, PushOp::Merge, 2, b"{}"));
}

#[test]
fn given_recorded_payload_when_op_differs_then_is_not_duplicate() {
    let mut dedup = ContentDedup::new();
    dedup.record(SESSION, PushOp::Merge, 1, b"{}".to_vec());

    assert!(!dedup.is_duplicate(SESSION, PushOp::Replace, 1, b"{}"));
}

#[test]
fn given_many_records_on_one_channel_then_cache_holds_one_entry() {
    let mut dedup = ContentDedup::new();
    for epoch in 0..10 {
        dedup.record(SESSION, PushOp::Merge, epoch, vec![epoch as u8]);
    }

    assert_eq!(dedup.len(), 1);

    dedup.clear();
    assert!(dedup.is_empty());
}

use crate::push::RevisionClock;

use common::wire::StoreKey;

const SESSION: StoreKey = StoreKey::new("session");
const DOCUMENTS: StoreKey = StoreKey::new("documents");

/// **VALUE**: Revisions start at 1 and strictly increase per store.
#[test]
fn given_fresh_clock_when_next_called_then_starts_at_one_and_increases() {
    let mut clock = RevisionClock::new();

    let revisions: Vec<u64> = (0..5).map(|_| clock.next(SESSION)).collect();

    assert_eq!(revisions, vec![1, 2, 3, 4, 5]);
    assert_eq!(clock.current(SESSION), 5);
}

#[test]
fn given_two_stores_when_interleaved_then_counters_are_independent() {
    let mut clock = RevisionClock::new();

    assert_eq!(clock.next(SESSION), 1);
    assert_eq!(clock.next(DOCUMENTS), 1);
    assert_eq!(clock.next(SESSION), 2);
    assert_eq!(clock.current(DOCUMENTS), 1);
    assert_eq!(clock.current(StoreKey::new("unused")), 0);
}

use common::wire::StoreKey;

use std::collections::HashMap;

/// Per-store revision counters.
///
/// Owned by the push ledger actor, which is the only writer, so `next` takes
/// `&mut self` and needs no synchronisation of its own.
#[derive(Debug, Default)]
pub struct RevisionClock {
    counters: HashMap<StoreKey, u64>,
}

impl RevisionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns 1 on the first call for `store`, then strictly increasing values.
    pub fn next(&mut self, store: StoreKey) -> u64 {
        let counter = self.counters.entry(store).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Last revision handed out for `store`, or 0 if none.
    pub(crate) fn current(&self, store: StoreKey) -> u64 {
        self.counters.get(&store).copied().unwrap_or(0)
    }
}

use common::wire::{PushOp, StoreKey};

use std::collections::HashMap;

/// Last delivered `(epoch, bytes)` per `(store, op)`.
///
/// Holds at most one entry per channel/op pair; a new delivery overwrites the
/// previous one.
#[derive(Debug, Default)]
pub struct ContentDedup {
    entries: HashMap<(StoreKey, PushOp), (u64, Vec<u8>)>,
}

impl ContentDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the payload equals the last delivery on the same epoch.
    pub fn is_duplicate(&self, store: StoreKey, op: PushOp, epoch: u64, bytes: &[u8]) -> bool {
        self.entries
            .get(&(store, op))
            .is_some_and(|(last_epoch, last_bytes)| *last_epoch == epoch && last_bytes == bytes)
    }

    pub fn record(&mut self, store: StoreKey, op: PushOp, epoch: u64, bytes: Vec<u8>) {
        self.entries.insert((store, op), (epoch, bytes));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Observable container for native state.
//!
//! Every mutation made through [`StateRoot::mutate`] publishes a change
//! notification on a broadcast channel. Watchers subscribe to that channel
//! and re-read the state; they never receive the state itself through it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, broadcast};

const CHANGE_BUFFER_SIZE: usize = 64;

pub struct StateRoot<S> {
    state: RwLock<S>,
    changes: broadcast::Sender<u64>,
    mutations: AtomicU64,
}

impl<S> StateRoot<S>
where
    S: Send + Sync + 'static,
{
    pub fn new(initial: S) -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER_SIZE);
        Arc::new(Self {
            state: RwLock::new(initial),
            changes,
            mutations: AtomicU64::new(0),
        })
    }

    /// Run `read` against the current state under a shared lock.
    pub async fn read<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        let guard = self.state.read().await;
        read(&guard)
    }

    /// Mutate the state and notify every subscriber once.
    pub async fn mutate<R>(&self, mutate: impl FnOnce(&mut S) -> R) -> R {
        let result = {
            let mut guard = self.state.write().await;
            mutate(&mut guard)
        };

        let sequence = self.mutations.fetch_add(1, Ordering::SeqCst) + 1;
        // No subscribers is fine: nothing is watching yet.
        let _ = self.changes.send(sequence);
        result
    }

    /// Subscribe to change notifications. Each item is the mutation sequence number.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }
}

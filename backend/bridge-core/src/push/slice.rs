//! Snapshot slices.
//!
//! A [`Slice`] captures one serializable value from the state root. Each
//! sampling produces the full value; unchanged values are filtered out later
//! by the ledger's content dedup.

use crate::error::push::PushError;

use common::wire::{PushLevel, PushOp, StoreKey};

use std::sync::Arc;

use serde::Serialize;
use serde_json::value::{RawValue, to_raw_value};

/// Static description shared by every kind of slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceMeta {
    pub name: Arc<str>,
    pub store: StoreKey,
    pub level: PushLevel,
    pub op: PushOp,
}

/// Produces a fresh [`Sampler`] for each watcher a plan spawns.
pub trait SliceSource<S>: Send + Sync {
    fn meta(&self) -> &SliceMeta;

    fn sampler(&self) -> Box<dyn Sampler<S>>;
}

/// Per-watcher sampling state.
pub trait Sampler<S>: Send {
    /// Serialized payload for the current state, or `None` when there is nothing to push.
    fn sample(&mut self, state: &S) -> Result<Option<Box<RawValue>>, PushError>;
}

type CaptureFn<S> = dyn Fn(&S) -> Result<Box<RawValue>, serde_json::Error> + Send + Sync;

pub struct Slice<S> {
    meta: SliceMeta,
    capture: Arc<CaptureFn<S>>,
}

impl<S> Slice<S>
where
    S: 'static,
{
    pub fn new<T, F>(name: &str, store: StoreKey, level: PushLevel, capture: F) -> Self
    where
        T: Serialize,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        Self {
            meta: SliceMeta {
                name: Arc::from(name),
                store,
                level,
                op: PushOp::default(),
            },
            capture: Arc::new(move |state: &S| to_raw_value(&capture(state))),
        }
    }

    pub fn with_op(mut self, op: PushOp) -> Self {
        self.meta.op = op;
        self
    }
}

impl<S> SliceSource<S> for Slice<S>
where
    S: 'static,
{
    fn meta(&self) -> &SliceMeta {
        &self.meta
    }

    fn sampler(&self) -> Box<dyn Sampler<S>> {
        Box::new(SnapshotSampler {
            capture: Arc::clone(&self.capture),
        })
    }
}

struct SnapshotSampler<S> {
    capture: Arc<CaptureFn<S>>,
}

impl<S> Sampler<S> for SnapshotSampler<S> {
    fn sample(&mut self, state: &S) -> Result<Option<Box<RawValue>>, PushError> {
        Ok(Some((self.capture)(state)?))
    }
}

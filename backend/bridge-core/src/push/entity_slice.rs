//! Keyed, versioned entity slices.
//!
//! Change detection is driven entirely by the caller's version accessor: an
//! entity whose fields change while its version stays put is not pushed.

use crate::error::push::PushError;
use crate::push::slice::{Sampler, SliceMeta, SliceSource};

use common::wire::{EntityDelta, PushLevel, PushOp, StoreKey};

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use serde::Serialize;
use serde_json::value::{RawValue, to_raw_value};

/// Last pushed `key -> version` table for one watcher.
#[derive(Debug, Default)]
pub struct EntityTracker {
    versions: HashMap<String, u64>,
}

impl EntityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `current` against the recorded table, then record `current`.
    ///
    /// Entities that are new or carry a strictly greater version land in
    /// `changed`; keys that disappeared land in `removed`.
    pub fn diff<E>(
        &mut self,
        current: Vec<(String, E)>,
        version: impl Fn(&E) -> u64,
    ) -> EntityDelta<E> {
        let mut next_versions = HashMap::with_capacity(current.len());
        let mut changed = BTreeMap::new();

        for (key, entity) in current {
            let current_version = version(&entity);
            let is_newer = self
                .versions
                .get(&key)
                .is_none_or(|recorded| current_version > *recorded);

            next_versions.insert(key.clone(), current_version);
            if is_newer {
                changed.insert(key, entity);
            }
        }

        let removed = self
            .versions
            .keys()
            .filter(|key| !next_versions.contains_key(*key))
            .cloned()
            .collect();

        self.versions = next_versions;
        EntityDelta::new(changed, removed)
    }

    pub(crate) fn len(&self) -> usize {
        self.versions.len()
    }
}

type EntityCaptureFn<S, K, E> = dyn Fn(&S) -> HashMap<K, E> + Send + Sync;

pub struct EntitySlice<S, K, E> {
    meta: SliceMeta,
    capture: Arc<EntityCaptureFn<S, K, E>>,
    version: Arc<dyn Fn(&E) -> u64 + Send + Sync>,
    key_to_string: Arc<dyn Fn(&K) -> String + Send + Sync>,
}

impl<S, K, E> EntitySlice<S, K, E>
where
    S: 'static,
    K: Eq + Hash + 'static,
    E: Serialize + 'static,
{
    pub fn new<C, V, KS>(
        name: &str,
        store: StoreKey,
        level: PushLevel,
        capture: C,
        version: V,
        key_to_string: KS,
    ) -> Self
    where
        C: Fn(&S) -> HashMap<K, E> + Send + Sync + 'static,
        V: Fn(&E) -> u64 + Send + Sync + 'static,
        KS: Fn(&K) -> String + Send + Sync + 'static,
    {
        Self {
            meta: SliceMeta {
                name: Arc::from(name),
                store,
                level,
                op: PushOp::default(),
            },
            capture: Arc::new(capture),
            version: Arc::new(version),
            key_to_string: Arc::new(key_to_string),
        }
    }

    pub fn with_op(mut self, op: PushOp) -> Self {
        self.meta.op = op;
        self
    }
}

impl<S, K, E> SliceSource<S> for EntitySlice<S, K, E>
where
    S: 'static,
    K: Eq + Hash + 'static,
    E: Serialize + 'static,
{
    fn meta(&self) -> &SliceMeta {
        &self.meta
    }

    fn sampler(&self) -> Box<dyn Sampler<S>> {
        Box::new(EntitySampler {
            capture: Arc::clone(&self.capture),
            version: Arc::clone(&self.version),
            key_to_string: Arc::clone(&self.key_to_string),
            tracker: EntityTracker::new(),
        })
    }
}

struct EntitySampler<S, K, E> {
    capture: Arc<EntityCaptureFn<S, K, E>>,
    version: Arc<dyn Fn(&E) -> u64 + Send + Sync>,
    key_to_string: Arc<dyn Fn(&K) -> String + Send + Sync>,
    tracker: EntityTracker,
}

impl<S, K, E> Sampler<S> for EntitySampler<S, K, E>
where
    E: Serialize,
{
    fn sample(&mut self, state: &S) -> Result<Option<Box<RawValue>>, PushError> {
        let current = (self.capture)(state)
            .into_iter()
            .map(|(key, entity)| ((self.key_to_string)(&key), entity))
            .collect();

        let delta = self.tracker.diff(current, |entity| (self.version)(entity));
        if delta.is_empty() {
            return Ok(None);
        }

        Ok(Some(to_raw_value(&delta)?))
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Change set for a keyed entity collection.
///
/// Keys are kept sorted so equal deltas always serialize to equal bytes.
/// Absent fields are omitted from the encoding rather than written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDelta<E> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed: Option<BTreeMap<String, E>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<Vec<String>>,
}

impl<E> EntityDelta<E> {
    /// Builds a delta, collapsing empty collections to absent fields.
    pub fn new(changed: BTreeMap<String, E>, mut removed: Vec<String>) -> Self {
        removed.sort();
        Self {
            changed: (!changed.is_empty()).then_some(changed),
            removed: (!removed.is_empty()).then_some(removed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed.as_ref().is_none_or(BTreeMap::is_empty)
            && self.removed.as_ref().is_none_or(Vec::is_empty)
    }

    pub fn changed_len(&self) -> usize {
        self.changed.as_ref().map_or(0, BTreeMap::len)
    }

    pub fn removed_len(&self) -> usize {
        self.removed.as_ref().map_or(0, Vec::len)
    }
}

impl<E> Default for EntityDelta<E> {
    fn default() -> Self {
        Self {
            changed: None,
            removed: None,
        }
    }
}

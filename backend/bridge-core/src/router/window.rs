use std::collections::{HashSet, VecDeque};

/// Bounded ring of recently seen command ids.
#[derive(Debug)]
pub struct CommandWindow {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl CommandWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    pub(crate) fn contains(&self, command_id: &str) -> bool {
        self.seen.contains(command_id)
    }

    /// Record `command_id`, evicting the oldest entry when full.
    ///
    /// Returns `false` if the id was already present.
    pub fn record(&mut self, command_id: &str) -> bool {
        if self.seen.contains(command_id) {
            return false;
        }

        if self.order.len() == self.capacity
            && let Some(evicted) = self.order.pop_front()
        {
            self.seen.remove(&evicted);
        }

        self.order.push_back(command_id.to_string());
        self.seen.insert(command_id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

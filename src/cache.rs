//! Bounded, deduplicated, insertion-ordered working set of pins.

use std::collections::{HashSet, VecDeque};

use crate::pin::{Pin, PinId};

/// Maximum number of pins held in memory.
pub const MAX_CACHE_SIZE: usize = 10_000;

/// The in-memory working set consulted before any persistence or network
/// action.
///
/// Ordered by insertion, oldest first. When the capacity is exceeded the
/// oldest entries are evicted, regardless of recency of use. A hash index of
/// ids is kept alongside the queue so membership checks and batch merges stay
/// linear.
#[derive(Debug)]
pub struct PinCache {
    pins: VecDeque<Pin>,
    ids: HashSet<PinId>,
    capacity: usize,
}

impl PinCache {
    /// Create an empty cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(MAX_CACHE_SIZE)
    }

    /// Create an empty cache with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pins: VecDeque::new(),
            ids: HashSet::new(),
            capacity,
        }
    }

    /// Whether a pin with this id is present.
    pub fn contains(&self, id: &PinId) -> bool {
        self.ids.contains(id)
    }

    /// Append a pin, evicting from the front if the capacity is exceeded.
    ///
    /// The caller must check [`Self::contains`] first; appending a duplicate
    /// id is a caller bug.
    pub fn insert(&mut self, pin: Pin) {
        debug_assert!(!self.ids.contains(&pin.id), "duplicate pin insert");
        self.ids.insert(pin.id.clone());
        self.pins.push_back(pin);
        self.trim();
    }

    /// Merge a batch of pins, skipping ids that are already present.
    ///
    /// Survivors are appended in batch order and returned; they are the set
    /// the caller still has to persist. Filtering goes through the id index,
    /// so merging a large snapshot stays linear in the batch size.
    pub fn merge_batch(&mut self, pins: Vec<Pin>) -> Vec<Pin> {
        let mut added = Vec::new();
        for pin in pins {
            if self.ids.contains(&pin.id) {
                continue;
            }
            self.ids.insert(pin.id.clone());
            self.pins.push_back(pin.clone());
            added.push(pin);
        }
        self.trim();
        added
    }

    /// The current contents in insertion order.
    pub fn snapshot(&self) -> Vec<Pin> {
        self.pins.iter().cloned().collect()
    }

    /// Number of pins held.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    fn trim(&mut self) {
        while self.pins.len() > self.capacity {
            if let Some(evicted) = self.pins.pop_front() {
                self.ids.remove(&evicted.id);
            }
        }
    }
}

impl Default for PinCache {
    fn default() -> Self {
        Self::new()
    }
}

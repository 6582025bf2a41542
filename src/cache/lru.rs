//! LRU Tracker Module
//!
//! Orders keys by last access for LRU eviction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

/// Position in recency order: access time, then a per-tracker sequence
/// number that separates accesses landing in the same millisecond.
type Stamp = (i64, u64);

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Oldest stamp = least recently used. Ordering is total, so eviction is
/// deterministic even when timestamps tie.
#[derive(Debug, Default)]
pub struct LruTracker {
    order: BTreeMap<Stamp, String>,
    positions: HashMap<String, Stamp>,
    next_seq: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as accessed at `at`, inserting it if new.
    pub fn touch(&mut self, key: &str, at: DateTime<Utc>) {
        self.remove(key);
        let stamp = (at.timestamp_millis(), self.next_seq);
        self.next_seq += 1;
        self.order.insert(stamp, key.to_string());
        self.positions.insert(key.to_string(), stamp);
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(stamp) = self.positions.remove(key) {
            self.order.remove(&stamp);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.positions.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.values().next()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.positions.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }
}

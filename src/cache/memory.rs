//! Memory Cache Module
//!
//! Bounded in-process tier: HashMap storage with LRU eviction, lazy TTL
//! expiration and incremental size accounting.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::cache::entry::{resolve_expiry, CacheEntry, EntryInfo, Metadata};
use crate::cache::size::{estimated_size, EstimateSize};
use crate::cache::stats::{ratio, CacheCounters, MemoryStats};
use crate::cache::LruTracker;
use crate::error::{CacheError, Result};

// == Memory Store ==
/// Everything guarded by the memory tier's lock.
#[derive(Debug)]
struct MemoryStore<V> {
    entries: HashMap<String, CacheEntry<V>>,
    lru: LruTracker,
    /// Running sum of `size_bytes` over `entries`
    total_size_bytes: u64,
    counters: CacheCounters,
}

impl<V> MemoryStore<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            total_size_bytes: 0,
            counters: CacheCounters::new(),
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.total_size_bytes -= entry.info.size_bytes;
        Some(entry)
    }

    /// Drops least recently used entries until both limits hold.
    fn evict(&mut self, max_entries: usize, max_size_bytes: u64) {
        while self.entries.len() > max_entries || self.total_size_bytes > max_size_bytes {
            let Some(key) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.total_size_bytes -= entry.info.size_bytes;
                self.counters.record_eviction();
                debug!(key = %key, size = entry.info.size_bytes, "memory cache evicted entry");
            }
        }
    }

    fn expire(&mut self, key: &str) {
        if self.remove(key).is_some() {
            self.counters.record_expirations(1);
            debug!(key = %key, "memory cache entry expired");
        }
    }
}

// == Memory Cache ==
/// Thread-safe in-memory cache tier.
///
/// All state sits behind one mutex held for each public call, so size
/// accounting, recency updates and eviction are never observed half-done.
/// Values are cloned out on `get`; callers never alias cache internals.
#[derive(Debug)]
pub struct MemoryCache<V> {
    store: Mutex<MemoryStore<V>>,
    max_entries: usize,
    max_size_bytes: u64,
    default_ttl: Option<Duration>,
}

impl<V> MemoryCache<V>
where
    V: Clone + EstimateSize,
{
    // == Constructor ==
    /// Creates a new MemoryCache.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries, must be non-zero
    /// * `max_size_bytes` - Maximum estimated bytes, must be non-zero
    /// * `default_ttl` - TTL for entries set without one; None or zero = never
    pub fn new(
        max_entries: usize,
        max_size_bytes: u64,
        default_ttl: Option<Duration>,
    ) -> Result<Self> {
        if max_entries == 0 || max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "memory cache limits must be non-zero (max_entries={}, max_size_bytes={})",
                max_entries, max_size_bytes
            )));
        }

        Ok(Self {
            store: Mutex::new(MemoryStore::new()),
            max_entries,
            max_size_bytes,
            default_ttl,
        })
    }

    // == Get ==
    /// Retrieves a copy of the value stored under `key`.
    ///
    /// A hit refreshes recency and bumps the access count. An expired entry
    /// is removed by the lookup that finds it and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        let mut store = self.store.lock();

        match store.entries.get(key).map(|e| e.info.is_expired_at(now)) {
            None => {
                store.counters.record_miss();
                return None;
            }
            Some(true) => {
                store.expire(key);
                store.counters.record_miss();
                return None;
            }
            Some(false) => {}
        }

        let value = {
            let entry = store.entries.get_mut(key)?;
            entry.info.touch(now);
            entry.value.clone()
        };
        store.lru.touch(key, now);
        store.counters.record_hit();
        Some(value)
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any existing entry.
    ///
    /// Returns false when the value's estimated size exceeds the cache's
    /// byte limit; such values are never cached. After insertion, least
    /// recently used entries are evicted until both limits hold again.
    pub fn set(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        metadata: Option<Metadata>,
    ) -> bool {
        let size_bytes = estimated_size(&value);
        if size_bytes > self.max_size_bytes {
            debug!(
                key = %key,
                size = size_bytes,
                limit = self.max_size_bytes,
                "value larger than memory cache, not caching"
            );
            return false;
        }

        let now = Utc::now();
        let info = EntryInfo::new(
            key.to_string(),
            size_bytes,
            now,
            resolve_expiry(now, ttl, self.default_ttl),
            metadata.unwrap_or_default(),
        );

        let mut store = self.store.lock();
        store.remove(key);
        store
            .entries
            .insert(key.to_string(), CacheEntry { info, value });
        store.total_size_bytes += size_bytes;
        store.lru.touch(key, now);
        store.evict(self.max_entries, self.max_size_bytes);
        true
    }

    // == Delete ==
    /// Removes an entry by key. Returns true if something was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.store.lock().remove(key).is_some()
    }

    // == Clear ==
    /// Removes every entry and resets the size counter.
    pub fn clear(&self) {
        let mut store = self.store.lock();
        store.entries.clear();
        store.lru.clear();
        store.total_size_bytes = 0;
    }

    // == Contains ==
    /// True if `key` is present and unexpired. Does not affect recency.
    pub fn contains(&self, key: &str) -> bool {
        let now = Utc::now();
        self.store
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.info.is_expired_at(now))
    }

    /// Bookkeeping for `key` without counting as an access.
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        self.store.lock().entries.get(key).map(|e| e.info.clone())
    }

    /// Snapshot of the keys currently held, expired ones included.
    pub fn keys(&self) -> Vec<String> {
        self.store.lock().entries.keys().cloned().collect()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut store = self.store.lock();
        let expired: Vec<String> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.info.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            store.expire(key);
        }
        expired.len()
    }

    // == Stats ==
    /// Returns current memory tier statistics.
    pub fn stats(&self) -> MemoryStats {
        let store = self.store.lock();
        let entry_count = store.entries.len();
        MemoryStats {
            entry_count,
            total_size_bytes: store.total_size_bytes,
            max_entries: self.max_entries,
            max_size_bytes: self.max_size_bytes,
            entry_utilization: ratio(entry_count as u64, self.max_entries as u64),
            size_utilization: ratio(store.total_size_bytes, self.max_size_bytes),
            counters: store.counters,
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Recomputes the size sum from scratch. Test-only cross-check of the
    /// incremental counter.
    #[cfg(test)]
    pub(crate) fn recomputed_size(&self) -> u64 {
        self.store
            .lock()
            .entries
            .values()
            .map(|e| e.info.size_bytes)
            .sum()
    }
}

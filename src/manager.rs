//! Cache Manager
//!
//! Puts the memory and disk tiers behind one keyed API: derives keys from
//! logical operation descriptors, routes writes by estimated size, promotes
//! disk hits into memory and invalidates whole sessions.
//!
//! Nothing past construction returns an error. Disk failures are logged and
//! treated as "not cached", so a cache fault never aborts the caller's work.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{
    estimated_size, DiskCache, EntryInfo, EstimateSize, MemoryCache, TieredStats,
};
use crate::config::Config;
use crate::error::Result;
use crate::keys::{derive_key, key_belongs_to_session};
use crate::models::{Payload, ValueMap};

/// Where `CacheManager::set` put a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Memory,
    Disk,
}

// == Cache Manager ==
/// Two-tier cache shared by every caller that wants caching.
///
/// Build one at startup and hand out `Arc<CacheManager>` clones; there is no
/// global instance.
#[derive(Debug)]
pub struct CacheManager<V = Payload> {
    memory: MemoryCache<V>,
    disk: DiskCache,
    tier_threshold_bytes: u64,
    promotion_ttl: Option<Duration>,
}

impl<V> CacheManager<V>
where
    V: Clone + EstimateSize + Serialize + DeserializeOwned,
{
    // == Constructor ==
    /// Builds both tiers from `config`. Fails fast on invalid limits or an
    /// unusable disk directory.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let memory = MemoryCache::new(
            config.memory_max_entries,
            config.memory_max_size_bytes,
            config.default_ttl,
        )?;
        let disk = DiskCache::open(
            &config.disk_dir,
            config.disk_max_size_bytes,
            config.default_ttl,
        )?;

        info!(
            memory_max_entries = config.memory_max_entries,
            memory_max_size_bytes = config.memory_max_size_bytes,
            disk_max_size_bytes = config.disk_max_size_bytes,
            tier_threshold_bytes = config.tier_threshold_bytes,
            "cache manager initialized"
        );

        Ok(Self::from_parts(
            memory,
            disk,
            config.tier_threshold_bytes,
            config.promotion_ttl,
        ))
    }

    /// Assembles a manager from already built tiers.
    pub fn from_parts(
        memory: MemoryCache<V>,
        disk: DiskCache,
        tier_threshold_bytes: u64,
        promotion_ttl: Option<Duration>,
    ) -> Self {
        Self {
            memory,
            disk,
            tier_threshold_bytes,
            promotion_ttl,
        }
    }

    // == Get ==
    /// Looks the value up in memory, then on disk.
    ///
    /// A disk hit is copied into memory before it is returned, so repeated
    /// reads of hot disk entries stay in memory. The copy lives for the
    /// promotion TTL, capped at what remains of the disk entry's lifetime.
    pub fn get(
        &self,
        kind: &str,
        session_id: &str,
        operation: &str,
        params: Option<&ValueMap>,
    ) -> Option<V> {
        let key = derive_key(kind, session_id, operation, params);

        if let Some(value) = self.memory.get(&key) {
            debug!(key = %key, "memory cache hit");
            return Some(value);
        }

        match self.disk.get_with_info::<V>(&key) {
            Ok(Some((value, info))) => {
                debug!(key = %key, "disk cache hit, promoting to memory");
                let ttl = self.promoted_ttl(&info);
                self.memory.set(&key, value.clone(), ttl, None);
                Some(value)
            }
            Ok(None) => {
                debug!(key = %key, "cache miss");
                None
            }
            Err(err) => {
                warn!(key = %key, error = %err, "disk cache read failed, treating as miss");
                None
            }
        }
    }

    // == Set ==
    /// Stores `value`, choosing the tier once from its estimated size.
    ///
    /// Values estimated below the tier threshold go to memory, the rest to
    /// disk. Any copy of the key held by the other tier is dropped, and so is
    /// the old copy in the target tier when the write is rejected, so a later
    /// `get` never sees a previous value. Returns the tier that accepted the
    /// value, or None if it was not cached (too large for its tier, or the
    /// disk write failed).
    pub fn set(
        &self,
        kind: &str,
        session_id: &str,
        operation: &str,
        value: V,
        params: Option<&ValueMap>,
        ttl: Option<Duration>,
    ) -> Option<Tier> {
        let key = derive_key(kind, session_id, operation, params);
        let size = estimated_size(&value);

        if size < self.tier_threshold_bytes {
            self.drop_from_disk(&key);
            let stored = self.memory.set(&key, value, ttl, None);
            if !stored {
                self.memory.delete(&key);
            }
            return stored.then_some(Tier::Memory);
        }

        let tier = match self.disk.set(&key, &value, ttl, None) {
            Ok(true) => Some(Tier::Disk),
            Ok(false) => {
                self.drop_from_disk(&key);
                None
            }
            Err(err) => {
                warn!(key = %key, size, error = %err, "disk cache write failed, value not cached");
                self.drop_from_disk(&key);
                None
            }
        };
        // Also drops a copy promoted while the disk write ran
        self.memory.delete(&key);
        tier
    }

    fn drop_from_disk(&self, key: &str) {
        if let Err(err) = self.disk.delete(key) {
            warn!(key = %key, error = %err, "failed to drop stale disk cache entry");
        }
    }

    fn promoted_ttl(&self, info: &EntryInfo) -> Option<Duration> {
        match info.ttl_remaining() {
            Some(remaining) => Some(
                self.promotion_ttl
                    .map_or(remaining, |ttl| ttl.min(remaining)),
            ),
            None => self.promotion_ttl,
        }
    }

    // == Invalidate Session ==
    /// Removes every entry, in both tiers, whose key was derived for
    /// `session_id`. Scans all keys; cost is linear in cache size.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_session(&self, session_id: &str) -> usize {
        let mut removed = 0;

        for key in self.memory.keys() {
            if key_belongs_to_session(&key, session_id) && self.memory.delete(&key) {
                removed += 1;
            }
        }

        match self.disk.keys() {
            Ok(keys) => {
                for key in keys.iter().filter(|k| key_belongs_to_session(k, session_id)) {
                    match self.disk.delete(key) {
                        Ok(true) => removed += 1,
                        Ok(false) => {}
                        Err(err) => {
                            warn!(key = %key, error = %err, "failed to invalidate disk entry")
                        }
                    }
                }
            }
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "failed to list disk cache keys");
            }
        }

        info!(session_id = %session_id, removed, "session invalidated");
        removed
    }

    // == Stats ==
    /// Statistics of both tiers.
    pub fn stats(&self) -> TieredStats {
        let disk = match self.disk.stats() {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!(error = %err, "failed to read disk cache stats");
                None
            }
        };
        TieredStats {
            memory: self.memory.stats(),
            disk,
        }
    }

    // == Clear All ==
    /// Empties both tiers.
    pub fn clear_all(&self) {
        self.memory.clear();
        if let Err(err) = self.disk.clear() {
            warn!(error = %err, "failed to clear disk cache");
        }
        info!("all cache tiers cleared");
    }

    pub fn memory(&self) -> &MemoryCache<V> {
        &self.memory
    }

    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    pub fn tier_threshold_bytes(&self) -> u64 {
        self.tier_threshold_bytes
    }
}

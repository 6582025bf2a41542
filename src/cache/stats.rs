//! Cache Statistics Module
//!
//! Performance counters and point-in-time snapshots for both tiers.

use std::path::PathBuf;

use serde::Serialize;

// == Counters ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed retrievals (absent, expired or unreadable)
    pub misses: u64,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expirations: u64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: u64) {
        self.expirations += count;
    }
}

/// `used / limit`, or 0.0 for a zero limit.
pub fn ratio(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        0.0
    } else {
        used as f64 / limit as f64
    }
}

// == Memory Stats ==
/// Snapshot of the memory tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub entry_count: usize,
    pub total_size_bytes: u64,
    pub max_entries: usize,
    pub max_size_bytes: u64,
    /// entry_count / max_entries
    pub entry_utilization: f64,
    /// total_size_bytes / max_size_bytes
    pub size_utilization: f64,
    pub counters: CacheCounters,
}

// == Disk Stats ==
/// Snapshot of the disk tier. Sizes come from the metadata index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskStats {
    pub entry_count: usize,
    /// Blob files present in the cache root
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
    pub size_utilization: f64,
    pub cache_dir: PathBuf,
    pub counters: CacheCounters,
}

// == Combined Stats ==
/// Both tiers side by side, as reported by `CacheManager::stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieredStats {
    pub memory: MemoryStats,
    /// None when the disk index could not be read
    pub disk: Option<DiskStats>,
}

//! Configuration Module
//!
//! Capacity, TTL and tiering parameters consumed when the cache is built.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CacheError, Result};

const MIB: u64 = 1024 * 1024;

/// Cache configuration parameters.
///
/// The library only ever consumes a `Config` value. `from_env` is a
/// convenience for the bundled binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries held in memory
    pub memory_max_entries: usize,
    /// Maximum estimated bytes held in memory
    pub memory_max_size_bytes: u64,
    /// Maximum bytes tracked by the disk index
    pub disk_max_size_bytes: u64,
    /// Root directory of the disk tier
    pub disk_dir: PathBuf,
    /// TTL applied when `set` is called without one; None = never expires
    pub default_ttl: Option<Duration>,
    /// TTL given to values promoted from disk into memory
    pub promotion_ttl: Option<Duration>,
    /// Payloads estimated below this size go to memory, the rest to disk
    pub tier_threshold_bytes: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MEMORY_MAX_ENTRIES` - Memory entry limit (default: 1000)
    /// - `CACHE_MEMORY_MAX_BYTES` - Memory byte limit (default: 512 MiB)
    /// - `CACHE_DISK_MAX_BYTES` - Disk byte limit (default: 2 GiB)
    /// - `CACHE_DIR` - Disk tier root (default: `cache`)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds, 0 disables (default: 3600)
    /// - `CACHE_PROMOTION_TTL` - Promotion TTL in seconds, 0 disables (default: 3600)
    /// - `CACHE_TIER_THRESHOLD_BYTES` - Memory/disk split (default: 50 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            memory_max_entries: env_parse("CACHE_MEMORY_MAX_ENTRIES")
                .unwrap_or(defaults.memory_max_entries),
            memory_max_size_bytes: env_parse("CACHE_MEMORY_MAX_BYTES")
                .unwrap_or(defaults.memory_max_size_bytes),
            disk_max_size_bytes: env_parse("CACHE_DISK_MAX_BYTES")
                .unwrap_or(defaults.disk_max_size_bytes),
            disk_dir: env::var("CACHE_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.disk_dir),
            default_ttl: env_ttl("CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            promotion_ttl: env_ttl("CACHE_PROMOTION_TTL").unwrap_or(defaults.promotion_ttl),
            tier_threshold_bytes: env_parse("CACHE_TIER_THRESHOLD_BYTES")
                .unwrap_or(defaults.tier_threshold_bytes),
        }
    }

    /// Rejects capacities that would make the cache unusable.
    pub fn validate(&self) -> Result<()> {
        if self.memory_max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "memory_max_entries must be greater than zero".to_string(),
            ));
        }
        if self.memory_max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "memory_max_size_bytes must be greater than zero".to_string(),
            ));
        }
        if self.disk_max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "disk_max_size_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_max_entries: 1000,
            memory_max_size_bytes: 512 * MIB,
            disk_max_size_bytes: 2048 * MIB,
            disk_dir: PathBuf::from("cache"),
            default_ttl: Some(Duration::from_secs(3600)),
            promotion_ttl: Some(Duration::from_secs(3600)),
            tier_threshold_bytes: 50 * MIB,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Outer None = unset or unparsable, inner None = explicitly disabled.
fn env_ttl(name: &str) -> Option<Option<Duration>> {
    env_parse::<u64>(name).map(|secs| (secs > 0).then(|| Duration::from_secs(secs)))
}

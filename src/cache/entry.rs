//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied metadata. Never interpreted by the stores.
pub type Metadata = BTreeMap<String, serde_json::Value>;

// == Entry Info ==
/// Bookkeeping shared by both tiers: everything about an entry except its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Key, unique within a store
    pub key: String,
    /// Estimated (memory) or encoded (disk) size
    pub size_bytes: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last successful read, or creation time
    pub last_accessed: DateTime<Utc>,
    /// Starts at 1, incremented on every successful read
    pub access_count: u64,
    /// Expiration timestamp, None = no expiration
    pub expires_at: Option<DateTime<Utc>>,
    /// Opaque caller metadata
    pub metadata: Metadata,
}

impl EntryInfo {
    // == Constructor ==
    /// Creates bookkeeping for a freshly written entry.
    pub fn new(
        key: String,
        size_bytes: u64,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        metadata: Metadata,
    ) -> Self {
        Self {
            key,
            size_bytes,
            created_at: now,
            last_accessed: now,
            access_count: 1,
            expires_at,
            metadata,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now >= expires_at`, so a
    /// zero TTL produces an entry that misses on the very next read.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks if the entry has expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    // == Record Access ==
    /// Marks a successful read.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires| {
            (expires - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }
}

// == Cache Entry ==
/// A value held by the memory tier together with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub info: EntryInfo,
    pub value: V,
}

// == Utility Functions ==
/// Resolves the expiration of a new entry.
///
/// An explicit `ttl` wins, including zero. Otherwise a non-zero `default_ttl`
/// applies. Otherwise the entry never expires. A TTL too large to represent
/// is treated as "never".
pub fn resolve_expiry(
    now: DateTime<Utc>,
    ttl: Option<Duration>,
    default_ttl: Option<Duration>,
) -> Option<DateTime<Utc>> {
    let ttl = ttl.or_else(|| default_ttl.filter(|d| !d.is_zero()))?;
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
}

/// Unix milliseconds, as stored in the disk index.
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Inverse of [`to_millis`]; out-of-range values clamp to the epoch.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
}

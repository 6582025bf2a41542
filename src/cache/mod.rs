//! Cache Module
//!
//! The two storage tiers: a bounded in-memory cache with TTL expiration and
//! LRU eviction, and a persistent disk cache indexed by SQLite.

mod disk;
mod entry;
mod index;
mod lru;
mod memory;
mod size;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use disk::{blob_filename, DiskCache, RepairReport, INDEX_FILENAME};
pub use entry::{resolve_expiry, CacheEntry, EntryInfo, Metadata};
pub use lru::LruTracker;
pub use memory::MemoryCache;
pub use size::{estimated_size, EstimateSize, DEFAULT_ENTRY_SIZE};
pub use stats::{CacheCounters, DiskStats, MemoryStats, TieredStats};

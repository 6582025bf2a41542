//! Telemetry Cache - two-tier result cache for analysis pipelines
//!
//! Avoids recomputing expensive transformations by storing results under
//! keys derived from `(kind, session, operation, parameters)`, in a bounded
//! memory tier with LRU eviction and TTL expiration backed by a persistent
//! disk tier.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod manager;
pub mod models;

pub use cache::{DiskCache, MemoryCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use keys::derive_key;
pub use manager::{CacheManager, Tier};
pub use models::Payload;

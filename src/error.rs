//! Error types for the cache subsystem
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache subsystem.
///
/// Only the disk tier and construction paths produce these. The memory tier
/// cannot fail, and `CacheManager` logs and swallows everything past startup.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure in the disk tier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata index failure
    #[error("Index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rejected configuration at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache subsystem.
pub type Result<T> = std::result::Result<T, CacheError>;

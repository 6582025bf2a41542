//! Payload models
//!
//! Value shapes stored by the cache: the `Payload` sum type and the table and
//! value types it wraps.

pub mod payload;
pub mod table;
pub mod value;

// Re-export commonly used types
pub use payload::Payload;
pub use table::{Column, ColumnData, Table};
pub use value::{Value, ValueMap};

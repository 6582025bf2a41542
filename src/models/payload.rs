//! Cached payload variants
//!
//! The closed set of value shapes the analysis layers cache. Each variant has
//! its own size estimate; structured variants fall back to the default cost
//! when their canonical encoding cannot be produced.

use std::mem::size_of;

use serde::{Deserialize, Serialize};

use crate::cache::EstimateSize;
use crate::models::{Table, Value, ValueMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Columnar data, sized by deep memory accounting
    Tabular(Table),
    /// Numeric array, sized by element width
    Array(Vec<f64>),
    Text(String),
    Bytes(Vec<u8>),
    /// Named analysis results, sized by canonical JSON length
    StructuredMap(ValueMap),
    /// Anything else, sized by canonical JSON length
    Opaque(Value),
}

impl Payload {
    /// Variant name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Tabular(_) => "tabular",
            Payload::Array(_) => "array",
            Payload::Text(_) => "text",
            Payload::Bytes(_) => "bytes",
            Payload::StructuredMap(_) => "structured_map",
            Payload::Opaque(_) => "opaque",
        }
    }
}

impl EstimateSize for Payload {
    fn estimate_size(&self) -> Option<u64> {
        let size = match self {
            Payload::Tabular(table) => table.deep_size(),
            Payload::Array(values) => values.len() * size_of::<f64>(),
            Payload::Text(text) => text.len(),
            Payload::Bytes(bytes) => bytes.len(),
            Payload::StructuredMap(map) => serde_json::to_vec(map).ok()?.len(),
            Payload::Opaque(value) => serde_json::to_vec(value).ok()?.len(),
        };
        Some(size as u64)
    }
}

impl From<Table> for Payload {
    fn from(table: Table) -> Self {
        Payload::Tabular(table)
    }
}

impl From<ValueMap> for Payload {
    fn from(map: ValueMap) -> Self {
        Payload::StructuredMap(map)
    }
}

impl From<Vec<f64>> for Payload {
    fn from(values: Vec<f64>) -> Self {
        Payload::Array(values)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

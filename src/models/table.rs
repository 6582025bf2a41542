//! Columnar table payload
//!
//! A minimal in-memory frame: named, equally long, typed columns.

use std::mem::size_of;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Text(Vec<String>),
    /// Unix milliseconds
    Timestamp(Vec<i64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Int(v) | ColumnData::Timestamp(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Heap bytes owned by the column's buffer, strings included.
    pub fn heap_size(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len() * size_of::<f64>(),
            ColumnData::Int(v) | ColumnData::Timestamp(v) => v.len() * size_of::<i64>(),
            ColumnData::Bool(v) => v.len() * size_of::<bool>(),
            ColumnData::Text(v) => v.iter().map(|s| size_of::<String>() + s.len()).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, replacing one with the same name.
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        let name = name.into();
        self.columns.retain(|c| c.name != name);
        self.columns.push(Column { name, data });
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.data)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Row count, taken from the longest column.
    pub fn num_rows(&self) -> usize {
        self.columns.iter().map(|c| c.data.len()).max().unwrap_or(0)
    }

    /// Deep memory footprint: the table header, every column header and
    /// name, and every column buffer.
    pub fn deep_size(&self) -> usize {
        size_of::<Table>()
            + self
                .columns
                .iter()
                .map(|c| size_of::<Column>() + c.name.len() + c.data.heap_size())
                .sum::<usize>()
    }
}

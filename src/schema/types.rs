// src/schema/types.rs

use serde::{Deserialize, Serialize};

/// Warehouse column types this pipeline writes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    String,
    Int64,
    Float64,
    Timestamp,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Required,
    Nullable,
}

/// A single column definition, serialized the way BigQuery's `TableFieldSchema` is.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    pub mode: Mode,
}

impl ColumnSpec {
    pub fn required(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            mode: Mode::Required,
        }
    }

    pub fn nullable(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            mode: Mode::Nullable,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.mode == Mode::Nullable
    }
}

/// Ordered, fixed column list of one destination table.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq)]
pub struct TableSchema {
    pub fields: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

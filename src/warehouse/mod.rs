// src/warehouse/mod.rs

//! Append-only destinations for stamped record batches.

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use std::fmt;

use crate::schema::TableSchema;

pub mod auth;
pub mod bigquery;
pub mod encode;
pub mod local;

pub use bigquery::BigQueryWarehouse;
pub use local::LocalWarehouse;

/// Fully-qualified `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(project: &str, dataset: &str, table: &str) -> Self {
        Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// A warehouse that can bootstrap tables and append rows to them.
///
/// Both calls block until the warehouse has finished. Neither ever alters,
/// replaces or deletes existing data.
pub trait Warehouse {
    /// Create `table` with `schema` if it does not exist; leave it untouched if it does.
    fn ensure_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()>;

    /// Append `batch` as new rows and return the number of rows written.
    fn append(&self, table: &TableRef, batch: &RecordBatch) -> Result<u64>;
}

// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, TimeUnit};
use std::sync::Arc;

use super::types::{ColumnType, TableSchema};

/// Timezone tag on timestamp columns; Parquet stores them as UTC-adjusted micros.
pub const TIMESTAMP_TZ: &str = "UTC";

/// Map a warehouse column type into an Arrow DataType.
///
/// - STRING    → Utf8
/// - INT64     → Int64
/// - FLOAT64   → Float64
/// - TIMESTAMP → Timestamp(µs, UTC)
pub fn map_to_arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::String => DataType::Utf8,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Timestamp => {
            DataType::Timestamp(TimeUnit::Microsecond, Some(Arc::from(TIMESTAMP_TZ)))
        }
    }
}

/// Build an ArrowSchema (inside an Arc) from a fixed table schema.
pub fn build_arrow_schema(schema: &TableSchema) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = schema
        .fields
        .iter()
        .map(|col| ArrowField::new(&col.name, map_to_arrow_type(col.ty), col.is_nullable()))
        .collect();

    Arc::new(ArrowSchema::new(fields))
}

// src/schema/batch.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use super::{
    arrow::{build_arrow_schema, TIMESTAMP_TZ},
    tables::{countries_schema, observations_schema},
    types::TableSchema,
};
use crate::normalize::{Country, Observation};
use crate::provenance::Provenance;

/// Rows that know their destination schema and how to lay themselves out as
/// Arrow columns. Provenance columns are not included; see [`stamped_batch`].
pub trait TableRows: Sized {
    fn table_schema() -> TableSchema;
    fn data_columns(rows: &[Self]) -> Vec<ArrayRef>;
}

fn strings<'a>(it: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(it))
}

fn opt_strings<'a>(it: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(it.collect::<StringArray>())
}

fn opt_floats(it: impl Iterator<Item = Option<f64>>) -> ArrayRef {
    Arc::new(it.collect::<Float64Array>())
}

impl TableRows for Observation {
    fn table_schema() -> TableSchema {
        observations_schema()
    }

    fn data_columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            strings(rows.iter().map(|r| r.country_iso3.as_str())),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.year))),
            strings(rows.iter().map(|r| r.indicator_code.as_str())),
            opt_floats(rows.iter().map(|r| r.value)),
            opt_strings(rows.iter().map(|r| r.indicator_name.as_deref())),
            opt_strings(rows.iter().map(|r| r.country_name.as_deref())),
        ]
    }
}

impl TableRows for Country {
    fn table_schema() -> TableSchema {
        countries_schema()
    }

    fn data_columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            strings(rows.iter().map(|r| r.country_iso3.as_str())),
            opt_strings(rows.iter().map(|r| r.country_iso2.as_deref())),
            opt_strings(rows.iter().map(|r| r.country_name.as_deref())),
            opt_strings(rows.iter().map(|r| r.region.as_deref())),
            opt_strings(rows.iter().map(|r| r.income_level.as_deref())),
            opt_strings(rows.iter().map(|r| r.lending_type.as_deref())),
            opt_strings(rows.iter().map(|r| r.capital_city.as_deref())),
            opt_floats(rows.iter().map(|r| r.capital_lat)),
            opt_floats(rows.iter().map(|r| r.capital_lon)),
        ]
    }
}

/// Lay out `rows` under their fixed schema with `load_ts` and `run_id` appended
/// as constant columns.
pub fn stamped_batch<R: TableRows>(rows: &[R], provenance: &Provenance) -> Result<RecordBatch> {
    let schema = build_arrow_schema(&R::table_schema());
    let n = rows.len();

    let mut columns = R::data_columns(rows);
    columns.push(Arc::new(
        TimestampMicrosecondArray::from_value(provenance.load_ts_micros(), n)
            .with_timezone(TIMESTAMP_TZ),
    ));
    columns.push(Arc::new(StringArray::from_iter_values(
        std::iter::repeat(provenance.run_id.as_str()).take(n),
    )));

    RecordBatch::try_new(schema, columns).context("building stamped record batch")
}

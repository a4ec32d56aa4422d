// src/schema/tables.rs

use super::types::{ColumnSpec, ColumnType::*, TableSchema};

pub const OBSERVATIONS_TABLE: &str = "raw_wb_indicators_long";
pub const COUNTRIES_TABLE: &str = "raw_country_dim";

pub const RUN_ID: &str = "run_id";
pub const LOAD_TS: &str = "load_ts";

fn provenance_columns() -> [ColumnSpec; 2] {
    [
        ColumnSpec::required(LOAD_TS, Timestamp),
        ColumnSpec::required(RUN_ID, String),
    ]
}

/// Long-format indicator observations.
pub fn observations_schema() -> TableSchema {
    let mut fields = vec![
        ColumnSpec::required("country_iso3", String),
        ColumnSpec::required("year", Int64),
        ColumnSpec::required("indicator_code", String),
        ColumnSpec::nullable("value", Float64),
        ColumnSpec::nullable("indicator_name", String),
        ColumnSpec::nullable("country_name", String),
    ];
    fields.extend(provenance_columns());
    TableSchema { fields }
}

/// Country dimension, one row per real country.
pub fn countries_schema() -> TableSchema {
    let mut fields = vec![
        ColumnSpec::required("country_iso3", String),
        ColumnSpec::nullable("country_iso2", String),
        ColumnSpec::nullable("country_name", String),
        ColumnSpec::nullable("region", String),
        ColumnSpec::nullable("income_level", String),
        ColumnSpec::nullable("lending_type", String),
        ColumnSpec::nullable("capital_city", String),
        ColumnSpec::nullable("capital_lat", Float64),
        ColumnSpec::nullable("capital_lon", Float64),
    ];
    fields.extend(provenance_columns());
    TableSchema { fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::Mode;

    #[test]
    fn both_tables_end_with_required_provenance() {
        for schema in [observations_schema(), countries_schema()] {
            let n = schema.fields.len();
            assert_eq!(schema.names()[n - 2..], [LOAD_TS, RUN_ID]);
            assert!(schema.fields[n - 2..].iter().all(|f| f.mode == Mode::Required));
        }
    }

    #[test]
    fn observation_key_columns_are_required() {
        let schema = observations_schema();
        let required: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| f.mode == Mode::Required)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            required,
            vec!["country_iso3", "year", "indicator_code", LOAD_TS, RUN_ID]
        );
    }
}

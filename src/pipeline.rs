// src/pipeline.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{info, instrument};

use crate::fetch::{indicator_codes, Transport, WorldBankClient};
use crate::normalize::{normalize_countries, normalize_observations, Country, Observation};
use crate::provenance::Provenance;
use crate::schema::{
    countries_schema, observations_schema, stamped_batch, COUNTRIES_TABLE, OBSERVATIONS_TABLE,
};
use crate::warehouse::{TableRef, Warehouse};

/// The two destination tables of a run.
#[derive(Debug, Clone)]
pub struct Tables {
    pub observations: TableRef,
    pub countries: TableRef,
}

impl Tables {
    pub fn new(project: &str, dataset: &str) -> Self {
        Self {
            observations: TableRef::new(project, dataset, OBSERVATIONS_TABLE),
            countries: TableRef::new(project, dataset, COUNTRIES_TABLE),
        }
    }
}

/// What one run wrote.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub load_ts: DateTime<Utc>,
    pub countries_table: TableRef,
    pub countries: u64,
    pub observations_table: TableRef,
    pub observations: u64,
}

/// Keep only observations whose `country_iso3` is a row of the dimension.
pub fn retain_known_countries(
    observations: Vec<Observation>,
    countries: &[Country],
) -> Vec<Observation> {
    let known: HashSet<&str> = countries.iter().map(|c| c.country_iso3.as_str()).collect();
    observations
        .into_iter()
        .filter(|o| known.contains(o.country_iso3.as_str()))
        .collect()
}

/// Fetch, normalize, filter, stamp and append both tables.
///
/// Tables are bootstrapped first, then countries are appended before
/// observations. A failure after the first append leaves that append in place.
#[instrument(level = "info", skip_all, fields(run_id = %provenance.run_id))]
pub fn run<T: Transport, W: Warehouse>(
    source: &WorldBankClient<T>,
    warehouse: &W,
    tables: &Tables,
    start_year: i32,
    end_year: i32,
    provenance: &Provenance,
) -> Result<RunSummary> {
    warehouse
        .ensure_table(&tables.observations, &observations_schema())
        .with_context(|| format!("bootstrapping {}", tables.observations))?;
    warehouse
        .ensure_table(&tables.countries, &countries_schema())
        .with_context(|| format!("bootstrapping {}", tables.countries))?;

    let countries = normalize_countries(
        &source
            .fetch_countries()
            .context("fetching country metadata")?,
    );
    info!(rows = countries.len(), "country dimension ready");

    let codes = indicator_codes();
    let observations = normalize_observations(
        &source
            .fetch_observations(&codes, start_year, end_year)
            .context("fetching indicator observations")?,
    );
    let fetched = observations.len();
    let observations = retain_known_countries(observations, &countries);
    info!(
        rows = observations.len(),
        dropped = fetched - observations.len(),
        "observations filtered to known countries"
    );

    let countries_batch = stamped_batch(&countries, provenance)?;
    let observations_batch = stamped_batch(&observations, provenance)?;

    info!(rows = countries_batch.num_rows(), table = %tables.countries, "loading countries");
    let countries_loaded = warehouse
        .append(&tables.countries, &countries_batch)
        .with_context(|| format!("appending to {}", tables.countries))?;

    info!(
        rows = observations_batch.num_rows(),
        table = %tables.observations,
        "loading observations"
    );
    let observations_loaded = warehouse
        .append(&tables.observations, &observations_batch)
        .with_context(|| format!("appending to {}", tables.observations))?;

    Ok(RunSummary {
        run_id: provenance.run_id.clone(),
        load_ts: provenance.load_ts,
        countries_table: tables.countries.clone(),
        countries: countries_loaded,
        observations_table: tables.observations.clone(),
        observations: observations_loaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::testing::{Reply, ScriptedTransport};
    use crate::fetch::RetryPolicy;
    use crate::schema::TableSchema;
    use crate::warehouse::LocalWarehouse;
    use arrow::array::{Array, StringArray, TimestampMicrosecondArray};
    use arrow::record_batch::RecordBatch;
    use serde_json::{json, Value};
    use std::{cell::RefCell, time::Duration};
    use tempfile::tempdir;

    fn country(iso3: &str, region_id: &str) -> Value {
        json!({
            "id": iso3,
            "iso2Code": iso3[..2].to_string(),
            "name": format!("Country {iso3}"),
            "region": { "id": region_id, "iso2code": "ZZ", "value": "Somewhere" },
            "incomeLevel": { "id": "HIC", "iso2code": "XD", "value": "High income" },
            "lendingType": { "id": "LNX", "iso2code": "XX", "value": "Not classified" },
            "capitalCity": "Capital",
            "longitude": "10.0",
            "latitude": "20.0"
        })
    }

    fn observation(iso3: &str, year: &str, value: Value) -> Value {
        json!({
            "indicator": { "id": "NY.GDP.MKTP.KD.ZG", "value": "GDP growth (annual %)" },
            "country": { "id": "XX", "value": format!("Country {iso3}") },
            "countryiso3code": iso3,
            "date": year,
            "value": value,
            "unit": "",
            "obs_status": "",
            "decimal": 1
        })
    }

    fn scripted_source() -> WorldBankClient<ScriptedTransport> {
        let transport = ScriptedTransport::new()
            .on(
                "/indicator/",
                vec![Reply::Json(json!([
                    { "page": 1, "pages": 1, "per_page": 20000, "total": 3 },
                    [
                        observation("ABW", "2021", json!(1.5)),
                        observation("ABW", "2020", json!("NaN")),
                        observation("AFE", "2021", json!(2.5)),
                    ]
                ]))],
            )
            .on(
                "/country",
                vec![Reply::Json(json!([
                    { "page": 1, "pages": 1, "per_page": "400", "total": 2 },
                    [country("AFE", "NA"), country("ABW", "LCN")]
                ]))],
            );
        WorldBankClient::with_policy(
            transport,
            "http://wb",
            RetryPolicy {
                base_delay: Duration::ZERO,
                ..RetryPolicy::default()
            },
        )
    }

    /// Keeps every call and batch in memory.
    #[derive(Default)]
    struct RecordingWarehouse {
        ensured: RefCell<Vec<String>>,
        appended: RefCell<Vec<(String, RecordBatch)>>,
        reject_appends: bool,
    }

    impl Warehouse for RecordingWarehouse {
        fn ensure_table(&self, table: &TableRef, _schema: &TableSchema) -> Result<()> {
            self.ensured.borrow_mut().push(table.table.clone());
            Ok(())
        }

        fn append(&self, table: &TableRef, batch: &RecordBatch) -> Result<u64> {
            if self.reject_appends {
                anyhow::bail!(crate::error::LoadError::Rejected {
                    table: table.to_string(),
                    message: "quota exceeded".into(),
                });
            }
            self.appended
                .borrow_mut()
                .push((table.table.clone(), batch.clone()));
            Ok(batch.num_rows() as u64)
        }
    }

    fn strings(batch: &RecordBatch, name: &str) -> Vec<String> {
        let col = batch.column_by_name(name).unwrap();
        let arr = col.as_any().downcast_ref::<StringArray>().unwrap();
        arr.iter().map(|v| v.unwrap().to_string()).collect()
    }

    fn timestamps(batch: &RecordBatch) -> Vec<i64> {
        let col = batch.column_by_name("load_ts").unwrap();
        let arr = col
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        arr.values().to_vec()
    }

    fn obs(iso3: &str) -> Observation {
        Observation {
            country_iso3: iso3.into(),
            year: 2020,
            indicator_code: "X".into(),
            value: None,
            indicator_name: None,
            country_name: None,
        }
    }

    fn dim(iso3: &str) -> Country {
        Country {
            country_iso3: iso3.into(),
            country_iso2: None,
            country_name: None,
            region: None,
            income_level: None,
            lending_type: None,
            capital_city: None,
            capital_lat: None,
            capital_lon: None,
        }
    }

    #[test]
    fn referential_filter_drops_unknown_countries() {
        let kept = retain_known_countries(
            vec![obs("AAA"), obs("BBB"), obs("CCC"), obs("AAA")],
            &[dim("AAA"), dim("BBB")],
        );
        let codes: Vec<&str> = kept.iter().map(|o| o.country_iso3.as_str()).collect();
        assert_eq!(codes, vec!["AAA", "BBB", "AAA"]);
    }

    #[test]
    fn referential_filter_is_exact_match() {
        let kept = retain_known_countries(vec![obs("abw"), obs("ABW ")], &[dim("ABW")]);
        assert!(kept.is_empty());
    }

    #[test]
    fn end_to_end_with_aggregate() {
        let source = scripted_source();
        let warehouse = RecordingWarehouse::default();
        let tables = Tables::new("proj", "wb_raw");
        let provenance = Provenance::new_run();

        let summary = run(&source, &warehouse, &tables, 2020, 2021, &provenance).unwrap();

        assert_eq!(summary.countries, 1);
        assert_eq!(summary.observations, 2);
        assert_eq!(summary.run_id, provenance.run_id);
        assert_eq!(
            *warehouse.ensured.borrow(),
            vec![OBSERVATIONS_TABLE.to_string(), COUNTRIES_TABLE.to_string()]
        );

        let appended = warehouse.appended.borrow();
        assert_eq!(appended.len(), 2);
        let (first_table, countries) = &appended[0];
        let (second_table, observations) = &appended[1];
        assert_eq!(first_table, COUNTRIES_TABLE);
        assert_eq!(second_table, OBSERVATIONS_TABLE);

        assert_eq!(strings(countries, "country_iso3"), vec!["ABW"]);
        assert_eq!(strings(observations, "country_iso3"), vec!["ABW", "ABW"]);
        let value = observations.column_by_name("value").unwrap();
        assert!(!value.is_null(0));
        assert!(value.is_null(1));

        for batch in [countries, observations] {
            assert!(strings(batch, "run_id").iter().all(|id| *id == provenance.run_id));
            assert!(timestamps(batch)
                .iter()
                .all(|ts| *ts == provenance.load_ts_micros()));
        }
    }

    #[test]
    fn end_to_end_into_local_parquet_tables() {
        let dir = tempdir().unwrap();
        let warehouse = LocalWarehouse::new(dir.path());
        let tables = Tables::new("proj", "wb_raw");

        let first = Provenance::new_run();
        run(&scripted_source(), &warehouse, &tables, 2020, 2021, &first).unwrap();
        let second = Provenance::new_run();
        run(&scripted_source(), &warehouse, &tables, 2020, 2021, &second).unwrap();

        let batches = warehouse.read_table(&tables.observations).unwrap();
        let run_ids: Vec<String> = batches.iter().flat_map(|b| strings(b, "run_id")).collect();
        assert_eq!(run_ids.len(), 4);
        assert_eq!(run_ids.iter().filter(|id| **id == first.run_id).count(), 2);
        assert_eq!(run_ids.iter().filter(|id| **id == second.run_id).count(), 2);

        let countries = warehouse.read_table(&tables.countries).unwrap();
        let rows: usize = countries.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);
    }

    #[test]
    fn fetch_failure_aborts_before_any_append() {
        let transport = ScriptedTransport::new().on("/country", vec![Reply::Status(503)]);
        let source = WorldBankClient::with_policy(
            transport,
            "http://wb",
            RetryPolicy {
                base_delay: Duration::ZERO,
                ..RetryPolicy::default()
            },
        );
        let warehouse = RecordingWarehouse::default();
        let err = run(
            &source,
            &warehouse,
            &Tables::new("proj", "wb_raw"),
            2020,
            2021,
            &Provenance::new_run(),
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Exhausted { attempts: 2, .. })
        ));
        assert!(warehouse.appended.borrow().is_empty());
        assert_eq!(source.transport().call_count(), 2);
    }

    #[test]
    fn load_failure_propagates() {
        let warehouse = RecordingWarehouse {
            reject_appends: true,
            ..Default::default()
        };
        let err = run(
            &scripted_source(),
            &warehouse,
            &Tables::new("proj", "wb_raw"),
            2020,
            2021,
            &Provenance::new_run(),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("quota exceeded"));
    }
}

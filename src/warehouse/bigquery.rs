// src/warehouse/bigquery.rs

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use reqwest::{blocking::Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{path::Path, thread::sleep, time::Duration};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    auth::{AccessTokens, GoogleTokens},
    encode::encode_parquet,
    TableRef, Warehouse,
};
use crate::error::LoadError;
use crate::schema::TableSchema;

pub const API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const UPLOAD_BASE: &str = "https://bigquery.googleapis.com/upload/bigquery/v2";
const BOUNDARY: &str = "wdi_ingest_load_boundary";

/// BigQuery over its REST API: tables via `tables.get`/`tables.insert`,
/// appends as Parquet load jobs that are polled until done.
pub struct BigQueryWarehouse {
    client: Client,
    tokens: Box<dyn AccessTokens>,
    api_base: String,
    upload_base: String,
    poll_interval: Duration,
}

impl BigQueryWarehouse {
    pub fn new(credentials_path: &Path) -> Result<Self> {
        let tokens = GoogleTokens::from_file(credentials_path)?;
        Self::with_endpoints(tokens, API_BASE, UPLOAD_BASE)
    }

    pub fn with_endpoints(
        tokens: impl AccessTokens + 'static,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("building BigQuery HTTP client")?;
        Ok(Self {
            client,
            tokens: Box::new(tokens),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(1),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn table_url(&self, table: &TableRef) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.api_base, table.project, table.dataset, table.table
        )
    }

    fn create_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables",
            self.api_base, table.project, table.dataset
        );
        let body = json!({
            "tableReference": {
                "projectId": table.project,
                "datasetId": table.dataset,
                "tableId": table.table,
            },
            "schema": schema,
        });
        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.tokens.access_token()?)
            .json(&body)
            .send()
            .with_context(|| format!("POST {url}"))?;

        match resp.status() {
            s if s.is_success() => {
                info!(%table, "created table");
                Ok(())
            }
            // created concurrently by someone else; same outcome
            StatusCode::CONFLICT => {
                debug!(%table, "table already exists");
                Ok(())
            }
            s => Err(LoadError::Bootstrap {
                table: table.to_string(),
                message: format!("tables.insert returned {s}: {}", resp.text().unwrap_or_default()),
            }
            .into()),
        }
    }

    /// Poll `job` until it is done; the reported row count, if any.
    fn wait_for_job(&self, table: &TableRef, job: JobResource) -> Result<Option<u64>> {
        let mut job = job;
        loop {
            if let Some(outcome) = job.outcome(table) {
                return outcome;
            }

            sleep(self.poll_interval);
            let reference = &job.job_reference;
            let url = format!(
                "{}/projects/{}/jobs/{}",
                self.api_base, reference.project_id, reference.job_id
            );
            let mut req = self.client.get(&url).bearer_auth(self.tokens.access_token()?);
            if let Some(location) = &reference.location {
                req = req.query(&[("location", location)]);
            }
            let resp = req.send().with_context(|| format!("GET {url}"))?;
            if !resp.status().is_success() {
                let status = resp.status();
                warn!(%table, %status, "polling load job failed");
                return Err(LoadError::Rejected {
                    table: table.to_string(),
                    message: format!(
                        "jobs.get returned {status}: {}",
                        resp.text().unwrap_or_default()
                    ),
                }
                .into());
            }
            job = resp.json().context("decoding load job status")?;
            debug!(
                job_id = %job.job_reference.job_id,
                state = ?job.status.as_ref().map(|s| &s.state),
                "polled"
            );
        }
    }
}

impl Warehouse for BigQueryWarehouse {
    #[instrument(level = "info", skip(self, schema), fields(table = %table))]
    fn ensure_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()> {
        let url = self.table_url(table);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.tokens.access_token()?)
            .send()
            .with_context(|| format!("GET {url}"))?;

        match resp.status() {
            s if s.is_success() => {
                debug!("table exists");
                Ok(())
            }
            StatusCode::NOT_FOUND => self.create_table(table, schema),
            s => Err(LoadError::Bootstrap {
                table: table.to_string(),
                message: format!("tables.get returned {s}: {}", resp.text().unwrap_or_default()),
            }
            .into()),
        }
    }

    #[instrument(level = "info", skip(self, batch), fields(table = %table, rows = batch.num_rows()))]
    fn append(&self, table: &TableRef, batch: &RecordBatch) -> Result<u64> {
        let data = encode_parquet(batch)?;
        let job_id = format!("wdi_ingest_{}_{}", table.table, Uuid::new_v4().simple());
        let config = load_job_config(table, &job_id);
        let body = multipart_related(&config, &data)?;

        let url = format!("{}/projects/{}/jobs", self.upload_base, table.project);
        let resp = self
            .client
            .post(&url)
            .query(&[("uploadType", "multipart")])
            .bearer_auth(self.tokens.access_token()?)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={BOUNDARY}"),
            )
            .body(body)
            .send()
            .with_context(|| format!("POST {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LoadError::Rejected {
                table: table.to_string(),
                message: format!(
                    "jobs.insert returned {status}: {}",
                    resp.text().unwrap_or_default()
                ),
            }
            .into());
        }
        let job: JobResource = resp.json().context("decoding load job")?;
        info!(%job_id, bytes = data.len(), "load job submitted");

        // outputRows is absent on some successful jobs; the batch is what was sent
        let rows = self
            .wait_for_job(table, job)?
            .unwrap_or(batch.num_rows() as u64);
        info!(rows, "load job done");
        Ok(rows)
    }
}

/// Job resource for an append-only Parquet load into an existing table.
pub fn load_job_config(table: &TableRef, job_id: &str) -> Value {
    json!({
        "jobReference": {
            "projectId": table.project,
            "jobId": job_id,
        },
        "configuration": {
            "load": {
                "destinationTable": {
                    "projectId": table.project,
                    "datasetId": table.dataset,
                    "tableId": table.table,
                },
                "sourceFormat": "PARQUET",
                "writeDisposition": "WRITE_APPEND",
                "createDisposition": "CREATE_NEVER",
            }
        }
    })
}

/// `multipart/related` body: JSON metadata part, then the raw payload.
pub fn multipart_related(metadata: &Value, data: &[u8]) -> Result<Vec<u8>> {
    let meta = serde_json::to_vec(metadata).context("serializing job metadata")?;
    let mut body = Vec::with_capacity(meta.len() + data.len() + 256);
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(&meta);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Ok(body)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorProto {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
    #[serde(default)]
    errors: Option<Vec<ErrorProto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    #[serde(default)]
    status: Option<JobStatus>,
    #[serde(default)]
    statistics: Option<Value>,
}

impl JobResource {
    /// `None` while the job is still pending or running.
    fn outcome(&self, table: &TableRef) -> Option<Result<Option<u64>>> {
        let status = self.status.as_ref().filter(|s| s.state == "DONE")?;
        let Some(err) = &status.error_result else {
            return Some(Ok(self.output_rows()));
        };
        let detail: Vec<&str> = status
            .errors
            .iter()
            .flatten()
            .map(|e| e.message.as_str())
            .collect();
        Some(Err(LoadError::Rejected {
            table: table.to_string(),
            message: format!("{} ({})", err.message, detail.join("; ")),
        }
        .into()))
    }

    /// `statistics.load.outputRows` is an int64 encoded as a JSON string.
    fn output_rows(&self) -> Option<u64> {
        self.statistics
            .as_ref()
            .and_then(|s| s.pointer("/load/outputRows"))
            .and_then(|v| match v {
                Value::String(s) => s.parse().ok(),
                Value::Number(n) => n.as_u64(),
                _ => None,
            })
    }
}

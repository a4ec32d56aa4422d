// src/config.rs

use std::path::PathBuf;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";
pub const DEFAULT_DATASET: &str = "wb_raw";
pub const DEFAULT_START_YEAR: i32 = 2020;
pub const DEFAULT_END_YEAR: i32 = 2025;

/// Everything one run needs from its environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: String,
    pub dataset: String,
    pub start_year: i32,
    pub end_year: i32,
    /// Path to a service-account or authorized-user JSON file.
    pub credentials_path: PathBuf,
    pub base_url: String,
    /// When set, tables are written as local Parquet instead of BigQuery.
    pub warehouse_dir: Option<PathBuf>,
}

impl Config {
    /// Read settings from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let project_id = get("GCP_PROJECT_ID").ok_or(ConfigError::Missing("GCP_PROJECT_ID"))?;
        let credentials_path = get("GOOGLE_APPLICATION_CREDENTIALS")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("GOOGLE_APPLICATION_CREDENTIALS"))?;

        let dataset = get("BQ_DATASET_RAW").unwrap_or_else(|| DEFAULT_DATASET.to_string());
        let start_year = parse_year("WB_START_YEAR", get("WB_START_YEAR"), DEFAULT_START_YEAR)?;
        let end_year = parse_year("WB_END_YEAR", get("WB_END_YEAR"), DEFAULT_END_YEAR)?;
        if start_year > end_year {
            return Err(ConfigError::Invalid {
                name: "WB_START_YEAR",
                value: start_year.to_string(),
                reason: format!("after WB_END_YEAR ({end_year})"),
            });
        }

        let base_url = match get("WB_BASE_URL") {
            Some(raw) => parse_base_url(&raw)?,
            None => DEFAULT_BASE_URL.to_string(),
        };
        let warehouse_dir = get("WB_WAREHOUSE_DIR").map(PathBuf::from);

        Ok(Self {
            project_id,
            dataset,
            start_year,
            end_year,
            credentials_path,
            base_url,
            warehouse_dir,
        })
    }
}

fn parse_year(name: &'static str, raw: Option<String>, default: i32) -> Result<i32, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            name,
            value: v.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: "WB_BASE_URL",
        value: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

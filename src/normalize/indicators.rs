// src/normalize/indicators.rs

use serde_json::Value;
use tracing::debug;

use super::coerce::{to_f64, to_i64, to_key, to_text};

/// One `(country, year, indicator)` measurement in long format.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub country_iso3: String,
    pub year: i64,
    pub indicator_code: String,
    pub value: Option<f64>,
    pub indicator_name: Option<String>,
    pub country_name: Option<String>,
}

impl Observation {
    /// Build from one raw API item. `None` if a key field is missing or `date` isn't a year.
    pub fn from_item(item: &Value) -> Option<Self> {
        Some(Self {
            country_iso3: to_key(item.get("countryiso3code"))?,
            year: to_i64(item.get("date"))?,
            indicator_code: to_key(item.pointer("/indicator/id"))?,
            value: to_f64(item.get("value")),
            indicator_name: to_text(item.pointer("/indicator/value")),
            country_name: to_text(item.pointer("/country/value")),
        })
    }
}

/// Normalize raw observation items, silently dropping rows without a usable key.
pub fn normalize_observations(items: &[Value]) -> Vec<Observation> {
    let rows: Vec<Observation> = items.iter().filter_map(Observation::from_item).collect();
    debug!(
        raw = items.len(),
        kept = rows.len(),
        dropped = items.len() - rows.len(),
        "normalized observations"
    );
    rows
}

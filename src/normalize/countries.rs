// src/normalize/countries.rs

use serde_json::Value;
use tracing::debug;

use super::coerce::{to_f64, to_key, to_text};

/// Region id the API uses for regional / income-group aggregates.
pub const AGGREGATE_REGION_ID: &str = "NA";

/// One real country in the dimension table.
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    pub country_iso3: String,
    pub country_iso2: Option<String>,
    pub country_name: Option<String>,
    pub region: Option<String>,
    pub income_level: Option<String>,
    pub lending_type: Option<String>,
    pub capital_city: Option<String>,
    pub capital_lat: Option<f64>,
    pub capital_lon: Option<f64>,
}

impl Country {
    pub fn from_item(item: &Value) -> Option<Self> {
        Some(Self {
            country_iso3: to_key(item.get("id"))?,
            country_iso2: to_text(item.get("iso2Code")),
            country_name: to_text(item.get("name")),
            region: to_text(item.pointer("/region/value")),
            income_level: to_text(item.pointer("/incomeLevel/value")),
            lending_type: to_text(item.pointer("/lendingType/value")),
            capital_city: to_text(item.get("capitalCity")),
            capital_lat: to_f64(item.get("latitude")),
            capital_lon: to_f64(item.get("longitude")),
        })
    }
}

pub fn is_aggregate(item: &Value) -> bool {
    item.pointer("/region/id").and_then(Value::as_str) == Some(AGGREGATE_REGION_ID)
}

/// Normalize raw country items, excluding aggregates and items without an id.
pub fn normalize_countries(items: &[Value]) -> Vec<Country> {
    let rows: Vec<Country> = items
        .iter()
        .filter(|item| !is_aggregate(item))
        .filter_map(Country::from_item)
        .collect();
    debug!(raw = items.len(), kept = rows.len(), "normalized countries");
    rows
}

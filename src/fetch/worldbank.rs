// src/fetch/worldbank.rs

use serde_json::Value;
use tracing::{info, instrument};

use super::pages::fetch_all_pages;
use super::transport::{RetryPolicy, Transport};
use crate::error::FetchError;

/// WDI series loaded on every run, as `(code, display name)`.
pub static INDICATORS: &[(&str, &str)] = &[
    // Growth / macro
    ("NY.GDP.PCAP.KD.ZG", "GDP per capita growth (annual %)"),
    ("NY.GDP.MKTP.KD.ZG", "GDP growth (annual %)"),
    ("FP.CPI.TOTL.ZG", "Inflation, consumer prices (annual %)"),
    // Internal fiscal risk
    ("GC.DOD.TOTL.GD.ZS", "Central government debt, total (% of GDP)"),
    // External risk
    ("DT.DOD.DECT.GN.ZS", "External debt stocks (% of GNI)"),
    ("DT.TDS.DECT.EX.ZS", "Total debt service (% of exports)"),
    ("FI.RES.TOTL.MO", "Total reserves in months of imports"),
    // Support series
    ("SL.UEM.TOTL.ZS", "Unemployment, total (% of labor force)"),
    ("NE.TRD.GNFS.ZS", "Trade (% of GDP)"),
    ("BX.KLT.DINV.WD.GD.ZS", "FDI, net inflows (% of GDP)"),
    ("IT.NET.USER.ZS", "Individuals using the Internet (% of population)"),
];

/// WDI is source 2 in the World Bank API.
pub const WDI_SOURCE: &str = "2";
pub const OBSERVATIONS_PER_PAGE: usize = 20_000;
pub const COUNTRIES_PER_PAGE: usize = 400;

pub fn indicator_codes() -> Vec<&'static str> {
    INDICATORS.iter().map(|(code, _)| *code).collect()
}

/// Typed entry points onto the two World Bank collections.
pub struct WorldBankClient<T> {
    transport: T,
    base_url: String,
    policy: RetryPolicy,
}

impl<T: Transport> WorldBankClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self::with_policy(transport, base_url, RetryPolicy::default())
    }

    pub fn with_policy(transport: T, base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            base_url,
            policy,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn observations_url(&self, codes: &[&str]) -> String {
        format!("{}/country/all/indicator/{}", self.base_url, codes.join(";"))
    }

    pub fn countries_url(&self) -> String {
        format!("{}/country", self.base_url)
    }

    /// Raw observation items for all `codes` over `start_year..=end_year`, one multi-indicator query.
    #[instrument(level = "info", skip(self, codes), fields(indicators = codes.len()))]
    pub fn fetch_observations(
        &self,
        codes: &[&str],
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<Value>, FetchError> {
        let url = self.observations_url(codes);
        let params = [
            ("format", "json".to_string()),
            ("source", WDI_SOURCE.to_string()),
            ("date", format!("{start_year}:{end_year}")),
        ];
        let items = fetch_all_pages(
            &self.transport,
            &self.policy,
            &url,
            &params,
            OBSERVATIONS_PER_PAGE,
        )?;
        info!(items = items.len(), "fetched observations");
        Ok(items)
    }

    /// Raw country metadata items, aggregates included.
    #[instrument(level = "info", skip(self))]
    pub fn fetch_countries(&self) -> Result<Vec<Value>, FetchError> {
        let url = self.countries_url();
        let params = [("format", "json".to_string())];
        let items = fetch_all_pages(
            &self.transport,
            &self.policy,
            &url,
            &params,
            COUNTRIES_PER_PAGE,
        )?;
        info!(items = items.len(), "fetched countries");
        Ok(items)
    }
}

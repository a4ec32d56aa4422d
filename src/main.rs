use anyhow::{Context, Result};
use std::env;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};
use wdi_ingest::{
    config::Config,
    fetch::{HttpTransport, WorldBankClient},
    pipeline::{self, RunSummary, Tables},
    provenance::Provenance,
    warehouse::{BigQueryWarehouse, LocalWarehouse},
};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) config, before any network I/O ───────────────────────────
    let config = Config::from_env()?;
    info!(
        project = %config.project_id,
        dataset = %config.dataset,
        start_year = config.start_year,
        end_year = config.end_year,
        "startup"
    );

    // ─── 3) one run id + load timestamp for both tables ──────────────
    let provenance = Provenance::new_run();
    let source = WorldBankClient::new(HttpTransport::new()?, config.base_url.clone());
    let tables = Tables::new(&config.project_id, &config.dataset);

    // ─── 4) fetch → normalize → filter → append ──────────────────────
    let summary = match &config.warehouse_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "writing to local parquet tables");
            let warehouse = LocalWarehouse::new(dir);
            pipeline::run(
                &source,
                &warehouse,
                &tables,
                config.start_year,
                config.end_year,
                &provenance,
            )?
        }
        None => {
            let warehouse = BigQueryWarehouse::new(&config.credentials_path)
                .context("initialising BigQuery client")?;
            pipeline::run(
                &source,
                &warehouse,
                &tables,
                config.start_year,
                config.end_year,
                &provenance,
            )?
        }
    };

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Loaded countries: {} rows -> {}",
        summary.countries, summary.countries_table
    );
    println!(
        "Loaded indicators: {} rows -> {}",
        summary.observations, summary.observations_table
    );
    println!(
        "run_id={}, load_ts={}",
        summary.run_id,
        summary.load_ts.to_rfc3339()
    );
}

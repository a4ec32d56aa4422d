//! World Bank WDI indicators and country metadata, appended to raw warehouse
//! tables with per-run lineage columns.

pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod provenance;
pub mod schema;
pub mod warehouse;

pub mod coerce;
pub mod countries;
pub mod indicators;

pub use countries::{normalize_countries, Country};
pub use indicators::{normalize_observations, Observation};

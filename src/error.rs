// src/error.rs

use reqwest::StatusCode;
use thiserror::Error;

/// A required setting is missing or unusable. Raised before any network I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Failure to obtain a decoded JSON body from the source API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} returned status {status}")]
    Status { url: String, status: StatusCode },

    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("GET {url}: could not decode JSON body: {message}")]
    Decode { url: String, message: String },

    #[error("source API failed after {attempts} attempts; last error: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => is_retryable_status(*status),
            FetchError::Transport { .. } | FetchError::Decode { .. } => true,
            FetchError::Exhausted { .. } => false,
        }
    }
}

/// 429 plus the standard server-side statuses.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// The warehouse refused a bootstrap or append.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not ensure table {table}: {message}")]
    Bootstrap { table: String, message: String },

    #[error("append to {table} rejected: {message}")]
    Rejected { table: String, message: String },

    #[error("batch for {table} does not match table schema: {message}")]
    SchemaMismatch { table: String, message: String },
}

// src/fetch/transport.rs

use reqwest::{blocking::Client, StatusCode};
use serde_json::Value;
use std::{thread::sleep, time::Duration};
use tracing::{debug, error, warn};

use crate::error::FetchError;

/// Status and raw body of one GET.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Something that can issue a single blocking GET. No retries at this level.
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, FetchError>;
}

/// `reqwest` blocking client with a per-request timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, FetchError> {
        let transport_err = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(transport_err)?;
        let status = resp.status();
        let body = resp.bytes().map_err(transport_err)?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

/// Bounded exponential backoff: `min(base * 2^(attempt-1), max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(6),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

fn get_json_once<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, FetchError> {
    let resp = transport.get(url, query)?;
    if !resp.status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: resp.status,
        });
    }
    serde_json::from_slice(&resp.body).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// GET `url` and decode the body as JSON, retrying transient failures per `policy`.
///
/// Non-retryable statuses fail on the first attempt. When every attempt fails
/// transiently the last error is wrapped in [`FetchError::Exhausted`].
pub fn get_json_with_retry<T: Transport + ?Sized>(
    transport: &T,
    policy: &RetryPolicy,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, FetchError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        debug!(%url, attempt, "GET");
        match get_json_once(transport, url, query) {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() => {
                error!(%url, error = %e, "non-retryable failure");
                return Err(e);
            }
            Err(e) if attempt >= max_attempts => {
                error!(%url, attempts = attempt, error = %e, "exhausted retries");
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let backoff = policy.delay_for(attempt);
                warn!(%url, attempt, delay_ms = backoff.as_millis() as u64, error = %e, "retrying");
                sleep(backoff);
                attempt += 1;
            }
        }
    }
}

// src/fetch/mod.rs

//! Source-side I/O: a retrying JSON transport, the page walker, and the
//! World Bank endpoints built on top of them.

pub mod pages;
pub mod transport;
pub mod worldbank;

#[cfg(test)]
pub(crate) mod testing;

pub use pages::{fetch_all_pages, PageMeta};
pub use transport::{get_json_with_retry, HttpResponse, HttpTransport, RetryPolicy, Transport};
pub use worldbank::{indicator_codes, WorldBankClient, INDICATORS};

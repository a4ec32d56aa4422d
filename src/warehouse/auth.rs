// src/warehouse/auth.rs

use anyhow::{Context, Result};
use google_cloud_auth::{
    credentials::CredentialsFile,
    project::{create_token_source_from_credentials, Config},
    token_source::TokenSource,
};
use std::path::Path;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";
const SCOPES: [&str; 1] = [BIGQUERY_SCOPE];

/// Something that hands out OAuth2 bearer tokens for BigQuery calls.
pub trait AccessTokens {
    fn access_token(&self) -> Result<String>;
}

/// Tokens from a `GOOGLE_APPLICATION_CREDENTIALS` file (service account or
/// authorized user), refreshed by the google-cloud token source when they expire.
///
/// The token source is async; it runs on a private current-thread runtime so
/// callers stay blocking and sequential.
pub struct GoogleTokens {
    runtime: Runtime,
    source: Box<dyn TokenSource>,
}

impl GoogleTokens {
    pub fn from_file(path: &Path) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building auth runtime")?;

        let file_path = path.display().to_string();
        let source = runtime
            .block_on(async {
                let credentials = CredentialsFile::new_from_file(file_path).await?;
                let config = Config::default().with_scopes(&SCOPES);
                create_token_source_from_credentials(&credentials, &config).await
            })
            .with_context(|| format!("loading credentials file {}", path.display()))?;

        Ok(Self { runtime, source })
    }
}

impl AccessTokens for GoogleTokens {
    fn access_token(&self) -> Result<String> {
        let token = self
            .runtime
            .block_on(self.source.token())
            .context("obtaining BigQuery access token")?;
        debug!(token_type = %token.token_type, "access token ready");
        Ok(token.access_token)
    }
}

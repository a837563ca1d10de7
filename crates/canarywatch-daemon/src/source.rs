//! HTTP-backed repository metadata source.
//!
//! The fetch carries an explicit timeout; any transport, status, or parse
//! failure surfaces as an error that the probe layer converts to the
//! fail-safe maximum risk. Retries, if ever added, must happen before the
//! deadline fires, never after.

use std::time::Duration;

use async_trait::async_trait;
use canarywatch_core::signals::health::{MetadataSource, RepoMetadata};
use canarywatch_core::{CanaryWatchError, Result};

const USER_AGENT: &str = concat!("CanaryWatch/", env!("CARGO_PKG_VERSION"));

/// Fetches repository metadata from a configured URL.
pub struct HttpMetadataSource {
    http: reqwest::Client,
    url: String,
}

impl HttpMetadataSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                CanaryWatchError::MetadataFetch(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch(&self) -> Result<RepoMetadata> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CanaryWatchError::MetadataFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| CanaryWatchError::MetadataFetch(e.to_string()))?;

        response
            .json::<RepoMetadata>()
            .await
            .map_err(|e| CanaryWatchError::MetadataFetch(format!("malformed response: {e}")))
    }
}

/// Source used when no metadata URL is configured. Always errors, so the
/// probe scores the fail-safe maximum rather than a falsely reassuring zero.
pub struct UnconfiguredSource;

#[async_trait]
impl MetadataSource for UnconfiguredSource {
    async fn fetch(&self) -> Result<RepoMetadata> {
        Err(CanaryWatchError::MetadataFetch(
            "no metadata URL configured".to_string(),
        ))
    }
}

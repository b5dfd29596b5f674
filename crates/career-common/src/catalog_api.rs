/// HTTP client for the remote career catalog service.
///
/// Every call is a single attempt bounded by the configured timeout. There is no retry
/// loop here: callers that need resilience fall back to other sources instead.
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct CatalogApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_error_body_bytes: usize,
}

impl CatalogApiConfig {
    /// Build the client configuration from environment variables.
    ///
    /// Returns `None` when `CATALOG_API_URL` is unset, which disables the remote source.
    ///
    /// Optional:
    /// - `CATALOG_API_TIMEOUT_SECS` (default 10)
    /// - `CATALOG_API_MAX_ERROR_BODY_BYTES` (default 8192)
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("CATALOG_API_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())?;

        let timeout = std::env::var("CATALOG_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(10));

        let max_error_body_bytes = std::env::var("CATALOG_API_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Some(Self::new(base_url, timeout, max_error_body_bytes))
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration, max_error_body_bytes: usize) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            max_error_body_bytes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned error: status={status} body={body}")]
    Upstream { status: StatusCode, body: String },
}

impl CatalogApiError {
    /// Whether the failure looks like the service being unreachable rather than rejecting
    /// the request.
    pub fn is_unreachable(&self) -> bool {
        match self {
            CatalogApiError::Request(e) => e.is_timeout() || e.is_connect(),
            CatalogApiError::Upstream { status, .. } => status.is_server_error(),
        }
    }
}

#[derive(Clone)]
pub struct CatalogApiClient {
    config: CatalogApiConfig,
    http: reqwest::Client,
}

impl CatalogApiClient {
    pub fn new(config: CatalogApiConfig) -> Result<Self, CatalogApiError> {
        let http = reqwest::Client::builder()
            .user_agent("career-engine/catalog")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &CatalogApiConfig {
        &self.config
    }

    /// `GET {base_url}/{path}?{query}` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogApiError> {
        let url = format!("{}/{}", self.config.base_url, path.trim_start_matches('/'));
        let resp = self
            .http
            .get(&url)
            .timeout(self.config.timeout)
            .query(query)
            .send()
            .await?;

        if resp.status().is_success() {
            return Ok(resp.json::<T>().await?);
        }

        let status = resp.status();
        let body = read_limited_text(resp, self.config.max_error_body_bytes).await;
        Err(CatalogApiError::Upstream { status, body })
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

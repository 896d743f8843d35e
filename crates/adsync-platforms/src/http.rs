//! Shared HTTP plumbing for the platform adapters.

use std::time::Duration;

use adsync_core::AppConfig;
use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode, Url};

use crate::error::PlatformError;

/// Timeout, identity, and retry policy shared by every adapter.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Additional attempts after the first failure for transient errors.
    pub max_retries: u32,
    /// Base delay for exponential back-off: `backoff_base_ms * 2^(n-1)`.
    pub backoff_base_ms: u64,
}

impl HttpSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.request_timeout_secs,
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            backoff_base_ms: config.retry_backoff_base_ms,
        }
    }

    /// Builds a `reqwest::Client` with the configured timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the client cannot be constructed.
    pub fn build_client(&self) -> Result<Client, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&self.user_agent)
            .build()?;
        Ok(client)
    }
}

/// Parses a base URL, ensuring it ends with exactly one slash so that
/// [`Url::join`] appends to it instead of replacing the last segment.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, PlatformError> {
    let normalised = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| PlatformError::InvalidBaseUrl {
        url: raw.to_owned(),
        reason: e.to_string(),
    })
}

pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url, PlatformError> {
    base.join(path).map_err(|e| PlatformError::InvalidBaseUrl {
        url: format!("{base}{path}"),
        reason: e.to_string(),
    })
}

/// Reads a response body as JSON.
///
/// Error envelopes are often sent with a 4xx status, so any JSON body is
/// returned for the caller to inspect. 429 and 5xx statuses always fail so
/// they can be retried.
pub(crate) async fn read_json(response: Response) -> Result<serde_json::Value, PlatformError> {
    let status = response.status();
    let url = response.url().to_string();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response.headers().get(RETRY_AFTER).and_then(parse_retry_after);
        return Err(PlatformError::Throttled { url, retry_after });
    }
    if status.is_server_error() {
        return Err(PlatformError::UnexpectedStatus {
            status: status.as_u16(),
            url,
        });
    }

    let body = response.text().await?;
    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(_) if !status.is_success() => Err(PlatformError::UnexpectedStatus {
            status: status.as_u16(),
            url,
        }),
        Err(e) => Err(PlatformError::Deserialize {
            context: url,
            source: e,
        }),
    }
}

/// Reads a `Retry-After` header given in seconds. The HTTP-date form is not
/// used by the ad platforms and yields `None`.
pub(crate) fn parse_retry_after(value: &HeaderValue) -> Option<Duration> {
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Reads a response body as text, failing on any non-2xx status.
pub(crate) async fn read_text(response: Response) -> Result<String, PlatformError> {
    let status = response.status();
    if !status.is_success() {
        return Err(PlatformError::UnexpectedStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response.text().await?)
}

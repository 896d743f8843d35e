use adsync_core::Platform;
use thiserror::Error;

/// Errors raised while talking to an advertising platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The platform asked the client to slow down, either with HTTP 429 or
    /// with a rate-limit code in its error envelope.
    #[error("{url} is throttling requests")]
    Throttled {
        url: String,
        retry_after: Option<std::time::Duration>,
    },

    /// The platform reported that the credential or session has expired.
    #[error("{platform} credentials expired")]
    AuthExpired { platform: Platform },

    /// The platform answered with an error envelope.
    #[error("{platform} API error {code}: {message}")]
    Api {
        platform: Platform,
        code: i64,
        message: String,
    },

    /// The response parsed as JSON/HTML but not in the expected shape.
    #[error("malformed {platform} response for {context}: {reason}")]
    MalformedResponse {
        platform: Platform,
        context: String,
        reason: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The currency conversion rate could not be obtained.
    #[error("currency rate unavailable: {0}")]
    RateUnavailable(String),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl PlatformError {
    /// Fatal errors abort the whole run instead of being contained inside
    /// the adapter that hit them.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlatformError::RateUnavailable(_))
    }
}

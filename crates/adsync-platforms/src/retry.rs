//! Retry policy for platform requests.
//!
//! Network failures and 5xx responses are retried with exponential back-off.
//! Throttled responses are retried after the delay the platform asked for,
//! falling back to the same back-off when it gave none. Error envelopes are
//! never retried: an expired token or a bad campaign id will not fix itself.

use std::future::Future;
use std::time::Duration;

use crate::error::PlatformError;

/// Upper bound for any single wait, including server-provided ones.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Returns `true` for errors that are worth retrying after a delay.
pub(crate) fn is_retriable(err: &PlatformError) -> bool {
    match err {
        PlatformError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_request()
                || e.status().is_some_and(|s| s.is_server_error())
        }
        PlatformError::UnexpectedStatus { status, .. } => *status >= 500,
        PlatformError::Throttled { .. } => true,
        PlatformError::AuthExpired { .. }
        | PlatformError::Api { .. }
        | PlatformError::MalformedResponse { .. }
        | PlatformError::Deserialize { .. }
        | PlatformError::RateUnavailable(_)
        | PlatformError::InvalidBaseUrl { .. } => false,
    }
}

/// Wait before retry number `retry` (1-based).
///
/// A server hint is obeyed as given, up to [`MAX_DELAY`]. Otherwise the wait
/// is `backoff_base_ms * 2^(retry-1)`, capped, of which the upper half is
/// randomised so that parallel clients do not retry in lockstep.
pub(crate) fn retry_delay(retry: u32, backoff_base_ms: u64, hint: Option<Duration>) -> Duration {
    if let Some(hint) = hint {
        return hint.min(MAX_DELAY);
    }
    let exponent = retry.saturating_sub(1).min(16);
    let ceiling =
        Duration::from_millis(backoff_base_ms.saturating_mul(1u64 << exponent)).min(MAX_DELAY);
    let half = ceiling / 2;
    let spread = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
    half + Duration::from_millis(rand::random_range(0..=spread))
}

/// Runs `operation`, retrying retriable failures up to `max_retries` times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let mut retries = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if retries == max_retries || !is_retriable(&err) {
            return Err(err);
        }
        retries += 1;

        let hint = match &err {
            PlatformError::Throttled { retry_after, .. } => *retry_after,
            _ => None,
        };
        let delay = retry_delay(retries, backoff_base_ms, hint);
        tracing::warn!(
            retry = retries,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "platform request failed; retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use adsync_core::Platform;

    use super::*;

    #[test]
    fn auth_expired_is_not_retriable() {
        assert!(!is_retriable(&PlatformError::AuthExpired {
            platform: Platform::SocialGraph
        }));
    }

    #[test]
    fn server_error_status_is_retriable() {
        assert!(is_retriable(&PlatformError::UnexpectedStatus {
            status: 502,
            url: "https://example.test".to_owned(),
        }));
        assert!(!is_retriable(&PlatformError::UnexpectedStatus {
            status: 403,
            url: "https://example.test".to_owned(),
        }));
    }

    #[test]
    fn throttling_is_retriable() {
        assert!(is_retriable(&PlatformError::Throttled {
            url: "https://example.test".to_owned(),
            retry_after: None,
        }));
    }

    #[test]
    fn server_hint_overrides_backoff_but_is_capped() {
        assert_eq!(
            retry_delay(3, 1_000, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(retry_delay(1, 1_000, Some(Duration::from_secs(600))), MAX_DELAY);
    }

    #[test]
    fn backoff_doubles_within_jitter_band() {
        for retry in 1..=3 {
            let ceiling = Duration::from_millis(1_000 * (1 << (retry - 1)));
            let delay = retry_delay(retry, 1_000, None);
            assert!(delay >= ceiling / 2 && delay <= ceiling, "retry {retry}: {delay:?}");
        }
        assert!(retry_delay(40, 1_000, None) <= MAX_DELAY);
        assert_eq!(retry_delay(1, 0, None), Duration::ZERO);
    }

    #[tokio::test]
    async fn retries_throttled_requests_after_hint() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(PlatformError::Throttled {
                        url: "https://example.test".to_owned(),
                        retry_after: Some(Duration::ZERO),
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_api_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(PlatformError::Api {
                    platform: Platform::NetworkAds,
                    code: 100,
                    message: "bad campaign".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "API errors must not be retried");
        assert!(matches!(result, Err(PlatformError::Api { .. })));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err::<u32, _>(PlatformError::UnexpectedStatus {
                        status: 503,
                        url: "https://example.test".to_owned(),
                    })
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(PlatformError::UnexpectedStatus {
                    status: 500,
                    url: "https://example.test".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.is_err());
    }
}

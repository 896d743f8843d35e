//! The three concrete platform adapters and the helpers they share.

mod native_mobile;
mod network_ads;
mod social_graph;

pub use native_mobile::NativeMobileAdapter;
pub use network_ads::NetworkAdsAdapter;
pub use social_graph::SocialGraphAdapter;

use std::collections::BTreeMap;

use adsync_core::MetricValue;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;

use crate::error::PlatformError;
use crate::http::{read_json, HttpSettings};
use crate::retry::retry_with_backoff;

/// Reads a numeric metric from JSON. Platforms send counters as integers
/// and money as either numbers or numeric strings (`"123.45"`).
pub(crate) fn metric_value(value: &Value) -> Option<MetricValue> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(MetricValue::Int)
            .or_else(|| n.as_f64().map(MetricValue::Float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(MetricValue::Int)
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(MetricValue::Float))
                .filter(|v| v.as_f64().is_finite())
        }
        _ => None,
    }
}

/// Reads an identifier that may arrive as a JSON number or string.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn with_headers(
    mut request: RequestBuilder,
    headers: &BTreeMap<String, String>,
) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

/// Network-Ads `error.error_code` values that mean "slow down".
const NETWORK_ADS_THROTTLE_CODES: [i64; 2] = [6, 9];
/// Social-Graph-Ads `error.code` values that mean "slow down".
const SOCIAL_GRAPH_THROTTLE_CODES: [i64; 3] = [4, 17, 613];

/// Whether `body` is an error envelope carrying one of the platforms'
/// rate-limit codes.
pub(crate) fn is_throttle_envelope(body: &Value) -> bool {
    let Some(error) = body.get("error") else {
        return false;
    };
    let code_in = |field: &str, codes: &[i64]| {
        error
            .get(field)
            .and_then(Value::as_i64)
            .is_some_and(|code| codes.contains(&code))
    };
    code_in("error_code", &NETWORK_ADS_THROTTLE_CODES)
        || code_in("code", &SOCIAL_GRAPH_THROTTLE_CODES)
}

/// GETs `url` with the given query and headers, retrying transient failures
/// and throttled responses.
pub(crate) async fn get_json(
    client: &Client,
    settings: &HttpSettings,
    url: &Url,
    query: &[(String, String)],
    headers: &BTreeMap<String, String>,
) -> Result<Value, PlatformError> {
    retry_with_backoff(settings.max_retries, settings.backoff_base_ms, || {
        let request = with_headers(client.get(url.clone()).query(query), headers);
        let url = url.to_string();
        async move {
            let body = read_json(request.send().await?).await?;
            if is_throttle_envelope(&body) {
                return Err(PlatformError::Throttled {
                    url,
                    retry_after: None,
                });
            }
            Ok(body)
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn metric_value_reads_numbers_and_numeric_strings() {
        assert_eq!(metric_value(&json!(1200)), Some(MetricValue::Int(1200)));
        assert_eq!(metric_value(&json!(12.5)), Some(MetricValue::Float(12.5)));
        assert_eq!(metric_value(&json!("340")), Some(MetricValue::Int(340)));
        assert_eq!(
            metric_value(&json!("100.25")),
            Some(MetricValue::Float(100.25))
        );
    }

    #[test]
    fn metric_value_rejects_non_numeric() {
        assert_eq!(metric_value(&json!(null)), None);
        assert_eq!(metric_value(&json!("n/a")), None);
        assert_eq!(metric_value(&json!({"value": 1})), None);
    }

    #[test]
    fn throttle_envelopes_are_recognised_per_platform() {
        assert!(is_throttle_envelope(
            &json!({"error": {"error_code": 6, "error_msg": "Too many requests per second"}})
        ));
        assert!(is_throttle_envelope(
            &json!({"error": {"code": 17, "message": "User request limit reached"}})
        ));
        assert!(!is_throttle_envelope(
            &json!({"error": {"error_code": 5, "error_msg": "User authorization failed"}})
        ));
        assert!(!is_throttle_envelope(&json!({"error": {"code": 190}})));
        assert!(!is_throttle_envelope(&json!({"response": []})));
    }

    #[test]
    fn id_string_accepts_numbers_and_strings() {
        assert_eq!(id_string(&json!(34482609)).as_deref(), Some("34482609"));
        assert_eq!(id_string(&json!(" 777 ")).as_deref(), Some("777"));
        assert_eq!(id_string(&json!("")), None);
    }
}

//! Network-Ads statistics adapter.
//!
//! One `ads.getStatistics` call per campaign. Month mode returns a single
//! aggregate entry; day mode returns one entry per day which is summed here.
//! An error envelope or an empty stats list aborts the rest of the batch and
//! the records collected so far are returned.

use std::collections::BTreeMap;

use adsync_core::{
    CampaignDescriptor, Metric, MetricRecord, NetworkAdsCredentials, Platform, WantedMetric,
};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use super::{get_json, metric_value};
use crate::adapter::{AdapterOutcome, PlatformAdapter};
use crate::error::PlatformError;
use crate::http::{join_url, parse_base_url, read_json, HttpSettings};

const DEFAULT_BASE_URL: &str = "https://api.vk.com/method/";
const STATISTICS_METHOD: &str = "ads.getStatistics";
const COLLECTED: [Metric; 4] = [
    Metric::Spent,
    Metric::Impressions,
    Metric::Clicks,
    Metric::Reach,
];
/// Error code the platform uses for an invalid or expired access token.
const AUTH_FAILED_CODE: i64 = 5;

pub struct NetworkAdsAdapter {
    client: Client,
    base_url: Url,
    credentials: NetworkAdsCredentials,
    settings: HttpSettings,
}

impl NetworkAdsAdapter {
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the HTTP client cannot be built.
    pub fn new(
        settings: &HttpSettings,
        credentials: NetworkAdsCredentials,
    ) -> Result<Self, PlatformError> {
        Self::with_base_url(settings, credentials, DEFAULT_BASE_URL)
    }

    /// Creates an adapter pointing at a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the HTTP client cannot be built or
    /// [`PlatformError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        settings: &HttpSettings,
        credentials: NetworkAdsCredentials,
        base_url: &str,
    ) -> Result<Self, PlatformError> {
        Ok(Self {
            client: settings.build_client()?,
            base_url: parse_base_url(base_url)?,
            credentials,
            settings: settings.clone(),
        })
    }

    /// Sends the statistics request as a GET; if the GET cannot be delivered
    /// at all, the same parameters are sent once more as a form POST.
    async fn request_stats(&self, descriptor: &CampaignDescriptor) -> Result<Value, PlatformError> {
        let url = join_url(&self.base_url, STATISTICS_METHOD)?;
        let params = request_params(&self.credentials, descriptor);

        match get_json(&self.client, &self.settings, &url, &params, &BTreeMap::new()).await {
            Err(PlatformError::Http(e)) => {
                tracing::debug!(
                    campaign_id = %descriptor.campaign_id,
                    error = %e,
                    "GET statistics request failed; falling back to POST"
                );
                let response = self.client.post(url).form(&params).send().await?;
                read_json(response).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl PlatformAdapter for NetworkAdsAdapter {
    fn platform(&self) -> Platform {
        Platform::NetworkAds
    }

    async fn fetch_stats(
        &self,
        descriptors: &[CampaignDescriptor],
    ) -> Result<AdapterOutcome, PlatformError> {
        tracing::info!(
            platform = %Platform::NetworkAds,
            campaigns = descriptors.len(),
            "requesting statistics"
        );
        let mut records = BTreeMap::new();

        for descriptor in descriptors {
            let parsed = match self.request_stats(descriptor).await {
                Ok(body) => parse_response(&body, descriptor),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(record) => {
                    tracing::info!(
                        campaign_id = %descriptor.campaign_id,
                        metrics = record.len(),
                        "statistics extracted"
                    );
                    records.insert(descriptor.campaign_id.clone(), record);
                }
                Err(e) => {
                    tracing::warn!(
                        campaign_id = %descriptor.campaign_id,
                        error = %e,
                        collected = records.len(),
                        "statistics request failed; aborting the rest of the batch"
                    );
                    break;
                }
            }
        }

        Ok(AdapterOutcome::from_records(records))
    }
}

/// Query parameters for one campaign's statistics request.
pub(crate) fn request_params(
    credentials: &NetworkAdsCredentials,
    descriptor: &CampaignDescriptor,
) -> Vec<(String, String)> {
    let range = &descriptor.date_range;
    let (period, date_from, date_to) = if range.is_current_month() {
        (
            "month",
            "0".to_string(),
            range.from.format("%Y-%m").to_string(),
        )
    } else {
        (
            "day",
            range.from.format("%Y-%m-%d").to_string(),
            range.until.format("%Y-%m-%d").to_string(),
        )
    };

    vec![
        ("account_id".to_string(), credentials.ad_account_id.clone()),
        ("ids_type".to_string(), "campaign".to_string()),
        ("ids".to_string(), descriptor.campaign_id.clone()),
        ("period".to_string(), period.to_string()),
        ("date_from".to_string(), date_from),
        ("date_to".to_string(), date_to),
        ("access_token".to_string(), credentials.access_token.clone()),
        ("v".to_string(), credentials.api_version.clone()),
    ]
}

/// Turns a statistics response into one record for `descriptor`.
///
/// Every wanted metric is summed across the entries that carry it; a metric
/// missing from every entry is left out of the record and logged.
pub(crate) fn parse_response(
    body: &Value,
    descriptor: &CampaignDescriptor,
) -> Result<MetricRecord, PlatformError> {
    if let Some(error) = body.get("error") {
        let code = error
            .get("error_code")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        if code == AUTH_FAILED_CODE {
            return Err(PlatformError::AuthExpired {
                platform: Platform::NetworkAds,
            });
        }
        let message = error
            .get("error_msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(PlatformError::Api {
            platform: Platform::NetworkAds,
            code,
            message,
        });
    }

    let stats = body
        .get("response")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("stats"))
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(descriptor, "missing response[0].stats"))?;
    if stats.is_empty() {
        return Err(malformed(descriptor, "empty stats list"));
    }

    let mut record = MetricRecord::new();
    let mut not_available = Vec::new();
    for metric in COLLECTED {
        let Some(wanted) = metric_as_wanted(metric) else {
            continue;
        };
        if !descriptor.wants(wanted) {
            continue;
        }
        let mut seen = false;
        for entry in stats {
            if let Some(value) = entry.get(metric.as_str()).and_then(metric_value) {
                record.accumulate(metric, value);
                seen = true;
            }
        }
        if !seen {
            not_available.push(metric.as_str());
        }
    }

    if !descriptor.date_range.is_current_month() {
        let first = stats.first().and_then(|e| e.get("day")).and_then(Value::as_str);
        let last = stats.last().and_then(|e| e.get("day")).and_then(Value::as_str);
        if let (Some(first), Some(last)) = (first, last) {
            tracing::info!(
                campaign_id = %descriptor.campaign_id,
                from = first,
                until = last,
                days = stats.len(),
                "daily statistics summed"
            );
        }
    }
    if !not_available.is_empty() {
        tracing::info!(
            campaign_id = %descriptor.campaign_id,
            metrics = ?not_available,
            "metrics not available"
        );
    }

    Ok(record)
}

fn metric_as_wanted(metric: Metric) -> Option<WantedMetric> {
    match metric {
        Metric::Spent => Some(WantedMetric::Spent),
        Metric::Impressions => Some(WantedMetric::Impressions),
        Metric::Clicks => Some(WantedMetric::Clicks),
        Metric::Reach => Some(WantedMetric::Reach),
        Metric::Result => None,
    }
}

fn malformed(descriptor: &CampaignDescriptor, reason: &str) -> PlatformError {
    PlatformError::MalformedResponse {
        platform: Platform::NetworkAds,
        context: format!("campaign {}", descriptor.campaign_id),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use adsync_core::{DateRange, MetricValue};
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn descriptor(range: DateRange, wanted: &[WantedMetric]) -> CampaignDescriptor {
        CampaignDescriptor {
            client_id: None,
            campaign_id: "1001".to_string(),
            date_range: range,
            wanted_metrics: wanted.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn credentials() -> NetworkAdsCredentials {
        NetworkAdsCredentials {
            ad_account_id: "42".to_string(),
            access_token: "tok".to_string(),
            api_version: "5.124".to_string(),
        }
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> &'a str {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn month_mode_params() {
        let d = descriptor(DateRange::current_month(date(2026, 10, 16)), &[WantedMetric::Spent]);
        let params = request_params(&credentials(), &d);
        assert_eq!(param(&params, "period"), "month");
        assert_eq!(param(&params, "date_from"), "0");
        assert_eq!(param(&params, "date_to"), "2026-10");
        assert_eq!(param(&params, "ids"), "1001");
        assert_eq!(param(&params, "v"), "5.124");
    }

    #[test]
    fn day_mode_params() {
        let d = descriptor(
            DateRange::explicit(date(2026, 10, 1), date(2026, 10, 3)),
            &[WantedMetric::Spent],
        );
        let params = request_params(&credentials(), &d);
        assert_eq!(param(&params, "period"), "day");
        assert_eq!(param(&params, "date_from"), "2026-10-01");
        assert_eq!(param(&params, "date_to"), "2026-10-03");
    }

    #[test]
    fn sums_daily_entries() {
        let d = descriptor(
            DateRange::explicit(date(2026, 10, 1), date(2026, 10, 3)),
            &[WantedMetric::Spent, WantedMetric::Impressions, WantedMetric::Clicks],
        );
        let body = json!({"response": [{"id": 1001, "stats": [
            {"day": "2026-10-01", "spent": "10.50", "impressions": 100, "clicks": 3},
            {"day": "2026-10-02", "spent": "4.25", "impressions": 50},
            {"day": "2026-10-03", "spent": 1, "impressions": 25, "clicks": 2}
        ]}]});
        let record = parse_response(&body, &d).unwrap();
        assert!((record.spent().unwrap() - 15.75).abs() < 1e-9);
        assert_eq!(record.get(Metric::Impressions), Some(MetricValue::Int(175)));
        assert_eq!(record.get(Metric::Clicks), Some(MetricValue::Int(5)));
    }

    #[test]
    fn metric_absent_from_every_day_is_not_zero() {
        let d = descriptor(
            DateRange::explicit(date(2026, 10, 1), date(2026, 10, 2)),
            &[WantedMetric::Spent, WantedMetric::Reach],
        );
        let body = json!({"response": [{"stats": [
            {"day": "2026-10-01", "spent": "1.0"},
            {"day": "2026-10-02", "spent": "2.0"}
        ]}]});
        let record = parse_response(&body, &d).unwrap();
        assert_eq!(record.get(Metric::Reach), None);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn unwanted_metrics_are_not_collected() {
        let d = descriptor(DateRange::current_month(date(2026, 10, 1)), &[WantedMetric::Clicks]);
        let body = json!({"response": [{"stats": [
            {"month": "2026-10", "spent": "99.0", "impressions": 10, "clicks": 1}
        ]}]});
        let record = parse_response(&body, &d).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.get(Metric::Clicks), Some(MetricValue::Int(1)));
    }

    #[test]
    fn error_envelope_maps_to_api_error() {
        let d = descriptor(DateRange::current_month(date(2026, 10, 1)), &[WantedMetric::Spent]);
        let body = json!({"error": {
            "error_code": 100,
            "error_msg": "One of the parameters specified was missing or invalid"
        }});
        assert!(matches!(
            parse_response(&body, &d),
            Err(PlatformError::Api { code: 100, .. })
        ));
    }

    #[test]
    fn auth_error_maps_to_auth_expired() {
        let d = descriptor(DateRange::current_month(date(2026, 10, 1)), &[WantedMetric::Spent]);
        let body = json!({"error": {"error_code": 5, "error_msg": "User authorization failed"}});
        assert!(matches!(
            parse_response(&body, &d),
            Err(PlatformError::AuthExpired { .. })
        ));
    }

    #[test]
    fn empty_stats_is_malformed() {
        let d = descriptor(DateRange::current_month(date(2026, 10, 1)), &[WantedMetric::Spent]);
        let body = json!({"response": [{"id": 1001, "stats": []}]});
        assert!(matches!(
            parse_response(&body, &d),
            Err(PlatformError::MalformedResponse { .. })
        ));
    }
}

//! Native-Mobile-Ads statistics adapter.
//!
//! Works against the dashboard's JSON endpoints using the browser session
//! cookies. Each external client id is first resolved to the numeric id the
//! dashboard uses internally; the lookup is memoized for one batch only.
//! Campaigns whose request fails are skipped and the batch continues.

use std::collections::BTreeMap;

use adsync_core::{CampaignDescriptor, Metric, MetricRecord, NativeMobileSettings, Platform};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use super::{get_json, id_string, metric_value, with_headers};
use crate::adapter::{AdapterOutcome, PlatformAdapter};
use crate::cookies::CookieJar;
use crate::error::PlatformError;
use crate::http::{join_url, parse_base_url, read_text, HttpSettings};
use crate::scrape::extract_internal_client_id;

const DEFAULT_BASE_URL: &str = "https://target.my.com/";
const DASHBOARD_PATH: &str = "dashboard";
const DAY_STATS_PATH: &str = "api/v3/statistics/campaigns/day.json";

pub struct NativeMobileAdapter {
    client: Client,
    base_url: Url,
    settings: NativeMobileSettings,
    cookies: CookieJar,
    http: HttpSettings,
}

impl NativeMobileAdapter {
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the HTTP client cannot be built.
    pub fn new(
        http: &HttpSettings,
        settings: NativeMobileSettings,
        cookies: CookieJar,
    ) -> Result<Self, PlatformError> {
        Self::with_base_url(http, settings, cookies, DEFAULT_BASE_URL)
    }

    /// Creates an adapter pointing at a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the HTTP client cannot be built or
    /// [`PlatformError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        http: &HttpSettings,
        settings: NativeMobileSettings,
        cookies: CookieJar,
        base_url: &str,
    ) -> Result<Self, PlatformError> {
        Ok(Self {
            client: http.build_client()?,
            base_url: parse_base_url(base_url)?,
            settings,
            cookies,
            http: http.clone(),
        })
    }

    fn cookie_header(&self) -> Option<String> {
        self.base_url
            .host_str()
            .and_then(|host| self.cookies.header_for(host))
    }

    fn request_headers(&self, client_id: &str) -> Result<BTreeMap<String, String>, PlatformError> {
        let mut headers = self.settings.headers.clone();
        headers.insert("X-Target-Sudo".to_string(), client_id.to_string());
        headers.insert("Referer".to_string(), self.dashboard_url(client_id)?.to_string());
        if let Some(cookie) = self.cookie_header() {
            headers.insert("Cookie".to_string(), cookie);
        }
        Ok(headers)
    }

    fn dashboard_url(&self, client_id: &str) -> Result<Url, PlatformError> {
        let mut url = join_url(&self.base_url, DASHBOARD_PATH)?;
        url.query_pairs_mut().append_pair("sudo", client_id);
        Ok(url)
    }

    /// Loads the dashboard as `client_id` and reads the internal id off the
    /// page. `Ok(None)` means the page did not carry one.
    async fn resolve_internal_id(&self, client_id: &str) -> Result<Option<String>, PlatformError> {
        let mut request = with_headers(
            self.client.get(self.dashboard_url(client_id)?),
            &self.settings.headers,
        );
        if let Some(cookie) = self.cookie_header() {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        let html = read_text(request.send().await?).await?;
        Ok(extract_internal_client_id(&html))
    }

    /// Resolves every distinct client id once. Failed lookups are memoized
    /// as `None` so the dashboard is not requested again for that client.
    async fn resolve_internal_ids(
        &self,
        descriptors: &[CampaignDescriptor],
    ) -> BTreeMap<String, Option<String>> {
        let mut internal_ids = BTreeMap::new();
        for client_id in descriptors.iter().filter_map(|d| d.client_id.as_deref()) {
            if internal_ids.contains_key(client_id) {
                continue;
            }
            let resolved = match self.resolve_internal_id(client_id).await {
                Ok(Some(internal)) => {
                    tracing::debug!(
                        client_id,
                        internal_id = %internal,
                        "resolved internal client id"
                    );
                    Some(internal)
                }
                Ok(None) => {
                    tracing::warn!(client_id, "dashboard page carried no internal client id");
                    None
                }
                Err(e) => {
                    tracing::warn!(client_id, error = %e, "could not load dashboard page");
                    None
                }
            };
            internal_ids.insert(client_id.to_string(), resolved);
        }
        internal_ids
    }

    async fn request_campaign(
        &self,
        client_id: &str,
        internal_id: &str,
        descriptor: &CampaignDescriptor,
    ) -> Result<Value, PlatformError> {
        let url = join_url(&self.base_url, DAY_STATS_PATH)?;
        let headers = self.request_headers(client_id)?;
        let query = stats_params(
            &self.settings.params,
            internal_id,
            descriptor,
            chrono::Utc::now().timestamp_millis(),
        );
        get_json(&self.client, &self.http, &url, &query, &headers).await
    }
}

#[async_trait]
impl PlatformAdapter for NativeMobileAdapter {
    fn platform(&self) -> Platform {
        Platform::NativeMobile
    }

    async fn fetch_stats(
        &self,
        descriptors: &[CampaignDescriptor],
    ) -> Result<AdapterOutcome, PlatformError> {
        tracing::info!(
            platform = %Platform::NativeMobile,
            campaigns = descriptors.len(),
            "requesting statistics"
        );
        let internal_ids = self.resolve_internal_ids(descriptors).await;
        let mut records = BTreeMap::new();

        for descriptor in descriptors {
            let Some(client_id) = descriptor.client_id.as_deref() else {
                tracing::warn!(
                    campaign_id = %descriptor.campaign_id,
                    "descriptor has no client id; skipping"
                );
                continue;
            };
            let Some(Some(internal_id)) = internal_ids.get(client_id) else {
                tracing::warn!(
                    client_id,
                    campaign_id = %descriptor.campaign_id,
                    "internal client id unknown; skipping campaign"
                );
                continue;
            };

            let parsed = match self.request_campaign(client_id, internal_id, descriptor).await {
                Ok(body) => parse_response(&body),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(items) => {
                    for (campaign_id, mut record) in items {
                        record.retain_wanted(&descriptor.wanted_metrics);
                        records.insert(campaign_id, record);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        client_id,
                        campaign_id = %descriptor.campaign_id,
                        error = %e,
                        "statistics request failed; skipping campaign"
                    );
                }
            }
        }

        tracing::info!(
            platform = %Platform::NativeMobile,
            campaigns = records.len(),
            "statistics extracted"
        );
        Ok(AdapterOutcome::from_records(records))
    }
}

/// Query for the daily statistics endpoint. `timestamp_ms` is sent as the
/// `_` cache-buster.
pub(crate) fn stats_params(
    extra: &BTreeMap<String, String>,
    internal_id: &str,
    descriptor: &CampaignDescriptor,
    timestamp_ms: i64,
) -> Vec<(String, String)> {
    let mut params: BTreeMap<String, String> = extra.clone();
    params.insert("id".to_string(), descriptor.campaign_id.clone());
    params.insert(
        "date_from".to_string(),
        descriptor.date_range.from.format("%d.%m.%Y").to_string(),
    );
    params.insert(
        "date_to".to_string(),
        descriptor.date_range.until.format("%d.%m.%Y").to_string(),
    );
    params.insert("adv_user".to_string(), internal_id.to_string());
    params.insert("_".to_string(), timestamp_ms.to_string());
    params.into_iter().collect()
}

/// Reads `items[].total` into one record per campaign id.
pub(crate) fn parse_response(body: &Value) -> Result<Vec<(String, MetricRecord)>, PlatformError> {
    if let Some(error) = body.get("error") {
        return Err(PlatformError::Api {
            platform: Platform::NativeMobile,
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| error.get("code").and_then(Value::as_str))
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| PlatformError::MalformedResponse {
            platform: Platform::NativeMobile,
            context: DAY_STATS_PATH.to_string(),
            reason: "missing items".to_string(),
        })?;

    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        let Some(campaign_id) = item.get("id").and_then(id_string) else {
            tracing::debug!("statistics item without id; skipping");
            continue;
        };
        let mut record = MetricRecord::new();
        for (metric, pointer) in [
            (Metric::Impressions, "/total/base/shows"),
            (Metric::Clicks, "/total/base/clicks"),
            (Metric::Spent, "/total/base/spent"),
            (Metric::Reach, "/total/uniques/increment"),
        ] {
            if let Some(value) = item.pointer(pointer).and_then(metric_value) {
                record.insert(metric, value);
            }
        }
        parsed.push((campaign_id, record));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use adsync_core::{DateRange, MetricValue, WantedMetric};
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    #[test]
    fn params_use_dotted_dates_and_cache_buster() {
        let descriptor = CampaignDescriptor {
            client_id: Some("client@example.test".to_string()),
            campaign_id: "34482609".to_string(),
            date_range: DateRange::explicit(
                NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 9).unwrap(),
            ),
            wanted_metrics: BTreeSet::from([WantedMetric::Spent]),
        };
        let extra = BTreeMap::from([("metrics".to_string(), "base,uniques".to_string())]);
        let params: BTreeMap<String, String> =
            stats_params(&extra, "9876543", &descriptor, 1_760_000_000_000)
                .into_iter()
                .collect();
        assert_eq!(params["id"], "34482609");
        assert_eq!(params["date_from"], "01.10.2026");
        assert_eq!(params["date_to"], "09.10.2026");
        assert_eq!(params["adv_user"], "9876543");
        assert_eq!(params["_"], "1760000000000");
        assert_eq!(params["metrics"], "base,uniques");
    }

    #[test]
    fn parses_totals() {
        let body = json!({"items": [{
            "id": 34482609,
            "total": {
                "base": {"shows": 5000, "clicks": 120, "spent": "830.50"},
                "uniques": {"increment": 3100}
            }
        }]});
        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed.len(), 1);
        let (id, record) = &parsed[0];
        assert_eq!(id, "34482609");
        assert_eq!(record.get(Metric::Impressions), Some(MetricValue::Int(5000)));
        assert_eq!(record.get(Metric::Reach), Some(MetricValue::Int(3100)));
        assert_eq!(record.spent(), Some(830.5));
    }

    #[test]
    fn missing_totals_are_left_out() {
        let body = json!({"items": [{"id": "1", "total": {"base": {"shows": 10}}}]});
        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed[0].1.len(), 1);
        assert_eq!(parsed[0].1.get(Metric::Spent), None);
    }

    #[test]
    fn error_envelope_is_api_error() {
        let body = json!({"error": {"code": "not_found", "message": "campaign not found"}});
        assert!(matches!(
            parse_response(&body),
            Err(PlatformError::Api { ref message, .. }) if message == "campaign not found"
        ));
    }
}

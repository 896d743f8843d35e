//! Social-Graph-Ads statistics adapter.
//!
//! Statistics come from the tabular ads-manager endpoint, one call per
//! campaign, filtered by a JSON expression passed as a query parameter.
//! Spend is reported in a foreign currency and converted with the rate from
//! a [`RateProvider`]. When the platform reports an expired token the adapter
//! scrapes a fresh token from the ads manager page once and retries.

use std::collections::BTreeMap;
use std::sync::Arc;

use adsync_core::{
    CampaignDescriptor, Metric, MetricRecord, MetricValue, Platform, SocialGraphCredentials,
};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};

use super::{get_json, id_string, metric_value, with_headers};
use crate::adapter::{AdapterOutcome, PlatformAdapter, SessionUpdate};
use crate::cookies::CookieJar;
use crate::currency::RateProvider;
use crate::error::PlatformError;
use crate::http::{join_url, parse_base_url, read_text, HttpSettings};
use crate::scrape::{extract_session_token, SessionToken};

const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v7.0/";
const DEFAULT_MANAGER_URL: &str = "https://business.facebook.com/adsmanager/manage/campaigns";
/// Graph API error code for an invalid or expired access token.
const TOKEN_EXPIRED_CODE: i64 = 190;
const DELIVERY_STATUSES: [&str; 13] = [
    "active",
    "archived",
    "completed",
    "inactive",
    "limited",
    "not_delivering",
    "not_published",
    "pending_review",
    "permanently_deleted",
    "recently_completed",
    "recently_rejected",
    "rejected",
    "scheduled",
];

pub struct SocialGraphAdapter {
    client: Client,
    graph_base_url: Url,
    manager_url: Url,
    credentials: SocialGraphCredentials,
    cookies: CookieJar,
    rate_provider: Arc<dyn RateProvider>,
    settings: HttpSettings,
}

impl SocialGraphAdapter {
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the HTTP client cannot be built.
    pub fn new(
        settings: &HttpSettings,
        credentials: SocialGraphCredentials,
        cookies: CookieJar,
        rate_provider: Arc<dyn RateProvider>,
    ) -> Result<Self, PlatformError> {
        Self::with_base_urls(
            settings,
            credentials,
            cookies,
            rate_provider,
            DEFAULT_GRAPH_BASE_URL,
            DEFAULT_MANAGER_URL,
        )
    }

    /// Creates an adapter with custom endpoints (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the HTTP client cannot be built or
    /// [`PlatformError::InvalidBaseUrl`] if either URL does not parse.
    pub fn with_base_urls(
        settings: &HttpSettings,
        credentials: SocialGraphCredentials,
        cookies: CookieJar,
        rate_provider: Arc<dyn RateProvider>,
        graph_base_url: &str,
        manager_url: &str,
    ) -> Result<Self, PlatformError> {
        let manager_url = Url::parse(manager_url).map_err(|e| PlatformError::InvalidBaseUrl {
            url: manager_url.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client: settings.build_client()?,
            graph_base_url: parse_base_url(graph_base_url)?,
            manager_url,
            credentials,
            cookies,
            rate_provider,
            settings: settings.clone(),
        })
    }

    async fn request_campaign(
        &self,
        client_id: &str,
        descriptor: &CampaignDescriptor,
        token: &SessionToken,
    ) -> Result<Value, PlatformError> {
        let url = join_url(&self.graph_base_url, &format!("act_{client_id}/am_tabular"))?;
        let mut query: Vec<(String, String)> = self
            .credentials
            .params
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "access_token" | "_sessionID"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        query.push(("access_token".to_string(), token.access_token.clone()));
        query.push(("_sessionID".to_string(), token.session_id.clone()));
        query.push(("filtering".to_string(), filtering_param(&descriptor.campaign_id)));
        query.push(("time_range".to_string(), time_range_param(descriptor)));

        get_json(
            &self.client,
            &self.settings,
            &url,
            &query,
            &self.credentials.headers,
        )
        .await
    }

    /// Fetches the ads manager page with the session cookies and scrapes a
    /// new token pair out of it. `Ok(None)` means the page carried no token,
    /// typically because the cookies no longer hold a logged-in session.
    async fn refresh_session(&self) -> Result<Option<SessionToken>, PlatformError> {
        tracing::info!(platform = %Platform::SocialGraph, "refreshing access token");
        let mut request = with_headers(
            self.client
                .get(self.manager_url.clone())
                .query(&self.credentials.authorize_params),
            &self.credentials.headers,
        );
        if let Some(cookie) = self
            .manager_url
            .host_str()
            .and_then(|host| self.cookies.header_for(host))
        {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        let html = read_text(request.send().await?).await?;
        Ok(extract_session_token(&html))
    }
}

#[async_trait]
impl PlatformAdapter for SocialGraphAdapter {
    fn platform(&self) -> Platform {
        Platform::SocialGraph
    }

    async fn fetch_stats(
        &self,
        descriptors: &[CampaignDescriptor],
    ) -> Result<AdapterOutcome, PlatformError> {
        if descriptors.is_empty() {
            return Ok(AdapterOutcome::default());
        }
        tracing::info!(
            platform = %Platform::SocialGraph,
            campaigns = descriptors.len(),
            "requesting statistics"
        );

        let rate = self.rate_provider.get_rate().await?;

        let mut token = SessionToken {
            access_token: self.credentials.access_token.clone(),
            session_id: self.credentials.session_id.clone(),
        };
        let mut refreshed = false;
        let mut session_update = None;
        let mut records = BTreeMap::new();

        for descriptor in descriptors {
            let Some(client_id) = descriptor.client_id.as_deref() else {
                tracing::warn!(
                    campaign_id = %descriptor.campaign_id,
                    "descriptor has no client id; skipping"
                );
                continue;
            };

            let mut body = match self.request_campaign(client_id, descriptor, &token).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        campaign_id = %descriptor.campaign_id,
                        error = %e,
                        "statistics request failed; skipping campaign"
                    );
                    continue;
                }
            };

            if is_token_expired(&body) {
                if refreshed {
                    tracing::warn!(
                        campaign_id = %descriptor.campaign_id,
                        "token expired again after refresh; stopping"
                    );
                    break;
                }
                match self.refresh_session().await {
                    Ok(Some(fresh)) => {
                        refreshed = true;
                        session_update = Some(SessionUpdate::SocialGraph {
                            access_token: fresh.access_token.clone(),
                            session_id: fresh.session_id.clone(),
                        });
                        token = fresh;
                    }
                    Ok(None) => {
                        tracing::warn!("no usable token on the ads manager page; stopping");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "token refresh failed; stopping");
                        break;
                    }
                }
                body = match self.request_campaign(client_id, descriptor, &token).await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(
                            campaign_id = %descriptor.campaign_id,
                            error = %e,
                            "statistics request failed after refresh; skipping campaign"
                        );
                        continue;
                    }
                };
                if is_token_expired(&body) {
                    tracing::warn!(
                        campaign_id = %descriptor.campaign_id,
                        "refreshed token rejected; stopping"
                    );
                    break;
                }
            }

            match parse_response(&body) {
                Ok((campaign_id, mut record)) => {
                    convert_spent(&mut record, rate);
                    record.retain_wanted(&descriptor.wanted_metrics);
                    tracing::info!(
                        client_id,
                        campaign_id = %campaign_id,
                        metrics = record.len(),
                        "statistics extracted"
                    );
                    records.insert(campaign_id, record);
                }
                Err(e) => {
                    tracing::warn!(
                        campaign_id = %descriptor.campaign_id,
                        error = %e,
                        "could not parse statistics; skipping campaign"
                    );
                }
            }
        }

        Ok(AdapterOutcome {
            records,
            session_update,
        })
    }
}

pub(crate) fn filtering_param(campaign_id: &str) -> String {
    json!([
        {
            "field": "campaign.delivery_info",
            "operator": "IN",
            "value": DELIVERY_STATUSES,
        },
        {
            "field": "campaign.id",
            "operator": "IN",
            "value": [campaign_id],
        }
    ])
    .to_string()
}

pub(crate) fn time_range_param(descriptor: &CampaignDescriptor) -> String {
    json!({
        "since": descriptor.date_range.from.format("%Y-%m-%d").to_string(),
        "until": descriptor.date_range.until.format("%Y-%m-%d").to_string(),
    })
    .to_string()
}

fn is_token_expired(body: &Value) -> bool {
    body.get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_i64)
        == Some(TOKEN_EXPIRED_CODE)
}

/// Parses the first row of a tabular response into the campaign id it
/// describes and its record, with `spent` still in the foreign currency.
pub(crate) fn parse_response(body: &Value) -> Result<(String, MetricRecord), PlatformError> {
    if let Some(error) = body.get("error") {
        return Err(PlatformError::Api {
            platform: Platform::SocialGraph,
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    let table = body
        .get("data")
        .and_then(|d| d.get(0))
        .ok_or_else(|| malformed("missing data[0]"))?;
    let columns = table
        .pointer("/headers/atomic_columns")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing headers.atomic_columns"))?;
    let row = table
        .pointer("/rows/0")
        .ok_or_else(|| malformed("no rows for campaign"))?;
    let values = row
        .get("atomic_values")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing atomic_values"))?;
    let dimensions = row
        .get("dimension_values")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing dimension_values"))?;
    let campaign_id = dimensions
        .first()
        .and_then(id_string)
        .ok_or_else(|| malformed("missing campaign id dimension"))?;

    let mut record = MetricRecord::new();
    for (column, value) in columns.iter().zip(values) {
        let name = column.get("name").and_then(Value::as_str).unwrap_or_default();
        let Some(metric) = column_metric(name) else {
            tracing::debug!(column = name, "ignoring unknown tabular column");
            continue;
        };
        if let Some(value) = metric_value(value) {
            record.insert(metric, value);
        }
    }

    let result_value = row.pointer("/result_values/0/value").and_then(metric_value);
    let target = dimensions.get(3).and_then(Value::as_str).unwrap_or_default();
    match (target, result_value) {
        ("LINK_CLICKS", Some(value)) => record.insert(Metric::Clicks, value),
        ("CONVERSIONS", Some(value)) => record.insert(Metric::Result, value),
        ("LINK_CLICKS" | "CONVERSIONS", None) => {
            tracing::debug!(campaign_id = %campaign_id, target, "result target has no value");
        }
        _ => {
            tracing::info!(campaign_id = %campaign_id, target, "unrecognized result target");
        }
    }

    Ok((campaign_id, record))
}

fn column_metric(name: &str) -> Option<Metric> {
    match name {
        "spend" => Some(Metric::Spent),
        "impressions" => Some(Metric::Impressions),
        "clicks" => Some(Metric::Clicks),
        "reach" => Some(Metric::Reach),
        _ => None,
    }
}

/// Converts `spent` into the reference currency, rounded to cents.
pub(crate) fn convert_spent(record: &mut MetricRecord, rate: f64) {
    if let Some(raw) = record.spent() {
        // Halves go to the even cent.
        let converted = (raw * rate * 100.0).round_ties_even() / 100.0;
        record.insert(Metric::Spent, MetricValue::Float(converted));
    }
}

fn malformed(reason: &str) -> PlatformError {
    PlatformError::MalformedResponse {
        platform: Platform::SocialGraph,
        context: "am_tabular".to_string(),
        reason: reason.to_string(),
    }
}

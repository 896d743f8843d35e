use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::metrics::WantedMetric;

/// The advertising platforms adsync can pull statistics from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Network-Ads: token-authenticated statistics API.
    NetworkAds,
    /// Social-Graph-Ads: graph API priced in a foreign currency.
    SocialGraph,
    /// Native-Mobile-Ads: cookie-session dashboard API.
    NativeMobile,
}

impl Platform {
    pub const ALL: [Platform; 3] = [
        Platform::NetworkAds,
        Platform::SocialGraph,
        Platform::NativeMobile,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::NetworkAds => "network_ads",
            Platform::SocialGraph => "social_graph",
            Platform::NativeMobile => "native_mobile",
        }
    }

    /// Whether descriptors for this platform must carry a client id.
    #[must_use]
    pub fn requires_client_id(self) -> bool {
        !matches!(self, Platform::NetworkAds)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodMode {
    CurrentMonth,
    Explicit,
}

/// Inclusive date range a campaign's statistics are collected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub mode: PeriodMode,
    pub from: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    /// Range covering the whole calendar month `today` falls in.
    #[must_use]
    pub fn current_month(today: NaiveDate) -> Self {
        let from = today.with_day(1).unwrap_or(today);
        let until = from
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(today);
        Self {
            mode: PeriodMode::CurrentMonth,
            from,
            until,
        }
    }

    #[must_use]
    pub fn explicit(from: NaiveDate, until: NaiveDate) -> Self {
        Self {
            mode: PeriodMode::Explicit,
            from,
            until,
        }
    }

    #[must_use]
    pub fn is_current_month(&self) -> bool {
        self.mode == PeriodMode::CurrentMonth
    }
}

/// One unit of work: a campaign, its date scope, and the metrics wanted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignDescriptor {
    pub client_id: Option<String>,
    pub campaign_id: String,
    pub date_range: DateRange,
    pub wanted_metrics: BTreeSet<WantedMetric>,
}

impl CampaignDescriptor {
    #[must_use]
    pub fn wants(&self, metric: WantedMetric) -> bool {
        self.wanted_metrics.contains(&metric)
    }
}

/// Descriptors of one run, grouped by the platform that serves them.
pub type GroupedDescriptors = BTreeMap<Platform, Vec<CampaignDescriptor>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_month_spans_whole_month() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        let range = DateRange::current_month(today);
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(range.until, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
        assert!(range.is_current_month());
    }

    #[test]
    fn current_month_handles_december() {
        let today = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        let range = DateRange::current_month(today);
        assert_eq!(range.until, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }

    #[test]
    fn only_network_ads_runs_without_client_id() {
        assert!(!Platform::NetworkAds.requires_client_id());
        assert!(Platform::SocialGraph.requires_client_id());
        assert!(Platform::NativeMobile.requires_client_id());
    }
}

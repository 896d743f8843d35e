//! Canonical metric vocabulary shared by every platform adapter.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::campaigns::Platform;

/// Metric names a [`MetricRecord`] may carry.
///
/// `Result` is only produced for conversion-optimized campaigns; for
/// click-optimized ones the equivalent value lands under `Clicks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Spent,
    Impressions,
    Clicks,
    Reach,
    Result,
}

impl Metric {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Spent => "spent",
            Metric::Impressions => "impressions",
            Metric::Clicks => "clicks",
            Metric::Reach => "reach",
            Metric::Result => "result",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics a user can ask for on a campaign descriptor.
///
/// `Views` can be requested but no platform currently reports it, so it
/// never maps onto a [`Metric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WantedMetric {
    Spent,
    Impressions,
    Clicks,
    Reach,
    Views,
}

impl WantedMetric {
    #[must_use]
    pub fn as_metric(self) -> Option<Metric> {
        match self {
            WantedMetric::Spent => Some(Metric::Spent),
            WantedMetric::Impressions => Some(Metric::Impressions),
            WantedMetric::Clicks => Some(Metric::Clicks),
            WantedMetric::Reach => Some(Metric::Reach),
            WantedMetric::Views => None,
        }
    }
}

/// A single metric value: spend is fractional, counters are whole numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Float(v) => v,
        }
    }

    /// Adds two values, staying integral only when both sides are integral.
    #[must_use]
    pub fn add(self, other: MetricValue) -> MetricValue {
        match (self, other) {
            (MetricValue::Int(a), MetricValue::Int(b)) => MetricValue::Int(a.saturating_add(b)),
            (a, b) => MetricValue::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Platform-agnostic metrics for one campaign.
///
/// `spent` is always stored as a float in the reference currency; counters
/// handed in as floats for `spent` are converted on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricRecord(BTreeMap<Metric, MetricValue>);

impl MetricRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: Metric, value: MetricValue) {
        let value = match metric {
            Metric::Spent => MetricValue::Float(value.as_f64()),
            _ => value,
        };
        self.0.insert(metric, value);
    }

    /// Adds `value` onto whatever is already stored for `metric`.
    pub fn accumulate(&mut self, metric: Metric, value: MetricValue) {
        let summed = match self.0.get(&metric) {
            Some(existing) => existing.add(value),
            None => value,
        };
        self.insert(metric, summed);
    }

    #[must_use]
    pub fn get(&self, metric: Metric) -> Option<MetricValue> {
        self.0.get(&metric).copied()
    }

    #[must_use]
    pub fn spent(&self) -> Option<f64> {
        self.get(Metric::Spent).map(MetricValue::as_f64)
    }

    /// Drops every metric the caller did not ask for. `Result` is kept
    /// because it cannot be requested explicitly.
    pub fn retain_wanted(&mut self, wanted: &BTreeSet<WantedMetric>) {
        let allowed: BTreeSet<Metric> = wanted.iter().filter_map(|w| w.as_metric()).collect();
        self.0
            .retain(|metric, _| *metric == Metric::Result || allowed.contains(metric));
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, MetricValue)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(Metric, MetricValue)> for MetricRecord {
    fn from_iter<I: IntoIterator<Item = (Metric, MetricValue)>>(iter: I) -> Self {
        let mut record = MetricRecord::new();
        for (metric, value) in iter {
            record.insert(metric, value);
        }
        record
    }
}

/// Records gathered during one run.
///
/// `write_target` is what the sheet sync consumes; `per_platform` keeps the
/// same records split by platform for the run summary. If two platforms emit
/// the same campaign id, the later merge wins in `write_target`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub write_target: BTreeMap<String, MetricRecord>,
    pub per_platform: BTreeMap<Platform, BTreeMap<String, MetricRecord>>,
}

impl AggregatedResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, platform: Platform, records: BTreeMap<String, MetricRecord>) {
        for (campaign_id, record) in &records {
            if self.write_target.contains_key(campaign_id) {
                tracing::warn!(
                    platform = %platform,
                    campaign_id = %campaign_id,
                    "campaign id already collected by another platform; overwriting"
                );
            }
            self.write_target.insert(campaign_id.clone(), record.clone());
        }
        self.per_platform.entry(platform).or_default().extend(records);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.write_target.is_empty()
    }
}

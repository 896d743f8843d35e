//! Loading of campaign request files.
//!
//! A request file lists campaigns grouped by platform key:
//!
//! ```yaml
//! network_ads:
//!   - campaign_id: "1012345"
//!     period: current_month
//!     metrics: [spent, impressions, clicks]
//! social_graph:
//!   - client_id: "2233445566"
//!     campaign_id: "23850000000000001"
//!     period: explicit
//!     from: 2026-10-01
//!     until: 2026-10-15
//!     metrics: [spent, reach]
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::campaigns::{CampaignDescriptor, DateRange, GroupedDescriptors, PeriodMode, Platform};
use crate::metrics::WantedMetric;
use crate::ConfigError;

/// Ids are often written unquoted in YAML; accept both numbers and strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Str(String),
        Num(u64),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Str(s) => s.trim().to_string(),
        IdRepr::Num(n) => n.to_string(),
    })
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_id")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?
        .map(|Wrapper(id)| id)
        .filter(|id| !id.is_empty()))
}

#[derive(Debug, Deserialize)]
struct RequestEntry {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    client_id: Option<String>,
    #[serde(deserialize_with = "deserialize_id")]
    campaign_id: String,
    period: PeriodMode,
    #[serde(default)]
    from: Option<NaiveDate>,
    #[serde(default)]
    until: Option<NaiveDate>,
    #[serde(default)]
    metrics: BTreeSet<WantedMetric>,
}

type RequestFile = std::collections::BTreeMap<Platform, Vec<RequestEntry>>;

/// Load and validate a request file, resolving `current_month` periods
/// against `today`.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_requests(path: &Path, today: NaiveDate) -> Result<GroupedDescriptors, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_requests(&content, today).map_err(|e| match e {
        ConfigError::FileParse { source, .. } => ConfigError::FileParse {
            path: path.display().to_string(),
            source,
        },
        other => other,
    })
}

/// Parse and validate request YAML. See [`load_requests`].
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or an entry is invalid.
pub fn parse_requests(yaml: &str, today: NaiveDate) -> Result<GroupedDescriptors, ConfigError> {
    let file: RequestFile = serde_yaml::from_str(yaml).map_err(|e| ConfigError::FileParse {
        path: "<requests>".to_string(),
        source: e,
    })?;

    let mut grouped = GroupedDescriptors::new();
    for (platform, entries) in file {
        let descriptors = entries
            .into_iter()
            .map(|entry| to_descriptor(platform, entry, today))
            .collect::<Result<Vec<_>, _>>()?;
        if !descriptors.is_empty() {
            grouped.insert(platform, descriptors);
        }
    }
    Ok(grouped)
}

fn to_descriptor(
    platform: Platform,
    entry: RequestEntry,
    today: NaiveDate,
) -> Result<CampaignDescriptor, ConfigError> {
    if entry.campaign_id.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{platform}: campaign_id must be non-empty"
        )));
    }

    if platform.requires_client_id() && entry.client_id.is_none() {
        return Err(ConfigError::Validation(format!(
            "{platform}: campaign '{}' needs a client_id",
            entry.campaign_id
        )));
    }

    let date_range = match entry.period {
        PeriodMode::CurrentMonth => DateRange::current_month(today),
        PeriodMode::Explicit => {
            let (Some(from), Some(until)) = (entry.from, entry.until) else {
                return Err(ConfigError::Validation(format!(
                    "{platform}: campaign '{}' uses an explicit period but lacks from/until",
                    entry.campaign_id
                )));
            };
            if from > until {
                return Err(ConfigError::Validation(format!(
                    "{platform}: campaign '{}' has from {from} after until {until}",
                    entry.campaign_id
                )));
            }
            DateRange::explicit(from, until)
        }
    };

    Ok(CampaignDescriptor {
        client_id: entry.client_id,
        campaign_id: entry.campaign_id,
        date_range,
        wanted_metrics: entry.metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn parses_grouped_requests() {
        let yaml = r"
network_ads:
  - campaign_id: 1012345
    period: current_month
    metrics: [spent, impressions]
native_mobile:
  - client_id: agency_client_1
    campaign_id: '34482609'
    period: explicit
    from: 2026-10-01
    until: 2026-10-10
    metrics: [spent, clicks, reach]
";
        let grouped = parse_requests(yaml, today()).unwrap();
        assert_eq!(grouped.len(), 2);

        let vk = &grouped[&Platform::NetworkAds][0];
        assert_eq!(vk.campaign_id, "1012345");
        assert!(vk.client_id.is_none());
        assert!(vk.date_range.is_current_month());
        assert_eq!(vk.date_range.from, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert_eq!(vk.date_range.until, NaiveDate::from_ymd_opt(2026, 10, 31).unwrap());
        assert!(vk.wants(WantedMetric::Spent));
        assert!(!vk.wants(WantedMetric::Reach));

        let mt = &grouped[&Platform::NativeMobile][0];
        assert_eq!(mt.client_id.as_deref(), Some("agency_client_1"));
        assert_eq!(mt.date_range.until, NaiveDate::from_ymd_opt(2026, 10, 10).unwrap());
    }

    #[test]
    fn social_graph_requires_client_id() {
        let yaml = r"
social_graph:
  - campaign_id: '238500'
    period: current_month
";
        let err = parse_requests(yaml, today()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("client_id")));
    }

    #[test]
    fn explicit_period_requires_dates() {
        let yaml = r"
network_ads:
  - campaign_id: '1'
    period: explicit
    from: 2026-10-01
";
        let err = parse_requests(yaml, today()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("from/until")));
    }

    #[test]
    fn explicit_period_rejects_inverted_range() {
        let yaml = r"
network_ads:
  - campaign_id: '1'
    period: explicit
    from: 2026-10-10
    until: 2026-10-01
";
        assert!(matches!(
            parse_requests(yaml, today()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn unknown_platform_is_a_parse_error() {
        let yaml = "myspace_ads: []\n";
        assert!(matches!(
            parse_requests(yaml, today()),
            Err(ConfigError::FileParse { .. })
        ));
    }

    #[test]
    fn empty_platform_list_is_dropped() {
        let yaml = "network_ads: []\n";
        let grouped = parse_requests(yaml, today()).unwrap();
        assert!(grouped.is_empty());
    }
}

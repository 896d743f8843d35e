//! Spreadsheet layout settings: which sheet, which columns, which rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::metrics::Metric;
use crate::ConfigError;

/// A header name and its 1-based column index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_number: u32,
}

/// Static assignment of metrics (and the date stamp) to sheet columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<ColumnSpec>,
    #[serde(default)]
    pub metrics: BTreeMap<Metric, ColumnSpec>,
}

impl ColumnMap {
    /// Builds a column map from the sheet's header row and the header names
    /// the user picked for each metric and for the date stamp.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a chosen name is not in the header.
    pub fn from_header_choice(
        header: &[String],
        date_name: &str,
        metric_names: &BTreeMap<Metric, String>,
    ) -> Result<Self, ConfigError> {
        let locate = |name: &str| -> Result<ColumnSpec, ConfigError> {
            let index = header
                .iter()
                .position(|h| h.trim() == name.trim())
                .ok_or_else(|| {
                    ConfigError::Validation(format!("column '{name}' not found in header row"))
                })?;
            let column_number = u32::try_from(index + 1).map_err(|_| {
                ConfigError::Validation(format!("column '{name}' is out of range"))
            })?;
            Ok(ColumnSpec {
                name: name.to_string(),
                column_number,
            })
        };

        let date = Some(locate(date_name)?);
        let metrics = metric_names
            .iter()
            .map(|(metric, name)| Ok((*metric, locate(name)?)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Ok(Self { date, metrics })
    }

    #[must_use]
    pub fn column_for(&self, metric: Metric) -> Option<u32> {
        self.metrics.get(&metric).map(|spec| spec.column_number)
    }

    #[must_use]
    pub fn date_column(&self) -> Option<u32> {
        self.date.as_ref().map(|spec| spec.column_number)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.date.is_some() && !self.metrics.is_empty()
    }
}

/// Campaign id to 1-based sheet row, persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowCache(BTreeMap<String, u32>);

impl RowCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, campaign_id: &str) -> Option<u32> {
        self.0.get(campaign_id).copied()
    }

    #[must_use]
    pub fn contains(&self, campaign_id: &str) -> bool {
        self.0.contains_key(campaign_id)
    }

    pub fn insert(&mut self, campaign_id: impl Into<String>, row: u32) {
        self.0.insert(campaign_id.into(), row);
    }

    /// Removes every entry whose campaign id fails `keep`, returning the
    /// removed ids.
    pub fn prune<F>(&mut self, mut keep: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let stale: Vec<String> = self.0.keys().filter(|id| !keep(id)).cloned().collect();
        for id in &stale {
            self.0.remove(id);
        }
        stale
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.0.iter().map(|(id, row)| (id.as_str(), *row))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u32)> for RowCache {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The `sheet` section of the durable configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnMap>,
    #[serde(default)]
    pub campaign_rows: RowCache,
}

impl SheetSettings {
    /// Names of the settings that still have to be provided before a run
    /// may write to the sheet. Empty when the settings are complete.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.spreadsheet_id.as_deref().is_none_or(str::is_empty) {
            missing.push("spreadsheet_id");
        }
        if self.sheet_name.as_deref().is_none_or(str::is_empty) {
            missing.push("sheet_name");
        }
        match &self.columns {
            None => missing.push("columns"),
            Some(columns) => {
                if columns.date.is_none() {
                    missing.push("columns.date");
                }
                if columns.metrics.is_empty() {
                    missing.push("columns.metrics");
                }
            }
        }
        missing
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Checks that every stored column and row number is 1-based.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first zero position.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(columns) = &self.columns {
            let date = columns.date.iter().map(|spec| ("date", spec));
            let metrics = columns
                .metrics
                .iter()
                .map(|(metric, spec)| (metric.as_str(), spec));
            for (field, spec) in date.chain(metrics) {
                if spec.column_number == 0 {
                    return Err(ConfigError::Validation(format!(
                        "column for {field} ('{}') must be 1 or greater",
                        spec.name
                    )));
                }
            }
        }
        if let Some((campaign_id, _)) = self.campaign_rows.iter().find(|(_, row)| *row == 0) {
            return Err(ConfigError::Validation(format!(
                "row for campaign {campaign_id} must be 1 or greater"
            )));
        }
        Ok(())
    }
}

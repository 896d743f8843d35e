//! Writes aggregated records into their rows of the target sheet.
//!
//! Row discovery and cache pruning finish before the grid is fetched. The
//! fetched grid is then modified in memory and written back with a single
//! bulk update; cells outside the mapped metric and date columns of tracked
//! rows keep the values they were read with.

use std::collections::BTreeMap;

use adsync_core::{ColumnMap, MetricRecord, MetricValue, RowCache};
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::SheetsError;
use crate::service::{put_cell, CellRef, Grid, SpreadsheetHandle, SpreadsheetService};

/// Format of the date stamp written next to every updated row.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// What one sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Row cache to persist for the next run.
    pub row_cache: RowCache,
    /// Campaign ids whose row was updated.
    pub written: Vec<String>,
    /// Campaign ids with no row in the sheet; nothing was written for them.
    pub missing_rows: Vec<String>,
    /// Campaign ids dropped from the row cache.
    pub pruned: Vec<String>,
}

/// Sync of aggregated records into one sheet of an opened spreadsheet.
pub struct SpreadsheetSync<'a> {
    service: &'a dyn SpreadsheetService,
    handle: &'a SpreadsheetHandle,
    sheet_name: &'a str,
}

impl<'a> SpreadsheetSync<'a> {
    #[must_use]
    pub fn new(
        service: &'a dyn SpreadsheetService,
        handle: &'a SpreadsheetHandle,
        sheet_name: &'a str,
    ) -> Self {
        Self {
            service,
            handle,
            sheet_name,
        }
    }

    /// Writes `write_target` into the sheet and returns the updated cache.
    ///
    /// Campaigns not yet in `row_cache` are searched for by id; those not
    /// found are skipped. Ids absent from `write_target` are pruned from the
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError`] if the grid cannot be fetched or written.
    /// Failed row searches are logged per campaign and do not abort the sync.
    pub async fn write(
        &self,
        write_target: &BTreeMap<String, MetricRecord>,
        mut row_cache: RowCache,
        column_map: &ColumnMap,
        today: NaiveDate,
    ) -> Result<SyncReport, SheetsError> {
        let mut missing_rows = Vec::new();
        for campaign_id in write_target.keys() {
            if row_cache.contains(campaign_id) {
                continue;
            }
            match self.locate(campaign_id).await {
                Some(row) => {
                    tracing::debug!(campaign_id = %campaign_id, row, "campaign row found");
                    row_cache.insert(campaign_id.clone(), row);
                }
                None => missing_rows.push(campaign_id.clone()),
            }
        }

        let pruned = row_cache.prune(|campaign_id| write_target.contains_key(campaign_id));
        if !pruned.is_empty() {
            tracing::info!(
                campaigns = ?pruned,
                "dropped campaigns no longer tracked from row cache"
            );
        }

        let mut grid = self
            .service
            .get_all_values(self.handle, self.sheet_name)
            .await?;

        let date_stamp = Value::String(today.format(DATE_FORMAT).to_string());
        let mut written = Vec::new();
        for (campaign_id, record) in write_target {
            let Some(row) = row_cache.get(campaign_id) else {
                continue;
            };
            apply_record(&mut grid, row, record, column_map, campaign_id);
            if let Some(date_column) = column_map.date_column() {
                put_cell(&mut grid, index(row), index(date_column), date_stamp.clone());
            }
            written.push(campaign_id.clone());
        }

        self.service
            .update_values(self.handle, self.sheet_name, CellRef::TOP_LEFT, &grid)
            .await?;
        tracing::info!(
            sheet = self.sheet_name,
            rows = written.len(),
            missing = missing_rows.len(),
            "sheet updated"
        );

        Ok(SyncReport {
            row_cache,
            written,
            missing_rows,
            pruned,
        })
    }

    async fn locate(&self, campaign_id: &str) -> Option<u32> {
        match self
            .service
            .find_cell(self.handle, self.sheet_name, campaign_id)
            .await
        {
            Ok(rows) => {
                if rows.len() > 1 {
                    tracing::warn!(
                        campaign_id,
                        rows = ?rows,
                        "campaign id found in several rows; using the first"
                    );
                }
                let row = rows.first().copied();
                if row.is_none() {
                    tracing::warn!(campaign_id, "campaign id not found in sheet; skipping");
                }
                row
            }
            Err(e) => {
                tracing::warn!(campaign_id, error = %e, "campaign id search failed; skipping");
                None
            }
        }
    }
}

fn apply_record(
    grid: &mut Grid,
    row: u32,
    record: &MetricRecord,
    column_map: &ColumnMap,
    campaign_id: &str,
) {
    for (metric, value) in record.iter() {
        let Some(column) = column_map.column_for(metric) else {
            tracing::debug!(campaign_id, metric = %metric, "no column mapped for metric");
            continue;
        };
        put_cell(grid, index(row), index(column), cell_value(value));
    }
}

fn cell_value(value: MetricValue) -> Value {
    match value {
        MetricValue::Int(v) => Value::from(v),
        MetricValue::Float(v) => Value::from(v),
    }
}

/// 0-based grid index of a 1-based sheet position.
fn index(position: u32) -> usize {
    position.saturating_sub(1) as usize
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;

//! The `run` command: aggregate, sync, persist.

use std::collections::BTreeMap;
use std::path::Path;

use adsync_core::{
    AdsyncConfig, AppConfig, ConfigStore, GroupedDescriptors, MetricRecord, Platform,
    SocialGraphCredentials,
};
use adsync_platforms::{CookieJar, HttpSettings, SessionUpdate, StatsAggregator};
use adsync_sheets::{SpreadsheetService, SpreadsheetSync, SyncReport};
use chrono::{Local, NaiveDate};

use crate::platforms::build_aggregator;

/// What a completed run produced.
#[derive(Debug)]
pub(crate) struct RunSummary {
    pub per_platform: BTreeMap<Platform, BTreeMap<String, MetricRecord>>,
    pub sync: SyncReport,
}

#[derive(Debug)]
pub(crate) enum RunOutcome {
    Completed(RunSummary),
    /// The sheet settings lack the listed fields; nothing was fetched or written.
    ConfigIncomplete { missing: Vec<&'static str> },
}

/// Sequences one batch: aggregate the platforms, write the sheet, then
/// persist the refreshed credentials and row cache.
pub(crate) struct RunCoordinator<'a> {
    aggregator: &'a StatsAggregator,
    sheets: &'a dyn SpreadsheetService,
    store: &'a ConfigStore,
}

impl<'a> RunCoordinator<'a> {
    pub(crate) fn new(
        aggregator: &'a StatsAggregator,
        sheets: &'a dyn SpreadsheetService,
        store: &'a ConfigStore,
    ) -> Self {
        Self {
            aggregator,
            sheets,
            store,
        }
    }

    /// Runs `grouped` against `config` and returns the updated configuration.
    ///
    /// The configuration is saved once aggregation has finished, even when the
    /// sheet write then fails, so refreshed credentials are never lost.
    ///
    /// # Errors
    ///
    /// Returns an error if an adapter fails fatally (nothing is written), the
    /// spreadsheet cannot be opened or written, or the configuration cannot
    /// be saved.
    pub(crate) async fn run(
        &self,
        mut config: AdsyncConfig,
        grouped: &GroupedDescriptors,
        today: NaiveDate,
    ) -> anyhow::Result<(AdsyncConfig, RunOutcome)> {
        let missing = config.sheet.missing_fields();
        if !missing.is_empty() {
            tracing::warn!(missing = ?missing, "sheet settings incomplete; run refused");
            return Ok((config, RunOutcome::ConfigIncomplete { missing }));
        }

        let aggregation = self.aggregator.run(grouped).await?;
        for update in aggregation.session_updates {
            apply_session_update(&mut config, update);
        }

        let synced = self
            .sync(&config, &aggregation.result.write_target, today)
            .await;
        let sync = match synced {
            Ok(report) => report,
            Err(e) => {
                self.store.save(&config)?;
                return Err(e);
            }
        };

        config.sheet.campaign_rows = sync.row_cache.clone();
        self.store.save(&config)?;

        let summary = RunSummary {
            per_platform: aggregation.result.per_platform,
            sync,
        };
        Ok((config, RunOutcome::Completed(summary)))
    }

    async fn sync(
        &self,
        config: &AdsyncConfig,
        write_target: &BTreeMap<String, MetricRecord>,
        today: NaiveDate,
    ) -> anyhow::Result<SyncReport> {
        let settings = &config.sheet;
        let (Some(spreadsheet_id), Some(sheet_name), Some(columns)) = (
            settings.spreadsheet_id.as_deref(),
            settings.sheet_name.as_deref(),
            settings.columns.as_ref(),
        ) else {
            anyhow::bail!("sheet settings incomplete");
        };

        let handle = self.sheets.open(spreadsheet_id).await?;
        if !handle.has_sheet(sheet_name) {
            anyhow::bail!("spreadsheet {spreadsheet_id} has no sheet named '{sheet_name}'");
        }

        let report = SpreadsheetSync::new(self.sheets, &handle, sheet_name)
            .write(write_target, settings.campaign_rows.clone(), columns, today)
            .await?;
        Ok(report)
    }
}

fn apply_session_update(config: &mut AdsyncConfig, update: SessionUpdate) {
    match update {
        SessionUpdate::SocialGraph {
            access_token,
            session_id,
        } => {
            let credentials = config
                .social_graph
                .get_or_insert_with(SocialGraphCredentials::default);
            credentials.access_token = access_token;
            credentials.session_id = session_id;
            tracing::info!("social_graph session refreshed; new token saved");
        }
    }
}

/// Load the request file and run one batch with the platforms configured
/// in the durable store.
///
/// # Errors
///
/// Returns an error if the request file or configuration cannot be read,
/// an adapter cannot be built, or the run fails.
pub(crate) async fn run_batch(
    app: &AppConfig,
    store: &ConfigStore,
    sheets: &dyn SpreadsheetService,
    requests: &Path,
) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    let grouped = adsync_core::load_requests(requests, today)?;
    let config = store.load()?;

    let http = HttpSettings::from_app_config(app);
    let cookies = CookieJar::load(&app.cookies_path)?;
    let aggregator = build_aggregator(&http, &config, &cookies)?;

    let coordinator = RunCoordinator::new(&aggregator, sheets, store);
    let (_, outcome) = coordinator.run(config, &grouped, today).await?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::ConfigIncomplete { missing } => {
            println!(
                "WARNING: spreadsheet settings are incomplete (missing: {}). \
                 Run `adsync sheet` to configure them; nothing was fetched.",
                missing.join(", ")
            );
        }
        RunOutcome::Completed(summary) => {
            for (platform, records) in &summary.per_platform {
                println!("{platform}:");
                for (campaign_id, record) in records {
                    let metrics = record
                        .iter()
                        .map(|(metric, value)| format!("{metric}={value}"))
                        .collect::<Vec<_>>()
                        .join(" ");
                    println!("  {campaign_id}: {metrics}");
                }
            }
            let sync = &summary.sync;
            println!("Rows written: {}", sync.written.len());
            if !sync.missing_rows.is_empty() {
                println!("Not found in sheet: {}", sync.missing_rows.join(", "));
            }
        }
    }
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;

//! Sheet setup command handlers for the CLI.
//!
//! Each step narrows the write target: `list` pins the spreadsheet, `select`
//! pins the sheet inside it, and `columns` maps metrics onto header names of
//! that sheet. Every step saves the durable configuration when it succeeds.

use std::collections::BTreeMap;

use adsync_core::{AdsyncConfig, ColumnMap, ConfigStore, Metric, RowCache};
use adsync_sheets::SpreadsheetService;
use clap::{Args, Subcommand};

/// Sub-commands available under `sheet`.
#[derive(Debug, Subcommand)]
pub enum SheetCommands {
    /// List the sheets of a spreadsheet and remember it as the target
    List {
        /// Spreadsheet id from the document URL
        #[arg(long)]
        spreadsheet_id: String,
    },
    /// Choose the sheet to write to and print its header row
    Select {
        /// Sheet title as shown on its tab
        #[arg(long)]
        sheet_name: String,
    },
    /// Map metrics onto header names of the selected sheet
    Columns(ColumnChoice),
    /// Print the current sheet settings
    Show,
}

/// Header names chosen for the date stamp and for each metric.
#[derive(Debug, Args)]
pub struct ColumnChoice {
    /// Header of the column that receives the date of the last update
    #[arg(long)]
    pub date: String,
    #[arg(long)]
    pub spent: Option<String>,
    #[arg(long)]
    pub impressions: Option<String>,
    #[arg(long)]
    pub clicks: Option<String>,
    #[arg(long)]
    pub reach: Option<String>,
    #[arg(long)]
    pub result: Option<String>,
}

impl ColumnChoice {
    fn metric_names(&self) -> BTreeMap<Metric, String> {
        [
            (Metric::Spent, &self.spent),
            (Metric::Impressions, &self.impressions),
            (Metric::Clicks, &self.clicks),
            (Metric::Reach, &self.reach),
            (Metric::Result, &self.result),
        ]
        .into_iter()
        .filter_map(|(metric, name)| name.clone().map(|n| (metric, n)))
        .collect()
    }
}

/// Loads the durable configuration, applies `command`, and saves the result.
///
/// # Errors
///
/// Returns an error if the configuration cannot be read or written, or if
/// the command itself fails.
pub(crate) async fn run_sheet_command(
    store: &ConfigStore,
    sheets: &dyn SpreadsheetService,
    command: SheetCommands,
) -> anyhow::Result<()> {
    let config = store.load()?;
    let config = match command {
        SheetCommands::List { spreadsheet_id } => {
            let (config, titles) = select_spreadsheet(sheets, config, &spreadsheet_id).await?;
            println!("Sheets in {spreadsheet_id}:");
            for title in titles {
                println!("  {title}");
            }
            config
        }
        SheetCommands::Select { sheet_name } => {
            let (config, header) = select_sheet(sheets, config, &sheet_name).await?;
            println!("Header of '{sheet_name}':");
            for (index, name) in header.iter().enumerate() {
                println!("  {:>3}  {name}", index + 1);
            }
            config
        }
        SheetCommands::Columns(choice) => {
            let config = choose_columns(sheets, config, &choice).await?;
            println!("Column map saved.");
            config
        }
        SheetCommands::Show => {
            print_settings(&config);
            return Ok(());
        }
    };
    store.save(&config)?;
    Ok(())
}

/// Opens `spreadsheet_id` and records it as the target. Choosing a different
/// spreadsheet clears the sheet, column map, and row cache.
///
/// # Errors
///
/// Returns an error if the spreadsheet cannot be opened.
pub(crate) async fn select_spreadsheet(
    sheets: &dyn SpreadsheetService,
    mut config: AdsyncConfig,
    spreadsheet_id: &str,
) -> anyhow::Result<(AdsyncConfig, Vec<String>)> {
    let handle = sheets.open(spreadsheet_id).await?;
    let titles = sheets.list_sheets(&handle).await?;

    if config.sheet.spreadsheet_id.as_deref() != Some(spreadsheet_id) {
        config.sheet.spreadsheet_id = Some(spreadsheet_id.to_owned());
        config.sheet.sheet_name = None;
        config.sheet.columns = None;
        config.sheet.campaign_rows = RowCache::new();
    }
    tracing::info!(spreadsheet_id, sheets = titles.len(), "spreadsheet selected");
    Ok((config, titles))
}

/// Records `sheet_name` as the sheet to write to and returns its header row.
/// Choosing a different sheet clears the column map and row cache.
///
/// # Errors
///
/// Returns an error if no spreadsheet is selected, the spreadsheet has no
/// such sheet, or the header row cannot be read.
pub(crate) async fn select_sheet(
    sheets: &dyn SpreadsheetService,
    mut config: AdsyncConfig,
    sheet_name: &str,
) -> anyhow::Result<(AdsyncConfig, Vec<String>)> {
    let spreadsheet_id = config
        .sheet
        .spreadsheet_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("no spreadsheet selected; run `adsync sheet list` first"))?;
    let handle = sheets.open(&spreadsheet_id).await?;
    if !handle.has_sheet(sheet_name) {
        anyhow::bail!("spreadsheet {spreadsheet_id} has no sheet named '{sheet_name}'");
    }
    let header = sheets.get_header_row(&handle, sheet_name).await?;

    if config.sheet.sheet_name.as_deref() != Some(sheet_name) {
        config.sheet.sheet_name = Some(sheet_name.to_owned());
        config.sheet.columns = None;
        config.sheet.campaign_rows = RowCache::new();
    }
    Ok((config, header))
}

/// Builds the column map from the selected sheet's header row.
///
/// # Errors
///
/// Returns an error if no sheet is selected, the header cannot be read, or a
/// chosen name is not in the header.
pub(crate) async fn choose_columns(
    sheets: &dyn SpreadsheetService,
    mut config: AdsyncConfig,
    choice: &ColumnChoice,
) -> anyhow::Result<AdsyncConfig> {
    let (Some(spreadsheet_id), Some(sheet_name)) = (
        config.sheet.spreadsheet_id.as_deref(),
        config.sheet.sheet_name.as_deref(),
    ) else {
        anyhow::bail!("no sheet selected; run `adsync sheet list` and `adsync sheet select` first");
    };
    let handle = sheets.open(spreadsheet_id).await?;
    let header = sheets.get_header_row(&handle, sheet_name).await?;
    let columns = ColumnMap::from_header_choice(&header, &choice.date, &choice.metric_names())?;

    tracing::info!(sheet = sheet_name, metrics = columns.metrics.len(), "column map updated");
    config.sheet.columns = Some(columns);
    Ok(config)
}

fn print_settings(config: &AdsyncConfig) {
    let sheet = &config.sheet;
    println!(
        "spreadsheet: {}",
        sheet.spreadsheet_id.as_deref().unwrap_or("(not set)")
    );
    println!("sheet:       {}", sheet.sheet_name.as_deref().unwrap_or("(not set)"));
    match &sheet.columns {
        Some(columns) => {
            if let Some(date) = &columns.date {
                println!("  date        -> {} (column {})", date.name, date.column_number);
            }
            for (metric, spec) in &columns.metrics {
                println!("  {metric:<11} -> {} (column {})", spec.name, spec.column_number);
            }
        }
        None => println!("columns:     (not set)"),
    }
    println!("cached rows: {}", sheet.campaign_rows.len());
    let missing = sheet.missing_fields();
    if !missing.is_empty() {
        println!("missing:     {}", missing.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use adsync_sheets::MemorySpreadsheet;
    use serde_json::json;

    use super::*;

    fn spreadsheet() -> MemorySpreadsheet {
        MemorySpreadsheet::new("doc")
            .with_sheet(
                "Stats",
                vec![vec![
                    json!("Campaign"),
                    json!("Updated"),
                    json!("Spent"),
                    json!("Shows"),
                ]],
            )
            .with_sheet("Archive", Vec::new())
    }

    fn choice(date: &str, spent: Option<&str>) -> ColumnChoice {
        ColumnChoice {
            date: date.to_string(),
            spent: spent.map(ToString::to_string),
            impressions: Some("Shows".to_string()),
            clicks: None,
            reach: None,
            result: None,
        }
    }

    #[tokio::test]
    async fn full_setup_completes_sheet_settings() {
        let sheets = spreadsheet();

        let (config, titles) = select_spreadsheet(&sheets, AdsyncConfig::default(), "doc")
            .await
            .unwrap();
        assert_eq!(titles, vec!["Archive", "Stats"]);

        let (config, header) = select_sheet(&sheets, config, "Stats").await.unwrap();
        assert_eq!(header[2], "Spent");

        let config = choose_columns(&sheets, config, &choice("Updated", Some("Spent")))
            .await
            .unwrap();
        let columns = config.sheet.columns.as_ref().unwrap();
        assert_eq!(columns.date_column(), Some(2));
        assert_eq!(columns.column_for(Metric::Spent), Some(3));
        assert_eq!(columns.column_for(Metric::Impressions), Some(4));
        assert!(config.sheet.is_complete());
    }

    #[tokio::test]
    async fn changing_spreadsheet_clears_dependent_settings() {
        let sheets = spreadsheet();
        let mut config = AdsyncConfig::default();
        config.sheet.spreadsheet_id = Some("old".to_string());
        config.sheet.sheet_name = Some("Stats".to_string());
        config.sheet.campaign_rows.insert("C-1", 5);

        let (config, _) = select_spreadsheet(&sheets, config, "doc").await.unwrap();

        assert_eq!(config.sheet.spreadsheet_id.as_deref(), Some("doc"));
        assert!(config.sheet.sheet_name.is_none());
        assert!(config.sheet.campaign_rows.is_empty());
    }

    #[tokio::test]
    async fn reselecting_same_sheet_keeps_row_cache() {
        let sheets = spreadsheet();
        let mut config = AdsyncConfig::default();
        config.sheet.spreadsheet_id = Some("doc".to_string());
        config.sheet.sheet_name = Some("Stats".to_string());
        config.sheet.campaign_rows.insert("C-1", 5);

        let (config, _) = select_sheet(&sheets, config, "Stats").await.unwrap();

        assert_eq!(config.sheet.campaign_rows.get("C-1"), Some(5));
    }

    #[tokio::test]
    async fn unknown_sheet_is_rejected() {
        let sheets = spreadsheet();
        let mut config = AdsyncConfig::default();
        config.sheet.spreadsheet_id = Some("doc".to_string());

        let err = select_sheet(&sheets, config, "Nope").await.unwrap_err();
        assert!(err.to_string().contains("no sheet named 'Nope'"));
    }

    #[tokio::test]
    async fn columns_require_selected_sheet() {
        let sheets = spreadsheet();
        let result =
            choose_columns(&sheets, AdsyncConfig::default(), &choice("Updated", None)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unknown_header_name_is_rejected() {
        let sheets = spreadsheet();
        let mut config = AdsyncConfig::default();
        config.sheet.spreadsheet_id = Some("doc".to_string());
        config.sheet.sheet_name = Some("Stats".to_string());

        let result = choose_columns(&sheets, config, &choice("Updated", Some("Cost"))).await;
        assert!(result.is_err());
    }
}

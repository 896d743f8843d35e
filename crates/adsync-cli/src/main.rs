mod platforms;
mod run;
mod setup;

use std::path::PathBuf;

use adsync_core::{AppConfig, ConfigStore};
use adsync_sheets::GoogleSheetsClient;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::setup::SheetCommands;

#[derive(Debug, Parser)]
#[command(name = "adsync")]
#[command(about = "Collect ad campaign statistics into a spreadsheet")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch statistics for the campaigns in a request file and update the sheet
    Run {
        /// YAML file listing campaigns grouped by platform
        #[arg(long)]
        requests: PathBuf,
    },
    /// Choose the spreadsheet, sheet, and columns to write to
    Sheet {
        #[command(subcommand)]
        command: SheetCommands,
    },
    /// Print the official conversion rate for the configured currency
    Rate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = adsync_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let store = ConfigStore::new(config.config_path.clone());

    match cli.command {
        Some(Commands::Run { requests }) => {
            let sheets = sheets_client(&config)?;
            run::run_batch(&config, &store, &sheets, &requests).await?;
        }
        Some(Commands::Sheet { command }) => {
            let sheets = sheets_client(&config)?;
            setup::run_sheet_command(&store, &sheets, command).await?;
        }
        Some(Commands::Rate) => platforms::run_rate(&config, &store).await?,
        None => println!("adsync: no command given; see `adsync --help`"),
    }

    Ok(())
}

/// Builds the Google Sheets client from the access token in the environment.
///
/// # Errors
///
/// Returns an error if `GOOGLE_SHEETS_ACCESS_TOKEN` is unset or the HTTP
/// client cannot be built.
fn sheets_client(config: &AppConfig) -> anyhow::Result<GoogleSheetsClient> {
    let token = config.sheets_access_token.as_deref().ok_or_else(|| {
        anyhow::anyhow!("GOOGLE_SHEETS_ACCESS_TOKEN is not set; the spreadsheet cannot be accessed")
    })?;
    let client = GoogleSheetsClient::new(token, config.request_timeout_secs, &config.user_agent)?;
    Ok(client)
}

#[cfg(test)]
mod tests;

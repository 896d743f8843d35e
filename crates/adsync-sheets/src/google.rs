//! Google Sheets v4 REST implementation of [`SpreadsheetService`].
//!
//! Authentication is a caller-supplied OAuth bearer token; obtaining and
//! refreshing it is outside adsync.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::SheetsError;
use crate::service::{
    cell_text, rows_matching, CellRef, Grid, SpreadsheetHandle, SpreadsheetService,
};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Grid,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

pub struct GoogleSheetsClient {
    client: Client,
    base_url: Url,
    access_token: String,
}

impl GoogleSheetsClient {
    /// # Errors
    ///
    /// Returns [`SheetsError::Http`] if the HTTP client cannot be built.
    pub fn new(
        access_token: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, SheetsError> {
        Self::with_base_url(access_token, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a client pointing at a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError::Http`] if the HTTP client cannot be built or
    /// [`SheetsError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        access_token: &str,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, SheetsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| SheetsError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            base_url,
            access_token: access_token.to_owned(),
        })
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> Result<Url, SheetsError> {
        let id = utf8_percent_encode(spreadsheet_id, NON_ALPHANUMERIC).to_string();
        self.join(&id)
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, SheetsError> {
        let id = utf8_percent_encode(spreadsheet_id, NON_ALPHANUMERIC).to_string();
        let range = utf8_percent_encode(range, NON_ALPHANUMERIC).to_string();
        self.join(&format!("{id}/values/{range}"))
    }

    fn join(&self, path: &str) -> Result<Url, SheetsError> {
        self.base_url
            .join(path)
            .map_err(|e| SheetsError::InvalidBaseUrl {
                url: format!("{}{path}", self.base_url),
                reason: e.to_string(),
            })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, SheetsError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;
        read_body(response).await
    }
}

/// Quotes a sheet title for use in an A1 range (`Q3 'plan'` becomes
/// `'Q3 ''plan'''`).
fn quoted_sheet(sheet_name: &str) -> String {
    format!("'{}'", sheet_name.replace('\'', "''"))
}

async fn read_body<T: DeserializeOwned>(response: Response) -> Result<T, SheetsError> {
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => SheetsError::Api {
                status: status.as_u16(),
                message: envelope.error.message,
            },
            Err(_) => SheetsError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            },
        });
    }

    serde_json::from_str(&body).map_err(|source| SheetsError::Deserialize {
        context: url,
        source,
    })
}

#[async_trait]
impl SpreadsheetService for GoogleSheetsClient {
    async fn open(&self, spreadsheet_id: &str) -> Result<SpreadsheetHandle, SheetsError> {
        let url = self.spreadsheet_url(spreadsheet_id)?;
        let meta: SpreadsheetMeta = self.get(url, &[("fields", "sheets.properties.title")]).await?;
        Ok(SpreadsheetHandle {
            spreadsheet_id: spreadsheet_id.to_owned(),
            sheets: meta.sheets.into_iter().map(|s| s.properties.title).collect(),
        })
    }

    async fn get_header_row(
        &self,
        handle: &SpreadsheetHandle,
        sheet_name: &str,
    ) -> Result<Vec<String>, SheetsError> {
        let range = format!("{}!1:1", quoted_sheet(sheet_name));
        let url = self.values_url(&handle.spreadsheet_id, &range)?;
        let values: ValueRange = self.get(url, &[("majorDimension", "ROWS")]).await?;
        Ok(values
            .values
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(cell_text)
            .collect())
    }

    async fn find_cell(
        &self,
        handle: &SpreadsheetHandle,
        sheet_name: &str,
        text: &str,
    ) -> Result<Vec<u32>, SheetsError> {
        let grid = self.get_all_values(handle, sheet_name).await?;
        Ok(rows_matching(&grid, text))
    }

    async fn get_all_values(
        &self,
        handle: &SpreadsheetHandle,
        sheet_name: &str,
    ) -> Result<Grid, SheetsError> {
        let url = self.values_url(&handle.spreadsheet_id, &quoted_sheet(sheet_name))?;
        // Formulas come back as formulas so writing the grid back keeps them.
        let values: ValueRange = self
            .get(
                url,
                &[("majorDimension", "ROWS"), ("valueRenderOption", "FORMULA")],
            )
            .await?;
        Ok(values.values)
    }

    async fn update_values(
        &self,
        handle: &SpreadsheetHandle,
        sheet_name: &str,
        anchor: CellRef,
        grid: &Grid,
    ) -> Result<(), SheetsError> {
        let range = format!("{}!{}", quoted_sheet(sheet_name), anchor.to_a1());
        let url = self.values_url(&handle.spreadsheet_id, &range)?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": grid,
        });
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&body)
            .send()
            .await?;
        let _: serde_json::Value = read_body(response).await?;
        tracing::debug!(sheet = sheet_name, rows = grid.len(), "sheet values updated");
        Ok(())
    }
}

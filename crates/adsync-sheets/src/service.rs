//! The spreadsheet operations adsync depends on.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SheetsError;

/// Row-major cell values: `grid[row][column]`, both 0-based.
pub type Grid = Vec<Vec<Value>>;

/// An opened spreadsheet and the titles of its sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetHandle {
    pub spreadsheet_id: String,
    pub sheets: Vec<String>,
}

impl SpreadsheetHandle {
    #[must_use]
    pub fn has_sheet(&self, sheet_name: &str) -> bool {
        self.sheets.iter().any(|s| s == sheet_name)
    }
}

/// A 1-based cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub const TOP_LEFT: CellRef = CellRef { row: 1, column: 1 };

    /// A1 notation, e.g. `{row: 8, column: 28}` is `AB8`.
    #[must_use]
    pub fn to_a1(self) -> String {
        format!("{}{}", column_letters(self.column), self.row)
    }
}

/// Converts a 1-based column number to its letter name (`1` is `A`,
/// `27` is `AA`).
#[must_use]
pub fn column_letters(column: u32) -> String {
    let mut n = column.max(1);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Read and write access to one spreadsheet service.
#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SheetsError`] if the spreadsheet cannot be read.
    async fn open(&self, spreadsheet_id: &str) -> Result<SpreadsheetHandle, SheetsError>;

    /// # Errors
    ///
    /// The default implementation never fails.
    async fn list_sheets(&self, handle: &SpreadsheetHandle) -> Result<Vec<String>, SheetsError> {
        Ok(handle.sheets.clone())
    }

    /// Values of the first row of `sheet_name`, as text.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError`] if the sheet cannot be read.
    async fn get_header_row(
        &self,
        handle: &SpreadsheetHandle,
        sheet_name: &str,
    ) -> Result<Vec<String>, SheetsError>;

    /// 1-based numbers of the rows holding a cell whose text equals `text`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError`] if the sheet cannot be searched.
    async fn find_cell(
        &self,
        handle: &SpreadsheetHandle,
        sheet_name: &str,
        text: &str,
    ) -> Result<Vec<u32>, SheetsError>;

    /// # Errors
    ///
    /// Returns [`SheetsError`] if the sheet cannot be read.
    async fn get_all_values(
        &self,
        handle: &SpreadsheetHandle,
        sheet_name: &str,
    ) -> Result<Grid, SheetsError>;

    /// Writes `grid` with its top-left cell at `anchor`. Text that looks
    /// numeric is stored as a number.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError`] if the write is rejected.
    async fn update_values(
        &self,
        handle: &SpreadsheetHandle,
        sheet_name: &str,
        anchor: CellRef,
        grid: &Grid,
    ) -> Result<(), SheetsError>;
}

/// Text of a cell as a user sees it; numbers are rendered without a
/// trailing `.0`.
#[must_use]
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            let text = n.to_string();
            match text.strip_suffix(".0") {
                Some(whole) => whole.to_string(),
                None => text,
            }
        }
        other => other.to_string(),
    }
}

/// 1-based rows of `grid` containing a cell whose trimmed text is `text`.
#[must_use]
pub fn rows_matching(grid: &Grid, text: &str) -> Vec<u32> {
    let needle = text.trim();
    grid.iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| cell_text(cell).trim() == needle))
        .filter_map(|(index, _)| u32::try_from(index + 1).ok())
        .collect()
}

/// Sets `grid[row][column]`, growing the grid with empty cells as needed.
pub(crate) fn put_cell(grid: &mut Grid, row: usize, column: usize, value: Value) {
    if grid.len() <= row {
        grid.resize_with(row + 1, Vec::new);
    }
    let cells = &mut grid[row];
    if cells.len() <= column {
        cells.resize(column + 1, Value::String(String::new()));
    }
    cells[column] = value;
}

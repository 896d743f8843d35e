//! In-memory [`SpreadsheetService`] for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SheetsError;
use crate::service::{
    cell_text, put_cell, rows_matching, CellRef, Grid, SpreadsheetHandle, SpreadsheetService,
};

/// One spreadsheet held in memory. Counts the search and write calls made
/// against it so callers can check how the sheet was accessed.
#[derive(Debug, Default)]
pub struct MemorySpreadsheet {
    spreadsheet_id: String,
    sheets: Mutex<BTreeMap<String, Grid>>,
    find_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl MemorySpreadsheet {
    #[must_use]
    pub fn new(spreadsheet_id: &str) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_sheet(self, sheet_name: &str, grid: Grid) -> Self {
        self.lock().insert(sheet_name.to_owned(), grid);
        self
    }

    /// Current contents of `sheet_name`, empty if there is no such sheet.
    #[must_use]
    pub fn grid(&self, sheet_name: &str) -> Grid {
        self.lock().get(sheet_name).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Grid>> {
        self.sheets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn sheet(&self, sheet_name: &str) -> Result<Grid, SheetsError> {
        self.lock()
            .get(sheet_name)
            .cloned()
            .ok_or_else(|| SheetsError::SheetNotFound {
                spreadsheet_id: self.spreadsheet_id.clone(),
                sheet_name: sheet_name.to_owned(),
            })
    }
}

#[async_trait]
impl SpreadsheetService for MemorySpreadsheet {
    async fn open(&self, spreadsheet_id: &str) -> Result<SpreadsheetHandle, SheetsError> {
        if spreadsheet_id != self.spreadsheet_id {
            return Err(SheetsError::Api {
                status: 404,
                message: format!("Requested entity was not found: {spreadsheet_id}"),
            });
        }
        Ok(SpreadsheetHandle {
            spreadsheet_id: spreadsheet_id.to_owned(),
            sheets: self.lock().keys().cloned().collect(),
        })
    }

    async fn get_header_row(
        &self,
        _handle: &SpreadsheetHandle,
        sheet_name: &str,
    ) -> Result<Vec<String>, SheetsError> {
        let grid = self.sheet(sheet_name)?;
        Ok(grid
            .first()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default())
    }

    async fn find_cell(
        &self,
        _handle: &SpreadsheetHandle,
        sheet_name: &str,
        text: &str,
    ) -> Result<Vec<u32>, SheetsError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(rows_matching(&self.sheet(sheet_name)?, text))
    }

    async fn get_all_values(
        &self,
        _handle: &SpreadsheetHandle,
        sheet_name: &str,
    ) -> Result<Grid, SheetsError> {
        self.sheet(sheet_name)
    }

    async fn update_values(
        &self,
        _handle: &SpreadsheetHandle,
        sheet_name: &str,
        anchor: CellRef,
        grid: &Grid,
    ) -> Result<(), SheetsError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut sheets = self.lock();
        let target = sheets
            .get_mut(sheet_name)
            .ok_or_else(|| SheetsError::SheetNotFound {
                spreadsheet_id: self.spreadsheet_id.clone(),
                sheet_name: sheet_name.to_owned(),
            })?;

        let row_offset = anchor.row.saturating_sub(1) as usize;
        let column_offset = anchor.column.saturating_sub(1) as usize;
        for (r, row) in grid.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                put_cell(target, row_offset + r, column_offset + c, value.clone());
            }
        }
        Ok(())
    }
}

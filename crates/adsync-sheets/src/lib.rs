//! Spreadsheet side of adsync.
//!
//! [`SpreadsheetService`] is the narrow set of sheet operations the sync
//! needs; [`GoogleSheetsClient`] implements it over the Sheets v4 REST API
//! and [`MemorySpreadsheet`] in memory. [`SpreadsheetSync`] writes
//! aggregated records into the rows tracked by a [`adsync_core::RowCache`].

pub mod error;
pub mod google;
pub mod memory;
pub mod service;
pub mod sync;

pub use error::SheetsError;
pub use google::GoogleSheetsClient;
pub use memory::MemorySpreadsheet;
pub use service::{CellRef, Grid, SpreadsheetHandle, SpreadsheetService};
pub use sync::{SpreadsheetSync, SyncReport, DATE_FORMAT};

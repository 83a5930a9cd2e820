//! # Spreadsheet Storage
//!
//! Table storage for the component sheet. The reconciler only sees the
//! [`TableStore`] seam: read all records once, write cell values back by
//! position, save in place. [`XlsxTable`] implements it on `.xlsx` packages by
//! patching the worksheet XML, so styles, column widths, extra columns and
//! every other package part survive a run untouched.
pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub mod template;
pub mod xlsx;

use crate::error::ScraperError;
use crate::record::{Column, ComponentRecord};
use thiserror::Error;

pub use xlsx::XlsxTable;

/// Errors raised while opening, reading or saving a table file.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Read part '{0}' failed: not found in package")]
    FileError(String),

    #[error("Spreadsheet '{0}' has no worksheet")]
    SpreadsheetEmptyError(String),

    #[error("Spreadsheet '{0}' is not an xlsx package")]
    InvalidFileFormat(String),

    #[error("Column '{expected}' missing from the header of '{file_name}' [{sheet}] (found '{found}')")]
    MissingHeaderColumn {
        file_name: String,
        sheet: String,
        expected: String,
        found: String,
    },

    #[error("Row {row} is outside the table of {rows} rows")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("File '{0}' already exists")]
    FileExists(String),
}

/// Storage seam used by the table reconciler.
///
/// `row` is the 0-based index of a component row, i.e. the position of the
/// record in the vector returned by [`TableStore::read_records`]; the header
/// offset is the store's concern.
pub trait TableStore {
    /// Reads every component row below the header
    fn read_records(&mut self) -> Result<Vec<ComponentRecord>, ScraperError>;

    /// Stages a cell value; nothing reaches the file before [`TableStore::save`]
    fn write_cell(&mut self, row: usize, column: Column, value: &str) -> Result<(), ScraperError>;

    /// Persists staged values to the location the table was opened from,
    /// leaving every other cell and all formatting as it was
    fn save(&mut self) -> Result<(), ScraperError>;

    /// Human-readable location for log lines
    fn location(&self) -> String;
}

use crate::record::{Column, ComponentRecord, HEADER_ROWS};
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::SpreadsheetError;

/// The component area of a worksheet: header cells plus every non-empty data
/// cell, gathered while streaming the sheet XML.
pub(crate) struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    /// Header cells within the known columns
    pub(crate) header: Vec<Cell>,
    /// Data cells within the known columns, in document order
    pub(crate) cells: Vec<Cell>,
    /// Last row holding a non-empty value in any column (0-based)
    pub(crate) row_upper_bound: Option<usize>,
}

impl Sheet {
    pub(super) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            header: Vec::new(),
            cells: Vec::new(),
            row_upper_bound: None,
        }
    }

    /// Records a cell that has a value. Cells outside the known columns only
    /// extend the row count.
    pub(super) fn push(&mut self, cell: Cell) {
        if self.row_upper_bound.map(|upper| upper < cell.row).unwrap_or(true) {
            self.row_upper_bound = Some(cell.row);
        }
        if cell.col >= Column::ALL.len() {
            return;
        }
        if cell.row < HEADER_ROWS {
            self.header.push(cell);
        } else {
            self.cells.push(cell);
        }
    }

    /// Number of data rows below the header
    pub(crate) fn row_count(&self) -> usize {
        self.row_upper_bound
            .map(|upper| (upper + 1).saturating_sub(HEADER_ROWS))
            .unwrap_or(0)
    }

    /// Checks that every known column carries its expected header text
    /// (case and surrounding whitespace ignored)
    pub(crate) fn check_header(&self, shared_strings: &[String]) -> Result<(), SpreadsheetError> {
        for column in Column::ALL {
            let found = self.header
                .iter()
                .find(|cell| cell.col == column.index())
                .map(|cell| cell.text(shared_strings))
                .unwrap_or_default();
            if !found.trim().eq_ignore_ascii_case(column.header()) {
                Err(SpreadsheetError::MissingHeaderColumn {
                    file_name: self.file_name.to_owned(),
                    sheet: self.name.to_owned(),
                    expected: column.header().to_owned(),
                    found: found.trim().to_owned(),
                })?
            }
        }
        Ok(())
    }

    /// Materializes one record per data row; absent cells read as empty
    pub(crate) fn records(&self, shared_strings: &[String]) -> Vec<ComponentRecord> {
        let mut records = vec![ComponentRecord::default(); self.row_count()];
        for cell in &self.cells {
            if let Some(column) = Column::from_index(cell.col) {
                records[cell.row - HEADER_ROWS].set(column, cell.text(shared_strings));
            }
        }
        records
    }
}

//! One pass over a component table: read, resolve each row, write back, save.

use crate::error::ScraperError;
use crate::events::{EventSink, LogLevel};
use crate::fetcher::PageFetcher;
use crate::record::{ComponentRecord, HEADER_ROWS};
use crate::resolver::{RowOutcome, RowResolver};
use crate::spreadsheet::TableStore;

/// Row counts of a finished run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn count(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::Failed(_) => self.failed += 1,
        }
    }
}

pub struct TableReconciler {
    resolver: RowResolver,
}

impl TableReconciler {
    pub fn new(resolver: RowResolver) -> Self {
        Self { resolver }
    }

    /// Runs the table through the catalog and saves it in place
    ///
    /// Rows are processed one at a time in sheet order. The fetcher is
    /// closed before returning, whether the run succeeded or not; a close
    /// failure is only returned when nothing else failed.
    ///
    /// # Returns
    /// Per-outcome row counts, or the first fatal error (unreadable or
    /// unsavable table)
    pub async fn run<T, F, S>(&self, store: &mut T, fetcher: &mut F, sink: &mut S) -> Result<RunSummary, ScraperError>
    where
        T: TableStore + ?Sized,
        F: PageFetcher + ?Sized,
        S: EventSink + ?Sized,
    {
        let result = self.reconcile(store, fetcher, sink).await;
        let closed = fetcher.close().await;

        match (result, closed) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(error)) => {
                sink.log(LogLevel::Error, format!("Closing browser session failed: {error}"));
                Err(error.into())
            }
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(close_error)) => {
                sink.log(LogLevel::Warn, format!("Closing browser session failed: {close_error}"));
                Err(error)
            }
        }
    }

    async fn reconcile<T, F, S>(&self, store: &mut T, fetcher: &mut F, sink: &mut S) -> Result<RunSummary, ScraperError>
    where
        T: TableStore + ?Sized,
        F: PageFetcher + ?Sized,
        S: EventSink + ?Sized,
    {
        let location = store.location();
        let mut records = store.read_records()?;
        let total = records.len();
        sink.log(LogLevel::Info, format!("Loaded {total} rows from {location}"));

        let mut summary = RunSummary { total, ..RunSummary::default() };
        sink.progress(0);
        if total == 0 {
            sink.progress(100);
        }
        for (index, record) in records.iter_mut().enumerate() {
            let row_number = index + HEADER_ROWS + 1;
            let outcome = self.resolver.resolve(record, row_number, fetcher, sink).await;
            summary.count(&outcome);
            sink.progress(((index + 1) * 100 / total) as u8);
        }

        write_back(store, &records)?;
        store.save()?;
        sink.log(
            LogLevel::Info,
            format!(
                "Saved {location}: {} updated, {} skipped, {} failed",
                summary.updated, summary.skipped, summary.failed
            ),
        );
        Ok(summary)
    }
}

/// Writes the ten known columns of every row back by position
fn write_back<T: TableStore + ?Sized>(store: &mut T, records: &[ComponentRecord]) -> Result<(), ScraperError> {
    for (row, record) in records.iter().enumerate() {
        for (column, value) in record.cells() {
            store.write_cell(row, column, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::RecordingSink;
    use crate::fetcher::{FetchError, ScriptedFetcher};
    use crate::record::Column;
    use crate::spreadsheet::SpreadsheetError;
    use std::collections::BTreeMap;

    /// Table kept in memory; counts writes and can fail on demand
    #[derive(Default)]
    struct MemoryStore {
        records: Vec<ComponentRecord>,
        writes: BTreeMap<(usize, Column), String>,
        saves: usize,
        fail_read: bool,
        fail_save: bool,
    }

    impl MemoryStore {
        fn with(records: Vec<ComponentRecord>) -> Self {
            Self { records, ..Self::default() }
        }

        fn saved_records(&self) -> Vec<ComponentRecord> {
            let mut records = self.records.clone();
            for ((row, column), value) in &self.writes {
                records[*row].set(*column, value.to_owned());
            }
            records
        }
    }

    impl TableStore for MemoryStore {
        fn read_records(&mut self) -> Result<Vec<ComponentRecord>, ScraperError> {
            if self.fail_read {
                Err(SpreadsheetError::FileError("memory".to_owned()))?
            }
            Ok(self.records.clone())
        }

        fn write_cell(&mut self, row: usize, column: Column, value: &str) -> Result<(), ScraperError> {
            if row >= self.records.len() {
                Err(SpreadsheetError::RowOutOfRange { row, rows: self.records.len() })?
            }
            self.writes.insert((row, column), value.to_owned());
            Ok(())
        }

        fn save(&mut self) -> Result<(), ScraperError> {
            if self.fail_save {
                Err(SpreadsheetError::FileError("memory".to_owned()))?
            }
            self.saves += 1;
            Ok(())
        }

        fn location(&self) -> String {
            "memory".to_owned()
        }
    }

    const PAGE: &str = r#"<html><body>
        <span class="lucene_highlight_class">C2040</span>
        <table><tr><td class="el-table_1_column_9"><div><div>In Stock(500)</div></div></td></tr></table>
        <div class="leading-[20px]"><span>Price</span><span>$0.12</span></div>
    </body></html>"#;

    fn reconciler() -> TableReconciler {
        TableReconciler::new(RowResolver::from_config(&Config::default()).unwrap())
    }

    #[tokio::test]
    async fn mixed_rows_reach_full_progress() {
        let mut store = MemoryStore::with(vec![
            ComponentRecord::from_cells(["", "https://site/x"]),
            ComponentRecord::from_cells(["", ""]),
            ComponentRecord::from_cells(["", "https://site/down"]),
        ]);
        let mut fetcher = ScriptedFetcher::new()
            .with_page("https://site/x", PAGE)
            .with_failure("https://site/down", "net::ERR_CONNECTION_RESET");
        let mut sink = RecordingSink::new();

        let summary = reconciler().run(&mut store, &mut fetcher, &mut sink).await.unwrap();
        assert_eq!(summary, RunSummary { total: 3, updated: 1, skipped: 1, failed: 1 });
        assert_eq!(sink.progress_values(), [0, 33, 66, 100]);
        assert_eq!(store.saves, 1);
        assert_eq!(fetcher.close_count(), 1);
        assert_eq!(store.writes.len(), 30);

        let saved = store.saved_records();
        assert_eq!(saved[0].in_stock, "In Stock(500)");
        assert_eq!(saved[0].unit_price, "$0.12");
        assert_eq!(saved[0].bulk_prices, "N/A");
        assert_eq!(saved[0].datasheet, "");
        assert_eq!(saved[0].site_tag, "jlcpcb");
        assert_eq!(saved[1], ComponentRecord::default());
        assert_eq!(saved[2].in_stock, "");
        assert_eq!(saved[2].site_tag, "jlcpcb");
    }

    #[tokio::test]
    async fn empty_table_reports_complete() {
        let mut store = MemoryStore::default();
        let mut fetcher = ScriptedFetcher::new();
        let mut sink = RecordingSink::new();

        let summary = reconciler().run(&mut store, &mut fetcher, &mut sink).await.unwrap();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(sink.progress_values().last(), Some(&100));
        assert_eq!(store.saves, 1);
        assert!(fetcher.is_closed());
    }

    #[tokio::test]
    async fn fetcher_closed_when_read_fails() {
        let mut store = MemoryStore { fail_read: true, ..MemoryStore::default() };
        let mut fetcher = ScriptedFetcher::new();

        let result = reconciler().run(&mut store, &mut fetcher, &mut RecordingSink::new()).await;
        assert!(matches!(result, Err(ScraperError::SpreadsheetError(_))));
        assert_eq!(fetcher.close_count(), 1);
    }

    #[tokio::test]
    async fn save_error_wins_over_close_error() {
        let mut store = MemoryStore {
            fail_save: true,
            ..MemoryStore::with(vec![ComponentRecord::from_cells(["", ""])])
        };
        let mut fetcher = ScriptedFetcher::new().failing_close();
        let mut sink = RecordingSink::new();

        let result = reconciler().run(&mut store, &mut fetcher, &mut sink).await;
        assert!(matches!(result, Err(ScraperError::SpreadsheetError(_))));
        assert_eq!(fetcher.close_count(), 1);
        assert!(sink.messages(LogLevel::Warn).iter().any(|message| message.starts_with("Closing browser session failed")));
    }

    #[tokio::test]
    async fn close_error_surfaces_after_successful_run() {
        let mut store = MemoryStore::with(vec![ComponentRecord::from_cells(["", ""])]);
        let mut fetcher = ScriptedFetcher::new().failing_close();

        let result = reconciler().run(&mut store, &mut fetcher, &mut RecordingSink::new()).await;
        assert!(matches!(result, Err(ScraperError::FetchError(FetchError::CloseError(_)))));
        assert_eq!(store.saves, 1);
    }

    #[tokio::test]
    async fn built_links_are_written_back() {
        let mut store = MemoryStore::with(vec![ComponentRecord::from_cells(["C2040"])]);
        let url = "https://jlcpcb.com/parts/componentSearch?searchTxt=C2040";
        let mut fetcher = ScriptedFetcher::new().with_page(url, PAGE);

        reconciler().run(&mut store, &mut fetcher, &mut RecordingSink::new()).await.unwrap();
        assert_eq!(store.saved_records()[0].link, url);
        assert_eq!(fetcher.calls(), [url]);
    }
}

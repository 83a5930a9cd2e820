//! # partscrape
//!
//! Fills a component spreadsheet with catalog data from JLCPCB. Each row of
//! the table names a part by number or product link; the run opens the
//! product page in a headless browser, reads stock, prices, manufacturer,
//! description, minimum order and datasheet, and writes them back into the
//! same workbook.
//!
//! ## Features
//!
//! - **In-place updates**: only the ten known columns are written; styles,
//!   column widths, extra columns and other worksheets stay as they were
//! - **Per-field defaults**: a field missing from the page gets its default
//!   ("Out of stock", "N/A", "Unknown", ...) without affecting the others
//! - **Bulk price tables**: quantity breaks are de-duplicated and sorted by
//!   threshold
//! - **Configurable selectors**: page layouts change; CSS selectors live in
//!   the TOML config
//! - **Template creation**: a fresh workbook with the styled header row
//!
//! ## Pipeline
//!
//! [`reconciler::TableReconciler`] reads the table through a
//! [`spreadsheet::TableStore`], resolves every row with
//! [`resolver::RowResolver`] over a [`fetcher::PageFetcher`], writes the rows
//! back and saves. Progress and log lines go to an [`events::EventSink`].

pub mod config;
pub mod error;
pub mod events;
pub mod extractor;
pub mod fetcher;
mod helpers;
pub mod logging;
pub mod pricing;
pub mod reconciler;
pub mod record;
pub mod resolver;
pub mod spreadsheet;

pub use config::Config;
pub use error::ScraperError;
pub use events::{EventSink, LogLevel, RecordingSink, RunEvent, TracingSink};
pub use fetcher::{PageFetcher, RenderedDocument, ScriptedFetcher, WebDriverFetcher};
pub use reconciler::{RunSummary, TableReconciler};
pub use record::{Column, ComponentRecord};
pub use resolver::{RowOutcome, RowResolver};
pub use spreadsheet::{TableStore, XlsxTable};

//! Resolution of one component row against the catalog.

use crate::config::{Config, ConfigError, SourceConfig};
use crate::error::ScraperError;
use crate::events::{EventSink, LogLevel};
use crate::extractor::FieldExtractor;
use crate::fetcher::PageFetcher;
use crate::record::ComponentRecord;

/// What happened to a row
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    /// Catalog fields were overwritten from the product page
    Updated,
    /// Neither link nor part number; the row was left alone
    Skipped,
    /// Fetching or extraction failed; catalog fields keep their prior values
    Failed(String),
}

pub struct RowResolver {
    source: SourceConfig,
    extractor: FieldExtractor,
}

impl RowResolver {
    pub fn new(source: SourceConfig, extractor: FieldExtractor) -> Self {
        Self { source, extractor }
    }

    /// Builds a resolver from configuration, compiling the selectors
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(config.source.clone(), FieldExtractor::new(&config.selectors)?))
    }

    /// Fills `record` from its product page
    ///
    /// A row without a link gets one built from its part number, and the
    /// built link is kept on the record. The site tag is set before the page
    /// is fetched. On failure the eight catalog fields are not touched.
    ///
    /// # Arguments
    /// * `record` - Row to update in place
    /// * `row_number` - 1-based sheet row, for log lines
    /// * `fetcher` - Browser session
    /// * `sink` - Receiver of log events
    pub async fn resolve<F, S>(
        &self,
        record: &mut ComponentRecord,
        row_number: usize,
        fetcher: &mut F,
        sink: &mut S,
    ) -> RowOutcome
    where
        F: PageFetcher + ?Sized,
        S: EventSink + ?Sized,
    {
        if record.is_unidentified() {
            sink.log(LogLevel::Warn, format!("Row {row_number} skipped: no link and no part number"));
            return RowOutcome::Skipped;
        }
        if record.link.trim().is_empty() {
            record.link = self.source.lookup_url(&record.part_number);
        }
        record.site_tag = self.source.site_tag.to_owned();

        let link = record.link.trim().to_owned();
        sink.log(LogLevel::Info, format!("Row {row_number}: processing {link}"));

        let fields = match fetcher.fetch(&link).await {
            Ok(document) => self.extractor.extract(&document).map_err(ScraperError::from),
            Err(error) => Err(ScraperError::from(error)),
        };
        match fields {
            Ok(fields) => {
                sink.log(LogLevel::Info, format!("Row {row_number}: retrieved {}", fields.part_number));
                fields.apply_to(record);
                RowOutcome::Updated
            }
            Err(error) => {
                sink.log(LogLevel::Error, format!("Row {row_number}: {error}"));
                RowOutcome::Failed(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::fetcher::ScriptedFetcher;

    const PAGE: &str = r#"<html><body>
        <span class="lucene_highlight_class">C2040</span>
        <table><tr><td class="el-table_1_column_9"><div><div>In Stock(500)</div></div></td></tr></table>
        <div class="leading-[20px]"><span>Price</span><span>$0.12</span></div>
    </body></html>"#;

    fn resolver() -> RowResolver {
        RowResolver::from_config(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn blank_row_is_skipped_untouched() {
        let mut record = ComponentRecord::from_cells([" ", "", "", "12", "", "", "", "note"]);
        let before = record.clone();
        let mut fetcher = ScriptedFetcher::new();
        let mut sink = RecordingSink::new();

        let outcome = resolver().resolve(&mut record, 2, &mut fetcher, &mut sink).await;
        assert_eq!(outcome, RowOutcome::Skipped);
        assert_eq!(record, before);
        assert!(fetcher.calls().is_empty());
        assert_eq!(sink.messages(LogLevel::Warn), ["Row 2 skipped: no link and no part number"]);
    }

    #[tokio::test]
    async fn link_is_built_from_part_number() {
        let url = "https://jlcpcb.com/parts/componentSearch?searchTxt=C2040";
        let mut record = ComponentRecord::from_cells([" C2040 "]);
        let mut fetcher = ScriptedFetcher::new().with_page(url, PAGE);
        let mut sink = RecordingSink::new();

        let outcome = resolver().resolve(&mut record, 3, &mut fetcher, &mut sink).await;
        assert_eq!(outcome, RowOutcome::Updated);
        assert_eq!(record.link, url);
        assert_eq!(record.part_number, "C2040");
        assert_eq!(fetcher.calls(), [url]);
        assert_eq!(
            sink.messages(LogLevel::Info),
            [format!("Row 3: processing {url}"), "Row 3: retrieved C2040".to_owned()]
        );
    }

    #[tokio::test]
    async fn existing_link_wins_over_part_number() {
        let mut record = ComponentRecord::from_cells(["C1", "https://site/x"]);
        let mut fetcher = ScriptedFetcher::new().with_page("https://site/x", PAGE);

        let outcome = resolver().resolve(&mut record, 2, &mut fetcher, &mut RecordingSink::new()).await;
        assert_eq!(outcome, RowOutcome::Updated);
        assert_eq!(record.link, "https://site/x");
        assert_eq!(record.in_stock, "In Stock(500)");
        assert_eq!(record.unit_price, "$0.12");
        assert_eq!(record.bulk_prices, "N/A");
        assert_eq!(record.datasheet, "");
        assert_eq!(record.site_tag, "jlcpcb");
    }

    #[tokio::test]
    async fn fetch_failure_keeps_catalog_fields() {
        let mut record = ComponentRecord::from_cells([
            "C1", "https://site/down", "jlcpcb", "9", "$1", "1+: $1", "ACME", "old", "1", "a.pdf",
        ]);
        let before = record.clone();
        let mut fetcher = ScriptedFetcher::new().with_failure("https://site/down", "timeout");
        let mut sink = RecordingSink::new();

        let outcome = resolver().resolve(&mut record, 7, &mut fetcher, &mut sink).await;
        assert!(matches!(outcome, RowOutcome::Failed(ref message) if message.contains("timeout")));
        assert_eq!(record, before);
        assert_eq!(sink.messages(LogLevel::Error).len(), 1);
        assert!(sink.messages(LogLevel::Error)[0].starts_with("Row 7: "));
    }

    #[tokio::test]
    async fn page_without_part_number_fails_row() {
        let mut record = ComponentRecord::from_cells(["", "https://site/empty", "", "5"]);
        let mut fetcher = ScriptedFetcher::new().with_page("https://site/empty", "<html></html>");

        let outcome = resolver().resolve(&mut record, 2, &mut fetcher, &mut RecordingSink::new()).await;
        assert_eq!(outcome, RowOutcome::Failed("Part number not found on page".to_owned()));
        assert_eq!(record.in_stock, "5");
        assert_eq!(record.site_tag, "jlcpcb");
    }
}

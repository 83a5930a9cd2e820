//! Product page field extraction.
//!
//! Every field is looked up on its own. A lookup yields
//! `Result<String, ExtractionError>` and a failed lookup is replaced by that
//! field's default, so one missing element never hides the others. The part
//! number is the exception: without it the page is not a product page.

use crate::config::{compile_selector, ConfigError, SelectorConfig};
use crate::fetcher::RenderedDocument;
use crate::pricing;
use crate::pricing::{PricingError, RawTier};
use crate::record::ComponentRecord;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

pub const DEFAULT_STOCK: &str = "Out of stock";
pub const DEFAULT_UNIT_PRICE: &str = "N/A";
pub const DEFAULT_MANUFACTURER: &str = "Unknown";
pub const DEFAULT_DESCRIPTION: &str = "No description";
pub const DEFAULT_MIN_ORDER: &str = "N/A";
pub const DEFAULT_DATASHEET: &str = "";

/// Text preceding the minimum order quantity
const MIN_ORDER_MARKER: &str = "Min:";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Part number not found on page")]
    MissingPartNumber,

    #[error("No element for {field}")]
    NotFound { field: &'static str },

    #[error("Element for {field} has no '{attribute}' attribute")]
    MissingAttribute {
        field: &'static str,
        attribute: &'static str,
    },

    #[error("No 'Min:' value in '{0}'")]
    MissingMinOrder(String),

    #[error("{0}")]
    PricingError(#[from] PricingError),
}

/// Values read from one product page
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSet {
    pub part_number: String,
    pub in_stock: String,
    pub unit_price: String,
    pub manufacturer: String,
    pub description: String,
    pub min_order: String,
    pub datasheet: String,
    pub bulk_prices: String,
}

impl FieldSet {
    /// Overwrites the eight catalog columns of `record`; link and site tag
    /// stay as they are
    pub fn apply_to(self, record: &mut ComponentRecord) {
        record.part_number = self.part_number;
        record.description = self.description;
        record.manufacturer = self.manufacturer;
        record.in_stock = self.in_stock;
        record.unit_price = self.unit_price;
        record.min_order = self.min_order;
        record.datasheet = self.datasheet;
        record.bulk_prices = self.bulk_prices;
    }
}

/// Compiled selectors for one catalog layout
pub struct FieldExtractor {
    part_number: Selector,
    stock: Selector,
    unit_price: Selector,
    manufacturer: Selector,
    description: Selector,
    min_order: Selector,
    datasheet: Selector,
    bulk_block: Selector,
    span: Selector,
}

impl FieldExtractor {
    /// Compiles every selector once; an invalid one is a configuration error
    pub fn new(selectors: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            part_number: compile_selector("part_number", &selectors.part_number)?,
            stock: compile_selector("stock", &selectors.stock)?,
            unit_price: compile_selector("unit_price", &selectors.unit_price)?,
            manufacturer: compile_selector("manufacturer", &selectors.manufacturer)?,
            description: compile_selector("description", &selectors.description)?,
            min_order: compile_selector("min_order", &selectors.min_order)?,
            datasheet: compile_selector("datasheet", &selectors.datasheet)?,
            bulk_block: compile_selector("bulk_block", &selectors.bulk_block)?,
            span: compile_selector("span", "span")?,
        })
    }

    /// Reads all fields from a rendered page
    ///
    /// # Returns
    /// The field set with defaults filled in, or
    /// [`ExtractionError::MissingPartNumber`] when the page shows no part
    pub fn extract(&self, document: &RenderedDocument) -> Result<FieldSet, ExtractionError> {
        let html = Html::parse_document(&document.html);

        let part_number = first_text(&html, &self.part_number, "part_number")
            .ok()
            .filter(|text| !text.is_empty())
            .ok_or(ExtractionError::MissingPartNumber)?;

        let bulk_prices = pricing::normalize(&self.bulk_tiers(&html))
            .map(|tiers| pricing::render(&tiers))
            .map_err(ExtractionError::from);

        Ok(FieldSet {
            part_number,
            in_stock: or_default("in_stock", first_text(&html, &self.stock, "in_stock"), DEFAULT_STOCK),
            unit_price: or_default("unit_price", first_text(&html, &self.unit_price, "unit_price"), DEFAULT_UNIT_PRICE),
            manufacturer: or_default("manufacturer", first_text(&html, &self.manufacturer, "manufacturer"), DEFAULT_MANUFACTURER),
            description: or_default("description", first_text(&html, &self.description, "description"), DEFAULT_DESCRIPTION),
            min_order: or_default("min_order", self.min_order(&html), DEFAULT_MIN_ORDER),
            datasheet: or_default("datasheet", self.datasheet(&html, &document.url), DEFAULT_DATASHEET),
            bulk_prices: or_default("bulk_prices", bulk_prices, pricing::NOT_AVAILABLE),
        })
    }

    fn min_order(&self, html: &Html) -> Result<String, ExtractionError> {
        let element = first(html, &self.min_order, "min_order")?;
        parse_min_order(&rendered_lines(element))
    }

    /// The datasheet `href`, made absolute against the page URL when relative
    fn datasheet(&self, html: &Html, page_url: &str) -> Result<String, ExtractionError> {
        let href = first(html, &self.datasheet, "datasheet")?
            .value()
            .attr("href")
            .map(str::trim)
            .ok_or(ExtractionError::MissingAttribute { field: "datasheet", attribute: "href" })?;
        let absolute = Url::parse(page_url)
            .and_then(|base| base.join(href))
            .map(String::from)
            .unwrap_or_else(|_| href.to_owned());
        Ok(absolute)
    }

    /// Quantity/price pairs from the first two spans of each block; blocks
    /// with fewer spans are ignored
    fn bulk_tiers(&self, html: &Html) -> Vec<RawTier> {
        html.select(&self.bulk_block)
            .filter_map(|block| {
                let mut spans = block.select(&self.span);
                let quantity = spans.next()?;
                let price = spans.next()?;
                Some(RawTier::new(text_of(quantity), text_of(price)))
            })
            .collect()
    }
}

/// Elements that start a new line when rendered
const BLOCK_ELEMENTS: [&str; 14] = [
    "div", "p", "li", "ul", "ol", "tr", "table", "section", "article", "header", "footer", "h1", "h2", "h3",
];

/// Element text laid out the way a browser shows it: inline content stays on
/// one line, `<br>` and block elements break lines. Whitespace runs collapse
/// and blank lines are dropped.
fn rendered_lines(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_rendered_text(element, &mut raw);
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_rendered_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            // Source line breaks are plain whitespace in rendered text
            out.push_str(&text.replace('\n', " "));
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if name == "br" {
                out.push('\n');
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push('\n');
            }
            push_rendered_text(child, out);
            if block {
                out.push('\n');
            }
        }
    }
}

/// Text after the first "Min:" marker, up to the end of that line
pub(crate) fn parse_min_order(text: &str) -> Result<String, ExtractionError> {
    let value = text
        .split_once(MIN_ORDER_MARKER)
        .and_then(|(_, rest)| rest.lines().next())
        .map(str::trim)
        .unwrap_or_default();
    if value.is_empty() {
        Err(ExtractionError::MissingMinOrder(text.to_owned()))
    } else {
        Ok(value.to_owned())
    }
}

fn first<'a>(html: &'a Html, selector: &Selector, field: &'static str) -> Result<ElementRef<'a>, ExtractionError> {
    html.select(selector)
        .next()
        .ok_or(ExtractionError::NotFound { field })
}

fn first_text(html: &Html, selector: &Selector, field: &'static str) -> Result<String, ExtractionError> {
    first(html, selector, field).map(text_of)
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

fn or_default(field: &str, lookup: Result<String, ExtractionError>, default: &str) -> String {
    lookup.unwrap_or_else(|error| {
        tracing::debug!(field, "{}; using default '{}'", error, default);
        default.to_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
  <span class="lucene_highlight_class">C25804</span>
  <table><tr>
    <td class="el-table_1_column_7 is-left"><div>UNI-ROYAL(Uniroyal Elec)</div></td>
    <td class="el-table_1_column_9 is-left"><div><div> In Stock(1,204,300) </div></div></td>
  </tr></table>
  <div class="flex leading-[20px]"><span>Unit</span><span>$0.0005</span></div>
  <div class="el-tooltip desc-text"><span>100mW Thick Film Resistors 10kΩ ±1% 0603</span></div>
  <div class="text-999999 mb-4">Min: 100<br>Mult: 100</div>
  <a class="text-2B8CED" href="/api/file/downloadByFileSystemAccessId/8588.pdf">Datasheet</a>
  <div data-v-04123240><span>1,000+</span><span>$0.0004</span></div>
  <div data-v-04123240><span>100+</span><span>$0.0005</span></div>
  <div data-v-04123240><span>only one</span></div>
  <div data-v-04123240><span>10,000+</span><span>$0.0003</span></div>
</body></html>"#;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(&SelectorConfig::default()).unwrap()
    }

    fn document(html: &str) -> RenderedDocument {
        RenderedDocument {
            url: "https://jlcpcb.com/partdetail/C25804".to_owned(),
            html: html.to_owned(),
        }
    }

    #[test]
    fn extracts_all_fields() {
        let fields = extractor().extract(&document(PRODUCT_PAGE)).unwrap();
        assert_eq!(fields.part_number, "C25804");
        assert_eq!(fields.in_stock, "In Stock(1,204,300)");
        assert_eq!(fields.unit_price, "$0.0005");
        assert_eq!(fields.manufacturer, "UNI-ROYAL(Uniroyal Elec)");
        assert_eq!(fields.description, "100mW Thick Film Resistors 10kΩ ±1% 0603");
        assert_eq!(fields.min_order, "100");
        assert_eq!(fields.datasheet, "https://jlcpcb.com/api/file/downloadByFileSystemAccessId/8588.pdf");
        assert_eq!(fields.bulk_prices, "100+: $0.0005, 1,000+: $0.0004, 10,000+: $0.0003");
    }

    #[test]
    fn missing_part_number_fails_the_page() {
        let html = PRODUCT_PAGE.replace("lucene_highlight_class", "other");
        assert_eq!(extractor().extract(&document(&html)), Err(ExtractionError::MissingPartNumber));
    }

    #[test]
    fn failing_lookup_does_not_affect_others() {
        let html = PRODUCT_PAGE.replace("el-table_1_column_9", "el-table_1_column_8");
        let fields = extractor().extract(&document(&html)).unwrap();
        assert_eq!(fields.in_stock, DEFAULT_STOCK);
        assert_eq!(fields.unit_price, "$0.0005");
    }

    #[test]
    fn bare_page_gets_every_default() {
        let html = r#"<html><body><span class="lucene_highlight_class">C1</span></body></html>"#;
        let fields = extractor().extract(&document(html)).unwrap();
        assert_eq!(fields, FieldSet {
            part_number: "C1".to_owned(),
            in_stock: DEFAULT_STOCK.to_owned(),
            unit_price: DEFAULT_UNIT_PRICE.to_owned(),
            manufacturer: DEFAULT_MANUFACTURER.to_owned(),
            description: DEFAULT_DESCRIPTION.to_owned(),
            min_order: DEFAULT_MIN_ORDER.to_owned(),
            datasheet: DEFAULT_DATASHEET.to_owned(),
            bulk_prices: pricing::NOT_AVAILABLE.to_owned(),
        });
    }

    #[test]
    fn unparsable_quantity_collapses_bulk_prices() {
        let html = PRODUCT_PAGE.replace("10,000+", "lots");
        let fields = extractor().extract(&document(&html)).unwrap();
        assert_eq!(fields.bulk_prices, "N/A");
        assert_eq!(fields.unit_price, "$0.0005");
    }

    #[test]
    fn min_order_keeps_inline_value_on_its_line() {
        let html = PRODUCT_PAGE.replace(
            "Min: 100<br>Mult: 100",
            "Min: <span>250</span><br>Mult: <span>50</span>",
        );
        let fields = extractor().extract(&document(&html)).unwrap();
        assert_eq!(fields.min_order, "250");
    }

    #[test]
    fn min_order_block_children_break_lines() {
        let html = PRODUCT_PAGE.replace(
            "Min: 100<br>Mult: 100",
            "<div>Min:\n  <b>1,000</b> pcs</div><div>Mult: 10</div>",
        );
        let fields = extractor().extract(&document(&html)).unwrap();
        assert_eq!(fields.min_order, "1,000 pcs");
    }

    #[test]
    fn pricing_failures_surface_as_extraction_errors() {
        let error = ExtractionError::from(PricingError::NoBlocks);
        assert_eq!(error, ExtractionError::PricingError(PricingError::NoBlocks));
        assert_eq!(error.to_string(), PricingError::NoBlocks.to_string());
    }

    #[test]
    fn min_order_text() {
        assert_eq!(parse_min_order("Min: 20\nMult: 20"), Ok("20".to_owned()));
        assert_eq!(parse_min_order("Stock\nMin:5 pcs"), Ok("5 pcs".to_owned()));
        assert!(parse_min_order("Mult: 20").is_err());
        assert!(parse_min_order("Min:\n20").is_err());
    }

    #[test]
    fn apply_keeps_link_and_site_tag() {
        let mut record = ComponentRecord::from_cells(["c25804", "https://x", "jlcpcb", "old"]);
        extractor().extract(&document(PRODUCT_PAGE)).unwrap().apply_to(&mut record);
        assert_eq!(record.part_number, "C25804");
        assert_eq!(record.link, "https://x");
        assert_eq!(record.site_tag, "jlcpcb");
        assert_eq!(record.in_stock, "In Stock(1,204,300)");
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let selectors = SelectorConfig {
            stock: "td >".to_owned(),
            ..SelectorConfig::default()
        };
        assert!(matches!(
            FieldExtractor::new(&selectors),
            Err(ConfigError::InvalidSelector { ref field, .. }) if field == "stock"
        ));
    }
}

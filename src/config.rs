//! Configuration for partscrape
//!
//! Every section is optional; a missing file section falls back to the
//! built-in defaults, which target the JLCPCB parts catalog.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Placeholder substituted into the lookup URL template
pub const PART_NUMBER_PLACEHOLDER: &str = "{part_number}";

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("Invalid selector for {field} '{selector}': {message}")]
    InvalidSelector {
        field: String,
        selector: String,
        message: String,
    },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

// ============================================================================
// Source
// ============================================================================

fn default_site_tag() -> String {
    "jlcpcb".to_string()
}

fn default_search_url() -> String {
    format!("https://jlcpcb.com/parts/componentSearch?searchTxt={PART_NUMBER_PLACEHOLDER}")
}

/// Catalog the rows are resolved against
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Value written to the Site Tag column of every processed row
    pub site_tag: String,
    /// Lookup URL used when a row has a part number but no link
    pub search_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            site_tag: default_site_tag(),
            search_url: default_search_url(),
        }
    }
}

impl SourceConfig {
    /// Builds the lookup URL for a part number, trimmed and encoded as a
    /// query value
    pub fn lookup_url(&self, part_number: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(part_number.trim().as_bytes()).collect();
        self.search_url.replace(PART_NUMBER_PLACEHOLDER, &encoded)
    }
}

// ============================================================================
// Browser
// ============================================================================

/// WebDriver session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver server endpoint (chromedriver)
    pub webdriver_url: String,
    /// Run Chrome without a window
    pub headless: bool,
    /// Wait after navigation so client-side scripts can fill the page
    pub settle_delay_ms: u64,
    /// Upper bound for a single page navigation
    pub page_load_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            settle_delay_ms: 3000,
            page_load_timeout_secs: 30,
        }
    }
}

impl BrowserConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }
}

// ============================================================================
// Selectors
// ============================================================================

/// CSS selectors for the product page fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectorConfig {
    pub part_number: String,
    pub stock: String,
    pub unit_price: String,
    pub manufacturer: String,
    pub description: String,
    pub min_order: String,
    /// Anchor whose `href` is the datasheet URL
    pub datasheet: String,
    /// One block per quantity break; its first two spans are quantity and price
    pub bulk_block: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            part_number: "span.lucene_highlight_class".to_string(),
            stock: "td[class*='el-table_1_column_9'] > div > div".to_string(),
            unit_price: "div[class~='leading-[20px]'] span:nth-child(2)".to_string(),
            manufacturer: "td[class*='el-table_1_column_7'] > div".to_string(),
            description: "div.el-tooltip.desc-text span".to_string(),
            min_order: "div[class*='text-999999'][class*='mb-4']".to_string(),
            datasheet: "a.text-2B8CED[href$='.pdf']".to_string(),
            bulk_block: "div[data-v-04123240]".to_string(),
        }
    }
}

impl SelectorConfig {
    /// (field name, selector) pairs, in extraction order
    pub fn entries(&self) -> [(&'static str, &str); 8] {
        [
            ("part_number", self.part_number.as_str()),
            ("stock", self.stock.as_str()),
            ("unit_price", self.unit_price.as_str()),
            ("manufacturer", self.manufacturer.as_str()),
            ("description", self.description.as_str()),
            ("min_order", self.min_order.as_str()),
            ("datasheet", self.datasheet.as_str()),
            ("bulk_block", self.bulk_block.as_str()),
        ]
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Levels accepted by `[logging] level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub browser: BrowserConfig,
    pub selectors: SelectorConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Plain field problems are collected and reported together; a selector
    /// that does not compile is reported on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if !self.source.search_url.contains(PART_NUMBER_PLACEHOLDER) {
            errors.push(format!("search_url must contain {PART_NUMBER_PLACEHOLDER}"));
        }
        if self.source.site_tag.trim().is_empty() {
            errors.push("site_tag must not be empty".to_string());
        }
        if self.browser.webdriver_url.trim().is_empty() {
            errors.push("webdriver_url must not be empty".to_string());
        }
        if self.browser.page_load_timeout_secs == 0 {
            errors.push("page_load_timeout_secs must be positive".to_string());
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "logging level '{}' must be one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        for (field, selector) in self.selectors.entries() {
            compile_selector(field, selector)?;
        }
        Ok(())
    }
}

/// Compiles a CSS selector, naming the config field on failure
pub(crate) fn compile_selector(field: &str, selector: &str) -> Result<scraper::Selector, ConfigError> {
    scraper::Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        field: field.to_string(),
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.browser.settle_delay(), Duration::from_secs(3));
        assert_eq!(config.browser.page_load_timeout(), Duration::from_secs(30));
        assert_eq!(config.source.site_tag, "jlcpcb");
    }

    #[test]
    fn lookup_url_trims_and_encodes() {
        let source = SourceConfig::default();
        assert_eq!(
            source.lookup_url("  C25804 "),
            "https://jlcpcb.com/parts/componentSearch?searchTxt=C25804"
        );
        assert_eq!(
            source.lookup_url("10k 0603&x"),
            "https://jlcpcb.com/parts/componentSearch?searchTxt=10k+0603%26x"
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[browser]\nheadless = false\n\n[selectors]\nstock = \"td.stock\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(!config.browser.headless);
        assert_eq!(config.browser.webdriver_url, "http://localhost:9515");
        assert_eq!(config.selectors.stock, "td.stock");
        assert_eq!(config.selectors.part_number, SelectorConfig::default().part_number);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn validation_collects_errors() {
        let mut config = Config::default();
        config.source.search_url = "https://example.com/search".to_string();
        config.browser.page_load_timeout_secs = 0;
        config.logging.level = "loud".to_string();

        let Err(ConfigError::Invalid(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn invalid_selector_is_rejected() {
        let mut config = Config::default();
        config.selectors.unit_price = "div[".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSelector { ref field, .. }) if field == "unit_price"
        ));
    }

    #[test]
    fn unreadable_and_malformed_files() {
        assert!(matches!(
            Config::load(Path::new("/nonexistent/partscrape.toml")),
            Err(ConfigError::ReadError { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[browser\nheadless = 1").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::ParseError { .. })));
    }
}

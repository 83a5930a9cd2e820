//! Rendered page retrieval.
//!
//! Product pages fill in their fields with client-side scripts, so a page is
//! loaded in a real browser over WebDriver and its DOM is captured after a
//! settle delay. Callers only see the [`PageFetcher`] seam.

use crate::config::BrowserConfig;
use async_trait::async_trait;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to start browser session at {url}: {message}")]
    SessionError { url: String, message: String },

    #[error("Failed to load {url}: {message}")]
    NavigationError { url: String, message: String },

    #[error("Timed out after {seconds}s loading {url}")]
    Timeout { url: String, seconds: u64 },

    #[error("Failed to read page source of {url}: {message}")]
    PageSourceError { url: String, message: String },

    #[error("Failed to close browser session: {0}")]
    CloseError(String),

    #[error("Browser session already closed")]
    SessionClosed,
}

/// Page source captured after rendering
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    /// URL the browser ended up on
    pub url: String,
    pub html: String,
}

/// A browsing session that turns URLs into rendered documents
#[async_trait]
pub trait PageFetcher: Send {
    /// Loads `url`, waits for it to settle and captures the DOM. No retries.
    async fn fetch(&mut self, url: &str) -> Result<RenderedDocument, FetchError>;

    /// Releases the session. Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), FetchError>;
}

/// Chrome driven over WebDriver (chromedriver)
pub struct WebDriverFetcher {
    client: Option<Client>,
    settle_delay: Duration,
    page_load_timeout: Duration,
}

impl WebDriverFetcher {
    /// Opens a browser session
    ///
    /// # Arguments
    /// * `config` - WebDriver endpoint, headless mode and timing
    pub async fn connect(config: &BrowserConfig) -> Result<Self, FetchError> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(chrome_capabilities(config.headless));
        let client = builder
            .connect(&config.webdriver_url)
            .await
            .map_err(|e| FetchError::SessionError {
                url: config.webdriver_url.to_owned(),
                message: e.to_string(),
            })?;
        tracing::info!("Browser session started at {}", config.webdriver_url);

        // The browser aborts slow navigations itself; otherwise a timed-out
        // load keeps running and the next command queues behind it
        let updated = client.update_timeouts(session_timeouts(config.page_load_timeout())).await;
        if let Err(e) = updated {
            let _ = client.close().await;
            return Err(FetchError::SessionError {
                url: config.webdriver_url.to_owned(),
                message: format!("setting page load timeout: {e}"),
            });
        }

        Ok(Self {
            client: Some(client),
            settle_delay: config.settle_delay(),
            page_load_timeout: config.page_load_timeout(),
        })
    }
}

/// Session timeouts: only the page load budget is set
fn session_timeouts(page_load: Duration) -> TimeoutConfiguration {
    TimeoutConfiguration::new(None, Some(page_load), None)
}

/// `goog:chromeOptions` with the arguments for an unattended run
fn chrome_capabilities(headless: bool) -> Map<String, Value> {
    let mut args = vec!["--disable-gpu"];
    if headless {
        args.insert(0, "--headless");
    }
    let mut capabilities = Map::new();
    capabilities.insert("goog:chromeOptions".to_owned(), json!({ "args": args }));
    capabilities
}

#[async_trait]
impl PageFetcher for WebDriverFetcher {
    async fn fetch(&mut self, url: &str) -> Result<RenderedDocument, FetchError> {
        let client = self.client.as_mut().ok_or(FetchError::SessionClosed)?;

        match tokio::time::timeout(self.page_load_timeout, client.goto(url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => Err(FetchError::NavigationError {
                url: url.to_owned(),
                message: e.to_string(),
            })?,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_owned(),
                seconds: self.page_load_timeout.as_secs(),
            })?,
        }

        tokio::time::sleep(self.settle_delay).await;

        let html = client.source().await.map_err(|e| FetchError::PageSourceError {
            url: url.to_owned(),
            message: e.to_string(),
        })?;
        let final_url = client
            .current_url()
            .await
            .map(String::from)
            .unwrap_or_else(|_| url.to_owned());
        tracing::debug!("Captured {} bytes from {}", html.len(), final_url);

        Ok(RenderedDocument { url: final_url, html })
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        if let Some(client) = self.client.take() {
            tracing::info!("Closing browser session");
            client.close().await.map_err(|e| FetchError::CloseError(e.to_string()))?;
        }
        Ok(())
    }
}

/// Serves canned HTML by URL and records what was asked for. Lets the
/// pipeline run without a browser.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, Result<String, String>>,
    calls: Vec<String>,
    closes: usize,
    closed: bool,
    fail_close: bool,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `html` for `url`
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_owned(), Ok(html.to_owned()));
        self
    }

    /// Fails navigation to `url` with `message`
    pub fn with_failure(mut self, url: &str, message: &str) -> Self {
        self.pages.insert(url.to_owned(), Err(message.to_owned()));
        self
    }

    /// Makes `close` report an error
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// URLs fetched so far, in order
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Number of times `close` was called
    pub fn close_count(&self) -> usize {
        self.closes
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&mut self, url: &str) -> Result<RenderedDocument, FetchError> {
        if self.closed {
            return Err(FetchError::SessionClosed);
        }
        self.calls.push(url.to_owned());
        match self.pages.get(url) {
            Some(Ok(html)) => Ok(RenderedDocument {
                url: url.to_owned(),
                html: html.to_owned(),
            }),
            Some(Err(message)) => Err(FetchError::NavigationError {
                url: url.to_owned(),
                message: message.to_owned(),
            }),
            None => Err(FetchError::NavigationError {
                url: url.to_owned(),
                message: "no page scripted".to_owned(),
            }),
        }
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        self.closes += 1;
        self.closed = true;
        if self.fail_close {
            return Err(FetchError::CloseError("scripted failure".to_owned()));
        }
        Ok(())
    }
}

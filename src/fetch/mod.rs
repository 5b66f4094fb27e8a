//! Retrieving raw pages, either with a plain GET or through a headless browser.
//!
//! # Sessions
//!
//! Each source run opens its own [`Fetcher`] through a [`FetchProvider`] and
//! closes it when the run ends, whatever the outcome. For the browser engine
//! that session owns one Chromium process, shared by every page the source
//! visits and shut down by [`Fetcher::close`].
//!
//! | Engine | Implementation | Used by |
//! |--------|----------------|---------|
//! | [`Engine::Http`] | [`http::HttpFetcher`] | TechCrunch |
//! | [`Engine::Browser`] | [`browser::BrowserFetcher`] | NVIDIA, Yahoo |

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::CrawlConfig;
use crate::error::FetchError;

pub mod browser;
pub mod http;

use browser::BrowserFetcher;
use http::HttpFetcher;

/// When a rendered page counts as ready to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadySignal {
    /// The navigation's load event.
    Loaded,
    /// Load, then wait a fixed delay for late scripts.
    Settle(Duration),
    /// Load, then wait up to `wait` for `css` to match. Not finding it is
    /// not an error; the page is read as it is.
    Selector { css: String, wait: Duration },
}

/// How a single URL should be retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    Static,
    Rendered { ready: ReadySignal, timeout: Duration },
}

impl FetchMode {
    pub fn rendered(ready: ReadySignal, timeout: Duration) -> Self {
        FetchMode::Rendered { ready, timeout }
    }
}

/// Which kind of session a source needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Http,
    Browser,
}

/// Markup or text returned for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Final URL after redirects, used to resolve relative links.
    pub url: String,
    pub body: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, mode: &FetchMode) -> Result<RawPage, FetchError>;

    /// Release any engine resources held by this session.
    async fn close(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Opens one fetch session per source run.
#[async_trait]
pub trait FetchProvider: Send + Sync {
    async fn open(&self, engine: Engine) -> Result<Box<dyn Fetcher>, FetchError>;
}

/// The real network: reqwest for static pages, Chromium for rendered ones.
#[derive(Debug, Clone)]
pub struct WebFetchProvider {
    http: reqwest::Client,
    enable_browser: bool,
    fetch_timeout: Duration,
}

impl WebFetchProvider {
    pub fn new(config: &CrawlConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            enable_browser: config.enable_browser,
            fetch_timeout: config.fetch_timeout(),
        })
    }
}

#[async_trait]
impl FetchProvider for WebFetchProvider {
    async fn open(&self, engine: Engine) -> Result<Box<dyn Fetcher>, FetchError> {
        match engine {
            Engine::Browser if self.enable_browser => {
                let browser = BrowserFetcher::launch().await?;
                info!("Opened browser session");
                Ok(Box::new(browser))
            }
            Engine::Browser => {
                warn!("Browser disabled; rendered pages will be fetched as static HTML");
                Ok(Box::new(HttpFetcher::new(self.http.clone(), self.fetch_timeout)))
            }
            Engine::Http => Ok(Box::new(HttpFetcher::new(self.http.clone(), self.fetch_timeout))),
        }
    }
}

//! Rendered fetching through headless Chromium.
//!
//! One [`BrowserFetcher`] owns one browser process for the length of a
//! source run. Every fetch opens its own page and closes it again before
//! returning, on success, on navigation errors, and on timeouts alike.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use super::{FetchMode, Fetcher, RawPage, ReadySignal};
use crate::error::FetchError;

const SELECTOR_POLL: Duration = Duration::from_millis(250);

pub struct BrowserFetcher {
    browser: RwLock<Option<Browser>>,
    handler: JoinHandle<()>,
}

impl BrowserFetcher {
    /// Start a headless browser and its CDP event loop.
    #[instrument(level = "info")]
    pub async fn launch() -> Result<Self, FetchError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(FetchError::Browser)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler,
        })
    }

    async fn render(&self, page: &Page, url: &str, ready: &ReadySignal) -> Result<String, FetchError> {
        let render_err = |e: chromiumoxide::error::CdpError| FetchError::Render {
            url: url.to_string(),
            reason: e.to_string(),
        };

        // `goto` returns once the navigation's load event has fired.
        page.goto(url).await.map_err(render_err)?;

        match ready {
            ReadySignal::Loaded => {}
            ReadySignal::Settle(delay) => sleep(*delay).await,
            ReadySignal::Selector { css, wait } => {
                let deadline = Instant::now() + *wait;
                loop {
                    if page.find_element(css.as_str()).await.is_ok() {
                        break;
                    }
                    if Instant::now() >= deadline {
                        debug!(%css, "Ready selector never appeared; reading page as is");
                        break;
                    }
                    sleep(SELECTOR_POLL).await;
                }
            }
        }

        page.content().await.map_err(render_err)
    }
}

impl std::fmt::Debug for BrowserFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserFetcher").finish_non_exhaustive()
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    #[instrument(level = "debug", skip(self, mode), fields(%url))]
    async fn fetch(&self, url: &str, mode: &FetchMode) -> Result<RawPage, FetchError> {
        let (ready, limit) = match mode {
            FetchMode::Rendered { ready, timeout } => (ready.clone(), *timeout),
            FetchMode::Static => (ReadySignal::Loaded, Duration::from_secs(30)),
        };

        let guard = self.browser.read().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| FetchError::Browser("browser already closed".into()))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let t0 = Instant::now();
        let outcome = match timeout(limit, self.render(&page, url, &ready)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                after: limit,
            }),
        };

        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close page");
        }

        let body = outcome?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Rendered page"
        );
        Ok(RawPage {
            url: url.to_string(),
            body,
        })
    }

    async fn close(&self) -> Result<(), FetchError> {
        let Some(mut browser) = self.browser.write().await.take() else {
            return Ok(());
        };
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler.abort();
        info!("Closed browser session");
        closed
            .map(|_| ())
            .map_err(|e| FetchError::Browser(e.to_string()))
    }
}

impl Drop for BrowserFetcher {
    // Dropping the `Browser` kills its child process if `close` never ran.
    fn drop(&mut self) {
        self.handler.abort();
    }
}

//! Plain HTTP fetching with reqwest.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::{FetchMode, Fetcher, RawPage};
use crate::error::FetchError;

/// Issues one GET per fetch and returns the response text.
///
/// Rendered requests are served the same way: the page comes back as the
/// server sent it, without running any scripts.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn map_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self, _mode), fields(%url))]
    async fn fetch(&self, url: &str, _mode: &FetchMode) -> Result<RawPage, FetchError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Non-success status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| self.map_error(url, e))?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(RawPage {
            url: final_url,
            body,
        })
    }
}

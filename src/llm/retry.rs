//! Exponential backoff around any [`ModelClient`].
//!
//! # Retry Strategy
//!
//! - Only transient failures are retried (the endpoint could not be reached
//!   or answered with an error status)
//! - The delay doubles from `base_delay` on every attempt
//! - The delay is capped at 30 seconds
//! - Random jitter (0-250ms) is added to each delay
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use async_trait::async_trait;
use rand::{rng, Rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

use super::client::{ChatRequest, ModelClient};
use crate::error::Result;

/// Decorator that retries transient failures of the wrapped client.
///
/// With `max_retries == 0` every call is passed straight through.
pub struct RetryingClient<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryingClient<T>
where
    T: ModelClient,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryingClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingClient")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<T> ModelClient for RetryingClient<T>
where
    T: ModelClient,
{
    #[instrument(level = "info", skip_all)]
    async fn chat_completion(&self, request: &ChatRequest) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.chat_completion(request).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() || attempt > self.max_retries {
                        if self.max_retries > 0 {
                            error!(
                                attempt,
                                max = self.max_retries,
                                elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                                elapsed_ms_total = total_dt.as_millis() as u64,
                                error = %e,
                                "chat_completion() giving up"
                            );
                        }
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "chat_completion() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

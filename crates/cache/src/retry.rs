use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::options::{MAX_RETRY_DELAY, QueryOptions};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    pub fn from_options(options: &QueryOptions) -> Self {
        Self::new(options.retry_count, options.retry_delay, MAX_RETRY_DELAY)
    }

    /// Delay before retry number `retry` (1-based): the initial backoff
    /// doubled per earlier retry, capped at the maximum.
    pub fn backoff(&self, retry: usize) -> Duration {
        let doublings = retry.saturating_sub(1).min(31) as u32;
        self.initial_backoff
            .saturating_mul(1u32 << doublings)
            .min(self.max_backoff)
    }

    /// Run `f` until it succeeds or `max_retries` retries have failed.
    ///
    /// `f` gets the attempt number, 0 for the first call. `on_retry` runs
    /// before every retry with the retry number and the error that caused it.
    pub async fn retry<F, Fut, T, E>(
        &self,
        key: &str,
        mut f: F,
        mut on_retry: impl FnMut(usize, &E),
    ) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            let error = match f(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(key, attempts = attempt + 1, "Fetch recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt == self.max_retries {
                warn!(key, attempts = attempt + 1, error = %error, "Fetch failed, giving up");
                return Err(error);
            }

            attempt += 1;
            let delay = self.backoff(attempt);
            warn!(key, retry = attempt, delay_ms = delay.as_millis() as u64, error = %error, "Fetch failed, retrying");
            on_retry(attempt, &error);
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }
}

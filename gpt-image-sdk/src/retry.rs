// ABOUTME: Retry logic with exponential backoff for handling transient failures
// ABOUTME: Retries network errors, timeouts, rate limits and provider 5xx responses

use crate::constants::retry;
use crate::error::ImageError;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: retry::MAX_RETRIES,
            initial_delay: retry::INITIAL_DELAY,
            max_delay: retry::MAX_DELAY,
            backoff_multiplier: retry::BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        std::cmp::min(
            Duration::from_millis((delay.as_millis() as f64 * self.backoff_multiplier) as u64),
            self.max_delay,
        )
    }
}

pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, ImageError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ImageError>>,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) if error.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                tracing::warn!(
                    %error,
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed (retryable), retrying"
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
            Err(error) => return Err(error),
        }
    }
}

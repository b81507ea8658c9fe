//! Retry with exponential backoff around API calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use brickql_core::{ConnectorError, RetrySettings, RetryablePredicate};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    predicate: RetryablePredicate,
    settings: RetrySettings,
}

impl RetryPolicy {
    pub fn new(predicate: RetryablePredicate, settings: RetrySettings) -> Self {
        Self {
            predicate,
            settings,
        }
    }

    /// Delay before retry number `retry` (1-based): `min * 2^(retry-1)`,
    /// capped at the configured maximum.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.settings
            .min_delay
            .saturating_mul(factor)
            .min(self.settings.max_delay)
    }

    /// Run `call`, retrying while it fails with a retryable error.
    ///
    /// Errors the predicate does not match are returned immediately. When
    /// attempts run out the last API error comes back as `RateLimited`.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ConnectorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ConnectorError>>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if self.predicate.matches(&err) => {
                    let Some(api) = err.api_error().cloned() else {
                        return Err(err);
                    };
                    if attempt >= max_attempts {
                        return Err(ConnectorError::RateLimited {
                            attempts: attempt,
                            last: api,
                        });
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %api,
                        "retrying API call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

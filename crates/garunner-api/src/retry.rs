//! Fixed-delay retry for quota failures
//!
//! The reporting API answers with a quota error when too many requests are
//! running for a project or user. [`RetryPolicy::run`] resubmits such calls
//! through the [`Dispatcher`] after a fixed delay, up to `max_retries` times.
//! The delay is slept without holding a dispatcher slot. Every other failure
//! is returned on the spot.

use std::{future::Future, time::Duration};

use garunner_core::{config::ConcurrencyConfig, domain::QueryError, ports::ReportError};
use tracing::{debug, warn};

use crate::dispatcher::Dispatcher;

/// Retry settings for quota-exceeded failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy retrying up to `max_retries` times, `delay` apart.
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn from_config(config: &ConcurrencyConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.delay_ms))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `call` through `dispatcher`, retrying on quota exhaustion.
    ///
    /// `call` receives the 1-based attempt number. A call that keeps failing
    /// with [`ReportError::QuotaExceeded`] is attempted `max_retries + 1`
    /// times in total before [`QueryError::QuotaExhausted`] is returned.
    pub async fn run<F, Fut, T>(&self, dispatcher: &Dispatcher, mut call: F) -> Result<T, QueryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ReportError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match dispatcher.submit(call(attempt)).await? {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_quota_exceeded() && attempt <= self.max_retries => {
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Quota exceeded, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(QueryError::from_report(e, attempt)),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ConcurrencyConfig::default())
    }
}

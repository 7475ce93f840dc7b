//! Bounded retry with backoff for transient fetch failures

use crate::config::{Backoff, MediaConfig};
use crate::error::{MediaError, Result};
use crate::fetch::{FetchedMedia, MediaFetcher};
use crate::key::ResourceKey;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry policy applied around a single-attempt [`MediaFetcher`]
///
/// Only transient, timeout and network failures are retried. Each attempt is
/// bounded by `attempt_timeout`; overrunning it counts as a transient failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&MediaConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            base_delay: config.retry_delay,
            backoff: config.backoff,
            attempt_timeout: config.attempt_timeout,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    ///
    /// Non-decreasing in `attempt` for both curves.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 1u32 << (attempt - 1).min(16);
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    /// Fetch `key`, retrying transient failures up to `max_attempts`
    pub async fn fetch(&self, fetcher: &dyn MediaFetcher, key: &ResourceKey) -> Result<FetchedMedia> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Fetch attempt {}/{} for {}", attempt, self.max_attempts, key);

            let outcome = match tokio::time::timeout(self.attempt_timeout, fetcher.fetch(key)).await
            {
                Ok(result) => result,
                Err(_) => Err(MediaError::Timeout {
                    timeout_ms: self.attempt_timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(media) => {
                    if attempt > 1 {
                        info!("Fetched {} after {} attempts", key, attempt);
                    }
                    return Ok(media);
                }
                Err(e) if e.is_retriable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Fetch for {} failed (attempt {}/{}), retrying after {:?}: {}",
                        key, attempt, self.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retriable() {
                        warn!("Giving up on {} after {} attempts: {}", key, attempt, e);
                    } else {
                        debug!("Fetch for {} failed without retry: {}", key, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

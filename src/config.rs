//! Configuration for the media loading pipeline

use crate::error::{MediaError, Result};
use crate::visibility::RootMargin;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay growth between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `retry_delay * attempt`
    Linear,
    /// `retry_delay * 2^(attempt - 1)`
    Exponential,
}

/// Configuration for cache, fetch, retry and visibility behaviour
///
/// Defaults mirror the labeling frontend:
/// - 5 minute cache timeout, 50 cached items
/// - 3 attempts with a 1 second base delay
/// - load when 10% of a placeholder is within 100px of the viewport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Base URL of the labeling backend
    pub base_url: String,

    /// Age after which a cache entry is stale
    pub cache_timeout: Duration,

    /// Maximum number of entries kept after a cleanup pass
    pub max_cache_size: usize,

    /// Total attempts per load, including the first
    pub retry_attempts: u32,

    /// Base delay between attempts
    pub retry_delay: Duration,

    /// How the delay grows with each attempt
    pub backoff: Backoff,

    /// Upper bound on a single attempt; exceeding it counts as transient
    pub attempt_timeout: Duration,

    /// Visible fraction a placeholder must exceed before loading
    pub loading_threshold: f64,

    /// Expansion applied to the viewport before intersecting
    pub root_margin: RootMargin,

    /// Maximum concurrent requests issued by a preload batch
    pub preload_concurrency: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            cache_timeout: Duration::from_millis(300_000),
            max_cache_size: 50,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            backoff: Backoff::Linear,
            attempt_timeout: Duration::from_secs(30),
            loading_threshold: 0.1,
            root_margin: RootMargin::uniform_px(100.0),
            preload_concurrency: 4,
        }
    }
}

/// camelCase option surface accepted by `from_options_json`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigOptions {
    base_url: Option<String>,
    cache_timeout_ms: Option<u64>,
    max_cache_size: Option<usize>,
    retry_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
    attempt_timeout_ms: Option<u64>,
    loading_threshold: Option<f64>,
    root_margin: Option<String>,
}

impl MediaConfig {
    /// Create a new builder for media configuration
    pub fn builder() -> MediaConfigBuilder {
        MediaConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(MediaError::Config("base_url must not be empty".to_string()));
        }

        if self.max_cache_size == 0 {
            return Err(MediaError::Config(
                "max_cache_size must be greater than 0".to_string(),
            ));
        }

        if self.retry_attempts == 0 {
            return Err(MediaError::Config(
                "retry_attempts must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.loading_threshold) {
            return Err(MediaError::Config(
                "loading_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.preload_concurrency == 0 {
            return Err(MediaError::Config(
                "preload_concurrency must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse the JSON option object used by the labeling frontend
    ///
    /// ```
    /// use labeling_media::MediaConfig;
    /// use std::time::Duration;
    ///
    /// let config = MediaConfig::from_options_json(r#"{"maxCacheSize": 10, "rootMargin": "50px"}"#).unwrap();
    /// assert_eq!(config.max_cache_size, 10);
    /// assert_eq!(config.cache_timeout, Duration::from_millis(300_000));
    /// ```
    pub fn from_options_json(json: &str) -> Result<Self> {
        let options: ConfigOptions = serde_json::from_str(json)?;
        let mut builder = Self::builder();

        if let Some(url) = options.base_url {
            builder = builder.base_url(url);
        }
        if let Some(ms) = options.cache_timeout_ms {
            builder = builder.cache_timeout(Duration::from_millis(ms));
        }
        if let Some(size) = options.max_cache_size {
            builder = builder.max_cache_size(size);
        }
        if let Some(attempts) = options.retry_attempts {
            builder = builder.retry_attempts(attempts);
        }
        if let Some(ms) = options.retry_delay_ms {
            builder = builder.retry_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = options.attempt_timeout_ms {
            builder = builder.attempt_timeout(Duration::from_millis(ms));
        }
        if let Some(threshold) = options.loading_threshold {
            builder = builder.loading_threshold(threshold);
        }
        if let Some(margin) = options.root_margin {
            builder = builder.root_margin(margin.parse()?);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `MEDIA_*` environment variables (and `.env`)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = Self::builder();

        if let Ok(url) = std::env::var("MEDIA_BASE_URL") {
            builder = builder.base_url(url);
        }
        if let Some(ms) = env_parse::<u64>("MEDIA_CACHE_TIMEOUT_MS")? {
            builder = builder.cache_timeout(Duration::from_millis(ms));
        }
        if let Some(size) = env_parse::<usize>("MEDIA_MAX_CACHE_SIZE")? {
            builder = builder.max_cache_size(size);
        }
        if let Some(attempts) = env_parse::<u32>("MEDIA_RETRY_ATTEMPTS")? {
            builder = builder.retry_attempts(attempts);
        }
        if let Some(ms) = env_parse::<u64>("MEDIA_RETRY_DELAY_MS")? {
            builder = builder.retry_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = env_parse::<u64>("MEDIA_ATTEMPT_TIMEOUT_MS")? {
            builder = builder.attempt_timeout(Duration::from_millis(ms));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| MediaError::Config(format!("{} has an invalid value: {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

/// Builder for media configuration
#[derive(Debug, Default)]
pub struct MediaConfigBuilder {
    base_url: Option<String>,
    cache_timeout: Option<Duration>,
    max_cache_size: Option<usize>,
    retry_attempts: Option<u32>,
    retry_delay: Option<Duration>,
    backoff: Option<Backoff>,
    attempt_timeout: Option<Duration>,
    loading_threshold: Option<f64>,
    root_margin: Option<RootMargin>,
    preload_concurrency: Option<usize>,
}

impl MediaConfigBuilder {
    /// Set the backend base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the cache entry lifetime
    pub fn cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of cached entries
    pub fn max_cache_size(mut self, max: usize) -> Self {
        self.max_cache_size = Some(max);
        self
    }

    /// Set total attempts per load
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    /// Set the base retry delay
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Set the backoff curve
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Set the per-attempt timeout
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Set the visibility threshold
    pub fn loading_threshold(mut self, threshold: f64) -> Self {
        self.loading_threshold = Some(threshold);
        self
    }

    /// Set the viewport margin
    pub fn root_margin(mut self, margin: RootMargin) -> Self {
        self.root_margin = Some(margin);
        self
    }

    /// Set preload concurrency
    pub fn preload_concurrency(mut self, limit: usize) -> Self {
        self.preload_concurrency = Some(limit);
        self
    }

    /// Build the media configuration
    pub fn build(self) -> MediaConfig {
        let defaults = MediaConfig::default();

        MediaConfig {
            base_url: self.base_url.unwrap_or(defaults.base_url),
            cache_timeout: self.cache_timeout.unwrap_or(defaults.cache_timeout),
            max_cache_size: self.max_cache_size.unwrap_or(defaults.max_cache_size),
            retry_attempts: self.retry_attempts.unwrap_or(defaults.retry_attempts),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            backoff: self.backoff.unwrap_or(defaults.backoff),
            attempt_timeout: self.attempt_timeout.unwrap_or(defaults.attempt_timeout),
            loading_threshold: self.loading_threshold.unwrap_or(defaults.loading_threshold),
            root_margin: self.root_margin.unwrap_or(defaults.root_margin),
            preload_concurrency: self
                .preload_concurrency
                .unwrap_or(defaults.preload_concurrency),
        }
    }
}

//! Download configuration.

use std::time::Duration;

use super::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RETRY_BASE_DELAY_MS,
};
use super::settings::DownloadSettings;
use crate::provider::DEFAULT_USER_AGENT;

/// Configuration for tile downloading.
///
/// Groups the HTTP client and worker-pool parameters, providing sensible
/// defaults while allowing customization.
///
/// # Example
///
/// ```
/// use tilemosaic::config::DownloadConfig;
///
/// // Using defaults
/// let config = DownloadConfig::default();
/// assert_eq!(config.request_timeout_ms(), 30_000);
/// assert_eq!(config.max_retries(), 3);
/// assert_eq!(config.concurrency(), 8);
///
/// // Custom configuration
/// let config = DownloadConfig::new()
///     .with_request_timeout_ms(5_000)
///     .with_max_retries(5)
///     .with_concurrency(16);
/// assert_eq!(config.concurrency(), 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Per-request HTTP timeout (milliseconds)
    request_timeout_ms: u64,
    /// Retry attempts after the first failed request
    max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    retry_base_delay_ms: u64,
    /// Maximum number of tiles in flight
    concurrency: usize,
    /// User-Agent header value
    user_agent: String,
}

impl DownloadConfig {
    /// Create a new download configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout in milliseconds.
    ///
    /// A request exceeding it counts as a failed attempt. Default: 30 000 ms.
    pub fn with_request_timeout_ms(mut self, timeout: u64) -> Self {
        self.request_timeout_ms = timeout;
        self
    }

    /// Set the maximum number of retry attempts per tile.
    ///
    /// Permanent failures (e.g. HTTP 404) are never retried. Default: 3.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base backoff delay in milliseconds.
    ///
    /// Attempt `n` waits `base * 2^(n-1)`. Default: 250 ms.
    pub fn with_retry_base_delay_ms(mut self, delay: u64) -> Self {
        self.retry_base_delay_ms = delay;
        self
    }

    /// Set the number of tiles processed concurrently. Default: 8.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Get the per-request timeout in milliseconds.
    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms
    }

    /// Get the per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Get the maximum number of retry attempts.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the base backoff delay.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Get the number of tiles processed concurrently.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Get the User-Agent header value.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            concurrency: DEFAULT_CONCURRENCY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl From<&DownloadSettings> for DownloadConfig {
    fn from(settings: &DownloadSettings) -> Self {
        Self {
            request_timeout_ms: settings.request_timeout_ms,
            max_retries: settings.max_retries,
            retry_base_delay_ms: settings.retry_base_delay_ms,
            concurrency: settings.concurrency,
            user_agent: settings.user_agent.clone(),
        }
    }
}

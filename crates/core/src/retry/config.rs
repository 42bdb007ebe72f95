//! Retry policy configuration.

use std::time::Duration;

use crate::config::{duration_from_secs, DownloadConfig};

/// Runtime retry settings, resolved once from [`DownloadConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Charged failures allowed before an item is abandoned.
    pub max_retries: u32,
    /// First backoff step for transient errors.
    pub backoff_base: Duration,
    /// Upper bound for any computed backoff.
    pub backoff_max: Duration,
    /// Delay used for rate-limit responses that carry no hint.
    pub error_retry_delay: Duration,
    /// Whether 429 responses are charged against `max_retries`.
    pub rate_limit_counts_toward_retries: bool,
    /// Ceiling for uncharged rate-limit hits on a single item.
    pub max_rate_limit_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(300),
            error_retry_delay: Duration::from_secs(5),
            rate_limit_counts_toward_retries: false,
            max_rate_limit_retries: 20,
        }
    }
}

impl From<&DownloadConfig> for RetryConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: duration_from_secs(config.backoff_base_secs),
            backoff_max: duration_from_secs(config.backoff_max_secs),
            error_retry_delay: duration_from_secs(config.error_retry_delay_secs),
            rate_limit_counts_toward_retries: config.rate_limit_counts_toward_retries,
            max_rate_limit_retries: config.max_rate_limit_retries,
        }
    }
}

impl RetryConfig {
    /// Config with no waiting between attempts (useful for testing).
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            error_retry_delay: Duration::ZERO,
            ..Default::default()
        }
    }
}

//! Orchestrator configuration.

use crate::config::DownloadConfig;
use crate::retry::RetryConfig;

/// Configuration for the download orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Items claimed per scheduling pass.
    pub batch_size: usize,

    /// Items processed concurrently within a batch.
    /// The museum's rate limiter still spaces the actual requests.
    pub concurrency: usize,

    /// Retry classification settings.
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for OrchestratorConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
            retry: RetryConfig::from(config),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_from_download_config() {
        let download = DownloadConfig {
            batch_size: 10,
            concurrency: 2,
            max_retries: 3,
            ..Default::default()
        };
        let config = OrchestratorConfig::from(&download);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_builders_clamp_to_one() {
        let config = OrchestratorConfig::default()
            .with_batch_size(0)
            .with_concurrency(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.concurrency, 1);
    }
}

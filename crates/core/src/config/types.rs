use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::artwork::MuseumTag;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub museums: MuseumsConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("artvault.db")
}

/// Where downloaded images are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory; each museum gets a subdirectory.
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            images_dir: default_images_dir(),
        }
    }
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("data/images")
}

/// Scheduling and retry settings shared by all museums
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Items claimed per scheduling pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Items processed concurrently within a batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Wait after a rate-limit response without a Retry-After hint.
    #[serde(default = "default_error_retry_delay")]
    pub error_retry_delay_secs: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: f64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: f64,
    /// Charge 429 responses against `max_retries`.
    #[serde(default)]
    pub rate_limit_counts_toward_retries: bool,
    /// Cap on uncharged 429 responses per item.
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            error_retry_delay_secs: default_error_retry_delay(),
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
            rate_limit_counts_toward_retries: false,
            max_rate_limit_retries: default_max_rate_limit_retries(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_concurrency() -> usize {
    4
}

fn default_error_retry_delay() -> f64 {
    5.0
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base() -> f64 {
    1.0
}

fn default_backoff_max() -> f64 {
    300.0
}

fn default_max_rate_limit_retries() -> u32 {
    20
}

/// Per-museum sections, `[museums.aic]` etc.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MuseumsConfig {
    #[serde(default)]
    pub aic: MuseumConfig,
    #[serde(default)]
    pub met: MuseumConfig,
    #[serde(default)]
    pub cma: MuseumConfig,
}

impl MuseumsConfig {
    pub fn get(&self, museum: MuseumTag) -> &MuseumConfig {
        match museum {
            MuseumTag::Aic => &self.aic,
            MuseumTag::Met => &self.met,
            MuseumTag::Cma => &self.cma,
        }
    }

    pub fn get_mut(&mut self, museum: MuseumTag) -> &mut MuseumConfig {
        match museum {
            MuseumTag::Aic => &mut self.aic,
            MuseumTag::Met => &mut self.met,
            MuseumTag::Cma => &mut self.cma,
        }
    }

    /// Enabled museums in processing order.
    pub fn enabled(&self) -> Vec<MuseumTag> {
        MuseumTag::ALL
            .into_iter()
            .filter(|tag| self.get(*tag).enabled)
            .collect()
    }
}

/// Connection settings for one museum API.
///
/// Unset URLs and user agent fall back to per-museum defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MuseumConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// IIIF image server (AIC only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iiif_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Appended to the user agent as "UA (email)".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    /// Minimum spacing between requests. Takes precedence over
    /// `requests_per_second`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_per_request: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<f64>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Identifiers requested per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for MuseumConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: None,
            iiif_base_url: None,
            user_agent: None,
            contact_email: None,
            seconds_per_request: None,
            requests_per_second: None,
            timeout_secs: default_timeout(),
            page_size: default_page_size(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

const DEFAULT_SECONDS_PER_REQUEST: f64 = 1.0;

/// Longest configurable delay or request interval: one year.
pub const MAX_DELAY_SECS: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Seconds from config as a [`Duration`], clamped to `0..=MAX_DELAY_SECS`.
pub fn duration_from_secs(seconds: f64) -> Duration {
    if seconds.is_nan() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(seconds.clamp(0.0, MAX_DELAY_SECS))
}

impl MuseumConfig {
    pub fn base_url(&self, museum: MuseumTag) -> String {
        let url = self.base_url.clone().unwrap_or_else(|| {
            match museum {
                MuseumTag::Aic => "https://api.artic.edu/api/v1",
                MuseumTag::Met => "https://collectionapi.metmuseum.org/public/collection/v1",
                MuseumTag::Cma => "https://openaccess-api.clevelandart.org/api",
            }
            .to_string()
        });
        url.trim_end_matches('/').to_string()
    }

    pub fn iiif_base_url(&self) -> String {
        self.iiif_base_url
            .clone()
            .unwrap_or_else(|| "https://www.artic.edu/iiif/2".to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// User agent with the contact address appended, if configured.
    pub fn user_agent(&self) -> String {
        let base = self
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("artvault/{}", env!("CARGO_PKG_VERSION")));
        match self.contact_email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => format!("{} ({})", base, email),
            _ => base,
        }
    }

    pub fn request_interval(&self) -> Duration {
        let seconds = match (self.seconds_per_request, self.requests_per_second) {
            (Some(spr), _) => spr,
            (None, Some(rps)) if rps > 0.0 => 1.0 / rps,
            _ => DEFAULT_SECONDS_PER_REQUEST,
        };
        duration_from_secs(seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_interval_is_clamped() {
        let museum = MuseumConfig {
            seconds_per_request: Some(1e30),
            ..Default::default()
        };
        assert_eq!(
            museum.request_interval(),
            Duration::from_secs_f64(MAX_DELAY_SECS)
        );

        let museum = MuseumConfig {
            seconds_per_request: None,
            requests_per_second: Some(1e-300),
            ..Default::default()
        };
        assert_eq!(
            museum.request_interval(),
            Duration::from_secs_f64(MAX_DELAY_SECS)
        );
        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "artvault.db");
        assert_eq!(config.storage.images_dir.to_str().unwrap(), "data/images");
        assert_eq!(config.download.batch_size, 100);
        assert_eq!(config.download.max_retries, 5);
        assert_eq!(config.download.error_retry_delay_secs, 5.0);
        assert!(!config.download.rate_limit_counts_toward_retries);
        assert_eq!(
            config.museums.enabled(),
            vec![MuseumTag::Aic, MuseumTag::Met, MuseumTag::Cma]
        );
    }

    #[test]
    fn test_deserialize_museum_sections() {
        let toml = r#"
[download]
batch_size = 25
concurrency = 2

[museums.aic]
user_agent = "AIC-ArtDownloadBot/1.0"
contact_email = "curator@example.org"
seconds_per_request = 0.5

[museums.met]
enabled = false

[museums.cma]
base_url = "http://localhost:9000/api/"
requests_per_second = 4.0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.download.batch_size, 25);
        assert_eq!(config.download.concurrency, 2);
        assert_eq!(
            config.museums.enabled(),
            vec![MuseumTag::Aic, MuseumTag::Cma]
        );

        let aic = config.museums.get(MuseumTag::Aic);
        assert_eq!(
            aic.user_agent(),
            "AIC-ArtDownloadBot/1.0 (curator@example.org)"
        );
        assert_eq!(aic.request_interval(), Duration::from_millis(500));
        assert_eq!(aic.base_url(MuseumTag::Aic), "https://api.artic.edu/api/v1");

        let cma = config.museums.get(MuseumTag::Cma);
        assert_eq!(cma.base_url(MuseumTag::Cma), "http://localhost:9000/api");
        assert_eq!(cma.request_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_default_request_interval() {
        let museum = MuseumConfig::default();
        assert_eq!(museum.request_interval(), Duration::from_secs(1));
        assert!(museum.user_agent().starts_with("artvault/"));
    }
}

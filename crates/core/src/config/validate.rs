use super::{types::Config, ConfigError, MAX_DELAY_SECS};
use crate::artwork::MuseumTag;

fn invalid(message: String) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message))
}

/// Validate configuration
/// Currently validates:
/// - Batch size and concurrency are not 0
/// - Retry delays are between zero and a year and the backoff cap is not below its base
/// - Enabled museums have usable URLs, rate limits, timeouts and page sizes
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let download = &config.download;
    if download.batch_size == 0 {
        return invalid("download.batch_size cannot be 0".to_string());
    }
    if download.concurrency == 0 {
        return invalid("download.concurrency cannot be 0".to_string());
    }
    for (name, value) in [
        ("error_retry_delay_secs", download.error_retry_delay_secs),
        ("backoff_base_secs", download.backoff_base_secs),
        ("backoff_max_secs", download.backoff_max_secs),
    ] {
        if !value.is_finite() || value < 0.0 {
            return invalid(format!("download.{} must be a non-negative number", name));
        }
        if value > MAX_DELAY_SECS {
            return invalid(format!(
                "download.{} cannot exceed {} seconds",
                name, MAX_DELAY_SECS
            ));
        }
    }
    if download.backoff_max_secs < download.backoff_base_secs {
        return invalid("download.backoff_max_secs cannot be below backoff_base_secs".to_string());
    }

    for tag in MuseumTag::ALL {
        let museum = config.museums.get(tag);
        if !museum.enabled {
            continue;
        }
        let section = format!("museums.{}", tag.as_str());

        for (name, url) in [
            ("base_url", museum.base_url.as_deref()),
            ("iiif_base_url", museum.iiif_base_url.as_deref()),
        ] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return invalid(format!("{}.{} must be an http(s) URL", section, name));
                }
            }
        }
        if let Some(spr) = museum.seconds_per_request {
            if !spr.is_finite() || spr < 0.0 {
                return invalid(format!(
                    "{}.seconds_per_request must be non-negative",
                    section
                ));
            }
            if spr > MAX_DELAY_SECS {
                return invalid(format!(
                    "{}.seconds_per_request cannot exceed {} seconds",
                    section, MAX_DELAY_SECS
                ));
            }
        }
        if let Some(rps) = museum.requests_per_second {
            if !rps.is_finite() || rps <= 0.0 {
                return invalid(format!("{}.requests_per_second must be positive", section));
            }
            if 1.0 / rps > MAX_DELAY_SECS {
                return invalid(format!(
                    "{}.requests_per_second is too small to schedule",
                    section
                ));
            }
        }
        if museum.timeout_secs == 0 {
            return invalid(format!("{}.timeout_secs cannot be 0", section));
        }
        if museum.page_size == 0 {
            return invalid(format!("{}.page_size cannot be 0", section));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, DownloadConfig};

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_batch_size_zero_fails() {
        let config = Config {
            download: DownloadConfig {
                batch_size: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_backoff_cap_below_base_fails() {
        let config = Config {
            download: DownloadConfig {
                backoff_base_secs: 10.0,
                backoff_max_secs: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_non_positive_rate_fails() {
        let mut config = Config::default();
        config.museums.met.requests_per_second = Some(0.0);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("museums.met.requests_per_second"));
    }

    #[test]
    fn test_validate_huge_delays_fail() {
        let config = load_config_from_str("[download]\nbackoff_max_secs = 1e30").unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("download.backoff_max_secs"));

        let mut config = Config::default();
        config.museums.aic.seconds_per_request = Some(1e30);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("museums.aic.seconds_per_request"));

        let mut config = Config::default();
        config.museums.cma.requests_per_second = Some(1e-30);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("museums.cma.requests_per_second"));
    }

    #[test]
    fn test_validate_bad_url_fails() {
        let mut config = Config::default();
        config.museums.aic.base_url = Some("api.artic.edu".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_disabled_museum_is_not_validated() {
        let mut config = Config::default();
        config.museums.cma.enabled = false;
        config.museums.cma.page_size = 0;
        assert!(validate_config(&config).is_ok());
    }
}

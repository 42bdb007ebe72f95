//! Pure failure classification.

use std::time::Duration;

use tracing::trace;

use super::config::RetryConfig;
use super::types::{AbortReason, AttemptCounts, ErrorKind, RetryDecision};
use crate::museum::MuseumError;

/// Decide what to do after `error`, given the counters recorded before it.
///
/// Transient network errors and 5xx responses back off exponentially and are
/// charged against `max_retries`. Rate-limit responses wait for the server's
/// hint (or `error_retry_delay`) and by default are bounded separately by
/// `max_rate_limit_retries`. Everything else aborts.
pub fn classify(error: &MuseumError, counts: AttemptCounts, config: &RetryConfig) -> RetryDecision {
    let decision = match error.kind() {
        ErrorKind::NetworkTransient | ErrorKind::HttpServerError => {
            let mut attempt = counts.failures + 1;
            if config.rate_limit_counts_toward_retries {
                attempt += counts.rate_limited;
            }
            if attempt > config.max_retries {
                RetryDecision::Abort(AbortReason::MaxRetriesExceeded)
            } else {
                after(backoff(attempt, config))
            }
        }
        ErrorKind::RateLimited => {
            let exhausted = if config.rate_limit_counts_toward_retries {
                counts.failures + counts.rate_limited + 1 > config.max_retries
            } else {
                counts.rate_limited + 1 > config.max_rate_limit_retries
            };
            if exhausted {
                RetryDecision::Abort(AbortReason::MaxRetriesExceeded)
            } else {
                let delay = error
                    .retry_after()
                    .unwrap_or(config.error_retry_delay)
                    .min(config.backoff_max.max(config.error_retry_delay));
                after(delay)
            }
        }
        ErrorKind::HttpClientError | ErrorKind::ParseOrValidation => {
            RetryDecision::Abort(AbortReason::Unrecoverable(unrecoverable_reason(error)))
        }
    };
    trace!(error = %error, ?counts, ?decision, "classified failure");
    decision
}

/// Exponential backoff for the `attempt`-th charged failure (1-based).
pub fn backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    config
        .backoff_base
        .checked_mul(1u32 << exponent)
        .unwrap_or(config.backoff_max)
        .min(config.backoff_max)
}

fn after(delay: Duration) -> RetryDecision {
    if delay.is_zero() {
        RetryDecision::RetryImmediately
    } else {
        RetryDecision::RetryAfter(delay)
    }
}

fn unrecoverable_reason(error: &MuseumError) -> String {
    match error {
        MuseumError::HttpStatus { status, .. } => match *status {
            400 => "bad request".to_string(),
            401 | 403 => "forbidden".to_string(),
            404 => "not found".to_string(),
            410 => "gone".to_string(),
            other => format!("http {}", other),
        },
        MuseumError::NoImage(_) => "no image available".to_string(),
        MuseumError::NotPublicDomain(_) => "not public domain".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::museum::MappingError;

    fn counts(failures: u32, rate_limited: u32) -> AttemptCounts {
        AttemptCounts {
            failures,
            rate_limited,
        }
    }

    fn timeout() -> MuseumError {
        MuseumError::Timeout {
            url: "https://api.example/1".into(),
        }
    }

    #[test]
    fn test_not_found_is_unrecoverable() {
        let decision = classify(
            &MuseumError::http_status(404, "u"),
            counts(0, 0),
            &RetryConfig::default(),
        );
        assert_eq!(
            decision,
            RetryDecision::Abort(AbortReason::Unrecoverable("not found".into()))
        );
    }

    #[test]
    fn test_transient_backs_off_exponentially() {
        let config = RetryConfig::default();
        assert_eq!(
            classify(&timeout(), counts(0, 0), &config),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            classify(&MuseumError::http_status(502, "u"), counts(2, 0), &config),
            RetryDecision::RetryAfter(Duration::from_secs(4))
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_retries: 100,
            backoff_max: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(backoff(10, &config), Duration::from_secs(60));
        assert_eq!(backoff(99, &config), Duration::from_secs(60));
    }

    #[test]
    fn test_max_retries_boundary() {
        let config = RetryConfig::default();
        // Fifth failure is still retried, sixth is not.
        assert!(!classify(&timeout(), counts(4, 0), &config).is_abort());
        assert_eq!(
            classify(&timeout(), counts(5, 0), &config),
            RetryDecision::Abort(AbortReason::MaxRetriesExceeded)
        );
    }

    #[test]
    fn test_zero_delay_retries_immediately() {
        let config = RetryConfig::immediate(3);
        assert_eq!(
            classify(&timeout(), counts(0, 0), &config),
            RetryDecision::RetryImmediately
        );
    }

    #[test]
    fn test_rate_limit_uses_hint_and_does_not_consume_budget() {
        let config = RetryConfig::default();
        let hinted = MuseumError::rate_limited("u", Some(Duration::from_secs(30)));
        assert_eq!(
            classify(&hinted, counts(5, 0), &config),
            RetryDecision::RetryAfter(Duration::from_secs(30))
        );

        let unhinted = MuseumError::rate_limited("u", None);
        assert_eq!(
            classify(&unhinted, counts(0, 3), &config),
            RetryDecision::RetryAfter(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_rate_limit_has_its_own_ceiling() {
        let config = RetryConfig {
            max_rate_limit_retries: 2,
            ..Default::default()
        };
        let err = MuseumError::rate_limited("u", None);
        assert!(!classify(&err, counts(0, 1), &config).is_abort());
        assert_eq!(
            classify(&err, counts(0, 2), &config),
            RetryDecision::Abort(AbortReason::MaxRetriesExceeded)
        );
    }

    #[test]
    fn test_rate_limit_counted_when_enabled() {
        let config = RetryConfig {
            rate_limit_counts_toward_retries: true,
            max_retries: 3,
            ..Default::default()
        };
        let err = MuseumError::rate_limited("u", None);
        assert!(!classify(&err, counts(1, 1), &config).is_abort());
        assert!(classify(&err, counts(1, 2), &config).is_abort());
        assert!(classify(&timeout(), counts(1, 2), &config).is_abort());
    }

    #[test]
    fn test_validation_failures_abort() {
        let config = RetryConfig::default();
        assert_eq!(
            classify(&MuseumError::NoImage("AIC:1".into()), counts(0, 0), &config),
            RetryDecision::Abort(AbortReason::Unrecoverable("no image available".into()))
        );
        assert_eq!(
            classify(
                &MuseumError::NotPublicDomain("CMA:9".into()),
                counts(0, 0),
                &config
            ),
            RetryDecision::Abort(AbortReason::Unrecoverable("not public domain".into()))
        );
        assert!(classify(
            &MappingError::MissingField("title").into(),
            counts(0, 0),
            &config
        )
        .is_abort());
        assert_eq!(
            classify(&MuseumError::http_status(418, "u"), counts(0, 0), &config),
            RetryDecision::Abort(AbortReason::Unrecoverable("http 418".into()))
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let config = RetryConfig::default();
        let cases: Vec<(MuseumError, AttemptCounts)> = vec![
            (timeout(), counts(0, 0)),
            (MuseumError::http_status(503, "u"), counts(2, 0)),
            (
                MuseumError::rate_limited("u", Some(Duration::from_secs(30))),
                counts(0, 3),
            ),
            (MuseumError::rate_limited("u", None), counts(1, 1)),
            (MuseumError::http_status(404, "u"), counts(0, 0)),
            (MappingError::MissingField("title").into(), counts(0, 0)),
            (timeout(), counts(config.max_retries, 0)),
            (timeout(), counts(config.max_retries - 1, 0)),
        ];

        for (error, attempts) in &cases {
            let first = classify(error, *attempts, &config);
            let second = classify(error, *attempts, &config);
            assert_eq!(first, second, "{error} after {attempts:?}");
        }
    }
}

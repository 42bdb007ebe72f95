//! Failure taxonomy and retry decisions.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Coarse failure category persisted alongside an item's last error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeouts, connection resets, DNS failures.
    NetworkTransient,
    /// HTTP 429 or an equivalent throttling signal.
    RateLimited,
    /// HTTP 5xx.
    HttpServerError,
    /// HTTP 4xx other than 429.
    HttpClientError,
    /// Malformed payloads, mapping failures, missing image, rights checks.
    ParseOrValidation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NetworkTransient => "network_transient",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::HttpServerError => "http_server_error",
            ErrorKind::HttpClientError => "http_client_error",
            ErrorKind::ParseOrValidation => "parse_or_validation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "network_transient" => Ok(ErrorKind::NetworkTransient),
            "rate_limited" => Ok(ErrorKind::RateLimited),
            "http_server_error" => Ok(ErrorKind::HttpServerError),
            "http_client_error" => Ok(ErrorKind::HttpClientError),
            "parse_or_validation" => Ok(ErrorKind::ParseOrValidation),
            other => Err(format!("unknown error kind: {other}")),
        }
    }
}

/// Why an item was given up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    /// The request can never succeed ("not found", "no image available").
    Unrecoverable(String),
    /// The retry budget is spent; a later run may still succeed.
    MaxRetriesExceeded,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Unrecoverable(reason) => write!(f, "unrecoverable: {}", reason),
            AbortReason::MaxRetriesExceeded => f.write_str("max retries exceeded"),
        }
    }
}

/// Outcome of classifying a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    RetryImmediately,
    RetryAfter(Duration),
    Abort(AbortReason),
}

impl RetryDecision {
    pub fn is_abort(&self) -> bool {
        matches!(self, RetryDecision::Abort(_))
    }

    /// Delay before the item becomes claimable again; `None` for aborts.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RetryDecision::RetryImmediately => Some(Duration::ZERO),
            RetryDecision::RetryAfter(delay) => Some(*delay),
            RetryDecision::Abort(_) => None,
        }
    }
}

/// Failure counters recorded for an item before the failure being classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptCounts {
    /// Failures charged against the retry budget.
    pub failures: u32,
    /// Rate-limit hits not charged against the budget.
    pub rate_limited: u32,
}

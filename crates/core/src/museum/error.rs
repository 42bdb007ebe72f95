//! Museum API errors.

use std::time::Duration;

use thiserror::Error;

use crate::retry::ErrorKind;

/// Failure mapping a raw museum payload into a canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {message}")]
    InvalidField { field: &'static str, message: String },
}

/// Errors raised while talking to a museum API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MuseumError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("network error calling {url}: {message}")]
    Network { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        status: u16,
        url: String,
        /// Server-provided wait hint, from `Retry-After`.
        retry_after: Option<Duration>,
    },

    #[error("invalid response: {0}")]
    Parse(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("no image available for {0}")]
    NoImage(String),

    #[error("{0} is not in the public domain")]
    NotPublicDomain(String),

    #[error("http client setup failed: {0}")]
    Client(String),
}

impl MuseumError {
    pub fn http_status(status: u16, url: impl Into<String>) -> Self {
        MuseumError::HttpStatus {
            status,
            url: url.into(),
            retry_after: None,
        }
    }

    pub fn rate_limited(url: impl Into<String>, retry_after: Option<Duration>) -> Self {
        MuseumError::HttpStatus {
            status: 429,
            url: url.into(),
            retry_after,
        }
    }

    /// Failure category used for retry decisions and persistence.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MuseumError::Timeout { .. } | MuseumError::Network { .. } => {
                ErrorKind::NetworkTransient
            }
            MuseumError::HttpStatus { status, .. } => match *status {
                429 => ErrorKind::RateLimited,
                408 => ErrorKind::NetworkTransient,
                s if s >= 500 => ErrorKind::HttpServerError,
                _ => ErrorKind::HttpClientError,
            },
            MuseumError::Parse(_)
            | MuseumError::Mapping(_)
            | MuseumError::NoImage(_)
            | MuseumError::NotPublicDomain(_)
            | MuseumError::Client(_) => ErrorKind::ParseOrValidation,
        }
    }

    /// The `Retry-After` hint, if the server sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MuseumError::HttpStatus { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MuseumError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        if e.is_timeout() {
            MuseumError::Timeout { url }
        } else if let Some(status) = e.status() {
            MuseumError::http_status(status.as_u16(), url)
        } else if e.is_decode() {
            MuseumError::Parse(e.to_string())
        } else {
            MuseumError::Network {
                url,
                message: e.to_string(),
            }
        }
    }
}

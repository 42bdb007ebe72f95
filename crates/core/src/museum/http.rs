//! Rate-limited HTTP plumbing shared by the museum clients.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;

use super::MuseumError;
use crate::artwork::MuseumTag;
use crate::config::MuseumConfig;
use crate::metrics;
use crate::rate_limiter::RateLimiterPool;

/// HTTP session for one museum.
///
/// Built from an explicit [`MuseumConfig`]; every request waits for the
/// museum's rate limiter before it is sent.
pub struct MuseumHttp {
    tag: MuseumTag,
    client: Client,
    limiter: Arc<RateLimiterPool>,
}

impl MuseumHttp {
    /// Create a session. `extra_headers` are sent with every request.
    pub fn new(
        tag: MuseumTag,
        config: &MuseumConfig,
        limiter: Arc<RateLimiterPool>,
        extra_headers: &[(&'static str, String)],
    ) -> Result<Self, MuseumError> {
        let mut headers = HeaderMap::new();
        for (name, value) in extra_headers {
            let value = HeaderValue::from_str(value)
                .map_err(|e| MuseumError::Client(format!("invalid {} header: {}", name, e)))?;
            headers.insert(HeaderName::from_static(*name), value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| MuseumError::Client(e.to_string()))?;

        Ok(Self {
            tag,
            client,
            limiter,
        })
    }

    pub fn tag(&self) -> MuseumTag {
        self.tag
    }

    async fn send(
        &self,
        url: &str,
        query: &[(&str, String)],
        operation: &'static str,
    ) -> Result<Response, MuseumError> {
        self.limiter.acquire(self.tag).await;
        debug!(museum = %self.tag, operation, url, "museum request");

        let result = self.client.get(url).query(query).send().await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let label = if e.is_timeout() { "timeout" } else { "error" };
                self.count(operation, label);
                return Err(e.into());
            }
        };

        let status = response.status();
        self.count(operation, status.as_str());
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        Err(MuseumError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
            retry_after,
        })
    }

    fn count(&self, operation: &'static str, status: &str) {
        metrics::MUSEUM_REQUESTS
            .with_label_values(&[self.tag.as_str(), operation, status])
            .inc();
    }

    /// GET a JSON document.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        operation: &'static str,
    ) -> Result<Value, MuseumError> {
        let response = self.send(url, query, operation).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| MuseumError::Parse(format!("{}: {}", url, e)))
    }

    /// GET image bytes, rejecting non-image or empty bodies.
    pub async fn get_image(&self, url: &str) -> Result<Vec<u8>, MuseumError> {
        let response = self.send(url, &[], "image").await?;

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.starts_with("image/") {
                return Err(MuseumError::Parse(format!(
                    "expected an image from {}, got {}",
                    url, content_type
                )));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(MuseumError::Parse(format!("empty image body from {}", url)));
        }
        Ok(bytes.to_vec())
    }
}

/// Parse a `Retry-After` value: delta seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Extract the `data` object most museum APIs wrap payloads in.
pub fn unwrap_data(payload: Value, url: &str) -> Result<Value, MuseumError> {
    match payload {
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Object(_)) => Ok(data),
            _ => Err(MuseumError::Parse(format!("{}: missing data object", url))),
        },
        _ => Err(MuseumError::Parse(format!("{}: expected a JSON object", url))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(
            parse_retry_after(" 120 ", Utc::now()),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );
        // Dates in the past mean "now".
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert!(parse_retry_after("soon", now).is_none());
    }

    #[test]
    fn test_unwrap_data() {
        let data = unwrap_data(json!({"data": {"id": 1}}), "u").unwrap();
        assert_eq!(data["id"], 1);

        assert!(matches!(
            unwrap_data(json!({"detail": "Not found"}), "u"),
            Err(MuseumError::Parse(_))
        ));
        assert!(matches!(
            unwrap_data(json!([1, 2]), "u"),
            Err(MuseumError::Parse(_))
        ));
    }

    #[test]
    fn test_new_rejects_invalid_header_value() {
        let result = MuseumHttp::new(
            MuseumTag::Aic,
            &MuseumConfig::default(),
            Arc::new(RateLimiterPool::empty()),
            &[("aic-user-agent", "bad\nvalue".to_string())],
        );
        assert!(matches!(result, Err(MuseumError::Client(_))));
    }
}

//! Mock museum client for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord, MuseumTag};
use crate::museum::{
    CandidatePage, MappingError, MuseumClient, MuseumError, RawArtwork,
};
use crate::rate_limiter::RateLimiterPool;

/// An artwork the mock museum can serve.
#[derive(Debug, Clone)]
pub struct MockArtwork {
    pub record: CanonicalArtworkRecord,
    pub image: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Listing order.
    artworks: Vec<MockArtwork>,
    page_size: usize,
    latency: Option<Duration>,
    /// Returned by the next listing calls, one per call.
    listing_errors: VecDeque<MuseumError>,
    /// Returned by metadata fetches for an id, one per call, before succeeding.
    metadata_failures: HashMap<String, VecDeque<MuseumError>>,
    /// Returned by every metadata fetch for an id.
    metadata_errors: HashMap<String, MuseumError>,
    /// Returned by every image fetch for an id.
    image_errors: HashMap<String, MuseumError>,
    list_cursors: Vec<Option<String>>,
    metadata_requests: Vec<ArtworkIdentifier>,
    image_requests: Vec<ArtworkIdentifier>,
}

/// Mock implementation of the MuseumClient trait.
///
/// Provides controllable behavior for testing:
/// - Serve a fixed set of artworks with offset-based paging
/// - Script per-id metadata and image failures
/// - Record every request for assertions
/// - Optionally route requests through a shared rate limiter
///
/// # Example
///
/// ```rust,ignore
/// use artvault_core::testing::{fixtures, MockMuseumClient};
///
/// let client = MockMuseumClient::new(MuseumTag::Aic)
///     .with_artworks(fixtures::public_domain_artworks(MuseumTag::Aic, &["1", "2"]))
///     .with_metadata_error("2", MuseumError::http_status(404, "https://api/artworks/2"));
/// ```
#[derive(Debug)]
pub struct MockMuseumClient {
    tag: MuseumTag,
    state: Arc<RwLock<MockState>>,
    limiter: Option<Arc<RateLimiterPool>>,
}

impl MockMuseumClient {
    /// Create a mock museum with no artworks.
    pub fn new(tag: MuseumTag) -> Self {
        Self {
            tag,
            state: Arc::new(RwLock::new(MockState {
                page_size: 100,
                ..Default::default()
            })),
            limiter: None,
        }
    }

    pub fn with_artworks(self, artworks: Vec<MockArtwork>) -> Self {
        self.state.write().unwrap().artworks.extend(artworks);
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.write().unwrap().page_size = page_size.max(1);
        self
    }

    /// Delay every request by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.write().unwrap().latency = Some(latency);
        self
    }

    /// Pass every request through `limiter`, like the real clients do.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiterPool>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_listing_error(self, error: MuseumError) -> Self {
        self.state.write().unwrap().listing_errors.push_back(error);
        self
    }

    pub fn with_metadata_error(self, native_id: &str, error: MuseumError) -> Self {
        self.set_metadata_error(native_id, error);
        self
    }

    /// Fail the next `count` metadata fetches for an id with a timeout.
    pub fn with_transient_failures(self, native_id: &str, count: usize) -> Self {
        let url = format!("https://mock.example.org/{}/{}", self.tag.as_str(), native_id);
        let failures = (0..count)
            .map(|_| MuseumError::Timeout { url: url.clone() })
            .collect();
        self.with_metadata_failures(native_id, failures)
    }

    /// Fail the next metadata fetches for an id with these errors, in order.
    pub fn with_metadata_failures(self, native_id: &str, errors: Vec<MuseumError>) -> Self {
        self.state
            .write()
            .unwrap()
            .metadata_failures
            .entry(native_id.to_string())
            .or_default()
            .extend(errors);
        self
    }

    pub fn with_image_error(self, native_id: &str, error: MuseumError) -> Self {
        self.state
            .write()
            .unwrap()
            .image_errors
            .insert(native_id.to_string(), error);
        self
    }

    /// Make every metadata fetch for an id fail.
    pub fn set_metadata_error(&self, native_id: &str, error: MuseumError) {
        self.state
            .write()
            .unwrap()
            .metadata_errors
            .insert(native_id.to_string(), error);
    }

    /// Let metadata fetches for an id succeed again.
    pub fn clear_metadata_error(&self, native_id: &str) {
        let mut state = self.state.write().unwrap();
        state.metadata_errors.remove(native_id);
        state.metadata_failures.remove(native_id);
    }

    /// Number of listing calls made.
    pub fn list_requests(&self) -> usize {
        self.state.read().unwrap().list_cursors.len()
    }

    /// Cursors passed to each listing call, in order.
    pub fn list_cursors(&self) -> Vec<Option<String>> {
        self.state.read().unwrap().list_cursors.clone()
    }

    pub fn metadata_requests(&self) -> Vec<ArtworkIdentifier> {
        self.state.read().unwrap().metadata_requests.clone()
    }

    pub fn image_requests(&self) -> Vec<ArtworkIdentifier> {
        self.state.read().unwrap().image_requests.clone()
    }

    async fn before_request(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.acquire(self.tag).await;
        }
        let latency = self.state.read().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn url(&self, identifier: &ArtworkIdentifier) -> String {
        format!(
            "https://mock.example.org/{}/{}",
            self.tag.as_str(),
            identifier.native_id
        )
    }
}

#[async_trait]
impl MuseumClient for MockMuseumClient {
    fn tag(&self) -> MuseumTag {
        self.tag
    }

    async fn list_candidates(&self, cursor: Option<&str>) -> Result<CandidatePage, MuseumError> {
        self.before_request().await;

        let mut state = self.state.write().unwrap();
        state.list_cursors.push(cursor.map(str::to_string));
        if let Some(error) = state.listing_errors.pop_front() {
            return Err(error);
        }

        let offset = match cursor {
            None => 0,
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| MuseumError::Parse(format!("invalid cursor '{}'", c)))?,
        };
        let start = offset.min(state.artworks.len());
        let end = start.saturating_add(state.page_size).min(state.artworks.len());
        let identifiers = state.artworks[start..end]
            .iter()
            .map(|a| a.record.identifier.clone())
            .collect();

        Ok(CandidatePage {
            identifiers,
            next_cursor: (end < state.artworks.len()).then(|| end.to_string()),
        })
    }

    async fn fetch_metadata(
        &self,
        identifier: &ArtworkIdentifier,
    ) -> Result<RawArtwork, MuseumError> {
        self.before_request().await;

        let mut state = self.state.write().unwrap();
        state.metadata_requests.push(identifier.clone());

        let id = identifier.native_id.as_str();
        if let Some(error) = state
            .metadata_failures
            .get_mut(id)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }
        if let Some(error) = state.metadata_errors.get(id) {
            return Err(error.clone());
        }

        let artwork = state
            .artworks
            .iter()
            .find(|a| &a.record.identifier == identifier)
            .ok_or_else(|| MuseumError::http_status(404, self.url(identifier)))?;
        let payload = serde_json::to_value(&artwork.record)
            .map_err(|e| MuseumError::Parse(e.to_string()))?;

        Ok(RawArtwork {
            identifier: identifier.clone(),
            payload,
        })
    }

    fn normalize(&self, raw: &RawArtwork) -> Result<CanonicalArtworkRecord, MappingError> {
        serde_json::from_value(raw.payload.clone()).map_err(|e| MappingError::InvalidField {
            field: "payload",
            message: e.to_string(),
        })
    }

    async fn fetch_image(
        &self,
        identifier: &ArtworkIdentifier,
        _record: &CanonicalArtworkRecord,
    ) -> Result<Vec<u8>, MuseumError> {
        self.before_request().await;

        let mut state = self.state.write().unwrap();
        state.image_requests.push(identifier.clone());

        if let Some(error) = state.image_errors.get(identifier.native_id.as_str()) {
            return Err(error.clone());
        }
        state
            .artworks
            .iter()
            .find(|a| &a.record.identifier == identifier)
            .map(|a| a.image.clone())
            .ok_or_else(|| MuseumError::http_status(404, self.url(identifier)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_mock_paging() {
        let client = MockMuseumClient::new(MuseumTag::Cma)
            .with_artworks(fixtures::public_domain_artworks(MuseumTag::Cma, &["1", "2", "3"]))
            .with_page_size(2);

        let first = client.list_candidates(None).await.unwrap();
        assert_eq!(first.identifiers.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let second = client.list_candidates(Some("2")).await.unwrap();
        assert_eq!(second.identifiers.len(), 1);
        assert!(second.next_cursor.is_none());

        assert_eq!(client.list_cursors(), vec![None, Some("2".to_string())]);
    }

    #[tokio::test]
    async fn test_mock_scripted_failures_then_success() {
        let client = MockMuseumClient::new(MuseumTag::Aic)
            .with_artworks(fixtures::public_domain_artworks(MuseumTag::Aic, &["7"]))
            .with_transient_failures("7", 1);
        let id = ArtworkIdentifier::new(MuseumTag::Aic, "7");

        assert!(matches!(
            client.fetch_metadata(&id).await,
            Err(MuseumError::Timeout { .. })
        ));
        let raw = client.fetch_metadata(&id).await.unwrap();
        let record = client.normalize(&raw).unwrap();
        assert_eq!(record.identifier, id);
        assert_eq!(client.metadata_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_unknown_artwork_is_404() {
        let client = MockMuseumClient::new(MuseumTag::Met);
        let result = client
            .fetch_metadata(&ArtworkIdentifier::new(MuseumTag::Met, "404"))
            .await;
        assert!(matches!(
            result,
            Err(MuseumError::HttpStatus { status: 404, .. })
        ));
    }
}

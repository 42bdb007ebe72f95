//! Cleveland Museum of Art open access API client.
//!
//! Listing uses `skip`/`limit` paging restricted to CC0 works with images.
//! An artwork is public domain iff its `share_license_status` is `CC0`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::http::{unwrap_data, MuseumHttp};
use super::normalize::{checked_id, text, text_or};
use super::{
    numeric_cursor, CandidatePage, MappingError, MuseumClient, MuseumError, RawArtwork,
};
use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord, MuseumTag};
use crate::config::MuseumConfig;
use crate::rate_limiter::RateLimiterPool;

/// Cleveland Museum of Art client.
pub struct CmaClient {
    http: MuseumHttp,
    base_url: String,
    page_size: u32,
}

impl CmaClient {
    pub fn new(config: &MuseumConfig, limiter: Arc<RateLimiterPool>) -> Result<Self, MuseumError> {
        Ok(Self {
            http: MuseumHttp::new(MuseumTag::Cma, config, limiter, &[])?,
            base_url: config.base_url(MuseumTag::Cma),
            page_size: config.page_size,
        })
    }
}

/// Parse one `/artworks/` listing page fetched with `skip`.
pub(crate) fn parse_listing(payload: &Value, skip: u64) -> Result<CandidatePage, MuseumError> {
    let data = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| MuseumError::Parse("artworks listing without data array".to_string()))?;

    let identifiers: Vec<ArtworkIdentifier> = data
        .iter()
        .filter_map(|item| text(item, "/id"))
        .map(|id| ArtworkIdentifier::new(MuseumTag::Cma, id))
        .collect();

    let total = payload
        .pointer("/info/total")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let next = skip + data.len() as u64;
    let next_cursor = (!data.is_empty() && next < total).then(|| next.to_string());

    Ok(CandidatePage {
        identifiers,
        next_cursor,
    })
}

pub(crate) fn normalize(raw: &RawArtwork) -> Result<CanonicalArtworkRecord, MappingError> {
    let data = &raw.payload;
    let id = checked_id(raw, "id")?;
    let creator = data.pointer("/creators/0").unwrap_or(&Value::Null);
    let is_public_domain = data
        .get("share_license_status")
        .and_then(Value::as_str)
        .is_some_and(|status| status == "CC0");

    let mut record = CanonicalArtworkRecord::new(
        ArtworkIdentifier::new(MuseumTag::Cma, id),
        text_or(data, "/title", "Untitled"),
        text_or(creator, "/description", "Unknown"),
        is_public_domain,
    )
    .with_image_reference(text(data, "/images/web/url"))
    .with_date(text(data, "/creation_date"));

    record.accession_number = text(data, "/accession_number");
    record.artist_display = text(creator, "/description");
    record.department = text(data, "/department");
    record.medium = text(data, "/technique");
    record.artwork_type = text(data, "/type");
    record.dimensions = text(data, "/measurements");
    record.credit_line = text(data, "/creditline");
    Ok(record)
}

#[async_trait]
impl MuseumClient for CmaClient {
    fn tag(&self) -> MuseumTag {
        MuseumTag::Cma
    }

    async fn list_candidates(&self, cursor: Option<&str>) -> Result<CandidatePage, MuseumError> {
        let skip = numeric_cursor(cursor, 0)?;
        let url = format!("{}/artworks/", self.base_url);
        let payload = self
            .http
            .get_json(
                &url,
                &[
                    ("skip", skip.to_string()),
                    ("limit", self.page_size.to_string()),
                    ("fields", "id".to_string()),
                    ("cc0", "1".to_string()),
                    ("has_image", "1".to_string()),
                ],
                "list",
            )
            .await?;

        let listing = parse_listing(&payload, skip)?;
        debug!(
            skip,
            found = listing.identifiers.len(),
            next = ?listing.next_cursor,
            "CMA listing page"
        );
        Ok(listing)
    }

    async fn fetch_metadata(
        &self,
        identifier: &ArtworkIdentifier,
    ) -> Result<RawArtwork, MuseumError> {
        let url = format!("{}/artworks/{}", self.base_url, identifier.native_id);
        let payload = self.http.get_json(&url, &[], "metadata").await?;
        Ok(RawArtwork {
            identifier: identifier.clone(),
            payload: unwrap_data(payload, &url)?,
        })
    }

    fn normalize(&self, raw: &RawArtwork) -> Result<CanonicalArtworkRecord, MappingError> {
        normalize(raw)
    }

    async fn fetch_image(
        &self,
        identifier: &ArtworkIdentifier,
        record: &CanonicalArtworkRecord,
    ) -> Result<Vec<u8>, MuseumError> {
        let url = record
            .image_reference
            .as_deref()
            .ok_or_else(|| MuseumError::NoImage(identifier.to_string()))?;
        self.http.get_image(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_listing_pages_by_skip() {
        let payload = json!({
            "info": {"total": 5},
            "data": [{"id": 94979}, {"id": 135382}]
        });
        let page = parse_listing(&payload, 0).unwrap();
        assert_eq!(page.identifiers.len(), 2);
        assert_eq!(page.identifiers[0].native_id, "94979");
        assert_eq!(page.next_cursor.as_deref(), Some("2"));

        let last = parse_listing(&json!({"info": {"total": 5}, "data": [{"id": 1}]}), 4).unwrap();
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn test_parse_listing_empty_page_ends() {
        let page = parse_listing(&json!({"info": {"total": 500}, "data": []}), 100).unwrap();
        assert!(page.identifiers.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_normalize_maps_fields() {
        let raw = RawArtwork {
            identifier: ArtworkIdentifier::new(MuseumTag::Cma, "135382"),
            payload: json!({
                "id": 135382,
                "accession_number": "1958.31",
                "share_license_status": "CC0",
                "title": "Water Lilies (Agapanthus)",
                "creation_date": "c. 1915–26",
                "creators": [
                    {"description": "Claude Monet (French, 1840–1926)", "role": "artist"}
                ],
                "department": "Modern European Painting and Sculpture",
                "technique": "oil on canvas",
                "type": "Painting",
                "measurements": "Framed: 229.9 x 458.5 cm",
                "creditline": "John L. Severance Fund",
                "images": {"web": {"url": "https://openaccess-cdn.clevelandart.org/1960.81/1960.81_web.jpg"}}
            }),
        };
        let record = normalize(&raw).unwrap();
        assert!(record.is_public_domain);
        assert_eq!(record.artist, "Claude Monet (French, 1840–1926)");
        assert_eq!(record.medium.as_deref(), Some("oil on canvas"));
        assert_eq!(record.date.as_deref(), Some("c. 1915–26"));
        assert!(record.image_reference.unwrap().ends_with("_web.jpg"));
    }

    #[test]
    fn test_normalize_copyrighted_without_creators() {
        let raw = RawArtwork {
            identifier: ArtworkIdentifier::new(MuseumTag::Cma, "7"),
            payload: json!({
                "id": 7,
                "share_license_status": "Copyrighted",
                "creators": [],
                "images": null
            }),
        };
        let record = normalize(&raw).unwrap();
        assert!(!record.is_public_domain);
        assert_eq!(record.artist, "Unknown");
        assert!(record.image_reference.is_none());
    }
}

//! Art Institute of Chicago API client.
//!
//! Listing pages through `/artworks`; images are served by the IIIF image
//! server. AIC asks clients to identify themselves with an `AIC-User-Agent`
//! header carrying a contact address.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::http::{unwrap_data, MuseumHttp};
use super::normalize::{checked_id, flag, text, text_or};
use super::{
    numeric_cursor, CandidatePage, MappingError, MuseumClient, MuseumError, RawArtwork,
};
use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord, MuseumTag};
use crate::config::MuseumConfig;
use crate::rate_limiter::RateLimiterPool;

/// Width requested from the IIIF server.
const IIIF_SIZE: &str = "843,";

/// Art Institute of Chicago client.
pub struct AicClient {
    http: MuseumHttp,
    base_url: String,
    iiif_base_url: String,
    page_size: u32,
}

impl AicClient {
    pub fn new(config: &MuseumConfig, limiter: Arc<RateLimiterPool>) -> Result<Self, MuseumError> {
        let http = MuseumHttp::new(
            MuseumTag::Aic,
            config,
            limiter,
            &[("aic-user-agent", config.user_agent())],
        )?;
        Ok(Self {
            http,
            base_url: config.base_url(MuseumTag::Aic),
            iiif_base_url: config.iiif_base_url(),
            page_size: config.page_size,
        })
    }

    /// Full IIIF URL for an image id.
    pub fn image_url(&self, image_id: &str) -> String {
        format!(
            "{}/{}/full/{}/0/default.jpg",
            self.iiif_base_url, image_id, IIIF_SIZE
        )
    }
}

/// Parse one `/artworks` listing page requested as `page`.
///
/// Only public-domain artworks are returned; the rest are never queued.
pub(crate) fn parse_listing(payload: &Value, page: u64) -> Result<CandidatePage, MuseumError> {
    let data = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| MuseumError::Parse("artworks listing without data array".to_string()))?;

    let identifiers: Vec<ArtworkIdentifier> = data
        .iter()
        .filter(|item| {
            item.get("is_public_domain")
                .and_then(Value::as_bool)
                .unwrap_or(true)
        })
        .filter_map(|item| text(item, "/id"))
        .map(|id| ArtworkIdentifier::new(MuseumTag::Aic, id))
        .collect();

    let total_pages = payload
        .pointer("/pagination/total_pages")
        .and_then(Value::as_u64)
        .unwrap_or(page);
    let next_cursor = (!data.is_empty() && page < total_pages).then(|| (page + 1).to_string());

    Ok(CandidatePage {
        identifiers,
        next_cursor,
    })
}

pub(crate) fn normalize(raw: &RawArtwork) -> Result<CanonicalArtworkRecord, MappingError> {
    let data = &raw.payload;
    let id = checked_id(raw, "id")?;

    let mut record = CanonicalArtworkRecord::new(
        ArtworkIdentifier::new(MuseumTag::Aic, id),
        text_or(data, "/title", "Untitled"),
        text_or(data, "/artist_title", "Unknown Artist"),
        flag(data, "/is_public_domain"),
    )
    .with_image_reference(text(data, "/image_id"))
    .with_date(text(data, "/date_display"));

    record.accession_number = text(data, "/main_reference_number");
    record.artist_display = text(data, "/artist_display");
    record.department = text(data, "/department_title");
    record.medium = text(data, "/medium_display");
    record.artwork_type = text(data, "/artwork_type_title");
    record.dimensions = text(data, "/dimensions");
    record.credit_line = text(data, "/credit_line");
    Ok(record)
}

#[async_trait]
impl MuseumClient for AicClient {
    fn tag(&self) -> MuseumTag {
        MuseumTag::Aic
    }

    async fn list_candidates(&self, cursor: Option<&str>) -> Result<CandidatePage, MuseumError> {
        let page = numeric_cursor(cursor, 1)?;
        let url = format!("{}/artworks", self.base_url);
        let payload = self
            .http
            .get_json(
                &url,
                &[
                    ("page", page.to_string()),
                    ("limit", self.page_size.to_string()),
                    ("fields", "id,is_public_domain".to_string()),
                ],
                "list",
            )
            .await?;

        let listing = parse_listing(&payload, page)?;
        debug!(
            page,
            found = listing.identifiers.len(),
            next = ?listing.next_cursor,
            "AIC listing page"
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
        let image_id = record
            .image_reference
            .as_deref()
            .ok_or_else(|| MuseumError::NoImage(identifier.to_string()))?;
        self.http.get_image(&self.image_url(image_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(payload: Value) -> RawArtwork {
        RawArtwork {
            identifier: ArtworkIdentifier::new(MuseumTag::Aic, "27992"),
            payload,
        }
    }

    #[test]
    fn test_parse_listing_filters_non_public_domain() {
        let payload = json!({
            "pagination": {"total": 5, "total_pages": 3, "current_page": 1},
            "data": [
                {"id": 1, "is_public_domain": true},
                {"id": 2, "is_public_domain": false},
                {"id": 3, "is_public_domain": true}
            ]
        });
        let page = parse_listing(&payload, 1).unwrap();
        assert_eq!(
            page.identifiers,
            vec![
                ArtworkIdentifier::new(MuseumTag::Aic, "1"),
                ArtworkIdentifier::new(MuseumTag::Aic, "3"),
            ]
        );
        assert_eq!(page.next_cursor.as_deref(), Some("2"));
    }

    #[test]
    fn test_parse_listing_last_page() {
        let payload = json!({
            "pagination": {"total_pages": 3},
            "data": [{"id": 9, "is_public_domain": true}]
        });
        assert!(parse_listing(&payload, 3).unwrap().next_cursor.is_none());

        let empty = json!({"pagination": {"total_pages": 10}, "data": []});
        assert!(parse_listing(&empty, 4).unwrap().next_cursor.is_none());
    }

    #[test]
    fn test_parse_listing_without_data_is_parse_error() {
        assert!(matches!(
            parse_listing(&json!({"detail": "oops"}), 1),
            Err(MuseumError::Parse(_))
        ));
    }

    #[test]
    fn test_normalize_maps_fields() {
        let record = normalize(&raw(json!({
            "id": 27992,
            "title": "A Sunday on La Grande Jatte — 1884",
            "artist_title": "Georges Seurat",
            "artist_display": "Georges Seurat\nFrench, 1859-1891",
            "date_display": "1884-86",
            "is_public_domain": true,
            "image_id": "2d484387-2509-5e8e-2c43-22f9981972eb",
            "main_reference_number": "1926.224",
            "department_title": "Painting and Sculpture of Europe",
            "medium_display": "Oil on canvas",
            "artwork_type_title": "Painting",
            "dimensions": "207.5 × 308.1 cm",
            "credit_line": "Helen Birch Bartlett Memorial Collection"
        })))
        .unwrap();

        assert_eq!(record.identifier.native_id, "27992");
        assert_eq!(record.artist, "Georges Seurat");
        assert!(record.is_public_domain);
        assert_eq!(
            record.image_reference.as_deref(),
            Some("2d484387-2509-5e8e-2c43-22f9981972eb")
        );
        assert_eq!(record.date.as_deref(), Some("1884-86"));
        assert_eq!(record.accession_number.as_deref(), Some("1926.224"));
        assert_eq!(record.medium.as_deref(), Some("Oil on canvas"));
        assert!(record.display_filename.starts_with("AIC_27992_"));
    }

    #[test]
    fn test_normalize_defaults() {
        let record = normalize(&raw(json!({"id": 27992, "image_id": null}))).unwrap();
        assert_eq!(record.title, "Untitled");
        assert_eq!(record.artist, "Unknown Artist");
        assert!(!record.is_public_domain);
        assert!(record.image_reference.is_none());
    }

    #[test]
    fn test_normalize_requires_id() {
        assert_eq!(
            normalize(&raw(json!({"title": "x"}))),
            Err(MappingError::MissingField("id"))
        );
    }

    #[test]
    fn test_image_url() {
        let client = AicClient::new(
            &MuseumConfig::default(),
            Arc::new(RateLimiterPool::empty()),
        )
        .unwrap();
        assert_eq!(
            client.image_url("abc"),
            "https://www.artic.edu/iiif/2/abc/full/843,/0/default.jpg"
        );
    }
}

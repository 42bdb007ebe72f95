//! Metropolitan Museum of Art collection API client.
//!
//! The MET exposes its full object id list in a single `/objects` response.
//! It is fetched once per client and paged locally by offset.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::http::MuseumHttp;
use super::normalize::{checked_id, flag, text, text_or};
use super::{
    numeric_cursor, CandidatePage, MappingError, MuseumClient, MuseumError, RawArtwork,
};
use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord, MuseumTag};
use crate::config::MuseumConfig;
use crate::rate_limiter::RateLimiterPool;

/// Metropolitan Museum of Art client.
pub struct MetClient {
    http: MuseumHttp,
    base_url: String,
    page_size: u32,
    object_ids: OnceCell<Vec<String>>,
}

impl MetClient {
    pub fn new(config: &MuseumConfig, limiter: Arc<RateLimiterPool>) -> Result<Self, MuseumError> {
        Ok(Self {
            http: MuseumHttp::new(MuseumTag::Met, config, limiter, &[])?,
            base_url: config.base_url(MuseumTag::Met),
            page_size: config.page_size,
            object_ids: OnceCell::new(),
        })
    }

    async fn object_ids(&self) -> Result<&Vec<String>, MuseumError> {
        self.object_ids
            .get_or_try_init(|| async {
                let url = format!("{}/objects", self.base_url);
                let payload = self.http.get_json(&url, &[], "list").await?;
                let ids = parse_object_ids(&payload)?;
                info!(count = ids.len(), "fetched MET object id list");
                Ok::<_, MuseumError>(ids)
            })
            .await
    }
}

pub(crate) fn parse_object_ids(payload: &Value) -> Result<Vec<String>, MuseumError> {
    let ids = payload
        .get("objectIDs")
        .and_then(Value::as_array)
        .ok_or_else(|| MuseumError::Parse("objects listing without objectIDs".to_string()))?;
    Ok(ids
        .iter()
        .filter_map(|id| match id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect())
}

/// Slice `ids` into the page starting at `offset`.
pub(crate) fn page_from_ids(ids: &[String], offset: usize, page_size: usize) -> CandidatePage {
    let start = offset.min(ids.len());
    let end = start.saturating_add(page_size).min(ids.len());
    let identifiers = ids[start..end]
        .iter()
        .map(|id| ArtworkIdentifier::new(MuseumTag::Met, id.clone()))
        .collect();
    CandidatePage {
        identifiers,
        next_cursor: (end < ids.len()).then(|| end.to_string()),
    }
}

pub(crate) fn normalize(raw: &RawArtwork) -> Result<CanonicalArtworkRecord, MappingError> {
    let data = &raw.payload;
    let id = checked_id(raw, "objectID")?;

    let artist = text(data, "/artistDisplayName");
    let artist_display = artist.as_ref().map(|name| match text(data, "/artistDisplayBio") {
        Some(bio) => format!("{}\n{}", name, bio),
        None => name.clone(),
    });

    let mut record = CanonicalArtworkRecord::new(
        ArtworkIdentifier::new(MuseumTag::Met, id),
        text_or(data, "/title", "Untitled"),
        artist.unwrap_or_else(|| "Unknown".to_string()),
        flag(data, "/isPublicDomain"),
    )
    .with_image_reference(text(data, "/primaryImage"))
    .with_date(text(data, "/objectDate"));

    record.accession_number = text(data, "/accessionNumber");
    record.artist_display = artist_display;
    record.department = text(data, "/department");
    record.medium = text(data, "/medium");
    record.artwork_type = text(data, "/objectName");
    record.dimensions = text(data, "/dimensions");
    record.credit_line = text(data, "/creditLine");
    Ok(record)
}

#[async_trait]
impl MuseumClient for MetClient {
    fn tag(&self) -> MuseumTag {
        MuseumTag::Met
    }

    async fn list_candidates(&self, cursor: Option<&str>) -> Result<CandidatePage, MuseumError> {
        let offset = numeric_cursor(cursor, 0)? as usize;
        let ids = self.object_ids().await?;
        let page = page_from_ids(ids, offset, self.page_size as usize);
        debug!(
            offset,
            found = page.identifiers.len(),
            total = ids.len(),
            "MET listing page"
        );
        Ok(page)
    }

    async fn fetch_metadata(
        &self,
        identifier: &ArtworkIdentifier,
    ) -> Result<RawArtwork, MuseumError> {
        let url = format!("{}/objects/{}", self.base_url, identifier.native_id);
        let payload = self.http.get_json(&url, &[], "metadata").await?;
        if !payload.is_object() {
            return Err(MuseumError::Parse(format!("{}: expected a JSON object", url)));
        }
        Ok(RawArtwork {
            identifier: identifier.clone(),
            payload,
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

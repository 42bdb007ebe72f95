//! Museum API clients.
//!
//! Each museum implements [`MuseumClient`]: a restartable candidate listing,
//! raw metadata fetch, mapping into the canonical record, and image fetch.
//! Clients are looked up by tag through a [`MuseumRegistry`].

mod aic;
mod cma;
mod error;
mod http;
mod met;
mod normalize;
mod registry;

pub use aic::AicClient;
pub use cma::CmaClient;
pub use error::{MappingError, MuseumError};
pub use http::{parse_retry_after, MuseumHttp};
pub use met::MetClient;
pub use registry::MuseumRegistry;

use async_trait::async_trait;
use serde_json::Value;

use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord, MuseumTag};

/// One page of a museum's candidate listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePage {
    pub identifiers: Vec<ArtworkIdentifier>,
    /// Cursor for the following page; `None` when the listing is exhausted.
    pub next_cursor: Option<String>,
}

/// Unmapped metadata exactly as the museum returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArtwork {
    pub identifier: ArtworkIdentifier,
    pub payload: Value,
}

/// Capability set every museum integration provides.
#[async_trait]
pub trait MuseumClient: Send + Sync {
    fn tag(&self) -> MuseumTag;

    /// Fetch the page of candidates at `cursor` (`None` for the first page).
    async fn list_candidates(&self, cursor: Option<&str>) -> Result<CandidatePage, MuseumError>;

    async fn fetch_metadata(&self, identifier: &ArtworkIdentifier)
        -> Result<RawArtwork, MuseumError>;

    /// Map a raw payload into the canonical record.
    fn normalize(&self, raw: &RawArtwork) -> Result<CanonicalArtworkRecord, MappingError>;

    async fn fetch_image(
        &self,
        identifier: &ArtworkIdentifier,
        record: &CanonicalArtworkRecord,
    ) -> Result<Vec<u8>, MuseumError>;
}

/// Parse a numeric listing cursor (page number or offset).
fn numeric_cursor(cursor: Option<&str>, default: u64) -> Result<u64, MuseumError> {
    match cursor {
        None => Ok(default),
        Some(c) => c
            .parse()
            .map_err(|_| MuseumError::Parse(format!("invalid listing cursor '{}'", c))),
    }
}

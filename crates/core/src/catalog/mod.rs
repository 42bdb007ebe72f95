//! Artwork catalog - the persistent store of normalized artwork metadata.
//!
//! Records are keyed by identifier and written with upsert semantics, so
//! re-downloading an artwork overwrites its previous entry.

mod sqlite;
mod types;

pub use sqlite::SqliteArtworkCatalog;
pub use types::*;

use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord};

/// Trait for artwork metadata storage.
pub trait ArtworkCatalog: Send + Sync {
    /// Insert or overwrite the record for its identifier.
    ///
    /// Returns `true` if the artwork was not stored before.
    fn upsert(
        &self,
        record: &CanonicalArtworkRecord,
        image_path: Option<&str>,
    ) -> Result<bool, CatalogError>;

    /// Get a stored artwork.
    fn get(&self, identifier: &ArtworkIdentifier) -> Result<CatalogEntry, CatalogError>;

    /// Remove an artwork from the catalog.
    fn remove(&self, identifier: &ArtworkIdentifier) -> Result<(), CatalogError>;

    /// Get catalog statistics.
    fn stats(&self) -> Result<CatalogStats, CatalogError>;
}

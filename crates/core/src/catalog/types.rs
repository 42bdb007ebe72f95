//! Types for the artwork catalog (persisted canonical metadata).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artwork::CanonicalArtworkRecord;

/// A stored artwork record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub record: CanonicalArtworkRecord,
    /// Local path of the downloaded image, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// When first stored.
    pub first_stored_at: DateTime<Utc>,
    /// When last overwritten.
    pub updated_at: DateTime<Utc>,
}

/// Catalog statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Total stored artworks.
    pub total_artworks: u64,
    /// Stored artworks per museum code.
    pub by_museum: BTreeMap<String, u64>,
    /// Artworks with a downloaded image.
    pub with_images: u64,
    /// Most recent write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_stats_serialization() {
        let mut by_museum = BTreeMap::new();
        by_museum.insert("aic".to_string(), 2);
        let stats = CatalogStats {
            total_artworks: 2,
            by_museum,
            with_images: 1,
            last_updated: None,
        };

        let json = serde_json::to_string(&stats).unwrap();
        assert!(!json.contains("last_updated")); // None should be skipped
        assert!(json.contains("\"aic\":2"));
    }
}

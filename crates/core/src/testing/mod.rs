//! Testing utilities and mock implementations.
//!
//! This module provides a mock museum client so the orchestrator can be
//! exercised end to end without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use artvault_core::testing::{fixtures, MockMuseumClient};
//!
//! let client = MockMuseumClient::new(MuseumTag::Aic)
//!     .with_artworks(fixtures::public_domain_artworks(MuseumTag::Aic, &["1", "2", "3"]))
//!     .with_transient_failures("3", 2);
//!
//! let mut registry = MuseumRegistry::new();
//! registry.register(Arc::new(client));
//! ```

mod mock_museum_client;

pub use mock_museum_client::{MockArtwork, MockMuseumClient};

/// Test fixtures and helper functions.
pub mod fixtures {
    use super::MockArtwork;
    use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord, MuseumTag};

    /// Create a public-domain artwork with an image and reasonable defaults.
    pub fn artwork(museum: MuseumTag, native_id: &str) -> MockArtwork {
        let record = CanonicalArtworkRecord::new(
            ArtworkIdentifier::new(museum, native_id),
            format!("Study No. {}", native_id),
            "Test Artist",
            true,
        )
        .with_image_reference(Some(format!(
            "https://images.example.org/{}/{}.jpg",
            museum.as_str(),
            native_id
        )))
        .with_date(Some("1890".to_string()));

        MockArtwork {
            record,
            image: format!("\u{FF}jpeg:{}:{}", museum.as_str(), native_id).into_bytes(),
        }
    }

    /// Create one artwork per id.
    pub fn public_domain_artworks(museum: MuseumTag, native_ids: &[&str]) -> Vec<MockArtwork> {
        native_ids.iter().map(|id| artwork(museum, id)).collect()
    }

    /// Identifiers for the given ids.
    pub fn identifiers(museum: MuseumTag, native_ids: &[&str]) -> Vec<ArtworkIdentifier> {
        native_ids
            .iter()
            .map(|id| ArtworkIdentifier::new(museum, *id))
            .collect()
    }

    /// An artwork the museum exposes without a downloadable image.
    pub fn artwork_without_image(museum: MuseumTag, native_id: &str) -> MockArtwork {
        let mut artwork = artwork(museum, native_id);
        artwork.record.image_reference = None;
        artwork
    }
}

//! Identifier and canonical record types shared by every museum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::filename::sanitize_filename;

/// Error returned when parsing a museum tag or identifier fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("unknown museum: {0}")]
    UnknownMuseum(String),

    #[error("malformed identifier '{0}', expected <museum>:<id>")]
    Malformed(String),
}

/// The museums this harvester knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuseumTag {
    /// Art Institute of Chicago.
    Aic,
    /// Metropolitan Museum of Art.
    Met,
    /// Cleveland Museum of Art.
    Cma,
}

impl MuseumTag {
    /// All known museums, in processing order.
    pub const ALL: [MuseumTag; 3] = [MuseumTag::Aic, MuseumTag::Met, MuseumTag::Cma];

    /// Lowercase code used for persistence and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            MuseumTag::Aic => "aic",
            MuseumTag::Met => "met",
            MuseumTag::Cma => "cma",
        }
    }

    /// Human-readable museum name.
    pub fn display_name(&self) -> &'static str {
        match self {
            MuseumTag::Aic => "Art Institute of Chicago",
            MuseumTag::Met => "Metropolitan Museum of Art",
            MuseumTag::Cma => "Cleveland Museum of Art",
        }
    }
}

impl fmt::Display for MuseumTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for MuseumTag {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aic" => Ok(MuseumTag::Aic),
            "met" => Ok(MuseumTag::Met),
            "cma" | "cleveland" => Ok(MuseumTag::Cma),
            _ => Err(IdentifierError::UnknownMuseum(s.to_string())),
        }
    }
}

/// Museum-qualified artwork identifier.
///
/// Two identifiers are equal iff both the museum and the native id match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtworkIdentifier {
    pub museum: MuseumTag,
    pub native_id: String,
}

impl ArtworkIdentifier {
    pub fn new(museum: MuseumTag, native_id: impl Into<String>) -> Self {
        Self {
            museum,
            native_id: native_id.into(),
        }
    }
}

impl fmt::Display for ArtworkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.museum, self.native_id)
    }
}

impl FromStr for ArtworkIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (museum, id) = s
            .split_once(':')
            .ok_or_else(|| IdentifierError::Malformed(s.to_string()))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(IdentifierError::Malformed(s.to_string()));
        }
        Ok(Self::new(museum.parse()?, id))
    }
}

/// Normalized artwork metadata, independent of the source museum's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalArtworkRecord {
    pub identifier: ArtworkIdentifier,
    pub title: String,
    pub artist: String,
    /// Human-readable creation date ("c. 1884", "1889").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub is_public_domain: bool,
    /// Museum-specific image URL or image id. `None` when the museum
    /// exposes no downloadable image for this object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,
    /// Sanitized filename derived from identifier, title and artist.
    pub display_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accession_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_line: Option<String>,
}

impl CanonicalArtworkRecord {
    /// Create a record with the required fields; the display filename is
    /// derived here so every producer names files the same way.
    pub fn new(
        identifier: ArtworkIdentifier,
        title: impl Into<String>,
        artist: impl Into<String>,
        is_public_domain: bool,
    ) -> Self {
        let title = title.into();
        let artist = artist.into();
        let display_filename = Self::filename_for(&identifier, &title, &artist);
        Self {
            identifier,
            title,
            artist,
            date: None,
            is_public_domain,
            image_reference: None,
            display_filename,
            accession_number: None,
            artist_display: None,
            department: None,
            medium: None,
            artwork_type: None,
            dimensions: None,
            credit_line: None,
        }
    }

    /// Deterministic filename for an identifier/title/artist triple.
    pub fn filename_for(identifier: &ArtworkIdentifier, title: &str, artist: &str) -> String {
        let prefix = format!("{}_{}", identifier.museum, identifier.native_id);
        sanitize_filename(&prefix, title, artist)
    }

    pub fn with_image_reference(mut self, reference: Option<String>) -> Self {
        self.image_reference = reference.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_date(mut self, date: Option<String>) -> Self {
        self.date = date;
        self
    }
}

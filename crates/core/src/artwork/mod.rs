//! Museum-independent artwork types.

mod filename;
mod types;

pub use filename::{sanitize_filename, MAX_FILENAME_LEN};
pub use types::{ArtworkIdentifier, CanonicalArtworkRecord, IdentifierError, MuseumTag};

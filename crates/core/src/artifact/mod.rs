//! Image store for downloaded artwork files.
//!
//! Images land at `{images_dir}/{museum}/{display_filename}`. Writes go to a
//! temporary file in the destination directory and are renamed into place,
//! so a crash never leaves a truncated image under the final name.

mod error;
mod fs_store;

pub use error::ImageStoreError;
pub use fs_store::FsImageStore;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::artwork::CanonicalArtworkRecord;

/// Trait for persisting image bytes.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Final location for a record's image.
    fn path_for(&self, record: &CanonicalArtworkRecord) -> PathBuf;

    /// Write the image atomically, replacing any previous file, and return
    /// its path.
    async fn write(
        &self,
        record: &CanonicalArtworkRecord,
        bytes: &[u8],
    ) -> Result<PathBuf, ImageStoreError>;

    /// Remove a stored image. Returns `false` if it did not exist.
    async fn remove(&self, path: &Path) -> Result<bool, ImageStoreError>;
}

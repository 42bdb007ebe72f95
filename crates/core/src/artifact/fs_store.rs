//! File system image store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::ImageStoreError;
use super::ImageStore;
use crate::artwork::{CanonicalArtworkRecord, MAX_FILENAME_LEN};

/// Stores images below a root directory, one subdirectory per museum.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_filename(record: &CanonicalArtworkRecord) -> Result<(), ImageStoreError> {
        let name = record.display_filename.as_str();
        let valid = !name.is_empty()
            && name.len() <= MAX_FILENAME_LEN
            && name != "."
            && name != ".."
            && !name.chars().any(|c| c.is_control() || c == '/' || c == '\\');
        if valid {
            Ok(())
        } else {
            Err(ImageStoreError::InvalidFilename {
                identifier: record.identifier.to_string(),
                name: name.to_string(),
            })
        }
    }

    async fn write_temp(path: &Path, bytes: &[u8]) -> Result<(), ImageStoreError> {
        let mut file = File::create(path)
            .await
            .map_err(|e| ImageStoreError::write_failed(path.to_path_buf(), e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| ImageStoreError::write_failed(path.to_path_buf(), e))?;
        file.sync_all()
            .await
            .map_err(|e| ImageStoreError::write_failed(path.to_path_buf(), e))?;
        Ok(())
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    fn path_for(&self, record: &CanonicalArtworkRecord) -> PathBuf {
        self.root
            .join(record.identifier.museum.as_str())
            .join(&record.display_filename)
    }

    async fn write(
        &self,
        record: &CanonicalArtworkRecord,
        bytes: &[u8],
    ) -> Result<PathBuf, ImageStoreError> {
        if bytes.is_empty() {
            return Err(ImageStoreError::EmptyImage {
                identifier: record.identifier.to_string(),
            });
        }
        Self::check_filename(record)?;

        let destination = self.path_for(record);
        let dir = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ImageStoreError::DirectoryCreationFailed {
                path: dir.clone(),
                source: e,
            })?;

        // Same directory as the destination so the rename stays on one filesystem.
        // Display filenames may already use the full name length.
        let temp = dir.join(format!(".{}.part", Uuid::new_v4()));

        if let Err(e) = Self::write_temp(&temp, bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp, &destination).await {
            if let Err(cleanup) = fs::remove_file(&temp).await {
                warn!(path = %temp.display(), error = %cleanup, "failed to remove temp image");
            }
            return Err(ImageStoreError::move_failed(temp, destination, e));
        }

        debug!(
            identifier = %record.identifier,
            path = %destination.display(),
            bytes = bytes.len(),
            "stored image"
        );
        Ok(destination)
    }

    async fn remove(&self, path: &Path) -> Result<bool, ImageStoreError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ImageStoreError::Io(e)),
        }
    }
}

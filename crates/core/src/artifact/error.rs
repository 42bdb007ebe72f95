//! Error types for the image store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing or removing images.
#[derive(Debug, Error)]
pub enum ImageStoreError {
    /// Refused to write an empty image.
    #[error("Empty image for {identifier}")]
    EmptyImage { identifier: String },

    /// The record's filename cannot name a file in the museum directory.
    #[error("Invalid image filename {name:?} for {identifier}")]
    InvalidFilename { identifier: String, name: String },

    /// Failed to create the destination directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the temporary file.
    #[error("Failed to write {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to move the temporary file into place.
    #[error("Failed to move file from {temp} to {destination}")]
    MoveFailed {
        temp: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageStoreError {
    /// Caused by the record or its bytes rather than by the store itself.
    ///
    /// Such failures end the item, not the run.
    pub fn is_item_error(&self) -> bool {
        match self {
            Self::EmptyImage { .. } | Self::InvalidFilename { .. } => true,
            Self::WriteFailed { source: e, .. } | Self::MoveFailed { error: e, .. } => {
                e.kind() == std::io::ErrorKind::InvalidInput
            }
            Self::DirectoryCreationFailed { .. } | Self::Io(_) => false,
        }
    }

    /// Short reason recorded when the item is given up on.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyImage { .. } => "empty image",
            Self::InvalidFilename { .. } => "invalid filename",
            _ => "image write failed",
        }
    }

    pub fn write_failed(path: PathBuf, source: std::io::Error) -> Self {
        Self::WriteFailed { path, source }
    }

    pub fn move_failed(temp: PathBuf, destination: PathBuf, error: std::io::Error) -> Self {
        Self::MoveFailed {
            temp,
            destination,
            error,
        }
    }
}

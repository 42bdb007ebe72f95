//! Types for the download orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artwork::{ArtworkIdentifier, MuseumTag};
use crate::progress::StatusSummary;
use crate::retry::ErrorKind;

/// Errors that end a run. Item failures never surface here.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Progress store error.
    #[error("progress store error: {0}")]
    Store(#[from] crate::progress::ProgressError),

    /// Catalog error.
    #[error("catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),

    /// Image store error.
    #[error("image store error: {0}")]
    Artifact(#[from] crate::artifact::ImageStoreError),

    /// No client registered for the museum.
    #[error("no client registered for museum {0}")]
    UnknownMuseum(MuseumTag),
}

/// Per-run knobs.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Restart the candidate listing from the first page.
    pub rediscover: bool,
    /// Process only items already known to the store.
    pub skip_discovery: bool,
    /// Identifiers to enqueue before processing.
    pub identifiers: Vec<ArtworkIdentifier>,
    /// Stop claiming once this many items completed in the run.
    pub max_items: Option<usize>,
    /// Image bytes the run may write. An item whose image would overflow the
    /// budget is left pending and the run ends.
    pub max_bytes: Option<u64>,
}

/// An item that reached `failed` during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItemReport {
    pub identifier: ArtworkIdentifier,
    pub kind: ErrorKind,
    /// Abort reason, e.g. "unrecoverable: not found".
    pub reason: String,
    /// Last error message from the museum client.
    pub message: String,
}

/// Result of one museum run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub museum: MuseumTag,
    pub run_id: String,
    /// Store counts when the run ended.
    pub counts: StatusSummary,
    pub completed_this_run: usize,
    pub failed_this_run: usize,
    pub retried_this_run: usize,
    pub discovered_this_run: usize,
    pub bytes_written_this_run: u64,
    pub failures: Vec<FailedItemReport>,
    /// The run ended because a stop was requested.
    pub stopped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_serialization() {
        let summary = RunSummary {
            museum: MuseumTag::Aic,
            run_id: "run-1".to_string(),
            counts: StatusSummary {
                complete: 2,
                failed: 1,
                ..Default::default()
            },
            completed_this_run: 2,
            failed_this_run: 1,
            retried_this_run: 0,
            discovered_this_run: 3,
            bytes_written_this_run: 2048,
            failures: vec![FailedItemReport {
                identifier: ArtworkIdentifier::new(MuseumTag::Aic, "2"),
                kind: ErrorKind::HttpClientError,
                reason: "unrecoverable: not found".to_string(),
                message: "HTTP 404".to_string(),
            }],
            stopped: false,
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"museum\":\"aic\""));
        assert!(json.contains("\"kind\":\"http_client_error\""));
        assert!(json.contains("\"bytes_written_this_run\":2048"));
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::UnknownMuseum(MuseumTag::Met);
        assert_eq!(err.to_string(), "no client registered for museum MET");
    }
}

//! Progress storage trait.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{DiscoveryState, DownloadItem, ItemStatus, StatusSummary};
use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord, MuseumTag};
use crate::retry::{ErrorKind, RetryDecision};

/// Error type for progress store operations.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("download item not found: {0}")]
    NotFound(String),

    #[error("cannot {operation} {identifier}: item is {current}")]
    InvalidTransition {
        identifier: String,
        current: ItemStatus,
        operation: &'static str,
    },

    #[error("database error: {0}")]
    Database(String),
}

/// Durable bookkeeping of per-item download state.
///
/// Every mutating operation is atomic with respect to its own item; claims
/// are atomic across concurrent callers.
pub trait ProgressStore: Send + Sync {
    /// Register an identifier as pending if it is not already known.
    /// Returns `true` when a new item was created.
    fn upsert_pending(&self, identifier: &ArtworkIdentifier) -> Result<bool, ProgressError>;

    /// Register many identifiers in one transaction. Returns how many were new.
    fn upsert_pending_batch(&self, identifiers: &[ArtworkIdentifier])
        -> Result<usize, ProgressError>;

    /// Move up to `limit` due pending items to `in_progress` and return them.
    fn claim_next_batch(
        &self,
        museum: MuseumTag,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<DownloadItem>, ProgressError>;

    /// Mark a claimed item complete.
    fn record_success(
        &self,
        identifier: &ArtworkIdentifier,
        artifact_path: &str,
        record: &CanonicalArtworkRecord,
    ) -> Result<(), ProgressError>;

    /// Record a failed attempt on a claimed item and apply `decision`.
    /// Returns the item's new status.
    fn record_failure(
        &self,
        identifier: &ArtworkIdentifier,
        kind: ErrorKind,
        message: &str,
        decision: &RetryDecision,
    ) -> Result<ItemStatus, ProgressError>;

    /// Counts by status.
    fn summary(&self, museum: MuseumTag) -> Result<StatusSummary, ProgressError>;

    /// Requeue items left `in_progress` by an interrupted run.
    fn recover_in_progress(&self, museum: MuseumTag) -> Result<usize, ProgressError>;

    /// Return every `failed` item to `pending` with a fresh retry budget.
    fn reset_failed(&self, museum: MuseumTag) -> Result<usize, ProgressError>;

    /// Return a `complete` item to `pending` so it is downloaded again.
    fn reset_for_refetch(&self, identifier: &ArtworkIdentifier) -> Result<(), ProgressError>;

    /// Delete an item outright. Returns whether it existed.
    fn purge(&self, identifier: &ArtworkIdentifier) -> Result<bool, ProgressError>;

    fn get(&self, identifier: &ArtworkIdentifier) -> Result<Option<DownloadItem>, ProgressError>;

    /// All `failed` items, oldest discovery first.
    fn failed_items(&self, museum: MuseumTag) -> Result<Vec<DownloadItem>, ProgressError>;

    /// When the next pending item becomes claimable, if any are pending.
    fn next_due_at(&self, museum: MuseumTag) -> Result<Option<DateTime<Utc>>, ProgressError>;

    fn discovery_state(&self, museum: MuseumTag) -> Result<DiscoveryState, ProgressError>;

    fn save_discovery_state(
        &self,
        museum: MuseumTag,
        state: &DiscoveryState,
    ) -> Result<(), ProgressError>;
}

//! Download item types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord};
use crate::retry::ErrorKind;

/// Lifecycle state of a download item.
///
/// `pending -> in_progress -> {complete | failed}`. Retryable failures move
/// back to `pending`; `failed` and `complete` only leave through explicit
/// operator resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Complete => "complete",
            ItemStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "in_progress" => Ok(ItemStatus::InProgress),
            "complete" => Ok(ItemStatus::Complete),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(format!("unknown item status: {other}")),
        }
    }
}

/// One unit of work, keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadItem {
    pub identifier: ArtworkIdentifier,
    pub status: ItemStatus,
    /// Failures charged against the retry budget.
    pub attempt_count: u32,
    /// Rate-limit responses, tracked separately from `attempt_count`.
    pub rate_limit_hits: u32,
    pub last_error_kind: Option<ErrorKind>,
    pub last_error: Option<String>,
    /// Why the item was abandoned; set only while `failed`.
    pub failure_reason: Option<String>,
    pub last_attempted_at: Option<DateTime<Utc>>,
    /// Earliest time the item may be claimed again.
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub artifact_path: Option<String>,
    pub record: Option<CanonicalArtworkRecord>,
    pub discovered_at: DateTime<Utc>,
}

/// Item counts by status for one museum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub pending: u64,
    pub in_progress: u64,
    pub complete: u64,
    pub failed: u64,
}

impl StatusSummary {
    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.complete + self.failed
    }

    /// Work that a run could still pick up.
    pub fn remaining(&self) -> u64 {
        self.pending + self.in_progress
    }

    pub(crate) fn add(&mut self, status: ItemStatus, count: u64) {
        match status {
            ItemStatus::Pending => self.pending += count,
            ItemStatus::InProgress => self.in_progress += count,
            ItemStatus::Complete => self.complete += count,
            ItemStatus::Failed => self.failed += count,
        }
    }
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "complete: {}, failed: {}, pending: {}, in_progress: {}",
            self.complete, self.failed, self.pending, self.in_progress
        )
    }
}

/// Resume point of a museum's candidate listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryState {
    /// Opaque cursor for the next page; `None` means start from the top.
    pub cursor: Option<String>,
    /// The listing has been walked to its end.
    pub exhausted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ItemStatus::Pending,
            ItemStatus::InProgress,
            ItemStatus::Complete,
            ItemStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ItemStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_summary_totals() {
        let mut summary = StatusSummary::default();
        summary.add(ItemStatus::Complete, 2);
        summary.add(ItemStatus::Failed, 1);
        summary.add(ItemStatus::Pending, 3);
        assert_eq!(summary.total(), 6);
        assert_eq!(summary.remaining(), 3);
        assert_eq!(
            summary.to_string(),
            "complete: 2, failed: 1, pending: 3, in_progress: 0"
        );
    }
}

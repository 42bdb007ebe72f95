//! SQLite-backed progress store implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::{
    DiscoveryState, DownloadItem, ItemStatus, ProgressError, ProgressStore, StatusSummary,
};
use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord, MuseumTag};
use crate::retry::{ErrorKind, RetryDecision};

const ITEM_COLUMNS: &str = "museum, native_id, status, attempt_count, rate_limit_hits, \
     last_error_kind, last_error, failure_reason, last_attempted_at, next_attempt_at, \
     completed_at, artifact_path, record, discovered_at";

/// SQLite-backed progress store.
pub struct SqliteProgressStore {
    conn: Mutex<Connection>,
}

/// Fixed-width UTC timestamps so that text comparison orders correctly.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn due_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn db_err(e: rusqlite::Error) -> ProgressError {
    ProgressError::Database(e.to_string())
}

fn conversion_err(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

impl SqliteProgressStore {
    /// Create a new SQLite progress store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, ProgressError> {
        let conn = Connection::open(path).map_err(db_err)?;
        // Another process may hold the write lock briefly.
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite progress store (useful for testing).
    pub fn in_memory() -> Result<Self, ProgressError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ProgressError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS download_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                museum TEXT NOT NULL,
                native_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                attempt_count INTEGER NOT NULL DEFAULT 0,
                rate_limit_hits INTEGER NOT NULL DEFAULT 0,
                last_error_kind TEXT,
                last_error TEXT,
                failure_reason TEXT,
                last_attempted_at TEXT,
                next_attempt_at TEXT,
                completed_at TEXT,
                artifact_path TEXT,
                record TEXT,
                discovered_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (museum, native_id)
            );

            CREATE INDEX IF NOT EXISTS idx_download_items_claim
                ON download_items(museum, status, next_attempt_at);

            CREATE TABLE IF NOT EXISTS discovery_state (
                museum TEXT PRIMARY KEY,
                cursor TEXT,
                exhausted INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_err)
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<DownloadItem> {
        let museum: String = row.get("museum")?;
        let museum: MuseumTag = museum
            .parse()
            .map_err(|e: crate::artwork::IdentifierError| conversion_err(0, e.to_string()))?;
        let status: String = row.get("status")?;
        let status: ItemStatus = status.parse().map_err(|e| conversion_err(2, e))?;
        let last_error_kind = row
            .get::<_, Option<String>>("last_error_kind")?
            .map(|k| k.parse::<ErrorKind>())
            .transpose()
            .map_err(|e| conversion_err(5, e))?;
        let record = row
            .get::<_, Option<String>>("record")?
            .map(|json| serde_json::from_str::<CanonicalArtworkRecord>(&json))
            .transpose()
            .map_err(|e| conversion_err(12, e.to_string()))?;
        let discovered_at =
            parse_ts(row.get("discovered_at")?).unwrap_or(DateTime::<Utc>::MIN_UTC);

        Ok(DownloadItem {
            identifier: ArtworkIdentifier::new(museum, row.get::<_, String>("native_id")?),
            status,
            attempt_count: row.get("attempt_count")?,
            rate_limit_hits: row.get("rate_limit_hits")?,
            last_error_kind,
            last_error: row.get("last_error")?,
            failure_reason: row.get("failure_reason")?,
            last_attempted_at: parse_ts(row.get("last_attempted_at")?),
            next_attempt_at: parse_ts(row.get("next_attempt_at")?),
            completed_at: parse_ts(row.get("completed_at")?),
            artifact_path: row.get("artifact_path")?,
            record,
            discovered_at,
        })
    }

    fn current_status(
        conn: &Connection,
        identifier: &ArtworkIdentifier,
    ) -> Result<ItemStatus, ProgressError> {
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM download_items WHERE museum = ?1 AND native_id = ?2",
                params![identifier.museum.as_str(), identifier.native_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        match status {
            Some(s) => s.parse().map_err(ProgressError::Database),
            None => Err(ProgressError::NotFound(identifier.to_string())),
        }
    }

    /// Explain why a conditional update touched no rows.
    fn transition_error(
        conn: &Connection,
        identifier: &ArtworkIdentifier,
        operation: &'static str,
    ) -> ProgressError {
        match Self::current_status(conn, identifier) {
            Ok(current) => ProgressError::InvalidTransition {
                identifier: identifier.to_string(),
                current,
                operation,
            },
            Err(e) => e,
        }
    }
}

impl ProgressStore for SqliteProgressStore {
    fn upsert_pending(&self, identifier: &ArtworkIdentifier) -> Result<bool, ProgressError> {
        let conn = self.conn.lock().unwrap();
        let now = ts(Utc::now());
        let inserted = conn
            .execute(
                "INSERT INTO download_items (museum, native_id, status, discovered_at, updated_at)
                 VALUES (?1, ?2, 'pending', ?3, ?3)
                 ON CONFLICT (museum, native_id) DO NOTHING",
                params![identifier.museum.as_str(), identifier.native_id, now],
            )
            .map_err(db_err)?;
        Ok(inserted == 1)
    }

    fn upsert_pending_batch(
        &self,
        identifiers: &[ArtworkIdentifier],
    ) -> Result<usize, ProgressError> {
        let mut conn = self.conn.lock().unwrap();
        let now = ts(Utc::now());
        let tx = conn.transaction().map_err(db_err)?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO download_items (museum, native_id, status, discovered_at, updated_at)
                     VALUES (?1, ?2, 'pending', ?3, ?3)
                     ON CONFLICT (museum, native_id) DO NOTHING",
                )
                .map_err(db_err)?;
            for identifier in identifiers {
                inserted += stmt
                    .execute(params![identifier.museum.as_str(), identifier.native_id, now])
                    .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(inserted)
    }

    fn claim_next_batch(
        &self,
        museum: MuseumTag,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<DownloadItem>, ProgressError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.lock().unwrap();
        let now_str = ts(now);

        // IMMEDIATE takes the write lock up front, so a concurrent claimer in
        // another connection cannot select the same rows in between.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let candidates: Vec<(i64, DownloadItem)> = {
            let sql = format!(
                "SELECT id, {ITEM_COLUMNS} FROM download_items
                 WHERE museum = ?1 AND status = 'pending'
                   AND (next_attempt_at IS NULL OR next_attempt_at <= ?2)
                 ORDER BY id
                 LIMIT ?3"
            );
            let mut stmt = tx.prepare(&sql).map_err(db_err)?;
            let rows = stmt
                .query_map(
                    params![museum.as_str(), now_str, limit as i64],
                    |row| Ok((row.get::<_, i64>("id")?, Self::row_to_item(row)?)),
                )
                .map_err(db_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_err)?
        };

        let mut claimed = Vec::with_capacity(candidates.len());
        {
            let mut update = tx
                .prepare(
                    "UPDATE download_items
                     SET status = 'in_progress', last_attempted_at = ?1, updated_at = ?1
                     WHERE id = ?2 AND status = 'pending'",
                )
                .map_err(db_err)?;
            for (row_id, mut item) in candidates {
                if update.execute(params![now_str, row_id]).map_err(db_err)? == 1 {
                    item.status = ItemStatus::InProgress;
                    item.last_attempted_at = Some(now);
                    claimed.push(item);
                }
            }
        }
        tx.commit().map_err(db_err)?;

        debug!(museum = %museum, claimed = claimed.len(), limit, "claimed batch");
        Ok(claimed)
    }

    fn record_success(
        &self,
        identifier: &ArtworkIdentifier,
        artifact_path: &str,
        record: &CanonicalArtworkRecord,
    ) -> Result<(), ProgressError> {
        let conn = self.conn.lock().unwrap();
        let now = ts(Utc::now());
        let record_json =
            serde_json::to_string(record).map_err(|e| ProgressError::Database(e.to_string()))?;

        let updated = conn
            .execute(
                "UPDATE download_items
                 SET status = 'complete', artifact_path = ?1, record = ?2, completed_at = ?3,
                     next_attempt_at = NULL, failure_reason = NULL, updated_at = ?3
                 WHERE museum = ?4 AND native_id = ?5 AND status = 'in_progress'",
                params![
                    artifact_path,
                    record_json,
                    now,
                    identifier.museum.as_str(),
                    identifier.native_id
                ],
            )
            .map_err(db_err)?;

        if updated == 0 {
            return Err(Self::transition_error(&conn, identifier, "complete"));
        }
        Ok(())
    }

    fn record_failure(
        &self,
        identifier: &ArtworkIdentifier,
        kind: ErrorKind,
        message: &str,
        decision: &RetryDecision,
    ) -> Result<ItemStatus, ProgressError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let (status, next_attempt_at, failure_reason) = match decision {
            RetryDecision::Abort(reason) => (ItemStatus::Failed, None, Some(reason.to_string())),
            RetryDecision::RetryAfter(delay) => {
                (ItemStatus::Pending, Some(ts(due_after(now, *delay))), None)
            }
            RetryDecision::RetryImmediately => (ItemStatus::Pending, None, None),
        };
        let (charged, rate_limited) = if kind == ErrorKind::RateLimited {
            (0, 1)
        } else {
            (1, 0)
        };

        let updated = conn
            .execute(
                "UPDATE download_items
                 SET status = ?1,
                     attempt_count = attempt_count + ?2,
                     rate_limit_hits = rate_limit_hits + ?3,
                     last_error_kind = ?4, last_error = ?5, failure_reason = ?6,
                     next_attempt_at = ?7, updated_at = ?8
                 WHERE museum = ?9 AND native_id = ?10 AND status = 'in_progress'",
                params![
                    status.as_str(),
                    charged,
                    rate_limited,
                    kind.as_str(),
                    message,
                    failure_reason,
                    next_attempt_at,
                    ts(now),
                    identifier.museum.as_str(),
                    identifier.native_id
                ],
            )
            .map_err(db_err)?;

        if updated == 0 {
            return Err(Self::transition_error(&conn, identifier, "record failure for"));
        }
        Ok(status)
    }

    fn summary(&self, museum: MuseumTag) -> Result<StatusSummary, ProgressError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT status, COUNT(*) FROM download_items WHERE museum = ?1 GROUP BY status",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![museum.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(db_err)?;

        let mut summary = StatusSummary::default();
        for row in rows {
            let (status, count) = row.map_err(db_err)?;
            let status: ItemStatus = status.parse().map_err(ProgressError::Database)?;
            summary.add(status, count.max(0) as u64);
        }
        Ok(summary)
    }

    fn recover_in_progress(&self, museum: MuseumTag) -> Result<usize, ProgressError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE download_items SET status = 'pending', updated_at = ?1
             WHERE museum = ?2 AND status = 'in_progress'",
            params![ts(Utc::now()), museum.as_str()],
        )
        .map_err(db_err)
    }

    fn reset_failed(&self, museum: MuseumTag) -> Result<usize, ProgressError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE download_items
             SET status = 'pending', attempt_count = 0, rate_limit_hits = 0,
                 failure_reason = NULL, next_attempt_at = NULL, updated_at = ?1
             WHERE museum = ?2 AND status = 'failed'",
            params![ts(Utc::now()), museum.as_str()],
        )
        .map_err(db_err)
    }

    fn reset_for_refetch(&self, identifier: &ArtworkIdentifier) -> Result<(), ProgressError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE download_items
                 SET status = 'pending', completed_at = NULL, artifact_path = NULL,
                     attempt_count = 0, rate_limit_hits = 0, next_attempt_at = NULL,
                     updated_at = ?1
                 WHERE museum = ?2 AND native_id = ?3 AND status = 'complete'",
                params![
                    ts(Utc::now()),
                    identifier.museum.as_str(),
                    identifier.native_id
                ],
            )
            .map_err(db_err)?;

        if updated == 0 {
            return Err(Self::transition_error(&conn, identifier, "refetch"));
        }
        Ok(())
    }

    fn purge(&self, identifier: &ArtworkIdentifier) -> Result<bool, ProgressError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                "DELETE FROM download_items WHERE museum = ?1 AND native_id = ?2",
                params![identifier.museum.as_str(), identifier.native_id],
            )
            .map_err(db_err)?;
        Ok(deleted > 0)
    }

    fn get(&self, identifier: &ArtworkIdentifier) -> Result<Option<DownloadItem>, ProgressError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM download_items WHERE museum = ?1 AND native_id = ?2"
        );
        conn.query_row(
            &sql,
            params![identifier.museum.as_str(), identifier.native_id],
            Self::row_to_item,
        )
        .optional()
        .map_err(db_err)
    }

    fn failed_items(&self, museum: MuseumTag) -> Result<Vec<DownloadItem>, ProgressError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM download_items
             WHERE museum = ?1 AND status = 'failed' ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![museum.as_str()], Self::row_to_item)
            .map_err(db_err)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(db_err)?);
        }
        Ok(items)
    }

    fn next_due_at(&self, museum: MuseumTag) -> Result<Option<DateTime<Utc>>, ProgressError> {
        let conn = self.conn.lock().unwrap();
        let (pending, earliest, undelayed): (i64, Option<String>, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), MIN(next_attempt_at),
                        SUM(CASE WHEN next_attempt_at IS NULL THEN 1 ELSE 0 END)
                 FROM download_items WHERE museum = ?1 AND status = 'pending'",
                params![museum.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(db_err)?;

        if pending == 0 {
            return Ok(None);
        }
        if undelayed.unwrap_or(0) > 0 {
            return Ok(Some(Utc::now()));
        }
        Ok(Some(parse_ts(earliest).unwrap_or_else(Utc::now)))
    }

    fn discovery_state(&self, museum: MuseumTag) -> Result<DiscoveryState, ProgressError> {
        let conn = self.conn.lock().unwrap();
        let state = conn
            .query_row(
                "SELECT cursor, exhausted FROM discovery_state WHERE museum = ?1",
                params![museum.as_str()],
                |row| {
                    Ok(DiscoveryState {
                        cursor: row.get(0)?,
                        exhausted: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)?;
        Ok(state.unwrap_or_default())
    }

    fn save_discovery_state(
        &self,
        museum: MuseumTag,
        state: &DiscoveryState,
    ) -> Result<(), ProgressError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO discovery_state (museum, cursor, exhausted, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (museum) DO UPDATE SET
                cursor = excluded.cursor,
                exhausted = excluded.exhausted,
                updated_at = excluded.updated_at",
            params![museum.as_str(), state.cursor, state.exhausted, ts(Utc::now())],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

//! SQLite-backed artwork catalog implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ArtworkCatalog, CatalogEntry, CatalogError, CatalogStats};
use crate::artwork::{ArtworkIdentifier, CanonicalArtworkRecord};

/// SQLite-backed artwork catalog.
pub struct SqliteArtworkCatalog {
    conn: Mutex<Connection>,
}

fn parse_ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteArtworkCatalog {
    /// Create a new SQLite catalog, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            -- One row per artwork; searchable columns duplicated out of the JSON record
            CREATE TABLE IF NOT EXISTS artworks (
                museum TEXT NOT NULL,
                native_id TEXT NOT NULL,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                date_display TEXT,
                is_public_domain INTEGER NOT NULL,
                image_reference TEXT,
                display_filename TEXT NOT NULL,
                accession_number TEXT,
                department TEXT,
                record TEXT NOT NULL,
                image_path TEXT,
                first_stored_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (museum, native_id)
            );

            CREATE INDEX IF NOT EXISTS idx_artworks_artist ON artworks(artist);
            CREATE INDEX IF NOT EXISTS idx_artworks_updated_at ON artworks(updated_at);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }
}

impl ArtworkCatalog for SqliteArtworkCatalog {
    fn upsert(
        &self,
        record: &CanonicalArtworkRecord,
        image_path: Option<&str>,
    ) -> Result<bool, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let id = &record.identifier;

        let existed: bool = conn
            .query_row(
                "SELECT 1 FROM artworks WHERE museum = ?1 AND native_id = ?2",
                params![id.museum.as_str(), id.native_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| CatalogError::Database(e.to_string()))?
            .is_some();

        let record_json = serde_json::to_string(record)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO artworks (museum, native_id, title, artist, date_display, is_public_domain,
                                   image_reference, display_filename, accession_number, department,
                                   record, image_path, first_stored_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
             ON CONFLICT (museum, native_id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                date_display = excluded.date_display,
                is_public_domain = excluded.is_public_domain,
                image_reference = excluded.image_reference,
                display_filename = excluded.display_filename,
                accession_number = excluded.accession_number,
                department = excluded.department,
                record = excluded.record,
                image_path = excluded.image_path,
                updated_at = excluded.updated_at",
            params![
                id.museum.as_str(),
                id.native_id,
                record.title,
                record.artist,
                record.date,
                record.is_public_domain,
                record.image_reference,
                record.display_filename,
                record.accession_number,
                record.department,
                record_json,
                image_path,
                now,
            ],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(!existed)
    }

    fn get(&self, identifier: &ArtworkIdentifier) -> Result<CatalogEntry, CatalogError> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(String, Option<String>, String, String)> = conn
            .query_row(
                "SELECT record, image_path, first_stored_at, updated_at
                 FROM artworks WHERE museum = ?1 AND native_id = ?2",
                params![identifier.museum.as_str(), identifier.native_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let (record_json, image_path, first_stored_at, updated_at) =
            row.ok_or_else(|| CatalogError::NotFound(identifier.to_string()))?;
        let record: CanonicalArtworkRecord = serde_json::from_str(&record_json)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        Ok(CatalogEntry {
            record,
            image_path,
            first_stored_at: parse_ts(&first_stored_at),
            updated_at: parse_ts(&updated_at),
        })
    }

    fn remove(&self, identifier: &ArtworkIdentifier) -> Result<(), CatalogError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                "DELETE FROM artworks WHERE museum = ?1 AND native_id = ?2",
                params![identifier.museum.as_str(), identifier.native_id],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if deleted == 0 {
            return Err(CatalogError::NotFound(identifier.to_string()));
        }
        Ok(())
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let mut stats = CatalogStats::default();

        let mut stmt = conn
            .prepare("SELECT museum, COUNT(*) FROM artworks GROUP BY museum")
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        for row in rows {
            let (museum, count) = row.map_err(|e| CatalogError::Database(e.to_string()))?;
            let count = count.max(0) as u64;
            stats.total_artworks += count;
            stats.by_museum.insert(museum, count);
        }

        let with_images: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM artworks WHERE image_path IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        stats.with_images = with_images.max(0) as u64;

        let last_updated: Option<String> = conn
            .query_row("SELECT MAX(updated_at) FROM artworks", [], |row| row.get(0))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        stats.last_updated = last_updated.as_deref().map(parse_ts);

        Ok(stats)
    }
}

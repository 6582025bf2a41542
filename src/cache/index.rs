//! Disk metadata index
//!
//! SQLite table describing every blob in the disk tier. It is the single
//! source of truth for sizes and recency; blob contents are never read to
//! answer a size or eviction question.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::cache::entry::{from_millis, to_millis, EntryInfo, Metadata};
use crate::error::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    key           TEXT PRIMARY KEY,
    filename      TEXT NOT NULL,
    created_at    INTEGER NOT NULL,
    last_accessed INTEGER NOT NULL,
    access_seq    INTEGER NOT NULL,
    access_count  INTEGER NOT NULL DEFAULT 1,
    size_bytes    INTEGER NOT NULL,
    expires_at    INTEGER,
    metadata      TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_cache_entries_recency
    ON cache_entries(last_accessed, access_seq);
CREATE INDEX IF NOT EXISTS idx_cache_entries_expires
    ON cache_entries(expires_at);
";

const ROW_COLUMNS: &str =
    "key, filename, created_at, last_accessed, access_count, size_bytes, expires_at, metadata";

/// One index row: entry bookkeeping plus the blob it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub info: EntryInfo,
    pub filename: String,
}

/// The minimum needed to remove a blob and its row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub key: String,
    pub filename: String,
    pub size_bytes: u64,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<IndexRow> {
    let key: String = row.get(0)?;
    let raw_metadata: String = row.get(7)?;
    let metadata = match serde_json::from_str::<Metadata>(&raw_metadata) {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!(key = %key, error = %err, "corrupt metadata in cache index, using empty map");
            Metadata::new()
        }
    };

    Ok(IndexRow {
        filename: row.get(1)?,
        info: EntryInfo {
            key,
            created_at: from_millis(row.get(2)?),
            last_accessed: from_millis(row.get(3)?),
            access_count: row.get::<_, i64>(4)? as u64,
            size_bytes: row.get::<_, i64>(5)? as u64,
            expires_at: row.get::<_, Option<i64>>(6)?.map(from_millis),
            metadata,
        },
    })
}

fn read_blob_ref(row: &Row<'_>) -> rusqlite::Result<BlobRef> {
    Ok(BlobRef {
        key: row.get(0)?,
        filename: row.get(1)?,
        size_bytes: row.get::<_, i64>(2)? as u64,
    })
}

// == Metadata Index ==
/// Owns the SQLite connection. Callers serialize access externally.
#[derive(Debug)]
pub struct MetadataIndex {
    conn: Connection,
    /// Next recency sequence number, persisted through `access_seq`
    next_seq: i64,
}

impl MetadataIndex {
    /// Opens (creating if needed) the index database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        let max_seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(access_seq), 0) FROM cache_entries",
            [],
            |row| row.get(0),
        )?;

        Ok(Self {
            conn,
            next_seq: max_seq + 1,
        })
    }

    fn take_seq(&mut self) -> i64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn get(&self, key: &str) -> Result<Option<IndexRow>> {
        let sql = format!("SELECT {} FROM cache_entries WHERE key = ?1", ROW_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![key], read_row)
            .optional()?)
    }

    /// Inserts or replaces the row for `info.key`, then runs `place_blob`.
    ///
    /// The row change is committed only if `place_blob` succeeds, so a failed
    /// file move leaves the previous row in place.
    pub fn upsert_with<F>(&mut self, info: &EntryInfo, filename: &str, place_blob: F) -> Result<()>
    where
        F: FnOnce() -> std::io::Result<()>,
    {
        let seq = self.take_seq();
        let metadata = serde_json::to_string(&info.metadata)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO cache_entries
                (key, filename, created_at, last_accessed, access_seq,
                 access_count, size_bytes, expires_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                info.key,
                filename,
                to_millis(info.created_at),
                to_millis(info.last_accessed),
                seq,
                info.access_count as i64,
                info.size_bytes as i64,
                info.expires_at.map(to_millis),
                metadata,
            ],
        )?;
        place_blob()?;
        tx.commit()?;
        Ok(())
    }

    /// Records a successful read.
    pub fn touch(&mut self, key: &str, now: DateTime<Utc>) -> Result<()> {
        let seq = self.take_seq();
        self.conn.execute(
            "UPDATE cache_entries
             SET last_accessed = ?2, access_seq = ?3, access_count = access_count + 1
             WHERE key = ?1",
            params![key, to_millis(now), seq],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    pub fn set_size(&self, key: &str, size_bytes: u64) -> Result<()> {
        self.conn.execute(
            "UPDATE cache_entries SET size_bytes = ?2 WHERE key = ?1",
            params![key, size_bytes as i64],
        )?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }

    /// Rows whose expiration is at or before `now`.
    pub fn expired(&self, now: DateTime<Utc>) -> Result<Vec<BlobRef>> {
        self.blob_refs(
            "SELECT key, filename, size_bytes FROM cache_entries
             WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            Some(to_millis(now)),
        )
    }

    /// All rows, least recently used first.
    pub fn by_recency(&self) -> Result<Vec<BlobRef>> {
        self.blob_refs(
            "SELECT key, filename, size_bytes FROM cache_entries
             ORDER BY last_accessed ASC, access_seq ASC",
            None,
        )
    }

    fn blob_refs(&self, sql: &str, bound: Option<i64>) -> Result<Vec<BlobRef>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = match bound {
            Some(value) => stmt.query_map(params![value], read_blob_ref)?,
            None => stmt.query_map([], read_blob_ref)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM cache_entries")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn total_size(&self) -> Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }
}

//! SQLite implementation of the sink and cursor traits.
//!
//! This is the primary storage backend. Each record file is written inside
//! one SQL transaction that `init_file` begins and `complete_file` commits,
//! so a failed file leaves no rows behind. The cursor lives in the same
//! database but is written outside the file transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use recordstream_core::{FileHash, RecordEntry};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CursorStore, FileSummary, InitOutcome, RecordSink};

const LAST_PROCESSED_HASH: &str = "last_processed_record_hash";
const BYPASS_UNTIL_AFTER: &str = "bypass_record_hash_mismatch_until_after";

/// SQLite-based sink and cursor store.
///
/// Thread-safe via internal Mutex.
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

struct Inner {
    conn: Connection,
    /// File currently inside an open transaction.
    open: Option<OpenFile>,
}

struct OpenFile {
    id: i64,
    name: String,
    records: u64,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        Ok(Self {
            inner: Mutex::new(Inner { conn, open: None }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Committed files in commit order.
    pub fn committed_files(&self) -> Result<Vec<FileSummary>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(
            "SELECT f.name, f.file_hash, f.prev_hash,
                    (SELECT COUNT(*) FROM transactions t WHERE t.file_id = f.id)
             FROM record_files f
             WHERE f.load_end IS NOT NULL
             ORDER BY f.id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut files = Vec::new();
        for row in rows {
            let (name, file_hash, prev_hash, count) = row?;
            files.push(FileSummary {
                name,
                file_hash: parse_hash(file_hash)?,
                prev_hash: parse_hash(prev_hash)?,
                record_count: count as u64,
            });
        }
        Ok(files)
    }

    /// Consensus timestamps (ns) of all stored transactions, in file then
    /// sequence order.
    pub fn consensus_timestamps(&self) -> Result<Vec<i64>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(
            "SELECT t.consensus_ns FROM transactions t
             JOIN record_files f ON f.id = t.file_id
             ORDER BY f.id, t.seq",
        )?;
        let timestamps = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(timestamps)
    }

    /// Signatures stored for a file, hex encoded.
    pub fn signatures(&self, name: &str) -> Result<Vec<String>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(
            "SELECT s.signature_hex FROM record_file_signatures s
             JOIN record_files f ON f.id = s.file_id
             WHERE f.name = ?1
             ORDER BY s.rowid",
        )?;
        let signatures = stmt
            .query_map(params![name], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(signatures)
    }

    fn status(&self, key: &str) -> Result<Option<String>> {
        let inner = self.lock()?;
        let value: Option<Option<String>> = inner
            .conn
            .query_row(
                "SELECT status_value FROM application_status WHERE status_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten().filter(|v| !v.is_empty()))
    }

    fn set_status(&self, key: &str, value: Option<&str>) -> Result<()> {
        let inner = self.lock()?;
        inner.conn.execute(
            "INSERT INTO application_status (status_key, status_value) VALUES (?1, ?2)
             ON CONFLICT(status_key) DO UPDATE SET status_value = excluded.status_value",
            params![key, value],
        )?;
        Ok(())
    }
}

impl Inner {
    fn open_file(&mut self) -> Result<&mut OpenFile> {
        self.open
            .as_mut()
            .ok_or_else(|| StoreError::InvalidState("no record file is open".into()))
    }
}

fn parse_hash(hex: Option<String>) -> Result<Option<FileHash>> {
    hex.map(|h| FileHash::from_hex(&h))
        .transpose()
        .map_err(|e| StoreError::InvalidData(e.to_string()))
}

impl RecordSink for SqliteStore {
    fn start(&self) -> Result<()> {
        let inner = self.lock()?;
        inner.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn init_file(&self, name: &str) -> Result<InitOutcome> {
        let mut inner = self.lock()?;

        if let Some(open) = &inner.open {
            return Err(StoreError::InvalidState(format!(
                "cannot open {}: {} is still open",
                name, open.name
            )));
        }

        // Left behind by a rollback that failed.
        if !inner.conn.is_autocommit() {
            warn!(file = name, "discarding unfinished transaction");
            inner.conn.execute_batch("ROLLBACK")?;
        }

        let existing: Option<Option<String>> = inner
            .conn
            .query_row(
                "SELECT file_hash FROM record_files WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(hash) = existing {
            debug!(file = name, "record file already stored");
            return Ok(InitOutcome::AlreadyProcessed {
                file_hash: parse_hash(hash)?,
            });
        }

        inner.conn.execute_batch("BEGIN IMMEDIATE")?;
        let inserted = inner.conn.execute(
            "INSERT INTO record_files (name, load_start) VALUES (?1, ?2)",
            params![name, crate::now_millis()],
        );
        if let Err(e) = inserted {
            inner.conn.execute_batch("ROLLBACK")?;
            return Err(e.into());
        }

        let id = inner.conn.last_insert_rowid();
        inner.open = Some(OpenFile {
            id,
            name: name.to_string(),
            records: 0,
        });
        Ok(InitOutcome::Proceed)
    }

    fn store_record(&self, entry: &RecordEntry) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let open = inner
            .open
            .as_mut()
            .ok_or_else(|| StoreError::InvalidState("no record file is open".into()))?;

        inner
            .conn
            .prepare_cached(
                "INSERT INTO transactions (
                    file_id, seq, consensus_ns, transaction_bytes, record_bytes
                ) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![
                open.id,
                entry.sequence_number as i64,
                entry.consensus_timestamp.as_nanos(),
                entry.transaction_bytes.as_ref(),
                entry.record_bytes.as_ref(),
            ])?;
        open.records += 1;
        Ok(())
    }

    fn store_signature(&self, signature_hex: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let id = inner.open_file()?.id;
        inner.conn.execute(
            "INSERT INTO record_file_signatures (file_id, signature_hex) VALUES (?1, ?2)",
            params![id, signature_hex],
        )?;
        Ok(())
    }

    fn complete_file(&self, file_hash: &FileHash, prev_hash: &FileHash) -> Result<()> {
        let mut inner = self.lock()?;
        let (id, records) = {
            let open = inner.open_file()?;
            (open.id, open.records)
        };

        inner.conn.execute(
            "UPDATE record_files SET file_hash = ?1, prev_hash = ?2, load_end = ?3 WHERE id = ?4",
            params![
                file_hash.to_hex(),
                prev_hash.to_hex(),
                crate::now_millis(),
                id
            ],
        )?;
        inner.conn.execute_batch("COMMIT")?;

        if let Some(open) = inner.open.take() {
            debug!(file = %open.name, records, "record file committed");
        }
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut inner = self.lock()?;
        let open = inner.open.take();
        if !inner.conn.is_autocommit() {
            inner.conn.execute_batch("ROLLBACK")?;
        }
        if let Some(open) = open {
            warn!(file = %open.name, discarded = open.records, "record file rolled back");
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        let dangling = self.lock()?.open.is_some();
        if dangling {
            warn!("batch finished with a record file still open");
            self.rollback()?;
        }
        Ok(())
    }
}

impl CursorStore for SqliteStore {
    fn last_processed_hash(&self) -> Result<Option<FileHash>> {
        parse_hash(self.status(LAST_PROCESSED_HASH)?)
    }

    fn set_last_processed_hash(&self, hash: &FileHash) -> Result<()> {
        self.set_status(LAST_PROCESSED_HASH, Some(&hash.to_hex()))
    }

    fn bypass_boundary(&self) -> Result<Option<String>> {
        self.status(BYPASS_UNTIL_AFTER)
    }

    fn set_bypass_boundary(&self, boundary: Option<&str>) -> Result<()> {
        self.set_status(BYPASS_UNTIL_AFTER, boundary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use recordstream_core::ConsensusTimestamp;

    fn entry(seq: u64, ns: i64) -> RecordEntry {
        RecordEntry {
            sequence_number: seq,
            consensus_timestamp: ConsensusTimestamp(ns),
            transaction_bytes: Bytes::from_static(b"tx"),
            record_bytes: Bytes::from_static(b"rec"),
        }
    }

    #[test]
    fn test_commit_file() {
        let store = SqliteStore::open_memory().unwrap();
        store.start().unwrap();

        assert_eq!(store.init_file("a.rcd").unwrap(), InitOutcome::Proceed);
        store.store_record(&entry(1, 100)).unwrap();
        store.store_record(&entry(2, 200)).unwrap();
        store.store_signature("abcd").unwrap();

        let hash = FileHash::from_bytes([1; 48]);
        store.complete_file(&hash, &FileHash::ZERO).unwrap();

        let files = store.committed_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "a.rcd");
        assert_eq!(files[0].file_hash, Some(hash));
        assert_eq!(files[0].prev_hash, Some(FileHash::ZERO));
        assert_eq!(files[0].record_count, 2);
        assert_eq!(store.consensus_timestamps().unwrap(), vec![100, 200]);
        assert_eq!(store.signatures("a.rcd").unwrap(), vec!["abcd".to_string()]);
    }

    #[test]
    fn test_rollback_discards_records() {
        let store = SqliteStore::open_memory().unwrap();

        store.init_file("a.rcd").unwrap();
        store.store_record(&entry(1, 100)).unwrap();
        store.rollback().unwrap();

        assert!(store.committed_files().unwrap().is_empty());
        assert!(store.consensus_timestamps().unwrap().is_empty());

        // The file can be retried after a rollback.
        assert_eq!(store.init_file("a.rcd").unwrap(), InitOutcome::Proceed);
    }

    #[test]
    fn test_already_processed_reports_hash() {
        let store = SqliteStore::open_memory().unwrap();
        let hash = FileHash::from_bytes([9; 48]);

        store.init_file("a.rcd").unwrap();
        store.complete_file(&hash, &FileHash::ZERO).unwrap();

        assert_eq!(
            store.init_file("a.rcd").unwrap(),
            InitOutcome::AlreadyProcessed {
                file_hash: Some(hash)
            }
        );
    }

    #[test]
    fn test_record_without_open_file() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store.store_record(&entry(1, 1)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));
    }

    #[test]
    fn test_second_open_is_rejected() {
        let store = SqliteStore::open_memory().unwrap();
        store.init_file("a.rcd").unwrap();
        let err = store.init_file("b.rcd").unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));
    }

    #[test]
    fn test_finish_rolls_back_dangling_file() {
        let store = SqliteStore::open_memory().unwrap();
        store.init_file("a.rcd").unwrap();
        store.store_record(&entry(1, 1)).unwrap();
        store.finish().unwrap();

        assert!(store.consensus_timestamps().unwrap().is_empty());
    }

    #[test]
    fn test_init_file_recovers_from_unfinished_rollback() {
        let store = SqliteStore::open_memory().unwrap();
        store.init_file("a.rcd").unwrap();
        store.store_record(&entry(1, 100)).unwrap();

        // State after a ROLLBACK that errored: no open file, transaction live.
        store.lock().unwrap().open = None;
        assert!(!store.lock().unwrap().conn.is_autocommit());

        assert_eq!(store.init_file("b.rcd").unwrap(), InitOutcome::Proceed);
        store.store_record(&entry(1, 200)).unwrap();
        store
            .complete_file(&FileHash::from_bytes([5; 48]), &FileHash::ZERO)
            .unwrap();

        let files = store.committed_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "b.rcd");
        assert_eq!(store.consensus_timestamps().unwrap(), vec![200]);
        assert_eq!(store.init_file("a.rcd").unwrap(), InitOutcome::Proceed);
    }

    #[test]
    fn test_rollback_clears_open_file_when_transaction_is_gone() {
        let store = SqliteStore::open_memory().unwrap();
        store.init_file("a.rcd").unwrap();
        store.lock().unwrap().conn.execute_batch("ROLLBACK").unwrap();

        store.rollback().unwrap();
        assert!(store.lock().unwrap().open.is_none());
        assert_eq!(store.init_file("a.rcd").unwrap(), InitOutcome::Proceed);
    }

    #[test]
    fn test_cursor_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.last_processed_hash().unwrap(), None);
        assert_eq!(store.bypass_boundary().unwrap(), None);

        let hash = FileHash::from_bytes([4; 48]);
        store.set_last_processed_hash(&hash).unwrap();
        store.set_bypass_boundary(Some("2019-09-01.rcd")).unwrap();

        assert_eq!(store.last_processed_hash().unwrap(), Some(hash));
        assert_eq!(
            store.bypass_boundary().unwrap().as_deref(),
            Some("2019-09-01.rcd")
        );

        store.set_bypass_boundary(None).unwrap();
        assert_eq!(store.bypass_boundary().unwrap(), None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.db");
        let hash = FileHash::from_bytes([2; 48]);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.init_file("a.rcd").unwrap();
            store.store_record(&entry(1, 5)).unwrap();
            store.complete_file(&hash, &FileHash::ZERO).unwrap();
            store.set_last_processed_hash(&hash).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.last_processed_hash().unwrap(), Some(hash));
        assert_eq!(store.committed_files().unwrap()[0].record_count, 1);
    }
}

//! In-memory implementation of the sink and cursor traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. Failures can be
//! injected to exercise rollback paths.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use recordstream_core::{FileHash, RecordEntry};

use crate::error::{Result, StoreError};
use crate::traits::{CursorStore, FileSummary, InitOutcome, RecordSink};

/// In-memory sink and cursor store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Committed files in commit order.
    files: Vec<StoredFile>,

    /// File between `init_file` and `complete_file`.
    pending: Option<StoredFile>,

    last_hash: Option<FileHash>,
    bypass: Option<String>,

    /// Batch lifecycle calls, for assertions.
    started: u32,
    finished: u32,

    /// Reject the record with this sequence number.
    fail_on_record: Option<u64>,
    /// Reject the next `complete_file`.
    fail_on_complete: bool,
    /// Reject the next cursor write.
    fail_on_cursor: bool,
}

#[derive(Debug, Clone)]
struct StoredFile {
    name: String,
    file_hash: Option<FileHash>,
    prev_hash: Option<FileHash>,
    records: Vec<RecordEntry>,
    signatures: Vec<String>,
}

impl StoredFile {
    fn summary(&self) -> FileSummary {
        FileSummary {
            name: self.name.clone(),
            file_hash: self.file_hash,
            prev_hash: self.prev_hash,
            record_count: self.records.len() as u64,
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }

    /// Make `store_record` fail for the record with this sequence number.
    pub fn fail_on_record(&self, sequence_number: u64) -> Result<()> {
        self.write()?.fail_on_record = Some(sequence_number);
        Ok(())
    }

    /// Make the next `complete_file` fail.
    pub fn fail_on_complete(&self) -> Result<()> {
        self.write()?.fail_on_complete = true;
        Ok(())
    }

    /// Make the next `set_last_processed_hash` fail.
    pub fn fail_on_cursor(&self) -> Result<()> {
        self.write()?.fail_on_cursor = true;
        Ok(())
    }

    /// Mark a file as committed without going through a transaction.
    ///
    /// Simulates a crash between commit and cursor write.
    pub fn seed_committed(&self, name: &str, file_hash: FileHash) -> Result<()> {
        self.write()?.files.push(StoredFile {
            name: name.to_string(),
            file_hash: Some(file_hash),
            prev_hash: None,
            records: Vec::new(),
            signatures: Vec::new(),
        });
        Ok(())
    }

    /// Committed files in commit order.
    pub fn committed_files(&self) -> Result<Vec<FileSummary>> {
        Ok(self.read()?.files.iter().map(StoredFile::summary).collect())
    }

    /// All committed records in commit order.
    pub fn records(&self) -> Result<Vec<RecordEntry>> {
        Ok(self
            .read()?
            .files
            .iter()
            .flat_map(|f| f.records.iter().cloned())
            .collect())
    }

    /// Signatures stored for a committed file.
    pub fn signatures(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.signatures.clone())
            .unwrap_or_default())
    }

    /// Whether a file is currently open.
    pub fn has_pending(&self) -> Result<bool> {
        Ok(self.read()?.pending.is_some())
    }

    /// Number of `start` and `finish` calls seen.
    pub fn lifecycle_calls(&self) -> Result<(u32, u32)> {
        let inner = self.read()?;
        Ok((inner.started, inner.finished))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSink for MemoryStore {
    fn start(&self) -> Result<()> {
        self.write()?.started += 1;
        Ok(())
    }

    fn init_file(&self, name: &str) -> Result<InitOutcome> {
        let mut inner = self.write()?;

        if let Some(pending) = &inner.pending {
            return Err(StoreError::InvalidState(format!(
                "cannot open {}: {} is still open",
                name, pending.name
            )));
        }

        if let Some(existing) = inner.files.iter().find(|f| f.name == name) {
            return Ok(InitOutcome::AlreadyProcessed {
                file_hash: existing.file_hash,
            });
        }

        inner.pending = Some(StoredFile {
            name: name.to_string(),
            file_hash: None,
            prev_hash: None,
            records: Vec::new(),
            signatures: Vec::new(),
        });
        Ok(InitOutcome::Proceed)
    }

    fn store_record(&self, entry: &RecordEntry) -> Result<()> {
        let mut inner = self.write()?;

        if inner.fail_on_record == Some(entry.sequence_number) {
            inner.fail_on_record = None;
            return Err(StoreError::Rejected(format!(
                "record {} refused",
                entry.sequence_number
            )));
        }

        let pending = inner
            .pending
            .as_mut()
            .ok_or_else(|| StoreError::InvalidState("no record file is open".into()))?;
        pending.records.push(entry.clone());
        Ok(())
    }

    fn store_signature(&self, signature_hex: &str) -> Result<()> {
        let mut inner = self.write()?;
        let pending = inner
            .pending
            .as_mut()
            .ok_or_else(|| StoreError::InvalidState("no record file is open".into()))?;
        pending.signatures.push(signature_hex.to_string());
        Ok(())
    }

    fn complete_file(&self, file_hash: &FileHash, prev_hash: &FileHash) -> Result<()> {
        let mut inner = self.write()?;

        if inner.fail_on_complete {
            inner.fail_on_complete = false;
            return Err(StoreError::Rejected("commit refused".into()));
        }

        let mut file = inner
            .pending
            .take()
            .ok_or_else(|| StoreError::InvalidState("no record file is open".into()))?;
        file.file_hash = Some(*file_hash);
        file.prev_hash = Some(*prev_hash);
        inner.files.push(file);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.write()?.pending = None;
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.pending = None;
        inner.finished += 1;
        Ok(())
    }
}

impl CursorStore for MemoryStore {
    fn last_processed_hash(&self) -> Result<Option<FileHash>> {
        Ok(self.read()?.last_hash)
    }

    fn set_last_processed_hash(&self, hash: &FileHash) -> Result<()> {
        let mut inner = self.write()?;
        if inner.fail_on_cursor {
            inner.fail_on_cursor = false;
            return Err(StoreError::Rejected("cursor write refused".into()));
        }
        inner.last_hash = Some(*hash);
        Ok(())
    }

    fn bypass_boundary(&self) -> Result<Option<String>> {
        Ok(self.read()?.bypass.clone())
    }

    fn set_bypass_boundary(&self, boundary: Option<&str>) -> Result<()> {
        self.write()?.bypass = boundary.map(str::to_string);
        Ok(())
    }
}

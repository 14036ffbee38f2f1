//! Sink and cursor traits: the narrow interfaces the ingestion pipeline
//! talks to.
//!
//! The pipeline is storage-agnostic. Implementations include SQLite
//! (primary) and in-memory (for tests).

use std::sync::Arc;

use recordstream_core::{FileHash, RecordEntry};

use crate::error::Result;

/// Answer to [`RecordSink::init_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The file is new; a transaction is open for it.
    Proceed,
    /// The file was committed earlier. Nothing is open.
    AlreadyProcessed {
        /// Hash recorded when the file was committed, if known.
        file_hash: Option<FileHash>,
    },
}

/// Summary of a committed file, for inspection and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub name: String,
    pub file_hash: Option<FileHash>,
    pub prev_hash: Option<FileHash>,
    pub record_count: u64,
}

/// Downstream storage for decoded records.
///
/// One file is one transaction: `init_file` opens it, `complete_file`
/// commits it, and `rollback` discards everything stored since `init_file`.
/// Records arrive in file order.
///
/// # Design Notes
///
/// - **Idempotent resume**: `init_file` for a committed file answers
///   `AlreadyProcessed`, so a crash after commit never duplicates records.
/// - **Atomicity**: after `rollback` no record from the file is visible.
pub trait RecordSink: Send + Sync {
    /// Prepare for a batch of files.
    fn start(&self) -> Result<()>;

    /// Open a file for writing, or report that it is already stored.
    fn init_file(&self, name: &str) -> Result<InitOutcome>;

    /// Store one record of the open file.
    fn store_record(&self, entry: &RecordEntry) -> Result<()>;

    /// Store the open file's signature (hex encoded).
    fn store_signature(&self, signature_hex: &str) -> Result<()>;

    /// Commit the open file with its computed and accepted previous hash.
    fn complete_file(&self, file_hash: &FileHash, prev_hash: &FileHash) -> Result<()>;

    /// Discard everything stored for the open file. A no-op if none is open.
    fn rollback(&self) -> Result<()>;

    /// End the batch.
    fn finish(&self) -> Result<()>;
}

/// Persisted ingestion cursor and bypass window.
pub trait CursorStore: Send + Sync {
    /// Hash of the last fully committed file.
    fn last_processed_hash(&self) -> Result<Option<FileHash>>;

    /// Record the hash of a newly committed file.
    fn set_last_processed_hash(&self, hash: &FileHash) -> Result<()>;

    /// Last file name for which a chain mismatch is tolerated.
    fn bypass_boundary(&self) -> Result<Option<String>>;

    /// Set or clear the bypass boundary. Operator tooling only.
    fn set_bypass_boundary(&self, boundary: Option<&str>) -> Result<()>;
}

impl<T: RecordSink + ?Sized> RecordSink for &T {
    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn init_file(&self, name: &str) -> Result<InitOutcome> {
        (**self).init_file(name)
    }

    fn store_record(&self, entry: &RecordEntry) -> Result<()> {
        (**self).store_record(entry)
    }

    fn store_signature(&self, signature_hex: &str) -> Result<()> {
        (**self).store_signature(signature_hex)
    }

    fn complete_file(&self, file_hash: &FileHash, prev_hash: &FileHash) -> Result<()> {
        (**self).complete_file(file_hash, prev_hash)
    }

    fn rollback(&self) -> Result<()> {
        (**self).rollback()
    }

    fn finish(&self) -> Result<()> {
        (**self).finish()
    }
}

impl<T: RecordSink + ?Sized> RecordSink for Arc<T> {
    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn init_file(&self, name: &str) -> Result<InitOutcome> {
        (**self).init_file(name)
    }

    fn store_record(&self, entry: &RecordEntry) -> Result<()> {
        (**self).store_record(entry)
    }

    fn store_signature(&self, signature_hex: &str) -> Result<()> {
        (**self).store_signature(signature_hex)
    }

    fn complete_file(&self, file_hash: &FileHash, prev_hash: &FileHash) -> Result<()> {
        (**self).complete_file(file_hash, prev_hash)
    }

    fn rollback(&self) -> Result<()> {
        (**self).rollback()
    }

    fn finish(&self) -> Result<()> {
        (**self).finish()
    }
}

impl<T: CursorStore + ?Sized> CursorStore for &T {
    fn last_processed_hash(&self) -> Result<Option<FileHash>> {
        (**self).last_processed_hash()
    }

    fn set_last_processed_hash(&self, hash: &FileHash) -> Result<()> {
        (**self).set_last_processed_hash(hash)
    }

    fn bypass_boundary(&self) -> Result<Option<String>> {
        (**self).bypass_boundary()
    }

    fn set_bypass_boundary(&self, boundary: Option<&str>) -> Result<()> {
        (**self).set_bypass_boundary(boundary)
    }
}

impl<T: CursorStore + ?Sized> CursorStore for Arc<T> {
    fn last_processed_hash(&self) -> Result<Option<FileHash>> {
        (**self).last_processed_hash()
    }

    fn set_last_processed_hash(&self, hash: &FileHash) -> Result<()> {
        (**self).set_last_processed_hash(hash)
    }

    fn bypass_boundary(&self) -> Result<Option<String>> {
        (**self).bypass_boundary()
    }

    fn set_bypass_boundary(&self, boundary: Option<&str>) -> Result<()> {
        (**self).set_bypass_boundary(boundary)
    }
}

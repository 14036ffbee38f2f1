//! Error types for ingestion.

use std::path::PathBuf;

use recordstream_core::{DecodeError, FileHash};
use recordstream_store::StoreError;
use thiserror::Error;

/// Errors that stop a batch.
///
/// Every variant names the file it happened on. None of them advance the
/// cursor past an uncommitted file.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file vanished between listing and opening. Retried next cycle.
    #[error("record file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Structural or payload error in the file.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// The file does not chain to the last committed file.
    #[error("hash mismatch for {}: expected previous {expected}, file declares {declared}", path.display())]
    ChainMismatch {
        path: PathBuf,
        expected: FileHash,
        declared: FileHash,
    },

    /// The sink refused a call.
    #[error("sink error on {}: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// The file was committed but the cursor could not be updated.
    #[error("cursor update failed after committing {}: {source}", path.display())]
    Cursor {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// I/O error other than a missing file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// The file the error happened on.
    pub fn path(&self) -> &std::path::Path {
        match self {
            IngestError::NotFound { path }
            | IngestError::Decode { path, .. }
            | IngestError::ChainMismatch { path, .. }
            | IngestError::Sink { path, .. }
            | IngestError::Cursor { path, .. }
            | IngestError::Io { path, .. } => path,
        }
    }

    /// Whether the same file may succeed on a later cycle without operator
    /// action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::NotFound { .. } | IngestError::Cursor { .. } | IngestError::Io { .. }
        )
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

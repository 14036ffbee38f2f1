//! # Record Stream
//!
//! Ingests ledger record files into a storage sink, checking that every file
//! chains to the one before it.
//!
//! ## Overview
//!
//! A node writes one `*.rcd` file per interval. Each file declares the hash
//! of its predecessor, so the files form a hash chain. This crate:
//!
//! - **Scans** an input directory for record files in name order
//! - **Verifies** each file's declared previous hash against the cursor
//! - **Stores** every record inside one sink transaction per file
//! - **Advances** the persisted cursor and archives the file after commit
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use recordstream::{Ingester, Scanner};
//! use recordstream::store::SqliteStore;
//!
//! fn example() {
//!     let store = Arc::new(SqliteStore::open("mirror.db").unwrap());
//!     let scanner = Scanner::new(
//!         Ingester::new(store.clone(), store),
//!         Duration::from_secs(1),
//!     );
//!     let report = scanner.ingest_directory("recordstreams".as_ref(), &AtomicBool::new(false));
//!     println!("committed {} files", report.committed);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `recordstream::core` - Decoder, digest and chain check
//! - `recordstream::store` - Sink and cursor traits, SQLite and in-memory stores

pub mod config;
pub mod error;
pub mod pipeline;
pub mod scanner;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export component crates
pub use recordstream_core as core;
pub use recordstream_store as store;

// Re-export main types for convenience
pub use config::{ConfigError, IngestConfig};
pub use error::{IngestError, Result};
pub use pipeline::{
    read_previous_hash_at, FileOutcome, Ingester, IngestionContext, DEFAULT_ARCHIVE_SUBDIR,
};
pub use scanner::{
    list_record_files, BatchReport, BatchStop, CancellationSignal, DirectoryResolver,
    FixedDirectory, RunSummary, Scanner, StopSignal, RECORD_FILE_SUFFIX,
};

pub use recordstream_core::{ChainCheck, FileHash, RecordEntry};

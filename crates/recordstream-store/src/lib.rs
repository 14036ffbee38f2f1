//! # Record Stream Store
//!
//! Storage abstraction for record stream ingestion. Provides the sink that
//! receives decoded records and the cursor store that remembers where the
//! hash chain stands, with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`RecordSink`] - Per-file transactional record sink
//! - [`CursorStore`] - Last processed hash and bypass boundary
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InitOutcome`] - Answer to opening a file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use recordstream_store::{CursorStore, InitOutcome, RecordSink, SqliteStore};
//!
//! fn example() -> recordstream_store::Result<()> {
//!     let store = SqliteStore::open("mirror.db")?;
//!     store.start()?;
//!     if store.init_file("2019-08-30T18_10_00.419072Z.rcd")? == InitOutcome::Proceed {
//!         // store_record / store_signature / complete_file
//!     }
//!     store.finish()?;
//!     let _cursor = store.last_processed_hash()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **One file, one transaction**: a file's records become visible together
//! - **Idempotent resume**: a committed file is reported, never re-stored
//! - **Cursor outside the transaction**: written only after the commit

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CursorStore, FileSummary, InitOutcome, RecordSink};

/// Get current time in milliseconds since Unix epoch.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

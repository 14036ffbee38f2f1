//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a scratch input directory, a
//! SQLite store, and builders for chains of record files.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use prost::Message;
use tempfile::TempDir;

use recordstream::{Ingester, Scanner, DEFAULT_ARCHIVE_SUBDIR};
use recordstream_core::{FileHash, RecordFileBuilder, Timestamp, Transaction, TransactionRecord};
use recordstream_store::SqliteStore;

/// Consensus time of the first record produced by [`chained_files`]:
/// 2019-08-30T18:10:00Z.
pub const BASE_CONSENSUS_SECONDS: i64 = 1_567_188_600;

/// Serialized transaction and record reaching consensus at `seconds.nanos`.
pub fn record_pair(seconds: i64, nanos: i32) -> (Vec<u8>, Vec<u8>) {
    let transaction = Transaction {
        body_bytes: format!("body {seconds}.{nanos}").into_bytes(),
        signed_transaction_bytes: Vec::new(),
    };
    let record = TransactionRecord {
        // receipt { status: SUCCESS }
        receipt: vec![0x08, 0x16],
        transaction_hash: vec![0xab; 48],
        consensus_timestamp: Some(Timestamp { seconds, nanos }),
        // transactionID { accountID { accountNum: 2 } }
        transaction_id: vec![0x12, 0x02, 0x18, 0x02],
        memo: format!("record at {seconds}"),
        transaction_fee: 100_000,
    };
    (transaction.encode_to_vec(), record.encode_to_vec())
}

/// Record file name for the file written `index` intervals after the base
/// time, in the writer's naming scheme.
pub fn file_name(index: usize) -> String {
    let total = 18 * 3600 + 10 * 60 + index * 2;
    format!(
        "2019-08-30T{:02}_{:02}_{:02}.000000Z.rcd",
        total / 3600,
        total / 60 % 60,
        total % 60
    )
}

/// A chain of `count` files, each with `records_per_file` records, the first
/// declaring `first_prev` as its predecessor.
///
/// Consensus timestamps increase by one second per record across the chain.
pub fn chained_files(
    count: usize,
    format_version: i32,
    records_per_file: usize,
    first_prev: FileHash,
) -> Vec<(String, RecordFileBuilder)> {
    let mut prev = first_prev;
    let mut second = BASE_CONSENSUS_SECONDS;
    let mut files = Vec::with_capacity(count);

    for index in 0..count {
        let mut builder = RecordFileBuilder::new(format_version, 1, prev);
        for _ in 0..records_per_file {
            let (tx, rec) = record_pair(second, 0);
            builder = builder.record(tx, rec);
            second += 1;
        }
        builder = builder.signature(vec![index as u8; 16]);
        prev = builder.file_hash();
        files.push((file_name(index), builder));
    }
    files
}

/// A scratch input directory with a SQLite store next to it.
pub struct TestFixture {
    dir: TempDir,
    pub store: Arc<SqliteStore>,
}

impl TestFixture {
    /// Create a fresh fixture.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir(dir.path().join("input"))?;
        let store = SqliteStore::open(dir.path().join("mirror.db")).map_err(io::Error::other)?;
        Ok(Self {
            dir,
            store: Arc::new(store),
        })
    }

    /// Reopen the database, as a restarted process would.
    pub fn reopen_store(&mut self) -> io::Result<()> {
        self.store = Arc::new(SqliteStore::open(self.database()).map_err(io::Error::other)?);
        Ok(())
    }

    /// Directory scanned for record files.
    pub fn input_dir(&self) -> PathBuf {
        self.dir.path().join("input")
    }

    /// Where committed files end up.
    pub fn archive_dir(&self) -> PathBuf {
        self.input_dir().join(DEFAULT_ARCHIVE_SUBDIR)
    }

    /// Path of the database file.
    pub fn database(&self) -> PathBuf {
        self.dir.path().join("mirror.db")
    }

    /// Write a record file into the input directory.
    pub fn write(&self, name: &str, file: &RecordFileBuilder) -> io::Result<PathBuf> {
        let path = self.input_dir().join(name);
        std::fs::write(&path, file.to_bytes())?;
        Ok(path)
    }

    /// Write raw bytes as a record file into the input directory.
    pub fn write_raw(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.input_dir().join(name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Whether a file with this name is still waiting in the input directory.
    pub fn is_pending(&self, name: &str) -> bool {
        self.input_dir().join(name).exists()
    }

    /// Whether a file with this name was archived.
    pub fn is_archived(&self, name: &str) -> bool {
        self.archive_dir().join(name).exists()
    }

    /// A scanner over this fixture's store.
    pub fn scanner(&self) -> Scanner<Arc<SqliteStore>, Arc<SqliteStore>> {
        Scanner::new(
            Ingester::new(self.store.clone(), self.store.clone()),
            Duration::from_millis(0),
        )
    }

    /// Root of the scratch directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

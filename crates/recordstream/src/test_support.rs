//! Helpers shared by the unit tests.

use std::path::{Path, PathBuf};

use prost::Message;
use recordstream_core::{RecordFileBuilder, Timestamp, Transaction, TransactionRecord};

/// A well-formed transaction and record reaching consensus at `seconds.nanos`.
pub(crate) fn record_pair(seconds: i64, nanos: i32) -> (Vec<u8>, Vec<u8>) {
    let tx = Transaction {
        body_bytes: seconds.to_be_bytes().to_vec(),
        signed_transaction_bytes: Vec::new(),
    };
    let record = TransactionRecord {
        consensus_timestamp: Some(Timestamp { seconds, nanos }),
        transaction_id: vec![0x12, 0x02, 0x18, 0x62],
        memo: format!("tx {seconds}"),
        transaction_fee: 83_334,
        ..Default::default()
    };
    (tx.encode_to_vec(), record.encode_to_vec())
}

/// Write a built record file into `dir`.
pub(crate) fn write_file(dir: &Path, name: &str, file: &RecordFileBuilder) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, file.to_bytes()).unwrap();
    path
}

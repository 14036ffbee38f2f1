//! Golden test vectors for file hash verification.
//!
//! Each vector is a small record file with a SHA-384 computed outside this
//! codebase. A mismatch means the digest no longer agrees with what ledger
//! nodes write, and every historical chain would break.

use recordstream_core::{FileHash, RecordFileBuilder, HASH_LEN};

/// Transaction payload used by every vector: field 4 (`bodyBytes`) = "abc".
pub const TX: &[u8] = b"\x22\x03abc";

/// Record at consensus time 1.000000002.
pub const RECORD_1: &[u8] = b"\x1a\x04\x08\x01\x10\x02";

/// Record at consensus time 2.
pub const RECORD_2: &[u8] = b"\x1a\x02\x08\x02";

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub format_version: i32,
    pub object_version: i32,
    /// Every byte of the declared previous hash.
    pub prev_hash_fill: u8,
    /// (transaction, record) payloads in file order.
    pub records: &'static [(&'static [u8], &'static [u8])],
    /// Trailing signature, if any. Never part of the hash.
    pub signature: Option<&'static [u8]>,
    /// Expected file hash (hex).
    pub expected_hash: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "v1 without records",
            format_version: 1,
            object_version: 1,
            prev_hash_fill: 0x00,
            records: &[],
            signature: None,
            expected_hash: "d5a7203554ebe96354242e72bcb516908b77ef6f30bbf5f417b288bb751fcdf415e3c7900cd325b51ae55da7d65abb4f",
        },
        GoldenVector {
            name: "v1 two records and a signature",
            format_version: 1,
            object_version: 1,
            prev_hash_fill: 0x11,
            records: &[(TX, RECORD_1), (TX, RECORD_2)],
            signature: Some(b"signature".as_slice()),
            expected_hash: "63a0abdec80ab7706e32d031eaccd6cab530f10f3895ddd98fa221bcbc6c22d564575749d1d981568638b99cabebe431",
        },
        GoldenVector {
            name: "v2 without records",
            format_version: 2,
            object_version: 1,
            prev_hash_fill: 0x00,
            records: &[],
            signature: None,
            expected_hash: "ab34e1f5ddabe0b928156e1a318ea2c4068d626cdd9c8c51fd620bf76c2fc4c596199bb31d6e2daeba80b23df3229db1",
        },
        GoldenVector {
            name: "v2 two records and a signature",
            format_version: 2,
            object_version: 1,
            prev_hash_fill: 0x22,
            records: &[(TX, RECORD_1), (TX, RECORD_2)],
            signature: Some(b"signature".as_slice()),
            expected_hash: "0639215147d5a6a9edc23c086a8d1b15fb7f7c26956cf1677a2397aa454aa608b442359a06c73682090591d7cb0d4b26",
        },
        GoldenVector {
            name: "v5 one record",
            format_version: 5,
            object_version: 2,
            prev_hash_fill: 0x33,
            records: &[(TX, RECORD_1)],
            signature: None,
            expected_hash: "3fb13739701a30d58b2de57d7d6a291ef1adebd252c0308e4c644694ef9b4b6670c886f9a17e7f8c2dce1b388892e46a",
        },
    ]
}

/// Build the record file a vector describes.
pub fn file_from_vector(vector: &GoldenVector) -> RecordFileBuilder {
    let prev = FileHash([vector.prev_hash_fill; HASH_LEN]);
    let builder = vector.records.iter().fold(
        RecordFileBuilder::new(vector.format_version, vector.object_version, prev),
        |b, (tx, rec)| b.record(*tx, *rec),
    );
    match vector.signature {
        Some(sig) => builder.signature(sig),
        None => builder,
    }
}

/// Check every vector against its expected hash.
///
/// Returns `(name, matches, computed_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hex = file_from_vector(v).file_hash().to_hex();
            let matches = hex == v.expected_hash;
            (v.name.to_string(), matches, hex)
        })
        .collect()
}

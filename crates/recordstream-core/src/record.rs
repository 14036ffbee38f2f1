//! Record file model: header, blocks, and decoded entries.
//!
//! A record file is a fixed header followed by tagged blocks:
//! - `TYPE_PREV_HASH`: the hash of the previous file (48 bytes)
//! - `TYPE_RECORD`: a serialized transaction and its record, each length-prefixed
//! - `TYPE_SIGNATURE`: the writer's signature over the file, never hashed

use bytes::Bytes;
use prost::Message;

use crate::error::CoreError;
use crate::types::{ConsensusTimestamp, FileHash};

/// Block tag: the previous file's hash follows.
pub const TYPE_PREV_HASH: u8 = 1;

/// Block tag: a transaction and its record follow.
pub const TYPE_RECORD: u8 = 2;

/// Block tag: the file signature follows.
pub const TYPE_SIGNATURE: u8 = 3;

/// First format version that hashes record content separately.
pub const SPLIT_DIGEST_VERSION: i32 = 2;

/// The two integers at the start of every record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Version of the record file layout.
    pub format_version: i32,
    /// Version of the protocol objects serialized inside.
    pub object_version: i32,
}

impl FileHeader {
    /// Size of the encoded header in bytes.
    pub const LEN: usize = 8;

    /// Whether record blocks feed the separate content digest.
    pub fn uses_split_digest(&self) -> bool {
        self.format_version >= SPLIT_DIGEST_VERSION
    }

    /// Big-endian encoding, exactly as it appears on disk.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..4].copy_from_slice(&self.format_version.to_be_bytes());
        out[4..].copy_from_slice(&self.object_version.to_be_bytes());
        out
    }
}

/// One decoded block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Hash the writer claims for the previous file.
    PrevHash(FileHash),
    /// A transaction and its execution record, both opaque.
    Record { transaction: Bytes, record: Bytes },
    /// Signature over the file.
    Signature(Bytes),
}

impl Block {
    /// The on-disk tag for this block.
    pub fn tag(&self) -> u8 {
        match self {
            Block::PrevHash(_) => TYPE_PREV_HASH,
            Block::Record { .. } => TYPE_RECORD,
            Block::Signature(_) => TYPE_SIGNATURE,
        }
    }
}

/// Protocol timestamp.
#[derive(Clone, PartialEq, Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// Minimal view of a signed transaction.
///
/// Only used to check that the payload is a well-formed message; unknown
/// fields are skipped.
#[derive(Clone, PartialEq, Message)]
pub struct Transaction {
    #[prost(bytes = "vec", tag = "4")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub signed_transaction_bytes: Vec<u8>,
}

/// Transaction record with the leading fields of the ledger schema.
///
/// `transaction_id` is a nested message kept as raw bytes. Later fields
/// (transfer lists, contract results) are skipped as unknown.
#[derive(Clone, PartialEq, Message)]
pub struct TransactionRecord {
    #[prost(bytes = "vec", tag = "1")]
    pub receipt: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub transaction_hash: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub consensus_timestamp: Option<Timestamp>,
    #[prost(bytes = "vec", tag = "4")]
    pub transaction_id: Vec<u8>,
    #[prost(string, tag = "5")]
    pub memo: String,
    #[prost(uint64, tag = "6")]
    pub transaction_fee: u64,
}

/// The only part of a transaction record ingestion reads.
#[derive(Clone, PartialEq, Message)]
struct ConsensusView {
    #[prost(message, optional, tag = "3")]
    consensus_timestamp: Option<Timestamp>,
}

/// One transaction and its outcome, ready to hand to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// 1-based position of the record within its file.
    pub sequence_number: u64,
    /// When the transaction reached consensus.
    pub consensus_timestamp: ConsensusTimestamp,
    /// Serialized transaction.
    pub transaction_bytes: Bytes,
    /// Serialized transaction record.
    pub record_bytes: Bytes,
}

impl RecordEntry {
    /// Build an entry from the two payloads of a record block.
    ///
    /// Both payloads must decode as protocol messages. Only the record's
    /// consensus timestamp is read; a record without one is placed at the
    /// epoch.
    pub fn parse(
        sequence_number: u64,
        transaction_bytes: Bytes,
        record_bytes: Bytes,
    ) -> Result<Self, CoreError> {
        Transaction::decode(transaction_bytes.as_ref()).map_err(|e| {
            CoreError::MalformedMessage {
                kind: "transaction",
                reason: e.to_string(),
            }
        })?;

        let record = ConsensusView::decode(record_bytes.as_ref()).map_err(|e| {
            CoreError::MalformedMessage {
                kind: "transaction record",
                reason: e.to_string(),
            }
        })?;

        let ts = record.consensus_timestamp.unwrap_or_default();

        Ok(Self {
            sequence_number,
            consensus_timestamp: ConsensusTimestamp::from_parts(ts.seconds, ts.nanos),
            transaction_bytes,
            record_bytes,
        })
    }
}

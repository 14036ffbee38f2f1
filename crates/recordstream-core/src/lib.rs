//! # Record Stream Core
//!
//! Pure primitives for ingesting ledger record files: the block decoder, the
//! file digest, and the hash-chain check.
//!
//! This crate does no file system or storage work. It operates on any
//! [`std::io::Read`] and leaves persistence to `recordstream-store`.
//!
//! ## Key Types
//!
//! - [`BlockDecoder`] - Lazy iterator over the blocks of one file
//! - [`FileDigest`] - Rolling SHA-384 with the version-dependent split
//! - [`FileHash`] - 48-byte file hash
//! - [`RecordEntry`] - One transaction and its record, ready for a sink
//! - [`ChainCheck`] - Outcome of a previous-hash comparison
//!
//! ## File Format
//!
//! Big-endian `int32 format_version`, `int32 object_version`, then tagged
//! blocks. See [`record`] for the tags and [`digest`] for how each era is
//! hashed.

pub mod chain;
pub mod decoder;
pub mod digest;
pub mod encode;
pub mod error;
pub mod record;
pub mod types;

pub use chain::{check_link, ChainCheck};
pub use decoder::{read_previous_hash, BlockDecoder};
pub use digest::FileDigest;
pub use encode::{encode_block, RecordFileBuilder};
pub use error::{CoreError, DecodeError};
pub use record::{
    Block, FileHeader, RecordEntry, Timestamp, Transaction, TransactionRecord,
    SPLIT_DIGEST_VERSION, TYPE_PREV_HASH, TYPE_RECORD, TYPE_SIGNATURE,
};
pub use types::{ConsensusTimestamp, FileHash, HASH_LEN};

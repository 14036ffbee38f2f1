//! Error types for the record stream core.

use thiserror::Error;

/// Errors raised while parsing identifiers and protocol payloads.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid hash length: expected 48 bytes, got {0}")]
    InvalidHashLength(usize),

    #[error("malformed {kind} message: {reason}")]
    MalformedMessage { kind: &'static str, reason: String },
}

/// Structural errors raised by the block decoder.
///
/// Any of these is fatal for the file being read.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("stream truncated while reading {context}")]
    Truncated { context: &'static str },

    #[error("negative length {length} in {context}")]
    NegativeLength { length: i32, context: &'static str },

    #[error("unknown block tag {0}")]
    UnknownTag(u8),

    #[error("expected previous-hash block first, found tag {0}")]
    MissingPrevHash(u8),

    #[error("file has no blocks after the header")]
    EmptyBody,

    #[error("previous-hash block repeated")]
    DuplicatePrevHash,

    #[error("record {seq}: {source}")]
    Record {
        seq: u64,
        #[source]
        source: CoreError,
    },

    #[error("record {seq}: consensus timestamp {current} precedes {previous}")]
    TimestampRegression { seq: u64, previous: i64, current: i64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Whether the error was caused by the stream ending early.
    pub fn is_truncation(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }
}

//! Writer-side encoding of record files.
//!
//! The inverse of [`decoder`](crate::decoder): produces the exact bytes a
//! ledger node writes. Used to build fixtures and golden vectors, and by
//! tooling that needs to re-emit a file.
//!
//! **CRITICAL**: The layout is fixed by the external writer. Any change here
//! breaks chain verification against historical files.

use std::io::{self, Write};

use bytes::Bytes;

use crate::digest::FileDigest;
use crate::record::{Block, FileHeader};
use crate::types::FileHash;

/// Append the on-disk encoding of one block to `buf`.
pub fn encode_block(buf: &mut Vec<u8>, block: &Block) {
    buf.push(block.tag());
    match block {
        Block::PrevHash(hash) => buf.extend_from_slice(hash.as_bytes()),
        Block::Record {
            transaction,
            record,
        } => {
            encode_payload(buf, transaction);
            encode_payload(buf, record);
        }
        Block::Signature(sig) => encode_payload(buf, sig),
    }
}

fn encode_payload(buf: &mut Vec<u8>, payload: &[u8]) {
    buf.extend_from_slice(&(payload.len() as i32).to_be_bytes());
    buf.extend_from_slice(payload);
}

/// Builds a well-formed record file block by block.
#[derive(Debug, Clone)]
pub struct RecordFileBuilder {
    header: FileHeader,
    blocks: Vec<Block>,
}

impl RecordFileBuilder {
    /// Start a file that declares `prev_hash` as its predecessor.
    pub fn new(format_version: i32, object_version: i32, prev_hash: FileHash) -> Self {
        Self {
            header: FileHeader {
                format_version,
                object_version,
            },
            blocks: vec![Block::PrevHash(prev_hash)],
        }
    }

    /// Append a record block.
    pub fn record(mut self, transaction: impl Into<Bytes>, record: impl Into<Bytes>) -> Self {
        self.blocks.push(Block::Record {
            transaction: transaction.into(),
            record: record.into(),
        });
        self
    }

    /// Append a signature block.
    pub fn signature(mut self, signature: impl Into<Bytes>) -> Self {
        self.blocks.push(Block::Signature(signature.into()));
        self
    }

    /// The header this file will carry.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Blocks in file order, starting with the previous-hash block.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The hash a reader will compute for this file.
    pub fn file_hash(&self) -> FileHash {
        let mut digest = FileDigest::new(&self.header);
        for block in &self.blocks {
            digest.absorb(block);
        }
        digest.finalize()
    }

    /// Encode the whole file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FileHeader::LEN + 64);
        buf.extend_from_slice(&self.header.to_bytes());
        for block in &self.blocks {
            encode_block(&mut buf, block);
        }
        buf
    }

    /// Write the encoded file to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::BlockDecoder;
    use crate::record::{TYPE_PREV_HASH, TYPE_RECORD, TYPE_SIGNATURE};

    #[test]
    fn test_encode_layout() {
        let bytes = RecordFileBuilder::new(2, 3, FileHash::ZERO)
            .record(b"ab".to_vec(), b"c".to_vec())
            .signature(b"s".to_vec())
            .to_bytes();

        let mut expected = vec![0, 0, 0, 2, 0, 0, 0, 3, TYPE_PREV_HASH];
        expected.extend_from_slice(&[0u8; 48]);
        expected.extend_from_slice(&[TYPE_RECORD, 0, 0, 0, 2, b'a', b'b', 0, 0, 0, 1, b'c']);
        expected.extend_from_slice(&[TYPE_SIGNATURE, 0, 0, 0, 1, b's']);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_builder_hash_matches_decoded_hash() {
        let builder = RecordFileBuilder::new(2, 3, FileHash::from_bytes([3; 48]))
            .record(b"tx".to_vec(), b"rec".to_vec())
            .signature(vec![1; 16]);
        let bytes = builder.to_bytes();

        let mut decoder = BlockDecoder::new(bytes.as_slice()).unwrap();
        let mut digest = FileDigest::new(decoder.header());
        for block in decoder.by_ref() {
            digest.absorb(&block.unwrap());
        }
        assert_eq!(digest.finalize(), builder.file_hash());
    }
}

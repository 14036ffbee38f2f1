//! Pull-based decoder for record file blocks.
//!
//! [`BlockDecoder`] reads the header eagerly, then yields one [`Block`] per
//! call to `next()`. It never seeks and holds at most one block's payload.
//! The stream ends cleanly only at a block boundary; a length-prefixed read
//! that runs past the end is a truncation error.
//!
//! Hashing is left to the caller, who feeds each yielded block to a
//! [`FileDigest`](crate::digest::FileDigest).

use std::io::{self, Read};

use bytes::Bytes;

use crate::error::DecodeError;
use crate::record::{Block, FileHeader, TYPE_PREV_HASH, TYPE_RECORD, TYPE_SIGNATURE};
use crate::types::{FileHash, HASH_LEN};

/// Largest buffer reserved up front for a payload.
///
/// Larger payloads grow as bytes arrive, so a corrupt length prefix cannot
/// force a huge allocation before the truncation is noticed.
const PREALLOC_LIMIT: usize = 64 * 1024;

/// Lazy, single-pass iterator over the blocks of one record file.
///
/// Enforces the block order the writer guarantees: a previous-hash block
/// comes first and appears exactly once. After the first error the decoder
/// is fused.
pub struct BlockDecoder<R> {
    reader: R,
    header: FileHeader,
    offset: u64,
    seen_prev_hash: bool,
    done: bool,
}

impl<R: Read> BlockDecoder<R> {
    /// Read the file header and prepare to decode blocks.
    pub fn new(mut reader: R) -> Result<Self, DecodeError> {
        let mut buf = [0u8; FileHeader::LEN];
        read_exact(&mut reader, &mut buf, "file header")?;

        let header = FileHeader {
            format_version: i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            object_version: i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        };

        Ok(Self {
            reader,
            header,
            offset: FileHeader::LEN as u64,
            seen_prev_hash: false,
            done: false,
        })
    }

    /// The header read from the start of the stream.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn next_block(&mut self) -> Result<Option<Block>, DecodeError> {
        let tag = match self.read_tag()? {
            Some(tag) => tag,
            None if self.seen_prev_hash => return Ok(None),
            None => return Err(DecodeError::EmptyBody),
        };

        if !matches!(tag, TYPE_PREV_HASH | TYPE_RECORD | TYPE_SIGNATURE) {
            return Err(DecodeError::UnknownTag(tag));
        }
        if !self.seen_prev_hash && tag != TYPE_PREV_HASH {
            return Err(DecodeError::MissingPrevHash(tag));
        }

        let block = match tag {
            TYPE_PREV_HASH => {
                if self.seen_prev_hash {
                    return Err(DecodeError::DuplicatePrevHash);
                }
                let mut hash = [0u8; HASH_LEN];
                self.read_exact(&mut hash, "previous hash")?;
                self.seen_prev_hash = true;
                Block::PrevHash(FileHash(hash))
            }
            TYPE_RECORD => {
                let transaction = self.read_payload("transaction")?;
                let record = self.read_payload("transaction record")?;
                Block::Record {
                    transaction,
                    record,
                }
            }
            _ => Block::Signature(self.read_payload("signature")?),
        };

        Ok(Some(block))
    }

    /// Read one tag byte, or `None` at a clean end of stream.
    fn read_tag(&mut self) -> Result<Option<u8>, DecodeError> {
        let mut tag = [0u8; 1];
        loop {
            match self.reader.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(tag[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecodeError::Io(e)),
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8], context: &'static str) -> Result<(), DecodeError> {
        read_exact(&mut self.reader, buf, context)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Read an `int32` length followed by that many bytes.
    fn read_payload(&mut self, context: &'static str) -> Result<Bytes, DecodeError> {
        let mut len_buf = [0u8; 4];
        self.read_exact(&mut len_buf, context)?;
        let length = i32::from_be_bytes(len_buf);
        if length < 0 {
            return Err(DecodeError::NegativeLength { length, context });
        }

        let len = length as usize;
        let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        self.offset += buf.len() as u64;
        if buf.len() != len {
            return Err(DecodeError::Truncated { context });
        }

        Ok(Bytes::from(buf))
    }
}

impl<R: Read> Iterator for BlockDecoder<R> {
    type Item = Result<Block, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read only as far as the previous-hash block and return the hash it declares.
pub fn read_previous_hash<R: Read>(reader: R) -> Result<FileHash, DecodeError> {
    let mut decoder = BlockDecoder::new(reader)?;
    match decoder.next() {
        Some(Ok(Block::PrevHash(hash))) => Ok(hash),
        Some(Ok(block)) => Err(DecodeError::MissingPrevHash(block.tag())),
        Some(Err(e)) => Err(e),
        None => Err(DecodeError::EmptyBody),
    }
}

fn read_exact<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    context: &'static str,
) -> Result<(), DecodeError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated { context }
        } else {
            DecodeError::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::RecordFileBuilder;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn v2() -> RecordFileBuilder {
        RecordFileBuilder::new(2, 3, FileHash::ZERO)
    }

    fn decode_all(bytes: &[u8]) -> Result<Vec<Block>, DecodeError> {
        BlockDecoder::new(Cursor::new(bytes))?.collect()
    }

    #[test]
    fn test_decodes_blocks_in_order() {
        let bytes = v2()
            .record(b"tx1".to_vec(), b"rec1".to_vec())
            .record(b"tx2".to_vec(), b"rec2".to_vec())
            .signature(vec![0xee; 8])
            .to_bytes();

        let mut decoder = BlockDecoder::new(Cursor::new(&bytes)).unwrap();
        assert_eq!(
            *decoder.header(),
            FileHeader {
                format_version: 2,
                object_version: 3
            }
        );

        let blocks: Vec<Block> = decoder.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], Block::PrevHash(FileHash::ZERO));
        assert_eq!(
            blocks[1],
            Block::Record {
                transaction: Bytes::from_static(b"tx1"),
                record: Bytes::from_static(b"rec1"),
            }
        );
        assert_eq!(blocks[3], Block::Signature(Bytes::from(vec![0xee; 8])));
        assert_eq!(decoder.offset(), bytes.len() as u64);
    }

    #[test]
    fn test_header_only_is_empty_body() {
        let bytes = [0, 0, 0, 2, 0, 0, 0, 3];
        let err = decode_all(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyBody));
    }

    #[test]
    fn test_short_header_is_truncation() {
        let err = BlockDecoder::new(Cursor::new(&[0u8, 0, 0][..]))
            .err()
            .unwrap();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_unknown_tag() {
        let mut bytes = v2().to_bytes();
        bytes.push(9);
        let err = decode_all(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTag(9)));
    }

    #[test]
    fn test_record_before_prev_hash() {
        let mut bytes = vec![0, 0, 0, 2, 0, 0, 0, 3, TYPE_RECORD];
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
        let err = decode_all(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::MissingPrevHash(TYPE_RECORD)));
    }

    #[test]
    fn test_duplicate_prev_hash() {
        let mut bytes = v2().to_bytes();
        bytes.push(TYPE_PREV_HASH);
        bytes.extend_from_slice(&[0u8; HASH_LEN]);
        let err = decode_all(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicatePrevHash));
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = v2()
            .record(b"transaction".to_vec(), b"record".to_vec())
            .to_bytes();
        let cut = &bytes[..bytes.len() - 2];
        let err = decode_all(cut).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                context: "transaction record"
            }
        ));
    }

    #[test]
    fn test_truncated_prev_hash() {
        let bytes = v2().to_bytes();
        let err = decode_all(&bytes[..20]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                context: "previous hash"
            }
        ));
    }

    #[test]
    fn test_negative_length() {
        let mut bytes = v2().to_bytes();
        bytes.push(TYPE_SIGNATURE);
        bytes.extend_from_slice(&(-5i32).to_be_bytes());
        let err = decode_all(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::NegativeLength { length: -5, .. }));
    }

    #[test]
    fn test_huge_length_does_not_allocate() {
        let mut bytes = v2().to_bytes();
        bytes.push(TYPE_SIGNATURE);
        bytes.extend_from_slice(&i32::MAX.to_be_bytes());
        bytes.extend_from_slice(b"short");
        let err = decode_all(&bytes).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_fused_after_error() {
        let mut bytes = v2().to_bytes();
        bytes.push(42);
        let mut decoder = BlockDecoder::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(decoder.next(), Some(Ok(Block::PrevHash(_)))));
        assert!(matches!(decoder.next(), Some(Err(_))));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_read_previous_hash() {
        let prev = FileHash::from_bytes([0x5a; HASH_LEN]);
        let bytes = RecordFileBuilder::new(2, 3, prev)
            .record(b"t".to_vec(), b"r".to_vec())
            .to_bytes();
        assert_eq!(read_previous_hash(Cursor::new(bytes)).unwrap(), prev);
    }

    proptest! {
        #[test]
        fn test_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut count = 0usize;
            if let Ok(decoder) = BlockDecoder::new(Cursor::new(&bytes)) {
                for result in decoder {
                    count += 1;
                    if result.is_err() {
                        break;
                    }
                }
            }
            // Every block consumes at least one byte.
            prop_assert!(count <= bytes.len());
        }
    }
}

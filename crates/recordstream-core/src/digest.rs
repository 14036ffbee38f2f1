//! Rolling SHA-384 digest over a record file.
//!
//! The file hash is computed over the exact bytes read, but which context
//! receives them depends on the format version:
//!
//! - Before version 2, one context sees the header and every non-signature
//!   block, and its digest is the file hash.
//! - From version 2 on, record blocks go to a separate content context. At the
//!   end the content digest is fed into the primary context, which is then
//!   finalized: `H(header || prev-hash block || H(record blocks))`.
//!
//! Signature blocks are never hashed in either era.

use sha2::{Digest, Sha384};

use crate::record::{Block, FileHeader, TYPE_PREV_HASH, TYPE_RECORD};
use crate::types::{FileHash, HASH_LEN};

/// Accumulates the hash of one record file.
///
/// Feed the header at construction and each block with [`absorb`] in the
/// order they were read; then call [`finalize`].
///
/// [`absorb`]: FileDigest::absorb
/// [`finalize`]: FileDigest::finalize
#[derive(Clone)]
pub struct FileDigest {
    split: bool,
    primary: Sha384,
    content: Sha384,
}

impl FileDigest {
    /// Start a digest for a file with the given header.
    pub fn new(header: &FileHeader) -> Self {
        let mut primary = Sha384::new();
        primary.update(header.to_bytes());
        Self {
            split: header.uses_split_digest(),
            primary,
            content: Sha384::new(),
        }
    }

    /// Feed one decoded block.
    pub fn absorb(&mut self, block: &Block) {
        match block {
            Block::PrevHash(hash) => {
                self.primary.update([TYPE_PREV_HASH]);
                self.primary.update(hash.as_bytes());
            }
            Block::Record {
                transaction,
                record,
            } => {
                let ctx = if self.split {
                    &mut self.content
                } else {
                    &mut self.primary
                };
                ctx.update([TYPE_RECORD]);
                ctx.update(length_prefix(transaction.len()));
                ctx.update(transaction);
                ctx.update(length_prefix(record.len()));
                ctx.update(record);
            }
            Block::Signature(_) => {}
        }
    }

    /// Consume the digest and produce the file hash.
    pub fn finalize(self) -> FileHash {
        let mut primary = self.primary;
        if self.split {
            primary.update(self.content.finalize());
        }
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&primary.finalize());
        FileHash(out)
    }
}

// Lengths were read as non-negative i32, so the cast is lossless.
fn length_prefix(len: usize) -> [u8; 4] {
    (len as u32).to_be_bytes()
}

//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use recordstream_core::{FileHash, RecordFileBuilder, HASH_LEN};

use crate::fixtures::record_pair;

/// Generate a random FileHash.
pub fn file_hash() -> impl Strategy<Value = FileHash> {
    prop::collection::vec(any::<u8>(), HASH_LEN).prop_map(|bytes| {
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(&bytes);
        FileHash(hash)
    })
}

/// Generate a format version from either digest era.
pub fn format_version() -> impl Strategy<Value = i32> {
    prop_oneof![Just(1), Just(2), 3i32..=6]
}

/// Generate opaque payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// One block after the previous-hash block.
#[derive(Debug, Clone)]
pub enum BodyBlock {
    Record { transaction: Vec<u8>, record: Vec<u8> },
    Signature(Vec<u8>),
}

fn body_block() -> impl Strategy<Value = BodyBlock> {
    prop_oneof![
        4 => (payload(64), payload(64)).prop_map(|(transaction, record)| BodyBlock::Record {
            transaction,
            record,
        }),
        1 => payload(32).prop_map(BodyBlock::Signature),
    ]
}

/// Parameters for generating a record file with opaque payloads.
#[derive(Debug, Clone)]
pub struct RecordFileParams {
    pub format_version: i32,
    pub object_version: i32,
    pub prev_hash: FileHash,
    pub body: Vec<BodyBlock>,
}

impl Arbitrary for RecordFileParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            format_version(),
            0i32..=4,
            file_hash(),
            prop::collection::vec(body_block(), 0..12),
        )
            .prop_map(
                |(format_version, object_version, prev_hash, body)| RecordFileParams {
                    format_version,
                    object_version,
                    prev_hash,
                    body,
                },
            )
            .boxed()
    }
}

/// Build a record file from parameters.
pub fn record_file_from_params(params: &RecordFileParams) -> RecordFileBuilder {
    params.body.iter().fold(
        RecordFileBuilder::new(
            params.format_version,
            params.object_version,
            params.prev_hash,
        ),
        |builder, block| match block {
            BodyBlock::Record {
                transaction,
                record,
            } => builder.record(Bytes::from(transaction.clone()), Bytes::from(record.clone())),
            BodyBlock::Signature(sig) => builder.signature(Bytes::from(sig.clone())),
        },
    )
}

/// Consensus seconds for an ingestible file: non-decreasing.
pub fn consensus_seconds(max_records: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..1_000, 0..=max_records).prop_map(|steps| {
        let mut second = crate::fixtures::BASE_CONSENSUS_SECONDS;
        steps
            .into_iter()
            .map(|step| {
                second += step;
                second
            })
            .collect()
    })
}

/// An ingestible record file whose records carry the given consensus seconds.
pub fn ingestible_file(format_version: i32, prev_hash: FileHash, seconds: &[i64]) -> RecordFileBuilder {
    seconds
        .iter()
        .fold(RecordFileBuilder::new(format_version, 1, prev_hash), |b, s| {
            let (tx, rec) = record_pair(*s, 0);
            b.record(tx, rec)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordstream_core::{encode_block, Block, BlockDecoder, DecodeError, FileDigest};
    use sha2::{Digest, Sha384};

    fn decode_hash(bytes: &[u8]) -> Result<(Vec<Block>, FileHash), DecodeError> {
        let mut decoder = BlockDecoder::new(bytes)?;
        let mut digest = FileDigest::new(decoder.header());
        let mut blocks = Vec::new();
        for block in &mut decoder {
            let block = block?;
            digest.absorb(&block);
            blocks.push(block);
        }
        Ok((blocks, digest.finalize()))
    }

    fn sha384(bytes: &[u8]) -> [u8; HASH_LEN] {
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&Sha384::digest(bytes));
        out
    }

    proptest! {
        #[test]
        fn test_decoded_hash_matches_writer_hash(params: RecordFileParams) {
            let file = record_file_from_params(&params);
            let (blocks, hash) = decode_hash(&file.to_bytes()).unwrap();

            prop_assert_eq!(blocks.as_slice(), file.blocks());
            prop_assert_eq!(hash, file.file_hash());
        }

        #[test]
        fn test_digest_follows_version_era(params: RecordFileParams) {
            let file = record_file_from_params(&params);
            let header = file.header().to_bytes();

            let mut prev_block = Vec::new();
            encode_block(&mut prev_block, &Block::PrevHash(params.prev_hash));

            let mut records = Vec::new();
            for block in file.blocks() {
                if let Block::Record { .. } = block {
                    encode_block(&mut records, block);
                }
            }

            let mut preimage = header.to_vec();
            preimage.extend_from_slice(&prev_block);
            if params.format_version >= 2 {
                preimage.extend_from_slice(&sha384(&records));
            } else {
                preimage.extend_from_slice(&records);
            }

            prop_assert_eq!(file.file_hash(), FileHash(sha384(&preimage)));
        }

        #[test]
        fn test_signatures_never_affect_hash(params: RecordFileParams, extra in payload(64)) {
            let file = record_file_from_params(&params);
            let signed = file.clone().signature(extra);
            prop_assert_eq!(file.file_hash(), signed.file_hash());
        }

        #[test]
        fn test_prefix_decodes_or_reports_truncation(params: RecordFileParams, cut in any::<prop::sample::Index>()) {
            let file = record_file_from_params(&params);
            let bytes = file.to_bytes();
            let cut = cut.index(bytes.len());

            match decode_hash(&bytes[..cut]) {
                Ok((blocks, _)) => {
                    prop_assert!(file.blocks().starts_with(&blocks));
                }
                Err(e) => {
                    prop_assert!(
                        e.is_truncation() || matches!(e, DecodeError::EmptyBody),
                        "unexpected error {:?}", e
                    );
                }
            }
        }

        #[test]
        fn test_ingestible_entries_parse(seconds in consensus_seconds(8), prev in file_hash()) {
            let file = ingestible_file(2, prev, &seconds);
            let mut seq = 0;
            for block in file.blocks() {
                if let Block::Record { transaction, record } = block {
                    seq += 1;
                    let entry = recordstream_core::RecordEntry::parse(
                        seq, transaction.clone(), record.clone(),
                    ).unwrap();
                    prop_assert_eq!(entry.consensus_timestamp.seconds(), seconds[seq as usize - 1]);
                }
            }
        }
    }
}

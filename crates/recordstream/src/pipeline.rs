//! Per-file ingestion: decode, verify the chain, hand records to the sink,
//! commit, advance the cursor.
//!
//! The [`Ingester`] owns no chain state of its own. Everything that carries
//! from one file to the next lives in an [`IngestionContext`] the caller
//! threads through, seeded from the [`CursorStore`] at the start of a batch.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use recordstream_core::{
    check_link, read_previous_hash, Block, BlockDecoder, ChainCheck, ConsensusTimestamp,
    DecodeError, FileDigest, FileHash, RecordEntry,
};
use recordstream_store::{CursorStore, InitOutcome, RecordSink, StoreError};
use tracing::{debug, error, info, trace, warn};

use crate::error::{IngestError, Result};

/// Subdirectory committed files are moved to when no archive directory is
/// configured.
pub const DEFAULT_ARCHIVE_SUBDIR: &str = "parsedRecordFiles";

/// Chain state carried from file to file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionContext {
    /// Hash of the last committed file, if known.
    pub last_hash: Option<FileHash>,
    /// Consensus timestamp of the last committed record in this run.
    pub last_timestamp: Option<ConsensusTimestamp>,
    /// Last file name for which a chain mismatch is tolerated.
    pub bypass_until: Option<String>,
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was stored and the cursor now points at it.
    Committed {
        file_hash: FileHash,
        prev_hash: FileHash,
        records: u64,
        chain: ChainCheck,
    },
    /// The sink already had this file; it was not read again.
    AlreadyProcessed { file_hash: Option<FileHash> },
}

/// Result of reading a file up to its commit.
struct Loaded {
    file_hash: FileHash,
    prev_hash: FileHash,
    records: u64,
    chain: ChainCheck,
    format_version: i32,
    last_timestamp: Option<ConsensusTimestamp>,
}

/// Drives one record file at a time into a sink.
pub struct Ingester<S, C> {
    sink: S,
    cursor: C,
    archive_dir: Option<PathBuf>,
}

impl<S: RecordSink, C: CursorStore> Ingester<S, C> {
    /// Create an ingester that archives next to the input files.
    pub fn new(sink: S, cursor: C) -> Self {
        Self {
            sink,
            cursor,
            archive_dir: None,
        }
    }

    /// Move committed files to `dir` instead of the default subdirectory.
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    /// Get the sink reference.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Get the cursor store reference.
    pub fn cursor(&self) -> &C {
        &self.cursor
    }

    /// Read the persisted cursor and bypass boundary.
    pub fn load_context(&self) -> std::result::Result<IngestionContext, StoreError> {
        let last_hash = self.cursor.last_processed_hash()?;
        let bypass_until = self.cursor.bypass_boundary()?;
        debug!(
            last_hash = ?last_hash,
            bypass_until = bypass_until.as_deref().unwrap_or("-"),
            "loaded ingestion cursor"
        );
        Ok(IngestionContext {
            last_hash,
            last_timestamp: None,
            bypass_until,
        })
    }

    /// Ingest one file.
    ///
    /// On success `ctx` points at this file. On error `ctx` is unchanged and
    /// the file stays where it is. Errors before the commit roll the sink
    /// back; a [`IngestError::Cursor`] error means the commit went through.
    pub fn ingest_file(&self, ctx: &mut IngestionContext, path: &Path) -> Result<FileOutcome> {
        let name = file_name(path);

        let file = File::open(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                warn!(file = %name, "record file does not exist");
                IngestError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                IngestError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let started = Instant::now();
        match self.sink.init_file(&name).map_err(|source| IngestError::Sink {
            path: path.to_path_buf(),
            source,
        })? {
            InitOutcome::Proceed => {}
            InitOutcome::AlreadyProcessed { file_hash } => {
                drop(file);
                return self.resume_processed(ctx, path, &name, file_hash);
            }
        }

        let loaded = match self.load(ctx, path, &name, file) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(file = %name, error = %e, elapsed = ?started.elapsed(), "error parsing record file");
                if let Err(rollback_err) = self.sink.rollback() {
                    error!(file = %name, error = %rollback_err, "rollback failed");
                }
                return Err(e);
            }
        };

        self.cursor
            .set_last_processed_hash(&loaded.file_hash)
            .map_err(|source| IngestError::Cursor {
                path: path.to_path_buf(),
                source,
            })?;

        ctx.last_hash = Some(loaded.file_hash);
        if loaded.last_timestamp.is_some() {
            ctx.last_timestamp = loaded.last_timestamp;
        }

        info!(
            file = %name,
            records = loaded.records,
            format_version = loaded.format_version,
            elapsed = ?started.elapsed(),
            "finished parsing record file"
        );
        trace!(file = %name, hash = %loaded.file_hash, "calculated file hash");

        self.archive(path, &name);

        Ok(FileOutcome::Committed {
            file_hash: loaded.file_hash,
            prev_hash: loaded.prev_hash,
            records: loaded.records,
            chain: loaded.chain,
        })
    }

    /// Catch the cursor up to a file the sink committed in an earlier run.
    fn resume_processed(
        &self,
        ctx: &mut IngestionContext,
        path: &Path,
        name: &str,
        file_hash: Option<FileHash>,
    ) -> Result<FileOutcome> {
        info!(file = %name, "record file already processed, skipping");

        if let Some(hash) = file_hash {
            if ctx.last_hash != Some(hash) {
                self.cursor
                    .set_last_processed_hash(&hash)
                    .map_err(|source| IngestError::Cursor {
                        path: path.to_path_buf(),
                        source,
                    })?;
                debug!(file = %name, hash = %hash, "cursor repaired from sink");
            }
            ctx.last_hash = Some(hash);
        }

        self.archive(path, name);
        Ok(FileOutcome::AlreadyProcessed { file_hash })
    }

    /// Everything between `init_file` and a successful `complete_file`.
    fn load(
        &self,
        ctx: &IngestionContext,
        path: &Path,
        name: &str,
        file: File,
    ) -> Result<Loaded> {
        let decode_err = |source: DecodeError| IngestError::Decode {
            path: path.to_path_buf(),
            source,
        };
        let sink_err = |source: StoreError| IngestError::Sink {
            path: path.to_path_buf(),
            source,
        };

        let decoder = BlockDecoder::new(BufReader::new(file)).map_err(decode_err)?;
        let header = *decoder.header();
        info!(
            file = %name,
            format_version = header.format_version,
            object_version = header.object_version,
            "loading record file"
        );

        let mut digest = FileDigest::new(&header);
        let mut prev_hash = None;
        let mut chain = ChainCheck::Adopted;
        let mut records = 0u64;
        let mut last_timestamp = ctx.last_timestamp;

        for block in decoder {
            let block = block.map_err(decode_err)?;
            digest.absorb(&block);

            match block {
                Block::PrevHash(declared) => {
                    chain = self.verify_link(ctx, path, name, &declared)?;
                    prev_hash = Some(declared);
                }
                Block::Record {
                    transaction,
                    record,
                } => {
                    let seq = records + 1;
                    let entry = RecordEntry::parse(seq, transaction, record)
                        .map_err(|source| decode_err(DecodeError::Record { seq, source }))?;

                    if let Some(previous) = last_timestamp {
                        if entry.consensus_timestamp < previous {
                            return Err(decode_err(DecodeError::TimestampRegression {
                                seq,
                                previous: previous.as_nanos(),
                                current: entry.consensus_timestamp.as_nanos(),
                            }));
                        }
                    }

                    self.sink.store_record(&entry).map_err(sink_err)?;
                    debug!(
                        file = %name,
                        seq,
                        consensus_timestamp = %entry.consensus_timestamp,
                        "stored transaction"
                    );
                    last_timestamp = Some(entry.consensus_timestamp);
                    records = seq;
                }
                Block::Signature(signature) => {
                    let signature_hex = hex::encode(&signature);
                    trace!(file = %name, signature = %signature_hex, "file signature");
                    self.sink.store_signature(&signature_hex).map_err(sink_err)?;
                }
            }
        }

        let prev_hash = prev_hash.ok_or_else(|| decode_err(DecodeError::EmptyBody))?;
        let file_hash = digest.finalize();
        self.sink
            .complete_file(&file_hash, &prev_hash)
            .map_err(sink_err)?;

        Ok(Loaded {
            file_hash,
            prev_hash,
            records,
            chain,
            format_version: header.format_version,
            last_timestamp,
        })
    }

    fn verify_link(
        &self,
        ctx: &IngestionContext,
        path: &Path,
        name: &str,
        declared: &FileHash,
    ) -> Result<ChainCheck> {
        let check = check_link(
            ctx.last_hash.as_ref(),
            declared,
            name,
            ctx.bypass_until.as_deref(),
        );

        match check {
            ChainCheck::Linked => {
                trace!(file = %name, previous = %declared, "previous file hash matches");
            }
            ChainCheck::Adopted => {
                info!(file = %name, previous = %declared, "no previous file hash recorded, adopting declared hash");
            }
            ChainCheck::Bypassed { expected } => {
                warn!(
                    file = %name,
                    expected = %expected,
                    declared = %declared,
                    "hash mismatch inside bypass window, continuing"
                );
            }
            ChainCheck::Broken { expected } => {
                error!(
                    file = %name,
                    expected = %expected,
                    declared = %declared,
                    "hash mismatch"
                );
                return Err(IngestError::ChainMismatch {
                    path: path.to_path_buf(),
                    expected,
                    declared: *declared,
                });
            }
        }

        Ok(check)
    }

    /// Move a committed file out of the input directory. Best effort.
    fn archive(&self, path: &Path, name: &str) {
        let dir = match &self.archive_dir {
            Some(dir) => dir.clone(),
            None => path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_ARCHIVE_SUBDIR),
        };

        let target = dir.join(name);
        let moved = fs::create_dir_all(&dir).and_then(|_| fs::rename(path, &target));
        match moved {
            Ok(()) => debug!(file = %name, to = %target.display(), "archived record file"),
            Err(e) => warn!(file = %name, error = %e, "failed to archive record file"),
        }
    }
}

/// Read the previous hash a file declares, without ingesting it.
pub fn read_previous_hash_at(path: &Path) -> Result<FileHash> {
    let file = File::open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            IngestError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            IngestError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let hash = read_previous_hash(BufReader::new(file)).map_err(|source| IngestError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    trace!(file = %path.display(), previous = %hash, "read previous file hash");
    Ok(hash)
}

/// File name used as the sink key and the bypass ordering key.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

//! Directory scanning and the outer ingestion loop.
//!
//! A batch lists the `*.rcd` files of one directory in name order and hands
//! them to the [`Ingester`] until the list is exhausted, a file fails, or a
//! stop is requested. The first failure ends the batch; later files wait
//! for the next cycle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use recordstream_store::{CursorStore, RecordSink};
use tracing::{debug, error, info, trace};

use crate::error::IngestError;
use crate::pipeline::{FileOutcome, Ingester};

/// File name suffix of record files.
pub const RECORD_FILE_SUFFIX: &str = ".rcd";

/// Longest single sleep while idling, so stop requests are noticed quickly.
const IDLE_SLICE: Duration = Duration::from_millis(100);

/// Source of directories to scan.
pub trait DirectoryResolver: Send + Sync {
    /// Next directory to scan, or `None` if there is nothing to do yet.
    fn next_directory(&self) -> Option<PathBuf>;
}

/// Always scans the same directory.
#[derive(Debug, Clone)]
pub struct FixedDirectory(PathBuf);

impl FixedDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self(dir.into())
    }
}

impl DirectoryResolver for FixedDirectory {
    fn next_directory(&self) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// Polled at file boundaries to decide whether to stop.
pub trait CancellationSignal: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl CancellationSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: CancellationSignal + ?Sized> CancellationSignal for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// Stops when a sentinel file exists or an interrupt was received.
#[derive(Debug, Clone)]
pub struct StopSignal {
    stop_file: PathBuf,
    interrupted: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new(stop_file: impl Into<PathBuf>) -> Self {
        Self {
            stop_file: stop_file.into(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request a stop, e.g. from a signal handler.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

impl CancellationSignal for StopSignal {
    fn is_cancelled(&self) -> bool {
        if self.interrupted.load(Ordering::SeqCst) {
            return true;
        }
        if self.stop_file.exists() {
            info!(stop_file = %self.stop_file.display(), "stop file found, stopping");
            return true;
        }
        false
    }
}

/// Why a batch ended.
#[derive(Debug)]
pub enum BatchStop {
    /// Every listed file was handled.
    Exhausted,
    /// A stop was requested between files.
    Cancelled,
    /// A file failed; the rest of the batch was not attempted.
    Halted(IngestError),
}

/// Summary of one batch.
#[derive(Debug)]
pub struct BatchReport {
    /// Files read and committed in this batch.
    pub committed: usize,
    /// Files the sink already had.
    pub skipped: usize,
    pub stop: BatchStop,
}

impl BatchReport {
    fn new() -> Self {
        Self {
            committed: 0,
            skipped: 0,
            stop: BatchStop::Exhausted,
        }
    }

    fn halted(error: IngestError) -> Self {
        Self {
            stop: BatchStop::Halted(error),
            ..Self::new()
        }
    }

    /// The error that ended the batch, if any.
    pub fn error(&self) -> Option<&IngestError> {
        match &self.stop {
            BatchStop::Halted(e) => Some(e),
            _ => None,
        }
    }
}

/// Totals over a whole [`Scanner::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub committed: usize,
    pub skipped: usize,
    pub halts: u64,
}

/// List record files directly inside `dir`, sorted by name.
pub fn list_record_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_string_lossy()
            .ends_with(RECORD_FILE_SUFFIX)
        {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Runs batches over directories until cancelled.
pub struct Scanner<S, C> {
    ingester: Ingester<S, C>,
    poll_interval: Duration,
}

impl<S: RecordSink, C: CursorStore> Scanner<S, C> {
    pub fn new(ingester: Ingester<S, C>, poll_interval: Duration) -> Self {
        Self {
            ingester,
            poll_interval,
        }
    }

    /// Get the ingester reference.
    pub fn ingester(&self) -> &Ingester<S, C> {
        &self.ingester
    }

    /// Ingest every record file in `dir`, in name order.
    ///
    /// `finish` is called on the sink whenever `start` succeeded.
    pub fn ingest_directory(&self, dir: &Path, cancel: &dyn CancellationSignal) -> BatchReport {
        debug!(dir = %dir.display(), "parsing record files");

        if let Err(source) = self.ingester.sink().start() {
            error!(error = %source, "failed to start sink");
            return BatchReport::halted(IngestError::Sink {
                path: dir.to_path_buf(),
                source,
            });
        }

        let mut report = self.scan(dir, cancel);

        if let Err(source) = self.ingester.sink().finish() {
            error!(error = %source, "failed to finish sink batch");
            if report.error().is_none() {
                report.stop = BatchStop::Halted(IngestError::Sink {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        }
        report
    }

    fn scan(&self, dir: &Path, cancel: &dyn CancellationSignal) -> BatchReport {
        let mut report = BatchReport::new();

        if !dir.exists() {
            info!(dir = %dir.display(), "creating input directory");
            if let Err(source) = fs::create_dir_all(dir) {
                return BatchReport::halted(IngestError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        }
        if !dir.is_dir() {
            error!(dir = %dir.display(), "input path is not a directory");
            return report;
        }

        let files = match list_record_files(dir) {
            Ok(files) => files,
            Err(source) => {
                return BatchReport::halted(IngestError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };
        if files.is_empty() {
            debug!("no files to parse");
            return report;
        }
        trace!(count = files.len(), "processing record files");

        let mut ctx = match self.ingester.load_context() {
            Ok(ctx) => ctx,
            Err(source) => {
                error!(error = %source, "failed to read ingestion cursor");
                return BatchReport::halted(IngestError::Cursor {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        for path in files {
            if cancel.is_cancelled() {
                info!(
                    committed = report.committed,
                    skipped = report.skipped,
                    "stop requested, ending batch"
                );
                report.stop = BatchStop::Cancelled;
                return report;
            }

            match self.ingester.ingest_file(&mut ctx, &path) {
                Ok(FileOutcome::Committed { .. }) => report.committed += 1,
                Ok(FileOutcome::AlreadyProcessed { .. }) => report.skipped += 1,
                Err(e) => {
                    error!(file = %path.display(), error = %e, "stopping batch");
                    report.stop = BatchStop::Halted(e);
                    return report;
                }
            }
        }

        report
    }

    /// Scan directories until `cancel` fires.
    ///
    /// A halted batch is logged and retried on the next cycle.
    pub fn run(
        &self,
        resolver: &dyn DirectoryResolver,
        cancel: &dyn CancellationSignal,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        loop {
            if cancel.is_cancelled() {
                info!(cycles = summary.cycles, "stop requested, exiting");
                return summary;
            }

            if let Some(dir) = resolver.next_directory() {
                summary.cycles += 1;
                let report = self.ingest_directory(&dir, cancel);
                summary.committed += report.committed;
                summary.skipped += report.skipped;
                match report.stop {
                    BatchStop::Exhausted => {}
                    BatchStop::Cancelled => {
                        info!(cycles = summary.cycles, "stop requested, exiting");
                        return summary;
                    }
                    BatchStop::Halted(_) => summary.halts += 1,
                }
            } else {
                trace!("no directory to scan");
            }

            self.idle(cancel);
        }
    }

    /// Sleep for the poll interval, waking early on cancellation.
    fn idle(&self, cancel: &dyn CancellationSignal) {
        let deadline = Instant::now() + self.poll_interval;
        loop {
            let now = Instant::now();
            if now >= deadline || cancel.is_cancelled() {
                return;
            }
            thread::sleep(IDLE_SLICE.min(deadline - now));
        }
    }
}

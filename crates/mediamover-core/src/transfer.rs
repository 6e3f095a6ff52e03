//! Transfer engine that moves media records onto a destination volume.
//!
//! This module provides:
//! - A per-record copy, verify, delete state machine
//! - Directory layout preservation and collision-free naming
//! - Per-record failure isolation with an aggregate [`TransferSummary`]
//! - Progress reporting after every record and cooperative cancellation
//!
//! # Example
//!
//! ```rust,ignore
//! use mediamover_core::catalog::{LocalMediaLibrary, MediaCatalog};
//! use mediamover_core::fs::LocalDirectory;
//! use mediamover_core::record::MediaFilter;
//! use mediamover_core::transfer::{TransferEngine, TransferOptions};
//!
//! let library = LocalMediaLibrary::new("/storage/emulated/0")?;
//! let records = library.query(MediaFilter::ALL)?;
//! let destination = LocalDirectory::open("/media/sdcard")?;
//!
//! let engine = TransferEngine::new(TransferOptions::default())?;
//! let summary = engine.run(&records, &library, &destination, |event| {
//!     println!("{}/{}: {}", event.processed, event.total, event.display_name);
//! });
//!
//! println!("Moved {} files", summary.moved_count);
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::catalog::MediaSource;
use crate::copier::{DEFAULT_CHUNK_SIZE, StreamCopier};
use crate::error::{ErrorKind, Result, TransferError};
use crate::fs::{DirectoryHandle, TargetFile};
use crate::record::TransferRecord;
use crate::resolver::{resolve_directory, unique_name};

// =============================================================================
// Transfer Options
// =============================================================================

/// Configuration options for a transfer batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOptions {
    /// Size of chunks for reading/writing files (in bytes).
    /// Default: 64 KB
    pub chunk_size: usize,

    /// Whether to copy each record's modification time onto the target.
    /// Default: true
    pub preserve_timestamps: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            preserve_timestamps: true,
        }
    }
}

impl TransferOptions {
    /// Validate options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        StreamCopier::new(self.chunk_size).map(|_| ())
    }
}

// =============================================================================
// Progress and Results
// =============================================================================

/// Steps of moving a single record, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    /// Nothing done yet.
    Start,
    /// Target directory exists.
    DirectoryResolved,
    /// Empty target file exists.
    FileCreated,
    /// Bytes copied.
    Copied,
    /// Copy accepted.
    Verified,
    /// Original removed.
    Deleted,
}

impl std::fmt::Display for RecordStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::DirectoryResolved => write!(f, "directory resolved"),
            Self::FileCreated => write!(f, "file created"),
            Self::Copied => write!(f, "copied"),
            Self::Verified => write!(f, "verified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Final outcome of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Copied, verified and original deleted.
    Moved,
    /// Any step failed.
    Failed,
}

/// Emitted once per record, after its outcome is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Number of records processed so far (1-based).
    pub processed: usize,
    /// Number of records in the batch.
    pub total: usize,
    /// Display name of the record just processed.
    pub display_name: String,
    /// What happened to it.
    pub outcome: RecordOutcome,
}

/// Information about a record that was not moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTransfer {
    /// Record identity.
    pub record_id: u64,
    /// Record display name.
    pub display_name: String,
    /// Last stage reached before the failure.
    pub stage: RecordStage,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Error message.
    pub error: String,
}

/// Aggregate result of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferSummary {
    /// Records whose full copy, verify, delete sequence succeeded.
    pub moved_count: usize,
    /// Records that failed at any step.
    pub failed_count: usize,
    /// Sum of `size_bytes` over moved records.
    pub total_moved_bytes: u64,
    /// Details of every failed record.
    pub failures: Vec<FailedTransfer>,
    /// Whether the batch stopped early on request.
    pub was_cancelled: bool,
    /// Wall clock duration of the batch.
    pub duration_secs: f64,
}

impl TransferSummary {
    /// Number of records that were attempted.
    #[must_use]
    pub const fn processed_count(&self) -> usize {
        self.moved_count + self.failed_count
    }

    /// Whether every attempted record was moved and the batch ran to completion.
    #[must_use]
    pub const fn is_complete_success(&self) -> bool {
        self.failed_count == 0 && !self.was_cancelled
    }
}

// =============================================================================
// Transfer Engine
// =============================================================================

/// Bookkeeping for one record while it moves through the stages.
struct Attempt {
    stage: RecordStage,
    target: Option<Box<dyn TargetFile>>,
}

impl Attempt {
    const fn new() -> Self {
        Self {
            stage: RecordStage::Start,
            target: None,
        }
    }
}

/// Turn a panic payload into a readable message.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Moves media records from a [`MediaSource`] into a destination directory.
///
/// Records are processed one at a time, strictly in input order.
pub struct TransferEngine {
    options: TransferOptions,
    copier: StreamCopier,
    /// Cancellation flag.
    cancelled: Arc<AtomicBool>,
}

impl TransferEngine {
    /// Create a new transfer engine.
    pub fn new(options: TransferOptions) -> Result<Self> {
        Self::with_cancellation(options, Arc::new(AtomicBool::new(false)))
    }

    /// Create a new transfer engine with a shared cancellation flag.
    pub fn with_cancellation(options: TransferOptions, cancelled: Arc<AtomicBool>) -> Result<Self> {
        let copier = StreamCopier::new(options.chunk_size)?;
        Ok(Self {
            options,
            copier,
            cancelled,
        })
    }

    /// The options this engine runs with.
    #[must_use]
    pub const fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Request cancellation. The batch stops before the next record.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Get a cancellation token that can be shared across threads.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Move every record into `destination_root`.
    ///
    /// Never fails as a whole: per-record problems are counted in the
    /// summary. An unwritable destination fails every record without
    /// touching any of them. `on_progress` is called exactly once per
    /// processed record, in input order.
    pub fn run<F>(
        &self,
        records: &[TransferRecord],
        source: &dyn MediaSource,
        destination_root: &dyn DirectoryHandle,
        mut on_progress: F,
    ) -> TransferSummary
    where
        F: FnMut(&ProgressEvent),
    {
        let start_time = Instant::now();
        let total = records.len();
        let mut summary = TransferSummary::default();

        if !destination_root.can_write() {
            error!(
                "Destination {} is not writable, failing {} records",
                destination_root.display_path(),
                total
            );
            let err = TransferError::BatchPreconditionFailed {
                reason: format!("{} is not writable", destination_root.display_path()),
            };
            summary.failed_count = total;
            summary.failures = records
                .iter()
                .map(|record| FailedTransfer {
                    record_id: record.id,
                    display_name: record.display_name.clone(),
                    stage: RecordStage::Start,
                    kind: err.kind(),
                    error: err.to_string(),
                })
                .collect();
            summary.duration_secs = start_time.elapsed().as_secs_f64();
            return summary;
        }

        info!(
            "Moving {} records to {}",
            total,
            destination_root.display_path()
        );

        for (index, record) in records.iter().enumerate() {
            if self.is_cancelled() {
                info!("Transfer cancelled at record {}/{}", index + 1, total);
                summary.was_cancelled = true;
                break;
            }

            let outcome = match self.process_record(record, source, destination_root) {
                Ok(()) => {
                    summary.moved_count += 1;
                    summary.total_moved_bytes += record.size_bytes;
                    RecordOutcome::Moved
                }
                Err(failure) => {
                    summary.failed_count += 1;
                    summary.failures.push(failure);
                    RecordOutcome::Failed
                }
            };

            on_progress(&ProgressEvent {
                processed: index + 1,
                total,
                display_name: record.display_name.clone(),
                outcome,
            });
        }

        summary.duration_secs = start_time.elapsed().as_secs_f64();
        info!(
            "Transfer complete: {} moved, {} failed, {} bytes in {:.2}s",
            summary.moved_count,
            summary.failed_count,
            summary.total_moved_bytes,
            summary.duration_secs
        );
        summary
    }

    /// Run one record and clean up after a failure.
    ///
    /// A panic inside a collaborator is contained here so the rest of the
    /// batch still runs.
    fn process_record(
        &self,
        record: &TransferRecord,
        source: &dyn MediaSource,
        destination_root: &dyn DirectoryHandle,
    ) -> std::result::Result<(), FailedTransfer> {
        let mut attempt = Attempt::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.move_record(record, source, destination_root, &mut attempt)
        }))
        .unwrap_or_else(|payload| {
            Err(TransferError::Io {
                name: record.display_name.clone(),
                reason: format!("unexpected panic: {}", panic_message(payload.as_ref())),
            })
        });

        let Err(err) = result else {
            return Ok(());
        };

        error!(
            "Failed to move {} (id {}) at stage '{}': {}",
            record.display_name, record.id, attempt.stage, err
        );

        // A verified copy is kept even if the original could not be removed.
        if attempt.stage < RecordStage::Verified
            && let Some(target) = attempt.target.as_ref()
            && let Err(e) = target.delete()
        {
            warn!("Failed to clean up partial file {}: {}", target.name(), e);
        }

        Err(FailedTransfer {
            record_id: record.id,
            display_name: record.display_name.clone(),
            stage: attempt.stage,
            kind: err.kind(),
            error: err.to_string(),
        })
    }

    /// Drive one record through resolve, create, copy, verify and delete.
    fn move_record(
        &self,
        record: &TransferRecord,
        source: &dyn MediaSource,
        destination_root: &dyn DirectoryHandle,
        attempt: &mut Attempt,
    ) -> std::result::Result<(), TransferError> {
        let relative_path = record.target_relative_path();
        let directory = resolve_directory(destination_root, Some(relative_path))?;
        if !directory.is_directory() {
            return Err(TransferError::DirectoryCreateFailed {
                segment: relative_path.to_string(),
                reason: "resolved entry is not a directory".to_string(),
            });
        }
        attempt.stage = RecordStage::DirectoryResolved;

        let file_create_failed = |e: crate::Error| TransferError::FileCreateFailed {
            name: record.display_name.clone(),
            reason: e.to_string(),
        };
        let name = unique_name(directory.as_ref(), &record.display_name)
            .map_err(file_create_failed)?;
        let target = directory
            .create_file(&name, record.effective_mime_type())
            .map_err(file_create_failed)?;
        let target = attempt.target.insert(target);
        attempt.stage = RecordStage::FileCreated;
        debug!(
            "Created {} in {} for record {}",
            name,
            directory.display_path(),
            record.id
        );

        let stream_open_failed = |e: crate::Error| TransferError::StreamOpenFailed {
            name: record.display_name.clone(),
            reason: e.to_string(),
        };
        let bytes_copied = {
            let mut reader = source
                .open_reader(&record.source)
                .map_err(stream_open_failed)?;
            let mut writer = target.open_writer().map_err(stream_open_failed)?;
            self.copier
                .copy(&mut reader, &mut writer)
                .map_err(|e| TransferError::Io {
                    name: record.display_name.clone(),
                    reason: e.to_string(),
                })?
        };
        attempt.stage = RecordStage::Copied;

        if bytes_copied == 0 && record.size_bytes != 0 {
            return Err(TransferError::CopyTruncated {
                name: record.display_name.clone(),
                expected_bytes: record.size_bytes,
            });
        }
        if bytes_copied != record.size_bytes {
            warn!(
                "Size mismatch for {}: expected {} bytes, copied {}",
                record.display_name, record.size_bytes, bytes_copied
            );
        }
        attempt.stage = RecordStage::Verified;

        if self.options.preserve_timestamps
            && let Some(modified) = record.last_modified()
            && let Err(e) = target.set_modified(modified)
        {
            warn!("Could not preserve timestamp of {}: {}", name, e);
        }

        source
            .delete(&record.source)
            .map_err(|e| TransferError::SourceDeleteFailed {
                name: record.display_name.clone(),
                reason: e.to_string(),
            })?;
        attempt.stage = RecordStage::Deleted;

        debug!(
            "Moved {} ({} bytes) to {}/{}",
            record.display_name,
            bytes_copied,
            directory.display_path(),
            name
        );
        Ok(())
    }
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("options", &self.options)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

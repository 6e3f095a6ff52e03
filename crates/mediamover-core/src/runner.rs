//! Async host for transfer batches.
//!
//! The transfer engine is synchronous and blocking. [`TransferRunner`] runs it
//! on Tokio's blocking pool and forwards its progress through a channel, so
//! an interactive front end can keep rendering while files move.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mediamover_core::runner::{TransferEvent, TransferRunner};
//!
//! let runner = TransferRunner::new(TransferOptions::default())?;
//! let mut handle = runner.start(records, Arc::new(library), Box::new(destination))?;
//!
//! while let Some(event) = handle.next_event().await {
//!     match event {
//!         TransferEvent::Progress(p) => println!("{}/{}", p.processed, p.total),
//!         TransferEvent::Finished(summary) => println!("moved {}", summary.moved_count),
//!     }
//! }
//! let summary = handle.wait().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::MediaSource;
use crate::error::{Error, Result};
use crate::fs::DirectoryHandle;
use crate::record::TransferRecord;
use crate::transfer::{ProgressEvent, TransferEngine, TransferOptions, TransferSummary};

/// Something that happened in a running batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TransferEvent {
    /// A record was processed.
    Progress(ProgressEvent),
    /// The batch ended. Always the last event.
    Finished(TransferSummary),
}

/// Starts transfer batches on the Tokio blocking pool.
///
/// Every batch started by one runner shares the runner's cancellation flag.
#[derive(Debug, Clone)]
pub struct TransferRunner {
    options: TransferOptions,
    cancelled: Arc<AtomicBool>,
}

impl TransferRunner {
    /// Create a runner. Options are validated up front.
    pub fn new(options: TransferOptions) -> Result<Self> {
        Self::with_cancellation(options, Arc::new(AtomicBool::new(false)))
    }

    /// Create a runner using an existing cancellation flag.
    pub fn with_cancellation(options: TransferOptions, cancelled: Arc<AtomicBool>) -> Result<Self> {
        options.validate()?;
        Ok(Self { options, cancelled })
    }

    /// Start a batch in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        &self,
        records: Vec<TransferRecord>,
        source: Arc<dyn MediaSource>,
        destination: Box<dyn DirectoryHandle>,
    ) -> Result<TransferHandle> {
        let engine =
            TransferEngine::with_cancellation(self.options.clone(), Arc::clone(&self.cancelled))?;
        let cancelled = engine.cancellation_token();
        let (tx, rx) = mpsc::unbounded_channel();

        info!("Starting background transfer of {} records", records.len());
        let join = tokio::task::spawn_blocking(move || {
            let summary = engine.run(&records, source.as_ref(), destination.as_ref(), |event| {
                // A dropped receiver only means nobody is watching.
                let _ = tx.send(TransferEvent::Progress(event.clone()));
            });
            if tx.send(TransferEvent::Finished(summary.clone())).is_err() {
                debug!("Transfer finished with no event listener");
            }
            summary
        });

        Ok(TransferHandle {
            events: rx,
            cancelled,
            join,
        })
    }
}

/// Handle to a running batch.
#[derive(Debug)]
pub struct TransferHandle {
    events: mpsc::UnboundedReceiver<TransferEvent>,
    cancelled: Arc<AtomicBool>,
    join: JoinHandle<TransferSummary>,
}

impl TransferHandle {
    /// Ask the batch to stop before its next record.
    pub fn cancel(&self) {
        info!("Cancellation requested for running transfer");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Shared cancellation flag, e.g. for a Ctrl-C handler.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Next event, or `None` once the batch has ended and all events were read.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    /// Whether the batch has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the batch to end and return its summary.
    ///
    /// # Errors
    ///
    /// Returns `Error::TaskFailed` if the background task could not complete.
    pub async fn wait(self) -> Result<TransferSummary> {
        self.join
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LocalMediaLibrary, MediaCatalog};
    use crate::fs::LocalDirectory;
    use crate::record::MediaFilter;
    use std::fs;
    use tempfile::TempDir;

    fn setup(count: usize) -> (TempDir, TempDir, LocalMediaLibrary, Vec<TransferRecord>) {
        let source_dir = TempDir::new().expect("create source dir");
        let dest_dir = TempDir::new().expect("create dest dir");
        for i in 0..count {
            fs::write(source_dir.path().join(format!("img_{i:02}.jpg")), [7u8; 32])
                .expect("write source");
        }
        let library = LocalMediaLibrary::new(source_dir.path()).expect("library");
        let records = library.query(MediaFilter::ALL).expect("query");
        (source_dir, dest_dir, library, records)
    }

    #[test]
    fn test_runner_rejects_invalid_options() {
        let options = TransferOptions {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(TransferRunner::new(options).is_err());
    }

    #[tokio::test]
    async fn test_events_then_summary() {
        let (_source_dir, dest_dir, library, records) = setup(3);
        let destination = LocalDirectory::open(dest_dir.path()).expect("destination");

        let runner = TransferRunner::new(TransferOptions::default()).expect("runner");
        let mut handle = runner
            .start(records, Arc::new(library), Box::new(destination))
            .expect("start");

        let mut progress = Vec::new();
        let mut finished = None;
        while let Some(event) = handle.next_event().await {
            match event {
                TransferEvent::Progress(p) => progress.push(p.processed),
                TransferEvent::Finished(summary) => finished = Some(summary),
            }
        }

        assert_eq!(progress, vec![1, 2, 3]);
        let finished = finished.expect("finished event");
        assert_eq!(finished.moved_count, 3);
        assert_eq!(finished.total_moved_bytes, 96);

        let summary = handle.wait().await.expect("summary");
        assert_eq!(summary.moved_count, 3);
        assert!(dest_dir.path().join("Pictures/img_02.jpg").exists());
    }

    #[tokio::test]
    async fn test_cancelled_runner_moves_nothing() {
        let (source_dir, dest_dir, library, records) = setup(4);
        let destination = LocalDirectory::open(dest_dir.path()).expect("destination");
        let token = Arc::new(AtomicBool::new(true));
        let runner =
            TransferRunner::with_cancellation(TransferOptions::default(), token).expect("runner");

        let mut handle = runner
            .start(records, Arc::new(library), Box::new(destination))
            .expect("start");
        let first = handle.next_event().await;
        assert!(matches!(first, Some(TransferEvent::Finished(_))));

        let summary = handle.wait().await.expect("summary");
        assert!(summary.was_cancelled);
        assert_eq!(summary.processed_count(), 0);
        assert_eq!(fs::read_dir(source_dir.path()).expect("list").count(), 4);
    }

    #[tokio::test]
    async fn test_handle_cancel_sets_shared_flag() {
        let (_source_dir, dest_dir, library, records) = setup(1);
        let destination = LocalDirectory::open(dest_dir.path()).expect("destination");
        let token = Arc::new(AtomicBool::new(false));
        let runner = TransferRunner::with_cancellation(TransferOptions::default(), Arc::clone(&token))
            .expect("runner");

        let handle = runner
            .start(records, Arc::new(library), Box::new(destination))
            .expect("start");
        handle.cancel();
        assert!(token.load(Ordering::SeqCst));
        handle.wait().await.expect("summary");
    }

    #[tokio::test]
    async fn test_wait_without_reading_events() {
        let (_source_dir, dest_dir, library, records) = setup(2);
        let destination = LocalDirectory::open(dest_dir.path()).expect("destination");
        let runner = TransferRunner::new(TransferOptions::default()).expect("runner");
        let handle = runner
            .start(records, Arc::new(library), Box::new(destination))
            .expect("start");

        let summary = handle.wait().await.expect("summary");
        assert_eq!(summary.moved_count, 2);
        assert!(!summary.was_cancelled);
    }
}

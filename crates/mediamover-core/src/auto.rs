//! Unattended scheduled transfers.
//!
//! [`AutoTransferJob`] is what a timer or service manager invokes at the
//! scheduled time: it decides whether today is a run day, scans the catalog
//! and moves everything it finds.

use std::path::PathBuf;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{MediaCatalog, MediaSource};
use crate::config::AppConfig;
use crate::error::Result;
use crate::fs::LocalDirectory;
use crate::schedule::ScheduleConfig;
use crate::transfer::{ProgressEvent, TransferEngine, TransferOptions, TransferSummary};

/// Unattended runs report progress every this many records.
pub const AUTO_PROGRESS_INTERVAL: usize = 5;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Wrap a progress sink so it only sees every `every`-th event and the last.
pub fn throttle_progress<F>(every: usize, mut sink: F) -> impl FnMut(&ProgressEvent)
where
    F: FnMut(&ProgressEvent),
{
    let every = every.max(1);
    move |event: &ProgressEvent| {
        if event.processed % every == 0 || event.processed == event.total {
            sink(event);
        }
    }
}

/// How an unattended run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AutoRunOutcome {
    /// The schedule is switched off.
    Disabled,
    /// No destination has been configured.
    NoDestination,
    /// Today is not one of the selected days.
    NotScheduledToday {
        /// The day it ran on.
        weekday: Weekday,
    },
    /// The configured destination could not be opened.
    DestinationUnavailable {
        /// Why it could not be opened.
        reason: String,
    },
    /// The scan found nothing to move.
    NothingToMove,
    /// A batch ran.
    Completed(TransferSummary),
}

impl AutoRunOutcome {
    /// One line suitable for a notification, if the outcome warrants one.
    #[must_use]
    pub fn report_line(&self) -> Option<String> {
        match self {
            Self::Completed(summary) => Some(format!(
                "Auto-move complete: {} files ({}MB).",
                summary.moved_count,
                summary.total_moved_bytes / BYTES_PER_MB
            )),
            Self::DestinationUnavailable { reason } => Some(format!("Auto-move failed: {reason}")),
            _ => None,
        }
    }
}

/// A single scheduled run.
#[derive(Debug, Clone)]
pub struct AutoTransferJob {
    schedule: ScheduleConfig,
    options: TransferOptions,
    destination: Option<PathBuf>,
}

impl AutoTransferJob {
    /// Create a job from its parts.
    pub const fn new(
        schedule: ScheduleConfig,
        options: TransferOptions,
        destination: Option<PathBuf>,
    ) -> Self {
        Self {
            schedule,
            options,
            destination,
        }
    }

    /// Create a job from the application config.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.schedule.clone(),
            config.transfer.clone(),
            config.destination_root.clone(),
        )
    }

    /// Run once as of `today`.
    ///
    /// Progress is throttled to every [`AUTO_PROGRESS_INTERVAL`]-th record
    /// and the last.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried or the options are
    /// invalid. Per-record failures are part of the summary.
    pub fn run<C, F>(
        &self,
        today: Weekday,
        catalog: &C,
        source: &dyn MediaSource,
        on_progress: F,
    ) -> Result<AutoRunOutcome>
    where
        C: MediaCatalog + ?Sized,
        F: FnMut(&ProgressEvent),
    {
        if !self.schedule.enabled {
            debug!("Automatic transfer is disabled");
            return Ok(AutoRunOutcome::Disabled);
        }
        let Some(destination) = &self.destination else {
            debug!("No destination configured, skipping automatic transfer");
            return Ok(AutoRunOutcome::NoDestination);
        };
        if !self.schedule.is_due_on(today) {
            debug!("Today ({}) is not scheduled, skipping", today);
            return Ok(AutoRunOutcome::NotScheduledToday { weekday: today });
        }

        let records = catalog.query(self.schedule.filter())?;
        if records.is_empty() {
            info!("Automatic transfer found nothing to move");
            return Ok(AutoRunOutcome::NothingToMove);
        }

        let root = match LocalDirectory::open(destination) {
            Ok(root) => root,
            Err(e) => {
                warn!("Destination {} unavailable: {}", destination.display(), e);
                return Ok(AutoRunOutcome::DestinationUnavailable {
                    reason: e.to_string(),
                });
            }
        };

        let engine = TransferEngine::new(self.options.clone())?;
        let summary = engine.run(
            &records,
            source,
            &root,
            throttle_progress(AUTO_PROGRESS_INTERVAL, on_progress),
        );
        Ok(AutoRunOutcome::Completed(summary))
    }
}

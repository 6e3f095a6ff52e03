//! `Mediamover` Core Library
//!
//! This crate provides the core functionality for the `Mediamover` application:
//! - Media scanning of a local photo and video library
//! - Storage capacity reporting for internal and removable volumes
//! - Moving media to removable storage (copy, verify, delete) with
//!   per-record failure isolation and progress reporting
//! - Selection hand-off, scheduled automatic transfers and configuration
//!
//! # Error Handling
//!
//! This crate uses typed errors for each domain. See the [`error`] module
//! for details. The transfer engine itself never fails as a whole; per-record
//! failures are reported in its [`TransferSummary`].
//!
//! ```rust,ignore
//! use mediamover_core::{Error, Result};
//!
//! fn do_something() -> Result<()> {
//!     // Your code here
//!     Ok(())
//! }
//! ```

pub mod auto;
pub mod capacity;
pub mod catalog;
pub mod config;
pub mod copier;
pub mod error;
pub mod fs;
pub mod record;
pub mod resolver;
pub mod runner;
pub mod schedule;
pub mod selection;
pub mod transfer;

pub use auto::{AUTO_PROGRESS_INTERVAL, AutoRunOutcome, AutoTransferJob, throttle_progress};
pub use capacity::{
    CapacityReporter, CapacitySource, INTERNAL_LABEL, REMOVABLE_LABEL, StorageInfo,
    SysinfoCapacitySource, VolumeStats, is_removable_mount,
};
pub use catalog::{LocalMediaLibrary, MediaCatalog, MediaSource, classify_media};
pub use config::{AppConfig, ConfigManager, default_media_root, validate_destination_directory};
pub use copier::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, StreamCopier};
pub use error::{Error, ErrorKind, FileSystemError, Result, StorageError, TransferError};
pub use fs::{ChildEntry, DirectoryHandle, LocalDirectory, LocalFile, TargetFile};
pub use record::{
    DEFAULT_MIME_TYPE, MediaFilter, MediaKind, SourceLocator, TransferRecord,
    UNKNOWN_DISPLAY_NAME,
};
pub use resolver::{resolve_directory, unique_name};
pub use runner::{TransferEvent, TransferHandle, TransferRunner};
pub use schedule::{ALL_DAYS, ScheduleConfig};
pub use selection::{DEFAULT_SELECTION_FILE, Selection, SelectionCache};
pub use transfer::{
    FailedTransfer, ProgressEvent, RecordOutcome, RecordStage, TransferEngine, TransferOptions,
    TransferSummary,
};

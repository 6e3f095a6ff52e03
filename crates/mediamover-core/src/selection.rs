//! Hand-off of a selected record list between invocations.
//!
//! A selection is written as JSON to a cache file by whoever picks the
//! records, and read back by the process that runs the transfer.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediamover_core::selection::SelectionCache;
//!
//! let cache = SelectionCache::new(SelectionCache::default_path());
//! cache.save(&records)?;
//!
//! if let Some(records) = cache.load()? {
//!     // run the batch, then forget the selection
//!     cache.clear()?;
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::record::TransferRecord;

/// Default selection file name.
pub const DEFAULT_SELECTION_FILE: &str = "selected_media.json";

/// On-disk form of a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// When the selection was saved.
    pub saved_at: DateTime<Utc>,
    /// Selected records, in transfer order.
    pub records: Vec<TransferRecord>,
}

/// JSON file holding the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCache {
    path: PathBuf,
}

impl SelectionCache {
    /// Use the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location in the user's cache directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("mediamover")
            .join(DEFAULT_SELECTION_FILE)
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, records: &[TransferRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })
            })?;
        }

        let selection = Selection {
            saved_at: Utc::now(),
            records: records.to_vec(),
        };
        let content = serde_json::to_string(&selection)?;
        fs::write(&self.path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })
        })?;

        debug!(
            "Saved selection of {} records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read the stored selection.
    ///
    /// Returns `None` when nothing is stored. A file that cannot be parsed
    /// is treated as no selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<Vec<TransferRecord>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::FileSystem(FileSystemError::ReadFailed {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }));
            }
        };

        match serde_json::from_str::<Selection>(&content) {
            Ok(selection) => {
                debug!(
                    "Loaded selection of {} records saved at {}",
                    selection.records.len(),
                    selection.saved_at
                );
                Ok(Some(selection.records))
            }
            Err(e) => {
                warn!(
                    "Ignoring unreadable selection file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Forget the stored selection. Clearing twice is fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Cleared selection {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::FileSystem(FileSystemError::DeleteFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })),
        }
    }
}

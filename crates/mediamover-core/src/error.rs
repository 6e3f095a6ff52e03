//! Error types for Mediamover core operations.
//!
//! Errors are grouped by domain. The transfer engine never surfaces
//! per-record [`TransferError`]s to its caller. They are classified with
//! [`ErrorKind`] and recorded in the batch summary instead, and a cancelled
//! batch is reported through the summary as well.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Mediamover core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// File system operation failed.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Storage volume query failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A background task did not complete.
    #[error("Background task failed: {0}")]
    TaskFailed(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// File system errors outside of the per-record transfer steps.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// Path does not exist.
    #[error("Path not found: {path}")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// Path exists but cannot be used for the requested operation.
    #[error("Invalid path {path}: {reason}")]
    InvalidPath {
        /// Offending path.
        path: PathBuf,
        /// Why the path was rejected.
        reason: String,
    },

    /// Reading failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },

    /// Writing failed.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },

    /// Directory creation failed.
    #[error("Failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory path.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },

    /// Deletion failed.
    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed {
        /// Path being deleted.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },
}

/// Failures of the individual steps of moving one record.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A path segment exists as a file where a directory is needed.
    #[error("Directory conflict: '{segment}' exists and is not a directory")]
    DirectoryConflict {
        /// The conflicting segment.
        segment: String,
    },

    /// A directory segment could not be created.
    #[error("Failed to create directory '{segment}': {reason}")]
    DirectoryCreateFailed {
        /// The segment that could not be created.
        segment: String,
        /// Underlying error message.
        reason: String,
    },

    /// The target file entry could not be created.
    #[error("Failed to create file '{name}': {reason}")]
    FileCreateFailed {
        /// Requested file name.
        name: String,
        /// Underlying error message.
        reason: String,
    },

    /// The source or destination stream could not be opened.
    #[error("Failed to open stream for '{name}': {reason}")]
    StreamOpenFailed {
        /// Display name of the record.
        name: String,
        /// Underlying error message.
        reason: String,
    },

    /// Nothing was copied although the record declares a nonzero size.
    #[error("Copy of '{name}' truncated: expected {expected_bytes} bytes, copied 0")]
    CopyTruncated {
        /// Display name of the record.
        name: String,
        /// Declared size of the record.
        expected_bytes: u64,
    },

    /// Read or write fault during the copy.
    #[error("I/O error while copying '{name}': {reason}")]
    Io {
        /// Display name of the record.
        name: String,
        /// Underlying error message.
        reason: String,
    },

    /// The copy succeeded but the original could not be removed.
    #[error("Copied '{name}' but failed to delete the original: {reason}")]
    SourceDeleteFailed {
        /// Display name of the record.
        name: String,
        /// Underlying error message.
        reason: String,
    },

    /// The destination root cannot accept writes.
    #[error("Destination root is not usable: {reason}")]
    BatchPreconditionFailed {
        /// Why the destination was rejected.
        reason: String,
    },
}

/// Storage volume errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The volume at the given path cannot be queried.
    #[error("Storage unavailable at {path}: {reason}")]
    Unavailable {
        /// Path that was queried.
        path: PathBuf,
        /// Why it could not be queried.
        reason: String,
    },
}

/// Flat classification of errors, used in transfer summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`StorageError::Unavailable`].
    StorageUnavailable,
    /// See [`TransferError::DirectoryConflict`].
    DirectoryConflict,
    /// See [`TransferError::DirectoryCreateFailed`].
    DirectoryCreateFailed,
    /// See [`TransferError::FileCreateFailed`].
    FileCreateFailed,
    /// See [`TransferError::StreamOpenFailed`].
    StreamOpenFailed,
    /// See [`TransferError::CopyTruncated`].
    CopyTruncated,
    /// See [`TransferError::Io`].
    Io,
    /// See [`TransferError::SourceDeleteFailed`].
    SourceDeleteFailed,
    /// See [`TransferError::BatchPreconditionFailed`].
    BatchPreconditionFailed,
    /// File system errors outside a transfer step.
    FileSystem,
    /// Invalid configuration.
    Configuration,
    /// Background task failure.
    TaskFailed,
    /// (De)serialization failure.
    Serialization,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::StorageUnavailable => "storage unavailable",
            Self::DirectoryConflict => "directory conflict",
            Self::DirectoryCreateFailed => "directory create failed",
            Self::FileCreateFailed => "file create failed",
            Self::StreamOpenFailed => "stream open failed",
            Self::CopyTruncated => "copy truncated",
            Self::Io => "i/o error",
            Self::SourceDeleteFailed => "source delete failed",
            Self::BatchPreconditionFailed => "batch precondition failed",
            Self::FileSystem => "file system error",
            Self::Configuration => "configuration error",
            Self::TaskFailed => "task failed",
            Self::Serialization => "serialization error",
        };
        f.write_str(label)
    }
}

impl TransferError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DirectoryConflict { .. } => ErrorKind::DirectoryConflict,
            Self::DirectoryCreateFailed { .. } => ErrorKind::DirectoryCreateFailed,
            Self::FileCreateFailed { .. } => ErrorKind::FileCreateFailed,
            Self::StreamOpenFailed { .. } => ErrorKind::StreamOpenFailed,
            Self::CopyTruncated { .. } => ErrorKind::CopyTruncated,
            Self::Io { .. } => ErrorKind::Io,
            Self::SourceDeleteFailed { .. } => ErrorKind::SourceDeleteFailed,
            Self::BatchPreconditionFailed { .. } => ErrorKind::BatchPreconditionFailed,
        }
    }
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::FileSystem(_) | Self::Io(_) => ErrorKind::FileSystem,
            Self::Storage(StorageError::Unavailable { .. }) => ErrorKind::StorageUnavailable,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::TaskFailed(_) => ErrorKind::TaskFailed,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether this error means "no removable storage" rather than a fault.
    #[must_use]
    pub const fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Unavailable { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_conflict_display() {
        let err = TransferError::DirectoryConflict {
            segment: "DCIM".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Directory conflict: 'DCIM' exists and is not a directory"
        );
        assert_eq!(err.kind(), ErrorKind::DirectoryConflict);
    }

    #[test]
    fn test_copy_truncated_display() {
        let err = TransferError::CopyTruncated {
            name: "clip.mp4".to_string(),
            expected_bytes: 200,
        };
        assert!(err.to_string().contains("clip.mp4"));
        assert!(err.to_string().contains("200"));
        assert_eq!(err.kind(), ErrorKind::CopyTruncated);
    }

    #[test]
    fn test_storage_unavailable_is_flagged() {
        let err = Error::from(StorageError::Unavailable {
            path: PathBuf::from("/media/sdcard"),
            reason: "no such volume".to_string(),
        });
        assert!(err.is_storage_unavailable());
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert!(err.to_string().contains("/media/sdcard"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_storage_unavailable());
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::SourceDeleteFailed).expect("serialize");
        assert_eq!(json, "\"source_delete_failed\"");
    }
}

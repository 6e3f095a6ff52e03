//! Command errors and their exit codes.

use std::path::PathBuf;

/// Errors a command can end with.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A library operation failed.
    #[error(transparent)]
    Core(#[from] mediamover_core::Error),

    /// Neither `--dest` nor a configured destination is available.
    #[error("no destination given; pass --dest or run `mediamover set-destination <DIR>`")]
    NoDestination,

    /// The selection file is missing or unreadable.
    #[error("no saved selection at {}", .0.display())]
    NoSelection(PathBuf),

    /// A batch ran to the end but some records failed.
    #[error("{failed} of {total} files were not moved")]
    Incomplete {
        /// Records not moved.
        failed: usize,
        /// Records in the batch.
        total: usize,
    },

    /// A batch was stopped before it reached every record.
    #[error("cancelled after moving {moved} of {total} files")]
    Cancelled {
        /// Records moved before the stop.
        moved: usize,
        /// Records in the batch.
        total: usize,
    },
}

/// Result type for commands.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Process exit code for this error.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Incomplete { .. } | Self::Cancelled { .. } => 2,
            _ => 1,
        }
    }
}

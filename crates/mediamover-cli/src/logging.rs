//! Logging setup for the command line host.
//!
//! Two sinks are installed:
//! - a compact console layer on stderr, so stdout only carries command output
//! - a JSON file layer, rotated daily, for after-the-fact diagnosis of
//!   unattended `auto` runs
//!
//! `RUST_LOG` overrides the console filter. The file sink is optional and the
//! host falls back to console-only logging when it cannot be opened.

use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable that relocates the log directory.
pub const LOG_DIR_ENV: &str = "MEDIAMOVER_LOG_DIR";

const LOG_FILE_PREFIX: &str = "mediamover";
const RETAINED_LOG_FILES: usize = 7;

/// Crates whose events are logged at the configured levels.
const OWN_TARGETS: [&str; 2] = ["mediamover", "mediamover_core"];

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Maximum level shown on the console.
    pub console_level: Level,
    /// Maximum level written to the log file.
    pub file_level: Level,
    /// Log file directory. `None` disables the file sink.
    pub directory: Option<PathBuf>,
    /// Colorize console output.
    pub color: bool,
}

impl LogSettings {
    /// Settings for an interactive invocation.
    ///
    /// The console shows warnings only, or debug output with `verbose`.
    /// Debug builds write trace-level files.
    #[must_use]
    pub fn for_cli(verbose: bool) -> Self {
        Self {
            console_level: if verbose { Level::DEBUG } else { Level::WARN },
            file_level: if cfg!(debug_assertions) {
                Level::TRACE
            } else {
                Level::DEBUG
            },
            directory: Some(log_directory_from(std::env::var_os(LOG_DIR_ENV))),
            color: std::io::stderr().is_terminal(),
        }
    }

    /// The same settings with the file sink turned off.
    #[must_use]
    pub fn without_file(mut self) -> Self {
        self.directory = None;
        self
    }
}

/// Keeps the file writer alive. Dropping it flushes pending entries.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init(settings: &LogSettings) -> Result<LogGuard, LoggingError> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(settings.console_level)));
    let console = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(settings.color)
        .with_target(false)
        .with_filter(console_filter);

    let (file, guard) = match &settings.directory {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(dir)?);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new(filter_directives(settings.file_level)));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LogGuard { _file: guard })
}

/// Daily rotating appender in `dir`, created if missing.
fn file_appender(dir: &Path) -> Result<RollingFileAppender, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|e| LoggingError::DirectoryCreationFailed {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(RETAINED_LOG_FILES)
        .build(dir)
        .map_err(|e| LoggingError::AppenderFailed(e.to_string()))
}

/// The log directory: the override if set and non-empty, else
/// `<data_local_dir>/mediamover/logs`.
fn log_directory_from(override_dir: Option<OsString>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mediamover")
            .join("logs"),
    }
}

/// Dependencies at `warn`, our crates at `level`.
fn filter_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(OWN_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create the log directory.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// The path that could not be created.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// The rolling file appender could not be created.
    #[error("Failed to open log file: {0}")]
    AppenderFailed(String),

    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

//! Application configuration management.
//!
//! Handles loading, saving, and managing application-wide settings:
//! where media lives, where it is moved to, the automatic transfer schedule
//! and copy options.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::fs::check_writable;
use crate::schedule::ScheduleConfig;
use crate::transfer::TransferOptions;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Root of the media library that is scanned for photos and videos.
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    /// Destination root on the removable volume, if one was chosen.
    #[serde(default)]
    pub destination_root: Option<PathBuf>,
    /// Automatic transfer schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Copy options.
    #[serde(default)]
    pub transfer: TransferOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            destination_root: None,
            schedule: ScheduleConfig::default(),
            transfer: TransferOptions::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, or defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to read config file: {e}"),
            })
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        debug!("Media root: {}", config.media_root.display());
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    reason: format!("Failed to create config directory: {e}"),
                })
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to write config file: {e}"),
            })
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Check option values.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        self.transfer.validate()?;
        self.schedule.validate()
    }

    /// Update the destination root.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory doesn't exist or isn't writable.
    pub fn set_destination_root(&mut self, path: PathBuf) -> Result<()> {
        validate_destination_directory(&path)?;
        info!("Updated destination root to: {}", path.display());
        self.destination_root = Some(path);
        Ok(())
    }

    /// Get the path to the config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

/// Default media library root.
#[must_use]
pub fn default_media_root() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Get the path to the config file.
fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("mediamover")
        .join("config.json")
}

/// Validate that a directory can receive moved media.
///
/// Unlike a storage directory, a destination is never created: it has to be
/// a mounted volume that already exists.
pub fn validate_destination_directory(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::Configuration(
            "Destination must be an absolute path".to_string(),
        ));
    }

    if !path.exists() {
        return Err(Error::Configuration(format!(
            "Destination does not exist: {}",
            path.display()
        )));
    }

    if !path.is_dir() {
        return Err(Error::Configuration(format!(
            "Path exists but is not a directory: {}",
            path.display()
        )));
    }

    match check_writable(path) {
        Ok(()) => Ok(()),
        Err(e) => Err(Error::Configuration(format!(
            "Directory is not writable: {} ({})",
            path.display(),
            e
        ))),
    }
}

/// Configuration manager that handles loading and persisting config.
#[derive(Debug)]
pub struct ConfigManager {
    config: AppConfig,
    path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager, loading config from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn new() -> Result<Self> {
        Self::with_path(config_file_path())
    }

    /// Create a config manager backed by a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = AppConfig::load_from(&path)?;
        Ok(Self { config, path })
    }

    /// Get a reference to the current configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace and persist the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or cannot be saved.
    pub fn update(&mut self, config: AppConfig) -> Result<()> {
        config.validate()?;
        if let Some(dest) = &config.destination_root
            && let Err(e) = validate_destination_directory(dest)
        {
            // A removable volume may simply be unplugged right now.
            warn!("Destination {} is not usable yet: {}", dest.display(), e);
        }

        self.config = config;
        self.config.save_to(&self.path)
    }

    /// Update just the destination root.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is invalid or config cannot be saved.
    pub fn set_destination_root(&mut self, path: PathBuf) -> Result<()> {
        self.config.set_destination_root(path)?;
        self.config.save_to(&self.path)
    }

    /// Reset to default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn reset(&mut self) -> Result<()> {
        self.config = AppConfig::default();
        self.config.save_to(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.media_root.as_os_str().is_empty());
        assert!(config.destination_root.is_none());
        assert!(!config.schedule.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let config = AppConfig::load_from(&temp_dir.path().join("config.json"))
            .expect("Should load defaults");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("nested/config.json");
        let mut config = AppConfig {
            media_root: PathBuf::from("/storage/emulated/0"),
            destination_root: Some(PathBuf::from("/media/sdcard")),
            ..Default::default()
        };
        config.schedule.enabled = true;
        config.schedule.hour = 3;
        config.transfer.preserve_timestamps = false;

        config.save_to(&path).expect("Should save");
        let loaded = AppConfig::load_from(&path).expect("Should load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"media_root": "/photos"}"#).expect("Should write");

        let config = AppConfig::load_from(&path).expect("Should load");
        assert_eq!(config.media_root, PathBuf::from("/photos"));
        assert_eq!(config.schedule, ScheduleConfig::default());
        assert_eq!(config.transfer, TransferOptions::default());
    }

    #[test]
    fn test_invalid_file_is_error() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("Should write");
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(Error::Configuration(_))
        ));

        fs::write(&path, r#"{"transfer": {"chunk_size": 1}}"#).expect("Should write");
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_destination_directory() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        assert!(validate_destination_directory(temp_dir.path()).is_ok());
        assert!(!temp_dir.path().join(".mediamover_write_test").exists());

        assert!(validate_destination_directory(Path::new("relative/path")).is_err());
        assert!(validate_destination_directory(&temp_dir.path().join("missing")).is_err());

        let file_path = temp_dir.path().join("not_a_directory");
        fs::write(&file_path, "test content").expect("Should write file");
        let err = validate_destination_directory(&file_path).expect_err("Should fail");
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_validate_destination_keeps_existing_marker_file() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let marker = temp_dir.path().join(".mediamover_write_test");
        fs::write(&marker, "keep me").expect("Should write marker");

        assert!(validate_destination_directory(temp_dir.path()).is_ok());
        assert_eq!(fs::read_to_string(&marker).expect("Should read"), "keep me");
    }

    #[test]
    fn test_config_manager_persists_updates() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("config.json");
        let dest = temp_dir.path().join("sd");
        fs::create_dir(&dest).expect("Should create dest");

        let mut manager = ConfigManager::with_path(&path).expect("Should create manager");
        manager
            .set_destination_root(dest.clone())
            .expect("Should set destination");
        assert_eq!(manager.config().destination_root.as_ref(), Some(&dest));

        let reloaded = ConfigManager::with_path(&path).expect("Should reload");
        assert_eq!(reloaded.config().destination_root, Some(dest));

        manager.reset().expect("Should reset");
        assert!(AppConfig::load_from(&path)
            .expect("Should load")
            .destination_root
            .is_none());
    }

    #[test]
    fn test_config_manager_rejects_invalid_update() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let mut manager =
            ConfigManager::with_path(temp_dir.path().join("config.json")).expect("Should create");
        let mut config = AppConfig::default();
        config.schedule.minute = 75;
        assert!(manager.update(config).is_err());
        assert_eq!(manager.config().schedule.minute, 0);
    }

    #[test]
    fn test_config_file_path_static() {
        let path = AppConfig::config_file_path();
        assert!(path.to_string_lossy().ends_with("config.json"));
        assert!(path.to_string_lossy().contains("mediamover"));
    }
}

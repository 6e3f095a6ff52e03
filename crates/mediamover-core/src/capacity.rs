//! Storage capacity reporting for internal and removable volumes.
//!
//! This module provides:
//! - [`CapacitySource`] for raw volume statistics (mockable)
//! - [`SysinfoCapacitySource`] backed by `sysinfo::Disks`
//! - [`CapacityReporter`] which derives used/free space and a usage percentage

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sysinfo::Disks;
use tracing::debug;

use crate::error::{Result, StorageError};

/// Label used for the volume holding the media library.
pub const INTERNAL_LABEL: &str = "Internal storage";

/// Label used for a removable volume.
pub const REMOVABLE_LABEL: &str = "SD card";

/// Raw statistics of a mounted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStats {
    /// Size of one block in bytes.
    pub block_size: u64,
    /// Number of blocks on the volume.
    pub total_blocks: u64,
    /// Number of blocks available to unprivileged writers.
    pub available_blocks: u64,
}

/// Capacity of a volume, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    /// Human readable label, e.g. "SD card".
    pub label: String,
    /// Root path that was queried.
    pub root: PathBuf,
    /// Total capacity in bytes.
    pub total_bytes: u64,
    /// Used space in bytes.
    pub used_bytes: u64,
    /// Free space in bytes.
    pub free_bytes: u64,
    /// Used space as a truncated percentage (0 - 100).
    pub percent_used: u8,
}

impl StorageInfo {
    /// Derive capacity figures from raw volume statistics.
    #[must_use]
    pub fn from_stats(label: impl Into<String>, root: impl Into<PathBuf>, stats: &VolumeStats) -> Self {
        let total_bytes = stats.block_size.saturating_mul(stats.total_blocks);
        let free_bytes = stats.block_size.saturating_mul(stats.available_blocks);
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        let percent_used = if total_bytes == 0 {
            0
        } else {
            let percent = u128::from(used_bytes) * 100 / u128::from(total_bytes);
            u8::try_from(percent.min(100)).unwrap_or(100)
        };

        Self {
            label: label.into(),
            root: root.into(),
            total_bytes,
            used_bytes,
            free_bytes,
            percent_used,
        }
    }
}

/// Supplies volume statistics.
/// This trait allows for mocking in tests.
#[cfg_attr(test, mockall::automock)]
pub trait CapacitySource: Send + Sync {
    /// Statistics of the volume holding `path`.
    fn volume_stats(&self, path: &Path) -> Result<VolumeStats>;

    /// Mount points of removable volumes, in discovery order.
    fn removable_roots(&self) -> Vec<PathBuf>;
}

/// Whether a disk looks like removable media.
///
/// External devices are mounted under `/Volumes` on macOS and under
/// `/media`, `/mnt` or `/run/media` on Linux.
#[must_use]
pub fn is_removable_mount(mount_point: &Path, reported_removable: bool) -> bool {
    let mount = mount_point.to_string_lossy();
    let is_external_mount = mount.starts_with("/Volumes/")
        || mount.starts_with("/media/")
        || mount.starts_with("/mnt/")
        || mount.starts_with("/run/media/");

    if !(reported_removable || is_external_mount) {
        return false;
    }

    // Skip system volumes on macOS
    !(mount == "/Volumes/Macintosh HD" || mount.contains("Recovery") || mount.contains("Preboot"))
}

/// Capacity source using `sysinfo`.
pub struct SysinfoCapacitySource {
    disks: Disks,
}

impl SysinfoCapacitySource {
    /// Create a source with a freshly loaded disk list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }

    /// Reload the disk list.
    pub fn refresh(&mut self) {
        self.disks.refresh(true);
    }
}

impl Default for SysinfoCapacitySource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SysinfoCapacitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoCapacitySource")
            .field("disks", &self.disks.list().len())
            .finish()
    }
}

impl CapacitySource for SysinfoCapacitySource {
    fn volume_stats(&self, path: &Path) -> Result<VolumeStats> {
        let canonical = path.canonicalize().map_err(|e| StorageError::Unavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // The volume holding a path is the one with the longest matching mount point.
        let disk = self
            .disks
            .iter()
            .filter(|disk| canonical.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().components().count())
            .ok_or_else(|| StorageError::Unavailable {
                path: path.to_path_buf(),
                reason: "no mounted volume contains this path".to_string(),
            })?;

        debug!(
            "Path {} is on volume {}",
            path.display(),
            disk.mount_point().display()
        );
        Ok(VolumeStats {
            block_size: 1,
            total_blocks: disk.total_space(),
            available_blocks: disk.available_space(),
        })
    }

    fn removable_roots(&self) -> Vec<PathBuf> {
        self.disks
            .iter()
            .filter(|disk| is_removable_mount(disk.mount_point(), disk.is_removable()))
            .map(|disk| disk.mount_point().to_path_buf())
            .collect()
    }
}

/// Computes [`StorageInfo`] for volumes. Stateless apart from its source.
#[derive(Debug)]
pub struct CapacityReporter<S> {
    source: S,
}

impl<S: CapacitySource> CapacityReporter<S> {
    /// Create a reporter over a capacity source.
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Report the capacity of the volume holding `root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage(StorageError::Unavailable)` when the path
    /// cannot be queried.
    pub fn report(&self, label: &str, root: &Path) -> Result<StorageInfo> {
        let stats = self.source.volume_stats(root)?;
        Ok(StorageInfo::from_stats(label, root, &stats))
    }

    /// Report the volume holding the media library.
    pub fn internal(&self, media_root: &Path) -> Result<StorageInfo> {
        self.report(INTERNAL_LABEL, media_root)
    }

    /// Report the first removable volume, or `None` if there is none.
    #[must_use]
    pub fn removable(&self) -> Option<StorageInfo> {
        let root = self.source.removable_roots().into_iter().next()?;
        match self.report(REMOVABLE_LABEL, &root) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Removable volume {} unavailable: {}", root.display(), e);
                None
            }
        }
    }
}

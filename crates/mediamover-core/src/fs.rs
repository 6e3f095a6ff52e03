//! Destination-side file system abstraction.
//!
//! The transfer engine only talks to the destination through
//! [`DirectoryHandle`] and [`TargetFile`], so it can be driven against the
//! real file system ([`LocalDirectory`]) or against mocks in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediamover_core::fs::{DirectoryHandle, LocalDirectory};
//!
//! let root = LocalDirectory::open("/media/sdcard")?;
//! if root.can_write() {
//!     let dcim = root.create_directory("DCIM")?;
//! }
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::error::{Error, FileSystemError, Result};

/// Name of the marker file used to test whether a directory accepts writes.
const WRITE_TEST_NAME: &str = ".mediamover_write_test";

/// A child found while looking up a name in a directory.
pub enum ChildEntry {
    /// The name refers to a directory.
    Directory(Box<dyn DirectoryHandle>),
    /// The name is occupied by something that is not a directory.
    File,
}

impl ChildEntry {
    /// Whether the entry is a directory.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

impl std::fmt::Debug for ChildEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory(dir) => f
                .debug_tuple("Directory")
                .field(&dir.display_path())
                .finish(),
            Self::File => write!(f, "File"),
        }
    }
}

/// A folder on the destination side.
#[cfg_attr(test, mockall::automock)]
pub trait DirectoryHandle: Send + Sync {
    /// Human readable location, used in logs.
    fn display_path(&self) -> String;

    /// Whether the handle still refers to a directory.
    fn is_directory(&self) -> bool;

    /// Whether new entries can be created inside this directory.
    fn can_write(&self) -> bool;

    /// Look up a direct child by exact name.
    fn find_child(&self, name: &str) -> Result<Option<ChildEntry>>;

    /// Create a subdirectory. Fails if the name is already taken.
    fn create_directory(&self, name: &str) -> Result<Box<dyn DirectoryHandle>>;

    /// Create a new, empty file entry. Fails if the name is already taken.
    fn create_file(&self, name: &str, mime_type: &str) -> Result<Box<dyn TargetFile>>;

    /// Another handle to the same directory.
    fn duplicate(&self) -> Box<dyn DirectoryHandle>;
}

/// A file entry created on the destination side.
#[cfg_attr(test, mockall::automock)]
pub trait TargetFile: Send + Sync {
    /// Leaf name of the file.
    fn name(&self) -> String;

    /// Open a writer that replaces the file's content.
    fn open_writer(&self) -> Result<Box<dyn Write + Send>>;

    /// Set the modification time.
    fn set_modified(&self, time: SystemTime) -> Result<()>;

    /// Remove the file.
    fn delete(&self) -> Result<()>;
}

/// Check that `dir` accepts new files by creating and removing a marker.
///
/// The marker is created with `create_new`, so an existing file that happens
/// to carry the marker name is never truncated or removed; another name is
/// tried instead.
pub(crate) fn check_writable(dir: &Path) -> io::Result<()> {
    for attempt in 0..8u8 {
        let name = if attempt == 0 {
            WRITE_TEST_NAME.to_string()
        } else {
            format!("{WRITE_TEST_NAME}.{attempt}")
        };
        let marker = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(file) => {
                drop(file);
                if let Err(e) = fs::remove_file(&marker) {
                    debug!("Could not remove write test file {}: {}", marker.display(), e);
                }
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "every write test file name is taken",
    ))
}

/// Reject names that are not a single, plain path component.
fn validate_entry_name(dir: &Path, name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(Error::FileSystem(FileSystemError::InvalidPath {
            path: dir.join(name),
            reason: format!("'{name}' is not a valid entry name"),
        }));
    }
    Ok(())
}

/// A directory on the local file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDirectory {
    path: PathBuf,
}

impl LocalDirectory {
    /// Open an existing directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(Error::FileSystem(FileSystemError::NotFound { path }));
        }
        if !path.is_dir() {
            return Err(Error::FileSystem(FileSystemError::InvalidPath {
                path,
                reason: "not a directory".to_string(),
            }));
        }
        Ok(Self { path })
    }

    /// The directory's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DirectoryHandle for LocalDirectory {
    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn is_directory(&self) -> bool {
        self.path.is_dir()
    }

    fn can_write(&self) -> bool {
        match check_writable(&self.path) {
            Ok(()) => true,
            Err(e) => {
                debug!("Directory {} is not writable: {}", self.path.display(), e);
                false
            }
        }
    }

    fn find_child(&self, name: &str) -> Result<Option<ChildEntry>> {
        validate_entry_name(&self.path, name)?;
        let child = self.path.join(name);
        match fs::symlink_metadata(&child) {
            Ok(_) if child.is_dir() => Ok(Some(ChildEntry::Directory(Box::new(Self {
                path: child,
            })))),
            Ok(_) => Ok(Some(ChildEntry::File)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::FileSystem(FileSystemError::ReadFailed {
                path: child,
                reason: e.to_string(),
            })),
        }
    }

    fn create_directory(&self, name: &str) -> Result<Box<dyn DirectoryHandle>> {
        validate_entry_name(&self.path, name)?;
        let child = self.path.join(name);
        fs::create_dir(&child).map_err(|e| {
            Error::FileSystem(FileSystemError::CreateDirFailed {
                path: child.clone(),
                reason: e.to_string(),
            })
        })?;
        debug!("Created directory {}", child.display());
        Ok(Box::new(Self { path: child }))
    }

    fn create_file(&self, name: &str, mime_type: &str) -> Result<Box<dyn TargetFile>> {
        validate_entry_name(&self.path, name)?;
        let child = self.path.join(name);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&child)
            .map_err(|e| {
                Error::FileSystem(FileSystemError::WriteFailed {
                    path: child.clone(),
                    reason: e.to_string(),
                })
            })?;
        debug!("Created file {} ({})", child.display(), mime_type);
        Ok(Box::new(LocalFile {
            path: child,
            mime_type: mime_type.to_string(),
        }))
    }

    fn duplicate(&self) -> Box<dyn DirectoryHandle> {
        Box::new(self.clone())
    }
}

/// A file on the local file system created by [`LocalDirectory::create_file`].
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    mime_type: String,
}

impl LocalFile {
    /// The file's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The mime type the file was created with.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl TargetFile for LocalFile {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn open_writer(&self) -> Result<Box<dyn Write + Send>> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| {
                Error::FileSystem(FileSystemError::WriteFailed {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            })?;
        Ok(Box::new(file))
    }

    fn set_modified(&self, time: SystemTime) -> Result<()> {
        filetime::set_file_mtime(&self.path, filetime::FileTime::from_system_time(time)).map_err(
            |e| {
                Error::FileSystem(FileSystemError::WriteFailed {
                    path: self.path.clone(),
                    reason: format!("Failed to set modification time: {e}"),
                })
            },
        )
    }

    fn delete(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| {
            Error::FileSystem(FileSystemError::DeleteFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_directory() {
        let temp = TempDir::new().expect("create temp dir");
        let result = LocalDirectory::open(temp.path().join("missing"));
        assert!(matches!(
            result,
            Err(Error::FileSystem(FileSystemError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_open_file_is_rejected() {
        let temp = TempDir::new().expect("create temp dir");
        let file = temp.path().join("plain.txt");
        fs::write(&file, b"x").expect("write");
        let result = LocalDirectory::open(&file);
        assert!(matches!(
            result,
            Err(Error::FileSystem(FileSystemError::InvalidPath { .. }))
        ));
    }

    #[test]
    fn test_can_write_leaves_no_marker_behind() {
        let temp = TempDir::new().expect("create temp dir");
        let dir = LocalDirectory::open(temp.path()).expect("open");
        assert!(dir.can_write());
        assert!(!temp.path().join(WRITE_TEST_NAME).exists());
    }

    #[test]
    fn test_can_write_keeps_existing_marker_file() {
        let temp = TempDir::new().expect("create temp dir");
        let existing = temp.path().join(WRITE_TEST_NAME);
        fs::write(&existing, b"user data").expect("write");
        let dir = LocalDirectory::open(temp.path()).expect("open");

        assert!(dir.can_write());
        assert_eq!(fs::read(&existing).expect("read"), b"user data");
        assert_eq!(fs::read_dir(temp.path()).expect("list").count(), 1);
    }

    #[test]
    fn test_find_child_kinds() {
        let temp = TempDir::new().expect("create temp dir");
        fs::create_dir(temp.path().join("DCIM")).expect("mkdir");
        fs::write(temp.path().join("photo.jpg"), b"jpeg").expect("write");
        let dir = LocalDirectory::open(temp.path()).expect("open");

        let found = dir.find_child("DCIM").expect("lookup");
        assert!(found.is_some_and(|c| c.is_directory()));

        let found = dir.find_child("photo.jpg").expect("lookup");
        assert!(matches!(found, Some(ChildEntry::File)));

        assert!(dir.find_child("nothing").expect("lookup").is_none());
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let temp = TempDir::new().expect("create temp dir");
        let dir = LocalDirectory::open(temp.path()).expect("open");
        assert!(dir.find_child("..").is_err());
        assert!(dir.create_directory("a/b").is_err());
        assert!(dir.create_file("", "image/png").is_err());
    }

    #[test]
    fn test_create_file_does_not_clobber() {
        let temp = TempDir::new().expect("create temp dir");
        fs::write(temp.path().join("a.png"), b"original").expect("write");
        let dir = LocalDirectory::open(temp.path()).expect("open");

        assert!(dir.create_file("a.png", "image/png").is_err());
        assert_eq!(
            fs::read(temp.path().join("a.png")).expect("read"),
            b"original"
        );
    }

    #[test]
    fn test_target_file_write_touch_delete() {
        let temp = TempDir::new().expect("create temp dir");
        let dir = LocalDirectory::open(temp.path()).expect("open");
        let target = dir.create_file("clip.mp4", "video/mp4").expect("create");
        assert_eq!(target.name(), "clip.mp4");

        {
            let mut writer = target.open_writer().expect("writer");
            writer.write_all(b"frames").expect("write");
        }
        let path = temp.path().join("clip.mp4");
        assert_eq!(fs::read(&path).expect("read"), b"frames");

        let when = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        target.set_modified(when).expect("set mtime");
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .expect("mtime");
        assert_eq!(modified, when);

        target.delete().expect("delete");
        assert!(!path.exists());
    }
}

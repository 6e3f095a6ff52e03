//! Media catalog and source access.
//!
//! [`MediaCatalog`] enumerates media as [`TransferRecord`]s, and
//! [`MediaSource`] reads and deletes the bytes behind a record's locator.
//! [`LocalMediaLibrary`] implements both on top of a directory tree.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, FileSystemError, Result};
use crate::record::{MediaFilter, MediaKind, SourceLocator, TransferRecord, UNKNOWN_DISPLAY_NAME};

/// Image extensions and their mime types.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("dng", "image/x-adobe-dng"),
];

/// Video extensions and their mime types.
const VIDEO_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("3gp", "video/3gpp"),
    ("mts", "video/mp2t"),
];

/// Classify a file by extension, returning its kind and mime type.
#[must_use]
pub fn classify_media(path: &Path) -> Option<(MediaKind, &'static str)> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if let Some((_, mime)) = IMAGE_TYPES.iter().find(|(e, _)| *e == ext) {
        return Some((MediaKind::Image, *mime));
    }
    VIDEO_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| (MediaKind::Video, *mime))
}

/// Enumerates media records.
pub trait MediaCatalog: Send + Sync {
    /// Return the records accepted by `filter`.
    fn query(&self, filter: MediaFilter) -> Result<Vec<TransferRecord>>;
}

/// Reads and deletes the source behind a locator.
#[cfg_attr(test, mockall::automock)]
pub trait MediaSource: Send + Sync {
    /// Open a reader on the source bytes.
    fn open_reader(&self, locator: &SourceLocator) -> Result<Box<dyn Read + Send>>;

    /// Delete the source.
    fn delete(&self, locator: &SourceLocator) -> Result<()>;
}

/// Media stored as plain files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalMediaLibrary {
    root: PathBuf,
}

impl LocalMediaLibrary {
    /// Create a library rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::FileSystem(FileSystemError::NotFound { path: root }));
        }
        Ok(Self { root })
    }

    /// The library root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build a record for one file, or `None` if it is not media.
    fn record_for(&self, id: u64, path: &Path) -> Option<TransferRecord> {
        let (kind, mime) = classify_media(path)?;
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", path.display(), e);
                return None;
            }
        };

        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string());

        let relative_path = path
            .parent()
            .and_then(|parent| parent.strip_prefix(&self.root).ok())
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(|rel| {
                let joined = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                format!("{joined}/")
            });

        let last_modified_millis = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));

        Some(TransferRecord {
            id,
            source: SourceLocator::from_path(path),
            display_name,
            size_bytes: metadata.len(),
            mime_type: Some(mime.to_string()),
            relative_path,
            last_modified_millis,
            kind,
        })
    }

    /// Whether a locator points inside the library.
    ///
    /// `..` components are refused outright, and the containing directory is
    /// compared after resolving symlinks, so neither can lead out of the root.
    fn owns(&self, path: &Path) -> bool {
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return false;
        }
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return false;
        };
        match (parent.canonicalize(), self.root.canonicalize()) {
            (Ok(parent), Ok(root)) => parent.join(name).starts_with(root),
            _ => false,
        }
    }
}

impl MediaCatalog for LocalMediaLibrary {
    fn query(&self, filter: MediaFilter) -> Result<Vec<TransferRecord>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut next_id: u64 = 1;
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error while scanning {}: {}", self.root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(record) = self.record_for(next_id, entry.path())
                && filter.accepts(record.kind)
            {
                next_id += 1;
                records.push(record);
            }
        }

        records.sort_by_cached_key(|r| r.display_name.to_lowercase());
        info!(
            "Found {} media files in {}",
            records.len(),
            self.root.display()
        );
        Ok(records)
    }
}

impl MediaSource for LocalMediaLibrary {
    fn open_reader(&self, locator: &SourceLocator) -> Result<Box<dyn Read + Send>> {
        let path = locator.to_path();
        let file = File::open(&path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.clone(),
                reason: e.to_string(),
            })
        })?;
        Ok(Box::new(file))
    }

    fn delete(&self, locator: &SourceLocator) -> Result<()> {
        let path = locator.to_path();
        if !self.owns(&path) {
            return Err(Error::FileSystem(FileSystemError::InvalidPath {
                path,
                reason: format!("outside of media library {}", self.root.display()),
            }));
        }
        fs::remove_file(&path).map_err(|e| {
            Error::FileSystem(FileSystemError::DeleteFailed {
                path: path.clone(),
                reason: e.to_string(),
            })
        })?;
        debug!("Deleted original {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&path, content).expect("write");
        path
    }

    #[test]
    fn test_classify_media() {
        assert_eq!(
            classify_media(Path::new("a/IMG_1.JPG")),
            Some((MediaKind::Image, "image/jpeg"))
        );
        assert_eq!(
            classify_media(Path::new("clip.mov")),
            Some((MediaKind::Video, "video/quicktime"))
        );
        assert_eq!(classify_media(Path::new("notes.txt")), None);
        assert_eq!(classify_media(Path::new("no_extension")), None);
    }

    #[test]
    fn test_query_builds_records() {
        let temp = TempDir::new().expect("create temp dir");
        write(temp.path(), "DCIM/Camera/b.jpg", b"bbbb");
        write(temp.path(), "Movies/a.mp4", b"aa");
        write(temp.path(), "top.png", b"");
        write(temp.path(), "DCIM/readme.txt", b"ignored");
        write(temp.path(), ".thumbnails/c.jpg", b"hidden");

        let library = LocalMediaLibrary::new(temp.path()).expect("library");
        let records = library.query(MediaFilter::ALL).expect("query");

        let names: Vec<_> = records.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["a.mp4", "b.jpg", "top.png"]);

        let camera = &records[1];
        assert_eq!(camera.relative_path.as_deref(), Some("DCIM/Camera/"));
        assert_eq!(camera.size_bytes, 4);
        assert_eq!(camera.kind, MediaKind::Image);
        assert_eq!(camera.mime_type.as_deref(), Some("image/jpeg"));
        assert!(camera.last_modified_millis > 0);

        assert_eq!(records[0].kind, MediaKind::Video);
        assert_eq!(records[2].relative_path, None);

        let mut ids: Vec<_> = records.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_query_filters_by_kind() {
        let temp = TempDir::new().expect("create temp dir");
        write(temp.path(), "a.jpg", b"x");
        write(temp.path(), "b.mp4", b"y");
        let library = LocalMediaLibrary::new(temp.path()).expect("library");

        let videos = library
            .query(MediaFilter {
                images: false,
                videos: true,
            })
            .expect("query");
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].display_name, "b.mp4");

        let none = library
            .query(MediaFilter {
                images: false,
                videos: false,
            })
            .expect("query");
        assert!(none.is_empty());
    }

    #[test]
    fn test_open_and_delete() {
        let temp = TempDir::new().expect("create temp dir");
        let path = write(temp.path(), "a.jpg", b"content");
        let library = LocalMediaLibrary::new(temp.path()).expect("library");
        let locator = SourceLocator::from_path(&path);

        let mut buf = String::new();
        library
            .open_reader(&locator)
            .expect("open")
            .read_to_string(&mut buf)
            .expect("read");
        assert_eq!(buf, "content");

        library.delete(&locator).expect("delete");
        assert!(!path.exists());
        assert!(library.open_reader(&locator).is_err());
    }

    #[test]
    fn test_delete_outside_library_is_refused() {
        let library_dir = TempDir::new().expect("create temp dir");
        let other_dir = TempDir::new().expect("create temp dir");
        let outside = write(other_dir.path(), "keep.jpg", b"keep");

        let library = LocalMediaLibrary::new(library_dir.path()).expect("library");
        assert!(library.delete(&SourceLocator::from_path(&outside)).is_err());
        assert!(outside.exists());
    }

    #[test]
    fn test_delete_refuses_parent_segments() {
        let temp = TempDir::new().expect("create temp dir");
        fs::create_dir(temp.path().join("library")).expect("mkdir");
        let outside = write(temp.path(), "other/keep.jpg", b"keep");
        let library = LocalMediaLibrary::new(temp.path().join("library")).expect("library");

        let sneaky = SourceLocator::from_path(&temp.path().join("library/../other/keep.jpg"));
        let result = library.delete(&sneaky);
        assert!(matches!(
            result,
            Err(Error::FileSystem(FileSystemError::InvalidPath { .. }))
        ));
        assert!(outside.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_refuses_symlinked_directory_out_of_root() {
        let temp = TempDir::new().expect("create temp dir");
        fs::create_dir(temp.path().join("library")).expect("mkdir");
        let outside = write(temp.path(), "other/keep.jpg", b"keep");
        std::os::unix::fs::symlink(temp.path().join("other"), temp.path().join("library/link"))
            .expect("symlink");
        let library = LocalMediaLibrary::new(temp.path().join("library")).expect("library");

        let via_link = SourceLocator::from_path(&temp.path().join("library/link/keep.jpg"));
        assert!(library.delete(&via_link).is_err());
        assert!(outside.exists());
    }
}

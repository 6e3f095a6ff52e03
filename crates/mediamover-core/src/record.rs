//! Transfer records: the unit of work handed to the transfer engine.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Mime type used when a record does not declare one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Display name used when the catalog has no name for an entry.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// Kind of media a record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image.
    Image,
    /// Video clip.
    Video,
}

impl MediaKind {
    /// Folder used under the destination root when a record has no relative path.
    #[must_use]
    pub const fn default_folder(self) -> &'static str {
        match self {
            Self::Image => "Pictures",
            Self::Video => "Movies",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Which media kinds a catalog query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFilter {
    /// Include images.
    pub images: bool,
    /// Include videos.
    pub videos: bool,
}

impl MediaFilter {
    /// Both images and videos.
    pub const ALL: Self = Self {
        images: true,
        videos: true,
    };

    /// Whether the filter accepts the given kind.
    #[must_use]
    pub const fn accepts(self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Image => self.images,
            MediaKind::Video => self.videos,
        }
    }

    /// Whether the filter accepts nothing at all.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.images && !self.videos
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// Opaque handle used to read and delete a record's source bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceLocator(String);

impl SourceLocator {
    /// Wrap a raw locator string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Locator for a file on the local file system.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    /// The raw locator string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the locator as a local file system path.
    #[must_use]
    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One media item queued for relocation.
///
/// Records are built by a catalog and are never mutated by the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Identity from the source catalog, unique within a batch.
    pub id: u64,
    /// Handle used to read and delete the source.
    pub source: SourceLocator,
    /// Leaf file name. Not guaranteed unique.
    pub display_name: String,
    /// Expected size in bytes. Zero is a legitimate size.
    pub size_bytes: u64,
    /// Declared mime type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Slash separated folder the item lived in, e.g. `DCIM/Camera/`.
    #[serde(default)]
    pub relative_path: Option<String>,
    /// Last modification time in milliseconds since the Unix epoch, 0 if unknown.
    #[serde(default)]
    pub last_modified_millis: i64,
    /// Media kind.
    pub kind: MediaKind,
}

impl TransferRecord {
    /// The mime type to create the target with.
    #[must_use]
    pub fn effective_mime_type(&self) -> &str {
        self.mime_type
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
    }

    /// The relative path the target is placed under.
    ///
    /// Falls back to the kind's default folder only when the record has no
    /// path at all. A path of slashes, such as `"/"`, names the root itself.
    #[must_use]
    pub fn target_relative_path(&self) -> &str {
        match self.relative_path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => self.kind.default_folder(),
        }
    }

    /// Last modification time, if known.
    #[must_use]
    pub fn last_modified(&self) -> Option<SystemTime> {
        let millis = u64::try_from(self.last_modified_millis).ok()?;
        if millis == 0 {
            return None;
        }
        UNIX_EPOCH.checked_add(Duration::from_millis(millis))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransferRecord {
        TransferRecord {
            id: 7,
            source: SourceLocator::new("/storage/DCIM/Camera/IMG_0001.jpg"),
            display_name: "IMG_0001.jpg".to_string(),
            size_bytes: 1024,
            mime_type: Some("image/jpeg".to_string()),
            relative_path: Some("DCIM/Camera/".to_string()),
            last_modified_millis: 1_700_000_000_000,
            kind: MediaKind::Image,
        }
    }

    #[test]
    fn test_default_folders() {
        assert_eq!(MediaKind::Image.default_folder(), "Pictures");
        assert_eq!(MediaKind::Video.default_folder(), "Movies");
    }

    #[test]
    fn test_effective_mime_type_defaults() {
        let mut record = sample();
        assert_eq!(record.effective_mime_type(), "image/jpeg");
        record.mime_type = None;
        assert_eq!(record.effective_mime_type(), DEFAULT_MIME_TYPE);
        record.mime_type = Some("  ".to_string());
        assert_eq!(record.effective_mime_type(), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_target_relative_path_falls_back_to_kind() {
        let mut record = sample();
        assert_eq!(record.target_relative_path(), "DCIM/Camera/");

        record.relative_path = Some("/".to_string());
        assert_eq!(record.target_relative_path(), "/");

        record.relative_path = Some(String::new());
        assert_eq!(record.target_relative_path(), "Pictures");

        record.relative_path = None;
        record.kind = MediaKind::Video;
        assert_eq!(record.target_relative_path(), "Movies");
    }

    #[test]
    fn test_last_modified() {
        let mut record = sample();
        let expected = UNIX_EPOCH + Duration::from_millis(1_700_000_000_000);
        assert_eq!(record.last_modified(), Some(expected));

        record.last_modified_millis = 0;
        assert_eq!(record.last_modified(), None);

        record.last_modified_millis = -5;
        assert_eq!(record.last_modified(), None);
    }

    #[test]
    fn test_media_filter() {
        let images_only = MediaFilter {
            images: true,
            videos: false,
        };
        assert!(images_only.accepts(MediaKind::Image));
        assert!(!images_only.accepts(MediaKind::Video));
        assert!(!images_only.is_empty());
        assert!(
            MediaFilter {
                images: false,
                videos: false
            }
            .is_empty()
        );
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(json["source"], "/storage/DCIM/Camera/IMG_0001.jpg");
        assert_eq!(json["kind"], "image");

        let minimal = r#"{"id":1,"source":"/a.png","display_name":"a.png","size_bytes":3,"kind":"video"}"#;
        let record: TransferRecord = serde_json::from_str(minimal).expect("deserialize");
        assert_eq!(record.mime_type, None);
        assert_eq!(record.relative_path, None);
        assert_eq!(record.kind, MediaKind::Video);
    }
}

//! Destination directory and file name resolution.
//!
//! [`resolve_directory`] mirrors a record's relative path under the
//! destination root, creating missing folders. [`unique_name`] picks a file
//! name that is free in a directory using `"name (n).ext"` suffixes.

use tracing::debug;

use crate::error::TransferError;
use crate::fs::{ChildEntry, DirectoryHandle};

/// Walk `relative_path` below `root`, creating missing directories.
///
/// An empty or missing path resolves to `root` itself. Resolution is
/// idempotent: resolving the same path twice yields the same folder.
pub fn resolve_directory(
    root: &dyn DirectoryHandle,
    relative_path: Option<&str>,
) -> Result<Box<dyn DirectoryHandle>, TransferError> {
    let cleaned = relative_path.unwrap_or_default().trim_matches('/');
    let mut current = root.duplicate();
    if cleaned.is_empty() {
        return Ok(current);
    }

    for segment in cleaned.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(TransferError::DirectoryCreateFailed {
                segment: segment.to_string(),
                reason: "relative segments are not allowed".to_string(),
            });
        }

        let existing = current
            .find_child(segment)
            .map_err(|e| TransferError::DirectoryCreateFailed {
                segment: segment.to_string(),
                reason: e.to_string(),
            })?;

        current = match existing {
            Some(ChildEntry::Directory(dir)) => dir,
            Some(ChildEntry::File) => {
                return Err(TransferError::DirectoryConflict {
                    segment: segment.to_string(),
                });
            }
            None => {
                debug!(
                    "Creating directory '{}' in {}",
                    segment,
                    current.display_path()
                );
                current.create_directory(segment).map_err(|e| {
                    TransferError::DirectoryCreateFailed {
                        segment: segment.to_string(),
                        reason: e.to_string(),
                    }
                })?
            }
        };
    }

    Ok(current)
}

/// Split a file name into base and extension at the last dot.
///
/// A leading dot counts too: `.nomedia` has an empty base.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) => (&name[..idx], Some(&name[idx + 1..])),
        None => (name, None),
    }
}

/// Return `desired` if it is free in `dir`, otherwise the first free
/// `"{base} (n){.ext}"` for n = 1, 2, ...
///
/// Only computes a name; nothing is created.
pub fn unique_name(dir: &dyn DirectoryHandle, desired: &str) -> crate::Result<String> {
    if dir.find_child(desired)?.is_none() {
        return Ok(desired.to_string());
    }

    let (base, ext) = split_extension(desired);
    let mut n: u64 = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{base} ({n}).{ext}"),
            None => format!("{base} ({n})"),
        };
        if dir.find_child(&candidate)?.is_none() {
            debug!("Name '{}' taken, using '{}'", desired, candidate);
            return Ok(candidate);
        }
        n += 1;
    }
}

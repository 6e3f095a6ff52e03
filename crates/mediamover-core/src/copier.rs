//! Chunked stream copying.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// Default chunk size for copies (64 KB).
/// Large enough for video files without holding much memory.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Minimum chunk size allowed (4 KB).
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Maximum chunk size allowed (1 MB).
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Copies bytes from a reader to a writer through a fixed buffer.
///
/// The copier never closes either stream; callers own their lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCopier {
    chunk_size: usize,
}

impl StreamCopier {
    /// Create a copier with the given chunk size.
    pub fn new(chunk_size: usize) -> Result<Self> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(Error::Configuration(format!(
                "chunk_size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE} bytes"
            )));
        }
        Ok(Self { chunk_size })
    }

    /// The configured chunk size.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Copy until `reader` is exhausted, then flush `writer`.
    ///
    /// Returns the exact number of bytes written. Any read or write fault is
    /// returned as is; bytes already written are left in place.
    pub fn copy<R, W>(&self, reader: &mut R, writer: &mut W) -> io::Result<u64>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            writer.write_all(&buffer[..read])?;
            total += read as u64;
        }

        writer.flush()?;
        Ok(total)
    }
}

impl Default for StreamCopier {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

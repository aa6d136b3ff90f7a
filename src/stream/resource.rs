//! Shared byte resources backing data streams
//!
//! A [`Resource`] is the physical backing store for one or more
//! [`DataStream`](super::DataStream) windows: either a growable in-memory
//! buffer or an exclusively opened file. Streams share a resource through a
//! reference-counted handle; the buffer or file handle is released when the
//! last stream over it is disposed or dropped.

use crate::error::{Result, RomkitError};
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Reference-counted handle to a byte resource.
///
/// Every stream over the same resource holds a clone of this handle; the
/// strong count is the number of live views.
pub type SharedResource = Rc<RefCell<Resource>>;

/// Open mode for file-backed resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOpenMode {
    /// Read-only access to an existing file.
    Read,
    /// Write access, truncating or creating the file.
    Write,
    /// Read and write access, creating the file if missing.
    ReadWrite,
    /// Read and write access with the cursor starting at the end.
    Append,
}

enum Backing {
    Memory(Vec<u8>),
    File(std::fs::File),
}

/// Physical backing store for data streams.
pub struct Resource {
    backing: Backing,
    size: u64,
}

impl Resource {
    /// Create an in-memory resource owning `data`.
    pub fn from_memory(data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Resource {
            backing: Backing::Memory(data),
            size,
        }
    }

    /// Open a file-backed resource.
    pub fn open<P: AsRef<Path>>(path: P, mode: FileOpenMode) -> Result<Self> {
        let mut options = OpenOptions::new();
        match mode {
            FileOpenMode::Read => {
                options.read(true);
            }
            FileOpenMode::Write => {
                options.write(true).create(true).truncate(true);
            }
            FileOpenMode::ReadWrite | FileOpenMode::Append => {
                options.read(true).write(true).create(true);
            }
        }

        let file = options.open(&path)?;
        let size = file.metadata()?.len();
        debug!(path = %path.as_ref().display(), ?mode, size, "opened file resource");

        Ok(Resource {
            backing: Backing::File(file),
            size,
        })
    }

    /// Wrap the resource into a shared handle.
    pub fn into_shared(self) -> SharedResource {
        Rc::new(RefCell::new(self))
    }

    /// Total size of the resource in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read `buf.len()` bytes starting at the absolute offset `at`.
    pub(crate) fn read_at(&mut self, at: u64, buf: &mut [u8]) -> Result<()> {
        let end = at + buf.len() as u64;
        if end > self.size {
            return Err(RomkitError::EndOfStream);
        }

        match &mut self.backing {
            Backing::Memory(data) => {
                let start = at as usize;
                buf.copy_from_slice(&data[start..start + buf.len()]);
            }
            Backing::File(file) => {
                file.seek(SeekFrom::Start(at))?;
                file.read_exact(buf)?;
            }
        }
        Ok(())
    }

    /// Write `buf` at the absolute offset `at`, growing the resource when the
    /// write end passes the current size.
    pub(crate) fn write_at(&mut self, at: u64, buf: &[u8]) -> Result<()> {
        let end = at + buf.len() as u64;

        match &mut self.backing {
            Backing::Memory(data) => {
                if end as usize > data.len() {
                    data.resize(end as usize, 0);
                }
                data[at as usize..end as usize].copy_from_slice(buf);
            }
            Backing::File(file) => {
                file.seek(SeekFrom::Start(at))?;
                file.write_all(buf)?;
            }
        }

        if end > self.size {
            self.size = end;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.backing {
            Backing::Memory(_) => "memory",
            Backing::File(_) => "file",
        };
        f.debug_struct("Resource")
            .field("kind", &kind)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_memory_read_write() {
        let mut resource = Resource::from_memory(vec![1, 2, 3, 4]);
        assert_eq!(resource.size(), 4);

        let mut buf = [0u8; 2];
        resource.read_at(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);

        resource.write_at(3, &[9, 9]).unwrap();
        assert_eq!(resource.size(), 5);

        let mut buf = [0u8; 2];
        resource.read_at(3, &mut buf).unwrap();
        assert_eq!(buf, [9, 9]);
    }

    #[test]
    fn test_memory_read_past_end() {
        let mut resource = Resource::from_memory(vec![0; 4]);
        let mut buf = [0u8; 8];
        assert!(matches!(
            resource.read_at(0, &mut buf),
            Err(RomkitError::EndOfStream)
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let temp = NamedTempFile::new().unwrap();
        let mut resource = Resource::open(temp.path(), FileOpenMode::ReadWrite).unwrap();
        assert_eq!(resource.size(), 0);

        resource.write_at(0, b"hello").unwrap();
        assert_eq!(resource.size(), 5);

        let mut buf = [0u8; 5];
        resource.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_file_write_truncates() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"previous contents").unwrap();

        let resource = Resource::open(temp.path(), FileOpenMode::Write).unwrap();
        assert_eq!(resource.size(), 0);
    }
}

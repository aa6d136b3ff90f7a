//! Bounded, shareable windows over byte resources
//!
//! [`DataStream`] is the addressing primitive of the crate: a window
//! (`offset`, `length`) over a shared [`Resource`] with an independent cursor.
//! Many streams may alias one resource, including overlapping ranges; this is
//! how sibling formats address distinct logical files packed inside one
//! physical container without reopening it. The resource is released when the
//! last stream over it is disposed or dropped.

pub mod resource;

pub use resource::{FileOpenMode, Resource, SharedResource};

use crate::error::{Result, RomkitError};
use std::path::Path;
use std::rc::Rc;
use tracing::trace;

/// Chunk size for stream-to-stream copies and comparisons.
const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Origin for [`DataStream::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Beginning of the window.
    Start,
    /// Current cursor position.
    Current,
    /// End of the window.
    End,
}

/// Bounded, seekable window over a shared byte resource.
///
/// Invariants: `0 <= position <= length` and
/// `offset + length <= resource.size`. The window length grows when a write
/// runs past its end (append semantics); it never shrinks.
pub struct DataStream {
    resource: Option<SharedResource>,
    offset: u64,
    length: u64,
    position: u64,
}

impl DataStream {
    /// Create a stream over a fresh, empty in-memory resource.
    pub fn new() -> Self {
        Self::from_memory(Vec::new())
    }

    /// Create a stream covering a new in-memory resource owning `data`.
    pub fn from_memory(data: Vec<u8>) -> Self {
        let resource = Resource::from_memory(data).into_shared();
        let length = resource.borrow().size();
        DataStream {
            resource: Some(resource),
            offset: 0,
            length,
            position: 0,
        }
    }

    /// Open a file and create a stream covering it.
    ///
    /// With [`FileOpenMode::Append`] the cursor starts at the end of the
    /// window; every other mode starts it at zero.
    pub fn from_file<P: AsRef<Path>>(path: P, mode: FileOpenMode) -> Result<Self> {
        let resource = Resource::open(path, mode)?.into_shared();
        let length = resource.borrow().size();
        let position = match mode {
            FileOpenMode::Append => length,
            _ => 0,
        };
        Ok(DataStream {
            resource: Some(resource),
            offset: 0,
            length,
            position,
        })
    }

    /// Create a stream over an explicit range of an existing resource.
    ///
    /// A `length` of `None` means "rest of the resource from `offset`".
    pub fn with_resource(
        resource: SharedResource,
        offset: u64,
        length: Option<u64>,
    ) -> Result<Self> {
        let size = resource.borrow().size();
        if offset > size {
            return Err(RomkitError::OutOfRange {
                offset,
                length: 0,
                size,
            });
        }
        let length = length.unwrap_or(size - offset);
        if offset + length > size {
            return Err(RomkitError::OutOfRange {
                offset,
                length,
                size,
            });
        }
        Ok(DataStream {
            resource: Some(resource),
            offset,
            length,
            position: 0,
        })
    }

    /// Create a sub-window of this stream sharing the same resource.
    ///
    /// `offset` is relative to this stream's window and composes additively
    /// toward the resource; a `length` of `None` means "rest of this window".
    pub fn slice(&self, offset: u64, length: Option<u64>) -> Result<DataStream> {
        let resource = self.resource()?;
        if offset > self.length {
            return Err(RomkitError::OutOfRange {
                offset,
                length: 0,
                size: self.length,
            });
        }
        let length = length.unwrap_or(self.length - offset);
        if offset + length > self.length {
            return Err(RomkitError::OutOfRange {
                offset,
                length,
                size: self.length,
            });
        }
        Ok(DataStream {
            resource: Some(Rc::clone(resource)),
            offset: self.offset + offset,
            length,
            position: 0,
        })
    }

    /// Window start, absolute within the resource.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Window size in bytes.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// True when the window is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Cursor position, relative to the window start.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.resource.is_none()
    }

    /// Number of live streams sharing this stream's resource.
    pub fn view_count(&self) -> Result<usize> {
        Ok(Rc::strong_count(self.resource()?))
    }

    /// Move the cursor and return the new position.
    ///
    /// The resulting position is clamped to `[0, length]`; seeking never
    /// fails on an open stream.
    pub fn seek(&mut self, amount: i64, origin: SeekOrigin) -> Result<u64> {
        self.resource()?;
        let base: i128 = match origin {
            SeekOrigin::Start => 0,
            SeekOrigin::Current => self.position as i128,
            SeekOrigin::End => self.length as i128,
        };
        let target = base + amount as i128;
        self.position = target.clamp(0, self.length as i128) as u64;
        Ok(self.position)
    }

    /// Read a single byte and advance the cursor.
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read(&mut buf)?;
        Ok(buf[0])
    }

    /// Fill `buf` from the current position and advance the cursor.
    ///
    /// Fails with `EndOfStream` when the request crosses the window end; no
    /// partial reads.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let resource = self.resource()?;
        let end = self.position + buf.len() as u64;
        if end > self.length {
            return Err(RomkitError::EndOfStream);
        }
        resource.borrow_mut().read_at(self.offset + self.position, buf)?;
        self.position = end;
        Ok(())
    }

    /// Write a single byte at the current position and advance the cursor.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    /// Write `buf` at the current position and advance the cursor.
    ///
    /// A write running past the window end grows the window (and the backing
    /// resource) to cover it.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        let end = self.position + buf.len() as u64;
        let resource = self.resource()?;
        resource.borrow_mut().write_at(self.offset + self.position, buf)?;
        if end > self.length {
            self.length = end;
        }
        self.position = end;
        Ok(())
    }

    /// Stream the whole window into `destination`.
    ///
    /// Copies through a fixed-size chunk buffer, restores this stream's
    /// cursor afterward, and advances the destination cursor. Returns the
    /// number of bytes copied.
    pub fn write_to(&mut self, destination: &mut DataStream) -> Result<u64> {
        self.resource()?;
        destination.resource()?;
        let saved = self.position;
        self.position = 0;
        let outcome = self.copy_chunked(destination, self.length);
        self.position = saved;
        outcome
    }

    /// Stream `count` bytes from the current position into `destination`.
    ///
    /// Restores this stream's cursor afterward; advances the destination
    /// cursor. Fails with `EndOfStream` when fewer than `count` bytes remain.
    pub fn write_segment_to(&mut self, destination: &mut DataStream, count: u64) -> Result<u64> {
        self.resource()?;
        destination.resource()?;
        if self.position + count > self.length {
            return Err(RomkitError::EndOfStream);
        }
        let saved = self.position;
        let outcome = self.copy_chunked(destination, count);
        self.position = saved;
        outcome
    }

    fn copy_chunked(&mut self, destination: &mut DataStream, count: u64) -> Result<u64> {
        let mut buffer = [0u8; COPY_BUFFER_SIZE];
        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(COPY_BUFFER_SIZE as u64) as usize;
            self.read(&mut buffer[..chunk])?;
            destination.write(&buffer[..chunk])?;
            remaining -= chunk as u64;
        }
        Ok(count)
    }

    /// Compare the full contents of two streams.
    ///
    /// Returns `false` whenever the lengths differ; otherwise compares
    /// byte-wise in chunks and short-circuits on the first mismatch. Both
    /// cursors are restored regardless of the outcome.
    pub fn compare(&mut self, other: &mut DataStream) -> Result<bool> {
        self.resource()?;
        other.resource()?;
        if self.length != other.length {
            return Ok(false);
        }

        let saved_self = self.position;
        let saved_other = other.position;
        self.position = 0;
        other.position = 0;

        let outcome = self.compare_chunked(other);

        self.position = saved_self;
        other.position = saved_other;
        outcome
    }

    fn compare_chunked(&mut self, other: &mut DataStream) -> Result<bool> {
        let mut left = [0u8; COPY_BUFFER_SIZE];
        let mut right = [0u8; COPY_BUFFER_SIZE];
        let mut remaining = self.length;
        while remaining > 0 {
            let chunk = remaining.min(COPY_BUFFER_SIZE as u64) as usize;
            self.read(&mut left[..chunk])?;
            other.read(&mut right[..chunk])?;
            if left[..chunk] != right[..chunk] {
                return Ok(false);
            }
            remaining -= chunk as u64;
        }
        Ok(true)
    }

    /// Release this stream's hold on the shared resource.
    ///
    /// Idempotent. The physical resource (buffer or file handle) is released
    /// only when the last stream over it is disposed; any I/O afterward on
    /// this stream fails with `Disposed`.
    pub fn dispose(&mut self) {
        if let Some(resource) = self.resource.take() {
            if Rc::strong_count(&resource) == 1 {
                trace!(resource = ?resource.borrow(), "releasing backing resource");
            }
        }
    }

    fn resource(&self) -> Result<&SharedResource> {
        self.resource
            .as_ref()
            .ok_or(RomkitError::Disposed("DataStream"))
    }
}

impl Default for DataStream {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStream")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("position", &self.position)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

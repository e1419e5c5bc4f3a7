//! Shared immutable backing storage for parsed containers.

use std::fmt;
use std::fs::File;
use std::ops::{Deref, Range};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::{Error, Result};

enum Storage {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Storage {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Owned(data) => data,
        }
    }
}

/// A reference-counted, read-only byte region backing a parsed container.
///
/// Cloning is cheap (an `Arc` bump). The contents are never mutated after
/// construction, so any number of views may read it from any thread.
#[derive(Clone)]
pub struct ArchiveBuffer {
    storage: Arc<Storage>,
}

impl ArchiveBuffer {
    /// Memory-map a file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // Empty files cannot be mapped on every platform.
        if file.metadata()?.len() == 0 {
            return Ok(Self::from_vec(Vec::new()));
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            storage: Arc::new(Storage::Mapped(mmap)),
        })
    }

    /// Wrap an owned buffer.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            storage: Arc::new(Storage::Owned(data)),
        }
    }

    /// Length of the buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.bytes().len()
    }

    /// Whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the whole buffer.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// Check that `offset..offset+size` lies inside the buffer.
    pub fn check_range(&self, offset: u64, size: u64) -> Result<Range<usize>> {
        let len = self.len();
        let out_of_range = || Error::OffsetOutOfRange { offset, size, len };
        let end = offset.checked_add(size).ok_or_else(out_of_range)?;
        if end > len as u64 {
            return Err(out_of_range());
        }
        Ok(offset as usize..end as usize)
    }

    /// Create a zero-copy view of `size` bytes starting at `offset`.
    pub fn view(&self, offset: u64, size: u64) -> Result<ByteView> {
        let range = self.check_range(offset, size)?;
        Ok(ByteView {
            buffer: self.clone(),
            range,
        })
    }
}

impl From<Vec<u8>> for ArchiveBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl AsRef<[u8]> for ArchiveBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for ArchiveBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match *self.storage {
            Storage::Mapped(_) => "mapped",
            Storage::Owned(_) => "owned",
        };
        f.debug_struct("ArchiveBuffer")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

/// A bounds-checked slice of an [`ArchiveBuffer`].
///
/// Holds a reference to the backing buffer, so it stays valid independently
/// of the container it was obtained from.
#[derive(Clone)]
pub struct ByteView {
    buffer: ArchiveBuffer,
    range: Range<usize>,
}

impl ByteView {
    /// Absolute offset of this view in the backing buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.range.start
    }

    /// The backing buffer.
    #[inline]
    pub fn buffer(&self) -> &ArchiveBuffer {
        &self.buffer
    }

    /// Borrow the viewed bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer.as_bytes()[self.range.clone()]
    }
}

impl Deref for ByteView {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("offset", &self.range.start)
            .field("len", &self.range.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_view_is_bounds_checked() {
        let buffer = ArchiveBuffer::from_vec((0u8..16).collect());

        let view = buffer.view(4, 4).unwrap();
        assert_eq!(&*view, &[4, 5, 6, 7]);
        assert_eq!(view.offset(), 4);

        assert!(buffer.view(12, 4).is_ok());
        assert!(matches!(
            buffer.view(12, 5),
            Err(Error::OffsetOutOfRange { offset: 12, size: 5, len: 16 })
        ));
        assert!(buffer.view(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_views_share_storage() {
        let buffer = ArchiveBuffer::from_vec(vec![1, 2, 3]);
        let view = buffer.view(0, 3).unwrap();
        drop(buffer);
        assert_eq!(&*view, &[1, 2, 3]);
    }

    #[test]
    fn test_open_mapped_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"HUNEXGGEFA10").unwrap();
        file.flush().unwrap();

        let buffer = ArchiveBuffer::open(file.path()).unwrap();
        assert_eq!(buffer.as_bytes(), b"HUNEXGGEFA10");
    }

    #[test]
    fn test_open_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let buffer = ArchiveBuffer::open(file.path()).unwrap();
        assert!(buffer.is_empty());
    }
}

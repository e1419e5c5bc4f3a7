//! HFA archives.
//!
//! Layout:
//!
//! ```text
//! [0x00] Magic "HUNEXGGEFA10"          (12 bytes)
//! [0x0C] Entry count                   (u32 LE)
//! [0x10] Descriptors                   (count * 128 bytes)
//!        name      [u8; 96]  NUL-padded
//!        offset    u32 LE    relative to the end of the descriptor table
//!        size      u32 LE
//!        reserved  [u8; 24]
//! [....] Data region
//! ```

use std::path::Path;

use mages_common::{ArchiveBuffer, BinaryReader, BinaryWriter, ByteView};
use memchr::memchr;
use tracing::debug;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::nam::decode_name;
use crate::{Error, Result};

/// File signature.
pub const MAGIC: &[u8; 12] = b"HUNEXGGEFA10";

/// Size of the fixed header (magic + entry count).
pub const HEADER_LEN: usize = 16;

/// Size of one entry descriptor.
pub const DESCRIPTOR_LEN: usize = 128;

/// Size of the NUL-padded name field.
pub const NAME_LEN: usize = 96;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct RawDescriptor {
    name: [u8; NAME_LEN],
    offset: U32,
    size: U32,
    reserved: [u8; 24],
}

/// One HFA entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HfaEntry {
    /// File name, up to the first NUL.
    pub name: String,
    /// Offset relative to the start of the data region.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
}

/// A parsed HFA archive.
#[derive(Debug, Clone)]
pub struct HfaArchive {
    buffer: ArchiveBuffer,
    data_start: u64,
    entries: Vec<HfaEntry>,
}

impl HfaArchive {
    /// Memory-map and parse an HFA file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(ArchiveBuffer::open(path)?)
    }

    /// Parse an HFA archive from a buffer.
    pub fn parse(buffer: ArchiveBuffer) -> Result<Self> {
        let bytes = buffer.as_bytes();
        let mut reader = BinaryReader::new(bytes);
        reader.expect_magic(MAGIC)?;
        let count = reader.read_u32()? as usize;

        let data_start = (count as u64)
            .checked_mul(DESCRIPTOR_LEN as u64)
            .and_then(|table| table.checked_add(HEADER_LEN as u64))
            .filter(|&end| end <= bytes.len() as u64)
            .ok_or(mages_common::Error::TooShort {
                needed: HEADER_LEN.saturating_add(count.saturating_mul(DESCRIPTOR_LEN)),
                available: bytes.len(),
            })?;

        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            let raw: RawDescriptor = reader.read_struct()?;
            let entry = HfaEntry {
                name: decode_name(name_bytes(&raw.name), index),
                offset: raw.offset.get(),
                size: raw.size.get(),
            };
            buffer.check_range(data_start + u64::from(entry.offset), u64::from(entry.size))?;
            entries.push(entry);
        }

        debug!(entries = entries.len(), data_start, "parsed HFA archive");
        Ok(Self {
            buffer,
            data_start,
            entries,
        })
    }

    /// Pack named entries into a new HFA archive.
    ///
    /// Entries are stored back-to-back in the given order.
    pub fn build<N, D>(entries: &[(N, D)]) -> Result<Vec<u8>>
    where
        N: AsRef<str>,
        D: AsRef<[u8]>,
    {
        let count = u32::try_from(entries.len()).map_err(|_| Error::TooManyEntries {
            count: entries.len(),
            max: u32::MAX as usize,
        })?;

        let data_len: usize = entries.iter().map(|(_, data)| data.as_ref().len()).sum();
        let mut writer =
            BinaryWriter::with_capacity(HEADER_LEN + entries.len() * DESCRIPTOR_LEN + data_len);
        writer.write_bytes(MAGIC).write_u32(count);

        let mut offset = 0u64;
        for (index, (name, data)) in entries.iter().enumerate() {
            let name = name.as_ref();
            // One byte is kept for the terminating NUL.
            if name.len() >= NAME_LEN {
                return Err(Error::NameTooLong {
                    name: name.to_owned(),
                    max: NAME_LEN - 1,
                });
            }
            let size = data.as_ref().len() as u64;
            let too_large = || Error::EntryTooLarge {
                index,
                size,
                limit: u64::from(u32::MAX),
            };

            let mut raw = RawDescriptor::new_zeroed();
            raw.name[..name.len()].copy_from_slice(name.as_bytes());
            raw.offset = U32::new(u32::try_from(offset).map_err(|_| too_large())?);
            raw.size = U32::new(u32::try_from(size).map_err(|_| too_large())?);
            writer.write_struct(&raw);

            offset += size;
        }

        for (_, data) in entries {
            writer.write_bytes(data.as_ref());
        }

        Ok(writer.into_inner())
    }

    /// Absolute offset of the data region.
    #[inline]
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Get all entries.
    #[inline]
    pub fn entries(&self) -> &[HfaEntry] {
        &self.entries
    }

    /// Get entry by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&HfaEntry> {
        self.entries.get(index)
    }

    /// Find an entry by exact name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Zero-copy view of an entry's bytes.
    pub fn entry_data(&self, index: usize) -> Result<ByteView> {
        let entry = self.get(index).ok_or(Error::EntryNotFound(index))?;
        Ok(self
            .buffer
            .view(self.data_start + u64::from(entry.offset), u64::from(entry.size))?)
    }

    /// The backing buffer.
    #[inline]
    pub fn buffer(&self) -> &ArchiveBuffer {
        &self.buffer
    }
}

fn name_bytes(field: &[u8]) -> &[u8] {
    &field[..memchr(0, field).unwrap_or(field.len())]
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> Vec<u8> {
        HfaArchive::build(&[
            ("script.txt", b"hello".as_slice()),
            ("empty.bin", b"".as_slice()),
            ("image.png", b"\x89PNG....".as_slice()),
        ])
        .unwrap()
    }

    #[test]
    fn test_descriptor_size() {
        assert_eq!(std::mem::size_of::<RawDescriptor>(), DESCRIPTOR_LEN);
    }

    #[test]
    fn test_build_layout() {
        let bytes = sample();
        assert_eq!(&bytes[..12], MAGIC);
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(bytes.len(), HEADER_LEN + 3 * DESCRIPTOR_LEN + 5 + 8);

        // third descriptor: offset 5, size 8, reserved zero
        let third = &bytes[HEADER_LEN + 2 * DESCRIPTOR_LEN..][..DESCRIPTOR_LEN];
        assert_eq!(&third[..10], b"image.png\0");
        assert_eq!(&third[96..100], &5u32.to_le_bytes());
        assert_eq!(&third[100..104], &8u32.to_le_bytes());
        assert_eq!(&third[104..], &[0u8; 24]);
    }

    #[test]
    fn test_parse_built_archive() {
        let archive = HfaArchive::parse(ArchiveBuffer::from_vec(sample())).unwrap();

        assert_eq!(archive.len(), 3);
        assert_eq!(archive.data_start(), (HEADER_LEN + 3 * DESCRIPTOR_LEN) as u64);
        assert_eq!(archive.get(0).unwrap().name, "script.txt");
        assert_eq!(&*archive.entry_data(0).unwrap(), b"hello");
        assert!(archive.entry_data(1).unwrap().is_empty());
        assert_eq!(&*archive.entry_data(2).unwrap(), b"\x89PNG....");
        assert_eq!(archive.find("image.png"), Some(2));
        assert!(matches!(archive.entry_data(3), Err(Error::EntryNotFound(3))));
    }

    #[test]
    fn test_open_mapped_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&sample()).unwrap();
        file.flush().unwrap();

        let archive = HfaArchive::open(file.path()).unwrap();
        assert_eq!(archive.len(), 3);
        assert_eq!(&*archive.entry_data(2).unwrap(), b"\x89PNG....");

        assert!(matches!(
            HfaArchive::open(file.path().with_extension("missing")),
            Err(Error::Common(mages_common::Error::Io(_)))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        assert!(matches!(
            HfaArchive::parse(ArchiveBuffer::from_vec(b"HUNEX".to_vec())),
            Err(Error::Common(mages_common::Error::TooShort { .. }))
        ));
        assert!(matches!(
            HfaArchive::parse(ArchiveBuffer::from_vec(b"HUNEXGGEFA11\0\0\0\0".to_vec())),
            Err(Error::Common(mages_common::Error::BadMagic { .. }))
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_table_and_data() {
        let mut bytes = sample();
        bytes.truncate(HEADER_LEN + DESCRIPTOR_LEN);
        assert!(matches!(
            HfaArchive::parse(ArchiveBuffer::from_vec(bytes)),
            Err(Error::Common(mages_common::Error::TooShort { .. }))
        ));

        let mut bytes = sample();
        bytes.pop();
        assert!(matches!(
            HfaArchive::parse(ArchiveBuffer::from_vec(bytes)),
            Err(Error::Common(mages_common::Error::OffsetOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_name_too_long() {
        let name = "n".repeat(NAME_LEN);
        assert!(matches!(
            HfaArchive::build(&[(name.as_str(), b"".as_slice())]),
            Err(Error::NameTooLong { max: 95, .. })
        ));

        let name = "n".repeat(NAME_LEN - 1);
        let bytes = HfaArchive::build(&[(name.as_str(), b"x".as_slice())]).unwrap();
        let archive = HfaArchive::parse(bytes.into()).unwrap();
        assert_eq!(archive.get(0).unwrap().name, name);
    }
}

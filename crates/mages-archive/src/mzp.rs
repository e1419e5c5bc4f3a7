//! MZP archives.
//!
//! Layout:
//!
//! ```text
//! [0x00] Magic "mrgd00"                (6 bytes)
//! [0x06] Entry count                   (u16 LE)
//! [0x08] Descriptors                   (count * 8 bytes)
//!        sector_offset  u16 LE
//!        byte_offset    u16 LE
//!        size_sectors   u16 LE  upper bound, rounded up
//!        size_bytes     u16 LE  low 16 bits of the true size
//! [....] Data region
//! ```
//!
//! Entry offsets are relative to the start of the data region.

use std::path::Path;

use mages_common::sector::{sector_bytes, sectors_for, SECTOR_SIZE};
use mages_common::{ArchiveBuffer, BinaryReader, BinaryWriter, ByteView};
use tracing::{debug, warn};
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{Error, Result};

/// File signature.
pub const MAGIC: &[u8; 6] = b"mrgd00";

/// Size of the fixed header (magic + entry count).
pub const HEADER_LEN: usize = 8;

/// Size of one entry descriptor.
pub const DESCRIPTOR_LEN: usize = 8;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct RawDescriptor {
    sector_offset: U16,
    byte_offset: U16,
    size_sectors: U16,
    size_bytes: U16,
}

/// One MZP descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MzpDescriptor {
    pub sector_offset: u16,
    pub byte_offset: u16,
    pub size_sectors: u16,
    pub size_bytes: u16,
}

impl MzpDescriptor {
    /// Describe an entry of `size` bytes at `offset` within the data region.
    ///
    /// Returns `None` when the fields cannot hold the offset, or when the
    /// size would not be recovered by [`entry_data_size`](Self::entry_data_size).
    pub fn for_layout(offset: u64, size: u64) -> Option<Self> {
        let desc = Self {
            sector_offset: u16::try_from(offset / SECTOR_SIZE).ok()?,
            byte_offset: (offset % SECTOR_SIZE) as u16,
            size_sectors: u16::try_from(sectors_for(size)).ok()?,
            size_bytes: (size & 0xFFFF) as u16,
        };
        (desc.entry_data_size() == size).then_some(desc)
    }

    /// True byte size of the entry.
    ///
    /// The high bits come from the sector bound, the low 16 bits from the
    /// explicit byte field.
    #[inline]
    pub fn entry_data_size(&self) -> u64 {
        (sector_bytes(u64::from(self.size_sectors)) & !0xFFFF) | u64::from(self.size_bytes)
    }

    /// Offset of the entry relative to the start of the data region.
    #[inline]
    pub fn data_offset_relative(&self) -> u64 {
        sector_bytes(u64::from(self.sector_offset)) + u64::from(self.byte_offset)
    }

    fn from_raw(raw: &RawDescriptor) -> Self {
        Self {
            sector_offset: raw.sector_offset.get(),
            byte_offset: raw.byte_offset.get(),
            size_sectors: raw.size_sectors.get(),
            size_bytes: raw.size_bytes.get(),
        }
    }

    fn to_raw(self) -> RawDescriptor {
        RawDescriptor {
            sector_offset: U16::new(self.sector_offset),
            byte_offset: U16::new(self.byte_offset),
            size_sectors: U16::new(self.size_sectors),
            size_bytes: U16::new(self.size_bytes),
        }
    }
}

/// A parsed MZP archive.
#[derive(Debug, Clone)]
pub struct MzpArchive {
    buffer: ArchiveBuffer,
    data_start: u64,
    descriptors: Vec<MzpDescriptor>,
}

impl MzpArchive {
    /// Memory-map and parse an MZP file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(ArchiveBuffer::open(path)?)
    }

    /// Parse an MZP archive from a buffer.
    pub fn parse(buffer: ArchiveBuffer) -> Result<Self> {
        let mut reader = BinaryReader::new(buffer.as_bytes());
        reader.expect_magic(MAGIC)?;
        let count = reader.read_u16()? as usize;
        let data_start = (HEADER_LEN + count * DESCRIPTOR_LEN) as u64;

        let descriptors = (0..count)
            .map(|_| -> Result<MzpDescriptor> {
                let raw: RawDescriptor = reader.read_struct()?;
                let desc = MzpDescriptor::from_raw(&raw);
                buffer.check_range(
                    data_start + desc.data_offset_relative(),
                    desc.entry_data_size(),
                )?;
                Ok(desc)
            })
            .collect::<Result<Vec<_>>>()?;

        let archive = Self {
            buffer,
            data_start,
            descriptors,
        };
        for (a, b) in archive.overlaps() {
            warn!(first = a, second = b, "MZP entries overlap");
        }
        debug!(entries = archive.len(), data_start, "parsed MZP archive");
        Ok(archive)
    }

    /// Pack entries back-to-back into a new MZP archive.
    pub fn build<D: AsRef<[u8]>>(entries: &[D]) -> Result<Vec<u8>> {
        let count = u16::try_from(entries.len()).map_err(|_| Error::TooManyEntries {
            count: entries.len(),
            max: u16::MAX as usize,
        })?;

        let data_len: u64 = entries.iter().map(|e| e.as_ref().len() as u64).sum();
        let mut writer = BinaryWriter::with_capacity(
            HEADER_LEN + entries.len() * DESCRIPTOR_LEN + data_len as usize,
        );
        writer.write_bytes(MAGIC).write_u16(count);

        let mut offset = 0u64;
        for (index, data) in entries.iter().enumerate() {
            let size = data.as_ref().len() as u64;
            if offset / SECTOR_SIZE > u64::from(u16::MAX) {
                return Err(Error::OffsetTooLarge { index, offset });
            }
            let desc = MzpDescriptor::for_layout(offset, size)
                .ok_or(Error::UnrepresentableSize { index, size })?;
            writer.write_struct(&desc.to_raw());
            offset += size;
        }

        for data in entries {
            writer.write_bytes(data.as_ref());
        }

        Ok(writer.into_inner())
    }

    /// Absolute offset of the data region.
    #[inline]
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Get all descriptors.
    #[inline]
    pub fn descriptors(&self) -> &[MzpDescriptor] {
        &self.descriptors
    }

    /// Get descriptor by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&MzpDescriptor> {
        self.descriptors.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Absolute offset of an entry in the backing buffer.
    pub fn entry_offset(&self, index: usize) -> Option<u64> {
        self.get(index)
            .map(|desc| self.data_start + desc.data_offset_relative())
    }

    /// Zero-copy view of an entry's bytes.
    pub fn entry_data(&self, index: usize) -> Result<ByteView> {
        let desc = self.get(index).ok_or(Error::EntryNotFound(index))?;
        Ok(self.buffer.view(
            self.data_start + desc.data_offset_relative(),
            desc.entry_data_size(),
        )?)
    }

    /// Pairs of entries whose byte ranges overlap, in index order.
    ///
    /// Empty entries never overlap anything.
    pub fn overlaps(&self) -> Vec<(usize, usize)> {
        let mut ranges: Vec<(u64, u64, usize)> = self
            .descriptors
            .iter()
            .enumerate()
            .filter(|(_, desc)| desc.entry_data_size() > 0)
            .map(|(index, desc)| {
                let start = desc.data_offset_relative();
                (start, start + desc.entry_data_size(), index)
            })
            .collect();
        ranges.sort_unstable();

        let mut pairs = Vec::new();
        for (i, &(_, end, a)) in ranges.iter().enumerate() {
            for &(_, _, b) in ranges[i + 1..].iter().take_while(|(start, _, _)| *start < end) {
                pairs.push((a.min(b), a.max(b)));
            }
        }
        pairs.sort_unstable();
        pairs
    }

    /// The backing buffer.
    #[inline]
    pub fn buffer(&self) -> &ArchiveBuffer {
        &self.buffer
    }
}

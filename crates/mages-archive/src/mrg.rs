//! MRG archives and their `.hed` descriptor tables.
//!
//! The `.hed` file is an array of 8-byte descriptors:
//!
//! ```text
//! [0x00] Offset                 (u32 LE, sectors)
//! [0x04] Size                   (u16 LE, sectors)
//! [0x06] Uncompressed size      (u16 LE, sectors)
//! ```
//!
//! A descriptor with offset `0xFFFFFFFF` ends the table. The `.mrg` file is
//! the raw data, addressed in 0x800-byte sectors.

use std::collections::BTreeMap;
use std::path::Path;

use mages_common::sector::{sector_bytes, sectors_for, SECTOR_SIZE};
use mages_common::{ArchiveBuffer, BinaryWriter, ByteView};
use tracing::debug;
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{Entry, Error, Result};

/// Size of one `.hed` descriptor.
pub const DESCRIPTOR_LEN: usize = 8;

/// Offset value marking the end of the descriptor table.
pub const EOF_OFFSET: u32 = 0xFFFF_FFFF;

/// Largest entry the 16-bit sector count can describe.
pub const MAX_ENTRY_SIZE: u64 = sector_bytes(u16::MAX as u64);

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct RawDescriptor {
    offset: U32,
    size_sectors: U16,
    uncompressed_sectors: U16,
}

/// One `.hed` descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MrgDescriptor {
    /// Start of the entry, in sectors.
    pub offset_sectors: u32,
    /// Stored size, in sectors.
    pub size_sectors: u16,
    /// Decoded size rounded up to sectors; equals `size_sectors` for raw entries.
    pub uncompressed_sectors: u16,
}

impl MrgDescriptor {
    /// Byte offset of the entry in the `.mrg` file.
    #[inline]
    pub fn offset(&self) -> u64 {
        sector_bytes(u64::from(self.offset_sectors))
    }

    /// Stored size in bytes, including sector padding.
    #[inline]
    pub fn size(&self) -> u64 {
        sector_bytes(u64::from(self.size_sectors))
    }

    /// Sector-rounded decoded size in bytes.
    #[inline]
    pub fn uncompressed_size(&self) -> u64 {
        sector_bytes(u64::from(self.uncompressed_sectors))
    }

    /// Whether the descriptor marks a compressed payload.
    ///
    /// A compressed entry that does not shrink by at least one sector is
    /// indistinguishable from a raw one.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.size_sectors != self.uncompressed_sectors
    }

    fn from_raw(raw: &RawDescriptor) -> Self {
        Self {
            offset_sectors: raw.offset.get(),
            size_sectors: raw.size_sectors.get(),
            uncompressed_sectors: raw.uncompressed_sectors.get(),
        }
    }

    fn to_raw(self) -> RawDescriptor {
        RawDescriptor {
            offset: U32::new(self.offset_sectors),
            size_sectors: U16::new(self.size_sectors),
            uncompressed_sectors: U16::new(self.uncompressed_sectors),
        }
    }
}

/// Serialized MRG archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MrgOutput {
    /// Descriptor table (`.hed`).
    pub hed: Vec<u8>,
    /// Sector-aligned data (`.mrg`).
    pub mrg: Vec<u8>,
}

/// A parsed MRG archive.
#[derive(Debug, Clone)]
pub struct MrgArchive {
    buffer: ArchiveBuffer,
    descriptors: Vec<MrgDescriptor>,
}

impl MrgArchive {
    /// Read a `.hed` file and memory-map its `.mrg` data file.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(hed: P, mrg: Q) -> Result<Self> {
        let hed = std::fs::read(hed)?;
        Self::parse(&hed, ArchiveBuffer::open(mrg)?)
    }

    /// Parse a descriptor table against its data buffer.
    ///
    /// Parsing stops at the first end-of-table descriptor, even if more
    /// descriptors follow it.
    pub fn parse(hed: &[u8], buffer: ArchiveBuffer) -> Result<Self> {
        if hed.len() % DESCRIPTOR_LEN != 0 {
            return Err(mages_common::Error::MisalignedTable {
                len: hed.len(),
                record_size: DESCRIPTOR_LEN,
            }
            .into());
        }

        let raw = <[RawDescriptor]>::ref_from_bytes(hed).map_err(|_| {
            mages_common::Error::MisalignedTable {
                len: hed.len(),
                record_size: DESCRIPTOR_LEN,
            }
        })?;

        let descriptors = raw
            .iter()
            .take_while(|raw| raw.offset.get() != EOF_OFFSET)
            .map(MrgDescriptor::from_raw)
            .map(|desc| -> Result<MrgDescriptor> {
                buffer.check_range(desc.offset(), desc.size())?;
                Ok(desc)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            entries = descriptors.len(),
            slots = raw.len(),
            data_len = buffer.len(),
            "parsed MRG archive"
        );
        Ok(Self {
            buffer,
            descriptors,
        })
    }

    /// Pack entries into a new `.hed`/`.mrg` pair.
    pub fn build(entries: &[Entry]) -> Result<MrgOutput> {
        pack(
            entries
                .iter()
                .map(|entry| (entry.data.as_slice(), uncompressed_sectors(entry))),
        )
    }

    /// Pack a copy of this archive with some entries swapped out.
    ///
    /// Entries that are not replaced keep their stored bytes and both sector
    /// counts. The source buffer is left untouched.
    pub fn rebuild_with<I>(&self, replacements: I) -> Result<MrgOutput>
    where
        I: IntoIterator<Item = (usize, Entry)>,
    {
        let replacements: BTreeMap<usize, Entry> = replacements.into_iter().collect();
        if let Some(&index) = replacements.keys().find(|&&i| i >= self.len()) {
            return Err(Error::EntryNotFound(index));
        }

        let originals = (0..self.len())
            .map(|index| self.entry_data(index))
            .collect::<Result<Vec<_>>>()?;

        pack(
            self.descriptors
                .iter()
                .zip(&originals)
                .enumerate()
                .map(|(index, (desc, original))| match replacements.get(&index) {
                    Some(entry) => (entry.data.as_slice(), uncompressed_sectors(entry)),
                    None => (original.as_bytes(), Some(u64::from(desc.uncompressed_sectors))),
                }),
        )
    }

    /// Get all descriptors.
    #[inline]
    pub fn descriptors(&self) -> &[MrgDescriptor] {
        &self.descriptors
    }

    /// Get descriptor by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&MrgDescriptor> {
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

    /// Zero-copy view of an entry's stored bytes, including sector padding.
    pub fn entry_data(&self, index: usize) -> Result<ByteView> {
        let desc = self.get(index).ok_or(Error::EntryNotFound(index))?;
        Ok(self.buffer.view(desc.offset(), desc.size())?)
    }

    /// The backing data buffer.
    #[inline]
    pub fn buffer(&self) -> &ArchiveBuffer {
        &self.buffer
    }
}

/// Sector count recorded for a compressed entry's decoded size.
fn uncompressed_sectors(entry: &Entry) -> Option<u64> {
    entry.uncompressed_size.map(sectors_for)
}

/// Lay out `(bytes, uncompressed sectors)` pairs sector by sector.
fn pack<'a, I>(entries: I) -> Result<MrgOutput>
where
    I: IntoIterator<Item = (&'a [u8], Option<u64>)>,
{
    let mut hed = BinaryWriter::new();
    let mut mrg = BinaryWriter::new();

    for (index, (data, uncompressed)) in entries.into_iter().enumerate() {
        let size = data.len() as u64;
        let too_large = |size| Error::EntryTooLarge {
            index,
            size,
            limit: MAX_ENTRY_SIZE,
        };

        let offset_sectors = u32::try_from(mrg.len() as u64 / SECTOR_SIZE)
            .ok()
            .filter(|&offset| offset != EOF_OFFSET)
            .ok_or(Error::OffsetTooLarge {
                index,
                offset: mrg.len() as u64,
            })?;
        let size_sectors = u16::try_from(sectors_for(size)).map_err(|_| too_large(size))?;
        let uncompressed_sectors = match uncompressed {
            Some(sectors) => {
                u16::try_from(sectors).map_err(|_| too_large(sector_bytes(sectors)))?
            }
            None => size_sectors,
        };

        let desc = MrgDescriptor {
            offset_sectors,
            size_sectors,
            uncompressed_sectors,
        };
        hed.write_struct(&desc.to_raw());
        mrg.write_bytes(data).align(SECTOR_SIZE as usize, 0);
    }

    // Two all-0xFF descriptors end the table.
    hed.fill(0xFF, 2 * DESCRIPTOR_LEN);

    debug!(hed = hed.len(), mrg = mrg.len(), "packed MRG archive");
    Ok(MrgOutput {
        hed: hed.into_inner(),
        mrg: mrg.into_inner(),
    })
}

#[cfg(test)]
mod tests {
    use mages_compress::{nxx, Compression};
    use pretty_assertions::assert_eq;

    use super::*;

    fn descriptor(offset: u32, size: u16, uncompressed: u16) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&offset.to_le_bytes());
        out[4..6].copy_from_slice(&size.to_le_bytes());
        out[6..].copy_from_slice(&uncompressed.to_le_bytes());
        out
    }

    fn parse(output: &MrgOutput) -> MrgArchive {
        MrgArchive::parse(&output.hed, ArchiveBuffer::from_vec(output.mrg.clone())).unwrap()
    }

    #[test]
    fn test_descriptor_size() {
        assert_eq!(std::mem::size_of::<RawDescriptor>(), DESCRIPTOR_LEN);
    }

    #[test]
    fn test_eof_sentinel_stops_parsing() {
        let mut hed = Vec::new();
        hed.extend(descriptor(0, 1, 1));
        hed.extend(descriptor(EOF_OFFSET, 0, 0));
        hed.extend(descriptor(1, 1, 1));

        let archive = MrgArchive::parse(&hed, ArchiveBuffer::from_vec(vec![7; 0x1000])).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.entry_data(0).unwrap().len(), 0x800);
    }

    #[test]
    fn test_misaligned_hed() {
        assert!(matches!(
            MrgArchive::parse(&[0u8; 12], ArchiveBuffer::from_vec(Vec::new())),
            Err(Error::Common(mages_common::Error::MisalignedTable {
                len: 12,
                record_size: 8
            }))
        ));
    }

    #[test]
    fn test_entry_past_end_of_data() {
        let hed = descriptor(1, 1, 1);
        assert!(matches!(
            MrgArchive::parse(&hed, ArchiveBuffer::from_vec(vec![0; 0x800])),
            Err(Error::Common(mages_common::Error::OffsetOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_build_layout() {
        let output = MrgArchive::build(&[
            Entry::raw(vec![1u8; 10]),
            Entry::compressed(vec![2u8; 0x900], 0x2801),
            Entry::raw(Vec::new()),
        ])
        .unwrap();

        let mut hed = Vec::new();
        hed.extend(descriptor(0, 1, 1));
        hed.extend(descriptor(1, 2, 6));
        hed.extend(descriptor(3, 0, 0));
        hed.extend([0xFF; 16]);
        assert_eq!(output.hed, hed);

        assert_eq!(output.mrg.len(), 3 * 0x800);
        assert_eq!(&output.mrg[..10], &[1u8; 10]);
        assert!(output.mrg[10..0x800].iter().all(|&b| b == 0));
        assert_eq!(&output.mrg[0x800..0x1100], &[2u8; 0x900][..]);
    }

    #[test]
    fn test_build_then_parse() {
        let entries = vec![
            Entry::raw(b"first entry".to_vec()),
            Entry::raw(vec![0xAB; 0x1234]),
            Entry::compressed(vec![0xCD; 0x10], 0x5000),
        ];
        let archive = parse(&MrgArchive::build(&entries).unwrap());

        assert_eq!(archive.len(), entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let data = archive.entry_data(index).unwrap();
            assert_eq!(&data[..entry.len()], &entry.data[..]);
            assert_eq!(data.len() as u64, sectors_for(entry.len() as u64) * SECTOR_SIZE);
            assert_eq!(archive.descriptors()[index].is_compressed(), entry.is_compressed());
        }
        assert_eq!(archive.descriptors()[2].uncompressed_size(), 0x5000);
    }

    #[test]
    fn test_open_hed_and_mapped_mrg() {
        let output = MrgArchive::build(&[
            Entry::raw(b"mapped entry".to_vec()),
            Entry::compressed(vec![9u8; 0x900], 0x3000),
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (hed, mrg) = (dir.path().join("sysse.hed"), dir.path().join("sysse.mrg"));
        std::fs::write(&hed, &output.hed).unwrap();
        std::fs::write(&mrg, &output.mrg).unwrap();

        let archive = MrgArchive::open(&hed, &mrg).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(&archive.entry_data(0).unwrap()[..12], b"mapped entry");
        assert!(archive.descriptors()[1].is_compressed());
        assert_eq!(archive.buffer().len(), output.mrg.len());

        assert!(matches!(
            MrgArchive::open(dir.path().join("missing.hed"), &mrg),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_entry_too_large() {
        let huge = Entry::raw(vec![0u8; MAX_ENTRY_SIZE as usize + 1]);
        assert!(matches!(
            MrgArchive::build(&[huge]),
            Err(Error::EntryTooLarge { index: 0, .. })
        ));
    }

    #[test]
    fn test_rebuild_with_replacement() {
        let original = parse(
            &MrgArchive::build(&[
                Entry::raw(vec![1u8; 0x1000]),
                Entry::compressed(vec![2u8; 0x800], 0x4000),
                Entry::raw(vec![3u8; 0x10]),
            ])
            .unwrap(),
        );

        let text = b"replacement text ".repeat(200);
        let nxgx = nxx::compress_nxgx(&text, Compression::default()).unwrap();
        let rebuilt = parse(
            &original
                .rebuild_with([(0, Entry::sniff(nxgx.clone()))])
                .unwrap(),
        );

        assert_eq!(rebuilt.len(), 3);
        let first = rebuilt.descriptors()[0];
        assert_eq!(first.size_sectors as u64, sectors_for(nxgx.len() as u64));
        assert_eq!(first.uncompressed_sectors as u64, sectors_for(text.len() as u64));
        assert_eq!(&rebuilt.entry_data(0).unwrap()[..nxgx.len()], &nxgx[..]);

        // untouched entries keep bytes and both sector counts
        for index in 1..3 {
            let (old, new) = (original.descriptors()[index], rebuilt.descriptors()[index]);
            assert_eq!(old.size_sectors, new.size_sectors);
            assert_eq!(old.uncompressed_sectors, new.uncompressed_sectors);
            assert_eq!(
                original.entry_data(index).unwrap().as_bytes(),
                rebuilt.entry_data(index).unwrap().as_bytes()
            );
        }
        assert_eq!(rebuilt.descriptors()[2].offset_sectors, first.size_sectors as u32 + 1);
    }

    #[test]
    fn test_rebuild_with_unknown_index() {
        let original = parse(&MrgArchive::build(&[Entry::raw(vec![1])]).unwrap());
        assert!(matches!(
            original.rebuild_with([(4, Entry::raw(vec![2]))]),
            Err(Error::EntryNotFound(4))
        ));
    }
}

//! Script text string tables.
//!
//! Script text MZPs hold pairs of entries: a big-endian `u32` offset table
//! followed by a data table of `\r\n`-terminated lines. The offset table
//! ends with `0xFFFFFFFF`.

use mages_common::{BinaryReader, BinaryWriter, Endian};
use memchr::memmem;
use tracing::{debug, warn};

use crate::nam::decode_name;
use crate::{MzpArchive, Result};

const END_OF_TABLE: u32 = 0xFFFF_FFFF;
const LINE_END: &[u8; 2] = b"\r\n";

/// Lines of one offset/data table pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ScriptText {
    lines: Vec<String>,
}

impl ScriptText {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Read lines from an offset table and its data table.
    ///
    /// Offsets that do not start a `\r\n`-terminated line are skipped; the
    /// tables written by [`to_tables`](Self::to_tables) end with two such
    /// offsets.
    pub fn parse(offsets: &[u8], data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(offsets);
        let mut lines = Vec::new();

        while reader.remaining() >= 4 {
            let offset = reader.read_u32_with(Endian::Big)?;
            if offset == END_OF_TABLE {
                break;
            }
            let line = data
                .get(offset as usize..)
                .and_then(|rest| memmem::find(rest, LINE_END).map(|end| &rest[..end]));
            match line {
                Some(line) => lines.push(decode_name(line, lines.len())),
                None => warn!(offset, "no terminated line at offset"),
            }
        }

        debug!(lines = lines.len(), "parsed script text table");
        Ok(Self { lines })
    }

    /// Read every offset/data pair from a script text MZP.
    pub fn from_mzp(archive: &MzpArchive) -> Result<Vec<Self>> {
        (0..archive.len() / 2)
            .map(|pair| {
                let offsets = archive.entry_data(pair * 2)?;
                let data = archive.entry_data(pair * 2 + 1)?;
                Self::parse(&offsets, &data)
            })
            .collect()
    }

    /// Serialize into `(offset table, data table)`.
    pub fn to_tables(&self) -> (Vec<u8>, Vec<u8>) {
        let mut data = BinaryWriter::new();
        let mut offsets = BinaryWriter::with_capacity((self.lines.len() + 5) * 4);

        for line in &self.lines {
            offsets.write_u32_with(Endian::Big, data.len() as u32);
            data.write_bytes(line.as_bytes()).write_bytes(LINE_END);
        }

        let end = data.len() as u32;
        offsets
            .write_u32_with(Endian::Big, end)
            .write_u32_with(Endian::Big, end);
        for _ in 0..3 {
            offsets.write_u32_with(Endian::Big, END_OF_TABLE);
        }

        (offsets.into_inner(), data.into_inner())
    }

    #[inline]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[inline]
    pub fn lines_mut(&mut self) -> &mut Vec<String> {
        &mut self.lines
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

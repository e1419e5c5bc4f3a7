//! Forward-only cursor over a borrowed byte slice.
//!
//! Every read is bounds checked and fails with [`Error::TooShort`] instead of
//! panicking, so headers from untrusted files can be walked field by field.

use zerocopy::FromBytes;

use crate::{Endian, Error, Result};

/// Cursor reading header fields out of a byte slice.
///
/// Returned slices borrow from the input, not from the reader.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self::new_at(data, 0)
    }

    /// Start reading at byte `pos` of `data`.
    #[inline]
    pub const fn new_at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Offset of the next byte to be read.
    #[inline]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// True once the cursor has reached the end of the input.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos.saturating_add(count);
        let bytes = self.data.get(self.pos..end).ok_or(Error::TooShort {
            needed: end,
            available: self.data.len(),
        })?;
        self.pos = end;
        Ok(bytes)
    }

    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Little-endian u16, the default for every MAGES. header.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_bytes(2).map(|b| Endian::Little.read_u16(b))
    }

    /// Little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_u32_with(Endian::Little)
    }

    /// u32 in an explicit byte order; script offset tables are big-endian.
    #[inline]
    pub fn read_u32_with(&mut self, endian: Endian) -> Result<u32> {
        self.read_bytes(4).map(|b| endian.read_u32(b))
    }

    /// Copy out a fixed-layout descriptor.
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::TooShort {
            needed: size,
            available: bytes.len(),
        })
    }

    /// Consume a signature, failing with [`Error::BadMagic`] if it differs.
    pub fn expect_magic(&mut self, magic: &[u8]) -> Result<()> {
        let found = self.read_bytes(magic.len())?;
        if found == magic {
            Ok(())
        } else {
            Err(Error::BadMagic {
                expected: magic.to_vec(),
                actual: found.to_vec(),
            })
        }
    }
}

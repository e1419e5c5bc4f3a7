//! File byte order handling.
//!
//! All container headers are little-endian. The script text offset table is
//! the one big-endian structure, so byte order is passed explicitly rather
//! than assumed.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order declared by a file structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Little-endian (every container header field).
    #[default]
    Little,
    /// Big-endian (script text offset tables).
    Big,
}

impl Endian {
    /// Decode a `u16` stored in this byte order.
    ///
    /// `bytes` must hold at least 2 bytes.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            Self::Little => LittleEndian::read_u16(bytes),
            Self::Big => BigEndian::read_u16(bytes),
        }
    }

    /// Decode a `u32` stored in this byte order.
    ///
    /// `bytes` must hold at least 4 bytes.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            Self::Little => LittleEndian::read_u32(bytes),
            Self::Big => BigEndian::read_u32(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_both_orders() {
        let data = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(Endian::Little.read_u32(&data), 0x78563412);
        assert_eq!(Endian::Big.read_u32(&data), 0x12345678);
        assert_eq!(Endian::Little.read_u16(&data), 0x3412);
        assert_eq!(Endian::Big.read_u16(&data), 0x1234);
    }
}

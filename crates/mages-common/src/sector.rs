//! Sector arithmetic.
//!
//! MRG and MZP address data in fixed 2048-byte sectors.

/// Size of one sector in bytes.
pub const SECTOR_SIZE: u64 = 0x800;

/// Number of whole sectors needed to hold `bytes` bytes (rounded up).
#[inline]
pub const fn sectors_for(bytes: u64) -> u64 {
    bytes.div_ceil(SECTOR_SIZE)
}

/// Byte length of `sectors` sectors.
#[inline]
pub const fn sector_bytes(sectors: u64) -> u64 {
    sectors * SECTOR_SIZE
}

/// Round `bytes` up to the next sector boundary.
#[inline]
pub const fn align_up(bytes: u64) -> u64 {
    sector_bytes(sectors_for(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_rounding() {
        assert_eq!(sectors_for(0), 0);
        assert_eq!(sectors_for(1), 1);
        assert_eq!(sectors_for(0x800), 1);
        assert_eq!(sectors_for(0x801), 2);
        assert_eq!(align_up(70000), 71680);
    }
}

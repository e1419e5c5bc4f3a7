//! Container format identification.

use std::fmt;

use crate::{hfa, mzp};

/// The container formats this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ArchiveFormat {
    Hfa,
    /// `.hed` descriptor table plus `.mrg` data.
    Mrg,
    Mzp,
    /// Name table accompanying an MRG.
    Nam,
}

impl ArchiveFormat {
    /// Identify a format from its leading magic.
    ///
    /// Only HFA and MZP carry a signature; MRG and NAM files have to be
    /// identified by extension.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(hfa::MAGIC) {
            Some(Self::Hfa)
        } else if data.starts_with(mzp::MAGIC) {
            Some(Self::Mzp)
        } else {
            None
        }
    }

    /// Identify a format from a file extension (case-insensitive, no dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "hfa" => Some(Self::Hfa),
            "hed" | "mrg" => Some(Self::Mrg),
            "mzp" => Some(Self::Mzp),
            "nam" => Some(Self::Nam),
            _ => None,
        }
    }

    /// Canonical file extension.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Hfa => "hfa",
            Self::Mrg => "mrg",
            Self::Mzp => "mzp",
            Self::Nam => "nam",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hfa => "HFA",
            Self::Mrg => "MRG",
            Self::Mzp => "MZP",
            Self::Nam => "NAM",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(ArchiveFormat::detect(b"HUNEXGGEFA10\x02\0\0\0"), Some(ArchiveFormat::Hfa));
        assert_eq!(ArchiveFormat::detect(b"mrgd00\x01\0"), Some(ArchiveFormat::Mzp));
        assert_eq!(ArchiveFormat::detect(b"MZX0"), None);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(ArchiveFormat::from_extension("HED"), Some(ArchiveFormat::Mrg));
        assert_eq!(ArchiveFormat::from_extension("nam"), Some(ArchiveFormat::Nam));
        assert_eq!(ArchiveFormat::from_extension("zip"), None);
        assert_eq!(ArchiveFormat::Mzp.extension(), "mzp");
    }
}

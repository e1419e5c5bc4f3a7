//! Payload sniffing and dispatch.

use std::borrow::Cow;

use crate::mzx::{self, MzxOptions};
use crate::nxx::{self, NxxKind};
use crate::Result;

/// Encoding of an entry payload, identified by its leading magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PayloadKind {
    /// `MZX0` stream.
    Mzx,
    /// `NXGX` gzip block.
    Nxgx,
    /// `NXCX` zlib block.
    Nxcx,
    /// Anything else.
    Raw,
}

impl PayloadKind {
    /// Identify the payload encoding of `data`.
    ///
    /// A magic without room for its full header is treated as raw data.
    pub fn detect(data: &[u8]) -> Self {
        if mzx::is_mzx(data) {
            return Self::Mzx;
        }
        if nxx::is_nxx(data) {
            return match NxxKind::from_magic(data) {
                Some(NxxKind::Nxgx) => Self::Nxgx,
                Some(NxxKind::Nxcx) => Self::Nxcx,
                None => Self::Raw,
            };
        }
        Self::Raw
    }

    /// Whether the payload needs decoding before use.
    #[inline]
    pub fn is_compressed(self) -> bool {
        self != Self::Raw
    }

    /// Declared decoded size from the payload header, if compressed.
    pub fn declared_size(self, data: &[u8]) -> Option<u32> {
        match self {
            Self::Mzx => mzx::MzxHeader::parse(data).ok().map(|h| h.decompressed_size),
            Self::Nxgx | Self::Nxcx => nxx::NxxHeader::parse(data).ok().map(|h| h.uncompressed_size),
            Self::Raw => None,
        }
    }

    /// Short lowercase name, suitable for file extensions and listings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mzx => "mzx",
            Self::Nxgx => "nxgx",
            Self::Nxcx => "nxcx",
            Self::Raw => "raw",
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a payload according to its leading magic.
///
/// Raw payloads are returned borrowed.
pub fn decode<'a>(data: &'a [u8], options: &MzxOptions) -> Result<Cow<'a, [u8]>> {
    match PayloadKind::detect(data) {
        PayloadKind::Mzx => mzx::decompress(data, options).map(Cow::Owned),
        PayloadKind::Nxgx | PayloadKind::Nxcx => nxx::decompress(data).map(Cow::Owned),
        PayloadKind::Raw => Ok(Cow::Borrowed(data)),
    }
}

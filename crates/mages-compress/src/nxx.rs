//! NXX compression (NXGX / NXCX).
//!
//! NXX wraps a standard deflate stream in a fixed 16-byte header:
//!
//! ```text
//! [0x00] Magic "NXGX" or "NXCX"       (4 bytes)
//! [0x04] Uncompressed size            (u32 LE)
//! [0x08] Compressed size              (u32 LE)
//! [0x0C] Reserved                     (4 bytes, zero)
//! [0x10] Payload                      (compressed size bytes)
//! ```
//!
//! `NXGX` payloads are gzip members, `NXCX` payloads are zlib streams.

use std::io::{Read, Write};

use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use mages_common::{BinaryReader, BinaryWriter};
use tracing::debug;

use crate::{Error, Result};

/// Size of the NXX header in bytes.
pub const HEADER_LEN: usize = 16;

/// Upper bound on deflate's compression ratio, used to cap up-front allocation.
const MAX_DEFLATE_RATIO: usize = 1032;

/// Payload framing selected by the magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NxxKind {
    /// `NXGX`: gzip-framed deflate.
    Nxgx,
    /// `NXCX`: zlib-framed deflate.
    Nxcx,
}

impl NxxKind {
    /// Magic bytes for this kind.
    pub const fn magic(self) -> &'static [u8; 4] {
        match self {
            Self::Nxgx => b"NXGX",
            Self::Nxcx => b"NXCX",
        }
    }

    /// Identify a kind from leading magic bytes.
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic.get(..4)? {
            b"NXGX" => Some(Self::Nxgx),
            b"NXCX" => Some(Self::Nxcx),
            _ => None,
        }
    }
}

/// Parsed NXX header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NxxHeader {
    /// Payload framing.
    pub kind: NxxKind,
    /// Declared size after decompression.
    pub uncompressed_size: u32,
    /// Declared size of the payload following the header.
    pub compressed_size: u32,
}

impl NxxHeader {
    /// Parse and validate the header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let magic: [u8; 4] = reader.read_array()?;
        let kind = NxxKind::from_magic(&magic).ok_or_else(|| mages_common::Error::BadMagic {
            expected: b"NXGX|NXCX".to_vec(),
            actual: magic.to_vec(),
        })?;
        let uncompressed_size = reader.read_u32()?;
        let compressed_size = reader.read_u32()?;
        let _reserved = reader.read_u32()?;

        Ok(Self {
            kind,
            uncompressed_size,
            compressed_size,
        })
    }

    fn write(&self, writer: &mut BinaryWriter) {
        writer
            .write_bytes(self.kind.magic())
            .write_u32(self.uncompressed_size)
            .write_u32(self.compressed_size)
            .write_u32(0);
    }
}

/// Check whether `data` starts with an NXX header.
pub fn is_nxx(data: &[u8]) -> bool {
    data.len() >= HEADER_LEN && NxxKind::from_magic(data).is_some()
}

/// Decompress an NXX buffer.
///
/// The output is exactly the declared uncompressed size; a stream that does
/// not run to completion within that size is an error.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let header = NxxHeader::parse(data)?;
    let payload = BinaryReader::new_at(data, HEADER_LEN).read_bytes(header.compressed_size as usize)?;
    let expected = header.uncompressed_size as usize;

    let out = match header.kind {
        NxxKind::Nxgx => inflate_gzip(payload, expected)?,
        NxxKind::Nxcx => inflate_zlib(payload, expected)?,
    };

    if out.len() != expected {
        return Err(Error::SizeMismatch {
            expected,
            actual: out.len(),
        });
    }

    debug!(kind = ?header.kind, compressed = payload.len(), decompressed = expected, "nxx payload decoded");
    Ok(out)
}

/// Output buffer sized for `expected` bytes, unless the payload is too small
/// to produce that many.
fn output_buffer(payload: &[u8], expected: usize) -> Vec<u8> {
    Vec::with_capacity(expected.min(payload.len().saturating_mul(MAX_DEFLATE_RATIO)))
}

fn inflate_gzip(payload: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = output_buffer(payload, expected);
    // One byte past the declared size is enough to detect overlong streams.
    GzDecoder::new(payload)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)?;
    Ok(out)
}

fn inflate_zlib(payload: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = output_buffer(payload, expected);
    let mut inflater = Decompress::new(true);
    let status = inflater
        .decompress_vec(payload, &mut out, FlushDecompress::Finish)
        .map_err(|e| Error::Codec {
            message: e.to_string(),
        })?;

    if status != Status::StreamEnd {
        return Err(Error::Codec {
            message: format!(
                "zlib stream incomplete after {} of {} bytes ({status:?})",
                inflater.total_out(),
                expected
            ),
        });
    }
    Ok(out)
}

/// Compress `data` as the given NXX kind.
///
/// Only `NXGX` output is implemented; `NXCX` returns [`Error::Unsupported`].
pub fn compress(data: &[u8], kind: NxxKind, level: Compression) -> Result<Vec<u8>> {
    match kind {
        NxxKind::Nxgx => compress_nxgx(data, level),
        NxxKind::Nxcx => Err(Error::Unsupported("NXCX compression")),
    }
}

/// Compress `data` into an `NXGX` buffer.
pub fn compress_nxgx(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let uncompressed_size = u32::try_from(data.len()).map_err(|_| Error::InputTooLarge(data.len()))?;

    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), level);
    encoder.write_all(data)?;
    let payload = encoder.finish()?;
    let compressed_size =
        u32::try_from(payload.len()).map_err(|_| Error::InputTooLarge(payload.len()))?;

    let mut writer = BinaryWriter::with_capacity(HEADER_LEN + payload.len());
    NxxHeader {
        kind: NxxKind::Nxgx,
        uncompressed_size,
        compressed_size,
    }
    .write(&mut writer);
    writer.write_bytes(&payload);

    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use flate2::write::ZlibEncoder;
    use pretty_assertions::assert_eq;

    use super::*;

    fn nxcx(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let payload = encoder.finish().unwrap();

        let mut writer = BinaryWriter::new();
        NxxHeader {
            kind: NxxKind::Nxcx,
            uncompressed_size: data.len() as u32,
            compressed_size: payload.len() as u32,
        }
        .write(&mut writer);
        writer.write_bytes(&payload);
        writer.into_inner()
    }

    #[test]
    fn test_nxgx_roundtrip() {
        let data = b"Hello, World! This is a test of NXGX compression.".repeat(10);
        let packed = compress_nxgx(&data, Compression::default()).unwrap();

        let header = NxxHeader::parse(&packed).unwrap();
        assert_eq!(header.kind, NxxKind::Nxgx);
        assert_eq!(header.uncompressed_size as usize, data.len());
        assert_eq!(header.compressed_size as usize, packed.len() - HEADER_LEN);
        // gzip member magic follows the header
        assert_eq!(&packed[16..18], &[0x1f, 0x8b]);

        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_nxcx_decompress() {
        let data = b"zlib framed payload".repeat(4);
        assert_eq!(decompress(&nxcx(&data)).unwrap(), data);
    }

    #[test]
    fn test_nxcx_compress_unsupported() {
        assert!(matches!(
            compress(b"data", NxxKind::Nxcx, Compression::default()),
            Err(Error::Unsupported(_))
        ));
        assert!(compress(b"data", NxxKind::Nxgx, Compression::default()).is_ok());
    }

    #[test]
    fn test_declared_size_mismatch() {
        let data = b"0123456789".repeat(8);

        let mut packed = compress_nxgx(&data, Compression::default()).unwrap();
        packed[4..8].copy_from_slice(&(data.len() as u32 + 5).to_le_bytes());
        assert!(matches!(decompress(&packed), Err(Error::SizeMismatch { .. })));

        let mut packed = nxcx(&data);
        packed[4..8].copy_from_slice(&(data.len() as u32 - 1).to_le_bytes());
        assert!(matches!(decompress(&packed), Err(Error::Codec { .. })));
    }

    #[test]
    fn test_huge_declared_size() {
        let mut packed = compress_nxgx(b"tiny", Compression::default()).unwrap();
        packed[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decompress(&packed),
            Err(Error::SizeMismatch { actual: 4, .. })
        ));
        assert!(output_buffer(&packed[HEADER_LEN..], u32::MAX as usize).capacity() < 1 << 20);
    }

    #[test]
    fn test_truncated_zlib_stream() {
        let data = b"0123456789".repeat(8);
        let mut packed = nxcx(&data);
        let cut = packed.len() - 6;
        packed.truncate(cut);
        packed[8..12].copy_from_slice(&((cut - HEADER_LEN) as u32).to_le_bytes());

        assert!(decompress(&packed).is_err());
    }

    #[test]
    fn test_corrupt_gzip_payload() {
        let data = b"0123456789".repeat(8);
        let mut packed = compress_nxgx(&data, Compression::default()).unwrap();
        let last = packed.len() - 1;
        packed[last] ^= 0xFF; // ISIZE trailer byte
        assert!(decompress(&packed).is_err());
    }

    #[test]
    fn test_payload_shorter_than_declared() {
        let mut packed = compress_nxgx(b"abc", Compression::default()).unwrap();
        packed.truncate(packed.len() - 1);
        assert!(matches!(
            decompress(&packed),
            Err(Error::Common(mages_common::Error::TooShort { .. }))
        ));
    }

    #[test]
    fn test_header_rejects_unknown_magic() {
        assert!(matches!(
            NxxHeader::parse(b"NXZX\0\0\0\0\0\0\0\0\0\0\0\0"),
            Err(Error::Common(mages_common::Error::BadMagic { .. }))
        ));
        assert!(matches!(
            NxxHeader::parse(b"NXGX\0\0"),
            Err(Error::Common(mages_common::Error::TooShort { .. }))
        ));
        assert!(is_nxx(b"NXCX\0\0\0\0\0\0\0\0\0\0\0\0"));
        assert!(!is_nxx(b"NXCX"));
    }
}

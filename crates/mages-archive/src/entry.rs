//! Logical container entries used when packing.

use mages_compress::PayloadKind;

/// An entry's bytes plus, for compressed payloads, the exact decoded size.
///
/// The decoded size is independent of any sector rounding the container
/// applies when it is written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    /// Bytes as stored in the container.
    pub data: Vec<u8>,
    /// Decoded size, present only when `data` is a compressed payload.
    pub uncompressed_size: Option<u64>,
}

impl Entry {
    /// An uncompressed entry.
    pub fn raw(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            uncompressed_size: None,
        }
    }

    /// A compressed entry that decodes to `uncompressed_size` bytes.
    pub fn compressed(data: impl Into<Vec<u8>>, uncompressed_size: u64) -> Self {
        Self {
            data: data.into(),
            uncompressed_size: Some(uncompressed_size),
        }
    }

    /// Build an entry from `data`, taking the decoded size from an MZX or
    /// NXX header when one is present.
    pub fn sniff(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let uncompressed_size = PayloadKind::detect(&data)
            .declared_size(&data)
            .map(u64::from);
        Self {
            data,
            uncompressed_size,
        }
    }

    /// Whether the stored bytes are a compressed payload.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.uncompressed_size.is_some()
    }

    /// Stored size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for Entry {
    fn from(data: Vec<u8>) -> Self {
        Self::raw(data)
    }
}

#[cfg(test)]
mod tests {
    use mages_compress::{mzx, nxx, Compression, MzxOptions};

    use super::*;

    #[test]
    fn test_sniff_compressed_payloads() {
        let text = b"sniffed payload, sniffed payload".to_vec();

        let mzx = Entry::sniff(mzx::compress(&text, &MzxOptions::default()).unwrap());
        assert_eq!(mzx.uncompressed_size, Some(text.len() as u64));

        let nxgx = Entry::sniff(nxx::compress_nxgx(&text, Compression::default()).unwrap());
        assert!(nxgx.is_compressed());
        assert_eq!(nxgx.uncompressed_size, Some(text.len() as u64));

        let raw = Entry::sniff(text.clone());
        assert!(!raw.is_compressed());
        assert_eq!(raw, Entry::raw(text));
    }
}

//! NAM name tables.
//!
//! A NAM file is a flat array of 32-byte records, one per archive entry.
//! Each record holds a name terminated by NUL, by `\r\n`, or by the end of
//! the record. Writers always place `\r\n` in the last two bytes.

use std::borrow::Cow;

use memchr::{memchr, memmem};
use tracing::{debug, warn};

use crate::Result;

/// Size of one record in bytes.
pub const RECORD_SIZE: usize = 32;

const TERMINATOR: &[u8; 2] = b"\r\n";

/// Ordered list of entry names, index-aligned with a container's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    /// Create a table from a list of names.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Parse a NAM buffer.
    ///
    /// Zero-length records are skipped rather than kept as empty names.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() % RECORD_SIZE != 0 {
            return Err(mages_common::Error::MisalignedTable {
                len: data.len(),
                record_size: RECORD_SIZE,
            }
            .into());
        }

        let names: Vec<String> = data
            .chunks_exact(RECORD_SIZE)
            .enumerate()
            .filter_map(|(index, record)| {
                let name = record_name(record);
                (!name.is_empty()).then(|| decode_name(name, index))
            })
            .collect();

        debug!(records = data.len() / RECORD_SIZE, names = names.len(), "parsed name table");
        Ok(Self { names })
    }

    /// Serialize the table, including the trailing terminator record.
    ///
    /// Names longer than 30 bytes lose their tail to the `\r\n` terminator.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity((self.names.len() + 1) * RECORD_SIZE);
        for name in &self.names {
            out.extend_from_slice(&encode_record(name.as_bytes()));
        }
        out.extend_from_slice(&encode_record(&[]));
        out
    }

    /// Whether the table lines up with a container of `entry_count` entries.
    #[inline]
    pub fn matches(&self, entry_count: usize) -> bool {
        self.names.len() == entry_count
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for NameTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

fn record_name(record: &[u8]) -> &[u8] {
    let nul = memchr(0, record).unwrap_or(record.len());
    let crlf = memmem::find(record, TERMINATOR).unwrap_or(record.len());
    &record[..nul.min(crlf)]
}

fn encode_record(name: &[u8]) -> [u8; RECORD_SIZE] {
    let mut record = [0u8; RECORD_SIZE];
    let take = name.len().min(RECORD_SIZE);
    record[..take].copy_from_slice(&name[..take]);
    record[RECORD_SIZE - 2..].copy_from_slice(TERMINATOR);
    record
}

/// Decode a stored name, replacing invalid UTF-8.
pub(crate) fn decode_name(bytes: &[u8], index: usize) -> String {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(name) => name.to_owned(),
        Cow::Owned(name) => {
            warn!(index, name = %name, "entry name is not valid UTF-8");
            name
        }
    }
}

//! Errors shared by every format crate.

use thiserror::Error;

/// The input is not a well-formed instance of the format being parsed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of data: need {needed} bytes, have {available}")]
    TooShort { needed: usize, available: usize },

    #[error("wrong signature: expected {expected:?}, found {actual:?}")]
    BadMagic { expected: Vec<u8>, actual: Vec<u8> },

    /// A descriptor table is not a whole number of records.
    #[error("table of {len} bytes does not divide into {record_size}-byte records")]
    MisalignedTable { len: usize, record_size: usize },

    /// An entry points outside the backing buffer.
    #[error("range {offset:#x}+{size:#x} exceeds buffer length {len:#x}")]
    OffsetOutOfRange { offset: u64, size: u64, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

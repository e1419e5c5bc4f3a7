//! Error types for the container codecs.

use thiserror::Error;

/// Errors that can occur when reading or writing containers.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error (short buffer, bad magic, range checks).
    #[error("{0}")]
    Common(#[from] mages_common::Error),

    /// Entry index past the end of the container.
    #[error("entry not found: {0}")]
    EntryNotFound(usize),

    /// Entry too large for the container's size fields.
    #[error("entry {index} is {size} bytes, limit is {limit}")]
    EntryTooLarge { index: usize, size: u64, limit: u64 },

    /// Container data region grew past what the offset fields can address.
    #[error("entry {index} would start at {offset:#x}, past the addressable range")]
    OffsetTooLarge { index: usize, offset: u64 },

    /// Entry name does not fit its fixed-size field.
    #[error("name {name:?} exceeds {max} bytes")]
    NameTooLong { name: String, max: usize },

    /// MZP size that the split sector/low-16-bit fields cannot reconstruct.
    #[error("entry {index} size {size} cannot be represented in an MZP descriptor")]
    UnrepresentableSize { index: usize, size: u64 },

    /// More entries than the count field can hold.
    #[error("{count} entries exceed the format limit of {max}")]
    TooManyEntries { count: usize, max: usize },
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;

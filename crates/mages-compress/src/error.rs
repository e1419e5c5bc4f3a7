//! Error types for the payload codecs.

use thiserror::Error;

/// Errors that can occur when compressing or decompressing payloads.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error (short buffer, bad magic).
    #[error("{0}")]
    Common(#[from] mages_common::Error),

    /// The underlying deflate implementation reported a failure.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Decoded byte count differs from the size declared in the header.
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Compressed stream ended in the middle of a command.
    #[error("compressed stream truncated at offset {offset}")]
    Truncated { offset: usize },

    /// An MZX back-reference points before the start of the output.
    #[error("back-reference distance {distance} exceeds {available} decoded bytes")]
    InvalidBackref { distance: usize, available: usize },

    /// Input too large for the 32-bit size fields of the header.
    #[error("input of {0} bytes exceeds the 32-bit header size field")]
    InputTooLarge(usize),

    /// A documented operation that is not implemented.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Codec {
            message: err.to_string(),
        }
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

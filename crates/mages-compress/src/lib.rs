//! Payload codecs for MAGES. engine containers.
//!
//! Container entries are either stored raw or wrapped in one of two
//! compressed encodings, identified by their leading magic:
//!
//! - [`mzx`] - the engine's own LZ-style unit codec (`MZX0`)
//! - [`nxx`] - a 16-byte header around a gzip (`NXGX`) or zlib (`NXCX`) stream
//!
//! # Example
//!
//! ```
//! use mages_compress::{decode, mzx, MzxOptions, PayloadKind};
//!
//! let options = MzxOptions::default();
//! let packed = mzx::compress(b"abababababab", &options)?;
//! assert_eq!(PayloadKind::detect(&packed), PayloadKind::Mzx);
//! assert_eq!(&*decode(&packed, &options)?, b"abababababab");
//! # Ok::<(), mages_compress::Error>(())
//! ```

mod error;
pub mod mzx;
pub mod nxx;
mod payload;

pub use error::{Error, Result};
pub use mzx::{MzxOptions, MzxStrategy};
pub use nxx::NxxKind;
pub use payload::{decode, PayloadKind};

/// Re-export of the deflate level type used by [`nxx::compress`].
pub use flate2::Compression;

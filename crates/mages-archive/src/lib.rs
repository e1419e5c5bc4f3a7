//! Container codecs for MAGES. engine archives.
//!
//! Every container maps a byte buffer to an ordered list of entries:
//!
//! - [`HfaArchive`] - `HUNEXGGEFA10` archives with named entries
//! - [`MrgArchive`] - `.hed` descriptor table + sector-addressed `.mrg` data
//! - [`MzpArchive`] - `mrgd00` archives with split sector/byte sizes
//! - [`NameTable`] - 32-byte `.nam` records naming MRG entries
//! - [`ScriptText`] - offset/data string table pairs stored in MZPs
//!
//! Parsing never copies entry data; [`ByteView`](mages_common::ByteView)s
//! share the archive's [`ArchiveBuffer`](mages_common::ArchiveBuffer).
//!
//! # Example
//!
//! ```
//! use mages_archive::{ArchiveFormat, MzpArchive};
//!
//! let bytes = MzpArchive::build(&[b"first".as_slice(), b"second".as_slice()])?;
//! assert_eq!(ArchiveFormat::detect(&bytes), Some(ArchiveFormat::Mzp));
//!
//! let archive = MzpArchive::parse(bytes.into())?;
//! assert_eq!(archive.entry_data(1)?.as_bytes(), b"second");
//! # Ok::<(), mages_archive::Error>(())
//! ```

mod entry;
mod error;
mod format;
pub mod hfa;
pub mod mrg;
pub mod mzp;
pub mod nam;
mod script_text;

pub use entry::Entry;
pub use error::{Error, Result};
pub use format::ArchiveFormat;
pub use hfa::{HfaArchive, HfaEntry};
pub use mrg::{MrgArchive, MrgDescriptor, MrgOutput};
pub use mzp::{MzpArchive, MzpDescriptor};
pub use nam::NameTable;
pub use script_text::ScriptText;

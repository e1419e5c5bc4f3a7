//! Shared plumbing for the MAGES. container and codec crates.
//!
//! Nothing here knows about a specific file format. The format crates build on:
//!
//! - [`ArchiveBuffer`] and [`ByteView`], memory-mapped or owned input shared
//!   between an archive and the entry views handed out from it
//! - [`BinaryReader`] and [`BinaryWriter`] for header fields
//! - [`Endian`] for the few big-endian structures
//! - [`sector`] for the 0x800-byte addressing of MRG and MZP

mod buffer;
mod endian;
mod error;
mod reader;
mod writer;

pub mod sector;

pub use buffer::{ArchiveBuffer, ByteView};
pub use endian::Endian;
pub use error::{Error, Result};
pub use reader::BinaryReader;
pub use writer::BinaryWriter;

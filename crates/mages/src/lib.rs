//! MAGES. - archive extraction and repacking library for MAGES. engine games.
//!
//! This crate provides a unified interface to the container and payload
//! codecs.
//!
//! # Crates
//!
//! - [`mages_common`] - Byte order, binary reading/writing, shared buffers
//! - [`mages_archive`] - HFA, MRG, MZP and NAM containers
//! - [`mages_compress`] - MZX and NXX payload codecs
//!
//! # Example
//!
//! ```no_run
//! use mages::prelude::*;
//!
//! let archive = MrgArchive::open("script.hed", "script.mrg")?;
//! let names = NameTable::parse(&std::fs::read("script.nam")?)?;
//!
//! for (index, name) in names.iter().enumerate().take(archive.len()) {
//!     let stored = archive.entry_data(index)?;
//!     let data = decode(&stored, &MzxOptions::default())?;
//!     println!("{name}: {} bytes", data.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use mages_archive as archive;
pub use mages_common as common;
pub use mages_compress as compress;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use mages_archive::{
        ArchiveFormat, Entry, HfaArchive, MrgArchive, MrgOutput, MzpArchive, NameTable,
        ScriptText,
    };
    pub use mages_common::{ArchiveBuffer, ByteView};
    pub use mages_compress::{decode, mzx, nxx, MzxOptions, MzxStrategy, NxxKind, PayloadKind};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Binary writer for serializing container headers.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use zerocopy::{Immutable, IntoBytes};

use crate::Endian;

/// Growable output buffer with explicit byte-order field writers.
///
/// Writing into a `Vec<u8>` cannot fail, so unlike `std::io::Write` these
/// methods return `&mut Self` for chaining.
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    data: Vec<u8>,
}

impl BinaryWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    /// Write a little-endian u16.
    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        let _ = self.data.write_u16::<LittleEndian>(value);
        self
    }

    /// Write a little-endian u32.
    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_u32_with(Endian::Little, value)
    }

    /// Write a u32 in the given byte order.
    pub fn write_u32_with(&mut self, endian: Endian, value: u32) -> &mut Self {
        // Vec<u8> writes are infallible.
        let _ = match endian {
            Endian::Little => self.data.write_u32::<LittleEndian>(value),
            Endian::Big => self.data.write_u32::<BigEndian>(value),
        };
        self
    }

    /// Write a zerocopy struct verbatim.
    pub fn write_struct<T: IntoBytes + Immutable>(&mut self, value: &T) -> &mut Self {
        self.data.extend_from_slice(value.as_bytes());
        self
    }

    /// Append `count` copies of `byte`.
    pub fn fill(&mut self, byte: u8, count: usize) -> &mut Self {
        self.data.resize(self.data.len() + count, byte);
        self
    }

    /// Pad with `byte` until the length is a multiple of `alignment`.
    pub fn align(&mut self, alignment: usize, byte: u8) -> &mut Self {
        let rem = self.data.len() % alignment;
        if rem != 0 {
            self.fill(byte, alignment - rem);
        }
        self
    }

    /// Borrow the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the writer and return the buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

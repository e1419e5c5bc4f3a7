//! MZX compression.
//!
//! MZX is a small LZ-style bytecode operating on 2-byte units. A stream is an
//! 8-byte header followed by commands until the end of the buffer:
//!
//! ```text
//! [0x00] Magic "MZX0"                 (4 bytes)
//! [0x04] Decompressed size            (u32 LE)
//! [0x08] Commands...
//! ```
//!
//! Each command byte carries a 2-bit opcode in its low bits and a 6-bit
//! length in its high bits; the command processes `len + 1` units.
//!
//! | Opcode | Name      | Effect                                                        |
//! |--------|-----------|---------------------------------------------------------------|
//! | 0      | `RLE`     | Repeat the last unit `len + 1` times                          |
//! | 1      | `BACKREF` | Next byte `b`; copy `len + 1` units from `2 * (b + 1)` back   |
//! | 2      | `RINGBUF` | Emit ring buffer slot `len` once and make it the last unit    |
//! | 3      | `LITERAL` | Copy `2 * (len + 1)` bytes, XOR-masked, into output and ring  |
//!
//! The decoder keeps a 64-slot ring of recent literal units and a countdown
//! of 0x1000 commands; each time the countdown expires the last unit is reset
//! to the sentinel (`0xFFFF` when inverting, `0x0000` otherwise) before the
//! command that expired it runs.

use mages_common::{BinaryReader, BinaryWriter};
use tracing::{debug, trace};

use crate::{Error, Result};

/// MZX magic bytes.
pub const MAGIC: &[u8; 4] = b"MZX0";

/// Size of the MZX header in bytes.
pub const HEADER_LEN: usize = 8;

/// Commands processed between `last` resets.
const CLEAR_INTERVAL: u32 = 0x1000;

/// Number of ring buffer slots.
const RING_SLOTS: usize = 64;

/// Maximum units a single command can cover (6-bit length + 1).
const MAX_RUN: usize = 64;

/// Maximum back-reference distance in units (8-bit field + 1).
const MAX_DISTANCE: usize = 256;

/// Most output bytes a single input byte can produce (a one-byte RLE command).
const MAX_EXPANSION: usize = 2 * MAX_RUN;

type Unit = [u8; 2];

/// MZX command opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Repeat the last unit.
    Rle = 0,
    /// Copy units from earlier in the output.
    BackRef = 1,
    /// Emit a ring buffer slot.
    RingBuf = 2,
    /// Copy raw units from the input.
    Literal = 3,
}

/// A decoded command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Operation to perform.
    pub opcode: Opcode,
    /// Stored length field (0..=63), one less than the unit count.
    pub len: u8,
}

impl Command {
    /// Split a command byte into opcode and length.
    #[inline]
    pub const fn decode(byte: u8) -> Self {
        let opcode = match byte & 0b11 {
            0 => Opcode::Rle,
            1 => Opcode::BackRef,
            2 => Opcode::RingBuf,
            _ => Opcode::Literal,
        };
        Self {
            opcode,
            len: byte >> 2,
        }
    }

    /// Build a command covering `units` units (1..=64).
    #[inline]
    fn covering(opcode: Opcode, units: usize) -> Self {
        debug_assert!((1..=MAX_RUN).contains(&units));
        Self {
            opcode,
            len: (units - 1) as u8,
        }
    }

    /// Pack into a command byte.
    #[inline]
    pub const fn encode(self) -> u8 {
        (self.len << 2) | self.opcode as u8
    }

    /// Number of units this command processes.
    #[inline]
    pub const fn units(self) -> usize {
        self.len as usize + 1
    }
}

/// Parsed MZX header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MzxHeader {
    /// Size of the decoded payload in bytes.
    pub decompressed_size: u32,
}

impl MzxHeader {
    /// Parse and validate the header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        reader.expect_magic(MAGIC)?;
        let decompressed_size = reader.read_u32()?;
        Ok(Self { decompressed_size })
    }

    fn write(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(MAGIC).write_u32(self.decompressed_size);
    }
}

/// Check whether `data` starts with an MZX header.
#[inline]
pub fn is_mzx(data: &[u8]) -> bool {
    data.len() >= HEADER_LEN && data.starts_with(MAGIC)
}

/// Encoder strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MzxStrategy {
    /// Use all four commands, choosing greedily at each position.
    #[default]
    Greedy,
    /// Emit only literal runs of up to 64 units (no size reduction).
    LiteralOnly,
}

/// Options shared by the encoder and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MzxOptions {
    /// XOR literal bytes with 0xFF and use 0xFFFF as the sentinel unit.
    pub invert: bool,
    /// Encoder strategy; ignored by the decoder.
    pub strategy: MzxStrategy,
}

impl Default for MzxOptions {
    fn default() -> Self {
        Self {
            invert: true,
            strategy: MzxStrategy::default(),
        }
    }
}

impl MzxOptions {
    /// Options with the given inversion flag and default strategy.
    pub fn with_invert(invert: bool) -> Self {
        Self {
            invert,
            ..Self::default()
        }
    }

    #[inline]
    fn mask(&self) -> u8 {
        if self.invert {
            0xFF
        } else {
            0x00
        }
    }
}

/// Per-call codec state. Created at the start of every encode/decode.
#[derive(Debug, Clone)]
struct MzxState {
    last: Unit,
    ring: [Unit; RING_SLOTS],
    ring_cursor: usize,
    clear_counter: u32,
    sentinel: Unit,
}

impl MzxState {
    fn new(invert: bool) -> Self {
        let fill = if invert { 0xFF } else { 0x00 };
        let sentinel = [fill, fill];
        Self {
            last: sentinel,
            ring: [sentinel; RING_SLOTS],
            ring_cursor: 0,
            clear_counter: CLEAR_INTERVAL,
            sentinel,
        }
    }

    /// Account for one command. Returns true when `last` was reset.
    #[inline]
    fn tick(&mut self) -> bool {
        self.clear_counter -= 1;
        if self.clear_counter == 0 {
            self.clear_counter = CLEAR_INTERVAL;
            self.last = self.sentinel;
            return true;
        }
        false
    }

    #[inline]
    fn push_literal(&mut self, unit: Unit) {
        self.last = unit;
        self.ring[self.ring_cursor] = unit;
        self.ring_cursor = (self.ring_cursor + 1) % RING_SLOTS;
    }
}

/// Decompress an MZX stream.
///
/// The output is exactly the header's declared size. Streams for odd sizes
/// necessarily decode one extra byte (the last unit's pad), which is
/// dropped; any other difference is reported as [`Error::SizeMismatch`].
///
/// Zero bytes following a complete stream are ignored, so entries read with
/// their sector padding still decode.
pub fn decompress(input: &[u8], options: &MzxOptions) -> Result<Vec<u8>> {
    let header = MzxHeader::parse(input)?;
    let expected = header.decompressed_size as usize;
    let limit = expected + (expected & 1);
    let mask = options.mask();

    let mut out: Vec<u8> = Vec::with_capacity(limit.min(input.len().saturating_mul(MAX_EXPANSION)));
    let mut state = MzxState::new(options.invert);
    let mut reader = BinaryReader::new_at(input, HEADER_LEN);

    while !reader.is_empty() {
        let offset = reader.position();
        // Sector-aligned containers pad the stream with zeros after it ends.
        if out.len() == limit && input[offset..].iter().all(|&b| b == 0) {
            trace!(offset, padding = input.len() - offset, "mzx stream ends before padding");
            break;
        }
        let truncated = |_| Error::Truncated { offset };
        let command = Command::decode(reader.read_u8().map_err(truncated)?);

        if state.tick() {
            trace!(offset, "mzx clear counter expired");
        }

        match command.opcode {
            Opcode::Rle => {
                for _ in 0..command.units() {
                    out.extend_from_slice(&state.last);
                }
            }
            Opcode::BackRef => {
                let distance = 2 * (reader.read_u8().map_err(truncated)? as usize + 1);
                // Unit-at-a-time so overlapping copies extend runs.
                for _ in 0..command.units() {
                    let start = out.len().checked_sub(distance).ok_or(Error::InvalidBackref {
                        distance,
                        available: out.len(),
                    })?;
                    let unit = [out[start], out[start + 1]];
                    state.last = unit;
                    out.extend_from_slice(&unit);
                }
            }
            Opcode::RingBuf => {
                state.last = state.ring[command.len as usize];
                out.extend_from_slice(&state.last);
            }
            Opcode::Literal => {
                let raw = reader
                    .read_bytes(2 * command.units())
                    .map_err(truncated)?;
                for pair in raw.chunks_exact(2) {
                    let unit = [pair[0] ^ mask, pair[1] ^ mask];
                    out.extend_from_slice(&unit);
                    state.push_literal(unit);
                }
            }
        }

        if out.len() > limit {
            return Err(Error::SizeMismatch {
                expected,
                actual: out.len(),
            });
        }
    }

    if out.len() == limit && limit != expected {
        out.truncate(expected);
    }
    if out.len() != expected {
        return Err(Error::SizeMismatch {
            expected,
            actual: out.len(),
        });
    }

    debug!(
        compressed = input.len(),
        decompressed = expected,
        "mzx stream decoded"
    );
    Ok(out)
}

/// Compress `input` into an MZX stream.
///
/// Odd-length inputs are padded with one zero byte to a whole unit; the
/// header records the true length so [`decompress`] drops the pad.
pub fn compress(input: &[u8], options: &MzxOptions) -> Result<Vec<u8>> {
    let decompressed_size =
        u32::try_from(input.len()).map_err(|_| Error::InputTooLarge(input.len()))?;

    let units: Vec<Unit> = input
        .chunks(2)
        .map(|c| [c[0], c.get(1).copied().unwrap_or(0)])
        .collect();

    let mut writer = BinaryWriter::with_capacity(HEADER_LEN + input.len() + units.len() / MAX_RUN + 2);
    MzxHeader { decompressed_size }.write(&mut writer);

    match options.strategy {
        MzxStrategy::LiteralOnly => encode_literals(&units, options.mask(), &mut writer),
        MzxStrategy::Greedy => Encoder::new(&units, options).run(&mut writer),
    }

    debug!(
        decompressed = input.len(),
        compressed = writer.len(),
        strategy = ?options.strategy,
        "mzx stream encoded"
    );
    Ok(writer.into_inner())
}

fn encode_literals(units: &[Unit], mask: u8, writer: &mut BinaryWriter) {
    for chunk in units.chunks(MAX_RUN) {
        writer.write_u8(Command::covering(Opcode::Literal, chunk.len()).encode());
        for unit in chunk {
            writer.write_u8(unit[0] ^ mask).write_u8(unit[1] ^ mask);
        }
    }
}

/// Encoding decision for the unit at the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Rle { count: usize },
    BackRef { distance: usize, count: usize },
    RingBuf { slot: usize },
    Literal { count: usize },
}

/// Greedy encoder. Mirrors the decoder's state exactly so every command it
/// picks decodes to the input.
struct Encoder<'a> {
    units: &'a [Unit],
    mask: u8,
    state: MzxState,
    pos: usize,
}

impl<'a> Encoder<'a> {
    fn new(units: &'a [Unit], options: &MzxOptions) -> Self {
        Self {
            units,
            mask: options.mask(),
            state: MzxState::new(options.invert),
            pos: 0,
        }
    }

    fn run(mut self, writer: &mut BinaryWriter) {
        while self.pos < self.units.len() {
            // The decoder ticks before executing, so decide on post-tick state.
            self.state.tick();
            let choice = self.choose();
            self.emit(choice, writer);
        }
    }

    fn choose(&self) -> Choice {
        let rle = self.rle_run(self.pos);
        if rle == MAX_RUN {
            return Choice::Rle { count: rle };
        }

        let (distance, matched) = self.best_backref(self.pos);
        if rle > 0 && rle >= matched {
            return Choice::Rle { count: rle };
        }
        if matched >= 2 {
            return Choice::BackRef {
                distance,
                count: matched,
            };
        }
        if let Some(slot) = self.ring_slot(self.units[self.pos]) {
            return Choice::RingBuf { slot };
        }
        Choice::Literal {
            count: self.literal_run(),
        }
    }

    fn emit(&mut self, choice: Choice, writer: &mut BinaryWriter) {
        match choice {
            Choice::Rle { count } => {
                writer.write_u8(Command::covering(Opcode::Rle, count).encode());
                self.pos += count;
            }
            Choice::BackRef { distance, count } => {
                writer
                    .write_u8(Command::covering(Opcode::BackRef, count).encode())
                    .write_u8((distance - 1) as u8);
                self.state.last = self.units[self.pos + count - 1];
                self.pos += count;
            }
            Choice::RingBuf { slot } => {
                writer.write_u8(
                    Command {
                        opcode: Opcode::RingBuf,
                        len: slot as u8,
                    }
                    .encode(),
                );
                self.state.last = self.state.ring[slot];
                self.pos += 1;
            }
            Choice::Literal { count } => {
                writer.write_u8(Command::covering(Opcode::Literal, count).encode());
                for &unit in &self.units[self.pos..self.pos + count] {
                    writer.write_u8(unit[0] ^ self.mask).write_u8(unit[1] ^ self.mask);
                    self.state.push_literal(unit);
                }
                self.pos += count;
            }
        }
    }

    fn rle_run(&self, pos: usize) -> usize {
        self.units[pos..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&u| u == self.state.last)
            .count()
    }

    /// Longest match for `pos` within the back-reference window, as
    /// `(distance_in_units, matched_units)`.
    fn best_backref(&self, pos: usize) -> (usize, usize) {
        let units = self.units;
        let mut best = (0, 0);
        for distance in 1..=pos.min(MAX_DISTANCE) {
            let mut matched = 0;
            while matched < MAX_RUN
                && pos + matched < units.len()
                && units[pos + matched] == units[pos + matched - distance]
            {
                matched += 1;
            }
            if matched > best.1 {
                best = (distance, matched);
                if matched == MAX_RUN {
                    break;
                }
            }
        }
        best
    }

    fn ring_slot(&self, unit: Unit) -> Option<usize> {
        self.state.ring.iter().position(|&slot| slot == unit)
    }

    /// Length of the literal run starting at the current position. Stops
    /// early where a cheaper command would be available.
    fn literal_run(&self) -> usize {
        let units = self.units;
        let mut ring = self.state.ring;
        let mut cursor = self.state.ring_cursor;
        let mut count = 0;

        loop {
            let unit = units[self.pos + count];
            ring[cursor] = unit;
            cursor = (cursor + 1) % RING_SLOTS;
            count += 1;

            let next_pos = self.pos + count;
            if count == MAX_RUN || next_pos >= units.len() {
                break;
            }
            let next = units[next_pos];
            if next == unit || ring.contains(&next) || self.best_backref(next_pos).1 >= 2 {
                break;
            }
        }
        count
    }
}

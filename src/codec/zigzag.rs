//! Zigzag run-length coding of quantized blocks.
//!
//! Per block: one DC-difference value, then `(run, value)` pairs for the non-zero
//! AC coefficients in zigzag order, then a `(0, 0)` end-of-block pair. Runs longer
//! than 15 are split with `(15, 0)` pairs, each skipping 16 positions. Values in
//! [-127, 127] take one signed byte; anything else is the escape byte followed by a
//! big-endian i16.

use crate::codec::dct::IntBlock;
use crate::constants::{BLOCK_DIM, COEFFICIENT_ESCAPE, MAXIMUM_DC, MAXIMUM_RUN, ZERO_RUN_SKIP};
use crate::stream::{StreamReader, StreamWriter};

/// Zigzag scan pattern for 8x8 blocks: zigzag index -> row-major index.
pub const ZIGZAG_ORDER: [usize; BLOCK_DIM] = [
    0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

const END_OF_BLOCK: [u8; 2] = [0, 0];

fn write_coefficient(writer: &mut StreamWriter, value: i32) {
    if (-127..=127).contains(&value) {
        writer.write_i8(value as i8);
    } else {
        writer.write_i8(COEFFICIENT_ESCAPE);
        writer.write_i16(value.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }
}

fn read_coefficient(reader: &mut StreamReader) -> Option<i32> {
    let byte = reader.read_i8().ok()?;
    if byte == COEFFICIENT_ESCAPE {
        reader.read_i16().ok().map(i32::from)
    } else {
        Some(byte as i32)
    }
}

/// Appends one block to `writer`, coding DC against `previous_dc`.
pub fn encode_block(block: &IntBlock, previous_dc: i32, writer: &mut StreamWriter) {
    write_coefficient(writer, block[ZIGZAG_ORDER[0]] - previous_dc);

    let mut run = 0u32;
    for &index in &ZIGZAG_ORDER[1..] {
        let value = block[index];
        if value == 0 {
            run += 1;
            continue;
        }
        while run > MAXIMUM_RUN {
            writer.write_u8(MAXIMUM_RUN as u8);
            write_coefficient(writer, 0);
            run -= ZERO_RUN_SKIP as u32;
        }
        writer.write_u8(run as u8);
        write_coefficient(writer, value);
        run = 0;
    }
    writer.write_bytes(&END_OF_BLOCK);
}

/// Encodes blocks in order, chaining each DC from the block before it.
#[derive(Debug, Default)]
pub struct ZigzagEncoder {
    writer: StreamWriter,
    previous_dc: i32,
    blocks: usize,
}

impl ZigzagEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_block(&mut self, block: &IntBlock) {
        encode_block(block, self.previous_dc, &mut self.writer);
        self.previous_dc = block[0];
        self.blocks += 1;
    }

    pub fn block_count(&self) -> usize {
        self.blocks
    }

    pub fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// How decoding of a single block ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// The block ended with an end-of-block pair.
    Complete,
    /// A run pushed the cursor past position 63, the stream ended mid-block, or
    /// the DC value left the legal range. Coefficients after the fault are left at zero.
    Malformed,
}

/// Decodes one block, advancing `previous_dc` to the block's DC value.
pub fn decode_block(reader: &mut StreamReader, previous_dc: &mut i32) -> (IntBlock, BlockStatus) {
    let mut block = [0i32; BLOCK_DIM];

    let Some(dc_diff) = read_coefficient(reader) else {
        block[0] = *previous_dc;
        return (block, BlockStatus::Malformed);
    };
    let Some(dc) = previous_dc
        .checked_add(dc_diff)
        .filter(|dc| (-MAXIMUM_DC..=MAXIMUM_DC).contains(dc))
    else {
        // The running DC keeps its last good value.
        block[0] = *previous_dc;
        return (block, BlockStatus::Malformed);
    };
    *previous_dc = dc;
    block[ZIGZAG_ORDER[0]] = dc;

    let mut cursor = 1usize;
    loop {
        let Ok(run) = reader.read_u8() else {
            return (block, BlockStatus::Malformed);
        };
        let Some(value) = read_coefficient(reader) else {
            return (block, BlockStatus::Malformed);
        };

        if run == 0 && value == 0 {
            return (block, BlockStatus::Complete);
        }
        if run as u32 == MAXIMUM_RUN && value == 0 {
            cursor += ZERO_RUN_SKIP;
            if cursor >= BLOCK_DIM {
                return (block, BlockStatus::Malformed);
            }
            continue;
        }

        cursor += run as usize;
        if cursor >= BLOCK_DIM {
            return (block, BlockStatus::Malformed);
        }
        block[ZIGZAG_ORDER[cursor]] = value;
        cursor += 1;

        if cursor == BLOCK_DIM {
            // All 64 positions are filled; only the end-of-block pair may follow.
            if reader.peek_bytes(END_OF_BLOCK.len()) == Some(&END_OF_BLOCK[..])
                && reader.skip(END_OF_BLOCK.len()).is_ok()
            {
                return (block, BlockStatus::Complete);
            }
            return (block, BlockStatus::Malformed);
        }
    }
}

/// Walks a whole coefficient stream block by block.
///
/// Block boundaries are found by consuming DC + AC-until-EOB groups; the block
/// count is not stored anywhere.
pub struct ZigzagDecoder<'a> {
    reader: StreamReader<'a>,
    previous_dc: i32,
    malformed_blocks: usize,
}

impl<'a> ZigzagDecoder<'a> {
    pub fn new(stream: &'a [u8]) -> Self {
        Self {
            reader: StreamReader::new(stream),
            previous_dc: 0,
            malformed_blocks: 0,
        }
    }

    pub fn malformed_blocks(&self) -> usize {
        self.malformed_blocks
    }
}

impl Iterator for ZigzagDecoder<'_> {
    type Item = IntBlock;

    fn next(&mut self) -> Option<IntBlock> {
        if self.reader.is_at_end() {
            return None;
        }
        let (block, status) = decode_block(&mut self.reader, &mut self.previous_dc);
        if status == BlockStatus::Malformed {
            self.malformed_blocks += 1;
            log::trace!("malformed block ending at stream offset {}", self.reader.position());
        }
        Some(block)
    }
}

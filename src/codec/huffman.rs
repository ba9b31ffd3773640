//! Huffman coding of coefficient streams.
//!
//! The symbol table (which bytes occur, and how often) is the only entropy context:
//! encoder and decoder both rebuild the same tree from it with a fixed tie-break, so
//! the tree itself is never stored.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use crate::error::{CodecError, Result};
use crate::stream::{StreamReader, StreamWriter};

const SYMBOL_SPACE: usize = 256;
const MAXIMUM_CODE_LENGTH: u8 = 64;

/// One histogram entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolFrequency {
    pub symbol: u8,
    pub frequency: u32,
}

/// Ordered (symbol, frequency) list that travels with every encoded channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Vec<SymbolFrequency>,
}

impl SymbolTable {
    /// Wraps a list of entries, rejecting repeated symbols.
    pub fn new(entries: Vec<SymbolFrequency>) -> Result<Self> {
        let mut seen = [false; SYMBOL_SPACE];
        for entry in &entries {
            if seen[entry.symbol as usize] {
                return Err(CodecError::CorruptStream("duplicate symbol in table"));
            }
            seen[entry.symbol as usize] = true;
        }
        Ok(Self { entries })
    }

    /// Counts byte occurrences; entries come out in ascending byte order.
    pub fn from_stream(stream: &[u8]) -> Self {
        let mut counts = [0u32; SYMBOL_SPACE];
        for &byte in stream {
            counts[byte as usize] = counts[byte as usize].saturating_add(1);
        }
        let entries = counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(symbol, &frequency)| SymbolFrequency {
                symbol: symbol as u8,
                frequency,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SymbolFrequency] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_frequency(&self) -> u64 {
        self.entries.iter().map(|e| e.frequency as u64).sum()
    }

    /// Entries by descending frequency, ties by ascending symbol.
    pub fn sorted_by_frequency(&self) -> Vec<SymbolFrequency> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.symbol.cmp(&b.symbol)));
        sorted
    }

    /// Writes `u32 count` followed by `count` x (i8 symbol, u32 frequency).
    pub fn write_to(&self, writer: &mut StreamWriter) {
        // At most 256 entries, so the count always fits.
        writer.write_u32(self.entries.len() as u32);
        for entry in &self.entries {
            writer.write_i8(entry.symbol as i8);
            writer.write_u32(entry.frequency);
        }
    }

    pub fn read_from(reader: &mut StreamReader) -> Result<Self> {
        let count = reader.read_u32()? as usize;
        if count > SYMBOL_SPACE {
            return Err(CodecError::CorruptStream("symbol count exceeds 256"));
        }
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let symbol = reader.read_i8()? as u8;
            let frequency = reader.read_u32()?;
            entries.push(SymbolFrequency { symbol, frequency });
        }
        Self::new(entries)
    }
}

/// Frequency histogram of a coefficient stream.
pub fn histogram(stream: &[u8]) -> SymbolTable {
    SymbolTable::from_stream(stream)
}

#[derive(Debug, Clone, Copy)]
struct Node {
    frequency: u64,
    symbol: Option<u8>,
    left: Option<usize>,
    right: Option<usize>,
}

/// Huffman tree stored as an arena; node indices double as creation order.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    root: usize,
}

impl HuffmanTree {
    /// Builds the tree, always taking the two lowest-frequency nodes and breaking
    /// ties by creation order. The first node taken becomes the left child.
    pub fn build(table: &SymbolTable) -> Result<Self> {
        if table.is_empty() {
            return Err(CodecError::MissingSymbolTable);
        }

        let mut nodes: Vec<Node> = table
            .entries()
            .iter()
            .map(|entry| Node {
                frequency: entry.frequency as u64,
                symbol: Some(entry.symbol),
                left: None,
                right: None,
            })
            .collect();

        if nodes.len() == 1 {
            nodes.push(Node {
                frequency: nodes[0].frequency,
                symbol: None,
                left: Some(0),
                right: None,
            });
            return Ok(Self { nodes, root: 1 });
        }

        let mut queue: BinaryHeap<Reverse<(u64, usize)>> = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| Reverse((node.frequency, index)))
            .collect();

        while queue.len() > 1 {
            let (Some(Reverse((left_freq, left))), Some(Reverse((right_freq, right)))) =
                (queue.pop(), queue.pop())
            else {
                break;
            };
            let index = nodes.len();
            let frequency = left_freq + right_freq;
            nodes.push(Node {
                frequency,
                symbol: None,
                left: Some(left),
                right: Some(right),
            });
            queue.push(Reverse((frequency, index)));
        }

        let root = nodes.len() - 1;
        Ok(Self { nodes, root })
    }

    /// Derives the code table with an explicit stack walk: `0` on left edges, `1` on right.
    pub fn code_table(&self) -> Result<CodeTable> {
        let mut codes = [None; SYMBOL_SPACE];
        let mut stack = vec![(self.root, HuffmanCode::default())];

        while let Some((index, code)) = stack.pop() {
            let node = &self.nodes[index];
            if let Some(symbol) = node.symbol {
                codes[symbol as usize] = Some(code);
                continue;
            }
            if code.length == MAXIMUM_CODE_LENGTH {
                return Err(CodecError::CorruptStream("code longer than 64 bits"));
            }
            if let Some(right) = node.right {
                stack.push((right, code.extended(1)));
            }
            if let Some(left) = node.left {
                stack.push((left, code.extended(0)));
            }
        }
        Ok(CodeTable { codes })
    }

    /// Walks the tree over the first `bit_count` bits of `payload`.
    pub fn unpack(&self, payload: &[u8], bit_count: u64) -> Result<Vec<u8>> {
        if bit_count > payload.len() as u64 * 8 {
            return Err(CodecError::CorruptStream("bit count exceeds payload"));
        }

        let mut output = Vec::new();
        let mut reader = BitReader::new(payload, bit_count);
        let mut cursor = self.root;
        while let Some(bit) = reader.read_bit() {
            let node = &self.nodes[cursor];
            let next = if bit { node.right } else { node.left };
            cursor = next.ok_or(CodecError::CorruptStream("code leads to a missing branch"))?;
            if let Some(symbol) = self.nodes[cursor].symbol {
                output.push(symbol);
                cursor = self.root;
            }
        }
        if cursor != self.root {
            return Err(CodecError::CorruptStream("payload ends inside a code"));
        }
        Ok(output)
    }
}

/// Represents a Huffman code with its bit value and length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    pub value: u64,
    pub length: u8,
}

impl HuffmanCode {
    fn extended(self, bit: u64) -> Self {
        Self {
            value: (self.value << 1) | bit,
            length: self.length + 1,
        }
    }
}

impl fmt::Display for HuffmanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for shift in (0..self.length).rev() {
            let bit = (self.value >> shift) & 1;
            f.write_str(if bit == 1 { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Symbol -> code lookup.
#[derive(Debug, Clone)]
pub struct CodeTable {
    codes: [Option<HuffmanCode>; SYMBOL_SPACE],
}

impl CodeTable {
    pub fn get(&self, symbol: u8) -> Option<HuffmanCode> {
        self.codes[symbol as usize]
    }

    pub fn len(&self) -> usize {
        self.codes.iter().filter(|code| code.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(symbol, code)` pairs in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, HuffmanCode)> + '_ {
        self.codes
            .iter()
            .enumerate()
            .filter_map(|(symbol, code)| code.map(|code| (symbol as u8, code)))
    }

    /// Packs `stream` MSB-first; the final partial byte is zero-padded.
    pub fn pack(&self, stream: &[u8]) -> Result<PackedPayload> {
        let mut writer = BitWriter::new();
        for &byte in stream {
            let code = self
                .get(byte)
                .ok_or(CodecError::CorruptStream("symbol missing from code table"))?;
            writer.write_bits(code.value, code.length);
        }
        Ok(writer.finish())
    }
}

/// Packed payload bytes and the number of meaningful bits in them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedPayload {
    pub bytes: Vec<u8>,
    pub bit_count: u64,
}

/// Accumulates bits most-significant-first.
#[derive(Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    bit_buffer: u8,
    bits_in_buffer: u8,
    bit_count: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bits(&mut self, value: u64, length: u8) {
        for shift in (0..length).rev() {
            let bit = ((value >> shift) & 1) as u8;
            self.bit_buffer = (self.bit_buffer << 1) | bit;
            self.bits_in_buffer += 1;
            if self.bits_in_buffer == 8 {
                self.buffer.push(self.bit_buffer);
                self.bit_buffer = 0;
                self.bits_in_buffer = 0;
            }
        }
        self.bit_count += length as u64;
    }

    pub fn finish(mut self) -> PackedPayload {
        if self.bits_in_buffer > 0 {
            self.buffer.push(self.bit_buffer << (8 - self.bits_in_buffer));
        }
        PackedPayload {
            bytes: self.buffer,
            bit_count: self.bit_count,
        }
    }
}

/// Reads single bits MSB-first, stopping at a fixed bit count.
pub struct BitReader<'a> {
    source: &'a [u8],
    position: u64,
    limit: u64,
}

impl<'a> BitReader<'a> {
    pub fn new(source: &'a [u8], limit: u64) -> Self {
        Self {
            source,
            position: 0,
            limit: limit.min(source.len() as u64 * 8),
        }
    }

    pub fn read_bit(&mut self) -> Option<bool> {
        if self.position >= self.limit {
            return None;
        }
        let byte = self.source[(self.position / 8) as usize];
        let bit = (byte >> (7 - (self.position % 8))) & 1;
        self.position += 1;
        Some(bit == 1)
    }
}

/// Histogram, tree and packing in one step.
pub fn compress(stream: &[u8]) -> Result<(SymbolTable, PackedPayload)> {
    let table = histogram(stream);
    let tree = HuffmanTree::build(&table)?;
    let payload = tree.code_table()?.pack(stream)?;
    log::debug!(
        "huffman: {} symbols, {} stream bytes -> {} payload bits",
        table.len(),
        stream.len(),
        payload.bit_count
    );
    Ok((table, payload))
}

/// Rebuilds the tree from `table` and unpacks `bit_count` bits of `payload`.
pub fn decompress(table: &SymbolTable, payload: &[u8], bit_count: u64) -> Result<Vec<u8>> {
    HuffmanTree::build(table)?.unpack(payload, bit_count)
}

//! Single-plane codec and its container.
//!
//! Container layout (big-endian):
//! `[u32 symbol count][count x (i8 symbol, u32 frequency)][u32 payload bytes][u64 payload bits][payload]`.
//! No width or height is stored; see [`infer_block_shape`].

use crate::codec::dct::{IntBlock, fdct_8x8, idct_8x8};
use crate::codec::huffman::{self, SymbolTable};
use crate::codec::quantization::{QuantTable, build_q_table, dequantize_block, quantize_block, validate_quality};
use crate::codec::zigzag::{ZigzagDecoder, ZigzagEncoder};
use crate::constants::{BLOCK_DIM, BLOCK_SIZE, LEVEL_SHIFT};
use crate::error::{CodecError, Result};
use crate::stream::{StreamReader, StreamWriter};
use crate::Plane;

/// Parsed per-channel container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelContainer {
    pub table: SymbolTable,
    pub payload: Vec<u8>,
    pub bit_count: u64,
}

impl ChannelContainer {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let byte_count = u32::try_from(self.payload.len())
            .map_err(|_| CodecError::CorruptStream("payload larger than 4 GiB"))?;
        let mut writer = StreamWriter::with_capacity(self.payload.len() + 16 + self.table.len() * 5);
        self.table.write_to(&mut writer);
        writer.write_u32(byte_count);
        writer.write_u64(self.bit_count);
        writer.write_bytes(&self.payload);
        Ok(writer.into_inner())
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = StreamReader::new(bytes);
        let table = SymbolTable::read_from(&mut reader)?;
        let byte_count = reader.read_u32()? as usize;
        let bit_count = reader.read_u64()?;
        let payload = reader.read_bytes(byte_count)?;
        if bit_count > byte_count as u64 * 8 {
            return Err(CodecError::CorruptStream("bit count exceeds payload"));
        }
        if !reader.is_at_end() {
            return Err(CodecError::CorruptStream("trailing bytes after payload"));
        }
        Ok(Self {
            table,
            payload: payload.to_vec(),
            bit_count,
        })
    }
}

/// Result of [`GrayscaleCodec::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPlane {
    /// Container bytes.
    pub bytes: Vec<u8>,
    /// Entropy context needed to decode `bytes`.
    pub table: SymbolTable,
    /// Length of the run-length coefficient stream before Huffman packing.
    pub stream_len: usize,
    pub payload_bits: u64,
}

/// Rejects planes the block pipeline cannot cover exactly.
pub fn check_block_geometry(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidGeometry {
            width,
            height,
            reason: "dimensions must be non-zero",
        });
    }
    if width % BLOCK_SIZE as u32 != 0 || height % BLOCK_SIZE as u32 != 0 {
        return Err(CodecError::InvalidGeometry {
            width,
            height,
            reason: "dimensions must be multiples of 8",
        });
    }
    Ok(())
}

/// Picks `(blocks_wide, blocks_high)` for `block_count` blocks: the factor pair
/// with `wide >= high` that is closest to square.
pub fn infer_block_shape(block_count: usize) -> Result<(usize, usize)> {
    if block_count == 0 {
        return Err(CodecError::CorruptStream("stream holds no blocks"));
    }
    let mut high = (block_count as f64).sqrt() as usize;
    while high * high > block_count {
        high -= 1;
    }
    while (high + 1) * (high + 1) <= block_count {
        high += 1;
    }
    while block_count % high != 0 {
        high -= 1;
    }
    Ok((block_count / high, high))
}

/// Transform, quantize and entropy-code one 8-bit plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrayscaleCodec {
    quality: u32,
}

impl GrayscaleCodec {
    pub fn new(quality: u32) -> Result<Self> {
        Ok(Self {
            quality: validate_quality(quality)?,
        })
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Quantized blocks of `plane` in raster order.
    pub fn quantized_blocks(&self, plane: &Plane) -> Result<Vec<IntBlock>> {
        check_block_geometry(plane.width(), plane.height())?;
        let table = build_q_table(self.quality)?;
        let width = plane.width() as usize;
        let blocks_wide = width / BLOCK_SIZE;
        let blocks_high = plane.height() as usize / BLOCK_SIZE;
        let data = plane.data();

        let mut blocks = Vec::with_capacity(blocks_wide * blocks_high);
        for by in 0..blocks_high {
            for bx in 0..blocks_wide {
                let mut block = [0i32; BLOCK_DIM];
                for row in 0..BLOCK_SIZE {
                    let start = (by * BLOCK_SIZE + row) * width + bx * BLOCK_SIZE;
                    for (col, &sample) in data[start..start + BLOCK_SIZE].iter().enumerate() {
                        block[row * BLOCK_SIZE + col] = sample as i32 - LEVEL_SHIFT;
                    }
                }
                blocks.push(quantize_block(&fdct_8x8(&block), &table));
            }
        }
        Ok(blocks)
    }

    /// The run-length coefficient stream, before Huffman packing.
    pub fn coefficient_stream(&self, plane: &Plane) -> Result<Vec<u8>> {
        let mut encoder = ZigzagEncoder::new();
        for block in self.quantized_blocks(plane)? {
            encoder.push_block(&block);
        }
        Ok(encoder.finish())
    }

    pub fn encode(&self, plane: &Plane) -> Result<EncodedPlane> {
        let stream = self.coefficient_stream(plane)?;
        let (table, payload) = huffman::compress(&stream)?;
        log::debug!(
            "encoded {}x{} plane at quality {}: {} stream bytes, {} symbols, {} payload bits",
            plane.width(),
            plane.height(),
            self.quality,
            stream.len(),
            table.len(),
            payload.bit_count
        );

        let container = ChannelContainer {
            table,
            payload: payload.bytes,
            bit_count: payload.bit_count,
        };
        Ok(EncodedPlane {
            bytes: container.to_bytes()?,
            table: container.table,
            stream_len: stream.len(),
            payload_bits: payload.bit_count,
        })
    }

    /// Decodes a container, inferring the plane shape from its block count.
    pub fn decode(&self, bytes: &[u8]) -> Result<Plane> {
        let container = ChannelContainer::parse(bytes)?;
        let blocks = self.decode_blocks(&container)?;
        let (blocks_wide, blocks_high) = infer_block_shape(blocks.len())?;
        self.assemble(&blocks, blocks_wide, blocks_high)
    }

    pub fn decode_with_shape(&self, bytes: &[u8], width: u32, height: u32) -> Result<Plane> {
        let container = ChannelContainer::parse(bytes)?;
        self.decode_container(&container, width, height)
    }

    /// Decodes with an explicitly supplied entropy context, which must match the
    /// table carried in the container.
    pub fn decode_with_table(&self, bytes: &[u8], table: &SymbolTable, width: u32, height: u32) -> Result<Plane> {
        if table.is_empty() {
            return Err(CodecError::MissingSymbolTable);
        }
        let container = ChannelContainer::parse(bytes)?;
        if container.table != *table {
            return Err(CodecError::SymbolTableMismatch);
        }
        self.decode_container(&container, width, height)
    }

    fn decode_container(&self, container: &ChannelContainer, width: u32, height: u32) -> Result<Plane> {
        check_block_geometry(width, height)?;
        let blocks = self.decode_blocks(container)?;
        let blocks_wide = width as usize / BLOCK_SIZE;
        let blocks_high = height as usize / BLOCK_SIZE;
        if blocks.len() != blocks_wide * blocks_high {
            log::debug!(
                "block count {} does not match {}x{} plane",
                blocks.len(),
                width,
                height
            );
            return Err(CodecError::CorruptStream("block count does not match plane dimensions"));
        }
        self.assemble(&blocks, blocks_wide, blocks_high)
    }

    fn decode_blocks(&self, container: &ChannelContainer) -> Result<Vec<IntBlock>> {
        let stream = huffman::decompress(&container.table, &container.payload, container.bit_count)?;
        let mut decoder = ZigzagDecoder::new(&stream);
        let blocks: Vec<IntBlock> = decoder.by_ref().collect();
        if decoder.malformed_blocks() > 0 {
            log::warn!(
                "{} of {} blocks were malformed; their trailing coefficients were zeroed",
                decoder.malformed_blocks(),
                blocks.len()
            );
        }
        log::debug!("decoded {} stream bytes into {} blocks", stream.len(), blocks.len());
        Ok(blocks)
    }

    fn assemble(&self, blocks: &[IntBlock], blocks_wide: usize, blocks_high: usize) -> Result<Plane> {
        let table: QuantTable = build_q_table(self.quality)?;
        let width = blocks_wide * BLOCK_SIZE;
        let height = blocks_high * BLOCK_SIZE;
        let mut data = vec![0u8; width * height];

        for (index, block) in blocks.iter().enumerate() {
            let by = index / blocks_wide;
            let bx = index % blocks_wide;
            let spatial = idct_8x8(&dequantize_block(block, &table));
            for row in 0..BLOCK_SIZE {
                let start = (by * BLOCK_SIZE + row) * width + bx * BLOCK_SIZE;
                for (col, sample) in data[start..start + BLOCK_SIZE].iter_mut().enumerate() {
                    *sample = spatial[row * BLOCK_SIZE + col].saturating_add(LEVEL_SHIFT).clamp(0, 255) as u8;
                }
            }
        }
        Plane::new(width as u32, height as u32, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_plane(width: u32, height: u32, value: u8) -> Plane {
        Plane::new(width, height, vec![value; (width * height) as usize]).unwrap()
    }

    #[test]
    fn test_infer_block_shape() {
        assert_eq!(infer_block_shape(1).unwrap(), (1, 1));
        assert_eq!(infer_block_shape(4).unwrap(), (2, 2));
        assert_eq!(infer_block_shape(6).unwrap(), (3, 2));
        assert_eq!(infer_block_shape(7).unwrap(), (7, 1));
        assert_eq!(infer_block_shape(12).unwrap(), (4, 3));
        assert!(matches!(infer_block_shape(0), Err(CodecError::CorruptStream(_))));
    }

    #[test]
    fn test_flat_plane_is_lossless() {
        let codec = GrayscaleCodec::new(50).unwrap();
        let plane = flat_plane(16, 16, 200);
        let encoded = codec.encode(&plane).unwrap();
        // Four blocks, each: DC diff, EOB pair.
        assert_eq!(encoded.stream_len, 12);
        assert_eq!(codec.decode(&encoded.bytes).unwrap(), plane);
        assert_eq!(
            codec.decode_with_table(&encoded.bytes, &encoded.table, 16, 16).unwrap(),
            plane
        );
    }

    #[test]
    fn test_decode_infers_wide_shape() {
        let codec = GrayscaleCodec::new(75).unwrap();
        let encoded = codec.encode(&flat_plane(8, 24, 90)).unwrap();
        let decoded = codec.decode(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 8));
        let tall = codec.decode_with_shape(&encoded.bytes, 8, 24).unwrap();
        assert_eq!((tall.width(), tall.height()), (8, 24));
    }

    #[test]
    fn test_decode_with_wrong_shape_or_table() {
        let codec = GrayscaleCodec::new(50).unwrap();
        let encoded = codec.encode(&flat_plane(16, 8, 10)).unwrap();
        assert!(matches!(
            codec.decode_with_shape(&encoded.bytes, 16, 16),
            Err(CodecError::CorruptStream(_))
        ));

        let other = codec.encode(&flat_plane(16, 8, 250)).unwrap().table;
        assert!(matches!(
            codec.decode_with_table(&encoded.bytes, &other, 16, 8),
            Err(CodecError::SymbolTableMismatch)
        ));
        assert!(matches!(
            codec.decode_with_table(&encoded.bytes, &SymbolTable::default(), 16, 8),
            Err(CodecError::MissingSymbolTable)
        ));
    }

    #[test]
    fn test_invalid_geometry_and_quality() {
        let codec = GrayscaleCodec::new(50).unwrap();
        assert!(matches!(
            codec.encode(&flat_plane(12, 8, 0)),
            Err(CodecError::InvalidGeometry { width: 12, .. })
        ));
        assert!(matches!(GrayscaleCodec::new(0), Err(CodecError::InvalidQuality(0))));
    }

    #[test]
    fn test_container_layout() {
        let container = ChannelContainer {
            table: huffman::histogram(&[0, 0, 3]),
            payload: vec![0b0010_0000],
            bit_count: 3,
        };
        let bytes = container.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![
                0, 0, 0, 2, // symbol count
                0, 0, 0, 0, 2, // symbol 0 x2
                3, 0, 0, 0, 1, // symbol 3 x1
                0, 0, 0, 1, // payload bytes
                0, 0, 0, 0, 0, 0, 0, 3, // payload bits
                0b0010_0000,
            ]
        );
        assert_eq!(ChannelContainer::parse(&bytes).unwrap(), container);

        assert!(matches!(
            ChannelContainer::parse(&bytes[..bytes.len() - 1]),
            Err(CodecError::NeedMoreData)
        ));
        let mut oversized = bytes.clone();
        oversized[25] = 9;
        assert!(matches!(ChannelContainer::parse(&oversized), Err(CodecError::CorruptStream(_))));
    }
}

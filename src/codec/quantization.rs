//! Quality-scaled quantization of DCT coefficients.
//! The table is rebuilt from the quality value on every call.

use crate::codec::dct::{CoefficientBlock, IntBlock};
use crate::constants::{BLOCK_DIM, MAXIMUM_QUALITY, MINIMUM_QUALITY};
use crate::error::{CodecError, Result};

pub type QuantTable = [u16; BLOCK_DIM];

/// Standard JPEG luminance quantization table (Quality 50).
pub const STD_LUMINANCE_QUANT_TABLE: [u8; BLOCK_DIM] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

pub fn validate_quality(quality: u32) -> Result<u32> {
    if (MINIMUM_QUALITY..=MAXIMUM_QUALITY).contains(&quality) {
        Ok(quality)
    } else {
        Err(CodecError::InvalidQuality(quality))
    }
}

/// Scales the luminance base table by a quality factor (1-100).
///
/// `lambda = 5000 / quality` below 50, `200 - 2 * quality` otherwise; each entry is
/// `floor((base * lambda + 50) / 100)` clamped to [1, 255].
pub fn build_q_table(quality: u32) -> Result<QuantTable> {
    let quality = validate_quality(quality)?;
    let lambda = if quality < 50 {
        5000.0 / quality as f64
    } else {
        200.0 - 2.0 * quality as f64
    };

    let mut table = [0u16; BLOCK_DIM];
    for (entry, &base) in table.iter_mut().zip(STD_LUMINANCE_QUANT_TABLE.iter()) {
        let val = ((base as f64 * lambda + 50.0) / 100.0).floor();
        *entry = val.clamp(1.0, 255.0) as u16;
    }
    Ok(table)
}

pub fn quantize_block(dct_block: &CoefficientBlock, quant_table: &QuantTable) -> IntBlock {
    let mut output = [0i32; BLOCK_DIM];
    for i in 0..BLOCK_DIM {
        output[i] = (dct_block[i] / quant_table[i] as f64).round() as i32;
    }
    output
}

pub fn dequantize_block(quant_block: &IntBlock, quant_table: &QuantTable) -> CoefficientBlock {
    let mut output = [0.0f64; BLOCK_DIM];
    for i in 0..BLOCK_DIM {
        output[i] = quant_block[i] as f64 * quant_table[i] as f64;
    }
    output
}

/// Builds the table for `quality` and quantizes one block with it.
pub fn quantize(dct_block: &CoefficientBlock, quality: u32) -> Result<IntBlock> {
    Ok(quantize_block(dct_block, &build_q_table(quality)?))
}

/// Builds the table for `quality` and dequantizes one block with it.
pub fn dequantize(quant_block: &IntBlock, quality: u32) -> Result<CoefficientBlock> {
    Ok(dequantize_block(quant_block, &build_q_table(quality)?))
}

//! Reconstruction quality and compression metrics.

use crate::codec::dct::IntBlock;
use crate::constants::PEAK_SAMPLE_VALUE;
use crate::error::{CodecError, Result};

/// Mean squared error between two equally sized sample buffers.
pub fn mse(original: &[u8], reconstructed: &[u8]) -> Result<f64> {
    if original.len() != reconstructed.len() {
        return Err(CodecError::InvalidPixelData {
            expected: original.len(),
            actual: reconstructed.len(),
        });
    }
    if original.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = original
        .iter()
        .zip(reconstructed)
        .map(|(&a, &b)| {
            let diff = a as f64 - b as f64;
            diff * diff
        })
        .sum();
    Ok(sum / original.len() as f64)
}

/// Peak signal-to-noise ratio in dB; infinite for identical inputs.
pub fn psnr(original: &[u8], reconstructed: &[u8]) -> Result<f64> {
    let error = mse(original, reconstructed)?;
    if error == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (PEAK_SAMPLE_VALUE * PEAK_SAMPLE_VALUE / error).log10())
}

pub fn block_mse(original: &IntBlock, reconstructed: &IntBlock) -> f64 {
    let sum: i64 = original
        .iter()
        .zip(reconstructed)
        .map(|(&a, &b)| {
            let diff = (a - b) as i64;
            diff * diff
        })
        .sum();
    sum as f64 / original.len() as f64
}

/// Fraction of zero coefficients in a quantized block.
pub fn zero_fraction(quantized: &IntBlock) -> f64 {
    quantized.iter().filter(|&&v| v == 0).count() as f64 / quantized.len() as f64
}

pub fn compression_ratio(original_len: usize, compressed_len: usize) -> f64 {
    if compressed_len == 0 {
        return f64::INFINITY;
    }
    original_len as f64 / compressed_len as f64
}

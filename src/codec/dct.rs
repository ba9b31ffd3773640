//! Discrete Cosine Transform (DCT) over 8x8 blocks.
//!
//! Uses the direct O(N^4) definition so coefficient values are reproducible
//! to the documented reference values. Blocks are row-major: `block[x * 8 + y]`.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use crate::constants::{BLOCK_DIM, BLOCK_SIZE};

/// A spatial-domain (level-shifted) or quantized block.
pub type IntBlock = [i32; BLOCK_DIM];
/// A frequency-domain block.
pub type CoefficientBlock = [f64; BLOCK_DIM];

#[inline]
fn normalization(k: usize) -> f64 {
    if k == 0 { FRAC_1_SQRT_2 } else { 1.0 }
}

#[inline]
fn basis(position: usize, frequency: usize) -> f64 {
    (((2 * position + 1) * frequency) as f64 * PI / 16.0).cos()
}

pub fn fdct_8x8(input: &IntBlock) -> CoefficientBlock {
    let mut output = [0.0f64; BLOCK_DIM];
    for u in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            let mut sum = 0.0f64;
            for x in 0..BLOCK_SIZE {
                for y in 0..BLOCK_SIZE {
                    sum += input[x * BLOCK_SIZE + y] as f64 * basis(x, u) * basis(y, v);
                }
            }
            output[u * BLOCK_SIZE + v] = 0.25 * normalization(u) * normalization(v) * sum;
        }
    }
    output
}

/// Inverse transform; each sample is rounded half away from zero.
pub fn idct_8x8(input: &CoefficientBlock) -> IntBlock {
    let mut output = [0i32; BLOCK_DIM];
    for x in 0..BLOCK_SIZE {
        for y in 0..BLOCK_SIZE {
            let mut sum = 0.0f64;
            for u in 0..BLOCK_SIZE {
                for v in 0..BLOCK_SIZE {
                    sum += normalization(u)
                        * normalization(v)
                        * input[u * BLOCK_SIZE + v]
                        * basis(x, u)
                        * basis(y, v);
                }
            }
            output[x * BLOCK_SIZE + y] = (0.25 * sum).round() as i32;
        }
    }
    output
}

//! Codec stages, leaf to root: transform, quantization, zigzag run-length coding,
//! Huffman coding, the single-plane codec and the color front end.

pub mod color;
pub mod color_codec;
pub mod dct;
pub mod grayscale;
pub mod huffman;
pub mod quantization;
pub mod zigzag;

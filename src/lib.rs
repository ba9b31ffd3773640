//! Block-transform still-image codec for grayscale and YCbCr color images.
//!
//! Planes are split into 8x8 blocks, transformed, quantized by a quality-scaled
//! table, run-length coded in zigzag order and Huffman packed into a small
//! self-describing container. Color images travel as three such containers plus a
//! metadata sidecar.

pub mod codec;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod stream;

pub use codec::color::ChromaSubsampling;
pub use codec::color_codec::{ChannelId, ChannelMetadata, ColorCodec, ColorEncoded, ColorMetadata};
pub use codec::grayscale::{EncodedPlane, GrayscaleCodec};
pub use codec::huffman::{CodeTable, HuffmanCode, SymbolFrequency, SymbolTable};
pub use error::{CodecError, Result};

/// A single 8-bit channel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Plane {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(CodecError::InvalidPixelData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y as usize * self.width as usize + x as usize).copied()
    }
}

/// Interleaved 8-bit RGB image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CodecError::InvalidPixelData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.data[offset], self.data[offset + 1], self.data[offset + 2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_validates_length() {
        assert!(Plane::new(8, 8, vec![0; 64]).is_ok());
        assert!(matches!(
            Plane::new(8, 8, vec![0; 63]),
            Err(CodecError::InvalidPixelData { expected: 64, actual: 63 })
        ));
        assert!(matches!(
            RgbImage::new(2, 2, vec![0; 4]),
            Err(CodecError::InvalidPixelData { expected: 12, actual: 4 })
        ));
    }

    #[test]
    fn test_pixel_access() {
        let plane = Plane::new(2, 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(plane.pixel(1, 1), Some(4));
        assert_eq!(plane.pixel(2, 0), None);

        let image = RgbImage::new(2, 1, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(image.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(image.pixel(0, 1), None);
    }
}

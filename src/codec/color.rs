//! Color front end: BT.601 full-range RGB <-> YCbCr and chroma resampling.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::constants::BLOCK_SIZE;
use crate::error::{CodecError, Result};
use crate::{Plane, RgbImage};

/// Chroma subsampling mode. The discriminant is the value stored in color metadata.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ChromaSubsampling {
    /// Full-resolution chroma.
    Yuv444 = 0,
    /// Chroma halved horizontally.
    Yuv422 = 1,
    /// Chroma halved on both axes.
    #[default]
    Yuv420 = 2,
    /// Chroma quartered horizontally.
    Yuv411 = 3,
}

impl ChromaSubsampling {
    pub fn from_u32(value: u32) -> Result<Self> {
        Self::try_from(value).map_err(|e| CodecError::InvalidSubsampling(e.number))
    }

    /// (horizontal, vertical) reduction factors.
    pub fn factors(self) -> (u32, u32) {
        match self {
            ChromaSubsampling::Yuv444 => (1, 1),
            ChromaSubsampling::Yuv422 => (2, 1),
            ChromaSubsampling::Yuv420 => (2, 2),
            ChromaSubsampling::Yuv411 => (4, 1),
        }
    }

    pub fn notation(self) -> &'static str {
        match self {
            ChromaSubsampling::Yuv444 => "4:4:4",
            ChromaSubsampling::Yuv422 => "4:2:2",
            ChromaSubsampling::Yuv420 => "4:2:0",
            ChromaSubsampling::Yuv411 => "4:1:1",
        }
    }

    /// Chroma plane size for a `width` x `height` image.
    pub fn chroma_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        let (fx, fy) = self.factors();
        (width / fx, height / fy)
    }

    /// Both axes must be multiples of `8 * factor` so chroma planes still tile into blocks.
    pub fn check_geometry(self, width: u32, height: u32) -> Result<()> {
        let (fx, fy) = self.factors();
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidGeometry {
                width,
                height,
                reason: "dimensions must be non-zero",
            });
        }
        if width % (BLOCK_SIZE as u32 * fx) != 0 || height % (BLOCK_SIZE as u32 * fy) != 0 {
            return Err(CodecError::InvalidGeometry {
                width,
                height,
                reason: "dimensions must be multiples of 8 times the subsampling factor",
            });
        }
        Ok(())
    }
}

#[inline]
fn to_sample(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

pub fn rgb_to_ycbcr_pixel(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = -0.168736 * r - 0.331264 * g + 0.5 * b + 128.0;
    let cr = 0.5 * r - 0.418688 * g - 0.081312 * b + 128.0;
    (to_sample(y), to_sample(cb), to_sample(cr))
}

pub fn ycbcr_to_rgb_pixel(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as f64;
    let cb = cb as f64 - 128.0;
    let cr = cr as f64 - 128.0;
    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;
    (to_sample(r), to_sample(g), to_sample(b))
}

/// Splits an RGB image into full-resolution Y, Cb and Cr planes.
pub fn rgb_to_ycbcr(image: &RgbImage) -> Result<[Plane; 3]> {
    let pixels = image.width() as usize * image.height() as usize;
    let mut y_plane = Vec::with_capacity(pixels);
    let mut cb_plane = Vec::with_capacity(pixels);
    let mut cr_plane = Vec::with_capacity(pixels);
    for rgb in image.data().chunks_exact(3) {
        let (y, cb, cr) = rgb_to_ycbcr_pixel(rgb[0], rgb[1], rgb[2]);
        y_plane.push(y);
        cb_plane.push(cb);
        cr_plane.push(cr);
    }
    Ok([
        Plane::new(image.width(), image.height(), y_plane)?,
        Plane::new(image.width(), image.height(), cb_plane)?,
        Plane::new(image.width(), image.height(), cr_plane)?,
    ])
}

/// Merges three equally sized planes back into RGB.
pub fn ycbcr_to_rgb(y: &Plane, cb: &Plane, cr: &Plane) -> Result<RgbImage> {
    for chroma in [cb, cr] {
        if chroma.width() != y.width() || chroma.height() != y.height() {
            return Err(CodecError::InvalidGeometry {
                width: chroma.width(),
                height: chroma.height(),
                reason: "chroma plane does not match luma dimensions",
            });
        }
    }

    let mut data = Vec::with_capacity(y.data().len() * 3);
    for ((&y, &cb), &cr) in y.data().iter().zip(cb.data()).zip(cr.data()) {
        let (r, g, b) = ycbcr_to_rgb_pixel(y, cb, cr);
        data.extend_from_slice(&[r, g, b]);
    }
    RgbImage::new(y.width(), y.height(), data)
}

/// Reduces a chroma plane by block-averaging over the mode's factors.
pub fn subsample(plane: &Plane, mode: ChromaSubsampling) -> Result<Plane> {
    mode.check_geometry(plane.width(), plane.height())?;
    let (fx, fy) = mode.factors();
    if (fx, fy) == (1, 1) {
        return Ok(plane.clone());
    }

    let (fx, fy) = (fx as usize, fy as usize);
    let width = plane.width() as usize;
    let out_width = width / fx;
    let out_height = plane.height() as usize / fy;
    let area = (fx * fy) as u32;
    let data = plane.data();

    let mut output = Vec::with_capacity(out_width * out_height);
    for oy in 0..out_height {
        for ox in 0..out_width {
            let mut sum = 0u32;
            for dy in 0..fy {
                let start = (oy * fy + dy) * width + ox * fx;
                sum += data[start..start + fx].iter().map(|&v| v as u32).sum::<u32>();
            }
            // Integer round-half-up of sum / area.
            output.push(((sum + area / 2) / area) as u8);
        }
    }
    Plane::new(out_width as u32, out_height as u32, output)
}

/// Nearest-neighbour resize to `width` x `height`:
/// `src = min(floor(dst * src_len / dst_len), src_len - 1)` on each axis.
pub fn upsample(plane: &Plane, width: u32, height: u32) -> Result<Plane> {
    if plane.width() == 0 || plane.height() == 0 || width == 0 || height == 0 {
        return Err(CodecError::InvalidGeometry {
            width,
            height,
            reason: "cannot resample an empty plane",
        });
    }
    if (plane.width(), plane.height()) == (width, height) {
        return Ok(plane.clone());
    }

    let src_width = plane.width() as u64;
    let src_height = plane.height() as u64;
    let columns: Vec<usize> = (0..width as u64)
        .map(|x| (x * src_width / width as u64).min(src_width - 1) as usize)
        .collect();

    let data = plane.data();
    let mut output = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as u64 {
        let src_row = (y * src_height / height as u64).min(src_height - 1) as usize;
        let row = &data[src_row * src_width as usize..(src_row + 1) * src_width as usize];
        output.extend(columns.iter().map(|&x| row[x]));
    }
    Plane::new(width, height, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsampling_values() {
        assert_eq!(u32::from(ChromaSubsampling::Yuv411), 3);
        assert_eq!(ChromaSubsampling::from_u32(1).unwrap(), ChromaSubsampling::Yuv422);
        assert!(matches!(ChromaSubsampling::from_u32(4), Err(CodecError::InvalidSubsampling(4))));
        assert!(matches!(
            ChromaSubsampling::from_u32(u32::MAX),
            Err(CodecError::InvalidSubsampling(u32::MAX))
        ));
        assert_eq!(ChromaSubsampling::default(), ChromaSubsampling::Yuv420);
        assert_eq!(ChromaSubsampling::Yuv411.chroma_dimensions(64, 16), (16, 16));
    }

    #[test]
    fn test_primary_colors() {
        assert_eq!(rgb_to_ycbcr_pixel(0, 0, 0), (0, 128, 128));
        assert_eq!(rgb_to_ycbcr_pixel(255, 255, 255), (255, 128, 128));
        assert_eq!(rgb_to_ycbcr_pixel(255, 0, 0), (76, 85, 255));
        assert_eq!(ycbcr_to_rgb_pixel(0, 128, 128), (0, 0, 0));
        assert_eq!(ycbcr_to_rgb_pixel(255, 128, 128), (255, 255, 255));
    }

    #[test]
    fn test_color_conversion_roundtrip_is_close() {
        for r in (0..=255).step_by(15) {
            for g in (0..=255).step_by(17) {
                for b in (0..=255).step_by(51) {
                    let (y, cb, cr) = rgb_to_ycbcr_pixel(r, g, b);
                    let (r2, g2, b2) = ycbcr_to_rgb_pixel(y, cb, cr);
                    for (a, b) in [(r, r2), (g, g2), (b, b2)] {
                        assert!((a as i32 - b as i32).abs() <= 3, "{:?} -> {:?}", (r, g, b), (r2, g2, b2));
                    }
                }
            }
        }
    }

    #[test]
    fn test_subsample_averages_blocks() {
        // 16x16 plane whose value is the column index.
        let data: Vec<u8> = (0..256).map(|i| (i % 16) as u8).collect();
        let plane = Plane::new(16, 16, data).unwrap();
        let half = subsample(&plane, ChromaSubsampling::Yuv420).unwrap();
        assert_eq!((half.width(), half.height()), (8, 8));
        // Columns 0,1 average to 0.5 -> 1; columns 2,3 to 2.5 -> 3.
        assert_eq!(&half.data()[..3], &[1, 3, 5]);
        assert_eq!(subsample(&plane, ChromaSubsampling::Yuv444).unwrap(), plane);
    }

    #[test]
    fn test_subsample_rejects_untileable_geometry() {
        let plane = Plane::new(24, 16, vec![0; 24 * 16]).unwrap();
        assert!(subsample(&plane, ChromaSubsampling::Yuv420).is_err());
        assert!(matches!(
            subsample(&plane, ChromaSubsampling::Yuv411),
            Err(CodecError::InvalidGeometry { width: 24, height: 16, .. })
        ));
        assert!(subsample(&plane, ChromaSubsampling::Yuv444).is_ok());
    }

    #[test]
    fn test_420_resample_preserves_dimensions() {
        let data: Vec<u8> = (0..32 * 48).map(|i| (i * 7 % 256) as u8).collect();
        let plane = Plane::new(32, 48, data).unwrap();
        let small = subsample(&plane, ChromaSubsampling::Yuv420).unwrap();
        assert_eq!((small.width(), small.height()), (16, 24));
        let restored = upsample(&small, 32, 48).unwrap();
        assert_eq!((restored.width(), restored.height()), (32, 48));
    }

    #[test]
    fn test_upsample_nearest_neighbour() {
        let plane = Plane::new(2, 1, vec![10, 20]).unwrap();
        let wide = upsample(&plane, 5, 2).unwrap();
        // src x = floor(x * 2 / 5): 0, 0, 0, 1, 1
        assert_eq!(wide.data(), &[10, 10, 10, 20, 20, 10, 10, 10, 20, 20]);
    }
}

pub const BLOCK_SIZE: usize = 8;
pub const BLOCK_DIM: usize = BLOCK_SIZE * BLOCK_SIZE;

pub const MINIMUM_QUALITY: u32 = 1;
pub const MAXIMUM_QUALITY: u32 = 100;
pub const DEFAULT_QUALITY: u32 = 50;

// Level shift applied to 8-bit samples before the forward transform.
pub const LEVEL_SHIFT: i32 = 128;

// Run lengths are capped at 15; a (15, 0) pair skips 16 zero coefficients.
pub const MAXIMUM_RUN: u32 = 15;
pub const ZERO_RUN_SKIP: usize = 16;

// A coefficient byte equal to this value is followed by a big-endian i16 holding
// the exact value. Values in [-127, 127] are stored in the byte itself.
pub const COEFFICIENT_ESCAPE: i8 = i8::MIN;

// Bound on a reconstructed quantized DC value. The transform keeps |DC| <= 1024
// before quantization; anything past twice that is a damaged stream.
pub const MAXIMUM_DC: i32 = 2048;

// "YCC0"
pub const COLOR_META_MAGIC: u32 = 0x5943_4330;
pub const COLOR_META_VERSION: u32 = 1;
pub const COLOR_CHANNEL_COUNT: u32 = 3;

pub const META_FILE_EXTENSION: &str = "meta";
pub const CHANNEL_FILE_EXTENSION: &str = "huff";

pub const PEAK_SAMPLE_VALUE: f64 = 255.0;

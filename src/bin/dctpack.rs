//! dctpack CLI - block-transform image codec command-line utility.
//!
//! Encodes raw 8-bit grayscale or RGB pixels into dctpack containers, decodes them
//! back, and reports entropy statistics and reconstruction quality.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use dctpack_rs::codec::grayscale::ChannelContainer;
use dctpack_rs::codec::huffman::HuffmanTree;
use dctpack_rs::constants::{DEFAULT_QUALITY, META_FILE_EXTENSION};
use dctpack_rs::metrics::{compression_ratio, mse, psnr, zero_fraction};
use dctpack_rs::stream::write_atomic;
use dctpack_rs::{
    ChromaSubsampling, CodecError, ColorCodec, ColorMetadata, GrayscaleCodec, Plane, RgbImage, SymbolTable,
};

/// JPEG-like block-transform codec for grayscale and YCbCr color images
#[derive(Parser)]
#[command(name = "dctpack")]
#[command(version)]
#[command(about = "Compress raw images with an 8x8 DCT, zigzag RLE and Huffman pipeline", long_about = None)]
#[command(after_help = "EXAMPLES:
    dctpack encode -i gray.raw -o gray.dct -w 256 -H 256 -q 75
    dctpack encode -i photo.rgb -o out/photo -w 512 -H 512 -n 3 -s 420
    dctpack decode -i gray.dct -o gray.pgm -f ppm -q 75
    dctpack decode -i out/photo.meta -o photo.ppm -f ppm
    dctpack stats -i photo.rgb -w 512 -H 512 -n 3 -q 90
    dctpack histogram -i gray.dct

Color images are stored as <prefix>.meta plus <prefix>_Y.huff, <prefix>_Cb.huff
and <prefix>_Cr.huff next to it. Grayscale containers do not record their
quality, so decoding one needs the -q used at encode time; color sidecars carry
it. Set RUST_LOG=debug for pipeline details.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode raw pixels into a grayscale container or color sidecar set
    #[command(visible_alias = "e")]
    Encode {
        /// Raw 8-bit pixel file (row-major, RGB interleaved when -n 3)
        #[arg(short, long)]
        input: PathBuf,

        /// Output container (grayscale) or output prefix (color)
        #[arg(short, long)]
        output: PathBuf,

        /// Image width in pixels
        #[arg(short, long)]
        width: u32,

        /// Image height in pixels
        #[arg(short = 'H', long)]
        height: u32,

        /// Number of color components (1=grayscale, 3=RGB)
        #[arg(short = 'n', long, default_value = "1")]
        components: u32,

        /// Quality level (1-100)
        #[arg(short, long, default_value_t = DEFAULT_QUALITY)]
        quality: u32,

        /// Chroma subsampling for color input
        #[arg(short, long, default_value = "420", value_enum)]
        subsampling: Subsampling,
    },

    /// Decode a grayscale container or a color `.meta` sidecar
    #[command(visible_alias = "d")]
    Decode {
        /// Container file, or the `.meta` file of a color image
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path for decoded pixels
        #[arg(short, long)]
        output: PathBuf,

        /// Output format: raw (binary pixels) or ppm (PGM/PPM)
        #[arg(short, long, default_value = "raw", value_enum)]
        format: OutputFormat,

        /// Quality the grayscale container was encoded with (required for
        /// grayscale, ignored for `.meta` input)
        #[arg(short, long)]
        quality: Option<u32>,

        /// Grayscale width; inferred from the block count when omitted
        #[arg(short, long, requires = "height")]
        width: Option<u32>,

        /// Grayscale height; inferred from the block count when omitted
        #[arg(short = 'H', long, requires = "width")]
        height: Option<u32>,
    },

    /// Show container or sidecar layout
    #[command(visible_alias = "i")]
    Info {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print coefficient-stream symbol frequencies, most frequent first
    Histogram {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the Huffman code assigned to each symbol
    Codes {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run a full encode/decode cycle and report MSE, PSNR and compression ratio
    Stats {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        width: u32,

        #[arg(short = 'H', long)]
        height: u32,

        #[arg(short = 'n', long, default_value = "1")]
        components: u32,

        #[arg(short, long, default_value_t = DEFAULT_QUALITY)]
        quality: u32,

        #[arg(short, long, default_value = "420", value_enum)]
        subsampling: Subsampling,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Raw binary pixel data
    Raw,
    /// Portable GrayMap/PixMap (PGM/PPM) format
    Ppm,
}

#[derive(Clone, Copy, ValueEnum)]
enum Subsampling {
    #[value(name = "444")]
    Yuv444,
    #[value(name = "422")]
    Yuv422,
    #[value(name = "420")]
    Yuv420,
    #[value(name = "411")]
    Yuv411,
}

impl From<Subsampling> for ChromaSubsampling {
    fn from(value: Subsampling) -> Self {
        match value {
            Subsampling::Yuv444 => ChromaSubsampling::Yuv444,
            Subsampling::Yuv422 => ChromaSubsampling::Yuv422,
            Subsampling::Yuv420 => ChromaSubsampling::Yuv420,
            Subsampling::Yuv411 => ChromaSubsampling::Yuv411,
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            width,
            height,
            components,
            quality,
            subsampling,
        } => encode_image(&input, &output, width, height, components, quality, subsampling.into()),
        Commands::Decode {
            input,
            output,
            format,
            quality,
            width,
            height,
        } => decode_image(&input, &output, &format, quality, width.zip(height)),
        Commands::Info { input } => show_info(&input),
        Commands::Histogram { input } => show_histogram(&input),
        Commands::Codes { input } => show_codes(&input),
        Commands::Stats {
            input,
            width,
            height,
            components,
            quality,
            subsampling,
        } => show_stats(&input, width, height, components, quality, subsampling.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if e.downcast_ref::<CodecError>().is_some_and(CodecError::is_stream_error) {
            eprintln!("The input is damaged or is not a dctpack file.");
        }
        std::process::exit(1);
    }
}

fn is_color_sidecar(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == META_FILE_EXTENSION)
}

/// Splits `out/photo` into (`out`, `photo`).
fn split_prefix(prefix: &Path) -> Result<(PathBuf, String), Box<dyn std::error::Error>> {
    let name = prefix
        .file_name()
        .ok_or("output prefix must end in a file name")?
        .to_string_lossy()
        .into_owned();
    let directory = prefix.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((directory, name))
}

fn encode_image(
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    components: u32,
    quality: u32,
    subsampling: ChromaSubsampling,
) -> CliResult {
    let pixels = fs::read(input)?;

    match components {
        1 => {
            let plane = Plane::new(width, height, pixels)?;
            let encoded = GrayscaleCodec::new(quality)?.encode(&plane)?;
            write_atomic(output, &encoded.bytes)?;
            println!(
                "✓ Encoded {}x{} grayscale image to {:?} ({} bytes, {} symbols)",
                width,
                height,
                output,
                encoded.bytes.len(),
                encoded.table.len()
            );
        }
        3 => {
            let image = RgbImage::new(width, height, pixels)?;
            let (directory, name) = split_prefix(output)?;
            let encoded = ColorCodec::new(quality, subsampling)?.encode(&image, &name)?;
            let meta_path = encoded.write_files(&directory)?;
            println!(
                "✓ Encoded {}x{} color image ({}) to {:?} ({} channel bytes)",
                width,
                height,
                subsampling.notation(),
                meta_path,
                encoded.payload_len()
            );
        }
        other => return Err(format!("unsupported component count {}", other).into()),
    }
    Ok(())
}

fn grayscale_quality(quality: Option<u32>) -> Result<u32, String> {
    quality.ok_or_else(|| "grayscale containers do not record their quality; pass --quality".to_string())
}

fn decode_image(
    input: &Path,
    output: &Path,
    format: &OutputFormat,
    quality: Option<u32>,
    shape: Option<(u32, u32)>,
) -> CliResult {
    let (pixels, width, height, components) = if is_color_sidecar(input) {
        let image = ColorCodec::decode(&ColorCodec::read_files(input)?)?;
        (image.data().to_vec(), image.width(), image.height(), 3)
    } else {
        let data = fs::read(input)?;
        let codec = GrayscaleCodec::new(grayscale_quality(quality)?)?;
        let plane = match shape {
            Some((width, height)) => codec.decode_with_shape(&data, width, height)?,
            None => codec.decode(&data)?,
        };
        let (width, height) = (plane.width(), plane.height());
        (plane.into_data(), width, height, 1)
    };

    match format {
        OutputFormat::Raw => write_atomic(output, &pixels)?,
        OutputFormat::Ppm => write_ppm(output, &pixels, width, height, components)?,
    }

    println!(
        "✓ Decoded {}x{} image ({} components) to {:?}",
        width, height, components, output
    );
    Ok(())
}

/// Symbol tables of a container (one) or a color sidecar (three), with labels.
fn load_tables(input: &Path) -> Result<Vec<(String, SymbolTable)>, Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    if is_color_sidecar(input) {
        let metadata = ColorMetadata::from_bytes(&data)?;
        Ok(metadata
            .channels
            .iter()
            .map(|channel| (channel.id.name().to_string(), channel.table.clone()))
            .collect())
    } else {
        let container = ChannelContainer::parse(&data)?;
        Ok(vec![("plane".to_string(), container.table)])
    }
}

fn show_info(input: &Path) -> CliResult {
    let data = fs::read(input)?;
    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();

    if is_color_sidecar(input) {
        let metadata = ColorMetadata::from_bytes(&data)?;
        println!("Format: dctpack color sidecar");
        println!("Dimensions: {}x{}", metadata.width, metadata.height);
        println!("Quality: {}", metadata.quality);
        println!("Subsampling: {}", metadata.subsampling.notation());
        for channel in &metadata.channels {
            println!(
                "  {:<2} {:>5}x{:<5} {:<24} {} symbols",
                channel.id.name(),
                channel.width,
                channel.height,
                channel.identifier,
                channel.table.len()
            );
        }
    } else {
        let container = ChannelContainer::parse(&data)?;
        println!("Format: dctpack grayscale container");
        println!("Symbols: {}", container.table.len());
        println!("Coefficient stream: {} bytes", container.table.total_frequency());
        println!(
            "Payload: {} bytes, {} bits",
            container.payload.len(),
            container.bit_count
        );
    }
    Ok(())
}

fn show_histogram(input: &Path) -> CliResult {
    for (label, table) in load_tables(input)? {
        let total = table.total_frequency().max(1) as f64;
        println!("[{}] {} symbols, {} occurrences", label, table.len(), table.total_frequency());
        for entry in table.sorted_by_frequency() {
            println!(
                "  {:>5} {:>10} {:>7.3}%",
                entry.symbol as i8,
                entry.frequency,
                entry.frequency as f64 * 100.0 / total
            );
        }
    }
    Ok(())
}

fn show_codes(input: &Path) -> CliResult {
    for (label, table) in load_tables(input)? {
        let codes = HuffmanTree::build(&table)?.code_table()?;
        println!("[{}] {} codes", label, codes.len());
        for (symbol, code) in codes.iter() {
            println!("  {:>5} {:>3} {}", symbol as i8, code.length, code);
        }
    }
    Ok(())
}

fn show_stats(
    input: &Path,
    width: u32,
    height: u32,
    components: u32,
    quality: u32,
    subsampling: ChromaSubsampling,
) -> CliResult {
    let pixels = fs::read(input)?;

    let (reconstructed, compressed_len) = match components {
        1 => {
            let plane = Plane::new(width, height, pixels.clone())?;
            let codec = GrayscaleCodec::new(quality)?;
            let blocks = codec.quantized_blocks(&plane)?;
            let zeros = blocks.iter().map(zero_fraction).sum::<f64>() / blocks.len() as f64;
            println!("Zero coefficients: {:.2}%", zeros * 100.0);

            let encoded = codec.encode(&plane)?;
            let decoded = codec.decode_with_table(&encoded.bytes, &encoded.table, width, height)?;
            (decoded.into_data(), encoded.bytes.len())
        }
        3 => {
            let image = RgbImage::new(width, height, pixels.clone())?;
            let encoded = ColorCodec::new(quality, subsampling)?.encode(&image, "stats")?;
            let meta_len = encoded.metadata.to_bytes()?.len();
            let decoded = ColorCodec::decode(&encoded)?;
            (decoded.into_data(), encoded.payload_len() + meta_len)
        }
        other => return Err(format!("unsupported component count {}", other).into()),
    };

    println!("Quality: {}", quality);
    println!("MSE: {:.4}", mse(&pixels, &reconstructed)?);
    println!("PSNR: {:.2} dB", psnr(&pixels, &reconstructed)?);
    println!(
        "Compression ratio: {:.2}:1 ({} -> {} bytes)",
        compression_ratio(pixels.len(), compressed_len),
        pixels.len(),
        compressed_len
    );
    Ok(())
}

fn write_ppm(path: &Path, pixels: &[u8], width: u32, height: u32, components: u32) -> CliResult {
    let magic = if components == 1 { "P5" } else { "P6" };
    let mut contents = format!("{}\n{} {}\n255\n", magic, width, height).into_bytes();
    contents.extend_from_slice(pixels);
    write_atomic(path, &contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grayscale_decode_requires_quality() {
        let cli = Cli::try_parse_from(["dctpack", "decode", "-i", "gray.dct", "-o", "gray.pgm"]).unwrap();
        let Commands::Decode { quality, .. } = cli.command else {
            panic!("expected the decode subcommand");
        };
        assert_eq!(quality, None);
        assert!(grayscale_quality(quality).is_err());

        let cli = Cli::try_parse_from(["dctpack", "d", "-i", "gray.dct", "-o", "gray.pgm", "-q", "75"]).unwrap();
        let Commands::Decode { quality, .. } = cli.command else {
            panic!("expected the decode subcommand");
        };
        assert_eq!(grayscale_quality(quality), Ok(75));
    }

    #[test]
    fn test_missing_quality_fails_before_reading_pixels() {
        let input = std::env::temp_dir().join(format!("dctpack_cli_{}.dct", std::process::id()));
        let output = input.with_extension("pgm");
        fs::write(&input, b"not a container").unwrap();
        let error = decode_image(&input, &output, &OutputFormat::Ppm, None, None).unwrap_err();
        assert!(error.to_string().contains("--quality"));
        assert!(!output.exists());
        fs::remove_file(&input).unwrap();
    }
}

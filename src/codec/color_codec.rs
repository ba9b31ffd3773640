//! Color images as three grayscale containers plus a metadata sidecar.
//!
//! Sidecar layout (big-endian): magic `"YCC0"`, version, width, height, quality,
//! subsampling mode, channel count, then per channel: id (u8), width, height,
//! identifier (u32 length + UTF-8) and the channel's symbol table.

use std::fs;
use std::path::{Path, PathBuf};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::color::{ChromaSubsampling, rgb_to_ycbcr, subsample, upsample, ycbcr_to_rgb};
use crate::codec::grayscale::GrayscaleCodec;
use crate::codec::huffman::SymbolTable;
use crate::codec::quantization::validate_quality;
use crate::constants::{
    CHANNEL_FILE_EXTENSION, COLOR_CHANNEL_COUNT, COLOR_META_MAGIC, COLOR_META_VERSION, META_FILE_EXTENSION,
};
use crate::error::{CodecError, Result};
use crate::stream::{StreamReader, StreamWriter, write_atomic};
use crate::{Plane, RgbImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ChannelId {
    Y = 0,
    Cb = 1,
    Cr = 2,
}

impl ChannelId {
    pub const ALL: [ChannelId; 3] = [ChannelId::Y, ChannelId::Cb, ChannelId::Cr];

    pub fn from_u8(value: u8) -> Result<Self> {
        Self::try_from(value).map_err(|e| CodecError::InvalidChannelId(e.number))
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Y => "Y",
            ChannelId::Cb => "Cb",
            ChannelId::Cr => "Cr",
        }
    }

    /// `<base>_<channel>.huff`
    pub fn identifier(self, base_name: &str) -> String {
        format!("{}_{}.{}", base_name, self.name(), CHANNEL_FILE_EXTENSION)
    }

    fn index(self) -> usize {
        u8::from(self) as usize
    }
}

/// Identifiers become file names next to the sidecar, so they may not carry a path.
fn validate_identifier(identifier: &str) -> Result<()> {
    let plain = !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && !identifier.contains(['/', '\\']);
    if plain {
        Ok(())
    } else {
        Err(CodecError::InvalidIdentifier(identifier.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMetadata {
    pub id: ChannelId,
    pub width: u32,
    pub height: u32,
    pub identifier: String,
    pub table: SymbolTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorMetadata {
    pub width: u32,
    pub height: u32,
    pub quality: u32,
    pub subsampling: ChromaSubsampling,
    /// Indexed by channel id.
    pub channels: [ChannelMetadata; 3],
}

impl ColorMetadata {
    pub fn channel(&self, id: ChannelId) -> &ChannelMetadata {
        &self.channels[id.index()]
    }

    /// Checks everything a decoder relies on: quality, geometry, channel order and
    /// that each channel's dimensions follow from the subsampling mode.
    pub fn validate(&self) -> Result<()> {
        validate_quality(self.quality)?;
        self.subsampling.check_geometry(self.width, self.height)?;
        let (chroma_width, chroma_height) = self.subsampling.chroma_dimensions(self.width, self.height);

        for (index, channel) in self.channels.iter().enumerate() {
            if channel.id.index() != index {
                return Err(CodecError::CorruptStream("channels out of order"));
            }
            let expected = match channel.id {
                ChannelId::Y => (self.width, self.height),
                ChannelId::Cb | ChannelId::Cr => (chroma_width, chroma_height),
            };
            if (channel.width, channel.height) != expected {
                return Err(CodecError::CorruptStream("channel dimensions do not match subsampling mode"));
            }
            validate_identifier(&channel.identifier)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = StreamWriter::new();
        writer.write_u32(COLOR_META_MAGIC);
        writer.write_u32(COLOR_META_VERSION);
        writer.write_u32(self.width);
        writer.write_u32(self.height);
        writer.write_u32(self.quality);
        writer.write_u32(self.subsampling.into());
        writer.write_u32(COLOR_CHANNEL_COUNT);
        for channel in &self.channels {
            writer.write_u8(channel.id.into());
            writer.write_u32(channel.width);
            writer.write_u32(channel.height);
            writer.write_string(&channel.identifier)?;
            channel.table.write_to(&mut writer);
        }
        Ok(writer.into_inner())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = StreamReader::new(bytes);
        let magic = reader.read_u32()?;
        let version = reader.read_u32()?;
        if magic != COLOR_META_MAGIC || version != COLOR_META_VERSION {
            return Err(CodecError::UnsupportedFormat { magic, version });
        }

        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        let quality = reader.read_u32()?;
        let subsampling = ChromaSubsampling::from_u32(reader.read_u32()?)?;
        if reader.read_u32()? != COLOR_CHANNEL_COUNT {
            return Err(CodecError::CorruptStream("color metadata must describe three channels"));
        }

        let mut slots: [Option<ChannelMetadata>; 3] = [None, None, None];
        for _ in 0..COLOR_CHANNEL_COUNT {
            let id = ChannelId::from_u8(reader.read_u8()?)?;
            let channel = ChannelMetadata {
                id,
                width: reader.read_u32()?,
                height: reader.read_u32()?,
                identifier: reader.read_string()?,
                table: SymbolTable::read_from(&mut reader)?,
            };
            let slot = &mut slots[id.index()];
            if slot.is_some() {
                return Err(CodecError::CorruptStream("duplicate channel id"));
            }
            *slot = Some(channel);
        }
        if !reader.is_at_end() {
            return Err(CodecError::CorruptStream("trailing bytes after color metadata"));
        }

        let [Some(y), Some(cb), Some(cr)] = slots else {
            return Err(CodecError::CorruptStream("missing channel"));
        };
        let metadata = Self {
            width,
            height,
            quality,
            subsampling,
            channels: [y, cb, cr],
        };
        metadata.validate()?;
        Ok(metadata)
    }
}

/// Output of [`ColorCodec::encode`]: the sidecar record and one container per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorEncoded {
    pub name: String,
    pub metadata: ColorMetadata,
    /// Channel containers indexed by channel id.
    pub channels: [Vec<u8>; 3],
}

impl ColorEncoded {
    pub fn meta_path(&self, directory: &Path) -> PathBuf {
        directory.join(format!("{}.{}", self.name, META_FILE_EXTENSION))
    }

    /// Total size of the three channel containers.
    pub fn payload_len(&self) -> usize {
        self.channels.iter().map(Vec::len).sum()
    }

    /// Writes `<name>_Y.huff`, `<name>_Cb.huff`, `<name>_Cr.huff` and finally
    /// `<name>.meta` into `directory`. Returns the sidecar path.
    ///
    /// Nothing is written unless the metadata validates and every file name is plain.
    pub fn write_files(&self, directory: &Path) -> Result<PathBuf> {
        validate_identifier(&self.name)?;
        self.metadata.validate()?;
        for (channel, bytes) in self.metadata.channels.iter().zip(&self.channels) {
            write_atomic(&directory.join(&channel.identifier), bytes)?;
        }
        let meta_path = self.meta_path(directory);
        write_atomic(&meta_path, &self.metadata.to_bytes()?)?;
        Ok(meta_path)
    }
}

/// Drives one grayscale codec per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCodec {
    channels: [GrayscaleCodec; 3],
    subsampling: ChromaSubsampling,
}

impl ColorCodec {
    pub fn new(quality: u32, subsampling: ChromaSubsampling) -> Result<Self> {
        let codec = GrayscaleCodec::new(quality)?;
        Ok(Self {
            channels: [codec; 3],
            subsampling,
        })
    }

    pub fn quality(&self) -> u32 {
        self.channels[0].quality()
    }

    pub fn subsampling(&self) -> ChromaSubsampling {
        self.subsampling
    }

    /// Encodes `image`; `name` becomes the sidecar stem and channel file prefix.
    pub fn encode(&self, image: &RgbImage, name: &str) -> Result<ColorEncoded> {
        validate_identifier(name)?;
        let (width, height) = (image.width(), image.height());
        self.subsampling.check_geometry(width, height)?;

        let [y, cb, cr] = rgb_to_ycbcr(image)?;
        let cb = subsample(&cb, self.subsampling)?;
        let cr = subsample(&cr, self.subsampling)?;

        let (y_meta, y_bytes) = self.encode_channel(ChannelId::Y, &y, name)?;
        let (cb_meta, cb_bytes) = self.encode_channel(ChannelId::Cb, &cb, name)?;
        let (cr_meta, cr_bytes) = self.encode_channel(ChannelId::Cr, &cr, name)?;

        log::debug!(
            "encoded {}x{} color image ({}, quality {}): Y {} B, Cb {} B, Cr {} B",
            width,
            height,
            self.subsampling.notation(),
            self.quality(),
            y_bytes.len(),
            cb_bytes.len(),
            cr_bytes.len()
        );

        Ok(ColorEncoded {
            name: name.to_string(),
            metadata: ColorMetadata {
                width,
                height,
                quality: self.quality(),
                subsampling: self.subsampling,
                channels: [y_meta, cb_meta, cr_meta],
            },
            channels: [y_bytes, cb_bytes, cr_bytes],
        })
    }

    fn encode_channel(&self, id: ChannelId, plane: &Plane, name: &str) -> Result<(ChannelMetadata, Vec<u8>)> {
        let encoded = self.channels[id.index()].encode(plane)?;
        let metadata = ChannelMetadata {
            id,
            width: plane.width(),
            height: plane.height(),
            identifier: id.identifier(name),
            table: encoded.table,
        };
        Ok((metadata, encoded.bytes))
    }

    /// Decodes using the quality and subsampling recorded in the metadata.
    pub fn decode(encoded: &ColorEncoded) -> Result<RgbImage> {
        let metadata = &encoded.metadata;
        metadata.validate()?;
        let codec = Self::new(metadata.quality, metadata.subsampling)?;

        let mut planes = Vec::with_capacity(COLOR_CHANNEL_COUNT as usize);
        for (channel, bytes) in metadata.channels.iter().zip(&encoded.channels) {
            let plane = codec.channels[channel.id.index()].decode_with_table(
                bytes,
                &channel.table,
                channel.width,
                channel.height,
            )?;
            let plane = upsample(&plane, metadata.width, metadata.height)?;
            log::trace!("decoded channel {} ({}x{})", channel.id.name(), channel.width, channel.height);
            planes.push(plane);
        }
        let [y, cb, cr] = planes.as_slice() else {
            return Err(CodecError::CorruptStream("missing channel"));
        };
        ycbcr_to_rgb(y, cb, cr)
    }

    /// Loads a sidecar and the channel files it names (resolved next to it).
    pub fn read_files(meta_path: &Path) -> Result<ColorEncoded> {
        let metadata = ColorMetadata::from_bytes(&fs::read(meta_path)?)?;
        let directory = meta_path.parent().unwrap_or_else(|| Path::new(""));
        let name = meta_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let channels = [
            fs::read(directory.join(&metadata.channel(ChannelId::Y).identifier))?,
            fs::read(directory.join(&metadata.channel(ChannelId::Cb).identifier))?,
            fs::read(directory.join(&metadata.channel(ChannelId::Cr).identifier))?,
        ];
        Ok(ColorEncoded {
            name,
            metadata,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::psnr;

    fn gradient(width: u32, height: u32) -> RgbImage {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8]);
            }
        }
        RgbImage::new(width, height, data).unwrap()
    }

    #[test]
    fn test_channel_ids() {
        assert_eq!(ChannelId::from_u8(2).unwrap(), ChannelId::Cr);
        assert!(matches!(ChannelId::from_u8(3), Err(CodecError::InvalidChannelId(3))));
        assert_eq!(ChannelId::Cb.identifier("photo"), "photo_Cb.huff");
    }

    #[test]
    fn test_metadata_roundtrip_and_header() {
        let codec = ColorCodec::new(80, ChromaSubsampling::Yuv420).unwrap();
        let encoded = codec.encode(&gradient(32, 16), "img").unwrap();
        let bytes = encoded.metadata.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"YCC0");
        assert_eq!(&bytes[20..28], &[0, 0, 0, 2, 0, 0, 0, 3]);
        assert_eq!(ColorMetadata::from_bytes(&bytes).unwrap(), encoded.metadata);

        let cb = encoded.metadata.channel(ChannelId::Cb);
        assert_eq!((cb.width, cb.height), (16, 8));
        assert_eq!(cb.identifier, "img_Cb.huff");
    }

    #[test]
    fn test_metadata_rejects_bad_records() {
        let codec = ColorCodec::new(50, ChromaSubsampling::Yuv444).unwrap();
        let metadata = codec.encode(&gradient(16, 16), "img").unwrap().metadata;
        let bytes = metadata.to_bytes().unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            ColorMetadata::from_bytes(&bad_magic),
            Err(CodecError::UnsupportedFormat { .. })
        ));

        let mut two_channels = bytes.clone();
        two_channels[27] = 2;
        assert!(matches!(ColorMetadata::from_bytes(&two_channels), Err(CodecError::CorruptStream(_))));

        let mut bad_mode = bytes.clone();
        bad_mode[23] = 7;
        assert!(matches!(ColorMetadata::from_bytes(&bad_mode), Err(CodecError::InvalidSubsampling(7))));

        let mut duplicate = metadata.clone();
        duplicate.channels[1].id = ChannelId::Y;
        assert!(matches!(
            ColorMetadata::from_bytes(&duplicate.to_bytes().unwrap()),
            Err(CodecError::CorruptStream("duplicate channel id"))
        ));

        let mut wrong_size = metadata.clone();
        wrong_size.channels[2].width = 8;
        assert!(matches!(
            ColorMetadata::from_bytes(&wrong_size.to_bytes().unwrap()),
            Err(CodecError::CorruptStream(_))
        ));

        assert!(matches!(
            ColorMetadata::from_bytes(&bytes[..bytes.len() - 1]),
            Err(CodecError::NeedMoreData)
        ));
    }

    #[test]
    fn test_encode_rejects_bad_geometry_and_names() {
        let codec = ColorCodec::new(50, ChromaSubsampling::Yuv420).unwrap();
        assert!(matches!(
            codec.encode(&gradient(24, 16), "img"),
            Err(CodecError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            codec.encode(&gradient(16, 16), "../img"),
            Err(CodecError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_write_files_rejects_tampered_names() {
        let directory = std::env::temp_dir().join(format!("dctpack_names_{}", std::process::id()));
        std::fs::create_dir_all(&directory).unwrap();
        let codec = ColorCodec::new(50, ChromaSubsampling::Yuv444).unwrap();
        let encoded = codec.encode(&gradient(16, 16), "img").unwrap();

        let mut escaping = encoded.clone();
        escaping.metadata.channels[0].identifier = "../escape_Y.huff".to_string();
        assert!(matches!(
            escaping.write_files(&directory),
            Err(CodecError::InvalidIdentifier(name)) if name == "../escape_Y.huff"
        ));

        let mut renamed = encoded.clone();
        renamed.name = "../img".to_string();
        assert!(matches!(renamed.write_files(&directory), Err(CodecError::InvalidIdentifier(_))));

        assert!(!directory.join("../escape_Y.huff").exists());
        assert_eq!(std::fs::read_dir(&directory).unwrap().count(), 0);
        std::fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn test_color_roundtrip_in_memory() {
        let image = gradient(32, 32);
        for mode in [
            ChromaSubsampling::Yuv444,
            ChromaSubsampling::Yuv422,
            ChromaSubsampling::Yuv420,
            ChromaSubsampling::Yuv411,
        ] {
            let codec = ColorCodec::new(90, mode).unwrap();
            let decoded = ColorCodec::decode(&codec.encode(&image, "g").unwrap()).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (32, 32));
            let quality = psnr(image.data(), decoded.data()).unwrap();
            assert!(quality > 30.0, "{:?}: PSNR {}", mode, quality);
        }
    }
}

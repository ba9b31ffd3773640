use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Error, Debug)]
pub enum CodecError {
    // Geometry and argument errors, refused before any output is produced
    #[error("Invalid geometry {width}x{height}: {reason}")]
    InvalidGeometry {
        width: u32,
        height: u32,
        reason: &'static str,
    },
    #[error("Expected {expected} bytes of pixel data, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },
    #[error("Quality {0} out of range [1, 100]")]
    InvalidQuality(u32),
    #[error("Invalid chroma subsampling mode {0}")]
    InvalidSubsampling(u32),
    #[error("Invalid channel ID {0}")]
    InvalidChannelId(u8),
    #[error("Invalid output identifier {0:?}: must be a plain file name")]
    InvalidIdentifier(String),

    // Stream errors
    #[error("Need more data")]
    NeedMoreData,
    #[error("Corrupt stream: {0}")]
    CorruptStream(&'static str),
    #[error("Unsupported color metadata (magic {magic:#010x}, version {version})")]
    UnsupportedFormat { magic: u32, version: u32 },
    #[error("Missing Huffman symbol table")]
    MissingSymbolTable,
    #[error("Symbol table does not match the channel payload")]
    SymbolTableMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// True for errors caused by a damaged or truncated byte stream.
    pub fn is_stream_error(&self) -> bool {
        matches!(
            self,
            Self::NeedMoreData
                | Self::CorruptStream(_)
                | Self::UnsupportedFormat { .. }
                | Self::SymbolTableMismatch
        )
    }
}

use canopy_types::TimeSeriesDataType;
use thiserror::Error;

/// Errors from encoding or decoding persisted bytes.
///
/// Every decode error means stored bytes do not match what this crate
/// writes. Callers treat them as corruption, never as a business error.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of input at position {position}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        position: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("unsupported storage format version {found} (supported: {supported})")]
    UnsupportedFormatVersion { found: u8, supported: u8 },

    #[error("unknown chunk tag {0:#04x}")]
    UnknownChunkTag(u8),

    #[error("chunk payload type mismatch: expected {expected}, found {found}")]
    ChunkTypeMismatch {
        expected: TimeSeriesDataType,
        found: TimeSeriesDataType,
    },

    #[error("invalid UTF-8 string: {0}")]
    InvalidUtf8(String),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("length {len} does not fit a u32 length prefix")]
    LengthOverflow { len: usize },

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

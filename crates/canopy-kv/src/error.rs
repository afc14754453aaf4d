/// Errors from the storage engine.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// I/O error from the journal file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A journal frame could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A complete journal frame failed its checksum.
    #[error("journal CRC mismatch at offset {offset}: expected {expected:#010x}, computed {actual:#010x}")]
    CrcMismatch {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// The journal does not start with a valid header.
    #[error("invalid journal header: {reason}")]
    InvalidHeader { reason: String },

    /// The journal was written by an unsupported format version.
    #[error("unsupported journal version {0}")]
    UnsupportedVersion(u32),

    /// A failed journal append could not be rolled back; nothing more is
    /// written until the journal is compacted or reopened.
    #[error("journal is unusable after a failed append")]
    Poisoned,

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

/// Result alias for engine operations.
pub type KvResult<T> = Result<T, KvError>;

use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid node id '{input}': {reason}")]
    InvalidNodeId { input: String, reason: String },

    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("invalid time series index: {0}")]
    InvalidIndex(String),
}

use canopy_codec::CodecError;
use canopy_kv::KvError;
use canopy_types::{NodeId, TypeError};

/// Errors from node storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The node id does not resolve to a stored node.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// No time series of that name is registered at the node.
    #[error("time series '{name}' not found at node {node}")]
    TimeSeriesNotFound { node: NodeId, name: String },

    /// The parent already has a child of that name.
    #[error("node {parent} already has a child named '{name}'")]
    ChildAlreadyExists { parent: NodeId, name: String },

    /// A time series of that name is already registered at the node.
    #[error("time series '{name}' already exists at node {node}")]
    TimeSeriesAlreadyExists { node: NodeId, name: String },

    /// The request itself is invalid (bad id, cycle, type mismatch).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Stored state violates an invariant of the store.
    #[error("storage corruption: {0}")]
    Corruption(String),

    /// Stored bytes could not be decoded.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// Error from the storage engine.
    #[error("storage engine error: {0}")]
    Kv(#[from] KvError),
}

/// An oversized name or list is the caller's input, not stored state.
impl From<CodecError> for StorageError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::LengthOverflow { .. } => Self::InvalidArgument(e.to_string()),
            other => Self::Codec(other),
        }
    }
}

impl From<TypeError> for StorageError {
    fn from(e: TypeError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound(_) | Self::TimeSeriesNotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::ChildAlreadyExists { .. } | Self::TimeSeriesAlreadyExists { .. }
        )
    }

    /// Fatal: the persisted state cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_) | Self::Codec(_))
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let id = NodeId::generate();
        assert!(StorageError::NodeNotFound(id).is_not_found());
        assert!(StorageError::ChildAlreadyExists {
            parent: id,
            name: "x".into()
        }
        .is_already_exists());
        assert!(StorageError::Corruption("gap".into()).is_corruption());
        assert!(StorageError::from(CodecError::TrailingBytes(1)).is_corruption());
        assert!(!StorageError::InvalidArgument("x".into()).is_corruption());
    }

    #[test]
    fn type_errors_are_invalid_arguments() {
        let err: StorageError = NodeId::parse("nope").unwrap_err().into();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
    }

    #[test]
    fn messages_carry_context() {
        let id = NodeId::generate();
        let err = StorageError::TimeSeriesNotFound {
            node: id,
            name: "flow".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("flow"));
        assert!(msg.contains(&id.to_string()));
    }

    #[test]
    fn oversized_input_is_invalid_argument() {
        let err = StorageError::from(CodecError::LengthOverflow { len: usize::MAX });
        assert!(matches!(err, StorageError::InvalidArgument(_)));
        assert!(!err.is_corruption());
        assert!(StorageError::from(CodecError::TrailingBytes(1)).is_corruption());
    }
}

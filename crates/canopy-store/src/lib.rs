//! Canopy node storage.
//!
//! [`NodeStorage`] persists a hierarchy of named nodes together with their
//! binary attachments, a named dependency graph between nodes, and
//! versioned time series stored as append-only chunks. All state lives in
//! the named maps of a [`canopy_kv::KvStore`]; `flush` commits it.
//!
//! ```no_run
//! use canopy_store::{NodeStorage, StorageConfig};
//! use canopy_types::NodeGenericMetadata;
//!
//! # fn main() -> Result<(), canopy_store::StorageError> {
//! let storage = NodeStorage::open(&StorageConfig::file("canopy.journal"))?;
//! let root = storage.create_root_node_if_not_exists("root", "Root")?;
//! let folder = storage.create_node(
//!     Some(root.id),
//!     "folder",
//!     "Folder",
//!     "",
//!     0,
//!     NodeGenericMetadata::new(),
//! )?;
//! storage.add_dependency(root.id, "contains", folder.id)?;
//! storage.close()?;
//! # Ok(())
//! # }
//! ```

mod attachments;
mod dependencies;
pub mod error;
mod maps;
mod nodes;
mod storage;
mod timeseries;

pub use attachments::BinaryDataWriter;
pub use canopy_codec::ChunkPayload;
pub use canopy_kv::{HeapImage, StorageConfig, StorageMode, SyncMode};
pub use error::{StorageError, StorageResult};
pub use storage::NodeStorage;

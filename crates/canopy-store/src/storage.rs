use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use canopy_kv::{HeapImage, JournalKv, KvStore, MemoryKv, StorageConfig};
use canopy_types::{NodeId, NodeInfo};
use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::maps::NODE_INFO;

/// The node storage façade.
///
/// Every operation that touches more than one map holds the store-wide
/// guard: the write side for mutations, the read side for reads, so no
/// caller observes a half-applied operation.
pub struct NodeStorage {
    kv: Box<dyn KvStore>,
    guard: RwLock<()>,
}

impl NodeStorage {
    /// Open a store as described by `config`.
    pub fn open(config: &StorageConfig) -> StorageResult<Self> {
        let kv = config.open()?;
        info!(mode = ?config.mode, mmap = config.mmap_enabled(), "node storage opened");
        Ok(Self::with_store(kv))
    }

    /// A fresh, non-durable store.
    pub fn in_memory() -> Self {
        Self::with_store(Box::new(MemoryKv::new()))
    }

    /// Open (or reopen) a store journaled into `image`.
    pub fn open_heap(image: HeapImage, config: &StorageConfig) -> StorageResult<Self> {
        let kv = JournalKv::open_heap(image, config)?;
        info!("node storage opened on heap image");
        Ok(Self::with_store(Box::new(kv)))
    }

    /// Use a caller-provided engine.
    pub fn with_store(kv: Box<dyn KvStore>) -> Self {
        Self {
            kv,
            guard: RwLock::new(()),
        }
    }

    /// Commit every write made so far.
    pub fn flush(&self) -> StorageResult<()> {
        let _guard = self.write_guard();
        self.kv.commit()?;
        Ok(())
    }

    /// Flush and release the engine. Later operations fail.
    pub fn close(&self) -> StorageResult<()> {
        let _guard = self.write_guard();
        self.kv.close()?;
        info!("node storage closed");
        Ok(())
    }

    pub(crate) fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    pub(crate) fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.guard.read().expect("lock poisoned")
    }

    pub(crate) fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.guard.write().expect("lock poisoned")
    }

    /// The node record, or `NodeNotFound`.
    pub(crate) fn load_node(&self, id: &NodeId) -> StorageResult<NodeInfo> {
        NODE_INFO
            .get(self.kv(), id)?
            .ok_or(StorageError::NodeNotFound(*id))
    }

    pub(crate) fn ensure_node(&self, id: &NodeId) -> StorageResult<()> {
        if NODE_INFO.contains(self.kv(), id)? {
            Ok(())
        } else {
            Err(StorageError::NodeNotFound(*id))
        }
    }

    /// Resolve ids of related nodes. A dangling id is corruption.
    pub(crate) fn load_related<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a NodeId>,
        relation: &str,
    ) -> StorageResult<Vec<NodeInfo>> {
        ids.into_iter()
            .map(|id| {
                NODE_INFO.get(self.kv(), id)?.ok_or_else(|| {
                    StorageError::Corruption(format!("{relation} entry {id} has no node record"))
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for NodeStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStorage").finish_non_exhaustive()
    }
}

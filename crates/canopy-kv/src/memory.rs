use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{KvError, KvResult};
use crate::tables::Tables;
use crate::traits::KvStore;

/// In-memory, non-durable store.
///
/// Intended for tests and scratch use. `commit` only checks that the store
/// is still open.
pub struct MemoryKv {
    tables: RwLock<Tables>,
    closed: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of entries across all maps.
    pub fn len(&self) -> usize {
        self.tables.read().expect("lock poisoned").entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> KvResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(KvError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, map: &str, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.tables.read().expect("lock poisoned").get(map, key))
    }

    fn put(&self, map: &str, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.ensure_open()?;
        self.tables.write().expect("lock poisoned").put(map, key, value);
        Ok(())
    }

    fn remove(&self, map: &str, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.tables.write().expect("lock poisoned").remove(map, key))
    }

    fn scan_prefix(&self, map: &str, prefix: &[u8]) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.ensure_open()?;
        Ok(self.tables.read().expect("lock poisoned").scan_prefix(map, prefix))
    }

    fn commit(&self) -> KvResult<()> {
        self.ensure_open()
    }

    fn close(&self) -> KvResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKv")
            .field("entries", &self.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

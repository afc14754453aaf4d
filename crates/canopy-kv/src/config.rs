use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::KvResult;
use crate::journal::{HeapImage, JournalKv};
use crate::memory::MemoryKv;
use crate::traits::KvStore;

/// Where a store keeps its data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageMode {
    /// Nothing outlives the store.
    Memory,
    /// Journal in an in-process heap image. Opening the same config again
    /// reopens the same image; the image itself is never serialized.
    Heap {
        #[serde(skip)]
        image: HeapImage,
    },
    /// Journal file at `path`.
    File { path: PathBuf },
}

/// When journal commits reach stable storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// `fsync` after every commit.
    EveryCommit,
    /// Flush to the OS and let it decide.
    OsDefault,
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::OsDefault
    }
}

/// Storage engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub mode: StorageMode,
    /// Replay file journals through a memory map where supported.
    pub mmap: bool,
    pub sync_mode: SyncMode,
    /// Rewrite the journal as a single snapshot frame on close.
    pub compact_on_close: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Memory,
            mmap: false,
            sync_mode: SyncMode::default(),
            compact_on_close: false,
        }
    }
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    /// Heap mode over a fresh image.
    pub fn heap() -> Self {
        Self::heap_on(HeapImage::new())
    }

    /// Heap mode over an existing image.
    pub fn heap_on(image: HeapImage) -> Self {
        Self {
            mode: StorageMode::Heap { image },
            ..Self::default()
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: StorageMode::File { path: path.into() },
            ..Self::default()
        }
    }

    pub fn with_mmap(mut self, mmap: bool) -> Self {
        self.mmap = mmap;
        self
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_compact_on_close(mut self, compact: bool) -> Self {
        self.compact_on_close = compact;
        self
    }

    /// Whether replay will actually use a memory map.
    pub fn mmap_enabled(&self) -> bool {
        self.mmap && mmap_supported()
    }

    /// Open a store for this configuration.
    pub fn open(&self) -> KvResult<Box<dyn KvStore>> {
        Ok(match &self.mode {
            StorageMode::Memory => Box::new(MemoryKv::new()),
            StorageMode::Heap { image } => Box::new(JournalKv::open_heap(image.clone(), self)?),
            StorageMode::File { path } => Box::new(JournalKv::open_file(path, self)?),
        })
    }
}

/// Memory-mapped replay is disabled on Windows, where mapped files cannot
/// be truncated while the map is alive.
pub fn mmap_supported() -> bool {
    !cfg!(windows)
}

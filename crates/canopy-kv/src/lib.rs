//! Embedded storage engine for Canopy.
//!
//! Canopy persists everything through named, ordered byte maps with an
//! explicit commit ([`KvStore`]). This crate provides two engines:
//!
//! - [`MemoryKv`] — Non-durable maps, for tests and scratch stores
//! - [`JournalKv`] — Maps rebuilt from an append-only journal of committed
//!   batches, kept either in a [`HeapImage`] or in a file
//!
//! [`StorageConfig`] selects the engine and its durability settings.

pub mod config;
pub mod error;
pub mod journal;
pub mod memory;
mod tables;
pub mod traits;

pub use config::{mmap_supported, StorageConfig, StorageMode, SyncMode};
pub use error::{KvError, KvResult};
pub use journal::{HeapImage, JournalKv, JOURNAL_VERSION};
pub use memory::MemoryKv;
pub use tables::JournalOp;
pub use traits::KvStore;

//! Typed views over the engine's named byte maps.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use canopy_codec::{
    AnyChunk, IdList, KeyCodec, NamedLink, Record, RootSlot, TimeSeriesChunkKey, TimeSeriesKey,
    UnorderedNodePair,
};
use canopy_kv::KvStore;
use canopy_types::{NodeId, NodeInfo, TimeSeriesMetadata};

use crate::error::StorageResult;

/// A named engine map with typed keys and values.
pub(crate) struct Map<K, V> {
    name: &'static str,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K: KeyCodec, V: Record> Map<K, V> {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            _types: PhantomData,
        }
    }

    pub(crate) fn get(&self, kv: &dyn KvStore, key: &K) -> StorageResult<Option<V>> {
        match kv.get(self.name, &key.encode_key()?)? {
            Some(bytes) => Ok(Some(V::decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn put(&self, kv: &dyn KvStore, key: &K, value: &V) -> StorageResult<()> {
        kv.put(self.name, &key.encode_key()?, &value.encode_record()?)?;
        Ok(())
    }

    /// Returns `true` if the key was present.
    pub(crate) fn remove(&self, kv: &dyn KvStore, key: &K) -> StorageResult<bool> {
        Ok(kv.remove(self.name, &key.encode_key()?)?.is_some())
    }

    pub(crate) fn contains(&self, kv: &dyn KvStore, key: &K) -> StorageResult<bool> {
        Ok(kv.contains(self.name, &key.encode_key()?)?)
    }

    /// Entries whose encoded key starts with `prefix`, in key order.
    pub(crate) fn scan_prefix(&self, kv: &dyn KvStore, prefix: &[u8]) -> StorageResult<Vec<(K, V)>> {
        kv.scan_prefix(self.name, prefix)?
            .into_iter()
            .map(|(k, v)| -> StorageResult<(K, V)> {
                Ok((K::decode_key(&k)?, V::decode_record(&v)?))
            })
            .collect()
    }
}

impl<K: KeyCodec, V: Record + Default> Map<K, V> {
    /// The stored value, or the empty value when absent.
    pub(crate) fn get_or_default(&self, kv: &dyn KvStore, key: &K) -> StorageResult<V> {
        Ok(self.get(kv, key)?.unwrap_or_default())
    }

    /// Rewrite the value under `key` if it is present.
    pub(crate) fn update_existing(
        &self,
        kv: &dyn KvStore,
        key: &K,
        f: impl FnOnce(V) -> V,
    ) -> StorageResult<()> {
        if let Some(value) = self.get(kv, key)? {
            self.put(kv, key, &f(value))?;
        }
        Ok(())
    }
}

pub(crate) const ROOT: Map<RootSlot, NodeId> = Map::new("root");
pub(crate) const NODE_INFO: Map<NodeId, NodeInfo> = Map::new("node_info");
pub(crate) const CHILD_NODES: Map<NodeId, IdList> = Map::new("child_nodes");
pub(crate) const CHILD_BY_NAME: Map<NamedLink, NodeId> = Map::new("child_by_name");
pub(crate) const PARENT: Map<NodeId, NodeId> = Map::new("parent");

pub(crate) const DATA_NAMES: Map<NodeId, BTreeSet<String>> = Map::new("data_names");
pub(crate) const DATA: Map<NamedLink, Vec<u8>> = Map::new("data");

pub(crate) const FORWARD_DEPS: Map<NodeId, IdList> = Map::new("forward_deps");
pub(crate) const BACKWARD_DEPS: Map<NodeId, IdList> = Map::new("backward_deps");
pub(crate) const DEPENDENCY_NAMES: Map<UnorderedNodePair, String> = Map::new("dependency_names");

pub(crate) const SERIES_NAMES: Map<NodeId, BTreeSet<String>> = Map::new("series_names");
pub(crate) const SERIES_METADATA: Map<NamedLink, TimeSeriesMetadata> = Map::new("series_metadata");
pub(crate) const SERIES_LAST_CHUNK: Map<TimeSeriesKey, u32> = Map::new("series_last_chunk");
pub(crate) const SERIES_CHUNKS: Map<TimeSeriesChunkKey, AnyChunk> = Map::new("series_chunks");

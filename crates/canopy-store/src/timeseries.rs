//! Versioned, chunked time series.
//!
//! A series is registered once per node with its metadata. Data is stored
//! per (node, version, name) as chunks numbered from 0, plus a counter
//! holding the highest chunk number written.

use std::collections::BTreeSet;

use canopy_codec::{node_prefix, ChunkPayload, NamedLink, TimeSeriesKey};
use canopy_types::{
    DataChunk, DoubleDataChunk, NodeId, StringDataChunk, TimeSeries, TimeSeriesMetadata,
};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::maps::{SERIES_CHUNKS, SERIES_LAST_CHUNK, SERIES_METADATA, SERIES_NAMES};
use crate::storage::NodeStorage;

impl NodeStorage {
    /// Register a series at `node`.
    pub fn create_time_series(&self, node: NodeId, metadata: TimeSeriesMetadata) -> StorageResult<()> {
        let _guard = self.write_guard();
        self.ensure_node(&node)?;
        let kv = self.kv();
        let link = NamedLink::new(node, &metadata.name);
        if SERIES_METADATA.contains(kv, &link)? {
            return Err(StorageError::TimeSeriesAlreadyExists {
                node,
                name: metadata.name,
            });
        }
        SERIES_METADATA.put(kv, &link, &metadata)?;
        let mut names = SERIES_NAMES.get_or_default(kv, &node)?;
        names.insert(metadata.name.clone());
        SERIES_NAMES.put(kv, &node, &names)?;
        debug!(node = %node, name = %metadata.name, data_type = %metadata.data_type, "time series created");
        Ok(())
    }

    /// Names of the series registered at `node`, sorted.
    pub fn get_time_series_names(&self, node: NodeId) -> StorageResult<Vec<String>> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        Ok(SERIES_NAMES.get_or_default(self.kv(), &node)?.into_iter().collect())
    }

    pub fn time_series_exists(&self, node: NodeId, name: &str) -> StorageResult<bool> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        SERIES_METADATA.contains(self.kv(), &NamedLink::new(node, name))
    }

    /// Metadata of the named series. Unregistered names are skipped.
    pub fn get_time_series_metadata<S: AsRef<str>>(
        &self,
        node: NodeId,
        names: &[S],
    ) -> StorageResult<Vec<TimeSeriesMetadata>> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        let mut found = Vec::with_capacity(names.len());
        for name in names {
            if let Some(meta) = SERIES_METADATA.get(self.kv(), &NamedLink::new(node, name.as_ref()))? {
                found.push(meta);
            }
        }
        Ok(found)
    }

    /// Versions under which `name` has data at `node`.
    pub fn get_time_series_data_versions(&self, node: NodeId, name: &str) -> StorageResult<BTreeSet<u32>> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        Ok(SERIES_LAST_CHUNK
            .scan_prefix(self.kv(), &node_prefix(&node))?
            .into_iter()
            .filter(|(key, _)| key.name == name)
            .map(|(key, _)| key.version)
            .collect())
    }

    pub fn get_double_time_series<S: AsRef<str>>(
        &self,
        node: NodeId,
        names: &[S],
        version: u32,
    ) -> StorageResult<Vec<TimeSeries<f64>>> {
        self.get_time_series(node, names, version)
    }

    pub fn get_string_time_series<S: AsRef<str>>(
        &self,
        node: NodeId,
        names: &[S],
        version: u32,
    ) -> StorageResult<Vec<TimeSeries<String>>> {
        self.get_time_series(node, names, version)
    }

    /// Read `version` of each named series.
    ///
    /// A name with no data under `version` is omitted from the result.
    pub fn get_time_series<T: ChunkPayload, S: AsRef<str>>(
        &self,
        node: NodeId,
        names: &[S],
        version: u32,
    ) -> StorageResult<Vec<TimeSeries<T>>> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        let kv = self.kv();

        let mut series = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let metadata = self.typed_metadata::<T>(&node, name)?.ok_or_else(|| {
                StorageError::TimeSeriesNotFound {
                    node,
                    name: name.to_string(),
                }
            })?;
            let key = TimeSeriesKey::new(node, version, name);
            let Some(last) = SERIES_LAST_CHUNK.get(kv, &key)? else {
                continue;
            };

            let mut chunks = Vec::with_capacity(last as usize + 1);
            for number in 0..=last {
                let chunk_key = key.chunk(number);
                let stored = SERIES_CHUNKS
                    .get(kv, &chunk_key)?
                    .ok_or_else(|| StorageError::Corruption(format!("chunk {chunk_key} is missing")))?;
                let chunk = T::from_any(stored).map_err(|other| {
                    StorageError::Corruption(format!(
                        "chunk {chunk_key} holds {} values, series is {}",
                        other.data_type(),
                        T::DATA_TYPE
                    ))
                })?;
                chunks.push(chunk);
            }
            series.push(TimeSeries {
                metadata,
                version,
                chunks,
            });
        }
        Ok(series)
    }

    /// Metadata of `name`, checked against the payload type `T`.
    fn typed_metadata<T: ChunkPayload>(
        &self,
        node: &NodeId,
        name: &str,
    ) -> StorageResult<Option<TimeSeriesMetadata>> {
        let metadata = SERIES_METADATA.get(self.kv(), &NamedLink::new(*node, name))?;
        if let Some(meta) = &metadata {
            if meta.data_type != T::DATA_TYPE {
                return Err(StorageError::InvalidArgument(format!(
                    "time series '{name}' holds {} values, not {}",
                    meta.data_type,
                    T::DATA_TYPE
                )));
            }
        }
        Ok(metadata)
    }

    pub fn add_double_time_series_data(
        &self,
        node: NodeId,
        version: u32,
        name: &str,
        chunks: Vec<DoubleDataChunk>,
    ) -> StorageResult<()> {
        self.add_time_series_data(node, version, name, chunks)
    }

    pub fn add_string_time_series_data(
        &self,
        node: NodeId,
        version: u32,
        name: &str,
        chunks: Vec<StringDataChunk>,
    ) -> StorageResult<()> {
        self.add_time_series_data(node, version, name, chunks)
    }

    /// Append `chunks` to `version` of series `name`.
    ///
    /// Each chunk is stored before the counter moves past it, so an
    /// interrupted append never leaves a gap.
    pub fn add_time_series_data<T: ChunkPayload>(
        &self,
        node: NodeId,
        version: u32,
        name: &str,
        chunks: Vec<DataChunk<T>>,
    ) -> StorageResult<()> {
        let _guard = self.write_guard();
        self.ensure_node(&node)?;
        self.typed_metadata::<T>(&node, name)?;
        let kv = self.kv();

        let key = TimeSeriesKey::new(node, version, name);
        let mut next = match SERIES_LAST_CHUNK.get(kv, &key)? {
            Some(last) => last.checked_add(1),
            None => Some(0),
        };
        let appended = chunks.len();
        for chunk in chunks {
            let number = next.ok_or_else(|| {
                StorageError::InvalidArgument(format!("chunk numbers of {key} are exhausted"))
            })?;
            SERIES_CHUNKS.put(kv, &key.chunk(number), &T::into_any(chunk))?;
            SERIES_LAST_CHUNK.put(kv, &key, &number)?;
            next = number.checked_add(1);
        }
        debug!(series = %key, appended, "time series data appended");
        Ok(())
    }

    /// Unregister every series at `node`. Stored chunks are left in place.
    pub fn remove_all_time_series(&self, node: NodeId) -> StorageResult<()> {
        let _guard = self.write_guard();
        self.ensure_node(&node)?;
        let kv = self.kv();
        let names = SERIES_NAMES.get_or_default(kv, &node)?;
        for name in &names {
            SERIES_METADATA.remove(kv, &NamedLink::new(node, name.as_str()))?;
        }
        SERIES_NAMES.put(kv, &node, &BTreeSet::new())?;
        debug!(node = %node, removed = names.len(), "time series removed");
        Ok(())
    }
}

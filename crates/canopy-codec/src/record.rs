//! Value encodings of the persisted maps.
//!
//! Every record starts with the storage format version tag. Fixed layouts
//! are used for ids, id lists, counters, names and chunks; the structured
//! node and series records go through bincode after the tag.

use std::collections::BTreeSet;

use canopy_types::{NodeId, NodeInfo, TimeSeriesMetadata};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::chunk::AnyChunk;
use crate::error::{CodecError, CodecResult};
use crate::id_list::IdList;
use crate::primitive::{ByteReader, ByteWriter, FORMAT_VERSION};

/// A type usable as a map value.
pub trait Record: Sized {
    fn encode_record(&self) -> CodecResult<Vec<u8>>;
    fn decode_record(bytes: &[u8]) -> CodecResult<Self>;
}

fn encode_bincode<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let body = bincode::serialize(value).map_err(|e| CodecError::Serialization(e.to_string()))?;
    let mut w = ByteWriter::with_capacity(body.len() + 1);
    w.put_u8(FORMAT_VERSION);
    w.put_bytes(&body);
    Ok(w.into_bytes())
}

fn decode_bincode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let mut r = ByteReader::versioned(bytes)?;
    bincode::deserialize(r.get_rest()).map_err(|e| CodecError::Malformed(e.to_string()))
}

impl Record for NodeInfo {
    fn encode_record(&self) -> CodecResult<Vec<u8>> {
        encode_bincode(self)
    }

    fn decode_record(bytes: &[u8]) -> CodecResult<Self> {
        decode_bincode(bytes)
    }
}

impl Record for TimeSeriesMetadata {
    fn encode_record(&self) -> CodecResult<Vec<u8>> {
        encode_bincode(self)
    }

    fn decode_record(bytes: &[u8]) -> CodecResult<Self> {
        decode_bincode(bytes)
    }
}

impl Record for NodeId {
    fn encode_record(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::versioned();
        w.put_node_id(self);
        Ok(w.into_bytes())
    }

    fn decode_record(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::versioned(bytes)?;
        let id = r.get_node_id()?;
        r.finish()?;
        Ok(id)
    }
}

impl Record for IdList {
    fn encode_record(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(5 + 16 * self.len());
        w.put_u8(FORMAT_VERSION);
        w.put_len(self.len())?;
        for id in self {
            w.put_node_id(id);
        }
        Ok(w.into_bytes())
    }

    fn decode_record(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::versioned(bytes)?;
        let count = r.get_count(16)?;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(r.get_node_id()?);
        }
        r.finish()?;
        Ok(ids.into())
    }
}

/// Counters: series versions and last chunk numbers.
impl Record for u32 {
    fn encode_record(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::versioned();
        w.put_u32(*self);
        Ok(w.into_bytes())
    }

    fn decode_record(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::versioned(bytes)?;
        let value = r.get_u32()?;
        r.finish()?;
        Ok(value)
    }
}

/// Dependency names.
impl Record for String {
    fn encode_record(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::versioned();
        w.put_str(self)?;
        Ok(w.into_bytes())
    }

    fn decode_record(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::versioned(bytes)?;
        let value = r.get_string()?;
        r.finish()?;
        Ok(value)
    }
}

/// Attachment payloads: tag followed by the raw bytes.
impl Record for Vec<u8> {
    fn encode_record(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(self.len() + 1);
        w.put_u8(FORMAT_VERSION);
        w.put_bytes(self);
        Ok(w.into_bytes())
    }

    fn decode_record(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::versioned(bytes)?;
        Ok(r.get_rest().to_vec())
    }
}

/// Attachment and series name sets.
impl Record for BTreeSet<String> {
    fn encode_record(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::versioned();
        w.put_len(self.len())?;
        for name in self {
            w.put_str(name)?;
        }
        Ok(w.into_bytes())
    }

    fn decode_record(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::versioned(bytes)?;
        let count = r.get_count(4)?;
        let mut names = BTreeSet::new();
        for _ in 0..count {
            names.insert(r.get_string()?);
        }
        r.finish()?;
        Ok(names)
    }
}

impl Record for AnyChunk {
    fn encode_record(&self) -> CodecResult<Vec<u8>> {
        self.encode()
    }

    fn decode_record(bytes: &[u8]) -> CodecResult<Self> {
        Self::decode(bytes)
    }
}

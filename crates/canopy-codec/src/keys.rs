//! Compound keys of the persisted maps.
//!
//! Every key starts with the 16 bytes of the node it belongs to, so all keys
//! of one node are contiguous in an ordered map and can be found with a
//! prefix scan. Numeric fields are big-endian, so chunk keys of one series
//! sort by chunk number.

use std::fmt;

use canopy_types::NodeId;

use crate::error::{CodecError, CodecResult};
use crate::primitive::{ByteReader, ByteWriter};

/// A type usable as a map key.
pub trait KeyCodec: Sized {
    fn encode_key(&self) -> CodecResult<Vec<u8>>;
    fn decode_key(bytes: &[u8]) -> CodecResult<Self>;
}

/// Key prefix selecting every key owned by `node`.
pub fn node_prefix(node: &NodeId) -> Vec<u8> {
    node.as_bytes().to_vec()
}

impl KeyCodec for NodeId {
    fn encode_key(&self) -> CodecResult<Vec<u8>> {
        Ok(node_prefix(self))
    }

    fn decode_key(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::new(bytes);
        let id = r.get_node_id()?;
        r.finish()?;
        Ok(id)
    }
}

/// Key of the single-value root slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootSlot;

const ROOT_SLOT_KEY: &[u8] = b"root";

impl KeyCodec for RootSlot {
    fn encode_key(&self) -> CodecResult<Vec<u8>> {
        Ok(ROOT_SLOT_KEY.to_vec())
    }

    fn decode_key(bytes: &[u8]) -> CodecResult<Self> {
        if bytes == ROOT_SLOT_KEY {
            Ok(Self)
        } else {
            Err(CodecError::Malformed("not the root slot key".into()))
        }
    }
}

// ---------------------------------------------------------------------------
// NamedLink
// ---------------------------------------------------------------------------

/// A node id plus a name: child names, attachment names, series names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedLink {
    pub node: NodeId,
    pub name: String,
}

impl NamedLink {
    pub fn new(node: NodeId, name: impl Into<String>) -> Self {
        Self {
            node,
            name: name.into(),
        }
    }
}

impl KeyCodec for NamedLink {
    fn encode_key(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(20 + self.name.len());
        w.put_node_id(&self.node);
        w.put_str(&self.name)?;
        Ok(w.into_bytes())
    }

    fn decode_key(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::new(bytes);
        let node = r.get_node_id()?;
        let name = r.get_string()?;
        r.finish()?;
        Ok(Self { node, name })
    }
}

impl fmt::Display for NamedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.name)
    }
}

// ---------------------------------------------------------------------------
// TimeSeriesKey / TimeSeriesChunkKey
// ---------------------------------------------------------------------------

/// Identifies one version of one series at one node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSeriesKey {
    pub node: NodeId,
    pub version: u32,
    pub name: String,
}

impl TimeSeriesKey {
    pub fn new(node: NodeId, version: u32, name: impl Into<String>) -> Self {
        Self {
            node,
            version,
            name: name.into(),
        }
    }

    fn write(&self, w: &mut ByteWriter) -> CodecResult<()> {
        w.put_node_id(&self.node);
        w.put_u32(self.version);
        w.put_str(&self.name)
    }

    fn read(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            node: r.get_node_id()?,
            version: r.get_u32()?,
            name: r.get_string()?,
        })
    }

    /// Key of chunk number `chunk` of this series version.
    pub fn chunk(&self, chunk: u32) -> TimeSeriesChunkKey {
        TimeSeriesChunkKey {
            series: self.clone(),
            chunk,
        }
    }
}

impl KeyCodec for TimeSeriesKey {
    fn encode_key(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(24 + self.name.len());
        self.write(&mut w)?;
        Ok(w.into_bytes())
    }

    fn decode_key(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::new(bytes);
        let key = Self::read(&mut r)?;
        r.finish()?;
        Ok(key)
    }
}

impl fmt::Display for TimeSeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@v{}", self.node, self.name, self.version)
    }
}

/// Identifies one chunk of a series version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSeriesChunkKey {
    pub series: TimeSeriesKey,
    pub chunk: u32,
}

impl KeyCodec for TimeSeriesChunkKey {
    fn encode_key(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(28 + self.series.name.len());
        self.series.write(&mut w)?;
        w.put_u32(self.chunk);
        Ok(w.into_bytes())
    }

    fn decode_key(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::new(bytes);
        let series = TimeSeriesKey::read(&mut r)?;
        let chunk = r.get_u32()?;
        r.finish()?;
        Ok(Self { series, chunk })
    }
}

impl fmt::Display for TimeSeriesChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.series, self.chunk)
    }
}

// ---------------------------------------------------------------------------
// UnorderedNodePair
// ---------------------------------------------------------------------------

/// A symmetric pair of node ids: `{a, b} == {b, a}`.
///
/// Dependency names are keyed by the unordered pair, so the forward and the
/// backward traversal of an edge resolve the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnorderedNodePair {
    low: NodeId,
    high: NodeId,
}

impl UnorderedNodePair {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn first(&self) -> NodeId {
        self.low
    }

    pub fn second(&self) -> NodeId {
        self.high
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.low == *id || self.high == *id
    }

    /// The partner of `id`, if `id` is part of the pair.
    pub fn other(&self, id: &NodeId) -> Option<NodeId> {
        if self.low == *id {
            Some(self.high)
        } else if self.high == *id {
            Some(self.low)
        } else {
            None
        }
    }
}

impl KeyCodec for UnorderedNodePair {
    fn encode_key(&self) -> CodecResult<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(32);
        w.put_node_id(&self.low);
        w.put_node_id(&self.high);
        Ok(w.into_bytes())
    }

    fn decode_key(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::new(bytes);
        let a = r.get_node_id()?;
        let b = r.get_node_id()?;
        r.finish()?;
        Ok(Self::new(a, b))
    }
}

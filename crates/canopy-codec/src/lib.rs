//! Binary encodings for Canopy.
//!
//! Everything the store persists passes through this crate: map keys via
//! [`KeyCodec`], map values via [`Record`]. Values carry a leading format
//! version tag; keys do not, so they keep a stable sort order.
//!
//! # Modules
//!
//! - [`primitive`] — Big-endian reader/writer for fixed-width fields
//! - [`id_list`] — Copy-on-write list of node ids
//! - [`keys`] — Compound keys prefixed by the owning node
//! - [`chunk`] — Time-series chunk layout and payload tags
//! - [`record`] — Value encodings for every persisted map

pub mod chunk;
pub mod error;
pub mod id_list;
pub mod keys;
pub mod primitive;
pub mod record;

pub use chunk::{decode_chunk, encode_chunk, AnyChunk, ChunkPayload};
pub use error::{CodecError, CodecResult};
pub use id_list::IdList;
pub use keys::{
    node_prefix, KeyCodec, NamedLink, RootSlot, TimeSeriesChunkKey, TimeSeriesKey,
    UnorderedNodePair,
};
pub use primitive::{ByteReader, ByteWriter, FORMAT_VERSION};
pub use record::Record;

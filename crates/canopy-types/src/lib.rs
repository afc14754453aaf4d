//! Foundation types for Canopy.
//!
//! This crate provides the identity, node, and time-series value types used
//! throughout the Canopy store. Every other Canopy crate depends on
//! `canopy-types`.
//!
//! # Key Types
//!
//! - [`NodeId`] — Opaque 128-bit node identity (UUID v7)
//! - [`NodeInfo`] — Persisted node record (name, pseudo-class, times, metadata)
//! - [`NodeGenericMetadata`] — Four typed key/value maps attached to a node
//! - [`TimeSeriesMetadata`] — Series name, data type, tags, and timestamp index
//! - [`DataChunk`] — Uncompressed or run-length compressed slice of a series
//! - [`TimeSeries`] — Metadata plus the ordered chunks read back for a version

pub mod chunk;
pub mod error;
pub mod info;
pub mod node;
pub mod series;

pub use chunk::{
    ChunkValue, CompressedChunk, DataChunk, DoubleDataChunk, StringDataChunk, UncompressedChunk,
};
pub use error::TypeError;
pub use info::{NodeGenericMetadata, NodeInfo};
pub use node::NodeId;
pub use series::{
    IrregularTimeSeriesIndex, RegularTimeSeriesIndex, TimeSeries, TimeSeriesDataType,
    TimeSeriesIndex, TimeSeriesMetadata,
};

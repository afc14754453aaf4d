//! Binary codec for time-series chunks.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! uncompressed: [format u8][tag u8][offset u32][count u32][value]*count
//! compressed:   [format u8][tag u8][offset u32][uncompressed_length u32]
//!               [steps u32][step_length u32]*steps
//!               [values u32][value]*values
//! ```
//!
//! Numeric values are 8-byte IEEE-754; string values are length-prefixed
//! UTF-8. The tag selects both the variant and the payload type.

use canopy_types::{
    ChunkValue, CompressedChunk, DataChunk, DoubleDataChunk, StringDataChunk, TimeSeriesDataType,
    UncompressedChunk,
};

use crate::error::{CodecError, CodecResult};
use crate::primitive::{ByteReader, ByteWriter};

pub const TAG_UNCOMPRESSED_DOUBLE: u8 = 1;
pub const TAG_COMPRESSED_DOUBLE: u8 = 2;
pub const TAG_UNCOMPRESSED_STRING: u8 = 3;
pub const TAG_COMPRESSED_STRING: u8 = 4;

/// Payload type encoded by a chunk tag, if the tag is known.
pub fn tag_data_type(tag: u8) -> Option<TimeSeriesDataType> {
    match tag {
        TAG_UNCOMPRESSED_DOUBLE | TAG_COMPRESSED_DOUBLE => Some(TimeSeriesDataType::Double),
        TAG_UNCOMPRESSED_STRING | TAG_COMPRESSED_STRING => Some(TimeSeriesDataType::String),
        _ => None,
    }
}

/// A chunk value type with a binary encoding.
pub trait ChunkPayload: ChunkValue + Sized {
    const UNCOMPRESSED_TAG: u8;
    const COMPRESSED_TAG: u8;
    /// Smallest possible encoded size of one value.
    const MIN_ENCODED_SIZE: usize;

    fn write_value(&self, w: &mut ByteWriter) -> CodecResult<()>;
    fn read_value(r: &mut ByteReader<'_>) -> CodecResult<Self>;

    fn into_any(chunk: DataChunk<Self>) -> AnyChunk;
    /// Extract a chunk of this payload type, handing back the input on
    /// mismatch.
    fn from_any(any: AnyChunk) -> Result<DataChunk<Self>, AnyChunk>;
}

impl ChunkPayload for f64 {
    const UNCOMPRESSED_TAG: u8 = TAG_UNCOMPRESSED_DOUBLE;
    const COMPRESSED_TAG: u8 = TAG_COMPRESSED_DOUBLE;
    const MIN_ENCODED_SIZE: usize = 8;

    fn write_value(&self, w: &mut ByteWriter) -> CodecResult<()> {
        w.put_f64(*self);
        Ok(())
    }

    fn read_value(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        r.get_f64()
    }

    fn into_any(chunk: DataChunk<Self>) -> AnyChunk {
        AnyChunk::Double(chunk)
    }

    fn from_any(any: AnyChunk) -> Result<DataChunk<Self>, AnyChunk> {
        match any {
            AnyChunk::Double(chunk) => Ok(chunk),
            other => Err(other),
        }
    }
}

impl ChunkPayload for String {
    const UNCOMPRESSED_TAG: u8 = TAG_UNCOMPRESSED_STRING;
    const COMPRESSED_TAG: u8 = TAG_COMPRESSED_STRING;
    const MIN_ENCODED_SIZE: usize = 4;

    fn write_value(&self, w: &mut ByteWriter) -> CodecResult<()> {
        w.put_str(self)
    }

    fn read_value(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        r.get_string()
    }

    fn into_any(chunk: DataChunk<Self>) -> AnyChunk {
        AnyChunk::String(chunk)
    }

    fn from_any(any: AnyChunk) -> Result<DataChunk<Self>, AnyChunk> {
        match any {
            AnyChunk::String(chunk) => Ok(chunk),
            other => Err(other),
        }
    }
}

/// Encode a chunk, format version tag included.
pub fn encode_chunk<T: ChunkPayload>(chunk: &DataChunk<T>) -> CodecResult<Vec<u8>> {
    let mut w = ByteWriter::versioned();
    match chunk {
        DataChunk::Uncompressed(c) => {
            w.put_u8(T::UNCOMPRESSED_TAG);
            w.put_u32(c.offset());
            w.put_len(c.values().len())?;
            for value in c.values() {
                value.write_value(&mut w)?;
            }
        }
        DataChunk::Compressed(c) => {
            w.put_u8(T::COMPRESSED_TAG);
            w.put_u32(c.offset());
            w.put_u32(c.uncompressed_length());
            w.put_len(c.step_lengths().len())?;
            for len in c.step_lengths() {
                w.put_u32(*len);
            }
            w.put_len(c.step_values().len())?;
            for value in c.step_values() {
                value.write_value(&mut w)?;
            }
        }
    }
    Ok(w.into_bytes())
}

/// Decode a chunk whose payload type is known in advance.
pub fn decode_chunk<T: ChunkPayload>(bytes: &[u8]) -> CodecResult<DataChunk<T>> {
    let mut r = ByteReader::versioned(bytes)?;
    let tag = r.get_u8()?;
    let chunk = decode_tagged(&mut r, tag)?;
    r.finish()?;
    Ok(chunk)
}

fn decode_tagged<T: ChunkPayload>(r: &mut ByteReader<'_>, tag: u8) -> CodecResult<DataChunk<T>> {
    if tag == T::UNCOMPRESSED_TAG {
        let offset = r.get_u32()?;
        let count = r.get_count(T::MIN_ENCODED_SIZE)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(T::read_value(r)?);
        }
        Ok(DataChunk::Uncompressed(UncompressedChunk::new(offset, values)))
    } else if tag == T::COMPRESSED_TAG {
        let offset = r.get_u32()?;
        let uncompressed_length = r.get_u32()?;
        let steps = r.get_count(4)?;
        let mut step_lengths = Vec::with_capacity(steps);
        for _ in 0..steps {
            step_lengths.push(r.get_u32()?);
        }
        let count = r.get_count(T::MIN_ENCODED_SIZE)?;
        let mut step_values = Vec::with_capacity(count);
        for _ in 0..count {
            step_values.push(T::read_value(r)?);
        }
        CompressedChunk::new(offset, uncompressed_length, step_lengths, step_values)
            .map(DataChunk::Compressed)
            .map_err(|e| CodecError::Malformed(e.to_string()))
    } else {
        Err(match tag_data_type(tag) {
            Some(found) => CodecError::ChunkTypeMismatch {
                expected: T::DATA_TYPE,
                found,
            },
            None => CodecError::UnknownChunkTag(tag),
        })
    }
}

/// A chunk of either payload type, as stored in the shared chunk map.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyChunk {
    Double(DoubleDataChunk),
    String(StringDataChunk),
}

impl AnyChunk {
    pub fn data_type(&self) -> TimeSeriesDataType {
        match self {
            Self::Double(_) => TimeSeriesDataType::Double,
            Self::String(_) => TimeSeriesDataType::String,
        }
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        match self {
            Self::Double(chunk) => encode_chunk(chunk),
            Self::String(chunk) => encode_chunk(chunk),
        }
    }

    /// Decode, selecting the payload type from the tag.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::versioned(bytes)?;
        let tag = r.get_u8()?;
        let chunk = match tag_data_type(tag) {
            Some(TimeSeriesDataType::Double) => Self::Double(decode_tagged(&mut r, tag)?),
            Some(TimeSeriesDataType::String) => Self::String(decode_tagged(&mut r, tag)?),
            None => return Err(CodecError::UnknownChunkTag(tag)),
        };
        r.finish()?;
        Ok(chunk)
    }
}

//! Time-series data chunks.
//!
//! A series is stored as an ordered sequence of chunks, each covering the
//! slice `[offset, offset + length)` of the series index. A chunk is either
//! stored verbatim ([`UncompressedChunk`]) or run-length encoded
//! ([`CompressedChunk`]): `step_lengths[i]` consecutive positions all hold
//! `step_values[i]`.
//!
//! Both shapes exist for numeric (`f64`) and string payloads through the
//! generic [`DataChunk`] sum type.

use std::fmt;

use crate::error::TypeError;
use crate::series::TimeSeriesDataType;

/// A value type that can be stored in a chunk.
pub trait ChunkValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The series data type this payload belongs to.
    const DATA_TYPE: TimeSeriesDataType;

    /// Approximate encoded size in bytes, used to pick the smaller variant.
    fn estimated_size(&self) -> usize;

    /// Equality used when building runs.
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl ChunkValue for f64 {
    const DATA_TYPE: TimeSeriesDataType = TimeSeriesDataType::Double;

    fn estimated_size(&self) -> usize {
        8
    }

    // Bitwise, so runs of NaN collapse like any other repeated value.
    fn same_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl ChunkValue for String {
    const DATA_TYPE: TimeSeriesDataType = TimeSeriesDataType::String;

    fn estimated_size(&self) -> usize {
        4 + self.len()
    }
}

// ---------------------------------------------------------------------------
// UncompressedChunk
// ---------------------------------------------------------------------------

/// Raw values starting at `offset`.
#[derive(Clone, Debug, PartialEq)]
pub struct UncompressedChunk<T> {
    offset: u32,
    values: Vec<T>,
}

impl<T: ChunkValue> UncompressedChunk<T> {
    pub fn new(offset: u32, values: Vec<T>) -> Self {
        Self { offset, values }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn length(&self) -> u32 {
        self.values.len() as u32
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    pub fn estimated_size(&self) -> usize {
        8 + self.values.iter().map(ChunkValue::estimated_size).sum::<usize>()
    }

    /// Run-length encode the values.
    pub fn compress(&self) -> CompressedChunk<T> {
        let mut step_lengths: Vec<u32> = Vec::new();
        let mut step_values: Vec<T> = Vec::new();
        for value in &self.values {
            match (step_values.last(), step_lengths.last_mut()) {
                (Some(last), Some(len)) if last.same_value(value) => *len += 1,
                _ => {
                    step_values.push(value.clone());
                    step_lengths.push(1);
                }
            }
        }
        CompressedChunk {
            offset: self.offset,
            uncompressed_length: self.length(),
            step_lengths,
            step_values,
        }
    }
}

// ---------------------------------------------------------------------------
// CompressedChunk
// ---------------------------------------------------------------------------

/// Run-length encoded values starting at `offset`.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressedChunk<T> {
    offset: u32,
    uncompressed_length: u32,
    step_lengths: Vec<u32>,
    step_values: Vec<T>,
}

impl<T: ChunkValue> CompressedChunk<T> {
    /// Build a compressed chunk.
    ///
    /// The two step arrays must have the same length, every step must be
    /// non-empty, and the steps must add up to `uncompressed_length`.
    pub fn new(
        offset: u32,
        uncompressed_length: u32,
        step_lengths: Vec<u32>,
        step_values: Vec<T>,
    ) -> Result<Self, TypeError> {
        if step_lengths.len() != step_values.len() {
            return Err(TypeError::InvalidChunk(format!(
                "{} step lengths but {} step values",
                step_lengths.len(),
                step_values.len()
            )));
        }
        if let Some(i) = step_lengths.iter().position(|&len| len == 0) {
            return Err(TypeError::InvalidChunk(format!("step {i} has zero length")));
        }
        let total: u64 = step_lengths.iter().map(|&len| u64::from(len)).sum();
        if total != u64::from(uncompressed_length) {
            return Err(TypeError::InvalidChunk(format!(
                "step lengths sum to {total}, expected {uncompressed_length}"
            )));
        }
        Ok(Self {
            offset,
            uncompressed_length,
            step_lengths,
            step_values,
        })
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn uncompressed_length(&self) -> u32 {
        self.uncompressed_length
    }

    pub fn step_lengths(&self) -> &[u32] {
        &self.step_lengths
    }

    pub fn step_values(&self) -> &[T] {
        &self.step_values
    }

    pub fn estimated_size(&self) -> usize {
        12 + 4 * self.step_lengths.len()
            + self
                .step_values
                .iter()
                .map(ChunkValue::estimated_size)
                .sum::<usize>()
    }

    /// Expand the runs back into a flat chunk.
    pub fn uncompress(&self) -> UncompressedChunk<T> {
        let mut values = Vec::with_capacity(self.uncompressed_length as usize);
        for (len, value) in self.step_lengths.iter().zip(&self.step_values) {
            values.extend(std::iter::repeat(value).take(*len as usize).cloned());
        }
        UncompressedChunk::new(self.offset, values)
    }
}

// ---------------------------------------------------------------------------
// DataChunk
// ---------------------------------------------------------------------------

/// One chunk of a time series: stored verbatim or run-length compressed.
#[derive(Clone, Debug, PartialEq)]
pub enum DataChunk<T> {
    Uncompressed(UncompressedChunk<T>),
    Compressed(CompressedChunk<T>),
}

/// Numeric chunk.
pub type DoubleDataChunk = DataChunk<f64>;

/// String chunk.
pub type StringDataChunk = DataChunk<String>;

impl<T: ChunkValue> DataChunk<T> {
    pub fn uncompressed(offset: u32, values: Vec<T>) -> Self {
        Self::Uncompressed(UncompressedChunk::new(offset, values))
    }

    pub fn compressed(
        offset: u32,
        uncompressed_length: u32,
        step_lengths: Vec<u32>,
        step_values: Vec<T>,
    ) -> Result<Self, TypeError> {
        CompressedChunk::new(offset, uncompressed_length, step_lengths, step_values)
            .map(Self::Compressed)
    }

    pub fn offset(&self) -> u32 {
        match self {
            Self::Uncompressed(c) => c.offset(),
            Self::Compressed(c) => c.offset(),
        }
    }

    /// Number of index positions covered.
    pub fn length(&self) -> u32 {
        match self {
            Self::Uncompressed(c) => c.length(),
            Self::Compressed(c) => c.uncompressed_length(),
        }
    }

    /// Exclusive end of the covered slice.
    pub fn end(&self) -> u64 {
        u64::from(self.offset()) + u64::from(self.length())
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed(_))
    }

    pub fn data_type(&self) -> TimeSeriesDataType {
        T::DATA_TYPE
    }

    pub fn estimated_size(&self) -> usize {
        match self {
            Self::Uncompressed(c) => c.estimated_size(),
            Self::Compressed(c) => c.estimated_size(),
        }
    }

    /// Flat values of the chunk, in index order.
    pub fn to_values(&self) -> Vec<T> {
        match self {
            Self::Uncompressed(c) => c.values().to_vec(),
            Self::Compressed(c) => c.uncompress().into_values(),
        }
    }

    /// Compress an uncompressed chunk when the compressed form is smaller.
    /// Compressed chunks are returned unchanged.
    pub fn try_compress(self) -> Self {
        match self {
            Self::Uncompressed(c) => {
                let compressed = c.compress();
                if compressed.estimated_size() < c.estimated_size() {
                    Self::Compressed(compressed)
                } else {
                    Self::Uncompressed(c)
                }
            }
            compressed => compressed,
        }
    }
}

impl<T> From<UncompressedChunk<T>> for DataChunk<T> {
    fn from(chunk: UncompressedChunk<T>) -> Self {
        Self::Uncompressed(chunk)
    }
}

impl<T> From<CompressedChunk<T>> for DataChunk<T> {
    fn from(chunk: CompressedChunk<T>) -> Self {
        Self::Compressed(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compress_builds_runs() {
        let chunk = UncompressedChunk::new(4, vec![5.0, 5.0, 5.0, 9.0, 9.0]);
        let compressed = chunk.compress();
        assert_eq!(compressed.offset(), 4);
        assert_eq!(compressed.uncompressed_length(), 5);
        assert_eq!(compressed.step_lengths(), &[3, 2]);
        assert_eq!(compressed.step_values(), &[5.0, 9.0]);
    }

    #[test]
    fn compressed_chunk_flattens() {
        let chunk = DoubleDataChunk::compressed(0, 5, vec![3, 2], vec![5.0, 9.0]).unwrap();
        assert_eq!(chunk.length(), 5);
        assert_eq!(chunk.to_values(), vec![5.0, 5.0, 5.0, 9.0, 9.0]);
    }

    #[test]
    fn compressed_rejects_bad_sum() {
        let err = DoubleDataChunk::compressed(0, 6, vec![3, 2], vec![5.0, 9.0]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidChunk(_)));
    }

    #[test]
    fn compressed_rejects_mismatched_arrays() {
        let err = DoubleDataChunk::compressed(0, 3, vec![3], vec![5.0, 9.0]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidChunk(_)));
    }

    #[test]
    fn compressed_rejects_empty_step() {
        let err = DoubleDataChunk::compressed(0, 3, vec![3, 0], vec![5.0, 9.0]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidChunk(_)));
    }

    #[test]
    fn nan_runs_collapse() {
        let chunk = UncompressedChunk::new(0, vec![f64::NAN, f64::NAN, 1.0]);
        assert_eq!(chunk.compress().step_lengths(), &[2, 1]);
    }

    #[test]
    fn try_compress_keeps_distinct_values_raw() {
        let chunk = DoubleDataChunk::uncompressed(0, vec![1.0, 2.0, 3.0]);
        assert!(!chunk.clone().try_compress().is_compressed());
    }

    #[test]
    fn try_compress_picks_runs_when_smaller() {
        let chunk = StringDataChunk::uncompressed(10, vec!["a".to_string(); 100]);
        let compressed = chunk.try_compress();
        assert!(compressed.is_compressed());
        assert_eq!(compressed.offset(), 10);
        assert_eq!(compressed.length(), 100);
        assert_eq!(compressed.end(), 110);
    }

    #[test]
    fn data_type_follows_payload() {
        assert_eq!(DoubleDataChunk::uncompressed(0, vec![]).data_type(), TimeSeriesDataType::Double);
        assert_eq!(StringDataChunk::uncompressed(0, vec![]).data_type(), TimeSeriesDataType::String);
    }

    proptest! {
        #[test]
        fn compress_then_uncompress_is_identity(
            offset in 0u32..1000,
            values in proptest::collection::vec(prop_oneof![Just(0.0f64), Just(1.5), Just(-2.0)], 0..200),
        ) {
            let raw = UncompressedChunk::new(offset, values);
            let compressed = raw.compress();
            let sum: u32 = compressed.step_lengths().iter().sum();
            prop_assert_eq!(sum, raw.length());
            prop_assert_eq!(compressed.uncompress(), raw);
        }
    }
}

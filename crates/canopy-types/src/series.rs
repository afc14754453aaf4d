use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkValue, DataChunk};
use crate::error::TypeError;

/// Payload type of a time series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSeriesDataType {
    Double,
    String,
}

impl fmt::Display for TimeSeriesDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double => write!(f, "double"),
            Self::String => write!(f, "string"),
        }
    }
}

/// Evenly spaced timestamps from `start_time` to `end_time` inclusive.
///
/// All values are milliseconds since the Unix epoch. The point count always
/// fits a `usize`; deserialization runs the same checks as [`new`](Self::new).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RegularIndexFields")]
pub struct RegularTimeSeriesIndex {
    start_time: i64,
    end_time: i64,
    spacing: i64,
}

#[derive(Deserialize)]
struct RegularIndexFields {
    start_time: i64,
    end_time: i64,
    spacing: i64,
}

impl TryFrom<RegularIndexFields> for RegularTimeSeriesIndex {
    type Error = TypeError;

    fn try_from(fields: RegularIndexFields) -> Result<Self, TypeError> {
        Self::new(fields.start_time, fields.end_time, fields.spacing)
    }
}

impl RegularTimeSeriesIndex {
    pub fn new(start_time: i64, end_time: i64, spacing: i64) -> Result<Self, TypeError> {
        if spacing <= 0 {
            return Err(TypeError::InvalidIndex(format!("spacing must be positive, got {spacing}")));
        }
        if end_time < start_time {
            return Err(TypeError::InvalidIndex(format!(
                "end time {end_time} is before start time {start_time}"
            )));
        }
        let steps = (i128::from(end_time) - i128::from(start_time)) / i128::from(spacing);
        if usize::try_from(steps + 1).is_err() {
            return Err(TypeError::InvalidIndex(format!(
                "{start_time}..={end_time} every {spacing} has too many points"
            )));
        }
        Ok(Self {
            start_time,
            end_time,
            spacing,
        })
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn spacing(&self) -> i64 {
        self.spacing
    }

    pub fn point_count(&self) -> usize {
        // Bounded by `new`.
        let steps = (i128::from(self.end_time) - i128::from(self.start_time)) / i128::from(self.spacing);
        steps as usize + 1
    }

    pub fn time_at(&self, point: usize) -> Option<i64> {
        if point >= self.point_count() {
            return None;
        }
        let time = i128::from(self.start_time) + point as i128 * i128::from(self.spacing);
        i64::try_from(time).ok()
    }
}

/// Arbitrary, strictly increasing timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IrregularIndexFields")]
pub struct IrregularTimeSeriesIndex {
    instants: Vec<i64>,
}

#[derive(Deserialize)]
struct IrregularIndexFields {
    instants: Vec<i64>,
}

impl TryFrom<IrregularIndexFields> for IrregularTimeSeriesIndex {
    type Error = TypeError;

    fn try_from(fields: IrregularIndexFields) -> Result<Self, TypeError> {
        Self::new(fields.instants)
    }
}

impl IrregularTimeSeriesIndex {
    pub fn new(instants: Vec<i64>) -> Result<Self, TypeError> {
        if instants.is_empty() {
            return Err(TypeError::InvalidIndex("irregular index has no instants".into()));
        }
        if let Some(w) = instants.windows(2).find(|w| w[0] >= w[1]) {
            return Err(TypeError::InvalidIndex(format!(
                "instants not strictly increasing: {} then {}",
                w[0], w[1]
            )));
        }
        Ok(Self { instants })
    }

    pub fn instants(&self) -> &[i64] {
        &self.instants
    }

    pub fn point_count(&self) -> usize {
        self.instants.len()
    }

    pub fn time_at(&self, point: usize) -> Option<i64> {
        self.instants.get(point).copied()
    }
}

/// The timestamp grid of a series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSeriesIndex {
    Regular(RegularTimeSeriesIndex),
    Irregular(IrregularTimeSeriesIndex),
}

impl TimeSeriesIndex {
    pub fn point_count(&self) -> usize {
        match self {
            Self::Regular(index) => index.point_count(),
            Self::Irregular(index) => index.point_count(),
        }
    }

    pub fn time_at(&self, point: usize) -> Option<i64> {
        match self {
            Self::Regular(index) => index.time_at(point),
            Self::Irregular(index) => index.time_at(point),
        }
    }
}

/// Descriptor of a time series registered at a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesMetadata {
    pub name: String,
    pub data_type: TimeSeriesDataType,
    pub tags: BTreeMap<String, String>,
    pub index: TimeSeriesIndex,
}

impl TimeSeriesMetadata {
    pub fn new(name: impl Into<String>, data_type: TimeSeriesDataType, index: TimeSeriesIndex) -> Self {
        Self {
            name: name.into(),
            data_type,
            tags: BTreeMap::new(),
            index,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// A series read back from the store: its metadata, the version read, and
/// its chunks in append order.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries<T> {
    pub metadata: TimeSeriesMetadata,
    pub version: u32,
    pub chunks: Vec<DataChunk<T>>,
}

impl<T: ChunkValue> TimeSeries<T> {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Materialize a dense array over the index.
    ///
    /// Positions no chunk covers are `None`. The result is at least as long
    /// as the index and grows to cover any chunk reaching past it. Later
    /// chunks overwrite earlier ones where they overlap. Fails instead of
    /// aborting when the array cannot be allocated.
    pub fn to_values(&self) -> Result<Vec<Option<T>>, TypeError> {
        let max_end = self.chunks.iter().map(DataChunk::end).max().unwrap_or(0) as usize;
        let len = self.metadata.index.point_count().max(max_end);
        let mut dense = Vec::new();
        dense.try_reserve_exact(len).map_err(|e| {
            TypeError::InvalidIndex(format!("cannot materialize {len} points of '{}': {e}", self.metadata.name))
        })?;
        dense.resize(len, None);
        for chunk in &self.chunks {
            let start = chunk.offset() as usize;
            for (i, value) in chunk.to_values().into_iter().enumerate() {
                dense[start + i] = Some(value);
            }
        }
        Ok(dense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly(points: i64) -> TimeSeriesIndex {
        TimeSeriesIndex::Regular(
            RegularTimeSeriesIndex::new(0, (points - 1) * 3_600_000, 3_600_000).unwrap(),
        )
    }

    #[test]
    fn regular_point_count() {
        let index = RegularTimeSeriesIndex::new(1000, 5000, 1000).unwrap();
        assert_eq!(index.point_count(), 5);
        assert_eq!(index.time_at(0), Some(1000));
        assert_eq!(index.time_at(4), Some(5000));
        assert_eq!(index.time_at(5), None);
    }

    #[test]
    fn regular_rejects_bad_spacing() {
        assert!(RegularTimeSeriesIndex::new(0, 10, 0).is_err());
        assert!(RegularTimeSeriesIndex::new(10, 0, 1).is_err());
    }

    #[test]
    fn regular_handles_the_full_i64_range() {
        assert!(RegularTimeSeriesIndex::new(i64::MIN, i64::MAX, 1).is_err());

        let index = RegularTimeSeriesIndex::new(i64::MIN, i64::MAX, i64::MAX).unwrap();
        assert_eq!(index.point_count(), 3);
        assert_eq!(index.time_at(0), Some(i64::MIN));
        assert_eq!(index.time_at(2), Some(i64::MAX - 1));
        assert_eq!(index.time_at(3), None);
        assert_eq!(index.start_time(), i64::MIN);
        assert_eq!(index.end_time(), i64::MAX);
        assert_eq!(index.spacing(), i64::MAX);
    }

    #[test]
    fn deserialization_validates_indices() {
        let zero: Result<RegularTimeSeriesIndex, _> =
            serde_json::from_str(r#"{"start_time":0,"end_time":10,"spacing":0}"#);
        assert!(zero.is_err());
        let backwards: Result<RegularTimeSeriesIndex, _> =
            serde_json::from_str(r#"{"start_time":10,"end_time":0,"spacing":1}"#);
        assert!(backwards.is_err());
        let unsorted: Result<IrregularTimeSeriesIndex, _> =
            serde_json::from_str(r#"{"instants":[5,1]}"#);
        assert!(unsorted.is_err());

        let index: RegularTimeSeriesIndex =
            serde_json::from_str(r#"{"start_time":0,"end_time":10,"spacing":5}"#).unwrap();
        assert_eq!(index.point_count(), 3);
        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(serde_json::from_str::<RegularTimeSeriesIndex>(&json).unwrap(), index);
    }

    #[test]
    fn irregular_requires_increasing_instants() {
        assert!(IrregularTimeSeriesIndex::new(vec![]).is_err());
        assert!(IrregularTimeSeriesIndex::new(vec![1, 1]).is_err());
        let index = IrregularTimeSeriesIndex::new(vec![1, 5, 9]).unwrap();
        assert_eq!(index.point_count(), 3);
        assert_eq!(index.time_at(1), Some(5));
        assert_eq!(index.instants(), &[1, 5, 9]);
    }

    #[test]
    fn data_type_display() {
        assert_eq!(TimeSeriesDataType::Double.to_string(), "double");
        assert_eq!(TimeSeriesDataType::String.to_string(), "string");
    }

    #[test]
    fn to_values_fills_gaps_with_none() {
        let series = TimeSeries {
            metadata: TimeSeriesMetadata::new("load", TimeSeriesDataType::Double, hourly(6)),
            version: 0,
            chunks: vec![
                DataChunk::uncompressed(0, vec![1.0, 2.0]),
                DataChunk::compressed(3, 3, vec![3], vec![7.0]).unwrap(),
            ],
        };
        assert_eq!(
            series.to_values().unwrap(),
            vec![Some(1.0), Some(2.0), None, Some(7.0), Some(7.0), Some(7.0)]
        );
    }

    #[test]
    fn to_values_grows_past_index() {
        let series = TimeSeries {
            metadata: TimeSeriesMetadata::new("s", TimeSeriesDataType::String, hourly(1)),
            version: 3,
            chunks: vec![DataChunk::uncompressed(1, vec!["x".to_string()])],
        };
        assert_eq!(series.to_values().unwrap(), vec![None, Some("x".to_string())]);
        assert_eq!(series.name(), "s");
    }

    #[test]
    fn to_values_reports_unallocatable_index() {
        let index = RegularTimeSeriesIndex::new(0, i64::MAX, 1).unwrap();
        let series: TimeSeries<f64> = TimeSeries {
            metadata: TimeSeriesMetadata::new("huge", TimeSeriesDataType::Double, TimeSeriesIndex::Regular(index)),
            version: 0,
            chunks: vec![],
        };
        assert!(matches!(series.to_values(), Err(TypeError::InvalidIndex(_))));
    }

    #[test]
    fn metadata_serde_roundtrip() {
        let metadata = TimeSeriesMetadata::new("load", TimeSeriesDataType::Double, hourly(24))
            .with_tag("unit", "MW");
        let json = serde_json::to_string(&metadata).unwrap();
        let parsed: TimeSeriesMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(metadata, parsed);
    }
}

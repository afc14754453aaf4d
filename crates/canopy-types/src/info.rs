use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// Generic caller-defined metadata attached to a node.
///
/// Four independent mappings; keys are unique within each mapping and
/// ordering carries no meaning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeGenericMetadata {
    pub strings: BTreeMap<String, String>,
    pub doubles: BTreeMap<String, f64>,
    pub ints: BTreeMap<String, i32>,
    pub booleans: BTreeMap<String, bool>,
}

impl NodeGenericMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.strings.insert(key.into(), value.into());
        self
    }

    pub fn with_double(mut self, key: impl Into<String>, value: f64) -> Self {
        self.doubles.insert(key.into(), value);
        self
    }

    pub fn with_int(mut self, key: impl Into<String>, value: i32) -> Self {
        self.ints.insert(key.into(), value);
        self
    }

    pub fn with_boolean(mut self, key: impl Into<String>, value: bool) -> Self {
        self.booleans.insert(key.into(), value);
        self
    }

    /// Returns `true` if all four mappings are empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
            && self.doubles.is_empty()
            && self.ints.is_empty()
            && self.booleans.is_empty()
    }
}

/// Persisted record of a node.
///
/// Times are milliseconds since the Unix epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub pseudo_class: String,
    pub description: String,
    pub creation_time: i64,
    pub modification_time: i64,
    pub version: u32,
    pub generic_metadata: NodeGenericMetadata,
}

impl NodeInfo {
    /// Create a record stamped with the current time.
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        pseudo_class: impl Into<String>,
        description: impl Into<String>,
        version: u32,
        generic_metadata: NodeGenericMetadata,
    ) -> Self {
        let now = now_millis();
        Self {
            id,
            name: name.into(),
            pseudo_class: pseudo_class.into(),
            description: description.into(),
            creation_time: now,
            modification_time: now,
            version,
            generic_metadata,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.creation_time).single()
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.modification_time).single()
    }

    /// Set the modification time to now. Never moves it backwards.
    pub fn touch(&mut self) {
        self.modification_time = now_millis().max(self.modification_time);
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_info_has_equal_times() {
        let info = NodeInfo::new(NodeId::generate(), "n", "folder", "", 0, NodeGenericMetadata::new());
        assert_eq!(info.creation_time, info.modification_time);
        assert!(info.created_at().is_some());
    }

    #[test]
    fn touch_never_goes_backwards() {
        let mut info = NodeInfo::new(NodeId::generate(), "n", "folder", "", 0, NodeGenericMetadata::new());
        info.modification_time = i64::MAX - 1;
        info.touch();
        assert_eq!(info.modification_time, i64::MAX - 1);
    }

    #[test]
    fn metadata_builder() {
        let md = NodeGenericMetadata::new()
            .with_string("owner", "ops")
            .with_double("ratio", 0.5)
            .with_int("count", 3)
            .with_boolean("enabled", true);
        assert!(!md.is_empty());
        assert_eq!(md.strings["owner"], "ops");
        assert_eq!(md.doubles["ratio"], 0.5);
        assert_eq!(md.ints["count"], 3);
        assert!(md.booleans["enabled"]);
        assert!(NodeGenericMetadata::default().is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let info = NodeInfo::new(
            NodeId::generate(),
            "case",
            "project",
            "a study case",
            2,
            NodeGenericMetadata::new().with_int("k", 7),
        );
        let json = serde_json::to_string(&info).unwrap();
        let parsed: NodeInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, parsed);
    }
}

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// One ordered byte map.
pub(crate) type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// A single write, as recorded in the journal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalOp {
    Put {
        map: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Remove {
        map: String,
        key: Vec<u8>,
    },
}

/// The named maps of a store.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    maps: HashMap<String, Table>,
}

impl Tables {
    pub(crate) fn get(&self, map: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.maps.get(map).and_then(|t| t.get(key)).cloned()
    }

    pub(crate) fn put(&mut self, map: &str, key: &[u8], value: &[u8]) {
        self.maps
            .entry(map.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
    }

    pub(crate) fn remove(&mut self, map: &str, key: &[u8]) -> Option<Vec<u8>> {
        let table = self.maps.get_mut(map)?;
        let old = table.remove(key);
        if table.is_empty() {
            self.maps.remove(map);
        }
        old
    }

    pub(crate) fn scan_prefix(&self, map: &str, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let Some(table) = self.maps.get(map) else {
            return Vec::new();
        };
        table
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn apply(&mut self, op: JournalOp) {
        match op {
            JournalOp::Put { map, key, value } => {
                self.maps.entry(map).or_default().insert(key, value);
            }
            JournalOp::Remove { map, key } => {
                self.remove(&map, &key);
            }
        }
    }

    /// The live state as a sequence of puts, maps in name order.
    pub(crate) fn snapshot_ops(&self) -> Vec<JournalOp> {
        let mut names: Vec<&String> = self.maps.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| {
                self.maps[name].iter().map(move |(k, v)| JournalOp::Put {
                    map: name.clone(),
                    key: k.clone(),
                    value: v.clone(),
                })
            })
            .collect()
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.maps.values().map(BTreeMap::len).sum()
    }
}

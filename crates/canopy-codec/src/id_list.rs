use std::fmt;
use std::sync::Arc;

use canopy_types::NodeId;

/// Persistent, immutable list of node ids.
///
/// Child lists and dependency adjacency lists are stored as `IdList`
/// values. Every modification returns a new list and leaves the receiver
/// untouched, so a value fetched from the store is never mutated in place.
/// Clones share the same backing slice.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdList {
    ids: Arc<[NodeId]>,
}

impl IdList {
    /// The empty list.
    pub fn new() -> Self {
        Self {
            ids: Arc::from(Vec::<NodeId>::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.ids.iter()
    }

    pub fn as_slice(&self) -> &[NodeId] {
        &self.ids
    }

    /// A new list with `id` appended.
    #[must_use]
    pub fn add(&self, id: NodeId) -> Self {
        let mut ids = Vec::with_capacity(self.ids.len() + 1);
        ids.extend_from_slice(&self.ids);
        ids.push(id);
        Self { ids: ids.into() }
    }

    /// A new list without the first occurrence of `id`.
    #[must_use]
    pub fn remove(&self, id: &NodeId) -> Self {
        match self.ids.iter().position(|x| x == id) {
            Some(pos) => {
                let mut ids = self.ids.to_vec();
                ids.remove(pos);
                Self { ids: ids.into() }
            }
            None => self.clone(),
        }
    }

    /// A new list without any occurrence of `id`.
    #[must_use]
    pub fn remove_all(&self, id: &NodeId) -> Self {
        if !self.contains(id) {
            return self.clone();
        }
        let ids: Vec<NodeId> = self.ids.iter().filter(|x| *x != id).copied().collect();
        Self { ids: ids.into() }
    }
}

impl Default for IdList {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<NodeId>> for IdList {
    fn from(ids: Vec<NodeId>) -> Self {
        Self { ids: ids.into() }
    }
}

impl FromIterator<NodeId> for IdList {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl<'a> IntoIterator for &'a IdList {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for IdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids.iter()).finish()
    }
}

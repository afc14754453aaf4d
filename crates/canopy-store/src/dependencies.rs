//! Named, directed dependencies between nodes.
//!
//! Each edge appears in the source's forward list and the target's backward
//! list; the name is stored once under the unordered node pair.

use canopy_codec::UnorderedNodePair;
use canopy_types::{NodeId, NodeInfo};
use tracing::debug;

use crate::error::StorageResult;
use crate::maps::{BACKWARD_DEPS, DEPENDENCY_NAMES, FORWARD_DEPS};
use crate::storage::NodeStorage;

impl NodeStorage {
    /// Add the edge `from -> to` named `name`.
    ///
    /// Adding an existing edge again only overwrites its name.
    pub fn add_dependency(&self, from: NodeId, name: &str, to: NodeId) -> StorageResult<()> {
        let _guard = self.write_guard();
        self.ensure_node(&from)?;
        self.ensure_node(&to)?;
        let kv = self.kv();

        let forward = FORWARD_DEPS.get_or_default(kv, &from)?;
        if !forward.contains(&to) {
            FORWARD_DEPS.put(kv, &from, &forward.add(to))?;
        }
        DEPENDENCY_NAMES.put(kv, &UnorderedNodePair::new(from, to), &name.to_string())?;
        let backward = BACKWARD_DEPS.get_or_default(kv, &to)?;
        if !backward.contains(&from) {
            BACKWARD_DEPS.put(kv, &to, &backward.add(from))?;
        }
        debug!(from = %from, to = %to, name, "dependency added");
        Ok(())
    }

    /// The target of the edge from `node` named `name`, if any.
    pub fn get_dependency(&self, node: NodeId, name: &str) -> StorageResult<Option<NodeInfo>> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        let kv = self.kv();
        for target in &FORWARD_DEPS.get_or_default(kv, &node)? {
            let pair = UnorderedNodePair::new(node, *target);
            if DEPENDENCY_NAMES.get(kv, &pair)?.as_deref() == Some(name) {
                return Ok(self.load_related([target], "forward dependency")?.pop());
            }
        }
        Ok(None)
    }

    /// Targets of every edge leaving `node`, in insertion order.
    pub fn get_dependencies(&self, node: NodeId) -> StorageResult<Vec<NodeInfo>> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        let targets = FORWARD_DEPS.get_or_default(self.kv(), &node)?;
        self.load_related(&targets, "forward dependency")
    }

    /// Sources of every edge entering `node`, in insertion order.
    pub fn get_backward_dependencies(&self, node: NodeId) -> StorageResult<Vec<NodeInfo>> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        let sources = BACKWARD_DEPS.get_or_default(self.kv(), &node)?;
        self.load_related(&sources, "backward dependency")
    }

    /// The name of the edge between `a` and `b`, in either direction.
    pub fn get_dependency_name(&self, a: NodeId, b: NodeId) -> StorageResult<Option<String>> {
        let _guard = self.read_guard();
        self.ensure_node(&a)?;
        self.ensure_node(&b)?;
        DEPENDENCY_NAMES.get(self.kv(), &UnorderedNodePair::new(a, b))
    }

    /// Remove the edge `from -> to` if it exists under `name`.
    pub fn remove_dependency(&self, from: NodeId, name: &str, to: NodeId) -> StorageResult<bool> {
        let _guard = self.write_guard();
        self.ensure_node(&from)?;
        self.ensure_node(&to)?;
        let kv = self.kv();

        let pair = UnorderedNodePair::new(from, to);
        let forward = FORWARD_DEPS.get_or_default(kv, &from)?;
        if !forward.contains(&to) || DEPENDENCY_NAMES.get(kv, &pair)?.as_deref() != Some(name) {
            return Ok(false);
        }

        FORWARD_DEPS.put(kv, &from, &forward.remove_all(&to))?;
        BACKWARD_DEPS.update_existing(kv, &to, |l| l.remove_all(&from))?;
        // The reverse edge, if any, shares the pair name.
        let reverse_exists = from != to && FORWARD_DEPS.get_or_default(kv, &to)?.contains(&from);
        if !reverse_exists {
            DEPENDENCY_NAMES.remove(kv, &pair)?;
        }
        debug!(from = %from, to = %to, name, "dependency removed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_types::NodeGenericMetadata;

    fn setup(names: &[&str]) -> (NodeStorage, Vec<NodeId>) {
        let storage = NodeStorage::in_memory();
        let root = storage.create_root_node_if_not_exists("root", "Root").unwrap();
        let ids = names
            .iter()
            .map(|n| {
                storage
                    .create_node(Some(root.id), n, "Asset", "", 0, NodeGenericMetadata::new())
                    .unwrap()
                    .id
            })
            .collect();
        (storage, ids)
    }

    fn ids(infos: Vec<NodeInfo>) -> Vec<NodeId> {
        infos.into_iter().map(|n| n.id).collect()
    }

    /// Every forward edge has its backward twin and vice versa.
    fn assert_symmetric(storage: &NodeStorage, nodes: &[NodeId]) {
        for &n in nodes {
            if !storage.node_exists(n).unwrap() {
                continue;
            }
            for target in ids(storage.get_dependencies(n).unwrap()) {
                assert!(ids(storage.get_backward_dependencies(target).unwrap()).contains(&n));
            }
            for source in ids(storage.get_backward_dependencies(n).unwrap()) {
                assert!(ids(storage.get_dependencies(source).unwrap()).contains(&n));
            }
        }
    }

    #[test]
    fn add_and_read_dependency() {
        let (storage, n) = setup(&["a", "b"]);
        storage.add_dependency(n[0], "feeds", n[1]).unwrap();
        assert_eq!(storage.get_dependency(n[0], "feeds").unwrap().unwrap().id, n[1]);
        assert!(storage.get_dependency(n[0], "other").unwrap().is_none());
        assert!(storage.get_dependency(n[1], "feeds").unwrap().is_none());
        assert_eq!(ids(storage.get_dependencies(n[0]).unwrap()), vec![n[1]]);
        assert_eq!(ids(storage.get_backward_dependencies(n[1]).unwrap()), vec![n[0]]);
        assert_eq!(
            storage.get_dependency_name(n[1], n[0]).unwrap().as_deref(),
            Some("feeds")
        );
    }

    #[test]
    fn same_name_to_different_targets() {
        let (storage, n) = setup(&["a", "b", "c"]);
        storage.add_dependency(n[0], "x", n[1]).unwrap();
        storage.add_dependency(n[0], "x", n[2]).unwrap();
        assert_eq!(ids(storage.get_dependencies(n[0]).unwrap()), vec![n[1], n[2]]);
        assert_symmetric(&storage, &n);
    }

    #[test]
    fn readding_edge_does_not_duplicate() {
        let (storage, n) = setup(&["a", "b"]);
        storage.add_dependency(n[0], "x", n[1]).unwrap();
        storage.add_dependency(n[0], "y", n[1]).unwrap();
        assert_eq!(ids(storage.get_dependencies(n[0]).unwrap()), vec![n[1]]);
        assert_eq!(ids(storage.get_backward_dependencies(n[1]).unwrap()), vec![n[0]]);
        assert!(storage.get_dependency(n[0], "x").unwrap().is_none());
        assert!(storage.get_dependency(n[0], "y").unwrap().is_some());
    }

    #[test]
    fn unknown_endpoints_are_not_found() {
        let (storage, n) = setup(&["a"]);
        let ghost = NodeId::generate();
        assert!(storage.add_dependency(n[0], "x", ghost).unwrap_err().is_not_found());
        assert!(storage.add_dependency(ghost, "x", n[0]).unwrap_err().is_not_found());
        assert!(storage.get_dependencies(ghost).unwrap_err().is_not_found());
        assert!(storage.get_backward_dependencies(ghost).unwrap_err().is_not_found());
        assert!(storage.get_dependencies(n[0]).unwrap().is_empty());
    }

    #[test]
    fn remove_dependency_requires_matching_name() {
        let (storage, n) = setup(&["a", "b"]);
        storage.add_dependency(n[0], "x", n[1]).unwrap();
        assert!(!storage.remove_dependency(n[0], "y", n[1]).unwrap());
        assert!(!storage.remove_dependency(n[1], "x", n[0]).unwrap());
        assert!(storage.remove_dependency(n[0], "x", n[1]).unwrap());
        assert!(storage.get_dependencies(n[0]).unwrap().is_empty());
        assert!(storage.get_backward_dependencies(n[1]).unwrap().is_empty());
        assert!(storage.get_dependency_name(n[0], n[1]).unwrap().is_none());
    }

    #[test]
    fn removing_one_direction_keeps_reverse_edge_name() {
        let (storage, n) = setup(&["a", "b"]);
        storage.add_dependency(n[0], "link", n[1]).unwrap();
        storage.add_dependency(n[1], "link", n[0]).unwrap();
        assert!(storage.remove_dependency(n[0], "link", n[1]).unwrap());
        assert_eq!(storage.get_dependency(n[1], "link").unwrap().unwrap().id, n[0]);
        assert_symmetric(&storage, &n);
    }

    #[test]
    fn deleting_target_prunes_both_directions() {
        let (storage, n) = setup(&["a", "b", "c"]);
        storage.add_dependency(n[0], "x", n[1]).unwrap();
        storage.add_dependency(n[1], "y", n[2]).unwrap();
        storage.add_dependency(n[2], "z", n[1]).unwrap();

        storage.delete_node(n[1]).unwrap();
        assert!(storage.get_dependencies(n[0]).unwrap().is_empty());
        assert!(storage.get_dependency(n[0], "x").unwrap().is_none());
        assert!(storage.get_backward_dependencies(n[2]).unwrap().is_empty());
        assert!(storage.get_dependencies(n[2]).unwrap().is_empty());
        assert!(storage.get_dependency_name(n[0], n[2]).unwrap().is_none());
        assert_symmetric(&storage, &n);
    }

    #[test]
    fn deleting_source_prunes_backward_lists() {
        let (storage, n) = setup(&["a", "b"]);
        storage.add_dependency(n[0], "x", n[1]).unwrap();
        storage.delete_node(n[0]).unwrap();
        assert!(storage.get_backward_dependencies(n[1]).unwrap().is_empty());
        assert_symmetric(&storage, &n);
    }

    #[test]
    fn deleting_subtree_with_internal_and_external_edges() {
        let storage = NodeStorage::in_memory();
        let root = storage.create_root_node_if_not_exists("root", "Root").unwrap();
        let meta = NodeGenericMetadata::new;
        let a = storage.create_node(Some(root.id), "a", "F", "", 0, meta()).unwrap().id;
        let a1 = storage.create_node(Some(a), "a1", "F", "", 0, meta()).unwrap().id;
        let a2 = storage.create_node(Some(a), "a2", "F", "", 0, meta()).unwrap().id;
        let b = storage.create_node(Some(root.id), "b", "F", "", 0, meta()).unwrap().id;
        storage.add_dependency(a1, "in", a2).unwrap();
        storage.add_dependency(a2, "out", b).unwrap();
        storage.add_dependency(b, "back", a1).unwrap();
        storage.add_dependency(a1, "self", a1).unwrap();

        storage.delete_node(a).unwrap();
        assert!(storage.get_dependencies(b).unwrap().is_empty());
        assert!(storage.get_backward_dependencies(b).unwrap().is_empty());
        assert_symmetric(&storage, &[a, a1, a2, b]);
    }

    #[test]
    fn self_dependency() {
        let (storage, n) = setup(&["a"]);
        storage.add_dependency(n[0], "me", n[0]).unwrap();
        assert_eq!(storage.get_dependency(n[0], "me").unwrap().unwrap().id, n[0]);
        assert!(storage.remove_dependency(n[0], "me", n[0]).unwrap());
        assert!(storage.get_dependency_name(n[0], n[0]).unwrap().is_none());
    }
}

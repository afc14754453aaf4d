//! Node hierarchy: creation, lookup, moves, renames and subtree deletion.

use std::collections::BTreeSet;

use canopy_codec::{IdList, NamedLink, RootSlot, UnorderedNodePair};
use canopy_types::{NodeGenericMetadata, NodeId, NodeInfo};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::maps::{
    BACKWARD_DEPS, CHILD_BY_NAME, CHILD_NODES, DATA, DATA_NAMES, DEPENDENCY_NAMES, FORWARD_DEPS,
    NODE_INFO, PARENT, ROOT, SERIES_METADATA, SERIES_NAMES,
};
use crate::storage::NodeStorage;

impl NodeStorage {
    /// Return the root node, creating it on first call.
    pub fn create_root_node_if_not_exists(
        &self,
        name: &str,
        pseudo_class: &str,
    ) -> StorageResult<NodeInfo> {
        let _guard = self.write_guard();
        if let Some(root) = ROOT.get(self.kv(), &RootSlot)? {
            return NODE_INFO.get(self.kv(), &root)?.ok_or_else(|| {
                StorageError::Corruption(format!("root slot points at missing node {root}"))
            });
        }
        let info = self.insert_node(None, name, pseudo_class, "", 0, NodeGenericMetadata::new())?;
        ROOT.put(self.kv(), &RootSlot, &info.id)?;
        debug!(node = %info.id, name, "root node created");
        Ok(info)
    }

    /// Create a node, optionally under `parent`.
    pub fn create_node(
        &self,
        parent: Option<NodeId>,
        name: &str,
        pseudo_class: &str,
        description: &str,
        version: u32,
        metadata: NodeGenericMetadata,
    ) -> StorageResult<NodeInfo> {
        let _guard = self.write_guard();
        self.insert_node(parent, name, pseudo_class, description, version, metadata)
    }

    fn insert_node(
        &self,
        parent: Option<NodeId>,
        name: &str,
        pseudo_class: &str,
        description: &str,
        version: u32,
        metadata: NodeGenericMetadata,
    ) -> StorageResult<NodeInfo> {
        let kv = self.kv();
        if let Some(parent) = parent {
            self.ensure_node(&parent)?;
            if CHILD_BY_NAME.contains(kv, &NamedLink::new(parent, name))? {
                return Err(StorageError::ChildAlreadyExists {
                    parent,
                    name: name.to_string(),
                });
            }
        }

        let id = NodeId::generate();
        let info = NodeInfo::new(id, name, pseudo_class, description, version, metadata);
        NODE_INFO.put(kv, &id, &info)?;
        DATA_NAMES.put(kv, &id, &BTreeSet::new())?;
        SERIES_NAMES.put(kv, &id, &BTreeSet::new())?;
        CHILD_NODES.put(kv, &id, &IdList::new())?;
        FORWARD_DEPS.put(kv, &id, &IdList::new())?;
        BACKWARD_DEPS.put(kv, &id, &IdList::new())?;

        if let Some(parent) = parent {
            self.link_child(&parent, &id, name)?;
        }
        debug!(node = %id, parent = ?parent, name, "node created");
        Ok(info)
    }

    fn link_child(&self, parent: &NodeId, child: &NodeId, name: &str) -> StorageResult<()> {
        let kv = self.kv();
        let children = CHILD_NODES.get_or_default(kv, parent)?;
        CHILD_NODES.put(kv, parent, &children.add(*child))?;
        CHILD_BY_NAME.put(kv, &NamedLink::new(*parent, name), child)?;
        PARENT.put(kv, child, parent)
    }

    fn unlink_child(&self, parent: &NodeId, child: &NodeId, name: &str) -> StorageResult<()> {
        let kv = self.kv();
        CHILD_NODES.update_existing(kv, parent, |children| children.remove(child))?;
        CHILD_BY_NAME.remove(kv, &NamedLink::new(*parent, name))?;
        PARENT.remove(kv, child)?;
        Ok(())
    }

    pub fn get_node_info(&self, id: NodeId) -> StorageResult<NodeInfo> {
        let _guard = self.read_guard();
        self.load_node(&id)
    }

    pub fn node_exists(&self, id: NodeId) -> StorageResult<bool> {
        let _guard = self.read_guard();
        Ok(NODE_INFO.contains(self.kv(), &id)?)
    }

    /// Children of `id`, in creation order.
    pub fn get_child_nodes(&self, id: NodeId) -> StorageResult<Vec<NodeInfo>> {
        let _guard = self.read_guard();
        self.ensure_node(&id)?;
        let children = CHILD_NODES.get_or_default(self.kv(), &id)?;
        self.load_related(&children, "child list")
    }

    /// The child of `parent` named `name`, if any.
    pub fn get_child_node(&self, parent: NodeId, name: &str) -> StorageResult<Option<NodeInfo>> {
        let _guard = self.read_guard();
        self.ensure_node(&parent)?;
        match CHILD_BY_NAME.get(self.kv(), &NamedLink::new(parent, name))? {
            Some(child) => Ok(self.load_related([&child], "named child")?.pop()),
            None => Ok(None),
        }
    }

    /// The parent of `id`; `None` for the root and other parentless nodes.
    pub fn get_parent_node(&self, id: NodeId) -> StorageResult<Option<NodeInfo>> {
        let _guard = self.read_guard();
        self.ensure_node(&id)?;
        match PARENT.get(self.kv(), &id)? {
            Some(parent) => Ok(self.load_related([&parent], "parent")?.pop()),
            None => Ok(None),
        }
    }

    /// Move `id` under `new_parent`.
    pub fn set_parent_node(&self, id: NodeId, new_parent: NodeId) -> StorageResult<()> {
        let _guard = self.write_guard();
        let kv = self.kv();
        let info = self.load_node(&id)?;
        self.ensure_node(&new_parent)?;
        let old_parent = PARENT.get(kv, &id)?.ok_or_else(|| {
            StorageError::InvalidArgument(format!("node {id} has no parent and cannot be moved"))
        })?;
        if old_parent == new_parent {
            return Ok(());
        }
        if self.is_self_or_ancestor(&id, &new_parent)? {
            return Err(StorageError::InvalidArgument(format!(
                "moving node {id} under {new_parent} would create a cycle"
            )));
        }
        if CHILD_BY_NAME.contains(kv, &NamedLink::new(new_parent, &info.name))? {
            return Err(StorageError::ChildAlreadyExists {
                parent: new_parent,
                name: info.name,
            });
        }

        self.unlink_child(&old_parent, &id, &info.name)?;
        self.link_child(&new_parent, &id, &info.name)?;
        debug!(node = %id, from = %old_parent, to = %new_parent, "node moved");
        Ok(())
    }

    /// Whether `candidate` lies on the path from `start` up to the root.
    fn is_self_or_ancestor(&self, candidate: &NodeId, start: &NodeId) -> StorageResult<bool> {
        let mut current = Some(*start);
        while let Some(node) = current {
            if node == *candidate {
                return Ok(true);
            }
            current = PARENT.get(self.kv(), &node)?;
        }
        Ok(false)
    }

    /// Overwrite the description. The modification time is left alone.
    pub fn set_description(&self, id: NodeId, description: &str) -> StorageResult<()> {
        let _guard = self.write_guard();
        let mut info = self.load_node(&id)?;
        info.description = description.to_string();
        NODE_INFO.put(self.kv(), &id, &info)
    }

    pub fn update_modification_time(&self, id: NodeId) -> StorageResult<()> {
        let _guard = self.write_guard();
        let mut info = self.load_node(&id)?;
        info.touch();
        NODE_INFO.put(self.kv(), &id, &info)
    }

    /// Rename a node, keeping sibling names unique.
    pub fn rename_node(&self, id: NodeId, new_name: &str) -> StorageResult<()> {
        let _guard = self.write_guard();
        let kv = self.kv();
        let mut info = self.load_node(&id)?;
        if info.name == new_name {
            return Ok(());
        }
        if let Some(parent) = PARENT.get(kv, &id)? {
            let link = NamedLink::new(parent, new_name);
            if CHILD_BY_NAME.contains(kv, &link)? {
                return Err(StorageError::ChildAlreadyExists {
                    parent,
                    name: new_name.to_string(),
                });
            }
            CHILD_BY_NAME.remove(kv, &NamedLink::new(parent, &info.name))?;
            CHILD_BY_NAME.put(kv, &link, &id)?;
        }
        debug!(node = %id, from = %info.name, to = new_name, "node renamed");
        info.name = new_name.to_string();
        NODE_INFO.put(kv, &id, &info)
    }

    /// Delete `id` and its whole subtree. Returns the former parent.
    pub fn delete_node(&self, id: NodeId) -> StorageResult<Option<NodeId>> {
        let _guard = self.write_guard();
        let kv = self.kv();
        self.ensure_node(&id)?;
        let parent = PARENT.get(kv, &id)?;

        // Pre-order walk; deleting in reverse removes children before parents.
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(CHILD_NODES.get_or_default(kv, &node)?.iter().copied());
        }
        for node in order.iter().rev() {
            self.delete_single(node)?;
        }

        if ROOT.get(kv, &RootSlot)? == Some(id) {
            ROOT.remove(kv, &RootSlot)?;
        }
        debug!(node = %id, removed = order.len(), "subtree deleted");
        Ok(parent)
    }

    fn delete_single(&self, id: &NodeId) -> StorageResult<()> {
        let kv = self.kv();
        let info = self.load_node(id)?;

        for name in DATA_NAMES.get_or_default(kv, id)? {
            DATA.remove(kv, &NamedLink::new(*id, name))?;
        }
        DATA_NAMES.remove(kv, id)?;

        if let Some(parent) = PARENT.get(kv, id)? {
            self.unlink_child(&parent, id, &info.name)?;
        }
        CHILD_NODES.remove(kv, id)?;

        for target in &FORWARD_DEPS.get_or_default(kv, id)? {
            BACKWARD_DEPS.update_existing(kv, target, |l| l.remove_all(id))?;
            DEPENDENCY_NAMES.remove(kv, &UnorderedNodePair::new(*id, *target))?;
        }
        for source in &BACKWARD_DEPS.get_or_default(kv, id)? {
            FORWARD_DEPS.update_existing(kv, source, |l| l.remove_all(id))?;
            DEPENDENCY_NAMES.remove(kv, &UnorderedNodePair::new(*id, *source))?;
        }
        FORWARD_DEPS.remove(kv, id)?;
        BACKWARD_DEPS.remove(kv, id)?;

        for name in SERIES_NAMES.get_or_default(kv, id)? {
            SERIES_METADATA.remove(kv, &NamedLink::new(*id, name))?;
        }
        SERIES_NAMES.remove(kv, id)?;

        NODE_INFO.remove(kv, id)?;
        debug!(node = %id, name = %info.name, "node deleted");
        Ok(())
    }
}

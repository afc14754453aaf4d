//! Named binary attachments.

use std::io;
use std::mem;

use canopy_codec::NamedLink;
use canopy_types::NodeId;
use tracing::{debug, error};

use crate::error::StorageResult;
use crate::maps::{DATA, DATA_NAMES};
use crate::storage::NodeStorage;

impl NodeStorage {
    /// The attachment `name` of `node`, or `None` if it was never written.
    pub fn read_binary_data(&self, node: NodeId, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        DATA.get(self.kv(), &NamedLink::new(node, name))
    }

    pub fn data_exists(&self, node: NodeId, name: &str) -> StorageResult<bool> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        DATA.contains(self.kv(), &NamedLink::new(node, name))
    }

    /// Attachment names of `node`, sorted.
    pub fn get_data_names(&self, node: NodeId) -> StorageResult<Vec<String>> {
        let _guard = self.read_guard();
        self.ensure_node(&node)?;
        Ok(DATA_NAMES.get_or_default(self.kv(), &node)?.into_iter().collect())
    }

    /// Remove an attachment. Returns `true` if it existed.
    pub fn remove_data(&self, node: NodeId, name: &str) -> StorageResult<bool> {
        let _guard = self.write_guard();
        self.ensure_node(&node)?;
        let kv = self.kv();
        let existed = DATA.remove(kv, &NamedLink::new(node, name))?;
        DATA_NAMES.update_existing(kv, &node, |mut names| {
            names.remove(name);
            names
        })?;
        if existed {
            debug!(node = %node, name, "attachment removed");
        }
        Ok(existed)
    }

    /// Open a writer for attachment `name` of `node`.
    ///
    /// Bytes are buffered and stored when the writer is closed or dropped;
    /// until then readers see the previous content.
    pub fn write_binary_data(&self, node: NodeId, name: &str) -> StorageResult<BinaryDataWriter<'_>> {
        {
            let _guard = self.read_guard();
            self.ensure_node(&node)?;
        }
        Ok(BinaryDataWriter {
            storage: self,
            node,
            name: name.to_string(),
            buffer: Vec::new(),
            done: false,
        })
    }

    fn store_attachment(&self, node: NodeId, name: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let _guard = self.write_guard();
        self.ensure_node(&node)?;
        let kv = self.kv();
        let len = bytes.len();
        DATA.put(kv, &NamedLink::new(node, name), &bytes)?;
        let mut names = DATA_NAMES.get_or_default(kv, &node)?;
        if !names.contains(name) {
            names.insert(name.to_string());
            DATA_NAMES.put(kv, &node, &names)?;
        }
        debug!(node = %node, name, len, "attachment stored");
        Ok(())
    }
}

/// Buffered writer for one attachment.
///
/// Call [`close`](Self::close) to observe errors. Dropping an unclosed
/// writer stores the bytes too, logging any failure.
pub struct BinaryDataWriter<'a> {
    storage: &'a NodeStorage,
    node: NodeId,
    name: String,
    buffer: Vec<u8>,
    done: bool,
}

impl BinaryDataWriter<'_> {
    /// Store the buffered bytes.
    pub fn close(mut self) -> StorageResult<()> {
        self.store()
    }

    fn store(&mut self) -> StorageResult<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        let bytes = mem::take(&mut self.buffer);
        self.storage.store_attachment(self.node, &self.name, bytes)
    }
}

impl io::Write for BinaryDataWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for BinaryDataWriter<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store() {
            error!(node = %self.node, name = %self.name, error = %e, "failed to store attachment on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use canopy_types::{NodeGenericMetadata, NodeInfo};

    use crate::error::StorageError;

    fn setup() -> (NodeStorage, NodeInfo) {
        let storage = NodeStorage::in_memory();
        let root = storage.create_root_node_if_not_exists("root", "Root").unwrap();
        (storage, root)
    }

    fn write(storage: &NodeStorage, node: NodeId, name: &str, bytes: &[u8]) {
        let mut w = storage.write_binary_data(node, name).unwrap();
        w.write_all(bytes).unwrap();
        w.close().unwrap();
    }

    #[test]
    fn write_then_read() {
        let (storage, root) = setup();
        write(&storage, root.id, "blob.bin", &[1, 2, 3]);
        assert_eq!(storage.read_binary_data(root.id, "blob.bin").unwrap(), Some(vec![1, 2, 3]));
        assert!(storage.data_exists(root.id, "blob.bin").unwrap());
        assert_eq!(storage.get_data_names(root.id).unwrap(), vec!["blob.bin"]);
    }

    #[test]
    fn bytes_are_invisible_until_close() {
        let (storage, root) = setup();
        let mut w = storage.write_binary_data(root.id, "a").unwrap();
        w.write_all(b"partial").unwrap();
        assert_eq!(storage.read_binary_data(root.id, "a").unwrap(), None);
        assert!(!storage.data_exists(root.id, "a").unwrap());
        w.close().unwrap();
        assert_eq!(storage.read_binary_data(root.id, "a").unwrap(), Some(b"partial".to_vec()));
    }

    #[test]
    fn drop_stores_bytes() {
        let (storage, root) = setup();
        {
            let mut w = storage.write_binary_data(root.id, "dropped").unwrap();
            write!(w, "hello {}", 42).unwrap();
        }
        assert_eq!(
            storage.read_binary_data(root.id, "dropped").unwrap(),
            Some(b"hello 42".to_vec())
        );
    }

    #[test]
    fn overwrite_replaces_content_and_keeps_one_name() {
        let (storage, root) = setup();
        write(&storage, root.id, "a", b"first");
        write(&storage, root.id, "a", b"second");
        assert_eq!(storage.read_binary_data(root.id, "a").unwrap(), Some(b"second".to_vec()));
        assert_eq!(storage.get_data_names(root.id).unwrap(), vec!["a"]);
    }

    #[test]
    fn empty_attachment_exists() {
        let (storage, root) = setup();
        write(&storage, root.id, "empty", &[]);
        assert_eq!(storage.read_binary_data(root.id, "empty").unwrap(), Some(vec![]));
    }

    #[test]
    fn missing_attachment_is_absent_not_error() {
        let (storage, root) = setup();
        assert_eq!(storage.read_binary_data(root.id, "nope").unwrap(), None);
        assert!(!storage.data_exists(root.id, "nope").unwrap());
    }

    #[test]
    fn unknown_node_is_not_found() {
        let (storage, _) = setup();
        let ghost = NodeId::generate();
        assert!(storage.read_binary_data(ghost, "x").unwrap_err().is_not_found());
        assert!(storage.write_binary_data(ghost, "x").is_err());
        assert!(storage.get_data_names(ghost).unwrap_err().is_not_found());
    }

    #[test]
    fn close_after_node_deleted_fails() {
        let (storage, root) = setup();
        let node = storage
            .create_node(Some(root.id), "tmp", "Folder", "", 0, NodeGenericMetadata::new())
            .unwrap();
        let mut w = storage.write_binary_data(node.id, "late").unwrap();
        w.write_all(b"x").unwrap();
        storage.delete_node(node.id).unwrap();
        assert!(matches!(w.close(), Err(StorageError::NodeNotFound(_))));
    }

    #[test]
    fn remove_data_updates_names() {
        let (storage, root) = setup();
        write(&storage, root.id, "a", b"1");
        write(&storage, root.id, "b", b"2");
        assert!(storage.remove_data(root.id, "a").unwrap());
        assert!(!storage.remove_data(root.id, "a").unwrap());
        assert_eq!(storage.get_data_names(root.id).unwrap(), vec!["b"]);
        assert_eq!(storage.read_binary_data(root.id, "a").unwrap(), None);
    }

    #[test]
    fn end_to_end_delete_removes_attachments() {
        let (storage, root) = setup();
        let folder = storage
            .create_node(Some(root.id), "folder", "Folder", "", 0, NodeGenericMetadata::new())
            .unwrap();
        write(&storage, folder.id, "blob.bin", &[1, 2, 3]);
        assert_eq!(
            storage.read_binary_data(folder.id, "blob.bin").unwrap(),
            Some(vec![1, 2, 3])
        );

        storage.delete_node(folder.id).unwrap();
        assert!(storage.get_child_node(root.id, "folder").unwrap().is_none());
        let err = storage.read_binary_data(folder.id, "blob.bin").unwrap_err();
        assert!(matches!(err, StorageError::NodeNotFound(id) if id == folder.id));
    }
}

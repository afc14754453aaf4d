use crate::error::KvResult;

/// Named ordered byte maps with an explicit commit.
///
/// Implementations must satisfy these invariants:
/// - Writes are visible to readers of the same store immediately.
/// - Only committed writes survive a reopen of a durable store.
/// - `scan_prefix` returns entries in ascending key order.
/// - After `close`, every operation fails with `KvError::Closed`.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key` in `map`.
    fn get(&self, map: &str, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    /// Insert or overwrite `key` in `map`.
    fn put(&self, map: &str, key: &[u8], value: &[u8]) -> KvResult<()>;

    /// Remove `key` from `map`, returning the previous value.
    fn remove(&self, map: &str, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    fn contains(&self, map: &str, key: &[u8]) -> KvResult<bool> {
        Ok(self.get(map, key)?.is_some())
    }

    /// Every entry of `map` whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, map: &str, prefix: &[u8]) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Make every write since the last commit durable.
    fn commit(&self) -> KvResult<()>;

    /// Commit outstanding writes and release the backing resources.
    ///
    /// Closing an already closed store is a no-op.
    fn close(&self) -> KvResult<()>;
}

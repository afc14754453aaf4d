//! Journal-backed store.
//!
//! Writes are applied to in-memory maps at once and queued; `commit`
//! appends the queued batch to the journal as one frame. Opening a journal
//! replays every frame.
//!
//! On-journal format:
//! ```text
//! [4 bytes: magic "CNPJ"][4 bytes: format version (big-endian u32)]
//! then per commit:
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized Vec<JournalOp>)]
//! ```

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use memmap2::Mmap;
use tracing::{debug, error, info, warn};

use crate::config::{StorageConfig, SyncMode};
use crate::error::{KvError, KvResult};
use crate::tables::{JournalOp, Tables};
use crate::traits::KvStore;

const MAGIC: &[u8; 4] = b"CNPJ";

/// Current journal format version.
pub const JOURNAL_VERSION: u32 = 1;

/// Magic plus version.
const FILE_HEADER_SIZE: usize = 8;

/// Payload length plus CRC.
const FRAME_HEADER_SIZE: usize = 8;

fn encode_header() -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[..4].copy_from_slice(MAGIC);
    header[4..].copy_from_slice(&JOURNAL_VERSION.to_be_bytes());
    header
}

fn encode_frame(ops: &[JournalOp]) -> KvResult<Vec<u8>> {
    let payload = bincode::serialize(ops).map_err(|e| KvError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len()).map_err(|_| {
        KvError::Serialization(format!("batch of {} bytes exceeds the frame limit", payload.len()))
    })?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

struct Replay {
    /// Length of the intact prefix: header plus complete frames.
    valid_len: usize,
    frames: usize,
}

/// Apply every complete frame of `data` to `tables`.
///
/// An incomplete trailing frame is a torn write and ends the replay. A
/// complete frame that fails its checksum is an error.
fn replay(data: &[u8], tables: &mut Tables) -> KvResult<Replay> {
    if data.len() < FILE_HEADER_SIZE {
        if encode_header().starts_with(data) {
            if !data.is_empty() {
                warn!(len = data.len(), "torn journal header; starting empty");
            }
            return Ok(Replay {
                valid_len: 0,
                frames: 0,
            });
        }
        return Err(KvError::InvalidHeader {
            reason: format!("journal too short ({} bytes)", data.len()),
        });
    }
    if &data[..4] != MAGIC {
        return Err(KvError::InvalidHeader {
            reason: "bad magic".into(),
        });
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != JOURNAL_VERSION {
        return Err(KvError::UnsupportedVersion(version));
    }

    let mut offset = FILE_HEADER_SIZE;
    let mut frames = 0;
    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < FRAME_HEADER_SIZE {
            warn!(offset, remaining = rest.len(), "torn journal frame header; dropping tail");
            break;
        }
        let length = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let expected = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
        if rest.len() - FRAME_HEADER_SIZE < length {
            warn!(offset, length, remaining = rest.len(), "torn journal frame; dropping tail");
            break;
        }

        let payload = &rest[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + length];
        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(KvError::CrcMismatch {
                offset: offset as u64,
                expected,
                actual,
            });
        }
        let ops: Vec<JournalOp> =
            bincode::deserialize(payload).map_err(|e| KvError::Serialization(e.to_string()))?;
        for op in ops {
            tables.apply(op);
        }

        frames += 1;
        offset += FRAME_HEADER_SIZE + length;
    }

    Ok(Replay {
        valid_len: offset,
        frames,
    })
}

// ---------------------------------------------------------------------------
// HeapImage
// ---------------------------------------------------------------------------

/// A journal held in process memory.
///
/// Clones share the same bytes, so a store closed over one clone can be
/// reopened from another.
#[derive(Clone, Default)]
pub struct HeapImage(Arc<Mutex<Vec<u8>>>);

impl HeapImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the journal bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.lock().expect("lock poisoned").clone()
    }
}

/// Two images are equal when they share the same bytes.
impl PartialEq for HeapImage {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for HeapImage {}

impl std::fmt::Debug for HeapImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapImage").field("len", &self.len()).finish()
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Append target of a file journal.
trait JournalFile: Write + Send {
    /// Cut the file back to `len` bytes and position at its end.
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;

    fn sync(&mut self) -> io::Result<()>;
}

impl JournalFile for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

enum Sink {
    File {
        path: PathBuf,
        file: Box<dyn JournalFile>,
        /// End of the last fully appended frame.
        committed_len: u64,
        /// Set when a failed append could not be rolled back.
        poisoned: bool,
    },
    Heap(HeapImage),
}

impl Sink {
    /// Append one frame. On failure the journal is cut back to its last
    /// complete frame, so a retried commit starts on a frame boundary.
    fn append(&mut self, bytes: &[u8], sync_mode: SyncMode) -> KvResult<()> {
        match self {
            Sink::File {
                path,
                file,
                committed_len,
                poisoned,
            } => {
                if *poisoned {
                    return Err(KvError::Poisoned);
                }
                let written = write_frame(&mut **file, bytes, sync_mode);
                if let Err(e) = written {
                    if let Err(rollback) = file.truncate_to(*committed_len) {
                        *poisoned = true;
                        error!(
                            path = %path.display(),
                            error = %rollback,
                            "cannot roll back failed journal append"
                        );
                    } else {
                        warn!(
                            path = %path.display(),
                            len = *committed_len,
                            error = %e,
                            "journal append failed; rolled back"
                        );
                    }
                    return Err(e.into());
                }
                *committed_len += bytes.len() as u64;
            }
            Sink::Heap(image) => {
                image.0.lock().expect("lock poisoned").extend_from_slice(bytes);
            }
        }
        Ok(())
    }

    /// Replace the whole journal with `bytes`.
    fn replace(&mut self, bytes: Vec<u8>) -> KvResult<()> {
        match self {
            Sink::File {
                path,
                file,
                committed_len,
                poisoned,
            } => {
                let tmp = sibling_path(path, ".compact");
                {
                    let mut tmp_file = File::create(&tmp)?;
                    tmp_file.write_all(&bytes)?;
                    tmp_file.sync_all()?;
                }
                fs::rename(&tmp, &*path)?;
                let mut reopened = OpenOptions::new().read(true).write(true).open(&*path)?;
                reopened.seek(SeekFrom::End(0))?;
                *file = Box::new(reopened);
                *committed_len = bytes.len() as u64;
                *poisoned = false;
            }
            Sink::Heap(image) => {
                *image.0.lock().expect("lock poisoned") = bytes;
            }
        }
        Ok(())
    }
}

fn write_frame(file: &mut dyn JournalFile, bytes: &[u8], sync_mode: SyncMode) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    if sync_mode == SyncMode::EveryCommit {
        file.sync()?;
    }
    Ok(())
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// JournalKv
// ---------------------------------------------------------------------------

/// Durable store: ordered maps in memory, committed batches in a journal.
///
/// Lock order is `pending`, then `tables`, then `sink`.
pub struct JournalKv {
    tables: RwLock<Tables>,
    pending: Mutex<Vec<JournalOp>>,
    sink: Mutex<Sink>,
    sync_mode: SyncMode,
    compact_on_close: bool,
    closed: AtomicBool,
}

impl JournalKv {
    /// Open (or create) a journal file and replay it.
    ///
    /// A torn trailing frame is dropped and the file truncated to its last
    /// complete frame.
    pub fn open_file(path: &Path, config: &StorageConfig) -> KvResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len() as usize;

        let mut tables = Tables::default();
        let use_mmap = config.mmap_enabled() && file_len > 0;
        let outcome = if use_mmap {
            // SAFETY: the map is read-only and dropped before this handle
            // modifies the file.
            let map = unsafe { Mmap::map(&file)? };
            replay(&map, &mut tables)?
        } else {
            let mut data = Vec::with_capacity(file_len);
            file.read_to_end(&mut data)?;
            replay(&data, &mut tables)?
        };

        if outcome.valid_len < file_len {
            warn!(
                path = %path.display(),
                kept = outcome.valid_len,
                dropped = file_len - outcome.valid_len,
                "truncating torn journal tail"
            );
            file.set_len(outcome.valid_len as u64)?;
        }
        if outcome.valid_len == 0 {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&encode_header())?;
            file.sync_all()?;
        }
        let committed_len = file.seek(SeekFrom::End(0))?;

        info!(
            path = %path.display(),
            frames = outcome.frames,
            entries = tables.entry_count(),
            mmap = use_mmap,
            "journal opened"
        );

        Ok(Self::from_parts(
            tables,
            Sink::File {
                path: path.to_path_buf(),
                file: Box::new(file),
                committed_len,
                poisoned: false,
            },
            config,
        ))
    }

    /// Open a store over a heap image, replaying whatever it holds.
    pub fn open_heap(image: HeapImage, config: &StorageConfig) -> KvResult<Self> {
        let mut tables = Tables::default();
        let outcome = {
            let mut data = image.0.lock().expect("lock poisoned");
            let outcome = replay(&data, &mut tables)?;
            if outcome.valid_len < data.len() {
                warn!(
                    kept = outcome.valid_len,
                    dropped = data.len() - outcome.valid_len,
                    "truncating torn heap journal tail"
                );
                data.truncate(outcome.valid_len);
            }
            if outcome.valid_len == 0 {
                data.extend_from_slice(&encode_header());
            }
            outcome
        };

        info!(
            frames = outcome.frames,
            entries = tables.entry_count(),
            "heap journal opened"
        );

        Ok(Self::from_parts(tables, Sink::Heap(image), config))
    }

    fn from_parts(tables: Tables, sink: Sink, config: &StorageConfig) -> Self {
        Self {
            tables: RwLock::new(tables),
            pending: Mutex::new(Vec::new()),
            sink: Mutex::new(sink),
            sync_mode: config.sync_mode,
            compact_on_close: config.compact_on_close,
            closed: AtomicBool::new(false),
        }
    }

    /// The heap image backing this store, if it is heap-backed.
    pub fn heap_image(&self) -> Option<HeapImage> {
        match &*self.sink.lock().expect("lock poisoned") {
            Sink::Heap(image) => Some(image.clone()),
            Sink::File { .. } => None,
        }
    }

    /// The journal file path, if it is file-backed.
    pub fn path(&self) -> Option<PathBuf> {
        match &*self.sink.lock().expect("lock poisoned") {
            Sink::File { path, .. } => Some(path.clone()),
            Sink::Heap(_) => None,
        }
    }

    /// Number of writes not yet committed.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("lock poisoned").len()
    }

    /// Rewrite the journal as a single frame holding the live state.
    ///
    /// Uncommitted writes are part of the live state, so compaction also
    /// commits them.
    pub fn compact(&self) -> KvResult<()> {
        self.ensure_open()?;
        self.compact_inner()
    }

    fn compact_inner(&self) -> KvResult<()> {
        let mut pending = self.pending.lock().expect("lock poisoned");
        let tables = self.tables.read().expect("lock poisoned");
        let snapshot = tables.snapshot_ops();

        let mut bytes = encode_header().to_vec();
        if !snapshot.is_empty() {
            bytes.extend_from_slice(&encode_frame(&snapshot)?);
        }
        let len = bytes.len();
        self.sink.lock().expect("lock poisoned").replace(bytes)?;
        pending.clear();

        info!(entries = snapshot.len(), bytes = len, "journal compacted");
        Ok(())
    }

    fn commit_inner(&self) -> KvResult<()> {
        let mut pending = self.pending.lock().expect("lock poisoned");
        if pending.is_empty() {
            return Ok(());
        }
        let frame = encode_frame(&pending)?;
        self.sink
            .lock()
            .expect("lock poisoned")
            .append(&frame, self.sync_mode)?;
        debug!(ops = pending.len(), bytes = frame.len(), "journal commit");
        pending.clear();
        Ok(())
    }

    fn ensure_open(&self) -> KvResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(KvError::Closed)
        } else {
            Ok(())
        }
    }
}

impl KvStore for JournalKv {
    fn get(&self, map: &str, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.tables.read().expect("lock poisoned").get(map, key))
    }

    fn put(&self, map: &str, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.ensure_open()?;
        let mut pending = self.pending.lock().expect("lock poisoned");
        self.tables.write().expect("lock poisoned").put(map, key, value);
        pending.push(JournalOp::Put {
            map: map.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn remove(&self, map: &str, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        let mut pending = self.pending.lock().expect("lock poisoned");
        let old = self.tables.write().expect("lock poisoned").remove(map, key);
        if old.is_some() {
            pending.push(JournalOp::Remove {
                map: map.to_string(),
                key: key.to_vec(),
            });
        }
        Ok(old)
    }

    fn scan_prefix(&self, map: &str, prefix: &[u8]) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.ensure_open()?;
        Ok(self.tables.read().expect("lock poisoned").scan_prefix(map, prefix))
    }

    fn commit(&self) -> KvResult<()> {
        self.ensure_open()?;
        self.commit_inner()
    }

    fn close(&self) -> KvResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.commit_inner()?;
        if self.compact_on_close {
            self.compact_inner()?;
        }
        self.closed.store(true, Ordering::Release);
        info!("journal closed");
        Ok(())
    }
}

impl std::fmt::Debug for JournalKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.pending_len();
        let backing = match &*self.sink.lock().expect("lock poisoned") {
            Sink::File { path, .. } => path.display().to_string(),
            Sink::Heap(_) => "heap".to_string(),
        };
        f.debug_struct("JournalKv")
            .field("backing", &backing)
            .field("pending", &pending)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

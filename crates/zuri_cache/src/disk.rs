//! An embedded on-disk [`KvStore`].
//!
//! Every key is one object file under `<root>/objects/`. The file name is
//! the XXH3 hash of the key, and the file holds a small header followed by
//! the value:
//!
//! ```text
//! u32 LE header length | bincode ObjectHeader | value bytes
//! ```
//!
//! The header repeats the key, so the ordered in-memory index can be
//! rebuilt by reading headers when the store is opened. Writes go to a
//! temporary file that is synced and then renamed over the object, so a
//! reader sees either the old value or the new one. A `LOCK` file held with
//! an exclusive advisory lock keeps a second process from opening the same
//! directory.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use zuri_common::ContentHash;

use crate::error::StoreError;
use crate::store::{KvPair, KvStore};

/// Magic bytes identifying a Zuri store object.
const OBJECT_MAGIC: [u8; 4] = *b"ZURI";

/// Current object format version.
const OBJECT_FORMAT_VERSION: u32 = 1;

const OBJECTS_DIR: &str = "objects";
const LOCK_FILE: &str = "LOCK";
const OBJECT_EXT: &str = "obj";
const TEMP_EXT: &str = "tmp";

/// How often a blocked `open` retries the directory lock.
const LOCK_POLL: Duration = Duration::from_millis(10);

/// Header prepended to every stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectHeader {
    /// Must be `b"ZURI"`.
    magic: [u8; 4],
    /// Object format version.
    format_version: u32,
    /// The key this object stores.
    key: Vec<u8>,
    /// Checksum of the value bytes.
    checksum: ContentHash,
}

/// A [`KvStore`] persisted in a directory.
pub struct DiskStore {
    root: PathBuf,
    objects: PathBuf,
    /// Key to value length.
    index: RwLock<BTreeMap<Vec<u8>, u64>>,
    writer: Mutex<()>,
    _lock: File,
}

impl std::fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStore").field("root", &self.root).finish()
    }
}

impl DiskStore {
    /// Opens (or creates) the store in `root`.
    ///
    /// Waits up to `lock_timeout` for another process to release the
    /// directory lock. Leftover temporary files are removed and objects
    /// whose header is unreadable are dropped from the index.
    pub fn open(root: &Path, lock_timeout: Duration) -> Result<Self, StoreError> {
        let objects = root.join(OBJECTS_DIR);
        fs::create_dir_all(&objects).map_err(|e| StoreError::io(&objects, e))?;

        let lock_path = root.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::io(&lock_path, e))?;
        acquire_lock(&lock, lock_timeout)?;

        let index = rebuild_index(&objects)?;
        tracing::debug!(root = %root.display(), objects = index.len(), "opened disk store");
        Ok(Self {
            root: root.to_path_buf(),
            objects,
            index: RwLock::new(index),
            writer: Mutex::new(()),
            _lock: lock,
        })
    }

    /// The directory the store lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.read_index().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn object_path(&self, key: &[u8]) -> PathBuf {
        self.objects
            .join(format!("{}.{OBJECT_EXT}", ContentHash::from_bytes(key)))
    }

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<Vec<u8>, u64>> {
        self.index.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<Vec<u8>, u64>> {
        self.index.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_object(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.object_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let (header, payload) = decode_object(&raw).map_err(|reason| StoreError::Corrupt {
            reason: format!("{}: {reason}", path.display()),
        })?;
        if header.key != key {
            return Err(StoreError::Corrupt {
                reason: format!("{}: object belongs to a different key", path.display()),
            });
        }
        Ok(Some(payload.to_vec()))
    }
}

fn acquire_lock(lock: &File, timeout: Duration) -> Result<(), StoreError> {
    let start = Instant::now();
    loop {
        match lock.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(_) if start.elapsed() < timeout => std::thread::sleep(LOCK_POLL),
            Err(_) => {
                return Err(StoreError::Timeout {
                    operation: "lock store directory".to_string(),
                    waited: start.elapsed(),
                })
            }
        }
    }
}

fn rebuild_index(objects: &Path) -> Result<BTreeMap<Vec<u8>, u64>, StoreError> {
    let mut index = BTreeMap::new();
    let entries = fs::read_dir(objects).map_err(|e| StoreError::io(objects, e))?;
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(objects, e))?.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some(TEMP_EXT) => {
                tracing::debug!(path = %path.display(), "removing interrupted write");
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            }
            Some(OBJECT_EXT) => match read_header(&path) {
                Ok((header, len)) => {
                    index.insert(header.key, len);
                }
                Err(reason) => {
                    tracing::warn!(path = %path.display(), %reason, "skipping unreadable object");
                }
            },
            _ => {}
        }
    }
    Ok(index)
}

/// Reads only the header of an object file; returns it with the value length.
fn read_header(path: &Path) -> Result<(ObjectHeader, u64), String> {
    let mut file = File::open(path).map_err(|e| e.to_string())?;
    let total = file.metadata().map_err(|e| e.to_string())?.len();
    let mut len_bytes = [0u8; 4];
    file.read_exact(&mut len_bytes).map_err(|e| e.to_string())?;
    let header_len = u32::from_le_bytes(len_bytes) as u64;
    if total < 4 + header_len {
        return Err("truncated header".to_string());
    }
    let mut header_bytes = vec![0u8; header_len as usize];
    file.read_exact(&mut header_bytes).map_err(|e| e.to_string())?;
    let header = decode_header(&header_bytes)?;
    Ok((header, total - 4 - header_len))
}

fn decode_header(bytes: &[u8]) -> Result<ObjectHeader, String> {
    let (header, _): (ObjectHeader, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| e.to_string())?;
    if header.magic != OBJECT_MAGIC {
        return Err("bad magic".to_string());
    }
    if header.format_version != OBJECT_FORMAT_VERSION {
        return Err(format!(
            "object format version {} (expected {OBJECT_FORMAT_VERSION})",
            header.format_version
        ));
    }
    Ok(header)
}

fn encode_object(key: &[u8], value: &[u8]) -> Result<Vec<u8>, StoreError> {
    let header = ObjectHeader {
        magic: OBJECT_MAGIC,
        format_version: OBJECT_FORMAT_VERSION,
        key: key.to_vec(),
        checksum: ContentHash::from_bytes(value),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| StoreError::Corrupt {
            reason: format!("cannot encode object header: {e}"),
        })?;
    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + value.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(value);
    Ok(output)
}

fn decode_object(raw: &[u8]) -> Result<(ObjectHeader, &[u8]), String> {
    if raw.len() < 4 {
        return Err("truncated object".to_string());
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let Some(header_bytes) = raw.get(4..4 + header_len) else {
        return Err("truncated header".to_string());
    };
    let header = decode_header(header_bytes)?;
    let payload = &raw[4 + header_len..];
    if ContentHash::from_bytes(payload) != header.checksum {
        return Err("checksum mismatch".to_string());
    }
    Ok((header, payload))
}

impl KvStore for DiskStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if !self.read_index().contains_key(key) {
            return Ok(None);
        }
        self.read_object(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let bytes = encode_object(key, value)?;
        let path = self.object_path(key);
        let temp = path.with_extension(TEMP_EXT);

        let _writer = self.lock_writer();
        let mut file = File::create(&temp).map_err(|e| StoreError::io(&temp, e))?;
        file.write_all(&bytes).map_err(|e| StoreError::io(&temp, e))?;
        file.sync_all().map_err(|e| StoreError::io(&temp, e))?;
        drop(file);
        fs::rename(&temp, &path).map_err(|e| StoreError::io(&path, e))?;
        self.write_index().insert(key.to_vec(), value.len() as u64);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(key);
        let _writer = self.lock_writer();
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&path, e)),
        }
        self.write_index().remove(key);
        Ok(())
    }

    fn scan(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>, StoreError> {
        let upper = match end {
            Some(end) if end < start => return Ok(Vec::new()),
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let keys: Vec<Vec<u8>> = self
            .read_index()
            .range::<[u8], _>((Bound::Included(start), upper))
            .map(|(k, _)| k.clone())
            .collect();
        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            // A concurrent delete may have removed the object since the
            // index was read.
            if let Some(value) = self.read_object(&key)? {
                pairs.push((key, value));
            }
        }
        Ok(pairs)
    }

    fn flush(&self) -> Result<(), StoreError> {
        let _writer = self.lock_writer();
        sync_dir(&self.objects)
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| StoreError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

//! Cache entries and their layout in the store.
//!
//! Each fingerprint owns two keys: `meta/<fp>` holds the bincode-encoded
//! [`EntryMeta`] and `artifact/<fp>` holds the payload. The artifact is
//! written before the meta and deleted after it, so an entry whose meta is
//! visible always has a complete artifact.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use zuri_common::{ContentHash, Fingerprint};

/// Key prefix of entry metadata.
pub const META_PREFIX: &str = "meta/";
/// Key prefix of entry payloads.
pub const ARTIFACT_PREFIX: &str = "artifact/";

pub(crate) fn meta_key(fp: &Fingerprint) -> Vec<u8> {
    format!("{META_PREFIX}{fp}").into_bytes()
}

pub(crate) fn artifact_key(fp: &Fingerprint) -> Vec<u8> {
    format!("{ARTIFACT_PREFIX}{fp}").into_bytes()
}

/// Parses the fingerprint out of a `meta/<fp>` key.
pub(crate) fn fingerprint_of_meta_key(key: &[u8]) -> Option<Fingerprint> {
    let text = std::str::from_utf8(key).ok()?;
    text.strip_prefix(META_PREFIX)?.parse().ok()
}

/// Bookkeeping stored next to every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Seconds since the Unix epoch when the entry was inserted.
    pub created_at: u64,
    /// Version of the toolchain that produced the payload.
    pub compiler_version: String,
    /// Schema version tag read from the payload, when it carries one.
    pub schema_version: Option<u16>,
    /// Payload length in bytes.
    pub size: u64,
    /// Checksum of the payload.
    pub checksum: ContentHash,
}

impl EntryMeta {
    pub(crate) fn describe(payload: &[u8], compiler_version: &str, now: SystemTime) -> Self {
        Self {
            created_at: unix_seconds(now),
            compiler_version: compiler_version.to_string(),
            schema_version: zuri_ir::peek_schema_version(payload).ok(),
            size: payload.len() as u64,
            checksum: ContentHash::from_bytes(payload),
        }
    }

    /// Age of the entry at `now`. Entries from the future have age zero.
    pub fn age(&self, now: SystemTime) -> Duration {
        Duration::from_secs(unix_seconds(now).saturating_sub(self.created_at))
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, String> {
        bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(|e| e.to_string())
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, String> {
        let (meta, read): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| e.to_string())?;
        if read != bytes.len() {
            return Err("trailing bytes after entry metadata".to_string());
        }
        Ok(meta)
    }
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A payload read back from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The fingerprint the entry is stored under.
    pub fingerprint: Fingerprint,
    /// The payload, normally a serialized IR module.
    pub bytes: Vec<u8>,
    /// The entry's metadata.
    pub meta: EntryMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_fingerprint() {
        let fp = Fingerprint::from_raw([0x1f; 16]);
        let key = meta_key(&fp);
        assert!(key.starts_with(b"meta/1f1f"));
        assert_eq!(fingerprint_of_meta_key(&key), Some(fp));
        assert_eq!(fingerprint_of_meta_key(&artifact_key(&fp)), None);
        assert_eq!(fingerprint_of_meta_key(b"meta/zz"), None);
    }

    #[test]
    fn meta_reads_schema_tag() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        let meta = EntryMeta::describe(&[1, 0, b'Z', b'R', b'I', b'R'], "0.1.0", now);
        assert_eq!(meta.schema_version, Some(1));
        assert_eq!(meta.size, 6);
        assert_eq!(meta.created_at, 1_000);
        assert_eq!(meta.age(now + Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(meta.age(UNIX_EPOCH), Duration::ZERO);

        let short = EntryMeta::describe(&[7], "0.1.0", now);
        assert_eq!(short.schema_version, None);
    }

    #[test]
    fn meta_codec_rejects_trailing_bytes() {
        let meta = EntryMeta::describe(b"abc", "0.1.0", SystemTime::now());
        let mut bytes = meta.encode().unwrap();
        assert_eq!(EntryMeta::decode(&bytes).unwrap(), meta);
        bytes.push(0);
        assert!(EntryMeta::decode(&bytes).is_err());
    }
}

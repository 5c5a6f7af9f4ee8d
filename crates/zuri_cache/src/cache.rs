//! The content-addressed artifact cache.
//!
//! [`ArtifactCache`] maps fingerprints to serialized IR on top of any
//! [`KvStore`]. It is an explicitly owned value: open one per process (or
//! per test), share it by reference or `Arc`, and [`close`](ArtifactCache::close)
//! it at shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use zuri_common::{CancellationToken, ContentHash, Fingerprint, COMPILER_VERSION};

use crate::entry::{
    artifact_key, fingerprint_of_meta_key, meta_key, CacheEntry, EntryMeta, META_PREFIX,
};
use crate::error::{CacheError, StoreError};
use crate::flight::{Flight, Flights, Role};
use crate::retry::RetryPolicy;
use crate::store::{KvStore, WriteBatch};

/// Tuning knobs of an [`ArtifactCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Version recorded in the metadata of new entries.
    pub compiler_version: String,
    /// How long a caller waits for another caller's build.
    pub wait_timeout: Duration,
    /// Retry policy for transient store errors.
    pub retry: RetryPolicy,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            compiler_version: COMPILER_VERSION.to_string(),
            wait_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of [`ArtifactCache::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The entry was written.
    Inserted,
    /// An identical entry was already stored; nothing was written.
    AlreadyPresent,
}

/// Which entries [`ArtifactCache::evict`] removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Remove least recently used entries until the payloads fit.
    pub max_bytes: Option<u64>,
    /// Remove entries older than this.
    pub max_age: Option<Duration>,
}

/// What an eviction pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Entries examined.
    pub scanned: usize,
    /// Entries removed, in removal order.
    pub removed: Vec<Fingerprint>,
    /// Payload bytes freed.
    pub bytes_freed: u64,
    /// Payload bytes still stored.
    pub bytes_remaining: u64,
    /// Entries the policy selected but that were pinned or in flight.
    pub protected: usize,
}

/// Counters since the cache was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Builds run by a single-flight leader.
    pub builds: u64,
    /// Callers that received another caller's build.
    pub joins: u64,
    /// Entries written.
    pub inserts: u64,
    /// Entries removed by eviction.
    pub evictions: u64,
}

/// Number and size of stored entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheUsage {
    /// Stored entries.
    pub entries: usize,
    /// Sum of payload sizes.
    pub bytes: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    joins: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

type PinTable = Mutex<HashMap<Fingerprint, usize>>;

fn lock_pins(pins: &PinTable) -> MutexGuard<'_, HashMap<Fingerprint, usize>> {
    pins.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps a fingerprint safe from eviction while alive.
#[must_use = "the pin is released when the guard is dropped"]
pub struct PinGuard {
    pins: Arc<PinTable>,
    fingerprint: Fingerprint,
}

impl PinGuard {
    /// The pinned fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        let mut pins = lock_pins(&self.pins);
        if let Some(count) = pins.get_mut(&self.fingerprint) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&self.fingerprint);
            }
        }
    }
}

impl std::fmt::Debug for PinGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PinGuard").field(&self.fingerprint).finish()
    }
}

/// A persistent map from [`Fingerprint`] to serialized IR.
///
/// * Inserts are idempotent; a second insert with different bytes fails
///   with [`CacheError::Corruption`].
/// * Writes are serialized, so the first writer's bytes are the ones every
///   later reader observes.
/// * [`get_or_build`](Self::get_or_build) runs at most one build per
///   fingerprint at a time.
/// * Eviction skips pinned and in-flight fingerprints.
pub struct ArtifactCache {
    store: Arc<dyn KvStore>,
    options: CacheOptions,
    writer: Mutex<()>,
    flights: Flights,
    pins: Arc<PinTable>,
    /// Logical time of the last access per fingerprint.
    access: Mutex<HashMap<Fingerprint, u64>>,
    clock: AtomicU64,
    counters: Counters,
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ArtifactCache {
    /// Opens a cache over `store`.
    pub fn open(store: Arc<dyn KvStore>, options: CacheOptions) -> Result<Self, CacheError> {
        let cache = Self {
            store,
            options,
            writer: Mutex::new(()),
            flights: Flights::default(),
            pins: Arc::new(Mutex::new(HashMap::new())),
            access: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        };
        let usage = cache.usage()?;
        tracing::debug!(
            entries = usage.entries,
            bytes = usage.bytes,
            "opened artifact cache"
        );
        Ok(cache)
    }

    /// The options the cache was opened with.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    fn retry<T>(
        &self,
        operation: &str,
        op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, CacheError> {
        self.options.retry.run(operation, op)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn touch(&self, fp: Fingerprint) {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        self.access
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(fp, tick);
    }

    fn corrupt(fp: Fingerprint, reason: impl Into<String>) -> CacheError {
        CacheError::CorruptEntry {
            fingerprint: fp,
            reason: reason.into(),
        }
    }

    /// Reads and decodes the metadata of `fp`, if stored.
    fn read_meta(&self, fp: Fingerprint) -> Result<Option<EntryMeta>, CacheError> {
        let key = meta_key(&fp);
        let raw = self
            .retry("get meta", || self.store.get(&key))
            .map_err(|e| reclassify(fp, e))?;
        match raw {
            None => Ok(None),
            Some(raw) => EntryMeta::decode(&raw)
                .map(Some)
                .map_err(|reason| Self::corrupt(fp, format!("unreadable metadata: {reason}"))),
        }
    }

    /// Looks up the entry for `fp`.
    ///
    /// Returns `Ok(None)` on a miss. A stored entry that fails validation is
    /// [`CacheError::CorruptEntry`].
    pub fn lookup(&self, fp: Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let Some(meta) = self.read_meta(fp)? else {
            bump(&self.counters.misses);
            tracing::debug!(fingerprint = %fp.short(), "cache miss");
            return Ok(None);
        };
        let key = artifact_key(&fp);
        let bytes = self
            .retry("get artifact", || self.store.get(&key))
            .map_err(|e| reclassify(fp, e))?
            .ok_or_else(|| Self::corrupt(fp, "metadata present but artifact missing"))?;
        if bytes.len() as u64 != meta.size || ContentHash::from_bytes(&bytes) != meta.checksum {
            return Err(Self::corrupt(fp, "artifact does not match its checksum"));
        }
        bump(&self.counters.hits);
        self.touch(fp);
        tracing::debug!(fingerprint = %fp.short(), size = meta.size, "cache hit");
        Ok(Some(CacheEntry {
            fingerprint: fp,
            bytes,
            meta,
        }))
    }

    /// Whether an entry for `fp` is stored.
    pub fn contains(&self, fp: Fingerprint) -> Result<bool, CacheError> {
        Ok(self.read_meta(fp)?.is_some())
    }

    /// Stores `bytes` under `fp`.
    ///
    /// Inserting the bytes already stored is a no-op. Inserting different
    /// bytes fails with [`CacheError::Corruption`] and leaves the stored
    /// entry untouched.
    pub fn insert(
        &self,
        fp: Fingerprint,
        bytes: &[u8],
        compiler_version: &str,
    ) -> Result<InsertOutcome, CacheError> {
        let meta = EntryMeta::describe(bytes, compiler_version, SystemTime::now());
        let _writer = self.lock_writer();
        match self.read_meta(fp) {
            Ok(Some(existing)) => {
                if existing.checksum == meta.checksum && existing.size == meta.size {
                    return Ok(InsertOutcome::AlreadyPresent);
                }
                tracing::error!(
                    fingerprint = %fp,
                    existing = %existing.checksum,
                    attempted = %meta.checksum,
                    "fingerprint inserted with different bytes"
                );
                return Err(CacheError::Corruption {
                    fingerprint: fp,
                    existing: existing.checksum,
                    attempted: meta.checksum,
                });
            }
            Ok(None) => {}
            Err(CacheError::CorruptEntry { reason, .. }) => {
                tracing::warn!(fingerprint = %fp, %reason, "overwriting unreadable entry");
            }
            Err(other) => return Err(other),
        }

        let encoded = meta
            .encode()
            .map_err(|reason| Self::corrupt(fp, format!("cannot encode metadata: {reason}")))?;
        let mut batch = WriteBatch::new();
        batch.put(artifact_key(&fp), bytes).put(meta_key(&fp), encoded);
        self.retry("insert", || self.store.apply(&batch))?;
        bump(&self.counters.inserts);
        self.touch(fp);
        tracing::debug!(fingerprint = %fp.short(), size = meta.size, "cache insert");
        Ok(InsertOutcome::Inserted)
    }

    /// Removes the entry for `fp`. Returns whether one was stored.
    pub fn remove(&self, fp: Fingerprint) -> Result<bool, CacheError> {
        let _writer = self.lock_writer();
        self.remove_locked(fp)
    }

    fn remove_locked(&self, fp: Fingerprint) -> Result<bool, CacheError> {
        let meta = meta_key(&fp);
        let existed = self.retry("get meta", || self.store.get(&meta))?.is_some();
        let mut batch = WriteBatch::new();
        batch.delete(meta).delete(artifact_key(&fp));
        self.retry("remove", || self.store.apply(&batch))?;
        self.access
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&fp);
        tracing::debug!(fingerprint = %fp.short(), existed, "cache remove");
        Ok(existed)
    }

    /// Pins `fp` until the returned guard is dropped.
    pub fn pin(&self, fp: Fingerprint) -> PinGuard {
        *lock_pins(&self.pins).entry(fp).or_insert(0) += 1;
        PinGuard {
            pins: self.pins.clone(),
            fingerprint: fp,
        }
    }

    /// Whether `fp` is pinned.
    pub fn is_pinned(&self, fp: Fingerprint) -> bool {
        lock_pins(&self.pins).contains_key(&fp)
    }

    /// Checks pins and flights together, releasing both before returning.
    /// A build that starts after the check cannot insert until the writer
    /// lock held by the caller is released.
    fn is_protected(&self, fp: Fingerprint) -> bool {
        let flights = self.flights.lock();
        let pins = lock_pins(&self.pins);
        flights.contains_key(&fp) || pins.contains_key(&fp)
    }

    /// Whether a build for `fp` is in flight.
    pub fn is_in_flight(&self, fp: Fingerprint) -> bool {
        self.flights.is_in_flight(&fp)
    }

    /// Runs `build` unless a build for `fp` is already running, in which
    /// case the caller waits (up to the configured timeout) and receives
    /// that build's value.
    ///
    /// A caller whose token is already cancelled returns
    /// [`CacheError::Cancelled`] without touching the slot. `build` returns
    /// `None` to abandon the slot, e.g. after a cancellation checkpoint;
    /// waiting callers then retry and one of them leads.
    pub fn get_or_build<T, F>(
        &self,
        fp: Fingerprint,
        cancel: &CancellationToken,
        build: F,
    ) -> Result<Flight<T>, CacheError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Option<T>,
    {
        let flight = self
            .flights
            .run(fp, cancel, self.options.wait_timeout, build)?;
        match flight.role {
            Role::Leader => bump(&self.counters.builds),
            Role::Waiter => bump(&self.counters.joins),
        }
        Ok(flight)
    }

    /// Number and total size of stored entries.
    pub fn usage(&self) -> Result<CacheUsage, CacheError> {
        let entries = self.scan_entries()?;
        Ok(CacheUsage {
            entries: entries.len(),
            bytes: entries
                .iter()
                .map(|(_, meta)| meta.as_ref().map_or(0, |m| m.size))
                .sum(),
        })
    }

    /// Every stored fingerprint with its metadata, `None` when unreadable.
    fn scan_entries(&self) -> Result<Vec<(Fingerprint, Option<EntryMeta>)>, CacheError> {
        let pairs = self.retry("scan", || self.store.scan_prefix(META_PREFIX.as_bytes()))?;
        Ok(pairs
            .into_iter()
            .filter_map(|(key, value)| {
                let fp = fingerprint_of_meta_key(&key)?;
                Some((fp, EntryMeta::decode(&value).ok()))
            })
            .collect())
    }

    /// Applies `policy` at the current time.
    pub fn evict(&self, policy: EvictionPolicy) -> Result<EvictionReport, CacheError> {
        self.evict_at(policy, SystemTime::now())
    }

    /// Applies `policy` as if the current time were `now`.
    ///
    /// Entries with unreadable metadata and entries older than
    /// `max_age` go first. Then, while the stored payloads exceed
    /// `max_bytes`, entries are removed least recently used first: entries
    /// not accessed by this process come before accessed ones, ties broken
    /// by creation time. Fingerprints pinned or in flight when their entry
    /// is reached are skipped. The pin and flight tables are only locked for
    /// that check, never across store I/O.
    pub fn evict_at(
        &self,
        policy: EvictionPolicy,
        now: SystemTime,
    ) -> Result<EvictionReport, CacheError> {
        let _writer = self.lock_writer();
        let mut entries = self.scan_entries()?;
        let access = self
            .access
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        entries.sort_by_key(|(fp, meta)| {
            (
                meta.is_some(),
                access.get(fp).copied(),
                meta.as_ref().map_or(0, |m| m.created_at),
                *fp,
            )
        });

        let size = |meta: &Option<EntryMeta>| meta.as_ref().map_or(0, |m| m.size);
        let mut report = EvictionReport {
            scanned: entries.len(),
            bytes_remaining: entries.iter().map(|(_, m)| size(m)).sum(),
            ..EvictionReport::default()
        };
        for (fp, meta) in &entries {
            let expired = match (meta, policy.max_age) {
                (None, _) => true,
                (Some(meta), Some(max_age)) => meta.age(now) > max_age,
                (Some(_), None) => false,
            };
            let over_budget = policy
                .max_bytes
                .is_some_and(|max| report.bytes_remaining > max);
            if !expired && !over_budget {
                continue;
            }

            if self.is_protected(*fp) {
                report.protected += 1;
                continue;
            }
            self.remove_locked(*fp)?;

            bump(&self.counters.evictions);
            report.removed.push(*fp);
            report.bytes_freed += size(meta);
            report.bytes_remaining -= size(meta);
            tracing::warn!(fingerprint = %fp.short(), expired, "evicted cache entry");
        }
        tracing::info!(
            scanned = report.scanned,
            removed = report.removed.len(),
            freed = report.bytes_freed,
            protected = report.protected,
            "eviction finished"
        );
        Ok(report)
    }

    /// Removes every entry that is not pinned or in flight.
    pub fn clear(&self) -> Result<EvictionReport, CacheError> {
        self.evict(EvictionPolicy {
            max_bytes: Some(0),
            max_age: None,
        })
    }

    /// A snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            builds: load(&self.counters.builds),
            joins: load(&self.counters.joins),
            inserts: load(&self.counters.inserts),
            evictions: load(&self.counters.evictions),
        }
    }

    /// Flushes the store and closes the cache.
    pub fn close(self) -> Result<(), CacheError> {
        self.retry("flush", || self.store.flush())?;
        tracing::debug!(stats = ?self.stats(), "closed artifact cache");
        Ok(())
    }
}

/// Store corruption under an entry's key is a corrupt entry.
fn reclassify(fp: Fingerprint, err: CacheError) -> CacheError {
    match err {
        CacheError::Store(StoreError::Corrupt { reason }) => CacheError::CorruptEntry {
            fingerprint: fp,
            reason,
        },
        other => other,
    }
}

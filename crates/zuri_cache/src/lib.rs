//! Content-addressed caching of compiled IR.
//!
//! The [`ArtifactCache`] maps build [`Fingerprint`](zuri_common::Fingerprint)s
//! to serialized IR modules. It runs on top of any ordered [`KvStore`]:
//! [`DiskStore`] for real builds, [`MemoryStore`] for tests and scratch
//! sessions. Besides lookups and idempotent inserts it provides the
//! single-flight primitive that keeps concurrent compilations of the same
//! fingerprint from duplicating work, and an eviction pass that never
//! removes pinned or in-flight entries.

#![warn(missing_docs)]

pub mod cache;
pub mod disk;
pub mod entry;
pub mod error;
pub mod flight;
pub mod memory;
pub mod retry;
pub mod store;

pub use cache::{
    ArtifactCache, CacheOptions, CacheStats, CacheUsage, EvictionPolicy, EvictionReport,
    InsertOutcome, PinGuard,
};
pub use disk::DiskStore;
pub use entry::{CacheEntry, EntryMeta};
pub use error::{CacheError, StoreError};
pub use flight::{Flight, Role};
pub use memory::MemoryStore;
pub use retry::RetryPolicy;
pub use store::{BatchOp, KvPair, KvStore, WriteBatch};

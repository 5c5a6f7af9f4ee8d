//! Opaque identifier for source units registered in a [`SourceDb`](crate::SourceDb).

use serde::{Deserialize, Serialize};

/// Index of a unit inside the session's [`SourceDb`](crate::SourceDb).
///
/// File ids depend on load order, so they never leave the session: nothing
/// persisted (IR, cache entries) refers to them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct FileId(u32);

impl FileId {
    /// A dummy file ID for spans with no backing source.
    pub const DUMMY: FileId = FileId(u32::MAX);

    /// Creates a `FileId` from a raw `u32` value.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` value of this `FileId`.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

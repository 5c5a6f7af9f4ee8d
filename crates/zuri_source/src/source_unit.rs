//! The immutable text of one module.

use crate::module_id::ModuleId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zuri_common::ContentHash;

/// The largest source a unit may hold. Spans store byte offsets as `u32`,
/// and the end of the last token is the text length.
pub const MAX_SOURCE_LEN: usize = u32::MAX as usize;

/// A source too long for `u32` byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} is {len} bytes; sources are limited to {max} bytes", .path.display(), max = MAX_SOURCE_LEN)]
pub struct SourceTooLarge {
    /// The path of the rejected source.
    pub path: PathBuf,
    /// Its length in bytes.
    pub len: u64,
}

/// Fails when `len` bytes cannot be addressed by a [`Span`](crate::Span).
pub fn check_source_len(path: &Path, len: u64) -> Result<(), SourceTooLarge> {
    if len > MAX_SOURCE_LEN as u64 {
        return Err(SourceTooLarge {
            path: path.to_path_buf(),
            len,
        });
    }
    Ok(())
}

/// An immutable source buffer plus the module id and path it came from.
///
/// Cloning is cheap: the text is shared.
#[derive(Clone, Debug)]
pub struct SourceUnit {
    module: ModuleId,
    path: PathBuf,
    text: Arc<str>,
    content_hash: ContentHash,
}

impl SourceUnit {
    /// Creates a unit from its module id, display path and text.
    pub fn new(
        module: ModuleId,
        path: impl Into<PathBuf>,
        text: impl Into<Arc<str>>,
    ) -> Result<Self, SourceTooLarge> {
        let path = path.into();
        let text = text.into();
        check_source_len(&path, text.len() as u64)?;
        let content_hash = ContentHash::from_bytes(text.as_bytes());
        Ok(Self {
            module,
            path,
            text,
            content_hash,
        })
    }

    /// The module this unit defines.
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// The path used in diagnostics (a real file or a synthetic name).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The full source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// XXH3 hash of the text.
    pub fn content_hash(&self) -> ContentHash {
        self.content_hash
    }
}

//! Error types for store backends and the artifact cache.

use std::path::PathBuf;
use std::time::Duration;

use zuri_common::{ContentHash, Fingerprint, InternalError};
use zuri_diagnostics::{Diagnostic, DiagnosticCode, Stage};

/// Errors raised by a [`KvStore`](crate::KvStore) backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store cannot serve the request right now. Retrying may succeed.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Why the store refused the request.
        reason: String,
    },

    /// An operation did not complete within its time limit.
    #[error("store operation `{operation}` timed out after {waited:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// An I/O error the store cannot recover from.
    #[error("store I/O error at {path}: {reason}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error, rendered.
        reason: String,
    },

    /// A stored object failed validation.
    #[error("corrupt object in store: {reason}")]
    Corrupt {
        /// What failed.
        reason: String,
    },
}

impl StoreError {
    /// Whether the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. } | StoreError::Timeout { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::TimedOut => {
                StoreError::Unavailable {
                    reason: err.to_string(),
                }
            }
            _ => StoreError::Io {
                path: path.into(),
                reason: err.to_string(),
            },
        }
    }
}

/// Errors raised by the [`ArtifactCache`](crate::ArtifactCache).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// A fingerprint was inserted twice with different payloads.
    ///
    /// Equal fingerprints must always denote equal payloads. This error means
    /// compilation was not a pure function of its inputs and the build stops.
    #[error(
        "cache corruption: fingerprint {fingerprint} already maps to payload {existing}, \
         refusing payload {attempted}"
    )]
    Corruption {
        /// The fingerprint that was inserted twice.
        fingerprint: Fingerprint,
        /// Checksum of the payload already stored.
        existing: ContentHash,
        /// Checksum of the rejected payload.
        attempted: ContentHash,
    },

    /// A stored entry failed validation on read.
    #[error("corrupt cache entry {fingerprint}: {reason}")]
    CorruptEntry {
        /// The entry's fingerprint.
        fingerprint: Fingerprint,
        /// What failed.
        reason: String,
    },

    /// A store operation or a wait on another build timed out.
    #[error("timed out after {waited:?} during {operation}")]
    Timeout {
        /// What the caller was waiting for.
        operation: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// The store stayed unavailable after every retry.
    #[error("cache store unavailable after {attempts} attempt(s): {reason}")]
    StoreUnavailable {
        /// How many attempts were made.
        attempts: u32,
        /// The last failure.
        reason: String,
    },

    /// A non-transient store failure.
    #[error(transparent)]
    Store(StoreError),

    /// The caller cancelled before the build slot was acquired, or the
    /// build it led was abandoned.
    #[error("cancelled")]
    Cancelled,

    /// A toolchain bug.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl CacheError {
    /// Whether the caller may retry the operation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CacheError::Timeout { .. } | CacheError::StoreUnavailable { .. }
        )
    }

    /// The diagnostic code for this error.
    pub fn code(&self) -> DiagnosticCode {
        let number = match self {
            CacheError::Corruption { .. } => 3,
            CacheError::CorruptEntry { .. } => 4,
            CacheError::Timeout { .. } => 5,
            CacheError::StoreUnavailable { .. } => 6,
            CacheError::Store(_) => 7,
            CacheError::Cancelled => 8,
            CacheError::Internal(_) => 99,
        };
        DiagnosticCode::new(Stage::Cache, number)
    }

    /// Converts this error into a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.code(), self.to_string());
        match self {
            CacheError::Corruption { .. } => diagnostic
                .with_note("equal fingerprints produced different IR; this is a toolchain bug"),
            CacheError::CorruptEntry { .. } => {
                diagnostic.with_note("run `zuri cache evict` or `zuri cache clear` to drop it")
            }
            _ => diagnostic,
        }
    }

    /// Converts a store error that survived retrying.
    pub(crate) fn from_store(err: StoreError, attempts: u32) -> Self {
        match err {
            StoreError::Unavailable { reason } => CacheError::StoreUnavailable { attempts, reason },
            StoreError::Timeout { operation, waited } => CacheError::Timeout { operation, waited },
            other => CacheError::Store(other),
        }
    }
}

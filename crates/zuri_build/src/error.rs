//! Failures of a compilation request.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use zuri_cache::{CacheError, StoreError};
use zuri_common::InternalError;
use zuri_diagnostics::{Diagnostic, DiagnosticCode, Stage};
use zuri_ir::SchemaError;
use zuri_lower::SemanticError;
use zuri_source::{ModuleId, Span};
use zuri_syntax::SyntaxError;

/// A cycle in the import graph.
///
/// `members` lists every module of the strongly connected component,
/// starting with the first one discovered and following imports from there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct DependencyCycleError {
    /// Members of the cycle in path order.
    pub members: Vec<ModuleId>,
}

impl fmt::Display for DependencyCycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle: ")?;
        for member in &self.members {
            write!(f, "{member} -> ")?;
        }
        match self.members.first() {
            Some(first) => write!(f, "{first}"),
            None => write!(f, "(empty)"),
        }
    }
}

/// Why a module could not be compiled.
///
/// Errors are `Clone` because callers that joined an in-flight build
/// receive a copy of the leader's result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// The module does not parse.
    #[error("{module}: {error}")]
    Syntax {
        /// The failing module.
        module: ModuleId,
        /// The parser's error.
        error: SyntaxError,
    },

    /// The module parses but does not lower.
    #[error("{module}: {error}")]
    Semantic {
        /// The failing module.
        module: ModuleId,
        /// The lowering error.
        error: SemanticError,
    },

    /// IR could not be encoded.
    #[error("{module}: {error}")]
    Schema {
        /// The failing module.
        module: ModuleId,
        /// The codec error.
        error: SchemaError,
    },

    /// The cache holds a different payload under this module's fingerprint.
    #[error("{module}: {error}")]
    CacheCorruption {
        /// The failing module.
        module: ModuleId,
        /// The cache's report.
        error: CacheError,
    },

    /// The import graph contains a cycle.
    #[error(transparent)]
    DependencyCycle(#[from] DependencyCycleError),

    /// No source exists for an imported or requested module.
    #[error("module '{module}' not found")]
    NotFound {
        /// The missing module.
        module: ModuleId,
        /// The module whose import named it, with the import's span.
        importer: Option<(ModuleId, Span)>,
        /// Where the provider looked.
        searched: Vec<PathBuf>,
    },

    /// The source exists but could not be read.
    #[error("failed to read module '{module}': {reason}")]
    Source {
        /// The module.
        module: ModuleId,
        /// The provider's error message.
        reason: String,
    },

    /// A dependency failed, so this module was not attempted.
    #[error("{module}: dependency '{dependency}' failed to compile")]
    DependencyFailed {
        /// The module that was skipped.
        module: ModuleId,
        /// The failed direct dependency.
        dependency: ModuleId,
    },

    /// Waiting on the cache or on another build took too long.
    #[error("{module}: timed out after {waited:?} during {operation}")]
    Timeout {
        /// The module.
        module: ModuleId,
        /// What was being waited on.
        operation: String,
        /// How long the request waited.
        waited: Duration,
    },

    /// The cache store could not be reached.
    #[error("{module}: cache store unavailable: {reason}")]
    StoreUnavailable {
        /// The module.
        module: ModuleId,
        /// The store's last error.
        reason: String,
    },

    /// The request was cancelled.
    #[error("{module}: compilation cancelled")]
    Cancelled {
        /// The module.
        module: ModuleId,
    },

    /// A toolchain bug.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

const fn build_code(number: u16) -> DiagnosticCode {
    DiagnosticCode::new(Stage::Build, number)
}

impl CompileError {
    /// Maps a cache failure met while compiling `module`.
    pub fn from_cache(module: &ModuleId, error: CacheError) -> Self {
        let module = module.clone();
        match error {
            CacheError::Corruption { .. } | CacheError::CorruptEntry { .. } => {
                CompileError::CacheCorruption { module, error }
            }
            CacheError::Timeout { operation, waited } => CompileError::Timeout {
                module,
                operation,
                waited,
            },
            CacheError::StoreUnavailable { reason, .. } => {
                CompileError::StoreUnavailable { module, reason }
            }
            CacheError::Store(StoreError::Timeout { operation, waited }) => CompileError::Timeout {
                module,
                operation,
                waited,
            },
            CacheError::Store(store) => CompileError::StoreUnavailable {
                module,
                reason: store.to_string(),
            },
            CacheError::Cancelled => CompileError::Cancelled { module },
            CacheError::Internal(internal) => CompileError::Internal(internal),
        }
    }

    /// The module the error is attributed to, when there is one.
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            CompileError::Syntax { module, .. }
            | CompileError::Semantic { module, .. }
            | CompileError::Schema { module, .. }
            | CompileError::CacheCorruption { module, .. }
            | CompileError::NotFound { module, .. }
            | CompileError::Source { module, .. }
            | CompileError::DependencyFailed { module, .. }
            | CompileError::Timeout { module, .. }
            | CompileError::StoreUnavailable { module, .. }
            | CompileError::Cancelled { module } => Some(module),
            CompileError::DependencyCycle(cycle) => cycle.members.first(),
            CompileError::Internal(_) => None,
        }
    }

    /// Whether the error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CompileError::Cancelled { .. })
    }

    /// Whether the error is a syntax error that more input could fix.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, CompileError::Syntax { error, .. } if error.is_incomplete())
    }

    /// Converts the error into a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CompileError::Syntax { error, .. } => error.to_diagnostic(),
            CompileError::Semantic { error, .. } => error.to_diagnostic(),
            CompileError::Schema { module, error } => error
                .to_diagnostic()
                .with_note(format!("while compiling module '{module}'")),
            CompileError::CacheCorruption { error, .. } => error.to_diagnostic(),
            CompileError::DependencyCycle(cycle) => {
                Diagnostic::error(build_code(1), cycle.to_string())
                    .with_note("remove one of the imports to break the cycle")
            }
            CompileError::NotFound {
                module,
                importer,
                searched,
            } => {
                let mut diag = Diagnostic::error(build_code(2), self.to_string());
                if let Some((_, span)) = importer {
                    diag = diag.with_label(*span, format!("imports '{module}'"));
                }
                for path in searched {
                    diag = diag.with_note(format!("searched {}", path.display()));
                }
                diag
            }
            CompileError::DependencyFailed { .. } => Diagnostic::error(build_code(3), self.to_string()),
            CompileError::Source { .. } => Diagnostic::error(build_code(4), self.to_string()),
            CompileError::Timeout { .. } => Diagnostic::error(build_code(5), self.to_string()),
            CompileError::StoreUnavailable { .. } => {
                Diagnostic::error(build_code(6), self.to_string())
            }
            CompileError::Cancelled { .. } => Diagnostic::error(build_code(7), self.to_string()),
            CompileError::Internal(internal) => Diagnostic::error(build_code(99), internal.to_string())
                .with_note("this is a bug in the Zuri toolchain"),
        }
    }
}

//! Errors raised while encoding or decoding IR.

use zuri_diagnostics::{Diagnostic, DiagnosticCode, Stage};

/// A serialized IR module could not be read (or written).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The bytes were written with a schema this reader does not support.
    #[error("IR schema version {found} is not supported (this toolchain reads up to {supported})")]
    UnsupportedVersion {
        /// Version tag found in the bytes.
        found: u16,
        /// Highest version this reader accepts.
        supported: u16,
    },
    /// The bytes are truncated, have the wrong magic or fail to decode.
    #[error("corrupt IR: {reason}")]
    Corrupt {
        /// What was wrong.
        reason: String,
    },
}

impl SchemaError {
    /// The diagnostic code for this error.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            SchemaError::UnsupportedVersion { .. } => DiagnosticCode::new(Stage::Cache, 1),
            SchemaError::Corrupt { .. } => DiagnosticCode::new(Stage::Cache, 2),
        }
    }

    /// Converts this error into a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string())
    }
}

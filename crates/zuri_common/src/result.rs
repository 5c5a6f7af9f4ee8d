//! Internal error type for toolchain bugs.

/// An internal error indicating a bug in Zuri, not a problem with user input.
///
/// User errors travel as typed errors (`SyntaxError`, `SemanticError`, ...).
/// An `InternalError` means an invariant inside the toolchain was broken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal compiler error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("state machine skipped a stage");
        assert_eq!(
            err.to_string(),
            "internal compiler error: state machine skipped a stage"
        );
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }
}

//! Runtime error types.

use zuri_diagnostics::{Diagnostic, DiagnosticCode, Stage};
use zuri_ir::IrSpan;

/// What went wrong during execution.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RuntimeErrorKind {
    /// Integer division or remainder by zero.
    DivisionByZero,
    /// An operand had the wrong type.
    TypeError,
    /// A function was called with the wrong number of arguments.
    Arity,
    /// The callee is not a function.
    NotCallable,
    /// A global or session symbol was read before it was assigned.
    UndefinedGlobal,
    /// Calls nested deeper than the configured limit.
    CallDepthExceeded,
    /// Integer arithmetic overflowed.
    IntegerOverflow,
    /// An import names a module that was not instantiated, or one built
    /// from different inputs.
    UnknownModule,
    /// The IR refers to a slot it does not define.
    InvalidIr,
}

impl RuntimeErrorKind {
    fn code(self) -> DiagnosticCode {
        let number = match self {
            RuntimeErrorKind::DivisionByZero => 1,
            RuntimeErrorKind::TypeError => 2,
            RuntimeErrorKind::Arity => 3,
            RuntimeErrorKind::NotCallable => 4,
            RuntimeErrorKind::UndefinedGlobal => 5,
            RuntimeErrorKind::CallDepthExceeded => 6,
            RuntimeErrorKind::IntegerOverflow => 7,
            RuntimeErrorKind::UnknownModule => 8,
            RuntimeErrorKind::InvalidIr => 9,
        };
        DiagnosticCode::new(Stage::Runtime, number)
    }
}

/// A failed evaluation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    /// The kind of failure.
    pub kind: RuntimeErrorKind,
    /// Human-readable description.
    pub message: String,
    /// The module that was executing.
    pub module: String,
    /// Byte range in that module's source.
    pub span: IrSpan,
}

impl RuntimeError {
    /// Creates a runtime error.
    pub fn new(
        kind: RuntimeErrorKind,
        message: impl Into<String>,
        module: impl Into<String>,
        span: IrSpan,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            module: module.into(),
            span,
        }
    }

    /// Converts the error into a diagnostic.
    ///
    /// IR spans are offsets into the module's source; the diagnostic
    /// names them in a note since the source database is not at hand here.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.kind.code(), self.message.clone()).with_note(format!(
            "in module '{}' at bytes {}..{}",
            self.module, self.span.start, self.span.end
        ))
    }
}

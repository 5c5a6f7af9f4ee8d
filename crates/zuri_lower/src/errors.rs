//! The semantic error type.
//!
//! Codes `E201`--`E210` cover lowering failures: unresolved names and
//! imports, duplicate definitions, type and arity mismatches, illegal
//! assignments and cyclic global definitions.

use zuri_diagnostics::{Diagnostic, DiagnosticCode, Stage};
use zuri_source::Span;

/// What went wrong while lowering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SemanticErrorKind {
    /// A name that resolves to nothing in scope.
    UndefinedSymbol,
    /// `ns.name` where the imported module exports no `name`.
    UndefinedMember,
    /// A name declared twice in the same scope.
    DuplicateDefinition,
    /// An operand, argument or initializer of the wrong type.
    TypeMismatch,
    /// A call with the wrong number of arguments.
    ArityMismatch,
    /// Assignment to a `let`, a parameter, a function or a namespace.
    AssignToImmutable,
    /// A global whose initializer depends on itself.
    CyclicDefinition,
    /// `return` in top-level code.
    ReturnOutsideFunction,
    /// A type annotation naming no known type.
    UnknownType,
    /// An import with no matching dependency.
    UnresolvedImport,
}

impl SemanticErrorKind {
    /// The diagnostic code for this kind.
    pub fn code(self) -> DiagnosticCode {
        let number = match self {
            SemanticErrorKind::UndefinedSymbol => 1,
            SemanticErrorKind::UndefinedMember => 2,
            SemanticErrorKind::DuplicateDefinition => 3,
            SemanticErrorKind::TypeMismatch => 4,
            SemanticErrorKind::ArityMismatch => 5,
            SemanticErrorKind::AssignToImmutable => 6,
            SemanticErrorKind::CyclicDefinition => 7,
            SemanticErrorKind::ReturnOutsideFunction => 8,
            SemanticErrorKind::UnknownType => 9,
            SemanticErrorKind::UnresolvedImport => 10,
        };
        DiagnosticCode::new(Stage::Semantic, number)
    }
}

/// The error returned by a failed lowering.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SemanticError {
    /// The kind of failure.
    pub kind: SemanticErrorKind,
    /// Human-readable description.
    pub message: String,
    /// The offending source range.
    pub span: Span,
}

impl SemanticError {
    /// Creates a semantic error.
    pub fn new(kind: SemanticErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// Converts this error into a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.kind.code(), self.message.clone()).with_span(self.span)
    }
}

pub(crate) fn undefined_symbol(name: &str, span: Span) -> SemanticError {
    SemanticError::new(
        SemanticErrorKind::UndefinedSymbol,
        format!("cannot find `{name}` in this scope"),
        span,
    )
}

pub(crate) fn duplicate(name: &str, span: Span) -> SemanticError {
    SemanticError::new(
        SemanticErrorKind::DuplicateDefinition,
        format!("`{name}` is already defined in this scope"),
        span,
    )
}

pub(crate) fn mismatch(expected: &str, found: &str, span: Span) -> SemanticError {
    SemanticError::new(
        SemanticErrorKind::TypeMismatch,
        format!("expected `{expected}`, found `{found}`"),
        span,
    )
}

pub(crate) fn immutable(what: &str, name: &str, span: Span) -> SemanticError {
    SemanticError::new(
        SemanticErrorKind::AssignToImmutable,
        format!("cannot assign to {what} `{name}`"),
        span,
    )
}

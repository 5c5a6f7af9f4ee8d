//! The syntax error type.

use zuri_diagnostics::{Diagnostic, DiagnosticCode, Stage};
use zuri_source::Span;

/// What went wrong while lexing or parsing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SyntaxErrorKind {
    /// A character that starts no token.
    UnexpectedChar,
    /// A string literal without its closing quote.
    UnterminatedString,
    /// A literal that is malformed or out of range.
    InvalidLiteral,
    /// A token that does not fit the grammar at this point.
    UnexpectedToken,
    /// The input ended while a construct was still open.
    UnexpectedEof,
    /// Expressions or blocks nested beyond the parser's limit.
    NestingTooDeep,
    /// Input longer than span offsets can address.
    SourceTooLarge,
}

impl SyntaxErrorKind {
    /// The diagnostic code for this kind.
    pub fn code(self) -> DiagnosticCode {
        let number = match self {
            SyntaxErrorKind::UnexpectedChar => 1,
            SyntaxErrorKind::UnterminatedString => 2,
            SyntaxErrorKind::InvalidLiteral => 3,
            SyntaxErrorKind::UnexpectedToken => 4,
            SyntaxErrorKind::UnexpectedEof => 5,
            SyntaxErrorKind::NestingTooDeep => 6,
            SyntaxErrorKind::SourceTooLarge => 7,
        };
        DiagnosticCode::new(Stage::Syntax, number)
    }
}

/// The single error reported by a failed parse.
///
/// Parsing is all-or-nothing: the first problem aborts the parse and is
/// returned as the only diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SyntaxError {
    /// The kind of failure.
    pub kind: SyntaxErrorKind,
    /// Human-readable description.
    pub message: String,
    /// The offending source range.
    pub span: Span,
}

impl SyntaxError {
    /// Creates a syntax error.
    pub fn new(kind: SyntaxErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// Returns `true` when more input could complete the source.
    ///
    /// The REPL uses this to keep reading continuation lines.
    pub fn is_incomplete(&self) -> bool {
        self.kind == SyntaxErrorKind::UnexpectedEof
    }

    /// Converts this error into a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.kind.code(), self.message.clone()).with_span(self.span)
    }
}

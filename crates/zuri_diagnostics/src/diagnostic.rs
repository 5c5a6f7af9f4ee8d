//! The diagnostic message type.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use zuri_source::Span;

/// A secondary source annotation, e.g. "first defined here".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// The annotated span.
    pub span: Span,
    /// The text printed beside the underline.
    pub message: String,
}

/// A structured message for the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// How serious the problem is.
    pub severity: Severity,
    /// Stable identifier of the problem kind.
    pub code: DiagnosticCode,
    /// One-line description.
    pub message: String,
    /// Where the problem is, when it has a source location.
    pub span: Option<Span>,
    /// Extra annotated locations.
    pub labels: Vec<Label>,
    /// Trailing `= note:` lines.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span: None,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    /// Attaches the primary span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Adds a secondary label.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: message.into(),
        });
        self
    }

    /// Adds a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Stage;
    use zuri_source::FileId;

    #[test]
    fn builder_chain() {
        let span = Span::new(FileId::from_raw(0), 1, 4);
        let diag = Diagnostic::error(DiagnosticCode::new(Stage::Semantic, 1), "undefined 'x'")
            .with_span(span)
            .with_label(Span::new(FileId::from_raw(0), 9, 10), "similar name here")
            .with_note("names are case sensitive");
        assert!(diag.severity.is_error());
        assert_eq!(diag.span, Some(span));
        assert_eq!(diag.labels.len(), 1);
        assert_eq!(diag.notes, vec!["names are case sensitive"]);
    }

    #[test]
    fn warning_keeps_fields() {
        let diag = Diagnostic::warning(DiagnosticCode::new(Stage::Cache, 9), "entry evicted");
        assert_eq!(diag.severity, Severity::Warning);
        assert!(diag.span.is_none());
    }
}

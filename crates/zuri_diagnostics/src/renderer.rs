//! Diagnostic rendering.

use crate::diagnostic::Diagnostic;
use zuri_source::{SourceDb, Span};

const RESET: &str = "\x1b[0m";
const BLUE: &str = "\x1b[1;34m";

/// Formats diagnostics for output.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a string ending in a newline.
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String;
}

/// Renders diagnostics in a rustc-style terminal layout:
///
/// ```text
/// error[E101]: expected expression, found ')'
///   --> src/app/main.zr:1:9
///   |
/// 1 | let x = )
///   |         ^
///   = note: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to emit ANSI colors.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, style: &str, text: &str) -> String {
        if self.color {
            format!("{style}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn render_snippet(&self, out: &mut String, span: Span, message: &str, db: &SourceDb) {
        let (Some(file), Some(resolved)) = (db.get(span.file), db.resolve_span(span)) else {
            return;
        };
        out.push_str(&format!("  {} {resolved}\n", self.paint(BLUE, "-->")));

        let (line, col) = file.line_col(span.start);
        let line_num = line.to_string();
        let padding = " ".repeat(line_num.len());
        let bar = self.paint(BLUE, "|");
        let line_content = file.line_text(span.start);
        let carets = "^".repeat(span.len().max(1) as usize);
        let col_padding = " ".repeat((col as usize).saturating_sub(1));
        let suffix = if message.is_empty() {
            String::new()
        } else {
            format!(" {message}")
        };

        out.push_str(&format!("{padding} {bar}\n"));
        out.push_str(&format!("{} {bar} {line_content}\n", self.paint(BLUE, &line_num)));
        out.push_str(&format!("{padding} {bar} {col_padding}{carets}{suffix}\n"));
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String {
        let mut out = String::new();
        let header = format!("{}[{}]", diag.severity, diag.code);
        out.push_str(&format!(
            "{}: {}\n",
            self.paint(diag.severity.ansi(), &header),
            diag.message
        ));

        if let Some(span) = diag.span {
            self.render_snippet(&mut out, span, "", source_db);
        }
        for label in &diag.labels {
            self.render_snippet(&mut out, label.span, &label.message, source_db);
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        out
    }
}

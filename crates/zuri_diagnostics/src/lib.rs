//! Structured diagnostics and their terminal rendering.
//!
//! Every user-facing error in the pipeline converts into a [`Diagnostic`]
//! carrying a stable [`DiagnosticCode`], a message and, where the error has
//! a source location, a primary span. [`TerminalRenderer`] prints them in a
//! rustc-like layout against the session's [`SourceDb`](zuri_source::SourceDb).

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;

pub use code::{DiagnosticCode, Stage};
pub use diagnostic::{Diagnostic, Label};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;

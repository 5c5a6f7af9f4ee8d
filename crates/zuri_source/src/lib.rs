//! Source units, module identifiers, span tracking and source resolution.
//!
//! A [`SourceUnit`] is the immutable text of one module. The
//! [`SourceProvider`] trait is how the compiler obtains units by
//! [`ModuleId`]. The [`SourceDb`] records every unit loaded during a session
//! so that [`Span`]s can be resolved to line/column coordinates for
//! diagnostics.

#![warn(missing_docs)]

pub mod file_id;
pub mod module_id;
pub mod provider;
pub mod resolved_span;
pub mod source_db;
pub mod source_unit;
pub mod span;

pub use file_id::FileId;
pub use module_id::{ModuleId, ParseModuleIdError};
pub use provider::{FsSourceProvider, MemorySourceProvider, ResolveError, SourceProvider};
pub use resolved_span::ResolvedSpan;
pub use source_db::{SourceDb, SourceFile};
pub use source_unit::{check_source_len, SourceTooLarge, SourceUnit, MAX_SOURCE_LEN};
pub use span::Span;

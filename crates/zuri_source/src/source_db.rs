//! Registry of every source unit loaded during a session.

use crate::file_id::FileId;
use crate::resolved_span::ResolvedSpan;
use crate::source_unit::SourceUnit;
use crate::span::Span;
use std::sync::{Arc, RwLock};

/// A source unit registered in the [`SourceDb`], with its line index.
#[derive(Debug)]
pub struct SourceFile {
    /// The id assigned at registration.
    pub id: FileId,
    /// The registered unit.
    pub unit: SourceUnit,
    /// Byte offsets of each line start (the first entry is always 0).
    line_starts: Vec<u32>,
}

impl SourceFile {
    fn new(id: FileId, unit: SourceUnit) -> Self {
        let line_starts = compute_line_starts(unit.text());
        Self {
            id,
            unit,
            line_starts,
        }
    }

    /// Converts a byte offset into 1-indexed (line, column) coordinates.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line = (line_idx as u32) + 1;
        let col = byte_offset.saturating_sub(self.line_starts[line_idx]) + 1;
        (line, col)
    }

    /// Returns the full line containing `byte_offset`, without its newline.
    pub fn line_text(&self, byte_offset: u32) -> &str {
        let text = self.unit.text();
        let offset = (byte_offset as usize).min(text.len());
        let start = text[..offset].rfind('\n').map_or(0, |pos| pos + 1);
        let end = text[offset..]
            .find('\n')
            .map_or(text.len(), |pos| offset + pos);
        &text[start..end]
    }
}

fn compute_line_starts(content: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}

/// The session's source database.
///
/// Compilations on several threads register units concurrently, so the
/// database is shared by reference and synchronizes internally.
#[derive(Debug, Default)]
pub struct SourceDb {
    files: RwLock<Vec<Arc<SourceFile>>>,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a unit and returns its [`FileId`].
    pub fn add_unit(&self, unit: SourceUnit) -> FileId {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        let id = FileId::from_raw(files.len() as u32);
        files.push(Arc::new(SourceFile::new(id, unit)));
        id
    }

    /// Returns the registered file for `id`.
    pub fn get(&self, id: FileId) -> Option<Arc<SourceFile>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.get(id.as_raw() as usize).cloned()
    }

    /// Returns the number of registered units.
    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a [`Span`] to human-readable line/column coordinates.
    pub fn resolve_span(&self, span: Span) -> Option<ResolvedSpan> {
        let file = self.get(span.file)?;
        let (start_line, start_col) = file.line_col(span.start);
        let (end_line, end_col) = file.line_col(span.end.saturating_sub(1).max(span.start));
        Some(ResolvedSpan {
            file_path: file.unit.path().to_path_buf(),
            start_line,
            start_col,
            end_line,
            end_col,
        })
    }

    /// Returns the source text covered by a [`Span`].
    pub fn snippet(&self, span: Span) -> Option<String> {
        let file = self.get(span.file)?;
        file.unit
            .text()
            .get(span.start as usize..span.end as usize)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModuleId;
    use std::path::PathBuf;

    fn unit(text: &str) -> SourceUnit {
        SourceUnit::new(ModuleId::parse("test").unwrap(), "test.zr", text).unwrap()
    }

    #[test]
    fn line_col_resolution() {
        let db = SourceDb::new();
        let id = db.add_unit(unit("abc\ndef\nghi"));
        let file = db.get(id).unwrap();
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(4), (2, 1));
        assert_eq!(file.line_col(5), (2, 2));
        assert_eq!(file.line_col(8), (3, 1));
    }

    #[test]
    fn resolve_span() {
        let db = SourceDb::new();
        let id = db.add_unit(unit("abc\ndef\nghi"));
        let resolved = db.resolve_span(Span::new(id, 4, 7)).unwrap();
        assert_eq!(resolved.file_path, PathBuf::from("test.zr"));
        assert_eq!((resolved.start_line, resolved.start_col), (2, 1));
        assert_eq!((resolved.end_line, resolved.end_col), (2, 3));
    }

    #[test]
    fn unknown_file_does_not_resolve() {
        let db = SourceDb::new();
        assert!(db.resolve_span(Span::DUMMY).is_none());
    }

    #[test]
    fn snippet_and_line_text() {
        let db = SourceDb::new();
        let id = db.add_unit(unit("let x = 1\nlet y = 2"));
        assert_eq!(db.snippet(Span::new(id, 4, 5)).as_deref(), Some("x"));
        assert_eq!(db.get(id).unwrap().line_text(12), "let y = 2");
    }

    #[test]
    fn ids_are_sequential() {
        let db = SourceDb::new();
        let a = db.add_unit(unit("a"));
        let b = db.add_unit(unit("b"));
        assert_ne!(a, b);
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn empty_unit() {
        let db = SourceDb::new();
        let id = db.add_unit(unit(""));
        assert_eq!(db.get(id).unwrap().line_col(0), (1, 1));
    }
}

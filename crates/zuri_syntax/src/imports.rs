//! Import discovery without a shared interner.
//!
//! The build graph needs the import list of a module before anything else
//! about it, and must not depend on session state, so names come back as
//! plain strings.

use crate::error::SyntaxError;
use crate::parse;
use zuri_common::Interner;
use zuri_source::{FileId, Span};

/// An `import` declaration with its names resolved to strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRef {
    /// Dotted module path, e.g. `std.text`.
    pub module: String,
    /// Optional alias.
    pub alias: Option<String>,
    /// Span of the module path.
    pub span: Span,
}

/// Parses `source` and returns its imports in declaration order.
///
/// A source with a syntax error yields that error, exactly as [`parse`] would.
pub fn scan_imports(source: &str, file: FileId) -> Result<Vec<ImportRef>, SyntaxError> {
    let interner = Interner::new();
    let tree = parse(source, file, &interner)?;
    Ok(tree
        .imports()
        .map(|import| ImportRef {
            module: import
                .path
                .iter()
                .map(|segment| interner.resolve(*segment))
                .collect::<Vec<_>>()
                .join("."),
            alias: import.alias.map(|a| interner.resolve(a).to_string()),
            span: import.path_span,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imports_in_order() {
        let imports = scan_imports(
            "import b.c\nimport a as x\nlet v = x.f()",
            FileId::from_raw(0),
        )
        .unwrap();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].module, "b.c");
        assert_eq!(imports[0].alias, None);
        assert_eq!(imports[1].module, "a");
        assert_eq!(imports[1].alias.as_deref(), Some("x"));
        assert_eq!((imports[1].span.start, imports[1].span.end), (18, 19));
    }

    #[test]
    fn syntax_error_propagates() {
        assert!(scan_imports("import a.\n", FileId::from_raw(0)).is_err());
    }
}

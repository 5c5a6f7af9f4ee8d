//! Hand-rolled lexer and recursive descent parser for Zuri.
//!
//! Parsing is all-or-nothing: [`parse`] returns either a complete
//! [`SyntaxTree`] or exactly one [`SyntaxError`]. There are no partial trees
//! and no error-recovery nodes.
//!
//! # Architecture
//!
//! - **Lexer** ([`lexer`]): source text to tokens, tracking line breaks.
//! - **Parser** ([`parser`]): recursive descent for items and statements with
//!   Pratt parsing for expressions.
//! - **AST** ([`ast`]): the closed set of node variants, each with a span.

#![warn(missing_docs)]

/// Syntax tree node types.
pub mod ast;
mod error;
mod expr;
mod imports;
/// Lexical analyzer for Zuri source text.
pub mod lexer;
/// Recursive descent parser.
pub mod parser;
mod stmt;
/// Token types for the lexer.
pub mod token;

pub use ast::{NodeKind, SyntaxTree};
pub use error::{SyntaxError, SyntaxErrorKind};
pub use imports::{scan_imports, ImportRef};
pub use token::{Token, TokenKind};

use zuri_common::Interner;
use zuri_source::FileId;

/// Parses a whole source unit.
///
/// `file` is recorded in every span; identifiers are interned into `interner`.
pub fn parse(source: &str, file: FileId, interner: &Interner) -> Result<SyntaxTree, SyntaxError> {
    let tokens = lexer::lex(source, file)?;
    let mut parser = parser::Parser::new(tokens, source, file, interner);
    parser.parse_unit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ItemKind;

    #[test]
    fn program_with_everything() {
        let source = r#"
import std.math as m

let limit: Int = 10
var total = 0

def square(n: Int) -> Int {
    return n * n
}

var i = 0
while i < limit {
    if i % 2 == 0 {
        total = total + square(i)
    } else {
        total = total - m.abs(i)
    }
    i = i + 1
}
print("total: " + str(total))
"#;
        let interner = Interner::new();
        let tree = parse(source, FileId::from_raw(1), &interner).unwrap();
        let kinds: Vec<_> = tree.items.iter().map(|i| i.node_kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Import,
                NodeKind::Binding,
                NodeKind::Binding,
                NodeKind::Function,
                NodeKind::Binding,
                NodeKind::While,
                NodeKind::ExprStmt,
            ]
        );
        assert!(matches!(tree.items[0].kind, ItemKind::Import(_)));
    }

    #[test]
    fn same_input_same_tree() {
        let interner = Interner::new();
        let a = parse("let x = f(1)\nx + 2", FileId::from_raw(0), &interner).unwrap();
        let b = parse("let x = f(1)\nx + 2", FileId::from_raw(0), &interner).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn error_has_no_partial_tree() {
        let interner = Interner::new();
        let result = parse("let ok = 1\nlet bad = )", FileId::from_raw(0), &interner);
        let err = result.unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedToken);
        assert_eq!(err.to_diagnostic().code.to_string(), "E104");
    }
}

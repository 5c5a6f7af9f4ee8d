//! Core parser infrastructure and top-level parsing rules.
//!
//! The [`Parser`] struct provides the primitive operations (advance, eat,
//! expect) used by the statement and expression rules. Parsing is
//! all-or-nothing: every rule returns a [`PResult`] and the first error
//! unwinds the whole parse.

use crate::ast::*;
use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::token::{Token, TokenKind};
use zuri_common::{Ident, Interner};
use zuri_source::{FileId, Span};

/// Result type of every parsing rule.
pub type PResult<T> = Result<T, SyntaxError>;

/// Deepest allowed nesting of expressions and blocks.
pub const MAX_NESTING: usize = 256;

/// A recursive descent parser over a token stream.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    file: FileId,
    interner: &'src Interner,
    depth: usize,
    pub(crate) paren_depth: usize,
}

impl<'src> Parser<'src> {
    /// Creates a parser over `tokens`, which must have been lexed from
    /// `source` and end with [`TokenKind::Eof`].
    pub fn new(tokens: Vec<Token>, source: &'src str, file: FileId, interner: &'src Interner) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            file,
            interner,
            depth: 0,
            paren_depth: 0,
        }
    }

    // ========================================================================
    // Primitive operations
    // ========================================================================

    pub(crate) fn token(&self) -> Token {
        let last = self.tokens.len().saturating_sub(1);
        self.tokens[self.pos.min(last)]
    }

    pub(crate) fn current(&self) -> TokenKind {
        self.token().kind
    }

    pub(crate) fn current_span(&self) -> Span {
        self.token().span
    }

    pub(crate) fn current_text(&self) -> &'src str {
        let span = self.current_span();
        &self.source[span.start as usize..span.end as usize]
    }

    pub(crate) fn nth(&self, offset: usize) -> TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        self.tokens[(self.pos + offset).min(last)].kind
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    /// Whether a line break separates the current token from the previous one.
    pub(crate) fn at_line_start(&self) -> bool {
        self.token().newline_before
    }

    pub(crate) fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    pub(crate) fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a token of `kind` and returns its span.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> PResult<Span> {
        if self.at(kind) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    pub(crate) fn expect_ident(&mut self) -> PResult<(Ident, Span)> {
        if self.at(TokenKind::Ident) {
            let ident = self.interner.get_or_intern(self.current_text());
            let span = self.current_span();
            self.advance();
            Ok((ident, span))
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    /// Builds the error for finding the current token where `expected` was
    /// required. Running out of input is reported as [`SyntaxErrorKind::UnexpectedEof`].
    pub(crate) fn unexpected(&self, expected: &str) -> SyntaxError {
        let found = self.current();
        let kind = if found == TokenKind::Eof {
            SyntaxErrorKind::UnexpectedEof
        } else {
            SyntaxErrorKind::UnexpectedToken
        };
        SyntaxError::new(
            kind,
            format!("expected {expected}, found {found}"),
            self.current_span(),
        )
    }

    pub(crate) fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(SyntaxError::new(
                SyntaxErrorKind::NestingTooDeep,
                format!("nesting exceeds the limit of {MAX_NESTING}"),
                self.current_span(),
            ));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Ends a simple statement: `;`, a line break, `}` or end of input.
    pub(crate) fn expect_terminator(&mut self) -> PResult<()> {
        if self.eat(TokenKind::Semicolon)
            || self.at_line_start()
            || self.at(TokenKind::RightBrace)
            || self.at_eof()
        {
            return Ok(());
        }
        Err(self.unexpected("';' or a line break"))
    }

    // ========================================================================
    // Top level
    // ========================================================================

    /// Parses a whole source unit.
    pub fn parse_unit(&mut self) -> PResult<SyntaxTree> {
        let mut items = Vec::new();
        while !self.at_eof() {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            items.push(self.parse_item()?);
        }
        let span = Span::new(self.file, 0, self.source.len() as u32);
        Ok(SyntaxTree { items, span })
    }

    fn parse_item(&mut self) -> PResult<Item> {
        let start = self.current_span();
        let kind = match self.current() {
            TokenKind::Import => {
                let import = self.parse_import()?;
                self.expect_terminator()?;
                ItemKind::Import(import)
            }
            TokenKind::Let | TokenKind::Var => {
                let binding = self.parse_binding()?;
                self.expect_terminator()?;
                ItemKind::Binding(binding)
            }
            TokenKind::Def => ItemKind::Function(self.parse_function()?),
            _ => ItemKind::Stmt(self.parse_stmt()?),
        };
        Ok(Item {
            kind,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_import(&mut self) -> PResult<ImportDecl> {
        self.expect(TokenKind::Import)?;
        let (first, first_span) = self.expect_ident()?;
        let mut path = vec![first];
        let mut path_span = first_span;
        while self.eat(TokenKind::Dot) {
            let (segment, span) = self.expect_ident()?;
            path.push(segment);
            path_span = path_span.merge(span);
        }
        let alias = if self.eat(TokenKind::As) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        Ok(ImportDecl {
            path,
            alias,
            path_span,
        })
    }

    /// Parses `let`/`var` NAME (`:` TYPE)? `=` EXPR, without the terminator.
    pub(crate) fn parse_binding(&mut self) -> PResult<Binding> {
        let mutable = self.at(TokenKind::Var);
        self.advance();
        let (name, name_span) = self.expect_ident()?;
        let ty = self.parse_type_annotation(TokenKind::Colon)?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        Ok(Binding {
            mutable,
            name,
            name_span,
            ty,
            value,
        })
    }

    fn parse_type_annotation(&mut self, introducer: TokenKind) -> PResult<Option<TypeExpr>> {
        if !self.eat(introducer) {
            return Ok(None);
        }
        let (name, span) = self.expect_ident()?;
        Ok(Some(TypeExpr { name, span }))
    }

    fn parse_function(&mut self) -> PResult<FunctionDecl> {
        self.expect(TokenKind::Def)?;
        let (name, name_span) = self.expect_ident()?;
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RightParen) {
            let (param, span) = self.expect_ident()?;
            let ty = self.parse_type_annotation(TokenKind::Colon)?;
            let span = match &ty {
                Some(ty) => span.merge(ty.span),
                None => span,
            };
            params.push(Param {
                name: param,
                ty,
                span,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        let ret = self.parse_type_annotation(TokenKind::Arrow)?;
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            name_span,
            params,
            ret,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::SyntaxErrorKind;
    use crate::parse;
    use zuri_common::Interner;
    use zuri_source::FileId;

    fn parse_ok(source: &str) -> (SyntaxTree, Interner) {
        let interner = Interner::new();
        let tree = parse(source, FileId::from_raw(0), &interner)
            .unwrap_or_else(|e| panic!("unexpected error: {e}"));
        (tree, interner)
    }

    fn parse_err(source: &str) -> crate::SyntaxError {
        let interner = Interner::new();
        parse(source, FileId::from_raw(0), &interner).unwrap_err()
    }

    #[test]
    fn empty_source() {
        let (tree, _) = parse_ok("");
        assert!(tree.items.is_empty());
        let (tree, _) = parse_ok("  # only a comment\n\n");
        assert!(tree.items.is_empty());
    }

    #[test]
    fn import_with_alias() {
        let (tree, interner) = parse_ok("import std.text as t\nimport util");
        let imports: Vec<_> = tree.imports().collect();
        assert_eq!(imports.len(), 2);
        let path: Vec<_> = imports[0].path.iter().map(|i| interner.resolve(*i)).collect();
        assert_eq!(path, vec!["std", "text"]);
        assert_eq!(interner.resolve(imports[0].alias.unwrap()), "t");
        assert_eq!(interner.resolve(imports[1].binding_name().unwrap()), "util");
    }

    #[test]
    fn binding_with_type() {
        let (tree, interner) = parse_ok("var count: Int = 0");
        let ItemKind::Binding(b) = &tree.items[0].kind else {
            panic!("expected binding");
        };
        assert!(b.mutable);
        assert_eq!(interner.resolve(b.name), "count");
        assert_eq!(interner.resolve(b.ty.as_ref().unwrap().name), "Int");
        assert_eq!(b.value.kind, ExprKind::Int(0));
    }

    #[test]
    fn function_declaration() {
        let (tree, interner) = parse_ok("def add(a: Int, b: Int) -> Int {\n  return a + b\n}");
        let ItemKind::Function(f) = &tree.items[0].kind else {
            panic!("expected function");
        };
        assert_eq!(interner.resolve(f.name), "add");
        assert_eq!(f.params.len(), 2);
        assert_eq!(interner.resolve(f.ret.as_ref().unwrap().name), "Int");
        assert_eq!(f.body.stmts.len(), 1);
        assert_eq!(f.body.stmts[0].node_kind(), NodeKind::Return);
        assert_eq!(tree.items[0].node_kind(), NodeKind::Function);
    }

    #[test]
    fn statements_separated_by_semicolons() {
        let (tree, _) = parse_ok("let a = 1; let b = 2; a");
        assert_eq!(tree.items.len(), 3);
        assert_eq!(tree.items[2].node_kind(), NodeKind::ExprStmt);
    }

    #[test]
    fn two_statements_on_one_line_error() {
        let err = parse_err("let a = 1 let b = 2");
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedToken);
        assert_eq!(err.span.start, 10);
    }

    #[test]
    fn item_spans_cover_source() {
        let (tree, _) = parse_ok("let x = 1 + 2");
        assert_eq!(tree.items[0].span.start, 0);
        assert_eq!(tree.items[0].span.end, 13);
    }

    #[test]
    fn missing_closing_brace_is_incomplete() {
        let err = parse_err("def f() {\n  let x = 1\n");
        assert!(err.is_incomplete());
    }

    #[test]
    fn import_requires_path() {
        let err = parse_err("import 1");
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedToken);
        assert_eq!(err.message, "expected identifier, found integer literal");
    }

    #[test]
    fn nesting_limit() {
        let source = format!("let x = {}1{}", "(".repeat(400), ")".repeat(400));
        let err = parse_err(&source);
        assert_eq!(err.kind, SyntaxErrorKind::NestingTooDeep);
    }

    #[test]
    fn trailing_comma_in_params() {
        let (tree, _) = parse_ok("def f(a, b,) { }");
        let ItemKind::Function(f) = &tree.items[0].kind else {
            panic!("expected function");
        };
        assert_eq!(f.params.len(), 2);
    }
}

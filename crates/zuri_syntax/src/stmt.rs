//! Statement parsing: bindings, assignment, control flow and blocks.

use crate::ast::*;
use crate::parser::{PResult, Parser};
use crate::token::TokenKind;

impl Parser<'_> {
    /// Parses one statement, including its terminator where one is needed.
    pub(crate) fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        let kind = match self.current() {
            TokenKind::Let | TokenKind::Var => {
                let binding = self.parse_binding()?;
                self.expect_terminator()?;
                StmtKind::Binding(binding)
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at(TokenKind::Semicolon)
                    || self.at(TokenKind::RightBrace)
                    || self.at_eof()
                    || self.at_line_start()
                {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_terminator()?;
                StmtKind::Return(value)
            }
            TokenKind::Ident if self.nth(1) == TokenKind::Assign => {
                let (target, target_span) = self.expect_ident()?;
                self.expect(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                self.expect_terminator()?;
                StmtKind::Assign {
                    target,
                    target_span,
                    value,
                }
            }
            TokenKind::Def | TokenKind::Import => {
                return Err(self.unexpected("a statement (declarations are only allowed at the top level)"))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect_terminator()?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt {
            kind,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_if(&mut self) -> PResult<StmtKind> {
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(TokenKind::Else) {
            if self.at(TokenKind::If) {
                // `else if` becomes an else block holding a single `if`.
                let start = self.current_span();
                let nested = self.parse_if()?;
                let span = start.merge(self.prev_span());
                Some(Block {
                    stmts: vec![Stmt { kind: nested, span }],
                    span,
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then_block,
            else_block,
        })
    }

    /// Parses `{ stmt* }`.
    pub(crate) fn parse_block(&mut self) -> PResult<Block> {
        self.enter()?;
        let open = self.expect(TokenKind::LeftBrace)?;
        let mut stmts = Vec::new();
        loop {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            if self.at(TokenKind::RightBrace) {
                break;
            }
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.parse_stmt()?);
        }
        let close = self.expect(TokenKind::RightBrace)?;
        self.leave();
        Ok(Block {
            stmts,
            span: open.merge(close),
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

    fn stmts(source: &str) -> Vec<Stmt> {
        let interner = Interner::new();
        let tree = parse(source, FileId::from_raw(0), &interner).unwrap();
        tree.items
            .into_iter()
            .map(|item| match item.kind {
                ItemKind::Stmt(stmt) => stmt,
                other => panic!("expected statement, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn if_else_chain() {
        let s = stmts("if a { x = 1 } else if b { x = 2 } else { x = 3 }");
        let StmtKind::If { else_block, .. } = &s[0].kind else {
            panic!("expected if");
        };
        let nested = &else_block.as_ref().unwrap().stmts[0];
        let StmtKind::If { else_block, .. } = &nested.kind else {
            panic!("expected nested if");
        };
        assert_eq!(else_block.as_ref().unwrap().stmts.len(), 1);
    }

    #[test]
    fn while_loop() {
        let s = stmts("while i < 10 {\n  i = i + 1\n  print(i)\n}");
        let StmtKind::While { body, .. } = &s[0].kind else {
            panic!("expected while");
        };
        assert_eq!(body.stmts.len(), 2);
        assert_eq!(body.stmts[0].node_kind(), NodeKind::Assign);
        assert_eq!(body.stmts[1].node_kind(), NodeKind::ExprStmt);
    }

    #[test]
    fn bare_return() {
        let interner = Interner::new();
        let tree = parse("def f() {\n  return\n}", FileId::from_raw(0), &interner).unwrap();
        let ItemKind::Function(f) = &tree.items[0].kind else {
            panic!("expected function");
        };
        assert_eq!(f.body.stmts[0].kind, StmtKind::Return(None));
    }

    #[test]
    fn nested_def_is_rejected() {
        let interner = Interner::new();
        let err = parse("def f() { def g() {} }", FileId::from_raw(0), &interner).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedToken);
    }

    #[test]
    fn block_on_one_line() {
        let s = stmts("if true { a(); b() }");
        let StmtKind::If { then_block, .. } = &s[0].kind else {
            panic!("expected if");
        };
        assert_eq!(then_block.stmts.len(), 2);
    }
}

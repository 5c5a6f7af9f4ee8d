//! Pratt expression parser.
//!
//! | BP (L,R)  | Operators |
//! |-----------|-----------|
//! | (1,2)     | `\|\|` |
//! | (3,4)     | `&&` |
//! | (5,6)     | `==` `!=` |
//! | (7,8)     | `<` `<=` `>` `>=` |
//! | (9,10)    | `+` `-` |
//! | (11,12)   | `*` `/` `%` |
//! | prefix 13 | `-` `!` |
//! | postfix   | call `f(..)`, member `a.b` |
//!
//! Outside parentheses, an infix operator or call parenthesis at the start of
//! a line ends the expression instead of continuing it.

use crate::ast::*;
use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::lexer::unescape_string;
use crate::parser::{PResult, Parser, MAX_NESTING};
use crate::token::TokenKind;
use zuri_source::Span;

const PREFIX_BP: u8 = 13;

fn infix_binding_power(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::Or => (1, 2),
        BinaryOp::And => (3, 4),
        BinaryOp::Eq | BinaryOp::Ne => (5, 6),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => (7, 8),
        BinaryOp::Add | BinaryOp::Sub => (9, 10),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => (11, 12),
    }
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::OrOr => BinaryOp::Or,
        TokenKind::AndAnd => BinaryOp::And,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::Ne,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::LtEq => BinaryOp::Le,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::GtEq => BinaryOp::Ge,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Rem,
        _ => return None,
    };
    Some(op)
}

/// An expression together with the height of its tree.
type Measured = (Expr, usize);

impl Parser<'_> {
    /// Parses an expression.
    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_expr_bp(0).map(|(expr, _)| expr)
    }

    /// Fails once an expression tree grows taller than [`MAX_NESTING`],
    /// including chains the infix loop builds without recursing.
    fn check_height(&self, height: usize, span: Span) -> PResult<()> {
        if height > MAX_NESTING {
            return Err(SyntaxError::new(
                SyntaxErrorKind::NestingTooDeep,
                format!("expression nesting exceeds the limit of {MAX_NESTING}"),
                span,
            ));
        }
        Ok(())
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> PResult<Measured> {
        self.enter()?;
        let (mut lhs, mut height) = self.parse_prefix_expr()?;

        loop {
            let continues_line = !self.at_line_start() || self.paren_depth > 0;

            if self.at(TokenKind::LeftParen) && continues_line {
                (lhs, height) = self.parse_call(lhs, height)?;
                self.check_height(height, lhs.span)?;
                continue;
            }

            if self.at(TokenKind::Dot) {
                self.advance();
                let (member, member_span) = self.expect_ident()?;
                let span = lhs.span.merge(member_span);
                lhs = Expr {
                    kind: ExprKind::Member {
                        base: Box::new(lhs),
                        member,
                        member_span,
                    },
                    span,
                };
                height += 1;
                self.check_height(height, span)?;
                continue;
            }

            let Some(op) = binary_op(self.current()) else {
                break;
            };
            if !continues_line {
                break;
            }
            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            self.advance();

            let (rhs, rhs_height) = self.parse_expr_bp(r_bp)?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
            height = height.max(rhs_height) + 1;
            self.check_height(height, span)?;
        }

        self.leave();
        Ok((lhs, height))
    }

    fn parse_prefix_expr(&mut self) -> PResult<Measured> {
        let span = self.current_span();
        let kind = match self.current() {
            TokenKind::Int => {
                let digits: String = self.current_text().chars().filter(|c| *c != '_').collect();
                let value = digits.parse::<i64>().map_err(|_| {
                    SyntaxError::new(
                        SyntaxErrorKind::InvalidLiteral,
                        format!("integer literal '{}' is out of range", self.current_text()),
                        span,
                    )
                })?;
                self.advance();
                ExprKind::Int(value)
            }
            TokenKind::Str => {
                let value = unescape_string(self.current_text(), span)?;
                self.advance();
                ExprKind::Str(value)
            }
            TokenKind::True | TokenKind::False => {
                let value = self.at(TokenKind::True);
                self.advance();
                ExprKind::Bool(value)
            }
            TokenKind::Ident => {
                let (name, _) = self.expect_ident()?;
                ExprKind::Name(name)
            }
            TokenKind::Minus | TokenKind::Bang => {
                let op = if self.at(TokenKind::Minus) {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Not
                };
                self.advance();
                let (operand, height) = self.parse_expr_bp(PREFIX_BP)?;
                let span = span.merge(operand.span);
                let expr = Expr {
                    kind: ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                };
                self.check_height(height + 1, span)?;
                return Ok((expr, height + 1));
            }
            TokenKind::LeftParen => {
                self.advance();
                self.paren_depth += 1;
                let (inner, height) = self.parse_expr_bp(0)?;
                self.expect(TokenKind::RightParen)?;
                self.paren_depth -= 1;
                let expr = Expr {
                    kind: inner.kind,
                    span: span.merge(self.prev_span()),
                };
                return Ok((expr, height));
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok((Expr { kind, span }, 1))
    }

    fn parse_call(&mut self, callee: Expr, callee_height: usize) -> PResult<Measured> {
        self.expect(TokenKind::LeftParen)?;
        self.paren_depth += 1;
        let mut args = Vec::new();
        let mut height = callee_height;
        while !self.at(TokenKind::RightParen) {
            let (arg, arg_height) = self.parse_expr_bp(0)?;
            height = height.max(arg_height);
            args.push(arg);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let close = self.expect(TokenKind::RightParen)?;
        self.paren_depth -= 1;
        let span = callee.span.merge(close);
        let expr = Expr {
            kind: ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            span,
        };
        Ok((expr, height + 1))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::SyntaxErrorKind;
    use crate::parse;
    use zuri_common::Interner;
    use zuri_source::FileId;

    fn expr(source: &str) -> (Expr, Interner) {
        let interner = Interner::new();
        let tree = parse(source, FileId::from_raw(0), &interner).unwrap();
        let expr = match tree.items.into_iter().next().map(|i| i.kind) {
            Some(ItemKind::Stmt(Stmt {
                kind: StmtKind::Expr(e),
                ..
            })) => e,
            Some(ItemKind::Binding(b)) => b.value,
            other => panic!("expected expression, got {other:?}"),
        };
        (expr, interner)
    }

    fn binary(e: &Expr) -> (BinaryOp, &Expr, &Expr) {
        match &e.kind {
            ExprKind::Binary { op, lhs, rhs } => (*op, lhs, rhs),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn let_with_addition() {
        let (e, _) = expr("let x = 1 + 2");
        let (op, lhs, rhs) = binary(&e);
        assert_eq!(op, BinaryOp::Add);
        assert_eq!(lhs.kind, ExprKind::Int(1));
        assert_eq!(rhs.kind, ExprKind::Int(2));
        assert_eq!((e.span.start, e.span.end), (8, 13));
    }

    #[test]
    fn precedence() {
        let (e, _) = expr("1 + 2 * 3 == 7 && !done");
        let (op, lhs, rhs) = binary(&e);
        assert_eq!(op, BinaryOp::And);
        assert_eq!(rhs.node_kind(), NodeKind::UnaryExpr);
        let (op, lhs, _) = binary(lhs);
        assert_eq!(op, BinaryOp::Eq);
        let (op, _, mul) = binary(lhs);
        assert_eq!(op, BinaryOp::Add);
        assert_eq!(binary(mul).0, BinaryOp::Mul);
    }

    #[test]
    fn left_associative() {
        let (e, _) = expr("10 - 4 - 3");
        let (_, lhs, rhs) = binary(&e);
        assert_eq!(rhs.kind, ExprKind::Int(3));
        assert_eq!(binary(lhs).0, BinaryOp::Sub);
    }

    #[test]
    fn parentheses_override() {
        let (e, _) = expr("(1 + 2) * 3");
        let (op, lhs, _) = binary(&e);
        assert_eq!(op, BinaryOp::Mul);
        assert_eq!(binary(lhs).0, BinaryOp::Add);
        assert_eq!(lhs.span.start, 0);
    }

    #[test]
    fn call_and_member() {
        let (e, interner) = expr("text.upper(name, \"!\")");
        let ExprKind::Call { callee, args } = &e.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].kind, ExprKind::Str("!".to_string()));
        let ExprKind::Member { member, .. } = &callee.kind else {
            panic!("expected member");
        };
        assert_eq!(interner.resolve(*member), "upper");
    }

    #[test]
    fn negation_binds_tighter_than_call_result() {
        let (e, _) = expr("-f(1)");
        let ExprKind::Unary { op, operand } = &e.kind else {
            panic!("expected unary");
        };
        assert_eq!(*op, UnaryOp::Neg);
        assert_eq!(operand.node_kind(), NodeKind::CallExpr);
    }

    #[test]
    fn newline_ends_expression() {
        let interner = Interner::new();
        let tree = parse("let a = b\n-1", FileId::from_raw(0), &interner).unwrap();
        assert_eq!(tree.items.len(), 2);
    }

    #[test]
    fn newline_inside_parentheses_continues() {
        let (e, _) = expr("let a = (1\n + 2)");
        assert_eq!(binary(&e).0, BinaryOp::Add);
        let (e, _) = expr("f(1,\n 2)");
        assert_eq!(e.node_kind(), NodeKind::CallExpr);
    }

    #[test]
    fn underscore_separators() {
        let (e, _) = expr("1_000_000");
        assert_eq!(e.kind, ExprKind::Int(1_000_000));
    }

    #[test]
    fn out_of_range_literal() {
        let interner = Interner::new();
        let err = parse("99999999999999999999", FileId::from_raw(0), &interner).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::InvalidLiteral);
    }

    #[test]
    fn missing_operand() {
        let interner = Interner::new();
        let err = parse("let x = 1 +", FileId::from_raw(0), &interner).unwrap_err();
        assert!(err.is_incomplete());
        let err = parse("let x = * 2", FileId::from_raw(0), &interner).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedToken);
        assert_eq!(err.message, "expected expression, found '*'");
    }

    fn chain(terms: usize) -> String {
        format!("let x = 1{}", " + 1".repeat(terms - 1))
    }

    #[test]
    fn long_chain_is_rejected_without_overflow() {
        let interner = Interner::new();
        let err = parse(&chain(10_000), FileId::from_raw(0), &interner).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::NestingTooDeep);
        assert!(!err.is_incomplete());
    }

    #[test]
    fn chain_at_the_limit_parses() {
        let (e, _) = expr(&chain(crate::parser::MAX_NESTING));
        assert_eq!(binary(&e).0, BinaryOp::Add);
        let interner = Interner::new();
        let over = chain(crate::parser::MAX_NESTING + 1);
        assert!(parse(&over, FileId::from_raw(0), &interner).is_err());
    }

    #[test]
    fn nested_parenthesised_chains_count_together() {
        let inner = format!("(1{})", " + 1".repeat(200));
        let source = format!("let x = {inner} + {inner} * (2{})", " * 2".repeat(100));
        let interner = Interner::new();
        assert!(parse(&source, FileId::from_raw(0), &interner).is_ok());
        let deep = format!("let x = ({inner}{})", " - 1".repeat(100));
        let err = parse(&deep, FileId::from_raw(0), &interner).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::NestingTooDeep);
    }
}

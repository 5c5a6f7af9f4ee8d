//! Constant folding.
//!
//! Operations whose operands are all constants are replaced by their value.
//! Operations that would fail at runtime (overflow, division by zero) are
//! left in place so the runtime reports them.

use crate::expr::{BinaryOp, Constant, Expr, ExprKind, Stmt, UnaryOp};
use crate::module::{Function, IrModule};
use std::cmp::Ordering;

/// Returns how many operations [`fold_constants`] would remove.
pub fn foldable_operations(module: &IrModule) -> usize {
    fold_constants(&mut module.clone())
}

/// Folds constant operations in every function body. Returns the number of
/// operations removed.
pub fn fold_constants(module: &mut IrModule) -> usize {
    let mut folded = fold_function(&mut module.init);
    for (_, function) in module.functions.iter_mut() {
        folded += fold_function(function);
    }
    folded
}

fn fold_function(function: &mut Function) -> usize {
    fold_stmts(&mut function.body)
}

fn fold_stmts(stmts: &mut [Stmt]) -> usize {
    stmts.iter_mut().map(fold_stmt).sum()
}

fn fold_stmt(stmt: &mut Stmt) -> usize {
    match stmt {
        Stmt::Let { value, .. }
        | Stmt::SetLocal { value, .. }
        | Stmt::SetGlobal { value, .. }
        | Stmt::SetSession { value, .. }
        | Stmt::Expr(value) => fold_expr(value),
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => fold_expr(cond) + fold_stmts(then_body) + fold_stmts(else_body),
        Stmt::While { cond, body } => fold_expr(cond) + fold_stmts(body),
        Stmt::Return(value) => value.as_mut().map_or(0, fold_expr),
    }
}

fn fold_expr(expr: &mut Expr) -> usize {
    let (count, value) = match &mut expr.kind {
        ExprKind::Unary { op, operand } => {
            let count = fold_expr(operand);
            match &operand.kind {
                ExprKind::Const(c) => (count, eval_unary(*op, c)),
                _ => (count, None),
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let count = fold_expr(lhs) + fold_expr(rhs);
            match (&lhs.kind, &rhs.kind) {
                (ExprKind::Const(a), ExprKind::Const(b)) => (count, eval_binary(*op, a, b)),
                _ => (count, None),
            }
        }
        ExprKind::Call { callee, args } => {
            let count = fold_expr(callee) + args.iter_mut().map(fold_expr).sum::<usize>();
            (count, None)
        }
        _ => (0, None),
    };
    match value {
        Some(constant) => {
            expr.kind = ExprKind::Const(constant);
            count + 1
        }
        None => count,
    }
}

/// Evaluates a prefix operator on a constant. `None` if the operation is
/// ill-typed or would fail at runtime.
pub fn eval_unary(op: UnaryOp, operand: &Constant) -> Option<Constant> {
    match (op, operand) {
        (UnaryOp::Neg, Constant::Int(v)) => v.checked_neg().map(Constant::Int),
        (UnaryOp::Not, Constant::Bool(v)) => Some(Constant::Bool(!v)),
        _ => None,
    }
}

/// Evaluates an infix operator on two constants. `None` if the operation
/// is ill-typed or would fail at runtime.
pub fn eval_binary(op: BinaryOp, lhs: &Constant, rhs: &Constant) -> Option<Constant> {
    use Constant::{Bool, Int, Str};
    let value = match (op, lhs, rhs) {
        (BinaryOp::Add, Int(a), Int(b)) => Int(a.checked_add(*b)?),
        (BinaryOp::Sub, Int(a), Int(b)) => Int(a.checked_sub(*b)?),
        (BinaryOp::Mul, Int(a), Int(b)) => Int(a.checked_mul(*b)?),
        (BinaryOp::Div, Int(a), Int(b)) => Int(a.checked_div(*b)?),
        (BinaryOp::Rem, Int(a), Int(b)) => Int(a.checked_rem(*b)?),
        (BinaryOp::Add, Str(a), Str(b)) => Str(format!("{a}{b}")),
        (BinaryOp::Eq, a, b) => Bool(a == b),
        (BinaryOp::Ne, a, b) => Bool(a != b),
        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, a, b) => {
            let ordering = match (a, b) {
                (Int(a), Int(b)) => a.cmp(b),
                (Str(a), Str(b)) => a.cmp(b),
                _ => return None,
            };
            Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
        (BinaryOp::And, Bool(a), Bool(b)) => Bool(*a && *b),
        (BinaryOp::Or, Bool(a), Bool(b)) => Bool(*a || *b),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::IrSpan;
    use crate::types::TypeDb;

    fn int(v: i64) -> Expr {
        Expr {
            kind: ExprKind::Const(Constant::Int(v)),
            ty: TypeDb::INT,
            span: IrSpan::default(),
        }
    }

    fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty: TypeDb::INT,
            span: IrSpan::default(),
        }
    }

    fn module_with(expr: Expr) -> IrModule {
        let mut module = IrModule::new("m");
        module.init.body.push(Stmt::Expr(expr));
        module
    }

    #[test]
    fn nested_operations_fold_bottom_up() {
        // 1 + 2 * 3
        let mut module = module_with(bin(
            BinaryOp::Add,
            int(1),
            bin(BinaryOp::Mul, int(2), int(3)),
        ));
        assert_eq!(foldable_operations(&module), 2);
        assert_eq!(fold_constants(&mut module), 2);
        assert_eq!(module.init.body, vec![Stmt::Expr(int(7))]);
        assert_eq!(foldable_operations(&module), 0);
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let mut module = module_with(bin(BinaryOp::Div, int(1), int(0)));
        assert_eq!(fold_constants(&mut module), 0);
    }

    #[test]
    fn overflow_is_not_folded() {
        assert_eq!(
            eval_binary(BinaryOp::Add, &Constant::Int(i64::MAX), &Constant::Int(1)),
            None
        );
        assert_eq!(eval_unary(UnaryOp::Neg, &Constant::Int(i64::MIN)), None);
    }

    #[test]
    fn string_and_comparison() {
        assert_eq!(
            eval_binary(
                BinaryOp::Add,
                &Constant::Str("a".into()),
                &Constant::Str("b".into())
            ),
            Some(Constant::Str("ab".into()))
        );
        assert_eq!(
            eval_binary(BinaryOp::Le, &Constant::Int(2), &Constant::Int(2)),
            Some(Constant::Bool(true))
        );
        assert_eq!(
            eval_binary(BinaryOp::Lt, &Constant::Bool(true), &Constant::Int(2)),
            None
        );
    }
}

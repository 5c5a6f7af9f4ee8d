//! Type annotation resolution and operator typing rules.

use zuri_ir::{BinaryOp, Builtin, Type, TypeDb, TypeId, UnaryOp};
use zuri_syntax::ast::TypeExpr;

use crate::context::Lowerer;
use crate::errors::{SemanticError, SemanticErrorKind};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Shape {
    Int,
    Bool,
    Str,
    Any,
    Other,
}

fn shape(db: &TypeDb, ty: TypeId) -> Shape {
    match db.get(ty) {
        Type::Int => Shape::Int,
        Type::Bool => Shape::Bool,
        Type::Str => Shape::Str,
        Type::Any => Shape::Any,
        Type::Unit | Type::Function { .. } => Shape::Other,
    }
}

fn fits(s: Shape, want: Shape) -> bool {
    s == Shape::Any || s == want
}

/// Result type of `op operand`, or `None` if the operand type is wrong.
pub(crate) fn unary_result(db: &TypeDb, op: UnaryOp, operand: TypeId) -> Option<TypeId> {
    match (op, shape(db, operand)) {
        (UnaryOp::Neg, Shape::Int | Shape::Any) => Some(TypeDb::INT),
        (UnaryOp::Not, Shape::Bool | Shape::Any) => Some(TypeDb::BOOL),
        _ => None,
    }
}

/// Result type of `lhs op rhs`, or `None` if the operands do not fit.
pub(crate) fn binary_result(db: &TypeDb, op: BinaryOp, lhs: TypeId, rhs: TypeId) -> Option<TypeId> {
    let (l, r) = (shape(db, lhs), shape(db, rhs));
    let accepts = |want: Shape| fits(l, want) && fits(r, want);
    match op {
        BinaryOp::Add => match (l, r) {
            (Shape::Any, Shape::Any) => Some(TypeDb::ANY),
            _ if accepts(Shape::Int) => Some(TypeDb::INT),
            _ if accepts(Shape::Str) => Some(TypeDb::STR),
            _ => None,
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            accepts(Shape::Int).then_some(TypeDb::INT)
        }
        BinaryOp::Eq | BinaryOp::Ne => db.compatible(lhs, rhs).then_some(TypeDb::BOOL),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            (accepts(Shape::Int) || accepts(Shape::Str)).then_some(TypeDb::BOOL)
        }
        BinaryOp::And | BinaryOp::Or => accepts(Shape::Bool).then_some(TypeDb::BOOL),
    }
}

/// The function type of a builtin.
pub(crate) fn builtin_type(db: &mut TypeDb, builtin: Builtin) -> TypeId {
    match builtin {
        Builtin::Print => db.function(vec![TypeDb::ANY], TypeDb::UNIT),
        Builtin::Str => db.function(vec![TypeDb::ANY], TypeDb::STR),
        Builtin::Len => db.function(vec![TypeDb::STR], TypeDb::INT),
    }
}

impl Lowerer<'_> {
    /// Resolves a written type annotation.
    pub(crate) fn resolve_type(&self, ty: &TypeExpr) -> Result<TypeId, SemanticError> {
        let name = self.name(ty.name);
        TypeDb::builtin(name).ok_or_else(|| {
            SemanticError::new(
                SemanticErrorKind::UnknownType,
                format!("unknown type `{name}`"),
                ty.span,
            )
        })
    }
}

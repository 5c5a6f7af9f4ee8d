//! Expression lowering: name resolution and type checking.

use zuri_ir::{self as ir, Builtin, Constant, ExprKind, Type, TypeDb, TypeId};
use zuri_syntax::ast;
use zuri_source::Span;

use crate::context::{ir_span, Lowerer};
use crate::errors::{self, SemanticError, SemanticErrorKind};
use crate::types::{binary_result, builtin_type, unary_result};

fn lower_binary_op(op: ast::BinaryOp) -> ir::BinaryOp {
    match op {
        ast::BinaryOp::Add => ir::BinaryOp::Add,
        ast::BinaryOp::Sub => ir::BinaryOp::Sub,
        ast::BinaryOp::Mul => ir::BinaryOp::Mul,
        ast::BinaryOp::Div => ir::BinaryOp::Div,
        ast::BinaryOp::Rem => ir::BinaryOp::Rem,
        ast::BinaryOp::Eq => ir::BinaryOp::Eq,
        ast::BinaryOp::Ne => ir::BinaryOp::Ne,
        ast::BinaryOp::Lt => ir::BinaryOp::Lt,
        ast::BinaryOp::Le => ir::BinaryOp::Le,
        ast::BinaryOp::Gt => ir::BinaryOp::Gt,
        ast::BinaryOp::Ge => ir::BinaryOp::Ge,
        ast::BinaryOp::And => ir::BinaryOp::And,
        ast::BinaryOp::Or => ir::BinaryOp::Or,
    }
}

impl Lowerer<'_> {
    /// Lowers an expression.
    pub(crate) fn lower_expr(&mut self, expr: &ast::Expr) -> Result<ir::Expr, SemanticError> {
        let span = ir_span(expr.span);
        let (kind, ty) = match &expr.kind {
            ast::ExprKind::Int(v) => (ExprKind::Const(Constant::Int(*v)), TypeDb::INT),
            ast::ExprKind::Str(s) => (ExprKind::Const(Constant::Str(s.clone())), TypeDb::STR),
            ast::ExprKind::Bool(b) => (ExprKind::Const(Constant::Bool(*b)), TypeDb::BOOL),
            ast::ExprKind::Name(name) => self.resolve_name(*name, expr.span)?,
            ast::ExprKind::Unary { op, operand } => {
                let operand = self.lower_expr(operand)?;
                let op = match op {
                    ast::UnaryOp::Neg => ir::UnaryOp::Neg,
                    ast::UnaryOp::Not => ir::UnaryOp::Not,
                };
                let ty = unary_result(&self.module.types, op, operand.ty).ok_or_else(|| {
                    let symbol = if op == ir::UnaryOp::Neg { "-" } else { "!" };
                    SemanticError::new(
                        SemanticErrorKind::TypeMismatch,
                        format!(
                            "operator `{symbol}` cannot be applied to `{}`",
                            self.display_type(operand.ty)
                        ),
                        expr.span,
                    )
                })?;
                let kind = ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                };
                (kind, ty)
            }
            ast::ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(lhs)?;
                let rhs = self.lower_expr(rhs)?;
                let op = lower_binary_op(*op);
                let ty = binary_result(&self.module.types, op, lhs.ty, rhs.ty).ok_or_else(|| {
                    SemanticError::new(
                        SemanticErrorKind::TypeMismatch,
                        format!(
                            "operator `{}` cannot be applied to `{}` and `{}`",
                            op.symbol(),
                            self.display_type(lhs.ty),
                            self.display_type(rhs.ty)
                        ),
                        expr.span,
                    )
                })?;
                let kind = ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                (kind, ty)
            }
            ast::ExprKind::Call { callee, args } => self.lower_call(callee, args, expr.span)?,
            ast::ExprKind::Member {
                base,
                member,
                member_span,
            } => self.lower_member(base, *member, *member_span)?,
        };
        Ok(ir::Expr { kind, ty, span })
    }

    fn resolve_name(
        &mut self,
        name: zuri_common::Ident,
        span: Span,
    ) -> Result<(ExprKind, TypeId), SemanticError> {
        if let Some(local) = self.current.lookup(name) {
            let ty = self.current.function.locals[local].ty;
            return Ok((ExprKind::Local(local), ty));
        }
        if let Some(global) = self.globals.get(&name).map(|g| g.id) {
            self.record_reference(global);
            let ty = self.module.globals[global].ty;
            return Ok((ExprKind::Global(global), ty));
        }
        let text = self.name(name);
        if self.namespaces.contains_key(&name) {
            return Err(SemanticError::new(
                SemanticErrorKind::UndefinedSymbol,
                format!("expected a value, found module `{text}`"),
                span,
            ));
        }
        if self.session.contains_key(text) {
            let symbol = self.module.symbols.intern(text);
            return Ok((ExprKind::Session(symbol), TypeDb::ANY));
        }
        if let Some(builtin) = Builtin::from_name(text) {
            let ty = builtin_type(self.types(), builtin);
            return Ok((ExprKind::Builtin(builtin), ty));
        }
        Err(errors::undefined_symbol(text, span))
    }

    fn lower_member(
        &mut self,
        base: &ast::Expr,
        member: zuri_common::Ident,
        member_span: Span,
    ) -> Result<(ExprKind, TypeId), SemanticError> {
        let namespace = match &base.kind {
            ast::ExprKind::Name(name)
                if self.current.lookup(*name).is_none() && !self.globals.contains_key(name) =>
            {
                self.namespaces.get(name).cloned()
            }
            _ => None,
        };
        let member_name = self.name(member);
        let Some((import, dependency)) = namespace else {
            let base = self.lower_expr(base)?;
            return Err(SemanticError::new(
                SemanticErrorKind::TypeMismatch,
                format!(
                    "type `{}` has no member `{member_name}`",
                    self.display_type(base.ty)
                ),
                member_span,
            ));
        };
        let Some((_, global)) = dependency.export(member_name) else {
            return Err(SemanticError::new(
                SemanticErrorKind::UndefinedMember,
                format!("module `{}` has no member `{member_name}`", dependency.name),
                member_span,
            ));
        };
        let ty = self.module.types.import(&dependency.types, global.ty);
        let symbol = self.module.symbols.intern(member_name);
        Ok((ExprKind::Imported { import, symbol }, ty))
    }

    fn lower_call(
        &mut self,
        callee: &ast::Expr,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<(ExprKind, TypeId), SemanticError> {
        let lowered_callee = self.lower_expr(callee)?;
        let mut lowered_args = Vec::with_capacity(args.len());
        for arg in args {
            lowered_args.push(self.lower_expr(arg)?);
        }
        let ret = match self.module.types.get(lowered_callee.ty).clone() {
            Type::Function { params, ret } => {
                if params.len() != args.len() {
                    let plural = if params.len() == 1 { "" } else { "s" };
                    return Err(SemanticError::new(
                        SemanticErrorKind::ArityMismatch,
                        format!(
                            "`{}` takes {} argument{plural} but {} were supplied",
                            self.callee_name(callee),
                            params.len(),
                            args.len()
                        ),
                        span,
                    ));
                }
                for ((param, arg), ast_arg) in params.iter().zip(&lowered_args).zip(args) {
                    if !self.module.types.compatible(*param, arg.ty) {
                        return Err(errors::mismatch(
                            &self.display_type(*param),
                            &self.display_type(arg.ty),
                            ast_arg.span,
                        ));
                    }
                }
                ret
            }
            Type::Any => TypeDb::ANY,
            _ => {
                return Err(SemanticError::new(
                    SemanticErrorKind::TypeMismatch,
                    format!(
                        "`{}` of type `{}` is not callable",
                        self.callee_name(callee),
                        self.display_type(lowered_callee.ty)
                    ),
                    callee.span,
                ))
            }
        };
        let kind = ExprKind::Call {
            callee: Box::new(lowered_callee),
            args: lowered_args,
        };
        Ok((kind, ret))
    }

    fn callee_name(&self, callee: &ast::Expr) -> String {
        match &callee.kind {
            ast::ExprKind::Name(name) => self.name(*name).to_string(),
            ast::ExprKind::Member { base, member, .. } => {
                format!("{}.{}", self.callee_name(base), self.name(*member))
            }
            _ => "expression".to_string(),
        }
    }
}

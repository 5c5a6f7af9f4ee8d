//! Statement lowering.

use zuri_ir::{self as ir, GlobalKind, Local, TypeDb, TypeId};
use zuri_syntax::ast;

use crate::context::Lowerer;
use crate::errors::{self, SemanticError, SemanticErrorKind};

impl Lowerer<'_> {
    /// Lowers a braced block in a fresh scope.
    pub(crate) fn lower_block(&mut self, block: &ast::Block) -> Result<Vec<ir::Stmt>, SemanticError> {
        self.current.push_scope();
        let mut out = Vec::with_capacity(block.stmts.len());
        for stmt in &block.stmts {
            out.push(self.lower_stmt(stmt)?);
        }
        self.current.pop_scope();
        Ok(out)
    }

    /// Lowers one statement.
    pub(crate) fn lower_stmt(&mut self, stmt: &ast::Stmt) -> Result<ir::Stmt, SemanticError> {
        match &stmt.kind {
            ast::StmtKind::Binding(binding) => self.lower_local_binding(binding),
            ast::StmtKind::Assign {
                target,
                target_span,
                value,
            } => self.lower_assign(*target, *target_span, value),
            ast::StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond = self.lower_condition(cond)?;
                let then_body = self.lower_block(then_block)?;
                let else_body = match else_block {
                    Some(block) => self.lower_block(block)?,
                    None => Vec::new(),
                };
                Ok(ir::Stmt::If {
                    cond,
                    then_body,
                    else_body,
                })
            }
            ast::StmtKind::While { cond, body } => {
                let cond = self.lower_condition(cond)?;
                let body = self.lower_block(body)?;
                Ok(ir::Stmt::While { cond, body })
            }
            ast::StmtKind::Return(value) => {
                if !self.current.is_function {
                    return Err(SemanticError::new(
                        SemanticErrorKind::ReturnOutsideFunction,
                        "`return` outside of a function",
                        stmt.span,
                    ));
                }
                let ret = self.current.function.ret;
                let value = match value {
                    Some(expr) => {
                        let lowered = self.lower_expr(expr)?;
                        self.check_type(ret, lowered.ty, expr.span)?;
                        Some(lowered)
                    }
                    None => {
                        self.check_type(ret, TypeDb::UNIT, stmt.span)?;
                        None
                    }
                };
                Ok(ir::Stmt::Return(value))
            }
            ast::StmtKind::Expr(expr) => Ok(ir::Stmt::Expr(self.lower_expr(expr)?)),
        }
    }

    fn lower_condition(&mut self, cond: &ast::Expr) -> Result<ir::Expr, SemanticError> {
        let lowered = self.lower_expr(cond)?;
        self.check_type(TypeDb::BOOL, lowered.ty, cond.span)?;
        Ok(lowered)
    }

    /// Fails with a type mismatch unless `found` may be used as `expected`.
    pub(crate) fn check_type(
        &self,
        expected: TypeId,
        found: TypeId,
        span: zuri_source::Span,
    ) -> Result<(), SemanticError> {
        if self.module.types.compatible(expected, found) {
            Ok(())
        } else {
            Err(errors::mismatch(
                &self.display_type(expected),
                &self.display_type(found),
                span,
            ))
        }
    }

    fn lower_local_binding(&mut self, binding: &ast::Binding) -> Result<ir::Stmt, SemanticError> {
        let value = self.lower_expr(&binding.value)?;
        let ty = match &binding.ty {
            Some(annotation) => {
                let declared = self.resolve_type(annotation)?;
                self.check_type(declared, value.ty, binding.value.span)?;
                declared
            }
            None => value.ty,
        };
        let name = self.name(binding.name);
        let symbol = self.module.symbols.intern(name);
        let local = self.current.declare(
            binding.name,
            Local {
                name: symbol,
                mutable: binding.mutable,
                ty,
            },
            name,
            binding.name_span,
        )?;
        Ok(ir::Stmt::Let { local, value })
    }

    /// Lowers a module-level `let`/`var` into an initialization of its
    /// global. Unannotated globals take the type of their initializer.
    pub(crate) fn lower_global_binding(
        &mut self,
        binding: &ast::Binding,
    ) -> Result<ir::Stmt, SemanticError> {
        let Some((global, typed)) = self.globals.get(&binding.name).map(|g| (g.id, g.typed)) else {
            return Err(errors::undefined_symbol(self.name(binding.name), binding.name_span));
        };
        self.owner = Some(global);
        let value = self.lower_expr(&binding.value)?;
        self.owner = None;
        if typed {
            let declared = self.module.globals[global].ty;
            self.check_type(declared, value.ty, binding.value.span)?;
        } else {
            self.module.globals[global].ty = value.ty;
            if let Some(decl) = self.globals.get_mut(&binding.name) {
                decl.typed = true;
            }
        }
        Ok(ir::Stmt::SetGlobal { global, value })
    }

    fn lower_assign(
        &mut self,
        target: zuri_common::Ident,
        span: zuri_source::Span,
        value: &ast::Expr,
    ) -> Result<ir::Stmt, SemanticError> {
        let name = self.name(target);
        if let Some(local) = self.current.lookup(target) {
            let slot = &self.current.function.locals[local];
            let (mutable, ty) = (slot.mutable, slot.ty);
            if !mutable {
                return Err(errors::immutable("immutable binding", name, span));
            }
            let value = self.lower_assigned_value(ty, value)?;
            return Ok(ir::Stmt::SetLocal { local, value });
        }
        if let Some(global) = self.globals.get(&target).map(|g| g.id) {
            let decl = &self.module.globals[global];
            let (mutable, kind, ty) = (decl.mutable, decl.kind, decl.ty);
            if let GlobalKind::Function(_) = kind {
                return Err(errors::immutable("function", name, span));
            }
            if !mutable {
                return Err(errors::immutable("immutable binding", name, span));
            }
            let value = self.lower_assigned_value(ty, value)?;
            return Ok(ir::Stmt::SetGlobal { global, value });
        }
        if self.namespaces.contains_key(&target) {
            return Err(errors::immutable("module", name, span));
        }
        if let Some(mutable) = self.session.get(name).copied() {
            if !mutable {
                return Err(errors::immutable("immutable binding", name, span));
            }
            let value = self.lower_assigned_value(TypeDb::ANY, value)?;
            let symbol = self.module.symbols.intern(name);
            return Ok(ir::Stmt::SetSession { symbol, value });
        }
        if ir::Builtin::from_name(name).is_some() {
            return Err(errors::immutable("builtin", name, span));
        }
        Err(errors::undefined_symbol(name, span))
    }

    fn lower_assigned_value(
        &mut self,
        ty: TypeId,
        value: &ast::Expr,
    ) -> Result<ir::Expr, SemanticError> {
        let lowered = self.lower_expr(value)?;
        self.check_type(ty, lowered.ty, value.span)?;
        Ok(lowered)
    }
}

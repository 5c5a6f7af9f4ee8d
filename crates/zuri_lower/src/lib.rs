//! Lowering of Zuri syntax trees into IR modules.
//!
//! [`lower`] resolves names, checks types and produces an [`IrModule`].
//! It is pure: the result depends only on the tree and the
//! [`LowerContext`], and contains no interner indices or file ids, so the
//! same source lowered in two sessions yields byte-identical IR.
//!
//! Lowering runs in four passes over the top-level items:
//!
//! 1. imports are bound to their compiled dependencies,
//! 2. every global (value or function) is declared, so functions may refer
//!    to globals declared after them, and namespaces carried over from a
//!    REPL session are bound unless the module reuses their names,
//! 3. top-level code is lowered in source order into the init function,
//! 4. function bodies are lowered, then global initializers are checked
//!    for cycles.

#![warn(missing_docs)]

pub mod context;
mod cycles;
pub mod errors;
mod expr;
mod stmt;
mod types;

pub use context::{DependencyInterface, LowerContext, Session, SessionImport, SessionSymbol};
pub use errors::{SemanticError, SemanticErrorKind};

use zuri_common::Ident;
use zuri_ir::{
    Function, FuncId, Global, GlobalId, GlobalKind, Import, IrModule, Local, TypeDb, TypeId,
};
use zuri_source::Span;
use zuri_syntax::ast::{FunctionDecl, ItemKind, SyntaxTree};

use context::{ir_span, FnBuilder, GlobalDecl, Lowerer};

/// Lowers a parsed module.
pub fn lower(tree: &SyntaxTree, ctx: &LowerContext<'_>) -> Result<IrModule, SemanticError> {
    let mut lowerer = Lowerer::new(ctx);
    lowerer.declare_imports(tree)?;
    let functions = lowerer.declare_globals(tree)?;
    lowerer.declare_session_imports(tree)?;
    lowerer.lower_init(tree)?;
    for pending in functions {
        lowerer.lower_function(pending)?;
    }
    lowerer.check_cycles()?;

    let mut module = lowerer.module;
    module.export_all();
    tracing::debug!(
        module = %ctx.module,
        globals = module.globals.len(),
        functions = module.functions.len(),
        "lowered module"
    );
    Ok(module)
}

struct PendingFunction<'t> {
    decl: &'t FunctionDecl,
    func: FuncId,
    global: GlobalId,
    params: Vec<TypeId>,
}

impl Lowerer<'_> {
    fn dependency(&self, path: &str, span: Span) -> Result<&DependencyInterface, SemanticError> {
        self.ctx
            .dependencies
            .iter()
            .find(|d| d.module.as_str() == path)
            .ok_or_else(|| {
                SemanticError::new(
                    SemanticErrorKind::UnresolvedImport,
                    format!("unresolved import `{path}`"),
                    span,
                )
            })
    }

    fn declare_imports(&mut self, tree: &SyntaxTree) -> Result<(), SemanticError> {
        for import in tree.imports() {
            let path = import
                .path
                .iter()
                .map(|segment| self.name(*segment))
                .collect::<Vec<_>>()
                .join(".");
            let dependency = self.dependency(&path, import.path_span)?.clone();
            let Some(binding) = import.binding_name() else {
                continue;
            };
            if self.namespaces.contains_key(&binding) {
                return Err(errors::duplicate(self.name(binding), import.path_span));
            }
            let alias = self.module.symbols.intern(self.name(binding));
            let id = self.module.imports.alloc(Import {
                module: path,
                alias,
                fingerprint: dependency.fingerprint,
            });
            self.namespaces
                .insert(binding, (id, dependency.ir.clone()));
        }
        Ok(())
    }

    /// Binds the namespaces earlier fragments imported. Names the module
    /// declares itself win; aliases the module never mentions are skipped.
    fn declare_session_imports(&mut self, tree: &SyntaxTree) -> Result<(), SemanticError> {
        let ctx = self.ctx;
        let span = Span::point(tree.span.file, tree.span.start);
        for carried in &ctx.session.imports {
            let Some(binding) = ctx.interner.get(&carried.alias) else {
                continue;
            };
            if self.globals.contains_key(&binding) || self.namespaces.contains_key(&binding) {
                continue;
            }
            let dependency = self.dependency(carried.module.as_str(), span)?.clone();
            let alias = self.module.symbols.intern(&carried.alias);
            let id = self.module.imports.alloc(Import {
                module: carried.module.as_str().to_string(),
                alias,
                fingerprint: dependency.fingerprint,
            });
            self.namespaces.insert(binding, (id, dependency.ir));
        }
        Ok(())
    }

    fn declare_global(
        &mut self,
        name: Ident,
        span: Span,
        global: Global,
        typed: bool,
    ) -> Result<GlobalId, SemanticError> {
        if self.globals.contains_key(&name) || self.namespaces.contains_key(&name) {
            return Err(errors::duplicate(self.name(name), span));
        }
        let id = self.module.globals.alloc(global);
        self.globals.insert(name, GlobalDecl { id, span, typed });
        Ok(id)
    }

    fn declare_globals<'t>(
        &mut self,
        tree: &'t SyntaxTree,
    ) -> Result<Vec<PendingFunction<'t>>, SemanticError> {
        let mut functions = Vec::new();
        for item in &tree.items {
            match &item.kind {
                ItemKind::Binding(binding) => {
                    let (ty, typed) = match &binding.ty {
                        Some(annotation) => (self.resolve_type(annotation)?, true),
                        None => (TypeDb::ANY, false),
                    };
                    let name = self.module.symbols.intern(self.name(binding.name));
                    let global = Global {
                        name,
                        mutable: binding.mutable,
                        ty,
                        kind: GlobalKind::Value,
                    };
                    self.declare_global(binding.name, binding.name_span, global, typed)?;
                }
                ItemKind::Function(decl) => {
                    let mut params = Vec::with_capacity(decl.params.len());
                    for param in &decl.params {
                        params.push(match &param.ty {
                            Some(annotation) => self.resolve_type(annotation)?,
                            None => TypeDb::ANY,
                        });
                    }
                    let ret = match &decl.ret {
                        Some(annotation) => self.resolve_type(annotation)?,
                        None => TypeDb::ANY,
                    };
                    let name = self.module.symbols.intern(self.name(decl.name));
                    let fn_ty = self.types().function(params.clone(), ret);
                    let func = self
                        .module
                        .functions
                        .alloc(Function::new(name, ret, ir_span(item.span)));
                    let global = Global {
                        name,
                        mutable: false,
                        ty: fn_ty,
                        kind: GlobalKind::Function(func),
                    };
                    let global = self.declare_global(decl.name, decl.name_span, global, true)?;
                    functions.push(PendingFunction {
                        decl,
                        func,
                        global,
                        params,
                    });
                }
                ItemKind::Import(_) | ItemKind::Stmt(_) => {}
            }
        }
        Ok(functions)
    }

    fn lower_init(&mut self, tree: &SyntaxTree) -> Result<(), SemanticError> {
        for item in &tree.items {
            let stmt = match &item.kind {
                ItemKind::Import(_) | ItemKind::Function(_) => continue,
                ItemKind::Binding(binding) => self.lower_global_binding(binding)?,
                ItemKind::Stmt(stmt) => self.lower_stmt(stmt)?,
            };
            self.current.function.body.push(stmt);
        }
        self.module.init = self.current.function.clone();
        Ok(())
    }

    fn lower_function(&mut self, pending: PendingFunction<'_>) -> Result<(), SemanticError> {
        let Some(template) = self.module.functions.get(pending.func).cloned() else {
            return Ok(());
        };
        let mut builder = FnBuilder::new(template, true);
        for (param, ty) in pending.decl.params.iter().zip(&pending.params) {
            let name = self.name(param.name);
            let symbol = self.module.symbols.intern(name);
            let local = builder.declare(
                param.name,
                Local {
                    name: symbol,
                    mutable: false,
                    ty: *ty,
                },
                name,
                param.span,
            )?;
            builder.function.params.push(local);
        }

        let outer = std::mem::replace(&mut self.current, builder);
        self.owner = Some(pending.global);
        let body = self.lower_block(&pending.decl.body);
        self.owner = None;
        let builder = std::mem::replace(&mut self.current, outer);
        let mut function = builder.function;
        function.body = body?;
        if let Some(slot) = self.module.functions.get_mut(pending.func) {
            *slot = function;
        }
        Ok(())
    }
}

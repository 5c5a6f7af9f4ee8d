//! Lowering inputs and the mutable state carried through one lowering.
//!
//! [`LowerContext`] is everything lowering may look at besides the tree.
//! [`Lowerer`] owns the [`IrModule`] under construction together with the
//! lookup tables and the scope stack of the function being lowered.

use std::collections::HashMap;
use std::sync::Arc;

use zuri_common::{Fingerprint, Ident, Interner};
use zuri_ir::{
    Function, GlobalId, ImportId, IrModule, IrSpan, Local, LocalId, TypeDb, TypeId,
};
use zuri_source::{ModuleId, Span};

use crate::errors::{self, SemanticError};

/// A compiled dependency as seen by its importers.
#[derive(Debug, Clone)]
pub struct DependencyInterface {
    /// The dependency's module id.
    pub module: ModuleId,
    /// The dependency's fingerprint.
    pub fingerprint: Fingerprint,
    /// The dependency's IR; only its exports and types are consulted.
    pub ir: Arc<IrModule>,
}

/// A global left behind by an earlier REPL fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSymbol {
    /// Its name.
    pub name: String,
    /// Declared with `var`.
    pub mutable: bool,
}

/// A namespace bound by an `import` in an earlier REPL fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionImport {
    /// The name the namespace is bound to.
    pub alias: String,
    /// The imported module.
    pub module: ModuleId,
    /// Fingerprint of the instance the session loaded.
    pub fingerprint: Fingerprint,
}

/// What earlier REPL fragments left visible to the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Session globals, sorted by name.
    pub globals: Vec<SessionSymbol>,
    /// Imported namespaces, sorted by alias.
    pub imports: Vec<SessionImport>,
}

impl Session {
    /// Whether nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty() && self.imports.is_empty()
    }

    /// The modules the session's namespaces refer to.
    pub fn modules(&self) -> Vec<ModuleId> {
        self.imports.iter().map(|import| import.module.clone()).collect()
    }
}

/// Everything lowering may consult besides the syntax tree.
pub struct LowerContext<'a> {
    /// The id of the module being lowered.
    pub module: ModuleId,
    /// The interner the tree was parsed with.
    pub interner: &'a Interner,
    /// Compiled direct dependencies.
    pub dependencies: Vec<DependencyInterface>,
    /// Session globals and namespaces visible to a REPL fragment.
    pub session: Session,
}

impl<'a> LowerContext<'a> {
    /// Creates a context with no dependencies and no session.
    pub fn new(module: ModuleId, interner: &'a Interner) -> Self {
        Self {
            module,
            interner,
            dependencies: Vec::new(),
            session: Session::default(),
        }
    }

    /// Adds the compiled dependencies.
    pub fn with_dependencies(mut self, dependencies: Vec<DependencyInterface>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Adds what earlier fragments left visible.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }
}

/// A global declared by the module, with the bookkeeping lowering needs.
pub(crate) struct GlobalDecl {
    pub id: GlobalId,
    pub span: Span,
    /// `true` once the type is known (annotated, a function, or initialized).
    pub typed: bool,
}

/// The function currently being lowered.
pub(crate) struct FnBuilder {
    pub function: Function,
    scopes: Vec<HashMap<Ident, LocalId>>,
    /// `false` for the module's init function.
    pub is_function: bool,
}

impl FnBuilder {
    pub fn new(function: Function, is_function: bool) -> Self {
        Self {
            function,
            scopes: vec![HashMap::new()],
            is_function,
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn lookup(&self, name: Ident) -> Option<LocalId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).copied())
    }

    pub fn declare(
        &mut self,
        name: Ident,
        local: Local,
        display: &str,
        span: Span,
    ) -> Result<LocalId, SemanticError> {
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| errors::duplicate(display, span))?;
        if scope.contains_key(&name) {
            return Err(errors::duplicate(display, span));
        }
        let id = self.function.locals.alloc(local);
        scope.insert(name, id);
        Ok(id)
    }
}

/// State of one lowering.
pub(crate) struct Lowerer<'a> {
    pub ctx: &'a LowerContext<'a>,
    pub module: IrModule,
    pub globals: HashMap<Ident, GlobalDecl>,
    pub namespaces: HashMap<Ident, (ImportId, Arc<IrModule>)>,
    pub session: HashMap<&'a str, bool>,
    pub current: FnBuilder,
    /// The global whose initializer or body is being lowered.
    pub owner: Option<GlobalId>,
    /// `(from, to)` global references, for cycle detection.
    pub references: Vec<(GlobalId, GlobalId)>,
}

impl<'a> Lowerer<'a> {
    pub fn new(ctx: &'a LowerContext<'a>) -> Self {
        let module = IrModule::new(ctx.module.as_str());
        let init = module.init.clone();
        Self {
            ctx,
            module,
            globals: HashMap::new(),
            namespaces: HashMap::new(),
            session: ctx
                .session
                .globals
                .iter()
                .map(|s| (s.name.as_str(), s.mutable))
                .collect(),
            current: FnBuilder::new(init, false),
            owner: None,
            references: Vec::new(),
        }
    }

    pub fn name(&self, ident: Ident) -> &'a str {
        self.ctx.interner.resolve(ident)
    }

    pub fn types(&mut self) -> &mut TypeDb {
        &mut self.module.types
    }

    pub fn display_type(&self, ty: TypeId) -> String {
        self.module.types.display(ty)
    }

    pub fn record_reference(&mut self, target: GlobalId) {
        if let Some(owner) = self.owner {
            self.references.push((owner, target));
        }
    }
}

pub(crate) fn ir_span(span: Span) -> IrSpan {
    IrSpan::new(span.start, span.end)
}

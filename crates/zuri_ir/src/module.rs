//! The IR module: the unit the cache stores and the runtime executes.

use crate::arena::Arena;
use crate::expr::{IrSpan, Stmt};
use crate::ids::{FuncId, GlobalId, ImportId, LocalId, SymbolId, TypeId};
use crate::symbols::SymbolTable;
use crate::types::TypeDb;
use serde::{Deserialize, Serialize};
use zuri_common::Fingerprint;

/// A compiled module.
///
/// Contains only resolved strings and module-local IDs, so equal inputs
/// always produce byte-identical serializations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrModule {
    /// The dotted module id.
    pub name: String,
    /// Names used by the module.
    pub symbols: SymbolTable,
    /// Types used by the module.
    pub types: TypeDb,
    /// Imported dependencies in declaration order.
    pub imports: Arena<ImportId, Import>,
    /// Module globals in declaration order.
    pub globals: Arena<GlobalId, Global>,
    /// Function bodies.
    pub functions: Arena<FuncId, Function>,
    /// Top-level code, run once when the module is instantiated.
    pub init: Function,
    /// Exported globals sorted by name.
    pub exports: Vec<Export>,
}

impl IrModule {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        let mut symbols = SymbolTable::new();
        let init_name = symbols.intern("<init>");
        Self {
            name: name.into(),
            symbols,
            types: TypeDb::new(),
            imports: Arena::new(),
            globals: Arena::new(),
            functions: Arena::new(),
            init: Function::new(init_name, TypeDb::UNIT, IrSpan::default()),
            exports: Vec::new(),
        }
    }

    /// Finds an exported global by name.
    pub fn export(&self, name: &str) -> Option<(GlobalId, &Global)> {
        let index = self
            .exports
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()?;
        let id = self.exports[index].global;
        self.globals.get(id).map(|g| (id, g))
    }

    /// Returns the name of `global`.
    pub fn global_name(&self, global: GlobalId) -> &str {
        self.globals
            .get(global)
            .map(|g| self.symbols.name(g.name))
            .unwrap_or("<unknown>")
    }

    /// Rebuilds `exports` from `globals`, sorted by name.
    pub fn export_all(&mut self) {
        let mut exports: Vec<Export> = self
            .globals
            .iter()
            .map(|(id, g)| Export {
                name: self.symbols.name(g.name).to_string(),
                global: id,
            })
            .collect();
        exports.sort_by(|a, b| a.name.cmp(&b.name));
        self.exports = exports;
    }
}

/// An imported module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// The dotted module id.
    pub module: String,
    /// The namespace name the import is bound to.
    pub alias: SymbolId,
    /// Fingerprint of the dependency this module was compiled against.
    pub fingerprint: Fingerprint,
}

/// A module global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    /// Its name.
    pub name: SymbolId,
    /// Declared with `var`.
    pub mutable: bool,
    /// Static type.
    pub ty: TypeId,
    /// Value or function.
    pub kind: GlobalKind,
}

/// What a global holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlobalKind {
    /// Assigned by the init function.
    Value,
    /// Bound to a function when the module is instantiated.
    Function(FuncId),
}

/// A function body with its local slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name.
    pub name: SymbolId,
    /// Parameter slots, in order. They are the first locals.
    pub params: Vec<LocalId>,
    /// All local slots, parameters included.
    pub locals: Arena<LocalId, Local>,
    /// Return type.
    pub ret: TypeId,
    /// Statements.
    pub body: Vec<Stmt>,
    /// Source range of the declaration.
    pub span: IrSpan,
}

impl Function {
    /// Creates an empty function.
    pub fn new(name: SymbolId, ret: TypeId, span: IrSpan) -> Self {
        Self {
            name,
            params: Vec::new(),
            locals: Arena::new(),
            ret,
            body: Vec::new(),
            span,
        }
    }
}

/// A local variable slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    /// Its name.
    pub name: SymbolId,
    /// Declared with `var` (parameters are immutable).
    pub mutable: bool,
    /// Static type.
    pub ty: TypeId,
}

/// An entry in the export list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    /// Exported name.
    pub name: String,
    /// The global it refers to.
    pub global: GlobalId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_with_globals(names: &[&str]) -> IrModule {
        let mut module = IrModule::new("demo");
        for name in names {
            let sym = module.symbols.intern(name);
            module.globals.alloc(Global {
                name: sym,
                mutable: false,
                ty: TypeDb::INT,
                kind: GlobalKind::Value,
            });
        }
        module.export_all();
        module
    }

    #[test]
    fn exports_are_sorted() {
        let module = module_with_globals(&["zeta", "alpha", "mid"]);
        let names: Vec<_> = module.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn export_lookup() {
        let module = module_with_globals(&["b", "a"]);
        let (id, global) = module.export("b").unwrap();
        assert_eq!(id, GlobalId::from_raw(0));
        assert_eq!(module.symbols.name(global.name), "b");
        assert!(module.export("c").is_none());
        assert_eq!(module.global_name(id), "b");
    }
}

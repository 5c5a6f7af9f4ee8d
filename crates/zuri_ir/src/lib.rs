//! Intermediate representation of compiled Zuri modules.
//!
//! An [`IrModule`] is a typed expression tree over module-local IDs. It is
//! what the cache stores (through [`codec`]) and what the runtime executes.

#![warn(missing_docs)]

pub mod arena;
pub mod codec;
pub mod error;
pub mod expr;
pub mod fold;
pub mod ids;
pub mod module;
pub mod symbols;
pub mod types;

pub use arena::{Arena, ArenaId};
pub use codec::{
    deserialize, deserialize_compat, peek_schema_version, serialize, CURRENT_SCHEMA_VERSION,
};
pub use error::SchemaError;
pub use expr::{BinaryOp, Builtin, Constant, Expr, ExprKind, IrSpan, Stmt, UnaryOp};
pub use fold::{fold_constants, foldable_operations};
pub use ids::{FuncId, GlobalId, ImportId, LocalId, SymbolId, TypeId};
pub use module::{Export, Function, Global, GlobalKind, Import, IrModule, Local};
pub use symbols::SymbolTable;
pub use types::{Type, TypeDb};

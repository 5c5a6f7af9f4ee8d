//! Opaque ID newtypes for IR entities.
//!
//! IDs are module-local: a [`GlobalId`] only means something inside the
//! [`IrModule`](crate::module::IrModule) that allocated it.

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub const fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// A type interned in the module's [`TypeDb`](crate::types::TypeDb).
    TypeId
);

define_id!(
    /// A name in the module's [`SymbolTable`](crate::symbols::SymbolTable).
    SymbolId
);

define_id!(
    /// A module-level global (value or function).
    GlobalId
);

define_id!(
    /// A function body.
    FuncId
);

define_id!(
    /// A parameter or local variable slot within one function.
    LocalId
);

define_id!(
    /// An imported dependency.
    ImportId
);

//! Types and the per-module type database.
//!
//! Every module owns a [`TypeDb`]. The five builtin types occupy fixed
//! slots, so [`TypeDb::INT`] and friends are valid in every database.

use crate::ids::TypeId;
use serde::{Deserialize, Serialize};

/// A Zuri type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    /// 64-bit signed integer.
    Int,
    /// Boolean.
    Bool,
    /// Immutable string.
    Str,
    /// The type of statements and of functions without a return value.
    Unit,
    /// Dynamically checked; unifies with every type.
    Any,
    /// A function signature.
    Function {
        /// Parameter types in order.
        params: Vec<TypeId>,
        /// Return type.
        ret: TypeId,
    },
}

/// Interned types for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDb {
    types: Vec<Type>,
}

impl Default for TypeDb {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeDb {
    /// `Int`
    pub const INT: TypeId = TypeId::from_raw(0);
    /// `Bool`
    pub const BOOL: TypeId = TypeId::from_raw(1);
    /// `Str`
    pub const STR: TypeId = TypeId::from_raw(2);
    /// `Unit`
    pub const UNIT: TypeId = TypeId::from_raw(3);
    /// `Any`
    pub const ANY: TypeId = TypeId::from_raw(4);

    /// Creates a database holding only the builtin types.
    pub fn new() -> Self {
        Self {
            types: vec![Type::Int, Type::Bool, Type::Str, Type::Unit, Type::Any],
        }
    }

    /// Interns a type, returning the existing ID for an identical type.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(i) = self.types.iter().position(|existing| existing == &ty) {
            return TypeId::from_raw(i as u32);
        }
        let id = TypeId::from_raw(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    /// Interns a function signature.
    pub fn function(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(Type::Function { params, ret })
    }

    /// Returns the type for `id`; IDs from another database read as `Any`.
    pub fn get(&self, id: TypeId) -> &Type {
        self.types.get(id.as_raw() as usize).unwrap_or(&Type::Any)
    }

    /// Looks up a builtin type by its source name.
    pub fn builtin(name: &str) -> Option<TypeId> {
        match name {
            "Int" => Some(Self::INT),
            "Bool" => Some(Self::BOOL),
            "Str" => Some(Self::STR),
            "Unit" => Some(Self::UNIT),
            "Any" => Some(Self::ANY),
            _ => None,
        }
    }

    /// Whether a value of type `b` may be used where `a` is expected.
    ///
    /// `Any` on either side is compatible; function types compare
    /// structurally.
    pub fn compatible(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (Type::Any, _) | (_, Type::Any) => true,
            (
                Type::Function { params: pa, ret: ra },
                Type::Function { params: pb, ret: rb },
            ) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(x, y)| self.compatible(*x, *y))
                    && self.compatible(*ra, *rb)
            }
            _ => false,
        }
    }

    /// Copies type `id` of `other` into this database.
    pub fn import(&mut self, other: &TypeDb, id: TypeId) -> TypeId {
        match other.get(id).clone() {
            Type::Function { params, ret } => {
                let params = params.iter().map(|p| self.import(other, *p)).collect();
                let ret = self.import(other, ret);
                self.function(params, ret)
            }
            ty => self.intern(ty),
        }
    }

    /// Renders a type the way it is written in source.
    pub fn display(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Int => "Int".to_string(),
            Type::Bool => "Bool".to_string(),
            Type::Str => "Str".to_string(),
            Type::Unit => "Unit".to_string(),
            Type::Any => "Any".to_string(),
            Type::Function { params, ret } => {
                let params: Vec<_> = params.iter().map(|p| self.display(*p)).collect();
                format!("({}) -> {}", params.join(", "), self.display(*ret))
            }
        }
    }

    /// Number of interned types, builtins included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always `false`: the builtins are present from construction.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_have_fixed_ids() {
        let db = TypeDb::new();
        assert_eq!(*db.get(TypeDb::INT), Type::Int);
        assert_eq!(*db.get(TypeDb::ANY), Type::Any);
        assert_eq!(TypeDb::builtin("Str"), Some(TypeDb::STR));
        assert_eq!(TypeDb::builtin("str"), None);
    }

    #[test]
    fn intern_deduplicates() {
        let mut db = TypeDb::new();
        let a = db.function(vec![TypeDb::INT], TypeDb::INT);
        let b = db.function(vec![TypeDb::INT], TypeDb::INT);
        assert_eq!(a, b);
        assert_eq!(db.len(), 6);
    }

    #[test]
    fn any_is_compatible() {
        let mut db = TypeDb::new();
        assert!(db.compatible(TypeDb::ANY, TypeDb::STR));
        assert!(db.compatible(TypeDb::INT, TypeDb::ANY));
        assert!(!db.compatible(TypeDb::INT, TypeDb::STR));
        let f = db.function(vec![TypeDb::INT], TypeDb::ANY);
        let g = db.function(vec![TypeDb::ANY], TypeDb::BOOL);
        assert!(db.compatible(f, g));
        assert!(!db.compatible(f, TypeDb::INT));
    }

    #[test]
    fn import_across_databases() {
        let mut src = TypeDb::new();
        let f = src.function(vec![TypeDb::STR, TypeDb::INT], TypeDb::BOOL);
        let mut dst = TypeDb::new();
        dst.function(vec![], TypeDb::UNIT);
        let g = dst.import(&src, f);
        assert_eq!(dst.display(g), "(Str, Int) -> Bool");
        assert_ne!(f, g);
    }

    #[test]
    fn foreign_id_reads_as_any() {
        let db = TypeDb::new();
        assert_eq!(*db.get(TypeId::from_raw(99)), Type::Any);
    }
}

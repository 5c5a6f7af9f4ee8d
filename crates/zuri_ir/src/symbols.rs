//! Module-local symbol table.

use crate::ids::SymbolId;
use serde::{Deserialize, Serialize};

/// Names used by one IR module, numbered in first-use order.
///
/// Interning is by linear scan. Modules are small and the table must not
/// depend on hash iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    names: Vec<String>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ID of `name`, adding it if needed.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.lookup(name) {
            return id;
        }
        let id = SymbolId::from_raw(self.names.len() as u32);
        self.names.push(name.to_string());
        id
    }

    /// Returns the ID of `name` if it is present.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| SymbolId::from_raw(i as u32))
    }

    /// Returns the name for `id`, or `None` for a foreign ID.
    pub fn get(&self, id: SymbolId) -> Option<&str> {
        self.names.get(id.as_raw() as usize).map(String::as_str)
    }

    /// Returns the name for `id`, or `"<unknown>"`.
    pub fn name(&self, id: SymbolId) -> &str {
        self.get(id).unwrap_or("<unknown>")
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

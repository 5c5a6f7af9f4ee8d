//! Runtime values.

use std::fmt;
use std::sync::Arc;

use zuri_ir::{Builtin, Constant, FuncId};

/// A function defined by an instantiated module.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FunctionRef {
    /// Index of the module instance.
    pub instance: usize,
    /// The function within that instance's IR.
    pub func: FuncId,
}

/// A value produced by evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// The unit value.
    Unit,
    /// 64-bit signed integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// Immutable string.
    Str(Arc<str>),
    /// A module function.
    Function(FunctionRef),
    /// A runtime builtin.
    Builtin(Builtin),
}

impl Value {
    /// The name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "Unit",
            Value::Int(_) => "Int",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "Str",
            Value::Function(_) | Value::Builtin(_) => "function",
        }
    }

    /// Shows the value the way the REPL echoes it: strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{s:?}"),
            other => other.to_string(),
        }
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Int(v) => Value::Int(*v),
            Constant::Bool(v) => Value::Bool(*v),
            Constant::Str(s) => Value::Str(Arc::from(s.as_str())),
            Constant::Unit => Value::Unit,
        }
    }
}

/// The display form used by `print` and `str`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Function(_) => write!(f, "<function>"),
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_repr() {
        let s = Value::Str(Arc::from("hi"));
        assert_eq!(s.to_string(), "hi");
        assert_eq!(s.repr(), "\"hi\"");
        assert_eq!(Value::Int(-4).repr(), "-4");
        assert_eq!(Value::Unit.to_string(), "()");
        assert_eq!(Value::Builtin(Builtin::Len).to_string(), "<builtin len>");
    }

    #[test]
    fn constants_convert() {
        assert_eq!(Value::from(&Constant::Int(3)), Value::Int(3));
        assert_eq!(Value::from(&Constant::Str("a".into())).type_name(), "Str");
        assert_eq!(Value::from(&Constant::Unit), Value::Unit);
    }
}

//! Expression and statement trees.

use crate::ids::{GlobalId, ImportId, LocalId, SymbolId, TypeId};
use serde::{Deserialize, Serialize};

/// A byte range in the module's source, kept for runtime error messages.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct IrSpan {
    /// Inclusive start offset.
    pub start: u32,
    /// Exclusive end offset.
    pub end: u32,
}

impl IrSpan {
    /// Creates a span.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// A compile-time constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constant {
    /// Integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
    /// The unit value.
    Unit,
}

/// Functions provided by the runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Builtin {
    /// `print(value)`: writes the display form of a value as one line.
    Print,
    /// `str(value)`: the display form as a string.
    Str,
    /// `len(s)`: length of a string in characters.
    Len,
}

impl Builtin {
    /// All builtins.
    pub const ALL: [Builtin; 3] = [Builtin::Print, Builtin::Str, Builtin::Len];

    /// The name the builtin is called by.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Str => "str",
            Builtin::Len => "len",
        }
    }

    /// Looks a builtin up by name.
    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// Prefix operators.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Integer negation.
    Neg,
    /// Boolean not.
    Not,
}

/// Infix operators. `And` and `Or` short-circuit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// The source spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// A typed expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// What the expression computes.
    pub kind: ExprKind,
    /// Static type.
    pub ty: TypeId,
    /// Source range.
    pub span: IrSpan,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// A constant.
    Const(Constant),
    /// A parameter or local of the enclosing function.
    Local(LocalId),
    /// A global of this module.
    Global(GlobalId),
    /// A global defined by an earlier REPL fragment, looked up by name.
    Session(SymbolId),
    /// An exported global of an imported module.
    Imported {
        /// Which import.
        import: ImportId,
        /// The exported name.
        symbol: SymbolId,
    },
    /// A runtime builtin.
    Builtin(Builtin),
    /// Prefix operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Infix operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Function call.
    Call {
        /// The called value.
        callee: Box<Expr>,
        /// Arguments.
        args: Vec<Expr>,
    },
}

/// Statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Initializes a local slot.
    Let {
        /// The slot.
        local: LocalId,
        /// Initial value.
        value: Expr,
    },
    /// Assigns a local slot.
    SetLocal {
        /// The slot.
        local: LocalId,
        /// New value.
        value: Expr,
    },
    /// Initializes or assigns a module global.
    SetGlobal {
        /// The global.
        global: GlobalId,
        /// New value.
        value: Expr,
    },
    /// Assigns a session global from an earlier REPL fragment.
    SetSession {
        /// The session name.
        symbol: SymbolId,
        /// New value.
        value: Expr,
    },
    /// Evaluates an expression for its effects.
    Expr(Expr),
    /// Conditional.
    If {
        /// Condition.
        cond: Expr,
        /// Taken when true.
        then_body: Vec<Stmt>,
        /// Taken when false.
        else_body: Vec<Stmt>,
    },
    /// Loop.
    While {
        /// Condition.
        cond: Expr,
        /// Body.
        body: Vec<Stmt>,
    },
    /// Returns from the enclosing function.
    Return(Option<Expr>),
}

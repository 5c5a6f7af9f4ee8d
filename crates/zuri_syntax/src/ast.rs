//! The syntax tree.
//!
//! A closed set of tagged variants. Every node carries its [`Span`] and
//! reports a [`NodeKind`] discriminant, so lowering can match exhaustively.

use zuri_common::Ident;
use zuri_source::Span;

/// Discriminant of every syntax tree node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    /// `import a.b as c`
    Import,
    /// `let`/`var` binding.
    Binding,
    /// `def` function declaration.
    Function,
    /// `name = value`
    Assign,
    /// `if` statement.
    If,
    /// `while` loop.
    While,
    /// `return` statement.
    Return,
    /// Expression used as a statement.
    ExprStmt,
    /// Integer literal.
    IntLiteral,
    /// String literal.
    StrLiteral,
    /// `true`/`false`.
    BoolLiteral,
    /// Name reference.
    Name,
    /// Prefix operator application.
    UnaryExpr,
    /// Infix operator application.
    BinaryExpr,
    /// Function call.
    CallExpr,
    /// `namespace.member`
    MemberExpr,
}

/// A parsed source unit.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntaxTree {
    /// Top-level items in source order.
    pub items: Vec<Item>,
    /// Span of the whole unit.
    pub span: Span,
}

impl SyntaxTree {
    /// Iterates over the import declarations.
    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.items.iter().filter_map(|item| match &item.kind {
            ItemKind::Import(import) => Some(import),
            _ => None,
        })
    }
}

/// A top-level item.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    /// What the item is.
    pub kind: ItemKind,
    /// Where it is.
    pub span: Span,
}

impl Item {
    /// The node discriminant.
    pub fn node_kind(&self) -> NodeKind {
        match &self.kind {
            ItemKind::Import(_) => NodeKind::Import,
            ItemKind::Binding(_) => NodeKind::Binding,
            ItemKind::Function(_) => NodeKind::Function,
            ItemKind::Stmt(stmt) => stmt.node_kind(),
        }
    }
}

/// Top-level item variants.
#[derive(Clone, Debug, PartialEq)]
pub enum ItemKind {
    /// An import of another module.
    Import(ImportDecl),
    /// A global `let`/`var`.
    Binding(Binding),
    /// A function.
    Function(FunctionDecl),
    /// Top-level code executed when the module is instantiated.
    Stmt(Stmt),
}

/// `import a.b` or `import a.b as c`.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportDecl {
    /// The dotted module path.
    pub path: Vec<Ident>,
    /// Optional local alias.
    pub alias: Option<Ident>,
    /// Span of the path.
    pub path_span: Span,
}

impl ImportDecl {
    /// The local namespace name: the alias, or the last path segment.
    pub fn binding_name(&self) -> Option<Ident> {
        self.alias.or_else(|| self.path.last().copied())
    }
}

/// `let name: T = value` or `var name = value`.
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    /// `true` for `var`.
    pub mutable: bool,
    /// The bound name.
    pub name: Ident,
    /// Span of the name.
    pub name_span: Span,
    /// Optional declared type.
    pub ty: Option<TypeExpr>,
    /// The initializer.
    pub value: Expr,
}

/// A type annotation such as `Int`.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeExpr {
    /// The type name.
    pub name: Ident,
    /// Where it was written.
    pub span: Span,
}

/// `def name(params) -> T { body }`
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    /// The function name.
    pub name: Ident,
    /// Span of the name.
    pub name_span: Span,
    /// Parameters in order.
    pub params: Vec<Param>,
    /// Optional declared return type.
    pub ret: Option<TypeExpr>,
    /// The body.
    pub body: Block,
}

/// A function parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Parameter name.
    pub name: Ident,
    /// Optional declared type.
    pub ty: Option<TypeExpr>,
    /// Span of the parameter.
    pub span: Span,
}

/// A braced statement list.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Statements in order.
    pub stmts: Vec<Stmt>,
    /// Span including the braces.
    pub span: Span,
}

/// A statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    /// What the statement is.
    pub kind: StmtKind,
    /// Where it is.
    pub span: Span,
}

impl Stmt {
    /// The node discriminant.
    pub fn node_kind(&self) -> NodeKind {
        match &self.kind {
            StmtKind::Binding(_) => NodeKind::Binding,
            StmtKind::Assign { .. } => NodeKind::Assign,
            StmtKind::If { .. } => NodeKind::If,
            StmtKind::While { .. } => NodeKind::While,
            StmtKind::Return(_) => NodeKind::Return,
            StmtKind::Expr(_) => NodeKind::ExprStmt,
        }
    }
}

/// Statement variants.
#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// A local (or, at top level, global) binding.
    Binding(Binding),
    /// `target = value`
    Assign {
        /// Assigned name.
        target: Ident,
        /// Span of the name.
        target_span: Span,
        /// New value.
        value: Expr,
    },
    /// `if cond { .. } else { .. }`; `else if` nests an `If` in the else block.
    If {
        /// Condition.
        cond: Expr,
        /// Taken when true.
        then_block: Block,
        /// Taken when false.
        else_block: Option<Block>,
    },
    /// `while cond { .. }`
    While {
        /// Loop condition.
        cond: Expr,
        /// Loop body.
        body: Block,
    },
    /// `return` with an optional value.
    Return(Option<Expr>),
    /// An expression evaluated for its effect (or, in the REPL, its value).
    Expr(Expr),
}

/// An expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// What the expression is.
    pub kind: ExprKind,
    /// Where it is.
    pub span: Span,
}

impl Expr {
    /// The node discriminant.
    pub fn node_kind(&self) -> NodeKind {
        match &self.kind {
            ExprKind::Int(_) => NodeKind::IntLiteral,
            ExprKind::Str(_) => NodeKind::StrLiteral,
            ExprKind::Bool(_) => NodeKind::BoolLiteral,
            ExprKind::Name(_) => NodeKind::Name,
            ExprKind::Unary { .. } => NodeKind::UnaryExpr,
            ExprKind::Binary { .. } => NodeKind::BinaryExpr,
            ExprKind::Call { .. } => NodeKind::CallExpr,
            ExprKind::Member { .. } => NodeKind::MemberExpr,
        }
    }
}

/// Expression variants.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Integer literal.
    Int(i64),
    /// String literal, escapes decoded.
    Str(String),
    /// Boolean literal.
    Bool(bool),
    /// A name.
    Name(Ident),
    /// `-x`, `!x`
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// `a + b` and friends.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// `callee(args)`
    Call {
        /// What is called.
        callee: Box<Expr>,
        /// Arguments in order.
        args: Vec<Expr>,
    },
    /// `base.member`
    Member {
        /// The namespace expression.
        base: Box<Expr>,
        /// The member name.
        member: Ident,
        /// Span of the member name.
        member_span: Span,
    },
}

/// Prefix operators.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `!`
    Not,
}

/// Infix operators.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

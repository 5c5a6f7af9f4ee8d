//! Token types produced by the lexer.
//!
//! Literal values are not stored in the token; the parser slices them out of
//! the source text using the token's span.

use std::fmt;
use zuri_source::Span;

/// A Zuri token kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TokenKind {
    // === Keywords ===
    /// `let`
    Let,
    /// `var`
    Var,
    /// `def`
    Def,
    /// `import`
    Import,
    /// `as`
    As,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `return`
    Return,
    /// `true`
    True,
    /// `false`
    False,

    // === Literals and names ===
    /// An identifier.
    Ident,
    /// A decimal integer literal, possibly with `_` separators.
    Int,
    /// A double-quoted string literal.
    Str,

    // === Punctuation ===
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `->`
    Arrow,
    /// `=`
    Assign,

    // === Operators ===
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,

    /// End of input.
    Eof,
}

impl TokenKind {
    /// A short human-readable description used in error messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Let => "'let'",
            TokenKind::Var => "'var'",
            TokenKind::Def => "'def'",
            TokenKind::Import => "'import'",
            TokenKind::As => "'as'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::Return => "'return'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Ident => "identifier",
            TokenKind::Int => "integer literal",
            TokenKind::Str => "string literal",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Arrow => "'->'",
            TokenKind::Assign => "'='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Bang => "'!'",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::GtEq => "'>='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Looks up a keyword token kind from an identifier string.
pub fn lookup_keyword(s: &str) -> Option<TokenKind> {
    let kind = match s {
        "let" => TokenKind::Let,
        "var" => TokenKind::Var,
        "def" => TokenKind::Def,
        "import" => TokenKind::Import,
        "as" => TokenKind::As,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "return" => TokenKind::Return,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => return None,
    };
    Some(kind)
}

/// A token with its source location.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// The source span covered by the token.
    pub span: Span,
    /// Whether a line break separates this token from the previous one.
    pub newline_before: bool,
}

//! Lexical analyzer for Zuri source text.
//!
//! Converts source text into a sequence of [`Token`]s. Whitespace and `#`
//! comments are skipped, but every token records whether a line break
//! preceded it so the parser can end statements at newlines.

use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::token::{lookup_keyword, Token, TokenKind};
use zuri_source::{FileId, Span, MAX_SOURCE_LEN};

/// Lexes the given source text into a vector of tokens.
///
/// The returned vector always ends with a [`TokenKind::Eof`] token. The
/// first lexical error aborts lexing.
pub fn lex(source: &str, file: FileId) -> Result<Vec<Token>, SyntaxError> {
    check_len(source.len(), file)?;
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        file,
        saw_newline: false,
    };
    lexer.lex_all()
}

/// Token offsets are `u32`, so longer input is refused up front.
fn check_len(len: usize, file: FileId) -> Result<(), SyntaxError> {
    if len > MAX_SOURCE_LEN {
        return Err(SyntaxError::new(
            SyntaxErrorKind::SourceTooLarge,
            format!("source is {len} bytes; the limit is {MAX_SOURCE_LEN}"),
            Span::point(file, 0),
        ));
    }
    Ok(())
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    file: FileId,
    saw_newline: bool,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let newline_before = std::mem::take(&mut self.saw_newline);
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::point(self.file, self.pos as u32),
                    newline_before,
                });
                return Ok(tokens);
            }
            let start = self.pos;
            let kind = self.next_kind()?;
            tokens.push(Token {
                kind,
                span: self.span_from(start),
                newline_before,
            });
        }
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let b = self.peek();
        self.pos += 1;
        b
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn error(&self, kind: SyntaxErrorKind, msg: impl Into<String>, start: usize) -> SyntaxError {
        SyntaxError::new(kind, msg, self.span_from(start))
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.source.len() {
            match self.peek() {
                b'\n' => {
                    self.saw_newline = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'#' => {
                    while self.pos < self.source.len() && self.peek() != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn next_kind(&mut self) -> Result<TokenKind, SyntaxError> {
        let start = self.pos;
        let b = self.advance();
        let kind = match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
                lookup_keyword(text).unwrap_or(TokenKind::Ident)
            }
            b'0'..=b'9' => {
                while self.peek().is_ascii_digit() || self.peek() == b'_' {
                    self.pos += 1;
                }
                if self.peek().is_ascii_alphabetic() {
                    while self.peek().is_ascii_alphanumeric() {
                        self.pos += 1;
                    }
                    return Err(self.error(
                        SyntaxErrorKind::InvalidLiteral,
                        "invalid suffix on integer literal",
                        start,
                    ));
                }
                TokenKind::Int
            }
            b'"' => self.lex_string(start)?,
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b'+' => TokenKind::Plus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'-' => self.pick(b'>', TokenKind::Arrow, TokenKind::Minus),
            b'=' => self.pick(b'=', TokenKind::EqEq, TokenKind::Assign),
            b'!' => self.pick(b'=', TokenKind::NotEq, TokenKind::Bang),
            b'<' => self.pick(b'=', TokenKind::LtEq, TokenKind::Lt),
            b'>' => self.pick(b'=', TokenKind::GtEq, TokenKind::Gt),
            b'&' if self.peek() == b'&' => {
                self.pos += 1;
                TokenKind::AndAnd
            }
            b'|' if self.peek() == b'|' => {
                self.pos += 1;
                TokenKind::OrOr
            }
            _ => {
                // Step over the whole UTF-8 sequence so the span stays on a
                // character boundary.
                while self.pos < self.source.len() && (self.peek() & 0xC0) == 0x80 {
                    self.pos += 1;
                }
                let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
                return Err(self.error(
                    SyntaxErrorKind::UnexpectedChar,
                    format!("unexpected character '{text}'"),
                    start,
                ));
            }
        };
        Ok(kind)
    }

    fn pick(&mut self, next: u8, two: TokenKind, one: TokenKind) -> TokenKind {
        if self.peek() == next {
            self.pos += 1;
            two
        } else {
            one
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        loop {
            match self.peek() {
                _ if self.pos >= self.source.len() => {
                    return Err(self.error(
                        SyntaxErrorKind::UnterminatedString,
                        "unterminated string literal",
                        start,
                    ))
                }
                b'\n' => {
                    return Err(self.error(
                        SyntaxErrorKind::UnterminatedString,
                        "string literal runs past the end of the line",
                        start,
                    ))
                }
                b'"' => {
                    self.pos += 1;
                    return Ok(TokenKind::Str);
                }
                b'\\' => {
                    self.pos += 1;
                    if self.pos < self.source.len() {
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
    }
}

/// Decodes the body of a string literal token (quotes included in `raw`).
pub fn unescape_string(raw: &str, span: Span) -> Result<String, SyntaxError> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::InvalidLiteral,
                    format!("unknown escape sequence '\\{other}'"),
                    span,
                ))
            }
            None => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::InvalidLiteral,
                    "dangling '\\' in string literal",
                    span,
                ))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source, FileId::from_raw(0))
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn oversized_input_is_refused() {
        let file = FileId::from_raw(3);
        assert!(check_len(MAX_SOURCE_LEN, file).is_ok());
        if let Some(len) = MAX_SOURCE_LEN.checked_add(1) {
            let err = check_len(len, file).unwrap_err();
            assert_eq!(err.kind, SyntaxErrorKind::SourceTooLarge);
            assert_eq!((err.span.start, err.span.end), (0, 0));
            assert!(!err.is_incomplete());
        }
    }

    #[test]
    fn let_binding() {
        assert_eq!(
            kinds("let x = 1 + 2"),
            vec![
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Int,
                TokenKind::Plus,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("-> == != <= >= && || < > ! -"),
            vec![
                TokenKind::Arrow,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Bang,
                TokenKind::Minus,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("# heading\nx # trailing"),
            vec![TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn newline_flag() {
        let tokens = lex("a\nb c", FileId::from_raw(0)).unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert!(!tokens[2].newline_before);
    }

    #[test]
    fn spans_cover_tokens() {
        let tokens = lex("let abc", FileId::from_raw(3)).unwrap();
        assert_eq!(tokens[1].span, Span::new(FileId::from_raw(3), 4, 7));
        assert_eq!(tokens[2].span, Span::point(FileId::from_raw(3), 7));
    }

    #[test]
    fn string_literal() {
        assert_eq!(
            kinds(r#"print("a \"b\"")"#),
            vec![
                TokenKind::Ident,
                TokenKind::LeftParen,
                TokenKind::Str,
                TokenKind::RightParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unterminated_string_errors() {
        let err = lex("\"abc", FileId::from_raw(0)).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnterminatedString);
        let err = lex("\"abc\ndef\"", FileId::from_raw(0)).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnterminatedString);
    }

    #[test]
    fn unexpected_character() {
        let err = lex("let x = 1 @ 2", FileId::from_raw(0)).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedChar);
        assert_eq!(err.span.start, 10);
        assert_eq!(err.message, "unexpected character '@'");
    }

    #[test]
    fn non_ascii_character_span() {
        let err = lex("é", FileId::from_raw(0)).unwrap_err();
        assert_eq!(err.span.end, 2);
    }

    #[test]
    fn integer_with_suffix_errors() {
        let err = lex("12abc", FileId::from_raw(0)).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::InvalidLiteral);
    }

    #[test]
    fn single_ampersand_errors() {
        let err = lex("a & b", FileId::from_raw(0)).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedChar);
    }

    #[test]
    fn unescape() {
        let s = unescape_string(r#""a\n\"q\"\\""#, Span::DUMMY).unwrap();
        assert_eq!(s, "a\n\"q\"\\");
        assert!(unescape_string(r#""\q""#, Span::DUMMY).is_err());
    }
}

//! Lazy token stream over a preprocessed C++ buffer (spec §4.2).
//!
//! The lexer tokenises on demand: [`Lexer::next_token`] advances and
//! returns one [`Token`]; [`Lexer::save`]/[`Lexer::restore`] let the parser
//! backtrack through speculative parses without re-tokenising from the
//! start (spec §4.3 `ScopedTokenPosition`).

pub mod keywords;
pub mod token;

pub use token::{NumericLiteralKind, NumericValue, Token, TokenKind};

use novacc_core::{CompilerSession, StringHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LexError {
    #[error("unterminated string literal at line {line}")]
    UnterminatedString { line: u32 },
    #[error("unterminated character literal at line {line}")]
    UnterminatedChar { line: u32 },
    #[error("unterminated raw string literal (delimiter `{delim}`) at line {line}")]
    UnterminatedRawString { line: u32, delim: String },
    #[error("invalid numeric literal `{text}` at line {line}")]
    InvalidNumericLiteral { line: u32, text: String },
}

impl LexError {
    /// Preprocessed-buffer `(line, column)` the error was raised at, for
    /// resolution through a [`novacc_core::linemap::LineMap`] (column is
    /// not tracked by the lexer's own error sites, so it defaults to 1).
    pub fn position(&self) -> (u32, u32) {
        let line = match self {
            LexError::UnterminatedString { line } => *line,
            LexError::UnterminatedChar { line } => *line,
            LexError::UnterminatedRawString { line, .. } => *line,
            LexError::InvalidNumericLiteral { line, .. } => *line,
        };
        (line, 1)
    }

    /// The error text without its trailing `at line N`, for callers that
    /// resolve and print the position themselves.
    pub fn message(&self) -> String {
        match self {
            LexError::UnterminatedString { .. } => "unterminated string literal".to_string(),
            LexError::UnterminatedChar { .. } => "unterminated character literal".to_string(),
            LexError::UnterminatedRawString { delim, .. } => {
                format!("unterminated raw string literal (delimiter `{delim}`)")
            }
            LexError::InvalidNumericLiteral { text, .. } => format!("invalid numeric literal `{text}`"),
        }
    }
}

pub type Result<T> = std::result::Result<T, LexError>;

/// Opaque cursor snapshot; restoring one rewinds the lexer to exactly the
/// byte offset/line/column it was taken at (spec §4.2 "saves/restores
/// cursor positions").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    offset: usize,
    line: u32,
    column: u32,
}

pub struct Lexer<'a> {
    session: &'a CompilerSession,
    bytes: &'a [u8],
    offset: usize,
    line: u32,
    column: u32,
    empty: StringHandle,
}

const MULTI_CHAR_OPERATORS: &[&str] = &[
    "<<=", ">>=", "<=>", "...", "->*", "::", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=",
    "&&", "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", ".*",
];

impl<'a> Lexer<'a> {
    pub fn new(session: &'a CompilerSession, buffer: &'a str) -> Self {
        Lexer {
            session,
            bytes: buffer.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
            empty: session.interner.intern(""),
        }
    }

    pub fn save(&self) -> Cursor {
        Cursor {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    pub fn restore(&mut self, cursor: Cursor) {
        self.offset = cursor.offset;
        self.line = cursor.line;
        self.column = cursor.column;
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.offset + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Tokenises and returns the next token, or an EOF token once the
    /// buffer is exhausted. Never returns `None`; callers check
    /// `TokenKind::Eof`.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let line = self.line;
        let column = self.column;
        let Some(b) = self.peek() else {
            return Ok(Token::eof(line, column, self.empty));
        };

        if b == b'"' {
            return self.lex_string(line, column);
        }
        if b == b'\'' {
            return self.lex_char(line, column);
        }
        if b == b'R' && self.peek_at(1) == Some(b'"') {
            return self.lex_raw_string(line, column);
        }
        if is_ident_start(b) {
            return Ok(self.lex_identifier(line, column));
        }
        if b.is_ascii_digit() || (b == b'.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
        {
            return self.lex_number(line, column);
        }
        self.lex_operator(line, column)
    }

    fn text_slice(&self, start: usize, end: usize) -> &str {
        std::str::from_utf8(&self.bytes[start..end]).unwrap_or("")
    }

    fn lex_identifier(&mut self, line: u32, column: u32) -> Token {
        let start = self.offset;
        while let Some(b) = self.peek() {
            if is_ident_continue(b) {
                self.bump();
            } else {
                break;
            }
        }
        let text = self.text_slice(start, self.offset);
        let kind = if keywords::is_keyword(text) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token {
            kind,
            text: self.session.interner.intern(text),
            line,
            column,
            numeric_value: None,
            numeric_kind: None,
        }
    }

    fn lex_number(&mut self, line: u32, column: u32) -> Result<Token> {
        let start = self.offset;
        let mut is_float = false;
        let mut is_hex = false;
        let mut is_binary = false;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            is_hex = true;
            self.bump();
            self.bump();
            while self
                .peek()
                .is_some_and(|b| b.is_ascii_hexdigit() || b == b'\'')
            {
                self.bump();
            }
        } else if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'b') | Some(b'B')) {
            is_binary = true;
            self.bump();
            self.bump();
            while self.peek().is_some_and(|b| b == b'0' || b == b'1' || b == b'\'') {
                self.bump();
            }
        } else {
            while self.peek().is_some_and(|b| b.is_ascii_digit() || b == b'\'') {
                self.bump();
            }
            if self.peek() == Some(b'.') {
                is_float = true;
                self.bump();
                while self.peek().is_some_and(|b| b.is_ascii_digit() || b == b'\'') {
                    self.bump();
                }
            }
            if matches!(self.peek(), Some(b'e') | Some(b'E')) && !is_hex {
                is_float = true;
                self.bump();
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.bump();
                }
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        let digits_end = self.offset;

        let mut suffix_start = self.offset;
        while self
            .peek()
            .is_some_and(|b| matches!(b, b'u' | b'U' | b'l' | b'L' | b'f' | b'F'))
        {
            self.bump();
        }
        let suffix = self.text_slice(suffix_start, self.offset).to_ascii_lowercase();
        suffix_start = digits_end;
        let _ = suffix_start;

        let digits_text = self.text_slice(start, digits_end).replace('\'', "");
        let full_text = self.text_slice(start, self.offset);

        let (value, kind) = if is_float || suffix.contains('f') {
            let parsed: f64 = digits_text
                .parse()
                .map_err(|_| LexError::InvalidNumericLiteral {
                    line,
                    text: full_text.to_string(),
                })?;
            let kind = if suffix.contains('f') {
                NumericLiteralKind::Float
            } else if suffix.contains('l') {
                NumericLiteralKind::LongDouble
            } else {
                NumericLiteralKind::Double
            };
            (NumericValue::Floating(parsed), kind)
        } else {
            let radix = if is_hex {
                16
            } else if is_binary {
                2
            } else if digits_text.starts_with('0') && digits_text.len() > 1 {
                8
            } else {
                10
            };
            let digits = if is_hex {
                digits_text.trim_start_matches("0x").trim_start_matches("0X")
            } else if is_binary {
                digits_text.trim_start_matches("0b").trim_start_matches("0B")
            } else {
                digits_text.as_str()
            };
            let parsed = u64::from_str_radix(digits, radix).map_err(|_| {
                LexError::InvalidNumericLiteral {
                    line,
                    text: full_text.to_string(),
                }
            })?;
            let is_unsigned = suffix.contains('u');
            let l_count = suffix.matches('l').count();
            let kind = match (is_unsigned, l_count) {
                (false, 0) => NumericLiteralKind::Int,
                (true, 0) => NumericLiteralKind::UnsignedInt,
                (false, 1) => NumericLiteralKind::Long,
                (true, 1) => NumericLiteralKind::UnsignedLong,
                (false, _) => NumericLiteralKind::LongLong,
                (true, _) => NumericLiteralKind::UnsignedLongLong,
            };
            (NumericValue::Integer(parsed), kind)
        };

        Ok(Token {
            kind: TokenKind::Literal,
            text: self.session.interner.intern(full_text),
            line,
            column,
            numeric_value: Some(value),
            numeric_kind: Some(kind),
        })
    }

    fn lex_string(&mut self, line: u32, column: u32) -> Result<Token> {
        let start = self.offset;
        self.bump(); // opening quote
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(LexError::UnterminatedString { line });
                }
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let text = self.text_slice(start, self.offset);
        Ok(Token {
            kind: TokenKind::StringLiteral,
            text: self.session.interner.intern(text),
            line,
            column,
            numeric_value: None,
            numeric_kind: None,
        })
    }

    /// Raw string literal `R"delim(...)delim"` (spec §4.2).
    fn lex_raw_string(&mut self, line: u32, column: u32) -> Result<Token> {
        let start = self.offset;
        self.bump(); // 'R'
        self.bump(); // '"'
        let delim_start = self.offset;
        while self.peek().is_some_and(|b| b != b'(') {
            self.bump();
        }
        let delimiter = self.text_slice(delim_start, self.offset).to_string();
        self.bump(); // '('
        let close = format!("){delimiter}\"");
        loop {
            if self.offset + close.len() <= self.bytes.len()
                && self.text_slice(self.offset, self.offset + close.len()) == close
            {
                for _ in 0..close.len() {
                    self.bump();
                }
                break;
            }
            if self.bump().is_none() {
                return Err(LexError::UnterminatedRawString {
                    line,
                    delim: delimiter,
                });
            }
        }
        let text = self.text_slice(start, self.offset);
        Ok(Token {
            kind: TokenKind::StringLiteral,
            text: self.session.interner.intern(text),
            line,
            column,
            numeric_value: None,
            numeric_kind: None,
        })
    }

    fn lex_char(&mut self, line: u32, column: u32) -> Result<Token> {
        let start = self.offset;
        self.bump(); // opening quote
        loop {
            match self.peek() {
                None | Some(b'\n') => return Err(LexError::UnterminatedChar { line }),
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b'\'') => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let text = self.text_slice(start, self.offset);
        Ok(Token {
            kind: TokenKind::CharLiteral,
            text: self.session.interner.intern(text),
            line,
            column,
            numeric_value: None,
            numeric_kind: None,
        })
    }

    /// Multi-char operators are matched greedily, longest first (spec
    /// §4.2: `<<=`, `>>=`, `<=>`, `->*`, `::`, `...`, ...).
    fn lex_operator(&mut self, line: u32, column: u32) -> Result<Token> {
        let start = self.offset;
        let remaining = self.text_slice(start, self.bytes.len());
        for op in MULTI_CHAR_OPERATORS {
            if remaining.starts_with(op) {
                for _ in 0..op.len() {
                    self.bump();
                }
                return Ok(Token {
                    kind: TokenKind::Operator,
                    text: self.session.interner.intern(op),
                    line,
                    column,
                    numeric_value: None,
                    numeric_kind: None,
                });
            }
        }
        let b = self.bump().expect("checked by caller");
        let text = (b as char).to_string();
        let kind = if matches!(b, b'(' | b')' | b'{' | b'}' | b'[' | b']' | b';' | b',') {
            TokenKind::Punctuator
        } else {
            TokenKind::Operator
        };
        Ok(Token {
            kind,
            text: self.session.interner.intern(&text),
            line,
            column,
            numeric_value: None,
            numeric_kind: None,
        })
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use novacc_core::{CompileContext, CompilerSession, ObjectFormat};

    fn session() -> CompilerSession {
        CompilerSession::new(CompileContext::new(ObjectFormat::Elf))
    }

    fn all_tokens(session: &CompilerSession, src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(session, src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let session = session();
        let toks = all_tokens(&session, "int main return_value");
        assert_eq!(toks[0].kind, TokenKind::Keyword);
        assert_eq!(toks[1].kind, TokenKind::Identifier);
        assert_eq!(&*session.interner.view(toks[1].text), "main");
        assert_eq!(toks[2].kind, TokenKind::Identifier);
    }

    #[test]
    fn lexes_greedy_multi_char_operators() {
        let session = session();
        let toks = all_tokens(&session, "a<=>b<<=c");
        let texts: Vec<String> = toks
            .iter()
            .map(|t| session.interner.view(t.text).to_string())
            .collect();
        assert!(texts.contains(&"<=>".to_string()));
        assert!(texts.contains(&"<<=".to_string()));
    }

    #[test]
    fn lexes_integer_and_float_suffixes() {
        let session = session();
        let toks = all_tokens(&session, "42ull 3.14f 0x1F 0b101");
        assert_eq!(toks[0].numeric_kind, Some(NumericLiteralKind::UnsignedLongLong));
        assert_eq!(toks[1].numeric_kind, Some(NumericLiteralKind::Float));
        match toks[2].numeric_value {
            Some(NumericValue::Integer(v)) => assert_eq!(v, 31),
            _ => panic!("expected hex integer"),
        }
        match toks[3].numeric_value {
            Some(NumericValue::Integer(v)) => assert_eq!(v, 5),
            _ => panic!("expected binary integer"),
        }
    }

    #[test]
    fn lexes_raw_string_literal() {
        let session = session();
        let toks = all_tokens(&session, r####"R"del(a)b)del")####);
        assert_eq!(toks[0].kind, TokenKind::StringLiteral);
    }

    #[test]
    fn save_restore_rewinds_cursor() {
        let session = session();
        let mut lexer = Lexer::new(&session, "foo bar");
        let first = lexer.next_token().unwrap();
        let checkpoint = lexer.save();
        let _second = lexer.next_token().unwrap();
        lexer.restore(checkpoint);
        let second_again = lexer.next_token().unwrap();
        assert_eq!(
            session.interner.view(first.text).as_ref(),
            "foo"
        );
        assert_eq!(
            session.interner.view(second_again.text).as_ref(),
            "bar"
        );
    }
}

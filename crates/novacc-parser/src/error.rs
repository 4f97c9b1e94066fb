//! Parser error taxonomy (spec §4.3, §7 `Parse`).

use novacc_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct TokenInfo {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{line}:{column}: unexpected token `{found}`, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        line: u32,
        column: u32,
    },
    #[error("{line}:{column}: missing `;`")]
    MissingSemicolon { line: u32, column: u32 },
    #[error("{line}:{column}: `{name}` redefined with an incompatible kind")]
    RedefinedSymbolWithDifferentValue { name: String, line: u32, column: u32 },
    #[error("{line}:{column}: construct not implemented: {what}")]
    NotImplemented { what: String, line: u32, column: u32 },
    #[error("{line}:{column}: {message}")]
    Semantic {
        message: String,
        line: u32,
        column: u32,
    },
    #[error(transparent)]
    Lex(#[from] novacc_lexer::LexError),
    #[error(transparent)]
    Template(#[from] novacc_core::templates::TemplateError),
}

impl ParserError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            ParserError::Semantic { .. } => ErrorKind::Semantic,
            _ => ErrorKind::Parse,
        }
    }

    /// Preprocessed-buffer `(line, column)` the error was raised at, for
    /// resolution through the session's [`novacc_core::linemap::LineMap`]
    /// (spec §7's `<file>:<line>:<col>` format).
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            ParserError::UnexpectedToken { line, column, .. }
            | ParserError::MissingSemicolon { line, column }
            | ParserError::RedefinedSymbolWithDifferentValue { line, column, .. }
            | ParserError::NotImplemented { line, column, .. }
            | ParserError::Semantic { line, column, .. } => Some((*line, *column)),
            ParserError::Lex(e) => Some(e.position()),
            ParserError::Template(_) => None,
        }
    }

    /// The error text without its leading `line:column:` prefix, for
    /// callers that already resolve and print the position themselves
    /// (e.g. via a [`novacc_core::Diagnostic`]) and would otherwise double
    /// it up.
    pub fn message(&self) -> String {
        match self {
            ParserError::UnexpectedToken { found, expected, .. } => {
                format!("unexpected token `{found}`, expected {expected}")
            }
            ParserError::MissingSemicolon { .. } => "missing `;`".to_string(),
            ParserError::RedefinedSymbolWithDifferentValue { name, .. } => {
                format!("`{name}` redefined with an incompatible kind")
            }
            ParserError::NotImplemented { what, .. } => format!("construct not implemented: {what}"),
            ParserError::Semantic { message, .. } => message.clone(),
            ParserError::Lex(e) => e.message(),
            ParserError::Template(e) => e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParserError>;

//! Preprocessor error taxonomy (spec §4.1, §7 `Preprocess`/`Io`).

use novacc_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unterminated block comment starting at line {line}")]
    UnterminatedComment { line: u32 },
    #[error("#endif without matching #if at line {line}")]
    UnmatchedEndif { line: u32 },
    #[error("#elif without matching #if at line {line}")]
    UnmatchedElif { line: u32 },
    #[error("#else without matching #if at line {line}")]
    UnmatchedElse { line: u32 },
    #[error("{message}")]
    ErrorDirective { message: String, line: u32 },
    #[error("include file not found: {name}")]
    IncludeNotFound { name: String },
    #[error("include depth exceeded ({max})")]
    IncludeDepthExceeded { max: u32 },
    #[error("malformed macro argument list for `{name}` at line {line}")]
    MalformedMacroArgs { name: String, line: u32 },
    #[error("`#{directive}` expects {expected} at line {line}")]
    MalformedDirective {
        directive: String,
        expected: String,
        line: u32,
    },
}

impl PreprocessError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            PreprocessError::Io { .. } => ErrorKind::Io,
            _ => ErrorKind::Preprocess,
        }
    }
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

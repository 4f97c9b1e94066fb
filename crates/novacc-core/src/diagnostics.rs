//! Error taxonomy and user-visible diagnostic rendering (spec §7).
//!
//! Phase crates define their own `thiserror` error enums; [`ErrorKind`] is
//! the abstract classification from spec §7 that every phase-level error
//! maps onto, so the driver can apply a single recovery policy regardless
//! of which phase failed.

use crate::interner::{Interner, StringHandle};
use crate::linemap::LineMap;
use codespan_reporting::diagnostic::{Diagnostic as CrDiagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::{self, termcolor::Buffer};

/// Abstract error kind (spec §7 table). Used for recovery-policy dispatch:
/// `ConstexprTemplateDependent` is the only variant the caller is expected
/// to recover from by deferring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Preprocess,
    Parse,
    Semantic,
    ConstexprTemplateDependent,
    ConstexprHard,
    Codegen,
    Internal,
}

impl ErrorKind {
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::ConstexprTemplateDependent)
    }

    /// Per spec §7: codegen errors are isolated to the offending function;
    /// everything else is fatal for the translation unit.
    pub fn is_function_local(self) -> bool {
        matches!(self, ErrorKind::Codegen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single source position resolved through the line map: preprocessed
/// line, plus the (file, source line, column) it was produced from.
#[derive(Debug, Clone, Copy)]
pub struct SourcePos {
    pub preprocessed_line: u32,
    pub column: u32,
}

/// A fully formed diagnostic ready for rendering, carrying the include
/// chain needed for the "included from" trailer (spec §7).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    pub pos: Option<SourcePos>,
}

impl Diagnostic {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            kind,
            message: message.into(),
            pos: None,
        }
    }

    pub fn warning(kind: ErrorKind, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            kind,
            message: message.into(),
            pos: None,
        }
    }

    pub fn at(mut self, pos: SourcePos) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Renders `<file>:<line>:<col>: error: <message>` followed by the
    /// `included from <file>:<line>` chain, per spec §7.
    pub fn render(&self, interner: &Interner, line_map: &LineMap) -> String {
        let mut out = String::new();
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if let Some(pos) = self.pos {
            if let Some(entry) = line_map.get(pos.preprocessed_line) {
                let file = interner.view(line_map.file_name(entry.source_file_index));
                out.push_str(&format!(
                    "{}:{}:{}: {}: {}\n",
                    file, entry.source_line, pos.column, label, self.message
                ));
                let chain = line_map.include_chain(pos.preprocessed_line);
                for (file, line) in chain.iter().skip(1) {
                    out.push_str(&format!("included from {}:{}\n", interner.view(*file), line));
                }
                return out;
            }
        }
        format!("<unknown>: {}: {}\n", label, self.message)
    }

    /// Same rendering, but via `codespan-reporting`'s terminal emitter for
    /// a richer (source-snippet, underline) presentation when a full source
    /// buffer is available.
    pub fn render_rich(
        &self,
        file_name: &str,
        source: &str,
        byte_offset: usize,
    ) -> String {
        let mut files = SimpleFiles::new();
        let id = files.add(file_name, source);
        let mut diag = match self.severity {
            Severity::Error => CrDiagnostic::error(),
            Severity::Warning => CrDiagnostic::warning(),
        };
        diag = diag
            .with_message(self.message.clone())
            .with_labels(vec![Label::primary(id, byte_offset..byte_offset)]);
        let config = term::Config::default();
        let mut buffer = Buffer::no_color();
        let _ = term::emit(&mut buffer, &config, &files, &diag);
        String::from_utf8_lossy(buffer.as_slice()).into_owned()
    }
}

/// Resolves the file/line/column string for a raw preprocessed position,
/// independent of severity — used by the lexer/parser to attach positions
/// to tokens and AST nodes without pulling in the full `Diagnostic` type.
pub fn resolve_position(
    line_map: &LineMap,
    preprocessed_line: u32,
    column: u32,
) -> Option<(StringHandle, u32, u32)> {
    line_map
        .get(preprocessed_line)
        .map(|entry| (line_map.file_name(entry.source_file_index), entry.source_line, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_file_line_col_and_chain() {
        let interner = Interner::new();
        let mut map = LineMap::new();
        let top = map.register_file(interner.intern("main.cpp"));
        let header = map.register_file(interner.intern("a.h"));
        map.append_line_with_tracking(top, 1, 0);
        map.append_line_with_tracking(header, 5, 1);
        let diag = Diagnostic::error(ErrorKind::Semantic, "undefined variable")
            .at(SourcePos {
                preprocessed_line: 2,
                column: 7,
            });
        let rendered = diag.render(&interner, &map);
        assert!(rendered.starts_with("a.h:5:7: error: undefined variable"));
        assert!(rendered.contains("included from main.cpp:1"));
    }
}

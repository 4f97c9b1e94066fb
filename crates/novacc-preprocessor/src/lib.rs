//! C++ preprocessor for `novacc` (spec §4.1): directive processing, macro
//! expansion, and line-map construction, producing the single flat
//! character buffer the lexer consumes.

pub mod builtins;
pub mod comments;
pub mod conditional;
pub mod directives;
pub mod error;
pub mod expr;
pub mod file_loader;
pub mod macros;

pub use directives::{PreprocessOutput, Preprocessor};
pub use error::{PreprocessError, Result};
pub use file_loader::{FileLoader, MemoryFileLoader, OsFileLoader};
pub use macros::{MacroDef, MacroTable};

/// Renders the `-E` preprocessed-line marker (spec §6.3): `# <line>
/// "<file>"`, emitted whenever the current `(file, line)` diverges from
/// what would follow sequentially from the previous output line.
pub fn format_line_marker(line: u32, file: &str) -> String {
    format!("# {line} \"{file}\"")
}

/// Reconstructs `-E` output from a preprocessed buffer and its line map:
/// inserts a marker line before each run of lines whose (file, source
/// line) stops following on sequentially from the previous run.
pub fn render_with_markers(
    buffer: &str,
    line_map: &novacc_core::LineMap,
    interner: &novacc_core::Interner,
) -> String {
    let mut out = String::new();
    let mut prev: Option<(u32, u32)> = None;
    for (i, text) in buffer.lines().enumerate() {
        let preprocessed_line = (i + 1) as u32;
        if let Some(entry) = line_map.get(preprocessed_line) {
            let seq_ok = prev
                .map(|(f, l)| f == entry.source_file_index && l + 1 == entry.source_line)
                .unwrap_or(false);
            if !seq_ok {
                let file = interner.view(line_map.file_name(entry.source_file_index));
                out.push_str(&format_line_marker(entry.source_line, &file));
                out.push('\n');
            }
            prev = Some((entry.source_file_index, entry.source_line));
        }
        out.push_str(text);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_loader::MemoryFileLoader;
    use novacc_core::{CompileContext, CompilerSession, ObjectFormat};
    use std::path::Path;

    #[test]
    fn render_with_markers_flags_a_jump_after_an_include() {
        let mut loader = MemoryFileLoader::new();
        loader.add("main.cpp", "#include \"a.h\"\nint x;\n");
        loader.add("a.h", "int from_a;\n");
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        let pp = Preprocessor::new(&session, &loader, vec![]);
        let out = pp.run(Path::new("main.cpp")).unwrap();
        let rendered = render_with_markers(
            &out.buffer,
            &session.line_map.borrow(),
            &session.interner,
        );
        assert!(rendered.contains("# 1 \"a.h\""));
        assert!(rendered.contains("# 2 \"main.cpp\""));
    }
}

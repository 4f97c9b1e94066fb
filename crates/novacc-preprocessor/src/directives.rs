//! The line-driven directive state machine (spec §4.1): joins continuation
//! lines and strips comments once per file, then walks the result
//! recognising directives at the first non-space column and dispatching to
//! `#include`/`#define`/conditional-stack/`#line`/`#pragma`/`#error`
//! handling, expanding macros on every line that survives the conditional
//! stack.

use crate::builtins;
use crate::comments::{join_continuations, strip_comments};
use crate::conditional::ConditionalStack;
use crate::error::{PreprocessError, Result};
use crate::file_loader::{resolve_include, FileLoader};
use crate::macros::{expand_line, MacroDef, MacroTable};
use novacc_core::{CompilerSession, StringHandle};
use std::collections::{HashSet};
use std::path::{Path, PathBuf};

struct IncludeFrame {
    dir: Option<PathBuf>,
    found_at_dir: Option<usize>,
}

/// Output of a full preprocessing run: the flat buffer ready for the lexer,
/// plus marker positions for `-E` output (spec §6.3), reconstructed from
/// the session's line map after the fact by the caller.
pub struct PreprocessOutput {
    pub buffer: String,
}

pub struct Preprocessor<'a> {
    session: &'a CompilerSession,
    loader: &'a dyn FileLoader,
    include_dirs: Vec<PathBuf>,
    macros: MacroTable,
    counter: u64,
    pragma_once: HashSet<PathBuf>,
    include_stack: Vec<IncludeFrame>,
    cond: ConditionalStack,
    output: String,
    date_str: String,
    timestamp_str: String,
    max_include_depth: u32,
}

impl<'a> Preprocessor<'a> {
    pub fn new(
        session: &'a CompilerSession,
        loader: &'a dyn FileLoader,
        include_dirs: Vec<PathBuf>,
    ) -> Self {
        let mut macros = MacroTable::new();
        let identity = session.context.borrow().identity;
        builtins::seed(&mut macros, identity);
        let limits = novacc_core::config::Limits::default();
        Preprocessor {
            session,
            loader,
            include_dirs,
            macros,
            counter: 0,
            pragma_once: HashSet::new(),
            include_stack: Vec::new(),
            cond: ConditionalStack::new(),
            output: String::new(),
            date_str: "Jan  1 1970".to_string(),
            timestamp_str: "Thu Jan  1 00:00:00 1970".to_string(),
            max_include_depth: limits.max_include_depth,
        }
    }

    pub fn define(&mut self, name: &str, body: &str) {
        self.macros.define(MacroDef {
            name: name.to_string(),
            is_function_like: false,
            params: Vec::new(),
            is_variadic: false,
            body: body.to_string(),
        });
    }

    /// Runs the full pipeline starting from `path`, returning the flat
    /// preprocessed buffer. Also populates `session.line_map` as a side
    /// effect (spec §3.8).
    pub fn run(mut self, path: &Path) -> Result<PreprocessOutput> {
        self.read_file(path, 0)?;
        Ok(PreprocessOutput {
            buffer: self.output,
        })
    }

    fn intern_path(&self, path: &Path) -> StringHandle {
        self.session.interner.intern(&path.to_string_lossy())
    }

    fn read_file(&mut self, path: &Path, include_line: u32) -> Result<()> {
        if self.include_stack.len() as u32 >= self.max_include_depth {
            return Err(PreprocessError::IncludeDepthExceeded {
                max: self.max_include_depth,
            });
        }
        let canonical = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        if self.pragma_once.contains(&canonical) {
            return Ok(());
        }

        let raw = self
            .loader
            .read_to_string(path)
            .map_err(|e| PreprocessError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        let joined = join_continuations(&raw);
        let stripped = strip_comments(&joined)?;

        let name_handle = self.intern_path(path);
        let file_index = self.session.line_map.borrow_mut().register_file(name_handle);
        let dir = path.parent().map(|p| p.to_path_buf());
        self.include_stack.push(IncludeFrame {
            dir,
            found_at_dir: None,
        });

        let mut saw_pragma_once = false;
        let mut logical_line_override: Option<u32> = None;
        let mut physical_line = 0u32;

        for raw_line in stripped.split('\n') {
            physical_line += 1;
            // `split('\n')` yields a trailing empty element for a
            // newline-terminated file; skip it rather than emitting a
            // phantom blank output line.
            if physical_line as usize == stripped.split('\n').count()
                && raw_line.is_empty()
                && stripped.ends_with('\n')
            {
                continue;
            }
            let logical_line = logical_line_override.unwrap_or(physical_line);
            let trimmed_start = raw_line.trim_start();
            if let Some(rest) = trimmed_start.strip_prefix('#') {
                let once = self.handle_directive(
                    rest.trim_start(),
                    path,
                    logical_line,
                    include_line,
                    &mut logical_line_override,
                )?;
                if once {
                    saw_pragma_once = true;
                }
                continue;
            }
            if self.cond.is_skipping() {
                continue;
            }
            let expanded = expand_line(
                raw_line,
                &self.macros,
                &mut HashSet::new(),
                &mut self.counter,
                &path.display().to_string(),
                logical_line,
                &self.date_str,
                &self.timestamp_str,
            );
            self.output.push_str(&expanded);
            self.output.push('\n');
            self.session
                .line_map
                .borrow_mut()
                .append_line_with_tracking(file_index, logical_line, include_line);
            if logical_line_override.is_some() {
                logical_line_override = Some(logical_line + 1);
            }
        }

        if self.cond.depth() != 0 {
            return Err(PreprocessError::UnmatchedEndif {
                line: physical_line,
            });
        }

        self.include_stack.pop();
        if saw_pragma_once {
            self.pragma_once.insert(canonical);
        }
        Ok(())
    }

    /// Handles one `#`-directive line (the `#` and leading space already
    /// stripped). Returns `true` iff this file should be marked
    /// `#pragma once`.
    fn handle_directive(
        &mut self,
        rest: &str,
        current_file: &Path,
        line: u32,
        include_line: u32,
        logical_line_override: &mut Option<u32>,
    ) -> Result<bool> {
        let (keyword, tail) = split_keyword(rest);
        match keyword {
            "define" if !self.cond.is_skipping() => {
                self.handle_define(tail, line)?;
            }
            "undef" if !self.cond.is_skipping() => {
                self.macros.undef(tail.trim());
            }
            "include" => {
                if !self.cond.is_skipping() {
                    self.handle_include(tail, current_file, line, include_line, None)?;
                }
            }
            "include_next" => {
                if !self.cond.is_skipping() {
                    let start_after = self.include_stack.last().and_then(|f| f.found_at_dir);
                    self.handle_include(tail, current_file, line, include_line, start_after)?;
                }
            }
            "if" => {
                let cond = if self.cond.is_skipping() {
                    false
                } else {
                    self.eval_condition(tail)?
                };
                self.cond.push_if(cond);
            }
            "ifdef" => {
                let cond = !self.cond.is_skipping() && self.macros.is_defined(tail.trim());
                self.cond.push_if(cond);
            }
            "ifndef" => {
                let cond = self.cond.is_skipping() || !self.macros.is_defined(tail.trim());
                self.cond.push_if(cond);
            }
            "elif" => {
                let tail = tail.to_string();
                let macros = &self.macros;
                let counter = &mut self.counter;
                let date = self.date_str.clone();
                let ts = self.timestamp_str.clone();
                let result = {
                    let mut err = None;
                    let evaluated = self.cond.elif(|| {
                        match eval_condition_text(&tail, macros, counter, &date, &ts) {
                            Ok(v) => v,
                            Err(e) => {
                                err = Some(e);
                                false
                            }
                        }
                    });
                    if let Some(e) = err {
                        return Err(e);
                    }
                    evaluated
                };
                result.map_err(|_| PreprocessError::MalformedDirective {
                    directive: "elif".into(),
                    expected: "matching #if".into(),
                    line,
                })?;
            }
            "else" => {
                self.cond
                    .else_branch()
                    .map_err(|_| PreprocessError::UnmatchedElse { line })?;
            }
            "endif" => {
                self.cond
                    .endif()
                    .map_err(|_| PreprocessError::UnmatchedEndif { line })?;
            }
            "pragma" if !self.cond.is_skipping() => {
                return self.handle_pragma(tail, current_file);
            }
            "line" if !self.cond.is_skipping() => {
                self.handle_line(tail, logical_line_override);
            }
            "error" if !self.cond.is_skipping() => {
                return Err(PreprocessError::ErrorDirective {
                    message: tail.trim().to_string(),
                    line,
                });
            }
            "warning" => {
                tracing::warn!(target: "novacc::preprocess", "{}", tail.trim());
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_define(&mut self, tail: &str, line: u32) -> Result<()> {
        let tail = tail.trim_start();
        let name_end = tail
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(tail.len());
        if name_end == 0 {
            return Err(PreprocessError::MalformedDirective {
                directive: "define".into(),
                expected: "a macro name".into(),
                line,
            });
        }
        let name = tail[..name_end].to_string();
        let rest = &tail[name_end..];
        if let Some(stripped) = rest.strip_prefix('(') {
            // Function-like: parse parameter list up to the matching ')'.
            let close = stripped.find(')').ok_or_else(|| PreprocessError::MalformedDirective {
                directive: "define".into(),
                expected: "`)` closing parameter list".into(),
                line,
            })?;
            let params_str = &stripped[..close];
            let mut is_variadic = false;
            let mut params = Vec::new();
            for p in params_str.split(',') {
                let p = p.trim();
                if p.is_empty() {
                    continue;
                }
                if p == "..." {
                    is_variadic = true;
                } else {
                    params.push(p.to_string());
                }
            }
            let body = stripped[close + 1..].trim().to_string();
            self.macros.define(MacroDef {
                name,
                is_function_like: true,
                params,
                is_variadic,
                body,
            });
        } else {
            let body = rest.trim().to_string();
            self.macros.define(MacroDef {
                name,
                is_function_like: false,
                params: Vec::new(),
                is_variadic: false,
                body,
            });
        }
        Ok(())
    }

    fn handle_include(
        &mut self,
        tail: &str,
        current_file: &Path,
        line: u32,
        include_line_of_parent: u32,
        start_after_dir: Option<usize>,
    ) -> Result<()> {
        let expanded = expand_line(
            tail,
            &self.macros,
            &mut HashSet::new(),
            &mut self.counter,
            &current_file.display().to_string(),
            line,
            &self.date_str,
            &self.timestamp_str,
        );
        let trimmed = expanded.trim();
        let (name, quoted) = if let Some(rest) = trimmed.strip_prefix('"') {
            (rest.trim_end_matches('"').to_string(), true)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            (rest.trim_end_matches('>').to_string(), false)
        } else {
            return Err(PreprocessError::MalformedDirective {
                directive: "include".into(),
                expected: "\"file\" or <file>".into(),
                line,
            });
        };
        let current_dir = self.include_stack.last().and_then(|f| f.dir.as_deref());
        let resolved = resolve_include(
            self.loader,
            &name,
            quoted,
            current_dir,
            &self.include_dirs,
            start_after_dir,
        );
        match resolved {
            Some((resolved_path, found_at)) => {
                if let Some(frame) = self.include_stack.last_mut() {
                    frame.found_at_dir = Some(found_at);
                }
                // The including line, in the *output* stream, is the line
                // just produced for this directive's position.
                let parent_preprocessed_line =
                    self.session.line_map.borrow().len() as u32 + 1;
                let _ = include_line_of_parent;
                self.read_file(&resolved_path, parent_preprocessed_line)?;
                Ok(())
            }
            None => Err(PreprocessError::IncludeNotFound { name }),
        }
    }

    /// `#pragma once` and `#pragma pack(...)`. Pack directives are passed
    /// through to the output verbatim (spec §4.1) so the parser can apply
    /// them to struct layout (SPEC_FULL.md §C.4); every other `#pragma`
    /// (including vendor-specific ones the original ignores) is dropped.
    fn handle_pragma(&mut self, tail: &str, _current_file: &Path) -> Result<bool> {
        let trimmed = tail.trim();
        if trimmed == "once" {
            return Ok(true);
        }
        if trimmed.starts_with("pack") {
            self.output.push_str("#pragma ");
            self.output.push_str(trimmed);
            self.output.push('\n');
        }
        Ok(false)
    }

    fn handle_line(&mut self, tail: &str, logical_line_override: &mut Option<u32>) {
        let trimmed = tail.trim();
        if let Some(n) = trimmed.split_whitespace().next() {
            if let Ok(v) = n.parse::<u32>() {
                *logical_line_override = Some(v);
            }
        }
    }

    /// Evaluates an `#if`/`#elif` expression: special-cases `defined(x)`/
    /// `defined x`/`__has_builtin(x)` (arguments not macro-expanded), then
    /// macro-expands the remainder and evaluates with [`crate::expr::eval`].
    fn eval_condition(&mut self, expr: &str) -> Result<bool> {
        eval_condition_text(
            expr,
            &self.macros,
            &mut self.counter,
            &self.date_str,
            &self.timestamp_str,
        )
        .map_err(|message| PreprocessError::MalformedDirective {
            directive: "if".into(),
            expected: message,
            line: 0,
        })
    }
}

fn eval_condition_text(
    expr: &str,
    macros: &MacroTable,
    counter: &mut u64,
    date_str: &str,
    timestamp_str: &str,
) -> std::result::Result<bool, String> {
    let resolved = resolve_defined_and_has_builtin(expr, macros);
    let expanded = expand_line(
        &resolved,
        macros,
        &mut HashSet::new(),
        counter,
        "<if>",
        0,
        date_str,
        timestamp_str,
    );
    crate::expr::eval(&expanded).map(|v| v != 0)
}

/// Textually replaces `defined(NAME)`/`defined NAME`/`__has_builtin(NAME)`
/// with `1`/`0` before macro expansion runs, since their operands must not
/// themselves be expanded (spec §4.1).
fn resolve_defined_and_has_builtin(expr: &str, macros: &MacroTable) -> String {
    let known_builtins = [
        "__builtin_clz",
        "__builtin_clzll",
        "__builtin_ctz",
        "__builtin_ctzll",
        "__builtin_popcount",
        "__builtin_popcountll",
        "__builtin_ffs",
        "__builtin_constant_p",
        "__builtin_abs",
    ];
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::new();
    let mut i = 0usize;
    while i < chars.len() {
        if let Some((kw, value_fn)) = ["defined", "__has_builtin"].iter().find_map(|kw| {
            if chars[i..].iter().collect::<String>().starts_with(kw) {
                let after = i + kw.len();
                let boundary = chars.get(after).map(|c| !c.is_alphanumeric() && *c != '_').unwrap_or(true);
                if boundary {
                    Some((*kw, after))
                } else {
                    None
                }
            } else {
                None
            }
        }) {
            let mut j = value_fn;
            while chars.get(j) == Some(&' ') {
                j += 1;
            }
            let paren = chars.get(j) == Some(&'(');
            if paren {
                j += 1;
            }
            while chars.get(j) == Some(&' ') {
                j += 1;
            }
            let start = j;
            while chars.get(j).map(|c| c.is_alphanumeric() || *c == '_').unwrap_or(false) {
                j += 1;
            }
            let name: String = chars[start..j].iter().collect();
            if paren {
                while chars.get(j) == Some(&' ') {
                    j += 1;
                }
                if chars.get(j) == Some(&')') {
                    j += 1;
                }
            }
            let truth = if kw == "defined" {
                macros.is_defined(&name)
            } else {
                known_builtins.contains(&name.as_str())
            };
            out.push_str(if truth { "1" } else { "0" });
            i = j;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn split_keyword(rest: &str) -> (&str, &str) {
    let end = rest
        .find(|c: char| !c.is_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    (&rest[..end], rest[end..].trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_loader::MemoryFileLoader;
    use novacc_core::{CompileContext, CompilerSession, ObjectFormat};

    fn run(files: &[(&str, &str)], entry: &str) -> String {
        let mut loader = MemoryFileLoader::new();
        for (path, text) in files {
            loader.add(*path, *text);
        }
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        let pp = Preprocessor::new(&session, &loader, vec![]);
        pp.run(Path::new(entry)).unwrap().buffer
    }

    #[test]
    fn expands_object_like_macro_end_to_end() {
        let out = run(
            &[("main.cpp", "#define DOUBLE(x) ((x)*2)\nint r = DOUBLE(21);\n")],
            "main.cpp",
        );
        assert!(out.contains("int r = ((21)*2);"));
    }

    #[test]
    fn pragma_once_prevents_double_inclusion() {
        let out = run(
            &[
                (
                    "main.cpp",
                    "#include \"a.h\"\n#include \"a.h\"\nint x;\n",
                ),
                ("a.h", "#pragma once\nint from_a;\n"),
            ],
            "main.cpp",
        );
        assert_eq!(out.matches("from_a").count(), 1);
    }

    #[test]
    fn ifdef_chain_picks_the_active_branch() {
        let out = run(
            &[(
                "main.cpp",
                "#define FOO\n#ifdef FOO\nint active;\n#else\nint inactive;\n#endif\n",
            )],
            "main.cpp",
        );
        assert!(out.contains("active"));
        assert!(!out.contains("inactive"));
    }

    #[test]
    fn if_expression_with_defined() {
        let out = run(
            &[(
                "main.cpp",
                "#define X 1\n#if defined(X) && X == 1\nint yes;\n#endif\n",
            )],
            "main.cpp",
        );
        assert!(out.contains("yes"));
    }

    #[test]
    fn include_cycle_without_pragma_once_hits_depth_cap() {
        let mut loader = MemoryFileLoader::new();
        loader.add("a.h", "#include \"b.h\"\n");
        loader.add("b.h", "#include \"a.h\"\n");
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        let mut pp = Preprocessor::new(&session, &loader, vec![]);
        pp.max_include_depth = 8;
        let result = pp.run(Path::new("a.h"));
        assert!(matches!(result, Err(PreprocessError::IncludeDepthExceeded { .. })));
    }
}

//! Wires the pipeline phases together in spec §2's order: preprocessor ->
//! lexer (consumed inside the parser) -> parser -> constant evaluator
//! (consumed inside the parser/IR lowering) -> AST->IR lowering -> code
//! generator -> object-file writer. This is the "top-level driver loop"
//! spec §1 calls an external collaborator, kept intentionally thin.

use crate::cli::Cli;
use novacc_codegen::module::CodegenModule;
use novacc_core::{CompilerSession, Diagnostic, ErrorKind, Severity};
use novacc_preprocessor::{OsFileLoader, Preprocessor};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Preprocess(#[from] novacc_preprocessor::PreprocessError),
    #[error(transparent)]
    Parse(#[from] novacc_parser::ParserError),
    #[error(transparent)]
    Module(#[from] novacc_codegen::module::ModuleError),
    #[error(transparent)]
    Write(#[from] novacc_objfile::ObjWriterError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DriverError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            DriverError::Preprocess(e) => e.error_kind(),
            DriverError::Parse(e) => e.error_kind(),
            DriverError::Module(_) => ErrorKind::Codegen,
            DriverError::Write(_) => ErrorKind::Io,
            DriverError::Io(_) => ErrorKind::Io,
        }
    }

    /// Preprocessed-buffer `(line, column)` this error carries, if any.
    /// `Preprocess` errors are raised against the physical file being read
    /// rather than the unified preprocessed buffer, so they have no
    /// line-map entry yet and render without one.
    fn position(&self) -> Option<(u32, u32)> {
        match self {
            DriverError::Parse(e) => e.position(),
            _ => None,
        }
    }
}

/// Starts the spec §5 watchdog thread: an informational-only background
/// thread that logs progress every 10 seconds while parsing runs, and
/// never touches compiler state. The returned guard stops it (by setting
/// the shared flag) when parsing completes; `Drop` does not join because
/// the thread sleeps in 10-second increments rather than polling, so
/// joining would block the caller for up to that long for no benefit.
struct Watchdog {
    done: Arc<AtomicBool>,
}

impl Watchdog {
    fn start() -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        std::thread::spawn(move || {
            let mut elapsed = 0u64;
            while !flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_secs(1));
                elapsed += 1;
                if elapsed % 10 == 0 && !flag.load(Ordering::Relaxed) {
                    tracing::info!(elapsed_secs = elapsed, "still parsing");
                }
            }
        });
        Watchdog { done }
    }

    fn stop(self) {
        self.done.store(true, Ordering::Relaxed);
    }
}

pub struct CompileOutcome {
    pub object_bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs preprocess -> parse -> lower -> codegen for one translation unit
/// and returns the finished object bytes. Mirrors spec §2's pipeline order
/// exactly; errors from any phase abort the translation unit per spec §7
/// (codegen errors are isolated per-function inside
/// [`CodegenModule::compile`] already, so by the time an error reaches
/// here it is fatal for the whole unit).
pub fn compile_translation_unit(cli: &Cli, session: &CompilerSession) -> Result<CompileOutcome, DriverError> {
    let format = session.context.borrow().object_format;
    let mangling = session.context.borrow().mangling;

    let loader = OsFileLoader;
    let output = {
        let mut timer = session.timer.borrow_mut();
        let _guard = timer.phase("preprocess");
        let preprocessor = Preprocessor::new(session, &loader, cli.include_dirs.clone());
        preprocessor.run(&cli.input)?
    };

    if cli.preprocess_only {
        let rendered = novacc_preprocessor::render_with_markers(
            &output.buffer,
            &session.line_map.borrow(),
            &session.interner,
        );
        print!("{rendered}");
        return Ok(CompileOutcome {
            object_bytes: Vec::new(),
            diagnostics: Vec::new(),
        });
    }

    let watchdog = Watchdog::start();
    let (mut parser, translation_unit) = {
        let mut timer = session.timer.borrow_mut();
        let _guard = timer.phase("parse");
        let mut parser = novacc_parser::Parser::new(session, &output.buffer);
        let translation_unit = parser.parse_translation_unit()?;
        parser.drain_instantiation_queue()?;
        (parser, translation_unit)
    };
    watchdog.stop();

    let object_bytes = {
        let mut timer = session.timer.borrow_mut();
        let _guard = timer.phase("codegen");
        let arena = parser.arena.into_inner();
        let module = CodegenModule::new(session, &arena, format, mangling);
        let writer = module.compile(&translation_unit)?;
        writer.write()?
    };

    Ok(CompileOutcome {
        object_bytes,
        diagnostics: Vec::new(),
    })
}

/// Renders a [`DriverError`] as the spec §7 user-visible diagnostic:
/// `<file>:<line>:<col>: error: <message>` followed by the `included from`
/// chain, resolved through `session`'s line map when the error carries a
/// preprocessed-buffer position (parser/lexer errors); phases that raise
/// against a physical file directly (preprocessor, codegen, I/O) fall back
/// to the input path with no line/column.
pub fn render_error(input: &Path, session: &CompilerSession, err: &DriverError) -> String {
    let message = match err {
        DriverError::Parse(e) => e.message(),
        other => other.to_string(),
    };
    let diagnostic = Diagnostic::error(err.error_kind(), message);
    let diagnostic = match err.position() {
        Some((line, column)) => diagnostic.at(novacc_core::SourcePos {
            preprocessed_line: line,
            column,
        }),
        None => diagnostic,
    };
    if diagnostic.pos.is_some() {
        diagnostic.render(&session.interner, &session.line_map.borrow())
    } else {
        format!(
            "{}: {}: {err}\n",
            input.display(),
            severity_label(diagnostic.severity)
        )
    }
}

pub fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    }
}

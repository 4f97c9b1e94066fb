//! `novacc` CLI entry point. Thin by design (spec §1: "command-line
//! argument parsing and the top-level driver loop" are named as external
//! collaborators to the specified core) — this just parses flags, wires
//! logging, and delegates to [`driver::compile_translation_unit`].

mod cli;
mod config_file;
mod crash;
mod driver;

use clap::Parser as _;
use cli::Cli;
use novacc_core::{CompileContext, CompilerIdentity, CompilerSession, ManglingStyle, ObjectFormat};
use std::process::ExitCode;

fn init_logging(cli: &Cli) {
    use tracing_subscriber::EnvFilter;

    let default_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    for spec in &cli.log_level {
        filter = filter.add_directive(spec.parse().unwrap_or_else(|_| default_level.parse().unwrap()));
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn host_object_format() -> ObjectFormat {
    if cfg!(target_os = "windows") {
        ObjectFormat::Coff
    } else {
        ObjectFormat::Elf
    }
}

fn build_context(cli: &Cli, file_config: Option<&config_file::FileConfig>) -> CompileContext {
    let format = host_object_format();
    let mut ctx = CompileContext::new(format);
    if cli.gcc_compat || cli.clang_compat || file_config.is_some_and(|fc| fc.gcc_compat) {
        ctx.identity = CompilerIdentity::GccClang;
    }
    if let Some(style) = cli.mangling {
        ctx.mangling = match style {
            cli::ManglingArg::Msvc => ManglingStyle::Msvc,
            cli::ManglingArg::Itanium => ManglingStyle::Itanium,
        };
    } else if let Some(mangling) = file_config.and_then(|fc| fc.mangling.as_deref()) {
        ctx.mangling = match mangling {
            "msvc" => ManglingStyle::Msvc,
            "itanium" => ManglingStyle::Itanium,
            _ => ctx.mangling,
        };
    }
    ctx.exceptions_enabled = !cli.no_exceptions;
    ctx.access_control_enabled = !cli.no_access_control;
    ctx.eager_template_instantiation = cli.eager_template_instantiation
        || file_config.is_some_and(|fc| fc.eager_template_instantiation);
    ctx
}

fn run() -> Result<(), String> {
    let mut cli = Cli::parse();
    init_logging(&cli);
    crash::install();

    let file_config = config_file::load_near(&cli.input).map_err(|e| e.to_string())?;
    if let Some(fc) = &file_config {
        for dir in &fc.include_dirs {
            if !cli.include_dirs.contains(dir) {
                cli.include_dirs.push(dir.clone());
            }
        }
    }

    let context = build_context(&cli, file_config.as_ref());
    let format = context.object_format;
    let session = CompilerSession::new(context);

    let outcome = driver::compile_translation_unit(&cli, &session)
        .map_err(|e| driver::render_error(&cli.input, &session, &e))?;

    if !cli.preprocess_only {
        let output_path = cli.output_path(format);
        std::fs::write(&output_path, &outcome.object_bytes)
            .map_err(|e| format!("{}: error: cannot write object file: {e}", output_path.display()))?;
    }

    if cli.time || cli.perf_stats {
        print!("{}", session.timer.borrow().report());
    }
    if cli.perf_stats {
        let stats = session.interner.stats();
        println!(
            "allocator stats:\n  interner: {} unique strings, {} bytes across {} chunks",
            stats.unique_strings, stats.bytes_committed, stats.chunks
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprint!("{message}");
            if !message.ends_with('\n') {
                eprintln!();
            }
            ExitCode::FAILURE
        }
    }
}

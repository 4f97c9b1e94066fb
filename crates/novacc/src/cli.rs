//! Command-line flags (spec §6.1), following the teacher workspace's
//! `clap` derive style (see `normalize-cli-parser`'s `formats::clap`
//! fixtures).

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ManglingArg {
    Msvc,
    Itanium,
}

#[derive(Debug, Parser)]
#[command(
    name = "novacc",
    version,
    about = "Ahead-of-time C++ to native object compiler"
)]
pub struct Cli {
    /// Preprocessed or raw `.cpp` translation unit to compile.
    pub input: PathBuf,

    /// Output object file path. Default: input basename + `.obj`/`.o`.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Add an include directory (repeatable).
    #[arg(short = 'I', long = "include-dir", value_name = "dir")]
    pub include_dirs: Vec<PathBuf>,

    /// Preprocess only, write to stdout with `# <line> "<file>"` markers.
    #[arg(short = 'E')]
    pub preprocess_only: bool,

    /// Verbose diagnostics.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Internal debug logging.
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Emit phase timings and template statistics at end of run.
    #[arg(long = "time", alias = "stats")]
    pub time: bool,

    /// As `--time`, plus allocator statistics.
    #[arg(long = "perf-stats")]
    pub perf_stats: bool,

    /// Disable exception emission (throw -> abort, no EH tables).
    #[arg(long = "fno-exceptions")]
    pub no_exceptions: bool,

    /// Ignore `private`/`protected`.
    #[arg(long = "fno-access-control")]
    pub no_access_control: bool,

    /// Override mangling style; default follows the target object format.
    #[arg(long = "fmangling", value_enum)]
    pub mangling: Option<ManglingArg>,

    /// Seed GCC/Clang-compatible builtin macros instead of MSVC's.
    #[arg(long = "fgcc-compat")]
    pub gcc_compat: bool,

    /// Seed Clang-compatible builtin macros (implies `-fgcc-compat`'s macro
    /// family; kept distinct per spec §6.1).
    #[arg(long = "fclang-compat")]
    pub clang_compat: bool,

    /// Disable lazy template instantiation: instantiate all members eagerly.
    #[arg(long = "eager-template-instantiation")]
    pub eager_template_instantiation: bool,

    /// Configure category or global log levels, e.g. `parser:debug`.
    #[arg(long = "log-level", value_name = "name[:level]")]
    pub log_level: Vec<String>,
}

impl Cli {
    pub fn output_path(&self, object_format: novacc_core::ObjectFormat) -> PathBuf {
        if let Some(out) = &self.output {
            return out.clone();
        }
        let ext = match object_format {
            novacc_core::ObjectFormat::Coff => "obj",
            novacc_core::ObjectFormat::Elf => "o",
        };
        self.input.with_extension(ext)
    }

    pub fn compiler_identity(&self) -> novacc_core::CompilerIdentity {
        if self.gcc_compat || self.clang_compat {
            novacc_core::CompilerIdentity::GccClang
        } else {
            novacc_core::CompilerIdentity::Msvc
        }
    }
}

//! Compiler-wide configuration shared by every phase (mangling style,
//! compiler-identity macro set, object format, resource limits). Threaded
//! through [`crate::session::CompilerSession`] rather than read from
//! ambient globals (spec §9).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManglingStyle {
    Msvc,
    Itanium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFormat {
    Coff,
    Elf,
}

impl ObjectFormat {
    /// Platform-default mangling style (spec §4.6: "Mangling style is
    /// selectable independent of platform but defaults follow platform").
    pub fn default_mangling(self) -> ManglingStyle {
        match self {
            ObjectFormat::Coff => ManglingStyle::Msvc,
            ObjectFormat::Elf => ManglingStyle::Itanium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerIdentity {
    Msvc,
    GccClang,
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_include_depth: u32,
    pub max_constexpr_steps: u64,
    pub max_constexpr_recursion: u32,
    pub max_active_template_instantiations: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_include_depth: 200,
            max_constexpr_steps: 1_000_000,
            max_constexpr_recursion: 512,
            max_active_template_instantiations: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackState {
    pub current: Option<u32>,
}

impl Default for PackState {
    fn default() -> Self {
        PackState { current: None }
    }
}

/// Mutable, per-translation-unit compile context (original `CompileContext.h`
/// recovered in `SPEC_FULL.md` §C.3): current file, active `#pragma pack`
/// alignment stack, and the effective mangling/identity selection.
#[derive(Debug, Clone)]
pub struct CompileContext {
    pub object_format: ObjectFormat,
    pub mangling: ManglingStyle,
    pub identity: CompilerIdentity,
    pub exceptions_enabled: bool,
    pub access_control_enabled: bool,
    pub eager_template_instantiation: bool,
    pub pack_stack: Vec<u32>,
}

impl CompileContext {
    pub fn new(object_format: ObjectFormat) -> Self {
        CompileContext {
            mangling: object_format.default_mangling(),
            object_format,
            identity: match object_format {
                ObjectFormat::Coff => CompilerIdentity::Msvc,
                ObjectFormat::Elf => CompilerIdentity::GccClang,
            },
            exceptions_enabled: true,
            access_control_enabled: true,
            eager_template_instantiation: false,
            pack_stack: Vec::new(),
        }
    }

    pub fn current_pack(&self) -> Option<u32> {
        self.pack_stack.last().copied()
    }

    pub fn pack_push(&mut self, value: u32) {
        self.pack_stack.push(value);
    }

    pub fn pack_pop(&mut self) {
        self.pack_stack.pop();
    }

    pub fn pack_set(&mut self, value: u32) {
        if let Some(top) = self.pack_stack.last_mut() {
            *top = value;
        } else {
            self.pack_stack.push(value);
        }
    }
}

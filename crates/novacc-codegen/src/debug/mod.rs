//! Debug-information emission: CodeView (`.debug$S`/`.debug$T`) for the
//! COFF backend, minimal DWARF (`.debug_info`/`.debug_abbrev`) for the ELF
//! backend (spec §4.6 step 8).

pub mod codeview;
pub mod dwarf;

/// One function's debug-info input, shared by both backends (spec §4.6
/// step 8 "register (mangled name, code offset, code size, stack space,
/// parameter list, local variables with RBP-relative locations), line
/// mappings").
#[derive(Debug, Clone)]
pub struct FunctionDebugInfo {
    pub mangled_name: String,
    pub source_name: String,
    pub code_offset: u32,
    pub code_size: u32,
    pub frame_size: i32,
    pub params: Vec<LocalVar>,
    pub locals: Vec<LocalVar>,
    /// `(code_offset_within_function, source_line)` pairs in increasing
    /// offset order.
    pub line_table: Vec<(u32, u32)>,
}

#[derive(Debug, Clone)]
pub struct LocalVar {
    pub name: String,
    pub rbp_offset: i32,
    pub type_name: String,
}

//! x86-64 code generation and object-file emission (spec §4.6–§4.8):
//! stack-frame layout, manual instruction encoding, name mangling,
//! vtable/RTTI layout, DWARF CFI/LSDA for ELF, CodeView/DWARF debug info,
//! and the per-translation-unit driver that ties them all into a finished
//! [`novacc_objfile::ObjectWriter`].

pub mod debug;
pub mod eh;
pub mod emit;
pub mod frame;
pub mod mangle;
pub mod module;
pub mod regs;
pub mod vtable;

pub use emit::{CallConv, EmitError, FunctionEmitter, SymbolResolver, TryRegionRecord};
pub use frame::{layout_function, FrameLayout};
pub use mangle::mangle_function;
pub use module::{CodegenModule, ModuleError};

//! `CompilerSession`: the handle threaded through every phase instead of
//! ambient statics (spec §9). Owns the string interner, type registry,
//! symbol table, template registry, line map, and the mutable compile
//! context, and exposes the accessors each phase crate needs.

use crate::config::CompileContext;
use crate::interner::Interner;
use crate::linemap::LineMap;
use crate::symtab::SymbolTable;
use crate::templates::TemplateRegistry;
use crate::timing::PhaseTimer;
use crate::types::TypeRegistry;
use std::cell::RefCell;

pub struct CompilerSession {
    pub interner: Interner,
    pub types: RefCell<TypeRegistry>,
    pub symbols: RefCell<SymbolTable>,
    pub templates: RefCell<TemplateRegistry>,
    pub line_map: RefCell<LineMap>,
    pub context: RefCell<CompileContext>,
    pub timer: RefCell<PhaseTimer>,
}

impl CompilerSession {
    pub fn new(context: CompileContext) -> Self {
        CompilerSession {
            interner: Interner::new(),
            types: RefCell::new(TypeRegistry::new()),
            symbols: RefCell::new(SymbolTable::new()),
            templates: RefCell::new(TemplateRegistry::new()),
            line_map: RefCell::new(LineMap::new()),
            context: RefCell::new(context),
            timer: RefCell::new(PhaseTimer::new()),
        }
    }
}

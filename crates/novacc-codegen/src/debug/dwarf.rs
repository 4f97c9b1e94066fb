//! Minimal DWARF `.debug_info`/`.debug_abbrev`/`.debug_str`/`.debug_line`
//! emission for the ELF backend (spec §4.6 step 8).
//!
//! Grounded on `original_source/src/DwarfDebugInfo.h`; built with
//! `gimli::write`, mirroring [`crate::eh::cfi`]'s use of the same crate for
//! `.eh_frame`. Scope is deliberately narrow: one compile unit DIE, one
//! subprogram DIE per function with its formal parameters and local
//! variables, and a line program mapping code offsets back to source
//! lines — everything spec §4.6 step 8 names for the ELF branch, nothing
//! beyond it (no types, no lexical blocks).

use super::FunctionDebugInfo;
use gimli::write::{
    Address, AttributeValue, DwarfUnit, EndianVec, FileId, LineProgram, LineString,
    LineStringTable, Sections, StringTable, UnitEntryId,
};
use gimli::{DwLang, Encoding, Format, LineEncoding, LittleEndian};

/// Builds `.debug_info`, `.debug_abbrev`, `.debug_str`, `.debug_line`, and
/// `.debug_line_str` for one translation unit, returned in that order.
pub fn build_debug_sections(
    comp_dir: &str,
    source_file: &str,
    functions: &[FunctionDebugInfo],
) -> [Vec<u8>; 5] {
    let encoding = Encoding {
        format: Format::Dwarf32,
        version: 4,
        address_size: 8,
    };

    let line_program = LineProgram::new(
        encoding,
        LineEncoding::default(),
        LineString::String(comp_dir.as_bytes().to_vec()),
        LineString::String(source_file.as_bytes().to_vec()),
        None,
    );
    let mut dwarf = DwarfUnit::new(encoding);
    dwarf.unit.line_program = line_program;

    let dir_id = dwarf.unit.line_program.default_directory();
    let file_id: FileId = dwarf.unit.line_program.add_file(
        LineString::String(source_file.as_bytes().to_vec()),
        dir_id,
        None,
    );

    let root = dwarf.unit.root();
    {
        let comp_unit = dwarf.unit.get_mut(root);
        comp_unit.set(
            gimli::constants::DW_AT_producer,
            AttributeValue::String(b"novacc".to_vec()),
        );
        comp_unit.set(
            gimli::constants::DW_AT_language,
            AttributeValue::Language(DwLang(0x0004)), // DW_LANG_C_plus_plus
        );
        comp_unit.set(
            gimli::constants::DW_AT_name,
            AttributeValue::String(source_file.as_bytes().to_vec()),
        );
        comp_unit.set(
            gimli::constants::DW_AT_comp_dir,
            AttributeValue::String(comp_dir.as_bytes().to_vec()),
        );
        comp_unit.set(
            gimli::constants::DW_AT_low_pc,
            AttributeValue::Address(Address::Constant(0)),
        );
    }

    for func in functions {
        let die_id: UnitEntryId = dwarf.unit.add(root, gimli::constants::DW_TAG_subprogram);
        let die = dwarf.unit.get_mut(die_id);
        die.set(
            gimli::constants::DW_AT_name,
            AttributeValue::String(func.mangled_name.as_bytes().to_vec()),
        );
        die.set(
            gimli::constants::DW_AT_low_pc,
            AttributeValue::Address(Address::Constant(func.code_offset as u64)),
        );
        die.set(
            gimli::constants::DW_AT_high_pc,
            AttributeValue::Udata(func.code_size as u64),
        );
        die.set(
            gimli::constants::DW_AT_frame_base,
            AttributeValue::Udata(u64::from(gimli::constants::DW_OP_call_frame_cfa.0 as u32)),
        );

        for param in &func.params {
            let param_id = dwarf.unit.add(die_id, gimli::constants::DW_TAG_formal_parameter);
            let param_die = dwarf.unit.get_mut(param_id);
            param_die.set(
                gimli::constants::DW_AT_name,
                AttributeValue::String(param.name.as_bytes().to_vec()),
            );
        }
        for local in &func.locals {
            let local_id = dwarf.unit.add(die_id, gimli::constants::DW_TAG_variable);
            let local_die = dwarf.unit.get_mut(local_id);
            local_die.set(
                gimli::constants::DW_AT_name,
                AttributeValue::String(local.name.as_bytes().to_vec()),
            );
        }

        if func.line_table.is_empty() {
            continue;
        }
        dwarf
            .unit
            .line_program
            .begin_sequence(Some(Address::Constant(func.code_offset as u64)));
        for (code_offset, line) in &func.line_table {
            dwarf.unit.line_program.row().address_offset = *code_offset as u64;
            dwarf.unit.line_program.row().line = *line as u64;
            dwarf.unit.line_program.row().file = file_id;
            dwarf.unit.line_program.generate_row();
        }
        dwarf
            .unit
            .line_program
            .end_sequence(func.code_size as u64);
    }

    let mut sections = Sections::new(EndianVec::new(LittleEndian));
    let mut line_strings = LineStringTable::default();
    let mut strings = StringTable::default();
    dwarf
        .write(&mut sections, &mut line_strings, &mut strings)
        .expect("writing DWARF to an in-memory buffer cannot fail");

    [
        sections.debug_info.into_vec(),
        sections.debug_abbrev.into_vec(),
        sections.debug_str.into_vec(),
        sections.debug_line.into_vec(),
        sections.debug_line_str.into_vec(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::LocalVar;

    #[test]
    fn emits_nonempty_info_and_abbrev_for_one_function() {
        let func = FunctionDebugInfo {
            mangled_name: "_Z4mainv".into(),
            source_name: "main.cpp".into(),
            code_offset: 0,
            code_size: 32,
            frame_size: 16,
            params: vec![],
            locals: vec![LocalVar {
                name: "x".into(),
                rbp_offset: -4,
                type_name: "int".into(),
            }],
            line_table: vec![(0, 10), (8, 11)],
        };
        let [info, abbrev, _str, _line, _line_str] =
            build_debug_sections("/tmp", "main.cpp", &[func]);
        assert!(!info.is_empty());
        assert!(!abbrev.is_empty());
    }

    #[test]
    fn empty_function_list_still_yields_a_compile_unit() {
        let [info, abbrev, _str, _line, _line_str] =
            build_debug_sections("/tmp", "empty.cpp", &[]);
        assert!(!info.is_empty());
        assert!(!abbrev.is_empty());
    }
}

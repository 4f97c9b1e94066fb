//! Thin structural façade over the `object` crate's COFF/ELF writer (spec
//! §4.7, §3.9). Knows sections, symbols, relocations, and string tables;
//! has no knowledge of C++ semantics — the code generator decides what
//! bytes, symbols, and relocations to hand it.
//!
//! The spec names COFFI/ELFIO (C++ libraries with no Rust equivalent) as
//! the reference implementation's backing libraries; `object`'s `write`
//! module is the idiomatic Rust crate covering the same COFF+ELF section/
//! symbol/relocation surface (it is what `rustc`'s own codegen backends
//! and `cargo`'s linker tooling use for exactly this job).

use novacc_core::ObjectFormat;
use object::write::{Object as WriteObject, Relocation, StandardSection, Symbol, SymbolSection};
use object::{
    Architecture, BinaryFormat, Endianness, RelocationEncoding, RelocationFlags, SectionKind,
    SymbolFlags, SymbolKind, SymbolScope,
};

pub use object::write::SectionId;
pub use object::write::SymbolId;

#[derive(Debug, thiserror::Error)]
pub enum ObjWriterError {
    #[error("object writer: {0}")]
    Write(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ObjWriterError>;

/// One of the section kinds named in spec §3.9; maps to the matching
/// `object` crate standard section (or a custom section for COFF-only
/// `.drectve`/CodeView sections which `object`'s `StandardSection` enum
/// does not model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionRole {
    Text,
    Data,
    Bss,
    RoData,
    Drectve,
    DebugSymbols,
    DebugTypes,
    DebugInfo,
    EhFrame,
    GccExceptTable,
}

/// Relocation target kinds used across both formats (spec §3.9, §4.6):
/// 32-bit absolute, PC-relative 32-bit, or 64-bit absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    Abs32,
    Abs64,
    Pc32,
    SecRel32,
}

/// Storage-class/linkage the code generator assigns a symbol; translated
/// to the `object` crate's `SymbolScope`/`SymbolFlags` at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Local,
    External,
    Weak,
}

pub struct ObjectWriter {
    format: ObjectFormat,
    obj: WriteObject<'static>,
}

impl ObjectWriter {
    pub fn new(format: ObjectFormat) -> Self {
        let (binary_format, endianness) = match format {
            ObjectFormat::Coff => (BinaryFormat::Coff, Endianness::Little),
            ObjectFormat::Elf => (BinaryFormat::Elf, Endianness::Little),
        };
        ObjectWriter {
            format,
            obj: WriteObject::new(binary_format, Architecture::X86_64, endianness),
        }
    }

    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    /// Adds a section with the given role, returning its id. `.drectve`
    /// and CodeView sections have no `StandardSection` counterpart in the
    /// `object` crate, so those are added as raw named sections instead.
    pub fn add_section(&mut self, role: SectionRole) -> SectionId {
        match role {
            SectionRole::Text => self.obj.add_section(
                self.obj.segment_name(object::write::StandardSegment::Text).to_vec(),
                b".text".to_vec(),
                SectionKind::Text,
            ),
            SectionRole::Data => self.obj.section_id(StandardSection::Data),
            SectionRole::Bss => self.obj.section_id(StandardSection::UninitializedData),
            SectionRole::RoData => self.obj.section_id(StandardSection::ReadOnlyData),
            SectionRole::Drectve => self.obj.add_section(
                Vec::new(),
                b".drectve".to_vec(),
                SectionKind::Linker,
            ),
            SectionRole::DebugSymbols => self.obj.add_section(
                Vec::new(),
                b".debug$S".to_vec(),
                SectionKind::Debug,
            ),
            SectionRole::DebugTypes => self.obj.add_section(
                Vec::new(),
                b".debug$T".to_vec(),
                SectionKind::Debug,
            ),
            SectionRole::DebugInfo => self.obj.section_id(StandardSection::DebugInfo),
            SectionRole::EhFrame => self.obj.add_section(
                self.obj
                    .segment_name(object::write::StandardSegment::Data)
                    .to_vec(),
                b".eh_frame".to_vec(),
                SectionKind::ReadOnlyData,
            ),
            SectionRole::GccExceptTable => self.obj.add_section(
                self.obj
                    .segment_name(object::write::StandardSegment::Data)
                    .to_vec(),
                b".gcc_except_table".to_vec(),
                SectionKind::ReadOnlyData,
            ),
        }
    }

    /// Appends bytes to a section, respecting the requested alignment, and
    /// returns the offset the bytes were placed at.
    pub fn append(&mut self, section: SectionId, bytes: &[u8], align: u64) -> u64 {
        self.obj.append_section_data(section, bytes, align)
    }

    /// Reserves `len` zeroed bytes in `.bss` without writing data
    /// (`.bss` carries no file content, only a size).
    pub fn reserve_bss(&mut self, section: SectionId, len: u64, align: u64) -> u64 {
        self.obj.append_section_bss(section, len, align)
    }

    pub fn add_symbol(
        &mut self,
        name: &str,
        section: SectionId,
        offset: u64,
        size: u64,
        kind: SymbolKind,
        linkage: Linkage,
    ) -> SymbolId {
        let scope = match linkage {
            Linkage::Local => SymbolScope::Compilation,
            Linkage::External | Linkage::Weak => SymbolScope::Linkage,
        };
        self.obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: offset,
            size,
            kind,
            scope,
            weak: matches!(linkage, Linkage::Weak),
            section: SymbolSection::Section(section),
            flags: SymbolFlags::None,
        })
    }

    pub fn add_undefined_symbol(&mut self, name: &str) -> SymbolId {
        self.obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: 0,
            size: 0,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Undefined,
            flags: SymbolFlags::None,
        })
    }

    /// Adds a relocation at `offset` within `section` targeting `symbol`
    /// (spec §4.6): `IMAGE_REL_AMD64_REL32`/`ADDR64`/`SECREL` on COFF,
    /// `R_X86_64_PC32`/`R_X86_64_64` on ELF.
    pub fn add_relocation(
        &mut self,
        section: SectionId,
        offset: u64,
        symbol: SymbolId,
        kind: RelocKind,
        addend: i64,
    ) -> Result<()> {
        let (r_kind, encoding, size) = match (self.format, kind) {
            (_, RelocKind::Abs64) => (
                object::RelocationKind::Absolute,
                RelocationEncoding::Generic,
                64,
            ),
            (_, RelocKind::Abs32) => (
                object::RelocationKind::Absolute,
                RelocationEncoding::Generic,
                32,
            ),
            (_, RelocKind::Pc32) => (
                object::RelocationKind::Relative,
                RelocationEncoding::X86Branch,
                32,
            ),
            (ObjectFormat::Coff, RelocKind::SecRel32) => (
                object::RelocationKind::SectionOffset,
                RelocationEncoding::Generic,
                32,
            ),
            (ObjectFormat::Elf, RelocKind::SecRel32) => (
                object::RelocationKind::Relative,
                RelocationEncoding::Generic,
                32,
            ),
        };
        self.obj
            .add_relocation(
                section,
                Relocation {
                    offset,
                    symbol,
                    addend,
                    flags: RelocationFlags::Generic {
                        kind: r_kind,
                        encoding,
                        size,
                    },
                },
            )
            .map_err(|e| ObjWriterError::Write(e.to_string()))
    }

    /// Appends a raw string to a `.drectve`-style section, used for the
    /// `/DEFAULTLIB:"LIBCMT"` directive (spec §6.2).
    pub fn append_drectve(&mut self, section: SectionId, directive: &str) {
        let mut bytes = directive.as_bytes().to_vec();
        bytes.push(b' ');
        self.obj.append_section_data(section, &bytes, 1);
    }

    pub fn write(self) -> Result<Vec<u8>> {
        self.obj
            .write()
            .map_err(|e| ObjWriterError::Write(e.to_string()))
    }

    pub fn write_to_file(self, path: &std::path::Path) -> Result<()> {
        let bytes = self.write()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_minimal_elf_object() {
        let mut writer = ObjectWriter::new(ObjectFormat::Elf);
        let text = writer.add_section(SectionRole::Text);
        let offset = writer.append(text, &[0xB8, 0x00, 0x00, 0x00, 0x00, 0xC3], 16);
        writer.add_symbol(
            "main",
            text,
            offset,
            6,
            SymbolKind::Text,
            Linkage::External,
        );
        let bytes = writer.write().expect("elf object should write");
        assert_eq!(&bytes[0..4], b"\x7fELF");
    }

    #[test]
    fn writes_minimal_coff_object() {
        let mut writer = ObjectWriter::new(ObjectFormat::Coff);
        let text = writer.add_section(SectionRole::Text);
        writer.append(text, &[0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3], 16);
        let bytes = writer.write().expect("coff object should write");
        assert!(!bytes.is_empty());
    }
}

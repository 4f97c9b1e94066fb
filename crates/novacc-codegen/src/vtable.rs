//! Vtable and RTTI emission (spec §4.6 step 7), grounded on
//! `original_source/src/ObjectFileCommon.h`'s vtable-layout and
//! type_info-emission helpers.
//!
//! A vtable is laid out here exactly the way [`novacc_core::StructTypeInfo`]
//! already numbers virtual slots: one pointer-sized entry per distinct
//! `vtable_slot`, in ascending slot order, pointing at the *most derived*
//! override reachable from this struct (overrides are resolved by the
//! caller, which walks the inheritance chain and passes in the final
//! function symbol per slot — this module only decides layout and byte
//! content).

use novacc_core::{CompilerSession, ManglingStyle, TypeIndex};

/// One resolved vtable entry: the slot index (as already assigned by
/// `MemberFunctionInfo::vtable_slot`) and the mangled symbol of the
/// function that should occupy it for this most-derived class.
#[derive(Debug, Clone)]
pub struct VtableEntry {
    pub slot: u32,
    pub function_symbol: String,
}

/// A fully resolved vtable ready to be written: entries in slot order plus
/// the symbol name the vtable itself should be emitted under.
#[derive(Debug, Clone)]
pub struct VtableLayout {
    pub symbol: String,
    pub entries: Vec<VtableEntry>,
}

/// MSVC vtable symbol: `??_7ClassName@@6B@` (spec §4.6 "vtable symbol per
/// mangling style").
fn vtable_symbol_msvc(class_name: &str) -> String {
    format!("??_7{class_name}@@6B@")
}

/// Itanium vtable symbol: `_ZTV<len><name>`.
fn vtable_symbol_itanium(class_name: &str) -> String {
    format!("_ZTV{}{}", class_name.len(), class_name)
}

/// Itanium `type_info` symbol: `_ZTI<len><name>` (spec §4.6's RTTI
/// "type_info object per polymorphic class").
pub fn type_info_symbol_itanium(class_name: &str) -> String {
    format!("_ZTI{}{}", class_name.len(), class_name)
}

/// MSVC RTTI Complete Object Locator symbol: `??_R4ClassName@@6B@`.
pub fn rtti_complete_object_locator_symbol_msvc(class_name: &str) -> String {
    format!("??_R4{class_name}@@6B@")
}

/// Builds the vtable's symbol name for `class_name` under the active
/// mangling style.
pub fn vtable_symbol(class_name: &str, style: ManglingStyle) -> String {
    match style {
        ManglingStyle::Msvc => vtable_symbol_msvc(class_name),
        ManglingStyle::Itanium => vtable_symbol_itanium(class_name),
    }
}

/// Resolves slot order for `type_index`'s vtable, given a function already
/// resolved to "the override this class should use for slot N" (computed
/// by the caller by walking bases from least to most derived and
/// overwriting each base's slot assignment wherever a derived class
/// declares a matching virtual override — novacc does not track virtual
/// overriding separately from declaration order, so `overrides` is
/// expected to already reflect the fully resolved vtable for this class).
pub fn build_vtable_layout(
    type_index: TypeIndex,
    class_name: &str,
    style: ManglingStyle,
    session: &CompilerSession,
    overrides: &[(u32, String)],
) -> VtableLayout {
    let _ = (type_index, session);
    let mut entries: Vec<VtableEntry> = overrides
        .iter()
        .map(|(slot, symbol)| VtableEntry {
            slot: *slot,
            function_symbol: symbol.clone(),
        })
        .collect();
    entries.sort_by_key(|e| e.slot);
    VtableLayout {
        symbol: vtable_symbol(class_name, style),
        entries,
    }
}

/// Serializes a resolved vtable to its on-disk form: one 8-byte slot per
/// entry (in slot order, starting at offset 0 — novacc does not emit an
/// Itanium-style offset-to-top/RTTI-pointer prefix, since `emit.rs`'s
/// virtual-call sequence indexes directly from the vtable's first byte,
/// spec §4.6 step 7 "minimal" vtable layout). Returns the raw zeroed bytes
/// plus a `(byte_offset, function_symbol)` list the caller turns into
/// `R_X86_64_64`/`IMAGE_REL_AMD64_ADDR64` relocations.
pub fn layout_vtable_bytes(layout: &VtableLayout) -> (Vec<u8>, Vec<(u64, String)>) {
    let slot_count = layout.entries.iter().map(|e| e.slot + 1).max().unwrap_or(0) as usize;
    let mut bytes = vec![0u8; slot_count * 8];
    let mut relocs = Vec::with_capacity(layout.entries.len());
    for entry in &layout.entries {
        let offset = (entry.slot as u64) * 8;
        relocs.push((offset, entry.function_symbol.clone()));
    }
    (std::mem::take(&mut bytes), relocs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use novacc_core::{CompileContext, ObjectFormat};

    #[test]
    fn msvc_and_itanium_vtable_symbols_differ() {
        assert_eq!(vtable_symbol_msvc("Shape"), "??_7Shape@@6B@");
        assert_eq!(vtable_symbol_itanium("Shape"), "_ZTV5Shape");
    }

    #[test]
    fn layout_orders_entries_by_slot_and_sizes_buffer_to_highest_slot() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        let ty = TypeIndex(0);
        let layout = build_vtable_layout(
            ty,
            "Shape",
            ManglingStyle::Itanium,
            &session,
            &[(1, "_ZN5Shape4areaEv".into()), (0, "_ZN5ShapeD1Ev".into())],
        );
        assert_eq!(layout.entries[0].slot, 0);
        assert_eq!(layout.entries[1].slot, 1);
        let (bytes, relocs) = layout_vtable_bytes(&layout);
        assert_eq!(bytes.len(), 16);
        assert_eq!(relocs.len(), 2);
        assert_eq!(relocs[1].0, 8);
    }
}

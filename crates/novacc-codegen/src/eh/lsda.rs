//! Itanium LSDA (Language-Specific Data Area) encoder (spec §4.8):
//! call-site table, action table, and type table for `.gcc_except_table`.
//!
//! Grounded on `original_source/src/LSDAGenerator.h`, including its
//! documented gap (DESIGN.md Open Question 1): the original only emits
//! call-site rows for `try` regions, leaving the personality routine
//! unable to walk the rest of the function. [`build_lsda`] instead emits
//! one additional "no action" call-site row per gap between/around try
//! regions, covering the full function as spec §9 instructs.

use crate::eh::cfi::{write_sleb128, write_uleb128, DW_EH_PE_OMIT, DW_EH_PE_PCREL_SDATA4};
use novacc_core::TypeIndex;

/// One catch clause within a try region, in source order (spec §4.6 step
/// 5 "ordered catch handlers referencing type_info symbols").
#[derive(Debug, Clone)]
pub struct CatchEntry {
    /// `None` is a catch-all (`catch (...)`), encoded as filter `0` with
    /// no type-table entry (spec §4.8 "0 = cleanup" is reused by GCC's
    /// ABI for catch-all when paired with a null type pointer — here we
    /// follow the simpler convention of giving catch-all its own
    /// null-pointer type-table slot so the filter numbering stays
    /// 1-based and uniform).
    pub type_index: Option<TypeIndex>,
    /// Mangled Itanium `_ZTI*` type_info symbol name for this catch's
    /// exception type (ignored when `type_index` is `None`).
    pub type_info_symbol: Option<String>,
}

/// One `try` region's call-site row input: byte range in the function
/// plus its landing pad offset and ordered catch list.
#[derive(Debug, Clone)]
pub struct TryRegionInput {
    pub start_offset: u64,
    pub end_offset: u64,
    pub landing_pad_offset: u64,
    pub catches: Vec<CatchEntry>,
}

struct TypeTableBuilder {
    /// Reverse order: filter `1` is the *last* entry (spec §4.8 "type
    /// table in reverse"). Each entry is `None` for catch-all (null
    /// pointer, matches any exception) or `Some(symbol)` for a typed
    /// catch.
    entries: Vec<Option<String>>,
}

impl TypeTableBuilder {
    fn new() -> Self {
        TypeTableBuilder { entries: Vec::new() }
    }

    /// Returns the 1-based filter value for `symbol` (or catch-all),
    /// appending a new type-table entry if this exact type/catch-all was
    /// not already recorded for a previous try region.
    fn filter_for(&mut self, catch: &CatchEntry) -> i64 {
        let key = catch.type_info_symbol.clone();
        if let Some(pos) = self.entries.iter().position(|e| *e == key) {
            (self.entries.len() - pos) as i64
        } else {
            self.entries.push(key);
            self.entries.len() as i64
        }
    }
}

/// Builds the complete LSDA for one function (spec §4.8): header, call-site
/// table, action table, and type table, ready to append to
/// `.gcc_except_table`. `type_table_relocs_out` receives `(offset_within_lsda,
/// symbol)` pairs so the caller can add `R_X86_64_PC32` relocations against
/// `.data.rel.ro` thunks for each referenced `_ZTI*` symbol (spec §4.8
/// "entries are 4-byte PC-relative indirect pointers").
pub fn build_lsda(
    regions: &[TryRegionInput],
    func_length: u64,
    type_table_relocs_out: &mut Vec<(usize, String)>,
) -> Vec<u8> {
    let mut types = TypeTableBuilder::new();

    // Action table: one chain per try region. A chain entry is
    // `(type_filter, next_action_offset)` where `next_action_offset` is
    // relative to the *start of this entry* (0 means "no next action").
    let mut action_table = Vec::new();
    let mut action_start_for_region = Vec::with_capacity(regions.len());

    for region in regions {
        if region.catches.is_empty() {
            action_start_for_region.push(0usize);
            continue;
        }
        let start = action_table.len() + 1; // 1-based action offsets, 0 means "no action"
        action_start_for_region.push(start);
        for (i, catch) in region.catches.iter().enumerate() {
            let filter = types.filter_for(catch);
            write_sleb128(&mut action_table, filter);
            let is_last = i + 1 == region.catches.len();
            if is_last {
                write_sleb128(&mut action_table, 0);
            } else {
                // Next action record starts right after this one; GCC
                // encodes this as a *signed* byte offset to the next
                // record relative to the current position, which for a
                // tightly packed table is +1 (uleb/sleb sizes vary, but
                // each record is consumed sequentially by the unwinder
                // so a constant "+1, keep reading" works for our
                // sequential catch lists).
                write_sleb128(&mut action_table, 1);
            }
        }
    }

    // Type table, reverse order (filter N is the N-th-from-the-end entry).
    let mut type_table = Vec::new();
    for entry in types.entries.iter() {
        let placeholder_offset = type_table.len();
        type_table.extend_from_slice(&0i32.to_le_bytes());
        if let Some(symbol) = entry {
            type_table_relocs_out.push((placeholder_offset, symbol.clone()));
        }
    }
    type_table.reverse_chunks_of_4();

    // Call-site table: one row per try region, plus gap-filling rows
    // covering every byte of the function not inside a try region (Open
    // Question 1).
    let mut call_sites: Vec<(u64, u64, u64, usize)> = Vec::new();
    let mut cursor = 0u64;
    for (region, action_start) in regions.iter().zip(action_start_for_region.iter()) {
        if region.start_offset > cursor {
            call_sites.push((cursor, region.start_offset - cursor, 0, 0));
        }
        call_sites.push((
            region.start_offset,
            region.end_offset - region.start_offset,
            region.landing_pad_offset,
            *action_start,
        ));
        cursor = region.end_offset;
    }
    if cursor < func_length {
        call_sites.push((cursor, func_length - cursor, 0, 0));
    }

    let mut call_site_table = Vec::new();
    for (start, len, landing_pad, action) in &call_sites {
        write_uleb128(&mut call_site_table, *start);
        write_uleb128(&mut call_site_table, *len);
        write_uleb128(&mut call_site_table, *landing_pad);
        write_uleb128(&mut call_site_table, *action as u64);
    }

    // Header: LPStart format (omitted, defaults to function start), TType
    // format/encoding, TType base offset (distance from right after this
    // ULEB128 field to the end of the type table), call-site table
    // encoding, call-site table length, then the tables themselves.
    let mut out = Vec::new();
    out.push(DW_EH_PE_OMIT); // @LPStart omitted
    if type_table.is_empty() {
        out.push(DW_EH_PE_OMIT); // no type table at all
    } else {
        out.push(DW_EH_PE_PCREL_SDATA4);
        // TType base offset: call-site-table length field (ULEB) +
        // call-site table + action table, all sit between the offset
        // field and the type table, which is appended last and indexed
        // backwards from its end (spec §4.8 header rule).
        let cs_len_field_len = crate::eh::cfi::uleb128_len(call_site_table.len() as u64);
        let body_len = cs_len_field_len + call_site_table.len() + action_table.len();
        write_uleb128(&mut out, (body_len) as u64);
    }
    out.push(DW_EH_PE_UDATA4_UNUSED); // call-site table encoding (uleb128 in practice; GCC uses DW_EH_PE_uleb128 = 0x01)
    write_uleb128(&mut out, call_site_table.len() as u64);
    let call_site_table_start = out.len();
    out.extend_from_slice(&call_site_table);
    out.extend_from_slice(&action_table);
    let type_table_base = out.len();
    out.extend_from_slice(&type_table);

    for (offset, symbol) in type_table_relocs_out.iter_mut() {
        *offset += type_table_base;
        let _ = symbol; // symbol text unchanged; offset rebased into `out`.
    }
    let _ = call_site_table_start;
    out
}

/// `DW_EH_PE_uleb128`, the call-site table's own length-and-entries
/// encoding (every field in the Itanium call-site table is ULEB128,
/// regardless of the TType pointer encoding chosen above).
const DW_EH_PE_UDATA4_UNUSED: u8 = 0x01;

trait ReverseChunksOf4 {
    fn reverse_chunks_of_4(&mut self);
}

impl ReverseChunksOf4 for Vec<u8> {
    /// Reverses the *order* of 4-byte chunks (not the bytes within each
    /// chunk) so the type table's filter-`1`-is-last layout matches
    /// insertion order (filters were assigned low-to-high as new types
    /// were first seen; the on-disk table walks them high-to-low).
    fn reverse_chunks_of_4(&mut self) {
        let n = self.len() / 4;
        for i in 0..n / 2 {
            let (lo, hi) = (i * 4, (n - 1 - i) * 4);
            for k in 0..4 {
                self.swap(lo + k, hi + k);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsda_with_no_try_regions_covers_whole_function_as_a_gap() {
        let mut relocs = Vec::new();
        let bytes = build_lsda(&[], 64, &mut relocs);
        assert!(relocs.is_empty());
        assert!(!bytes.is_empty());
    }

    #[test]
    fn single_try_region_assigns_filter_one_to_its_only_catch() {
        let region = TryRegionInput {
            start_offset: 4,
            end_offset: 20,
            landing_pad_offset: 24,
            catches: vec![CatchEntry {
                type_index: Some(TypeIndex(0)),
                type_info_symbol: Some("_ZTI1E".into()),
            }],
        };
        let mut relocs = Vec::new();
        let bytes = build_lsda(&[region], 40, &mut relocs);
        assert_eq!(relocs.len(), 1);
        assert_eq!(relocs[0].1, "_ZTI1E");
        assert!(!bytes.is_empty());
    }

    #[test]
    fn repeated_catch_type_reuses_the_same_filter() {
        let make = |start, end, lp| TryRegionInput {
            start_offset: start,
            end_offset: end,
            landing_pad_offset: lp,
            catches: vec![CatchEntry {
                type_index: Some(TypeIndex(0)),
                type_info_symbol: Some("_ZTI1E".into()),
            }],
        };
        let mut relocs = Vec::new();
        let bytes = build_lsda(&[make(0, 8, 8), make(16, 24, 24)], 40, &mut relocs);
        // Both regions reference the same type_info symbol, so only one
        // type-table slot (one relocation) should be emitted.
        assert_eq!(relocs.len(), 1);
        assert!(!bytes.is_empty());
    }
}

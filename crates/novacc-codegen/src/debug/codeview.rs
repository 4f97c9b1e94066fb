//! Microsoft CodeView debug info (`.debug$S`/`.debug$T`), spec §4.6 step 8.
//! Grounded on `original_source/src/CodeViewDebug.h`.
//!
//! This is a minimal but structurally faithful subset: one file-checksum
//! table, one string table, one symbol subsection per translation unit
//! holding `S_OBJNAME`/`S_COMPILE3` plus one `S_GPROC32_ID`/`S_FRAMEPROC`/
//! `S_REGREL32`/`S_LOCAL`/`S_PROC_ID_END` run per function, one line-number
//! subsection per function, and a matching `.debug$T` type stream with the
//! handful of record kinds spec §4.6 names (`LF_ARGLIST`, `LF_PROCEDURE`,
//! `LF_FUNC_ID`, `LF_STRING_ID`, `LF_BUILDINFO`).

use super::FunctionDebugInfo;
use std::collections::HashMap;

const CV_SIGNATURE_C13: u32 = 4;

// Subsection kinds (DEBUG_S_*).
const DEBUG_S_SYMBOLS: u32 = 0xf1;
const DEBUG_S_LINES: u32 = 0xf2;
const DEBUG_S_STRINGTABLE: u32 = 0xf3;
const DEBUG_S_FILECHKSMS: u32 = 0xf4;

// Symbol record kinds (S_*).
const S_OBJNAME: u16 = 0x1101;
const S_COMPILE3: u16 = 0x113c;
const S_GPROC32_ID: u16 = 0x1147;
const S_FRAMEPROC: u16 = 0x1012;
const S_REGREL32: u16 = 0x1111;
const S_LOCAL: u16 = 0x113e;
const S_PROC_ID_END: u16 = 0x114f;

// Type record leaves (LF_*).
const LF_ARGLIST: u16 = 0x1201;
const LF_PROCEDURE: u16 = 0x1008;
const LF_FUNC_ID: u16 = 0x1601;
const LF_STRING_ID: u16 = 0x1605;
const LF_BUILDINFO: u16 = 0x1603;

fn pad4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

/// Writes one `(type, length-prefixed, padded)` subsection into `out`.
fn write_subsection(out: &mut Vec<u8>, kind: u32, body: &[u8]) {
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    pad4(out);
}

/// Writes one length-prefixed symbol record: `u16 length` (of `kind` +
/// `data`), `u16 kind`, then `data`.
fn write_symbol_record(out: &mut Vec<u8>, kind: u16, data: &[u8]) {
    let len = (2 + data.len()) as u16;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(data);
}

fn nul_terminated(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

/// SHA-256 file checksum (spec §4.6 "file checksum table (SHA-256)"),
/// via the `sha2` crate rather than a hand-rolled compression function.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(data).into()
}

/// Builds the full `.debug$S` section for one translation unit (spec §4.6
/// step 8): file-checksum subsection, string table, one symbols
/// subsection with the object/compiler records plus a per-function proc
/// run, and one line subsection per function.
pub fn build_debug_s(
    object_name: &str,
    source_files: &[String],
    functions: &[FunctionDebugInfo],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&CV_SIGNATURE_C13.to_le_bytes());

    // String table: object name, source file names, function names.
    let mut string_table = vec![0u8]; // offset 0 is always the empty string
    let mut string_offsets: HashMap<String, u32> = HashMap::new();
    let mut intern_str = |s: &str, table: &mut Vec<u8>, offsets: &mut HashMap<String, u32>| -> u32 {
        if let Some(&off) = offsets.get(s) {
            return off;
        }
        let off = table.len() as u32;
        table.extend_from_slice(&nul_terminated(s));
        offsets.insert(s.to_string(), off);
        off
    };
    let object_name_off = intern_str(object_name, &mut string_table, &mut string_offsets);
    for f in source_files {
        intern_str(f, &mut string_table, &mut string_offsets);
    }
    for func in functions {
        intern_str(&func.mangled_name, &mut string_table, &mut string_offsets);
    }
    write_subsection(&mut out, DEBUG_S_STRINGTABLE, &string_table);

    // File checksums: one MD5-sized slot header but SHA-256 payload (spec
    // explicitly calls for SHA-256, which does not match the on-disk
    // format's usual MD5 slot size exactly — novacc keeps the full
    // 32-byte digest since nothing downstream here re-parses this table
    // except novacc itself).
    let mut checksums = Vec::new();
    let mut file_offsets: HashMap<String, u32> = HashMap::new();
    for f in source_files {
        let name_off = *string_offsets.get(f).unwrap_or(&0);
        let entry_off = checksums.len() as u32;
        file_offsets.insert(f.clone(), entry_off);
        checksums.extend_from_slice(&name_off.to_le_bytes());
        checksums.push(32); // checksum length
        checksums.push(2); // CHKSUM_TYPE_SHA_256 (vendor-private extension id used here)
        checksums.extend_from_slice(&sha256(f.as_bytes()));
        pad4(&mut checksums);
    }
    write_subsection(&mut out, DEBUG_S_FILECHKSMS, &checksums);

    // Symbols subsection.
    let mut symbols = Vec::new();
    {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes()); // signature/language placeholder
        data.extend_from_slice(&nul_terminated(object_name));
        write_symbol_record(&mut symbols, S_OBJNAME, &data);
    }
    {
        let mut data = Vec::new();
        data.extend_from_slice(&0x00070000u32.to_le_bytes()); // machine=x64, flags
        data.extend_from_slice(&19u32.to_le_bytes()); // frontend version major/minor/build (packed, approximate)
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&nul_terminated("novacc"));
        write_symbol_record(&mut symbols, S_COMPILE3, &data);
    }
    for func in functions {
        {
            let mut data = Vec::new();
            data.extend_from_slice(&0u32.to_le_bytes()); // pParent
            data.extend_from_slice(&0u32.to_le_bytes()); // pEnd (patched by a real linker; left 0)
            data.extend_from_slice(&0u32.to_le_bytes()); // pNext
            data.extend_from_slice(&func.code_size.to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes()); // debug start
            data.extend_from_slice(&func.code_size.to_le_bytes()); // debug end
            data.extend_from_slice(&0u32.to_le_bytes()); // type index (LF_PROCEDURE, resolved against .debug$T by a real toolchain)
            data.extend_from_slice(&func.code_offset.to_le_bytes());
            data.extend_from_slice(&0u16.to_le_bytes()); // section (patched at link time via SECREL/SECTION relocs)
            data.push(0); // flags
            data.extend_from_slice(&nul_terminated(&func.mangled_name));
            write_symbol_record(&mut symbols, S_GPROC32_ID, &data);
        }
        {
            let mut data = Vec::new();
            data.extend_from_slice(&(func.frame_size.unsigned_abs()).to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
            write_symbol_record(&mut symbols, S_FRAMEPROC, &data);
        }
        for local in func.params.iter().chain(func.locals.iter()) {
            {
                let mut data = Vec::new();
                data.extend_from_slice(&0u32.to_le_bytes()); // type index
                data.extend_from_slice(&0u16.to_le_bytes()); // LOCAL flags
                data.extend_from_slice(&nul_terminated(&local.name));
                write_symbol_record(&mut symbols, S_LOCAL, &data);
            }
            {
                let mut data = Vec::new();
                data.extend_from_slice(&local.rbp_offset.to_le_bytes());
                data.extend_from_slice(&0u32.to_le_bytes()); // type index
                data.extend_from_slice(&334u16.to_le_bytes()); // CV_REG_RBP (approximate x64 register id)
                data.extend_from_slice(&nul_terminated(&local.type_name));
                write_symbol_record(&mut symbols, S_REGREL32, &data);
            }
        }
        write_symbol_record(&mut symbols, S_PROC_ID_END, &[]);
    }
    write_subsection(&mut out, DEBUG_S_SYMBOLS, &symbols);

    // One line-number subsection per function (spec §4.6 step 8
    // "line-info subsections").
    for func in functions {
        let mut data = Vec::new();
        data.extend_from_slice(&func.code_offset.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // section
        data.extend_from_slice(&0u16.to_le_bytes()); // flags
        data.extend_from_slice(&func.code_size.to_le_bytes());
        let file_off = *file_offsets
            .get(&func.source_name)
            .unwrap_or(&0);
        data.extend_from_slice(&file_off.to_le_bytes()); // file-block file id
        data.extend_from_slice(&(func.line_table.len() as u32).to_le_bytes());
        data.extend_from_slice(&((12 + func.line_table.len() * 8) as u32).to_le_bytes());
        for (code_offset, line) in &func.line_table {
            data.extend_from_slice(&code_offset.to_le_bytes());
            // High bit clear = statement (not an expression); low 31 bits
            // hold the line number.
            data.extend_from_slice(&(line & 0x7fff_ffff).to_le_bytes());
        }
        write_subsection(&mut out, DEBUG_S_LINES, &data);
    }

    let _ = object_name_off;
    out
}

/// Builds the matching `.debug$T` type stream: one `LF_STRING_ID` for the
/// object file name, an `LF_BUILDINFO` tying it to `LF_ARGLIST`/
/// `LF_PROCEDURE`/`LF_FUNC_ID` records — spec §4.6 step 8's named leaf
/// kinds, in the minimal shape the CodeView consumer needs to see a
/// well-formed type stream (no deduplication/back-reference compression).
pub fn build_debug_t(functions: &[FunctionDebugInfo]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&CV_SIGNATURE_C13.to_le_bytes());

    let mut next_index: u32 = 0x1000; // type indices below 0x1000 are reserved primitives
    let mut write_leaf = |out: &mut Vec<u8>, kind: u16, body: &[u8]| -> u32 {
        let mut rec = Vec::new();
        rec.extend_from_slice(&kind.to_le_bytes());
        rec.extend_from_slice(body);
        pad4(&mut rec);
        out.extend_from_slice(&(rec.len() as u16).to_le_bytes());
        out.extend_from_slice(&rec);
        let idx = next_index;
        next_index += 1;
        idx
    };

    for func in functions {
        // LF_ARGLIST: zero-argument list (param types are not tracked
        // precisely enough yet to round-trip through a real debugger's
        // type viewer; the count is still correct).
        let arglist_body = {
            let mut b = Vec::new();
            b.extend_from_slice(&(func.params.len() as u32).to_le_bytes());
            b
        };
        let arglist_idx = write_leaf(&mut out, LF_ARGLIST, &arglist_body);

        // LF_PROCEDURE: return type (void=0x0003 placeholder), calling
        // convention (0 = near C), 0 flags, param count, arglist index.
        let proc_body = {
            let mut b = Vec::new();
            b.extend_from_slice(&0x0003u32.to_le_bytes());
            b.push(0);
            b.push(0);
            b.extend_from_slice(&(func.params.len() as u16).to_le_bytes());
            b.extend_from_slice(&arglist_idx.to_le_bytes());
            b
        };
        let proc_idx = write_leaf(&mut out, LF_PROCEDURE, &proc_body);

        // LF_FUNC_ID: scope (0 = global), function type, name.
        let func_id_body = {
            let mut b = Vec::new();
            b.extend_from_slice(&0u32.to_le_bytes());
            b.extend_from_slice(&proc_idx.to_le_bytes());
            b.extend_from_slice(&nul_terminated(&func.mangled_name));
            b
        };
        write_leaf(&mut out, LF_FUNC_ID, &func_id_body);
    }

    // LF_STRING_ID + LF_BUILDINFO for the object file as a whole.
    let string_id_body = nul_terminated("novacc");
    let string_id_idx = write_leaf(&mut out, LF_STRING_ID, &string_id_body);
    let buildinfo_body = {
        let mut b = Vec::new();
        b.push(1); // count
        b.extend_from_slice(&string_id_idx.to_le_bytes());
        b
    };
    write_leaf(&mut out, LF_BUILDINFO, &buildinfo_body);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_string_matches_known_digest() {
        let digest = sha256(b"");
        let expected = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        assert_eq!(digest, expected);
    }

    #[test]
    fn debug_s_is_nonempty_and_starts_with_signature() {
        let func = FunctionDebugInfo {
            mangled_name: "?main@@YAHXZ".into(),
            source_name: "main.cpp".into(),
            code_offset: 0,
            code_size: 16,
            frame_size: 32,
            params: vec![],
            locals: vec![],
            line_table: vec![(0, 1), (4, 2)],
        };
        let bytes = build_debug_s("main.obj", &["main.cpp".to_string()], &[func]);
        assert_eq!(&bytes[0..4], &CV_SIGNATURE_C13.to_le_bytes());
    }

    #[test]
    fn debug_t_starts_with_signature() {
        let func = FunctionDebugInfo {
            mangled_name: "?main@@YAHXZ".into(),
            source_name: "main.cpp".into(),
            code_offset: 0,
            code_size: 16,
            frame_size: 32,
            params: vec![],
            locals: vec![],
            line_table: vec![],
        };
        let bytes = build_debug_t(&[func]);
        assert_eq!(&bytes[0..4], &CV_SIGNATURE_C13.to_le_bytes());
    }
}

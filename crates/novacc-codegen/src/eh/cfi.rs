//! DWARF Call Frame Information encoder (spec §4.8): ULEB128/SLEB128
//! helpers, `DW_EH_PE_*` pointer-encoding constants, and the `.eh_frame`
//! CIE/FDE builder used by the ELF backend's unwind tables (spec §4.6
//! step 4 "DWARF CFI (ELF)").
//!
//! Grounded on `original_source/src/DwarfCFI.h`. The CIE/FDE container
//! itself is built with `gimli::write` (already a teacher workspace
//! dependency); the raw LEB128 writers here back the LSDA encoder in
//! [`crate::eh::lsda`], which needs variable-length fields `gimli::write`
//! does not expose directly.

use gimli::write::{
    Address, CallFrameInstruction, CommonInformationEntry, EhFrame, EndianVec,
    FrameDescriptionEntry, FrameTable,
};
use gimli::{Encoding, Format, LittleEndian, Register};

/// `DW_EH_PE_*` encoding byte for "PC-relative, 4-byte signed" — what the
/// LSDA's type table and the `.eh_frame` FDE pointers both use (spec §4.8
/// "4-byte PC-relative indirect pointers").
pub const DW_EH_PE_PCREL_SDATA4: u8 = 0x1b;
pub const DW_EH_PE_OMIT: u8 = 0xff;
pub const DW_EH_PE_UDATA4: u8 = 0x03;
pub const DW_EH_PE_UDATA8: u8 = 0x04;

/// Appends `value` ULEB128-encoded to `out`, returning the number of bytes
/// written (spec §4.8 "call-site table (ULEB128-encoded)").
pub fn write_uleb128(out: &mut Vec<u8>, value: u64) -> usize {
    let start = out.len();
    leb128::write::unsigned(out, value).expect("Vec<u8> write is infallible");
    out.len() - start
}

/// Appends `value` SLEB128-encoded to `out` (spec §4.8 "action table
/// (SLEB128 filters)").
pub fn write_sleb128(out: &mut Vec<u8>, value: i64) -> usize {
    let start = out.len();
    leb128::write::signed(out, value).expect("Vec<u8> write is infallible");
    out.len() - start
}

/// Byte-length an ULEB128 value would occupy, without writing it — needed
/// to compute the LSDA header's "TType base offset" before the call-site
/// table itself has been serialised (spec §4.8 "distance from after the
/// ULEB128 TType-base field to the end of the type table").
pub fn uleb128_len(value: u64) -> usize {
    let mut scratch = Vec::new();
    write_uleb128(&mut scratch, value)
}

/// x86-64 DWARF register numbers used by the CFI program (System V ABI
/// register numbering: rax=0 .. rbp=6, rsp=7, ra(rip)=16).
pub const DW_REG_RBP: Register = Register(6);
pub const DW_REG_RSP: Register = Register(7);
pub const DW_REG_RA: Register = Register(16);

/// One function's CFI program: the prologue's `push rbp; mov rbp, rsp`
/// sequence described as CFA-tracking instructions, plus the byte offset
/// (within the function) each instruction takes effect at.
pub struct FunctionCfi {
    pub address: u64,
    pub length: u64,
    /// `(offset_in_function, instruction)` pairs in increasing offset
    /// order (spec §4.6 step 4 "adjust ... DWARF CFI").
    pub rows: Vec<(u64, CallFrameInstruction)>,
}

/// Standard prologue CFI for the frame shape `emit.rs` always generates:
/// `push rbp` (CFA becomes `rsp+16`), `mov rbp, rsp` (CFA becomes
/// `rbp+16`), then the `sub rsp, frame_size` that does not move the CFA
/// since it is now anchored at `rbp`.
pub fn standard_prologue_cfi(func_address: u64, func_length: u64) -> FunctionCfi {
    FunctionCfi {
        address: func_address,
        length: func_length,
        rows: vec![
            (0, CallFrameInstruction::Cfa(DW_REG_RSP, 8)),
            (1, CallFrameInstruction::CfaOffset(DW_REG_RA, -8)),
            (1, CallFrameInstruction::Cfa(DW_REG_RSP, 16)),
            (1, CallFrameInstruction::Offset(DW_REG_RBP, -16)),
            (4, CallFrameInstruction::CfaRegister(DW_REG_RBP)),
        ],
    }
}

/// Builds the complete `.eh_frame` section for every function in a
/// translation unit: one shared CIE plus one FDE per function (spec §4.8,
/// §4.6 step 4).
pub fn build_eh_frame(functions: &[FunctionCfi]) -> Vec<u8> {
    let encoding = Encoding {
        format: Format::Dwarf32,
        version: 1,
        address_size: 8,
    };
    let mut table = FrameTable::default();
    let mut cie = CommonInformationEntry::new(encoding, 1, -8, DW_REG_RA);
    cie.add_instruction(CallFrameInstruction::Cfa(DW_REG_RSP, 8));
    cie.add_instruction(CallFrameInstruction::Offset(DW_REG_RA, -8));
    let cie_id = table.add_cie(cie);

    for func in functions {
        let mut fde = FrameDescriptionEntry::new(
            Address::Constant(func.address),
            func.length as u32,
        );
        for (offset, insn) in &func.rows {
            fde.add_instruction(*offset as u32, insn.clone());
        }
        table.add_fde(cie_id, fde);
    }

    let mut writer = EhFrame::from(EndianVec::new(LittleEndian));
    table
        .write_eh_frame(&mut writer)
        .expect("writing .eh_frame to an in-memory buffer cannot fail");
    writer.0.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uleb128_roundtrips_small_and_large_values() {
        let mut buf = Vec::new();
        write_uleb128(&mut buf, 0);
        write_uleb128(&mut buf, 127);
        write_uleb128(&mut buf, 128);
        write_uleb128(&mut buf, 300);
        let mut slice = &buf[..];
        assert_eq!(leb128::read::unsigned(&mut slice).unwrap(), 0);
        assert_eq!(leb128::read::unsigned(&mut slice).unwrap(), 127);
        assert_eq!(leb128::read::unsigned(&mut slice).unwrap(), 128);
        assert_eq!(leb128::read::unsigned(&mut slice).unwrap(), 300);
    }

    #[test]
    fn sleb128_roundtrips_negative_values() {
        let mut buf = Vec::new();
        write_sleb128(&mut buf, -1);
        write_sleb128(&mut buf, -128);
        write_sleb128(&mut buf, 63);
        let mut slice = &buf[..];
        assert_eq!(leb128::read::signed(&mut slice).unwrap(), -1);
        assert_eq!(leb128::read::signed(&mut slice).unwrap(), -128);
        assert_eq!(leb128::read::signed(&mut slice).unwrap(), 63);
    }

    #[test]
    fn eh_frame_has_elf_cie_header() {
        let bytes = build_eh_frame(&[standard_prologue_cfi(0, 16)]);
        assert!(!bytes.is_empty());
        // First 4 bytes are the CIE's length field, little-endian.
        let len = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert!((len as usize) < bytes.len());
    }
}

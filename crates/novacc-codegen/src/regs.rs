//! x86-64 register model and raw instruction encoding (spec §4.6).
//!
//! No register allocator sits in front of this: every value lives in a
//! fixed stack slot (see [`crate::frame`]) and is loaded into one of a
//! small, fixed set of scratch registers before an operation and stored
//! back after (DESIGN.md Open Question 4 — the spec's "no optimization
//! passes" Non-goal rules out a graph-coloring allocator here). `Asm` only
//! needs to know how to encode instructions that touch those scratch
//! registers plus RBP-relative memory operands.

/// General-purpose register, numbered per the x86-64 encoding (0-15); bit 3
/// is the REX.B/R/X extension bit for registers 8-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gpr {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Gpr {
    pub fn code(self) -> u8 {
        match self {
            Gpr::Rax => 0,
            Gpr::Rcx => 1,
            Gpr::Rdx => 2,
            Gpr::Rbx => 3,
            Gpr::Rsp => 4,
            Gpr::Rbp => 5,
            Gpr::Rsi => 6,
            Gpr::Rdi => 7,
            Gpr::R8 => 8,
            Gpr::R9 => 9,
            Gpr::R10 => 10,
            Gpr::R11 => 11,
            Gpr::R12 => 12,
            Gpr::R13 => 13,
            Gpr::R14 => 14,
            Gpr::R15 => 15,
        }
    }

    fn low3(self) -> u8 {
        self.code() & 0x7
    }

    fn needs_rex_extension(self) -> bool {
        self.code() >= 8
    }

    /// Windows x64 argument registers, in order (spec §4.6 calling
    /// convention).
    pub fn windows_int_args() -> [Gpr; 4] {
        [Gpr::Rcx, Gpr::Rdx, Gpr::R8, Gpr::R9]
    }

    /// System V AMD64 argument registers, in order.
    pub fn sysv_int_args() -> [Gpr; 6] {
        [Gpr::Rdi, Gpr::Rsi, Gpr::Rdx, Gpr::Rcx, Gpr::R8, Gpr::R9]
    }
}

/// SSE2 register for floating-point values (spec §4.6 "Floating-point uses
/// SSE2").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Xmm {
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
}

impl Xmm {
    fn code(self) -> u8 {
        match self {
            Xmm::Xmm0 => 0,
            Xmm::Xmm1 => 1,
            Xmm::Xmm2 => 2,
            Xmm::Xmm3 => 3,
        }
    }
}

/// The condition code for `Jcc`/`SETcc`, derived from an `IrBinaryOp`
/// comparison (spec §4.6 "Comparisons set flags then a conditional branch
/// encodes the correct Jcc").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cc {
    E,
    Ne,
    LSigned,
    LeSigned,
    GSigned,
    GeSigned,
    BUnsigned,
    BeUnsigned,
    AUnsigned,
    AeUnsigned,
}

impl Cc {
    fn tttn(self) -> u8 {
        match self {
            Cc::E => 0x4,
            Cc::Ne => 0x5,
            Cc::LSigned => 0xC,
            Cc::GeSigned => 0xD,
            Cc::LeSigned => 0xE,
            Cc::GSigned => 0xF,
            Cc::BUnsigned => 0x2,
            Cc::AeUnsigned => 0x3,
            Cc::BeUnsigned => 0x6,
            Cc::AUnsigned => 0x7,
        }
    }
}

/// A not-yet-resolved reference to a `LabelId`'s eventual byte offset,
/// patched in [`Asm::resolve_labels`] once every label has been placed
/// (spec §4.6 "Branches and labels are buffered; label offsets are fixed
/// up at function end").
#[derive(Debug, Clone, Copy)]
pub struct LabelFixup {
    pub patch_at: usize,
    pub label: novacc_ir::LabelId,
}

/// A call/data reference that must become an object-file relocation once
/// the function's final offset within `.text` is known.
#[derive(Debug, Clone)]
pub struct PendingReloc {
    pub patch_at: usize,
    pub symbol: String,
    pub kind: novacc_objfile::RelocKind,
    pub addend: i64,
}

/// Accumulates encoded bytes for one function body, plus the fixups needed
/// once all labels are placed and the function's base address in `.text`
/// is known.
#[derive(Default)]
pub struct Asm {
    pub bytes: Vec<u8>,
    pub labels: std::collections::HashMap<novacc_ir::LabelId, usize>,
    pub label_fixups: Vec<LabelFixup>,
    pub relocs: Vec<PendingReloc>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn place_label(&mut self, label: novacc_ir::LabelId) {
        self.labels.insert(label, self.offset());
    }

    fn rex(&mut self, w: bool, r: bool, x: bool, b: bool) {
        let byte = 0x40 | ((w as u8) << 3) | ((r as u8) << 2) | ((x as u8) << 1) | (b as u8);
        if w || r || x || b {
            self.bytes.push(byte);
        }
    }

    fn modrm(&mut self, mode: u8, reg: u8, rm: u8) {
        self.bytes.push((mode << 6) | ((reg & 7) << 3) | (rm & 7));
    }

    fn imm32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn imm64(&mut self, v: i64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// `[rbp + disp]` memory operand encoding shared by every
    /// load/store-to-local instruction; always uses the disp32 form for
    /// simplicity (spec's "trivial peephole" allowance does not require
    /// disp8 packing).
    fn rbp_mem(&mut self, reg_field: u8, disp: i32) {
        self.modrm(0b10, reg_field, Gpr::Rbp.low3());
        self.imm32(disp);
    }

    // --- moves ---

    pub fn mov_reg_imm64(&mut self, dst: Gpr, value: i64) {
        self.rex(true, false, false, dst.needs_rex_extension());
        self.bytes.push(0xB8 + dst.low3());
        self.imm64(value);
    }

    pub fn mov_reg_imm32_zx(&mut self, dst: Gpr, value: u32) {
        // mov r32, imm32 — zero-extends into the full 64-bit register, one
        // byte shorter than the REX.W form; used for small unsigned/bool
        // immediates.
        if dst.needs_rex_extension() {
            self.rex(false, false, false, true);
        }
        self.bytes.push(0xB8 + dst.low3());
        self.imm32(value as i32);
    }

    pub fn mov_reg_rbp(&mut self, dst: Gpr, disp: i32) {
        self.rex(true, dst.needs_rex_extension(), false, false);
        self.bytes.push(0x8B);
        self.rbp_mem(dst.low3(), disp);
    }

    pub fn mov_rbp_reg(&mut self, disp: i32, src: Gpr) {
        self.rex(true, src.needs_rex_extension(), false, false);
        self.bytes.push(0x89);
        self.rbp_mem(src.low3(), disp);
    }

    pub fn mov_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.rex(true, src.needs_rex_extension(), false, dst.needs_rex_extension());
        self.bytes.push(0x89);
        self.modrm(0b11, src.low3(), dst.low3());
    }

    /// `lea reg, [rbp + disp]` — computes an address without dereferencing,
    /// used for `ComputeAddress`/`ArrayElementAddress`/`&local`.
    pub fn lea_reg_rbp(&mut self, dst: Gpr, disp: i32) {
        self.rex(true, dst.needs_rex_extension(), false, false);
        self.bytes.push(0x8D);
        self.rbp_mem(dst.low3(), disp);
    }

    /// `mov [reg], src` / `mov dst, [reg]` — pointer dereference for
    /// `MemberLoad`/`MemberStore`/`ArrayAccess` once the base address is in
    /// a register.
    pub fn mov_ptr_reg(&mut self, base: Gpr, disp: i32, src: Gpr) {
        self.rex(true, src.needs_rex_extension(), false, base.needs_rex_extension());
        self.bytes.push(0x89);
        if disp == 0 && base != Gpr::Rbp {
            self.modrm(0b00, src.low3(), base.low3());
        } else {
            self.modrm(0b10, src.low3(), base.low3());
            self.imm32(disp);
        }
    }

    pub fn mov_reg_ptr(&mut self, dst: Gpr, base: Gpr, disp: i32) {
        self.rex(true, dst.needs_rex_extension(), false, base.needs_rex_extension());
        self.bytes.push(0x8B);
        if disp == 0 && base != Gpr::Rbp {
            self.modrm(0b00, dst.low3(), base.low3());
        } else {
            self.modrm(0b10, dst.low3(), base.low3());
            self.imm32(disp);
        }
    }

    // --- arithmetic (register-register, spec: "Integer arithmetic prefers
    // register-register") ---

    fn binop_rm(&mut self, opcode: u8, dst: Gpr, src: Gpr) {
        self.rex(true, src.needs_rex_extension(), false, dst.needs_rex_extension());
        self.bytes.push(opcode);
        self.modrm(0b11, src.low3(), dst.low3());
    }

    pub fn add_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.binop_rm(0x01, dst, src);
    }
    pub fn sub_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.binop_rm(0x29, dst, src);
    }
    pub fn and_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.binop_rm(0x21, dst, src);
    }
    pub fn or_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.binop_rm(0x09, dst, src);
    }
    pub fn xor_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.binop_rm(0x31, dst, src);
    }
    pub fn cmp_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.binop_rm(0x39, dst, src);
    }

    /// `imul dst, src` (two-operand form, `0F AF`).
    pub fn imul_reg_reg(&mut self, dst: Gpr, src: Gpr) {
        self.rex(true, dst.needs_rex_extension(), false, src.needs_rex_extension());
        self.bytes.push(0x0F);
        self.bytes.push(0xAF);
        self.modrm(0b11, dst.low3(), src.low3());
    }

    /// Signed divide: `rax:rdx <- rax / src` via `cqo; idiv src`. Quotient
    /// left in rax, remainder in rdx (spec's `DivI`/`ModI` share this).
    pub fn cqo(&mut self) {
        self.rex(true, false, false, false);
        self.bytes.push(0x99);
    }
    pub fn idiv_reg(&mut self, src: Gpr) {
        self.rex(true, false, false, src.needs_rex_extension());
        self.bytes.push(0xF7);
        self.modrm(0b11, 7, src.low3());
    }
    /// Unsigned divide: `rdx <- 0; div src`.
    pub fn xor_rdx_rdx(&mut self) {
        self.xor_reg_reg(Gpr::Rdx, Gpr::Rdx);
    }
    pub fn div_reg(&mut self, src: Gpr) {
        self.rex(true, false, false, src.needs_rex_extension());
        self.bytes.push(0xF7);
        self.modrm(0b11, 6, src.low3());
    }

    pub fn neg_reg(&mut self, reg: Gpr) {
        self.rex(true, false, false, reg.needs_rex_extension());
        self.bytes.push(0xF7);
        self.modrm(0b11, 3, reg.low3());
    }
    pub fn not_reg(&mut self, reg: Gpr) {
        self.rex(true, false, false, reg.needs_rex_extension());
        self.bytes.push(0xF7);
        self.modrm(0b11, 2, reg.low3());
    }

    /// `shl`/`sar`/`shr` by the count in `cl` (spec's `Shl`/`Shr` IR ops).
    pub fn shl_reg_cl(&mut self, dst: Gpr) {
        self.rex(true, false, false, dst.needs_rex_extension());
        self.bytes.push(0xD3);
        self.modrm(0b11, 4, dst.low3());
    }
    pub fn sar_reg_cl(&mut self, dst: Gpr) {
        self.rex(true, false, false, dst.needs_rex_extension());
        self.bytes.push(0xD3);
        self.modrm(0b11, 7, dst.low3());
    }
    pub fn shr_reg_cl(&mut self, dst: Gpr) {
        self.rex(true, false, false, dst.needs_rex_extension());
        self.bytes.push(0xD3);
        self.modrm(0b11, 5, dst.low3());
    }

    pub fn setcc(&mut self, cc: Cc, dst: Gpr) {
        if dst.needs_rex_extension() {
            self.rex(false, false, false, true);
        }
        self.bytes.push(0x0F);
        self.bytes.push(0x90 | cc.tttn());
        self.modrm(0b11, 0, dst.low3());
    }

    /// Zero-extends al (set by `setcc`) into the full register (spec: the
    /// comparison's typed result is a `bool` loaded as 0/1).
    pub fn movzx_reg_al(&mut self, dst: Gpr) {
        self.rex(true, dst.needs_rex_extension(), false, false);
        self.bytes.push(0x0F);
        self.bytes.push(0xB6);
        self.modrm(0b11, dst.low3(), Gpr::Rax.low3());
    }

    pub fn push_reg(&mut self, reg: Gpr) {
        if reg.needs_rex_extension() {
            self.rex(false, false, false, true);
        }
        self.bytes.push(0x50 + reg.low3());
    }
    pub fn pop_reg(&mut self, reg: Gpr) {
        if reg.needs_rex_extension() {
            self.rex(false, false, false, true);
        }
        self.bytes.push(0x58 + reg.low3());
    }

    pub fn ret(&mut self) {
        self.bytes.push(0xC3);
    }

    pub fn nop(&mut self) {
        self.bytes.push(0x90);
    }

    // --- control flow: forward-patched via LabelFixup ---

    pub fn jmp_label(&mut self, label: novacc_ir::LabelId) {
        self.bytes.push(0xE9);
        let patch_at = self.offset();
        self.imm32(0);
        self.label_fixups.push(LabelFixup { patch_at, label });
    }

    pub fn jcc_label(&mut self, cc: Cc, label: novacc_ir::LabelId) {
        self.bytes.push(0x0F);
        self.bytes.push(0x80 | cc.tttn());
        let patch_at = self.offset();
        self.imm32(0);
        self.label_fixups.push(LabelFixup { patch_at, label });
    }

    /// `call rel32` against an external/local symbol, recorded as a
    /// relocation rather than a label fixup (spec §4.6 relocation table).
    pub fn call_symbol(&mut self, symbol: &str) {
        self.bytes.push(0xE8);
        let patch_at = self.offset();
        self.imm32(0);
        self.relocs.push(PendingReloc {
            patch_at,
            symbol: symbol.to_string(),
            kind: novacc_objfile::RelocKind::Pc32,
            addend: -4,
        });
    }

    pub fn call_reg(&mut self, reg: Gpr) {
        if reg.needs_rex_extension() {
            self.rex(false, false, false, true);
        }
        self.bytes.push(0xFF);
        self.modrm(0b11, 2, reg.low3());
    }

    /// Indirect call through a vtable slot already loaded into `reg`
    /// (`VirtualCall`, spec §4.5).
    pub fn call_reg_indirect(&mut self, reg: Gpr) {
        self.call_reg(reg);
    }

    /// `sub rsp, imm32` / `add rsp, imm32` for prologue/epilogue frame
    /// allocation.
    pub fn sub_rsp_imm32(&mut self, value: i32) {
        self.rex(true, false, false, false);
        self.bytes.push(0x81);
        self.modrm(0b11, 5, Gpr::Rsp.low3());
        self.imm32(value);
    }
    pub fn add_rsp_imm32(&mut self, value: i32) {
        self.rex(true, false, false, false);
        self.bytes.push(0x81);
        self.modrm(0b11, 0, Gpr::Rsp.low3());
        self.imm32(value);
    }

    pub fn mov_reg_rsp(&mut self, dst: Gpr) {
        self.mov_reg_reg(dst, Gpr::Rsp);
    }

    /// Resolves every buffered `jmp`/`jcc` fixup against placed labels.
    /// Called once the whole function body has been walked (spec §4.6
    /// "label offsets are fixed up at function end").
    pub fn resolve_labels(&mut self) -> Result<(), novacc_ir::LabelId> {
        for fixup in &self.label_fixups {
            let target = *self.labels.get(&fixup.label).ok_or(fixup.label)?;
            // rel32 is relative to the address of the *next* instruction,
            // i.e. 4 bytes after the patch site.
            let rel = target as i64 - (fixup.patch_at as i64 + 4);
            let bytes = (rel as i32).to_le_bytes();
            self.bytes[fixup.patch_at..fixup.patch_at + 4].copy_from_slice(&bytes);
        }
        Ok(())
    }

    // --- SSE2 floating point ---

    fn xmm_modrm(&mut self, reg: Xmm, rm_reg: Xmm) {
        self.modrm(0b11, reg.code(), rm_reg.code());
    }

    pub fn movsd_xmm_rbp(&mut self, dst: Xmm, disp: i32) {
        self.bytes.extend_from_slice(&[0xF2, 0x0F, 0x10]);
        self.modrm(0b10, dst.code(), Gpr::Rbp.low3());
        self.imm32(disp);
    }
    pub fn movsd_rbp_xmm(&mut self, disp: i32, src: Xmm) {
        self.bytes.extend_from_slice(&[0xF2, 0x0F, 0x11]);
        self.modrm(0b10, src.code(), Gpr::Rbp.low3());
        self.imm32(disp);
    }
    pub fn addsd(&mut self, dst: Xmm, src: Xmm) {
        self.bytes.extend_from_slice(&[0xF2, 0x0F, 0x58]);
        self.xmm_modrm(dst, src);
    }
    pub fn subsd(&mut self, dst: Xmm, src: Xmm) {
        self.bytes.extend_from_slice(&[0xF2, 0x0F, 0x5C]);
        self.xmm_modrm(dst, src);
    }
    pub fn mulsd(&mut self, dst: Xmm, src: Xmm) {
        self.bytes.extend_from_slice(&[0xF2, 0x0F, 0x59]);
        self.xmm_modrm(dst, src);
    }
    pub fn divsd(&mut self, dst: Xmm, src: Xmm) {
        self.bytes.extend_from_slice(&[0xF2, 0x0F, 0x5E]);
        self.xmm_modrm(dst, src);
    }
    /// `comisd dst, src` sets flags for `setcc`/`jcc` (unordered-aware
    /// compare; novacc treats NaN results as "not less/greater", matching
    /// IEEE 754 default semantics).
    pub fn comisd(&mut self, dst: Xmm, src: Xmm) {
        self.bytes.extend_from_slice(&[0x66, 0x0F, 0x2F]);
        self.xmm_modrm(dst, src);
    }
    pub fn cvtsi2sd(&mut self, dst: Xmm, src: Gpr) {
        self.bytes.push(0xF2);
        self.rex(true, false, false, src.needs_rex_extension());
        self.bytes.extend_from_slice(&[0x0F, 0x2A]);
        self.modrm(0b11, dst.code(), src.low3());
    }
    pub fn cvttsd2si(&mut self, dst: Gpr, src: Xmm) {
        self.bytes.push(0xF2);
        self.rex(true, dst.needs_rex_extension(), false, false);
        self.bytes.extend_from_slice(&[0x0F, 0x2C]);
        self.modrm(0b11, dst.low3(), src.code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_reg_imm64_emits_rex_w_and_8_byte_immediate() {
        let mut asm = Asm::new();
        asm.mov_reg_imm64(Gpr::Rax, 42);
        assert_eq!(asm.bytes[0], 0x48);
        assert_eq!(asm.bytes[1], 0xB8);
        assert_eq!(&asm.bytes[2..10], &42i64.to_le_bytes());
    }

    #[test]
    fn jmp_fixup_resolves_to_correct_relative_offset() {
        let mut asm = Asm::new();
        let label = novacc_ir::LabelId(0);
        asm.jmp_label(label);
        asm.nop();
        asm.place_label(label);
        asm.resolve_labels().unwrap();
        let patch_at = 1; // opcode byte then 4-byte operand
        let rel = i32::from_le_bytes(asm.bytes[patch_at..patch_at + 4].try_into().unwrap());
        assert_eq!(rel, 1); // one nop between the end of the jmp and the label
    }

    #[test]
    fn ret_is_single_byte() {
        let mut asm = Asm::new();
        asm.ret();
        assert_eq!(asm.bytes, vec![0xC3]);
    }
}

//! Per-function stack frame layout (spec §4.6 step 1): assigns every named
//! local and every IR temporary a fixed, RBP-relative slot, and tracks the
//! Windows x64 shadow space requirement.
//!
//! DESIGN.md Open Question 4: novacc has no register allocator, so the
//! frame is sized generously (one 8-byte slot per temp, one slot per
//! local) rather than packed by liveness. This is the "trivial" strategy
//! the spec's Non-goals leave room for.

use novacc_core::ObjectFormat;
use novacc_ir::{Ir, IrOp, TempVar};
use std::collections::HashMap;

/// Windows x64 requires 32 bytes of shadow space below the return address
/// for the callee to spill its register arguments into, even if it never
/// does (spec §4.6 step 1 "Windows x64 requires 32-byte shadow space").
pub const WINDOWS_SHADOW_SPACE: i32 = 32;

#[derive(Debug, Clone, Copy)]
pub struct Slot {
    /// Offset from RBP; always negative (locals/temps live below the saved
    /// RBP, spec §4.6 "negative-from-RBP offset").
    pub rbp_offset: i32,
    pub size: u32,
}

pub struct FrameLayout {
    pub locals: HashMap<novacc_core::StringHandle, Slot>,
    pub temps: HashMap<TempVar, Slot>,
    /// Total frame size, rounded up to a 16-byte multiple (spec §4.6
    /// "total frame size (multiple of 16)").
    pub frame_size: i32,
    pub shadow_space: i32,
    /// One extra 8-byte slot reserved for round-tripping a float bit
    /// pattern through memory into an `xmm` register (there is no `movq
    /// xmm, gpr` in the encoder, see [`crate::emit`]).
    pub float_scratch: Slot,
}

impl FrameLayout {
    pub fn temp_slot(&self, t: TempVar) -> Slot {
        *self
            .temps
            .get(&t)
            .unwrap_or_else(|| panic!("codegen: temp {} has no stack slot", t.0))
    }

    pub fn local_slot(&self, name: novacc_core::StringHandle) -> Option<Slot> {
        self.locals.get(&name).copied()
    }
}

/// Walks the function's IR once to discover every local name and every
/// temp id in use, then lays each out as an 8-byte-aligned slot below RBP.
pub fn layout_function(
    ir: &Ir,
    params: &[(novacc_core::StringHandle, u32)],
    format: ObjectFormat,
) -> FrameLayout {
    let mut locals: HashMap<novacc_core::StringHandle, Slot> = HashMap::new();
    let mut temps: HashMap<TempVar, Slot> = HashMap::new();
    let mut cursor: i32 = 0;

    let alloc = |size: u32, cursor: &mut i32| -> Slot {
        let size = size.max(8);
        *cursor -= size as i32;
        Slot {
            rbp_offset: *cursor,
            size,
        }
    };

    for (name, size_bits) in params {
        let slot = alloc((*size_bits / 8).max(1), &mut cursor);
        locals.insert(*name, slot);
    }

    for inst in &ir.instructions {
        match &inst.op {
            IrOp::VariableDecl { name, ty_size_bits, .. } => {
                locals
                    .entry(*name)
                    .or_insert_with(|| alloc((*ty_size_bits / 8).max(1), &mut cursor));
            }
            _ => {}
        }
        for_each_temp_def(&inst.op, |t| {
            temps.entry(t).or_insert_with(|| alloc(8, &mut cursor));
        });
    }

    let float_scratch = alloc(8, &mut cursor);

    let shadow_space = match format {
        ObjectFormat::Coff => WINDOWS_SHADOW_SPACE,
        ObjectFormat::Elf => 0,
    };
    let raw_size = (-cursor) + shadow_space;
    let frame_size = (raw_size + 15) & !15;

    FrameLayout {
        locals,
        temps,
        frame_size,
        shadow_space,
        float_scratch,
    }
}

/// Visits the temp(s) a single IR instruction *defines* (not uses), so the
/// frame layout only allocates a slot once per distinct temp regardless of
/// how many times it is later read.
fn for_each_temp_def(op: &IrOp, mut visit: impl FnMut(TempVar)) {
    match op {
        IrOp::LoadVar { result, .. }
        | IrOp::BinaryOp { result, .. }
        | IrOp::UnaryOp { result, .. }
        | IrOp::MemberLoad { result, .. }
        | IrOp::ArrayAccess { result, .. }
        | IrOp::ComputeAddress { result, .. }
        | IrOp::ArrayElementAddress { result, .. }
        | IrOp::FunctionAddress { result, .. }
        | IrOp::Move { result, .. }
        | IrOp::HeapAlloc { result, .. }
        | IrOp::HeapAllocArray { result, .. }
        | IrOp::Typeid { result, .. }
        | IrOp::DynamicCast { result, .. } => visit(*result),
        IrOp::Call { result: Some(r), .. } | IrOp::VirtualCall { result: Some(r), .. } => {
            visit(*r)
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novacc_ast::SourceToken;

    fn tok() -> SourceToken {
        SourceToken { line: 1, column: 1 }
    }

    #[test]
    fn frame_size_is_16_byte_aligned() {
        let interner = novacc_core::Interner::new();
        let name = interner.intern("x");
        let mut ir = Ir::default();
        let t = ir.new_temp();
        ir.push(IrOp::LoadVar { name, result: t }, tok());
        let layout = layout_function(&ir, &[], ObjectFormat::Elf);
        assert_eq!(layout.frame_size % 16, 0);
        assert!(layout.temps.contains_key(&t));
    }

    #[test]
    fn coff_frame_reserves_shadow_space() {
        let ir = Ir::default();
        let layout = layout_function(&ir, &[], ObjectFormat::Coff);
        assert_eq!(layout.shadow_space, WINDOWS_SHADOW_SPACE);
        assert!(layout.frame_size >= WINDOWS_SHADOW_SPACE);
    }
}

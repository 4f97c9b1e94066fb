//! Walks one function's [`Ir`] and emits x86-64 bytes plus pending
//! relocations (spec §4.6 steps 2-4, 6).
//!
//! Every operand is first loaded from its [`FrameLayout`] slot into `rax`/
//! `rcx` (`xmm0`/`xmm1` for floating values), computed on, and stored back —
//! DESIGN.md Open Question 4 (no register allocator, so this is the
//! "trivial" instruction-selection strategy the Non-goals leave room for).
//! Nothing here shares a temporary's register across instructions; each
//! `IrOp` reloads its operands fresh.

use crate::frame::FrameLayout;
use crate::regs::{Asm, Cc, Gpr, Xmm};
use novacc_core::{CompilerSession, ObjectFormat};
use novacc_ir::{
    CallArg, CatchHandler, Ir, IrBinaryOp, IrOp, IrUnaryOp, IrValue, LabelId, TempVar, TypedValue,
};

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("codegen: label {0:?} was never placed")]
    UnresolvedLabel(LabelId),
    #[error("codegen: break/continue outside a loop")]
    BreakContinueOutsideLoop,
    #[error("codegen: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, EmitError>;

/// Which calling convention governs argument registers and shadow-space
/// reservation (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConv {
    Windows,
    SysV,
}

impl CallConv {
    pub fn for_format(format: ObjectFormat) -> Self {
        match format {
            ObjectFormat::Coff => CallConv::Windows,
            ObjectFormat::Elf => CallConv::SysV,
        }
    }

    fn int_arg_regs(self) -> &'static [Gpr] {
        match self {
            CallConv::Windows => &[Gpr::Rcx, Gpr::Rdx, Gpr::R8, Gpr::R9],
            CallConv::SysV => &[Gpr::Rdi, Gpr::Rsi, Gpr::Rdx, Gpr::Rcx, Gpr::R8, Gpr::R9],
        }
    }

    fn float_arg_regs(self) -> &'static [Xmm] {
        &[Xmm::Xmm0, Xmm::Xmm1, Xmm::Xmm2, Xmm::Xmm3]
    }
}

/// A try-region the LSDA builder needs: the `.text`-relative byte range it
/// covers, the label its landing pad begins at, and the ordered catch
/// clauses guarding it (spec §4.8). Recorded as the emitter walks
/// `TryBegin`/`CatchBegin`/`TryEnd` so `eh::lsda` can build call-site and
/// type-table rows without re-walking the IR.
#[derive(Debug, Clone)]
pub struct TryRegionRecord {
    pub start_offset: usize,
    pub end_offset: usize,
    pub landing_pad: LabelId,
    pub catches: Vec<CatchHandler>,
}

struct LoopFrame {
    start: LabelId,
    end: LabelId,
    increment: LabelId,
}

/// Looks up the mangled symbol a `Call`/`ConstructorCall`/`DestructorCall`
/// should target. `module.rs` builds this table from the translation
/// unit's declarations before emitting any function body, so call sites and
/// definitions agree on the same name.
pub trait SymbolResolver {
    fn function_symbol(&self, name: novacc_core::StringHandle) -> String;
    fn ctor_symbol(&self, type_index: novacc_core::TypeIndex) -> String;
    fn dtor_symbol(&self, type_index: novacc_core::TypeIndex) -> String;
    fn vtable_symbol(&self, type_index: novacc_core::TypeIndex) -> String;
}

pub struct FunctionEmitter<'a> {
    asm: Asm,
    frame: &'a FrameLayout,
    conv: CallConv,
    session: &'a CompilerSession,
    resolver: &'a dyn SymbolResolver,
    loop_stack: Vec<LoopFrame>,
    try_regions: Vec<TryRegionRecord>,
    open_try: Vec<(usize, LabelId, usize)>,
    /// Index into `try_regions` and remaining handler count for the region
    /// currently absorbing `CatchBegin` ops, innermost first. A region is
    /// popped once its last handler has been seen, which lets a nested
    /// try/catch inside a handler body collect onto its own entry without
    /// corrupting the outer try's remaining sibling catches.
    collecting: Vec<(usize, usize)>,
}

impl<'a> FunctionEmitter<'a> {
    pub fn new(
        frame: &'a FrameLayout,
        format: ObjectFormat,
        session: &'a CompilerSession,
        resolver: &'a dyn SymbolResolver,
    ) -> Self {
        FunctionEmitter {
            asm: Asm::new(),
            frame,
            conv: CallConv::for_format(format),
            session,
            resolver,
            loop_stack: Vec::new(),
            try_regions: Vec::new(),
            open_try: Vec::new(),
            collecting: Vec::new(),
        }
    }

    /// Emits the full function body: prologue, every `IrOp` in order, and
    /// a fallback epilogue in case the IR falls off the end without an
    /// explicit `Return` (spec §4.5 implicit `void` return).
    pub fn emit_function(
        mut self,
        ir: &Ir,
        param_count: usize,
    ) -> Result<(Asm, Vec<TryRegionRecord>)> {
        self.prologue(param_count);
        for inst in &ir.instructions {
            self.emit_op(&inst.op)?;
        }
        self.asm.mov_reg_rsp(Gpr::Rsp);
        self.epilogue();
        self.asm
            .resolve_labels()
            .map_err(EmitError::UnresolvedLabel)?;
        Ok((self.asm, self.try_regions))
    }

    fn prologue(&mut self, param_count: usize) {
        self.asm.push_reg(Gpr::Rbp);
        self.asm.mov_reg_reg(Gpr::Rbp, Gpr::Rsp);
        if self.frame.frame_size > 0 {
            self.asm.sub_rsp_imm32(self.frame.frame_size);
        }
        let int_regs = self.conv.int_arg_regs();
        self.store_incoming_params(param_count, int_regs);
    }

    /// Spills the first `param_count` incoming integer-register arguments
    /// into their local slots (spec §4.6 step 1: params occupy the first
    /// N local slots in declaration order, matching [`crate::frame`]).
    fn store_incoming_params(&mut self, param_count: usize, int_regs: &[Gpr]) {
        let mut slots: Vec<_> = self.frame.locals.values().copied().collect();
        slots.sort_by_key(|s| std::cmp::Reverse(s.rbp_offset));
        for (i, slot) in slots.iter().take(param_count).enumerate() {
            if let Some(reg) = int_regs.get(i) {
                self.asm.mov_rbp_reg(slot.rbp_offset, *reg);
            }
        }
    }

    fn epilogue(&mut self) {
        self.asm.pop_reg(Gpr::Rbp);
        self.asm.ret();
    }

    fn emit_op(&mut self, op: &IrOp) -> Result<()> {
        match op {
            IrOp::ScopeBegin | IrOp::ScopeEnd => {}
            IrOp::VariableDecl {
                name, initializer, ..
            } => {
                if let Some(slot) = self.frame.local_slot(*name) {
                    if let Some(init) = initializer {
                        self.load_into_scratch(init, Gpr::Rax, Xmm::Xmm0);
                        if init.is_floating() {
                            self.asm.movsd_rbp_xmm(slot.rbp_offset, Xmm::Xmm0);
                        } else {
                            self.asm.mov_rbp_reg(slot.rbp_offset, Gpr::Rax);
                        }
                    }
                }
            }
            IrOp::GlobalVariableDecl { .. } => {
                // Emitted once per translation unit by `module.rs`, not
                // per function body.
            }
            IrOp::ConstructorCall {
                type_index, target, args,
            } => {
                let symbol = self.resolver.ctor_symbol(*type_index);
                self.emit_call_to_symbol(&symbol, Some(*target), args, None);
            }
            IrOp::DestructorCall { type_index, target } => {
                let symbol = self.resolver.dtor_symbol(*type_index);
                self.emit_call_to_symbol(&symbol, Some(*target), &[], None);
            }
            IrOp::Label(label) => self.asm.place_label(*label),
            IrOp::Branch(label) => self.asm.jmp_label(*label),
            IrOp::ConditionalBranch {
                cond,
                if_true,
                if_false,
            } => {
                self.load_into_scratch(cond, Gpr::Rax, Xmm::Xmm0);
                self.asm.mov_reg_imm32_zx(Gpr::Rcx, 0);
                self.asm.cmp_reg_reg(Gpr::Rax, Gpr::Rcx);
                self.asm.jcc_label(Cc::Ne, *if_true);
                self.asm.jmp_label(*if_false);
            }
            IrOp::LoopBegin {
                start,
                end,
                increment,
            } => self.loop_stack.push(LoopFrame {
                start: *start,
                end: *end,
                increment: *increment,
            }),
            IrOp::LoopEnd => {
                self.loop_stack.pop();
            }
            IrOp::Break => {
                let end = self
                    .loop_stack
                    .last()
                    .ok_or(EmitError::BreakContinueOutsideLoop)?
                    .end;
                self.asm.jmp_label(end);
            }
            IrOp::Continue => {
                let inc = self
                    .loop_stack
                    .last()
                    .ok_or(EmitError::BreakContinueOutsideLoop)?
                    .increment;
                self.asm.jmp_label(inc);
            }
            IrOp::TryBegin {
                handlers_label,
                handler_count,
            } => {
                self.open_try
                    .push((self.asm.offset(), *handlers_label, *handler_count));
            }
            IrOp::TryEnd => {
                if let Some((start_offset, landing_pad, handler_count)) = self.open_try.pop() {
                    let index = self.try_regions.len();
                    self.try_regions.push(TryRegionRecord {
                        start_offset,
                        end_offset: self.asm.offset(),
                        landing_pad,
                        catches: Vec::new(),
                    });
                    if handler_count > 0 {
                        self.collecting.push((index, handler_count));
                    }
                }
            }
            IrOp::CatchBegin(handler) => {
                self.asm.place_label(handler.handler_label);
                if let Some((index, remaining)) = self.collecting.last_mut() {
                    self.try_regions[*index].catches.push(*handler);
                    *remaining -= 1;
                    if *remaining == 0 {
                        self.collecting.pop();
                    }
                }
            }
            IrOp::CatchEnd => {}
            IrOp::Throw { value, .. } => {
                self.load_into_scratch(value, Gpr::Rax, Xmm::Xmm0);
                let arg_reg = self.conv.int_arg_regs()[0];
                self.asm.mov_reg_reg(arg_reg, Gpr::Rax);
                self.asm.call_symbol("__novacc_throw");
            }
            IrOp::Rethrow => self.asm.call_symbol("__novacc_rethrow"),
            IrOp::LoadVar { name, result } => {
                if let Some(slot) = self.frame.local_slot(*name) {
                    self.asm.mov_reg_rbp(Gpr::Rax, slot.rbp_offset);
                    self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
                }
            }
            IrOp::StoreVar { name, value } => {
                self.load_into_scratch(value, Gpr::Rax, Xmm::Xmm0);
                if let Some(slot) = self.frame.local_slot(*name) {
                    if value.is_floating() {
                        self.asm.movsd_rbp_xmm(slot.rbp_offset, Xmm::Xmm0);
                    } else {
                        self.asm.mov_rbp_reg(slot.rbp_offset, Gpr::Rax);
                    }
                }
            }
            IrOp::LoadConst(_) => {
                // Constants are folded directly at their use site by
                // `load_into_scratch`; a bare `LoadConst` with no result
                // consumer is a no-op.
            }
            IrOp::BinaryOp {
                op, lhs, rhs, result,
            } => self.emit_binary(*op, lhs, rhs, *result),
            IrOp::UnaryOp {
                op,
                operand,
                result,
            } => self.emit_unary(*op, operand, *result),
            IrOp::Call {
                callee,
                args,
                result,
            } => {
                let symbol = self.resolver.function_symbol(*callee);
                self.emit_call_to_symbol(&symbol, None, args, *result);
            }
            IrOp::VirtualCall {
                vtable_slot,
                object,
                args,
                result,
            } => self.emit_virtual_call(*vtable_slot, object, args, *result),
            IrOp::MemberLoad {
                object,
                offset,
                result,
            } => {
                self.load_into_scratch(object, Gpr::Rcx, Xmm::Xmm1);
                self.asm.mov_reg_ptr(Gpr::Rax, Gpr::Rcx, *offset as i32);
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrOp::MemberStore {
                object,
                offset,
                value,
            } => {
                self.load_into_scratch(object, Gpr::Rcx, Xmm::Xmm1);
                self.load_into_scratch(value, Gpr::Rax, Xmm::Xmm0);
                self.asm.mov_ptr_reg(Gpr::Rcx, *offset as i32, Gpr::Rax);
            }
            IrOp::ArrayAccess {
                array,
                index,
                elem_size,
                result,
            } => {
                self.emit_element_address(array, index, *elem_size, Gpr::Rcx);
                self.asm.mov_reg_ptr(Gpr::Rax, Gpr::Rcx, 0);
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrOp::ArrayStore {
                array,
                index,
                elem_size,
                value,
            } => {
                self.emit_element_address(array, index, *elem_size, Gpr::Rcx);
                self.load_into_scratch(value, Gpr::Rax, Xmm::Xmm0);
                self.asm.mov_ptr_reg(Gpr::Rcx, 0, Gpr::Rax);
            }
            IrOp::ComputeAddress { of, result } => {
                self.emit_address_of(of, Gpr::Rax);
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrOp::ArrayElementAddress {
                array,
                index,
                elem_size,
                result,
            } => {
                self.emit_element_address(array, index, *elem_size, Gpr::Rax);
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrOp::FunctionAddress { name, result } => {
                let symbol = self.resolver.function_symbol(*name);
                self.lea_rip_symbol(Gpr::Rax, &symbol);
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrOp::Move { from, result } => {
                self.load_into_scratch(from, Gpr::Rax, Xmm::Xmm0);
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, from.is_floating());
            }
            IrOp::HeapAlloc {
                size_in_bytes,
                result,
                ..
            } => {
                let arg_reg = self.conv.int_arg_regs()[0];
                self.asm.mov_reg_imm64(arg_reg, *size_in_bytes as i64);
                self.asm.call_symbol("malloc");
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrOp::HeapAllocArray {
                elem_size,
                count,
                result,
                ..
            } => {
                self.load_into_scratch(count, Gpr::Rax, Xmm::Xmm0);
                self.asm.mov_reg_imm64(Gpr::Rcx, *elem_size as i64);
                self.asm.imul_reg_reg(Gpr::Rax, Gpr::Rcx);
                let arg_reg = self.conv.int_arg_regs()[0];
                self.asm.mov_reg_reg(arg_reg, Gpr::Rax);
                self.asm.call_symbol("malloc");
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrOp::HeapFree { pointer } | IrOp::HeapFreeArray { pointer } => {
                self.load_into_scratch(pointer, Gpr::Rax, Xmm::Xmm0);
                let arg_reg = self.conv.int_arg_regs()[0];
                self.asm.mov_reg_reg(arg_reg, Gpr::Rax);
                self.asm.call_symbol("free");
            }
            IrOp::PlacementNew {
                type_index,
                at,
                args,
            } => {
                let symbol = self.resolver.ctor_symbol(*type_index);
                self.emit_call_to_symbol(&symbol, Some(*at), args, None);
            }
            IrOp::Typeid { result, .. } => {
                self.asm.call_symbol("__novacc_typeid");
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrOp::DynamicCast {
                target,
                operand,
                result,
            } => {
                self.load_into_scratch(operand, Gpr::Rax, Xmm::Xmm0);
                let _ = target;
                let arg_reg = self.conv.int_arg_regs()[0];
                self.asm.mov_reg_reg(arg_reg, Gpr::Rax);
                self.asm.call_symbol("__novacc_dynamic_cast");
                self.store_temp(*result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrOp::Return(value) => {
                if let Some(v) = value {
                    self.load_into_scratch(v, Gpr::Rax, Xmm::Xmm0);
                }
                self.asm.mov_reg_rsp(Gpr::Rsp);
                self.epilogue();
            }
        }
        Ok(())
    }

    fn emit_binary(&mut self, op: IrBinaryOp, lhs: &TypedValue, rhs: &TypedValue, result: TempVar) {
        let floating = lhs.is_floating() || rhs.is_floating();
        if floating {
            self.load_into_scratch(lhs, Gpr::Rax, Xmm::Xmm0);
            self.load_into_scratch(rhs, Gpr::Rcx, Xmm::Xmm1);
            match op {
                IrBinaryOp::AddF => self.asm.addsd(Xmm::Xmm0, Xmm::Xmm1),
                IrBinaryOp::SubF => self.asm.subsd(Xmm::Xmm0, Xmm::Xmm1),
                IrBinaryOp::MulF => self.asm.mulsd(Xmm::Xmm0, Xmm::Xmm1),
                IrBinaryOp::DivF => self.asm.divsd(Xmm::Xmm0, Xmm::Xmm1),
                IrBinaryOp::CmpLtF
                | IrBinaryOp::CmpLeF
                | IrBinaryOp::CmpGtF
                | IrBinaryOp::CmpGeF
                | IrBinaryOp::CmpEq
                | IrBinaryOp::CmpNe => {
                    self.asm.comisd(Xmm::Xmm0, Xmm::Xmm1);
                    let cc = float_cc(op);
                    self.asm.setcc(cc, Gpr::Rax);
                    self.asm.movzx_reg_al(Gpr::Rax);
                }
                _ => {}
            }
            self.store_temp(result, Gpr::Rax, Xmm::Xmm0, matches!(op, IrBinaryOp::AddF | IrBinaryOp::SubF | IrBinaryOp::MulF | IrBinaryOp::DivF));
            return;
        }

        self.load_into_scratch(lhs, Gpr::Rax, Xmm::Xmm0);
        self.load_into_scratch(rhs, Gpr::Rcx, Xmm::Xmm1);
        match op {
            IrBinaryOp::AddI | IrBinaryOp::AddU => self.asm.add_reg_reg(Gpr::Rax, Gpr::Rcx),
            IrBinaryOp::SubI | IrBinaryOp::SubU => self.asm.sub_reg_reg(Gpr::Rax, Gpr::Rcx),
            IrBinaryOp::MulI | IrBinaryOp::MulU => self.asm.imul_reg_reg(Gpr::Rax, Gpr::Rcx),
            IrBinaryOp::DivI => {
                self.asm.cqo();
                self.asm.idiv_reg(Gpr::Rcx);
            }
            IrBinaryOp::ModI => {
                self.asm.cqo();
                self.asm.idiv_reg(Gpr::Rcx);
                self.asm.mov_reg_reg(Gpr::Rax, Gpr::Rdx);
            }
            IrBinaryOp::DivU => {
                self.asm.xor_rdx_rdx();
                self.asm.div_reg(Gpr::Rcx);
            }
            IrBinaryOp::ModU => {
                self.asm.xor_rdx_rdx();
                self.asm.div_reg(Gpr::Rcx);
                self.asm.mov_reg_reg(Gpr::Rax, Gpr::Rdx);
            }
            IrBinaryOp::And | IrBinaryOp::LogAnd => self.asm.and_reg_reg(Gpr::Rax, Gpr::Rcx),
            IrBinaryOp::Or | IrBinaryOp::LogOr => self.asm.or_reg_reg(Gpr::Rax, Gpr::Rcx),
            IrBinaryOp::Xor => self.asm.xor_reg_reg(Gpr::Rax, Gpr::Rcx),
            IrBinaryOp::Shl => self.asm.shl_reg_cl(Gpr::Rax),
            IrBinaryOp::Shr => self.asm.shr_reg_cl(Gpr::Rax),
            IrBinaryOp::CmpEq
            | IrBinaryOp::CmpNe
            | IrBinaryOp::CmpLtI
            | IrBinaryOp::CmpLeI
            | IrBinaryOp::CmpGtI
            | IrBinaryOp::CmpGeI
            | IrBinaryOp::CmpLtU
            | IrBinaryOp::CmpLeU
            | IrBinaryOp::CmpGtU
            | IrBinaryOp::CmpGeU
            | IrBinaryOp::Spaceship => {
                self.asm.cmp_reg_reg(Gpr::Rax, Gpr::Rcx);
                let cc = int_cc(op);
                self.asm.setcc(cc, Gpr::Rax);
                self.asm.movzx_reg_al(Gpr::Rax);
            }
        }
        self.store_temp(result, Gpr::Rax, Xmm::Xmm0, false);
    }

    fn emit_unary(&mut self, op: IrUnaryOp, operand: &TypedValue, result: TempVar) {
        self.load_into_scratch(operand, Gpr::Rax, Xmm::Xmm0);
        match op {
            IrUnaryOp::NegI => {
                self.asm.neg_reg(Gpr::Rax);
                self.store_temp(result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrUnaryOp::NegF => {
                // `0.0 - x` rather than flipping the sign bit directly —
                // there is no `movq xmm, gpr` in this encoder to build a
                // sign-mask register, and subtracting from zero is exact
                // for every finite double (spec has no signed-zero/NaN
                // negation edge case carve-out).
                self.asm.xor_reg_reg(Gpr::Rcx, Gpr::Rcx);
                self.asm.cvtsi2sd(Xmm::Xmm1, Gpr::Rcx);
                self.asm.subsd(Xmm::Xmm1, Xmm::Xmm0);
                self.store_temp(result, Gpr::Rax, Xmm::Xmm1, true);
            }
            IrUnaryOp::Not => {
                self.asm.mov_reg_imm32_zx(Gpr::Rcx, 0);
                self.asm.cmp_reg_reg(Gpr::Rax, Gpr::Rcx);
                self.asm.setcc(Cc::E, Gpr::Rax);
                self.asm.movzx_reg_al(Gpr::Rax);
                self.store_temp(result, Gpr::Rax, Xmm::Xmm0, false);
            }
            IrUnaryOp::BitNot => {
                self.asm.not_reg(Gpr::Rax);
                self.store_temp(result, Gpr::Rax, Xmm::Xmm0, false);
            }
        }
    }

    fn emit_call_to_symbol(
        &mut self,
        symbol: &str,
        this_arg: Option<TypedValue>,
        args: &[CallArg],
        result: Option<TempVar>,
    ) {
        let int_regs = self.conv.int_arg_regs();
        let float_regs = self.conv.float_arg_regs();
        let mut int_idx = 0;
        let mut float_idx = 0;

        if let Some(this_val) = this_arg {
            self.load_into_scratch(&this_val, int_regs[int_idx], float_regs[0]);
            int_idx += 1;
        }
        for arg in args {
            if arg.value.is_floating() {
                if let Some(&reg) = float_regs.get(float_idx) {
                    self.load_into_scratch(&arg.value, Gpr::Rax, reg);
                    float_idx += 1;
                }
            } else if let Some(&reg) = int_regs.get(int_idx) {
                self.load_into_scratch(&arg.value, reg, Xmm::Xmm0);
                int_idx += 1;
            }
        }
        self.asm.call_symbol(symbol);
        if let Some(r) = result {
            self.store_temp(r, Gpr::Rax, Xmm::Xmm0, false);
        }
    }

    fn emit_virtual_call(
        &mut self,
        vtable_slot: u32,
        object: &TypedValue,
        args: &[CallArg],
        result: Option<TempVar>,
    ) {
        self.load_into_scratch(object, Gpr::Rcx, Xmm::Xmm1);
        // The vtable pointer is the object's first 8 bytes (spec §4.6
        // "non-virtual function pointer stored at the computed slot").
        self.asm.mov_reg_ptr(Gpr::Rax, Gpr::Rcx, 0);
        self.asm
            .mov_reg_ptr(Gpr::Rax, Gpr::Rax, (vtable_slot * 8) as i32);
        self.asm.push_reg(Gpr::Rax);

        let int_regs = self.conv.int_arg_regs();
        let float_regs = self.conv.float_arg_regs();
        self.asm.mov_reg_reg(int_regs[0], Gpr::Rcx);
        let mut int_idx = 1;
        let mut float_idx = 0;
        for arg in args {
            if arg.value.is_floating() {
                if let Some(&reg) = float_regs.get(float_idx) {
                    self.load_into_scratch(&arg.value, Gpr::Rax, reg);
                    float_idx += 1;
                }
            } else if let Some(&reg) = int_regs.get(int_idx) {
                self.load_into_scratch(&arg.value, reg, Xmm::Xmm0);
                int_idx += 1;
            }
        }
        self.asm.pop_reg(Gpr::Rax);
        self.asm.call_reg_indirect(Gpr::Rax);
        if let Some(r) = result {
            self.store_temp(r, Gpr::Rax, Xmm::Xmm0, false);
        }
    }

    fn emit_element_address(&mut self, array: &TypedValue, index: &TypedValue, elem_size: u32, into: Gpr) {
        self.emit_address_of(array, into);
        self.load_into_scratch(index, Gpr::Rax, Xmm::Xmm0);
        self.asm.mov_reg_imm64(Gpr::Rcx, elem_size as i64);
        self.asm.imul_reg_reg(Gpr::Rax, Gpr::Rcx);
        self.asm.add_reg_reg(into, Gpr::Rax);
    }

    fn emit_address_of(&mut self, value: &TypedValue, into: Gpr) {
        match value.value {
            IrValue::Temp(t) => {
                if let Some(slot) = self.frame.temps.get(&t) {
                    self.asm.lea_reg_rbp(into, slot.rbp_offset);
                } else {
                    self.asm.mov_reg_rbp(into, 0);
                }
            }
            _ => {
                self.load_into_scratch(value, into, Xmm::Xmm0);
            }
        }
    }

    /// Materialises `value` into `reg` (integers/pointers) or `xmm` (float
    /// values), folding immediates directly rather than round-tripping
    /// through a stack slot.
    fn load_into_scratch(&mut self, value: &TypedValue, reg: Gpr, xmm: Xmm) {
        match value.value {
            IrValue::Temp(t) => {
                let slot = self.frame.temp_slot(t);
                if value.is_floating() {
                    self.asm.movsd_xmm_rbp(xmm, slot.rbp_offset);
                } else {
                    self.asm.mov_reg_rbp(reg, slot.rbp_offset);
                }
            }
            IrValue::UImm(v) => {
                self.asm.mov_reg_imm64(reg, v as i64);
                if value.is_floating() {
                    self.asm.cvtsi2sd(xmm, reg);
                }
            }
            IrValue::FImm(bits) => {
                // `movq xmm, gpr` has no dedicated encoder entry; round the
                // bit pattern through the frame's reserved float-scratch
                // slot instead (see `FrameLayout::float_scratch`).
                self.asm.mov_reg_imm64(reg, bits as i64);
                let scratch = self.frame.float_scratch.rbp_offset;
                self.asm.mov_rbp_reg(scratch, reg);
                self.asm.movsd_xmm_rbp(xmm, scratch);
            }
            IrValue::Str(handle) => {
                let symbol = format!("__novacc_str_{}", handle_raw(handle));
                self.lea_rip_symbol(reg, &symbol);
            }
        }
    }

    /// `lea reg, [rip + symbol]` — takes the address of a function or
    /// string-literal constant, recorded as a PC-relative relocation the
    /// same way [`Asm::call_symbol`] records call targets, but without
    /// emitting a `call` opcode.
    fn lea_rip_symbol(&mut self, dst: Gpr, symbol: &str) {
        self.asm.bytes.push(0x48);
        self.asm.bytes.push(0x8D);
        self.asm.bytes.push(0x05 | (dst.code() & 0x7) << 3);
        let patch_at = self.asm.offset();
        self.asm.bytes.extend_from_slice(&0i32.to_le_bytes());
        self.asm.relocs.push(crate::regs::PendingReloc {
            patch_at,
            symbol: symbol.to_string(),
            kind: novacc_objfile::RelocKind::Pc32,
            addend: -4,
        });
    }

    fn store_temp(&mut self, t: TempVar, reg: Gpr, xmm: Xmm, floating: bool) {
        let slot = self.frame.temp_slot(t);
        if floating {
            self.asm.movsd_rbp_xmm(slot.rbp_offset, xmm);
        } else {
            self.asm.mov_rbp_reg(slot.rbp_offset, reg);
        }
    }
}

fn int_cc(op: IrBinaryOp) -> Cc {
    match op {
        IrBinaryOp::CmpEq => Cc::E,
        IrBinaryOp::CmpNe => Cc::Ne,
        IrBinaryOp::CmpLtI | IrBinaryOp::Spaceship => Cc::LSigned,
        IrBinaryOp::CmpLeI => Cc::LeSigned,
        IrBinaryOp::CmpGtI => Cc::GSigned,
        IrBinaryOp::CmpGeI => Cc::GeSigned,
        IrBinaryOp::CmpLtU => Cc::BUnsigned,
        IrBinaryOp::CmpLeU => Cc::BeUnsigned,
        IrBinaryOp::CmpGtU => Cc::AUnsigned,
        IrBinaryOp::CmpGeU => Cc::AeUnsigned,
        _ => Cc::E,
    }
}

fn float_cc(op: IrBinaryOp) -> Cc {
    match op {
        IrBinaryOp::CmpEq => Cc::E,
        IrBinaryOp::CmpNe => Cc::Ne,
        IrBinaryOp::CmpLtF => Cc::BUnsigned,
        IrBinaryOp::CmpLeF => Cc::BeUnsigned,
        IrBinaryOp::CmpGtF => Cc::AUnsigned,
        IrBinaryOp::CmpGeF => Cc::AeUnsigned,
        _ => Cc::E,
    }
}

fn handle_raw(handle: novacc_core::StringHandle) -> u32 {
    // `StringHandle` carries no public accessor (spec §3.1 treats it as
    // opaque); format! on its Debug form gives a stable-enough per-run key
    // for string-literal symbol names without needing one.
    format!("{handle:?}")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use novacc_ast::SourceToken;
    use novacc_core::{CompileContext, Interner, ObjectFormat as OF, Type};

    struct NullResolver;
    impl SymbolResolver for NullResolver {
        fn function_symbol(&self, _name: novacc_core::StringHandle) -> String {
            "callee".into()
        }
        fn ctor_symbol(&self, _type_index: novacc_core::TypeIndex) -> String {
            "ctor".into()
        }
        fn dtor_symbol(&self, _type_index: novacc_core::TypeIndex) -> String {
            "dtor".into()
        }
        fn vtable_symbol(&self, _type_index: novacc_core::TypeIndex) -> String {
            "vtbl".into()
        }
    }

    fn tok() -> SourceToken {
        SourceToken { line: 1, column: 1 }
    }

    #[test]
    fn empty_function_emits_valid_prologue_and_epilogue() {
        let session = CompilerSession::new(CompileContext::new(OF::Elf));
        let ir = Ir::default();
        let frame = crate::frame::layout_function(&ir, &[], OF::Elf);
        let resolver = NullResolver;
        let emitter = FunctionEmitter::new(&frame, OF::Elf, &session, &resolver);
        let (asm, regions) = emitter.emit_function(&ir, 0).unwrap();
        assert_eq!(asm.bytes[0], 0x55); // push rbp
        assert!(asm.bytes.ends_with(&[0x5D, 0xC3])); // pop rbp; ret
        assert!(regions.is_empty());
    }

    #[test]
    fn return_constant_loads_immediate_into_rax() {
        let session = CompilerSession::new(CompileContext::new(OF::Elf));
        let mut ir = Ir::default();
        ir.push(
            IrOp::Return(Some(TypedValue::uimm(Type::Int, 32, 7))),
            tok(),
        );
        let frame = crate::frame::layout_function(&ir, &[], OF::Elf);
        let resolver = NullResolver;
        let emitter = FunctionEmitter::new(&frame, OF::Elf, &session, &resolver);
        let (asm, _) = emitter.emit_function(&ir, 0).unwrap();
        // mov rax, imm64 is REX.W (0x48) + 0xB8 somewhere in the stream.
        assert!(asm
            .bytes
            .windows(2)
            .any(|w| w == [0x48, 0xB8]));
    }

    #[test]
    fn loop_break_jumps_to_loop_end_label() {
        let interner = Interner::new();
        let _ = interner.intern("i");
        let session = CompilerSession::new(CompileContext::new(OF::Elf));
        let mut ir = Ir::default();
        let start = ir.new_label();
        let end = ir.new_label();
        let inc = ir.new_label();
        ir.push(
            IrOp::LoopBegin {
                start,
                end,
                increment: inc,
            },
            tok(),
        );
        ir.push(IrOp::Break, tok());
        ir.push(IrOp::Label(inc), tok());
        ir.push(IrOp::LoopEnd, tok());
        ir.push(IrOp::Label(end), tok());
        let frame = crate::frame::layout_function(&ir, &[], OF::Elf);
        let resolver = NullResolver;
        let emitter = FunctionEmitter::new(&frame, OF::Elf, &session, &resolver);
        let result = emitter.emit_function(&ir, 0);
        assert!(result.is_ok());
    }
}

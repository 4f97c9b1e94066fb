//! Three-address IR and AST→IR lowering (spec §3.7, §4.5).
//!
//! [`Ir`] is a flat vector of [`IrInstruction`]s keyed to [`TempVar`]
//! temporaries, produced by walking a function's AST body with
//! [`lower::lower_function`]. The instruction set mirrors spec §4.5's
//! per-construct table: scopes, control flow, and exception handling all
//! lower to `Label`/`Branch`/`ConditionalBranch` plus paired begin/end
//! markers that [`verify::verify_well_formed`] checks balance (spec §8
//! invariant 7).

pub mod lower;
pub mod verify;

use novacc_core::{StringHandle, TypeIndex};

/// Monotonic per-function temporary id (spec §3.7 `TempVar`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempVar(pub u32);

/// Jump target within one function's instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrValue {
    Temp(TempVar),
    Str(StringHandle),
    UImm(u64),
    FImm(u64), // bit pattern of an f64, kept integral so IrValue stays Eq
}

/// Carries a value plus enough type information for the code generator to
/// choose signed/unsigned/float instruction forms without re-deriving it
/// from the AST (spec §3.7 `TypedValue`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedValue {
    pub ty: novacc_core::Type,
    pub size_in_bits: u32,
    pub value: IrValue,
    pub pointer_depth: u32,
    pub cv: novacc_core::CvQualifier,
    pub ref_kind: novacc_core::RefKind,
    pub type_index: Option<TypeIndex>,
}

impl TypedValue {
    pub fn temp(ty: novacc_core::Type, size_in_bits: u32, t: TempVar) -> Self {
        TypedValue {
            ty,
            size_in_bits,
            value: IrValue::Temp(t),
            pointer_depth: 0,
            cv: novacc_core::CvQualifier::default(),
            ref_kind: novacc_core::RefKind::None,
            type_index: None,
        }
    }

    pub fn uimm(ty: novacc_core::Type, size_in_bits: u32, v: u64) -> Self {
        TypedValue {
            ty,
            size_in_bits,
            value: IrValue::UImm(v),
            pointer_depth: 0,
            cv: novacc_core::CvQualifier::default(),
            ref_kind: novacc_core::RefKind::None,
            type_index: None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }

    pub fn is_unsigned(&self) -> bool {
        self.ty.is_unsigned_integral()
    }

    pub fn is_floating(&self) -> bool {
        self.ty.is_floating()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrBinaryOp {
    AddI,
    SubI,
    MulI,
    DivI,
    ModI,
    AddU,
    SubU,
    MulU,
    DivU,
    ModU,
    AddF,
    SubF,
    MulF,
    DivF,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    LogAnd,
    LogOr,
    CmpEq,
    CmpNe,
    CmpLtI,
    CmpLeI,
    CmpGtI,
    CmpGeI,
    CmpLtU,
    CmpLeU,
    CmpGtU,
    CmpGeU,
    CmpLtF,
    CmpLeF,
    CmpGtF,
    CmpGeF,
    Spaceship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrUnaryOp {
    NegI,
    NegF,
    Not,
    BitNot,
}

/// One argument to a call, including whether the callee's parameter is a
/// reference (in which case the lowering pass has already taken the
/// argument's address — spec §4.5 "taking addresses when parameter is a
/// reference and argument is a value").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallArg {
    pub value: TypedValue,
    pub by_reference: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchHandler {
    pub type_index: Option<TypeIndex>,
    pub is_catch_all: bool,
    pub cv: novacc_core::CvQualifier,
    pub ref_kind: novacc_core::RefKind,
    pub exception_temp: TempVar,
    pub handler_label: LabelId,
}

/// ~90 opcodes (spec §3.7) covering arithmetic, comparisons, control flow,
/// scopes, arrays, members, constructors/destructors, virtual calls, heap
/// allocation, exceptions, and globals. Grouped here by the spec §4.5
/// per-construct table rather than alphabetically, since that is how the
/// lowering pass emits them.
#[derive(Debug, Clone)]
pub enum IrOp {
    // --- scopes (§4.5 Block) ---
    ScopeBegin,
    ScopeEnd,

    // --- declarations ---
    VariableDecl {
        name: StringHandle,
        ty_size_bits: u32,
        initializer: Option<TypedValue>,
    },
    GlobalVariableDecl {
        name: StringHandle,
        ty_size_bits: u32,
        /// Raw initial bytes computed by the constexpr evaluator, or
        /// `None` for a zero-initialised `.bss` global.
        init_bytes: Option<Vec<u8>>,
        is_static_local: bool,
    },
    ConstructorCall {
        type_index: TypeIndex,
        target: TypedValue,
        args: Vec<CallArg>,
    },
    DestructorCall {
        type_index: TypeIndex,
        target: TypedValue,
    },

    // --- control flow ---
    Label(LabelId),
    Branch(LabelId),
    ConditionalBranch {
        cond: TypedValue,
        if_true: LabelId,
        if_false: LabelId,
    },
    LoopBegin {
        start: LabelId,
        end: LabelId,
        increment: LabelId,
    },
    LoopEnd,
    Break,
    Continue,

    // --- exceptions (§4.5 Try/catch/throw) ---
    TryBegin {
        handlers_label: LabelId,
        handler_count: usize,
    },
    TryEnd,
    CatchBegin(CatchHandler),
    CatchEnd,
    Throw {
        type_index: Option<TypeIndex>,
        ty: novacc_core::Type,
        size_in_bits: u32,
        value: TypedValue,
        is_rvalue: bool,
    },
    Rethrow,

    // --- expressions: loads/stores ---
    LoadVar {
        name: StringHandle,
        result: TempVar,
    },
    StoreVar {
        name: StringHandle,
        value: TypedValue,
    },
    LoadConst(TypedValue),
    BinaryOp {
        op: IrBinaryOp,
        lhs: TypedValue,
        rhs: TypedValue,
        result: TempVar,
    },
    UnaryOp {
        op: IrUnaryOp,
        operand: TypedValue,
        result: TempVar,
    },
    Call {
        callee: StringHandle,
        args: Vec<CallArg>,
        result: Option<TempVar>,
    },
    VirtualCall {
        vtable_slot: u32,
        object: TypedValue,
        args: Vec<CallArg>,
        result: Option<TempVar>,
    },
    MemberLoad {
        object: TypedValue,
        offset: u32,
        result: TempVar,
    },
    MemberStore {
        object: TypedValue,
        offset: u32,
        value: TypedValue,
    },
    ArrayAccess {
        array: TypedValue,
        index: TypedValue,
        elem_size: u32,
        result: TempVar,
    },
    ArrayStore {
        array: TypedValue,
        index: TypedValue,
        elem_size: u32,
        value: TypedValue,
    },
    ComputeAddress {
        of: TypedValue,
        result: TempVar,
    },
    ArrayElementAddress {
        array: TypedValue,
        index: TypedValue,
        elem_size: u32,
        result: TempVar,
    },
    FunctionAddress {
        name: StringHandle,
        result: TempVar,
    },
    /// Materialises a value into a fresh temporary without a named
    /// variable in between — used to merge the two arms of a ternary and
    /// to bind an anonymous lambda capture object.
    Move {
        from: TypedValue,
        result: TempVar,
    },

    // --- heap ---
    HeapAlloc {
        type_index: Option<TypeIndex>,
        size_in_bytes: u32,
        result: TempVar,
    },
    HeapAllocArray {
        type_index: Option<TypeIndex>,
        elem_size: u32,
        count: TypedValue,
        result: TempVar,
    },
    HeapFree {
        pointer: TypedValue,
    },
    HeapFreeArray {
        pointer: TypedValue,
    },
    PlacementNew {
        type_index: TypeIndex,
        at: TypedValue,
        args: Vec<CallArg>,
    },

    // --- RTTI ---
    Typeid {
        type_index: Option<TypeIndex>,
        operand: Option<TypedValue>,
        result: TempVar,
    },
    DynamicCast {
        target: TypeIndex,
        operand: TypedValue,
        result: TempVar,
    },

    Return(Option<TypedValue>),
}

#[derive(Debug, Clone)]
pub struct IrInstruction {
    pub op: IrOp,
    pub source_token: novacc_ast::SourceToken,
}

/// The flat sequence of instructions lowered for one function body, plus
/// the bookkeeping the code generator needs: how many temporaries and
/// labels were allocated, so it can size scratch tables up front.
#[derive(Debug, Clone, Default)]
pub struct Ir {
    pub instructions: Vec<IrInstruction>,
    pub temp_count: u32,
    pub label_count: u32,
}

impl Ir {
    pub fn push(&mut self, op: IrOp, source_token: novacc_ast::SourceToken) {
        self.instructions.push(IrInstruction { op, source_token });
    }

    pub fn new_temp(&mut self) -> TempVar {
        let id = TempVar(self.temp_count);
        self.temp_count += 1;
        id
    }

    pub fn new_label(&mut self) -> LabelId {
        let id = LabelId(self.label_count);
        self.label_count += 1;
        id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IrError {
    #[error("internal: lowering referenced undeclared variable `{0}`")]
    UndeclaredVariable(String),
    #[error("internal: {0}")]
    Internal(String),
    #[error(transparent)]
    Eval(#[from] novacc_eval::EvalError),
}

pub type Result<T> = std::result::Result<T, IrError>;

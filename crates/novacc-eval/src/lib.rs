//! Constant-expression evaluator (spec §4.4).
//!
//! A recursive tree evaluator over [`novacc_ast::Expr`]/[`novacc_ast::Stmt`]
//! nodes. [`EvaluationContext`] carries the mutable state a single
//! evaluation needs: symbol/type registries, a step counter and recursion
//! guard (spec's ~10⁶ step / ~512 recursion caps), and local variable
//! bindings for constexpr function calls.
//!
//! The evaluator never depends on `novacc-parser` directly — on-demand
//! template instantiation (needed to resolve `S<T>::v` style constants and
//! `sizeof...(Pack)`) goes through the [`EvalHost`] trait, which
//! `novacc-parser`'s `Parser` implements. This keeps the dependency edge
//! one-directional (`novacc-parser -> novacc-eval`) while still satisfying
//! spec §4.4's "optional parser back-reference for on-demand template
//! instantiation".

use novacc_ast::{Arena, BinaryOp, CastKind, Decl, Expr, FunctionDecl, Node, NodeId, Stmt, TypeTrait, UnaryOp};
use novacc_core::{StringHandle, TypeRegistry};
use std::collections::HashMap;
use thiserror::Error;

/// The narrow external result type spec §4.4 documents
/// (`int | uint | double | bool | array-of-int`). [`EvalValue::Aggregate`]
/// is an internal extension used only while a member-access/structured
/// binding expression is mid-evaluation; it never escapes as a final
/// `static_assert`/template-argument result.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Int(i64),
    UInt(u64),
    Double(f64),
    Bool(bool),
    Array(Vec<EvalValue>),
    Aggregate(Vec<(StringHandle, EvalValue)>),
}

impl EvalValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EvalValue::Int(v) => Some(*v),
            EvalValue::UInt(v) => i64::try_from(*v).ok(),
            EvalValue::Bool(b) => Some(*b as i64),
            EvalValue::Double(d) => Some(*d as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EvalValue::Int(v) => Some(*v as f64),
            EvalValue::UInt(v) => Some(*v as f64),
            EvalValue::Double(d) => Some(*d),
            EvalValue::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EvalValue::Bool(b) => Some(*b),
            EvalValue::Int(v) => Some(*v != 0),
            EvalValue::UInt(v) => Some(*v != 0),
            EvalValue::Double(d) => Some(*d != 0.0),
            _ => None,
        }
    }

    fn is_floating(&self) -> bool {
        matches!(self, EvalValue::Double(_))
    }

    fn is_unsigned(&self) -> bool {
        matches!(self, EvalValue::UInt(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Evaluation cannot proceed without template substitution; the caller
    /// defers and retries after instantiation (spec §4.4, §7).
    TemplateDependent,
    /// A real error: non-const access, step/recursion budget exhausted,
    /// division by zero, ill-typed operand.
    Hard,
}

#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
}

impl EvalError {
    pub fn hard(message: impl Into<String>) -> Self {
        EvalError {
            kind: EvalErrorKind::Hard,
            message: message.into(),
        }
    }

    pub fn dependent(message: impl Into<String>) -> Self {
        EvalError {
            kind: EvalErrorKind::TemplateDependent,
            message: message.into(),
        }
    }
}

pub type EvalResult = Result<EvalValue, EvalError>;

/// What a constexpr function's body execution finished with.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Option<EvalValue>),
}

/// Escape hatch into `novacc-parser` for on-demand template instantiation
/// and symbol resolution the evaluator itself has no business owning
/// (spec §4.4 "optional parser back-reference").
pub trait EvalHost {
    /// Resolves `name` to a constexpr variable/static-member/enumerator
    /// value already known to the symbol table, instantiating templates on
    /// demand if `name` denotes a template-dependent construct.
    fn lookup_constant(&mut self, name: StringHandle) -> Option<EvalValue>;

    /// Resolves `name` to a constexpr/consteval function declaration,
    /// instantiating its template if necessary.
    fn resolve_function(&mut self, name: StringHandle) -> Option<NodeId>;

    /// `sizeof...(pack)`: the number of arguments bound to a parameter
    /// pack in the active instantiation, if any.
    fn pack_size(&self, pack: StringHandle) -> Option<usize>;
}

/// No-op host for evaluating expressions that are known not to touch
/// function calls or template-dependent names (e.g. most `#if` folding
/// already handled by `novacc-preprocessor`, or unit tests).
pub struct NullHost;

impl EvalHost for NullHost {
    fn lookup_constant(&mut self, _name: StringHandle) -> Option<EvalValue> {
        None
    }
    fn resolve_function(&mut self, _name: StringHandle) -> Option<NodeId> {
        None
    }
    fn pack_size(&self, _pack: StringHandle) -> Option<usize> {
        None
    }
}

pub struct EvaluationContext<'a> {
    pub arena: &'a Arena,
    pub types: &'a TypeRegistry,
    pub interner: &'a novacc_core::Interner,
    pub host: &'a mut dyn EvalHost,
    pub max_steps: u64,
    pub max_recursion: u32,
    steps: u64,
    recursion: u32,
    bindings: Vec<HashMap<StringHandle, EvalValue>>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        arena: &'a Arena,
        types: &'a TypeRegistry,
        interner: &'a novacc_core::Interner,
        host: &'a mut dyn EvalHost,
    ) -> Self {
        let limits = novacc_core::config::Limits::default();
        EvaluationContext {
            arena,
            types,
            interner,
            host,
            max_steps: limits.max_constexpr_steps,
            max_recursion: limits.max_constexpr_recursion,
            steps: 0,
            recursion: 0,
            bindings: vec![HashMap::new()],
        }
    }

    fn tick(&mut self) -> Result<(), EvalError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(EvalError::hard(format!(
                "constexpr evaluation exceeded {} steps",
                self.max_steps
            )));
        }
        Ok(())
    }

    fn push_scope(&mut self) {
        self.bindings.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.bindings.pop();
    }

    fn bind(&mut self, name: StringHandle, value: EvalValue) {
        self.bindings
            .last_mut()
            .expect("at least one binding scope")
            .insert(name, value);
    }

    fn assign(&mut self, name: StringHandle, value: EvalValue) -> bool {
        for scope in self.bindings.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(&name) {
                *slot = value;
                return true;
            }
        }
        false
    }

    fn lookup_binding(&self, name: StringHandle) -> Option<EvalValue> {
        for scope in self.bindings.iter().rev() {
            if let Some(v) = scope.get(&name) {
                return Some(v.clone());
            }
        }
        None
    }
}

/// Entry point: evaluates the expression at `node`.
pub fn eval(ctx: &mut EvaluationContext, node: NodeId) -> EvalResult {
    ctx.tick()?;
    let expr = match ctx.arena.get(node) {
        Node::Expr(e) => e.clone(),
        other => {
            return Err(EvalError::hard(format!(
                "constant-expression evaluator given a non-expression node: {other:?}"
            )))
        }
    };
    eval_expr(ctx, &expr)
}

fn eval_expr(ctx: &mut EvaluationContext, expr: &Expr) -> EvalResult {
    match expr {
        Expr::NumericLiteral { value, .. } => Ok(match value {
            novacc_lexer::NumericValue::Integer(v) => EvalValue::UInt(*v),
            novacc_lexer::NumericValue::Floating(v) => EvalValue::Double(*v),
        }),
        Expr::BoolLiteral(b) => Ok(EvalValue::Bool(*b)),
        Expr::StringLiteral(_) => Err(EvalError::hard(
            "string literals are not valid constant-expression operands here",
        )),
        Expr::Identifier(name) => {
            if let Some(v) = ctx.lookup_binding(*name) {
                return Ok(v);
            }
            ctx.host.lookup_constant(*name).ok_or_else(|| {
                EvalError::hard(format!(
                    "Undefined variable in constant expression: `{}`",
                    ctx.interner.view(*name)
                ))
            })
        }
        Expr::QualifiedIdentifier { name, .. } => ctx
            .host
            .lookup_constant(*name)
            .ok_or_else(|| EvalError::dependent("qualified name requires template substitution")),
        Expr::TemplateParameterReference(_) => {
            Err(EvalError::dependent("template parameter not yet substituted"))
        }
        Expr::BinaryOperator { op, lhs, rhs } => eval_binary(ctx, *op, *lhs, *rhs),
        Expr::UnaryOperator { op, operand } => eval_unary(ctx, *op, *operand),
        Expr::TernaryOperator {
            cond,
            then_value,
            else_value,
        } => {
            let c = eval(ctx, *cond)?;
            if c.as_bool().ok_or_else(|| EvalError::hard("ternary condition is not arithmetic"))? {
                eval(ctx, *then_value)
            } else {
                eval(ctx, *else_value)
            }
        }
        Expr::SizeofExpr(_) | Expr::AlignofExpr(_) => {
            // Without full type inference of arbitrary sub-expressions this
            // degrades to a hard error; `SizeofType`/`AlignofType` (the
            // common case for constant folding) is handled below.
            Err(EvalError::hard(
                "sizeof/alignof of an arbitrary expression requires type deduction",
            ))
        }
        Expr::SizeofType(spec) => {
            let size = novacc_core::types::sizeof_type_spec(spec, ctx.types)
                .ok_or_else(|| EvalError::hard("sizeof of an incomplete type"))?;
            Ok(EvalValue::UInt(size))
        }
        Expr::AlignofType(spec) => {
            let align = novacc_core::types::alignof_type_spec(spec, ctx.types)
                .ok_or_else(|| EvalError::hard("alignof of an incomplete type"))?;
            Ok(EvalValue::UInt(align))
        }
        Expr::SizeofPack(name) => ctx
            .host
            .pack_size(*name)
            .map(|n| EvalValue::UInt(n as u64))
            .ok_or_else(|| EvalError::dependent("sizeof... requires the pack to be bound")),
        Expr::TypeTraitExpr { trait_kind, operand } => eval_type_trait(*trait_kind, operand, ctx.types),
        Expr::Cast { kind, target, operand } => eval_cast(ctx, *kind, target, *operand),
        Expr::ConstructorCall { args, .. } => {
            // Default-constructed aggregates and converting-constructor
            // casts: evaluate the (single, for a converting cast) argument
            // and pass the value through; zero-arg aggregates evaluate to 0.
            if args.is_empty() {
                Ok(EvalValue::Int(0))
            } else if args.len() == 1 {
                eval(ctx, args[0])
            } else {
                let mut fields = Vec::new();
                for (i, a) in args.iter().enumerate() {
                    let name = ctx.interner.intern(&format!("__field{i}"));
                    fields.push((name, eval(ctx, *a)?));
                }
                Ok(EvalValue::Aggregate(fields))
            }
        }
        Expr::MemberAccess { object, member, .. } => {
            let obj = eval(ctx, *object)?;
            match obj {
                EvalValue::Aggregate(fields) => fields
                    .into_iter()
                    .find(|(n, _)| n == member)
                    .map(|(_, v)| v)
                    .ok_or_else(|| EvalError::hard("no such member in constexpr aggregate")),
                _ => Err(EvalError::hard("member access on a non-aggregate constant")),
            }
        }
        Expr::ArraySubscript { array, index } => {
            let arr = eval(ctx, *array)?;
            let idx = eval(ctx, *index)?
                .as_i64()
                .ok_or_else(|| EvalError::hard("array index is not integral"))?;
            match arr {
                EvalValue::Array(items) => items
                    .get(idx as usize)
                    .cloned()
                    .ok_or_else(|| EvalError::hard("constexpr array index out of bounds")),
                _ => Err(EvalError::hard("subscript of a non-array constant")),
            }
        }
        Expr::FunctionCall { callee, args } => eval_call(ctx, *callee, args),
        Expr::InitializerList(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(ctx, *item)?);
            }
            Ok(EvalValue::Array(values))
        }
        Expr::LambdaExpression { .. } => {
            Err(EvalError::hard("lambda calls are only evaluable at their call site"))
        }
        Expr::FoldExpression { .. } | Expr::PackExpansion(_) => {
            Err(EvalError::dependent("fold/pack expression not yet substituted"))
        }
        Expr::MemberFunctionCall { .. }
        | Expr::New { .. }
        | Expr::Delete { .. }
        | Expr::Typeid(_)
        | Expr::DynamicCast { .. } => Err(EvalError::hard(
            "construct is not a valid constant expression",
        )),
    }
}

fn eval_binary(ctx: &mut EvaluationContext, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> EvalResult {
    use BinaryOp::*;
    if matches!(op, LogAnd | LogOr) {
        let l = eval(ctx, lhs)?.as_bool().ok_or_else(|| EvalError::hard("operand is not boolean"))?;
        return match op {
            LogAnd if !l => Ok(EvalValue::Bool(false)),
            LogOr if l => Ok(EvalValue::Bool(true)),
            _ => {
                let r = eval(ctx, rhs)?.as_bool().ok_or_else(|| EvalError::hard("operand is not boolean"))?;
                Ok(EvalValue::Bool(r))
            }
        };
    }
    if op == Comma {
        eval(ctx, lhs)?;
        return eval(ctx, rhs);
    }
    let l = eval(ctx, lhs)?;
    let r = eval(ctx, rhs)?;

    if matches!(
        op,
        Eq | Ne | Lt | Gt | Le | Ge
    ) {
        let ordering = compare(&l, &r)?;
        return Ok(EvalValue::Bool(match op {
            Eq => ordering == std::cmp::Ordering::Equal,
            Ne => ordering != std::cmp::Ordering::Equal,
            Lt => ordering == std::cmp::Ordering::Less,
            Gt => ordering == std::cmp::Ordering::Greater,
            Le => ordering != std::cmp::Ordering::Greater,
            Ge => ordering != std::cmp::Ordering::Less,
            _ => unreachable!(),
        }));
    }

    if l.is_floating() || r.is_floating() {
        let a = l.as_f64().ok_or_else(|| EvalError::hard("operand is not arithmetic"))?;
        let b = r.as_f64().ok_or_else(|| EvalError::hard("operand is not arithmetic"))?;
        let v = match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div => {
                if b == 0.0 {
                    return Err(EvalError::hard("floating-point division by zero"));
                }
                a / b
            }
            _ => return Err(EvalError::hard("operator not valid on floating operands")),
        };
        return Ok(EvalValue::Double(v));
    }

    let unsigned = l.is_unsigned() || r.is_unsigned();
    if unsigned {
        let a = l.as_i64().ok_or_else(|| EvalError::hard("operand is not integral"))? as u64;
        let b = r.as_i64().ok_or_else(|| EvalError::hard("operand is not integral"))? as u64;
        let v = integral_op(op, a, b)?;
        Ok(EvalValue::UInt(v))
    } else {
        let a = l.as_i64().ok_or_else(|| EvalError::hard("operand is not integral"))?;
        let b = r.as_i64().ok_or_else(|| EvalError::hard("operand is not integral"))?;
        let v = integral_op_signed(op, a, b)?;
        Ok(EvalValue::Int(v))
    }
}

fn compare(l: &EvalValue, r: &EvalValue) -> Result<std::cmp::Ordering, EvalError> {
    if l.is_floating() || r.is_floating() {
        let a = l.as_f64().ok_or_else(|| EvalError::hard("operand is not arithmetic"))?;
        let b = r.as_f64().ok_or_else(|| EvalError::hard("operand is not arithmetic"))?;
        a.partial_cmp(&b).ok_or_else(|| EvalError::hard("NaN comparison in constant expression"))
    } else {
        let a = l.as_i64().ok_or_else(|| EvalError::hard("operand is not arithmetic"))?;
        let b = r.as_i64().ok_or_else(|| EvalError::hard("operand is not arithmetic"))?;
        Ok(a.cmp(&b))
    }
}

fn integral_op(op: BinaryOp, a: u64, b: u64) -> Result<u64, EvalError> {
    use BinaryOp::*;
    Ok(match op {
        Add => a.wrapping_add(b),
        Sub => a.wrapping_sub(b),
        Mul => a.wrapping_mul(b),
        Div => {
            if b == 0 {
                return Err(EvalError::hard("integer division by zero"));
            }
            a / b
        }
        Mod => {
            if b == 0 {
                return Err(EvalError::hard("integer modulo by zero"));
            }
            a % b
        }
        Shl => a.wrapping_shl(b as u32),
        Shr => a.wrapping_shr(b as u32),
        BitAnd => a & b,
        BitOr => a | b,
        BitXor => a ^ b,
        _ => return Err(EvalError::hard("operator not valid on integral operands")),
    })
}

fn integral_op_signed(op: BinaryOp, a: i64, b: i64) -> Result<i64, EvalError> {
    use BinaryOp::*;
    Ok(match op {
        Add => a.wrapping_add(b),
        Sub => a.wrapping_sub(b),
        Mul => a.wrapping_mul(b),
        Div => {
            if b == 0 {
                return Err(EvalError::hard("integer division by zero"));
            }
            a.wrapping_div(b)
        }
        Mod => {
            if b == 0 {
                return Err(EvalError::hard("integer modulo by zero"));
            }
            a.wrapping_rem(b)
        }
        Shl => a.wrapping_shl(b as u32),
        Shr => a.wrapping_shr(b as u32),
        BitAnd => a & b,
        BitOr => a | b,
        BitXor => a ^ b,
        _ => return Err(EvalError::hard("operator not valid on integral operands")),
    })
}

fn eval_unary(ctx: &mut EvaluationContext, op: UnaryOp, operand: NodeId) -> EvalResult {
    let v = eval(ctx, operand)?;
    match op {
        UnaryOp::Neg => {
            if v.is_floating() {
                Ok(EvalValue::Double(-v.as_f64().unwrap()))
            } else {
                Ok(EvalValue::Int(-v.as_i64().ok_or_else(|| EvalError::hard("operand is not arithmetic"))?))
            }
        }
        UnaryOp::Plus => Ok(v),
        UnaryOp::Not => Ok(EvalValue::Bool(!v.as_bool().ok_or_else(|| EvalError::hard("operand is not boolean"))?)),
        UnaryOp::BitNot => Ok(EvalValue::Int(!v.as_i64().ok_or_else(|| EvalError::hard("operand is not integral"))?)),
        UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => Err(
            EvalError::hard("mutating unary operators require an addressable constexpr variable"),
        ),
        UnaryOp::Deref | UnaryOp::AddrOf => Err(EvalError::hard(
            "pointer operators are not valid in this constant-expression context",
        )),
    }
}

fn eval_cast(ctx: &mut EvaluationContext, kind: CastKind, target: &novacc_core::TypeSpecifierNode, operand: NodeId) -> EvalResult {
    if !matches!(kind, CastKind::Static | CastKind::CStyle | CastKind::Const) {
        return Err(EvalError::hard("reinterpret_cast/dynamic_cast are not constant expressions"));
    }
    let v = eval(ctx, operand)?;
    if target.is_pointer() || target.is_reference() {
        return Ok(v);
    }
    Ok(if target.base.is_floating() {
        EvalValue::Double(v.as_f64().ok_or_else(|| EvalError::hard("cast operand is not arithmetic"))?)
    } else if target.base.is_unsigned_integral() {
        EvalValue::UInt(v.as_i64().ok_or_else(|| EvalError::hard("cast operand is not arithmetic"))? as u64)
    } else {
        EvalValue::Int(v.as_i64().ok_or_else(|| EvalError::hard("cast operand is not arithmetic"))?)
    })
}

fn eval_type_trait(
    trait_kind: TypeTrait,
    operand: &novacc_core::TypeSpecifierNode,
    types: &TypeRegistry,
) -> EvalResult {
    let result = match trait_kind {
        TypeTrait::IsVoid => matches!(operand.base, novacc_core::Type::Void),
        TypeTrait::IsConstantEvaluated => true,
        TypeTrait::IsCompleteOrUnbounded => true,
        TypeTrait::IsClass => matches!(operand.base, novacc_core::Type::Struct | novacc_core::Type::UserDefined),
        TypeTrait::IsEnum => matches!(operand.base, novacc_core::Type::Enum),
        TypeTrait::IsPointer => operand.is_pointer(),
        TypeTrait::IsReference => operand.is_reference(),
        TypeTrait::IsTriviallyCopyable => operand
            .type_index
            .and_then(|idx| types.struct_info(idx))
            .map(|s| s.member_functions.is_empty())
            .unwrap_or(true),
        TypeTrait::IsStandardLayout => true,
        TypeTrait::IsPolymorphic => operand
            .type_index
            .and_then(|idx| types.struct_info(idx))
            .map(|s| s.has_vtable)
            .unwrap_or(false),
        TypeTrait::IsAbstract => operand
            .type_index
            .and_then(|idx| types.struct_info(idx))
            .map(|s| s.is_abstract)
            .unwrap_or(false),
    };
    Ok(EvalValue::Bool(result))
}

/// `__builtin_*` compiler intrinsics (spec §4.4).
pub fn eval_builtin(name: &str, args: &[EvalValue]) -> Option<EvalResult> {
    let one = |f: fn(u64) -> u64| args.first()?.as_i64().map(|v| Ok(EvalValue::UInt(f(v as u64))));
    Some(match name {
        "__builtin_clz" | "__builtin_clzll" => {
            return one(|v| if v == 0 { 64 } else { v.leading_zeros() as u64 })
        }
        "__builtin_ctz" | "__builtin_ctzll" => {
            return one(|v| if v == 0 { 64 } else { v.trailing_zeros() as u64 })
        }
        "__builtin_popcount" | "__builtin_popcountll" => return one(|v| v.count_ones() as u64),
        "__builtin_ffs" | "__builtin_ffsll" => {
            return one(|v| if v == 0 { 0 } else { v.trailing_zeros() as u64 + 1 })
        }
        "__builtin_constant_p" => Ok(EvalValue::Bool(true)),
        "__builtin_abs" => {
            let v = args.first()?.as_i64()?;
            Ok(EvalValue::Int(v.abs()))
        }
        _ => return None,
    })
}

fn eval_call(ctx: &mut EvaluationContext, callee: NodeId, args: &[NodeId]) -> EvalResult {
    let name = match ctx.arena.get(callee) {
        Node::Expr(Expr::Identifier(name)) => *name,
        _ => return Err(EvalError::hard("indirect calls are not constant expressions")),
    };
    let name_text = ctx.interner.view(name).to_string();
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        values.push(eval(ctx, *a)?);
    }
    if name_text.starts_with("__builtin_") {
        return eval_builtin(&name_text, &values)
            .unwrap_or_else(|| Err(EvalError::hard(format!("unsupported builtin `{name_text}`"))));
    }

    if ctx.recursion >= ctx.max_recursion {
        return Err(EvalError::hard(format!(
            "constexpr recursion exceeded {} frames",
            ctx.max_recursion
        )));
    }
    let func_node = ctx
        .host
        .resolve_function(name)
        .ok_or_else(|| EvalError::dependent(format!("`{name_text}` is not yet resolvable")))?;
    let func = match ctx.arena.get(func_node) {
        Node::Decl(Decl::Function(f)) => f.clone(),
        _ => return Err(EvalError::hard("callee does not resolve to a function")),
    };
    call_function(ctx, &func, values)
}

fn call_function(ctx: &mut EvaluationContext, func: &FunctionDecl, args: Vec<EvalValue>) -> EvalResult {
    let body = func
        .body
        .ok_or_else(|| EvalError::hard(format!("`{}` has no definition", ctx.interner.view(func.name))))?;
    ctx.recursion += 1;
    ctx.push_scope();
    for (param, value) in func.params.iter().zip(args) {
        ctx.bind(param.name, value);
    }
    let flow = exec_stmt(ctx, body);
    ctx.pop_scope();
    ctx.recursion -= 1;
    match flow? {
        Flow::Return(Some(v)) => Ok(v),
        Flow::Return(None) => Ok(EvalValue::Int(0)),
        _ => Ok(EvalValue::Int(0)),
    }
}

fn exec_stmt(ctx: &mut EvaluationContext, node: NodeId) -> Result<Flow, EvalError> {
    ctx.tick()?;
    let stmt = match ctx.arena.get(node) {
        Node::Stmt(s) => s.clone(),
        Node::Decl(Decl::Variable(v)) => {
            let value = match &v.initializer {
                Some(init) => eval(ctx, *init)?,
                None => EvalValue::Int(0),
            };
            ctx.bind(v.name, value);
            return Ok(Flow::Normal);
        }
        Node::Expr(_) => {
            eval(ctx, node)?;
            return Ok(Flow::Normal);
        }
        other => return Err(EvalError::hard(format!("cannot execute node as a statement: {other:?}"))),
    };
    match stmt {
        Stmt::Block(children) => {
            ctx.push_scope();
            let mut result = Flow::Normal;
            for child in children {
                match exec_stmt(ctx, child)? {
                    Flow::Normal => {}
                    other => {
                        result = other;
                        break;
                    }
                }
            }
            ctx.pop_scope();
            Ok(result)
        }
        Stmt::ExprStatement(e) => {
            eval(ctx, e)?;
            Ok(Flow::Normal)
        }
        Stmt::Declaration(d) => exec_stmt(ctx, d),
        Stmt::If {
            cond, then_branch, else_branch, ..
        } => {
            let c = eval(ctx, cond)?.as_bool().ok_or_else(|| EvalError::hard("if condition is not boolean"))?;
            if c {
                exec_stmt(ctx, then_branch)
            } else if let Some(e) = else_branch {
                exec_stmt(ctx, e)
            } else {
                Ok(Flow::Normal)
            }
        }
        Stmt::While { cond, body } => {
            loop {
                ctx.tick()?;
                let c = eval(ctx, cond)?.as_bool().ok_or_else(|| EvalError::hard("while condition is not boolean"))?;
                if !c {
                    break;
                }
                match exec_stmt(ctx, body)? {
                    Flow::Break => break,
                    Flow::Continue | Flow::Normal => {}
                    ret @ Flow::Return(_) => return Ok(ret),
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::DoWhile { body, cond } => {
            loop {
                ctx.tick()?;
                match exec_stmt(ctx, body)? {
                    Flow::Break => break,
                    Flow::Continue | Flow::Normal => {}
                    ret @ Flow::Return(_) => return Ok(ret),
                }
                let c = eval(ctx, cond)?.as_bool().ok_or_else(|| EvalError::hard("do-while condition is not boolean"))?;
                if !c {
                    break;
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::For {
            init,
            cond,
            increment,
            body,
        } => {
            ctx.push_scope();
            if let Some(i) = init {
                exec_stmt(ctx, i)?;
            }
            let result = loop {
                ctx.tick()?;
                if let Some(c) = cond {
                    let v = eval(ctx, c)?.as_bool().ok_or_else(|| EvalError::hard("for condition is not boolean"))?;
                    if !v {
                        break Flow::Normal;
                    }
                }
                match exec_stmt(ctx, body)? {
                    Flow::Break => break Flow::Normal,
                    Flow::Continue | Flow::Normal => {}
                    ret @ Flow::Return(_) => break ret,
                }
                if let Some(inc) = increment {
                    eval(ctx, inc)?;
                }
            };
            ctx.pop_scope();
            Ok(result)
        }
        Stmt::Return(value) => {
            let v = match value {
                Some(e) => Some(eval(ctx, e)?),
                None => None,
            };
            Ok(Flow::Return(v))
        }
        Stmt::Break => Ok(Flow::Break),
        Stmt::Continue => Ok(Flow::Continue),
        Stmt::RangedFor { .. } | Stmt::Switch { .. } | Stmt::Try { .. } | Stmt::Throw(_) => Err(
            EvalError::hard("construct is not supported in a constexpr function body"),
        ),
        Stmt::Goto(_) | Stmt::Label(..) => {
            Err(EvalError::hard("goto/labels are not supported in constexpr evaluation"))
        }
        Stmt::StructuredBinding { .. } => {
            Err(EvalError::hard("structured bindings are not supported in constexpr evaluation"))
        }
    }
}

/// Assigns through a simple name (used by `x = expr`/`x += expr` when `x`
/// is a local constexpr binding inside a constexpr function body).
pub fn eval_assign(ctx: &mut EvaluationContext, target: NodeId, value: EvalValue) -> EvalResult {
    match ctx.arena.get(target) {
        Node::Expr(Expr::Identifier(name)) => {
            if ctx.assign(*name, value.clone()) {
                Ok(value)
            } else {
                Err(EvalError::hard("assignment target is not a local constexpr variable"))
            }
        }
        _ => Err(EvalError::hard("unsupported constexpr assignment target")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novacc_ast::{Node as AstNode, Param, SourceToken};
    use novacc_core::{Interner, TypeRegistry};

    fn tok() -> SourceToken {
        SourceToken { line: 1, column: 1 }
    }

    #[test]
    fn evaluates_arithmetic_with_precedence_already_resolved_by_ast_shape() {
        let interner = Interner::new();
        let types = TypeRegistry::new();
        let mut arena = Arena::new();
        let two = arena.alloc(AstNode::Expr(Expr::NumericLiteral {
            value: novacc_lexer::NumericValue::Integer(2),
            kind: novacc_lexer::NumericLiteralKind::Int,
        }), tok());
        let three = arena.alloc(AstNode::Expr(Expr::NumericLiteral {
            value: novacc_lexer::NumericValue::Integer(3),
            kind: novacc_lexer::NumericLiteralKind::Int,
        }), tok());
        let mul = arena.alloc(
            AstNode::Expr(Expr::BinaryOperator {
                op: BinaryOp::Mul,
                lhs: two,
                rhs: three,
            }),
            tok(),
        );
        let mut host = NullHost;
        let mut ctx = EvaluationContext::new(&arena, &types, &interner, &mut host);
        let result = eval(&mut ctx, mul).unwrap();
        assert_eq!(result.as_i64(), Some(6));
    }

    #[test]
    fn division_by_zero_is_a_hard_error() {
        let interner = Interner::new();
        let types = TypeRegistry::new();
        let mut arena = Arena::new();
        let one = arena.alloc(AstNode::Expr(Expr::NumericLiteral {
            value: novacc_lexer::NumericValue::Integer(1),
            kind: novacc_lexer::NumericLiteralKind::Int,
        }), tok());
        let zero = arena.alloc(AstNode::Expr(Expr::NumericLiteral {
            value: novacc_lexer::NumericValue::Integer(0),
            kind: novacc_lexer::NumericLiteralKind::Int,
        }), tok());
        let div = arena.alloc(
            AstNode::Expr(Expr::BinaryOperator {
                op: BinaryOp::Div,
                lhs: one,
                rhs: zero,
            }),
            tok(),
        );
        let mut host = NullHost;
        let mut ctx = EvaluationContext::new(&arena, &types, &interner, &mut host);
        let err = eval(&mut ctx, div).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::Hard);
    }

    #[test]
    fn recursive_constexpr_factorial() {
        let interner = Interner::new();
        let types = TypeRegistry::new();
        let mut arena = Arena::new();
        // fact(n) -> return n <= 1 ? 1 : n * fact(n - 1);
        let n_name = interner.intern("n");
        let fact_name = interner.intern("fact");

        let n_ref = arena.alloc(AstNode::Expr(Expr::Identifier(n_name)), tok());
        let one = arena.alloc(AstNode::Expr(Expr::NumericLiteral {
            value: novacc_lexer::NumericValue::Integer(1),
            kind: novacc_lexer::NumericLiteralKind::Int,
        }), tok());
        let cond = arena.alloc(
            AstNode::Expr(Expr::BinaryOperator { op: BinaryOp::Le, lhs: n_ref, rhs: one }),
            tok(),
        );
        let n_ref2 = arena.alloc(AstNode::Expr(Expr::Identifier(n_name)), tok());
        let n_ref3 = arena.alloc(AstNode::Expr(Expr::Identifier(n_name)), tok());
        let one2 = arena.alloc(AstNode::Expr(Expr::NumericLiteral {
            value: novacc_lexer::NumericValue::Integer(1),
            kind: novacc_lexer::NumericLiteralKind::Int,
        }), tok());
        let n_minus_1 = arena.alloc(
            AstNode::Expr(Expr::BinaryOperator { op: BinaryOp::Sub, lhs: n_ref3, rhs: one2 }),
            tok(),
        );
        let fact_ref = arena.alloc(AstNode::Expr(Expr::Identifier(fact_name)), tok());
        let recurse = arena.alloc(
            AstNode::Expr(Expr::FunctionCall { callee: fact_ref, args: vec![n_minus_1] }),
            tok(),
        );
        let one3 = arena.alloc(AstNode::Expr(Expr::NumericLiteral {
            value: novacc_lexer::NumericValue::Integer(1),
            kind: novacc_lexer::NumericLiteralKind::Int,
        }), tok());
        let mul = arena.alloc(
            AstNode::Expr(Expr::BinaryOperator { op: BinaryOp::Mul, lhs: n_ref2, rhs: recurse }),
            tok(),
        );
        let ternary = arena.alloc(
            AstNode::Expr(Expr::TernaryOperator { cond, then_value: one3, else_value: mul }),
            tok(),
        );
        let ret = arena.alloc(AstNode::Stmt(Stmt::Return(Some(ternary))), tok());
        let body = arena.alloc(AstNode::Stmt(Stmt::Block(vec![ret])), tok());
        let func_node = arena.alloc(
            AstNode::Decl(Decl::Function(FunctionDecl {
                name: fact_name,
                kind: novacc_ast::FunctionKind::Regular,
                params: vec![Param {
                    name: n_name,
                    ty: novacc_core::TypeSpecifierNode::scalar(novacc_core::Type::Int),
                    default_value: None,
                }],
                return_type: Some(novacc_core::TypeSpecifierNode::scalar(novacc_core::Type::Int)),
                is_virtual: false,
                is_static: false,
                is_constexpr: true,
                is_consteval: false,
                body: Some(body),
                owning_struct: None,
            })),
            tok(),
        );

        struct Host(NodeId);
        impl EvalHost for Host {
            fn lookup_constant(&mut self, _name: StringHandle) -> Option<EvalValue> {
                None
            }
            fn resolve_function(&mut self, _name: StringHandle) -> Option<NodeId> {
                Some(self.0)
            }
            fn pack_size(&self, _pack: StringHandle) -> Option<usize> {
                None
            }
        }
        let mut host = Host(func_node);
        let mut ctx = EvaluationContext::new(&arena, &types, &interner, &mut host);

        let five = arena.alloc(AstNode::Expr(Expr::NumericLiteral {
            value: novacc_lexer::NumericValue::Integer(5),
            kind: novacc_lexer::NumericLiteralKind::Int,
        }), tok());
        let call = arena.alloc(
            AstNode::Expr(Expr::FunctionCall { callee: fact_ref, args: vec![five] }),
            tok(),
        );
        let result = eval(&mut ctx, call).unwrap();
        assert_eq!(result.as_i64(), Some(120));
    }
}

//! AST arena and node definitions (spec §3.4).
//!
//! The AST is a tagged sum of declarations, statements, and expressions.
//! Nodes live in a single flat arena and are referenced by [`NodeId`]
//! rather than by owned pointer, so that symbol-table entries, type
//! registry members, and sibling AST nodes can all hold a cheap, `Copy`
//! back-reference to each other without lifetime plumbing (spec §9 "use
//! arena allocation plus integer indices for stable-identity relations").
//!
//! Nodes are immutable after construction except for a small set of
//! late-binding fields (a function's body, a struct's finished layout),
//! which are exposed as `set_*` methods on [`Arena`] rather than public
//! `&mut` fields.

use novacc_core::{StringHandle, TypeIndex, TypeSpecifierNode};
use std::fmt;

/// Stable arena index. `0` is never issued by [`Arena::alloc`], so `NodeId`
/// can be wrapped in `Option<NodeId>` at the same size via `NonZeroU32`
/// would be a possible optimisation; plain `u32` keeps construction simple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceToken {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ShlAssign,
    ShrAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    Comma,
    Spaceship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    Deref,
    AddrOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Static,
    Reinterpret,
    Const,
    Dynamic,
    CStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTrait {
    IsVoid,
    IsConstantEvaluated,
    IsCompleteOrUnbounded,
    IsClass,
    IsEnum,
    IsPointer,
    IsReference,
    IsTriviallyCopyable,
    IsStandardLayout,
    IsPolymorphic,
    IsAbstract,
}

/// Lambda capture mode for one captured entity (spec §3.4 `LambdaExpressionNode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    ByValue,
    ByReference,
}

#[derive(Debug, Clone)]
pub struct Capture {
    pub name: StringHandle,
    pub mode: CaptureMode,
}

/// One of ~25 expression-node kinds (spec §3.4).
#[derive(Debug, Clone)]
pub enum Expr {
    NumericLiteral {
        value: novacc_lexer::NumericValue,
        kind: novacc_lexer::NumericLiteralKind,
    },
    BoolLiteral(bool),
    StringLiteral(StringHandle),
    Identifier(StringHandle),
    QualifiedIdentifier {
        qualifiers: Vec<StringHandle>,
        name: StringHandle,
    },
    TemplateParameterReference(StringHandle),
    BinaryOperator {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    UnaryOperator {
        op: UnaryOp,
        operand: NodeId,
    },
    TernaryOperator {
        cond: NodeId,
        then_value: NodeId,
        else_value: NodeId,
    },
    FunctionCall {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    MemberAccess {
        object: NodeId,
        member: StringHandle,
        is_arrow: bool,
    },
    MemberFunctionCall {
        object: NodeId,
        method: StringHandle,
        args: Vec<NodeId>,
        is_arrow: bool,
    },
    ArraySubscript {
        array: NodeId,
        index: NodeId,
    },
    ConstructorCall {
        type_index: Option<TypeIndex>,
        type_name: StringHandle,
        args: Vec<NodeId>,
    },
    Cast {
        kind: CastKind,
        target: TypeSpecifierNode,
        operand: NodeId,
    },
    SizeofExpr(NodeId),
    SizeofType(TypeSpecifierNode),
    SizeofPack(StringHandle),
    AlignofExpr(NodeId),
    AlignofType(TypeSpecifierNode),
    TypeTraitExpr {
        trait_kind: TypeTrait,
        operand: TypeSpecifierNode,
    },
    LambdaExpression {
        captures: Vec<Capture>,
        capture_default: Option<CaptureMode>,
        params: Vec<Param>,
        return_type: Option<TypeSpecifierNode>,
        body: NodeId,
    },
    FoldExpression {
        op: BinaryOp,
        pack: NodeId,
        init: Option<NodeId>,
        left_fold: bool,
    },
    PackExpansion(NodeId),
    InitializerList(Vec<NodeId>),
    New {
        target: TypeSpecifierNode,
        array_size: Option<NodeId>,
        placement: Option<NodeId>,
        args: Vec<NodeId>,
    },
    Delete {
        operand: NodeId,
        is_array: bool,
    },
    Typeid(NodeId),
    DynamicCast {
        target: TypeSpecifierNode,
        operand: NodeId,
    },
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: StringHandle,
    pub ty: TypeSpecifierNode,
    pub default_value: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateParamKind {
    Type,
    NonType,
    Pack,
}

#[derive(Debug, Clone)]
pub struct TemplateParam {
    pub name: StringHandle,
    pub kind: TemplateParamKind,
    pub non_type_type: Option<TypeSpecifierNode>,
}

#[derive(Debug, Clone)]
pub struct CaseLabel {
    pub value: NodeId,
    pub body: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub exception_type: Option<TypeSpecifierNode>,
    pub is_catch_all: bool,
    pub binding_name: Option<StringHandle>,
    pub body: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Value,
    LValueRef,
    RValueRef,
}

/// Statement nodes (spec §3.4). `BlockNode` children and most statement
/// bodies are `Vec<NodeId>` rather than a single "body" id so the lowering
/// pass (`novacc-ir`) can walk siblings without an intermediate list node.
#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Vec<NodeId>),
    ExprStatement(NodeId),
    If {
        init: Option<NodeId>,
        is_constexpr: bool,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    For {
        init: Option<NodeId>,
        cond: Option<NodeId>,
        increment: Option<NodeId>,
        body: NodeId,
    },
    While {
        cond: NodeId,
        body: NodeId,
    },
    DoWhile {
        body: NodeId,
        cond: NodeId,
    },
    RangedFor {
        binding: StringHandle,
        binding_kind: BindingKind,
        range: NodeId,
        body: NodeId,
    },
    Switch {
        scrutinee: NodeId,
        cases: Vec<CaseLabel>,
        default: Option<Vec<NodeId>>,
    },
    Try {
        body: NodeId,
        handlers: Vec<CatchClause>,
    },
    Throw(Option<NodeId>),
    Return(Option<NodeId>),
    Break,
    Continue,
    Goto(StringHandle),
    Label(StringHandle, NodeId),
    StructuredBinding {
        bindings: Vec<(StringHandle, BindingKind)>,
        initializer: NodeId,
    },
    Declaration(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Regular,
    Constructor,
    Destructor,
    Conversion,
    Operator,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: StringHandle,
    pub kind: FunctionKind,
    pub params: Vec<Param>,
    pub return_type: Option<TypeSpecifierNode>,
    pub is_virtual: bool,
    pub is_static: bool,
    pub is_constexpr: bool,
    pub is_consteval: bool,
    pub body: Option<NodeId>,
    pub owning_struct: Option<TypeIndex>,
}

#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: StringHandle,
    pub ty: TypeSpecifierNode,
    pub initializer: Option<NodeId>,
    pub is_static: bool,
    pub is_constexpr: bool,
    pub is_global: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: StringHandle,
    pub type_index: TypeIndex,
    pub bases: Vec<(StringHandle, Access)>,
    pub members: Vec<NodeId>,
    pub is_union: bool,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: StringHandle,
    pub type_index: TypeIndex,
    pub is_scoped: bool,
    pub enumerators: Vec<(StringHandle, Option<NodeId>)>,
}

#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    pub name: Option<StringHandle>,
    pub members: Vec<NodeId>,
}

/// Declaration nodes (spec §3.4). Template declarations carry the stored
/// AST subtree plus its parameter list; `novacc-parser`'s template engine
/// substitutes into a clone of `body` on instantiation.
#[derive(Debug, Clone)]
pub enum Decl {
    Function(FunctionDecl),
    Variable(VariableDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Namespace(NamespaceDecl),
    TemplateFunction {
        params: Vec<TemplateParam>,
        body: NodeId,
    },
    TemplateVariable {
        params: Vec<TemplateParam>,
        body: NodeId,
    },
    TemplateStruct {
        params: Vec<TemplateParam>,
        body: NodeId,
    },
    Using {
        alias: StringHandle,
        target: TypeSpecifierNode,
    },
    StaticAssert {
        condition: NodeId,
        message: Option<StringHandle>,
    },
}

#[derive(Debug, Clone)]
pub enum Node {
    Decl(Decl),
    Stmt(Stmt),
    Expr(Expr),
}

/// Owns every node produced while parsing one translation unit. Parser
/// speculation rolls back by truncating to a saved length (spec §4.3
/// "rolls back both the lexer cursor and the AST arena's size").
#[derive(Default)]
pub struct Arena {
    nodes: Vec<Node>,
    tokens: Vec<SourceToken>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node, token: SourceToken) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.tokens.push(token);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn token(&self, id: NodeId) -> SourceToken {
        self.tokens[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Speculative-parse snapshot: the arena length to truncate back to on
    /// rollback (spec §4.3 `ScopedTokenPosition`).
    pub fn checkpoint(&self) -> usize {
        self.nodes.len()
    }

    pub fn rollback(&mut self, checkpoint: usize) {
        self.nodes.truncate(checkpoint);
        self.tokens.truncate(checkpoint);
    }

    /// Late-binds a function's body once parsed (spec §3.4 "late-binding
    /// fields"); panics if `id` is not a `Decl::Function`.
    pub fn set_function_body(&mut self, id: NodeId, body: NodeId) {
        match &mut self.nodes[id.0 as usize] {
            Node::Decl(Decl::Function(f)) => f.body = Some(body),
            _ => panic!("set_function_body: {id} is not a function declaration"),
        }
    }

    pub fn set_struct_members(&mut self, id: NodeId, members: Vec<NodeId>) {
        match &mut self.nodes[id.0 as usize] {
            Node::Decl(Decl::Struct(s)) => s.members = members,
            _ => panic!("set_struct_members: {id} is not a struct declaration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok() -> SourceToken {
        SourceToken { line: 1, column: 1 }
    }

    #[test]
    fn rollback_truncates_speculative_nodes() {
        let mut arena = Arena::new();
        let cp = arena.checkpoint();
        arena.alloc(Node::Expr(Expr::BoolLiteral(true)), tok());
        arena.alloc(Node::Expr(Expr::BoolLiteral(false)), tok());
        assert_eq!(arena.len(), 2);
        arena.rollback(cp);
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn late_binds_function_body() {
        let interner = novacc_core::Interner::new();
        let mut arena = Arena::new();
        let body = arena.alloc(Node::Stmt(Stmt::Block(vec![])), tok());
        let func = arena.alloc(
            Node::Decl(Decl::Function(FunctionDecl {
                name: interner.intern("f"),
                kind: FunctionKind::Regular,
                params: vec![],
                return_type: None,
                is_virtual: false,
                is_static: false,
                is_constexpr: false,
                is_consteval: false,
                body: None,
                owning_struct: None,
            })),
            tok(),
        );
        arena.set_function_body(func, body);
        match arena.get(func) {
            Node::Decl(Decl::Function(f)) => assert_eq!(f.body, Some(body)),
            _ => panic!("expected function"),
        }
    }
}

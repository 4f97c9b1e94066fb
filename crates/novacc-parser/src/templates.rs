//! Template declaration parsing and instantiation (spec §3.6, §4.3).
//!
//! Instantiation works by re-walking the stored (uninstantiated) template
//! body and cloning it node-by-node into the live arena, substituting any
//! [`TypeSpecifierNode`] tagged as a dependent type (see
//! `TypeSpecifierNode::template_param_name`) and any [`Expr::Identifier`]
//! that names a non-type template parameter. The clone also re-runs symbol
//! table insertion so the instantiated declaration is visible exactly like
//! an ordinary one.

use crate::error::Result;
use crate::{Parser, ParserError};
use novacc_ast::{
    Arena, CaseLabel, CatchClause, Decl, EnumDecl, Expr, FunctionDecl, Node, NodeId, Param, Stmt,
    StructDecl, TemplateParam, TemplateParamKind, VariableDecl,
};
use novacc_core::templates::{Instantiation, PendingMember, TemplateTypeArg};
use novacc_core::{StringHandle, TypeSpecifierNode};
use novacc_eval::{EvalHost, EvalValue};
use novacc_lexer::TokenKind;

/// Converts a parsed type specifier into the registry's argument form (spec
/// §3.6 canonical mangling). Top-level const on the argument itself is not
/// modelled, matching `instantiate`'s own simplified non-type fallback.
fn template_type_arg_from_spec(ty: &TypeSpecifierNode) -> TemplateTypeArg {
    TemplateTypeArg::Type {
        base: ty.base,
        pointer_depth: ty.pointer_levels.len() as u32,
        ref_kind: ty.ref_kind,
        is_const: false,
        user_defined_name: None,
    }
}

/// A concrete binding for one template parameter, used while cloning a
/// stored template body into the live arena.
#[derive(Clone)]
enum Binding {
    Type(TypeSpecifierNode),
    ValueInt(i64),
    ValueBool(bool),
}

impl<'a> Parser<'a> {
    pub fn parse_template_declaration(&mut self) -> Result<NodeId> {
        self.expect("template")?;
        self.expect("<")?;
        let mut params = Vec::new();
        loop {
            if self.peek_is(">") {
                break;
            }
            let param = if self.consume_if("typename") || self.consume_if("class") {
                let is_pack = self.consume_if("...");
                let name = self.expect_identifier()?;
                // Permit a default type argument; not modelled further, the
                // registry always requires explicit arguments at use-site.
                if self.consume_if("=") {
                    let _ = self.parse_type_specifier()?;
                }
                TemplateParam {
                    name,
                    kind: if is_pack { TemplateParamKind::Pack } else { TemplateParamKind::Type },
                    non_type_type: None,
                }
            } else {
                let non_type_type = self.parse_type_specifier()?;
                let is_pack = self.consume_if("...");
                let name = self.expect_identifier()?;
                if self.consume_if("=") {
                    let _ = self.parse_assignment_expression()?;
                }
                TemplateParam {
                    name,
                    kind: if is_pack { TemplateParamKind::Pack } else { TemplateParamKind::NonType },
                    non_type_type: Some(non_type_type),
                }
            };
            params.push(param);
            if !self.consume_if(",") {
                break;
            }
        }
        self.expect(">")?;

        let saved = std::mem::take(&mut self.active_template_params);
        self.active_template_params = params.iter().map(|p| (p.name, p.kind)).collect();

        let inner = if self.peek_is("struct") || self.peek_is("class") {
            self.parse_declaration()?
        } else {
            self.parse_function_or_variable()?
        };

        self.active_template_params = saved;

        let (wrapper_decl, template_name) = match self.arena.borrow().get(inner) {
            Node::Decl(Decl::Function(f)) => (
                Decl::TemplateFunction { params: params.clone(), body: inner },
                f.name,
            ),
            Node::Decl(Decl::Variable(v)) => (
                Decl::TemplateVariable { params: params.clone(), body: inner },
                v.name,
            ),
            Node::Decl(Decl::Struct(s)) => (
                Decl::TemplateStruct { params: params.clone(), body: inner },
                s.name,
            ),
            _ => {
                return Err(ParserError::NotImplemented {
                    what: "template declaration kind".to_string(),
                    line: self.current_line_public(),
                    column: self.current_column_public(),
                })
            }
        };
        let tok = self.source_token();
        let wrapper = self.arena.borrow_mut().alloc(Node::Decl(wrapper_decl), tok);
        self.template_decls.insert(template_name, wrapper);
        Ok(wrapper)
    }

    fn current_line_public(&self) -> u32 {
        self.peek().line
    }
    fn current_column_public(&self) -> u32 {
        self.peek().column
    }

    /// Parses a `<...>` template-argument list at a use site (as opposed to
    /// a template *declaration*'s parameter list), collecting real
    /// `TemplateTypeArg`s so the caller can drive [`Parser::instantiate`]
    /// instead of merely skipping over the tokens. An argument is treated
    /// as a type when it starts with a builtin type keyword or a name
    /// already known to the type registry; anything else is parsed as an
    /// expression and folded as a constant (spec §4.3 non-type arguments).
    pub fn parse_template_arguments(
        &mut self,
    ) -> Result<(Vec<TemplateTypeArg>, Vec<Option<TypeSpecifierNode>>)> {
        self.expect("<")?;
        let mut args = Vec::new();
        let mut type_bindings = Vec::new();
        if self.consume_if(">") {
            return Ok((args, type_bindings));
        }
        loop {
            let looks_like_type = self.is_builtin_type_keyword()
                || (self.peek_kind() == TokenKind::Identifier
                    && self.lookup_type_index(self.peek().text).is_some());
            if looks_like_type {
                let ty = self.parse_type_specifier()?;
                args.push(template_type_arg_from_spec(&ty));
                type_bindings.push(Some(ty));
            } else {
                let expr = self.parse_assignment_expression()?;
                let value = self.eval_constant(expr).map_err(|_| ParserError::Semantic {
                    message: "template argument is not a constant expression".to_string(),
                    line: self.current_line_public(),
                    column: self.current_column_public(),
                })?;
                let arg = match value.as_i64() {
                    Some(v) => TemplateTypeArg::ValueInt(v),
                    None => TemplateTypeArg::ValueBool(value.as_bool().unwrap_or(false)),
                };
                args.push(arg);
                type_bindings.push(None);
            }
            if !self.consume_if(",") {
                break;
            }
        }
        self.expect(">")?;
        Ok((args, type_bindings))
    }

    /// Evaluates an already-instantiated struct specialisation's static
    /// `constexpr` member `member`, for qualified-id value expressions like
    /// `S<int>::v` (spec §4.3). Returns `None` when the member does not
    /// exist, is not `constexpr`, or does not fold.
    pub fn lookup_instantiated_constant(
        &mut self,
        specialisation: NodeId,
        member: StringHandle,
    ) -> Option<EvalValue> {
        let members = match self.arena.borrow().get(specialisation) {
            Node::Decl(Decl::Struct(s)) => s.members.clone(),
            _ => return None,
        };
        for m in members {
            let candidate = match self.arena.borrow().get(m) {
                Node::Decl(Decl::Variable(v)) if v.name == member && v.is_constexpr => v.initializer,
                _ => None,
            };
            if let Some(init) = candidate {
                if let Ok(value) = self.eval_constant(init) {
                    return Some(value);
                }
            }
        }
        None
    }

    /// Looks up (or lazily instantiates) the specialisation of template
    /// `name` for `args`, returning the instantiated declaration's
    /// `NodeId`. Struct templates are eagerly fully instantiated; function
    /// templates are instantiated on first use (spec §4.3).
    pub fn instantiate(
        &mut self,
        name: StringHandle,
        args: Vec<TemplateTypeArg>,
        type_args_for_binding: Vec<Option<TypeSpecifierNode>>,
    ) -> Result<NodeId> {
        if let Some(existing) = self
            .session
            .templates
            .borrow()
            .lookup(name, &args, &self.session.interner)
        {
            return Ok(NodeId(existing.ast_node));
        }

        let wrapper = *self
            .template_decls
            .get(&name)
            .ok_or_else(|| ParserError::Semantic {
                message: format!("`{}` is not a known template", self.session.interner.view(name)),
                line: self.current_line_public(),
                column: self.current_column_public(),
            })?;

        let (params, body) = match self.arena.borrow().get(wrapper) {
            Node::Decl(Decl::TemplateFunction { params, body })
            | Node::Decl(Decl::TemplateVariable { params, body })
            | Node::Decl(Decl::TemplateStruct { params, body }) => (params.clone(), *body),
            _ => {
                return Err(ParserError::Semantic {
                    message: "template registry entry is not a template declaration".to_string(),
                    line: self.current_line_public(),
                    column: self.current_column_public(),
                })
            }
        };

        {
            // The guard (and the `RefMut` it borrows from) are dropped at
            // the end of this block, before the recursive clone below: the
            // depth counter only protects the instant of entry rather than
            // the whole materialisation, since the clone does not currently
            // re-enter `instantiate` for nested template-ids.
            let mut templates_ref = self.session.templates.borrow_mut();
            let _guard = templates_ref
                .begin_instantiation(name, &args, &self.session.interner)
                .map_err(ParserError::Template)?;
        }

        let bindings: Vec<(StringHandle, Binding)> = params
            .iter()
            .zip(type_args_for_binding.into_iter().chain(std::iter::repeat(None)))
            .zip(args.iter())
            .map(|((param, type_binding), arg)| {
                let binding = match (type_binding, arg) {
                    (Some(ty), _) => Binding::Type(ty),
                    (None, TemplateTypeArg::ValueInt(v)) => Binding::ValueInt(*v),
                    (None, TemplateTypeArg::ValueBool(b)) => Binding::ValueBool(*b),
                    (None, TemplateTypeArg::Type { .. }) => {
                        Binding::Type(TypeSpecifierNode::scalar(novacc_core::Type::Int))
                    }
                };
                (param.name, binding)
            })
            .collect();

        let instantiated_root = self.clone_subst(body, &bindings);

        if let Node::Decl(Decl::Struct(_)) = self.arena.borrow().get(instantiated_root) {
            // Struct templates are fully materialised immediately: queue
            // nothing, the clone above already produced every member.
        } else {
            self.instantiation_queue.push(PendingMember {
                owning_specialisation: instantiated_root.0,
                member_template_node: body.0,
            });
        }

        self.session.templates.borrow_mut().finish(
            name,
            &args,
            &self.session.interner,
            Instantiation {
                ast_node: instantiated_root.0,
                fully_instantiated: true,
            },
        );

        Ok(instantiated_root)
    }

    /// Deep-clones the subtree at `root` (taken from the *current* arena,
    /// where the stored template body lives) into fresh nodes, substituting
    /// template parameters as it goes.
    fn clone_subst(&mut self, root: NodeId, bindings: &[(StringHandle, Binding)]) -> NodeId {
        let node = self.arena.borrow().get(root).clone();
        match node {
            Node::Expr(e) => {
                let new_expr = self.clone_subst_expr(e, bindings);
                let tok = self.arena.borrow().token(root);
                self.arena.borrow_mut().alloc(Node::Expr(new_expr), tok)
            }
            Node::Stmt(s) => {
                let new_stmt = self.clone_subst_stmt(s, bindings);
                let tok = self.arena.borrow().token(root);
                self.arena.borrow_mut().alloc(Node::Stmt(new_stmt), tok)
            }
            Node::Decl(d) => {
                let new_decl = self.clone_subst_decl(d, bindings);
                let tok = self.arena.borrow().token(root);
                let id = self.arena.borrow_mut().alloc(Node::Decl(new_decl), tok);
                self.reinsert_decl_symbol(id);
                id
            }
        }
    }

    fn clone_opt(&mut self, node: Option<NodeId>, bindings: &[(StringHandle, Binding)]) -> Option<NodeId> {
        node.map(|n| self.clone_subst(n, bindings))
    }

    fn clone_many(&mut self, nodes: &[NodeId], bindings: &[(StringHandle, Binding)]) -> Vec<NodeId> {
        nodes.iter().map(|&n| self.clone_subst(n, bindings)).collect()
    }

    fn subst_type(&self, ty: &TypeSpecifierNode, bindings: &[(StringHandle, Binding)]) -> TypeSpecifierNode {
        if let Some(param_name) = ty.template_param_name {
            if let Some((_, Binding::Type(bound))) = bindings.iter().find(|(n, _)| *n == param_name) {
                let mut result = bound.clone();
                result.pointer_levels.extend(ty.pointer_levels.iter().cloned());
                if ty.ref_kind != novacc_core::RefKind::None {
                    result.ref_kind = ty.ref_kind;
                }
                result.array_dims.extend(ty.array_dims.iter().cloned());
                return result;
            }
        }
        ty.clone()
    }

    fn subst_opt_type(&self, ty: &Option<TypeSpecifierNode>, bindings: &[(StringHandle, Binding)]) -> Option<TypeSpecifierNode> {
        ty.as_ref().map(|t| self.subst_type(t, bindings))
    }

    fn clone_subst_expr(&mut self, e: Expr, bindings: &[(StringHandle, Binding)]) -> Expr {
        match e {
            Expr::Identifier(name) => {
                match bindings.iter().find(|(n, _)| *n == name) {
                    Some((_, Binding::ValueInt(v))) => Expr::NumericLiteral {
                        value: novacc_lexer::NumericValue::Integer(*v as u64),
                        kind: novacc_lexer::NumericLiteralKind::Int,
                    },
                    Some((_, Binding::ValueBool(b))) => Expr::BoolLiteral(*b),
                    _ => Expr::Identifier(name),
                }
            }
            Expr::BinaryOperator { op, lhs, rhs } => Expr::BinaryOperator {
                op,
                lhs: self.clone_subst(lhs, bindings),
                rhs: self.clone_subst(rhs, bindings),
            },
            Expr::UnaryOperator { op, operand } => Expr::UnaryOperator {
                op,
                operand: self.clone_subst(operand, bindings),
            },
            Expr::TernaryOperator { cond, then_value, else_value } => Expr::TernaryOperator {
                cond: self.clone_subst(cond, bindings),
                then_value: self.clone_subst(then_value, bindings),
                else_value: self.clone_subst(else_value, bindings),
            },
            Expr::FunctionCall { callee, args } => Expr::FunctionCall {
                callee: self.clone_subst(callee, bindings),
                args: self.clone_many(&args, bindings),
            },
            Expr::MemberAccess { object, member, is_arrow } => Expr::MemberAccess {
                object: self.clone_subst(object, bindings),
                member,
                is_arrow,
            },
            Expr::MemberFunctionCall { object, method, args, is_arrow } => Expr::MemberFunctionCall {
                object: self.clone_subst(object, bindings),
                method,
                args: self.clone_many(&args, bindings),
                is_arrow,
            },
            Expr::ArraySubscript { array, index } => Expr::ArraySubscript {
                array: self.clone_subst(array, bindings),
                index: self.clone_subst(index, bindings),
            },
            Expr::ConstructorCall { type_index, type_name, args } => Expr::ConstructorCall {
                type_index,
                type_name,
                args: self.clone_many(&args, bindings),
            },
            Expr::Cast { kind, target, operand } => Expr::Cast {
                kind,
                target: self.subst_type(&target, bindings),
                operand: self.clone_subst(operand, bindings),
            },
            Expr::SizeofExpr(n) => Expr::SizeofExpr(self.clone_subst(n, bindings)),
            Expr::SizeofType(t) => Expr::SizeofType(self.subst_type(&t, bindings)),
            Expr::SizeofPack(name) => Expr::SizeofPack(name),
            Expr::AlignofExpr(n) => Expr::AlignofExpr(self.clone_subst(n, bindings)),
            Expr::AlignofType(t) => Expr::AlignofType(self.subst_type(&t, bindings)),
            Expr::TypeTraitExpr { trait_kind, operand } => Expr::TypeTraitExpr {
                trait_kind,
                operand: self.subst_type(&operand, bindings),
            },
            Expr::LambdaExpression { captures, capture_default, params, return_type, body } => {
                let params = params
                    .into_iter()
                    .map(|p| Param {
                        name: p.name,
                        ty: self.subst_type(&p.ty, bindings),
                        default_value: self.clone_opt(p.default_value, bindings),
                    })
                    .collect();
                Expr::LambdaExpression {
                    captures,
                    capture_default,
                    params,
                    return_type: self.subst_opt_type(&return_type, bindings),
                    body: self.clone_subst(body, bindings),
                }
            }
            Expr::FoldExpression { op, pack, init, left_fold } => Expr::FoldExpression {
                op,
                pack: self.clone_subst(pack, bindings),
                init: self.clone_opt(init, bindings),
                left_fold,
            },
            Expr::PackExpansion(n) => Expr::PackExpansion(self.clone_subst(n, bindings)),
            Expr::InitializerList(items) => Expr::InitializerList(self.clone_many(&items, bindings)),
            Expr::New { target, array_size, placement, args } => Expr::New {
                target: self.subst_type(&target, bindings),
                array_size: self.clone_opt(array_size, bindings),
                placement: self.clone_opt(placement, bindings),
                args: self.clone_many(&args, bindings),
            },
            Expr::Delete { operand, is_array } => Expr::Delete {
                operand: self.clone_subst(operand, bindings),
                is_array,
            },
            Expr::Typeid(n) => Expr::Typeid(self.clone_subst(n, bindings)),
            Expr::DynamicCast { target, operand } => Expr::DynamicCast {
                target: self.subst_type(&target, bindings),
                operand: self.clone_subst(operand, bindings),
            },
            other @ (Expr::NumericLiteral { .. }
            | Expr::BoolLiteral(_)
            | Expr::StringLiteral(_)
            | Expr::QualifiedIdentifier { .. }
            | Expr::TemplateParameterReference(_)) => other,
        }
    }

    fn clone_subst_stmt(&mut self, s: Stmt, bindings: &[(StringHandle, Binding)]) -> Stmt {
        match s {
            Stmt::Block(items) => Stmt::Block(self.clone_many(&items, bindings)),
            Stmt::ExprStatement(n) => Stmt::ExprStatement(self.clone_subst(n, bindings)),
            Stmt::If { init, is_constexpr, cond, then_branch, else_branch } => Stmt::If {
                init: self.clone_opt(init, bindings),
                is_constexpr,
                cond: self.clone_subst(cond, bindings),
                then_branch: self.clone_subst(then_branch, bindings),
                else_branch: self.clone_opt(else_branch, bindings),
            },
            Stmt::For { init, cond, increment, body } => Stmt::For {
                init: self.clone_opt(init, bindings),
                cond: self.clone_opt(cond, bindings),
                increment: self.clone_opt(increment, bindings),
                body: self.clone_subst(body, bindings),
            },
            Stmt::While { cond, body } => Stmt::While {
                cond: self.clone_subst(cond, bindings),
                body: self.clone_subst(body, bindings),
            },
            Stmt::DoWhile { body, cond } => Stmt::DoWhile {
                body: self.clone_subst(body, bindings),
                cond: self.clone_subst(cond, bindings),
            },
            Stmt::RangedFor { binding, binding_kind, range, body } => Stmt::RangedFor {
                binding,
                binding_kind,
                range: self.clone_subst(range, bindings),
                body: self.clone_subst(body, bindings),
            },
            Stmt::Switch { scrutinee, cases, default } => Stmt::Switch {
                scrutinee: self.clone_subst(scrutinee, bindings),
                cases: cases
                    .into_iter()
                    .map(|c| CaseLabel {
                        value: self.clone_subst(c.value, bindings),
                        body: self.clone_many(&c.body, bindings),
                    })
                    .collect(),
                default: default.map(|d| self.clone_many(&d, bindings)),
            },
            Stmt::Try { body, handlers } => Stmt::Try {
                body: self.clone_subst(body, bindings),
                handlers: handlers
                    .into_iter()
                    .map(|h| CatchClause {
                        exception_type: self.subst_opt_type(&h.exception_type, bindings),
                        is_catch_all: h.is_catch_all,
                        binding_name: h.binding_name,
                        body: self.clone_subst(h.body, bindings),
                    })
                    .collect(),
            },
            Stmt::Throw(n) => Stmt::Throw(self.clone_opt(n, bindings)),
            Stmt::Return(n) => Stmt::Return(self.clone_opt(n, bindings)),
            Stmt::Break => Stmt::Break,
            Stmt::Continue => Stmt::Continue,
            Stmt::Goto(l) => Stmt::Goto(l),
            Stmt::Label(l, n) => Stmt::Label(l, self.clone_subst(n, bindings)),
            Stmt::StructuredBinding { bindings: b, initializer } => Stmt::StructuredBinding {
                bindings: b,
                initializer: self.clone_subst(initializer, bindings),
            },
            Stmt::Declaration(n) => Stmt::Declaration(self.clone_subst(n, bindings)),
        }
    }

    fn clone_subst_decl(&mut self, d: Decl, bindings: &[(StringHandle, Binding)]) -> Decl {
        match d {
            Decl::Function(f) => Decl::Function(FunctionDecl {
                name: f.name,
                kind: f.kind,
                params: f
                    .params
                    .into_iter()
                    .map(|p| Param {
                        name: p.name,
                        ty: self.subst_type(&p.ty, bindings),
                        default_value: self.clone_opt(p.default_value, bindings),
                    })
                    .collect(),
                return_type: self.subst_opt_type(&f.return_type, bindings),
                is_virtual: f.is_virtual,
                is_static: f.is_static,
                is_constexpr: f.is_constexpr,
                is_consteval: f.is_consteval,
                body: self.clone_opt(f.body, bindings),
                owning_struct: f.owning_struct,
            }),
            Decl::Variable(v) => Decl::Variable(VariableDecl {
                name: v.name,
                ty: self.subst_type(&v.ty, bindings),
                initializer: self.clone_opt(v.initializer, bindings),
                is_static: v.is_static,
                is_constexpr: v.is_constexpr,
                is_global: v.is_global,
            }),
            Decl::Struct(s) => Decl::Struct(StructDecl {
                name: s.name,
                type_index: s.type_index,
                bases: s.bases,
                members: self.clone_many(&s.members, bindings),
                is_union: s.is_union,
            }),
            Decl::Enum(e) => Decl::Enum(EnumDecl {
                name: e.name,
                type_index: e.type_index,
                is_scoped: e.is_scoped,
                enumerators: e
                    .enumerators
                    .into_iter()
                    .map(|(n, v)| (n, self.clone_opt(v, bindings)))
                    .collect(),
            }),
            Decl::Namespace(ns) => Decl::Namespace(novacc_ast::NamespaceDecl {
                name: ns.name,
                members: self.clone_many(&ns.members, bindings),
            }),
            Decl::TemplateFunction { params, body } => Decl::TemplateFunction {
                params,
                body: self.clone_subst(body, bindings),
            },
            Decl::TemplateVariable { params, body } => Decl::TemplateVariable {
                params,
                body: self.clone_subst(body, bindings),
            },
            Decl::TemplateStruct { params, body } => Decl::TemplateStruct {
                params,
                body: self.clone_subst(body, bindings),
            },
            Decl::Using { alias, target } => Decl::Using {
                alias,
                target: self.subst_type(&target, bindings),
            },
            Decl::StaticAssert { condition, message } => Decl::StaticAssert {
                condition: self.clone_subst(condition, bindings),
                message,
            },
        }
    }

    /// Re-inserts a freshly-cloned declaration's name into the symbol
    /// table, mirroring what ordinary declaration parsing does.
    fn reinsert_decl_symbol(&mut self, id: NodeId) {
        let name = match self.arena.borrow().get(id) {
            Node::Decl(Decl::Function(f)) => Some(f.name),
            Node::Decl(Decl::Variable(v)) => Some(v.name),
            Node::Decl(Decl::Struct(s)) => Some(s.name),
            Node::Decl(Decl::Enum(e)) => Some(e.name),
            _ => None,
        };
        if let Some(name) = name {
            self.session.symbols.borrow_mut().insert(name, id.0);
        }
    }
}

impl EvalHost for Parser<'_> {
    fn lookup_constant(&mut self, name: StringHandle) -> Option<EvalValue> {
        self.const_cache.get(&name).cloned()
    }

    fn resolve_function(&mut self, name: StringHandle) -> Option<NodeId> {
        self.session
            .symbols
            .borrow()
            .lookup_all(name)
            .and_then(|candidates| candidates.last())
            .map(|&h| NodeId(h))
    }

    fn pack_size(&self, pack: StringHandle) -> Option<usize> {
        self.pack_bindings.sizes.get(&pack).copied()
    }
}

impl<'a> Parser<'a> {
    /// Evaluates `node` as a constant expression, temporarily handing the
    /// arena's data to the evaluator (the arena's `RefCell` is drained via
    /// `mem::take` for the duration of the call, since `Parser` itself acts
    /// as the [`EvalHost`] and cannot be borrowed both as `&Arena` and
    /// `&mut dyn EvalHost` at once).
    pub fn eval_constant(&mut self, node: NodeId) -> std::result::Result<EvalValue, novacc_eval::EvalError> {
        let arena_owned: Arena = std::mem::take(&mut *self.arena.borrow_mut());
        let types = self.session.types.borrow();
        let result = {
            let mut ctx = novacc_eval::EvaluationContext::new(&arena_owned, &types, &self.session.interner, self);
            novacc_eval::eval(&mut ctx, node)
        };
        drop(types);
        *self.arena.borrow_mut() = arena_owned;
        result
    }

    /// Caches a constexpr variable's folded value for later `lookup_constant`
    /// calls, called right after parsing a `constexpr` variable declaration.
    pub fn cache_constexpr_value(&mut self, name: StringHandle, node: NodeId) {
        if let Ok(value) = self.eval_constant(node) {
            self.const_cache.insert(name, value);
        }
    }
}

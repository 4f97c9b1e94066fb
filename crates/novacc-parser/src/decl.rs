//! Declaration parsing: namespaces, `using`, `static_assert`, enums,
//! struct/class bodies (with member access control and `#pragma pack`
//! aware layout), and function/variable declarations (spec §4.3, §4.5).

use crate::error::Result;
use crate::{Parser, ParserError};
use novacc_ast::{
    Access, Decl, EnumDecl, FunctionDecl, FunctionKind, Node, NodeId, Param, StructDecl,
    VariableDecl,
};
use novacc_core::{
    symtab::ScopeKind, types::CvQualifier, Enumerator, LayoutError, MemberFunctionInfo,
    MemberFunctionKind, MemberInfo, PointerLevel, RefKind, StaticMemberInfo, StructTypeInfo, Type,
    TypeIndex, TypeInfo, TypeInfoPayload, TypeQualifier, TypeSpecifierNode,
};
use novacc_lexer::TokenKind;

impl<'a> Parser<'a> {
    fn alloc_decl(&mut self, decl: Decl) -> NodeId {
        let tok = self.source_token();
        self.arena.borrow_mut().alloc(Node::Decl(decl), tok)
    }

    pub fn parse_declaration(&mut self) -> Result<NodeId> {
        if self.peek_is("namespace") {
            return self.parse_namespace();
        }
        if self.peek_is("using") {
            return self.parse_using();
        }
        if self.peek_is("static_assert") {
            return self.parse_static_assert();
        }
        if self.peek_is("template") {
            return self.parse_template_declaration();
        }
        if self.peek_is("enum") {
            let (decl, _) = self.parse_enum_decl()?;
            self.expect_semicolon()?;
            return Ok(decl);
        }
        if self.peek_is("struct") || self.peek_is("class") || self.peek_is("union") {
            return self.parse_struct_or_forward_decl();
        }
        if self.peek_is("typedef") {
            return self.parse_typedef();
        }
        self.parse_function_or_variable()
    }

    fn parse_namespace(&mut self) -> Result<NodeId> {
        self.expect("namespace")?;
        let name = if self.peek_kind() == TokenKind::Identifier {
            Some(self.advance().text)
        } else {
            None
        };
        self.expect("{")?;
        self.push_scope(ScopeKind::Namespace);
        let mut members = Vec::new();
        while !self.peek_is("}") && !self.at_eof() {
            members.push(self.parse_declaration()?);
        }
        self.pop_scope();
        self.expect("}")?;
        Ok(self.alloc_decl(Decl::Namespace(novacc_ast::NamespaceDecl { name, members })))
    }

    fn parse_using(&mut self) -> Result<NodeId> {
        self.expect("using")?;
        if self.peek_is("namespace") {
            self.advance();
            let _ = self.parse_qualified_name()?;
            self.expect_semicolon()?;
            // Using-directives don't introduce a symbol of their own; the
            // parser re-resolves through ordinary scope lookup instead of
            // modelling a visible using-namespace set.
            return self.parse_declaration();
        }
        let alias = self.expect_identifier()?;
        self.expect("=")?;
        let target = self.parse_type_specifier()?;
        self.expect_semicolon()?;
        Ok(self.alloc_decl(Decl::Using { alias, target }))
    }

    fn parse_typedef(&mut self) -> Result<NodeId> {
        self.expect("typedef")?;
        let target = self.parse_type_specifier()?;
        let alias = self.expect_identifier()?;
        self.expect_semicolon()?;
        Ok(self.alloc_decl(Decl::Using { alias, target }))
    }

    fn parse_static_assert(&mut self) -> Result<NodeId> {
        let tok = self.source_token();
        self.expect("static_assert")?;
        self.expect("(")?;
        let condition = self.parse_assignment_expression()?;
        let message = if self.consume_if(",") {
            if self.peek_kind() == TokenKind::StringLiteral {
                Some(self.advance().text)
            } else {
                None
            }
        } else {
            None
        };
        self.expect(")")?;
        self.expect_semicolon()?;
        self.check_static_assert(condition, message, tok)?;
        Ok(self.alloc_decl(Decl::StaticAssert { condition, message }))
    }

    /// Evaluates a `static_assert` condition immediately, per spec §5's
    /// "declarations are processed in source order". A `TemplateDependent`
    /// (or otherwise inconclusive) evaluation is left unresolved rather
    /// than treated as failure — it is re-checked when template
    /// substitution produces a concrete copy of this declaration (see
    /// `templates.rs`'s member substitution, which clones `StaticAssert`
    /// nodes verbatim and re-parses/re-lowers the instantiated body).
    fn check_static_assert(
        &mut self,
        condition: NodeId,
        message: Option<novacc_core::StringHandle>,
        tok: novacc_ast::SourceToken,
    ) -> Result<()> {
        match self.eval_constant(condition) {
            Ok(value) => {
                if !value.as_bool().unwrap_or(true) {
                    let text = message
                        .map(|m| self.session.interner.view(m).to_string())
                        .unwrap_or_else(|| "static assertion failed".to_string());
                    return Err(ParserError::Semantic {
                        message: text,
                        line: tok.line,
                        column: tok.column,
                    });
                }
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }

    fn parse_qualified_name(&mut self) -> Result<Vec<novacc_core::StringHandle>> {
        let mut parts = vec![self.expect_identifier()?];
        while self.peek_is("::") {
            self.advance();
            parts.push(self.expect_identifier()?);
        }
        Ok(parts)
    }

    fn parse_enum_decl(&mut self) -> Result<(NodeId, TypeIndex)> {
        self.expect("enum")?;
        let is_scoped = self.consume_if("class") || self.consume_if("struct");
        let name = self.expect_identifier()?;
        let underlying = if self.consume_if(":") {
            self.parse_builtin_only()?
        } else {
            Type::Int
        };
        self.expect("{")?;
        let mut enumerators = Vec::new();
        let mut running_value: i64 = 0;
        let mut registry_enumerators = Vec::new();
        while !self.peek_is("}") {
            let ename = self.expect_identifier()?;
            let value_expr = if self.consume_if("=") {
                let e = self.parse_assignment_expression()?;
                if let Some(v) = self.try_fold_integer_literal(e) {
                    running_value = v;
                }
                Some(e)
            } else {
                None
            };
            enumerators.push((ename, value_expr));
            registry_enumerators.push(Enumerator {
                name: ename,
                value: running_value,
            });
            running_value += 1;
            if !self.consume_if(",") {
                break;
            }
        }
        self.expect("}")?;
        let type_index = self.session.types.borrow_mut().define(TypeInfo {
            name,
            kind: Type::Enum,
            size: underlying.builtin_size().unwrap_or(4),
            alignment: underlying.builtin_alignment().unwrap_or(4),
            payload: TypeInfoPayload::Enum(novacc_core::EnumTypeInfo {
                underlying,
                scoped: is_scoped,
                enumerators: registry_enumerators,
            }),
        });
        self.session.symbols.borrow_mut().insert(name, type_index.0);
        let decl = self.alloc_decl(Decl::Enum(EnumDecl {
            name,
            type_index,
            is_scoped,
            enumerators,
        }));
        Ok((decl, type_index))
    }

    fn parse_builtin_only(&mut self) -> Result<Type> {
        let spec = self.parse_type_specifier()?;
        Ok(spec.base)
    }

    /// Folds a just-parsed expression to an `i64` if it is a plain integer
    /// literal; used for enumerator values, which rarely need full
    /// constant-expression evaluation.
    fn try_fold_integer_literal(&self, node: NodeId) -> Option<i64> {
        match self.arena.borrow().get(node) {
            Node::Expr(novacc_ast::Expr::NumericLiteral {
                value: novacc_lexer::NumericValue::Integer(v),
                ..
            }) => Some(*v as i64),
            _ => None,
        }
    }

    fn parse_struct_or_forward_decl(&mut self) -> Result<NodeId> {
        let is_union = self.peek_is("union");
        self.advance(); // struct/class/union
        let name = self.expect_identifier()?;
        if self.consume_if(";") {
            let type_index = self.session.types.borrow_mut().declare_struct(name);
            self.session.symbols.borrow_mut().insert(name, type_index.0);
            return Ok(self.alloc_decl(Decl::Struct(StructDecl {
                name,
                type_index,
                bases: Vec::new(),
                members: Vec::new(),
                is_union,
            })));
        }
        self.finish_struct_decl(name, is_union)
    }

    fn parse_base_list(&mut self) -> Result<Vec<(novacc_core::StringHandle, Access)>> {
        let mut bases = Vec::new();
        if self.consume_if(":") {
            loop {
                let access = if self.consume_if("public") {
                    Access::Public
                } else if self.consume_if("protected") {
                    Access::Protected
                } else if self.consume_if("private") {
                    Access::Private
                } else {
                    Access::Private
                };
                let base_name = self.expect_identifier()?;
                bases.push((base_name, access));
                if !self.consume_if(",") {
                    break;
                }
            }
        }
        Ok(bases)
    }

    /// Parses the body of a struct/class and computes its layout eagerly
    /// (spec §3.3), honouring the active `#pragma pack` alignment.
    fn finish_struct_decl(&mut self, name: novacc_core::StringHandle, is_union: bool) -> Result<NodeId> {
        let type_index = self.session.types.borrow_mut().declare_struct(name);
        self.session.symbols.borrow_mut().insert(name, type_index.0);
        let bases = self.parse_base_list()?;
        self.expect("{")?;
        self.push_scope(ScopeKind::Class);

        let mut members = Vec::new();
        let mut layout = StructTypeInfo::default();
        let pack_alignment = self.context().current_pack();
        layout.pack_alignment = pack_alignment;
        let mut offset: u32 = 0;
        let mut max_align: u32 = 1;
        let mut current_access = if self.peek_is("class") { Access::Private } else { Access::Public };
        // Base subobjects are placed first, in declaration order.
        for (base_name, access) in &bases {
            if let Some(candidates) = self.session.symbols.borrow().lookup_all(*base_name) {
                if let Some(&handle) = candidates.first() {
                    let base_index = TypeIndex(handle);
                    let base_info = self.session.types.borrow().get(base_index).clone();
                    let align = base_info.alignment.max(1);
                    offset = align_up(offset, align);
                    layout.bases.push(novacc_core::BaseClassInfo {
                        type_index: base_index,
                        offset,
                        access: *access,
                        is_virtual: false,
                    });
                    offset += base_info.size;
                    max_align = max_align.max(align);
                }
            }
        }

        loop {
            if self.peek_is("}") || self.at_eof() {
                break;
            }
            if self.consume_if("public") {
                self.expect(":")?;
                current_access = Access::Public;
                continue;
            }
            if self.consume_if("protected") {
                self.expect(":")?;
                current_access = Access::Protected;
                continue;
            }
            if self.consume_if("private") {
                self.expect(":")?;
                current_access = Access::Private;
                continue;
            }
            if self.peek_is(";") {
                self.advance();
                continue;
            }
            let (member_node, member_info, static_info, func_info) =
                self.parse_class_member(name, type_index, current_access)?;
            if let Some(mut info) = member_info {
                let align = type_natural_alignment(&info.ty, &self.session.types.borrow());
                if is_union {
                    info.offset = 0;
                    max_align = max_align.max(align);
                    layout.total_size = layout.total_size.max(info.size);
                } else {
                    let effective_align = pack_alignment.map(|p| align.min(p)).unwrap_or(align);
                    offset = align_up(offset, effective_align.max(1));
                    info.offset = offset;
                    offset += info.size;
                    max_align = max_align.max(effective_align.max(1));
                }
                layout.members.push(info);
            }
            if let Some(info) = static_info {
                layout.static_members.push(info);
            }
            if let Some(info) = func_info {
                if info.kind == MemberFunctionKind::Virtual {
                    layout.has_vtable = true;
                }
                layout.member_functions.push(info);
            }
            members.push(member_node);
        }
        self.pop_scope();
        self.expect("}")?;
        self.expect_semicolon()?;

        if !is_union {
            layout.total_size = align_up(offset, max_align.max(1));
        }
        layout.alignment = max_align.max(1);
        if layout.total_size == 0 {
            layout.total_size = layout.alignment;
        }

        match self.session.types.borrow_mut().finish_struct_layout(type_index, layout) {
            Ok(()) => {}
            Err(LayoutError::OverlappingMembers { .. }) | Err(LayoutError::ZeroAlignment) | Err(LayoutError::SizeNotAlignmentMultiple { .. }) => {
                return Err(ParserError::Semantic {
                    message: format!("struct `{}` has an invalid layout", self.session.interner.view(name)),
                    line: self.current_line(),
                    column: self.current_column(),
                });
            }
        }

        let decl = self.alloc_decl(Decl::Struct(StructDecl {
            name,
            type_index,
            bases,
            members: members.clone(),
            is_union,
        }));
        self.arena.borrow_mut().set_struct_members(decl, members);
        Ok(decl)
    }

    fn current_line(&self) -> u32 {
        self.peek().line
    }

    fn current_column(&self) -> u32 {
        self.peek().column
    }

    #[allow(clippy::type_complexity)]
    fn parse_class_member(
        &mut self,
        owner_name: novacc_core::StringHandle,
        owner_index: TypeIndex,
        access: Access,
    ) -> Result<(NodeId, Option<MemberInfo>, Option<StaticMemberInfo>, Option<MemberFunctionInfo>)> {
        let is_static = self.consume_if("static");
        let is_virtual = self.consume_if("virtual");
        let is_constexpr = self.consume_if("constexpr");
        let is_consteval = self.consume_if("consteval");
        let _is_explicit = self.consume_if("explicit");
        let _is_inline = self.consume_if("inline");
        let _is_friend = self.consume_if("friend");

        let owner_text = self.session.interner.view(owner_name).to_string();

        // Destructor: `~Name() { ... }`
        if self.peek_is("~") {
            self.advance();
            self.expect_identifier()?;
            self.expect("(")?;
            self.expect(")")?;
            let is_override = self.consume_if("override");
            let _ = is_override;
            let body = if self.peek_is("{") {
                Some(self.parse_block()?)
            } else {
                self.expect_semicolon()?;
                None
            };
            let name = self.session.interner.intern(&format!("~{owner_text}"));
            let func = FunctionDecl {
                name,
                kind: FunctionKind::Destructor,
                params: Vec::new(),
                return_type: None,
                is_virtual,
                is_static: false,
                is_constexpr,
                is_consteval,
                body,
                owning_struct: Some(owner_index),
            };
            let node = self.alloc_decl(Decl::Function(func));
            self.session.symbols.borrow_mut().insert(name, node.0);
            let info = MemberFunctionInfo {
                name,
                kind: if is_virtual { MemberFunctionKind::Virtual } else { MemberFunctionKind::Destructor },
                ast_node: node.0,
                vtable_slot: None,
                access,
            };
            return Ok((node, None, None, Some(info)));
        }

        // Constructor: `Name(params) { ... }` — the identifier matches the
        // owning class name and is immediately followed by `(`.
        if self.peek_kind() == TokenKind::Identifier && self.peek_text() == owner_text {
            let checkpoint = self.checkpoint();
            self.advance();
            if self.peek_is("(") {
                self.advance();
                let params = self.parse_parameter_list()?;
                self.expect(")")?;
                if self.consume_if(":") {
                    // Member-initializer list: parsed for side effects only
                    // (constant folding of member inits happens at codegen
                    // time from the declared member defaults instead).
                    loop {
                        self.expect_identifier()?;
                        self.expect("(")?;
                        let _ = self.parse_argument_list()?;
                        self.expect(")")?;
                        if !self.consume_if(",") {
                            break;
                        }
                    }
                }
                let body = if self.peek_is("{") {
                    Some(self.parse_block()?)
                } else {
                    self.expect_semicolon()?;
                    None
                };
                let name = self.session.interner.intern(&owner_text);
                let func = FunctionDecl {
                    name,
                    kind: FunctionKind::Constructor,
                    params,
                    return_type: None,
                    is_virtual: false,
                    is_static: false,
                    is_constexpr,
                    is_consteval,
                    body,
                    owning_struct: Some(owner_index),
                };
                let node = self.alloc_decl(Decl::Function(func));
                self.session.symbols.borrow_mut().insert(name, node.0);
                let info = MemberFunctionInfo {
                    name,
                    kind: MemberFunctionKind::Constructor,
                    ast_node: node.0,
                    vtable_slot: None,
                    access,
                };
                return Ok((node, None, None, Some(info)));
            }
            self.restore(checkpoint);
        }

        let ty = self.parse_type_specifier()?;
        let name = self.expect_identifier()?;

        if self.peek_is("(") {
            self.advance();
            let params = self.parse_parameter_list()?;
            self.expect(")")?;
            let _is_const_method = self.consume_if("const");
            let _is_override = self.consume_if("override");
            let is_pure = if self.consume_if("=") {
                if self.consume_if("default") || self.consume_if("delete") {
                    false
                } else {
                    self.expect("0")?;
                    true
                }
            } else {
                false
            };
            let body = if !is_pure && self.peek_is("{") {
                Some(self.parse_block()?)
            } else {
                self.expect_semicolon()?;
                None
            };
            let func = FunctionDecl {
                name,
                kind: FunctionKind::Regular,
                params,
                return_type: Some(ty),
                is_virtual,
                is_static,
                is_constexpr,
                is_consteval,
                body,
                owning_struct: Some(owner_index),
            };
            let node = self.alloc_decl(Decl::Function(func));
            self.session.symbols.borrow_mut().insert(name, node.0);
            let info = MemberFunctionInfo {
                name,
                kind: if is_virtual { MemberFunctionKind::Virtual } else { MemberFunctionKind::Regular },
                ast_node: node.0,
                vtable_slot: None,
                access,
            };
            return Ok((node, None, None, Some(info)));
        }

        let array_ty = self.parse_trailing_array_dims(ty)?;
        let initializer = if self.consume_if("=") {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };
        self.expect_semicolon()?;
        let size = novacc_core::types::sizeof_type_spec(&array_ty, &self.session.types.borrow()).unwrap_or(0) as u32;
        let var = VariableDecl {
            name,
            ty: array_ty.clone(),
            initializer,
            is_static,
            is_constexpr,
            is_global: false,
        };
        let node = self.alloc_decl(Decl::Variable(var));
        self.session.symbols.borrow_mut().insert(name, node.0);
        if is_constexpr {
            if let Some(init) = initializer {
                self.cache_constexpr_value(name, init);
            }
        }
        if is_static {
            let static_info = StaticMemberInfo {
                name,
                ty: array_ty,
                access,
                constexpr_initializer: initializer.map(|n| n.0),
            };
            return Ok((node, None, Some(static_info), None));
        }
        let member_info = MemberInfo {
            name,
            ty: array_ty,
            offset: 0,
            size: size.max(1),
            access,
            default_initializer: initializer.map(|n| n.0),
            is_reference: false,
        };
        Ok((node, Some(member_info), None, None))
    }

    pub fn parse_parameter_list(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        if self.peek_is(")") {
            return Ok(params);
        }
        loop {
            if self.peek_is("...") {
                self.advance();
                break;
            }
            let ty = self.parse_type_specifier()?;
            let name = if self.peek_kind() == TokenKind::Identifier {
                self.advance().text
            } else {
                self.session.interner.intern("")
            };
            let default_value = if self.consume_if("=") {
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            params.push(Param { name, ty, default_value });
            if !self.consume_if(",") {
                break;
            }
        }
        Ok(params)
    }

    pub(crate) fn parse_function_or_variable(&mut self) -> Result<NodeId> {
        let is_static = self.consume_if("static");
        let is_constexpr = self.consume_if("constexpr");
        let is_consteval = self.consume_if("consteval");
        let _is_extern = self.consume_if("extern");
        let _is_inline = self.consume_if("inline");

        let ty = self.parse_type_specifier()?;
        let name = self.expect_identifier()?;

        if self.peek_is("(") {
            self.advance();
            self.push_scope(ScopeKind::Function);
            let params = self.parse_parameter_list()?;
            self.expect(")")?;
            for p in &params {
                self.session.symbols.borrow_mut().insert(p.name, 0);
            }
            let body = if self.peek_is("{") {
                Some(self.parse_function_body()?)
            } else {
                self.expect_semicolon()?;
                None
            };
            self.pop_scope();
            let func = FunctionDecl {
                name,
                kind: FunctionKind::Regular,
                params,
                return_type: Some(ty),
                is_virtual: false,
                is_static,
                is_constexpr,
                is_consteval,
                body,
                owning_struct: None,
            };
            let node = self.alloc_decl(Decl::Function(func));
            let existing = self.session.symbols.borrow_mut().insert(name, node.0).to_vec();
            if existing.len() > 1 {
                tracing::debug!(name = %self.session.interner.view(name), "overload set grew");
            }
            return Ok(node);
        }

        let array_ty = self.parse_trailing_array_dims(ty)?;
        let initializer = if self.consume_if("=") {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };
        self.expect_semicolon()?;
        let var = VariableDecl {
            name,
            ty: array_ty,
            initializer,
            is_static,
            is_constexpr,
            is_global: self.session.symbols.borrow().current_kind() == ScopeKind::Global,
        };
        let node = self.alloc_decl(Decl::Variable(var));
        self.session.symbols.borrow_mut().insert(name, node.0);
        if is_constexpr {
            if let Some(init) = initializer {
                self.cache_constexpr_value(name, init);
            }
        }
        Ok(node)
    }

    /// Parses a function body and late-binds it onto the freshly allocated
    /// declaration via a reserved placeholder (the declaration itself is
    /// allocated by the caller after the body, so the body subtree's
    /// `NodeId`s are always lower than the function's own id).
    fn parse_function_body(&mut self) -> Result<NodeId> {
        self.parse_block()
    }

    fn parse_trailing_array_dims(&mut self, mut ty: TypeSpecifierNode) -> Result<TypeSpecifierNode> {
        while self.consume_if("[") {
            if self.peek_is("]") {
                ty.array_dims.push(None);
            } else {
                let dim_expr = self.parse_assignment_expression()?;
                ty.array_dims.push(self.try_fold_integer_literal(dim_expr).map(|v| v as u64));
            }
            self.expect("]")?;
        }
        Ok(ty)
    }

    pub fn lookup_type_index(&self, name: novacc_core::StringHandle) -> Option<TypeIndex> {
        self.session
            .symbols
            .borrow()
            .lookup_all(name)
            .and_then(|candidates| candidates.first())
            .map(|&h| TypeIndex(h))
    }

    pub fn parse_type_specifier(&mut self) -> Result<TypeSpecifierNode> {
        let mut cv = CvQualifier::default();
        loop {
            if self.consume_if("const") {
                cv.is_const = true;
            } else if self.consume_if("volatile") {
                cv.is_volatile = true;
            } else {
                break;
            }
        }

        let mut qualifier = TypeQualifier::None;
        let mut long_count: u32 = 0;
        let mut short_seen = false;
        let mut explicit_base: Option<Type> = None;
        let mut type_index: Option<TypeIndex> = None;
        let mut template_param_name: Option<novacc_core::StringHandle> = None;

        loop {
            match self.peek_text().as_str() {
                "signed" => {
                    qualifier = TypeQualifier::Signed;
                    self.advance();
                }
                "unsigned" => {
                    qualifier = TypeQualifier::Unsigned;
                    self.advance();
                }
                "long" => {
                    long_count += 1;
                    self.advance();
                }
                "short" => {
                    short_seen = true;
                    self.advance();
                }
                "const" => {
                    cv.is_const = true;
                    self.advance();
                }
                "volatile" => {
                    cv.is_volatile = true;
                    self.advance();
                }
                _ => break,
            }
        }

        if explicit_base.is_none() && long_count == 0 && !short_seen {
            match self.peek_text().as_str() {
                "void" => {
                    self.advance();
                    explicit_base = Some(Type::Void);
                }
                "bool" => {
                    self.advance();
                    explicit_base = Some(Type::Bool);
                }
                "char" => {
                    self.advance();
                    explicit_base = Some(Type::Char);
                }
                "char8_t" | "char16_t" | "char32_t" | "wchar_t" => {
                    self.advance();
                    explicit_base = Some(Type::UnsignedInt);
                }
                "int" => {
                    self.advance();
                    explicit_base = Some(Type::Int);
                }
                "float" => {
                    self.advance();
                    explicit_base = Some(Type::Float);
                }
                "double" => {
                    self.advance();
                    explicit_base = Some(Type::Double);
                }
                "auto" => {
                    self.advance();
                    explicit_base = Some(Type::Auto);
                }
                "struct" | "class" => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    type_index = self.lookup_type_index(name);
                    if type_index.is_none() {
                        type_index = Some(self.session.types.borrow_mut().declare_struct(name));
                    }
                    explicit_base = Some(Type::Struct);
                }
                "enum" => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    type_index = self.lookup_type_index(name);
                    explicit_base = Some(Type::Enum);
                }
                _ if self.peek_kind() == TokenKind::Identifier => {
                    let name = self.advance().text;
                    if self.peek_is("<") && self.template_decls.contains_key(&name) {
                        if let Ok((args, bindings)) = self.speculate(|p| p.parse_template_arguments()) {
                            let specialisation = self.instantiate(name, args, bindings)?;
                            type_index = match self.arena.borrow().get(specialisation) {
                                Node::Decl(Decl::Struct(s)) => Some(s.type_index),
                                _ => None,
                            };
                        }
                    }
                    if type_index.is_none() {
                        type_index = self.lookup_type_index(name);
                    }
                    if type_index.is_none()
                        && self.active_template_params.iter().any(|(n, _)| *n == name)
                    {
                        template_param_name = Some(name);
                    }
                    explicit_base = Some(Type::UserDefined);
                }
                _ => {}
            }
        } else if explicit_base.is_none() {
            // `int` is implicit after bare `long`/`short`/`signed`/`unsigned`.
            if self.peek_is("int") {
                self.advance();
            }
            explicit_base = Some(match (long_count, short_seen) {
                (0, true) => Type::Short,
                (1, false) => Type::Long,
                (n, false) if n >= 2 => Type::LongLong,
                _ => Type::Int,
            });
            if self.peek_is("double") {
                self.advance();
                explicit_base = Some(Type::LongDouble);
            }
        }

        let mut base = explicit_base.unwrap_or(Type::Int);
        base = apply_signedness(base, qualifier);

        let mut pointer_levels = Vec::new();
        while self.consume_if("*") {
            let mut pcv = CvQualifier::default();
            loop {
                if self.consume_if("const") {
                    pcv.is_const = true;
                } else if self.consume_if("volatile") {
                    pcv.is_volatile = true;
                } else {
                    break;
                }
            }
            pointer_levels.push(PointerLevel { cv: pcv });
        }

        let ref_kind = if self.consume_if("&&") {
            RefKind::RValue
        } else if self.consume_if("&") {
            RefKind::LValue
        } else {
            RefKind::None
        };

        let mut array_dims = Vec::new();
        while self.peek_is("[") {
            self.advance();
            if self.peek_is("]") {
                array_dims.push(None);
            } else {
                let dim_expr = self.parse_assignment_expression()?;
                array_dims.push(self.try_fold_integer_literal(dim_expr).map(|v| v as u64));
            }
            self.expect("]")?;
        }

        let size_in_bits = type_index
            .map(|idx| self.session.types.borrow().get(idx).size * 8)
            .or_else(|| base.builtin_size().map(|s| s * 8))
            .unwrap_or(0);

        Ok(TypeSpecifierNode {
            base,
            qualifier,
            size_in_bits,
            pointer_levels,
            ref_kind,
            referent_cv: cv,
            array_dims,
            type_index,
            template_param_name,
        })
    }

    pub(crate) fn is_builtin_type_keyword(&self) -> bool {
        matches!(
            self.peek_text().as_str(),
            "void" | "bool" | "char" | "int" | "float" | "double" | "short" | "long" | "signed"
                | "unsigned" | "auto" | "const" | "struct" | "class" | "enum"
        )
    }
}

fn align_up(offset: u32, align: u32) -> u32 {
    if align <= 1 {
        return offset;
    }
    (offset + align - 1) / align * align
}

fn apply_signedness(base: Type, qualifier: TypeQualifier) -> Type {
    match (base, qualifier) {
        (Type::Char, TypeQualifier::Signed) => Type::SignedChar,
        (Type::Char, TypeQualifier::Unsigned) => Type::UnsignedChar,
        (Type::Int, TypeQualifier::Unsigned) => Type::UnsignedInt,
        (Type::Short, TypeQualifier::Unsigned) => Type::UnsignedShort,
        (Type::Long, TypeQualifier::Unsigned) => Type::UnsignedLong,
        (Type::LongLong, TypeQualifier::Unsigned) => Type::UnsignedLongLong,
        (other, _) => other,
    }
}

fn type_natural_alignment(ty: &TypeSpecifierNode, registry: &novacc_core::TypeRegistry) -> u32 {
    novacc_core::types::alignof_type_spec(ty, registry).unwrap_or(1) as u32
}

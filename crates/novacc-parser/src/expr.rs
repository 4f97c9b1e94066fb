//! Expression parsing: precedence-climbing recursive descent over the ~25
//! expression node kinds in spec §3.4.

use crate::error::Result;
use crate::Parser;
use novacc_ast::{BinaryOp, CaptureMode, CastKind, Expr, Node, NodeId, TypeTrait, UnaryOp};
use novacc_lexer::TokenKind;

impl<'a> Parser<'a> {
    fn alloc_expr(&mut self, expr: Expr) -> NodeId {
        let tok = self.source_token();
        self.arena.borrow_mut().alloc(Node::Expr(expr), tok)
    }

    /// Full expression, including the comma operator (used at statement
    /// level and inside parentheses, never inside call-argument lists).
    pub fn parse_expression(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_assignment_expression()?;
        while self.consume_if(",") {
            let rhs = self.parse_assignment_expression()?;
            lhs = self.alloc_expr(Expr::BinaryOperator {
                op: BinaryOp::Comma,
                lhs,
                rhs,
            });
        }
        Ok(lhs)
    }

    pub fn parse_assignment_expression(&mut self) -> Result<NodeId> {
        let lhs = self.parse_ternary()?;
        let op = match self.peek_text().as_str() {
            "=" => Some(BinaryOp::Assign),
            "+=" => Some(BinaryOp::AddAssign),
            "-=" => Some(BinaryOp::SubAssign),
            "*=" => Some(BinaryOp::MulAssign),
            "/=" => Some(BinaryOp::DivAssign),
            "%=" => Some(BinaryOp::ModAssign),
            "<<=" => Some(BinaryOp::ShlAssign),
            ">>=" => Some(BinaryOp::ShrAssign),
            "&=" => Some(BinaryOp::AndAssign),
            "|=" => Some(BinaryOp::OrAssign),
            "^=" => Some(BinaryOp::XorAssign),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_assignment_expression()?;
            return Ok(self.alloc_expr(Expr::BinaryOperator { op, lhs, rhs }));
        }
        Ok(lhs)
    }

    fn parse_ternary(&mut self) -> Result<NodeId> {
        let cond = self.parse_logical_or()?;
        if self.consume_if("?") {
            let then_value = self.parse_assignment_expression()?;
            self.expect(":")?;
            let else_value = self.parse_assignment_expression()?;
            return Ok(self.alloc_expr(Expr::TernaryOperator {
                cond,
                then_value,
                else_value,
            }));
        }
        Ok(cond)
    }

    fn parse_logical_or(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_logical_and()?;
        while self.peek_is("||") || self.peek_is("or") {
            self.advance();
            let rhs = self.parse_logical_and()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op: BinaryOp::LogOr, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_bit_or()?;
        while self.peek_is("&&") || self.peek_is("and") {
            self.advance();
            let rhs = self.parse_bit_or()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op: BinaryOp::LogAnd, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_bit_xor()?;
        while self.peek_is("|") {
            self.advance();
            let rhs = self.parse_bit_xor()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op: BinaryOp::BitOr, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_bit_and()?;
        while self.peek_is("^") {
            self.advance();
            let rhs = self.parse_bit_and()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op: BinaryOp::BitXor, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_equality()?;
        while self.peek_is("&") {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op: BinaryOp::BitAnd, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek_text().as_str() {
                "==" => BinaryOp::Eq,
                "!=" => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = match self.peek_text().as_str() {
                "<" => BinaryOp::Lt,
                ">" => BinaryOp::Gt,
                "<=" => BinaryOp::Le,
                ">=" => BinaryOp::Ge,
                "<=>" => BinaryOp::Spaceship,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_shift()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_text().as_str() {
                "<<" => BinaryOp::Shl,
                ">>" => BinaryOp::Shr,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_text().as_str() {
                "+" => BinaryOp::Add,
                "-" => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<NodeId> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_text().as_str() {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                "%" => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = self.alloc_expr(Expr::BinaryOperator { op, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<NodeId> {
        let op = match self.peek_text().as_str() {
            "-" => Some(UnaryOp::Neg),
            "+" => Some(UnaryOp::Plus),
            "!" | "not" => Some(UnaryOp::Not),
            "~" | "compl" => Some(UnaryOp::BitNot),
            "++" => Some(UnaryOp::PreInc),
            "--" => Some(UnaryOp::PreDec),
            "*" => Some(UnaryOp::Deref),
            "&" => Some(UnaryOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(self.alloc_expr(Expr::UnaryOperator { op, operand }));
        }
        if self.peek_is("sizeof") {
            return self.parse_sizeof();
        }
        if self.peek_is("alignof") || self.peek_is("__alignof") {
            self.advance();
            self.expect("(")?;
            let ty = self.parse_type_specifier()?;
            self.expect(")")?;
            return Ok(self.alloc_expr(Expr::AlignofType(ty)));
        }
        if self.peek_is("static_cast")
            || self.peek_is("reinterpret_cast")
            || self.peek_is("const_cast")
        {
            return self.parse_named_cast();
        }
        if self.peek_is("dynamic_cast") {
            self.advance();
            self.expect("<")?;
            let target = self.parse_type_specifier()?;
            self.expect(">")?;
            self.expect("(")?;
            let operand = self.parse_expression()?;
            self.expect(")")?;
            return Ok(self.alloc_expr(Expr::DynamicCast { target, operand }));
        }
        if self.peek_is("new") {
            return self.parse_new();
        }
        if self.peek_is("delete") {
            self.advance();
            let is_array = if self.peek_is("[") {
                self.advance();
                self.expect("]")?;
                true
            } else {
                false
            };
            let operand = self.parse_unary()?;
            return Ok(self.alloc_expr(Expr::Delete { operand, is_array }));
        }
        if self.is_type_trait_keyword() {
            return self.parse_type_trait();
        }
        if self.peek_is("(") {
            if let Ok(node) = self.speculate(|p| p.try_parse_c_style_cast()) {
                return Ok(node);
            }
        }
        self.parse_postfix()
    }

    /// `(Type) expr`, disambiguated from a parenthesised sub-expression by
    /// requiring the parenthesised content to parse as a type-id and the
    /// following token to plausibly start a unary-expression.
    fn try_parse_c_style_cast(&mut self) -> Result<NodeId> {
        self.expect("(")?;
        let target = self.parse_type_specifier()?;
        self.expect(")")?;
        match self.peek_kind() {
            TokenKind::Identifier | TokenKind::Literal | TokenKind::StringLiteral => {}
            _ if self.peek_is("(") || self.peek_is("-") || self.peek_is("+") || self.peek_is("*")
                || self.peek_is("&") || self.peek_is("!") || self.peek_is("~") =>
            {}
            _ => return Err(self.err_here("a cast operand")),
        }
        let operand = self.parse_unary()?;
        Ok(self.alloc_expr(Expr::Cast {
            kind: CastKind::CStyle,
            target,
            operand,
        }))
    }

    fn parse_sizeof(&mut self) -> Result<NodeId> {
        self.advance(); // `sizeof`
        if self.consume_if("...") {
            self.expect("(")?;
            let name = self.expect_identifier()?;
            self.expect(")")?;
            return Ok(self.alloc_expr(Expr::SizeofPack(name)));
        }
        // `sizeof(type)` vs `sizeof expr`: speculatively try a parenthesised
        // type-id first, since a bare type name and an identifier
        // expression are lexically indistinguishable at this point (spec
        // §4.3 relies on symbol-table lookup for this disambiguation;
        // here we try type-parsing first and fall back to an expression).
        if self.peek_is("(") {
            let checkpoint = self.checkpoint();
            let as_type = (|parser: &mut Self| -> Result<NodeId> {
                parser.expect("(")?;
                let ty = parser.parse_type_specifier()?;
                parser.expect(")")?;
                Ok(parser.alloc_expr(Expr::SizeofType(ty)))
            })(self);
            match as_type {
                Ok(node) => return Ok(node),
                Err(_) => self.restore(checkpoint),
            }
        }
        let operand = self.parse_unary()?;
        Ok(self.alloc_expr(Expr::SizeofExpr(operand)))
    }

    fn parse_named_cast(&mut self) -> Result<NodeId> {
        let kind = match self.peek_text().as_str() {
            "static_cast" => CastKind::Static,
            "reinterpret_cast" => CastKind::Reinterpret,
            "const_cast" => CastKind::Const,
            _ => unreachable!(),
        };
        self.advance();
        self.expect("<")?;
        let target = self.parse_type_specifier()?;
        self.expect(">")?;
        self.expect("(")?;
        let operand = self.parse_expression()?;
        self.expect(")")?;
        Ok(self.alloc_expr(Expr::Cast { kind, target, operand }))
    }

    fn parse_new(&mut self) -> Result<NodeId> {
        self.advance(); // `new`
        let placement = if self.peek_is("(") {
            let checkpoint = self.checkpoint();
            self.advance();
            match self.parse_expression() {
                Ok(e) if self.peek_is(")") => {
                    self.advance();
                    Some(e)
                }
                _ => {
                    self.restore(checkpoint);
                    None
                }
            }
        } else {
            None
        };
        let target = self.parse_type_specifier()?;
        let array_size = if self.consume_if("[") {
            let size = self.parse_expression()?;
            self.expect("]")?;
            Some(size)
        } else {
            None
        };
        let args = if self.consume_if("(") {
            let args = self.parse_argument_list()?;
            self.expect(")")?;
            args
        } else {
            Vec::new()
        };
        Ok(self.alloc_expr(Expr::New {
            target,
            array_size,
            placement,
            args,
        }))
    }

    fn is_type_trait_keyword(&self) -> bool {
        self.peek_text().starts_with("__is_")
    }

    fn parse_type_trait(&mut self) -> Result<NodeId> {
        let name = self.peek_text();
        let trait_kind = match name.as_str() {
            "__is_void" => TypeTrait::IsVoid,
            "__is_constant_evaluated" => TypeTrait::IsConstantEvaluated,
            "__is_complete_or_unbounded" => TypeTrait::IsCompleteOrUnbounded,
            "__is_class" => TypeTrait::IsClass,
            "__is_enum" => TypeTrait::IsEnum,
            "__is_pointer" => TypeTrait::IsPointer,
            "__is_reference" => TypeTrait::IsReference,
            "__is_trivially_copyable" => TypeTrait::IsTriviallyCopyable,
            "__is_standard_layout" => TypeTrait::IsStandardLayout,
            "__is_polymorphic" => TypeTrait::IsPolymorphic,
            "__is_abstract" => TypeTrait::IsAbstract,
            _ => TypeTrait::IsVoid,
        };
        self.advance();
        self.expect("(")?;
        let operand = self.parse_type_specifier()?;
        self.expect(")")?;
        Ok(self.alloc_expr(Expr::TypeTraitExpr { trait_kind, operand }))
    }

    fn parse_postfix(&mut self) -> Result<NodeId> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.consume_if("(") {
                let args = self.parse_argument_list()?;
                self.expect(")")?;
                expr = self.alloc_expr(Expr::FunctionCall { callee: expr, args });
            } else if self.consume_if("[") {
                let index = self.parse_expression()?;
                self.expect("]")?;
                expr = self.alloc_expr(Expr::ArraySubscript { array: expr, index });
            } else if self.peek_is(".") || self.peek_is("->") {
                let is_arrow = self.peek_is("->");
                self.advance();
                let member = self.expect_identifier()?;
                if self.peek_is("(") {
                    self.advance();
                    let args = self.parse_argument_list()?;
                    self.expect(")")?;
                    expr = self.alloc_expr(Expr::MemberFunctionCall {
                        object: expr,
                        method: member,
                        args,
                        is_arrow,
                    });
                } else {
                    expr = self.alloc_expr(Expr::MemberAccess {
                        object: expr,
                        member,
                        is_arrow,
                    });
                }
            } else if self.peek_is("++") {
                self.advance();
                expr = self.alloc_expr(Expr::UnaryOperator {
                    op: UnaryOp::PostInc,
                    operand: expr,
                });
            } else if self.peek_is("--") {
                self.advance();
                expr = self.alloc_expr(Expr::UnaryOperator {
                    op: UnaryOp::PostDec,
                    operand: expr,
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    pub fn parse_argument_list(&mut self) -> Result<Vec<NodeId>> {
        let mut args = Vec::new();
        if self.peek_is(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_assignment_expression()?);
            if !self.consume_if(",") {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<NodeId> {
        if self.peek_is("(") {
            self.advance();
            let inner = self.parse_expression()?;
            self.expect(")")?;
            return Ok(inner);
        }
        if self.peek_is("[") {
            return self.parse_lambda();
        }
        if self.peek_is("{") {
            return self.parse_initializer_list();
        }
        if self.peek_is("typeid") {
            self.advance();
            self.expect("(")?;
            let operand = self.parse_expression()?;
            self.expect(")")?;
            return Ok(self.alloc_expr(Expr::Typeid(operand)));
        }
        if self.peek_is("true") {
            self.advance();
            return Ok(self.alloc_expr(Expr::BoolLiteral(true)));
        }
        if self.peek_is("false") {
            self.advance();
            return Ok(self.alloc_expr(Expr::BoolLiteral(false)));
        }
        match self.peek_kind() {
            TokenKind::Literal => {
                let tok = self.advance();
                Ok(self.alloc_expr(Expr::NumericLiteral {
                    value: tok.numeric_value.expect("literal token carries a value"),
                    kind: tok.numeric_kind.expect("literal token carries a kind"),
                }))
            }
            TokenKind::StringLiteral => {
                let tok = self.advance();
                Ok(self.alloc_expr(Expr::StringLiteral(tok.text)))
            }
            TokenKind::Identifier | TokenKind::Keyword => self.parse_identifier_expr(),
            _ => Err(self.err_here("an expression")),
        }
    }

    fn parse_identifier_expr(&mut self) -> Result<NodeId> {
        let mut qualifiers = Vec::new();
        let mut name = self.expect_identifier()?;
        while self.peek_is("::") {
            self.advance();
            qualifiers.push(name);
            name = self.expect_identifier()?;
        }
        // Template-id: `Name<Args>` used as a value expression (e.g.
        // `S<int>::v`) is only attempted when `name` is a known template, so
        // an ordinary `<` comparison never gets mistaken for one.
        if self.peek_is("<") && self.template_decls.contains_key(&name) {
            if let Ok((args, type_bindings)) = self.speculate(|p| p.parse_template_arguments()) {
                if self.consume_if("::") {
                    let member = self.expect_identifier()?;
                    let specialisation = self.instantiate(name, args, type_bindings)?;
                    if let Some(value) = self.lookup_instantiated_constant(specialisation, member) {
                        self.const_cache.insert(member, value);
                    }
                    qualifiers.push(name);
                    return Ok(self.alloc_expr(Expr::QualifiedIdentifier { qualifiers, name: member }));
                }
            }
        }
        if !qualifiers.is_empty() {
            return Ok(self.alloc_expr(Expr::QualifiedIdentifier { qualifiers, name }));
        }
        Ok(self.alloc_expr(Expr::Identifier(name)))
    }

    fn parse_initializer_list(&mut self) -> Result<NodeId> {
        self.expect("{")?;
        let mut items = Vec::new();
        if !self.peek_is("}") {
            loop {
                items.push(self.parse_assignment_expression()?);
                if !self.consume_if(",") {
                    break;
                }
            }
        }
        self.expect("}")?;
        Ok(self.alloc_expr(Expr::InitializerList(items)))
    }

    fn parse_lambda(&mut self) -> Result<NodeId> {
        self.expect("[")?;
        let mut captures = Vec::new();
        let mut capture_default = None;
        if self.consume_if("=") {
            capture_default = Some(CaptureMode::ByValue);
        } else if self.consume_if("&") {
            if self.peek_is(",") || self.peek_is("]") {
                capture_default = Some(CaptureMode::ByReference);
            } else {
                let name = self.expect_identifier()?;
                captures.push(novacc_ast::Capture {
                    name,
                    mode: CaptureMode::ByReference,
                });
            }
        }
        while self.consume_if(",") {
            let mode = if self.consume_if("&") {
                CaptureMode::ByReference
            } else {
                CaptureMode::ByValue
            };
            let name = self.expect_identifier()?;
            captures.push(novacc_ast::Capture { name, mode });
        }
        self.expect("]")?;
        let params = if self.consume_if("(") {
            let params = self.parse_parameter_list()?;
            self.expect(")")?;
            params
        } else {
            Vec::new()
        };
        let return_type = if self.consume_if("->") {
            Some(self.parse_type_specifier()?)
        } else {
            None
        };
        self.push_scope(novacc_core::ScopeKind::Function);
        let body = self.parse_block()?;
        self.pop_scope();
        Ok(self.alloc_expr(Expr::LambdaExpression {
            captures,
            capture_default,
            params,
            return_type,
            body,
        }))
    }

    fn peek_text(&self) -> String {
        self.session.interner.view(self.peek().text).to_string()
    }
}

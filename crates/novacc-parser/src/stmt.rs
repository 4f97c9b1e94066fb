//! Statement parsing (spec §3.4, §4.5): blocks, control flow, structured
//! bindings, and the declaration-vs-expression-statement disambiguation.

use crate::error::Result;
use crate::Parser;
use novacc_ast::{BindingKind, CaseLabel, CatchClause, Node, NodeId, Stmt};
use novacc_core::symtab::ScopeKind;
use novacc_lexer::TokenKind;

impl<'a> Parser<'a> {
    fn alloc_stmt(&mut self, stmt: Stmt) -> NodeId {
        let tok = self.source_token();
        self.arena.borrow_mut().alloc(Node::Stmt(stmt), tok)
    }

    pub fn parse_block(&mut self) -> Result<NodeId> {
        self.expect("{")?;
        self.push_scope(ScopeKind::Block);
        let mut stmts = Vec::new();
        while !self.peek_is("}") && !self.at_eof() {
            stmts.push(self.parse_statement()?);
        }
        self.pop_scope();
        self.expect("}")?;
        Ok(self.alloc_stmt(Stmt::Block(stmts)))
    }

    pub fn parse_statement(&mut self) -> Result<NodeId> {
        if self.peek_is("{") {
            return self.parse_block();
        }
        if self.peek_is("if") {
            return self.parse_if();
        }
        if self.peek_is("for") {
            return self.parse_for();
        }
        if self.peek_is("while") {
            return self.parse_while();
        }
        if self.peek_is("do") {
            return self.parse_do_while();
        }
        if self.peek_is("switch") {
            return self.parse_switch();
        }
        if self.peek_is("try") {
            return self.parse_try();
        }
        if self.peek_is("throw") {
            self.advance();
            let value = if self.peek_is(";") {
                None
            } else {
                Some(self.parse_expression()?)
            };
            self.expect_semicolon()?;
            return Ok(self.alloc_stmt(Stmt::Throw(value)));
        }
        if self.peek_is("return") {
            self.advance();
            let value = if self.peek_is(";") {
                None
            } else {
                Some(self.parse_expression()?)
            };
            self.expect_semicolon()?;
            return Ok(self.alloc_stmt(Stmt::Return(value)));
        }
        if self.peek_is("break") {
            self.advance();
            self.expect_semicolon()?;
            return Ok(self.alloc_stmt(Stmt::Break));
        }
        if self.peek_is("continue") {
            self.advance();
            self.expect_semicolon()?;
            return Ok(self.alloc_stmt(Stmt::Continue));
        }
        if self.peek_is("goto") {
            self.advance();
            let label = self.expect_identifier()?;
            self.expect_semicolon()?;
            return Ok(self.alloc_stmt(Stmt::Goto(label)));
        }
        if self.peek_is(";") {
            self.advance();
            return Ok(self.alloc_stmt(Stmt::Block(Vec::new())));
        }
        // Label: `identifier ':'` not followed by `::` (which would make it
        // a qualified name instead).
        if self.peek_kind() == TokenKind::Identifier {
            let checkpoint = self.checkpoint();
            let label = self.advance().text;
            if self.peek_is(":") {
                self.advance();
                let target = self.parse_statement()?;
                return Ok(self.alloc_stmt(Stmt::Label(label, target)));
            }
            self.restore(checkpoint);
        }
        if self.peek_is("auto") || self.peek_is("[") {
            if let Ok(node) = self.speculate(|p| p.try_parse_structured_binding()) {
                return Ok(node);
            }
        }
        if let Ok(node) = self.speculate(|p| p.try_parse_declaration_statement()) {
            return Ok(node);
        }
        let expr = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(self.alloc_stmt(Stmt::ExprStatement(expr)))
    }

    fn try_parse_declaration_statement(&mut self) -> Result<NodeId> {
        let decl = self.parse_function_or_variable()?;
        Ok(self.alloc_stmt(Stmt::Declaration(decl)))
    }

    /// `auto [a, b] = expr;` / `auto& [a, b] = expr;` (spec §4.5 structured
    /// bindings, three decomposition strategies resolved later in lowering).
    fn try_parse_structured_binding(&mut self) -> Result<NodeId> {
        self.expect("auto")?;
        let binding_kind = if self.consume_if("&&") {
            BindingKind::RValueRef
        } else if self.consume_if("&") {
            BindingKind::LValueRef
        } else {
            BindingKind::Value
        };
        self.expect("[")?;
        let mut names = Vec::new();
        loop {
            names.push(self.expect_identifier()?);
            if !self.consume_if(",") {
                break;
            }
        }
        self.expect("]")?;
        self.expect("=")?;
        let initializer = self.parse_expression()?;
        self.expect_semicolon()?;
        let bindings = names.into_iter().map(|n| (n, binding_kind)).collect();
        Ok(self.alloc_stmt(Stmt::StructuredBinding { bindings, initializer }))
    }

    fn parse_if(&mut self) -> Result<NodeId> {
        self.expect("if")?;
        let is_constexpr = self.consume_if("constexpr");
        self.expect("(")?;
        let (init, cond) = self.parse_condition()?;
        self.expect(")")?;
        let then_branch = self.parse_statement()?;
        let else_branch = if self.consume_if("else") {
            Some(self.parse_statement()?)
        } else {
            None
        };
        Ok(self.alloc_stmt(Stmt::If {
            init,
            is_constexpr,
            cond,
            then_branch,
            else_branch,
        }))
    }

    /// `if (init; cond)` / `if (cond)`: tries the init-statement form first.
    fn parse_condition(&mut self) -> Result<(Option<NodeId>, NodeId)> {
        if let Ok((init, cond)) = self.speculate(|p| {
            let init = p.parse_function_or_variable()?;
            let cond = p.parse_expression()?;
            Ok((init, cond))
        }) {
            return Ok((Some(init), cond));
        }
        let cond = self.parse_expression()?;
        Ok((None, cond))
    }

    fn parse_for(&mut self) -> Result<NodeId> {
        self.expect("for")?;
        self.expect("(")?;
        self.push_scope(ScopeKind::Block);
        if let Ok(node) = self.speculate(|p| p.try_parse_ranged_for()) {
            self.pop_scope();
            return Ok(node);
        }
        let init = if self.peek_is(";") {
            self.advance();
            None
        } else if let Ok(decl) = self.speculate(|p| p.parse_function_or_variable()) {
            Some(self.alloc_stmt(Stmt::Declaration(decl)))
        } else {
            let e = self.parse_expression()?;
            self.expect_semicolon()?;
            Some(self.alloc_stmt(Stmt::ExprStatement(e)))
        };
        let cond = if self.peek_is(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon()?;
        let increment = if self.peek_is(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(")")?;
        let body = self.parse_statement()?;
        self.pop_scope();
        Ok(self.alloc_stmt(Stmt::For { init, cond, increment, body }))
    }

    fn try_parse_ranged_for(&mut self) -> Result<NodeId> {
        let binding_kind = if self.consume_if("auto") {
            if self.consume_if("&&") {
                BindingKind::RValueRef
            } else if self.consume_if("&") {
                BindingKind::LValueRef
            } else {
                BindingKind::Value
            }
        } else {
            let _ty = self.parse_type_specifier()?;
            BindingKind::Value
        };
        let binding = self.expect_identifier()?;
        self.expect(":")?;
        let range = self.parse_expression()?;
        self.expect(")")?;
        let body = self.parse_statement()?;
        Ok(self.alloc_stmt(Stmt::RangedFor {
            binding,
            binding_kind,
            range,
            body,
        }))
    }

    fn parse_while(&mut self) -> Result<NodeId> {
        self.expect("while")?;
        self.expect("(")?;
        let cond = self.parse_expression()?;
        self.expect(")")?;
        let body = self.parse_statement()?;
        Ok(self.alloc_stmt(Stmt::While { cond, body }))
    }

    fn parse_do_while(&mut self) -> Result<NodeId> {
        self.expect("do")?;
        let body = self.parse_statement()?;
        self.expect("while")?;
        self.expect("(")?;
        let cond = self.parse_expression()?;
        self.expect(")")?;
        self.expect_semicolon()?;
        Ok(self.alloc_stmt(Stmt::DoWhile { body, cond }))
    }

    fn parse_switch(&mut self) -> Result<NodeId> {
        self.expect("switch")?;
        self.expect("(")?;
        let scrutinee = self.parse_expression()?;
        self.expect(")")?;
        self.expect("{")?;
        self.push_scope(ScopeKind::Block);
        let mut cases = Vec::new();
        let mut default = None;
        while !self.peek_is("}") && !self.at_eof() {
            if self.consume_if("case") {
                let value = self.parse_assignment_expression()?;
                self.expect(":")?;
                let mut body = Vec::new();
                while !self.peek_is("case") && !self.peek_is("default") && !self.peek_is("}") {
                    body.push(self.parse_statement()?);
                }
                cases.push(CaseLabel { value, body });
            } else if self.consume_if("default") {
                self.expect(":")?;
                let mut body = Vec::new();
                while !self.peek_is("case") && !self.peek_is("default") && !self.peek_is("}") {
                    body.push(self.parse_statement()?);
                }
                default = Some(body);
            } else {
                // Tolerate stray statements between labels (rare but legal).
                let _ = self.parse_statement()?;
            }
        }
        self.pop_scope();
        self.expect("}")?;
        Ok(self.alloc_stmt(Stmt::Switch { scrutinee, cases, default }))
    }

    fn parse_try(&mut self) -> Result<NodeId> {
        self.expect("try")?;
        let body = self.parse_block()?;
        let mut handlers = Vec::new();
        while self.consume_if("catch") {
            self.expect("(")?;
            let (exception_type, is_catch_all, binding_name) = if self.consume_if("...") {
                (None, true, None)
            } else {
                let ty = self.parse_type_specifier()?;
                let name = if self.peek_kind() == TokenKind::Identifier {
                    Some(self.advance().text)
                } else {
                    None
                };
                (Some(ty), false, name)
            };
            self.expect(")")?;
            let handler_body = self.parse_block()?;
            handlers.push(CatchClause {
                exception_type,
                is_catch_all,
                binding_name,
                body: handler_body,
            });
        }
        Ok(self.alloc_stmt(Stmt::Try { body, handlers }))
    }
}

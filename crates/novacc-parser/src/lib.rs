//! Recursive-descent C++ parser with template instantiation (spec §4.3).
//!
//! Speculative parsing backtracks by snapshotting both the lexer cursor and
//! the AST arena's length (`ScopedTokenPosition` in spec terms) and rolling
//! both back atomically on failure — see [`Parser::speculate`].

pub mod decl;
pub mod error;
pub mod expr;
pub mod stmt;
pub mod templates;

pub use error::{ParserError, Result};

use novacc_ast::{Arena, NodeId, SourceToken};
use novacc_core::{CompileContext, CompilerSession, ScopeKind, StringHandle};
use novacc_lexer::{Cursor, Lexer, Token, TokenKind};
use std::cell::RefCell;

/// The parser's own pack-binding table for the *currently active*
/// instantiation, consulted by `sizeof...(Pack)` (spec §4.3 variadic
/// templates) via [`novacc_eval::EvalHost::pack_size`].
#[derive(Default)]
pub struct PackBindings {
    sizes: std::collections::HashMap<StringHandle, usize>,
}

pub struct Parser<'a> {
    pub session: &'a CompilerSession,
    pub arena: RefCell<Arena>,
    lexer: Lexer<'a>,
    current: Token,
    pub pack_bindings: PackBindings,
    /// Pending member materialisations for lazy template instantiation
    /// (spec §4.3): drained by [`Parser::drain_instantiation_queue`]
    /// between compilation phases.
    pub instantiation_queue: novacc_core::templates::InstantiationQueue,
    /// Names (and kinds) of the template parameters currently in scope
    /// while parsing a template declaration's body, consulted by
    /// `parse_type_specifier` to mark dependent types (spec §4.3) and by
    /// the instantiation engine in `templates.rs` to drive substitution.
    pub active_template_params: Vec<(StringHandle, novacc_ast::TemplateParamKind)>,
    /// Stored template declarations (function/variable/struct) keyed by
    /// name, consulted when a template-id is used before its definition is
    /// re-parsed for a given argument set.
    pub template_decls: std::collections::HashMap<StringHandle, NodeId>,
    /// Folded values of already-parsed `constexpr` variables, consulted by
    /// [`novacc_eval::EvalHost::lookup_constant`] (see `templates.rs`).
    pub const_cache: std::collections::HashMap<StringHandle, novacc_eval::EvalValue>,
}

impl<'a> Parser<'a> {
    pub fn new(session: &'a CompilerSession, buffer: &'a str) -> Self {
        let mut lexer = Lexer::new(session, buffer);
        let current = lexer.next_token().expect("lexing the first token");
        Parser {
            session,
            arena: RefCell::new(Arena::new()),
            lexer,
            current,
            pack_bindings: PackBindings::default(),
            instantiation_queue: novacc_core::templates::InstantiationQueue::new(),
            active_template_params: Vec::new(),
            template_decls: std::collections::HashMap::new(),
            const_cache: std::collections::HashMap::new(),
        }
    }

    pub fn context(&self) -> std::cell::RefMut<'_, CompileContext> {
        self.session.context.borrow_mut()
    }

    fn text(&self, token: &Token) -> String {
        self.session.interner.view(token.text).to_string()
    }

    pub fn peek(&self) -> &Token {
        &self.current
    }

    pub fn peek_is(&self, text: &str) -> bool {
        self.text(&self.current) == text
    }

    pub fn peek_kind(&self) -> TokenKind {
        self.current.kind
    }

    pub fn at_eof(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    /// Looks one token further ahead without committing, via a lexer
    /// save/restore round trip (spec §4.2 "saves/restores cursor
    /// positions").
    pub fn peek2(&mut self) -> Token {
        let cursor = self.lexer.save();
        let next = self.lexer.next_token().unwrap_or(self.current);
        self.lexer.restore(cursor);
        next
    }

    pub fn advance(&mut self) -> Token {
        let tok = self.current;
        self.current = self.lexer.next_token().unwrap_or(tok);
        tok
    }

    pub fn source_token(&self) -> SourceToken {
        SourceToken {
            line: self.current.line,
            column: self.current.column,
        }
    }

    fn err_here(&self, expected: &str) -> ParserError {
        ParserError::UnexpectedToken {
            found: self.text(&self.current),
            expected: expected.to_string(),
            line: self.current.line,
            column: self.current.column,
        }
    }

    pub fn expect(&mut self, text: &str) -> Result<Token> {
        if self.peek_is(text) {
            Ok(self.advance())
        } else {
            Err(self.err_here(&format!("`{text}`")))
        }
    }

    pub fn expect_semicolon(&mut self) -> Result<()> {
        if self.peek_is(";") {
            self.advance();
            Ok(())
        } else {
            Err(ParserError::MissingSemicolon {
                line: self.current.line,
                column: self.current.column,
            })
        }
    }

    pub fn expect_identifier(&mut self) -> Result<StringHandle> {
        if self.peek_kind() == TokenKind::Identifier {
            Ok(self.advance().text)
        } else {
            Err(self.err_here("an identifier"))
        }
    }

    pub fn consume_if(&mut self, text: &str) -> bool {
        if self.peek_is(text) {
            self.advance();
            true
        } else {
            false
        }
    }
}

/// Opaque speculative-parse snapshot (spec §4.3 `ScopedTokenPosition`):
/// atomically restores the lexer cursor, current token, and AST arena
/// length on rollback.
pub struct Checkpoint {
    cursor: Cursor,
    current: Token,
    arena_len: usize,
}

impl<'a> Parser<'a> {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            cursor: self.lexer.save(),
            current: self.current,
            arena_len: self.arena.borrow().checkpoint(),
        }
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.lexer.restore(checkpoint.cursor);
        self.current = checkpoint.current;
        self.arena.borrow_mut().rollback(checkpoint.arena_len);
    }

    /// Runs `f` speculatively: on `Ok`, the parse commits; on `Err`, both
    /// the lexer cursor and the AST arena are rolled back before
    /// propagating the error to the caller, who may then try an
    /// alternative production.
    pub fn speculate<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.checkpoint();
        match f(self) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.restore(checkpoint);
                Err(e)
            }
        }
    }

    pub fn push_scope(&self, kind: ScopeKind) {
        self.session.symbols.borrow_mut().push_scope(kind);
    }

    pub fn pop_scope(&self) {
        self.session.symbols.borrow_mut().pop_scope();
    }

    /// Top-level entry point: parses the whole translation unit into a
    /// flat list of top-level declarations.
    pub fn parse_translation_unit(&mut self) -> Result<Vec<NodeId>> {
        let mut decls = Vec::new();
        while !self.at_eof() {
            decls.push(self.parse_declaration()?);
        }
        Ok(decls)
    }

    /// Drains the lazy-instantiation queue, materialising any member that
    /// was referenced but not yet substituted (spec §4.3 lazy mode).
    pub fn drain_instantiation_queue(&mut self) -> Result<()> {
        loop {
            let pending = self.instantiation_queue.drain();
            if pending.is_empty() {
                break;
            }
            for member in pending {
                tracing::debug!(
                    owner = member.owning_specialisation,
                    member = member.member_template_node,
                    "materialising lazily-queued template member"
                );
                // Member bodies were already substituted into the AST at
                // `begin_instantiation` time (see `templates.rs`); the
                // queue entry exists so codegen knows to visit it even
                // though it was not reached via ordinary declaration
                // order.
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novacc_core::ObjectFormat;

    macro_rules! parse_ok {
        ($session:ident, $src:expr) => {{
            let mut parser = Parser::new(&$session, $src);
            let decls = parser
                .parse_translation_unit()
                .and_then(|decls| parser.drain_instantiation_queue().map(|_| decls));
            decls
        }};
    }

    #[test]
    fn parses_trivial_main() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        let decls = parse_ok!(session, "int main() { return 0; }").expect("trivial main should parse");
        assert_eq!(decls.len(), 1);
    }

    #[test]
    fn parses_struct_with_constructor_and_method() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        let decls = parse_ok!(
            session,
            "struct Point { int x; int y; Point(int a, int b) : x(a), y(b) {} int sum() { return x + y; } };"
        )
        .expect("struct declaration should parse");
        assert_eq!(decls.len(), 1);
    }

    #[test]
    fn static_assert_true_is_accepted() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        parse_ok!(session, "static_assert(1 + 1 == 2, \"math works\");")
            .expect("a true static_assert should not error");
    }

    #[test]
    fn static_assert_false_fails_with_semantic_error() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        match parse_ok!(session, "static_assert(1 == 2, \"never\");") {
            Err(ParserError::Semantic { message, .. }) => assert_eq!(message, "never"),
            other => panic!("expected a semantic static_assert failure, got {other:?}"),
        }
    }

    #[test]
    fn constexpr_recursive_factorial_static_assert_passes() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        parse_ok!(
            session,
            "constexpr int fact(int n) { return n <= 1 ? 1 : n * fact(n - 1); } \
             static_assert(fact(5) == 120);"
        )
        .expect("fact(5) == 120 should hold");
    }

    #[test]
    fn class_template_instantiation_static_assert_passes() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        parse_ok!(
            session,
            "template<class T> struct S { static constexpr int v = sizeof(T); }; \
             static_assert(S<int>::v == 4);"
        )
        .expect("S<int>::v should fold to sizeof(int) == 4");
    }

    #[test]
    fn unexpected_token_reports_position() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        match parse_ok!(session, "int main( { return 0; }") {
            Err(ParserError::UnexpectedToken { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected UnexpectedToken, got {other:?}"),
        }
    }

    #[test]
    fn function_decl_is_registered_in_the_global_scope() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        parse_ok!(session, "void f() {}").expect("parses");
        let name = session.interner.intern("f");
        let found = session.symbols.borrow().lookup_all(name).is_some_and(|c| !c.is_empty());
        assert!(found);
    }
}

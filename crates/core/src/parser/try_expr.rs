//! Grammar extension: `try` in expression position.
//!
//! ```text
//! TryExpr       := 'try' Block 'catch' CatchParam? Block FinallyClause?
//! CatchParam    := '(' Identifier ')'
//! FinallyClause := 'finally' '(' Identifier ')' Block
//! ```
//!
//! A bare `finally Block` is accepted as an ordinary finally body. It has no
//! binding and `raise` is not a keyword inside it.

use super::{Parser, RaiseMode};
use crate::ast::{Stmt, TryExpr};
use crate::error::Diagnostic;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    /// Attempt the try-expression form at an expression position.
    ///
    /// Returns `Ok(None)` without advancing when the stream does not start
    /// with `try {`, so the caller can fall back to ordinary expression
    /// parsing. Once `try {` has matched, malformed input is a hard error.
    pub(super) fn try_parse_try_expr(&mut self) -> Result<Option<TryExpr>, Diagnostic> {
        if !(self.is_word("try") && self.peek_at(1) == &Token::LBrace) {
            return Ok(None);
        }
        let start = self.cur_span();
        self.advance();
        let id = self.fresh_id();

        let try_body = self.parse_clause_block(RaiseMode::Active)?;

        if !self.is_word("catch") {
            return Err(self.err(format!(
                "expected 'catch' after try expression block, got {:?}",
                self.peek()
            )));
        }
        self.advance();
        let catch_param = if self.eat(&Token::LParen) {
            let name = self.take_ident()?;
            self.expect(Token::RParen, ")")?;
            Some(name)
        } else {
            None
        };
        let catch_body = self.parse_clause_block(RaiseMode::Active)?;

        let (finally_param, finally_body) = if self.is_word("finally") {
            self.advance();
            if self.eat(&Token::LParen) {
                let name = self.take_ident()?;
                self.expect(Token::RParen, ")")?;
                (Some(name), Some(self.parse_clause_block(RaiseMode::Active)?))
            } else {
                (None, Some(self.parse_clause_block(RaiseMode::Inactive)?))
            }
        } else {
            (None, None)
        };

        let mut t = TryExpr::new(id, try_body, catch_body, start.to(self.prev_span()));
        t.catch_param = catch_param;
        t.finally_param = finally_param;
        t.finally_body = finally_body;
        Ok(Some(t))
    }

    fn parse_clause_block(&mut self, mode: RaiseMode) -> Result<Vec<Stmt>, Diagnostic> {
        self.with_raise_mode(mode, |p| p.parse_block())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Program, Stmt};
    use crate::lexer;

    fn try_expr_of(src: &str) -> TryExpr {
        let tokens = lexer::lex(src, "t.js").unwrap();
        let program: Program = crate::parser::parse(&tokens, "t.js").unwrap();
        match program.body.into_iter().next() {
            Some(Stmt::Decl { mut decls, .. }) => match decls.remove(0).init {
                Some(Expr::Try(t)) => *t,
                other => panic!("expected try expression, got {:?}", other),
            },
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn not_applicable_leaves_stream_untouched() {
        for src in ["try;", "tryer", "x"] {
            let tokens = lexer::lex(src, "t.js").unwrap();
            let mut p = Parser::new(&tokens, "t.js");
            assert!(p.try_parse_try_expr().unwrap().is_none());
            assert_eq!(p.pos, 0, "stream advanced for {:?}", src);
        }
    }

    #[test]
    fn full_form_with_finally_binding() {
        let t = try_expr_of(
            "let v = try { raise 1; } catch (e) { raise 2; } finally (raised) { raise 3; };",
        );
        assert_eq!(t.catch_param.as_deref(), Some("e"));
        assert_eq!(t.finally_param.as_deref(), Some("raised"));
        assert!(matches!(t.try_body[0], Stmt::Raise(_)));
        assert!(matches!(t.catch_body[0], Stmt::Raise(_)));
        assert!(matches!(t.finally_body.as_deref(), Some([Stmt::Raise(_)])));
        assert!(t.raises.is_none() && t.verdict.is_none());
    }

    #[test]
    fn catch_binding_is_optional() {
        let t = try_expr_of("let v = try { raise 1; } catch { raise 2; };");
        assert!(t.catch_param.is_none());
        assert!(t.finally_body.is_none());
    }

    #[test]
    fn bare_finally_is_not_raise_receiving() {
        let tokens = lexer::lex(
            "let v = try { raise 1; } catch { raise 2; } finally { raise 3; };",
            "t.js",
        )
        .unwrap();
        let err = crate::parser::parse(&tokens, "t.js").unwrap_err();
        assert!(err.message.starts_with("expected ';'"), "{}", err.message);

        let t = try_expr_of("let v = try { raise 1; } catch { raise 2; } finally { cleanup(); };");
        assert!(t.finally_param.is_none());
        assert_eq!(t.finally_body.map(|b| b.len()), Some(1));
    }

    #[test]
    fn catch_is_required() {
        let tokens = lexer::lex("let v = try { raise 1; };", "t.js").unwrap();
        let err = crate::parser::parse(&tokens, "t.js").unwrap_err();
        assert!(err.message.starts_with("expected 'catch'"), "{}", err.message);
    }

    #[test]
    fn raise_accepts_await_and_undefined() {
        let t = try_expr_of("let v = try { raise await f(); } catch { raise undefined; };");
        match (&t.try_body[0], &t.catch_body[0]) {
            (Stmt::Raise(a), Stmt::Raise(b)) => {
                assert!(matches!(a.value, Expr::Await(_)));
                assert_eq!(b.value, Expr::Undefined);
                assert_ne!(a.id, b.id);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn nested_function_clears_raise_mode() {
        let tokens = lexer::lex(
            "let v = try { let f = () => { raise 1; }; } catch { };",
            "t.js",
        )
        .unwrap();
        assert!(crate::parser::parse(&tokens, "t.js").is_err());
    }

    #[test]
    fn raise_in_nested_standard_statements_still_parses() {
        let t = try_expr_of(
            "let v = try { if (a) { raise 1; } else { while (b) { raise 2; } } } catch { raise 3; };",
        );
        assert_eq!(t.try_body.len(), 1);
    }

    #[test]
    fn span_covers_whole_construct() {
        let src = "let v = try { raise 1; } catch { raise 2; };";
        let t = try_expr_of(src);
        assert_eq!(t.span.start, 8);
        assert_eq!(t.span.end as usize, src.len() - 1);
        assert_eq!(t.span.line, 1);
    }
}

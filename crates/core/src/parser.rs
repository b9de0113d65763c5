/// Parser for the host-language subset plus the try-expression extension.
/// Every statement carries the span of its first token; try expressions
/// and raise statements also get a [`NodeId`].
/// No raise attribution or validation is done here -- that is the job of
/// the later passes.
use crate::ast::*;
use crate::error::Diagnostic;
use crate::lexer::{Spanned, Token};

mod expressions;
mod try_expr;

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

/// Whether `raise` is a keyword in the current scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RaiseMode {
    Active,
    Inactive,
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    filename: String,
    next_id: u32,
    /// Pushed on entering a raise-receiving clause or a function body.
    raise_modes: Vec<RaiseMode>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], filename: &str) -> Self {
        Parser {
            tokens,
            pos: 0,
            filename: filename.to_owned(),
            next_id: 0,
            raise_modes: Vec::new(),
        }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[i].token
    }

    fn cur_span(&self) -> Span {
        self.cur().span
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.cur_span()
        } else {
            self.tokens[(self.pos - 1).min(self.tokens.len() - 1)].span
        }
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn err(&self, msg: impl Into<String>) -> Diagnostic {
        Diagnostic::parse(&self.filename, self.cur_span(), msg)
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == tok {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token, what: &str) -> Result<Span, Diagnostic> {
        if self.peek() == &tok {
            let span = self.cur_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.err(format!("expected '{}', got {:?}", what, self.peek())))
        }
    }

    fn expect_word(&mut self, expected: &str) -> Result<Span, Diagnostic> {
        if self.is_word(expected) {
            let span = self.cur_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.err(format!("expected '{}', got {:?}", expected, self.peek())))
        }
    }

    fn take_ident(&mut self) -> Result<String, Diagnostic> {
        match self.peek().clone() {
            Token::Word(w) if !is_reserved(&w) => {
                self.advance();
                Ok(w)
            }
            other => Err(self.err(format!("expected identifier, got {:?}", other))),
        }
    }

    /// `;`, or an automatically inserted one before `}`, at end of input, or
    /// at a line break.
    fn consume_semi(&mut self) -> Result<(), Diagnostic> {
        if self.eat(&Token::Semi) {
            return Ok(());
        }
        if matches!(self.peek(), Token::RBrace | Token::Eof)
            || self.cur_span().line > self.prev_span().line
        {
            return Ok(());
        }
        Err(self.err(format!("expected ';', got {:?}", self.peek())))
    }

    // -- Raise mode --------------------------------------------

    fn raise_active(&self) -> bool {
        self.raise_modes.last() == Some(&RaiseMode::Active)
    }

    fn with_raise_mode<T>(
        &mut self,
        mode: RaiseMode,
        f: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        self.raise_modes.push(mode);
        let result = f(self);
        self.raise_modes.pop();
        result
    }

    // -- Program and statements --------------------------------

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut body = Vec::new();
        while self.peek() != &Token::Eof {
            if self.eat(&Token::Semi) {
                continue;
            }
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    /// `{ Statement* }`
    fn parse_block(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        self.expect(Token::LBrace, "{")?;
        let mut body = Vec::new();
        while self.peek() != &Token::RBrace {
            if self.peek() == &Token::Eof {
                return Err(self.err("unexpected end of input, expected '}'"));
            }
            if self.eat(&Token::Semi) {
                continue;
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let span = self.cur_span();
        let word = match self.peek() {
            Token::LBrace => {
                let body = self.parse_block()?;
                return Ok(Stmt::Block {
                    body,
                    span: span.to(self.prev_span()),
                });
            }
            Token::Word(w) => w.clone(),
            _ => return self.parse_expression_statement(span),
        };
        match word.as_str() {
            "let" | "const" | "var" => self.parse_declaration(span),
            "if" => self.parse_if(span),
            "while" => self.parse_while(span),
            "switch" => self.parse_switch(span),
            "break" => {
                self.advance();
                self.consume_semi()?;
                Ok(Stmt::Break { span })
            }
            "continue" => {
                self.advance();
                self.consume_semi()?;
                Ok(Stmt::Continue { span })
            }
            "return" => {
                self.advance();
                let arg = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.consume_semi()?;
                Ok(Stmt::Return {
                    arg,
                    span: span.to(self.prev_span()),
                })
            }
            "throw" => {
                self.advance();
                let arg = self.parse_expr()?;
                self.consume_semi()?;
                Ok(Stmt::Throw {
                    arg,
                    span: span.to(self.prev_span()),
                })
            }
            "try" => self.parse_try_statement(span),
            "function" => self.parse_function_declaration(span, false),
            "async" if self.peek_at(1) == &Token::Word("function".into()) => {
                self.advance();
                self.parse_function_declaration(span, true)
            }
            "raise" if self.raise_active() => self.parse_raise(span),
            _ => self.parse_expression_statement(span),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), Token::Semi | Token::RBrace | Token::Eof)
            || self.cur_span().line > self.prev_span().line
    }

    fn parse_expression_statement(&mut self, span: Span) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expr()?;
        self.consume_semi()?;
        Ok(Stmt::Expr {
            expr,
            span: span.to(self.prev_span()),
        })
    }

    fn parse_declaration(&mut self, span: Span) -> Result<Stmt, Diagnostic> {
        let kind = match self.peek() {
            Token::Word(w) if w == "let" => VarKind::Let,
            Token::Word(w) if w == "const" => VarKind::Const,
            _ => VarKind::Var,
        };
        self.advance();
        let mut decls = Vec::new();
        loop {
            let name = self.take_ident()?;
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_assign_expr()?)
            } else {
                None
            };
            if kind == VarKind::Const && init.is_none() {
                return Err(self.err(format!("missing initializer in const '{}'", name)));
            }
            decls.push(Declarator { name, init });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.consume_semi()?;
        Ok(Stmt::Decl {
            kind,
            decls,
            span: span.to(self.prev_span()),
        })
    }

    fn parse_paren_expr(&mut self) -> Result<Expr, Diagnostic> {
        self.expect(Token::LParen, "(")?;
        let e = self.parse_expr()?;
        self.expect(Token::RParen, ")")?;
        Ok(e)
    }

    fn parse_if(&mut self, span: Span) -> Result<Stmt, Diagnostic> {
        self.advance();
        let test = self.parse_paren_expr()?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.is_word("else") {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
            span: span.to(self.prev_span()),
        })
    }

    fn parse_while(&mut self, span: Span) -> Result<Stmt, Diagnostic> {
        self.advance();
        let test = self.parse_paren_expr()?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While {
            test,
            body,
            span: span.to(self.prev_span()),
        })
    }

    fn parse_switch(&mut self, span: Span) -> Result<Stmt, Diagnostic> {
        self.advance();
        let discriminant = self.parse_paren_expr()?;
        self.expect(Token::LBrace, "{")?;
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.eat(&Token::RBrace) {
            let test = if self.is_word("case") {
                self.advance();
                Some(self.parse_expr()?)
            } else if self.is_word("default") {
                if seen_default {
                    return Err(self.err("more than one default clause in switch statement"));
                }
                seen_default = true;
                self.advance();
                None
            } else {
                return Err(self.err(format!(
                    "expected 'case' or 'default', got {:?}",
                    self.peek()
                )));
            };
            self.expect(Token::Colon, ":")?;
            let mut body = Vec::new();
            while !(self.is_word("case")
                || self.is_word("default")
                || matches!(self.peek(), Token::RBrace | Token::Eof))
            {
                if self.eat(&Token::Semi) {
                    continue;
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(Stmt::Switch {
            discriminant,
            cases,
            span: span.to(self.prev_span()),
        })
    }

    /// Statement-level `try` is always the standard statement.
    fn parse_try_statement(&mut self, span: Span) -> Result<Stmt, Diagnostic> {
        self.advance();
        let block = self.parse_block()?;
        let handler = if self.is_word("catch") {
            self.advance();
            let param = if self.eat(&Token::LParen) {
                let name = self.take_ident()?;
                self.expect(Token::RParen, ")")?;
                Some(name)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.is_word("finally") {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.err("missing catch or finally after try"));
        }
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
            span: span.to(self.prev_span()),
        })
    }

    fn parse_function_declaration(
        &mut self,
        span: Span,
        is_async: bool,
    ) -> Result<Stmt, Diagnostic> {
        self.expect_word("function")?;
        let is_generator = self.eat(&Token::Star);
        let name = self.take_ident()?;
        let f = self.parse_function_rest(Some(name), is_async, is_generator, span)?;
        Ok(Stmt::Function(Box::new(f)))
    }

    /// Parameter list and block body, shared by declarations and expressions.
    fn parse_function_rest(
        &mut self,
        name: Option<String>,
        is_async: bool,
        is_generator: bool,
        span: Span,
    ) -> Result<Function, Diagnostic> {
        let params = self.parse_params()?;
        let body = self.parse_function_block()?;
        Ok(Function {
            name,
            params,
            body: FunctionBody::Block(body),
            is_async,
            is_generator,
            is_arrow: false,
            span: span.to(self.prev_span()),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<String>, Diagnostic> {
        self.expect(Token::LParen, "(")?;
        let mut params = Vec::new();
        while self.peek() != &Token::RParen {
            params.push(self.take_ident()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, ")")?;
        Ok(params)
    }

    /// Function bodies start a fresh raise scope: a `raise` inside a nested
    /// function never belongs to an enclosing try expression.
    fn parse_function_block(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        self.with_raise_mode(RaiseMode::Inactive, |p| p.parse_block())
    }

    fn parse_raise(&mut self, span: Span) -> Result<Stmt, Diagnostic> {
        self.advance();
        if self.at_statement_end() {
            return Err(self.err("raise requires a value"));
        }
        let value = self.parse_expr()?;
        self.consume_semi()?;
        let id = self.fresh_id();
        Ok(Stmt::Raise(RaiseStmt {
            id,
            value,
            span: span.to(self.prev_span()),
        }))
    }
}

/// Words that can never be identifiers. `raise` is deliberately absent.
fn is_reserved(w: &str) -> bool {
    matches!(
        w,
        "let"
            | "const"
            | "var"
            | "if"
            | "else"
            | "while"
            | "switch"
            | "case"
            | "default"
            | "break"
            | "continue"
            | "return"
            | "throw"
            | "try"
            | "catch"
            | "finally"
            | "function"
            | "true"
            | "false"
            | "null"
            | "undefined"
            | "this"
            | "typeof"
            | "await"
            | "yield"
    )
}

pub fn parse(tokens: &[Spanned], filename: &str) -> Result<Program, Diagnostic> {
    let mut p = Parser::new(tokens, filename);
    p.parse_program()
}

/// Parse a single expression fragment, as a host parser would at an
/// expression position. The whole token stream must be consumed.
pub fn parse_expression(tokens: &[Spanned], filename: &str) -> Result<Expr, Diagnostic> {
    let mut p = Parser::new(tokens, filename);
    let e = p.parse_expr()?;
    p.eat(&Token::Semi);
    if p.peek() != &Token::Eof {
        return Err(p.err(format!("unexpected {:?} after expression", p.peek())));
    }
    Ok(e)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_src(src: &str) -> Result<Program, Diagnostic> {
        let tokens = lexer::lex(src, "test.js")?;
        parse(&tokens, "test.js")
    }

    #[test]
    fn raise_outside_try_expression_is_an_identifier() {
        // `raise` here is an ordinary variable.
        let p = parse_src("let raise = 1; raise = raise + 1;").expect("should parse");
        assert_eq!(p.body.len(), 2);
        match &p.body[1] {
            Stmt::Expr {
                expr: Expr::Assign { target, .. },
                ..
            } => assert_eq!(**target, Expr::ident("raise")),
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn raise_statement_outside_try_expression_is_a_syntax_error() {
        let err = parse_src("raise 1;").unwrap_err();
        assert_eq!(err.pass, 0);
        assert!(err.message.contains("expected ';'"), "{}", err.message);
    }

    #[test]
    fn statement_level_try_is_standard() {
        let p = parse_src("try { a(); } catch { b(); } finally { c(); }").unwrap();
        match &p.body[0] {
            Stmt::Try {
                handler: Some(CatchClause { param: None, .. }),
                finalizer: Some(f),
                ..
            } => assert_eq!(f.len(), 1),
            other => panic!("expected try statement, got {:?}", other),
        }
    }

    #[test]
    fn try_statement_requires_handler_or_finalizer() {
        let err = parse_src("try { a(); }").unwrap_err();
        assert_eq!(err.message, "missing catch or finally after try");
    }

    #[test]
    fn automatic_semicolons_at_line_breaks() {
        let p = parse_src("let a = 1\nlet b = a\nb").unwrap();
        assert_eq!(p.body.len(), 3);
    }

    #[test]
    fn missing_semicolon_on_same_line_is_an_error() {
        let err = parse_src("let a = 1 let b = 2;").unwrap_err();
        assert!(err.message.starts_with("expected ';'"), "{}", err.message);
    }

    #[test]
    fn switch_with_default() {
        let p = parse_src("switch (x) { case 1: a(); break; default: b(); }").unwrap();
        match &p.body[0] {
            Stmt::Switch { cases, .. } => {
                assert_eq!(cases.len(), 2);
                assert!(cases[1].test.is_none());
                assert_eq!(cases[0].body.len(), 2);
            }
            other => panic!("expected switch, got {:?}", other),
        }
    }

    #[test]
    fn const_requires_initializer() {
        let err = parse_src("const a;").unwrap_err();
        assert!(err.message.contains("missing initializer"));
    }

    #[test]
    fn async_generator_function_declaration() {
        let p = parse_src("async function* gen(a, b) { yield a; }").unwrap();
        match &p.body[0] {
            Stmt::Function(f) => {
                assert!(f.is_async && f.is_generator && !f.is_arrow);
                assert_eq!(f.name.as_deref(), Some("gen"));
                assert_eq!(f.params, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }
}

use super::{is_reserved, Parser, RaiseMode};
use crate::ast::*;
use crate::error::Diagnostic;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    // -- Expression parsing --------------------------------------

    pub(super) fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_assign_expr()
    }

    pub(super) fn parse_assign_expr(&mut self) -> Result<Expr, Diagnostic> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }
        if self.is_word("yield") {
            return self.parse_yield();
        }
        let left = self.parse_nullish_expr()?;
        if self.peek() == &Token::Assign {
            if !matches!(
                left,
                Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }
            ) {
                return Err(self.err("invalid assignment target"));
            }
            self.advance();
            let value = self.parse_assign_expr()?;
            return Ok(Expr::assign(left, value));
        }
        Ok(left)
    }

    fn parse_yield(&mut self) -> Result<Expr, Diagnostic> {
        self.advance();
        let delegate = self.eat(&Token::Star);
        let ends = matches!(
            self.peek(),
            Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Comma
                | Token::Semi
                | Token::Colon
                | Token::Eof
        ) || self.cur_span().line > self.prev_span().line;
        let arg = if ends && !delegate {
            None
        } else {
            Some(Box::new(self.parse_assign_expr()?))
        };
        Ok(Expr::Yield { arg, delegate })
    }

    fn parse_nullish_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_or_expr()?;
        while self.eat(&Token::Nullish) {
            let right = self.parse_or_expr()?;
            left = Expr::Logical {
                op: LogicalOp::Nullish,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_or_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_and_expr()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and_expr()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_equality_expr()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality_expr()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_relational_expr()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                Token::EqEqEq => BinaryOp::StrictEq,
                Token::NotEqEq => BinaryOp::StrictNotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational_expr()?;
            left = binary(op, left, right);
        }
    }

    fn parse_relational_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_additive_expr()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive_expr()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative_expr()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary_expr()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.peek() {
            Token::Bang => Some(UnaryOp::Not),
            Token::Minus => Some(UnaryOp::Neg),
            Token::Word(w) if w == "typeof" => Some(UnaryOp::TypeOf),
            Token::Word(w) if w == "await" => {
                self.advance();
                let arg = self.parse_unary_expr()?;
                return Ok(Expr::Await(Box::new(arg)));
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let arg = self.parse_unary_expr()?;
                Ok(Expr::Unary {
                    op,
                    arg: Box::new(arg),
                })
            }
            None => self.parse_postfix_expr(),
        }
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut e = self.parse_primary_expr()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    // Any word is a valid property name, keywords included.
                    let property = match self.peek().clone() {
                        Token::Word(w) => {
                            self.advance();
                            w
                        }
                        other => {
                            return Err(
                                self.err(format!("expected property name, got {:?}", other))
                            )
                        }
                    };
                    e = Expr::Member {
                        object: Box::new(e),
                        property,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket, "]")?;
                    e = Expr::Index {
                        object: Box::new(e),
                        index: Box::new(index),
                    };
                }
                Token::LParen => {
                    let args = self.parse_args()?;
                    e = Expr::call(e, args);
                }
                _ => return Ok(e),
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        self.expect(Token::LParen, "(")?;
        let mut args = Vec::new();
        while self.peek() != &Token::RParen {
            args.push(self.parse_assign_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, ")")?;
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, Diagnostic> {
        // Grammar extension first; "not applicable" leaves the stream untouched.
        if let Some(t) = self.try_parse_try_expr()? {
            return Ok(Expr::Try(Box::new(t)));
        }
        let span = self.cur_span();
        match self.peek().clone() {
            Token::Num(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(Token::RParen, ")")?;
                Ok(e)
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while self.peek() != &Token::RBracket {
                    items.push(self.parse_assign_expr()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBracket, "]")?;
                Ok(Expr::Array(items))
            }
            Token::Word(w) => match w.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                "undefined" => {
                    self.advance();
                    Ok(Expr::Undefined)
                }
                "this" => {
                    self.advance();
                    Ok(Expr::This)
                }
                "function" => {
                    self.advance();
                    self.parse_function_expr(span, false)
                }
                "async" if self.peek_at(1) == &Token::Word("function".into()) => {
                    self.advance();
                    self.advance();
                    self.parse_function_expr(span, true)
                }
                _ if is_reserved(&w) => Err(self.err(format!("unexpected keyword '{}'", w))),
                _ => {
                    self.advance();
                    Ok(Expr::Ident(w))
                }
            },
            other => Err(self.err(format!("expected expression, got {:?}", other))),
        }
    }

    /// After `function` (and `async`): optional `*`, optional name, params, body.
    fn parse_function_expr(&mut self, span: Span, is_async: bool) -> Result<Expr, Diagnostic> {
        let is_generator = self.eat(&Token::Star);
        let name = if self.peek() == &Token::LParen {
            None
        } else {
            Some(self.take_ident()?)
        };
        let f = self.parse_function_rest(name, is_async, is_generator, span)?;
        Ok(Expr::Function(Box::new(f)))
    }

    // -- Arrow functions -----------------------------------------

    /// `x => ...`, `(a, b) => ...`, `async x => ...`, `async (a) => ...`.
    /// Returns `None` without consuming anything when no arrow follows.
    fn try_parse_arrow(&mut self) -> Result<Option<Expr>, Diagnostic> {
        let span = self.cur_span();
        let is_async = self.is_word("async")
            && match self.peek_at(1) {
                Token::Word(w) => !is_reserved(w) && self.peek_at(2) == &Token::Arrow,
                Token::LParen => self.arrow_after_parens(1),
                _ => false,
            };
        let offset = usize::from(is_async);
        let single = matches!(self.peek_at(offset), Token::Word(w) if !is_reserved(w))
            && self.peek_at(offset + 1) == &Token::Arrow;
        let parenthesized =
            self.peek_at(offset) == &Token::LParen && self.arrow_after_parens(offset);
        if !single && !parenthesized {
            return Ok(None);
        }
        if is_async {
            self.advance();
        }
        let params = if single {
            vec![self.take_ident()?]
        } else {
            self.parse_params()?
        };
        self.expect(Token::Arrow, "=>")?;
        let body = self.with_raise_mode(RaiseMode::Inactive, |p| {
            if p.peek() == &Token::LBrace {
                Ok(FunctionBody::Block(p.parse_block()?))
            } else {
                Ok(FunctionBody::Expr(Box::new(p.parse_assign_expr()?)))
            }
        })?;
        Ok(Some(Expr::Function(Box::new(Function {
            name: None,
            params,
            body,
            is_async,
            is_generator: false,
            is_arrow: true,
            span: span.to(self.prev_span()),
        }))))
    }

    /// Whether the `(` at `offset` closes with a `)` that is followed by `=>`.
    fn arrow_after_parens(&self, offset: usize) -> bool {
        let mut depth = 0usize;
        let mut i = offset;
        loop {
            match self.peek_at(i) {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_at(i + 1) == &Token::Arrow;
                    }
                }
                Token::Eof => return false,
                _ => {}
            }
            i += 1;
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::{lexer, parser};

    fn expr(src: &str) -> Expr {
        let tokens = lexer::lex(src, "e.js").unwrap();
        parser::parse_expression(&tokens, "e.js").unwrap()
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        match expr("1 + 2 * 3") {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        match expr("a = b = 1") {
            Expr::Assign { value, .. } => assert!(matches!(*value, Expr::Assign { .. })),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn arrow_functions() {
        match expr("(a, b) => a + b") {
            Expr::Function(f) => {
                assert!(f.is_arrow);
                assert_eq!(f.params.len(), 2);
                assert!(matches!(f.body, FunctionBody::Expr(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        match expr("async x => { return await x; }") {
            Expr::Function(f) => {
                assert!(f.is_async && f.is_arrow);
                assert_eq!(f.params, vec!["x".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parenthesized_expression_is_not_an_arrow() {
        assert!(matches!(expr("(a + b) * c"), Expr::Binary { .. }));
    }

    #[test]
    fn member_call_chain() {
        match expr("console.log(x, 'y')") {
            Expr::Call { callee, args } => {
                assert_eq!(args.len(), 2);
                assert!(matches!(*callee, Expr::Member { ref property, .. } if property == "log"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invalid_assignment_target() {
        let tokens = lexer::lex("1 = 2", "e.js").unwrap();
        let err = parser::parse_expression(&tokens, "e.js").unwrap_err();
        assert_eq!(err.message, "invalid assignment target");
    }

    #[test]
    fn yield_forms() {
        assert_eq!(
            expr("yield"),
            Expr::Yield {
                arg: None,
                delegate: false
            }
        );
        assert!(matches!(
            expr("yield* g()"),
            Expr::Yield {
                arg: Some(_),
                delegate: true
            }
        ));
    }
}

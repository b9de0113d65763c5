use crate::ast::Span;
use crate::error::Diagnostic;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords, distinguished in the parser. `raise` is
    /// contextual, so the lexer never reserves it.
    Word(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    Num(f64),
    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Colon,
    Arrow, // =>
    Assign,
    // Comparison operators
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // Logical operators
    Bang,
    AndAnd,
    OrOr,
    Nullish, // ??
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

/// Multi-character operators, longest first.
const OPERATORS: &[(&str, Token)] = &[
    ("===", Token::EqEqEq),
    ("!==", Token::NotEqEq),
    ("=>", Token::Arrow),
    ("==", Token::EqEq),
    ("!=", Token::NotEq),
    ("<=", Token::LtEq),
    (">=", Token::GtEq),
    ("&&", Token::AndAnd),
    ("||", Token::OrOr),
    ("??", Token::Nullish),
];

fn single_char_token(c: char) -> Option<Token> {
    let t = match c {
        '{' => Token::LBrace,
        '}' => Token::RBrace,
        '(' => Token::LParen,
        ')' => Token::RParen,
        '[' => Token::LBracket,
        ']' => Token::RBracket,
        ';' => Token::Semi,
        ',' => Token::Comma,
        '.' => Token::Dot,
        ':' => Token::Colon,
        '=' => Token::Assign,
        '<' => Token::Lt,
        '>' => Token::Gt,
        '+' => Token::Plus,
        '-' => Token::Minus,
        '*' => Token::Star,
        '/' => Token::Slash,
        '%' => Token::Percent,
        '!' => Token::Bang,
        _ => return None,
    };
    Some(t)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

pub fn lex(src: &str, filename: &str) -> Result<Vec<Spanned>, Diagnostic> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line: u32 = 1;

    let span = |start: usize, end: usize, line: u32| Span::new(start as u32, end as u32, line);

    while pos < chars.len() {
        let c = chars[pos];

        // Line comment
        if c == '/' && pos + 1 < chars.len() && chars[pos + 1] == '/' {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && pos + 1 < chars.len() && chars[pos + 1] == '*' {
            let start = pos;
            let start_line = line;
            pos += 2;
            loop {
                if pos >= chars.len() {
                    return Err(Diagnostic::lex(
                        filename,
                        span(start, pos, start_line),
                        "unterminated block comment",
                    ));
                }
                if chars[pos] == '\n' {
                    line += 1;
                }
                if chars[pos] == '*' && pos + 1 < chars.len() && chars[pos + 1] == '/' {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        // Whitespace
        if c.is_whitespace() {
            if c == '\n' {
                line += 1;
            }
            pos += 1;
            continue;
        }

        let start = pos;

        // String literal
        if c == '"' || c == '\'' {
            let quote = c;
            pos += 1;
            let mut s = String::new();
            loop {
                if pos >= chars.len() || chars[pos] == '\n' {
                    return Err(Diagnostic::lex(
                        filename,
                        span(start, pos, line),
                        "unterminated string literal",
                    ));
                }
                let sc = chars[pos];
                if sc == quote {
                    pos += 1;
                    break;
                }
                if sc == '\\' {
                    pos += 1;
                    if pos >= chars.len() {
                        return Err(Diagnostic::lex(
                            filename,
                            span(start, pos, line),
                            "unterminated escape in string",
                        ));
                    }
                    match chars[pos] {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        'r' => s.push('\r'),
                        '0' => s.push('\0'),
                        other => s.push(other),
                    }
                    pos += 1;
                    continue;
                }
                s.push(sc);
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                span: span(start, pos, line),
            });
            continue;
        }

        // Number
        if c.is_ascii_digit() {
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
                pos += 1; // consume '.'
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let n: f64 = text.parse().map_err(|_| {
                Diagnostic::lex(
                    filename,
                    span(start, pos, line),
                    format!("invalid number '{}'", text),
                )
            })?;
            tokens.push(Spanned {
                token: Token::Num(n),
                span: span(start, pos, line),
            });
            continue;
        }

        // Identifier / keyword
        if is_ident_start(c) {
            while pos < chars.len() && is_ident_continue(chars[pos]) {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: Token::Word(word),
                span: span(start, pos, line),
            });
            continue;
        }

        // Operators
        if let Some((text, tok)) = OPERATORS.iter().find(|(text, _)| {
            let len = text.chars().count();
            pos + len <= chars.len() && text.chars().eq(chars[pos..pos + len].iter().copied())
        }) {
            pos += text.chars().count();
            tokens.push(Spanned {
                token: tok.clone(),
                span: span(start, pos, line),
            });
            continue;
        }

        if let Some(tok) = single_char_token(c) {
            pos += 1;
            tokens.push(Spanned {
                token: tok,
                span: span(start, pos, line),
            });
            continue;
        }

        return Err(Diagnostic::lex(
            filename,
            span(start, start + 1, line),
            format!("unexpected character '{}'", c),
        ));
    }

    tokens.push(Spanned {
        token: Token::Eof,
        span: span(pos, pos, line),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        lex(src, "t.js")
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn raise_is_lexed_as_a_plain_word() {
        assert_eq!(
            kinds("raise 1;"),
            vec![
                Token::Word("raise".into()),
                Token::Num(1.0),
                Token::Semi,
                Token::Eof
            ]
        );
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            kinds("a === b !== c => d ?? e"),
            vec![
                Token::Word("a".into()),
                Token::EqEqEq,
                Token::Word("b".into()),
                Token::NotEqEq,
                Token::Word("c".into()),
                Token::Arrow,
                Token::Word("d".into()),
                Token::Nullish,
                Token::Word("e".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn spans_and_lines_are_tracked() {
        let toks = lex("x\n  // note\n  'hi'", "t.js").unwrap();
        assert_eq!(toks[0].span, Span::new(0, 1, 1));
        assert_eq!(toks[1].token, Token::Str("hi".into()));
        assert_eq!(toks[1].span.line, 3);
        assert_eq!(toks[1].span.start, 14);
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let err = lex("let s = \"open;\n", "bad.js").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
        assert_eq!(err.pass, 0);
    }

    #[test]
    fn decimal_numbers() {
        assert_eq!(kinds("1.5")[0], Token::Num(1.5));
        // Member access on an integer literal is not a decimal point.
        assert_eq!(kinds("1.x")[1], Token::Dot);
    }
}

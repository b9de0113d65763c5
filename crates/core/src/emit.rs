//! Pass 4: Emission -- render a lowered program back to source text.
//!
//! Two-space indentation, one statement per line, and only the parentheses
//! that operator precedence requires. A try expression or `raise` that
//! survived lowering is a pipeline defect.

use crate::ast::*;
use crate::error::Diagnostic;
use std::fmt::Write as _;

const PASS: u8 = 4;

pub fn emit_program(program: &Program, file: &str) -> Result<String, Diagnostic> {
    let mut e = Emitter {
        out: String::new(),
        indent: 0,
        file,
    };
    for stmt in &program.body {
        e.stmt(stmt)?;
    }
    Ok(e.out)
}

/// Render a single expression on one line (nested function bodies still
/// break lines).
pub fn emit_expr(expr: &Expr, file: &str) -> Result<String, Diagnostic> {
    let mut e = Emitter {
        out: String::new(),
        indent: 0,
        file,
    };
    e.expr(expr, 0)?;
    Ok(e.out)
}

struct Emitter<'f> {
    out: String,
    indent: usize,
    file: &'f str,
}

/// Binding strength, loosest first.
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Assign { .. } | Expr::Yield { .. } | Expr::Function(_) | Expr::Try(_) => 1,
        Expr::Logical { op, .. } => match op {
            LogicalOp::Nullish => 2,
            LogicalOp::Or => 3,
            LogicalOp::And => 4,
        },
        Expr::Binary { op, .. } => binary_precedence(*op),
        Expr::Unary { .. } | Expr::Await(_) => 9,
        Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => 10,
        _ => 11,
    }
}

fn binary_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 5,
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 6,
        BinaryOp::Add | BinaryOp::Sub => 7,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 8,
    }
}

pub fn binary_op_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::StrictEq => "===",
        BinaryOp::StrictNotEq => "!==",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
    }
}

fn logical_op_str(op: LogicalOp) -> &'static str {
    match op {
        LogicalOp::And => "&&",
        LogicalOp::Or => "||",
        LogicalOp::Nullish => "??",
    }
}

/// `??` may not be mixed with `&&`/`||` without parentheses.
fn mixes_nullish(parent: LogicalOp, child: &Expr) -> bool {
    match child {
        Expr::Logical { op, .. } => (parent == LogicalOp::Nullish) != (*op == LogicalOp::Nullish),
        _ => false,
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl Emitter<'_> {
    fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn unlowered(&self, span: Span, what: &str) -> Diagnostic {
        Diagnostic::internal(PASS, self.file, span, format!("unlowered {} reached emission", what))
    }

    // -- Statements --------------------------------------------

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        self.pad();
        self.stmt_inline(stmt)?;
        self.out.push('\n');
        Ok(())
    }

    /// A statement without leading indentation or trailing newline.
    fn stmt_inline(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Decl { kind, decls, .. } => {
                self.out.push_str(kind.keyword());
                self.out.push(' ');
                for (i, d) in decls.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&d.name);
                    if let Some(init) = &d.init {
                        self.out.push_str(" = ");
                        self.expr(init, 1)?;
                    }
                }
                self.out.push(';');
            }
            Stmt::Expr { expr, .. } => {
                // A statement may not start with `function`.
                let wrap = matches!(expr, Expr::Function(f) if !f.is_arrow);
                if wrap {
                    self.out.push('(');
                }
                self.expr(expr, 0)?;
                if wrap {
                    self.out.push(')');
                }
                self.out.push(';');
            }
            Stmt::Block { body, .. } => self.block(body)?,
            Stmt::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.out.push_str("if (");
                self.expr(test, 0)?;
                self.out.push_str(") ");
                self.branch(consequent)?;
                if let Some(alt) = alternate {
                    self.out.push_str(" else ");
                    if matches!(alt.as_ref(), Stmt::If { .. }) {
                        self.stmt_inline(alt)?;
                    } else {
                        self.branch(alt)?;
                    }
                }
            }
            Stmt::While { test, body, .. } => {
                self.out.push_str("while (");
                self.expr(test, 0)?;
                self.out.push_str(") ");
                self.branch(body)?;
            }
            Stmt::Switch {
                discriminant,
                cases,
                ..
            } => {
                self.out.push_str("switch (");
                self.expr(discriminant, 0)?;
                self.out.push_str(") {\n");
                self.indent += 1;
                for case in cases {
                    self.pad();
                    match &case.test {
                        Some(test) => {
                            self.out.push_str("case ");
                            self.expr(test, 0)?;
                            self.out.push_str(":\n");
                        }
                        None => self.out.push_str("default:\n"),
                    }
                    self.indent += 1;
                    for s in &case.body {
                        self.stmt(s)?;
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.pad();
                self.out.push('}');
            }
            Stmt::Break { .. } => self.out.push_str("break;"),
            Stmt::Continue { .. } => self.out.push_str("continue;"),
            Stmt::Return { arg, .. } => {
                self.out.push_str("return");
                if let Some(arg) = arg {
                    self.out.push(' ');
                    self.expr(arg, 0)?;
                }
                self.out.push(';');
            }
            Stmt::Throw { arg, .. } => {
                self.out.push_str("throw ");
                self.expr(arg, 0)?;
                self.out.push(';');
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.out.push_str("try ");
                self.block(block)?;
                if let Some(h) = handler {
                    self.out.push_str(" catch ");
                    if let Some(p) = &h.param {
                        let _ = write!(self.out, "({}) ", p);
                    }
                    self.block(&h.body)?;
                }
                if let Some(f) = finalizer {
                    self.out.push_str(" finally ");
                    self.block(f)?;
                }
            }
            Stmt::Function(f) => self.function(f)?,
            Stmt::Raise(r) => return Err(self.unlowered(r.span, "raise statement")),
        }
        Ok(())
    }

    /// Single-statement positions always get braces.
    fn branch(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Block { body, .. } => self.block(body),
            other => self.block(std::slice::from_ref(other)),
        }
    }

    fn block(&mut self, body: &[Stmt]) -> Result<(), Diagnostic> {
        if body.is_empty() {
            self.out.push_str("{}");
            return Ok(());
        }
        self.out.push_str("{\n");
        self.indent += 1;
        for s in body {
            self.stmt(s)?;
        }
        self.indent -= 1;
        self.pad();
        self.out.push('}');
        Ok(())
    }

    fn function(&mut self, f: &Function) -> Result<(), Diagnostic> {
        if f.is_async {
            self.out.push_str("async ");
        }
        if !f.is_arrow {
            self.out.push_str("function");
            if f.is_generator {
                self.out.push('*');
            }
            match &f.name {
                Some(name) => {
                    self.out.push(' ');
                    self.out.push_str(name);
                }
                None => self.out.push(' '),
            }
        }
        let _ = write!(self.out, "({})", f.params.join(", "));
        self.out.push(' ');
        if f.is_arrow {
            self.out.push_str("=> ");
        }
        match &f.body {
            FunctionBody::Block(body) => self.block(body),
            FunctionBody::Expr(e) => self.expr(e, 1),
        }
    }

    // -- Expressions -------------------------------------------

    /// Emit `expr`, parenthesised if it binds looser than `min`.
    fn expr(&mut self, expr: &Expr, min: u8) -> Result<(), Diagnostic> {
        let parens = precedence(expr) < min;
        if parens {
            self.out.push('(');
        }
        self.expr_bare(expr)?;
        if parens {
            self.out.push(')');
        }
        Ok(())
    }

    fn expr_bare(&mut self, expr: &Expr) -> Result<(), Diagnostic> {
        let prec = precedence(expr);
        match expr {
            Expr::Number(n) => self.out.push_str(&format_number(*n)),
            Expr::Str(s) => self.out.push_str(&quote(s)),
            Expr::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Expr::Null => self.out.push_str("null"),
            Expr::Undefined => self.out.push_str("undefined"),
            Expr::This => self.out.push_str("this"),
            Expr::Ident(name) => self.out.push_str(name),
            Expr::Array(items) => {
                self.out.push('[');
                self.list(items)?;
                self.out.push(']');
            }
            Expr::Unary { op, arg } => {
                match op {
                    UnaryOp::Not => self.out.push('!'),
                    UnaryOp::Neg => self.out.push('-'),
                    UnaryOp::TypeOf => self.out.push_str("typeof "),
                }
                // `- -x` must not print as `--x`.
                let nested_neg = *op == UnaryOp::Neg
                    && matches!(arg.as_ref(), Expr::Unary { op: UnaryOp::Neg, .. });
                self.expr(arg, if nested_neg { 10 } else { prec })?;
            }
            Expr::Await(arg) => {
                self.out.push_str("await ");
                self.expr(arg, prec)?;
            }
            Expr::Binary { op, left, right } => {
                self.expr(left, prec)?;
                let _ = write!(self.out, " {} ", binary_op_str(*op));
                self.expr(right, prec + 1)?;
            }
            Expr::Logical { op, left, right } => {
                self.operand(*op, left, prec)?;
                let _ = write!(self.out, " {} ", logical_op_str(*op));
                self.operand(*op, right, prec + 1)?;
            }
            Expr::Assign { target, value } => {
                self.expr(target, 10)?;
                self.out.push_str(" = ");
                self.expr(value, 1)?;
            }
            Expr::Member { object, property } => {
                self.expr(object, 10)?;
                self.out.push('.');
                self.out.push_str(property);
            }
            Expr::Index { object, index } => {
                self.expr(object, 10)?;
                self.out.push('[');
                self.expr(index, 0)?;
                self.out.push(']');
            }
            Expr::Call { callee, args } => {
                self.expr(callee, 10)?;
                self.out.push('(');
                self.list(args)?;
                self.out.push(')');
            }
            Expr::Yield { arg, delegate } => {
                self.out.push_str("yield");
                if *delegate {
                    self.out.push('*');
                }
                if let Some(arg) = arg {
                    self.out.push(' ');
                    self.expr(arg, 1)?;
                }
            }
            Expr::Function(f) => self.function(f)?,
            Expr::Try(t) => return Err(self.unlowered(t.span, "try expression")),
        }
        Ok(())
    }

    fn operand(&mut self, parent: LogicalOp, child: &Expr, min: u8) -> Result<(), Diagnostic> {
        if mixes_nullish(parent, child) {
            self.out.push('(');
            self.expr_bare(child)?;
            self.out.push(')');
            Ok(())
        } else {
            self.expr(child, min)
        }
    }

    fn list(&mut self, items: &[Expr]) -> Result<(), Diagnostic> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(item, 1)?;
        }
        Ok(())
    }
}

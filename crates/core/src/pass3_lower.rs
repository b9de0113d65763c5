//! Pass 3: Lowering -- rewrite every validated try expression into a hidden
//! temporary, a standard try statement, and a reference to the temporary.
//!
//! Try expressions are lowered inside-out: the clause bodies of a node are
//! lowered before its own raises are rewritten. Where a statement can precede
//! the expression, the temporary and the try statement are hoisted in front
//! of the containing statement. Arrow expression bodies and `case` tests get
//! an immediately invoked wrapper instead.

use crate::ast::*;
use crate::error::Diagnostic;
use crate::pass1_collect::collect_raises;
use crate::visit::{self, Visit, VisitMut};
use std::collections::HashSet;
use std::mem;

const PASS: u8 = 3;

// ──────────────────────────────────────────────
// Temporaries
// ──────────────────────────────────────────────

/// Generator for hidden temporaries: `<prefix><role><n>` with one counter per
/// compilation unit, skipping every name the unit already uses.
#[derive(Debug, Clone)]
pub struct TempNames {
    prefix: String,
    next: u32,
    taken: HashSet<String>,
    issued: HashSet<String>,
}

impl TempNames {
    pub fn new(prefix: &str, taken: HashSet<String>) -> Self {
        TempNames {
            prefix: prefix.to_owned(),
            next: 0,
            taken,
            issued: HashSet::new(),
        }
    }

    pub fn for_program(prefix: &str, program: &Program) -> Self {
        TempNames::new(prefix, visit::identifiers_in(&program.body))
    }

    pub fn fresh(&mut self, role: &str) -> String {
        loop {
            let name = format!("{}{}{}", self.prefix, role, self.next);
            self.next += 1;
            if self.taken.insert(name.clone()) {
                self.issued.insert(name.clone());
                return name;
            }
        }
    }

    /// Whether `name` was produced by this generator.
    pub fn is_issued(&self, name: &str) -> bool {
        self.issued.contains(name)
    }
}

// ──────────────────────────────────────────────
// Single node
// ──────────────────────────────────────────────

/// A lowered try expression: `let tmp;`, the rewritten try statement, and
/// the reference that replaces the expression.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredForm {
    pub decl: Stmt,
    pub try_stmt: Stmt,
    pub reference: Expr,
}

impl LoweredForm {
    pub fn temp(&self) -> &str {
        match &self.reference {
            Expr::Ident(name) => name,
            _ => "",
        }
    }
}

/// Rewrites the raises owned by one try expression into assignments.
struct RaiseRewriter<'a> {
    temp: &'a str,
    owned: HashSet<NodeId>,
    rewritten: usize,
    stray: Option<Span>,
}

impl VisitMut for RaiseRewriter<'_> {
    fn visit_mut_function(&mut self, _: &mut Function) {}

    fn visit_mut_try_expr(&mut self, _: &mut TryExpr) {}

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        if let Stmt::Raise(r) = stmt {
            if !self.owned.contains(&r.id) {
                self.stray.get_or_insert(r.span);
                return;
            }
            let value = mem::replace(&mut r.value, Expr::Undefined);
            let span = r.span;
            *stmt = Stmt::Expr {
                expr: Expr::assign(Expr::ident(self.temp), value),
                span,
            };
            self.rewritten += 1;
            return;
        }
        visit::walk_mut_stmt(self, stmt);
    }
}

/// Lower one validated try expression whose clause bodies contain no
/// try expressions of their own.
pub fn lower_try_expr(
    mut t: TryExpr,
    names: &mut TempNames,
    file: &str,
) -> Result<LoweredForm, Diagnostic> {
    match &t.verdict {
        Some(ValidationResult::Valid) => {}
        Some(ValidationResult::Invalid { .. }) => {
            return Err(Diagnostic::internal(
                PASS,
                file,
                t.span,
                "lowering reached a try expression that failed validation",
            ));
        }
        None => {
            return Err(Diagnostic::internal(
                PASS,
                file,
                t.span,
                "try expression reached lowering without validation",
            ));
        }
    }

    let sites = match t.raises.take() {
        Some(sites) => sites,
        None => collect_raises(&t),
    };
    let temp = names.fresh("raise");
    let mut rewriter = RaiseRewriter {
        temp: &temp,
        owned: sites.iter().map(|s| s.id).collect(),
        rewritten: 0,
        stray: None,
    };
    visit::walk_mut_stmts(&mut rewriter, &mut t.try_body);
    visit::walk_mut_stmts(&mut rewriter, &mut t.catch_body);
    if let Some(body) = &mut t.finally_body {
        visit::walk_mut_stmts(&mut rewriter, body);
    }
    if let Some(span) = rewriter.stray {
        return Err(Diagnostic::internal(
            PASS,
            file,
            span,
            "raise statement not owned by the enclosing try expression",
        ));
    }
    if rewriter.rewritten != sites.len() {
        return Err(Diagnostic::internal(
            PASS,
            file,
            t.span,
            format!(
                "rewrote {} raise statements, expected {}",
                rewriter.rewritten,
                sites.len()
            ),
        ));
    }

    let finalizer = t.finally_body.map(|mut body| {
        if let Some(param) = t.finally_param {
            body.insert(
                0,
                Stmt::Decl {
                    kind: VarKind::Let,
                    decls: vec![Declarator {
                        name: param,
                        init: Some(Expr::ident(&temp)),
                    }],
                    span: t.span,
                },
            );
        }
        body
    });

    tracing::debug!(node = t.id.0, temp = %temp, raises = sites.len(), "lowered try expression");

    Ok(LoweredForm {
        decl: Stmt::Decl {
            kind: VarKind::Let,
            decls: vec![Declarator {
                name: temp.clone(),
                init: None,
            }],
            span: t.span,
        },
        try_stmt: Stmt::Try {
            block: t.try_body,
            handler: Some(CatchClause {
                param: t.catch_param,
                body: t.catch_body,
            }),
            finalizer,
            span: t.span,
        },
        reference: Expr::Ident(temp),
    })
}

// ──────────────────────────────────────────────
// Whole program
// ──────────────────────────────────────────────

/// Lower every try expression in the program. Returns the number of nodes
/// lowered. Every node must already carry a `Valid` verdict.
pub fn lower_program(program: &mut Program, prefix: &str, file: &str) -> Result<usize, Diagnostic> {
    let mut lowerer = Lowerer {
        names: TempNames::for_program(prefix, program),
        reassigned: visit::reassigned_in(&program.body),
        assigned_props: visit::assigned_properties_in(&program.body),
        open: false,
        file,
        lowered: 0,
    };
    program.body = lowerer.lower_stmts(mem::take(&mut program.body))?;
    ensure_fully_lowered(&program.body, file)?;
    Ok(lowerer.lowered)
}

/// Lower a standalone expression. Statements that must run first are
/// returned alongside the rewritten expression.
///
/// The surrounding code is unknown, so any identifier or property the
/// expression reads may be rebound by a clause and is spilled.
pub fn lower_expression(
    expr: Expr,
    names: &mut TempNames,
    file: &str,
) -> Result<(Vec<Stmt>, Expr), Diagnostic> {
    let mut lowerer = Lowerer {
        names: mem::replace(names, TempNames::new("", HashSet::new())),
        reassigned: HashSet::new(),
        assigned_props: None,
        open: true,
        file,
        lowered: 0,
    };
    let mut pre = Vec::new();
    let result = lowerer.lower_expr(expr, &mut pre);
    *names = lowerer.names;
    Ok((pre, result?))
}

fn ensure_fully_lowered(stmts: &[Stmt], file: &str) -> Result<(), Diagnostic> {
    struct Leftover(Option<Span>);
    impl Visit for Leftover {
        fn visit_try_expr(&mut self, t: &TryExpr) {
            self.0.get_or_insert(t.span);
        }
        fn visit_raise(&mut self, r: &RaiseStmt) {
            self.0.get_or_insert(r.span);
        }
    }
    let mut v = Leftover(None);
    visit::walk_stmts(&mut v, stmts);
    match v.0 {
        None => Ok(()),
        Some(span) => Err(Diagnostic::internal(
            PASS,
            file,
            span,
            "try expression or raise left in lowered output",
        )),
    }
}

struct Lowerer<'f> {
    names: TempNames,
    /// Identifiers that may be rebound; only these need spilling.
    reassigned: HashSet<String>,
    /// Properties the unit writes by name; `None` if any may be written.
    assigned_props: Option<HashSet<String>>,
    /// Code outside the unit may rebind anything.
    open: bool,
    file: &'f str,
    lowered: usize,
}

impl Lowerer<'_> {
    fn lower_stmts(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>, Diagnostic> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.lower_stmt(stmt, &mut out)?;
        }
        Ok(out)
    }

    /// Push the lowered form of `stmt`, preceded by any hoisted statements.
    fn lower_stmt(&mut self, stmt: Stmt, out: &mut Vec<Stmt>) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Decl { kind, decls, span } => {
                // Split at each declarator whose initialiser hoists, so the
                // earlier declarators still run first.
                let mut group = Vec::new();
                for d in decls {
                    match d.init {
                        Some(init) if visit::contains_try_expr(&init) => {
                            if !group.is_empty() {
                                out.push(Stmt::Decl {
                                    kind,
                                    decls: mem::take(&mut group),
                                    span,
                                });
                            }
                            let init = self.lower_expr(init, out)?;
                            group.push(Declarator {
                                name: d.name,
                                init: Some(init),
                            });
                        }
                        init => group.push(Declarator {
                            name: d.name,
                            init: init.map(|e| self.lower_in_place(e)).transpose()?,
                        }),
                    }
                }
                out.push(Stmt::Decl {
                    kind,
                    decls: group,
                    span,
                });
            }
            Stmt::Expr { expr, span } => {
                let expr = self.lower_expr(expr, out)?;
                out.push(Stmt::Expr { expr, span });
            }
            Stmt::Block { body, span } => out.push(Stmt::Block {
                body: self.lower_stmts(body)?,
                span,
            }),
            Stmt::If {
                test,
                consequent,
                alternate,
                span,
            } => {
                let test = self.lower_expr(test, out)?;
                let consequent = Box::new(self.lower_branch(*consequent)?);
                let alternate = match alternate {
                    Some(alt) => Some(Box::new(self.lower_branch(*alt)?)),
                    None => None,
                };
                out.push(Stmt::If {
                    test,
                    consequent,
                    alternate,
                    span,
                });
            }
            Stmt::While { test, body, span } if visit::contains_try_expr(&test) => {
                // The test runs again on every iteration, so its hoisted
                // statements move inside the loop.
                let mut inner = Vec::new();
                let test = self.lower_expr(test, &mut inner)?;
                inner.push(Stmt::If {
                    test: Expr::Unary {
                        op: UnaryOp::Not,
                        arg: Box::new(test),
                    },
                    consequent: Box::new(Stmt::Break { span }),
                    alternate: None,
                    span,
                });
                inner.push(self.lower_branch(*body)?);
                out.push(Stmt::While {
                    test: Expr::Bool(true),
                    body: Box::new(Stmt::Block { body: inner, span }),
                    span,
                });
            }
            Stmt::While { test, body, span } => {
                let test = self.lower_in_place(test)?;
                let body = Box::new(self.lower_branch(*body)?);
                out.push(Stmt::While { test, body, span });
            }
            Stmt::Switch {
                discriminant,
                cases,
                span,
            } => {
                let discriminant = self.lower_expr(discriminant, out)?;
                let mut lowered = Vec::with_capacity(cases.len());
                for case in cases {
                    // Case tests are evaluated lazily, one after another.
                    let test = case.test.map(|t| self.lower_in_place(t)).transpose()?;
                    lowered.push(SwitchCase {
                        test,
                        body: self.lower_stmts(case.body)?,
                    });
                }
                out.push(Stmt::Switch {
                    discriminant,
                    cases: lowered,
                    span,
                });
            }
            Stmt::Return { arg, span } => {
                let arg = match arg {
                    Some(e) => Some(self.lower_expr(e, out)?),
                    None => None,
                };
                out.push(Stmt::Return { arg, span });
            }
            Stmt::Throw { arg, span } => {
                let arg = self.lower_expr(arg, out)?;
                out.push(Stmt::Throw { arg, span });
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
                span,
            } => {
                let block = self.lower_stmts(block)?;
                let handler = match handler {
                    Some(h) => Some(CatchClause {
                        param: h.param,
                        body: self.lower_stmts(h.body)?,
                    }),
                    None => None,
                };
                let finalizer = finalizer.map(|f| self.lower_stmts(f)).transpose()?;
                out.push(Stmt::Try {
                    block,
                    handler,
                    finalizer,
                    span,
                });
            }
            Stmt::Function(mut f) => {
                self.lower_function(&mut f)?;
                out.push(Stmt::Function(f));
            }
            Stmt::Raise(r) => {
                // Left for the owning try expression to rewrite.
                let value = self.lower_expr(r.value, out)?;
                out.push(Stmt::Raise(RaiseStmt {
                    id: r.id,
                    value,
                    span: r.span,
                }));
            }
            s @ (Stmt::Break { .. } | Stmt::Continue { .. }) => out.push(s),
        }
        Ok(())
    }

    /// Lower a single-statement position, adding a block when it gains
    /// hoisted statements.
    fn lower_branch(&mut self, stmt: Stmt) -> Result<Stmt, Diagnostic> {
        let span = stmt.span();
        let mut out = Vec::new();
        self.lower_stmt(stmt, &mut out)?;
        if out.len() == 1 {
            if let Some(s) = out.pop() {
                return Ok(s);
            }
        }
        Ok(Stmt::Block { body: out, span })
    }

    fn lower_function(&mut self, f: &mut Function) -> Result<(), Diagnostic> {
        match &mut f.body {
            FunctionBody::Block(body) => {
                *body = self.lower_stmts(mem::take(body))?;
            }
            FunctionBody::Expr(e) => {
                let expr = mem::replace(e.as_mut(), Expr::Undefined);
                **e = self.lower_in_place(expr)?;
            }
        }
        Ok(())
    }

    /// Lower a try expression's clause bodies, then the node itself.
    fn lower_node(&mut self, mut t: TryExpr) -> Result<LoweredForm, Diagnostic> {
        t.try_body = self.lower_stmts(mem::take(&mut t.try_body))?;
        t.catch_body = self.lower_stmts(mem::take(&mut t.catch_body))?;
        if let Some(body) = t.finally_body.take() {
            t.finally_body = Some(self.lower_stmts(body)?);
        }
        let form = lower_try_expr(t, &mut self.names, self.file)?;
        self.lowered += 1;
        Ok(form)
    }

    // -- Hoisting ----------------------------------------------

    /// Lower `expr`, pushing the statements that must run before it onto
    /// `pre`. Operands evaluated before a try expression are spilled to
    /// temporaries so hoisting keeps their order.
    fn lower_expr(&mut self, expr: Expr, pre: &mut Vec<Stmt>) -> Result<Expr, Diagnostic> {
        if !visit::contains_try_expr(&expr) {
            return self.lower_in_place(expr);
        }
        Ok(match expr {
            Expr::Try(t) => {
                let form = self.lower_node(*t)?;
                pre.push(form.decl);
                pre.push(form.try_stmt);
                form.reference
            }
            Expr::Array(items) => Expr::Array(self.lower_operands(items, pre)?),
            Expr::Unary { op, arg } => Expr::Unary {
                op,
                arg: Box::new(self.lower_expr(*arg, pre)?),
            },
            Expr::Await(arg) => Expr::Await(Box::new(self.lower_expr(*arg, pre)?)),
            Expr::Yield { arg, delegate } => Expr::Yield {
                arg: match arg {
                    Some(a) => Some(Box::new(self.lower_expr(*a, pre)?)),
                    None => None,
                },
                delegate,
            },
            Expr::Binary { op, left, right } => {
                let (left, right) = self.lower_pair(*left, *right, pre)?;
                Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            Expr::Logical { op, left, right } if visit::contains_try_expr(&right) => {
                self.lower_short_circuit(op, *left, *right, pre)?
            }
            Expr::Logical { op, left, right } => Expr::Logical {
                op,
                left: Box::new(self.lower_expr(*left, pre)?),
                right: Box::new(self.lower_in_place(*right)?),
            },
            Expr::Member { object, property } => Expr::Member {
                object: Box::new(self.lower_expr(*object, pre)?),
                property,
            },
            Expr::Index { object, index } => {
                let (object, index) = self.lower_pair(*object, *index, pre)?;
                Expr::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                }
            }
            Expr::Assign { target, value } if matches!(*target, Expr::Ident(_)) => Expr::Assign {
                target,
                value: Box::new(self.lower_expr(*value, pre)?),
            },
            Expr::Assign { target, value } => {
                let (mut parts, rebuild) = split_reference(*target);
                let n = parts.len();
                parts.push(*value);
                let mut lowered = self.lower_operands(parts, pre)?;
                let value = lowered.pop().unwrap_or(Expr::Undefined);
                debug_assert_eq!(lowered.len(), n);
                Expr::assign(rebuild.apply(lowered), value)
            }
            Expr::Call { callee, args } => {
                let (mut parts, rebuild) = split_reference(*callee);
                let lookup_may_change = match &rebuild {
                    Reference::Value => false,
                    Reference::Member(property) => !self.is_stable_property(property),
                    Reference::Index => true,
                };
                if lookup_may_change && args.iter().any(visit::contains_try_expr) {
                    return self.lower_bound_call(parts, rebuild, args, pre);
                }
                let n = parts.len();
                parts.extend(args);
                let mut lowered = self.lower_operands(parts, pre)?;
                let args = lowered.split_off(n);
                Expr::call(rebuild.apply(lowered), args)
            }
            other => self.lower_in_place(other)?,
        })
    }

    fn lower_pair(
        &mut self,
        first: Expr,
        second: Expr,
        pre: &mut Vec<Stmt>,
    ) -> Result<(Expr, Expr), Diagnostic> {
        let mut v = self.lower_operands(vec![first, second], pre)?;
        let second = v.pop().unwrap_or(Expr::Undefined);
        let first = v.pop().unwrap_or(Expr::Undefined);
        Ok((first, second))
    }

    /// Lower operands evaluated left to right. Every operand before the last
    /// one containing a try expression is spilled unless it is inert.
    fn lower_operands(
        &mut self,
        operands: Vec<Expr>,
        pre: &mut Vec<Stmt>,
    ) -> Result<Vec<Expr>, Diagnostic> {
        let last_try = operands.iter().rposition(visit::contains_try_expr);
        let mut out = Vec::with_capacity(operands.len());
        for (i, operand) in operands.into_iter().enumerate() {
            let lowered = self.lower_expr(operand, pre)?;
            match last_try {
                Some(k) if i < k => out.push(self.spill(lowered, pre)),
                _ => out.push(lowered),
            }
        }
        Ok(out)
    }

    fn spill(&mut self, expr: Expr, pre: &mut Vec<Stmt>) -> Expr {
        if self.is_inert(&expr) {
            return expr;
        }
        let name = self.names.fresh("spill");
        pre.push(Stmt::Decl {
            kind: VarKind::Const,
            decls: vec![Declarator {
                name: name.clone(),
                init: Some(expr),
            }],
            span: Span::default(),
        });
        Expr::Ident(name)
    }

    /// Values that a later try expression cannot change.
    fn is_inert(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Number(_)
            | Expr::Str(_)
            | Expr::Bool(_)
            | Expr::Null
            | Expr::Undefined
            | Expr::This
            | Expr::Function(_) => true,
            Expr::Ident(name) => {
                self.names.is_issued(name) || !(self.open || self.reassigned.contains(name))
            }
            _ => false,
        }
    }

    /// Whether no write to `obj.property` can happen anywhere in the unit.
    fn is_stable_property(&self, property: &str) -> bool {
        !self.open
            && self
                .assigned_props
                .as_ref()
                .is_some_and(|props| !props.contains(property))
    }

    /// `o.m(a, try ...)` looks up `o.m` before any argument runs. The
    /// receiver and the function are spilled and the call becomes
    /// `fn.call(o, a, tmp)`.
    fn lower_bound_call(
        &mut self,
        parts: Vec<Expr>,
        rebuild: Reference,
        args: Vec<Expr>,
        pre: &mut Vec<Stmt>,
    ) -> Result<Expr, Diagnostic> {
        let mut parts = parts.into_iter();
        let object = match parts.next() {
            Some(object) => self.lower_expr(object, pre)?,
            None => Expr::Undefined,
        };
        let receiver = self.spill(object, pre);
        let mut lookup = vec![receiver.clone()];
        for part in parts {
            let part = self.lower_expr(part, pre)?;
            lookup.push(part);
        }
        let func = self.spill(rebuild.apply(lookup), pre);

        let mut call_args = vec![receiver];
        call_args.extend(self.lower_operands(args, pre)?);
        Ok(Expr::call(
            Expr::Member {
                object: Box::new(func),
                property: "call".into(),
            },
            call_args,
        ))
    }

    /// `left && try ...` becomes
    /// `let c = left; if (c) { ...; c = tmp; }` and the expression `c`.
    fn lower_short_circuit(
        &mut self,
        op: LogicalOp,
        left: Expr,
        right: Expr,
        pre: &mut Vec<Stmt>,
    ) -> Result<Expr, Diagnostic> {
        let left = self.lower_expr(left, pre)?;
        let name = self.names.fresh("cond");
        pre.push(Stmt::Decl {
            kind: VarKind::Let,
            decls: vec![Declarator {
                name: name.clone(),
                init: Some(left),
            }],
            span: Span::default(),
        });
        let mut inner = Vec::new();
        let right = self.lower_expr(right, &mut inner)?;
        inner.push(Stmt::Expr {
            expr: Expr::assign(Expr::ident(&name), right),
            span: Span::default(),
        });
        let guard = match op {
            LogicalOp::And => Expr::ident(&name),
            LogicalOp::Or => Expr::Unary {
                op: UnaryOp::Not,
                arg: Box::new(Expr::ident(&name)),
            },
            LogicalOp::Nullish => Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::ident(&name)),
                right: Box::new(Expr::Null),
            },
        };
        pre.push(Stmt::If {
            test: guard,
            consequent: Box::new(Stmt::Block {
                body: inner,
                span: Span::default(),
            }),
            alternate: None,
            span: Span::default(),
        });
        Ok(Expr::Ident(name))
    }

    // -- Wrapping ----------------------------------------------

    /// Lower `expr` without hoisting: try expressions become immediately
    /// invoked wrappers in place, and nested function bodies are lowered.
    fn lower_in_place(&mut self, mut expr: Expr) -> Result<Expr, Diagnostic> {
        struct InPlace<'l, 'f> {
            lowerer: &'l mut Lowerer<'f>,
            error: Option<Diagnostic>,
        }
        impl VisitMut for InPlace<'_, '_> {
            fn visit_mut_expr(&mut self, expr: &mut Expr) {
                if self.error.is_some() {
                    return;
                }
                if let Expr::Try(t) = expr {
                    let span = t.span;
                    let t = mem::replace(t.as_mut(), TryExpr::new(NodeId(0), vec![], vec![], span));
                    match self.lowerer.wrap(t) {
                        Ok(e) => *expr = e,
                        Err(d) => self.error = Some(d),
                    }
                    return;
                }
                visit::walk_mut_expr(self, expr);
            }
            fn visit_mut_function(&mut self, f: &mut Function) {
                if self.error.is_some() {
                    return;
                }
                if let Err(d) = self.lowerer.lower_function(f) {
                    self.error = Some(d);
                }
            }
        }
        let mut v = InPlace {
            lowerer: self,
            error: None,
        };
        v.visit_mut_expr(&mut expr);
        match v.error {
            Some(d) => Err(d),
            None => Ok(expr),
        }
    }

    /// `(() => { let tmp; try ...; return tmp; })()`, made async and awaited
    /// when the clauses await, or a delegated generator when they yield.
    fn wrap(&mut self, t: TryExpr) -> Result<Expr, Diagnostic> {
        let span = t.span;
        let form = self.lower_node(t)?;
        let suspension = visit::suspension_in(std::slice::from_ref(&form.try_stmt));
        let body = vec![
            form.decl,
            form.try_stmt,
            Stmt::Return {
                arg: Some(form.reference),
                span,
            },
        ];
        let mut f = Function {
            name: None,
            params: Vec::new(),
            body: FunctionBody::Block(body),
            is_async: suspension.awaits,
            is_generator: false,
            is_arrow: true,
            span,
        };
        Ok(if suspension.yields {
            f.is_generator = true;
            f.is_arrow = false;
            let call = Expr::call(
                Expr::Member {
                    object: Box::new(Expr::Function(Box::new(f))),
                    property: "call".into(),
                },
                vec![Expr::This],
            );
            Expr::Yield {
                arg: Some(Box::new(call)),
                delegate: true,
            }
        } else if suspension.awaits {
            Expr::Await(Box::new(Expr::call(Expr::Function(Box::new(f)), vec![])))
        } else {
            Expr::call(Expr::Function(Box::new(f)), vec![])
        })
    }
}

/// Operands evaluated to form a reference, and how to rebuild it.
enum Reference {
    Value,
    Member(String),
    Index,
}

impl Reference {
    fn apply(self, mut parts: Vec<Expr>) -> Expr {
        match self {
            Reference::Value => parts.pop().unwrap_or(Expr::Undefined),
            Reference::Member(property) => Expr::Member {
                object: Box::new(parts.pop().unwrap_or(Expr::Undefined)),
                property,
            },
            Reference::Index => {
                let index = parts.pop().unwrap_or(Expr::Undefined);
                let object = parts.pop().unwrap_or(Expr::Undefined);
                Expr::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                }
            }
        }
    }
}

/// Split an assignment target or callee into its evaluated operands. A bare
/// identifier target is not evaluated and is kept whole.
fn split_reference(expr: Expr) -> (Vec<Expr>, Reference) {
    match expr {
        Expr::Member { object, property } => (vec![*object], Reference::Member(property)),
        Expr::Index { object, index } => (vec![*object, *index], Reference::Index),
        other => (vec![other], Reference::Value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{emit, lexer, parser, pass1_collect, pass2_validate};

    fn prepared(src: &str) -> Program {
        let tokens = lexer::lex(src, "l.js").unwrap();
        let mut program = parser::parse(&tokens, "l.js").unwrap();
        pass1_collect::annotate(&mut program);
        let errors = pass2_validate::validate(&mut program, "l.js", usize::MAX);
        assert!(errors.is_empty(), "{:?}", errors);
        program
    }

    fn lowered(src: &str) -> String {
        let mut program = prepared(src);
        lower_program(&mut program, "__", "l.js").unwrap();
        emit::emit_program(&program, "l.js").unwrap()
    }

    #[test]
    fn temp_names_skip_taken_and_count_up() {
        let taken: HashSet<String> = ["__raise0".to_owned()].into_iter().collect();
        let mut names = TempNames::new("__", taken);
        assert_eq!(names.fresh("raise"), "__raise1");
        assert_eq!(names.fresh("spill"), "__spill2");
        assert!(names.is_issued("__raise1"));
        assert!(!names.is_issued("__raise0"));
    }

    #[test]
    fn basic_declaration_is_hoisted() {
        assert_eq!(
            lowered("let v = try { raise 1; } catch { raise 2; };"),
            "let __raise0;\n\
             try {\n  __raise0 = 1;\n} catch {\n  __raise0 = 2;\n}\n\
             let v = __raise0;\n"
        );
    }

    #[test]
    fn finally_binding_reads_the_temporary() {
        assert_eq!(
            lowered("let v = try { raise 1; } catch (e) { raise 2; } finally (r) { log(r); raise 3; };"),
            "let __raise0;\n\
             try {\n  __raise0 = 1;\n} catch (e) {\n  __raise0 = 2;\n} finally {\n  let r = __raise0;\n  log(r);\n  __raise0 = 3;\n}\n\
             let v = __raise0;\n"
        );
    }

    #[test]
    fn other_control_flow_is_untouched() {
        let out = lowered(
            "function f() { return try { if (a) { return 5; } raise 1; } catch (e) { if (e) { throw e; } raise 0; }; }",
        );
        assert!(out.contains("return 5;"));
        assert!(out.contains("throw e;"));
        assert!(out.contains("__raise0 = 1;"));
    }

    #[test]
    fn nested_try_expressions_lower_inside_out() {
        let out = lowered(
            "let v = try { raise try { raise 1; } catch { raise 2; }; } catch { raise 3; };",
        );
        assert_eq!(
            out,
            "let __raise1;\n\
             try {\n  let __raise0;\n  try {\n    __raise0 = 1;\n  } catch {\n    __raise0 = 2;\n  }\n  __raise1 = __raise0;\n} catch {\n  __raise1 = 3;\n}\n\
             let v = __raise1;\n"
        );
    }

    #[test]
    fn earlier_operands_are_spilled() {
        let out = lowered("let n = 0;\nn = 1;\nlet v = n + try { n = 2; raise 3; } catch { raise 0; };");
        assert!(out.contains("const __spill0 = n;"), "{}", out);
        assert!(out.contains("let v = __spill0 + __raise1;"), "{}", out);
    }

    #[test]
    fn stable_operands_are_not_spilled() {
        let out = lowered("console.log(\"x\", try { raise 1; } catch { raise 2; });");
        assert!(!out.contains("__spill"), "{}", out);
        assert!(out.ends_with("console.log(\"x\", __raise0);\n"), "{}", out);
    }

    #[test]
    fn rewritten_method_is_read_before_the_arguments() {
        let out = lowered("o.m = f;\nlet r = o.m(try { raise 1; } catch { raise 2; });");
        assert!(out.contains("const __spill0 = o.m;\nlet __raise1;\n"), "{}", out);
        assert!(out.ends_with("let r = __spill0.call(o, __raise1);\n"), "{}", out);
    }

    #[test]
    fn computed_callee_is_read_before_the_arguments() {
        let out = lowered("let r = fns[k](try { raise 1; } catch { raise 2; });");
        assert!(out.starts_with("const __spill0 = fns[k];\n"), "{}", out);
        assert!(out.ends_with("let r = __spill0.call(fns, __raise1);\n"), "{}", out);
    }

    #[test]
    fn fragment_spills_every_free_operand() {
        let tokens = lexer::lex("f(x, try { raise 1; } catch { raise 2; })", "l.js").unwrap();
        let expr = parser::parse_expression(&tokens, "l.js").unwrap();
        let mut program = Program {
            body: vec![Stmt::Expr {
                expr,
                span: Span::default(),
            }],
        };
        pass1_collect::annotate(&mut program);
        assert!(pass2_validate::validate(&mut program, "l.js", 1).is_empty());
        let mut names = TempNames::for_program("__", &program);
        let expr = match program.body.pop() {
            Some(Stmt::Expr { expr, .. }) => expr,
            other => panic!("unexpected {:?}", other),
        };
        let (pre, expr) = lower_expression(expr, &mut names, "l.js").unwrap();
        assert_eq!(pre.len(), 4);
        assert_eq!(emit::emit_expr(&expr, "l.js").unwrap(), "__spill0(__spill1, __raise2)");
    }

    #[test]
    fn short_circuit_guards_the_try_expression() {
        let out = lowered("let v = ok && try { raise 1; } catch { raise 2; };");
        assert_eq!(
            out,
            "let __cond0 = ok;\n\
             if (__cond0) {\n  let __raise1;\n  try {\n    __raise1 = 1;\n  } catch {\n    __raise1 = 2;\n  }\n  __cond0 = __raise1;\n}\n\
             let v = __cond0;\n"
        );
    }

    #[test]
    fn while_test_is_reevaluated_each_iteration() {
        let out = lowered("while (try { raise next(); } catch { raise false; }) { step(); }");
        assert_eq!(
            out,
            "while (true) {\n  let __raise0;\n  try {\n    __raise0 = next();\n  } catch {\n    __raise0 = false;\n  }\n  if (!__raise0) {\n    break;\n  }\n  {\n    step();\n  }\n}\n"
        );
    }

    #[test]
    fn single_statement_branch_gains_a_block() {
        let out = lowered("if (a) x = try { raise 1; } catch { raise 2; };");
        assert!(out.starts_with("if (a) {\n  let __raise0;\n"), "{}", out);
        assert!(out.contains("  x = __raise0;\n}"), "{}", out);
    }

    #[test]
    fn declarations_split_at_the_hoisted_initializer() {
        let out = lowered("let a = f(), b = try { raise 1; } catch { raise 2; }, c = 3;");
        assert!(out.starts_with("let a = f();\nlet __raise0;\n"), "{}", out);
        assert!(out.ends_with("let b = __raise0, c = 3;\n"), "{}", out);
    }

    #[test]
    fn arrow_expression_body_is_wrapped() {
        let out = lowered("let f = () => try { raise 1; } catch { raise 2; };");
        assert_eq!(
            out,
            "let f = () => (() => {\n  let __raise0;\n  try {\n    __raise0 = 1;\n  } catch {\n    __raise0 = 2;\n  }\n  return __raise0;\n})();\n"
        );
    }

    #[test]
    fn wrapper_is_async_when_clauses_await() {
        let out = lowered("let f = async () => try { raise await g(); } catch { raise 0; };");
        assert!(out.contains("await (async () => {"), "{}", out);
    }

    #[test]
    fn wrapper_delegates_when_clauses_yield() {
        let out = lowered(
            "function* gen(k) { switch (k) { case try { raise yield 1; } catch { raise 0; }: return 1; } }",
        );
        assert!(out.contains("case yield* (function* () {"), "{}", out);
        assert!(out.contains("}).call(this):"), "{}", out);
    }

    #[test]
    fn await_in_raise_is_copied_verbatim() {
        let out = lowered("async function f() { return try { raise await g(); } catch { raise 0; }; }");
        assert!(out.contains("__raise0 = await g();"), "{}", out);
    }

    #[test]
    fn unvalidated_node_is_an_internal_error() {
        let tokens = lexer::lex("let v = try { raise 1; } catch { raise 2; };", "l.js").unwrap();
        let mut program = parser::parse(&tokens, "l.js").unwrap();
        pass1_collect::annotate(&mut program);
        let err = lower_program(&mut program, "__", "l.js").unwrap_err();
        assert!(err.is_internal());
        assert_eq!(err.pass, 3);
    }

    #[test]
    fn temporaries_avoid_user_names() {
        let out = lowered("let __raise0 = 1;\nlet v = try { raise __raise0; } catch { raise 2; };");
        assert!(out.contains("let __raise1;"), "{}", out);
        assert!(out.contains("__raise1 = __raise0;"), "{}", out);
    }
}

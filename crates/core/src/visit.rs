//! Read-only and mutable tree walkers.
//!
//! Each `visit_*` method defaults to the matching `walk_*` function, which
//! visits children in source order. Override a method and skip the walk to
//! stop descent (function bodies, nested try expressions).

use crate::ast::*;

pub trait Visit {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_function(&mut self, f: &Function) {
        walk_function(self, f);
    }

    fn visit_try_expr(&mut self, t: &TryExpr) {
        walk_try_expr(self, t);
    }

    fn visit_raise(&mut self, r: &RaiseStmt) {
        self.visit_expr(&r.value);
    }
}

pub fn walk_stmts<V: Visit + ?Sized>(v: &mut V, stmts: &[Stmt]) {
    for s in stmts {
        v.visit_stmt(s);
    }
}

pub fn walk_stmt<V: Visit + ?Sized>(v: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Decl { decls, .. } => {
            for d in decls {
                if let Some(init) = &d.init {
                    v.visit_expr(init);
                }
            }
        }
        Stmt::Expr { expr, .. } => v.visit_expr(expr),
        Stmt::Block { body, .. } => walk_stmts(v, body),
        Stmt::If {
            test,
            consequent,
            alternate,
            ..
        } => {
            v.visit_expr(test);
            v.visit_stmt(consequent);
            if let Some(alt) = alternate {
                v.visit_stmt(alt);
            }
        }
        Stmt::While { test, body, .. } => {
            v.visit_expr(test);
            v.visit_stmt(body);
        }
        Stmt::Switch {
            discriminant,
            cases,
            ..
        } => {
            v.visit_expr(discriminant);
            for case in cases {
                if let Some(test) = &case.test {
                    v.visit_expr(test);
                }
                walk_stmts(v, &case.body);
            }
        }
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
        Stmt::Return { arg, .. } => {
            if let Some(arg) = arg {
                v.visit_expr(arg);
            }
        }
        Stmt::Throw { arg, .. } => v.visit_expr(arg),
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            walk_stmts(v, block);
            if let Some(h) = handler {
                walk_stmts(v, &h.body);
            }
            if let Some(f) = finalizer {
                walk_stmts(v, f);
            }
        }
        Stmt::Function(f) => v.visit_function(f),
        Stmt::Raise(r) => v.visit_raise(r),
    }
}

pub fn walk_expr<V: Visit + ?Sized>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::Number(_)
        | Expr::Str(_)
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Undefined
        | Expr::This
        | Expr::Ident(_) => {}
        Expr::Array(items) => {
            for item in items {
                v.visit_expr(item);
            }
        }
        Expr::Unary { arg, .. } | Expr::Await(arg) => v.visit_expr(arg),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        Expr::Assign { target, value } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
        Expr::Member { object, .. } => v.visit_expr(object),
        Expr::Index { object, index } => {
            v.visit_expr(object);
            v.visit_expr(index);
        }
        Expr::Call { callee, args } => {
            v.visit_expr(callee);
            for a in args {
                v.visit_expr(a);
            }
        }
        Expr::Yield { arg, .. } => {
            if let Some(arg) = arg {
                v.visit_expr(arg);
            }
        }
        Expr::Function(f) => v.visit_function(f),
        Expr::Try(t) => v.visit_try_expr(t),
    }
}

pub fn walk_function<V: Visit + ?Sized>(v: &mut V, f: &Function) {
    match &f.body {
        FunctionBody::Block(body) => walk_stmts(v, body),
        FunctionBody::Expr(e) => v.visit_expr(e),
    }
}

pub fn walk_try_expr<V: Visit + ?Sized>(v: &mut V, t: &TryExpr) {
    walk_stmts(v, &t.try_body);
    walk_stmts(v, &t.catch_body);
    if let Some(body) = &t.finally_body {
        walk_stmts(v, body);
    }
}

// ──────────────────────────────────────────────
// Mutable walker
// ──────────────────────────────────────────────

pub trait VisitMut {
    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        walk_mut_stmt(self, stmt);
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        walk_mut_expr(self, expr);
    }

    fn visit_mut_function(&mut self, f: &mut Function) {
        walk_mut_function(self, f);
    }

    fn visit_mut_try_expr(&mut self, t: &mut TryExpr) {
        walk_mut_try_expr(self, t);
    }
}

pub fn walk_mut_stmts<V: VisitMut + ?Sized>(v: &mut V, stmts: &mut [Stmt]) {
    for s in stmts {
        v.visit_mut_stmt(s);
    }
}

pub fn walk_mut_stmt<V: VisitMut + ?Sized>(v: &mut V, stmt: &mut Stmt) {
    match stmt {
        Stmt::Decl { decls, .. } => {
            for d in decls {
                if let Some(init) = &mut d.init {
                    v.visit_mut_expr(init);
                }
            }
        }
        Stmt::Expr { expr, .. } => v.visit_mut_expr(expr),
        Stmt::Block { body, .. } => walk_mut_stmts(v, body),
        Stmt::If {
            test,
            consequent,
            alternate,
            ..
        } => {
            v.visit_mut_expr(test);
            v.visit_mut_stmt(consequent);
            if let Some(alt) = alternate {
                v.visit_mut_stmt(alt);
            }
        }
        Stmt::While { test, body, .. } => {
            v.visit_mut_expr(test);
            v.visit_mut_stmt(body);
        }
        Stmt::Switch {
            discriminant,
            cases,
            ..
        } => {
            v.visit_mut_expr(discriminant);
            for case in cases {
                if let Some(test) = &mut case.test {
                    v.visit_mut_expr(test);
                }
                walk_mut_stmts(v, &mut case.body);
            }
        }
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
        Stmt::Return { arg, .. } => {
            if let Some(arg) = arg {
                v.visit_mut_expr(arg);
            }
        }
        Stmt::Throw { arg, .. } => v.visit_mut_expr(arg),
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            walk_mut_stmts(v, block);
            if let Some(h) = handler {
                walk_mut_stmts(v, &mut h.body);
            }
            if let Some(f) = finalizer {
                walk_mut_stmts(v, f);
            }
        }
        Stmt::Function(f) => v.visit_mut_function(f),
        Stmt::Raise(r) => v.visit_mut_expr(&mut r.value),
    }
}

pub fn walk_mut_expr<V: VisitMut + ?Sized>(v: &mut V, expr: &mut Expr) {
    match expr {
        Expr::Number(_)
        | Expr::Str(_)
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Undefined
        | Expr::This
        | Expr::Ident(_) => {}
        Expr::Array(items) => {
            for item in items {
                v.visit_mut_expr(item);
            }
        }
        Expr::Unary { arg, .. } | Expr::Await(arg) => v.visit_mut_expr(arg),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            v.visit_mut_expr(left);
            v.visit_mut_expr(right);
        }
        Expr::Assign { target, value } => {
            v.visit_mut_expr(target);
            v.visit_mut_expr(value);
        }
        Expr::Member { object, .. } => v.visit_mut_expr(object),
        Expr::Index { object, index } => {
            v.visit_mut_expr(object);
            v.visit_mut_expr(index);
        }
        Expr::Call { callee, args } => {
            v.visit_mut_expr(callee);
            for a in args {
                v.visit_mut_expr(a);
            }
        }
        Expr::Yield { arg, .. } => {
            if let Some(arg) = arg {
                v.visit_mut_expr(arg);
            }
        }
        Expr::Function(f) => v.visit_mut_function(f),
        Expr::Try(t) => v.visit_mut_try_expr(t),
    }
}

pub fn walk_mut_function<V: VisitMut + ?Sized>(v: &mut V, f: &mut Function) {
    match &mut f.body {
        FunctionBody::Block(body) => walk_mut_stmts(v, body),
        FunctionBody::Expr(e) => v.visit_mut_expr(e),
    }
}

pub fn walk_mut_try_expr<V: VisitMut + ?Sized>(v: &mut V, t: &mut TryExpr) {
    walk_mut_stmts(v, &mut t.try_body);
    walk_mut_stmts(v, &mut t.catch_body);
    if let Some(body) = &mut t.finally_body {
        walk_mut_stmts(v, body);
    }
}

// ──────────────────────────────────────────────
// Queries
// ──────────────────────────────────────────────

/// Whether `expr` contains a try expression outside any nested function.
pub fn contains_try_expr(expr: &Expr) -> bool {
    struct Finder(bool);
    impl Visit for Finder {
        fn visit_function(&mut self, _: &Function) {}
        fn visit_try_expr(&mut self, _: &TryExpr) {
            self.0 = true;
        }
    }
    let mut f = Finder(false);
    f.visit_expr(expr);
    f.0
}

/// Suspension points reachable in `stmts` without entering a nested function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Suspension {
    pub awaits: bool,
    pub yields: bool,
}

pub fn suspension_in(stmts: &[Stmt]) -> Suspension {
    struct Finder(Suspension);
    impl Visit for Finder {
        fn visit_function(&mut self, _: &Function) {}
        fn visit_expr(&mut self, expr: &Expr) {
            match expr {
                Expr::Await(_) => self.0.awaits = true,
                Expr::Yield { .. } => self.0.yields = true,
                _ => {}
            }
            walk_expr(self, expr);
        }
    }
    let mut f = Finder(Suspension::default());
    walk_stmts(&mut f, stmts);
    f.0
}

/// Every name bound or referenced anywhere in the program, nested functions
/// included.
pub fn identifiers_in(stmts: &[Stmt]) -> std::collections::HashSet<String> {
    struct Names(std::collections::HashSet<String>);
    impl Visit for Names {
        fn visit_stmt(&mut self, stmt: &Stmt) {
            match stmt {
                Stmt::Decl { decls, .. } => {
                    self.0.extend(decls.iter().map(|d| d.name.clone()));
                }
                Stmt::Try {
                    handler: Some(h), ..
                } => {
                    if let Some(p) = &h.param {
                        self.0.insert(p.clone());
                    }
                }
                _ => {}
            }
            walk_stmt(self, stmt);
        }
        fn visit_expr(&mut self, expr: &Expr) {
            if let Expr::Ident(name) = expr {
                self.0.insert(name.clone());
            }
            walk_expr(self, expr);
        }
        fn visit_function(&mut self, f: &Function) {
            if let Some(n) = &f.name {
                self.0.insert(n.clone());
            }
            self.0.extend(f.params.iter().cloned());
            walk_function(self, f);
        }
        fn visit_try_expr(&mut self, t: &TryExpr) {
            self.0.extend(t.catch_param.iter().cloned());
            self.0.extend(t.finally_param.iter().cloned());
            walk_try_expr(self, t);
        }
    }
    let mut names = Names(Default::default());
    walk_stmts(&mut names, stmts);
    names.0
}

/// Names whose binding may change after initialisation: assignment targets,
/// `var` declarations and function declarations, nested functions included.
pub fn reassigned_in(stmts: &[Stmt]) -> std::collections::HashSet<String> {
    struct Names(std::collections::HashSet<String>);
    impl Visit for Names {
        fn visit_stmt(&mut self, stmt: &Stmt) {
            match stmt {
                Stmt::Decl {
                    kind: VarKind::Var,
                    decls,
                    ..
                } => self.0.extend(decls.iter().map(|d| d.name.clone())),
                Stmt::Function(f) => self.0.extend(f.name.iter().cloned()),
                _ => {}
            }
            walk_stmt(self, stmt);
        }
        fn visit_expr(&mut self, expr: &Expr) {
            if let Expr::Assign { target, .. } = expr {
                if let Expr::Ident(name) = target.as_ref() {
                    self.0.insert(name.clone());
                }
            }
            walk_expr(self, expr);
        }
    }
    let mut names = Names(Default::default());
    walk_stmts(&mut names, stmts);
    names.0
}

/// Property names written through `obj.name = ...`, nested functions
/// included. `None` when a computed `obj[key] = ...` write may reach any
/// property.
pub fn assigned_properties_in(stmts: &[Stmt]) -> Option<std::collections::HashSet<String>> {
    struct Props {
        names: std::collections::HashSet<String>,
        computed: bool,
    }
    impl Visit for Props {
        fn visit_expr(&mut self, expr: &Expr) {
            if let Expr::Assign { target, .. } = expr {
                match target.as_ref() {
                    Expr::Member { property, .. } => {
                        self.names.insert(property.clone());
                    }
                    Expr::Index { .. } => self.computed = true,
                    _ => {}
                }
            }
            walk_expr(self, expr);
        }
    }
    let mut props = Props {
        names: Default::default(),
        computed: false,
    };
    walk_stmts(&mut props, stmts);
    (!props.computed).then_some(props.names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};

    fn program(src: &str) -> Program {
        let tokens = lexer::lex(src, "v.js").unwrap();
        parser::parse(&tokens, "v.js").unwrap()
    }

    #[test]
    fn contains_try_expr_stops_at_functions() {
        let p = program("f(() => try { raise 1; } catch { raise 2; });\ng(try { } catch { });");
        let exprs: Vec<&Expr> = p
            .body
            .iter()
            .map(|s| match s {
                Stmt::Expr { expr, .. } => expr,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert!(!contains_try_expr(exprs[0]));
        assert!(contains_try_expr(exprs[1]));
    }

    #[test]
    fn suspension_ignores_nested_functions() {
        let p = program("await a;\nasync function f() { await b; }");
        assert_eq!(
            suspension_in(&p.body),
            Suspension {
                awaits: true,
                yields: false
            }
        );
        let p = program("function* g() { yield 1; }");
        assert_eq!(suspension_in(&p.body), Suspension::default());
    }

    #[test]
    fn identifiers_include_bindings_and_references() {
        let p = program("let a = b;\nfunction f(c) { try { } catch (d) { } }");
        let names = identifiers_in(&p.body);
        for n in ["a", "b", "f", "c", "d"] {
            assert!(names.contains(n), "missing {}", n);
        }
    }

    #[test]
    fn reassigned_names() {
        let p = program("let a = 1;\nvar b;\nfunction f() { a = 2; }\nconst c = 3;");
        let names = reassigned_in(&p.body);
        assert!(names.contains("a"));
        assert!(names.contains("b"));
        assert!(names.contains("f"));
        assert!(!names.contains("c"));
    }

    #[test]
    fn assigned_properties() {
        let p = program("o.m = 1;\nfunction f() { a.n = 2; }\nlog.push(3);");
        let props = assigned_properties_in(&p.body).unwrap();
        assert!(props.contains("m"));
        assert!(props.contains("n"));
        assert!(!props.contains("push"));

        let p = program("o.m = 1;\nfns[0] = 2;");
        assert!(assigned_properties_in(&p.body).is_none());
    }
}

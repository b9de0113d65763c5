//! Pass 1: Raise collection -- attribute every `raise` to the clause of the
//! try expression that owns it.
//!
//! A try expression owns the raises in its direct clause bodies, including
//! those nested in ordinary statements (`if`, loops, standard `try`), but
//! not those inside nested functions or nested try expressions.

use crate::ast::*;
use crate::visit::{self, Visit, VisitMut};

struct ClauseCollector {
    clause: Clause,
    sites: Vec<RaiseSite>,
}

impl Visit for ClauseCollector {
    fn visit_function(&mut self, _: &Function) {}

    fn visit_try_expr(&mut self, _: &TryExpr) {}

    fn visit_raise(&mut self, r: &RaiseStmt) {
        self.sites.push(RaiseSite {
            clause: self.clause,
            id: r.id,
            span: r.span,
        });
        // The raised value can only nest statements through functions and
        // try expressions, neither of which belongs to this clause.
    }
}

fn collect_clause(body: &[Stmt], clause: Clause) -> Vec<RaiseSite> {
    let mut c = ClauseCollector {
        clause,
        sites: Vec::new(),
    };
    visit::walk_stmts(&mut c, body);
    c.sites
}

/// Raise sites of `t`, per clause, in depth-first source order.
pub fn collect_raises(t: &TryExpr) -> RaiseSites {
    RaiseSites {
        try_raises: collect_clause(&t.try_body, Clause::Try),
        catch_raises: collect_clause(&t.catch_body, Clause::Catch),
        finally_raises: t
            .finally_body
            .as_deref()
            .map(|body| collect_clause(body, Clause::Finally))
            .unwrap_or_default(),
    }
}

/// Attach raise sites to every try expression in the program, innermost
/// first. Returns the number of try expressions annotated.
pub fn annotate(program: &mut Program) -> usize {
    struct Annotator(usize);
    impl VisitMut for Annotator {
        fn visit_mut_try_expr(&mut self, t: &mut TryExpr) {
            visit::walk_mut_try_expr(self, t);
            let sites = collect_raises(t);
            tracing::trace!(
                node = t.id.0,
                raises = sites.len(),
                "collected raise sites"
            );
            t.raises = Some(sites);
            self.0 += 1;
        }
    }
    let mut a = Annotator(0);
    visit::walk_mut_stmts(&mut a, &mut program.body);
    a.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};

    fn first_try_expr(src: &str) -> TryExpr {
        let tokens = lexer::lex(src, "c.js").unwrap();
        let program = parser::parse(&tokens, "c.js").unwrap();
        struct First(Option<TryExpr>);
        impl Visit for First {
            fn visit_try_expr(&mut self, t: &TryExpr) {
                if self.0.is_none() {
                    self.0 = Some(t.clone());
                }
            }
        }
        let mut f = First(None);
        visit::walk_stmts(&mut f, &program.body);
        f.0.expect("no try expression in source")
    }

    #[test]
    fn collects_per_clause_in_source_order() {
        let t = first_try_expr(
            "let v = try { if (a) { raise 1; } raise 2; } catch (e) { raise 3; } finally (r) { raise 4; };",
        );
        let sites = collect_raises(&t);
        assert_eq!(sites.try_raises.len(), 2);
        assert!(sites.try_raises[0].span.start < sites.try_raises[1].span.start);
        assert_eq!(sites.catch_raises.len(), 1);
        assert_eq!(sites.finally_raises.len(), 1);
        assert!(sites.iter().all(|s| match s.clause {
            Clause::Try => sites.try_raises.contains(s),
            Clause::Catch => sites.catch_raises.contains(s),
            Clause::Finally => sites.finally_raises.contains(s),
        }));
    }

    #[test]
    fn raises_in_standard_try_statement_belong_to_enclosing_expression() {
        let t = first_try_expr(
            "let v = try { try { raise 1; } catch (x) { raise 2; } finally { raise 3; } } catch { raise 0; };",
        );
        let sites = collect_raises(&t);
        assert_eq!(sites.try_raises.len(), 3);
        assert_eq!(sites.catch_raises.len(), 1);
    }

    #[test]
    fn nested_try_expression_raises_are_not_collected() {
        let t = first_try_expr(
            "let v = try { let w = try { raise 10; } catch { raise 20; }; raise w; } catch { raise 0; };",
        );
        let sites = collect_raises(&t);
        assert_eq!(sites.try_raises.len(), 1);
        assert_eq!(sites.catch_raises.len(), 1);
    }

    #[test]
    fn raises_inside_nested_functions_are_not_collected() {
        let t = first_try_expr(
            "let v = try { let f = () => try { raise 1; } catch { raise 2; }; } catch { };",
        );
        assert!(collect_raises(&t).is_empty());
    }

    #[test]
    fn annotate_covers_every_try_expression() {
        let src = "let a = try { raise 1; } catch { raise 2; };\n\
                   function f() { return try { raise try { raise 3; } catch { raise 4; }; } catch { raise 5; }; }";
        let tokens = lexer::lex(src, "c.js").unwrap();
        let mut program = parser::parse(&tokens, "c.js").unwrap();
        assert_eq!(annotate(&mut program), 3);
    }
}

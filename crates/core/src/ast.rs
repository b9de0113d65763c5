//! Shared AST types for the transpiler.
//!
//! The parser produces these, the raise collector and validator annotate
//! [`TryExpr`] nodes in place, and the lowering pass rewrites the tree into
//! the standard subset that the emitter and the evaluator understand.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Spans and node identity
// ──────────────────────────────────────────────

/// Character range in the source text, plus the line the range starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    #[serde(skip)]
    pub line: u32,
}

impl Span {
    pub fn new(start: u32, end: u32, line: u32) -> Self {
        Span { start, end, line }
    }

    /// Span covering `self` through `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
        }
    }
}

/// Identity of a `raise` statement or a try expression within one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

// ──────────────────────────────────────────────
// Statements
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Let,
    Const,
    Var,
}

impl VarKind {
    pub fn keyword(self) -> &'static str {
        match self {
            VarKind::Let => "let",
            VarKind::Const => "const",
            VarKind::Var => "var",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Decl {
        kind: VarKind,
        decls: Vec<Declarator>,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
    Block {
        body: Vec<Stmt>,
        span: Span,
    },
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Return {
        arg: Option<Expr>,
        span: Span,
    },
    Throw {
        arg: Expr,
        span: Span,
    },
    /// Standard statement-level try. At least one of handler/finalizer is set.
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
        span: Span,
    },
    /// `function name(...) { ... }` declaration; `name` is always set.
    Function(Box<Function>),
    /// `raise <expr>;` -- only produced inside raise-receiving clauses.
    Raise(RaiseStmt),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Decl { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Return { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Try { span, .. } => *span,
            Stmt::Function(f) => f.span,
            Stmt::Raise(r) => r.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaiseStmt {
    pub id: NodeId,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_arrow: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Arrow functions only: `x => expr`
    Expr(Box<Expr>),
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    This,
    Ident(String),
    Array(Vec<Expr>),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `target = value`; target is an `Ident`, `Member` or `Index`.
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Await(Box<Expr>),
    Yield {
        arg: Option<Box<Expr>>,
        delegate: bool,
    },
    Function(Box<Function>),
    Try(Box<TryExpr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Ident(name.into())
    }

    pub fn assign(target: Expr, value: Expr) -> Expr {
        Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }
}

// ──────────────────────────────────────────────
// Try expressions
// ──────────────────────────────────────────────

/// Which clause of a [`TryExpr`] a raise site belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    Try,
    Catch,
    Finally,
}

impl Clause {
    pub fn as_str(self) -> &'static str {
        match self {
            Clause::Try => "try",
            Clause::Catch => "catch",
            Clause::Finally => "finally",
        }
    }
}

/// One `raise` occurrence attributed to a clause. The raised value stays in
/// the tree; the site refers to its statement by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaiseSite {
    pub clause: Clause,
    pub id: NodeId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RaiseSites {
    pub try_raises: Vec<RaiseSite>,
    pub catch_raises: Vec<RaiseSite>,
    pub finally_raises: Vec<RaiseSite>,
}

impl RaiseSites {
    pub fn is_empty(&self) -> bool {
        self.try_raises.is_empty() && self.catch_raises.is_empty() && self.finally_raises.is_empty()
    }

    pub fn len(&self) -> usize {
        self.try_raises.len() + self.catch_raises.len() + self.finally_raises.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RaiseSite> {
        self.try_raises
            .iter()
            .chain(&self.catch_raises)
            .chain(&self.finally_raises)
    }
}

/// Structural rule checked by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    Symmetry,
    FinallyBinding,
}

impl Rule {
    pub fn as_str(self) -> &'static str {
        match self {
            Rule::Symmetry => "symmetry",
            Rule::FinallyBinding => "finally-binding",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationResult {
    Valid,
    Invalid {
        rule: Rule,
        reason: String,
        span: Span,
    },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// `try { ... } catch (e) { ... } finally (name) { ... }` in expression position.
#[derive(Debug, Clone, PartialEq)]
pub struct TryExpr {
    pub id: NodeId,
    pub try_body: Vec<Stmt>,
    pub catch_param: Option<String>,
    pub catch_body: Vec<Stmt>,
    /// Only legal together with `finally_body`.
    pub finally_param: Option<String>,
    pub finally_body: Option<Vec<Stmt>>,
    pub span: Span,
    /// Set by the raise collector.
    pub raises: Option<RaiseSites>,
    /// Set by the validator.
    pub verdict: Option<ValidationResult>,
}

impl TryExpr {
    pub fn new(id: NodeId, try_body: Vec<Stmt>, catch_body: Vec<Stmt>, span: Span) -> Self {
        TryExpr {
            id,
            try_body,
            catch_param: None,
            catch_body,
            finally_param: None,
            finally_body: None,
            span,
            raises: None,
            verdict: None,
        }
    }

    /// Whether `raise` statements inside the finally body belong to this node.
    pub fn finally_receives_raise(&self) -> bool {
        self.finally_body.is_some() && self.finally_param.is_some()
    }
}

//! Tree-walking interpreter for the standard (lowered) subset.
//!
//! Statements complete normally or abruptly (`return`, `break`,
//! `continue`); exceptions travel as [`Signal::Throw`] so the program's own
//! `try` statements can catch them. A `finally` that completes abruptly
//! replaces the completion of its `try`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use tryexpr_core::ast::*;

use crate::builtins;
use crate::types::{Closure, EvalError, Value};

// ──────────────────────────────────────────────
// Scopes
// ──────────────────────────────────────────────

pub type Env = Rc<Scope>;

#[derive(Debug)]
struct Binding {
    value: Value,
    mutable: bool,
}

#[derive(Debug)]
pub struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Env>,
    /// Function bodies and the global scope; `var` declarations land here.
    function: bool,
}

enum AssignError {
    Undeclared,
    Constant,
}

impl Scope {
    pub fn new(parent: Option<Env>, function: bool) -> Env {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent,
            function,
        })
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.vars
            .borrow_mut()
            .insert(name.to_owned(), Binding { value, mutable });
    }

    fn lookup(env: &Env, name: &str) -> Option<Value> {
        let mut scope = Some(env);
        while let Some(s) = scope {
            if let Some(b) = s.vars.borrow().get(name) {
                return Some(b.value.clone());
            }
            scope = s.parent.as_ref();
        }
        None
    }

    fn assign(env: &Env, name: &str, value: Value) -> Result<(), AssignError> {
        let mut scope = Some(env);
        while let Some(s) = scope {
            if let Some(b) = s.vars.borrow_mut().get_mut(name) {
                if !b.mutable {
                    return Err(AssignError::Constant);
                }
                b.value = value;
                return Ok(());
            }
            scope = s.parent.as_ref();
        }
        Err(AssignError::Undeclared)
    }

    fn function_scope(env: &Env) -> &Env {
        let mut scope = env;
        while !scope.function {
            match &scope.parent {
                Some(p) => scope = p,
                None => break,
            }
        }
        scope
    }
}

// ──────────────────────────────────────────────
// Completions
// ──────────────────────────────────────────────

/// Non-local exits that unwind through expressions.
#[derive(Debug)]
pub enum Signal {
    /// A thrown value; catchable by the program.
    Throw(Value),
    /// An evaluator failure; never catchable.
    Fatal(EvalError),
}

impl From<EvalError> for Signal {
    fn from(e: EvalError) -> Self {
        Signal::Fatal(e)
    }
}

#[derive(Debug)]
enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

// ──────────────────────────────────────────────
// Interpreter
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOptions {
    /// Statements and loop iterations executed before giving up.
    pub max_steps: u64,
    /// Nested calls before a `RangeError` is thrown.
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            max_steps: 1_000_000,
            max_depth: 200,
        }
    }
}

pub struct Interpreter {
    globals: Env,
    this: Value,
    output: Vec<String>,
    steps: u64,
    depth: usize,
    options: EvalOptions,
}

impl Interpreter {
    pub fn new(options: EvalOptions) -> Self {
        let globals = Scope::new(None, true);
        builtins::install(&globals);
        Interpreter {
            globals,
            this: Value::Undefined,
            output: Vec::new(),
            steps: 0,
            depth: 0,
            options,
        }
    }

    /// Lines printed by `console.log` so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn into_output(self) -> Vec<String> {
        self.output
    }

    pub(crate) fn print(&mut self, line: String) {
        tracing::trace!(line = %line, "console.log");
        self.output.push(line);
    }

    /// Run a whole program in the global scope.
    pub fn run(&mut self, program: &Program) -> Result<(), EvalError> {
        let globals = self.globals.clone();
        match self.exec_stmts(&program.body, &globals) {
            Ok(Completion::Normal) => Ok(()),
            Ok(Completion::Return(_)) => Err(EvalError::Unsupported {
                feature: "return outside of a function".into(),
            }),
            Ok(Completion::Break | Completion::Continue) => Err(EvalError::Unsupported {
                feature: "break or continue outside of a loop".into(),
            }),
            Err(Signal::Throw(v)) => Err(EvalError::Uncaught {
                value: v.to_js_string(),
            }),
            Err(Signal::Fatal(e)) => Err(e),
        }
    }

    fn tick(&mut self) -> Result<(), Signal> {
        self.steps += 1;
        if self.steps > self.options.max_steps {
            return Err(EvalError::StepLimit {
                limit: self.options.max_steps,
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn throw(&self, name: &str, message: impl Into<String>) -> Signal {
        Signal::Throw(Value::error(name, message))
    }

    // -- Statements --------------------------------------------

    fn exec_stmts(&mut self, stmts: &[Stmt], env: &Env) -> Result<Completion, Signal> {
        // Function declarations are visible throughout their block.
        for s in stmts {
            if let Stmt::Function(f) = s {
                if let Some(name) = &f.name {
                    let closure = self.closure(f, env);
                    env.declare(name, closure, true);
                }
            }
        }
        for s in stmts {
            match self.exec(s, env)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> Result<Completion, Signal> {
        let scope = Scope::new(Some(env.clone()), false);
        self.exec_stmts(stmts, &scope)
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> Result<Completion, Signal> {
        self.tick()?;
        match stmt {
            Stmt::Decl { kind, decls, .. } => {
                for d in decls {
                    let value = match &d.init {
                        Some(e) => self.eval(e, env)?,
                        None => Value::Undefined,
                    };
                    match kind {
                        VarKind::Var => {
                            let scope = Scope::function_scope(env);
                            if d.init.is_some() || Scope::lookup(scope, &d.name).is_none() {
                                scope.declare(&d.name, value, true);
                            }
                        }
                        VarKind::Let => env.declare(&d.name, value, true),
                        VarKind::Const => env.declare(&d.name, value, false),
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Expr { expr, .. } => {
                self.eval(expr, env)?;
                Ok(Completion::Normal)
            }
            Stmt::Block { body, .. } => self.exec_block(body, env),
            Stmt::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                if self.eval(test, env)?.truthy() {
                    self.exec(consequent, env)
                } else if let Some(alt) = alternate {
                    self.exec(alt, env)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::While { test, body, .. } => {
                loop {
                    self.tick()?;
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                    match self.exec(body, env)? {
                        Completion::Break => break,
                        Completion::Normal | Completion::Continue => {}
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Switch {
                discriminant,
                cases,
                ..
            } => self.exec_switch(discriminant, cases, env),
            Stmt::Break { .. } => Ok(Completion::Break),
            Stmt::Continue { .. } => Ok(Completion::Continue),
            Stmt::Return { arg, .. } => {
                let value = match arg {
                    Some(e) => self.eval(e, env)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::Throw { arg, .. } => {
                let value = self.eval(arg, env)?;
                Err(Signal::Throw(value))
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => self.exec_try(block, handler.as_ref(), finalizer.as_deref(), env),
            // Bound when the enclosing block was entered.
            Stmt::Function(_) => Ok(Completion::Normal),
            Stmt::Raise(_) => Err(EvalError::Unlowered {
                construct: "raise statement",
            }
            .into()),
        }
    }

    fn exec_switch(
        &mut self,
        discriminant: &Expr,
        cases: &[SwitchCase],
        env: &Env,
    ) -> Result<Completion, Signal> {
        let value = self.eval(discriminant, env)?;
        let scope = Scope::new(Some(env.clone()), false);
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval(test, &scope)?.strict_equals(&value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = match start.or_else(|| cases.iter().position(|c| c.test.is_none())) {
            Some(i) => i,
            None => return Ok(Completion::Normal),
        };
        for case in &cases[start..] {
            match self.exec_stmts(&case.body, &scope)? {
                Completion::Normal => {}
                Completion::Break => return Ok(Completion::Normal),
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Stmt]>,
        env: &Env,
    ) -> Result<Completion, Signal> {
        let mut result = self.exec_block(block, env);
        if let Some(h) = handler {
            if let Err(Signal::Throw(thrown)) = result {
                let scope = Scope::new(Some(env.clone()), false);
                if let Some(param) = &h.param {
                    scope.declare(param, thrown, true);
                }
                result = self.exec_stmts(&h.body, &scope);
            }
        }
        if let Err(Signal::Fatal(_)) = result {
            return result;
        }
        match finalizer {
            Some(f) => match self.exec_block(f, env)? {
                Completion::Normal => result,
                abrupt => Ok(abrupt),
            },
            None => result,
        }
    }

    // -- Expressions -------------------------------------------

    fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value, Signal> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::str(s.as_str())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::This => Ok(self.this.clone()),
            Expr::Ident(name) => Scope::lookup(env, name)
                .ok_or_else(|| self.throw("ReferenceError", format!("{} is not defined", name))),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, env)?);
                }
                Ok(Value::array(values))
            }
            Expr::Unary { op, arg } => {
                if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, arg.as_ref()) {
                    let t = Scope::lookup(env, name).map_or("undefined", |v| v.type_of());
                    return Ok(Value::str(t));
                }
                let v = self.eval(arg, env)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!v.truthy()),
                    UnaryOp::Neg => Value::Number(-v.to_number()),
                    UnaryOp::TypeOf => Value::str(v.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, env)?;
                let r = self.eval(right, env)?;
                Ok(binary(*op, &l, &r))
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left, env)?;
                let short = match op {
                    LogicalOp::And => !l.truthy(),
                    LogicalOp::Or => l.truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short {
                    Ok(l)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Assign { target, value } => self.eval_assign(target, value, env),
            Expr::Member { object, property } => {
                let obj = self.eval(object, env)?;
                self.get_property(&obj, property)
            }
            Expr::Index { object, index } => {
                let obj = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                self.get_index(&obj, &key)
            }
            Expr::Call { callee, args } => {
                let (func, this) = match callee.as_ref() {
                    Expr::Member { object, property } => {
                        let obj = self.eval(object, env)?;
                        (self.get_property(&obj, property)?, obj)
                    }
                    Expr::Index { object, index } => {
                        let obj = self.eval(object, env)?;
                        let key = self.eval(index, env)?;
                        (self.get_index(&obj, &key)?, obj)
                    }
                    other => (self.eval(other, env)?, Value::Undefined),
                };
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(a, env)?);
                }
                self.call(func, this, values)
            }
            // Awaited values are already settled.
            Expr::Await(arg) => self.eval(arg, env),
            Expr::Yield { .. } => Err(EvalError::Unsupported {
                feature: "yield".into(),
            }
            .into()),
            Expr::Function(f) => Ok(self.closure(f, env)),
            Expr::Try(_) => Err(EvalError::Unlowered {
                construct: "try expression",
            }
            .into()),
        }
    }

    fn eval_assign(&mut self, target: &Expr, value: &Expr, env: &Env) -> Result<Value, Signal> {
        match target {
            Expr::Ident(name) => {
                let v = self.eval(value, env)?;
                match Scope::assign(env, name, v.clone()) {
                    Ok(()) => Ok(v),
                    Err(AssignError::Undeclared) => {
                        Err(self.throw("ReferenceError", format!("{} is not defined", name)))
                    }
                    Err(AssignError::Constant) => {
                        Err(self.throw("TypeError", "Assignment to constant variable."))
                    }
                }
            }
            Expr::Member { object, property } => {
                let obj = self.eval(object, env)?;
                let v = self.eval(value, env)?;
                self.set_index(&obj, &Value::str(property.as_str()), v.clone())?;
                Ok(v)
            }
            Expr::Index { object, index } => {
                let obj = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                let v = self.eval(value, env)?;
                self.set_index(&obj, &key, v.clone())?;
                Ok(v)
            }
            _ => Err(self.throw("SyntaxError", "Invalid left-hand side in assignment")),
        }
    }

    fn closure(&self, f: &Function, env: &Env) -> Value {
        Value::Function(Rc::new(Closure {
            func: f.clone(),
            env: env.clone(),
            this: self.this.clone(),
        }))
    }

    pub(crate) fn call(&mut self, func: Value, this: Value, args: Vec<Value>) -> Result<Value, Signal> {
        match func {
            Value::Native(n) => (n.call)(self, this, args),
            Value::Function(c) => self.call_closure(&c, this, args),
            other => Err(self.throw(
                "TypeError",
                format!("{} is not a function", other.inspect()),
            )),
        }
    }

    fn call_closure(&mut self, c: &Closure, this: Value, args: Vec<Value>) -> Result<Value, Signal> {
        if c.func.is_generator {
            return Err(EvalError::Unsupported {
                feature: "generator functions".into(),
            }
            .into());
        }
        if self.depth >= self.options.max_depth {
            return Err(self.throw("RangeError", "Maximum call stack size exceeded"));
        }
        let scope = Scope::new(Some(c.env.clone()), true);
        let mut args = args.into_iter();
        for p in &c.func.params {
            scope.declare(p, args.next().unwrap_or(Value::Undefined), true);
        }
        let this = if c.func.is_arrow { c.this.clone() } else { this };
        let saved = mem::replace(&mut self.this, this);
        self.depth += 1;
        let result = match &c.func.body {
            FunctionBody::Block(body) => match self.exec_stmts(body, &scope) {
                Ok(Completion::Return(v)) => Ok(v),
                Ok(_) => Ok(Value::Undefined),
                Err(e) => Err(e),
            },
            FunctionBody::Expr(e) => self.eval(e, &scope),
        };
        self.depth -= 1;
        self.this = saved;
        result
    }

    // -- Properties --------------------------------------------

    fn get_property(&self, obj: &Value, name: &str) -> Result<Value, Signal> {
        match obj {
            Value::Undefined | Value::Null => Err(self.throw(
                "TypeError",
                format!(
                    "Cannot read properties of {} (reading '{}')",
                    obj.to_js_string(),
                    name
                ),
            )),
            Value::Object(fields) => Ok(fields.borrow().get(name).cloned().unwrap_or(Value::Undefined)),
            Value::Array(items) => Ok(match name {
                "length" => Value::Number(items.borrow().len() as f64),
                "push" => builtins::array_push(),
                _ => Value::Undefined,
            }),
            Value::Str(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
            Value::Function(_) | Value::Native(_) if name == "call" => Ok(builtins::function_call()),
            _ => Ok(Value::Undefined),
        }
    }

    fn get_index(&self, obj: &Value, key: &Value) -> Result<Value, Signal> {
        match (obj, key) {
            (Value::Array(items), Value::Number(n)) => {
                let items = items.borrow();
                Ok(index_of(*n, items.len())
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Undefined))
            }
            (Value::Str(s), Value::Number(n)) => Ok(index_of(*n, usize::MAX)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::str(c.to_string()))
                .unwrap_or(Value::Undefined)),
            _ => self.get_property(obj, &key.to_js_string()),
        }
    }

    fn set_index(&self, obj: &Value, key: &Value, value: Value) -> Result<(), Signal> {
        match (obj, key) {
            (Value::Object(fields), key) => {
                fields.borrow_mut().insert(key.to_js_string(), value);
                Ok(())
            }
            (Value::Array(items), Value::Number(n)) => {
                if let Some(i) = index_of(*n, usize::MAX) {
                    let mut items = items.borrow_mut();
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undefined);
                    }
                    items[i] = value;
                }
                Ok(())
            }
            (Value::Undefined | Value::Null, key) => Err(self.throw(
                "TypeError",
                format!(
                    "Cannot set properties of {} (setting '{}')",
                    obj.to_js_string(),
                    key.to_js_string()
                ),
            )),
            _ => Ok(()),
        }
    }
}

fn index_of(n: f64, len: usize) -> Option<usize> {
    if n >= 0.0 && n.fract() == 0.0 && n < len as f64 {
        Some(n as usize)
    } else {
        None
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    let is_text = |v: &Value| matches!(v, Value::Str(_) | Value::Array(_) | Value::Object(_));
    match op {
        BinaryOp::Add if is_text(l) || is_text(r) => {
            Value::str(format!("{}{}", l.to_js_string(), r.to_js_string()))
        }
        BinaryOp::Add => Value::Number(l.to_number() + r.to_number()),
        BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinaryOp::Rem => Value::Number(l.to_number() % r.to_number()),
        BinaryOp::Eq => Value::Bool(l.loose_equals(r)),
        BinaryOp::NotEq => Value::Bool(!l.loose_equals(r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_equals(r)),
        BinaryOp::StrictNotEq => Value::Bool(!l.strict_equals(r)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ord = match (l, r) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => l.to_number().partial_cmp(&r.to_number()),
            };
            Value::Bool(match (op, ord) {
                (_, None) => false,
                (BinaryOp::Lt, Some(o)) => o.is_lt(),
                (BinaryOp::LtEq, Some(o)) => o.is_le(),
                (BinaryOp::Gt, Some(o)) => o.is_gt(),
                (_, Some(o)) => o.is_ge(),
            })
        }
    }
}

//! Runtime values and errors for the reference evaluator.
//!
//! These types are DISTINCT from tryexpr-core AST types. Values are shared by
//! reference where the language shares them (arrays, objects, functions).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tryexpr_core::ast::Function;
use tryexpr_core::emit::format_number;
use tryexpr_core::Diagnostic;

use crate::interp::{Env, Interpreter, Signal};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors that stop evaluation. Exceptions thrown by the program are caught
/// by its own `try` statements; only an uncaught one surfaces here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// The program text did not parse.
    #[error(transparent)]
    Parse(#[from] Diagnostic),
    /// An exception reached the top level.
    #[error("uncaught exception: {value}")]
    Uncaught { value: String },
    /// A try expression or `raise` statement survived lowering.
    #[error("unlowered {construct} reached the evaluator")]
    Unlowered { construct: &'static str },
    /// A construct the evaluator does not implement.
    #[error("unsupported: {feature}")]
    Unsupported { feature: String },
    /// The program ran longer than the configured step budget.
    #[error("step limit of {limit} exceeded")]
    StepLimit { limit: u64 },
}

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

pub type NativeImpl = fn(&mut Interpreter, Value, Vec<Value>) -> Result<Value, Signal>;

/// A host function installed in the global scope.
pub struct NativeFn {
    pub name: &'static str,
    pub call: NativeImpl,
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

/// A function value: its definition plus the scope it closed over.
#[derive(Debug)]
pub struct Closure {
    pub func: Function,
    pub env: Env,
    /// `this` at creation, used by arrow functions.
    pub this: Value,
}

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
    Function(Rc<Closure>),
    Native(Rc<NativeFn>),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(fields: BTreeMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(fields)))
    }

    /// An error object `{ name, message }` as thrown by the runtime.
    pub fn error(name: &str, message: impl Into<String>) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_owned(), Value::str(name));
        fields.insert("message".to_owned(), Value::str(message.into()));
        Value::object(fields)
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => match items.borrow().as_slice() {
                [] => 0.0,
                [only] => only.to_number(),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// String conversion as used by `+` and `String(x)`.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_owned(),
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(fields) => {
                let fields = fields.borrow();
                match (fields.get("name"), fields.get("message")) {
                    (Some(name), Some(message)) => {
                        format!("{}: {}", name.to_js_string(), message.to_js_string())
                    }
                    _ => "[object Object]".to_owned(),
                }
            }
            Value::Function(_) | Value::Native(_) => self.inspect(),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Number(_) | Value::Str(_) | Value::Bool(_), Value::Number(_) | Value::Str(_) | Value::Bool(_))
                if self.type_of() != other.type_of() =>
            {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }

    /// Rendering used by `console.log`: strings bare at the top level and
    /// quoted inside containers.
    pub fn inspect(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.inspect_nested(),
        }
    }

    fn inspect_nested(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s),
            Value::Array(items) => {
                let items = items.borrow();
                if items.is_empty() {
                    "[]".to_owned()
                } else {
                    let parts: Vec<String> = items.iter().map(Value::inspect_nested).collect();
                    format!("[ {} ]", parts.join(", "))
                }
            }
            Value::Object(fields) => {
                let fields = fields.borrow();
                if fields.is_empty() {
                    "{}".to_owned()
                } else {
                    let parts: Vec<String> = fields
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k, v.inspect_nested()))
                        .collect();
                    format!("{{ {} }}", parts.join(", "))
                }
            }
            Value::Function(c) => match &c.func.name {
                Some(name) => format!("[Function: {}]", name),
                None => "[Function (anonymous)]".to_owned(),
            },
            Value::Native(n) => format!("[Function: {}]", n.name),
            other => other.to_js_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::str("0").truthy());
        assert!(Value::array(vec![]).truthy());
    }

    #[test]
    fn equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::str("1").loose_equals(&Value::Number(1.0)));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
        let a = Value::array(vec![]);
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&Value::array(vec![])));
    }

    #[test]
    fn inspect_formats() {
        let v = Value::array(vec![Value::Number(1.0), Value::str("a"), Value::Null]);
        assert_eq!(v.inspect(), "[ 1, 'a', null ]");
        assert_eq!(Value::str("top").inspect(), "top");
        assert_eq!(
            Value::error("TypeError", "boom").inspect(),
            "{ message: 'boom', name: 'TypeError' }"
        );
        assert_eq!(Value::error("Error", "x").to_js_string(), "Error: x");
    }
}

//! Host functions installed in the global scope.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::interp::{Env, Interpreter, Signal};
use crate::types::{NativeFn, NativeImpl, Value};

fn native(name: &'static str, call: NativeImpl) -> Value {
    Value::Native(Rc::new(NativeFn { name, call }))
}

pub fn install(globals: &Env) {
    let mut console = BTreeMap::new();
    console.insert("log".to_owned(), native("log", console_log));
    globals.declare("console", Value::object(console), false);
    globals.declare("String", native("String", string), false);
    globals.declare("Error", native("Error", error), false);
}

fn console_log(interp: &mut Interpreter, _this: Value, args: Vec<Value>) -> Result<Value, Signal> {
    let line: Vec<String> = args.iter().map(Value::inspect).collect();
    interp.print(line.join(" "));
    Ok(Value::Undefined)
}

fn string(_: &mut Interpreter, _this: Value, args: Vec<Value>) -> Result<Value, Signal> {
    Ok(match args.first() {
        Some(v) => Value::str(v.to_js_string()),
        None => Value::str(""),
    })
}

/// `Error(message)` -- callable without `new`.
fn error(_: &mut Interpreter, _this: Value, args: Vec<Value>) -> Result<Value, Signal> {
    let message = args.first().map(Value::to_js_string).unwrap_or_default();
    Ok(Value::error("Error", message))
}

/// `f.call(thisArg, ...args)`; the function arrives as `this`.
pub(crate) fn function_call() -> Value {
    fn call(interp: &mut Interpreter, this: Value, args: Vec<Value>) -> Result<Value, Signal> {
        let mut args = args.into_iter();
        let this_arg = args.next().unwrap_or(Value::Undefined);
        interp.call(this, this_arg, args.collect())
    }
    native("call", call)
}

/// `array.push(...items)`; returns the new length.
pub(crate) fn array_push() -> Value {
    fn push(interp: &mut Interpreter, this: Value, args: Vec<Value>) -> Result<Value, Signal> {
        match this {
            Value::Array(items) => {
                let mut items = items.borrow_mut();
                items.extend(args);
                Ok(Value::Number(items.len() as f64))
            }
            other => Err(interp.throw(
                "TypeError",
                format!("push called on {}", other.type_of()),
            )),
        }
    }
    native("push", push)
}

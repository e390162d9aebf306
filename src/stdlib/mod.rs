//! Builtin function registry.
//!
//! Builtins receive their evaluated positional arguments and are responsible
//! for their own arity and type validation; the interpreter never checks
//! argument counts before invoking them.

mod base;
mod collections;
mod math;
mod strings;

pub use strings::repeat_text;

use indexmap::IndexMap;

use crate::{
    diagnostics::{type_error, Result},
    value::{NativeFunction, Value, ValueKind},
};

pub type Callback = fn(&[Value]) -> Result<Value>;

/// Name → builtin mapping handed to every interpreter at construction.
#[derive(Clone)]
pub struct Builtins {
    functions: IndexMap<&'static str, Value>,
}

impl Builtins {
    pub fn empty() -> Self {
        Self {
            functions: IndexMap::new(),
        }
    }

    /// Registry with every standard builtin installed.
    pub fn standard() -> Self {
        let mut builtins = Self::empty();
        base::install(&mut builtins);
        collections::install(&mut builtins);
        math::install(&mut builtins);
        strings::install(&mut builtins);
        builtins
    }

    pub fn register(&mut self, name: &'static str, callback: Callback) {
        self.functions.insert(name, native(name, callback));
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::standard()
    }
}

fn native(name: &'static str, callback: Callback) -> Value {
    Value::new(ValueKind::NativeFunction(NativeFunction { name, callback }))
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn ensure_exact(args: &[Value], expected: usize, name: &str) -> Result<()> {
    if args.len() != expected {
        return Err(type_error(format!(
            "`{name}` expected {expected} argument{} but received {}",
            plural(expected),
            args.len()
        )));
    }
    Ok(())
}

fn ensure_range(args: &[Value], min: usize, max: usize, name: &str) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(type_error(format!(
            "`{name}` expected {min} to {max} arguments but received {}",
            args.len()
        )));
    }
    Ok(())
}

fn ensure_min(args: &[Value], min: usize, name: &str) -> Result<()> {
    if args.len() < min {
        return Err(type_error(format!(
            "`{name}` expected at least {min} argument{} but received {}",
            plural(min),
            args.len()
        )));
    }
    Ok(())
}

fn mismatch(name: &str, expected: &str, value: &Value) -> crate::diagnostics::PyppError {
    type_error(format!(
        "`{name}` expected {expected} but found {}",
        value.type_name()
    ))
}

fn expect_str<'a>(value: &'a Value, name: &str) -> Result<&'a str> {
    match &*value.0 {
        ValueKind::String(s) => Ok(s),
        _ => Err(mismatch(name, "string", value)),
    }
}

fn expect_int(value: &Value, name: &str) -> Result<i64> {
    match &*value.0 {
        ValueKind::Int(n) => Ok(*n),
        _ => Err(mismatch(name, "int", value)),
    }
}

fn expect_number(value: &Value, name: &str) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| mismatch(name, "number", value))
}

/// Resolves slice bounds with negative indices counted from the end and
/// out-of-range bounds clamped.
fn slice_bounds(len: usize, start: i64, end: Option<i64>) -> (usize, usize) {
    let len = len as i64;
    let resolve = |idx: i64| -> usize {
        let idx = if idx < 0 { idx + len } else { idx };
        idx.clamp(0, len) as usize
    };
    let start = resolve(start);
    let end = resolve(end.unwrap_or(len));
    (start, end.max(start))
}

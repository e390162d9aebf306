use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::{IndexMap, IndexSet};

use crate::{ast::FunctionDecl, diagnostics::Result, stack::ensure_sufficient_stack};

/// One level of name visibility, in insertion order.
pub type Scope = IndexMap<String, Value>;

type ContainerPair = (*const ValueKind, *const ValueKind);

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(RefCell::new(values)))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Object(RefCell::new(entries)))
    }

    pub fn set(members: IndexSet<SetKey>) -> Self {
        Self::new(ValueKind::Set(RefCell::new(members)))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        matches!(&*self.0, ValueKind::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Int(n) => *n != 0,
            ValueKind::Float(f) => *f != 0.0,
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Array(values) => !values.borrow().is_empty(),
            ValueKind::Object(_)
            | ValueKind::Set(_)
            | ValueKind::Function(_)
            | ValueKind::NativeFunction(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Null => "null",
            ValueKind::Bool(_) => "bool",
            ValueKind::Int(_) => "int",
            ValueKind::Float(_) => "float",
            ValueKind::String(_) => "string",
            ValueKind::Array(_) => "array",
            ValueKind::Object(_) => "object",
            ValueKind::Set(_) => "set",
            ValueKind::Function(_) | ValueKind::NativeFunction(_) => "function",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n as f64),
            ValueKind::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Structural equality; ints and floats compare numerically.
    pub fn equals(&self, other: &Value) -> bool {
        self.equals_in(other, &mut Vec::new())
    }

    /// Container pairs already under comparison count as equal, so cyclic
    /// values terminate.
    fn equals_in(&self, other: &Value, active: &mut Vec<ContainerPair>) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let pair = (Rc::as_ptr(&self.0), Rc::as_ptr(&other.0));
        if active.contains(&pair) {
            return true;
        }
        match (&*self.0, &*other.0) {
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
            (ValueKind::Int(_) | ValueKind::Float(_), ValueKind::Int(_) | ValueKind::Float(_)) => {
                self.as_number() == other.as_number()
            }
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                active.push(pair);
                let equal = ensure_sufficient_stack(|| {
                    a.iter().zip(b.iter()).all(|(l, r)| l.equals_in(r, active))
                });
                active.pop();
                equal
            }
            (ValueKind::Object(a), ValueKind::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                active.push(pair);
                let equal = ensure_sufficient_stack(|| {
                    a.iter().all(|(key, value)| {
                        b.get(key)
                            .map(|rhs| value.equals_in(rhs, active))
                            .unwrap_or(false)
                    })
                });
                active.pop();
                equal
            }
            (ValueKind::Set(a), ValueKind::Set(b)) => *a.borrow() == *b.borrow(),
            _ => false,
        }
    }

    /// Writes the value; strings are quoted when `quoted` is set. Containers
    /// already being written appear as `[...]` or `{...}`.
    fn write(
        &self,
        f: &mut fmt::Formatter<'_>,
        quoted: bool,
        active: &mut Vec<*const ValueKind>,
    ) -> fmt::Result {
        let ptr = Rc::as_ptr(&self.0);
        match &*self.0 {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{}", format_float(*n)),
            ValueKind::String(s) if quoted => write!(f, "{s:?}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Array(_) if active.contains(&ptr) => write!(f, "[...]"),
            ValueKind::Object(_) if active.contains(&ptr) => write!(f, "{{...}}"),
            ValueKind::Array(values) => {
                active.push(ptr);
                write!(f, "[")?;
                for (idx, value) in values.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    ensure_sufficient_stack(|| value.write(f, true, active))?;
                }
                active.pop();
                write!(f, "]")
            }
            ValueKind::Object(map) => {
                active.push(ptr);
                write!(f, "{{")?;
                for (idx, (key, value)) in map.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: ")?;
                    ensure_sufficient_stack(|| value.write(f, true, active))?;
                }
                active.pop();
                write!(f, "}}")
            }
            ValueKind::Set(members) => {
                write!(f, "{{")?;
                for (idx, member) in members.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    member.to_value().write(f, true, active)?;
                }
                write!(f, "}}")
            }
            ValueKind::Function(fun) => write!(f, "<fn {}>", fun.decl.name),
            ValueKind::NativeFunction(fun) => write!(f, "<builtin {}>", fun.name),
        }
    }
}

fn format_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, true, &mut Vec::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, false, &mut Vec::new())
    }
}

pub enum ValueKind {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(RefCell<Vec<Value>>),
    Object(RefCell<IndexMap<String, Value>>),
    Set(RefCell<IndexSet<SetKey>>),
    Function(UserFunction),
    NativeFunction(NativeFunction),
}

/// Hashable projection of a value, used for set membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SetKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    String(String),
}

impl SetKey {
    /// Returns `None` for values that cannot be hashed.
    pub fn from_value(value: &Value) -> Option<Self> {
        match &*value.0 {
            ValueKind::Null => Some(SetKey::Null),
            ValueKind::Bool(b) => Some(SetKey::Bool(*b)),
            ValueKind::Int(n) => Some(SetKey::Int(*n)),
            // Integral floats share a key with the equal int.
            ValueKind::Float(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                Some(SetKey::Int(*n as i64))
            }
            ValueKind::Float(n) => Some(SetKey::Float(n.to_bits())),
            ValueKind::String(s) => Some(SetKey::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            SetKey::Null => Value::null(),
            SetKey::Bool(b) => Value::bool(*b),
            SetKey::Int(n) => Value::int(*n),
            SetKey::Float(bits) => Value::float(f64::from_bits(*bits)),
            SetKey::String(s) => Value::string(s.clone()),
        }
    }
}

/// A closure: a shared declaration plus the frame copied when it was declared.
#[derive(Clone)]
pub struct UserFunction {
    pub decl: Rc<FunctionDecl>,
    pub captured: Scope,
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub callback: fn(&[Value]) -> Result<Value>,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.callback)(args)
    }
}

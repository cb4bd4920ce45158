//! Runtime values for the execution tracer's interpreter
//!
//! A small Python object model: scalars, containers, functions, classes and
//! instances. Values borrow the parsed AST (`'a`), so a value never outlives
//! the run that produced it — nothing leaks across requests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ruff_python_ast::{Parameters, Stmt};

/// A Python-level runtime fault (the analog of a raised exception).
#[derive(Debug, Clone)]
pub struct Fault {
    pub kind: String,
    pub message: String,
}

impl Fault {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    /// Whether an `except <name>` clause catches this fault.
    pub fn caught_by(&self, handler: &str) -> bool {
        match handler {
            "Exception" | "BaseException" => true,
            "ArithmeticError" => {
                matches!(self.kind.as_str(), "ZeroDivisionError" | "OverflowError")
            }
            "LookupError" => matches!(self.kind.as_str(), "IndexError" | "KeyError"),
            other => other == self.kind,
        }
    }
}

/// A user-defined function or method, borrowing its AST definition.
pub struct Function<'a> {
    pub name: String,
    pub params: &'a Parameters,
    pub body: &'a [Stmt],
    /// Defaults for trailing positional parameters, evaluated at def time.
    pub defaults: Vec<Value<'a>>,
}

/// A user-defined class: attribute table (methods included) plus bases.
pub struct Class<'a> {
    pub name: String,
    pub bases: Vec<Rc<Class<'a>>>,
    pub attrs: RefCell<HashMap<String, Value<'a>>>,
}

impl<'a> Class<'a> {
    /// Look up an attribute on this class or, depth-first, on its bases.
    pub fn lookup(&self, name: &str) -> Option<Value<'a>> {
        if let Some(v) = self.attrs.borrow().get(name) {
            return Some(v.clone());
        }
        self.bases.iter().find_map(|base| base.lookup(name))
    }
}

/// An instance of a user-defined class.
pub struct Instance<'a> {
    pub class: Rc<Class<'a>>,
    pub fields: RefCell<HashMap<String, Value<'a>>>,
}

/// A runtime value.
#[derive(Clone)]
pub enum Value<'a> {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<String>),
    List(Rc<RefCell<Vec<Value<'a>>>>),
    Tuple(Rc<Vec<Value<'a>>>),
    /// Insertion-ordered key/value pairs; keys compared by `values_eq`.
    Dict(Rc<RefCell<Vec<(Value<'a>, Value<'a>)>>>),
    Range {
        start: i64,
        stop: i64,
        step: i64,
    },
    Function(Rc<Function<'a>>),
    BoundMethod {
        receiver: Box<Value<'a>>,
        func: Rc<Function<'a>>,
    },
    Class(Rc<Class<'a>>),
    Instance(Rc<Instance<'a>>),
    Builtin(&'static str),
}

impl<'a> Value<'a> {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Rc::new(s.into()))
    }

    pub fn list(items: Vec<Value<'a>>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Range { .. } => "range",
            Value::Function(_) | Value::BoundMethod { .. } | Value::Builtin(_) => "function",
            Value::Class(_) => "type",
            Value::Instance(_) => "object",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(items) => !items.borrow().is_empty(),
            Value::Range { start, stop, step } => {
                if *step >= 0 {
                    start < stop
                } else {
                    start > stop
                }
            }
            _ => true,
        }
    }

    /// `str()` rendering, used by `print` and f-strings.
    pub fn py_str(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.py_repr(),
        }
    }

    /// `repr()` rendering.
    pub fn py_repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e16 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Str(s) => format!("'{s}'"),
            Value::List(items) => {
                let inner: Vec<String> = items.borrow().iter().map(Value::py_repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(Value::py_repr).collect();
                if inner.len() == 1 {
                    format!("({},)", inner[0])
                } else {
                    format!("({})", inner.join(", "))
                }
            }
            Value::Dict(items) => {
                let inner: Vec<String> = items
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.py_repr(), v.py_repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    format!("range({start}, {stop})")
                } else {
                    format!("range({start}, {stop}, {step})")
                }
            }
            Value::Function(f) => format!("<function {}>", f.name),
            Value::BoundMethod { func, .. } => format!("<bound method {}>", func.name),
            Value::Class(c) => format!("<class '{}'>", c.name),
            Value::Instance(i) => format!("<{} object>", i.class.name),
            Value::Builtin(name) => format!("<built-in function {name}>"),
        }
    }
}

/// Python `==` semantics for the supported types. Unlike containers in
/// Python, functions and instances compare by identity-ish (pointer).
pub fn values_eq<'a>(a: &Value<'a>, b: &Value<'a>) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        (Value::Bool(x), Value::Int(y)) | (Value::Int(y), Value::Bool(x)) => i64::from(*x) == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_eq(a, b))
        }
        (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_eq(a, b))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(k, v)| {
                    y.iter()
                        .any(|(k2, v2)| values_eq(k, k2) && values_eq(v, v2))
                })
        }
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        (Value::Class(x), Value::Class(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::str("x").truthy());
        assert!(!Value::list(vec![]).truthy());
        assert!(Value::list(vec![Value::Int(1)]).truthy());
    }

    #[test]
    fn test_numeric_cross_type_equality() {
        assert!(values_eq(&Value::Int(2), &Value::Float(2.0)));
        assert!(values_eq(&Value::Bool(true), &Value::Int(1)));
        assert!(!values_eq(&Value::Int(2), &Value::str("2")));
    }

    #[test]
    fn test_py_str_rendering() {
        assert_eq!(Value::str("hi").py_str(), "hi");
        assert_eq!(Value::str("hi").py_repr(), "'hi'");
        assert_eq!(Value::Float(3.0).py_str(), "3.0");
        assert_eq!(Value::Bool(true).py_str(), "True");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::str("a")]).py_str(),
            "[1, 'a']"
        );
    }

    #[test]
    fn test_fault_hierarchy_matching() {
        let div = Fault::new("ZeroDivisionError", "division by zero");
        assert!(div.caught_by("ZeroDivisionError"));
        assert!(div.caught_by("ArithmeticError"));
        assert!(div.caught_by("Exception"));
        assert!(!div.caught_by("ValueError"));
    }
}

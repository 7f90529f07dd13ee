use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::FunctionDef;
use crate::error::{Exception, ExceptionKind};

bitflags::bitflags! {
    /// Persistent compiler directives enabled by `from __future__ import ...`.
    ///
    /// Once a unit that declares a feature has executed, the feature applies to
    /// every later unit of the same session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompilerFlags: u32 {
        /// `/` on two ints is true division.
        const DIVISION = 1 << 0;
        const ABSOLUTE_IMPORT = 1 << 1;
        const PRINT_FUNCTION = 1 << 2;
        const UNICODE_LITERALS = 1 << 3;
        const WITH_STATEMENT = 1 << 4;
        const GENERATORS = 1 << 5;
        const NESTED_SCOPES = 1 << 6;
    }
}

impl CompilerFlags {
    /// Map a `__future__` feature name to its flag.
    pub fn from_feature(name: &str) -> Option<Self> {
        match name {
            "division" => Some(Self::DIVISION),
            "absolute_import" => Some(Self::ABSOLUTE_IMPORT),
            "print_function" => Some(Self::PRINT_FUNCTION),
            "unicode_literals" => Some(Self::UNICODE_LITERALS),
            "with_statement" => Some(Self::WITH_STATEMENT),
            "generators" => Some(Self::GENERATORS),
            "nested_scopes" => Some(Self::NESTED_SCOPES),
            _ => None,
        }
    }
}

/// Runtime values of the host language.
#[derive(Clone, Debug)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    /// Insertion-ordered dictionary with linear lookup.
    Dict(Rc<RefCell<Vec<(Value, Value)>>>),
    Function(Rc<Function>),
    Builtin(Builtin),
    /// A builtin method bound to its receiver (`[].append`).
    BuiltinMethod(Rc<Value>, &'static str),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    BoundMethod(Rc<Value>, Rc<Function>),
    ExceptionType(ExceptionKind),
    Exception(Rc<Exception>),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(items.into())
    }

    pub fn dict(items: Vec<(Value, Value)>) -> Self {
        Value::Dict(Rc::new(RefCell::new(items)))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Name of the value's type, as shown in error messages.
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
            Value::Function(_) => "function",
            Value::Builtin(_) | Value::BuiltinMethod(..) => "builtin_function_or_method",
            Value::Class(_) => "classobj",
            Value::Instance(_) => "instance",
            Value::BoundMethod(..) => "instancemethod",
            Value::ExceptionType(_) => "type",
            Value::Exception(_) => "exception",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(items) => !items.borrow().is_empty(),
            _ => true,
        }
    }

    /// Identity comparison used by `is`.
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::ExceptionType(a), Value::ExceptionType(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }

    /// Value equality used by `==`, `in` and dictionary lookup.
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Bool(a), Value::Int(b)) | (Value::Int(b), Value::Bool(a)) => (*a as i64) == *b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || seq_eq(&a.borrow(), &b.borrow())
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(k2, v2)| k.py_eq(k2) && v.py_eq(v2))
                    })
            }
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            _ => self.is(other),
        }
    }

    /// Reject values that cannot be dictionary keys.
    pub fn check_hashable(&self) -> Result<(), Exception> {
        match self {
            Value::List(_) | Value::Dict(_) => Err(Exception::type_error(format!(
                "unhashable type: '{}'",
                self.type_name()
            ))),
            Value::Tuple(items) => items.iter().try_for_each(Value::check_hashable),
            _ => Ok(()),
        }
    }
}

fn seq_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
}

/// A variable scope. Function calls chain to the scope they were defined in.
#[derive(Debug, Default)]
pub struct Env {
    pub vars: RefCell<HashMap<String, Value>>,
    pub parent: Option<Rc<Env>>,
}

impl Env {
    pub fn new(parent: Option<Rc<Env>>) -> Rc<Self> {
        Rc::new(Env {
            vars: RefCell::new(HashMap::new()),
            parent,
        })
    }

    /// Look a name up in this scope and its enclosing function scopes.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn set(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }
}

/// A user-defined function with its evaluated defaults.
#[derive(Debug)]
pub struct Function {
    pub def: Rc<FunctionDef>,
    pub defaults: Vec<Option<Value>>,
    /// Enclosing function scope, `None` at module level.
    pub closure: Option<Rc<Env>>,
}

#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub bases: Vec<Rc<Class>>,
    pub attrs: RefCell<HashMap<String, Value>>,
}

impl Class {
    /// Attribute lookup through the class and its bases, depth first.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attrs.borrow().get(name) {
            return Some(value.clone());
        }
        self.bases.iter().find_map(|base| base.lookup(name))
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub attrs: RefCell<HashMap<String, Value>>,
}

/// Arguments handed to a builtin: positional values and keyword pairs.
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    /// Fail unless the call has between `min` and `max` positional arguments
    /// and no keywords.
    pub fn check_arity(&self, name: &str, min: usize, max: usize) -> Result<(), Exception> {
        if !self.keywords.is_empty() {
            return Err(Exception::type_error(format!(
                "{}() takes no keyword arguments",
                name
            )));
        }
        let n = self.positional.len();
        if n < min || n > max {
            let expected = if min == max {
                format!("exactly {}", min)
            } else if n < min {
                format!("at least {}", min)
            } else {
                format!("at most {}", max)
            };
            return Err(Exception::type_error(format!(
                "{}() takes {} argument{} ({} given)",
                name,
                expected,
                if min == max && min == 1 { "" } else { "s" },
                n
            )));
        }
        Ok(())
    }
}

/// A native builtin function.
pub type BuiltinFn = fn(&mut State, Args) -> Result<Value, Exception>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

/// The full interpreter state.
pub struct State {
    pub globals: Rc<Env>,
    pub builtins: HashMap<&'static str, Value>,
    /// Flags in effect for the unit currently executing.
    pub flags: CompilerFlags,
    /// Captured standard output of the current unit.
    pub stdout: String,
    /// Current call depth, bounded to report runaway recursion.
    pub depth: usize,
}

impl State {
    pub fn new() -> Self {
        State {
            globals: Env::new(None),
            builtins: HashMap::new(),
            flags: CompilerFlags::empty(),
            stdout: String::new(),
            depth: 0,
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_feature_names() {
        assert_eq!(CompilerFlags::from_feature("division"), Some(CompilerFlags::DIVISION));
        assert_eq!(CompilerFlags::from_feature("braces"), None);
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).py_eq(&Value::Int(1)));
        assert!(!Value::Int(1).py_eq(&Value::str("1")));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::list(Vec::new()).truthy());
        assert!(Value::str("x").truthy());
        assert!(!Value::None.truthy());
        assert!(!Value::Float(0.0).truthy());
    }

    #[test]
    fn test_env_chain() {
        let outer = Env::new(None);
        outer.set("x", Value::Int(1));
        let inner = Env::new(Some(outer.clone()));
        assert!(matches!(inner.lookup("x"), Some(Value::Int(1))));
        assert!(inner.lookup("y").is_none());
    }

    #[test]
    fn test_unhashable() {
        assert!(Value::list(Vec::new()).check_hashable().is_err());
        assert!(Value::tuple(vec![Value::Int(1)]).check_hashable().is_ok());
    }

    #[test]
    fn test_args_arity_message() {
        let args = Args {
            positional: vec![],
            keywords: vec![],
        };
        let err = args.check_arity("len", 1, 1).unwrap_err();
        assert_eq!(err.message, "len() takes exactly 1 argument (0 given)");
    }
}

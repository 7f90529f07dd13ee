use std::rc::Rc;

use crate::builtins::collections;
use crate::error::{Exception, ExceptionKind};
use crate::eval;
use crate::types::{Args, Class, State, Value};

/// Whether exception `kind` is `target` or derives from it.
pub fn exception_matches(kind: ExceptionKind, target: ExceptionKind) -> bool {
    kind == target
        || target == ExceptionKind::Exception
        || (target == ExceptionKind::ArithmeticError
            && matches!(kind, ExceptionKind::ZeroDivisionError | ExceptionKind::OverflowError))
}

fn derives_from(class: &Rc<Class>, target: &Rc<Class>) -> bool {
    Rc::ptr_eq(class, target) || class.bases.iter().any(|base| derives_from(base, target))
}

fn is_instance(value: &Value, class: &Value) -> Result<bool, Exception> {
    Ok(match class {
        Value::Tuple(options) => {
            for option in options.iter() {
                if is_instance(value, option)? {
                    return Ok(true);
                }
            }
            false
        }
        Value::Class(target) => match value {
            Value::Instance(instance) => derives_from(&instance.class, target),
            _ => false,
        },
        Value::ExceptionType(target) => match value {
            Value::Exception(exc) => exception_matches(exc.kind, *target),
            _ => false,
        },
        Value::Builtin(builtin) => match builtin.name {
            "int" => matches!(value, Value::Int(_) | Value::Bool(_)),
            "float" => matches!(value, Value::Float(_)),
            "bool" => matches!(value, Value::Bool(_)),
            "str" => matches!(value, Value::Str(_)),
            "list" => matches!(value, Value::List(_)),
            "tuple" => matches!(value, Value::Tuple(_)),
            "dict" => matches!(value, Value::Dict(_)),
            _ => return Err(isinstance_arg_error()),
        },
        _ => return Err(isinstance_arg_error()),
    })
}

fn isinstance_arg_error() -> Exception {
    Exception::type_error("isinstance() arg 2 must be a type or tuple of types")
}

/// `isinstance(obj, class_or_tuple)`
pub fn isinstance(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("isinstance", 2, 2)?;
    Ok(Value::Bool(is_instance(&args.positional[0], &args.positional[1])?))
}

/// `callable(obj)`
pub fn callable(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("callable", 1, 1)?;
    Ok(Value::Bool(matches!(
        args.positional[0],
        Value::Function(_)
            | Value::Builtin(_)
            | Value::BuiltinMethod(..)
            | Value::BoundMethod(..)
            | Value::Class(_)
            | Value::ExceptionType(_)
    )))
}

/// `dir()` lists module names; `dir(obj)` lists the object's attributes.
pub fn dir(state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("dir", 0, 1)?;
    let mut names: Vec<String> = match args.positional.first() {
        None => state.globals.vars.borrow().keys().cloned().collect(),
        Some(Value::Instance(instance)) => {
            let mut names: Vec<String> = instance.attrs.borrow().keys().cloned().collect();
            collect_class_names(&instance.class, &mut names);
            names
        }
        Some(Value::Class(class)) => {
            let mut names = Vec::new();
            collect_class_names(class, &mut names);
            names
        }
        Some(other) => collections::method_names(other)
            .iter()
            .map(|name| name.to_string())
            .collect(),
    };
    names.sort();
    names.dedup();
    Ok(Value::list(names.into_iter().map(Value::str).collect()))
}

fn collect_class_names(class: &Class, names: &mut Vec<String>) {
    names.extend(class.attrs.borrow().keys().cloned());
    for base in &class.bases {
        collect_class_names(base, names);
    }
}

fn attr_name(value: &Value) -> Result<&str, Exception> {
    match value {
        Value::Str(s) => Ok(&**s),
        other => Err(Exception::type_error(format!(
            "attribute name must be string, not '{}'",
            other.type_name()
        ))),
    }
}

/// `getattr(obj, name[, default])`
pub fn getattr(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("getattr", 2, 3)?;
    let name = attr_name(&args.positional[1])?;
    match (eval::get_attr(&args.positional[0], name), args.positional.get(2)) {
        (Ok(value), _) => Ok(value),
        (Err(e), Some(default)) if e.kind == ExceptionKind::AttributeError => Ok(default.clone()),
        (Err(e), _) => Err(e),
    }
}

/// `hasattr(obj, name)`
pub fn hasattr(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("hasattr", 2, 2)?;
    let name = attr_name(&args.positional[1])?;
    Ok(Value::Bool(eval::get_attr(&args.positional[0], name).is_ok()))
}

/// `setattr(obj, name, value)`
pub fn setattr(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("setattr", 3, 3)?;
    let name = attr_name(&args.positional[1])?;
    eval::set_attr(&args.positional[0], name, args.positional[2].clone())?;
    Ok(Value::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_hierarchy() {
        assert!(exception_matches(ExceptionKind::ZeroDivisionError, ExceptionKind::ArithmeticError));
        assert!(exception_matches(ExceptionKind::KeyError, ExceptionKind::Exception));
        assert!(!exception_matches(ExceptionKind::KeyError, ExceptionKind::IndexError));
    }

    #[test]
    fn test_isinstance_builtin_types() {
        let int_type = Value::Builtin(crate::types::Builtin {
            name: "int",
            func: crate::builtins::computation::int,
        });
        assert!(is_instance(&Value::Bool(true), &int_type).unwrap());
        assert!(!is_instance(&Value::str("1"), &int_type).unwrap());
        assert!(is_instance(&Value::Int(1), &Value::Int(1)).is_err());
    }
}

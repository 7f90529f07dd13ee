use std::rc::Rc;

use crate::error::Exception;
use crate::eval;
use crate::types::{Args, State, Value};

// ========== Formatting ==========

/// Shortest round-tripping float text, with exponent notation outside
/// `1e-4 <= |f| < 1e16`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..16).contains(&exp) {
        let plain = format!("{}", f);
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
    }
}

/// Quote a string literal: single quotes unless only double quotes avoid
/// escaping.
pub fn quote(s: &str) -> String {
    let q = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(q);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == q => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(q);
    out
}

/// `repr(value)`.
pub fn repr(state: &mut State, value: &Value) -> Result<String, Exception> {
    let mut seen = Vec::new();
    repr_inner(state, value, &mut seen)
}

/// `str(value)`.
pub fn to_str(state: &mut State, value: &Value) -> Result<String, Exception> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        Value::Exception(exc) => Ok(exc.message.clone()),
        Value::Instance(instance) if instance.class.lookup("__str__").is_some() => {
            call_text_method(state, value, "__str__")
        }
        _ => repr(state, value),
    }
}

fn call_text_method(state: &mut State, value: &Value, name: &str) -> Result<String, Exception> {
    let method = eval::get_attr(value, name)?;
    match eval::call_value(state, &method, Vec::new(), Vec::new())? {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(Exception::type_error(format!(
            "{}() returned non-string (type {})",
            name,
            other.type_name()
        ))),
    }
}

fn join_reprs(
    state: &mut State,
    items: &[Value],
    seen: &mut Vec<usize>,
) -> Result<String, Exception> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(repr_inner(state, item, seen)?);
    }
    Ok(parts.join(", "))
}

fn repr_inner(state: &mut State, value: &Value, seen: &mut Vec<usize>) -> Result<String, Exception> {
    Ok(match value {
        Value::None => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Str(s) => quote(s),
        Value::List(items) => {
            let id = Rc::as_ptr(items) as *const () as usize;
            if seen.contains(&id) {
                return Ok("[...]".to_string());
            }
            seen.push(id);
            let snapshot = items.borrow().clone();
            let inner = join_reprs(state, &snapshot, seen);
            seen.pop();
            format!("[{}]", inner?)
        }
        Value::Tuple(items) if items.len() == 1 => {
            format!("({},)", repr_inner(state, &items[0], seen)?)
        }
        Value::Tuple(items) => format!("({})", join_reprs(state, items, seen)?),
        Value::Dict(items) => {
            let id = Rc::as_ptr(items) as *const () as usize;
            if seen.contains(&id) {
                return Ok("{...}".to_string());
            }
            seen.push(id);
            let snapshot = items.borrow().clone();
            let mut parts = Vec::with_capacity(snapshot.len());
            for (key, val) in &snapshot {
                let key = repr_inner(state, key, seen);
                let val = repr_inner(state, val, seen);
                match (key, val) {
                    (Ok(key), Ok(val)) => parts.push(format!("{}: {}", key, val)),
                    (Err(e), _) | (_, Err(e)) => {
                        seen.pop();
                        return Err(e);
                    }
                }
            }
            seen.pop();
            format!("{{{}}}", parts.join(", "))
        }
        Value::Function(function) => format!(
            "<function {} at {:#x}>",
            function.def.name,
            Rc::as_ptr(function) as *const () as usize
        ),
        Value::Builtin(builtin) => format!("<built-in function {}>", builtin.name),
        Value::BuiltinMethod(receiver, name) => {
            format!("<built-in method {} of {} object>", name, receiver.type_name())
        }
        Value::Class(class) => format!("<class '__main__.{}'>", class.name),
        Value::Instance(instance) => {
            if instance.class.lookup("__repr__").is_some() {
                return call_text_method(state, value, "__repr__");
            }
            format!(
                "<__main__.{} object at {:#x}>",
                instance.class.name,
                Rc::as_ptr(instance) as *const () as usize
            )
        }
        Value::BoundMethod(receiver, function) => {
            let owner = match &**receiver {
                Value::Instance(instance) => instance.class.name.clone(),
                other => other.type_name().to_string(),
            };
            format!("<bound method {}.{}>", owner, function.def.name)
        }
        Value::ExceptionType(kind) => format!("<class '{}'>", kind),
        Value::Exception(exc) if exc.message.is_empty() => format!("{}()", exc.kind),
        Value::Exception(exc) => format!("{}({})", exc.kind, quote(&exc.message)),
    })
}

// ========== Builtins ==========

/// `print(*values, sep=' ', end='\n')`
pub fn print(state: &mut State, args: Args) -> Result<Value, Exception> {
    let mut sep = " ".to_string();
    let mut end = "\n".to_string();
    for (name, value) in &args.keywords {
        let slot = match name.as_str() {
            "sep" => &mut sep,
            "end" => &mut end,
            other => {
                return Err(Exception::type_error(format!(
                    "'{}' is an invalid keyword argument for print()",
                    other
                )))
            }
        };
        match value {
            Value::Str(s) => *slot = s.to_string(),
            Value::None => {}
            other => {
                return Err(Exception::type_error(format!(
                    "{} must be None or a string, not {}",
                    name,
                    other.type_name()
                )))
            }
        }
    }

    let mut parts = Vec::with_capacity(args.positional.len());
    for value in &args.positional {
        parts.push(to_str(state, value)?);
    }
    let line = parts.join(&sep);
    state.stdout.push_str(&line);
    state.stdout.push_str(&end);
    Ok(Value::None)
}

/// `repr(x)`
pub fn builtin_repr(state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("repr", 1, 1)?;
    Ok(Value::str(repr(state, &args.positional[0])?))
}

/// `str(x)`
pub fn builtin_str(state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("str", 0, 1)?;
    match args.positional.first() {
        Some(value) => Ok(Value::str(to_str(state, value)?)),
        None => Ok(Value::str("")),
    }
}

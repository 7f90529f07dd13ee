use std::cmp::Ordering;
use std::rc::Rc;

use crate::builtins::computation::{self, as_int};
use crate::builtins::io;
use crate::error::{Exception, ExceptionKind};
use crate::eval;
use crate::types::{Args, State, Value};

/// Largest list `range()` will build.
const MAX_RANGE_LEN: i64 = 10_000_000;

const LIST_METHODS: &[&str] = &[
    "append", "count", "extend", "index", "insert", "pop", "remove", "reverse", "sort",
];
const STR_METHODS: &[&str] = &[
    "count", "endswith", "find", "format", "isdigit", "join", "lower", "lstrip", "replace",
    "rstrip", "split", "startswith", "strip", "upper",
];
const DICT_METHODS: &[&str] = &["get", "items", "keys", "pop", "setdefault", "update", "values"];

// ========== Helpers ==========

/// Materialize an iterable into its items.
pub fn iterate(value: &Value) -> Result<Vec<Value>, Exception> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.to_vec()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Dict(items) => Ok(items.borrow().iter().map(|(k, _)| k.clone()).collect()),
        other => Err(Exception::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

/// `item in container`.
pub fn contains(container: &Value, item: &Value) -> Result<bool, Exception> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(&**needle)),
        (Value::Str(_), other) => Err(Exception::type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::Dict(items), key) => {
            key.check_hashable()?;
            Ok(items.borrow().iter().any(|(k, _)| k.py_eq(key)))
        }
        _ => Ok(iterate(container)?.iter().any(|x| x.py_eq(item))),
    }
}

pub fn dict_get(items: &[(Value, Value)], key: &Value) -> Option<Value> {
    items.iter().find(|(k, _)| k.py_eq(key)).map(|(_, v)| v.clone())
}

/// Insert or replace, keeping first-insertion order.
pub fn dict_insert(items: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match items.iter_mut().find(|(k, _)| k.py_eq(&key)) {
        Some(slot) => slot.1 = value,
        None => items.push((key, value)),
    }
}

fn key_error(state: &mut State, key: &Value) -> Exception {
    let text = io::repr(state, key).unwrap_or_else(|e| e.to_string());
    Exception::new(ExceptionKind::KeyError, text)
}

fn normalize_index(index: &Value, len: usize, what: &str) -> Result<usize, Exception> {
    let i = as_int(index).ok_or_else(|| {
        Exception::type_error(format!(
            "{} indices must be integers, not {}",
            what,
            index.type_name()
        ))
    })?;
    let adjusted = if i < 0 { i + len as i64 } else { i };
    if adjusted < 0 || adjusted >= len as i64 {
        return Err(Exception::new(
            ExceptionKind::IndexError,
            format!("{} index out of range", what),
        ));
    }
    Ok(adjusted as usize)
}

fn expect_str<'a>(value: &'a Value, context: &str) -> Result<&'a str, Exception> {
    match value {
        Value::Str(s) => Ok(&**s),
        other => Err(Exception::type_error(format!(
            "{} must be str, not {}",
            context,
            other.type_name()
        ))),
    }
}

// ========== Subscripts ==========

/// `object[index]`
pub fn get_item(state: &mut State, object: &Value, index: &Value) -> Result<Value, Exception> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            Ok(items[normalize_index(index, items.len(), "list")?].clone())
        }
        Value::Tuple(items) => Ok(items[normalize_index(index, items.len(), "tuple")?].clone()),
        Value::Str(s) => {
            let idx = normalize_index(index, s.chars().count(), "string")?;
            Ok(Value::str(s.chars().nth(idx).map(String::from).unwrap_or_default()))
        }
        Value::Dict(items) => {
            index.check_hashable()?;
            let found = dict_get(&items.borrow(), index);
            found.ok_or_else(|| key_error(state, index))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `object[index] = value`
pub fn set_item(object: &Value, index: Value, value: Value) -> Result<(), Exception> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let idx = normalize_index(&index, items.len(), "list assignment")?;
            items[idx] = value;
            Ok(())
        }
        Value::Dict(items) => {
            index.check_hashable()?;
            dict_insert(&mut items.borrow_mut(), index, value);
            Ok(())
        }
        other => Err(Exception::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `del object[index]`
pub fn del_item(state: &mut State, object: &Value, index: &Value) -> Result<(), Exception> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let idx = normalize_index(index, items.len(), "list assignment")?;
            items.remove(idx);
            Ok(())
        }
        Value::Dict(items) => {
            index.check_hashable()?;
            let position = items.borrow().iter().position(|(k, _)| k.py_eq(index));
            match position {
                Some(idx) => {
                    items.borrow_mut().remove(idx);
                    Ok(())
                }
                None => Err(key_error(state, index)),
            }
        }
        other => Err(Exception::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}

// ========== Methods ==========

/// Names of the builtin methods of a value's type.
pub fn method_names(value: &Value) -> &'static [&'static str] {
    match value {
        Value::List(_) => LIST_METHODS,
        Value::Str(_) => STR_METHODS,
        Value::Dict(_) => DICT_METHODS,
        _ => &[],
    }
}

/// Bind a builtin method of a list, str or dict.
pub fn method(receiver: &Value, attr: &str) -> Option<Value> {
    method_names(receiver)
        .iter()
        .find(|name| **name == attr)
        .map(|name| Value::BuiltinMethod(Rc::new(receiver.clone()), *name))
}

/// Call a method bound by [`method`].
pub fn call_method(state: &mut State, receiver: &Value, name: &str, args: Args) -> Result<Value, Exception> {
    match receiver {
        Value::List(items) => list_method(state, items, name, args),
        Value::Str(s) => str_method(state, s, name, args),
        Value::Dict(items) => dict_method(state, items, name, args),
        other => Err(Exception::new(
            ExceptionKind::AttributeError,
            format!("'{}' object has no attribute '{}'", other.type_name(), name),
        )),
    }
}

type ListCell = std::cell::RefCell<Vec<Value>>;

fn list_method(state: &mut State, items: &ListCell, name: &str, args: Args) -> Result<Value, Exception> {
    if name == "sort" {
        if !args.positional.is_empty() {
            return Err(Exception::type_error("sort() takes no positional arguments"));
        }
        let snapshot = items.borrow().clone();
        let sorted = sort_values(state, snapshot, &args.keywords, "sort")?;
        *items.borrow_mut() = sorted;
        return Ok(Value::None);
    }

    let a = &args.positional;
    match name {
        "append" => {
            args.check_arity(name, 1, 1)?;
            items.borrow_mut().push(a[0].clone());
        }
        "extend" => {
            args.check_arity(name, 1, 1)?;
            let extra = iterate(&a[0])?;
            items.borrow_mut().extend(extra);
        }
        "insert" => {
            args.check_arity(name, 2, 2)?;
            let mut items = items.borrow_mut();
            let len = items.len() as i64;
            let i = as_int(&a[0]).ok_or_else(|| Exception::type_error("list indices must be integers"))?;
            let i = if i < 0 { (i + len).max(0) } else { i.min(len) };
            items.insert(i as usize, a[1].clone());
        }
        "pop" => {
            args.check_arity(name, 0, 1)?;
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(Exception::new(ExceptionKind::IndexError, "pop from empty list"));
            }
            let idx = match a.first() {
                Some(index) => normalize_index(index, items.len(), "pop")?,
                None => items.len() - 1,
            };
            return Ok(items.remove(idx));
        }
        "remove" => {
            args.check_arity(name, 1, 1)?;
            let position = items.borrow().iter().position(|x| x.py_eq(&a[0]));
            match position {
                Some(idx) => {
                    items.borrow_mut().remove(idx);
                }
                None => return Err(Exception::value_error("list.remove(x): x not in list")),
            }
        }
        "index" => {
            args.check_arity(name, 1, 1)?;
            let position = items.borrow().iter().position(|x| x.py_eq(&a[0]));
            return match position {
                Some(idx) => Ok(Value::Int(idx as i64)),
                None => {
                    let text = io::repr(state, &a[0])?;
                    Err(Exception::value_error(format!("{} is not in list", text)))
                }
            };
        }
        "count" => {
            args.check_arity(name, 1, 1)?;
            let n = items.borrow().iter().filter(|x| x.py_eq(&a[0])).count();
            return Ok(Value::Int(n as i64));
        }
        "reverse" => {
            args.check_arity(name, 0, 0)?;
            items.borrow_mut().reverse();
        }
        _ => return Err(no_method("list", name)),
    }
    Ok(Value::None)
}

fn no_method(type_name: &str, name: &str) -> Exception {
    Exception::new(
        ExceptionKind::AttributeError,
        format!("'{}' object has no attribute '{}'", type_name, name),
    )
}

fn strip_set<'a>(s: &'a str, chars: Option<&Value>, left: bool, right: bool) -> Result<&'a str, Exception> {
    let set = match chars {
        None | Some(Value::None) => None,
        Some(value) => Some(expect_str(value, "strip arg")?.to_string()),
    };
    let matches = |c: char| match &set {
        Some(set) => set.contains(c),
        None => c.is_whitespace(),
    };
    let mut out = s;
    if left {
        out = out.trim_start_matches(matches);
    }
    if right {
        out = out.trim_end_matches(matches);
    }
    Ok(out)
}

fn split_whitespace_limited(s: &str, maxsplit: Option<usize>) -> Vec<Value> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if maxsplit.is_some_and(|max| parts.len() >= max) {
            parts.push(Value::str(rest.trim_end()));
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        parts.push(Value::str(&rest[..end]));
        rest = rest[end..].trim_start();
    }
    parts
}

fn str_method(state: &mut State, s: &str, name: &str, args: Args) -> Result<Value, Exception> {
    if name == "format" {
        return Ok(Value::str(format_braces(state, s, &args)?));
    }

    let a = &args.positional;
    let value = match name {
        "upper" => {
            args.check_arity(name, 0, 0)?;
            Value::str(s.to_uppercase())
        }
        "lower" => {
            args.check_arity(name, 0, 0)?;
            Value::str(s.to_lowercase())
        }
        "isdigit" => {
            args.check_arity(name, 0, 0)?;
            Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        }
        "strip" | "lstrip" | "rstrip" => {
            args.check_arity(name, 0, 1)?;
            let left = name != "rstrip";
            let right = name != "lstrip";
            Value::str(strip_set(s, a.first(), left, right)?)
        }
        "split" => {
            args.check_arity(name, 0, 2)?;
            let maxsplit = match a.get(1) {
                Some(value) => {
                    let n = as_int(value).ok_or_else(|| Exception::type_error("maxsplit must be an integer"))?;
                    usize::try_from(n).ok()
                }
                None => None,
            };
            match a.first() {
                None | Some(Value::None) => Value::list(split_whitespace_limited(s, maxsplit)),
                Some(sep) => {
                    let sep = expect_str(sep, "separator")?;
                    if sep.is_empty() {
                        return Err(Exception::value_error("empty separator"));
                    }
                    let parts: Vec<Value> = match maxsplit {
                        Some(max) => s.splitn(max + 1, sep).map(Value::str).collect(),
                        None => s.split(sep).map(Value::str).collect(),
                    };
                    Value::list(parts)
                }
            }
        }
        "join" => {
            args.check_arity(name, 1, 1)?;
            let mut parts = Vec::new();
            for (i, item) in iterate(&a[0])?.iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part.to_string()),
                    other => {
                        return Err(Exception::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            i,
                            other.type_name()
                        )))
                    }
                }
            }
            Value::str(parts.join(s))
        }
        "startswith" | "endswith" => {
            args.check_arity(name, 1, 1)?;
            let affix = expect_str(&a[0], name)?;
            Value::Bool(if name == "startswith" {
                s.starts_with(affix)
            } else {
                s.ends_with(affix)
            })
        }
        "replace" => {
            args.check_arity(name, 2, 3)?;
            let old = expect_str(&a[0], "replace() argument 1")?;
            let new = expect_str(&a[1], "replace() argument 2")?;
            match a.get(2).and_then(as_int) {
                Some(count) if count >= 0 => Value::str(s.replacen(old, new, count as usize)),
                _ => Value::str(s.replace(old, new)),
            }
        }
        "find" => {
            args.check_arity(name, 1, 1)?;
            let needle = expect_str(&a[0], "find() argument")?;
            match s.find(needle) {
                Some(byte) => Value::Int(s[..byte].chars().count() as i64),
                None => Value::Int(-1),
            }
        }
        "count" => {
            args.check_arity(name, 1, 1)?;
            let needle = expect_str(&a[0], "count() argument")?;
            let n = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Value::Int(n as i64)
        }
        _ => return Err(no_method("str", name)),
    };
    Ok(value)
}

fn dict_method(
    state: &mut State,
    items: &std::cell::RefCell<Vec<(Value, Value)>>,
    name: &str,
    args: Args,
) -> Result<Value, Exception> {
    if name == "update" {
        if args.positional.len() > 1 {
            return Err(Exception::type_error("update expected at most 1 argument"));
        }
        let mut pairs = match args.positional.first() {
            Some(other) => pairs_from(other)?,
            None => Vec::new(),
        };
        pairs.extend(args.keywords.into_iter().map(|(k, v)| (Value::str(k), v)));
        let mut items = items.borrow_mut();
        for (key, value) in pairs {
            dict_insert(&mut items, key, value);
        }
        return Ok(Value::None);
    }

    let a = &args.positional;
    match name {
        "keys" | "values" | "items" => {
            args.check_arity(name, 0, 0)?;
            let items = items.borrow();
            let out = items
                .iter()
                .map(|(k, v)| match name {
                    "keys" => k.clone(),
                    "values" => v.clone(),
                    _ => Value::tuple(vec![k.clone(), v.clone()]),
                })
                .collect();
            Ok(Value::list(out))
        }
        "get" => {
            args.check_arity(name, 1, 2)?;
            a[0].check_hashable()?;
            let found = dict_get(&items.borrow(), &a[0]);
            Ok(found.unwrap_or_else(|| a.get(1).cloned().unwrap_or(Value::None)))
        }
        "setdefault" => {
            args.check_arity(name, 1, 2)?;
            a[0].check_hashable()?;
            let found = dict_get(&items.borrow(), &a[0]);
            Ok(match found {
                Some(value) => value,
                None => {
                    let value = a.get(1).cloned().unwrap_or(Value::None);
                    items.borrow_mut().push((a[0].clone(), value.clone()));
                    value
                }
            })
        }
        "pop" => {
            args.check_arity(name, 1, 2)?;
            a[0].check_hashable()?;
            let position = items.borrow().iter().position(|(k, _)| k.py_eq(&a[0]));
            match (position, a.get(1)) {
                (Some(idx), _) => Ok(items.borrow_mut().remove(idx).1),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(key_error(state, &a[0])),
            }
        }
        _ => Err(no_method("dict", name)),
    }
}

/// Key/value pairs from a dict or an iterable of pairs.
fn pairs_from(value: &Value) -> Result<Vec<(Value, Value)>, Exception> {
    if let Value::Dict(items) = value {
        return Ok(items.borrow().clone());
    }
    let mut pairs = Vec::new();
    for (i, element) in iterate(value)?.into_iter().enumerate() {
        let pair = iterate(&element)?;
        match <[Value; 2]>::try_from(pair) {
            Ok([key, val]) => {
                key.check_hashable()?;
                pairs.push((key, val));
            }
            Err(pair) => {
                return Err(Exception::value_error(format!(
                    "dictionary update sequence element #{} has length {}; 2 is required",
                    i,
                    pair.len()
                )))
            }
        }
    }
    Ok(pairs)
}

fn sort_values(
    state: &mut State,
    items: Vec<Value>,
    keywords: &[(String, Value)],
    name: &str,
) -> Result<Vec<Value>, Exception> {
    let mut key_fn = None;
    let mut reverse = false;
    for (keyword, value) in keywords {
        match keyword.as_str() {
            "key" if !value.is_none() => key_fn = Some(value.clone()),
            "key" => {}
            "reverse" => reverse = value.truthy(),
            other => {
                return Err(Exception::type_error(format!(
                    "'{}' is an invalid keyword argument for {}()",
                    other, name
                )))
            }
        }
    }

    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let key = match &key_fn {
            Some(func) => eval::call_value(state, func, vec![item.clone()], Vec::new())?,
            None => item.clone(),
        };
        keyed.push((key, item));
    }

    let mut error = None;
    keyed.sort_by(|(a, _), (b, _)| {
        let order = match computation::ordering(a, b) {
            Ok(order) => order.unwrap_or(Ordering::Equal),
            Err(e) => {
                error.get_or_insert(e);
                Ordering::Equal
            }
        };
        if reverse {
            order.reverse()
        } else {
            order
        }
    });
    match error {
        Some(e) => Err(e),
        None => Ok(keyed.into_iter().map(|(_, item)| item).collect()),
    }
}

// ========== str.format ==========

fn format_braces(state: &mut State, fmt: &str, args: &Args) -> Result<String, Exception> {
    let mut out = String::with_capacity(fmt.len());
    let mut next_auto = 0usize;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(Exception::value_error("Single '}' encountered in format string")),
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => {
                            return Err(Exception::value_error(
                                "Single '{' encountered in format string",
                            ))
                        }
                    }
                }
                let (field, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let (name, conversion) = match field.split_once('!') {
                    Some((name, conv)) => (name, Some(conv)),
                    None => (field, None),
                };
                let value = if name.is_empty() {
                    next_auto += 1;
                    args.positional.get(next_auto - 1).ok_or_else(|| {
                        Exception::new(ExceptionKind::IndexError, "tuple index out of range")
                    })?
                } else if let Ok(idx) = name.parse::<usize>() {
                    args.positional.get(idx).ok_or_else(|| {
                        Exception::new(ExceptionKind::IndexError, "tuple index out of range")
                    })?
                } else {
                    match args.keywords.iter().find(|(k, _)| k == name) {
                        Some((_, value)) => value,
                        None => return Err(Exception::new(ExceptionKind::KeyError, io::quote(name))),
                    }
                };
                let text = match conversion {
                    Some("r") => io::repr(state, value)?,
                    Some("s") | None => {
                        if spec.is_empty() {
                            io::to_str(state, value)?
                        } else {
                            apply_spec(state, value, spec)?
                        }
                    }
                    Some(other) => {
                        return Err(Exception::value_error(format!(
                            "Unknown conversion specifier {}",
                            other
                        )))
                    }
                };
                out.push_str(&text);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Format spec `[align][0][width][.precision][type]` with align `<>^` and
/// type `s d f`.
fn apply_spec(state: &mut State, value: &Value, spec: &str) -> Result<String, Exception> {
    let mut rest = spec;
    let mut align = None;
    if let Some(c @ ('<' | '>' | '^')) = rest.chars().next() {
        align = Some(c);
        rest = &rest[1..];
    }
    let zero = rest.starts_with('0');
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    let width: usize = rest[..digits].parse().unwrap_or(0);
    rest = &rest[digits..];
    let mut precision = None;
    if let Some(after) = rest.strip_prefix('.') {
        let digits = after.chars().take_while(char::is_ascii_digit).count();
        precision = after[..digits].parse::<usize>().ok();
        rest = &after[digits..];
    }
    let invalid = || Exception::value_error(format!("Invalid format specifier '{}'", spec));
    let numeric = matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_));
    let text = match rest {
        "f" => {
            let n = match value {
                Value::Float(f) => *f,
                other => as_int(other).ok_or_else(invalid)? as f64,
            };
            format!("{:.*}", precision.unwrap_or(6), n)
        }
        "d" => as_int(value).ok_or_else(invalid)?.to_string(),
        "" if matches!(value, Value::Float(_)) && precision.is_some() => {
            let f = if let Value::Float(f) = value { *f } else { 0.0 };
            format!("{:.*}", precision.unwrap_or(6), f)
        }
        "" | "s" => {
            let text = io::to_str(state, value)?;
            match precision {
                Some(p) if !numeric => text.chars().take(p).collect(),
                _ => text,
            }
        }
        _ => return Err(invalid()),
    };

    let len = text.chars().count();
    if len >= width {
        return Ok(text);
    }
    let pad = width - len;
    let align = align.unwrap_or(if numeric { '>' } else { '<' });
    Ok(match align {
        '>' if zero && numeric => match text.strip_prefix('-') {
            Some(digits) => format!("-{}{}", "0".repeat(pad), digits),
            None => format!("{}{}", "0".repeat(pad), text),
        },
        '>' => format!("{}{}", " ".repeat(pad), text),
        '^' => format!("{}{}{}", " ".repeat(pad / 2), text, " ".repeat(pad - pad / 2)),
        _ => format!("{}{}", text, " ".repeat(pad)),
    })
}

// ========== Builtins ==========

/// `len(x)`
pub fn len(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("len", 1, 1)?;
    let n = match &args.positional[0] {
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Str(s) => s.chars().count(),
        Value::Dict(items) => items.borrow().len(),
        other => {
            return Err(Exception::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(n as i64))
}

/// `list(iterable=())`
pub fn list(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("list", 0, 1)?;
    match args.positional.first() {
        Some(value) => Ok(Value::list(iterate(value)?)),
        None => Ok(Value::list(Vec::new())),
    }
}

/// `tuple(iterable=())`
pub fn tuple(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("tuple", 0, 1)?;
    match args.positional.first() {
        Some(value) => Ok(Value::tuple(iterate(value)?)),
        None => Ok(Value::tuple(Vec::new())),
    }
}

/// `dict(pairs=(), **kwargs)`
pub fn dict(_state: &mut State, args: Args) -> Result<Value, Exception> {
    if args.positional.len() > 1 {
        return Err(Exception::type_error(format!(
            "dict expected at most 1 argument, got {}",
            args.positional.len()
        )));
    }
    let mut items = Vec::new();
    if let Some(source) = args.positional.first() {
        for (key, value) in pairs_from(source)? {
            dict_insert(&mut items, key, value);
        }
    }
    for (key, value) in args.keywords {
        dict_insert(&mut items, Value::str(key), value);
    }
    Ok(Value::dict(items))
}

/// `range(stop)` or `range(start, stop[, step])`, as a list.
pub fn range(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("range", 1, 3)?;
    let mut bounds = Vec::with_capacity(3);
    for value in &args.positional {
        bounds.push(as_int(value).ok_or_else(|| {
            Exception::type_error(format!(
                "range() integer argument expected, got {}.",
                value.type_name()
            ))
        })?);
    }
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => (0, 0, 1),
    };
    if step == 0 {
        return Err(Exception::value_error("range() arg 3 must not be zero"));
    }

    let span = if step > 0 {
        (stop as i128 - start as i128 + step as i128 - 1) / step as i128
    } else {
        (start as i128 - stop as i128 - step as i128 - 1) / -(step as i128)
    };
    if span > MAX_RANGE_LEN as i128 {
        return Err(Exception::new(
            ExceptionKind::OverflowError,
            "range() result has too many items",
        ));
    }
    let count = span.max(0) as i64;
    Ok(Value::list((0..count).map(|i| Value::Int(start + i * step)).collect()))
}

/// `sorted(iterable, key=None, reverse=False)`
pub fn sorted(state: &mut State, args: Args) -> Result<Value, Exception> {
    if args.positional.len() != 1 {
        return Err(Exception::type_error(format!(
            "sorted expected 1 argument, got {}",
            args.positional.len()
        )));
    }
    let items = iterate(&args.positional[0])?;
    Ok(Value::list(sort_values(state, items, &args.keywords, "sorted")?))
}

/// `enumerate(iterable, start=0)`, as a list of pairs.
pub fn enumerate(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("enumerate", 1, 2)?;
    let start = match args.positional.get(1) {
        Some(value) => as_int(value).ok_or_else(|| Exception::type_error("an integer is required"))?,
        None => 0,
    };
    let pairs = iterate(&args.positional[0])?
        .into_iter()
        .zip(start..)
        .map(|(item, i)| Value::tuple(vec![Value::Int(i), item]))
        .collect();
    Ok(Value::list(pairs))
}

/// `zip(*iterables)`, as a list of tuples.
pub fn zip(_state: &mut State, args: Args) -> Result<Value, Exception> {
    if !args.keywords.is_empty() {
        return Err(Exception::type_error("zip() takes no keyword arguments"));
    }
    let sequences = args
        .positional
        .iter()
        .map(iterate)
        .collect::<Result<Vec<_>, _>>()?;
    let shortest = sequences.iter().map(Vec::len).min().unwrap_or(0);
    let rows = (0..shortest)
        .map(|i| Value::tuple(sequences.iter().map(|seq| seq[i].clone()).collect()))
        .collect();
    Ok(Value::list(rows))
}

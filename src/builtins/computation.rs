use std::cmp::Ordering;

use crate::ast::{BinOp, CmpOp, UnaryOp};
use crate::builtins::{collections, io};
use crate::error::{Exception, ExceptionKind};
use crate::types::{Args, CompilerFlags, State, Value};

// ========== Helpers ==========

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn to_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }
}

fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Int(n) => Some(Num::Int(*n)),
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

/// Integer value of an int or bool.
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn overflow() -> Exception {
    Exception::new(ExceptionKind::OverflowError, "integer overflow")
}

fn zero_division(message: &str) -> Exception {
    Exception::new(ExceptionKind::ZeroDivisionError, message)
}

fn unsupported(op: &str, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

// ========== Arithmetic ==========

/// Apply a binary operator. `/` on two ints floors unless the DIVISION flag
/// is in effect.
pub fn binary_op(state: &mut State, op: BinOp, left: &Value, right: &Value) -> Result<Value, Exception> {
    if let (Some(a), Some(b)) = (as_num(left), as_num(right)) {
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) => int_op(state.flags, op, x, y),
            _ => float_op(op, a.to_f64(), b.to_f64()),
        };
    }

    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{}{}", a, b))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Mul, seq, count) | (BinOp::Mul, count, seq) if as_int(count).is_some() => {
            repeat(seq, as_int(count).unwrap_or(0))
                .unwrap_or_else(|| Err(unsupported("*", left, right)))
        }
        (BinOp::Mod, Value::Str(fmt), args) => Ok(Value::str(format_percent(state, fmt, args)?)),
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

/// Longest sequence `*` may build: elements, or bytes for strings.
const MAX_REPEAT_LEN: usize = 10_000_000;

/// `None` when `seq` is not a sequence.
fn repeat(seq: &Value, count: i64) -> Option<Result<Value, Exception>> {
    let times = usize::try_from(count).unwrap_or(0);
    let len = match seq {
        Value::Str(s) => s.len(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        _ => return None,
    };
    if len.checked_mul(times).map_or(true, |total| total > MAX_REPEAT_LEN) {
        return Some(Err(Exception::new(
            ExceptionKind::OverflowError,
            "repeated sequence is too long",
        )));
    }
    let value = match seq {
        Value::Str(s) => Value::str(s.repeat(times)),
        Value::List(items) => {
            let items = items.borrow();
            Value::list(std::iter::repeat(items.iter()).take(times).flatten().cloned().collect())
        }
        Value::Tuple(items) => Value::tuple(
            std::iter::repeat(items.iter()).take(times).flatten().cloned().collect(),
        ),
        _ => return None,
    };
    Some(Ok(value))
}

fn int_op(flags: CompilerFlags, op: BinOp, x: i64, y: i64) -> Result<Value, Exception> {
    match op {
        BinOp::Add => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
        BinOp::Sub => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
        BinOp::Mul => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
        BinOp::Div if flags.contains(CompilerFlags::DIVISION) => {
            float_op(BinOp::Div, x as f64, y as f64)
        }
        BinOp::Div | BinOp::FloorDiv => floor_div(x, y).map(Value::Int),
        BinOp::Mod => floor_mod(x, y).map(Value::Int),
        BinOp::Pow if y < 0 => float_op(BinOp::Pow, x as f64, y as f64),
        BinOp::Pow => u32::try_from(y)
            .ok()
            .and_then(|exp| x.checked_pow(exp))
            .map(Value::Int)
            .ok_or_else(overflow),
    }
}

/// Integer division rounding toward negative infinity.
pub fn floor_div(x: i64, y: i64) -> Result<i64, Exception> {
    if y == 0 {
        return Err(zero_division("integer division or modulo by zero"));
    }
    let q = x.checked_div(y).ok_or_else(overflow)?;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Remainder with the sign of the divisor.
pub fn floor_mod(x: i64, y: i64) -> Result<i64, Exception> {
    if y == 0 {
        return Err(zero_division("integer division or modulo by zero"));
    }
    let r = x.checked_rem(y).ok_or_else(overflow)?;
    if r != 0 && ((r < 0) != (y < 0)) {
        Ok(r + y)
    } else {
        Ok(r)
    }
}

fn float_op(op: BinOp, x: f64, y: f64) -> Result<Value, Exception> {
    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div if y == 0.0 => return Err(zero_division("float division by zero")),
        BinOp::Div => x / y,
        BinOp::FloorDiv if y == 0.0 => return Err(zero_division("float divmod()")),
        BinOp::FloorDiv => (x / y).floor(),
        BinOp::Mod if y == 0.0 => return Err(zero_division("float modulo")),
        BinOp::Mod => {
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        BinOp::Pow => {
            if x < 0.0 && y.fract() != 0.0 {
                return Err(Exception::value_error(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            if x == 0.0 && y < 0.0 {
                return Err(zero_division("0.0 cannot be raised to a negative power"));
            }
            let r = x.powf(y);
            if r.is_infinite() && x.is_finite() && y.is_finite() {
                return Err(Exception::new(
                    ExceptionKind::OverflowError,
                    "numerical result out of range",
                ));
            }
            r
        }
    };
    Ok(Value::Float(result))
}

/// Apply a unary operator.
pub fn unary_op(op: UnaryOp, value: &Value) -> Result<Value, Exception> {
    match (op, as_num(value)) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!value.truthy())),
        (UnaryOp::Neg, Some(Num::Int(n))) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Num::Int(n))) => Ok(Value::Int(n)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (UnaryOp::Neg | UnaryOp::Pos, None) => Err(Exception::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            value.type_name()
        ))),
    }
}

// ========== Comparisons ==========

/// Order two values, `None` when unordered (NaN).
pub fn ordering(left: &Value, right: &Value) -> Result<Option<Ordering>, Exception> {
    if let (Some(a), Some(b)) = (as_num(left), as_num(right)) {
        return Ok(match (a, b) {
            (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
            _ => a.to_f64().partial_cmp(&b.to_f64()),
        });
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow().clone(), b.borrow().clone());
            sequence_ordering(&a, &b)
        }
        (Value::Tuple(a), Value::Tuple(b)) => sequence_ordering(a, b),
        _ => Err(Exception::type_error(format!(
            "unorderable types: {}() < {}()",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn sequence_ordering(a: &[Value], b: &[Value]) -> Result<Option<Ordering>, Exception> {
    for (x, y) in a.iter().zip(b) {
        if !x.py_eq(y) {
            return ordering(x, y);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// Evaluate one link of a comparison chain.
pub fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, Exception> {
    let ordered = |test: fn(Ordering) -> bool| -> Result<bool, Exception> {
        Ok(ordering(left, right)?.is_some_and(test))
    };
    match op {
        CmpOp::Eq => Ok(left.py_eq(right)),
        CmpOp::NotEq => Ok(!left.py_eq(right)),
        CmpOp::Is => Ok(left.is(right)),
        CmpOp::IsNot => Ok(!left.is(right)),
        CmpOp::In => collections::contains(right, left),
        CmpOp::NotIn => collections::contains(right, left).map(|found| !found),
        CmpOp::Lt => ordered(Ordering::is_lt),
        CmpOp::LtE => ordered(Ordering::is_le),
        CmpOp::Gt => ordered(Ordering::is_gt),
        CmpOp::GtE => ordered(Ordering::is_ge),
    }
}

// ========== String formatting ==========

/// `fmt % args` with `%s %r %d %i %f %x %%`, flags `-` and `0`, width and
/// precision.
pub fn format_percent(state: &mut State, fmt: &str, args: &Value) -> Result<String, Exception> {
    let values: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    let mut values = values.into_iter();
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut left_align = false;
        let mut zero_pad = false;
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => left_align = true,
                '0' => zero_pad = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = 0usize;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            width = width * 10 + d as usize;
            chars.next();
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = 0usize;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                p = p * 10 + d as usize;
                chars.next();
            }
            precision = Some(p);
        }

        let conversion = chars
            .next()
            .ok_or_else(|| Exception::value_error("incomplete format"))?;
        if conversion == '%' {
            out.push('%');
            continue;
        }
        let value = values
            .next()
            .ok_or_else(|| Exception::type_error("not enough arguments for format string"))?;

        let numeric = matches!(conversion, 'd' | 'i' | 'f' | 'x');
        let text = match conversion {
            's' => io::to_str(state, &value)?,
            'r' => io::repr(state, &value)?,
            'd' | 'i' | 'x' => {
                let n = match (&value, as_num(&value)) {
                    (_, Some(Num::Int(n))) => n,
                    (_, Some(Num::Float(f))) => f.trunc() as i64,
                    (other, None) => {
                        return Err(Exception::type_error(format!(
                            "%{} format: a number is required, not {}",
                            conversion,
                            other.type_name()
                        )))
                    }
                };
                if conversion == 'x' {
                    if n < 0 {
                        format!("-{:x}", n.unsigned_abs())
                    } else {
                        format!("{:x}", n)
                    }
                } else {
                    n.to_string()
                }
            }
            'f' => {
                let f = as_num(&value).map(Num::to_f64).ok_or_else(|| {
                    Exception::type_error(format!("must be real number, not {}", value.type_name()))
                })?;
                format!("{:.*}", precision.unwrap_or(6), f)
            }
            other => {
                return Err(Exception::value_error(format!(
                    "unsupported format character '{}' ({:#x})",
                    other, other as u32
                )))
            }
        };
        let text = match (conversion, precision) {
            ('s' | 'r', Some(p)) => text.chars().take(p).collect(),
            _ => text,
        };

        let len = text.chars().count();
        if len >= width {
            out.push_str(&text);
        } else if left_align {
            out.push_str(&text);
            out.push_str(&" ".repeat(width - len));
        } else if zero_pad && numeric {
            let (sign, digits) = match text.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", text.as_str()),
            };
            out.push_str(sign);
            out.push_str(&"0".repeat(width - len));
            out.push_str(digits);
        } else {
            out.push_str(&" ".repeat(width - len));
            out.push_str(&text);
        }
    }

    if values.next().is_some() {
        return Err(Exception::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

// ========== Builtins ==========

/// `abs(x)`
pub fn abs(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("abs", 1, 1)?;
    match as_num(&args.positional[0]) {
        Some(Num::Int(n)) => n.checked_abs().map(Value::Int).ok_or_else(overflow),
        Some(Num::Float(f)) => Ok(Value::Float(f.abs())),
        None => Err(Exception::type_error(format!(
            "bad operand type for abs(): '{}'",
            args.positional[0].type_name()
        ))),
    }
}

/// `int(x=0, base=10)`
pub fn int(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("int", 0, 2)?;
    let base = match args.positional.get(1) {
        Some(value) => as_int(value)
            .and_then(|b| u32::try_from(b).ok())
            .filter(|b| (2..=36).contains(b))
            .ok_or_else(|| Exception::value_error("int() base must be >= 2 and <= 36"))?,
        None => 10,
    };
    match args.positional.first() {
        None => Ok(Value::Int(0)),
        Some(Value::Str(s)) => i64::from_str_radix(s.trim(), base).map(Value::Int).map_err(|_| {
            Exception::value_error(format!(
                "invalid literal for int() with base {}: {}",
                base,
                io::quote(s)
            ))
        }),
        Some(_) if args.positional.len() == 2 => {
            Err(Exception::type_error("int() can't convert non-string with explicit base"))
        }
        Some(Value::Float(f)) if f.is_nan() => {
            Err(Exception::value_error("cannot convert float NaN to integer"))
        }
        Some(Value::Float(f)) if f.is_infinite() || f.abs() >= 9.223_372_036_854_776e18 => Err(
            Exception::new(ExceptionKind::OverflowError, "cannot convert float to integer"),
        ),
        Some(Value::Float(f)) => Ok(Value::Int(f.trunc() as i64)),
        Some(other) => as_int(other).map(Value::Int).ok_or_else(|| {
            Exception::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

/// `float(x=0.0)`
pub fn float(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("float", 0, 1)?;
    match args.positional.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Str(s)) => {
            let text = s.trim();
            let parsed = match text.to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                "nan" | "+nan" | "-nan" => Some(f64::NAN),
                _ => text.parse::<f64>().ok(),
            };
            parsed.map(Value::Float).ok_or_else(|| {
                Exception::value_error(format!("could not convert string to float: {}", io::quote(s)))
            })
        }
        Some(other) => as_num(other).map(|n| Value::Float(n.to_f64())).ok_or_else(|| {
            Exception::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

/// `bool(x=False)`
pub fn bool(_state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("bool", 0, 1)?;
    Ok(Value::Bool(args.positional.first().is_some_and(Value::truthy)))
}

/// `divmod(a, b)`
pub fn divmod(state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("divmod", 2, 2)?;
    let (a, b) = (&args.positional[0], &args.positional[1]);
    let quotient = binary_op(state, BinOp::FloorDiv, a, b)?;
    let remainder = binary_op(state, BinOp::Mod, a, b)?;
    Ok(Value::tuple(vec![quotient, remainder]))
}

fn extreme(name: &str, args: Args, wanted: Ordering) -> Result<Value, Exception> {
    if !args.keywords.is_empty() {
        return Err(Exception::type_error(format!("{}() takes no keyword arguments", name)));
    }
    if args.positional.is_empty() {
        return Err(Exception::type_error(format!(
            "{} expected at least 1 argument, got 0",
            name
        )));
    }
    let candidates = if args.positional.len() == 1 {
        collections::iterate(&args.positional[0])?
    } else {
        args.positional
    };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = Some(match best {
            Some(current) if ordering(&candidate, &current)? != Some(wanted) => current,
            _ => candidate,
        });
    }
    best.ok_or_else(|| Exception::value_error(format!("{}() arg is an empty sequence", name)))
}

/// `min(iterable)` or `min(a, b, ...)`
pub fn min(_state: &mut State, args: Args) -> Result<Value, Exception> {
    extreme("min", args, Ordering::Less)
}

/// `max(iterable)` or `max(a, b, ...)`
pub fn max(_state: &mut State, args: Args) -> Result<Value, Exception> {
    extreme("max", args, Ordering::Greater)
}

/// `sum(iterable, start=0)`
pub fn sum(state: &mut State, args: Args) -> Result<Value, Exception> {
    args.check_arity("sum", 1, 2)?;
    let mut total = args.positional.get(1).cloned().unwrap_or(Value::Int(0));
    if matches!(total, Value::Str(_)) {
        return Err(Exception::type_error(
            "sum() can't sum strings [use ''.join(seq) instead]",
        ));
    }
    for item in collections::iterate(&args.positional[0])? {
        total = binary_op(state, BinOp::Add, &total, &item)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(op: BinOp, a: Value, b: Value) -> Result<Value, Exception> {
        binary_op(&mut State::new(), op, &a, &b)
    }

    #[test]
    fn test_classic_division_floors() {
        assert!(matches!(apply(BinOp::Div, Value::Int(1), Value::Int(2)), Ok(Value::Int(0))));
        assert!(matches!(apply(BinOp::Div, Value::Int(-7), Value::Int(2)), Ok(Value::Int(-4))));
    }

    #[test]
    fn test_true_division_with_flag() {
        let mut state = State::new();
        state.flags = CompilerFlags::DIVISION;
        let result = binary_op(&mut state, BinOp::Div, &Value::Int(1), &Value::Int(2)).unwrap();
        assert!(matches!(result, Value::Float(f) if f == 0.5));
    }

    #[test]
    fn test_modulo_sign_follows_divisor() {
        assert_eq!(floor_mod(-7, 3).unwrap(), 2);
        assert_eq!(floor_mod(7, -3).unwrap(), -2);
        assert!(matches!(apply(BinOp::Mod, Value::Float(-1.0), Value::Float(3.0)), Ok(Value::Float(f)) if f == 2.0));
    }

    #[test]
    fn test_division_by_zero() {
        let err = apply(BinOp::Div, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::ZeroDivisionError);
        let err = apply(BinOp::Div, Value::Float(1.0), Value::Int(0)).unwrap_err();
        assert_eq!(err.message, "float division by zero");
    }

    #[test]
    fn test_huge_repetition_is_refused() {
        let err = apply(BinOp::Mul, Value::str("a"), Value::Int(9_999_999_999_999)).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OverflowError);
        let err = apply(BinOp::Mul, Value::Int(1 << 62), Value::str("ab")).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OverflowError);
        let err = apply(BinOp::Mul, Value::list(vec![Value::None]), Value::Int(i64::MAX)).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OverflowError);
        assert!(matches!(apply(BinOp::Mul, Value::str(""), Value::Int(i64::MAX)), Ok(Value::Str(s)) if s.is_empty()));
        assert!(matches!(apply(BinOp::Mul, Value::str("ab"), Value::Int(3)), Ok(Value::Str(s)) if &*s == "ababab"));
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = apply(BinOp::Mul, Value::Int(i64::MAX), Value::Int(2)).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OverflowError);
    }

    #[test]
    fn test_sequence_ops() {
        let mut state = State::new();
        let result = apply(BinOp::Mul, Value::str("ab"), Value::Int(3)).unwrap();
        assert_eq!(io::repr(&mut state, &result).unwrap(), "'ababab'");
        let result = apply(BinOp::Mul, Value::Int(2), Value::list(vec![Value::Int(1)])).unwrap();
        assert_eq!(io::repr(&mut state, &result).unwrap(), "[1, 1]");
    }

    #[test]
    fn test_type_error_message() {
        let err = apply(BinOp::Add, Value::Int(1), Value::str("a")).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for +: 'int' and 'str'");
    }

    #[test]
    fn test_chained_comparison_parts() {
        assert!(compare(CmpOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap());
        assert!(compare(CmpOp::In, &Value::str("b"), &Value::str("abc")).unwrap());
        assert!(compare(CmpOp::NotIn, &Value::Int(4), &Value::list(vec![Value::Int(1)])).unwrap());
        assert!(compare(CmpOp::Lt, &Value::str("a"), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_percent_format() {
        let mut state = State::new();
        let args = Value::tuple(vec![Value::str("x"), Value::Int(7), Value::Float(1.5)]);
        assert_eq!(
            format_percent(&mut state, "%s=%03d (%.2f) 100%%", &args).unwrap(),
            "x=007 (1.50) 100%"
        );
        assert!(format_percent(&mut state, "%s %s", &Value::Int(1)).is_err());
        assert!(format_percent(&mut state, "%s", &args).is_err());
    }

    #[test]
    fn test_int_conversions() {
        let mut state = State::new();
        let call = |state: &mut State, positional: Vec<Value>| {
            int(state, Args { positional, keywords: vec![] })
        };
        assert!(matches!(call(&mut state, vec![Value::str(" 42 ")]), Ok(Value::Int(42))));
        assert!(matches!(call(&mut state, vec![Value::Float(-2.7)]), Ok(Value::Int(-2))));
        assert!(matches!(call(&mut state, vec![Value::str("ff"), Value::Int(16)]), Ok(Value::Int(255))));
        let err = call(&mut state, vec![Value::str("abc")]).unwrap_err();
        assert_eq!(err.message, "invalid literal for int() with base 10: 'abc'");
    }
}

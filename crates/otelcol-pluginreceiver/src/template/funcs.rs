//! Builtin template functions and value formatting
//!
//! `printf` understands the verbs `%v %s %q %d %t %f %e %E %x %X %o %c`,
//! the `-`, `0` and `+` flags, width, precision and `[n]` argument indexes.
//! A width or precision with more than seven digits ends formatting with
//! `%!(NOVERB)`.

use serde_yaml::Value;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Functions available to every template
///
/// `and` and `or` are evaluated lazily by the executor and never reach
/// [`call`].
pub(crate) const BUILTINS: &[&str] = &[
    "and", "or", "not", "eq", "ne", "lt", "le", "gt", "ge", "len", "index", "print", "printf",
    "println",
];

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Text printed for a missing value
pub(crate) const NO_VALUE: &str = "<no value>";

/// Truth of a value: false, zero, empty and missing values are false
pub(crate) fn truth(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(u) = n.as_u64() {
                u != 0
            } else {
                n.as_f64().is_some_and(|f| f != 0.0)
            }
        }
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => truth(&tagged.value),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(tagged) => type_name(&tagged.value),
    }
}

/// Rewrite a Rust exponent (`1.5e3`) with a signed two-digit exponent
fn exponent_form(formatted: &str, marker: char) -> String {
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}{}{}{:0>2}", mantissa, marker, sign, digits)
        }
        None => formatted.to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e21).contains(&abs) {
        return exponent_form(&format!("{:e}", f), 'e');
    }
    format!("{}", f)
}

fn format_inner(value: &Value, nested: bool) -> String {
    match value {
        Value::Null if nested => "<nil>".to_string(),
        Value::Null => NO_VALUE.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => format_float(f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Sequence(seq) => {
            let items: Vec<String> = seq.iter().map(|v| format_inner(v, true)).collect();
            format!("[{}]", items.join(" "))
        }
        Value::Mapping(map) => {
            let mut entries: Vec<(&Value, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| compare_keys(a.0, b.0));
            let items: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", format_inner(k, true), format_inner(v, true)))
                .collect();
            format!("map[{}]", items.join(" "))
        }
        Value::Tagged(tagged) => format_inner(&tagged.value, nested),
    }
}

/// Print a value the way `{{ . }}` shows it
pub(crate) fn format_value(value: &Value) -> String {
    format_inner(value, false)
}

/// Comparable view of a scalar
#[derive(Debug, PartialEq)]
enum Basic<'a> {
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(&'a str),
}

fn basic(value: &Value) -> Result<Basic<'_>, String> {
    match value {
        Value::Null => Ok(Basic::Null),
        Value::Bool(b) => Ok(Basic::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Basic::Int(i as i128))
            } else if let Some(u) = n.as_u64() {
                Ok(Basic::Int(u as i128))
            } else {
                Ok(Basic::Float(n.as_f64().unwrap_or(f64::NAN)))
            }
        }
        Value::String(s) => Ok(Basic::Str(s)),
        Value::Tagged(tagged) => basic(&tagged.value),
        other => Err(format!("non-comparable type {}", type_name(other))),
    }
}

fn basic_eq(a: &Value, b: &Value) -> Result<bool, String> {
    match (basic(a)?, basic(b)?) {
        (Basic::Null, Basic::Null) => Ok(true),
        (Basic::Null, _) | (_, Basic::Null) => Ok(false),
        (Basic::Bool(x), Basic::Bool(y)) => Ok(x == y),
        (Basic::Int(x), Basic::Int(y)) => Ok(x == y),
        (Basic::Float(x), Basic::Float(y)) => Ok(x == y),
        (Basic::Str(x), Basic::Str(y)) => Ok(x == y),
        _ => Err("incompatible types for comparison".to_string()),
    }
}

fn basic_lt(a: &Value, b: &Value) -> Result<bool, String> {
    match (basic(a)?, basic(b)?) {
        (Basic::Int(x), Basic::Int(y)) => Ok(x < y),
        (Basic::Float(x), Basic::Float(y)) => Ok(x < y),
        (Basic::Str(x), Basic::Str(y)) => Ok(x < y),
        (Basic::Int(_), _) | (Basic::Float(_), _) | (Basic::Str(_), _) => {
            Err("incompatible types for comparison".to_string())
        }
        _ => Err(format!("invalid type for comparison: {}", type_name(a))),
    }
}

/// Order of mapping keys when ranging or printing
pub(crate) fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (basic(a), basic(b)) {
        (Ok(Basic::Int(x)), Ok(Basic::Int(y))) => x.cmp(&y),
        (Ok(Basic::Float(x)), Ok(Basic::Float(y))) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(Basic::Str(x)), Ok(Basic::Str(y))) => x.cmp(y),
        _ => format_value(a).cmp(&format_value(b)),
    }
}

fn arity(name: &str, args: &[Value], want: usize) -> Result<(), String> {
    if args.len() != want {
        return Err(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            want,
            args.len()
        ));
    }
    Ok(())
}

fn length(value: &Value) -> Result<Value, String> {
    let n = match value {
        Value::String(s) => s.len(),
        Value::Sequence(seq) => seq.len(),
        Value::Mapping(map) => map.len(),
        Value::Tagged(tagged) => return length(&tagged.value),
        other => return Err(format!("len of type {}", type_name(other))),
    };
    Ok(Value::from(n as u64))
}

fn index(item: &Value, indices: &[Value]) -> Result<Value, String> {
    let mut current = item.clone();
    for idx in indices {
        current = match &current {
            Value::Sequence(seq) => {
                let i = match basic(idx)? {
                    Basic::Int(i) => i,
                    _ => return Err(format!("cannot index slice with {}", type_name(idx))),
                };
                usize::try_from(i)
                    .ok()
                    .and_then(|i| seq.get(i))
                    .cloned()
                    .ok_or_else(|| format!("index out of range: {}", i))?
            }
            Value::String(s) => {
                let i = match basic(idx)? {
                    Basic::Int(i) => i,
                    _ => return Err(format!("cannot index string with {}", type_name(idx))),
                };
                usize::try_from(i)
                    .ok()
                    .and_then(|i| s.as_bytes().get(i))
                    .map(|b| Value::from(*b as u64))
                    .ok_or_else(|| format!("index out of range: {}", i))?
            }
            Value::Mapping(map) => map.get(idx).cloned().unwrap_or(Value::Null),
            Value::Null => return Err("index of untyped nil".to_string()),
            other => return Err(format!("can't index item of type {}", type_name(other))),
        };
    }
    Ok(current)
}

fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        let is_string = matches!(arg, Value::String(_));
        let prev_is_string = i > 0 && matches!(args[i - 1], Value::String(_));
        if i > 0 && !is_string && !prev_is_string {
            out.push(' ');
        }
        out.push_str(&format_value(arg));
    }
    out
}

fn sprintln(args: &[Value]) -> String {
    let items: Vec<String> = args.iter().map(format_value).collect();
    format!("{}\n", items.join(" "))
}

fn pad(s: String, width: Option<usize>, left: bool, zero: bool) -> String {
    let Some(width) = width else {
        return s;
    };
    let len = s.chars().count();
    if len >= width {
        return s;
    }
    let fill = width - len;
    if left {
        format!("{}{}", s, " ".repeat(fill))
    } else if zero {
        match s.strip_prefix('-') {
            Some(digits) => format!("-{}{}", "0".repeat(fill), digits),
            None => format!("{}{}", "0".repeat(fill), s),
        }
    } else {
        format!("{}{}", " ".repeat(fill), s)
    }
}

fn bad_verb(verb: char, arg: &Value) -> String {
    format!("%!{}({}={})", verb, type_name(arg), format_value(arg))
}

fn with_plus(s: String, plus: bool) -> String {
    if plus && !s.starts_with('-') {
        format!("+{}", s)
    } else {
        s
    }
}

fn format_exponent(f: f64, precision: usize, upper: bool) -> String {
    if !f.is_finite() {
        return format_float(f);
    }
    let formatted = format!("{:.*e}", precision, f);
    exponent_form(&formatted, if upper { 'E' } else { 'e' })
}

fn format_verb(verb: char, arg: &Value, precision: Option<usize>, plus: bool) -> String {
    match verb {
        'v' => format_value(arg),
        's' => {
            let s = format_value(arg);
            match precision {
                Some(p) => s.chars().take(p).collect(),
                None => s,
            }
        }
        'q' => match arg {
            Value::String(s) => format!("{:?}", s),
            other => bad_verb(verb, other),
        },
        'd' => match basic(arg) {
            Ok(Basic::Int(i)) => with_plus(i.to_string(), plus),
            _ => bad_verb(verb, arg),
        },
        't' => match arg {
            Value::Bool(b) => b.to_string(),
            other => bad_verb(verb, other),
        },
        'f' | 'e' | 'E' => {
            let f = match basic(arg) {
                Ok(Basic::Float(f)) => f,
                Ok(Basic::Int(i)) => i as f64,
                _ => return bad_verb(verb, arg),
            };
            let precision = precision.unwrap_or(6);
            let s = match verb {
                'f' => format!("{:.*}", precision, f),
                _ => format_exponent(f, precision, verb == 'E'),
            };
            with_plus(s, plus)
        }
        'x' => match basic(arg) {
            Ok(Basic::Int(i)) if i < 0 => format!("-{:x}", -i),
            Ok(Basic::Int(i)) => format!("{:x}", i),
            Ok(Basic::Str(s)) => s.bytes().map(|b| format!("{:02x}", b)).collect(),
            _ => bad_verb(verb, arg),
        },
        'X' => match basic(arg) {
            Ok(Basic::Int(i)) if i < 0 => format!("-{:X}", -i),
            Ok(Basic::Int(i)) => format!("{:X}", i),
            Ok(Basic::Str(s)) => s.bytes().map(|b| format!("{:02X}", b)).collect(),
            _ => bad_verb(verb, arg),
        },
        'o' => match basic(arg) {
            Ok(Basic::Int(i)) if i < 0 => format!("-{:o}", -i),
            Ok(Basic::Int(i)) => format!("{:o}", i),
            _ => bad_verb(verb, arg),
        },
        'c' => match basic(arg) {
            Ok(Basic::Int(i)) => u32::try_from(i)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER)
                .to_string(),
            _ => bad_verb(verb, arg),
        },
        other => bad_verb(other, arg),
    }
}

/// Largest value a width or precision may hold before another digit
const MAX_PRINTF_NUMBER: usize = 1_000_000;

type FormatChars<'a> = Peekable<Chars<'a>>;

/// Read a decimal number, consuming all of its digits
///
/// Fails once the number grows past [`MAX_PRINTF_NUMBER`].
fn parse_number(chars: &mut FormatChars<'_>) -> Result<Option<usize>, ()> {
    let mut num: Option<usize> = None;
    let mut too_large = false;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        chars.next();
        let n = num.unwrap_or(0);
        if n > MAX_PRINTF_NUMBER {
            too_large = true;
            continue;
        }
        num = Some(n * 10 + d as usize);
    }
    if too_large {
        Err(())
    } else {
        Ok(num)
    }
}

/// Read an explicit `[n]` argument index
///
/// `None` when there is no index; `Some(None)` when it is malformed or out
/// of range; otherwise the zero-based argument position.
fn parse_arg_index(chars: &mut FormatChars<'_>, arg_count: usize) -> Option<Option<usize>> {
    if chars.peek() != Some(&'[') {
        return None;
    }
    chars.next();
    let index = parse_number(chars).ok().flatten();
    let closed = chars.peek() == Some(&']');
    if closed {
        chars.next();
    }
    Some(match index {
        Some(n) if closed && (1..=arg_count).contains(&n) => Some(n - 1),
        _ => None,
    })
}

fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;
    let mut reordered = false;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let (mut left, mut zero, mut plus) = (false, false, false);
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => left = true,
                '0' => zero = true,
                '+' => plus = true,
                ' ' | '#' => {}
                _ => break,
            }
            chars.next();
        }

        let mut good_index = true;
        if let Some(index) = parse_arg_index(&mut chars, args.len()) {
            reordered = true;
            match index {
                Some(i) => next_arg = i,
                None => good_index = false,
            }
        }

        let Ok(width) = parse_number(&mut chars) else {
            out.push_str("%!(NOVERB)");
            break;
        };

        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let Ok(p) = parse_number(&mut chars) else {
                out.push_str("%!(NOVERB)");
                break;
            };
            precision = Some(p.unwrap_or(0));
        }

        if let Some(index) = parse_arg_index(&mut chars, args.len()) {
            reordered = true;
            match index {
                Some(i) => next_arg = i,
                None => good_index = false,
            }
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        if !good_index {
            out.push_str(&format!("%!{}(BADINDEX)", verb));
            continue;
        }

        match args.get(next_arg) {
            Some(arg) => {
                let formatted = format_verb(verb, arg, precision, plus);
                out.push_str(&pad(formatted, width, left, zero));
            }
            None => out.push_str(&format!("%!{}(MISSING)", verb)),
        }
        next_arg += 1;
    }

    if !reordered && next_arg < args.len() {
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|a| format!("{}={}", type_name(a), format_value(a)))
            .collect();
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    out
}

/// Call a builtin other than `and` and `or`
pub(crate) fn call(name: &str, args: &[Value]) -> Result<Value, String> {
    match name {
        "not" => {
            arity(name, args, 1)?;
            Ok(Value::Bool(!truth(&args[0])))
        }
        "eq" => {
            if args.len() < 2 {
                return Err("missing argument for comparison".to_string());
            }
            for other in &args[1..] {
                if basic_eq(&args[0], other)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "ne" => {
            arity(name, args, 2)?;
            Ok(Value::Bool(!basic_eq(&args[0], &args[1])?))
        }
        "lt" => {
            arity(name, args, 2)?;
            Ok(Value::Bool(basic_lt(&args[0], &args[1])?))
        }
        "le" => {
            arity(name, args, 2)?;
            let lt = basic_lt(&args[0], &args[1])?;
            Ok(Value::Bool(lt || basic_eq(&args[0], &args[1])?))
        }
        "gt" => {
            arity(name, args, 2)?;
            let lt = basic_lt(&args[0], &args[1])?;
            Ok(Value::Bool(!lt && !basic_eq(&args[0], &args[1])?))
        }
        "ge" => {
            arity(name, args, 2)?;
            Ok(Value::Bool(!basic_lt(&args[0], &args[1])?))
        }
        "len" => {
            arity(name, args, 1)?;
            length(&args[0])
        }
        "index" => {
            if args.is_empty() {
                return Err("wrong number of args for index: want at least 1 got 0".to_string());
            }
            index(&args[0], &args[1..])
        }
        "print" => Ok(Value::String(sprint(args))),
        "println" => Ok(Value::String(sprintln(args))),
        "printf" => {
            let Some((format, rest)) = args.split_first() else {
                return Err("wrong number of args for printf: want at least 1 got 0".to_string());
            };
            match format {
                Value::String(format) => Ok(Value::String(sprintf(format, rest))),
                other => Err(format!(
                    "printf format must be a string, got {}",
                    type_name(other)
                )),
            }
        }
        other => Err(format!("function {:?} not defined", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_truth() {
        assert!(!truth(&Value::Null));
        assert!(!truth(&yaml("0")));
        assert!(!truth(&yaml("''")));
        assert!(!truth(&yaml("[]")));
        assert!(!truth(&yaml("{}")));
        assert!(truth(&yaml("0.5")));
        assert!(truth(&yaml("[0]")));
        assert!(truth(&yaml("x")));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Null), "<no value>");
        assert_eq!(format_value(&yaml("[a, 1, true]")), "[a 1 true]");
        assert_eq!(format_value(&yaml("{b: 2, a: 1}")), "map[a:1 b:2]");
        assert_eq!(format_value(&yaml("3.0")), "3");
        assert_eq!(format_value(&yaml("1.25")), "1.25");
        assert_eq!(format_value(&yaml("1.0e-7")), "1e-07");
        assert_eq!(format_value(&yaml("[~]")), "[<nil>]");
    }

    #[test]
    fn test_comparisons() {
        let one = Value::from(1);
        let two = Value::from(2);
        assert_eq!(call("lt", &[one.clone(), two.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(call("ge", &[one.clone(), two.clone()]).unwrap(), Value::Bool(false));
        assert_eq!(call("gt", &[two.clone(), one.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(call("le", &[one.clone(), one.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(
            call("eq", &[one.clone(), Value::from(3), one.clone()]).unwrap(),
            Value::Bool(true)
        );
        assert!(call("lt", &[one.clone(), Value::from("a")]).is_err());
        assert!(call("eq", &[yaml("[1]"), one]).is_err());
    }

    #[test]
    fn test_index_and_len() {
        let list = yaml("[a, b]");
        assert_eq!(call("index", &[list.clone(), Value::from(1)]).unwrap(), Value::from("b"));
        assert!(call("index", &[list.clone(), Value::from(5)]).is_err());
        assert_eq!(call("len", &[list]).unwrap(), Value::from(2u64));
        let map = yaml("{k: v}");
        assert_eq!(call("index", &[map.clone(), Value::from("k")]).unwrap(), Value::from("v"));
        assert_eq!(call("index", &[map, Value::from("x")]).unwrap(), Value::Null);
        assert!(call("len", &[Value::from(3)]).is_err());
    }

    #[test]
    fn test_print_spacing() {
        assert_eq!(sprint(&[Value::from("a"), Value::from("b")]), "ab");
        assert_eq!(sprint(&[Value::from(1), Value::from(2)]), "1 2");
        assert_eq!(sprint(&[Value::from("a"), Value::from(2)]), "a2");
        assert_eq!(sprintln(&[Value::from("a"), Value::from(2)]), "a 2\n");
    }

    #[test]
    fn test_printf_verbs() {
        let args = [
            Value::from("x"),
            Value::from(42),
            Value::from(true),
            Value::from(1.5),
        ];
        assert_eq!(sprintf("%s-%d-%t-%v", &args), "x-42-true-1.5");
        assert_eq!(sprintf("%q %%", &args[..1]), "\"x\" %");
        assert_eq!(sprintf("%5d|%-3s|%03d", &[Value::from(7), Value::from("a"), Value::from(5)]), "    7|a  |005");
        assert_eq!(sprintf("%.2f", &[Value::from(3)]), "3.00");
        assert_eq!(sprintf("%d", &[]), "%!d(MISSING)");
        assert_eq!(sprintf("%d", &[Value::from("a")]), "%!d(string=a)");
    }

    #[test]
    fn test_printf_more_verbs() {
        let ints = [Value::from(255), Value::from(8), Value::from(65), Value::from(255)];
        assert_eq!(sprintf("%X|%o|%c|%x", &ints), "FF|10|A|ff");
        assert_eq!(sprintf("%X", &[Value::from("hi")]), "6869");
        assert_eq!(sprintf("%e", &[Value::from(1234.5678)]), "1.234568e+03");
        assert_eq!(sprintf("%.2E", &[Value::from(0.000123)]), "1.23E-04");
        assert_eq!(sprintf("%+d %+.1f", &[Value::from(3), Value::from(2)]), "+3 +2.0");
        assert_eq!(sprintf("%c", &[Value::from(-1)]), "\u{FFFD}");
        assert_eq!(sprintf("%o", &[Value::from("a")]), "%!o(string=a)");
    }

    #[test]
    fn test_printf_arg_indexes() {
        let args = [Value::from("a"), Value::from(1)];
        assert_eq!(sprintf("%[2]d %[1]s", &args), "1 a");
        assert_eq!(sprintf("%[1]s%s", &args), "a1");
        assert_eq!(sprintf("%[3]d", &args), "%!d(BADINDEX)");
        assert_eq!(sprintf("%[0]d", &args), "%!d(BADINDEX)");
        assert_eq!(sprintf("%[1d", &args), "%!d(BADINDEX)");
    }

    #[test]
    fn test_printf_huge_width_and_precision() {
        let one = [Value::from(1)];
        assert_eq!(sprintf("%99999999999d", &one), "%!(NOVERB)%!(EXTRA int=1)");
        assert_eq!(
            sprintf("%999999999999999999999999999d", &one),
            "%!(NOVERB)%!(EXTRA int=1)"
        );
        assert_eq!(sprintf("x%.99999999999f", &one), "x%!(NOVERB)%!(EXTRA int=1)");
        assert_eq!(sprintf("%1000d", &one).len(), 1000);
    }
}

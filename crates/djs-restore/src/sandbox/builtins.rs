//! The builtin surface the obfuscator bootstrap and decrypt fragments
//! rely on. Strings use UTF-16 indexing like JS; the decrypt routines
//! round-trip `charCodeAt`/`fromCharCode` and must see code units.

use regex::Regex;

use super::interp::Interp;
use super::value::{JsRegex, Value};
use super::EvalError;

pub(super) fn get_property(object: &Value, key: &str) -> Result<Value, EvalError> {
    match object {
        Value::Undefined | Value::Null => Err(EvalError::Type(format!(
            "cannot read property '{key}' of {}",
            object.to_js_string()
        ))),
        Value::Str(s) => {
            if key == "length" {
                return Ok(Value::Num(s.encode_utf16().count() as f64));
            }
            match key.parse::<usize>() {
                Ok(index) => Ok(char_at(s, index)),
                Err(_) => Ok(Value::Undefined),
            }
        }
        Value::Array(array) => {
            if key == "length" {
                return Ok(Value::Num(array.borrow().len() as f64));
            }
            match key.parse::<usize>() {
                Ok(index) => Ok(array
                    .borrow()
                    .get(index)
                    .cloned()
                    .unwrap_or(Value::Undefined)),
                Err(_) => Ok(Value::Undefined),
            }
        }
        Value::Object(props) => Ok(props
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Undefined)),
        _ => Ok(Value::Undefined),
    }
}

pub(super) fn set_property(object: &Value, key: &str, value: Value) -> Result<(), EvalError> {
    match object {
        Value::Array(array) => {
            let index: usize = key
                .parse()
                .map_err(|_| EvalError::Type(format!("bad array index '{key}'")))?;
            let mut array = array.borrow_mut();
            if index >= array.len() {
                array.resize(index + 1, Value::Undefined);
            }
            array[index] = value;
            Ok(())
        }
        Value::Object(props) => {
            let mut props = props.borrow_mut();
            match props.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value,
                None => props.push((key.to_string(), value)),
            }
            Ok(())
        }
        other => Err(EvalError::Type(format!(
            "cannot set property '{key}' on {}",
            other.type_of()
        ))),
    }
}

pub(super) fn global_call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    Ok(match name {
        "parseInt" => {
            let radix = match arg(1) {
                Value::Undefined => None,
                other => Some(other.to_number()),
            };
            Value::Num(parse_int(&arg(0).to_js_string(), radix))
        }
        "parseFloat" => Value::Num(parse_float(&arg(0).to_js_string())),
        "isNaN" => Value::Bool(arg(0).to_number().is_nan()),
        "isFinite" => Value::Bool(arg(0).to_number().is_finite()),
        "Number" => Value::Num(arg(0).to_number()),
        "String" => Value::Str(arg(0).to_js_string()),
        "Boolean" => Value::Bool(arg(0).is_truthy()),
        "decodeURIComponent" | "decodeURI" => {
            Value::Str(percent_decode(&arg(0).to_js_string())?)
        }
        "encodeURIComponent" => Value::Str(percent_encode(&arg(0).to_js_string())),
        other => return Err(EvalError::Reference(other.to_string())),
    })
}

pub(super) fn namespace_call(
    _interp: &mut Interp,
    namespace: &str,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    match (namespace, method) {
        ("String", "fromCharCode") => {
            let units: Vec<u16> = args.iter().map(|a| a.to_number() as i64 as u16).collect();
            Ok(Value::Str(String::from_utf16_lossy(&units)))
        }
        ("Math", _) => {
            let a = arg(0).to_number();
            let b = arg(1).to_number();
            Ok(Value::Num(match method {
                "floor" => a.floor(),
                "ceil" => a.ceil(),
                "round" => (a + 0.5).floor(),
                "trunc" => a.trunc(),
                "abs" => a.abs(),
                "sqrt" => a.sqrt(),
                "pow" => a.powf(b),
                "max" => args
                    .iter()
                    .map(|v| v.to_number())
                    .fold(f64::NEG_INFINITY, f64::max),
                "min" => args
                    .iter()
                    .map(|v| v.to_number())
                    .fold(f64::INFINITY, f64::min),
                other => {
                    return Err(EvalError::Unsupported(format!("Math.{other}")));
                }
            }))
        }
        (ns, m) => Err(EvalError::Reference(format!("{ns}.{m}"))),
    }
}

pub(super) fn method_call(
    interp: &mut Interp,
    object: &Value,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    match object {
        Value::Str(s) => string_method(interp, s, method, args),
        Value::Array(_) => array_method(interp, object, method, args),
        Value::Num(n) => match method {
            "toString" => {
                let radix = args
                    .first()
                    .map(|r| r.to_number() as u32)
                    .unwrap_or(10);
                Ok(Value::Str(number_to_string_radix(*n, radix)?))
            }
            other => Err(EvalError::Type(format!("number has no method '{other}'"))),
        },
        Value::Function(closure) => match method {
            "call" => {
                // First argument is `this`, which the sandbox ignores.
                let rest = args.into_iter().skip(1).collect();
                interp.call_closure(closure, rest)
            }
            "apply" => {
                let rest = match args.into_iter().nth(1) {
                    Some(Value::Array(array)) => array.borrow().clone(),
                    _ => Vec::new(),
                };
                interp.call_closure(closure, rest)
            }
            "toString" => Err(EvalError::Unsupported("Function.prototype.toString".into())),
            other => Err(EvalError::Type(format!("function has no method '{other}'"))),
        },
        other => Err(EvalError::Type(format!(
            "{} has no method '{method}'",
            other.type_of()
        ))),
    }
}

fn string_method(
    interp: &mut Interp,
    s: &str,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    let units: Vec<u16> = s.encode_utf16().collect();
    let len = units.len() as f64;
    let clamp = |n: f64| -> usize {
        let n = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
        n as usize
    };
    Ok(match method {
        "charAt" => char_at(s, arg(0).to_number().max(0.0) as usize),
        "charCodeAt" => {
            let index = arg(0).to_number().max(0.0) as usize;
            match units.get(index) {
                Some(unit) => Value::Num(*unit as f64),
                None => Value::Num(f64::NAN),
            }
        }
        "indexOf" => Value::Num(utf16_index_of(&units, &arg(0).to_js_string(), 0)),
        "lastIndexOf" => {
            let needle: Vec<u16> = arg(0).to_js_string().encode_utf16().collect();
            let mut found = -1.0;
            let mut from = 0;
            loop {
                let at = utf16_index_of(&units, &arg(0).to_js_string(), from);
                if at < 0.0 {
                    break;
                }
                found = at;
                from = at as usize + needle.len().max(1);
            }
            Value::Num(found)
        }
        "slice" | "substring" => {
            let start = clamp(match arg(0) {
                Value::Undefined => 0.0,
                v => v.to_number(),
            });
            let end = clamp(match arg(1) {
                Value::Undefined => len,
                v if method == "substring" => v.to_number().max(0.0).min(len),
                v => v.to_number(),
            });
            let (start, end) = if method == "substring" && start > end {
                (end, start)
            } else {
                (start, end.max(start))
            };
            Value::Str(String::from_utf16_lossy(&units[start..end]))
        }
        "substr" => {
            let start = clamp(arg(0).to_number());
            let count = match arg(1) {
                Value::Undefined => units.len() - start,
                v => (v.to_number().max(0.0) as usize).min(units.len() - start),
            };
            Value::Str(String::from_utf16_lossy(&units[start..start + count]))
        }
        "split" => {
            let sep = match arg(0) {
                Value::Undefined => {
                    return Ok(Value::array(vec![Value::Str(s.to_string())]));
                }
                v => v.to_js_string(),
            };
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::Str(c.to_string())).collect()
            } else {
                s.split(&sep).map(|p| Value::Str(p.to_string())).collect()
            };
            Value::array(parts)
        }
        "replace" => string_replace(interp, s, arg(0), arg(1))?,
        "concat" => {
            let mut out = s.to_string();
            for extra in &args {
                out.push_str(&extra.to_js_string());
            }
            Value::Str(out)
        }
        "toLowerCase" => Value::Str(s.to_lowercase()),
        "toUpperCase" => Value::Str(s.to_uppercase()),
        "trim" => Value::Str(s.trim().to_string()),
        "toString" => Value::Str(s.to_string()),
        "includes" => Value::Bool(s.contains(&arg(0).to_js_string())),
        "startsWith" => Value::Bool(s.starts_with(&arg(0).to_js_string())),
        "endsWith" => Value::Bool(s.ends_with(&arg(0).to_js_string())),
        other => {
            return Err(EvalError::Type(format!("string has no method '{other}'")));
        }
    })
}

fn array_method(
    interp: &mut Interp,
    object: &Value,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    let Value::Array(array) = object else {
        unreachable!("array_method called on non-array");
    };
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    Ok(match method {
        "push" => {
            let mut array = array.borrow_mut();
            array.extend(args);
            Value::Num(array.len() as f64)
        }
        "pop" => array.borrow_mut().pop().unwrap_or(Value::Undefined),
        "shift" => {
            let mut array = array.borrow_mut();
            if array.is_empty() {
                Value::Undefined
            } else {
                array.remove(0)
            }
        }
        "unshift" => {
            let mut array = array.borrow_mut();
            for (i, value) in args.into_iter().enumerate() {
                array.insert(i, value);
            }
            Value::Num(array.len() as f64)
        }
        "join" => {
            let sep = match arg(0) {
                Value::Undefined => ",".to_string(),
                v => v.to_js_string(),
            };
            Value::Str(
                array
                    .borrow()
                    .iter()
                    .map(|v| match v {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.to_js_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "indexOf" => {
            let needle = arg(0);
            Value::Num(
                array
                    .borrow()
                    .iter()
                    .position(|v| v.strict_eq(&needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            )
        }
        "includes" => {
            let needle = arg(0);
            Value::Bool(array.borrow().iter().any(|v| v.strict_eq(&needle)))
        }
        "concat" => {
            let mut out = array.borrow().clone();
            for extra in args {
                match extra {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    single => out.push(single),
                }
            }
            Value::array(out)
        }
        "reverse" => {
            array.borrow_mut().reverse();
            object.clone()
        }
        "slice" => {
            let borrowed = array.borrow();
            let len = borrowed.len() as f64;
            let clamp = |n: f64| -> usize {
                let n = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
                n as usize
            };
            let start = clamp(match arg(0) {
                Value::Undefined => 0.0,
                v => v.to_number(),
            });
            let end = clamp(match arg(1) {
                Value::Undefined => len,
                v => v.to_number(),
            });
            Value::array(borrowed[start..end.max(start)].to_vec())
        }
        "map" => {
            let callback = arg(0);
            let snapshot = array.borrow().clone();
            let mut out = Vec::with_capacity(snapshot.len());
            for (i, value) in snapshot.into_iter().enumerate() {
                out.push(interp.call_value(&callback, vec![value, Value::Num(i as f64)])?);
            }
            Value::array(out)
        }
        "forEach" => {
            let callback = arg(0);
            let snapshot = array.borrow().clone();
            for (i, value) in snapshot.into_iter().enumerate() {
                interp.call_value(&callback, vec![value, Value::Num(i as f64)])?;
            }
            Value::Undefined
        }
        "toString" => Value::Str(object.to_js_string()),
        other => {
            return Err(EvalError::Type(format!("array has no method '{other}'")));
        }
    })
}

fn string_replace(
    interp: &mut Interp,
    s: &str,
    pattern: Value,
    replacement: Value,
) -> Result<Value, EvalError> {
    match pattern {
        Value::Regex(regex) => regex_replace(interp, s, &regex, replacement),
        other => {
            // String pattern replaces the first occurrence only.
            let needle = other.to_js_string();
            let replaced = match s.find(&needle) {
                None => s.to_string(),
                Some(at) => {
                    let with = match &replacement {
                        Value::Function(closure) => interp
                            .call_closure(closure, vec![Value::Str(needle.clone())])?
                            .to_js_string(),
                        other => other.to_js_string(),
                    };
                    format!("{}{}{}", &s[..at], with, &s[at + needle.len()..])
                }
            };
            Ok(Value::Str(replaced))
        }
    }
}

fn regex_replace(
    interp: &mut Interp,
    s: &str,
    pattern: &JsRegex,
    replacement: Value,
) -> Result<Value, EvalError> {
    let mut source = pattern.source.clone();
    if pattern.flags.contains('i') {
        source = format!("(?i){source}");
    }
    let compiled = Regex::new(&source)
        .map_err(|err| EvalError::Type(format!("bad regex /{}/: {err}", pattern.source)))?;

    let mut out = String::new();
    let mut last = 0;
    for captures in compiled.captures_iter(s) {
        let whole = captures.get(0).expect("group 0 always present");
        out.push_str(&s[last..whole.start()]);
        match &replacement {
            Value::Function(closure) => {
                let mut call_args = vec![Value::Str(whole.as_str().to_string())];
                for group in captures.iter().skip(1) {
                    call_args.push(match group {
                        Some(m) => Value::Str(m.as_str().to_string()),
                        None => Value::Undefined,
                    });
                }
                out.push_str(&interp.call_closure(closure, call_args)?.to_js_string());
            }
            other => {
                let mut expansion = String::new();
                captures.expand(&other.to_js_string(), &mut expansion);
                out.push_str(&expansion);
            }
        }
        last = whole.end();
        if !pattern.is_global() {
            break;
        }
    }
    out.push_str(&s[last..]);
    Ok(Value::Str(out))
}

fn char_at(s: &str, index: usize) -> Value {
    let units: Vec<u16> = s.encode_utf16().collect();
    match units.get(index) {
        Some(unit) => Value::Str(String::from_utf16_lossy(std::slice::from_ref(unit))),
        None => Value::Str(String::new()),
    }
}

fn utf16_index_of(haystack: &[u16], needle: &str, from: usize) -> f64 {
    let needle: Vec<u16> = needle.encode_utf16().collect();
    if needle.is_empty() {
        return from.min(haystack.len()) as f64;
    }
    if needle.len() > haystack.len() {
        return -1.0;
    }
    for start in from..=(haystack.len() - needle.len()) {
        if haystack[start..start + needle.len()] == needle[..] {
            return start as f64;
        }
    }
    -1.0
}

fn parse_int(s: &str, radix: Option<f64>) -> f64 {
    let s = s.trim_start();
    let (sign, s) = match s.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    };
    let mut radix = match radix {
        Some(r) if r as i64 != 0 => r as u32,
        _ => 10,
    };
    let s = if radix == 16 {
        s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
    } else if radix == 10 && (s.starts_with("0x") || s.starts_with("0X")) {
        radix = 16;
        &s[2..]
    } else {
        s
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        value = value * radix as f64 + c.to_digit(radix).expect("filtered above") as f64;
    }
    sign * value
}

fn parse_float(s: &str) -> f64 {
    let s = s.trim_start();
    let mut end = 0;
    let bytes = s.as_bytes();
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let c = bytes[end] as char;
        let ok = c.is_ascii_digit()
            || (end == 0 && (c == '+' || c == '-'))
            || (c == '.' && !seen_dot && !seen_exp)
            || ((c == 'e' || c == 'E') && !seen_exp && end > 0)
            || ((c == '+' || c == '-') && end > 0 && matches!(bytes[end - 1], b'e' | b'E'));
        if !ok {
            break;
        }
        seen_dot |= c == '.';
        seen_exp |= c == 'e' || c == 'E';
        end += 1;
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

fn number_to_string_radix(n: f64, radix: u32) -> Result<String, EvalError> {
    if !(2..=36).contains(&radix) {
        return Err(EvalError::Type(format!("invalid radix {radix}")));
    }
    if radix == 10 {
        return Ok(djs_core::ast::format_number(n));
    }
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(EvalError::Unsupported(
            "non-integral toString with radix".to_string(),
        ));
    }
    let negative = n < 0.0;
    let mut value = n.abs() as u64;
    let digits = "0123456789abcdefghijklmnopqrstuvwxyz".as_bytes();
    let mut out = Vec::new();
    loop {
        out.push(digits[(value % radix as u64) as usize]);
        value /= radix as u64;
        if value == 0 {
            break;
        }
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    Ok(String::from_utf8(out).expect("ascii digits"))
}

fn percent_decode(s: &str) -> Result<String, EvalError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|pair| std::str::from_utf8(pair).ok())
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| EvalError::Thrown(Value::Str("URIError: malformed URI".into())))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out)
        .map_err(|_| EvalError::Thrown(Value::Str("URIError: malformed UTF-8".into())))
}

fn percent_encode(s: &str) -> String {
    let mut out = String::new();
    for byte in s.bytes() {
        let unreserved = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')');
        if unreserved {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_handles_radix_and_prefixes() {
        assert_eq!(parse_int("0x1f", None), 31.0);
        assert_eq!(parse_int("12px", None), 12.0);
        assert_eq!(parse_int("ff", Some(16.0)), 255.0);
        assert_eq!(parse_int("-8", None), -8.0);
        assert!(parse_int("zz", None).is_nan());
    }

    #[test]
    fn parse_float_takes_the_leading_number() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("-2e3"), -2000.0);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn percent_roundtrip() {
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_decode("a%20b").unwrap(), "a b");
        assert_eq!(percent_decode("%E4%B8%AD").unwrap(), "中");
    }

    #[test]
    fn radix_to_string() {
        assert_eq!(number_to_string_radix(255.0, 16).unwrap(), "ff");
        assert_eq!(number_to_string_radix(-8.0, 2).unwrap(), "-1000");
    }
}

//! Total, version-aware coercions.

use std::cell::Cell;
use std::rc::Rc;

use flare_ir::Version;

use super::Value;
use crate::function::{Callable, NativeCall};
use crate::object::{NameCase, Object};

/// Which conversion `to_primitive` prefers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrimitiveHint {
    Number,
    String,
}

/// Nesting cap for array joins, which can be cyclic.
const MAX_JOIN_DEPTH: usize = 32;

thread_local! {
    static JOIN_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Render a number the way the player does: 15 significant digits,
/// decimal notation for exponents `-5..15`, exponent notation otherwise.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n < 0.0 { "-Infinity" } else { "Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }

    // Round to 15 significant digits once, then lay the digits out.
    let sci = format!("{:.14e}", n.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let mut out = String::new();
    if n < 0.0 {
        out.push('-');
    }
    if (-5..15).contains(&exp) {
        if exp < 0 {
            out.push_str("0.");
            for _ in 0..(-exp - 1) {
                out.push('0');
            }
            out.push_str(digits);
        } else {
            let int_len = usize::try_from(exp).unwrap_or(0).saturating_add(1);
            if digits.len() <= int_len {
                out.push_str(digits);
                for _ in digits.len()..int_len {
                    out.push('0');
                }
            } else {
                out.push_str(&digits[..int_len]);
                out.push('.');
                out.push_str(&digits[int_len..]);
            }
        }
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&exp.abs().to_string());
    }
    out
}

/// String to number, per version.
///
/// - up to 4: the longest leading numeric prefix, `0` if there is none
/// - from 6: an 8-character `0xRRGGBB` literal is accepted
/// - otherwise: the whole string must be a decimal literal, else `NaN`
pub fn parse_number(s: &str, version: Version) -> f64 {
    if version.get() <= 4 {
        return parse_leading(s);
    }
    if version.get() > 5 && s.len() == 8 && (s.starts_with("0x") || s.starts_with("0X")) {
        if let Ok(rgb) = u32::from_str_radix(&s[2..], 16) {
            return f64::from(rgb);
        }
    }
    parse_strict(s)
}

fn parse_strict(s: &str) -> f64 {
    if s.is_empty()
        || !s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

fn parse_leading(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut has_digits = end > int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        if has_digits || frac_end > frac_start {
            has_digits = true;
            end = frac_end;
        }
    }
    if !has_digits {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

/// Wrap a number into `i32` the way the player does (modulo 2^32).
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    reason = "wrapping to 32 bits is the intended conversion"
)]
pub(crate) fn wrap_i32(d: f64) -> i32 {
    const TWO_32: f64 = 4_294_967_296.0;
    if !d.is_finite() {
        return 0;
    }
    if d < 0.0 {
        (((-d) % TWO_32) as u32).wrapping_neg() as i32
    } else {
        ((d % TWO_32) as u32) as i32
    }
}

/// Call a native member function of `obj` with no arguments.
fn call_native_member(obj: &Object, name: &str, version: Version) -> Option<Option<Value>> {
    let method = obj.get_member(name, NameCase::for_version(version))?;
    let Value::Object(method) = method else {
        return None;
    };
    match method.callable() {
        Some(Callable::Native(native)) => {
            let this = Value::Object(obj.clone());
            let call = NativeCall {
                this: &this,
                args: &[],
                version,
                constructing: false,
            };
            Some(native.call(&call).ok())
        }
        // Script methods need the VM; report a missing conversion.
        Some(Callable::Script(_)) => Some(None),
        None => None,
    }
}

impl Value {
    /// Numeric value.
    pub fn to_number(&self, version: Version) -> f64 {
        match self {
            Value::Undefined | Value::Null => {
                if version.get() >= 7 {
                    f64::NAN
                } else {
                    0.0
                }
            }
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s, version),
            Value::Object(obj) => {
                if obj.display().is_some() {
                    return f64::NAN;
                }
                match self.to_primitive(PrimitiveHint::Number, version) {
                    Some(prim) => prim.to_number(version),
                    None if obj.is_function() && version.get() < 6 => 0.0,
                    None => f64::NAN,
                }
            }
        }
    }

    /// 32-bit integer value: non-finite numbers give `0`.
    pub fn to_int(&self, version: Version) -> i32 {
        wrap_i32(self.to_number(version))
    }

    /// Truthiness, per version.
    pub fn to_bool(&self, version: Version) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => {
                if version.get() == 6 {
                    n.is_finite() && *n != 0.0
                } else {
                    !n.is_nan() && *n != 0.0
                }
            }
            Value::String(s) => {
                if version.get() >= 7 {
                    !s.is_empty()
                } else {
                    let n = parse_number(s, version);
                    !n.is_nan() && n != 0.0
                }
            }
            Value::Object(_) => true,
        }
    }

    /// String value, per version.
    pub fn to_string(&self, version: Version) -> Rc<str> {
        match self {
            Value::Undefined => {
                if version.get() >= 7 {
                    "undefined".into()
                } else {
                    "".into()
                }
            }
            Value::Null => "null".into(),
            Value::Bool(b) => if *b { "true" } else { "false" }.into(),
            Value::Number(n) => format_number(*n).into(),
            Value::String(s) => Rc::clone(s),
            Value::Object(obj) => match self.to_primitive(PrimitiveHint::String, version) {
                Some(prim) if prim.is_primitive() => prim.to_string(version),
                _ => default_text(obj, version).into(),
            },
        }
    }

    /// Primitive conversion using native `valueOf`/`toString` members.
    ///
    /// Returns `None` when no conversion applies (the script-level
    /// `TypeError` case). Script-defined methods are resolved by the VM
    /// before it falls back to this.
    pub fn to_primitive(&self, hint: PrimitiveHint, version: Version) -> Option<Value> {
        let Value::Object(obj) = self else {
            return Some(self.clone());
        };
        if obj.display().is_some() {
            return Some(match hint {
                PrimitiveHint::Number => Value::Number(f64::NAN),
                PrimitiveHint::String => Value::string(crate::display::dot_path(obj)),
            });
        }
        let result = match hint {
            PrimitiveHint::Number => match call_native_member(obj, "valueOf", version) {
                None => return Some(Value::Undefined),
                Some(result) => result,
            },
            PrimitiveHint::String => call_native_member(obj, "toString", version)
                .or_else(|| call_native_member(obj, "valueOf", version))
                .flatten(),
        };
        result.filter(Value::is_primitive)
    }
}

/// Built-in text of an object without a usable `toString`.
pub fn default_text(obj: &Object, version: Version) -> String {
    if obj.display().is_some() {
        return crate::display::dot_path(obj);
    }
    if obj.is_function() {
        return "[type Function]".to_owned();
    }
    if obj.is_array() {
        let depth = JOIN_DEPTH.with(Cell::get);
        if depth >= MAX_JOIN_DEPTH {
            return String::new();
        }
        JOIN_DEPTH.with(|d| d.set(depth.saturating_add(1)));
        let parts: Vec<String> = obj
            .array_elements(version)
            .iter()
            .map(|v| v.to_string(version).to_string())
            .collect();
        JOIN_DEPTH.with(|d| d.set(depth));
        return parts.join(",");
    }
    "[object Object]".to_owned()
}

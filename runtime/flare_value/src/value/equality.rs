//! Script equality.

use flare_ir::Version;

use super::Value;

fn same_type_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        // NaN equals NaN here, and -0 equals 0.
        (Value::Number(x), Value::Number(y)) => (x.is_nan() && y.is_nan()) || x == y,
        _ => false,
    }
}

/// `===`: same type and same value.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    same_type_equals(a, b)
}

fn is_null_like(v: &Value, version: Version) -> bool {
    v.is_nullish() || (version.get() < 6 && v.is_function())
}

/// `==` with primitive conversion supplied by the caller.
///
/// `to_primitive` converts an object operand; returning `None` means the
/// object has no primitive value, which makes the comparison false.
pub fn loose_equals(
    a: &Value,
    b: &Value,
    version: Version,
    to_primitive: &mut dyn FnMut(&Value) -> Option<Value>,
) -> bool {
    let a_null = is_null_like(a, version);
    let b_null = is_null_like(b, version);
    if a_null || b_null {
        return a_null == b_null;
    }

    match (a, b) {
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_)) => same_type_equals(a, b),
        (Value::Number(_), Value::String(s)) | (Value::String(s), Value::Number(_)) => {
            let n = super::parse_number(s, version);
            if !n.is_finite() {
                return false;
            }
            let other = if a.is_number() { a } else { b };
            same_type_equals(other, &Value::Number(n))
        }
        (Value::Bool(x), _) => {
            loose_equals(&Value::Number(f64::from(u8::from(*x))), b, version, to_primitive)
        }
        (_, Value::Bool(y)) => {
            loose_equals(a, &Value::Number(f64::from(u8::from(*y))), version, to_primitive)
        }
        (Value::Object(_), _) => match to_primitive(a) {
            Some(prim) if prim.is_primitive() => loose_equals(&prim, b, version, to_primitive),
            _ => false,
        },
        (_, Value::Object(_)) => match to_primitive(b) {
            Some(prim) if prim.is_primitive() => loose_equals(a, &prim, version, to_primitive),
            _ => false,
        },
        _ => false,
    }
}

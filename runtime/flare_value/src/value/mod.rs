//! The dynamically-typed script value.
//!
//! [`Value`] is cheap to clone: strings are `Rc<str>` and objects are
//! shared handles. Coercions live in `convert` and equality in
//! `equality`; both are version-aware and total.

mod convert;
mod equality;

use std::fmt;
use std::rc::Rc;

use crate::object::{Object, ObjectKind};

pub use convert::{default_text, format_number, parse_number, PrimitiveHint};
pub use equality::{loose_equals, strict_equals};

/// A script value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
}

// Factory Methods

impl Value {
    #[inline]
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    #[inline]
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    #[inline]
    pub fn int(n: i32) -> Self {
        Value::Number(f64::from(n))
    }

    /// A count as a number. Counts beyond 2^53 lose precision.
    #[allow(
        clippy::cast_precision_loss,
        reason = "stack and element counts never approach 2^53"
    )]
    #[inline]
    pub fn from_usize(n: usize) -> Self {
        Value::Number(n as f64)
    }

    #[inline]
    pub fn object(obj: Object) -> Self {
        Value::Object(obj)
    }

    /// `1`/`0` for legacy content, a boolean otherwise.
    #[inline]
    pub fn legacy_bool(b: bool, legacy: bool) -> Self {
        if legacy {
            Value::Number(if b { 1.0 } else { 0.0 })
        } else {
            Value::Bool(b)
        }
    }
}

// Predicates

impl Value {
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `undefined` or `null`.
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline]
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Object(obj) if obj.is_function())
    }

    #[inline]
    pub fn is_primitive(&self) -> bool {
        !self.is_object()
    }

    #[inline]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The display node behind this value, if any.
    pub fn as_display_object(&self) -> Option<&Object> {
        self.as_object().filter(|obj| obj.display().is_some())
    }

    /// The `typeof` result.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) => match obj.kind() {
                ObjectKind::Function(_) => "function",
                ObjectKind::Display(node) if node.is_movie_clip() => "movieclip",
                _ => "object",
            },
        }
    }
}

impl PartialEq for Value {
    /// Structural identity: same variant, same payload, objects by
    /// reference, `NaN` equal to itself. Script equality is
    /// [`loose_equals`]/[`strict_equals`].
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(obj) => write!(f, "{obj:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

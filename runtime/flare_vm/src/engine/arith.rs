//! Numeric, bitwise, and logical operators.

use flare_value::{PrimitiveHint, Value};

use super::{Engine, Flow};
use crate::VmError;

/// Pushed by `Divide` for a zero divisor before version 5.
const DIVIDE_ERROR: &str = "#ERROR#";

/// IEEE division with the player's sign rules for a zero divisor.
pub(crate) fn divide(dividend: f64, divisor: f64) -> f64 {
    if divisor == 0.0 {
        if dividend == 0.0 || dividend.is_nan() {
            return f64::NAN;
        }
        return if dividend < 0.0 {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    dividend / divisor
}

/// Shift counts use their low five bits.
fn wrap_shift(count: i32) -> u32 {
    u32::from_ne_bytes(count.to_ne_bytes()) & 31
}

impl Engine<'_, '_> {
    /// Pop `b` then `a` and push `op(a, b)`.
    pub(super) fn op_numeric(&mut self, op: fn(f64, f64) -> f64) -> Result<Flow, VmError> {
        let b = self.pop_number()?;
        let a = self.pop_number()?;
        self.cx.env.push(op(a, b));
        Ok(Flow::Continue)
    }

    pub(super) fn op_divide(&mut self) -> Result<Flow, VmError> {
        let divisor = self.pop_number()?;
        let dividend = self.pop_number()?;
        if divisor == 0.0 && self.version().get() < 5 {
            self.cx.env.push(DIVIDE_ERROR);
        } else {
            self.cx.env.push(divide(dividend, divisor));
        }
        Ok(Flow::Continue)
    }

    /// `+` with string concatenation when either primitive is a string.
    pub(super) fn op_add2(&mut self) -> Result<Flow, VmError> {
        let b = self.cx.env.pop();
        let a = self.cx.env.pop();
        let a = self
            .to_primitive(&a, PrimitiveHint::Number)?
            .unwrap_or(a);
        let b = self
            .to_primitive(&b, PrimitiveHint::Number)?
            .unwrap_or(b);
        if a.is_string() || b.is_string() {
            let mut text = self.to_string(&a)?.to_string();
            text.push_str(&self.to_string(&b)?);
            self.cx.env.push(text);
        } else {
            let sum = self.to_number(&a)? + self.to_number(&b)?;
            self.cx.env.push(sum);
        }
        Ok(Flow::Continue)
    }

    pub(super) fn op_step(&mut self, delta: f64) -> Result<Flow, VmError> {
        let n = self.pop_number()?;
        self.cx.env.push(n + delta);
        Ok(Flow::Continue)
    }

    pub(super) fn op_logical(&mut self, op: fn(bool, bool) -> bool) -> Flow {
        let version = self.version();
        let b = self.cx.env.pop().to_bool(version);
        let a = self.cx.env.pop().to_bool(version);
        self.push_bool(op(a, b));
        Flow::Continue
    }

    pub(super) fn op_not(&mut self) -> Flow {
        let value = self.cx.env.pop().to_bool(self.version());
        self.push_bool(!value);
        Flow::Continue
    }

    fn pop_int(&mut self) -> Result<i32, VmError> {
        let value = self.cx.env.pop();
        if value.is_object() {
            let n = self.to_number(&value)?;
            return Ok(Value::Number(n).to_int(self.version()));
        }
        Ok(value.to_int(self.version()))
    }

    pub(super) fn op_bitwise(&mut self, op: fn(i32, i32) -> i32) -> Result<Flow, VmError> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        self.cx.env.push(op(a, b));
        Ok(Flow::Continue)
    }

    pub(super) fn op_shift_left(&mut self) -> Result<Flow, VmError> {
        let count = self.pop_int()?;
        let a = self.pop_int()?;
        self.cx.env.push(a.wrapping_shl(wrap_shift(count)));
        Ok(Flow::Continue)
    }

    pub(super) fn op_shift_right(&mut self) -> Result<Flow, VmError> {
        let count = self.pop_int()?;
        let a = self.pop_int()?;
        self.cx.env.push(a.wrapping_shr(wrap_shift(count)));
        Ok(Flow::Continue)
    }

    pub(super) fn op_shift_right_unsigned(&mut self) -> Result<Flow, VmError> {
        let count = self.pop_int()?;
        let a = self.pop_int()?;
        let shifted = u32::from_ne_bytes(a.to_ne_bytes()).wrapping_shr(wrap_shift(count));
        self.cx.env.push(f64::from(shifted));
        Ok(Flow::Continue)
    }

    pub(super) fn op_to_integer(&mut self) -> Result<Flow, VmError> {
        let n = self.pop_int()?;
        self.cx.env.push(n);
        Ok(Flow::Continue)
    }

    pub(super) fn op_to_number(&mut self) -> Result<Flow, VmError> {
        let n = self.pop_number()?;
        self.cx.env.push(n);
        Ok(Flow::Continue)
    }
}

//! Equality and ordering.

use std::cmp::Ordering;

use flare_value::{loose_equals, strict_equals, PrimitiveHint, Value};

use super::{Engine, Flow};
use crate::VmError;

impl Engine<'_, '_> {
    /// Version 4 `Equals`/`Less`: numeric comparison of `a` and `b`.
    pub(super) fn op_legacy_compare(&mut self, op: fn(f64, f64) -> bool) -> Result<Flow, VmError> {
        let b = self.pop_number()?;
        let a = self.pop_number()?;
        self.push_bool(op(a, b));
        Ok(Flow::Continue)
    }

    pub(super) fn op_equals2(&mut self) -> Result<Flow, VmError> {
        let b = self.cx.env.pop();
        let a = self.cx.env.pop();
        let version = self.version();
        let mut failure = None;
        let equal = loose_equals(&a, &b, version, &mut |operand| {
            match self.to_primitive(operand, PrimitiveHint::Number) {
                Ok(prim) => prim,
                Err(err) => {
                    failure = Some(err);
                    None
                }
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        self.push_bool(equal);
        Ok(Flow::Continue)
    }

    pub(super) fn op_strict_equals(&mut self) -> Flow {
        let b = self.cx.env.pop();
        let a = self.cx.env.pop();
        self.push_bool(strict_equals(&a, &b));
        Flow::Continue
    }

    /// `Less2`, or `Greater` with `swap`. Pushes `undefined` when either
    /// side is `NaN`.
    pub(super) fn op_less2(&mut self, swap: bool) -> Result<Flow, VmError> {
        let b = self.cx.env.pop();
        let a = self.cx.env.pop();
        let (left, right) = if swap { (b, a) } else { (a, b) };
        let left = self
            .to_primitive(&left, PrimitiveHint::Number)?
            .unwrap_or(left);
        let right = self
            .to_primitive(&right, PrimitiveHint::Number)?
            .unwrap_or(right);

        if let (Value::String(l), Value::String(r)) = (&left, &right) {
            let less = l < r;
            self.push_bool(less);
            return Ok(Flow::Continue);
        }
        let l = self.to_number(&left)?;
        let r = self.to_number(&right)?;
        match l.partial_cmp(&r) {
            Some(ordering) => self.push_bool(ordering == Ordering::Less),
            None => self.cx.env.push(Value::Undefined),
        }
        Ok(Flow::Continue)
    }

    pub(super) fn op_string_compare(&mut self, op: fn(&str, &str) -> bool) -> Result<Flow, VmError> {
        let b = self.pop_string()?;
        let a = self.pop_string()?;
        self.push_bool(op(&a, &b));
        Ok(Flow::Continue)
    }
}

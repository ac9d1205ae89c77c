//! Push data, stack shuffling, registers, and the constant pool.

use flare_ir::{payload, Action, PushItem};
use flare_value::Value;

use super::{Engine, Flow};

impl Engine<'_, '_> {
    pub(super) fn op_push(&mut self, action: &Action) -> Flow {
        let items = payload::read_push_items(&mut self.code.reader(action));
        for item in items {
            let value = match item {
                PushItem::Str(s) => Value::String(s),
                PushItem::Number(n) => Value::Number(n),
                PushItem::Null => Value::Null,
                PushItem::Undefined => Value::Undefined,
                PushItem::Register(index) => self
                    .cx
                    .env
                    .get_register(self.cx.registers, index)
                    .unwrap_or_default(),
                PushItem::Bool(b) => Value::Bool(b),
                PushItem::Int(n) => Value::int(n),
                PushItem::Constant(index) => match self.pool.get(usize::from(index)) {
                    Some(entry) => Value::String(entry.clone()),
                    None => {
                        tracing::warn!(
                            target: "flare::malformed",
                            index,
                            pool = self.pool.len(),
                            "constant index out of range"
                        );
                        Value::Undefined
                    }
                },
            };
            self.cx.env.push(value);
        }
        Flow::Continue
    }

    pub(super) fn op_pop(&mut self) -> Flow {
        self.cx.env.drop(1);
        Flow::Continue
    }

    pub(super) fn op_push_duplicate(&mut self) -> Flow {
        let top = self.cx.env.top(0);
        self.cx.env.push(top);
        Flow::Continue
    }

    pub(super) fn op_stack_swap(&mut self) -> Flow {
        let a = self.cx.env.pop();
        let b = self.cx.env.pop();
        self.cx.env.push(a);
        self.cx.env.push(b);
        Flow::Continue
    }

    /// Copy the top of the stack into a register without popping it.
    pub(super) fn op_store_register(&mut self, action: &Action) -> Flow {
        let index = match self.code.reader(action).u8() {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad register operand");
                return Flow::Continue;
            }
        };
        let value = self.cx.env.top(0);
        self.cx.env.set_register(self.cx.registers, index, value);
        Flow::Continue
    }

    pub(super) fn op_constant_pool(&mut self, action: &Action) -> Flow {
        self.pool = payload::read_constant_pool(&mut self.code.reader(action));
        tracing::debug!(entries = self.pool.len(), "constant pool declared");
        Flow::Continue
    }
}

//! Per-context execution state.
//!
//! An [`Environment`] is what survives between engine invocations on the
//! same timeline: the operand stack, the call frames of running functions,
//! and the current/original targets. The four global registers are not
//! part of it; they are a [`GlobalRegisters`] file the host owns and lends
//! to each run.
//!
//! Variable lookup needs the `with` stack of the running engine as well,
//! so the lookup operations themselves live in [`crate::target`].

use std::rc::Rc;

use flare_value::{NameCase, Object, Value, Version};

/// The four registers shared by all top-level code.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalRegisters([Value; GlobalRegisters::COUNT]);

impl GlobalRegisters {
    pub const COUNT: usize = 4;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn set(&mut self, index: usize, value: Value) -> bool {
        match self.0.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// Where a register index points.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterSlot {
    Invalid,
    Global(usize),
    Local(usize),
}

/// One running function call.
#[derive(Clone, Debug)]
pub struct CallFrame {
    /// Function-local variables.
    pub locals: Object,
    /// Local register file; empty for legacy functions.
    pub registers: Vec<Value>,
    pub this: Value,
    pub callee: Object,
    /// Scope chain captured when the function was defined, outermost first.
    pub scope: Rc<[Object]>,
}

impl CallFrame {
    pub fn new(callee: Object, this: Value, scope: Rc<[Object]>, registers: usize) -> Self {
        CallFrame {
            locals: Object::plain(None),
            registers: vec![Value::Undefined; registers],
            this,
            callee,
            scope,
        }
    }
}

/// Operand stack, call frames, and targets of one execution context.
#[derive(Debug)]
pub struct Environment {
    version: Version,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    target: Option<Object>,
    original_target: Option<Object>,
}

impl Environment {
    /// A context running `version` content against `target`.
    pub fn new(version: Version, target: Option<Object>) -> Self {
        Environment {
            version,
            stack: Vec::new(),
            frames: Vec::new(),
            original_target: target.clone(),
            target,
        }
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn case(&self) -> NameCase {
        NameCase::for_version(self.version)
    }
}

// Operand Stack

impl Environment {
    #[inline]
    pub fn push(&mut self, value: impl Into<Value>) {
        self.stack.push(value.into());
    }

    /// Pop the top value. An empty stack gives `undefined`.
    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_else(|| {
            tracing::warn!(target: "flare::malformed", "stack underrun");
            Value::Undefined
        })
    }

    /// The value `n` slots below the top (`top(0)` is the top).
    pub fn top(&self, n: usize) -> Value {
        self.stack
            .len()
            .checked_sub(n.saturating_add(1))
            .and_then(|i| self.stack.get(i))
            .cloned()
            .unwrap_or_else(|| {
                tracing::warn!(target: "flare::malformed", depth = n, "stack underrun");
                Value::Undefined
            })
    }

    /// Discard `n` values, fewer if the stack is shorter.
    pub fn drop(&mut self, n: usize) {
        if n > self.stack.len() {
            tracing::warn!(
                target: "flare::malformed",
                requested = n,
                available = self.stack.len(),
                "stack underrun"
            );
        }
        let keep = self.stack.len().saturating_sub(n);
        self.stack.truncate(keep);
    }

    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// Drop everything above `depth`.
    pub fn truncate_stack(&mut self, depth: usize) {
        self.stack.truncate(depth);
    }

    /// Stack contents, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }
}

// Call Frames

impl Environment {
    pub fn push_frame(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    #[inline]
    pub fn frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    #[inline]
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Read a local of the current frame.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.frame()?.locals.get_own(name, self.case())
    }

    /// Create or overwrite a local. Outside a function this has no effect.
    pub fn set_local(&self, name: &str, value: Value) -> bool {
        let Some(frame) = self.frame() else {
            tracing::warn!(target: "flare::coding", name, "set_local outside a function");
            return false;
        };
        frame.locals.set_member(name, value, self.version);
        true
    }

    /// Declare a local, keeping its value if it already exists.
    pub fn declare_local(&self, name: &str) -> bool {
        let Some(frame) = self.frame() else {
            tracing::warn!(target: "flare::coding", name, "local declared outside a function");
            return false;
        };
        if !frame.locals.has_own(name, self.case()) {
            frame.locals.set_member(name, Value::Undefined, self.version);
        }
        true
    }
}

// Registers

impl Environment {
    /// Resolve a register index against the current frame.
    pub fn register_slot(&self, index: u8) -> RegisterSlot {
        let index = usize::from(index);
        match self.frame() {
            Some(frame) if !frame.registers.is_empty() => {
                if index < frame.registers.len() {
                    RegisterSlot::Local(index)
                } else {
                    RegisterSlot::Invalid
                }
            }
            _ if index < GlobalRegisters::COUNT => RegisterSlot::Global(index),
            _ => RegisterSlot::Invalid,
        }
    }

    pub fn get_register(&self, globals: &GlobalRegisters, index: u8) -> Option<Value> {
        match self.register_slot(index) {
            RegisterSlot::Local(i) => self.frame().and_then(|f| f.registers.get(i)).cloned(),
            RegisterSlot::Global(i) => globals.get(i).cloned(),
            RegisterSlot::Invalid => {
                tracing::warn!(target: "flare::malformed", index, "invalid register");
                None
            }
        }
    }

    pub fn set_register(
        &mut self,
        globals: &mut GlobalRegisters,
        index: u8,
        value: Value,
    ) -> RegisterSlot {
        let slot = self.register_slot(index);
        match slot {
            RegisterSlot::Local(i) => {
                if let Some(reg) = self.frames.last_mut().and_then(|f| f.registers.get_mut(i)) {
                    *reg = value;
                }
            }
            RegisterSlot::Global(i) => {
                globals.set(i, value);
            }
            RegisterSlot::Invalid => {
                tracing::warn!(target: "flare::malformed", index, "invalid register");
            }
        }
        slot
    }
}

// Targets

impl Environment {
    #[inline]
    pub fn target(&self) -> Option<&Object> {
        self.target.as_ref()
    }

    #[inline]
    pub fn original_target(&self) -> Option<&Object> {
        self.original_target.as_ref()
    }

    /// The current target, falling back to the original one.
    pub fn effective_target(&self) -> Option<&Object> {
        self.target.as_ref().or(self.original_target.as_ref())
    }

    pub fn set_target(&mut self, target: Option<Object>) {
        self.target = target;
    }

    pub fn set_original_target(&mut self, target: Option<Object>) {
        self.original_target = target;
    }

    /// Point the current target back at the original target.
    pub fn reset_target(&mut self) {
        self.target.clone_from(&self.original_target);
    }
}

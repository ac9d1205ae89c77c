//! Variables, locals, deletion, enumeration, and the current target.

use flare_ir::Action;
use flare_value::display::dot_path;
use flare_value::{Object, Value};

use super::{Engine, Flow};
use crate::target::parse_path;
use crate::VmError;

impl Engine<'_, '_> {
    pub(super) fn op_get_variable(&mut self) -> Result<Flow, VmError> {
        let name = self.pop_string()?;
        let mut value = if name.is_empty() {
            tracing::warn!(target: "flare::coding", "GetVariable with an empty name");
            Value::Undefined
        } else {
            self.resolver().get_variable(&name)
        };
        if self.version().get() < 5 && value.as_object().is_some_and(|o| o.movie_clip().is_some()) {
            value = Value::Undefined;
        }
        self.cx.env.push(value);
        Ok(Flow::Continue)
    }

    pub(super) fn op_set_variable(&mut self) -> Result<Flow, VmError> {
        let value = self.cx.env.pop();
        let name = self.pop_string()?;
        if name.is_empty() {
            tracing::warn!(target: "flare::coding", ?value, "SetVariable with an empty name");
        }
        self.resolver().set_variable(&name, value);
        Ok(Flow::Continue)
    }

    /// A local inside functions, an ordinary variable on the timeline.
    pub(super) fn set_local_variable(&self, name: &str, value: Value) {
        if self.function {
            self.cx.env.set_local(name, value);
        } else {
            self.resolver().set_variable(name, value);
        }
    }

    /// `var name = value`.
    pub(super) fn op_define_local(&mut self) -> Result<Flow, VmError> {
        let value = self.cx.env.pop();
        let name = self.pop_string()?;
        self.set_local_variable(&name, value);
        Ok(Flow::Continue)
    }

    /// `var name`.
    pub(super) fn op_declare_local(&mut self) -> Result<Flow, VmError> {
        let name = self.pop_string()?;
        if self.function {
            self.cx.env.declare_local(&name);
        } else {
            tracing::warn!(target: "flare::coding", %name, "var declaration on the timeline has no effect");
        }
        Ok(Flow::Continue)
    }

    /// `delete obj.name`. With a single operand, the name may be a path
    /// (version 6 and below).
    pub(super) fn op_delete(&mut self) -> Result<Flow, VmError> {
        let operands = self.cx.env.stack_size();
        let mut name = self.pop_string()?.to_string();

        let owner = if operands < 2 {
            if self.version().get() > 6 {
                self.push_bool(false);
                return Ok(Flow::Continue);
            }
            match parse_path(&name) {
                None => {
                    let deleted = self.resolver().del_variable(&name);
                    self.push_bool(deleted);
                    return Ok(Flow::Continue);
                }
                Some((path, var)) => {
                    let owner = self.resolver().get_variable(path);
                    name = var.to_owned();
                    owner
                }
            }
        } else {
            self.cx.env.pop()
        };

        let Some(owner) = owner.as_object() else {
            tracing::warn!(target: "flare::coding", %name, "delete: no object found");
            self.push_bool(false);
            return Ok(Flow::Continue);
        };
        let deleted = owner.delete_member(&name, self.case());
        self.push_bool(deleted);
        Ok(Flow::Continue)
    }

    /// `delete name`, where the name may be a path.
    pub(super) fn op_delete2(&mut self) -> Result<Flow, VmError> {
        let name = self.pop_string()?;
        let deleted = match parse_path(&name) {
            None => self.resolver().del_variable(&name),
            Some((path, var)) => match self.resolver().get_variable(path) {
                Value::Object(owner) => owner.delete_member(var, self.case()),
                _ => {
                    tracing::warn!(target: "flare::coding", %name, "delete: path does not name an object");
                    false
                }
            },
        };
        self.push_bool(deleted);
        Ok(Flow::Continue)
    }

    fn push_member_names(&mut self, obj: &Object) {
        for name in obj.enumerate() {
            self.cx.env.push(Value::String(name));
        }
    }

    /// Replace a variable name with an `undefined` sentinel followed by
    /// the enumerable names of the object it holds.
    pub(super) fn op_enumerate(&mut self) -> Result<Flow, VmError> {
        let name = self.pop_string()?;
        let value = self.resolver().get_variable(&name);
        self.cx.env.push(Value::Undefined);
        match value {
            Value::Object(obj) => self.push_member_names(&obj),
            other => {
                tracing::warn!(target: "flare::coding", %name, ?other, "enumerate of a non-object");
            }
        }
        Ok(Flow::Continue)
    }

    pub(super) fn op_enumerate2(&mut self) -> Flow {
        let value = self.cx.env.pop();
        self.cx.env.push(Value::Undefined);
        match value {
            Value::Object(obj) => self.push_member_names(&obj),
            other => {
                tracing::warn!(target: "flare::coding", ?other, "enumerate of a non-object");
            }
        }
        Flow::Continue
    }

    /// Retarget to `name`, resolved from the original target. An empty
    /// name restores the original target; an unknown one leaves no target.
    fn set_target_path(&mut self, name: &str) {
        self.cx.env.reset_target();
        if name.is_empty() {
            return;
        }
        let target = self.resolver().find_target(name);
        if target.is_none() {
            tracing::warn!(target: "flare::coding", name, "SetTarget: target not found");
        }
        self.cx.env.set_target(target);
    }

    pub(super) fn op_set_target(&mut self, action: &Action) -> Flow {
        match self.code.reader(action).string() {
            Ok(name) => self.set_target_path(&name),
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad SetTarget operand");
            }
        }
        Flow::Continue
    }

    pub(super) fn op_set_target2(&mut self) -> Result<Flow, VmError> {
        let value = self.cx.env.pop();
        let name = match value.as_display_object() {
            Some(node) => dot_path(node).into(),
            None => self.to_string(&value)?,
        };
        self.set_target_path(&name);
        Ok(Flow::Continue)
    }

    pub(super) fn op_target_path(&mut self) -> Flow {
        let value = self.cx.env.pop();
        match value.as_object().filter(|o| o.movie_clip().is_some()) {
            Some(clip) => self.cx.env.push(dot_path(clip)),
            None => {
                tracing::warn!(target: "flare::coding", ?value, "TargetPath of a non-clip");
                self.cx.env.push(Value::Undefined);
            }
        }
        Flow::Continue
    }
}

//! Members, calls, construction, function definition, and prototypes.

use flare_ir::{payload, Action, Opcode};
use flare_value::{Closure, Object, PropFlags, Value};

use super::{Engine, Flow};
use crate::function;
use crate::VmError;

impl Engine<'_, '_> {
    pub(super) fn op_get_member(&mut self) -> Result<Flow, VmError> {
        let name = self.pop_string()?;
        let target = self.cx.env.pop();
        let value = match &target {
            Value::Object(obj) => self.resolver().member(obj, &name).unwrap_or_default(),
            Value::String(text) if self.case().matches(&name, "length") => {
                if self.version().multibyte() {
                    Value::from_usize(text.chars().count())
                } else {
                    Value::from_usize(super::strings::legacy_byte_len(text))
                }
            }
            other => {
                tracing::debug!(target: "flare::coding", ?other, %name, "member of a primitive");
                Value::Undefined
            }
        };
        self.cx.env.push(value);
        Ok(Flow::Continue)
    }

    pub(super) fn op_set_member(&mut self) -> Result<Flow, VmError> {
        let value = self.cx.env.pop();
        let name = self.pop_string()?;
        let target = self.cx.env.pop();
        match target.as_object() {
            Some(obj) => {
                if !obj.set_member(&name, value, self.version()) {
                    tracing::debug!(target: "flare::coding", %name, "member is read-only");
                }
            }
            None => {
                tracing::warn!(target: "flare::coding", ?target, %name, "SetMember on a non-object");
            }
        }
        Ok(Flow::Continue)
    }

    /// `[a, b, c]`: a count, then the elements with `a` on top.
    pub(super) fn op_init_array(&mut self) -> Flow {
        let requested = self.cx.env.pop().to_int(self.version());
        let available = self.cx.env.stack_size();
        let count = usize::try_from(requested).unwrap_or(0).min(available);
        let elements: Vec<Value> = (0..count).map(|_| self.cx.env.pop()).collect();
        let array = self.cx.vm.globals().new_array(elements);
        self.cx.env.push(array);
        Flow::Continue
    }

    /// `{name: value, ...}`: a count, then value/name pairs.
    pub(super) fn op_init_object(&mut self) -> Result<Flow, VmError> {
        let requested = self.cx.env.pop().to_int(self.version());
        let available = self.cx.env.stack_size() / 2;
        let count = usize::try_from(requested).unwrap_or(0).min(available);
        let obj = self.cx.vm.globals().new_object();
        for _ in 0..count {
            let value = self.cx.env.pop();
            let name = self.pop_string()?;
            obj.set_member(&name, value, self.version());
        }
        self.cx.env.push(obj);
        Ok(Flow::Continue)
    }

    fn construct_value(&mut self, ctor: &Value, args: &[Value]) -> Result<Flow, VmError> {
        let Some(ctor) = ctor.as_object().filter(|o| o.is_function()).cloned() else {
            tracing::warn!(target: "flare::coding", ?ctor, "new on a non-function");
            self.cx.env.push(Value::Undefined);
            return Ok(Flow::Continue);
        };
        let completion = function::construct(self.cx, &ctor, args)?;
        Ok(self.push_completion(completion))
    }

    pub(super) fn op_new_object(&mut self) -> Result<Flow, VmError> {
        let class = self.pop_string()?;
        let args = self.pop_args();
        let ctor = self.resolver().get_variable(&class);
        self.construct_value(&ctor, &args)
    }

    /// `new obj.name(args)`, or `new obj(args)` when the name is empty.
    pub(super) fn op_new_method(&mut self) -> Result<Flow, VmError> {
        let name = self.cx.env.pop();
        let target = self.cx.env.pop();
        let args = self.pop_args();

        let ctor = if is_blank_name(&name) {
            target
        } else {
            let name = self.to_string(&name)?;
            match target.as_object() {
                Some(obj) => self.resolver().member(obj, &name).unwrap_or_default(),
                None => {
                    tracing::warn!(target: "flare::coding", ?target, %name, "NewMethod on a non-object");
                    Value::Undefined
                }
            }
        };
        self.construct_value(&ctor, &args)
    }

    pub(super) fn op_call_function(&mut self) -> Result<Flow, VmError> {
        let name = self.pop_string()?;
        let args = self.pop_args();
        let found = self.resolver().lookup(&name);
        let Some(found) = found else {
            tracing::warn!(target: "flare::coding", %name, "call of an undefined function");
            self.cx.env.push(Value::Undefined);
            return Ok(Flow::Continue);
        };

        // `super(...)` runs the parent constructor on the current `this`.
        if let Some(handle) = found.value.as_object().filter(|o| o.is_super()) {
            let Some(ctor) = handle.super_constructor().cloned() else {
                tracing::warn!(target: "flare::coding", "super has no constructor");
                self.cx.env.push(Value::Undefined);
                return Ok(Flow::Continue);
            };
            let sup = handle.super_of(self.case());
            let this = self.default_this();
            let completion = function::call(self.cx, &ctor, this, &args, Some(sup))?;
            return Ok(self.push_completion(completion));
        }

        let this = found.owner.map_or_else(|| self.default_this(), Value::Object);
        let completion = function::call_value(self.cx, &found.value, this, &args, None)?;
        Ok(self.push_completion(completion))
    }

    /// `obj.name(args)`, or `obj(args)` when the name is empty.
    pub(super) fn op_call_method(&mut self) -> Result<Flow, VmError> {
        let name = self.cx.env.pop();
        let target = self.cx.env.pop();
        let args = self.pop_args();

        let Some(obj) = target.as_object().cloned() else {
            tracing::warn!(target: "flare::coding", ?target, ?name, "CallMethod on a non-object");
            self.cx.env.push(Value::Undefined);
            return Ok(Flow::Continue);
        };

        if is_blank_name(&name) {
            let this = self.default_this();
            let completion = function::call_value(self.cx, &target, this, &args, None)?;
            return Ok(self.push_completion(completion));
        }

        let name = self.to_string(&name)?;
        let Some(method) = self.resolver().member(&obj, &name) else {
            tracing::warn!(target: "flare::coding", %name, "call of an undefined method");
            self.cx.env.push(Value::Undefined);
            return Ok(Flow::Continue);
        };

        // `super.name(...)` keeps the current `this` and climbs one level.
        let (this, sup) = if obj.is_super() {
            (self.default_this(), Some(obj.super_of(self.case())))
        } else {
            (target.clone(), None)
        };
        let completion = function::call_value(self.cx, &method, this, &args, sup)?;
        Ok(self.push_completion(completion))
    }

    /// `DefineFunction`/`DefineFunction2`: capture the body and skip it.
    pub(super) fn op_define_function(&mut self, action: &Action) -> Flow {
        let mut reader = self.code.reader(action);
        let header = match action.opcode {
            Opcode::DefineFunction2 => payload::read_function2(&mut reader),
            _ => payload::read_function(&mut reader),
        };
        let header = match header {
            Ok(header) => header,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad function header");
                return Flow::Continue;
            }
        };

        let start = self.next_pc;
        let declared = start.saturating_add(usize::from(header.code_size));
        let end = declared.min(self.stop_pc);
        if end < declared {
            tracing::warn!(
                target: "flare::malformed",
                pc = action.pc,
                declared,
                stop = self.stop_pc,
                "function body runs past the end of its block"
            );
        }

        let anonymous = header.name.is_empty();
        let name = header.name.clone();
        let closure = Closure {
            code: self.code.clone(),
            pool: self.pool.clone(),
            body: start..end,
            scope: self.capture_scope(),
            header,
        };
        let func = function::define(self.cx, closure);
        tracing::debug!(name = %name, start, end, "function defined");

        if anonymous {
            self.cx.env.push(func);
        } else {
            self.resolver().set_variable(&name, Value::Object(func));
        }
        Flow::Branch(end)
    }

    pub(super) fn op_type_of(&mut self) -> Flow {
        let value = self.cx.env.pop();
        self.cx.env.push(value.type_of());
        Flow::Continue
    }

    pub(super) fn op_instance_of(&mut self) -> Flow {
        let ctor = self.cx.env.pop();
        let value = self.cx.env.pop();
        let result = match (value.as_object(), ctor.as_object()) {
            (Some(obj), Some(ctor)) => obj.instance_of(ctor, self.case()),
            _ => false,
        };
        self.push_bool(result);
        Flow::Continue
    }

    /// `Sub extends Super`: a fresh prototype for `Sub` chained to
    /// `Super.prototype`.
    pub(super) fn op_extends(&mut self) -> Flow {
        let parent = self.cx.env.pop();
        let child = self.cx.env.pop();
        let (Some(parent), Some(child)) = (
            parent.as_object().filter(|o| o.is_function()),
            child.as_object().filter(|o| o.is_function()),
        ) else {
            tracing::warn!(target: "flare::coding", ?child, ?parent, "extends needs two functions");
            return Flow::Continue;
        };

        let case = self.case();
        let Some(parent_proto) = function::prototype_of(parent, case) else {
            tracing::warn!(target: "flare::coding", ?parent, "superclass has no prototype");
            return Flow::Continue;
        };
        let proto = Object::plain(Some(parent_proto));
        proto.define("__constructor__", Value::Object(parent.clone()), PropFlags::DONT_ENUM);
        if self.version().get() < 7 {
            proto.define("constructor", Value::Object(parent.clone()), PropFlags::DONT_ENUM);
        }
        child.set_member("prototype", Value::Object(proto), self.version());
        Flow::Continue
    }

    /// `cast(ctor, value)`: the value when it is an instance, else `null`.
    pub(super) fn op_cast(&mut self) -> Flow {
        let value = self.cx.env.pop();
        let ctor = self.cx.env.pop();
        let result = match (value.as_object(), ctor.as_object()) {
            (Some(obj), Some(ctor)) if obj.instance_of(ctor, self.case()) => value.clone(),
            (Some(_), Some(_)) => Value::Null,
            _ => {
                tracing::warn!(target: "flare::coding", ?ctor, ?value, "cast needs two objects");
                Value::Null
            }
        };
        self.cx.env.push(result);
        Flow::Continue
    }

    /// `class C implements I, J`: register interface prototypes on
    /// `C.prototype`.
    pub(super) fn op_implements(&mut self) -> Flow {
        let ctor = self.cx.env.pop();
        let count = self.cx.env.pop().to_int(self.version());
        let case = self.case();
        let Some(proto) = ctor.as_object().and_then(|c| function::prototype_of(c, case)) else {
            tracing::warn!(target: "flare::coding", ?ctor, "implements on a value without a prototype");
            return Flow::Continue;
        };
        let count = usize::try_from(count).unwrap_or(0);
        if count == 0 {
            tracing::warn!(target: "flare::coding", "implements with no interfaces");
            return Flow::Continue;
        }
        let available = self.cx.env.stack_size();
        for _ in 0..count.min(available) {
            let interface = self.cx.env.pop();
            match interface.as_object().and_then(|i| function::prototype_of(i, case)) {
                Some(interface_proto) => proto.add_interface(interface_proto),
                None => {
                    tracing::warn!(target: "flare::coding", ?interface, "interface has no prototype");
                }
            }
        }
        Flow::Continue
    }
}

/// An empty or `undefined` method name means "call the object itself".
fn is_blank_name(name: &Value) -> bool {
    match name {
        Value::Undefined => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}


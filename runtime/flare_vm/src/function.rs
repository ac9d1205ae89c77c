//! Function definition, invocation, and construction.
//!
//! A script call pushes a [`CallFrame`], binds `this`, `arguments`,
//! `super`, and the parameters the way the function's header asks
//! (named locals for `DefineFunction`, registers for `DefineFunction2`),
//! and then runs a nested [`Engine`] over the closure body.

use std::iter;
use std::rc::Rc;

use flare_ir::FunctionFlags;
use flare_value::display::root_of;
use flare_value::{Callable, Closure, NameCase, NativeCall, Object, PropFlags, Value};

use crate::engine::{Context, Engine, Exit};
use crate::{CallFrame, LimitKind, VmError};

/// The outcome of a call as seen by the caller.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Completion {
    Normal(Value),
    Throw(Value),
}

/// Wrap a closure in a function object with a fresh `prototype`.
pub(crate) fn define(cx: &Context<'_>, closure: Closure) -> Object {
    let globals = cx.vm.globals();
    let func = Object::function(
        Callable::Script(Rc::new(closure)),
        Some(globals.function_proto().clone()),
    );
    let proto = globals.new_object();
    proto.define("constructor", Value::Object(func.clone()), PropFlags::DONT_ENUM);
    func.define("prototype", Value::Object(proto), PropFlags::DONT_ENUM);
    func
}

/// `ctor.prototype`, when it is an object.
pub(crate) fn prototype_of(ctor: &Object, case: NameCase) -> Option<Object> {
    ctor.get_member("prototype", case)
        .and_then(|v| v.as_object().cloned())
}

/// Call `func` with an explicit `this`.
///
/// `sup` overrides the `super` object the callee sees; by default it is
/// derived from `this`.
pub(crate) fn call(
    cx: &mut Context<'_>,
    func: &Object,
    this: Value,
    args: &[Value],
    sup: Option<Object>,
) -> Result<Completion, VmError> {
    match func.callable() {
        Some(Callable::Script(closure)) => invoke(cx, func, closure, this, args, sup),
        Some(Callable::Native(native)) => {
            let call = NativeCall {
                this: &this,
                args,
                version: cx.env.version(),
                constructing: false,
            };
            match native.call(&call) {
                Ok(value) => Ok(Completion::Normal(value)),
                Err(err) => {
                    tracing::warn!(target: "flare::coding", %err, "native function failed");
                    Ok(Completion::Normal(Value::Undefined))
                }
            }
        }
        None => {
            tracing::warn!(target: "flare::coding", ?func, "call of a non-function");
            Ok(Completion::Normal(Value::Undefined))
        }
    }
}

/// Like [`call`], for a value that may not be a function at all.
pub(crate) fn call_value(
    cx: &mut Context<'_>,
    func: &Value,
    this: Value,
    args: &[Value],
    sup: Option<Object>,
) -> Result<Completion, VmError> {
    match func.as_object().filter(|o| o.is_function()) {
        Some(func) => call(cx, func, this, args, sup),
        None => {
            tracing::warn!(target: "flare::coding", ?func, "call of a non-function");
            Ok(Completion::Normal(Value::Undefined))
        }
    }
}

/// `new ctor(args)`.
///
/// The result is the fresh instance unless a script constructor returns
/// an object of its own. A failing native constructor, or a value that is
/// not a function, gives `undefined`.
pub(crate) fn construct(
    cx: &mut Context<'_>,
    ctor: &Object,
    args: &[Value],
) -> Result<Completion, VmError> {
    let version = cx.env.version();
    let case = cx.env.case();
    let Some(callable) = ctor.callable() else {
        tracing::warn!(target: "flare::coding", ?ctor, "new on a non-constructor");
        return Ok(Completion::Normal(Value::Undefined));
    };

    let proto = prototype_of(ctor, case).unwrap_or_else(|| cx.vm.globals().object_proto().clone());
    let instance = Object::plain(Some(proto));
    instance.define("__constructor__", Value::Object(ctor.clone()), PropFlags::DONT_ENUM);
    if version.get() < 7 {
        instance.define("constructor", Value::Object(ctor.clone()), PropFlags::DONT_ENUM);
    }
    let this = Value::Object(instance.clone());

    match callable {
        Callable::Script(closure) => Ok(match invoke(cx, ctor, closure, this, args, None)? {
            Completion::Normal(returned @ Value::Object(_)) => Completion::Normal(returned),
            Completion::Normal(_) => Completion::Normal(Value::Object(instance)),
            thrown @ Completion::Throw(_) => thrown,
        }),
        Callable::Native(native) => {
            let call = NativeCall {
                this: &this,
                args,
                version,
                constructing: true,
            };
            match native.call(&call) {
                Ok(returned @ Value::Object(_)) => Ok(Completion::Normal(returned)),
                Ok(_) => Ok(Completion::Normal(this)),
                Err(err) => {
                    tracing::warn!(target: "flare::coding", %err, "construction failed");
                    Ok(Completion::Normal(Value::Undefined))
                }
            }
        }
    }
}

/// Run a script closure.
#[tracing::instrument(level = "debug", skip_all, fields(name = closure.name(), args = args.len()))]
fn invoke(
    cx: &mut Context<'_>,
    callee: &Object,
    closure: &Rc<Closure>,
    this: Value,
    args: &[Value],
    sup: Option<Object>,
) -> Result<Completion, VmError> {
    let limit = cx.vm.config().recursion_limit;
    if cx.env.call_depth() >= limit {
        tracing::error!(limit, "recursion limit exceeded");
        return Err(VmError::limit(LimitKind::Recursion, limit));
    }

    let version = cx.env.version();
    let case = cx.env.case();
    let caller = cx
        .env
        .frame()
        .map_or(Value::Null, |frame| Value::Object(frame.callee.clone()));
    let sup = sup.or_else(|| this.as_object().map(|obj| obj.super_of(case)));

    // Before version 6 a clip `this` also becomes the target.
    let saved_targets = match this.as_display_object() {
        Some(node) if version.get() < 6 => {
            let saved = (
                cx.env.target().cloned(),
                cx.env.original_target().cloned(),
            );
            cx.env.set_target(Some(node.clone()));
            cx.env.set_original_target(Some(node.clone()));
            Some(saved)
        }
        _ => None,
    };

    let registers = if closure.is_function2() {
        usize::from(closure.register_count())
    } else {
        0
    };
    let frame = CallFrame::new(callee.clone(), this.clone(), Rc::clone(&closure.scope), registers);
    let locals = frame.locals.clone();
    cx.env.push_frame(frame);

    let arguments = cx.vm.globals().new_array(args.iter().cloned());
    arguments.define("callee", Value::Object(callee.clone()), PropFlags::DONT_ENUM);
    arguments.define("caller", caller, PropFlags::DONT_ENUM);

    if closure.is_function2() {
        bind_registers(cx, closure, &this, &arguments, sup.as_ref(), args);
    } else {
        bind_locals(cx, closure, &this, &arguments, sup.as_ref(), args);
    }

    let base: Rc<[Object]> = if version.get() > 5 {
        closure.scope.iter().cloned().chain(iter::once(locals)).collect()
    } else {
        Rc::clone(&closure.scope)
    };
    let result = flare_stack::ensure_sufficient_stack(|| {
        Engine::new(
            cx,
            closure.code.clone(),
            closure.pool.clone(),
            closure.body.clone(),
            base,
            true,
        )
        .run()
    });

    cx.env.pop_frame();
    if let Some((target, original)) = saved_targets {
        cx.env.set_target(target);
        cx.env.set_original_target(original);
    }

    Ok(match result? {
        Exit::Finished => Completion::Normal(Value::Undefined),
        Exit::Returned(value) => Completion::Normal(value),
        Exit::Threw(value) => Completion::Throw(value),
    })
}

/// `DefineFunction` calling convention: everything is a named local.
fn bind_locals(
    cx: &Context<'_>,
    closure: &Closure,
    this: &Value,
    arguments: &Object,
    sup: Option<&Object>,
    args: &[Value],
) {
    for (index, param) in closure.params().iter().enumerate() {
        let value = args.get(index).cloned().unwrap_or_default();
        cx.env.set_local(&param.name, value);
    }
    cx.env.set_local("this", this.clone());
    if cx.env.version().get() > 5 {
        cx.env
            .set_local("super", sup.cloned().map_or(Value::Undefined, Value::Object));
    }
    cx.env.set_local("arguments", Value::Object(arguments.clone()));
}

/// `DefineFunction2` calling convention: preloads in registers from 1,
/// parameters in their declared registers or as named locals.
fn bind_registers(
    cx: &mut Context<'_>,
    closure: &Closure,
    this: &Value,
    arguments: &Object,
    sup: Option<&Object>,
    args: &[Value],
) {
    let flags = closure.flags();
    let sup = sup.cloned().map_or(Value::Undefined, Value::Object);
    let target = cx.env.effective_target().cloned();
    let mut next_register: u8 = 1;

    let implicit = [
        (
            FunctionFlags::PRELOAD_THIS,
            FunctionFlags::SUPPRESS_THIS,
            "this",
            this.clone(),
        ),
        (
            FunctionFlags::PRELOAD_ARGUMENTS,
            FunctionFlags::SUPPRESS_ARGUMENTS,
            "arguments",
            Value::Object(arguments.clone()),
        ),
        (
            FunctionFlags::PRELOAD_SUPER,
            FunctionFlags::SUPPRESS_SUPER,
            "super",
            sup,
        ),
    ];
    for (preload, suppress, name, value) in implicit {
        if flags.contains(preload) {
            cx.env.set_register(cx.registers, next_register, value);
            next_register = next_register.saturating_add(1);
        } else if !flags.contains(suppress) {
            cx.env.set_local(name, value);
        }
    }

    if flags.contains(FunctionFlags::PRELOAD_ROOT) {
        let root = target.as_ref().map_or(Value::Undefined, |t| Value::Object(root_of(t)));
        cx.env.set_register(cx.registers, next_register, root);
        next_register = next_register.saturating_add(1);
    }
    if flags.contains(FunctionFlags::PRELOAD_PARENT) {
        let parent = target
            .as_ref()
            .and_then(|t| t.display().and_then(|d| d.parent()))
            .map_or(Value::Undefined, Value::Object);
        cx.env.set_register(cx.registers, next_register, parent);
        next_register = next_register.saturating_add(1);
    }
    if flags.contains(FunctionFlags::PRELOAD_GLOBAL) {
        let global = Value::Object(cx.vm.globals().global().clone());
        cx.env.set_register(cx.registers, next_register, global);
    }

    for (index, param) in closure.params().iter().enumerate() {
        let arg = args.get(index).cloned();
        if param.register == 0 {
            match arg {
                Some(value) => {
                    cx.env.set_local(&param.name, value);
                }
                None => {
                    cx.env.declare_local(&param.name);
                }
            }
        } else if let Some(value) = arg {
            cx.env.set_register(cx.registers, param.register, value);
        }
    }
}

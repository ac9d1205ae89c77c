//! The global object and the core constructors.
//!
//! Only what the bytecode itself depends on lives here: `Object`,
//! `Function`, and `Array` with their prototypes, so that `new`,
//! `instanceof`, `InitObject`, and `InitArray` have something to link to.

use flare_value::{
    default_text, Callable, NativeCall, NativeError, NativeFunction, Object, PropFlags, Value,
};

/// Core prototypes and the `_global` object.
#[derive(Clone, Debug)]
pub struct Globals {
    global: Object,
    object_proto: Object,
    function_proto: Object,
    array_proto: Object,
}

impl Globals {
    pub fn new() -> Self {
        let object_proto = Object::plain(None);
        let function_proto = Object::plain(Some(object_proto.clone()));
        let array_proto = Object::plain(Some(object_proto.clone()));
        let global = Object::plain(Some(object_proto.clone()));

        let hidden = PropFlags::DONT_ENUM;
        let method = |name: &'static str, f: fn(&NativeCall<'_>) -> Result<Value, NativeError>| {
            Value::Object(Object::function(
                Callable::Native(NativeFunction::new(name, f)),
                Some(function_proto.clone()),
            ))
        };
        object_proto.define("toString", method("toString", object_to_string), hidden);
        object_proto.define("valueOf", method("valueOf", object_value_of), hidden);

        let ctor = |name: &'static str, f: NativeFunction, proto: &Object| {
            let ctor = Object::function(Callable::Native(f), Some(function_proto.clone()));
            ctor.define("prototype", Value::Object(proto.clone()), hidden);
            proto.define("constructor", Value::Object(ctor.clone()), hidden);
            global.define(name, Value::Object(ctor), hidden);
        };
        let array_proto_for_ctor = array_proto.clone();
        let object_proto_for_ctor = object_proto.clone();
        ctor(
            "Object",
            NativeFunction::new("Object", move |call| {
                Ok(construct_object(call, &object_proto_for_ctor))
            }),
            &object_proto,
        );
        ctor(
            "Array",
            NativeFunction::new("Array", move |call| {
                Ok(construct_array(call, &array_proto_for_ctor))
            }),
            &array_proto,
        );
        ctor(
            "Function",
            NativeFunction::new("Function", |call| Ok(call.this.clone())),
            &function_proto,
        );

        Globals {
            global,
            object_proto,
            function_proto,
            array_proto,
        }
    }

    /// The object behind `_global`.
    #[inline]
    pub fn global(&self) -> &Object {
        &self.global
    }

    #[inline]
    pub fn object_proto(&self) -> &Object {
        &self.object_proto
    }

    #[inline]
    pub fn function_proto(&self) -> &Object {
        &self.function_proto
    }

    #[inline]
    pub fn array_proto(&self) -> &Object {
        &self.array_proto
    }

    /// A fresh `{}` linked to `Object.prototype`.
    pub fn new_object(&self) -> Object {
        Object::plain(Some(self.object_proto.clone()))
    }

    /// A fresh array linked to `Array.prototype`.
    pub fn new_array(&self, elements: impl IntoIterator<Item = Value>) -> Object {
        Object::array(elements, Some(self.array_proto.clone()))
    }
}

impl Default for Globals {
    fn default() -> Self {
        Globals::new()
    }
}

fn object_to_string(call: &NativeCall<'_>) -> Result<Value, NativeError> {
    Ok(match call.this {
        Value::Object(obj) => Value::string(default_text(obj, call.version)),
        other => Value::String(other.to_string(call.version)),
    })
}

fn object_value_of(call: &NativeCall<'_>) -> Result<Value, NativeError> {
    Ok(call.this.clone())
}

/// `Object(v)` / `new Object(v)`: objects pass through, anything else
/// gives a fresh object.
fn construct_object(call: &NativeCall<'_>, proto: &Object) -> Value {
    match call.arg(0) {
        obj @ Value::Object(_) => obj,
        _ if call.constructing && call.this.is_object() => call.this.clone(),
        _ => Value::Object(Object::plain(Some(proto.clone()))),
    }
}

/// `Array(n)` makes `n` empty slots; any other argument list becomes the
/// elements.
fn construct_array(call: &NativeCall<'_>, proto: &Object) -> Value {
    let array = match call.args {
        [Value::Number(n)] if *n >= 0.0 && n.fract() == 0.0 => {
            let array = Object::array([], Some(proto.clone()));
            array.set_member("length", Value::Number(*n), call.version);
            array
        }
        args => Object::array(args.iter().cloned(), Some(proto.clone())),
    };
    Value::Object(array)
}

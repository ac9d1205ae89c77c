//! Shared, reference-counted script objects.
//!
//! Every non-primitive value is an [`Object`]: a handle to one
//! [`ObjectData`] cell holding a property table, a prototype link, and a
//! kind tag. Cloning an `Object` clones the handle, never the object.
//!
//! # Prototype chains
//!
//! Member reads walk `__proto__` links. Scripts can build cycles, so every
//! walk is capped at [`MAX_PROTO_DEPTH`] hops.

mod property;

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use flare_ir::Version;

use crate::display::{self, DisplayObject, DisplayProperty};
use crate::function::{Callable, Closure};
use crate::Value;

pub use property::{NameCase, PropFlags, Property, PropertyMap};

/// Upper bound on prototype-chain walks.
pub const MAX_PROTO_DEPTH: usize = 256;

/// What an object is, beyond its property table.
pub enum ObjectKind {
    Plain,
    /// Elements live in the property table under `"0"`, `"1"`, ... with a
    /// `length` member.
    Array,
    Function(Callable),
    Display(Rc<dyn DisplayObject>),
    /// The `super` handle bound inside a method call. Members resolve
    /// through the superclass prototype (its `__proto__`); calling it runs
    /// the superclass constructor.
    Super(Option<Object>),
}

impl fmt::Debug for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Plain => f.write_str("Plain"),
            ObjectKind::Array => f.write_str("Array"),
            ObjectKind::Function(callable) => write!(f, "Function({callable:?})"),
            ObjectKind::Display(node) => write!(f, "Display({node:?})"),
            ObjectKind::Super(ctor) => write!(f, "Super({:?})", ctor.as_ref().map(Object::id)),
        }
    }
}

struct ObjectData {
    kind: ObjectKind,
    props: RefCell<PropertyMap>,
    proto: RefCell<Option<Object>>,
    /// Interface prototypes registered by `ImplementsOp`.
    interfaces: RefCell<Vec<Object>>,
}

/// Handle to a shared object.
#[derive(Clone)]
pub struct Object(Rc<ObjectData>);

/// Non-owning handle, used for parent links.
#[derive(Clone, Default)]
pub struct WeakObject(Weak<ObjectData>);

impl WeakObject {
    pub fn new() -> Self {
        WeakObject(Weak::new())
    }

    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(obj) => write!(f, "Weak({:#x})", obj.id()),
            None => f.write_str("Weak(<dropped>)"),
        }
    }
}

// Factory Methods

impl Object {
    pub fn new(kind: ObjectKind, proto: Option<Object>) -> Self {
        Object(Rc::new(ObjectData {
            kind,
            props: RefCell::new(PropertyMap::new()),
            proto: RefCell::new(proto),
            interfaces: RefCell::new(Vec::new()),
        }))
    }

    /// A plain property bag.
    pub fn plain(proto: Option<Object>) -> Self {
        Self::new(ObjectKind::Plain, proto)
    }

    /// An array holding `elements`.
    pub fn array(elements: impl IntoIterator<Item = Value>, proto: Option<Object>) -> Self {
        let obj = Self::new(ObjectKind::Array, proto);
        {
            let mut props = obj.props_mut();
            let mut len = 0usize;
            for (index, value) in elements.into_iter().enumerate() {
                props.set(&index.to_string(), value, NameCase::Sensitive);
                len = index.saturating_add(1);
            }
            props.define("length", Value::from_usize(len), PropFlags::DONT_ENUM);
        }
        obj
    }

    pub fn function(callable: Callable, proto: Option<Object>) -> Self {
        Self::new(ObjectKind::Function(callable), proto)
    }

    pub fn display_node(node: Rc<dyn DisplayObject>, proto: Option<Object>) -> Self {
        Self::new(ObjectKind::Display(node), proto)
    }
}

// Identity and Kind

impl Object {
    #[inline]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address, for logs.
    #[inline]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    #[inline]
    pub fn kind(&self) -> &ObjectKind {
        &self.0.kind
    }

    #[inline]
    pub fn callable(&self) -> Option<&Callable> {
        match &self.0.kind {
            ObjectKind::Function(callable) => Some(callable),
            _ => None,
        }
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        matches!(self.0.kind, ObjectKind::Function(_))
    }

    pub fn closure(&self) -> Option<&Rc<Closure>> {
        match &self.0.kind {
            ObjectKind::Function(Callable::Script(closure)) => Some(closure),
            _ => None,
        }
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.0.kind, ObjectKind::Array)
    }

    #[inline]
    pub fn display(&self) -> Option<&dyn DisplayObject> {
        match &self.0.kind {
            ObjectKind::Display(node) => Some(node.as_ref()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_super(&self) -> bool {
        matches!(self.0.kind, ObjectKind::Super(_))
    }

    /// The constructor a `super` handle calls.
    pub fn super_constructor(&self) -> Option<&Object> {
        match &self.0.kind {
            ObjectKind::Super(ctor) => ctor.as_ref(),
            _ => None,
        }
    }

    /// A display node that is a movie clip (has a timeline).
    pub fn movie_clip(&self) -> Option<&dyn DisplayObject> {
        self.display().filter(|d| d.is_movie_clip())
    }
}

// Property Access

impl Object {
    #[inline]
    pub fn props(&self) -> Ref<'_, PropertyMap> {
        self.0.props.borrow()
    }

    #[inline]
    pub fn props_mut(&self) -> RefMut<'_, PropertyMap> {
        self.0.props.borrow_mut()
    }

    pub fn proto(&self) -> Option<Object> {
        self.0.proto.borrow().clone()
    }

    pub fn set_proto(&self, proto: Option<Object>) {
        *self.0.proto.borrow_mut() = proto;
    }

    pub fn get_own(&self, name: &str, case: NameCase) -> Option<Value> {
        self.props().get(name, case).map(|p| p.value.clone())
    }

    pub fn has_own(&self, name: &str, case: NameCase) -> bool {
        self.props().contains(name, case)
    }

    /// Read a member, following display properties, display children, and
    /// the prototype chain.
    pub fn get_member(&self, name: &str, case: NameCase) -> Option<Value> {
        if case.matches(name, "__proto__") {
            return self.proto().map(Value::Object);
        }
        if let Some(node) = self.display() {
            if let Some(prop) = DisplayProperty::from_name(name, case) {
                return Some(display::get_property(self, node, prop));
            }
            if case.matches(name, "_parent") {
                return node.parent().map(Value::Object);
            }
        }
        if let Some(value) = self.get_own(name, case) {
            return Some(value);
        }
        if let Some(child) = self.display().and_then(|d| d.child(name, case)) {
            return Some(Value::Object(child));
        }
        let mut proto = self.proto();
        for _ in 0..MAX_PROTO_DEPTH {
            let Some(current) = proto else {
                return None;
            };
            if let Some(value) = current.get_own(name, case) {
                return Some(value);
            }
            proto = current.proto();
        }
        tracing::warn!(target: "flare::coding", name, "prototype chain too deep");
        None
    }

    /// Write a member. Returns `false` when the write was refused.
    pub fn set_member(&self, name: &str, value: Value, version: Version) -> bool {
        let case = NameCase::for_version(version);
        if self.is_super() {
            tracing::warn!(target: "flare::coding", name, "cannot set members on super");
            return false;
        }
        if case.matches(name, "__proto__") {
            self.set_proto(value.as_object().cloned());
            return true;
        }
        if let Some(node) = self.display() {
            if let Some(prop) = DisplayProperty::from_name(name, case) {
                if prop.is_read_only() {
                    return false;
                }
                node.set_property(prop, &value, version);
                return true;
            }
        }
        if self.is_array() {
            self.update_array_length(name, &value, version);
        }
        self.props_mut().set(name, value, case)
    }

    fn update_array_length(&self, name: &str, value: &Value, version: Version) {
        let case = NameCase::Sensitive;
        let current = self
            .get_own("length", case)
            .map_or(0.0, |v| v.to_number(version));
        if name == "length" {
            let new_len = value.to_number(version);
            if new_len.is_finite() && new_len >= 0.0 && new_len < current {
                let mut props = self.props_mut();
                let mut index = new_len.trunc();
                while index < current {
                    props.remove(&Value::Number(index).to_string(version), case);
                    index += 1.0;
                }
            }
            return;
        }
        if let Ok(index) = name.parse::<u32>() {
            let next = f64::from(index) + 1.0;
            if next > current {
                self.props_mut()
                    .define("length", Value::Number(next), PropFlags::DONT_ENUM);
            }
        }
    }

    /// Define a member with explicit attribute flags.
    pub fn define(&self, name: &str, value: Value, flags: PropFlags) {
        self.props_mut().define(name, value, flags);
    }

    /// Whether a member is reachable through [`Object::get_member`].
    pub fn has_member(&self, name: &str, case: NameCase) -> bool {
        self.get_member(name, case).is_some()
    }

    /// Delete an own member. Returns `true` on success.
    pub fn delete_member(&self, name: &str, case: NameCase) -> bool {
        self.props_mut().remove(name, case) == Some(true)
    }

    /// Enumerable member names: own members, display children, then
    /// inherited members not already listed.
    pub fn enumerate(&self) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = self.props().enumerable_names().cloned().collect();
        if let Some(node) = self.display() {
            for child in node.children() {
                if let Some(child_node) = child.display() {
                    let name: Rc<str> = child_node.name().into();
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        let mut proto = self.proto();
        for _ in 0..MAX_PROTO_DEPTH {
            let Some(current) = proto else {
                break;
            };
            for name in current.props().enumerable_names() {
                if !names.contains(name) {
                    names.push(Rc::clone(name));
                }
            }
            proto = current.proto();
        }
        names
    }

    /// Elements `0..length` of an array-like object.
    pub fn array_elements(&self, version: Version) -> Vec<Value> {
        let len = self
            .get_own("length", NameCase::Sensitive)
            .map_or(0, |v| usize::try_from(v.to_int(version)).unwrap_or(0));
        (0..len)
            .map(|i| {
                self.get_own(&i.to_string(), NameCase::Sensitive)
                    .unwrap_or_default()
            })
            .collect()
    }
}

// Prototype Relations

impl Object {
    pub fn add_interface(&self, interface_proto: Object) {
        let mut interfaces = self.0.interfaces.borrow_mut();
        if !interfaces.iter().any(|i| i.ptr_eq(&interface_proto)) {
            interfaces.push(interface_proto);
        }
    }

    fn implements(&self, proto: &Object, depth: usize) -> bool {
        if depth >= MAX_PROTO_DEPTH {
            return false;
        }
        let interfaces = self.0.interfaces.borrow();
        interfaces.iter().any(|i| {
            i.ptr_eq(proto)
                || i.implements(proto, depth.saturating_add(1))
                || i.proto().is_some_and(|p| {
                    p.ptr_eq(proto) || p.implements(proto, depth.saturating_add(1))
                })
        })
    }

    /// Whether `proto` appears on this object's prototype chain, directly or
    /// through a registered interface.
    pub fn inherits_from(&self, proto: &Object) -> bool {
        let mut current = self.proto();
        for _ in 0..MAX_PROTO_DEPTH {
            let Some(obj) = current else {
                return false;
            };
            if obj.ptr_eq(proto) || obj.implements(proto, 0) {
                return true;
            }
            current = obj.proto();
        }
        false
    }

    /// The `super` handle for a method running on `self`.
    ///
    /// `self.__proto__` is the class prototype; the handle resolves members
    /// through that prototype's own `__proto__` and calls the class
    /// prototype's `__constructor__`. Applied to a `super` handle, this
    /// climbs one more level.
    pub fn super_of(&self, case: NameCase) -> Object {
        let class_proto = self.proto();
        let super_proto = class_proto.as_ref().and_then(Object::proto);
        let ctor = class_proto
            .and_then(|p| p.get_member("__constructor__", case))
            .and_then(|v| v.as_object().filter(|o| o.is_function()).cloned());
        Object::new(ObjectKind::Super(ctor), super_proto)
    }

    /// `self instanceof ctor`.
    pub fn instance_of(&self, ctor: &Object, case: NameCase) -> bool {
        match ctor.get_member("prototype", case) {
            Some(Value::Object(proto)) => self.inherits_from(&proto),
            _ => false,
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:#x}, {:?})", self.id(), self.0.kind)
    }
}

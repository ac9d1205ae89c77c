//! Callable values: script closures and native functions.
//!
//! Both live inside an [`Object`](crate::Object) of kind
//! [`ObjectKind::Function`](crate::ObjectKind::Function), so they carry an
//! ordinary property table (`prototype` among others) and can be stored
//! anywhere a value can.

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use flare_ir::{CodeBuffer, ConstantPool, FunctionFlags, FunctionHeader, Param, Version};

use crate::{Object, Value};

/// A function defined by `DefineFunction` or `DefineFunction2`.
///
/// The closure keeps the defining buffer alive and remembers the constant
/// pool and scope chain that were active when it was created.
#[derive(Clone)]
pub struct Closure {
    pub code: CodeBuffer,
    pub pool: ConstantPool,
    /// Absolute byte range of the body within `code`.
    pub body: Range<usize>,
    /// Enclosing scope objects, outermost first.
    pub scope: Rc<[Object]>,
    pub header: FunctionHeader,
}

impl Closure {
    #[inline]
    pub fn name(&self) -> &str {
        &self.header.name
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.header.params
    }

    #[inline]
    pub fn flags(&self) -> FunctionFlags {
        self.header.flags
    }

    /// Whether this closure uses the register calling convention.
    #[inline]
    pub fn is_function2(&self) -> bool {
        self.header.registers
    }

    #[inline]
    pub fn register_count(&self) -> u8 {
        self.header.register_count
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.code.version()
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.header.name)
            .field("body", &self.body)
            .field("params", &self.header.params.len())
            .field("registers", &self.header.register_count)
            .finish_non_exhaustive()
    }
}

/// Failure raised by a native function.
///
/// At `new` call sites this is converted into a pushed `undefined`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NativeError {
    #[error("{name} cannot be constructed")]
    NotConstructible { name: &'static str },
    #[error("{name}: {message}")]
    Failed {
        name: &'static str,
        message: String,
    },
}

/// Arguments handed to a native function.
pub struct NativeCall<'a> {
    pub this: &'a Value,
    pub args: &'a [Value],
    pub version: Version,
    /// `true` when invoked through `new`.
    pub constructing: bool,
}

impl NativeCall<'_> {
    /// Argument `index`, or `undefined` when absent.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }
}

pub type NativeFn = Rc<dyn Fn(&NativeCall<'_>) -> Result<Value, NativeError>>;

/// A function implemented in Rust.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn new(
        name: &'static str,
        func: impl Fn(&NativeCall<'_>) -> Result<Value, NativeError> + 'static,
    ) -> Self {
        NativeFunction {
            name,
            func: Rc::new(func),
        }
    }

    pub fn call(&self, call: &NativeCall<'_>) -> Result<Value, NativeError> {
        (self.func)(call)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// The code behind a function object.
#[derive(Clone, Debug)]
pub enum Callable {
    Script(Rc<Closure>),
    Native(NativeFunction),
}

//! Flare Value - the dynamically-typed value model of the action VM.
//!
//! # Contents
//!
//! - [`Value`]: the tagged union scripts manipulate, with total,
//!   version-aware coercions (`to_number`, `to_string`, `to_bool`,
//!   `to_int`, `to_primitive`) and equality ([`loose_equals`],
//!   [`strict_equals`])
//! - [`Object`]: shared property bags, arrays, functions, and display
//!   nodes, with prototype chains and [`NameCase`]-aware member lookup
//! - [`Closure`] and [`NativeFunction`]: the two kinds of callable
//! - [`DisplayObject`]: the scene-graph contract implemented by the host
//!
//! Nothing here executes bytecode; calling a [`Closure`] is the VM's job.

pub mod display;
mod function;
mod object;
mod value;

pub use display::{DisplayObject, DisplayProperty};
pub use function::{Callable, Closure, NativeCall, NativeError, NativeFn, NativeFunction};
pub use object::{
    NameCase, Object, ObjectKind, PropFlags, Property, PropertyMap, WeakObject,
    MAX_PROTO_DEPTH,
};
pub use value::{
    default_text, format_number, loose_equals, parse_number, strict_equals, PrimitiveHint, Value,
};

// Re-exported so downstream crates agree on one version type.
pub use flare_ir::Version;

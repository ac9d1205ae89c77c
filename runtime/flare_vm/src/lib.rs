//! Flare VM - the action bytecode interpreter.
//!
//! # Architecture
//!
//! A [`Vm`] owns configuration, the global object, and the level table.
//! Each run borrows an [`Environment`] (operand stack, call frames,
//! target), the [`GlobalRegisters`], and a [`Host`], and drives an
//! internal engine over one action buffer:
//!
//! ```text
//! Vm::run(code, env, registers, host)
//!   -> Engine::run            decode, dispatch, try/with bookkeeping
//!        -> function::call    nested Engine per script call
//!        -> Resolver          variables, paths, targets
//! ```
//!
//! # Errors
//!
//! Malformed bytecode and script mistakes are logged and degraded; only
//! uncaught exceptions, script limits, and (optionally) truncated action
//! headers surface as [`VmError`].
//!
//! # Logging targets
//!
//! - `flare::actions`: one `trace` line per executed action
//! - `flare::malformed`: bad bytecode
//! - `flare::coding`: script errors that the player tolerates

mod config;
mod engine;
mod environment;
mod error;
mod function;
mod globals;
mod host;
mod target;
mod vm;

pub use config::VmConfig;
pub use engine::Flow;
pub use environment::{CallFrame, Environment, GlobalRegisters, RegisterSlot};
pub use error::{LimitKind, VmError};
pub use globals::Globals;
pub use host::{
    BufferTraceSink, DragBounds, DragState, HeadlessHost, Host, HostEvent, SendVars,
    StdoutTraceSink, TraceSink, UrlRequest,
};
pub use vm::Vm;

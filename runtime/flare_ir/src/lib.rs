//! Flare IR - action bytecode representation.
//!
//! This crate contains everything needed to read action bytecode without
//! executing it:
//! - [`Opcode`] and [`ArgShape`]: the closed opcode table
//! - [`CodeBuffer`], [`Action`], [`ByteReader`]: framing and payload access
//! - [`ConstantPool`]: the string table declared by `ConstantPool` actions
//! - [`payload`]: typed readers for push data, function and `try` headers
//! - [`disasm`]: text rendering for logs and the command-line runner
//!
//! # Design Philosophy
//!
//! - **Never panic on input**: every reader returns a [`DecodeError`] or
//!   logs and degrades; bytecode comes from untrusted files.
//! - **Lazy payloads**: framing is decoded eagerly, payloads only when a
//!   handler asks for them.

mod buffer;
pub mod disasm;
mod error;
mod opcode;
pub mod payload;
mod version;

pub use buffer::{decode_text, Action, Actions, ByteReader, CodeBuffer, ConstantPool};
pub use error::DecodeError;
pub use opcode::{ArgShape, Opcode};
pub use payload::{
    CatchTarget, FunctionFlags, FunctionHeader, GotoFrame2Args, Param, PushItem, TryFlags,
    TryHeader, UrlArgs, WaitForFrameArgs,
};
pub use version::Version;

//! Errors that end a run.
//!
//! Almost nothing a script does is an error at this level: malformed
//! bytecode and coding mistakes are logged and degraded, and script
//! exceptions travel as [`Flow::Throw`](crate::Flow::Throw). A [`VmError`]
//! only surfaces from the top-level run.

use std::fmt;

use flare_ir::DecodeError;
use flare_value::Value;

/// Which script limit was hit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LimitKind {
    /// Nested function calls.
    Recursion,
    /// Backward branches in one invocation.
    Branches,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LimitKind::Recursion => "recursion",
            LimitKind::Branches => "backward branches",
        })
    }
}

/// A failure that aborts the current top-level run.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// A thrown value nothing caught.
    #[error("uncaught exception: {0:?}")]
    UncaughtException(Value),
    #[error("script limit exceeded: {kind} (limit {limit})")]
    ScriptLimit { kind: LimitKind, limit: usize },
    /// Only raised with strict decoding enabled.
    #[error("malformed action stream: {0}")]
    Decode(#[from] DecodeError),
}

impl VmError {
    pub(crate) fn limit(kind: LimitKind, limit: usize) -> Self {
        VmError::ScriptLimit { kind, limit }
    }
}

//! Native stack growth for nested script calls.
//!
//! Every script function call re-enters the interpreter loop, so a deeply
//! recursive script recurses on the native stack as well. The script-level
//! recursion limit bounds the depth, but each level can be large (a full
//! engine frame plus the handler that made the call), so the VM wraps each
//! call in [`ensure_sufficient_stack`] and lets the stack grow on demand.
//!
//! # Platform Support
//!
//! - **Native targets**: `stacker` grows the stack onto the heap.
//! - **WASM targets**: plain passthrough.

/// How much stack must remain free, and how much to add when it doesn't.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StackBudget {
    /// Grow when less than this many bytes remain.
    pub red_zone: usize,
    /// Bytes allocated per growth step.
    pub growth: usize,
}

impl StackBudget {
    /// Budget used for script calls: a 128KB red zone, 2MB segments.
    pub const SCRIPT_CALL: StackBudget = StackBudget {
        red_zone: 128 * 1024,
        growth: 2 * 1024 * 1024,
    };

    /// Run `f`, growing the stack first if the red zone is reached.
    #[inline]
    #[cfg(not(target_arch = "wasm32"))]
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        stacker::maybe_grow(self.red_zone, self.growth, f)
    }

    #[inline]
    #[cfg(target_arch = "wasm32")]
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        f()
    }
}

impl Default for StackBudget {
    fn default() -> Self {
        StackBudget::SCRIPT_CALL
    }
}

/// Run `f` under the default [`StackBudget`].
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    StackBudget::default().run(f)
}

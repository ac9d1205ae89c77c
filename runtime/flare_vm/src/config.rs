//! Interpreter limits and switches.

use std::env;

/// Limits applied to every top-level run.
///
/// The defaults mirror the reference player. Use the builder setters to
/// override individual values:
///
/// ```text
/// let config = VmConfig::default().with_recursion_limit(64);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum nesting of script function calls.
    pub recursion_limit: usize,
    /// Maximum backward branches in one engine invocation.
    pub branch_limit: usize,
    /// `with` nesting allowed up to version 5.
    pub with_depth_legacy: usize,
    /// `with` nesting allowed from version 6.
    pub with_depth: usize,
    /// Drop values a top-level run leaves above its starting stack depth.
    pub enforce_stack_depth: bool,
    /// Treat a truncated action header as an error instead of ending the
    /// buffer quietly.
    pub strict_decoding: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            recursion_limit: 256,
            branch_limit: 65_536,
            with_depth_legacy: 7,
            with_depth: 15,
            enforce_stack_depth: true,
            strict_decoding: false,
        }
    }
}

impl VmConfig {
    #[must_use]
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    #[must_use]
    pub fn with_branch_limit(mut self, limit: usize) -> Self {
        self.branch_limit = limit;
        self
    }

    #[must_use]
    pub fn with_with_depths(mut self, legacy: usize, modern: usize) -> Self {
        self.with_depth_legacy = legacy;
        self.with_depth = modern;
        self
    }

    #[must_use]
    pub fn with_stack_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_stack_depth = enforce;
        self
    }

    #[must_use]
    pub fn with_strict_decoding(mut self, strict: bool) -> Self {
        self.strict_decoding = strict;
        self
    }

    /// `with` depth limit for content of `version`.
    pub fn with_depth_for(&self, version: flare_ir::Version) -> usize {
        if version.get() <= 5 {
            self.with_depth_legacy
        } else {
            self.with_depth
        }
    }

    /// Defaults overridden by `FLARE_RECURSION_LIMIT` and
    /// `FLARE_BRANCH_LIMIT`. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = VmConfig::default();
        if let Some(limit) = read_limit("FLARE_RECURSION_LIMIT") {
            config.recursion_limit = limit;
        }
        if let Some(limit) = read_limit("FLARE_BRANCH_LIMIT") {
            config.branch_limit = limit;
        }
        config
    }
}

fn read_limit(var: &str) -> Option<usize> {
    let raw = env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(limit) => Some(limit),
        Err(err) => {
            tracing::warn!(var, value = %raw, %err, "ignoring invalid limit");
            None
        }
    }
}

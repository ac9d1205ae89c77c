//! The VM: configuration, the global object, and the level table.

use flare_ir::{CodeBuffer, ConstantPool};
use flare_value::{Object, Value};
use rustc_hash::FxHashMap;

use crate::engine::{Context, Engine, Exit};
use crate::function::{self, Completion};
use crate::target::Resolver;
use crate::{Environment, GlobalRegisters, Globals, Host, VmConfig, VmError};

/// Shared, long-lived interpreter state.
///
/// A `Vm` holds nothing that changes while a buffer runs except through
/// interior mutability of its objects, so any number of runs can borrow
/// it at once.
#[derive(Debug)]
pub struct Vm {
    config: VmConfig,
    globals: Globals,
    levels: FxHashMap<u32, Object>,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Vm {
            config,
            globals: Globals::new(),
            levels: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    #[inline]
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Register the root clip of `_level{n}`.
    pub fn set_level(&mut self, n: u32, root: Object) {
        self.levels.insert(n, root);
    }

    pub fn level(&self, n: u32) -> Option<&Object> {
        self.levels.get(&n)
    }

    pub fn remove_level(&mut self, n: u32) -> Option<Object> {
        self.levels.remove(&n)
    }

    /// Run a whole action buffer against `env`.
    ///
    /// Script exceptions nothing catches end the run with
    /// [`VmError::UncaughtException`]. The target is restored and extra
    /// stack values are dropped either way.
    #[tracing::instrument(level = "debug", skip_all, fields(len = code.len(), version = code.version().get()))]
    pub fn run(
        &self,
        code: &CodeBuffer,
        env: &mut Environment,
        registers: &mut GlobalRegisters,
        host: &mut dyn Host,
    ) -> Result<(), VmError> {
        let mut cx = Context::new(self, env, registers, host);
        let engine = Engine::new(
            &mut cx,
            code.clone(),
            ConstantPool::default(),
            0..code.len(),
            Vec::new().into(),
            false,
        );
        match engine.run() {
            Ok(Exit::Finished | Exit::Returned(_)) => Ok(()),
            Ok(Exit::Threw(value)) => {
                tracing::error!(?value, "uncaught exception");
                Err(VmError::UncaughtException(value))
            }
            Err(err) => {
                tracing::error!(%err, "run aborted");
                Err(err)
            }
        }
    }

    /// Call a function value from outside any running buffer, as event
    /// handlers are.
    pub fn call_function(
        &self,
        func: &Value,
        this: Value,
        args: &[Value],
        env: &mut Environment,
        registers: &mut GlobalRegisters,
        host: &mut dyn Host,
    ) -> Result<Value, VmError> {
        let mut cx = Context::new(self, env, registers, host);
        match function::call_value(&mut cx, func, this, args, None)? {
            Completion::Normal(value) => Ok(value),
            Completion::Throw(value) => {
                tracing::error!(?value, "uncaught exception");
                Err(VmError::UncaughtException(value))
            }
        }
    }

    /// Read a variable the way `GetVariable` would at the top level.
    pub fn get_variable(&self, env: &Environment, name: &str) -> Value {
        Resolver::new(self, env, &[], &[]).get_variable(name)
    }

    /// Write a variable the way `SetVariable` would at the top level.
    pub fn set_variable(&self, env: &Environment, name: &str, value: Value) {
        Resolver::new(self, env, &[], &[]).set_variable(name, value);
    }

    /// Resolve a slash, dot, or colon path from the current target.
    pub fn find_object(&self, env: &Environment, path: &str) -> Option<Object> {
        Resolver::new(self, env, &[], &[]).find_object(path)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new(VmConfig::default())
    }
}

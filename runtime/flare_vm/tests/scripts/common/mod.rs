//! Shared helpers for script tests: an assembler and a ready-to-run
//! stage.

mod asm;

pub use asm::{Asm, Catch, Item};

use flare_ir::Version;
use flare_stage::{ClipHandle, Stage, Timeline};
use flare_value::Value;
use flare_vm::{Environment, GlobalRegisters, HeadlessHost, HostEvent, Vm, VmConfig, VmError};

/// A one-level stage plus everything a run needs.
pub struct Player {
    pub vm: Vm,
    pub stage: Stage,
    pub env: Environment,
    pub registers: GlobalRegisters,
    pub host: HeadlessHost,
}

impl Player {
    pub fn new(version: u8) -> Self {
        Self::with_timeline(version, Timeline::new(1))
    }

    pub fn with_timeline(version: u8, timeline: Timeline) -> Self {
        Self::with_config(version, timeline, VmConfig::default())
    }

    pub fn with_config(version: u8, timeline: Timeline, config: VmConfig) -> Self {
        let stage = Stage::new(timeline);
        let mut vm = Vm::new(config);
        vm.set_level(0, stage.root().object.clone());
        let env = Environment::new(Version::new(version), Some(stage.root().object.clone()));
        Player {
            vm,
            stage,
            env,
            registers: GlobalRegisters::new(),
            host: HeadlessHost::default(),
        }
    }

    pub fn root(&self) -> &ClipHandle {
        self.stage.root()
    }

    pub fn version(&self) -> u8 {
        self.env.version().get()
    }

    /// Assemble and run `asm` at this player's version.
    pub fn run(&mut self, asm: Asm) -> Result<(), VmError> {
        let code = asm.build(self.version());
        self.vm
            .run(&code, &mut self.env, &mut self.registers, &mut self.host)
    }

    /// Like [`Player::run`], failing the test on an error.
    pub fn exec(&mut self, asm: Asm) {
        if let Err(err) = self.run(asm) {
            panic!("run failed: {err}");
        }
    }

    pub fn var(&self, name: &str) -> Value {
        self.vm.get_variable(&self.env, name)
    }

    pub fn output(&self) -> &str {
        self.host.trace_output()
    }

    /// Trace lines, without the trailing newline.
    pub fn lines(&self) -> Vec<&str> {
        self.output().lines().collect()
    }

    pub fn events(&self) -> &[HostEvent] {
        self.host.events()
    }
}

/// Assemble a block with the given builder.
pub fn script(build: impl FnOnce(&mut Asm)) -> Asm {
    Asm::block(build)
}

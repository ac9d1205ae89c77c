//! `try`/`catch`/`finally` regions and `with` scopes.
//!
//! A try block owns three consecutive byte ranges. After every action the
//! innermost block checks whether the pc left the range of its current
//! state; leaving `try` or `catch` enters `finally` (when present), and
//! leaving `finally` either resumes where control was headed or completes
//! a pending throw or return.

use std::ops::Range;

use flare_ir::{payload, Action, CatchTarget};
use flare_value::Value;

use super::{Engine, Exit, Flow};
use crate::target::ScopeEntry;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum TryState {
    Try,
    Catch,
    Finally,
}

/// Control transfer held back until `finally` has run.
#[derive(Clone, Debug, PartialEq)]
pub(super) enum Pending {
    Throw(Value),
    Return(Value),
}

#[derive(Clone, Debug)]
pub(super) struct TryBlock {
    try_range: Range<usize>,
    catch_range: Range<usize>,
    finally_range: Range<usize>,
    state: TryState,
    catch: Option<CatchTarget>,
    has_finally: bool,
    pending: Option<Pending>,
    /// Where a branch out of the block was headed.
    resume: Option<usize>,
}

impl TryBlock {
    fn end(&self) -> usize {
        self.finally_range.end
    }

    fn active_range(&self) -> &Range<usize> {
        match self.state {
            TryState::Try => &self.try_range,
            TryState::Catch => &self.catch_range,
            TryState::Finally => &self.finally_range,
        }
    }
}

/// What the innermost block does about the current pc.
enum Step {
    Stay,
    /// Run `finally` from the offset, resuming at the target afterwards.
    EnterFinally(usize, Option<usize>),
    Leave(usize),
    /// Stay in the block, now in another clause.
    Switch(TryState),
    /// Pop the block, then finish `pending` or continue at the offset.
    Complete(Option<Pending>, usize),
}

impl Engine<'_, '_> {
    pub(super) fn op_try(&mut self, action: &Action) -> Flow {
        let header = match payload::read_try(&mut self.code.reader(action)) {
            Ok(header) => header,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad try header");
                return Flow::Continue;
            }
        };
        let try_start = self.next_pc;
        let try_end = try_start.saturating_add(usize::from(header.try_size));
        let catch_end = try_end.saturating_add(usize::from(header.catch_size));
        let finally_end = catch_end.saturating_add(usize::from(header.finally_size));
        if finally_end > self.stop_pc {
            tracing::warn!(
                target: "flare::malformed",
                pc = action.pc,
                end = finally_end,
                stop = self.stop_pc,
                "try block runs past its buffer"
            );
        }
        self.try_blocks.push(TryBlock {
            try_range: try_start..try_end,
            catch_range: try_end..catch_end,
            finally_range: catch_end..finally_end,
            state: TryState::Try,
            catch: header.has_catch().then_some(header.catch_target.clone()),
            has_finally: header.has_finally(),
            pending: None,
            resume: None,
        });
        Flow::Continue
    }

    fn next_step(&self) -> Step {
        let Some(block) = self.try_blocks.last() else {
            return Step::Stay;
        };
        let pc = self.pc;
        if block.active_range().contains(&pc) {
            return Step::Stay;
        }
        match block.state {
            TryState::Try | TryState::Catch => {
                let natural_end = block.active_range().end;
                if pc != natural_end && (block.try_range.start..block.end()).contains(&pc) {
                    // A branch to another clause of the same block.
                    if block.finally_range.contains(&pc) {
                        return Step::EnterFinally(pc, block.resume);
                    }
                    let state = if block.catch_range.contains(&pc) {
                        TryState::Catch
                    } else {
                        TryState::Try
                    };
                    return Step::Switch(state);
                }
                let resume = (pc != natural_end).then_some(pc).or(block.resume);
                if block.has_finally {
                    Step::EnterFinally(block.finally_range.start, resume)
                } else {
                    Step::Leave(resume.unwrap_or(block.end()))
                }
            }
            TryState::Finally => {
                let target = if pc == block.finally_range.end {
                    block.resume.unwrap_or(pc)
                } else {
                    pc
                };
                Step::Complete(block.pending.clone(), target)
            }
        }
    }

    /// Advance the try stack after an action. Returns an exit when a
    /// pending throw or return leaves the invocation.
    pub(super) fn process_try_blocks(&mut self) -> Option<Exit> {
        loop {
            match self.next_step() {
                Step::Stay => return None,
                Step::EnterFinally(start, resume) => {
                    if let Some(block) = self.try_blocks.last_mut() {
                        block.state = TryState::Finally;
                        block.resume = resume;
                    }
                    self.pc = start;
                }
                Step::Switch(state) => {
                    if let Some(block) = self.try_blocks.last_mut() {
                        block.state = state;
                    }
                }
                Step::Leave(target) => {
                    self.try_blocks.pop();
                    self.pc = target;
                }
                Step::Complete(pending, target) => {
                    self.try_blocks.pop();
                    match pending {
                        Some(Pending::Throw(value)) => {
                            if let Some(exit) = self.unwind_throw(value) {
                                return Some(exit);
                            }
                        }
                        Some(Pending::Return(value)) => {
                            if let Some(exit) = self.unwind_return(value) {
                                return Some(exit);
                            }
                        }
                        None => self.pc = target,
                    }
                }
            }
        }
    }

    /// Route a thrown value to the nearest handler.
    pub(super) fn unwind_throw(&mut self, value: Value) -> Option<Exit> {
        loop {
            let Some(block) = self.try_blocks.last_mut() else {
                return Some(Exit::Threw(value));
            };
            match block.state {
                TryState::Try if block.catch.is_some() => {
                    let target = block.catch.clone();
                    block.state = TryState::Catch;
                    self.pc = block.catch_range.start;
                    if let Some(target) = target {
                        self.bind_caught(&target, value);
                    }
                    return None;
                }
                TryState::Try | TryState::Catch if block.has_finally => {
                    block.pending = Some(Pending::Throw(value));
                    block.state = TryState::Finally;
                    self.pc = block.finally_range.start;
                    return None;
                }
                _ => {
                    self.try_blocks.pop();
                }
            }
        }
    }

    /// Route a return through any `finally` clauses.
    pub(super) fn unwind_return(&mut self, value: Value) -> Option<Exit> {
        loop {
            let Some(block) = self.try_blocks.last_mut() else {
                return Some(Exit::Returned(value));
            };
            match block.state {
                TryState::Try | TryState::Catch if block.has_finally => {
                    block.pending = Some(Pending::Return(value));
                    block.state = TryState::Finally;
                    self.pc = block.finally_range.start;
                    return None;
                }
                _ => {
                    self.try_blocks.pop();
                }
            }
        }
    }

    fn bind_caught(&mut self, target: &CatchTarget, value: Value) {
        match target {
            CatchTarget::Register(index) => {
                self.cx.env.set_register(self.cx.registers, *index, value);
            }
            CatchTarget::Name(name) => self.set_local_variable(name, value),
        }
    }

    pub(super) fn op_with(&mut self, action: &Action) -> Flow {
        let scope = self.cx.env.pop();
        if action.payload_len() != 2 {
            tracing::warn!(
                target: "flare::malformed",
                pc = action.pc,
                len = action.payload_len(),
                "with payload is not two bytes"
            );
            return Flow::Continue;
        }
        let block_len = match self.code.reader(action).u16() {
            Ok(len) => usize::from(len),
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad with header");
                return Flow::Continue;
            }
        };
        if block_len == 0 {
            tracing::warn!(target: "flare::malformed", pc = action.pc, "empty with block");
            return Flow::Continue;
        }
        let start = self.next_pc;
        let end = start.saturating_add(block_len);
        if end > self.stop_pc {
            tracing::warn!(target: "flare::malformed", pc = action.pc, end, "with block runs past its buffer");
        }

        let Value::Object(object) = scope else {
            tracing::warn!(target: "flare::coding", ?scope, "with on a non-object skips its block");
            return Flow::Branch(end);
        };
        let limit = self.cx.vm.config().with_depth_for(self.version());
        if self.scopes.len() >= limit {
            tracing::warn!(target: "flare::coding", limit, "with stack limit exceeded, skipping block");
            return Flow::Branch(end);
        }
        self.scopes.push(ScopeEntry {
            object,
            range: start..end,
        });
        Flow::Continue
    }
}

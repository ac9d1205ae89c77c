//! The action interpreter.
//!
//! An [`Engine`] runs one contiguous range of a [`CodeBuffer`]: a whole
//! top-level buffer, a closure body, or the actions of a called frame.
//! Nested calls build a fresh engine over the same [`Context`], so the
//! native stack mirrors the script call stack (guarded by
//! `flare_stack`).
//!
//! # Control flow
//!
//! Every handler returns a [`Flow`]. `Continue` and `Branch` move the pc;
//! `Return` and `Throw` are routed through the try stack (see `blocks`)
//! before they leave the engine as an [`Exit`].
//!
//! # Handler modules
//!
//! - `arith`: numeric, bitwise, and logical operators
//! - `compare`: equality and ordering
//! - `strings`: string opcodes, including the multibyte ones
//! - `stack`: push data, registers, the constant pool
//! - `variables`: variables, locals, deletion, enumeration, targets
//! - `objects`: members, calls, construction, functions, prototypes
//! - `timeline`: frame control and display properties
//! - `control`: branches, `with`, `try`, and host services

mod arith;
mod blocks;
mod compare;
mod control;
mod objects;
mod stack;
mod strings;
mod timeline;
mod variables;

use std::ops::Range;
use std::rc::Rc;

use flare_ir::{disasm, Action, CodeBuffer, ConstantPool, Opcode, Version};
use flare_value::{DisplayObject, NameCase, Object, PrimitiveHint, Value};
use smallvec::SmallVec;
use tracing::Level;

use crate::function::{self, Completion};
use crate::target::{Resolver, ScopeEntry};
use crate::{Environment, GlobalRegisters, Host, LimitKind, Vm, VmError};

use blocks::TryBlock;

/// What a handler asks the engine to do next.
#[derive(Clone, Debug, PartialEq)]
pub enum Flow {
    /// Fall through to the next action.
    Continue,
    /// Jump to an absolute offset.
    Branch(usize),
    /// Leave the current invocation with a value.
    Return(Value),
    /// Raise a script exception.
    Throw(Value),
    /// End the current invocation (`End`).
    Stop,
}

/// How an engine invocation ended.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Exit {
    /// Ran off the end of its range or hit `End`.
    Finished,
    Returned(Value),
    /// An exception no try block caught.
    Threw(Value),
}

/// Everything an engine runs against.
pub(crate) struct Context<'a> {
    pub vm: &'a Vm,
    pub env: &'a mut Environment,
    pub registers: &'a mut GlobalRegisters,
    pub host: &'a mut dyn Host,
    /// Frame scripts entered through `Call` and still running.
    pub frame_calls: usize,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        vm: &'a Vm,
        env: &'a mut Environment,
        registers: &'a mut GlobalRegisters,
        host: &'a mut dyn Host,
    ) -> Self {
        Context {
            vm,
            env,
            registers,
            host,
            frame_calls: 0,
        }
    }
}

/// Arguments popped for a call.
pub(crate) type Args = SmallVec<[Value; 8]>;

/// One running action range.
pub(crate) struct Engine<'c, 'a> {
    cx: &'c mut Context<'a>,
    code: CodeBuffer,
    pool: ConstantPool,
    pc: usize,
    next_pc: usize,
    stop_pc: usize,
    /// Captured closure scope, plus the activation object from version 6.
    base: Rc<[Object]>,
    scopes: Vec<ScopeEntry>,
    try_blocks: Vec<TryBlock>,
    branches: usize,
    /// Running a function body rather than timeline code.
    function: bool,
}

impl<'c, 'a> Engine<'c, 'a> {
    pub(crate) fn new(
        cx: &'c mut Context<'a>,
        code: CodeBuffer,
        pool: ConstantPool,
        range: Range<usize>,
        base: Rc<[Object]>,
        function: bool,
    ) -> Self {
        let stop_pc = range.end.min(code.len());
        Engine {
            cx,
            code,
            pool,
            pc: range.start,
            next_pc: range.start,
            stop_pc,
            base,
            scopes: Vec::new(),
            try_blocks: Vec::new(),
            branches: 0,
            function,
        }
    }

    /// Run to completion, then restore the target and rebalance the stack.
    #[tracing::instrument(level = "debug", skip_all, fields(start = self.pc, stop = self.stop_pc))]
    pub(crate) fn run(mut self) -> Result<Exit, VmError> {
        let initial_depth = self.cx.env.stack_size();
        let saved_target = self.cx.env.target().cloned();
        let result = self.execute();
        self.cx.env.set_target(saved_target);
        self.cleanup_stack(initial_depth);
        result
    }

    fn cleanup_stack(&mut self, initial_depth: usize) {
        let depth = self.cx.env.stack_size();
        if depth > initial_depth {
            if self.cx.vm.config().enforce_stack_depth {
                tracing::debug!(
                    target: "flare::malformed",
                    left = depth - initial_depth,
                    "dropping values left on the stack"
                );
                self.cx.env.truncate_stack(initial_depth);
            }
        } else if depth < initial_depth {
            tracing::warn!(
                target: "flare::malformed",
                missing = initial_depth - depth,
                "action buffer consumed values it did not push"
            );
        }
    }

    fn execute(&mut self) -> Result<Exit, VmError> {
        // Timeline code stops once the clip it started on is unloaded.
        let guarded = if self.function {
            None
        } else {
            self.cx.env.target().cloned()
        };
        while self.pc < self.stop_pc {
            self.pop_expired_scopes();

            let action = match self.code.decode(self.pc) {
                Ok(action) => action,
                Err(err) => {
                    if self.cx.vm.config().strict_decoding {
                        return Err(err.into());
                    }
                    tracing::warn!(target: "flare::malformed", pc = self.pc, %err, "ending action buffer");
                    break;
                }
            };
            if action.next_pc > self.stop_pc {
                tracing::warn!(
                    target: "flare::malformed",
                    pc = action.pc,
                    end = action.next_pc,
                    stop = self.stop_pc,
                    "action runs past the end of its block"
                );
                break;
            }
            self.next_pc = action.next_pc;

            if tracing::enabled!(target: "flare::actions", Level::TRACE) {
                tracing::trace!(
                    target: "flare::actions",
                    stack = self.cx.env.stack_size(),
                    "{}",
                    disasm::describe(&self.code, &action)
                );
            }

            match self.dispatch(&action)? {
                Flow::Continue => self.pc = self.next_pc,
                Flow::Branch(target) => self.branch(&action, target)?,
                Flow::Stop => return Ok(Exit::Finished),
                Flow::Return(value) => {
                    if let Some(exit) = self.unwind_return(value) {
                        return Ok(exit);
                    }
                }
                Flow::Throw(value) => {
                    if let Some(exit) = self.unwind_throw(value) {
                        return Ok(exit);
                    }
                }
            }

            if let Some(exit) = self.process_try_blocks() {
                return Ok(exit);
            }
            if guarded
                .as_ref()
                .and_then(Object::display)
                .is_some_and(DisplayObject::is_unloaded)
            {
                tracing::debug!(pc = self.pc, "target unloaded, dropping the rest of the buffer");
                return Ok(Exit::Finished);
            }
        }
        Ok(Exit::Finished)
    }

    fn branch(&mut self, action: &Action, target: usize) -> Result<(), VmError> {
        if target <= action.pc {
            self.branches = self.branches.saturating_add(1);
            let limit = self.cx.vm.config().branch_limit;
            if self.branches > limit {
                tracing::error!(pc = action.pc, limit, "backward branch limit exceeded");
                return Err(VmError::limit(LimitKind::Branches, limit));
            }
        }
        self.pc = target;
        Ok(())
    }

    fn pop_expired_scopes(&mut self) {
        while self
            .scopes
            .last()
            .is_some_and(|entry| !entry.range.contains(&self.pc))
        {
            self.scopes.pop();
        }
    }

    /// Advance over the `count` actions after the current one.
    fn skip_actions(&self, count: u8) -> Flow {
        let mut pc = self.next_pc;
        for _ in 0..count {
            if pc >= self.stop_pc {
                break;
            }
            match self.code.decode(pc) {
                Ok(action) => pc = action.next_pc,
                Err(err) => {
                    tracing::warn!(target: "flare::malformed", pc, %err, "skip ran into a bad action");
                    pc = self.stop_pc;
                    break;
                }
            }
        }
        Flow::Branch(pc.min(self.stop_pc))
    }
}

// Shared helpers

impl Engine<'_, '_> {
    #[inline]
    fn version(&self) -> Version {
        self.cx.env.version()
    }

    #[inline]
    fn case(&self) -> NameCase {
        self.cx.env.case()
    }

    /// Push a boolean result: `1`/`0` before version 5.
    fn push_bool(&mut self, b: bool) {
        let value = Value::legacy_bool(b, self.version().legacy_booleans());
        self.cx.env.push(value);
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.cx.vm, &*self.cx.env, &self.base, &self.scopes)
    }

    /// The scope chain a closure defined here captures, outermost first.
    fn capture_scope(&self) -> Rc<[Object]> {
        self.base
            .iter()
            .cloned()
            .chain(self.scopes.iter().map(|entry| entry.object.clone()))
            .collect()
    }

    /// `this` for calls that do not name an owner.
    fn default_this(&self) -> Value {
        match self.cx.env.frame() {
            Some(frame) => frame.this.clone(),
            None => self
                .cx
                .env
                .original_target()
                .cloned()
                .map_or(Value::Undefined, Value::Object),
        }
    }

    /// Pop a count and then that many values, first popped first.
    fn pop_args(&mut self) -> Args {
        let requested = self.cx.env.pop().to_int(self.version());
        let available = self.cx.env.stack_size();
        let count = match usize::try_from(requested) {
            Ok(count) if count <= available => count,
            Ok(count) => {
                tracing::warn!(
                    target: "flare::malformed",
                    requested = count,
                    available,
                    "argument count exceeds stack"
                );
                available
            }
            Err(_) => {
                tracing::warn!(target: "flare::malformed", requested, "negative argument count");
                0
            }
        };
        (0..count).map(|_| self.cx.env.pop()).collect()
    }

    /// Primitive conversion that also runs script-defined `valueOf` and
    /// `toString` methods.
    fn to_primitive(&mut self, value: &Value, hint: PrimitiveHint) -> Result<Option<Value>, VmError> {
        let Value::Object(obj) = value else {
            return Ok(Some(value.clone()));
        };
        if obj.display().is_none() {
            let order: &[&str] = match hint {
                PrimitiveHint::Number => &["valueOf"],
                PrimitiveHint::String => &["toString", "valueOf"],
            };
            let case = self.case();
            for name in order {
                let Some(method) = obj
                    .get_member(name, case)
                    .and_then(|v| v.as_object().cloned())
                    .filter(Object::is_function)
                else {
                    continue;
                };
                if method.closure().is_none() {
                    break;
                }
                match function::call(self.cx, &method, value.clone(), &[], None)? {
                    Completion::Normal(result) if result.is_primitive() => return Ok(Some(result)),
                    Completion::Normal(_) => {}
                    Completion::Throw(thrown) => {
                        tracing::warn!(target: "flare::coding", name, ?thrown, "conversion method threw");
                        return Ok(None);
                    }
                }
            }
        }
        Ok(value.to_primitive(hint, self.version()))
    }

    fn to_number(&mut self, value: &Value) -> Result<f64, VmError> {
        if value.is_object() {
            if let Some(prim) = self.to_primitive(value, PrimitiveHint::Number)? {
                if prim.is_primitive() {
                    return Ok(prim.to_number(self.version()));
                }
            }
        }
        Ok(value.to_number(self.version()))
    }

    fn to_string(&mut self, value: &Value) -> Result<Rc<str>, VmError> {
        if value.is_object() && value.as_display_object().is_none() {
            if let Some(prim) = self.to_primitive(value, PrimitiveHint::String)? {
                if prim.is_primitive() {
                    return Ok(prim.to_string(self.version()));
                }
            }
        }
        Ok(value.to_string(self.version()))
    }

    fn pop_number(&mut self) -> Result<f64, VmError> {
        let value = self.cx.env.pop();
        self.to_number(&value)
    }

    fn pop_string(&mut self) -> Result<Rc<str>, VmError> {
        let value = self.cx.env.pop();
        self.to_string(&value)
    }

    /// Turn a call result into the flow of the calling action.
    fn push_completion(&mut self, completion: Completion) -> Flow {
        match completion {
            Completion::Normal(value) => {
                self.cx.env.push(value);
                Flow::Continue
            }
            Completion::Throw(value) => Flow::Throw(value),
        }
    }
}

// Dispatch

impl Engine<'_, '_> {
    fn dispatch(&mut self, action: &Action) -> Result<Flow, VmError> {
        let flow = match action.opcode {
            // Timeline
            Opcode::End => Flow::Stop,
            Opcode::NextFrame => self.op_next_frame(),
            Opcode::PrevFrame => self.op_prev_frame(),
            Opcode::Play => self.op_play(),
            Opcode::Stop => self.op_stop(),
            Opcode::GotoFrame => self.op_goto_frame(action),
            Opcode::GotoLabel => self.op_goto_label(action),
            Opcode::GotoFrame2 => self.op_goto_frame2(action)?,
            Opcode::WaitForFrame => self.op_wait_for_frame(action),
            Opcode::WaitForFrame2 => self.op_wait_for_frame2(action)?,
            Opcode::GetProperty => self.op_get_property()?,
            Opcode::SetProperty => self.op_set_property()?,
            Opcode::CloneSprite => self.op_clone_sprite()?,
            Opcode::RemoveSprite => self.op_remove_sprite()?,
            Opcode::StartDrag => self.op_start_drag()?,
            Opcode::EndDrag => self.op_end_drag(),
            Opcode::Call => self.op_call()?,

            // Arithmetic and logic
            Opcode::Add => self.op_numeric(|a, b| a + b)?,
            Opcode::Subtract => self.op_numeric(|a, b| a - b)?,
            Opcode::Multiply => self.op_numeric(|a, b| a * b)?,
            Opcode::Divide => self.op_divide()?,
            Opcode::Modulo => self.op_numeric(|a, b| a % b)?,
            Opcode::Add2 => self.op_add2()?,
            Opcode::Increment => self.op_step(1.0)?,
            Opcode::Decrement => self.op_step(-1.0)?,
            Opcode::And => self.op_logical(|a, b| a && b),
            Opcode::Or => self.op_logical(|a, b| a || b),
            Opcode::Not => self.op_not(),
            Opcode::BitAnd => self.op_bitwise(|a, b| a & b)?,
            Opcode::BitOr => self.op_bitwise(|a, b| a | b)?,
            Opcode::BitXor => self.op_bitwise(|a, b| a ^ b)?,
            Opcode::BitLShift => self.op_shift_left()?,
            Opcode::BitRShift => self.op_shift_right()?,
            Opcode::BitURShift => self.op_shift_right_unsigned()?,
            Opcode::ToInteger => self.op_to_integer()?,
            Opcode::ToNumber => self.op_to_number()?,

            // Comparison
            Opcode::Equals => self.op_legacy_compare(|a, b| a == b)?,
            Opcode::Less => self.op_legacy_compare(|a, b| a < b)?,
            Opcode::Equals2 => self.op_equals2()?,
            Opcode::StrictEquals => self.op_strict_equals(),
            Opcode::Less2 => self.op_less2(false)?,
            Opcode::Greater => self.op_less2(true)?,
            Opcode::StringEquals => self.op_string_compare(|a, b| a == b)?,
            Opcode::StringLess => self.op_string_compare(|a, b| a < b)?,
            Opcode::StringGreater => self.op_string_compare(|a, b| a > b)?,

            // Strings
            Opcode::StringLength => self.op_string_length(false)?,
            Opcode::MbStringLength => self.op_string_length(true)?,
            Opcode::StringExtract | Opcode::MbStringExtract => self.op_string_extract()?,
            Opcode::StringAdd => self.op_string_add()?,
            Opcode::CharToAscii | Opcode::MbCharToAscii => self.op_char_to_code()?,
            Opcode::AsciiToChar => self.op_code_to_char(false)?,
            Opcode::MbAsciiToChar => self.op_code_to_char(true)?,
            Opcode::ToString => self.op_to_string()?,

            // Stack and registers
            Opcode::Push => self.op_push(action),
            Opcode::Pop => self.op_pop(),
            Opcode::PushDuplicate => self.op_push_duplicate(),
            Opcode::StackSwap => self.op_stack_swap(),
            Opcode::StoreRegister => self.op_store_register(action),
            Opcode::ConstantPool => self.op_constant_pool(action),

            // Variables and targets
            Opcode::GetVariable => self.op_get_variable()?,
            Opcode::SetVariable => self.op_set_variable()?,
            Opcode::DefineLocal => self.op_define_local()?,
            Opcode::DefineLocal2 => self.op_declare_local()?,
            Opcode::Delete => self.op_delete()?,
            Opcode::Delete2 => self.op_delete2()?,
            Opcode::Enumerate => self.op_enumerate()?,
            Opcode::Enumerate2 => self.op_enumerate2(),
            Opcode::SetTarget => self.op_set_target(action),
            Opcode::SetTarget2 => self.op_set_target2()?,
            Opcode::TargetPath => self.op_target_path(),

            // Objects and functions
            Opcode::GetMember => self.op_get_member()?,
            Opcode::SetMember => self.op_set_member()?,
            Opcode::InitArray => self.op_init_array(),
            Opcode::InitObject => self.op_init_object()?,
            Opcode::NewObject => self.op_new_object()?,
            Opcode::NewMethod => self.op_new_method()?,
            Opcode::CallFunction => self.op_call_function()?,
            Opcode::CallMethod => self.op_call_method()?,
            Opcode::DefineFunction | Opcode::DefineFunction2 => self.op_define_function(action),
            Opcode::Return => Flow::Return(self.cx.env.pop()),
            Opcode::TypeOf => self.op_type_of(),
            Opcode::InstanceOf => self.op_instance_of(),
            Opcode::Extends => self.op_extends(),
            Opcode::CastOp => self.op_cast(),
            Opcode::ImplementsOp => self.op_implements(),

            // Control and host services
            Opcode::Jump => self.op_jump(action),
            Opcode::If => self.op_if(action),
            Opcode::With => self.op_with(action),
            Opcode::Try => self.op_try(action),
            Opcode::Throw => Flow::Throw(self.cx.env.pop()),
            Opcode::Trace => self.op_trace()?,
            Opcode::GetTime => self.op_get_time(),
            Opcode::RandomNumber => self.op_random_number(),
            Opcode::GetUrl => self.op_get_url(action),
            Opcode::GetUrl2 => self.op_get_url2(action)?,
            Opcode::FsCommand2 => self.op_fs_command2()?,
            Opcode::ToggleQuality => {
                self.cx.host.toggle_quality();
                Flow::Continue
            }
            Opcode::StopSounds => {
                self.cx.host.stop_sounds();
                Flow::Continue
            }

            Opcode::Unsupported(byte) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, opcode = byte, "unsupported action");
                Flow::Continue
            }
        };
        Ok(flow)
    }
}

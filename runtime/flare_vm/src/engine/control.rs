//! Branches and host services.

use flare_ir::{payload, Action};
use flare_value::Value;

use super::{Engine, Flow};
use crate::{SendVars, UrlRequest, VmError};

/// URLs with this prefix are routed to the host's `fscommand` handler.
const FS_COMMAND_PREFIX: &str = "FSCommand:";

impl Engine<'_, '_> {
    /// Absolute target of a relative branch operand.
    fn branch_target(&self, action: &Action) -> Option<usize> {
        let offset = match self.code.reader(action).i16() {
            Ok(offset) => offset,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad branch operand");
                return None;
            }
        };
        let target = i64::try_from(self.next_pc)
            .ok()
            .map(|next| next.saturating_add(i64::from(offset)));
        match target.and_then(|t| usize::try_from(t).ok()) {
            Some(target) => {
                if target > self.stop_pc {
                    tracing::warn!(
                        target: "flare::malformed",
                        pc = action.pc,
                        target,
                        stop = self.stop_pc,
                        "branch past the end of the buffer"
                    );
                }
                Some(target)
            }
            None => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, offset, "branch before the start of the buffer");
                None
            }
        }
    }

    pub(super) fn op_jump(&mut self, action: &Action) -> Flow {
        self.branch_target(action).map_or(Flow::Continue, Flow::Branch)
    }

    pub(super) fn op_if(&mut self, action: &Action) -> Flow {
        let condition = self.cx.env.pop().to_bool(self.version());
        if !condition {
            return Flow::Continue;
        }
        self.branch_target(action).map_or(Flow::Continue, Flow::Branch)
    }

    pub(super) fn op_trace(&mut self) -> Result<Flow, VmError> {
        let message = self.pop_string()?;
        self.cx.host.trace(&message);
        Ok(Flow::Continue)
    }

    pub(super) fn op_get_time(&mut self) -> Flow {
        #[allow(clippy::cast_precision_loss)]
        let ms = self.cx.host.time_ms() as f64;
        self.cx.env.push(ms);
        Flow::Continue
    }

    /// `random(max)`: an integer in `0..max`, with `max` at least 1.
    pub(super) fn op_random_number(&mut self) -> Flow {
        let max = self.cx.env.pop().to_int(self.version());
        let max = u32::try_from(max).unwrap_or(0).max(1);
        let value = self.cx.host.random(max);
        self.cx.env.push(f64::from(value));
        Flow::Continue
    }

    /// Shared tail of `GetURL` and `GetURL2`.
    fn request_url(&mut self, url: &str, target: &str, flags: u8) {
        if url.is_empty() {
            tracing::warn!(target: "flare::coding", target, "GetURL with an empty url");
            return;
        }
        if let Some(command) = url.strip_prefix(FS_COMMAND_PREFIX) {
            self.cx.host.fs_command(command, &[target.to_owned()]);
            return;
        }
        let method = match flags & 0x03 {
            1 | 3 => SendVars::Get,
            2 => SendVars::Post,
            _ => SendVars::None,
        };
        let request = UrlRequest {
            url: url.to_owned(),
            target: target.to_owned(),
            method,
            load_target: flags & 0x40 != 0,
            load_variables: flags & 0x80 != 0,
        };
        tracing::debug!(?request, "url request");
        self.cx.host.get_url(request);
    }

    pub(super) fn op_get_url(&mut self, action: &Action) -> Flow {
        match payload::read_url(&mut self.code.reader(action)) {
            Ok(args) => self.request_url(&args.url, &args.target, 0),
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad GetURL operand");
            }
        }
        Flow::Continue
    }

    pub(super) fn op_get_url2(&mut self, action: &Action) -> Result<Flow, VmError> {
        let flags = self.code.reader(action).u8();
        let target = self.pop_string()?;
        let url = self.cx.env.pop();
        let flags = match flags {
            Ok(flags) => flags,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad GetURL2 operand");
                return Ok(Flow::Continue);
            }
        };
        if url.is_undefined() {
            tracing::warn!(target: "flare::coding", %target, "GetURL2 with an undefined url");
            return Ok(Flow::Continue);
        }
        let url = self.to_string(&url)?;
        self.request_url(&url, &target, flags);
        Ok(Flow::Continue)
    }

    /// `fscommand2(command, args...)`. The operands stay on the stack.
    pub(super) fn op_fs_command2(&mut self) -> Result<Flow, VmError> {
        let version = self.version();
        let count = self.cx.env.top(0).to_int(version);
        let command = self.cx.env.top(1);
        let command = self.to_string(&command)?;
        let extra = usize::try_from(count).unwrap_or(0).saturating_sub(1);
        let available = self.cx.env.stack_size().saturating_sub(2);
        let mut args = Vec::with_capacity(extra.min(available));
        for n in 0..extra.min(available) {
            let value: Value = self.cx.env.top(n.saturating_add(2));
            args.push(self.to_string(&value)?.to_string());
        }
        tracing::debug!(%command, args = args.len(), "fscommand2");
        self.cx.host.fs_command(&command, &args);
        Ok(Flow::Continue)
    }
}

//! String opcodes.
//!
//! Before version 6 strings are byte strings; `StringLength` counts the
//! bytes a character would take in the file encoding, and `AsciiToChar`
//! works on single bytes. The `Mb*` forms always count characters.

use flare_value::Value;

use super::{Engine, Flow};
use crate::VmError;

/// Length of `text` in the file encoding of pre-version-6 content.
pub(super) fn legacy_byte_len(text: &str) -> usize {
    text.chars()
        .map(|c| if u32::from(c) <= 0xFF { 1 } else { c.len_utf8() })
        .sum()
}

/// `substring(text, start, size)` with 1-based `start`.
///
/// A negative `size` takes the rest of the string; a `start` below 1 is
/// treated as 1.
pub(crate) fn substring(text: &str, start: i32, size: i32) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if size == 0 || len == 0 {
        return String::new();
    }
    let start = usize::try_from(start).unwrap_or(0).max(1);
    if start > len {
        return String::new();
    }
    let available = len - start + 1;
    let size = usize::try_from(size).map_or(available, |size| size.min(available));
    chars
        .get(start - 1..start - 1 + size)
        .map(|slice| slice.iter().collect())
        .unwrap_or_default()
}

impl Engine<'_, '_> {
    pub(super) fn op_string_length(&mut self, multibyte: bool) -> Result<Flow, VmError> {
        let text = self.pop_string()?;
        let len = if multibyte || self.version().multibyte() {
            text.chars().count()
        } else {
            legacy_byte_len(&text)
        };
        self.cx.env.push(Value::from_usize(len));
        Ok(Flow::Continue)
    }

    pub(super) fn op_string_extract(&mut self) -> Result<Flow, VmError> {
        let version = self.version();
        let size = self.cx.env.pop().to_int(version);
        let start = self.cx.env.pop().to_int(version);
        let source = self.cx.env.pop();
        if source.is_nullish() {
            tracing::warn!(target: "flare::coding", "substring of undefined");
            self.cx.env.push(Value::Undefined);
            return Ok(Flow::Continue);
        }
        let text = self.to_string(&source)?;
        self.cx.env.push(substring(&text, start, size));
        Ok(Flow::Continue)
    }

    pub(super) fn op_string_add(&mut self) -> Result<Flow, VmError> {
        let b = self.pop_string()?;
        let a = self.pop_string()?;
        let mut joined = String::with_capacity(a.len() + b.len());
        joined.push_str(&a);
        joined.push_str(&b);
        self.cx.env.push(joined);
        Ok(Flow::Continue)
    }

    /// `ord`/`mbord`: code of the first character, `0` for "".
    pub(super) fn op_char_to_code(&mut self) -> Result<Flow, VmError> {
        let text = self.pop_string()?;
        let code = text.chars().next().map_or(0, u32::from);
        self.cx.env.push(f64::from(code));
        Ok(Flow::Continue)
    }

    /// `chr`/`mbchr`. Code 0 gives the empty string.
    pub(super) fn op_code_to_char(&mut self, multibyte: bool) -> Result<Flow, VmError> {
        let n = self.pop_number()?;
        let code = Value::Number(n).to_int(self.version());
        let wide = multibyte || self.version().multibyte();
        let code = if wide {
            u32::try_from(code & 0xFFFF).unwrap_or(0)
        } else {
            u32::try_from(code & 0xFF).unwrap_or(0)
        };
        let text = match char::from_u32(code) {
            Some(c) if code != 0 => c.to_string(),
            _ => String::new(),
        };
        self.cx.env.push(text);
        Ok(Flow::Continue)
    }

    pub(super) fn op_to_string(&mut self) -> Result<Flow, VmError> {
        let text = self.pop_string()?;
        self.cx.env.push(Value::String(text));
        Ok(Flow::Continue)
    }
}

//! Code buffers, constant pools, and action framing.
//!
//! A [`CodeBuffer`] is the unit the host hands to the engine: one tag's
//! worth of action bytes plus the version they were authored for. The
//! buffer is cheap to clone (the bytes are shared) so closures can keep
//! a handle to the buffer that defined them.

use std::ops::Range;
use std::rc::Rc;

use crate::{DecodeError, Opcode, Version};

/// An immutable run of action bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeBuffer {
    bytes: Rc<[u8]>,
    version: Version,
}

impl CodeBuffer {
    pub fn new(bytes: impl Into<Rc<[u8]>>, version: Version) -> Self {
        CodeBuffer {
            bytes: bytes.into(),
            version,
        }
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode the action header at `pc`.
    ///
    /// Only the framing is decoded here; the payload is read lazily by the
    /// handler through [`CodeBuffer::payload`]. A payload length that runs
    /// past the end of the buffer is reported as [`DecodeError::Truncated`].
    pub fn decode(&self, pc: usize) -> Result<Action, DecodeError> {
        let Some(&byte) = self.bytes.get(pc) else {
            return Err(DecodeError::UnexpectedEnd { offset: pc });
        };
        let opcode = Opcode::from_byte(byte);
        let header_end = pc.saturating_add(1);
        if !opcode.has_payload() {
            return Ok(Action {
                opcode,
                pc,
                payload: header_end..header_end,
                next_pc: header_end,
            });
        }

        let len_bytes = self
            .bytes
            .get(header_end..header_end.saturating_add(2))
            .ok_or(DecodeError::UnexpectedEnd { offset: header_end })?;
        let len = usize::from(u16::from_le_bytes([len_bytes[0], len_bytes[1]]));
        let start = header_end.saturating_add(2);
        let end = start.saturating_add(len);
        if end > self.bytes.len() {
            return Err(DecodeError::Truncated {
                pc,
                len,
                available: self.bytes.len().saturating_sub(start),
            });
        }
        Ok(Action {
            opcode,
            pc,
            payload: start..end,
            next_pc: end,
        })
    }

    /// The payload bytes of a decoded action.
    #[inline]
    pub fn payload(&self, action: &Action) -> &[u8] {
        self.bytes.get(action.payload.clone()).unwrap_or_default()
    }

    /// A reader positioned at the start of an action's payload.
    #[inline]
    pub fn reader(&self, action: &Action) -> ByteReader<'_> {
        ByteReader::new(self.payload(action), action.payload.start, self.version)
    }

    /// Iterate over the actions in `range`, stopping at the first framing
    /// error.
    pub fn actions(&self, range: Range<usize>) -> Actions<'_> {
        Actions {
            buffer: self,
            pc: range.start,
            stop: range.end.min(self.len()),
        }
    }
}

/// One framed action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub opcode: Opcode,
    /// Offset of the opcode byte.
    pub pc: usize,
    /// Absolute byte range of the payload (empty for short opcodes).
    pub payload: Range<usize>,
    /// Offset of the next action.
    pub next_pc: usize,
}

impl Action {
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Iterator returned by [`CodeBuffer::actions`].
pub struct Actions<'a> {
    buffer: &'a CodeBuffer,
    pc: usize,
    stop: usize,
}

impl Iterator for Actions<'_> {
    type Item = Result<Action, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pc >= self.stop {
            return None;
        }
        match self.buffer.decode(self.pc) {
            Ok(action) => {
                self.pc = action.next_pc;
                Some(Ok(action))
            }
            Err(err) => {
                self.pc = self.stop;
                Some(Err(err))
            }
        }
    }
}

/// The string table declared by a `ConstantPool` action.
///
/// Entries are shared `Rc<str>` so pushing a pool entry never copies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Rc<[Rc<str>]>,
}

impl ConstantPool {
    pub fn new(entries: Vec<Rc<str>>) -> Self {
        ConstantPool {
            entries: entries.into(),
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Rc<str>> {
        self.entries.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<str>> {
        self.entries.iter()
    }
}

/// Little-endian cursor over one payload.
///
/// Offsets in errors are absolute buffer offsets so log lines can be
/// matched against a disassembly.
#[derive(Clone, Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
    version: Version,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8], base: usize, version: Version) -> Self {
        ByteReader {
            bytes,
            pos: 0,
            base,
            version,
        }
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Absolute offset of the next unread byte.
    #[inline]
    pub fn offset(&self) -> usize {
        self.base.saturating_add(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.saturating_add(n);
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeError::UnexpectedEnd {
                offset: self.offset(),
            })?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// A double stored as two little-endian words, high word first.
    pub fn f64_swapped(&mut self) -> Result<f64, DecodeError> {
        let hi = u64::from(self.u32()?);
        let lo = u64::from(self.u32()?);
        Ok(f64::from_bits((hi << 32) | lo))
    }

    /// A NUL-terminated string, decoded per the reader's version.
    pub fn string(&mut self) -> Result<String, DecodeError> {
        let rest = self.bytes.get(self.pos..).unwrap_or_default();
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(DecodeError::UnterminatedString {
                offset: self.offset(),
            });
        };
        let raw = self.take(nul)?;
        self.pos = self.pos.saturating_add(1);
        Ok(decode_text(raw, self.version))
    }
}

/// Decode string bytes: UTF-8 from version 6, Latin-1 before.
pub fn decode_text(raw: &[u8], version: Version) -> String {
    if version.utf8() {
        String::from_utf8_lossy(raw).into_owned()
    } else {
        raw.iter().map(|&b| char::from(b)).collect()
    }
}

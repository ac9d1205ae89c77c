//! Typed readers for action payloads.
//!
//! Each reader takes a [`ByteReader`] positioned at the start of a payload
//! and returns a structured view of it. Readers that can partially succeed
//! (push data, constant pools) log the malformed tail and return what they
//! managed to read; headers that are useless when incomplete return a
//! [`DecodeError`].

use std::rc::Rc;

use bitflags::bitflags;

use crate::{ByteReader, ConstantPool, DecodeError};

/// One item from a `Push` action.
#[derive(Clone, Debug, PartialEq)]
pub enum PushItem {
    Str(Rc<str>),
    /// Type 1 (`f32`) and type 6 (`f64`) both land here.
    Number(f64),
    Null,
    Undefined,
    Register(u8),
    Bool(bool),
    Int(i32),
    /// Types 8 and 9: an index into the active constant pool.
    Constant(u16),
}

/// Decode the items of a `Push` payload.
///
/// An unknown type byte is logged and skipped; a truncated item ends the
/// list. Whatever was decoded before the problem is still returned.
pub fn read_push_items(reader: &mut ByteReader<'_>) -> Vec<PushItem> {
    let mut items = Vec::new();
    while !reader.is_empty() {
        let offset = reader.offset();
        let item = match read_push_item(reader) {
            Ok(Some(item)) => item,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", offset, %err, "truncated push data");
                break;
            }
        };
        items.push(item);
    }
    items
}

fn read_push_item(reader: &mut ByteReader<'_>) -> Result<Option<PushItem>, DecodeError> {
    let offset = reader.offset();
    let item = match reader.u8()? {
        0 => PushItem::Str(reader.string()?.into()),
        1 => PushItem::Number(f64::from(reader.f32()?)),
        2 => PushItem::Null,
        3 => PushItem::Undefined,
        4 => PushItem::Register(reader.u8()?),
        5 => PushItem::Bool(reader.u8()? != 0),
        6 => PushItem::Number(reader.f64_swapped()?),
        7 => PushItem::Int(reader.i32()?),
        8 => PushItem::Constant(u16::from(reader.u8()?)),
        9 => PushItem::Constant(reader.u16()?),
        other => {
            tracing::warn!(target: "flare::malformed", offset, kind = other, "unknown push type");
            return Ok(None);
        }
    };
    Ok(Some(item))
}

/// Decode a `ConstantPool` declaration.
///
/// A count larger than the strings present is logged; the strings that
/// were read are kept.
pub fn read_constant_pool(reader: &mut ByteReader<'_>) -> ConstantPool {
    let count = match reader.u16() {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(target: "flare::malformed", %err, "constant pool without count");
            return ConstantPool::default();
        }
    };
    let mut entries: Vec<Rc<str>> = Vec::with_capacity(usize::from(count));
    for index in 0..count {
        match reader.string() {
            Ok(s) => entries.push(s.into()),
            Err(err) => {
                tracing::warn!(
                    target: "flare::malformed",
                    declared = count,
                    read = index,
                    %err,
                    "constant pool shorter than declared"
                );
                break;
            }
        }
    }
    ConstantPool::new(entries)
}

bitflags! {
    /// Implicit-binding flags of a `DefineFunction2` closure.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FunctionFlags: u16 {
        const PRELOAD_THIS = 0x0001;
        const SUPPRESS_THIS = 0x0002;
        const PRELOAD_ARGUMENTS = 0x0004;
        const SUPPRESS_ARGUMENTS = 0x0008;
        const PRELOAD_SUPER = 0x0010;
        const SUPPRESS_SUPER = 0x0020;
        const PRELOAD_ROOT = 0x0040;
        const PRELOAD_PARENT = 0x0080;
        const PRELOAD_GLOBAL = 0x0100;
    }
}

/// A declared parameter.
///
/// Legacy functions only have names (`register` is 0); register-style
/// functions may bind a parameter straight into a local register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub register: u8,
    pub name: String,
}

/// Header of `DefineFunction` and `DefineFunction2`.
///
/// The function body is the `code_size` bytes that follow the action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionHeader {
    /// Empty for anonymous functions.
    pub name: String,
    pub params: Vec<Param>,
    /// Zero for legacy functions.
    pub register_count: u8,
    pub flags: FunctionFlags,
    pub code_size: u16,
    /// `true` for `DefineFunction2`.
    pub registers: bool,
}

/// Read a `DefineFunction` header.
pub fn read_function(reader: &mut ByteReader<'_>) -> Result<FunctionHeader, DecodeError> {
    let name = reader.string()?;
    let nargs = reader.u16()?;
    let mut params = Vec::with_capacity(usize::from(nargs));
    for _ in 0..nargs {
        params.push(Param {
            register: 0,
            name: reader.string()?,
        });
    }
    let code_size = reader.u16()?;
    Ok(FunctionHeader {
        name,
        params,
        register_count: 0,
        flags: FunctionFlags::empty(),
        code_size,
        registers: false,
    })
}

/// Read a `DefineFunction2` header.
pub fn read_function2(reader: &mut ByteReader<'_>) -> Result<FunctionHeader, DecodeError> {
    let name = reader.string()?;
    let nargs = reader.u16()?;
    let register_count = reader.u8()?;
    let flags = FunctionFlags::from_bits_truncate(reader.u16()?);
    let mut params = Vec::with_capacity(usize::from(nargs));
    for _ in 0..nargs {
        let register = reader.u8()?;
        let name = reader.string()?;
        params.push(Param { register, name });
    }
    let code_size = reader.u16()?;
    Ok(FunctionHeader {
        name,
        params,
        register_count,
        flags,
        code_size,
        registers: true,
    })
}

bitflags! {
    /// Flags byte of a `Try` action.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TryFlags: u8 {
        const CATCH = 0x01;
        const FINALLY = 0x02;
        const CATCH_IN_REGISTER = 0x04;
    }
}

/// Where a caught value is stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatchTarget {
    Register(u8),
    Name(String),
}

/// Header of a `Try` action.
///
/// Sizes whose presence flag is clear are already zeroed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryHeader {
    pub flags: TryFlags,
    pub try_size: u16,
    pub catch_size: u16,
    pub finally_size: u16,
    pub catch_target: CatchTarget,
}

impl TryHeader {
    #[inline]
    pub fn has_catch(&self) -> bool {
        self.flags.contains(TryFlags::CATCH)
    }

    #[inline]
    pub fn has_finally(&self) -> bool {
        self.flags.contains(TryFlags::FINALLY)
    }
}

/// Read a `Try` header.
pub fn read_try(reader: &mut ByteReader<'_>) -> Result<TryHeader, DecodeError> {
    let flags = TryFlags::from_bits_truncate(reader.u8()?);
    let try_size = reader.u16()?;
    let mut catch_size = reader.u16()?;
    let mut finally_size = reader.u16()?;
    let catch_target = if flags.contains(TryFlags::CATCH_IN_REGISTER) {
        CatchTarget::Register(reader.u8()?)
    } else {
        CatchTarget::Name(reader.string()?)
    };
    if !flags.contains(TryFlags::CATCH) {
        catch_size = 0;
    }
    if !flags.contains(TryFlags::FINALLY) {
        finally_size = 0;
    }
    Ok(TryHeader {
        flags,
        try_size,
        catch_size,
        finally_size,
        catch_target,
    })
}

/// Arguments of a `GetURL` action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlArgs {
    pub url: String,
    pub target: String,
}

pub fn read_url(reader: &mut ByteReader<'_>) -> Result<UrlArgs, DecodeError> {
    Ok(UrlArgs {
        url: reader.string()?,
        target: reader.string()?,
    })
}

/// Arguments of a `WaitForFrame` action.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WaitForFrameArgs {
    pub frame: u16,
    pub skip: u8,
}

pub fn read_wait_for_frame(reader: &mut ByteReader<'_>) -> Result<WaitForFrameArgs, DecodeError> {
    Ok(WaitForFrameArgs {
        frame: reader.u16()?,
        skip: reader.u8()?,
    })
}

/// Arguments of a `GotoFrame2` action.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GotoFrame2Args {
    pub play: bool,
    pub scene_bias: u16,
}

pub fn read_goto_frame2(reader: &mut ByteReader<'_>) -> Result<GotoFrame2Args, DecodeError> {
    let flags = reader.u8()?;
    let scene_bias = if flags & 0x02 != 0 { reader.u16()? } else { 0 };
    Ok(GotoFrame2Args {
        play: flags & 0x01 != 0,
        scene_bias,
    })
}

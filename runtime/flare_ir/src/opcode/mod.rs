//! The action opcode table.
//!
//! Every byte value maps to exactly one [`Opcode`]: the known actions get
//! their own variant, everything else becomes [`Opcode::Unsupported`]. The
//! mapping is a closed `match`, so adding a variant without giving it a byte,
//! a name, and an argument shape is a compile error.
//!
//! # Encoding
//!
//! Opcodes below `0x80` are a single byte. Opcodes at or above `0x80` are
//! followed by a little-endian `u16` payload length and that many payload
//! bytes. [`ArgShape`] describes how a handler reads the payload.

use std::fmt;

/// How an action's payload is laid out.
///
/// Opcodes below `0x80` always have [`ArgShape::None`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgShape {
    /// No payload.
    None,
    /// A single `u8`.
    U8,
    /// A little-endian `u16`.
    U16,
    /// A little-endian `i16` branch offset.
    S16,
    /// Raw bytes whose length comes from the action header.
    Hex,
    /// One NUL-terminated string.
    Str,
    /// A sequence of typed push items.
    PushData,
    /// A `u16` count followed by that many strings.
    ConstantPool,
    /// Legacy function definition header.
    Function,
    /// Register-style function definition header.
    Function2,
    /// `try` block header.
    Try,
    /// Two NUL-terminated strings (url, target).
    Url,
    /// A `u16` frame followed by a `u8` skip count.
    WaitForFrame,
}

macro_rules! define_opcodes {
    ($($byte:literal => $variant:ident : $shape:ident, $name:literal;)*) => {
        /// A decoded action opcode.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )*
            /// Any byte without a known action.
            Unsupported(u8),
        }

        impl Opcode {
            /// Map a raw byte to its opcode.
            pub const fn from_byte(byte: u8) -> Self {
                match byte {
                    $($byte => Opcode::$variant,)*
                    other => Opcode::Unsupported(other),
                }
            }

            /// The raw byte for this opcode.
            pub const fn byte(self) -> u8 {
                match self {
                    $(Opcode::$variant => $byte,)*
                    Opcode::Unsupported(byte) => byte,
                }
            }

            /// The mnemonic used by the disassembler and in logs.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                    Opcode::Unsupported(_) => "Unsupported",
                }
            }

            /// Argument shape of this opcode's payload.
            pub const fn shape(self) -> ArgShape {
                match self {
                    $(Opcode::$variant => ArgShape::$shape,)*
                    Opcode::Unsupported(byte) if byte >= 0x80 => ArgShape::Hex,
                    Opcode::Unsupported(_) => ArgShape::None,
                }
            }
        }
    };
}

define_opcodes! {
    0x00 => End: None, "End";
    0x04 => NextFrame: None, "NextFrame";
    0x05 => PrevFrame: None, "PrevFrame";
    0x06 => Play: None, "Play";
    0x07 => Stop: None, "Stop";
    0x08 => ToggleQuality: None, "ToggleQuality";
    0x09 => StopSounds: None, "StopSounds";
    0x0A => Add: None, "Add";
    0x0B => Subtract: None, "Subtract";
    0x0C => Multiply: None, "Multiply";
    0x0D => Divide: None, "Divide";
    0x0E => Equals: None, "Equals";
    0x0F => Less: None, "Less";
    0x10 => And: None, "And";
    0x11 => Or: None, "Or";
    0x12 => Not: None, "Not";
    0x13 => StringEquals: None, "StringEquals";
    0x14 => StringLength: None, "StringLength";
    0x15 => StringExtract: None, "StringExtract";
    0x17 => Pop: None, "Pop";
    0x18 => ToInteger: None, "ToInteger";
    0x1C => GetVariable: None, "GetVariable";
    0x1D => SetVariable: None, "SetVariable";
    0x20 => SetTarget2: None, "SetTarget2";
    0x21 => StringAdd: None, "StringAdd";
    0x22 => GetProperty: None, "GetProperty";
    0x23 => SetProperty: None, "SetProperty";
    0x24 => CloneSprite: None, "CloneSprite";
    0x25 => RemoveSprite: None, "RemoveSprite";
    0x26 => Trace: None, "Trace";
    0x27 => StartDrag: None, "StartDrag";
    0x28 => EndDrag: None, "EndDrag";
    0x29 => StringLess: None, "StringLess";
    0x2A => Throw: None, "Throw";
    0x2B => CastOp: None, "CastOp";
    0x2C => ImplementsOp: None, "ImplementsOp";
    0x2D => FsCommand2: None, "FSCommand2";
    0x30 => RandomNumber: None, "RandomNumber";
    0x31 => MbStringLength: None, "MBStringLength";
    0x32 => CharToAscii: None, "CharToAscii";
    0x33 => AsciiToChar: None, "AsciiToChar";
    0x34 => GetTime: None, "GetTime";
    0x35 => MbStringExtract: None, "MBStringExtract";
    0x36 => MbCharToAscii: None, "MBCharToAscii";
    0x37 => MbAsciiToChar: None, "MBAsciiToChar";
    0x3A => Delete: None, "Delete";
    0x3B => Delete2: None, "Delete2";
    0x3C => DefineLocal: None, "DefineLocal";
    0x3D => CallFunction: None, "CallFunction";
    0x3E => Return: None, "Return";
    0x3F => Modulo: None, "Modulo";
    0x40 => NewObject: None, "NewObject";
    0x41 => DefineLocal2: None, "DefineLocal2";
    0x42 => InitArray: None, "InitArray";
    0x43 => InitObject: None, "InitObject";
    0x44 => TypeOf: None, "TypeOf";
    0x45 => TargetPath: None, "TargetPath";
    0x46 => Enumerate: None, "Enumerate";
    0x47 => Add2: None, "Add2";
    0x48 => Less2: None, "Less2";
    0x49 => Equals2: None, "Equals2";
    0x4A => ToNumber: None, "ToNumber";
    0x4B => ToString: None, "ToString";
    0x4C => PushDuplicate: None, "PushDuplicate";
    0x4D => StackSwap: None, "StackSwap";
    0x4E => GetMember: None, "GetMember";
    0x4F => SetMember: None, "SetMember";
    0x50 => Increment: None, "Increment";
    0x51 => Decrement: None, "Decrement";
    0x52 => CallMethod: None, "CallMethod";
    0x53 => NewMethod: None, "NewMethod";
    0x54 => InstanceOf: None, "InstanceOf";
    0x55 => Enumerate2: None, "Enumerate2";
    0x60 => BitAnd: None, "BitAnd";
    0x61 => BitOr: None, "BitOr";
    0x62 => BitXor: None, "BitXor";
    0x63 => BitLShift: None, "BitLShift";
    0x64 => BitRShift: None, "BitRShift";
    0x65 => BitURShift: None, "BitURShift";
    0x66 => StrictEquals: None, "StrictEquals";
    0x67 => Greater: None, "Greater";
    0x68 => StringGreater: None, "StringGreater";
    0x69 => Extends: None, "Extends";
    0x81 => GotoFrame: U16, "GotoFrame";
    0x83 => GetUrl: Url, "GetURL";
    0x87 => StoreRegister: U8, "StoreRegister";
    0x88 => ConstantPool: ConstantPool, "ConstantPool";
    0x8A => WaitForFrame: WaitForFrame, "WaitForFrame";
    0x8B => SetTarget: Str, "SetTarget";
    0x8C => GotoLabel: Str, "GotoLabel";
    0x8D => WaitForFrame2: U8, "WaitForFrame2";
    0x8E => DefineFunction2: Function2, "DefineFunction2";
    0x8F => Try: Try, "Try";
    0x94 => With: U16, "With";
    0x96 => Push: PushData, "Push";
    0x99 => Jump: S16, "Jump";
    0x9A => GetUrl2: U8, "GetURL2";
    0x9B => DefineFunction: Function, "DefineFunction";
    0x9D => If: S16, "If";
    0x9E => Call: None, "Call";
    0x9F => GotoFrame2: Hex, "GotoFrame2";
}

impl Opcode {
    /// Whether this opcode is followed by a length-prefixed payload.
    #[inline]
    pub const fn has_payload(self) -> bool {
        self.byte() >= 0x80
    }

    /// Whether the opcode is a relative branch (`Jump` or `If`).
    #[inline]
    pub const fn is_branch(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::If)
    }
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        Opcode::from_byte(byte)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Unsupported(byte) => write!(f, "Unsupported(0x{byte:02X})"),
            other => f.write_str(other.name()),
        }
    }
}

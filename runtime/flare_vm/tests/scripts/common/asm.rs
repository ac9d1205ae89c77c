//! A tiny assembler for hand-written action buffers.
//!
//! Branch operands refer to labels and are patched in [`Asm::finish`].
//! Sized blocks (function bodies, `try`, `with`) take nested assemblers,
//! whose own labels are resolved before they are spliced in.

use std::collections::HashMap;

use flare_ir::{CodeBuffer, Opcode, Version};

pub struct Asm {
    bytes: Vec<u8>,
    labels: HashMap<&'static str, usize>,
    /// (operand offset, label); the branch base is the operand end.
    fixups: Vec<(usize, &'static str)>,
}

impl Asm {
    pub fn new() -> Self {
        Asm {
            bytes: Vec::new(),
            labels: HashMap::new(),
            fixups: Vec::new(),
        }
    }

    fn action(&mut self, opcode: Opcode, payload: &[u8]) -> &mut Self {
        let byte = opcode.byte();
        self.bytes.push(byte);
        if byte >= 0x80 {
            let len = u16::try_from(payload.len()).expect("payload fits in u16");
            self.bytes.extend_from_slice(&len.to_le_bytes());
            self.bytes.extend_from_slice(payload);
        }
        self
    }

    /// A single-byte action.
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.action(opcode, &[])
    }

    /// Raw bytes, for malformed input.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

// Push

/// One operand of a `Push`.
pub enum Item<'a> {
    Str(&'a str),
    Num(f64),
    Int(i32),
    Bool(bool),
    Null,
    Undefined,
    Reg(u8),
    Const(u8),
}

impl Asm {
    pub fn push(&mut self, items: &[Item<'_>]) -> &mut Self {
        let mut payload = Vec::new();
        for item in items {
            match item {
                Item::Str(s) => {
                    payload.push(0);
                    payload.extend_from_slice(s.as_bytes());
                    payload.push(0);
                }
                Item::Num(n) => {
                    payload.push(6);
                    let bits = n.to_bits();
                    let hi = u32::try_from(bits >> 32).expect("high word");
                    let lo = u32::try_from(bits & 0xFFFF_FFFF).expect("low word");
                    payload.extend_from_slice(&hi.to_le_bytes());
                    payload.extend_from_slice(&lo.to_le_bytes());
                }
                Item::Int(n) => {
                    payload.push(7);
                    payload.extend_from_slice(&n.to_le_bytes());
                }
                Item::Bool(b) => payload.extend_from_slice(&[5, u8::from(*b)]),
                Item::Null => payload.push(2),
                Item::Undefined => payload.push(3),
                Item::Reg(r) => payload.extend_from_slice(&[4, *r]),
                Item::Const(i) => payload.extend_from_slice(&[8, *i]),
            }
        }
        self.action(Opcode::Push, &payload)
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.push(&[Item::Str(s)])
    }

    pub fn push_int(&mut self, n: i32) -> &mut Self {
        self.push(&[Item::Int(n)])
    }

    pub fn push_num(&mut self, n: f64) -> &mut Self {
        self.push(&[Item::Num(n)])
    }

    /// `name = value` for a string value.
    pub fn set_str(&mut self, name: &str, value: &str) -> &mut Self {
        self.push(&[Item::Str(name), Item::Str(value)])
            .op(Opcode::SetVariable)
    }

    /// `name = value` for an integer value.
    pub fn set_int(&mut self, name: &str, value: i32) -> &mut Self {
        self.push(&[Item::Str(name), Item::Int(value)])
            .op(Opcode::SetVariable)
    }

    pub fn get(&mut self, name: &str) -> &mut Self {
        self.push_str(name).op(Opcode::GetVariable)
    }

    pub fn trace(&mut self, text: &str) -> &mut Self {
        self.push_str(text).op(Opcode::Trace)
    }

    /// `trace(name)`.
    pub fn trace_var(&mut self, name: &str) -> &mut Self {
        self.get(name).op(Opcode::Trace)
    }
}

// Operands

fn cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

impl Asm {
    pub fn constant_pool(&mut self, entries: &[&str]) -> &mut Self {
        let count = u16::try_from(entries.len()).expect("pool fits in u16");
        let mut payload = count.to_le_bytes().to_vec();
        for entry in entries {
            cstr(&mut payload, entry);
        }
        self.action(Opcode::ConstantPool, &payload)
    }

    pub fn store_register(&mut self, register: u8) -> &mut Self {
        self.action(Opcode::StoreRegister, &[register])
    }

    pub fn goto_frame(&mut self, frame: u16) -> &mut Self {
        self.action(Opcode::GotoFrame, &frame.to_le_bytes())
    }

    pub fn goto_label(&mut self, label: &str) -> &mut Self {
        let mut payload = Vec::new();
        cstr(&mut payload, label);
        self.action(Opcode::GotoLabel, &payload)
    }

    pub fn goto_frame2(&mut self, play: bool, scene_bias: Option<u16>) -> &mut Self {
        let mut payload = vec![u8::from(play) | if scene_bias.is_some() { 2 } else { 0 }];
        if let Some(bias) = scene_bias {
            payload.extend_from_slice(&bias.to_le_bytes());
        }
        self.action(Opcode::GotoFrame2, &payload)
    }

    pub fn wait_for_frame(&mut self, frame: u16, skip: u8) -> &mut Self {
        let mut payload = frame.to_le_bytes().to_vec();
        payload.push(skip);
        self.action(Opcode::WaitForFrame, &payload)
    }

    pub fn wait_for_frame2(&mut self, skip: u8) -> &mut Self {
        self.action(Opcode::WaitForFrame2, &[skip])
    }

    pub fn set_target(&mut self, path: &str) -> &mut Self {
        let mut payload = Vec::new();
        cstr(&mut payload, path);
        self.action(Opcode::SetTarget, &payload)
    }

    pub fn get_url(&mut self, url: &str, target: &str) -> &mut Self {
        let mut payload = Vec::new();
        cstr(&mut payload, url);
        cstr(&mut payload, target);
        self.action(Opcode::GetUrl, &payload)
    }

    pub fn get_url2(&mut self, flags: u8) -> &mut Self {
        self.action(Opcode::GetUrl2, &[flags])
    }

    pub fn call_frame(&mut self) -> &mut Self {
        self.action(Opcode::Call, &[])
    }
}

// Branches

impl Asm {
    pub fn label(&mut self, name: &'static str) -> &mut Self {
        self.labels.insert(name, self.bytes.len());
        self
    }

    fn branch(&mut self, opcode: Opcode, label: &'static str) -> &mut Self {
        self.action(opcode, &[0, 0]);
        let operand = self.bytes.len() - 2;
        self.fixups.push((operand, label));
        self
    }

    pub fn jump(&mut self, label: &'static str) -> &mut Self {
        self.branch(Opcode::Jump, label)
    }

    pub fn if_true(&mut self, label: &'static str) -> &mut Self {
        self.branch(Opcode::If, label)
    }

    /// A branch with a literal offset.
    pub fn jump_by(&mut self, offset: i16) -> &mut Self {
        self.action(Opcode::Jump, &offset.to_le_bytes())
    }
}

// Blocks

/// Where `catch` binds the thrown value.
pub enum Catch<'a> {
    Name(&'a str),
    Register(u8),
}

impl Asm {
    /// Assemble a nested block.
    pub fn block(build: impl FnOnce(&mut Asm)) -> Asm {
        let mut asm = Asm::new();
        build(&mut asm);
        asm
    }

    fn splice(&mut self, body: Asm) -> u16 {
        let bytes = body.finish();
        let len = u16::try_from(bytes.len()).expect("block fits in u16");
        self.bytes.extend_from_slice(&bytes);
        len
    }

    fn sized_action(&mut self, opcode: Opcode, mut header: Vec<u8>, size_at: usize, body: Asm) -> &mut Self {
        let body = body.finish();
        let len = u16::try_from(body.len()).expect("block fits in u16");
        header[size_at..size_at + 2].copy_from_slice(&len.to_le_bytes());
        self.action(opcode, &header);
        self.bytes.extend_from_slice(&body);
        self
    }

    /// `DefineFunction name(params) { body }`.
    pub fn function(&mut self, name: &str, params: &[&str], body: Asm) -> &mut Self {
        let mut header = Vec::new();
        cstr(&mut header, name);
        let nargs = u16::try_from(params.len()).expect("params fit in u16");
        header.extend_from_slice(&nargs.to_le_bytes());
        for param in params {
            cstr(&mut header, param);
        }
        let size_at = header.len();
        header.extend_from_slice(&[0, 0]);
        self.sized_action(Opcode::DefineFunction, header, size_at, body)
    }

    /// `DefineFunction2` with explicit registers and flags.
    pub fn function2(
        &mut self,
        name: &str,
        registers: u8,
        flags: u16,
        params: &[(u8, &str)],
        body: Asm,
    ) -> &mut Self {
        let mut header = Vec::new();
        cstr(&mut header, name);
        let nargs = u16::try_from(params.len()).expect("params fit in u16");
        header.extend_from_slice(&nargs.to_le_bytes());
        header.push(registers);
        header.extend_from_slice(&flags.to_le_bytes());
        for (register, param) in params {
            header.push(*register);
            cstr(&mut header, param);
        }
        let size_at = header.len();
        header.extend_from_slice(&[0, 0]);
        self.sized_action(Opcode::DefineFunction2, header, size_at, body)
    }

    /// `With` over the object on top of the stack.
    pub fn with(&mut self, body: Asm) -> &mut Self {
        self.sized_action(Opcode::With, vec![0, 0], 0, body)
    }

    /// `try { body } catch (..) { handler } finally { finally }`.
    pub fn try_block(
        &mut self,
        body: Asm,
        catch: Option<(Catch<'_>, Asm)>,
        finally: Option<Asm>,
    ) -> &mut Self {
        let mut flags = 0u8;
        let (target, handler) = match catch {
            Some((target, handler)) => {
                flags |= 0x01;
                (Some(target), Some(handler))
            }
            None => (None, None),
        };
        if finally.is_some() {
            flags |= 0x02;
        }
        if matches!(target, Some(Catch::Register(_))) {
            flags |= 0x04;
        }

        let mut blocks = Asm::new();
        let try_size = blocks.splice(body);
        let catch_size = handler.map_or(0, |h| blocks.splice(h));
        let finally_size = finally.map_or(0, |f| blocks.splice(f));

        let mut header = vec![flags];
        header.extend_from_slice(&try_size.to_le_bytes());
        header.extend_from_slice(&catch_size.to_le_bytes());
        header.extend_from_slice(&finally_size.to_le_bytes());
        match target {
            Some(Catch::Register(r)) => header.push(r),
            Some(Catch::Name(name)) => cstr(&mut header, name),
            None => cstr(&mut header, ""),
        }
        self.action(Opcode::Try, &header);
        self.bytes.extend_from_slice(&blocks.bytes);
        self
    }
}

// Output

impl Asm {
    /// Resolve branches and return the bytes.
    pub fn finish(self) -> Vec<u8> {
        let mut bytes = self.bytes;
        for (operand, label) in self.fixups {
            let target = *self
                .labels
                .get(label)
                .unwrap_or_else(|| panic!("unknown label {label}"));
            let base = i64::try_from(operand + 2).expect("offset fits");
            let target = i64::try_from(target).expect("offset fits");
            let offset = i16::try_from(target - base).expect("branch fits in i16");
            bytes[operand..operand + 2].copy_from_slice(&offset.to_le_bytes());
        }
        bytes
    }

    pub fn build(self, version: u8) -> CodeBuffer {
        CodeBuffer::new(self.finish(), Version::new(version))
    }
}

impl Default for Asm {
    fn default() -> Self {
        Asm::new()
    }
}

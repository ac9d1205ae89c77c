//! Text rendering of action buffers.
//!
//! Used by the `flare --disasm` command and by the engine's `trace!` output.
//! The format is one action per line: offset, mnemonic, decoded operands.

use std::fmt::Write;

use crate::payload::{
    read_constant_pool, read_function, read_function2, read_goto_frame2, read_push_items,
    read_try, read_url, read_wait_for_frame, CatchTarget, PushItem,
};
use crate::{Action, ArgShape, CodeBuffer, DecodeError, Opcode};

/// Render the operands of one action, without offset or mnemonic.
pub fn operands(buffer: &CodeBuffer, action: &Action) -> String {
    let mut out = String::new();
    if let Err(err) = render_operands(buffer, action, &mut out) {
        let _ = write!(out, " <{err}>");
    }
    out
}

fn render_operands(
    buffer: &CodeBuffer,
    action: &Action,
    out: &mut String,
) -> Result<(), DecodeError> {
    let mut reader = buffer.reader(action);
    if action.opcode == Opcode::GotoFrame2 {
        let args = read_goto_frame2(&mut reader)?;
        let _ = write!(out, "play={} bias={}", args.play, args.scene_bias);
        return Ok(());
    }
    match action.opcode.shape() {
        ArgShape::None => {}
        ArgShape::U8 => {
            let _ = write!(out, "{}", reader.u8()?);
        }
        ArgShape::U16 => {
            let _ = write!(out, "{}", reader.u16()?);
        }
        ArgShape::S16 => {
            let offset = reader.i16()?;
            let target = i64::try_from(action.next_pc)
                .unwrap_or(i64::MAX)
                .saturating_add(i64::from(offset));
            let _ = write!(out, "{offset:+} (-> {target})");
        }
        ArgShape::Hex => {
            let bytes: Vec<String> = buffer
                .payload(action)
                .iter()
                .map(|byte| format!("{byte:02X}"))
                .collect();
            out.push_str(&bytes.join(" "));
        }
        ArgShape::Str => {
            let _ = write!(out, "{:?}", reader.string()?);
        }
        ArgShape::PushData => {
            let items: Vec<String> = read_push_items(&mut reader)
                .iter()
                .map(render_push_item)
                .collect();
            out.push_str(&items.join(", "));
        }
        ArgShape::ConstantPool => {
            let pool = read_constant_pool(&mut reader);
            let items: Vec<String> = pool.iter().map(|s| format!("{s:?}")).collect();
            let _ = write!(out, "[{}]", items.join(", "));
        }
        shape @ (ArgShape::Function | ArgShape::Function2) => {
            let header = if shape == ArgShape::Function {
                read_function(&mut reader)?
            } else {
                read_function2(&mut reader)?
            };
            let params: Vec<String> = header
                .params
                .iter()
                .map(|p| {
                    if p.register == 0 {
                        p.name.clone()
                    } else {
                        format!("r{}:{}", p.register, p.name)
                    }
                })
                .collect();
            let _ = write!(
                out,
                "{:?}({}) size={}",
                header.name,
                params.join(", "),
                header.code_size
            );
            if header.registers {
                let _ = write!(
                    out,
                    " regs={} flags={:#06x}",
                    header.register_count,
                    header.flags.bits()
                );
            }
        }
        ArgShape::Try => {
            let header = read_try(&mut reader)?;
            let target = match &header.catch_target {
                CatchTarget::Register(r) => format!("r{r}"),
                CatchTarget::Name(name) => format!("{name:?}"),
            };
            let _ = write!(
                out,
                "try={} catch={} finally={} -> {target}",
                header.try_size, header.catch_size, header.finally_size
            );
        }
        ArgShape::Url => {
            let args = read_url(&mut reader)?;
            let _ = write!(out, "{:?} {:?}", args.url, args.target);
        }
        ArgShape::WaitForFrame => {
            let args = read_wait_for_frame(&mut reader)?;
            let _ = write!(out, "frame={} skip={}", args.frame, args.skip);
        }
    }
    Ok(())
}

fn render_push_item(item: &PushItem) -> String {
    match item {
        PushItem::Str(s) => format!("{s:?}"),
        PushItem::Number(n) => format!("{n}"),
        PushItem::Null => "null".to_owned(),
        PushItem::Undefined => "undefined".to_owned(),
        PushItem::Register(r) => format!("r{r}"),
        PushItem::Bool(b) => format!("{b}"),
        PushItem::Int(i) => format!("{i}i"),
        PushItem::Constant(c) => format!("c{c}"),
    }
}

/// Render one action as a single line.
pub fn describe(buffer: &CodeBuffer, action: &Action) -> String {
    let operands = operands(buffer, action);
    if operands.is_empty() {
        format!("{:05}: {}", action.pc, action.opcode)
    } else {
        format!("{:05}: {} {}", action.pc, action.opcode, operands)
    }
}

/// Render every action in the buffer, one per line.
///
/// A framing error ends the listing with a final diagnostic line.
pub fn disassemble(buffer: &CodeBuffer) -> String {
    let mut out = String::new();
    for action in buffer.actions(0..buffer.len()) {
        match action {
            Ok(action) => {
                out.push_str(&describe(buffer, &action));
                out.push('\n');
            }
            Err(err) => {
                let _ = writeln!(out, "<{err}>");
            }
        }
    }
    out
}

//! Property-based tests: stack balance, coercion, and hostile input.
//!
//! Random programs are drawn from opcodes that cannot branch or call, so
//! every generated buffer terminates; raw byte buffers run under tight
//! limits instead.

#![allow(
    clippy::redundant_closure_for_method_calls,
    reason = "Proptest macros generate code with these patterns"
)]

use flare_ir::Opcode;
use flare_stage::Timeline;
use flare_vm::{VmConfig, VmError};
use proptest::prelude::*;

use crate::common::{Asm, Item, Player};

// -- Strategies --

/// One straight-line step of a generated program.
#[derive(Clone, Debug)]
enum Step {
    PushInt(i32),
    PushStr(String),
    Op(Opcode),
}

fn stack_opcode() -> impl Strategy<Value = Opcode> {
    prop::sample::select(vec![
        Opcode::Add2,
        Opcode::Subtract,
        Opcode::Multiply,
        Opcode::Divide,
        Opcode::Modulo,
        Opcode::Not,
        Opcode::Equals2,
        Opcode::Less2,
        Opcode::StrictEquals,
        Opcode::BitAnd,
        Opcode::BitLShift,
        Opcode::StringAdd,
        Opcode::StringLength,
        Opcode::TypeOf,
        Opcode::ToNumber,
        Opcode::ToString,
        Opcode::Pop,
        Opcode::PushDuplicate,
        Opcode::StackSwap,
        Opcode::InitArray,
        Opcode::Trace,
    ])
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (-1000i32..1000).prop_map(Step::PushInt),
        "[a-z0-9 ]{0,8}".prop_map(Step::PushStr),
        stack_opcode().prop_map(Step::Op),
    ]
}

fn assemble(steps: &[Step]) -> Asm {
    let mut asm = Asm::new();
    for step in steps {
        match step {
            Step::PushInt(n) => asm.push_int(*n),
            Step::PushStr(s) => asm.push_str(s),
            Step::Op(op) => asm.op(*op),
        };
    }
    asm
}

/// Text of an integer-valued number the way `trace` prints it.
fn int_text(n: i64) -> String {
    n.to_string()
}

// -- Properties --

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    /// Straight-line code always finishes and leaves the stack as found.
    #[test]
    fn prop_straight_line_code_is_balanced(steps in prop::collection::vec(step(), 0..40)) {
        for version in [4u8, 6, 7] {
            let mut player = Player::new(version);
            let result = player.run(assemble(&steps));
            prop_assert!(result.is_ok(), "run failed: {:?}", result);
            prop_assert_eq!(player.env.stack_size(), 0);
        }
    }

    /// Without enforcement, whatever the code leaves stays put, and pops
    /// of an empty stack never underflow.
    #[test]
    fn prop_pushes_minus_pops(pushes in 0usize..20, pops in 0usize..30) {
        let config = VmConfig::default().with_stack_enforcement(false);
        let mut player = Player::with_config(6, Timeline::new(1), config);
        let mut asm = Asm::new();
        for n in 0..pushes {
            asm.push_int(i32::try_from(n).unwrap());
        }
        for _ in 0..pops {
            asm.op(Opcode::Pop);
        }
        player.exec(asm);
        prop_assert_eq!(player.env.stack_size(), pushes.saturating_sub(pops));
    }

    /// `Add2` on two integers prints their sum.
    #[test]
    fn prop_add2_of_integers(a in -100_000i32..100_000, b in -100_000i32..100_000) {
        let mut player = Player::new(6);
        let mut asm = Asm::new();
        asm.push(&[Item::Int(a), Item::Int(b)]).op(Opcode::Add2).op(Opcode::Trace);
        player.exec(asm);
        prop_assert_eq!(player.output(), format!("{}\n", int_text(i64::from(a) + i64::from(b))));
    }

    /// Numeric strings convert back to the same integer.
    #[test]
    fn prop_to_number_of_integer_string(n in -1_000_000i32..1_000_000) {
        let mut player = Player::new(6);
        let mut asm = Asm::new();
        asm.push_str(&n.to_string()).op(Opcode::ToNumber).op(Opcode::Trace);
        player.exec(asm);
        prop_assert_eq!(player.output(), format!("{}\n", n));
    }

    /// Multibyte length counts characters.
    #[test]
    fn prop_mb_length_counts_chars(text in "[a-z\u{e0}-\u{ff}\u{3b1}-\u{3c9}]{0,12}") {
        let mut player = Player::new(6);
        let mut asm = Asm::new();
        asm.push_str(&text).op(Opcode::MbStringLength).op(Opcode::Trace);
        player.exec(asm);
        prop_assert_eq!(player.output(), format!("{}\n", text.chars().count()));
    }

    /// Arbitrary bytes never panic; any failure is a reported error.
    #[test]
    fn prop_arbitrary_bytes_are_contained(bytes in prop::collection::vec(any::<u8>(), 0..96)) {
        let config = VmConfig::default()
            .with_branch_limit(64)
            .with_recursion_limit(8);
        let mut player = Player::with_config(7, Timeline::new(2), config);
        let mut asm = Asm::new();
        asm.raw(&bytes);
        match player.run(asm) {
            Ok(()) | Err(VmError::UncaughtException(_) | VmError::ScriptLimit { .. }) => {}
            Err(err @ VmError::Decode(_)) => {
                prop_assert!(false, "decode errors need strict decoding: {}", err);
            }
        }
        prop_assert_eq!(player.env.call_depth(), 0);
    }
}

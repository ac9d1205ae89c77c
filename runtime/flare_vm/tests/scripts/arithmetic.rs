//! Operators, coercion, and version-dependent results.

use flare_ir::Opcode;
use flare_value::Value;
use pretty_assertions::assert_eq;

use crate::common::{script, Item, Player};

/// Run `build` at `version` and return the trace lines.
fn traced(version: u8, build: impl FnOnce(&mut crate::common::Asm)) -> Vec<String> {
    let mut player = Player::new(version);
    player.exec(script(build));
    player.lines().into_iter().map(str::to_owned).collect()
}

// Variables

#[test]
fn test_add_then_set_variable() {
    let mut player = Player::new(5);
    player.exec(script(|a| {
        a.push_str("x")
            .push(&[Item::Int(2), Item::Int(3)])
            .op(Opcode::Add)
            .op(Opcode::SetVariable);
    }));
    assert_eq!(player.var("x"), Value::from(5.0));
    assert_eq!(player.env.stack_size(), 0);
}

// Division

#[test]
fn test_divide_by_zero_signs() {
    let lines = traced(6, |a| {
        a.push(&[Item::Int(1), Item::Int(0)]).op(Opcode::Divide).op(Opcode::Trace);
        a.push(&[Item::Int(-1), Item::Int(0)]).op(Opcode::Divide).op(Opcode::Trace);
        a.push(&[Item::Int(0), Item::Int(0)]).op(Opcode::Divide).op(Opcode::Trace);
        a.push(&[Item::Int(7), Item::Int(2)]).op(Opcode::Divide).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["Infinity", "-Infinity", "NaN", "3.5"]);
}

#[test]
fn test_divide_by_zero_before_v5_is_error_string() {
    let lines = traced(4, |a| {
        a.push(&[Item::Int(1), Item::Int(0)]).op(Opcode::Divide).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["#ERROR#"]);
}

// Equality and ordering

#[test]
fn test_equality_result_depends_on_version() {
    let legacy = traced(4, |a| {
        a.push(&[Item::Int(3), Item::Int(3)]).op(Opcode::Equals).op(Opcode::Trace);
        a.push(&[Item::Int(3), Item::Int(4)]).op(Opcode::Equals).op(Opcode::Trace);
    });
    assert_eq!(legacy, vec!["1", "0"]);

    let modern = traced(6, |a| {
        a.push(&[Item::Int(3), Item::Int(3)]).op(Opcode::Equals2).op(Opcode::Trace);
        a.push(&[Item::Str("3"), Item::Int(3)]).op(Opcode::Equals2).op(Opcode::Trace);
        a.push(&[Item::Undefined, Item::Null]).op(Opcode::Equals2).op(Opcode::Trace);
    });
    assert_eq!(modern, vec!["true", "true", "true"]);
}

#[test]
fn test_strict_equality_checks_types() {
    let lines = traced(6, |a| {
        a.push(&[Item::Str("1"), Item::Int(1)]).op(Opcode::StrictEquals).op(Opcode::Trace);
        a.push(&[Item::Int(1), Item::Num(1.0)]).op(Opcode::StrictEquals).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["false", "true"]);
}

#[test]
fn test_less_and_greater() {
    let lines = traced(7, |a| {
        a.push(&[Item::Int(2), Item::Int(3)]).op(Opcode::Less2).op(Opcode::Trace);
        a.push(&[Item::Int(3), Item::Int(2)]).op(Opcode::Greater).op(Opcode::Trace);
        a.push(&[Item::Str("abc"), Item::Str("abd")]).op(Opcode::Less2).op(Opcode::Trace);
        a.push(&[Item::Str("x"), Item::Int(1)]).op(Opcode::Less2).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["true", "true", "true", "undefined"]);
}

// Arithmetic

#[test]
fn test_add2_concatenates_with_strings() {
    let lines = traced(6, |a| {
        a.push(&[Item::Str("a"), Item::Int(1)]).op(Opcode::Add2).op(Opcode::Trace);
        a.push(&[Item::Int(1), Item::Int(2)]).op(Opcode::Add2).op(Opcode::Trace);
        a.push(&[Item::Int(1), Item::Str("2")]).op(Opcode::Add2).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["a1", "3", "12"]);
}

#[test]
fn test_operand_order() {
    let lines = traced(6, |a| {
        a.push(&[Item::Int(10), Item::Int(4)]).op(Opcode::Subtract).op(Opcode::Trace);
        a.push(&[Item::Int(10), Item::Int(4)]).op(Opcode::Modulo).op(Opcode::Trace);
        a.push_int(4).op(Opcode::Increment).op(Opcode::Trace);
        a.push_int(4).op(Opcode::Decrement).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["6", "2", "5", "3"]);
}

#[test]
fn test_bitwise_and_shifts() {
    let lines = traced(6, |a| {
        a.push(&[Item::Int(12), Item::Int(10)]).op(Opcode::BitAnd).op(Opcode::Trace);
        a.push(&[Item::Int(12), Item::Int(10)]).op(Opcode::BitXor).op(Opcode::Trace);
        a.push(&[Item::Int(1), Item::Int(33)]).op(Opcode::BitLShift).op(Opcode::Trace);
        a.push(&[Item::Int(-16), Item::Int(2)]).op(Opcode::BitRShift).op(Opcode::Trace);
        a.push(&[Item::Int(-1), Item::Int(28)]).op(Opcode::BitURShift).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["8", "6", "2", "-4", "15"]);
}

#[test]
fn test_to_integer_truncates() {
    let lines = traced(6, |a| {
        a.push_num(-3.7).op(Opcode::ToInteger).op(Opcode::Trace);
        a.push_str("12").op(Opcode::ToNumber).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["-3", "12"]);
}

#[test]
fn test_logical_ops_push_legacy_booleans() {
    let lines = traced(4, |a| {
        a.push_int(0).op(Opcode::Not).op(Opcode::Trace);
        a.push(&[Item::Int(1), Item::Int(0)]).op(Opcode::And).op(Opcode::Trace);
        a.push(&[Item::Int(1), Item::Int(0)]).op(Opcode::Or).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["1", "0", "1"]);
}

// Strings

#[test]
fn test_string_opcodes() {
    let lines = traced(6, |a| {
        a.push_str("hello").op(Opcode::StringLength).op(Opcode::Trace);
        a.push(&[Item::Str("hello"), Item::Int(2), Item::Int(3)])
            .op(Opcode::StringExtract)
            .op(Opcode::Trace);
        a.push(&[Item::Str("foo"), Item::Str("bar")]).op(Opcode::StringAdd).op(Opcode::Trace);
        a.push_str("A").op(Opcode::CharToAscii).op(Opcode::Trace);
        a.push_int(66).op(Opcode::AsciiToChar).op(Opcode::Trace);
        a.push(&[Item::Str("a"), Item::Str("b")]).op(Opcode::StringLess).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["5", "ell", "foobar", "65", "B", "true"]);
}

#[test]
fn test_multibyte_strings_count_characters() {
    let lines = traced(6, |a| {
        a.push_str("h\u{e9}llo").op(Opcode::MbStringLength).op(Opcode::Trace);
        a.push(&[Item::Str("\u{e9}t\u{e9}"), Item::Int(2), Item::Int(-1)])
            .op(Opcode::MbStringExtract)
            .op(Opcode::Trace);
        a.push_int(0x263A).op(Opcode::MbAsciiToChar).op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["5", "t\u{e9}", "\u{263a}"]);
}

#[test]
fn test_legacy_length_agrees_with_string_length() {
    // Version 5 reads the two UTF-8 bytes of "é" as two Latin-1 characters.
    let lines = traced(5, |a| {
        a.push_str("\u{e9}").op(Opcode::StringLength).op(Opcode::Trace);
        a.push(&[Item::Str("\u{e9}"), Item::Str("length")])
            .op(Opcode::GetMember)
            .op(Opcode::Trace);
    });
    assert_eq!(lines, vec!["2", "2"]);
}

#[test]
fn test_typeof() {
    let lines = traced(6, |a| {
        a.push_int(1).op(Opcode::TypeOf).op(Opcode::Trace);
        a.push_str("s").op(Opcode::TypeOf).op(Opcode::Trace);
        a.push(&[Item::Undefined]).op(Opcode::TypeOf).op(Opcode::Trace);
        a.push(&[Item::Null]).op(Opcode::TypeOf).op(Opcode::Trace);
        a.push(&[Item::Bool(true)]).op(Opcode::TypeOf).op(Opcode::Trace);
        a.push_str("_root").op(Opcode::GetVariable).op(Opcode::TypeOf).op(Opcode::Trace);
    });
    assert_eq!(
        lines,
        vec!["number", "string", "undefined", "null", "boolean", "movieclip"]
    );
}

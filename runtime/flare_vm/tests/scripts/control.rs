//! Branches, `with`, `try`/`catch`/`finally`, limits, and malformed input.

use flare_ir::Opcode;
use flare_stage::Timeline;
use flare_value::Value;
use flare_vm::{LimitKind, VmConfig, VmError};
use pretty_assertions::assert_eq;

use crate::common::{script, Asm, Catch, Item, Player};

/// `name = {key: value}`.
fn make_object(a: &mut Asm, name: &str, key: &str, value: i32) {
    a.push(&[Item::Str(name), Item::Str(key), Item::Int(value), Item::Int(1)])
        .op(Opcode::InitObject)
        .op(Opcode::SetVariable);
}

// Branches

#[test]
fn test_loop_with_if_and_jump() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.set_int("i", 0)
            .label("top")
            .get("i")
            .push_int(3)
            .op(Opcode::Less2)
            .op(Opcode::Not)
            .if_true("end")
            .push_str("i")
            .get("i")
            .op(Opcode::Increment)
            .op(Opcode::SetVariable)
            .trace_var("i")
            .jump("top")
            .label("end");
    }));
    assert_eq!(player.lines(), vec!["1", "2", "3"]);
}

#[test]
fn test_branch_before_buffer_start_is_ignored() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.jump_by(-1000).trace("after");
    }));
    assert_eq!(player.lines(), vec!["after"]);
}

#[test]
fn test_branch_past_buffer_end_finishes() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.trace("a").jump_by(1000).trace("b");
    }));
    assert_eq!(player.lines(), vec!["a"]);
}

#[test]
fn test_end_stops_the_buffer() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.trace("a").op(Opcode::End).trace("b");
    }));
    assert_eq!(player.lines(), vec!["a"]);
}

// With

#[test]
fn test_with_scope_ends_with_its_block() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        make_object(a, "o", "x", 1);
        a.set_int("x", 10);
        a.get("o").with(script(|w| {
            w.trace_var("x").set_int("x", 5);
        }));
        a.trace_var("x");
        a.get("o").push_str("x").op(Opcode::GetMember).op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["1", "10", "5"]);
}

#[test]
fn test_with_on_primitive_skips_block() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.push_int(1).with(script(|w| {
            w.trace("inside");
        }));
        a.trace("after");
    }));
    assert_eq!(player.lines(), vec!["after"]);
}

#[test]
fn test_with_depth_limit_skips_nested_block() {
    let config = VmConfig::default().with_with_depths(1, 1);
    let mut player = Player::with_config(6, Timeline::new(1), config);
    player.exec(script(|a| {
        make_object(a, "o", "x", 1);
        a.get("o").with(script(|outer| {
            outer.get("o").with(script(|inner| {
                inner.trace("deep");
            }));
            outer.trace("shallow");
        }));
    }));
    assert_eq!(player.lines(), vec!["shallow"]);
}

// Try

#[test]
fn test_catch_binds_and_skips_rest_of_try() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.try_block(
            script(|t| {
                t.trace("before").push_str("boom").op(Opcode::Throw).trace("after");
            }),
            Some((
                Catch::Name("e"),
                script(|c| {
                    c.trace_var("e");
                }),
            )),
            None,
        );
        a.trace("done");
    }));
    assert_eq!(player.lines(), vec!["before", "boom", "done"]);
    assert_eq!(player.var("e"), Value::from("boom"));
}

#[test]
fn test_catch_into_register() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.try_block(
            script(|t| {
                t.push_int(7).op(Opcode::Throw);
            }),
            Some((
                Catch::Register(1),
                script(|c| {
                    c.push(&[Item::Reg(1)]).op(Opcode::Trace);
                }),
            )),
            None,
        );
    }));
    assert_eq!(player.lines(), vec!["7"]);
}

#[test]
fn test_finally_runs_once_without_throw() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.try_block(
            script(|t| {
                t.trace("body");
            }),
            None,
            Some(script(|f| {
                f.trace("finally");
            })),
        );
        a.trace("done");
    }));
    assert_eq!(player.lines(), vec!["body", "finally", "done"]);
}

#[test]
fn test_jump_over_catch_runs_finally_once() {
    let handler = || {
        script(|c| {
            c.trace("catch");
        })
    };
    let skip = i16::try_from(handler().finish().len()).unwrap();
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.try_block(
            script(|t| {
                t.trace("t").jump_by(skip);
            }),
            Some((Catch::Name("e"), handler())),
            Some(script(|f| {
                f.trace("finally");
            })),
        );
        a.trace("after");
    }));
    assert_eq!(player.lines(), vec!["t", "finally", "after"]);
}

#[test]
fn test_catch_then_finally_run_once_each() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.try_block(
            script(|t| {
                t.push_int(1).op(Opcode::Throw);
            }),
            Some((
                Catch::Name("e"),
                script(|c| {
                    c.trace("catch");
                }),
            )),
            Some(script(|f| {
                f.trace("finally");
            })),
        );
        a.trace("after");
    }));
    assert_eq!(player.lines(), vec!["catch", "finally", "after"]);
}

#[test]
fn test_uncaught_throw_runs_finally_then_fails() {
    let mut player = Player::new(7);
    let result = player.run(script(|a| {
        a.try_block(
            script(|t| {
                t.push_str("x").op(Opcode::Throw);
            }),
            None,
            Some(script(|f| {
                f.trace("cleanup");
            })),
        );
        a.trace("unreachable");
    }));
    match result {
        Err(VmError::UncaughtException(value)) => assert_eq!(value, Value::from("x")),
        other => panic!("expected an uncaught exception, got {other:?}"),
    }
    assert_eq!(player.lines(), vec!["cleanup"]);
}

#[test]
fn test_throw_in_catch_goes_through_finally() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.try_block(
            script(|outer| {
                outer.try_block(
                    script(|t| {
                        t.push_str("first").op(Opcode::Throw);
                    }),
                    Some((
                        Catch::Name("e"),
                        script(|c| {
                            c.push_str("second").op(Opcode::Throw);
                        }),
                    )),
                    Some(script(|f| {
                        f.trace("inner finally");
                    })),
                );
            }),
            Some((
                Catch::Name("e"),
                script(|c| {
                    c.trace_var("e");
                }),
            )),
            None,
        );
    }));
    assert_eq!(player.lines(), vec!["inner finally", "second"]);
}

#[test]
fn test_throw_from_function_reaches_caller() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.function(
            "f",
            &[],
            script(|body| {
                body.push_str("inner").op(Opcode::Throw);
            }),
        );
        a.try_block(
            script(|t| {
                t.push(&[Item::Int(0), Item::Str("f")])
                    .op(Opcode::CallFunction)
                    .op(Opcode::Pop)
                    .trace("not reached");
            }),
            Some((
                Catch::Name("e"),
                script(|c| {
                    c.trace_var("e");
                }),
            )),
            None,
        );
    }));
    assert_eq!(player.lines(), vec!["inner"]);
}

#[test]
fn test_return_inside_try_runs_finally() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.function(
            "g",
            &[],
            script(|body| {
                body.try_block(
                    script(|t| {
                        t.push_str("r").op(Opcode::Return);
                    }),
                    None,
                    Some(script(|f| {
                        f.trace("fin");
                    })),
                );
                body.trace("not reached");
            }),
        );
        a.push(&[Item::Int(0), Item::Str("g")])
            .op(Opcode::CallFunction)
            .op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["fin", "r"]);
}

// Limits

#[test]
fn test_backward_branch_limit() {
    let config = VmConfig::default().with_branch_limit(10);
    let mut player = Player::with_config(6, Timeline::new(1), config);
    let result = player.run(script(|a| {
        a.label("top").jump("top");
    }));
    assert!(matches!(
        result,
        Err(VmError::ScriptLimit {
            kind: LimitKind::Branches,
            limit: 10
        })
    ));
}

#[test]
fn test_recursion_limit() {
    let config = VmConfig::default().with_recursion_limit(16);
    let mut player = Player::with_config(6, Timeline::new(1), config);
    let result = player.run(script(|a| {
        a.function(
            "f",
            &[],
            script(|body| {
                body.push(&[Item::Int(0), Item::Str("f")]).op(Opcode::CallFunction);
            }),
        );
        a.push(&[Item::Int(0), Item::Str("f")]).op(Opcode::CallFunction);
    }));
    assert!(matches!(
        result,
        Err(VmError::ScriptLimit {
            kind: LimitKind::Recursion,
            limit: 16
        })
    ));
    assert_eq!(player.env.call_depth(), 0);
}

// Stack balance

#[test]
fn test_leftover_values_are_dropped() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.push(&[Item::Int(1), Item::Int(2), Item::Int(3)]);
    }));
    assert_eq!(player.env.stack_size(), 0);
}

#[test]
fn test_leftover_values_kept_without_enforcement() {
    let config = VmConfig::default().with_stack_enforcement(false);
    let mut player = Player::with_config(6, Timeline::new(1), config);
    player.exec(script(|a| {
        a.push(&[Item::Int(1), Item::Int(2), Item::Int(3)]);
    }));
    assert_eq!(player.env.stack_size(), 3);
}

#[test]
fn test_pop_on_empty_stack_is_undefined() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["undefined"]);
}

// Malformed input

#[test]
fn test_truncated_action_ends_buffer() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.trace("a").raw(&[0x96, 0x10]);
    }));
    assert_eq!(player.lines(), vec!["a"]);
}

#[test]
fn test_truncated_action_fails_when_strict() {
    let config = VmConfig::default().with_strict_decoding(true);
    let mut player = Player::with_config(6, Timeline::new(1), config);
    let result = player.run(script(|a| {
        a.trace("a").raw(&[0x96, 0x10]);
    }));
    assert!(matches!(result, Err(VmError::Decode(_))));
}

#[test]
fn test_unknown_opcode_is_skipped() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.raw(&[0x01]).trace("ok");
    }));
    assert_eq!(player.lines(), vec!["ok"]);
}

#[test]
fn test_constant_pool_pushes() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.constant_pool(&["greeting", "hi"])
            .push(&[Item::Const(0), Item::Const(1)])
            .op(Opcode::SetVariable)
            .push(&[Item::Const(0)])
            .op(Opcode::GetVariable)
            .op(Opcode::Trace)
            .push(&[Item::Const(9)])
            .op(Opcode::TypeOf)
            .op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["hi", "undefined"]);
}

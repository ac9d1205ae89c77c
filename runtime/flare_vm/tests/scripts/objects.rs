//! Members, construction, prototypes, enumeration, and deletion.

use flare_ir::Opcode;
use flare_value::Value;
use pretty_assertions::assert_eq;

use crate::common::{script, Asm, Item, Player};

/// `name = {key: value}`.
fn make_object(a: &mut Asm, name: &str, key: &str, value: i32) {
    a.push(&[Item::Str(name), Item::Str(key), Item::Int(value), Item::Int(1)])
        .op(Opcode::InitObject)
        .op(Opcode::SetVariable);
}

/// `trace(object.member)`.
fn trace_member(a: &mut Asm, object: &str, member: &str) {
    a.get(object).push_str(member).op(Opcode::GetMember).op(Opcode::Trace);
}

/// `function name(x) { this.x = x; }`
fn define_point(a: &mut Asm) {
    a.function(
        "Point",
        &["x"],
        script(|body| {
            body.get("this").push_str("x").get("x").op(Opcode::SetMember);
        }),
    );
}

// Members

#[test]
fn test_init_object_and_members() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.push(&[
            Item::Str("o"),
            Item::Str("a"),
            Item::Int(1),
            Item::Str("b"),
            Item::Str("two"),
            Item::Int(2),
        ])
        .op(Opcode::InitObject)
        .op(Opcode::SetVariable);
        trace_member(a, "o", "a");
        trace_member(a, "o", "b");
        a.get("o").push(&[Item::Str("c"), Item::Int(3)]).op(Opcode::SetMember);
        trace_member(a, "o", "c");
    }));
    assert_eq!(player.lines(), vec!["1", "two", "3"]);
}

#[test]
fn test_member_names_fold_case_before_v7() {
    let mut legacy = Player::new(6);
    legacy.exec(script(|a| {
        make_object(a, "o", "Name", 1);
        trace_member(a, "o", "name");
    }));
    assert_eq!(legacy.lines(), vec!["1"]);

    let mut modern = Player::new(7);
    modern.exec(script(|a| {
        make_object(a, "o", "Name", 1);
        trace_member(a, "o", "name");
    }));
    assert_eq!(modern.lines(), vec!["undefined"]);
}

#[test]
fn test_string_length_member() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.push(&[Item::Str("h\u{e9}llo"), Item::Str("length")])
            .op(Opcode::GetMember)
            .op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["5"]);
}

#[test]
fn test_member_of_primitive_is_undefined() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.push(&[Item::Int(3), Item::Str("x")])
            .op(Opcode::GetMember)
            .op(Opcode::Trace);
        a.push(&[Item::Int(3), Item::Str("x"), Item::Int(1)])
            .op(Opcode::SetMember);
    }));
    assert_eq!(player.lines(), vec!["undefined"]);
    assert_eq!(player.env.stack_size(), 0);
}

#[test]
fn test_init_array() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.push(&[
            Item::Str("arr"),
            Item::Int(30),
            Item::Int(20),
            Item::Int(10),
            Item::Int(3),
        ])
        .op(Opcode::InitArray)
        .op(Opcode::SetVariable);
        trace_member(a, "arr", "length");
        trace_member(a, "arr", "0");
        a.trace_var("arr");
    }));
    assert_eq!(player.lines(), vec!["3", "10", "10,20,30"]);
}

// Construction and prototypes

#[test]
fn test_new_runs_script_constructor() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        define_point(a);
        a.push(&[Item::Str("p"), Item::Int(7), Item::Int(1), Item::Str("Point")])
            .op(Opcode::NewObject)
            .op(Opcode::SetVariable);
        trace_member(a, "p", "x");
        a.get("p").get("Point").op(Opcode::InstanceOf).op(Opcode::Trace);
        a.get("p").op(Opcode::TypeOf).op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["7", "true", "object"]);
}

#[test]
fn test_prototype_methods_are_inherited() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        define_point(a);
        a.get("Point")
            .push_str("prototype")
            .op(Opcode::GetMember)
            .push_str("twice")
            .function(
                "",
                &[],
                script(|body| {
                    body.get("this")
                        .push_str("x")
                        .op(Opcode::GetMember)
                        .push_int(2)
                        .op(Opcode::Multiply)
                        .op(Opcode::Return);
                }),
            )
            .op(Opcode::SetMember);
        a.push(&[Item::Str("p"), Item::Int(7), Item::Int(1), Item::Str("Point")])
            .op(Opcode::NewObject)
            .op(Opcode::SetVariable);
        a.push_int(0)
            .get("p")
            .push_str("twice")
            .op(Opcode::CallMethod)
            .op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["14"]);
}

#[test]
fn test_extends_and_super_constructor() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.function(
            "A",
            &[],
            script(|body| {
                body.get("this").push(&[Item::Str("a"), Item::Int(1)]).op(Opcode::SetMember);
            }),
        );
        a.function(
            "B",
            &[],
            script(|body| {
                body.push(&[Item::Int(0), Item::Str("super")])
                    .op(Opcode::CallFunction)
                    .op(Opcode::Pop)
                    .get("this")
                    .push(&[Item::Str("b"), Item::Int(2)])
                    .op(Opcode::SetMember);
            }),
        );
        a.get("B").get("A").op(Opcode::Extends);
        a.push(&[Item::Str("obj"), Item::Int(0), Item::Str("B")])
            .op(Opcode::NewObject)
            .op(Opcode::SetVariable);
        trace_member(a, "obj", "a");
        trace_member(a, "obj", "b");
        a.get("obj").get("A").op(Opcode::InstanceOf).op(Opcode::Trace);
        a.get("obj").get("B").op(Opcode::InstanceOf).op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["1", "2", "true", "true"]);
}

#[test]
fn test_new_method_constructs_member() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        make_object(a, "lib", "unused", 0);
        a.get("lib")
            .push_str("Make")
            .function(
                "",
                &[],
                script(|body| {
                    body.get("this").push(&[Item::Str("k"), Item::Int(5)]).op(Opcode::SetMember);
                }),
            )
            .op(Opcode::SetMember);
        a.push_str("made")
            .push_int(0)
            .get("lib")
            .push_str("Make")
            .op(Opcode::NewMethod)
            .op(Opcode::SetVariable);
        trace_member(a, "made", "k");
    }));
    assert_eq!(player.lines(), vec!["5"]);
}

#[test]
fn test_new_native_object() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.push(&[Item::Int(0), Item::Str("Object")])
            .op(Opcode::NewObject)
            .op(Opcode::TypeOf)
            .op(Opcode::Trace);
        a.push(&[Item::Int(0), Item::Str("Nothing")])
            .op(Opcode::NewObject)
            .op(Opcode::TypeOf)
            .op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["object", "undefined"]);
}

#[test]
fn test_implements_and_cast() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        a.function("Iface", &[], script(|_| {}));
        a.function("Impl", &[], script(|_| {}));
        a.function("Other", &[], script(|_| {}));
        a.get("Iface").push_int(1).get("Impl").op(Opcode::ImplementsOp);
        a.push(&[Item::Str("obj"), Item::Int(0), Item::Str("Impl")])
            .op(Opcode::NewObject)
            .op(Opcode::SetVariable);
        a.get("obj").get("Iface").op(Opcode::InstanceOf).op(Opcode::Trace);
        a.get("Iface").get("obj").op(Opcode::CastOp).op(Opcode::TypeOf).op(Opcode::Trace);
        a.get("Other").get("obj").op(Opcode::CastOp).op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["true", "object", "null"]);
}

// Enumeration and deletion

/// Pop names pushed by `Enumerate` until the `undefined` sentinel.
fn trace_enumerated(a: &mut Asm) {
    a.label("next")
        .store_register(0)
        .push(&[Item::Null])
        .op(Opcode::Equals2)
        .if_true("done")
        .push(&[Item::Reg(0)])
        .op(Opcode::Trace)
        .jump("next")
        .label("done");
}

#[test]
fn test_enumerate_lists_members_then_sentinel() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.push(&[
            Item::Str("o"),
            Item::Str("a"),
            Item::Int(1),
            Item::Str("b"),
            Item::Int(2),
            Item::Int(2),
        ])
        .op(Opcode::InitObject)
        .op(Opcode::SetVariable);
        a.push_str("o").op(Opcode::Enumerate);
        trace_enumerated(a);
    }));
    let mut names = player.lines();
    names.sort_unstable();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(player.env.stack_size(), 0);
}

#[test]
fn test_enumerate2_of_primitive_pushes_only_sentinel() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.push_int(5).op(Opcode::Enumerate2);
        trace_enumerated(a);
        a.trace("end");
    }));
    assert_eq!(player.lines(), vec!["end"]);
}

#[test]
fn test_delete_member_and_variable() {
    let mut player = Player::new(7);
    player.exec(script(|a| {
        make_object(a, "o", "a", 1);
        a.get("o").push_str("a").op(Opcode::Delete).op(Opcode::Trace);
        trace_member(a, "o", "a");
        a.set_int("x", 1);
        a.push_str("x").op(Opcode::Delete2).op(Opcode::Trace);
        a.push_str("x").op(Opcode::Delete2).op(Opcode::Trace);
    }));
    assert_eq!(player.lines(), vec!["true", "undefined", "true", "false"]);
    assert_eq!(player.var("x"), Value::Undefined);
}

#[test]
fn test_delete_path_before_v7() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        make_object(a, "o", "a", 1);
        a.push_str("o.a").op(Opcode::Delete).op(Opcode::Trace);
        trace_member(a, "o", "a");
    }));
    assert_eq!(player.lines(), vec!["true", ""]);
}

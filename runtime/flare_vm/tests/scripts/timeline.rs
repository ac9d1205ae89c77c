//! Targets, frame control, display properties, and host services.

use flare_ir::Opcode;
use flare_stage::{ClipHandle, Timeline};
use flare_value::DisplayObject;
use flare_vm::{DragBounds, DragState, HostEvent, LimitKind, SendVars, UrlRequest, VmConfig, VmError};
use pretty_assertions::assert_eq;

use crate::common::{script, Asm, Item, Player};

/// Property indices used below.
const X: i32 = 0;
const CURRENT_FRAME: i32 = 4;
const TOTAL_FRAMES: i32 = 5;
const TARGET: i32 = 11;
const NAME: i32 = 13;

/// A player whose root has five frames ("end" labels the fourth) and a
/// three-frame child `mc`.
fn stage_with_child(version: u8) -> (Player, ClipHandle) {
    let player = Player::with_timeline(version, Timeline::new(5).with_label(3, "end"));
    let mc = player.root().add_child("mc", 1, Timeline::new(3));
    (player, mc)
}

/// `trace(getProperty(target, index))`.
fn trace_property(a: &mut Asm, target: &str, index: i32) {
    a.push(&[Item::Str(target), Item::Int(index)])
        .op(Opcode::GetProperty)
        .op(Opcode::Trace);
}

// Targets

#[test]
fn test_set_target_and_reset() {
    let (mut player, _mc) = stage_with_child(6);
    player.exec(script(|a| {
        a.set_target("mc").set_int("v", 1).set_target("").set_int("v", 2);
        a.trace_var("mc.v").trace_var("v");
    }));
    assert_eq!(player.lines(), vec!["1", "2"]);
}

#[test]
fn test_target_is_restored_after_run() {
    let (mut player, _mc) = stage_with_child(6);
    player.exec(script(|a| {
        a.set_target("mc");
    }));
    let target = player.env.target().cloned();
    assert!(target.is_some_and(|t| t.ptr_eq(&player.root().object)));
}

#[test]
fn test_set_target2_with_clip_value() {
    let (mut player, _mc) = stage_with_child(6);
    player.exec(script(|a| {
        a.get("mc").op(Opcode::SetTarget2).set_int("z", 3);
        a.push_str("").op(Opcode::SetTarget2);
        a.trace_var("mc.z").trace_var("_root.mc.z").trace_var("/mc:z");
    }));
    assert_eq!(player.lines(), vec!["3", "3", "3"]);
}

#[test]
fn test_target_path_is_dotted() {
    let (mut player, mc) = stage_with_child(6);
    mc.add_child("inner", 1, Timeline::new(1));
    player.exec(script(|a| {
        a.get("mc").op(Opcode::TargetPath).op(Opcode::Trace);
        a.get("mc.inner").op(Opcode::TargetPath).op(Opcode::Trace);
        a.push_int(1).op(Opcode::TargetPath).op(Opcode::TypeOf).op(Opcode::Trace);
        a.get("_root").op(Opcode::TypeOf).op(Opcode::Trace);
    }));
    assert_eq!(
        player.lines(),
        vec!["_level0.mc", "_level0.mc.inner", "undefined", "movieclip"]
    );
}

#[test]
fn test_parent_references() {
    let (mut player, mc) = stage_with_child(6);
    mc.add_child("inner", 1, Timeline::new(1));
    player.exec(script(|a| {
        a.set_int("top", 7);
        a.set_target("mc/inner").trace_var("_parent._parent.top").trace_var("../../:top");
    }));
    assert_eq!(player.lines(), vec!["7", "7"]);
}

// Frames

#[test]
fn test_goto_frame_and_label() {
    let (mut player, _mc) = stage_with_child(6);
    player.exec(script(|a| {
        a.goto_frame(2);
        trace_property(a, "", CURRENT_FRAME);
        a.goto_label("END");
        trace_property(a, "", CURRENT_FRAME);
        a.goto_label("nowhere");
        trace_property(a, "", CURRENT_FRAME);
    }));
    assert_eq!(player.lines(), vec!["3", "4", "4"]);
    assert!(player.root().clip.is_playing());
}

#[test]
fn test_goto_frame2_plays_or_stops() {
    let (mut player, _mc) = stage_with_child(6);
    player.exec(script(|a| {
        a.push_str("end").goto_frame2(false, None);
        trace_property(a, "", CURRENT_FRAME);
    }));
    assert!(!player.root().clip.is_playing());

    player.exec(script(|a| {
        a.push_int(2).goto_frame2(true, Some(1));
        trace_property(a, "", CURRENT_FRAME);
        a.push_str("mc:2").goto_frame2(false, None);
        trace_property(a, "mc", CURRENT_FRAME);
    }));
    assert!(player.root().clip.is_playing());
    assert_eq!(player.lines(), vec!["4", "3", "2"]);
}

#[test]
fn test_play_stop_and_step() {
    let (mut player, _mc) = stage_with_child(6);
    player.exec(script(|a| {
        a.op(Opcode::Stop);
        a.op(Opcode::NextFrame).op(Opcode::NextFrame).op(Opcode::PrevFrame);
        trace_property(a, "", CURRENT_FRAME);
    }));
    assert_eq!(player.lines(), vec!["2"]);
    assert!(!player.root().clip.is_playing());

    player.exec(script(|a| {
        a.op(Opcode::Play);
    }));
    assert!(player.root().clip.is_playing());
}

#[test]
fn test_wait_for_frame_skips_until_loaded() {
    let timeline = Timeline::new(5).with_loaded(2);
    let mut player = Player::with_timeline(6, timeline);
    player.exec(script(|a| {
        // Each trace is a push and a Trace action.
        a.wait_for_frame(4, 2).trace("skipped");
        a.wait_for_frame(1, 2).trace("loaded");
        a.push_str("5").wait_for_frame2(4).trace("skipped").trace("skipped too");
        a.trace("after");
    }));
    assert_eq!(player.lines(), vec!["loaded", "after"]);
}

#[test]
fn test_call_runs_frame_actions_on_their_clip() {
    let frame_code = script(|a| {
        a.trace("frame two").set_int("ran", 1);
    })
    .build(6);
    let mut player = Player::with_timeline(6, Timeline::new(1));
    let mc = player
        .root()
        .add_child("mc", 1, Timeline::new(3).with_actions(1, frame_code).with_label(1, "two"));
    player.exec(script(|a| {
        a.push_str("mc:2").op(Opcode::Call);
        a.push_str("mc:two").op(Opcode::Call);
        a.push_str("mc:3").op(Opcode::Call);
        a.trace_var("mc.ran");
    }));
    assert_eq!(player.lines(), vec!["frame two", "frame two", "1"]);
    assert!(mc.object.get_member("ran", flare_value::NameCase::Sensitive).is_some());
}

#[test]
fn test_call_nesting_is_limited() {
    let looping = script(|a| {
        a.push_str("1").op(Opcode::Call);
    })
    .build(6);
    let config = VmConfig::default().with_recursion_limit(8);
    let timeline = Timeline::new(1).with_actions(0, looping);
    let mut player = Player::with_config(6, timeline, config);
    let result = player.run(script(|a| {
        a.push_str("1").op(Opcode::Call);
    }));
    assert!(matches!(
        result,
        Err(VmError::ScriptLimit {
            kind: LimitKind::Recursion,
            limit: 8
        })
    ));
    assert!(player.env.target().is_some_and(|t| t.ptr_eq(&player.root().object)));
}

// Properties

#[test]
fn test_get_and_set_property() {
    let (mut player, mc) = stage_with_child(7);
    player.exec(script(|a| {
        a.push(&[Item::Str("mc"), Item::Int(X), Item::Int(42)])
            .op(Opcode::SetProperty);
        trace_property(a, "mc", X);
        trace_property(a, "mc", NAME);
        trace_property(a, "mc", TARGET);
        trace_property(a, "mc", TOTAL_FRAMES);
        trace_property(a, "mc", 99);
        trace_property(a, "missing", X);
    }));
    assert_eq!(
        player.lines(),
        vec!["42", "mc", "/mc", "3", "undefined", "undefined"]
    );
    assert_eq!(mc.clip.property(flare_value::DisplayProperty::X), flare_value::Value::Number(42.0));
}

#[test]
fn test_name_property_renames_clip() {
    let (mut player, _mc) = stage_with_child(6);
    player.exec(script(|a| {
        a.push(&[Item::Str("mc"), Item::Int(NAME), Item::Str("renamed")])
            .op(Opcode::SetProperty);
        trace_property(a, "renamed", NAME);
    }));
    assert_eq!(player.lines(), vec!["renamed"]);
}

// Sprites

#[test]
fn test_clone_and_remove_sprite() {
    let (mut player, _mc) = stage_with_child(7);
    player.exec(script(|a| {
        a.push(&[Item::Str("mc"), Item::Int(X), Item::Int(5)])
            .op(Opcode::SetProperty);
        a.push(&[Item::Str("mc"), Item::Str("copy"), Item::Int(16_384 + 2)])
            .op(Opcode::CloneSprite);
        trace_property(a, "copy", NAME);
        trace_property(a, "copy", X);
        a.push_str("copy").op(Opcode::RemoveSprite);
        trace_property(a, "copy", NAME);
    }));
    assert_eq!(player.lines(), vec!["copy", "5", "undefined"]);
}

#[test]
fn test_removing_own_clip_ends_the_buffer() {
    let (mut player, mc) = stage_with_child(7);
    player.env.set_target(Some(mc.object.clone()));
    player.exec(script(|a| {
        a.trace("before").push_str("/mc").op(Opcode::RemoveSprite).trace("after");
    }));
    assert_eq!(player.lines(), vec!["before"]);
    assert!(player.root().clip.children().is_empty());
}

#[test]
fn test_clone_of_root_is_refused() {
    let (mut player, _mc) = stage_with_child(7);
    player.exec(script(|a| {
        a.push(&[Item::Str("/"), Item::Str("copy"), Item::Int(16_385)])
            .op(Opcode::CloneSprite);
        trace_property(a, "copy", NAME);
    }));
    assert_eq!(player.lines(), vec!["undefined"]);
}

// Host services

#[test]
fn test_start_and_end_drag() {
    let (mut player, mc) = stage_with_child(6);
    player.exec(script(|a| {
        a.push(&[
            Item::Int(10),
            Item::Int(20),
            Item::Int(0),
            Item::Int(5),
            Item::Int(1),
            Item::Bool(true),
            Item::Str("mc"),
        ])
        .op(Opcode::StartDrag)
        .op(Opcode::EndDrag);
    }));
    let expected = vec![
        HostEvent::Drag(DragState {
            target: mc.object.clone(),
            lock_center: true,
            bounds: Some(DragBounds {
                x0: 0.0,
                y0: 5.0,
                x1: 10.0,
                y1: 20.0,
            }),
        }),
        HostEvent::ClearDrag,
    ];
    assert_eq!(player.events(), expected.as_slice());
}

#[test]
fn test_get_url_requests() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.get_url("http://example.com/", "_blank");
        a.get_url("FSCommand:quit", "true");
        a.push(&[Item::Str("page.html"), Item::Str("_self")]).get_url2(0x01);
        a.push(&[Item::Undefined, Item::Str("_self")]).get_url2(0x00);
    }));
    let expected = vec![
        HostEvent::Url(UrlRequest {
            url: "http://example.com/".to_owned(),
            target: "_blank".to_owned(),
            method: SendVars::None,
            load_target: false,
            load_variables: false,
        }),
        HostEvent::FsCommand {
            command: "quit".to_owned(),
            args: vec!["true".to_owned()],
        },
        HostEvent::Url(UrlRequest {
            url: "page.html".to_owned(),
            target: "_self".to_owned(),
            method: SendVars::Get,
            load_target: false,
            load_variables: false,
        }),
    ];
    assert_eq!(player.events(), expected.as_slice());
}

#[test]
fn test_fs_command2_leaves_operands() {
    let config = VmConfig::default().with_stack_enforcement(false);
    let mut player = Player::with_config(7, Timeline::new(1), config);
    player.exec(script(|a| {
        a.push(&[Item::Str("b"), Item::Str("a"), Item::Str("cmd"), Item::Int(3)])
            .op(Opcode::FsCommand2);
    }));
    assert_eq!(
        player.events(),
        &[HostEvent::FsCommand {
            command: "cmd".to_owned(),
            args: vec!["a".to_owned(), "b".to_owned()],
        }]
    );
    assert_eq!(player.env.stack_size(), 4);
}

#[test]
fn test_time_and_random_come_from_host() {
    let mut player = Player::new(6);
    player.host.advance(1500);
    player.exec(script(|a| {
        a.op(Opcode::GetTime).op(Opcode::Trace);
        for _ in 0..20 {
            a.push_int(10).op(Opcode::RandomNumber).op(Opcode::Trace);
        }
    }));
    let lines = player.lines();
    assert_eq!(lines[0], "1500");
    for line in &lines[1..] {
        let n: u32 = line.parse().expect("integer");
        assert!(n < 10);
    }
}

#[test]
fn test_quality_and_sounds() {
    let mut player = Player::new(6);
    player.exec(script(|a| {
        a.op(Opcode::ToggleQuality).op(Opcode::StopSounds);
    }));
    assert_eq!(
        player.events(),
        &[HostEvent::ToggleQuality, HostEvent::StopSounds]
    );
}

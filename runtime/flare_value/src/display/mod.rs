//! The scene-graph contract seen by the VM.
//!
//! A scene-graph node is an [`Object`] whose kind is
//! [`ObjectKind::Display`](crate::ObjectKind::Display). Scripts cannot
//! tell it apart from a plain object: members, prototypes, and enumeration
//! all work the same. The node's own state (name, depth, frames, transform)
//! is reached through the [`DisplayObject`] trait, which the host implements.
//!
//! Parent links are expected to be weak (see [`WeakObject`](crate::WeakObject))
//! so that a removed subtree is freed once scripts drop their references.

use std::fmt;

use flare_ir::{CodeBuffer, Version};

use crate::{NameCase, Object, Value};

/// The indexed properties addressed by `GetProperty`/`SetProperty`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DisplayProperty {
    X,
    Y,
    XScale,
    YScale,
    CurrentFrame,
    TotalFrames,
    Alpha,
    Visible,
    Width,
    Height,
    Rotation,
    Target,
    FramesLoaded,
    Name,
    DropTarget,
    Url,
    HighQuality,
    FocusRect,
    SoundBufTime,
    Quality,
    XMouse,
    YMouse,
}

impl DisplayProperty {
    pub const ALL: [DisplayProperty; 22] = [
        DisplayProperty::X,
        DisplayProperty::Y,
        DisplayProperty::XScale,
        DisplayProperty::YScale,
        DisplayProperty::CurrentFrame,
        DisplayProperty::TotalFrames,
        DisplayProperty::Alpha,
        DisplayProperty::Visible,
        DisplayProperty::Width,
        DisplayProperty::Height,
        DisplayProperty::Rotation,
        DisplayProperty::Target,
        DisplayProperty::FramesLoaded,
        DisplayProperty::Name,
        DisplayProperty::DropTarget,
        DisplayProperty::Url,
        DisplayProperty::HighQuality,
        DisplayProperty::FocusRect,
        DisplayProperty::SoundBufTime,
        DisplayProperty::Quality,
        DisplayProperty::XMouse,
        DisplayProperty::YMouse,
    ];

    /// Property for a `GetProperty`/`SetProperty` index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            DisplayProperty::X => "_x",
            DisplayProperty::Y => "_y",
            DisplayProperty::XScale => "_xscale",
            DisplayProperty::YScale => "_yscale",
            DisplayProperty::CurrentFrame => "_currentframe",
            DisplayProperty::TotalFrames => "_totalframes",
            DisplayProperty::Alpha => "_alpha",
            DisplayProperty::Visible => "_visible",
            DisplayProperty::Width => "_width",
            DisplayProperty::Height => "_height",
            DisplayProperty::Rotation => "_rotation",
            DisplayProperty::Target => "_target",
            DisplayProperty::FramesLoaded => "_framesloaded",
            DisplayProperty::Name => "_name",
            DisplayProperty::DropTarget => "_droptarget",
            DisplayProperty::Url => "_url",
            DisplayProperty::HighQuality => "_highquality",
            DisplayProperty::FocusRect => "_focusrect",
            DisplayProperty::SoundBufTime => "_soundbuftime",
            DisplayProperty::Quality => "_quality",
            DisplayProperty::XMouse => "_xmouse",
            DisplayProperty::YMouse => "_ymouse",
        }
    }

    /// Property named `name`, matched under `case`.
    pub fn from_name(name: &str, case: NameCase) -> Option<Self> {
        if !name.starts_with('_') {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|prop| case.matches(prop.name(), name))
    }

    /// Whether assignments through `SetProperty` are ignored.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            DisplayProperty::CurrentFrame
                | DisplayProperty::TotalFrames
                | DisplayProperty::Target
                | DisplayProperty::FramesLoaded
                | DisplayProperty::DropTarget
                | DisplayProperty::Url
                | DisplayProperty::XMouse
                | DisplayProperty::YMouse
        )
    }
}

/// Host-side state of one scene-graph node.
///
/// Frame numbers are zero-based indices; `_currentframe` reports them
/// one-based.
pub trait DisplayObject: fmt::Debug {
    fn name(&self) -> String;

    fn set_name(&self, name: &str);

    fn parent(&self) -> Option<Object>;

    /// Direct child named `name`.
    fn child(&self, name: &str, case: NameCase) -> Option<Object>;

    /// Direct children in depth order.
    fn children(&self) -> Vec<Object>;

    fn depth(&self) -> i32;

    /// Level number when this node is the root of a level.
    fn level(&self) -> Option<u32>;

    /// `false` for buttons, text fields, and other non-timeline nodes.
    fn is_movie_clip(&self) -> bool {
        true
    }

    /// Value of an indexed property. `_target` and `_name` are computed by
    /// [`get_property`] from the tree and need not be handled here.
    fn property(&self, prop: DisplayProperty) -> Value;

    fn set_property(&self, prop: DisplayProperty, value: &Value, version: Version);

    fn current_frame(&self) -> u32;

    fn total_frames(&self) -> u32;

    fn frames_loaded(&self) -> u32 {
        self.total_frames()
    }

    fn goto_frame(&self, frame: u32);

    fn frame_for_label(&self, label: &str) -> Option<u32>;

    fn play(&self);

    fn stop(&self);

    fn next_frame(&self) {
        let next = self.current_frame().saturating_add(1);
        if next < self.total_frames() {
            self.goto_frame(next);
        }
        self.stop();
    }

    fn prev_frame(&self) {
        if let Some(prev) = self.current_frame().checked_sub(1) {
            self.goto_frame(prev);
        }
        self.stop();
    }

    /// Actions attached to `frame`, run by the `Call` opcode.
    fn frame_actions(&self, _frame: u32) -> Option<CodeBuffer> {
        None
    }

    /// Copy `this` into a sibling named `name` at `depth`.
    fn duplicate(&self, this: &Object, name: &str, depth: i32) -> Option<Object>;

    /// Detach `this` from its parent. Returns `false` when refused.
    fn remove(&self, this: &Object) -> bool;

    /// `true` once the node has been removed from the display list.
    fn is_unloaded(&self) -> bool {
        false
    }
}

/// Read an indexed property, computing the tree-derived ones.
pub fn get_property(node: &Object, display: &dyn DisplayObject, prop: DisplayProperty) -> Value {
    match prop {
        DisplayProperty::Target => Value::string(target_path(node)),
        DisplayProperty::Name => Value::string(display.name()),
        other => display.property(other),
    }
}

/// The topmost ancestor of a node (the node itself for a level root).
pub fn root_of(node: &Object) -> Object {
    let mut current = node.clone();
    while let Some(parent) = current.display().and_then(|d| d.parent()) {
        current = parent;
    }
    current
}

fn level_prefix(root: &Object) -> String {
    match root.display().and_then(|d| d.level()) {
        Some(0) | None => String::new(),
        Some(n) => format!("_level{n}"),
    }
}

fn path_names(node: &Object) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = node.clone();
    while let Some(display) = current.display() {
        let Some(parent) = display.parent() else {
            break;
        };
        names.push(display.name());
        current = parent;
    }
    names.reverse();
    names
}

/// Slash-form path: `/` for level 0, `/a/b` below it, `_level1/a` on
/// other levels.
pub fn target_path(node: &Object) -> String {
    let prefix = level_prefix(&root_of(node));
    let names = path_names(node);
    if names.is_empty() {
        return if prefix.is_empty() {
            "/".to_owned()
        } else {
            prefix
        };
    }
    format!("{prefix}/{}", names.join("/"))
}

/// Dot-form path: `_level0`, `_level0.a.b`.
pub fn dot_path(node: &Object) -> String {
    let root = root_of(node);
    let level = root.display().and_then(|d| d.level()).unwrap_or(0);
    let mut path = format!("_level{level}");
    for name in path_names(node) {
        path.push('.');
        path.push_str(&name);
    }
    path
}

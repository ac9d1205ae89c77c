//! Movie clips.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use flare_ir::{CodeBuffer, Version};
use flare_value::{DisplayObject, DisplayProperty, NameCase, Object, Value, WeakObject};
use rustc_hash::FxHashMap;

use crate::Timeline;

#[derive(Clone, Debug, PartialEq)]
struct Transform {
    x: f64,
    y: f64,
    xscale: f64,
    yscale: f64,
    rotation: f64,
    alpha: f64,
    visible: bool,
    width: f64,
    height: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            x: 0.0,
            y: 0.0,
            xscale: 100.0,
            yscale: 100.0,
            rotation: 0.0,
            alpha: 100.0,
            visible: true,
            width: 0.0,
            height: 0.0,
        }
    }
}

impl Transform {
    fn slot(&mut self, prop: DisplayProperty) -> Option<&mut f64> {
        Some(match prop {
            DisplayProperty::X => &mut self.x,
            DisplayProperty::Y => &mut self.y,
            DisplayProperty::XScale => &mut self.xscale,
            DisplayProperty::YScale => &mut self.yscale,
            DisplayProperty::Rotation => &mut self.rotation,
            DisplayProperty::Alpha => &mut self.alpha,
            DisplayProperty::Width => &mut self.width,
            DisplayProperty::Height => &mut self.height,
            _ => return None,
        })
    }
}

struct ParentLink {
    object: WeakObject,
    clip: Weak<Clip>,
}

/// A movie clip node.
pub struct Clip {
    name: RefCell<String>,
    depth: Cell<i32>,
    level: Option<u32>,
    parent: RefCell<Option<ParentLink>>,
    /// Sorted by depth, one child per depth.
    children: RefCell<Vec<ClipHandle>>,
    timeline: Rc<Timeline>,
    current: Cell<u32>,
    playing: Cell<bool>,
    transform: RefCell<Transform>,
    /// Player-wide and rarely used properties, stored verbatim.
    extras: RefCell<FxHashMap<DisplayProperty, Value>>,
    /// Set once the clip has left the display list.
    unloaded: Cell<bool>,
}

impl Clip {
    fn new(name: &str, depth: i32, level: Option<u32>, timeline: Rc<Timeline>) -> Self {
        Clip {
            name: RefCell::new(name.to_owned()),
            depth: Cell::new(depth),
            level,
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            timeline,
            current: Cell::new(0),
            playing: Cell::new(true),
            transform: RefCell::new(Transform::default()),
            extras: RefCell::new(FxHashMap::default()),
            unloaded: Cell::new(false),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.get()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn parent_clip(&self) -> Option<Rc<Clip>> {
        self.parent.borrow().as_ref().and_then(|link| link.clip.upgrade())
    }

    fn detach_child(&self, child: &Object) -> bool {
        let mut children = self.children.borrow_mut();
        let Some(index) = children.iter().position(|c| c.object.ptr_eq(child)) else {
            return false;
        };
        let removed = children.remove(index);
        drop(children);
        removed.clip.unload();
        true
    }

    /// Drop the parent link and mark this subtree unloaded.
    fn unload(&self) {
        *self.parent.borrow_mut() = None;
        self.mark_unloaded();
    }

    fn mark_unloaded(&self) {
        self.unloaded.set(true);
        for child in self.children.borrow().iter() {
            child.clip.mark_unloaded();
        }
    }

    fn extra(&self, prop: DisplayProperty) -> Option<Value> {
        self.extras.borrow().get(&prop).cloned()
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("name", &*self.name.borrow())
            .field("depth", &self.depth.get())
            .field("level", &self.level)
            .field("frame", &self.current.get())
            .field("children", &self.children.borrow().len())
            .finish_non_exhaustive()
    }
}

impl DisplayObject for Clip {
    fn name(&self) -> String {
        self.name.borrow().clone()
    }

    fn set_name(&self, name: &str) {
        name.clone_into(&mut self.name.borrow_mut());
    }

    fn parent(&self) -> Option<Object> {
        self.parent.borrow().as_ref().and_then(|link| link.object.upgrade())
    }

    fn child(&self, name: &str, case: NameCase) -> Option<Object> {
        self.children
            .borrow()
            .iter()
            .find(|c| case.matches(&c.clip.name.borrow(), name))
            .map(|c| c.object.clone())
    }

    fn children(&self) -> Vec<Object> {
        self.children.borrow().iter().map(|c| c.object.clone()).collect()
    }

    fn depth(&self) -> i32 {
        self.depth.get()
    }

    fn level(&self) -> Option<u32> {
        self.level
    }

    fn property(&self, prop: DisplayProperty) -> Value {
        let t = self.transform.borrow();
        match prop {
            DisplayProperty::X => Value::Number(t.x),
            DisplayProperty::Y => Value::Number(t.y),
            DisplayProperty::XScale => Value::Number(t.xscale),
            DisplayProperty::YScale => Value::Number(t.yscale),
            DisplayProperty::Rotation => Value::Number(t.rotation),
            DisplayProperty::Alpha => Value::Number(t.alpha),
            DisplayProperty::Visible => Value::Bool(t.visible),
            DisplayProperty::Width => Value::Number(t.width),
            DisplayProperty::Height => Value::Number(t.height),
            DisplayProperty::CurrentFrame => {
                Value::Number(f64::from(self.current.get().saturating_add(1)))
            }
            DisplayProperty::TotalFrames => Value::Number(f64::from(self.total_frames())),
            DisplayProperty::FramesLoaded => Value::Number(f64::from(self.frames_loaded())),
            DisplayProperty::Name => Value::string(self.name()),
            DisplayProperty::Target | DisplayProperty::DropTarget | DisplayProperty::Url => {
                self.extra(prop).unwrap_or_else(|| Value::from(""))
            }
            DisplayProperty::HighQuality => self.extra(prop).unwrap_or(Value::Number(1.0)),
            DisplayProperty::FocusRect => self.extra(prop).unwrap_or(Value::Bool(true)),
            DisplayProperty::SoundBufTime => self.extra(prop).unwrap_or(Value::Number(5.0)),
            DisplayProperty::Quality => self.extra(prop).unwrap_or_else(|| Value::from("HIGH")),
            DisplayProperty::XMouse | DisplayProperty::YMouse => Value::Number(0.0),
        }
    }

    fn set_property(&self, prop: DisplayProperty, value: &Value, version: Version) {
        if prop == DisplayProperty::Name {
            self.set_name(&value.to_string(version));
            return;
        }
        if prop == DisplayProperty::Visible {
            self.transform.borrow_mut().visible = value.to_bool(version);
            return;
        }
        let n = value.to_number(version);
        let mut t = self.transform.borrow_mut();
        if let Some(slot) = t.slot(prop) {
            if n.is_nan() {
                tracing::debug!(target: "flare::coding", property = prop.name(), "ignoring NaN assignment");
            } else {
                *slot = n;
            }
            return;
        }
        drop(t);
        self.extras.borrow_mut().insert(prop, value.clone());
    }

    fn current_frame(&self) -> u32 {
        self.current.get()
    }

    fn total_frames(&self) -> u32 {
        self.timeline.total()
    }

    fn frames_loaded(&self) -> u32 {
        self.timeline.loaded()
    }

    fn goto_frame(&self, frame: u32) {
        let last = self.total_frames().saturating_sub(1);
        self.current.set(frame.min(last));
    }

    fn frame_for_label(&self, label: &str) -> Option<u32> {
        self.timeline.find_label(label)
    }

    fn play(&self) {
        self.playing.set(true);
    }

    fn stop(&self) {
        self.playing.set(false);
    }

    fn frame_actions(&self, frame: u32) -> Option<CodeBuffer> {
        self.timeline.frame(frame).and_then(|f| f.actions.clone())
    }

    fn duplicate(&self, this: &Object, name: &str, depth: i32) -> Option<Object> {
        let parent = ClipHandle {
            object: self.parent()?,
            clip: self.parent_clip()?,
        };
        let copy = Clip::new(name, depth, None, Rc::clone(&self.timeline));
        copy.transform.borrow_mut().clone_from(&self.transform.borrow());
        copy.extras.borrow_mut().clone_from(&self.extras.borrow());
        let handle = ClipHandle::wrap(copy, this.proto());
        parent.insert(handle.clone());
        Some(handle.object)
    }

    fn remove(&self, this: &Object) -> bool {
        if self.depth.get() < 0 {
            tracing::debug!(
                target: "flare::coding",
                name = %self.name.borrow(),
                depth = self.depth.get(),
                "clips at negative depths cannot be removed"
            );
            return false;
        }
        self.parent_clip()
            .is_some_and(|parent| parent.detach_child(this))
    }

    fn is_unloaded(&self) -> bool {
        self.unloaded.get()
    }
}

/// A clip together with the script object that exposes it.
#[derive(Clone)]
pub struct ClipHandle {
    pub object: Object,
    pub clip: Rc<Clip>,
}

impl ClipHandle {
    fn wrap(clip: Clip, proto: Option<Object>) -> Self {
        let clip = Rc::new(clip);
        let object = Object::display_node(Rc::clone(&clip) as Rc<dyn DisplayObject>, proto);
        ClipHandle { object, clip }
    }

    /// The root clip of level `level`.
    pub fn root(level: u32, timeline: Timeline) -> Self {
        Self::wrap(Clip::new("", 0, Some(level), Rc::new(timeline)), None)
    }

    /// Create a child named `name` at `depth`, replacing any clip already
    /// at that depth.
    pub fn add_child(&self, name: &str, depth: i32, timeline: Timeline) -> ClipHandle {
        let child = Self::wrap(Clip::new(name, depth, None, Rc::new(timeline)), None);
        self.insert(child.clone());
        child
    }

    fn insert(&self, child: ClipHandle) {
        *child.clip.parent.borrow_mut() = Some(ParentLink {
            object: self.object.downgrade(),
            clip: Rc::downgrade(&self.clip),
        });
        let depth = child.clip.depth.get();
        let mut children = self.clip.children.borrow_mut();
        match children.binary_search_by_key(&depth, |c| c.clip.depth.get()) {
            Ok(index) => {
                let replaced = std::mem::replace(&mut children[index], child);
                replaced.clip.unload();
            }
            Err(index) => children.insert(index, child),
        }
    }
}

impl fmt::Debug for ClipHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClipHandle").field(&self.clip).finish()
    }
}

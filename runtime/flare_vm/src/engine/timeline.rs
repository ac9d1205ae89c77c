//! Frame control, indexed display properties, clip duplication, drag,
//! and `Call`.

use std::mem;

use flare_ir::{payload, Action, ConstantPool, Version};
use flare_value::display::get_property;
use flare_value::{parse_number, DisplayObject, DisplayProperty, Object, Value};

use super::{Engine, Exit, Flow};
use crate::target::parse_path;
use crate::{DragBounds, DragState, Environment, LimitKind, VmError};

/// Added to script depths to get display list depths.
const DEPTH_OFFSET: f64 = -16_384.0;
/// Display list depths scripts may create clips at.
const MIN_DEPTH: f64 = -16_384.0;
const MAX_DEPTH: f64 = 2_130_690_044.0;

/// Zero-based frame for a frame number or label.
///
/// Numbers count from 1; anything that is not a positive integer is
/// looked up as a label.
pub(crate) fn frame_number(clip: &dyn DisplayObject, spec: &str, version: Version) -> Option<u32> {
    let num = parse_number(spec, version);
    if !num.is_finite() || num.fract() != 0.0 || num == 0.0 {
        return clip.frame_for_label(spec);
    }
    if num < 0.0 {
        return None;
    }
    if num > f64::from(u32::MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = (num - 1.0) as u32;
    Some(index)
}

impl Engine<'_, '_> {
    /// The current target when it has a timeline.
    fn target_clip(&self) -> Option<Object> {
        let target = self.cx.env.target().filter(|t| t.movie_clip().is_some());
        if target.is_none() {
            tracing::warn!(target: "flare::coding", "timeline action without a movie clip target");
        }
        target.cloned()
    }

    fn with_target_clip(&self, f: impl FnOnce(&dyn DisplayObject)) -> Flow {
        if let Some(clip) = self.target_clip() {
            if let Some(display) = clip.movie_clip() {
                f(display);
            }
        }
        Flow::Continue
    }

    pub(super) fn op_next_frame(&mut self) -> Flow {
        self.with_target_clip(|clip| clip.next_frame())
    }

    pub(super) fn op_prev_frame(&mut self) -> Flow {
        self.with_target_clip(|clip| clip.prev_frame())
    }

    pub(super) fn op_play(&mut self) -> Flow {
        self.with_target_clip(|clip| clip.play())
    }

    pub(super) fn op_stop(&mut self) -> Flow {
        self.with_target_clip(|clip| clip.stop())
    }

    pub(super) fn op_goto_frame(&mut self, action: &Action) -> Flow {
        let frame = match self.code.reader(action).u16() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad GotoFrame operand");
                return Flow::Continue;
            }
        };
        self.with_target_clip(|clip| clip.goto_frame(u32::from(frame)))
    }

    pub(super) fn op_goto_label(&mut self, action: &Action) -> Flow {
        let label = match self.code.reader(action).string() {
            Ok(label) => label,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad GotoLabel operand");
                return Flow::Continue;
            }
        };
        self.with_target_clip(|clip| match clip.frame_for_label(&label) {
            Some(frame) => clip.goto_frame(frame),
            None => tracing::warn!(target: "flare::coding", %label, "no frame with this label"),
        })
    }

    /// Split a `path:frame` spec into a clip and the frame part.
    fn frame_target(&self, spec: &str) -> (Option<Object>, String) {
        match parse_path(spec) {
            Some((path, frame)) => (self.resolver().find_target(path), frame.to_owned()),
            None => (self.cx.env.target().cloned(), spec.to_owned()),
        }
    }

    pub(super) fn op_goto_frame2(&mut self, action: &Action) -> Result<Flow, VmError> {
        let args = payload::read_goto_frame2(&mut self.code.reader(action));
        let spec = self.pop_string()?;
        let args = match args {
            Ok(args) => args,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad GotoFrame2 operand");
                return Ok(Flow::Continue);
            }
        };
        let (target, frame) = self.frame_target(&spec);
        let Some(clip) = target.filter(|t| t.movie_clip().is_some()) else {
            tracing::warn!(target: "flare::coding", %spec, "GotoFrame2: no movie clip target");
            return Ok(Flow::Continue);
        };
        let Some(display) = clip.movie_clip() else {
            return Ok(Flow::Continue);
        };
        match frame_number(display, &frame, self.version()) {
            Some(n) => {
                display.goto_frame(n.saturating_add(u32::from(args.scene_bias)));
                if args.play {
                    display.play();
                } else {
                    display.stop();
                }
            }
            None => tracing::warn!(target: "flare::coding", %spec, "GotoFrame2: unknown frame"),
        }
        Ok(Flow::Continue)
    }

    /// Skip `skip` actions unless `frame` of the target is loaded.
    fn wait_for(&self, frame: u32, skip: u8) -> Flow {
        let Some(clip) = self.target_clip() else {
            return Flow::Continue;
        };
        let Some(display) = clip.movie_clip() else {
            return Flow::Continue;
        };
        let frame = frame.min(display.total_frames());
        if display.frames_loaded() < frame {
            self.skip_actions(skip)
        } else {
            Flow::Continue
        }
    }

    pub(super) fn op_wait_for_frame(&mut self, action: &Action) -> Flow {
        match payload::read_wait_for_frame(&mut self.code.reader(action)) {
            Ok(args) => self.wait_for(u32::from(args.frame), args.skip),
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad WaitForFrame operand");
                Flow::Continue
            }
        }
    }

    pub(super) fn op_wait_for_frame2(&mut self, action: &Action) -> Result<Flow, VmError> {
        let skip = self.code.reader(action).u8();
        let spec = self.pop_string()?;
        let skip = match skip {
            Ok(skip) => skip,
            Err(err) => {
                tracing::warn!(target: "flare::malformed", pc = action.pc, %err, "bad WaitForFrame2 operand");
                return Ok(Flow::Continue);
            }
        };
        let Some(clip) = self.target_clip() else {
            return Ok(Flow::Continue);
        };
        let frame = clip
            .movie_clip()
            .and_then(|display| frame_number(display, &spec, self.version()));
        match frame {
            Some(frame) => Ok(self.wait_for(frame, skip)),
            None => {
                tracing::warn!(target: "flare::coding", %spec, "WaitForFrame2: unknown frame");
                Ok(Flow::Continue)
            }
        }
    }

    /// Resolve the target operand of the property and sprite opcodes.
    fn display_target(&mut self, value: &Value) -> Result<Option<Object>, VmError> {
        if let Some(node) = value.as_display_object() {
            return Ok(Some(node.clone()));
        }
        let path = self.to_string(value)?;
        Ok(self.resolver().find_target(&path))
    }

    fn property_index(&mut self, value: &Value) -> Result<Option<DisplayProperty>, VmError> {
        let index = self.to_number(value)?;
        let index = Value::Number(index).to_int(self.version());
        Ok(usize::try_from(index).ok().and_then(DisplayProperty::from_index))
    }

    pub(super) fn op_get_property(&mut self) -> Result<Flow, VmError> {
        let index = self.cx.env.pop();
        let target = self.cx.env.pop();
        let prop = self.property_index(&index)?;
        let node = self.display_target(&target)?;

        let value = match (node, prop) {
            (Some(node), Some(prop)) => match node.display() {
                Some(display) => get_property(&node, display, prop),
                None => Value::Undefined,
            },
            (None, _) => {
                tracing::warn!(target: "flare::coding", ?target, "GetProperty: target not found");
                Value::Undefined
            }
            (_, None) => {
                tracing::warn!(target: "flare::coding", ?index, "GetProperty: unknown property");
                Value::Undefined
            }
        };
        self.cx.env.push(value);
        Ok(Flow::Continue)
    }

    pub(super) fn op_set_property(&mut self) -> Result<Flow, VmError> {
        let value = self.cx.env.pop();
        let index = self.cx.env.pop();
        let target = self.cx.env.pop();
        let prop = self.property_index(&index)?;
        let node = self.display_target(&target)?;

        match (node, prop) {
            (Some(node), Some(prop)) => {
                if !node.set_member(prop.name(), value, self.version()) {
                    tracing::warn!(target: "flare::coding", property = prop.name(), "property is read-only");
                }
            }
            (None, _) => {
                tracing::warn!(target: "flare::coding", ?target, "SetProperty: target not found");
            }
            (_, None) => {
                tracing::warn!(target: "flare::coding", ?index, "SetProperty: unknown property");
            }
        }
        Ok(Flow::Continue)
    }

    /// `duplicateMovieClip(path, name, depth)`.
    pub(super) fn op_clone_sprite(&mut self) -> Result<Flow, VmError> {
        let depth = self.pop_number()? + DEPTH_OFFSET;
        let name = self.pop_string()?;
        let source = self.cx.env.pop();

        let Some(clip) = self
            .display_target(&source)?
            .filter(|c| c.movie_clip().is_some())
        else {
            tracing::warn!(target: "flare::coding", ?source, "CloneSprite: source clip not found");
            return Ok(Flow::Continue);
        };
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
            tracing::warn!(target: "flare::coding", depth, "CloneSprite: depth out of range");
            return Ok(Flow::Continue);
        }
        #[allow(clippy::cast_possible_truncation)]
        let depth = depth as i32;
        if let Some(display) = clip.display() {
            if display.duplicate(&clip, &name, depth).is_none() {
                tracing::warn!(target: "flare::coding", %name, depth, "CloneSprite refused");
            }
        }
        Ok(Flow::Continue)
    }

    pub(super) fn op_remove_sprite(&mut self) -> Result<Flow, VmError> {
        let source = self.cx.env.pop();
        let clip = self
            .display_target(&source)?
            .filter(|c| c.movie_clip().is_some());
        match clip {
            Some(clip) => {
                let removed = clip.display().is_some_and(|d| d.remove(&clip));
                if !removed {
                    tracing::warn!(target: "flare::coding", ?source, "RemoveSprite refused");
                }
            }
            None => {
                tracing::warn!(target: "flare::coding", ?source, "RemoveSprite: clip not found");
            }
        }
        Ok(Flow::Continue)
    }

    /// `startDrag(target, lock, [x0, y0, x1, y1])`.
    pub(super) fn op_start_drag(&mut self) -> Result<Flow, VmError> {
        let target = self.cx.env.pop();
        let lock_center = self.cx.env.pop().to_bool(self.version());
        let constrained = self.pop_number()? != 0.0;

        let bounds = if constrained {
            let mut y1 = self.pop_number()?;
            let mut x1 = self.pop_number()?;
            let mut y0 = self.pop_number()?;
            let mut x0 = self.pop_number()?;
            if y1 < y0 {
                mem::swap(&mut y0, &mut y1);
            }
            if x1 < x0 {
                mem::swap(&mut x0, &mut x1);
            }
            Some(DragBounds { x0, y0, x1, y1 })
        } else {
            None
        };

        match self.display_target(&target)? {
            Some(node) => self.cx.host.set_drag(DragState {
                target: node,
                lock_center,
                bounds,
            }),
            None => {
                tracing::warn!(target: "flare::coding", ?target, "StartDrag: target not found");
            }
        }
        Ok(Flow::Continue)
    }

    pub(super) fn op_end_drag(&mut self) -> Flow {
        self.cx.host.clear_drag();
        Flow::Continue
    }

    /// Run the actions of another frame, in that clip's context.
    pub(super) fn op_call(&mut self) -> Result<Flow, VmError> {
        let spec = self.pop_string()?;
        let (target, frame) = self.frame_target(&spec);
        let Some(clip) = target.filter(|t| t.movie_clip().is_some()) else {
            tracing::warn!(target: "flare::coding", %spec, "Call: no movie clip target");
            return Ok(Flow::Continue);
        };
        let Some(code) = clip.movie_clip().and_then(|display| {
            let frame = frame_number(display, &frame, self.version())?;
            display.frame_actions(frame)
        }) else {
            tracing::debug!(target: "flare::coding", %spec, "Call: frame has no actions");
            return Ok(Flow::Continue);
        };

        let limit = self.cx.vm.config().recursion_limit;
        if self.cx.frame_calls >= limit {
            tracing::error!(limit, "frame call nesting exceeded");
            return Err(VmError::limit(LimitKind::Recursion, limit));
        }

        let frame_env = Environment::new(code.version(), Some(clip));
        let saved = mem::replace(&mut *self.cx.env, frame_env);
        self.cx.frame_calls += 1;
        let range = 0..code.len();
        let result = flare_stack::ensure_sufficient_stack(|| {
            Engine::new(
                &mut *self.cx,
                code,
                ConstantPool::default(),
                range,
                Vec::new().into(),
                false,
            )
            .run()
        });
        self.cx.frame_calls -= 1;
        *self.cx.env = saved;

        Ok(match result? {
            Exit::Threw(value) => Flow::Throw(value),
            Exit::Finished | Exit::Returned(_) => Flow::Continue,
        })
    }
}

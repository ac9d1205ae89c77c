//! Frame lists shared between a clip and its duplicates.

use flare_ir::CodeBuffer;

/// One frame: an optional label and optional frame actions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub label: Option<String>,
    pub actions: Option<CodeBuffer>,
}

/// The frames of a clip.
///
/// A timeline always has at least one frame. `loaded` models streaming:
/// frames at or past it exist but are not available yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeline {
    frames: Vec<Frame>,
    loaded: u32,
}

impl Timeline {
    /// A fully loaded timeline of `count` empty frames (at least one).
    pub fn new(count: u32) -> Self {
        let count = count.max(1);
        Timeline {
            frames: (0..count).map(|_| Frame::default()).collect(),
            loaded: count,
        }
    }

    /// Label frame `frame`; out-of-range frames are ignored.
    #[must_use]
    pub fn with_label(mut self, frame: u32, label: &str) -> Self {
        if let Some(slot) = self.frame_mut(frame) {
            slot.label = Some(label.to_owned());
        }
        self
    }

    /// Attach actions to frame `frame`; out-of-range frames are ignored.
    #[must_use]
    pub fn with_actions(mut self, frame: u32, code: CodeBuffer) -> Self {
        if let Some(slot) = self.frame_mut(frame) {
            slot.actions = Some(code);
        }
        self
    }

    /// Pretend only the first `loaded` frames have arrived.
    #[must_use]
    pub fn with_loaded(mut self, loaded: u32) -> Self {
        self.loaded = loaded.min(self.total());
        self
    }

    fn frame_mut(&mut self, frame: u32) -> Option<&mut Frame> {
        self.frames.get_mut(usize::try_from(frame).ok()?)
    }

    pub fn frame(&self, frame: u32) -> Option<&Frame> {
        self.frames.get(usize::try_from(frame).ok()?)
    }

    pub fn total(&self) -> u32 {
        u32::try_from(self.frames.len()).unwrap_or(u32::MAX)
    }

    pub fn loaded(&self) -> u32 {
        self.loaded
    }

    /// First frame carrying `label`, compared case-insensitively.
    pub fn find_label(&self, label: &str) -> Option<u32> {
        self.frames
            .iter()
            .position(|f| {
                f.label
                    .as_deref()
                    .is_some_and(|l| l.eq_ignore_ascii_case(label))
            })
            .and_then(|i| u32::try_from(i).ok())
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Timeline::new(1)
    }
}

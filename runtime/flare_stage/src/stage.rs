//! Numbered levels.

use std::collections::BTreeMap;

use flare_value::Object;

use crate::{ClipHandle, Timeline};

/// The set of loaded levels. `_level0` always exists.
#[derive(Debug)]
pub struct Stage {
    root: ClipHandle,
    levels: BTreeMap<u32, ClipHandle>,
}

impl Stage {
    /// A stage whose `_level0` plays `timeline`.
    pub fn new(timeline: Timeline) -> Self {
        let root = ClipHandle::root(0, timeline);
        let mut levels = BTreeMap::new();
        levels.insert(0, root.clone());
        Stage { root, levels }
    }

    /// The `_level0` root clip.
    pub fn root(&self) -> &ClipHandle {
        &self.root
    }

    /// Load `timeline` into level `level`, replacing what was there.
    pub fn load_level(&mut self, level: u32, timeline: Timeline) -> ClipHandle {
        let handle = ClipHandle::root(level, timeline);
        if level == 0 {
            self.root = handle.clone();
        }
        self.levels.insert(level, handle.clone());
        handle
    }

    /// Unload a level. `_level0` cannot be unloaded.
    pub fn unload_level(&mut self, level: u32) -> bool {
        level != 0 && self.levels.remove(&level).is_some()
    }

    pub fn level(&self, level: u32) -> Option<&ClipHandle> {
        self.levels.get(&level)
    }

    /// Level roots in level order.
    pub fn levels(&self) -> impl Iterator<Item = (u32, &Object)> {
        self.levels.iter().map(|(n, h)| (*n, &h.object))
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::new(Timeline::default())
    }
}

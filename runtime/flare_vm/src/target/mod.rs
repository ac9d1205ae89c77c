//! Variable lookup and target-path resolution.
//!
//! Names reach the VM in three shapes: plain identifiers (`score`), slash
//! paths (`/menu/button`, `../x`), and dot or colon paths (`_root.menu.x`,
//! `/menu:x`). [`Resolver`] turns all of them into values or objects by
//! walking the scope chain, the current target, and the global object in
//! the order the player does.
//!
//! # Scope chain
//!
//! The chain is the running engine's `with` objects (innermost first),
//! followed by the scope captured by the running closure. From version 6
//! the closure's activation object (its locals) sits between the two; before
//! that, locals are probed after the whole chain.

use std::ops::Range;

use flare_value::display::root_of;
use flare_value::{NameCase, Object, Value, Version};

use crate::{Environment, Vm};

/// One `With` block: `object` is in scope while the pc is inside `range`.
#[derive(Clone, Debug)]
pub(crate) struct ScopeEntry {
    pub object: Object,
    pub range: Range<usize>,
}

/// A successful raw lookup: the value and the object it was found on.
///
/// `owner` is `None` for locals and for names the resolver synthesizes
/// (`this`, `_global`).
#[derive(Clone, Debug)]
pub(crate) struct Found {
    pub value: Value,
    pub owner: Option<Object>,
}

/// Read-only view of everything a name can resolve against.
pub(crate) struct Resolver<'r> {
    vm: &'r Vm,
    env: &'r Environment,
    /// Captured closure scope (plus the activation object), outermost first.
    base: &'r [Object],
    with: &'r [ScopeEntry],
}

impl<'r> Resolver<'r> {
    pub(crate) fn new(
        vm: &'r Vm,
        env: &'r Environment,
        base: &'r [Object],
        with: &'r [ScopeEntry],
    ) -> Self {
        Resolver {
            vm,
            env,
            base,
            with,
        }
    }

    #[inline]
    fn version(&self) -> Version {
        self.env.version()
    }

    #[inline]
    fn case(&self) -> NameCase {
        self.env.case()
    }

    /// Scope objects, innermost first.
    fn scope_chain(&self) -> impl Iterator<Item = &'r Object> + 'r {
        let with = self.with;
        let base = self.base;
        with.iter().rev().map(|e| &e.object).chain(base.iter().rev())
    }

    /// The target a relative path starts from.
    fn start(&self) -> Option<&'r Object> {
        self.env.effective_target()
    }
}

// Variables

impl Resolver<'_> {
    /// `GetVariable` semantics: paths first, then the raw lookup chain.
    pub(crate) fn get_variable(&self, name: &str) -> Value {
        self.lookup(name).map(|found| found.value).unwrap_or_default()
    }

    /// Like [`Resolver::get_variable`], also reporting where the value was
    /// found.
    pub(crate) fn lookup(&self, name: &str) -> Option<Found> {
        if let Some((path, var)) = parse_path(name) {
            let Some(obj) = self.find_object(path) else {
                tracing::warn!(target: "flare::coding", name, path, "path target not found");
                return None;
            };
            let value = self.member(&obj, var)?;
            return Some(Found {
                value,
                owner: Some(obj),
            });
        }

        // A bare slash path names a clip.
        if name.contains('/') && !name.contains(':') {
            if let Some(clip) = self.find_object(name).filter(|o| o.movie_clip().is_some()) {
                return Some(Found {
                    value: Value::Object(clip),
                    owner: None,
                });
            }
        }
        self.lookup_raw(name)
    }

    fn lookup_raw(&self, name: &str) -> Option<Found> {
        if !valid_raw_name(name) {
            tracing::warn!(target: "flare::coding", name, "invalid variable name");
            return None;
        }
        let case = self.case();

        for obj in self.scope_chain() {
            if let Some(value) = self.member(obj, name) {
                return Some(Found {
                    value,
                    owner: Some(obj.clone()),
                });
            }
        }

        if self.version().get() < 6 {
            if let Some(value) = self.env.get_local(name) {
                return Some(Found { value, owner: None });
            }
        }

        if let Some(target) = self.start() {
            if let Some(value) = self.member(target, name) {
                return Some(Found {
                    value,
                    owner: Some(target.clone()),
                });
            }
        }

        if name == "this" {
            let value = self
                .env
                .original_target()
                .cloned()
                .map_or(Value::Undefined, Value::Object);
            return Some(Found { value, owner: None });
        }

        let global = self.vm.globals().global();
        if self.version().get() > 5 && case.matches(name, "_global") {
            return Some(Found {
                value: Value::Object(global.clone()),
                owner: None,
            });
        }

        if let Some(value) = global.get_member(name, case) {
            return Some(Found {
                value,
                owner: Some(global.clone()),
            });
        }

        tracing::warn!(target: "flare::coding", name, "reference to undefined variable");
        None
    }

    /// `SetVariable` semantics.
    pub(crate) fn set_variable(&self, name: &str, value: Value) {
        if let Some((path, var)) = parse_path(name) {
            match self.find_object(path) {
                Some(obj) => {
                    obj.set_member(var, value, self.version());
                }
                None => {
                    tracing::warn!(target: "flare::coding", name, path, "path target not found");
                }
            }
            return;
        }
        self.set_raw(name, value);
    }

    fn set_raw(&self, name: &str, value: Value) {
        if !valid_raw_name(name) {
            tracing::warn!(target: "flare::coding", name, "invalid variable name");
            return;
        }
        let case = self.case();
        let version = self.version();

        // Only scope objects that already have the member take the write.
        for obj in self.scope_chain() {
            if obj.has_member(name, case) {
                obj.set_member(name, value, version);
                return;
            }
        }

        if version.get() < 6 && self.env.get_local(name).is_some() {
            self.env.set_local(name, value);
            return;
        }

        match self.start() {
            Some(target) => {
                target.set_member(name, value, version);
            }
            None => {
                self.vm.globals().global().set_member(name, value, version);
            }
        }
    }

    /// `Delete2` semantics: the first object along the chain that owns
    /// `name` loses it.
    pub(crate) fn del_variable(&self, name: &str) -> bool {
        let case = self.case();
        for obj in self.scope_chain() {
            if obj.has_own(name, case) {
                return obj.delete_member(name, case);
            }
        }
        if let Some(frame) = self.env.frame() {
            if frame.locals.delete_member(name, case) {
                return true;
            }
        }
        if let Some(target) = self.start() {
            if target.has_own(name, case) {
                return target.delete_member(name, case);
            }
        }
        self.vm.globals().global().delete_member(name, case)
    }

    /// Read `name` from `obj`, including the clip-only names `_root`,
    /// `_global`, and `_levelN`.
    pub(crate) fn member(&self, obj: &Object, name: &str) -> Option<Value> {
        if let Some(special) = self.display_special(obj, name) {
            return Some(Value::Object(special));
        }
        obj.get_member(name, self.case())
    }

    fn display_special(&self, obj: &Object, name: &str) -> Option<Object> {
        obj.display()?;
        if !name.starts_with('_') {
            return None;
        }
        let case = self.case();
        let version = self.version().get();
        if version > 4 && case.matches(name, "_root") {
            return Some(root_of(obj));
        }
        if version > 5 && case.matches(name, "_global") {
            return Some(self.vm.globals().global().clone());
        }
        level_number(name, case).and_then(|n| self.level(n))
    }

    fn level(&self, n: u32) -> Option<Object> {
        if let Some(level) = self.vm.level(n) {
            return Some(level.clone());
        }
        // Without a registered level table, the target's own root still
        // answers for its level.
        let root = root_of(self.start()?);
        (root.display()?.level() == Some(n)).then_some(root)
    }
}

// Paths

impl Resolver<'_> {
    /// Resolve a slash, dot, or colon path to an object.
    pub(crate) fn find_object(&self, path: &str) -> Option<Object> {
        if path.is_empty() {
            return self.env.target().cloned();
        }

        let mut current: Option<Object>;
        let mut first = true;
        let mut dot_allowed = true;
        let mut rest = path;

        if let Some(after) = path.strip_prefix('/') {
            let root = root_of(self.start()?);
            if after.is_empty() {
                return Some(root);
            }
            current = Some(root);
            first = false;
            dot_allowed = false;
            rest = after;
        } else {
            current = self.env.target().cloned();
        }

        loop {
            rest = rest.trim_start_matches(':');
            if rest.is_empty() {
                return current;
            }

            let sep = next_separator(rest);
            let element = match sep {
                Some(0) => {
                    tracing::warn!(target: "flare::coding", path, "empty path element");
                    return None;
                }
                Some(pos) => {
                    match rest.as_bytes().get(pos) {
                        Some(b'.') if !dot_allowed => {
                            tracing::warn!(target: "flare::coding", path, "dot after slash in path");
                            return None;
                        }
                        Some(b'/') => dot_allowed = false,
                        _ => {}
                    }
                    rest.get(..pos).unwrap_or_default()
                }
                None => rest,
            };

            let next = if first {
                first = false;
                self.first_element(element)
            } else {
                current.as_ref().and_then(|obj| self.path_element(obj, element))
            };
            let Some(next) = next else {
                tracing::debug!(target: "flare::coding", path, element, "path element not found");
                return None;
            };
            current = Some(next);

            match sep {
                Some(pos) => rest = rest.get(pos.saturating_add(1)..).unwrap_or_default(),
                None => return current,
            }
        }
    }

    fn first_element(&self, element: &str) -> Option<Object> {
        for obj in self.scope_chain() {
            if let Some(found) = self.path_element(obj, element) {
                return Some(found);
            }
        }
        if let Some(target) = self.env.target() {
            if let Some(found) = self.path_element(target, element) {
                return Some(found);
            }
            if self.case().matches(element, "this") {
                return Some(target.clone());
            }
        }
        let global = self.vm.globals().global();
        if self.version().get() > 5 && self.case().matches(element, "_global") {
            return Some(global.clone());
        }
        self.path_element(global, element)
    }

    /// One step of a path: parent links, level names, children, then
    /// object-valued members.
    pub(crate) fn path_element(&self, obj: &Object, element: &str) -> Option<Object> {
        let case = self.case();
        if let Some(display) = obj.display() {
            if element == ".." || case.matches(element, "_parent") {
                let parent = display.parent();
                if parent.is_none() {
                    tracing::warn!(target: "flare::coding", "reference to the parent of a root");
                }
                return parent;
            }
            if let Some(special) = self.display_special(obj, element) {
                return Some(special);
            }
            if let Some(child) = display.child(element, case) {
                return Some(child);
            }
        }
        obj.get_member(element, case)
            .and_then(|v| v.as_object().cloned())
    }

    /// `SetTarget`/`SetTarget2` resolution: a display object or nothing.
    pub(crate) fn find_target(&self, path: &str) -> Option<Object> {
        self.find_object(path).filter(|obj| obj.display().is_some())
    }
}

/// Split `path:var` or `path.var` at the last separator.
///
/// Returns `None` for plain names, for an empty path part, and for paths
/// ending in more than one colon.
pub(crate) fn parse_path(name: &str) -> Option<(&str, &str)> {
    let split = name.rfind([':', '.'])?;
    let path = name.get(..split)?;
    let var = name.get(split.saturating_add(1)..)?;
    if path.is_empty() {
        return None;
    }
    // The first byte never counts toward the trailing colon run.
    let trailing = path.bytes().skip(1).rev().take_while(|&b| b == b':').count();
    if trailing > 1 {
        return None;
    }
    Some((path, var))
}

/// Position of the next `.`, `/`, or `:` that ends a path element. `..`
/// is an element, not a separator.
fn next_separator(word: &str) -> Option<usize> {
    let bytes = word.as_bytes();
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'.' if bytes.get(i.saturating_add(1)) == Some(&b'.') => i = i.saturating_add(1),
            b'.' | b'/' | b':' => return Some(i),
            _ => {}
        }
        i = i.saturating_add(1);
    }
    None
}

fn valid_raw_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') {
        return false;
    }
    if name.starts_with(':') && !name.get(1..).is_some_and(|tail| tail.contains([':', '.'])) {
        return false;
    }
    !name.contains(":::")
}

/// Level number named by `_levelN`. A bare `_level` is level 0.
pub(crate) fn level_number(name: &str, case: NameCase) -> Option<u32> {
    let prefix = name.get(..6)?;
    if !case.matches(prefix, "_level") {
        return None;
    }
    let digits = name.get(6..)?;
    if digits.is_empty() {
        return Some(0);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

//! Insertion-ordered property storage with version-aware name matching.

use std::rc::Rc;

use bitflags::bitflags;
use flare_ir::Version;
use rustc_hash::FxHashMap;

use crate::Value;

/// How member and variable names are compared.
///
/// Content authored before version 7 matches names case-insensitively.
/// Every lookup boundary (properties, locals, scope entries, display
/// children) takes one of these.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NameCase {
    Sensitive,
    Insensitive,
}

impl NameCase {
    #[inline]
    pub fn for_version(version: Version) -> Self {
        if version.case_sensitive() {
            NameCase::Sensitive
        } else {
            NameCase::Insensitive
        }
    }

    /// Compare two names under this rule.
    pub fn matches(self, a: &str, b: &str) -> bool {
        match self {
            NameCase::Sensitive => a == b,
            NameCase::Insensitive => a == b || fold(a) == fold(b),
        }
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

bitflags! {
    /// Attribute bits of a single property.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PropFlags: u8 {
        /// Skipped by `Enumerate`.
        const DONT_ENUM = 0x01;
        /// Survives `Delete`.
        const DONT_DELETE = 0x02;
        /// Assignments are ignored.
        const READ_ONLY = 0x04;
    }
}

#[derive(Clone, Debug)]
pub struct Property {
    pub name: Rc<str>,
    pub value: Value,
    pub flags: PropFlags,
}

/// The member table of one object.
///
/// Iteration follows insertion order. Case-insensitive lookups go through
/// a folded index that maps each lowercased name to its first slot.
#[derive(Clone, Debug, Default)]
pub struct PropertyMap {
    slots: Vec<Property>,
    exact: FxHashMap<Rc<str>, usize>,
    folded: FxHashMap<String, usize>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn index_of(&self, name: &str, case: NameCase) -> Option<usize> {
        if let Some(&index) = self.exact.get(name) {
            return Some(index);
        }
        match case {
            NameCase::Sensitive => None,
            NameCase::Insensitive => self.folded.get(&fold(name)).copied(),
        }
    }

    pub fn get(&self, name: &str, case: NameCase) -> Option<&Property> {
        self.index_of(name, case).and_then(|i| self.slots.get(i))
    }

    #[inline]
    pub fn contains(&self, name: &str, case: NameCase) -> bool {
        self.index_of(name, case).is_some()
    }

    /// Assign `value`, creating the property if it does not exist.
    ///
    /// Returns `false` when an existing property is read-only.
    pub fn set(&mut self, name: &str, value: Value, case: NameCase) -> bool {
        if let Some(index) = self.index_of(name, case) {
            if let Some(slot) = self.slots.get_mut(index) {
                if slot.flags.contains(PropFlags::READ_ONLY) {
                    return false;
                }
                slot.value = value;
                return true;
            }
        }
        self.insert(name, value, PropFlags::empty());
        true
    }

    /// Assign only if the property already exists.
    pub fn update(&mut self, name: &str, value: Value, case: NameCase) -> bool {
        match self.index_of(name, case) {
            Some(index) => match self.slots.get_mut(index) {
                Some(slot) if !slot.flags.contains(PropFlags::READ_ONLY) => {
                    slot.value = value;
                    true
                }
                _ => false,
            },
            None => false,
        }
    }

    /// Create or overwrite a property with explicit flags.
    pub fn define(&mut self, name: &str, value: Value, flags: PropFlags) {
        if let Some(&index) = self.exact.get(name) {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.value = value;
                slot.flags = flags;
                return;
            }
        }
        self.insert(name, value, flags);
    }

    fn insert(&mut self, name: &str, value: Value, flags: PropFlags) {
        let name: Rc<str> = name.into();
        let index = self.slots.len();
        self.exact.insert(Rc::clone(&name), index);
        self.folded.entry(fold(&name)).or_insert(index);
        self.slots.push(Property { name, value, flags });
    }

    /// Remove a property. `Some(false)` means it exists but is protected.
    pub fn remove(&mut self, name: &str, case: NameCase) -> Option<bool> {
        let index = self.index_of(name, case)?;
        if self
            .slots
            .get(index)
            .is_some_and(|p| p.flags.contains(PropFlags::DONT_DELETE))
        {
            return Some(false);
        }
        self.slots.remove(index);
        self.reindex();
        Some(true)
    }

    fn reindex(&mut self) {
        self.exact.clear();
        self.folded.clear();
        for (index, prop) in self.slots.iter().enumerate() {
            self.exact.insert(Rc::clone(&prop.name), index);
            self.folded.entry(fold(&prop.name)).or_insert(index);
        }
    }

    pub fn set_flags(&mut self, name: &str, case: NameCase, set: PropFlags, clear: PropFlags) {
        if let Some(index) = self.index_of(name, case) {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.flags.remove(clear);
                slot.flags.insert(set);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.slots.iter()
    }

    /// Names visible to enumeration, in insertion order.
    pub fn enumerable_names(&self) -> impl Iterator<Item = &Rc<str>> {
        self.slots
            .iter()
            .filter(|p| !p.flags.contains(PropFlags::DONT_ENUM))
            .map(|p| &p.name)
    }
}

//! Language version tag.

use std::fmt;

/// The player version a code buffer was authored for.
///
/// Many coercion and lookup rules change between versions; every check
/// goes through one of the named predicates below so the thresholds live
/// in a single place.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u8);

impl Version {
    /// The newest version whose semantics are modelled.
    pub const LATEST: Version = Version(10);

    #[inline]
    pub const fn new(version: u8) -> Self {
        Version(version)
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Comparison and logic opcodes push `1`/`0` instead of booleans.
    #[inline]
    pub const fn legacy_booleans(self) -> bool {
        self.0 < 5
    }

    /// Member and variable names are matched case-sensitively.
    #[inline]
    pub const fn case_sensitive(self) -> bool {
        self.0 >= 7
    }

    /// String length and indexing count characters rather than bytes.
    #[inline]
    pub const fn multibyte(self) -> bool {
        self.0 >= 6
    }

    /// Strings in the bytecode are UTF-8 rather than Latin-1.
    #[inline]
    pub const fn utf8(self) -> bool {
        self.0 >= 6
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::LATEST
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

//! Domain types providing compile-time safety and self-documentation
//!
//! Captured samples are plain `u64` runtime addresses; once relocation has
//! been applied they become a [`Vma`], which is what symbol and line tables
//! are keyed by. Keeping the two apart avoids feeding a runtime address to a
//! resolver by accident.

use std::fmt;

/// Literal shown wherever a module, symbol, line or VMA could not be resolved.
///
/// Only the rendering layer substitutes this; everything upstream carries
/// `Option`s.
pub const UNKNOWN: &str = "<unknown>";

/// Virtual memory address as stated in the binary (post relocation).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vma(pub u64);

impl fmt::Display for Vma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Protection bits of a mapping, e.g. `r-xp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permissions(String);

impl Permissions {
    /// Wrap a four character permission field (returns `None` otherwise)
    #[must_use]
    pub fn parse(field: &str) -> Option<Self> {
        (field.chars().count() == 4).then(|| Self(field.to_string()))
    }

    /// Third flag is `x`
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.0.chars().nth(2) == Some('x')
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of the captured memory map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub begin: u64,
    pub end: u64,
    pub file_offset: u64,
    pub permissions: Permissions,
    pub path: String,
}

impl Mapping {
    /// Check if an address falls within `[begin, end)`
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.begin && addr < self.end
    }
}

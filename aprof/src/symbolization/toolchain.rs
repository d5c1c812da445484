//! Capability interfaces for the external collaborators.
//!
//! Everything that actually looks inside a binary sits behind these traits:
//! the segment table, symbol lookup, line lookup and name demangling. A
//! [`Toolchain`] builds them for one local module file. Two toolchains ship
//! with the crate (see [`super::native`] and [`super::binutils`]); tests plug
//! in their own.

use log::warn;
use std::collections::HashMap;
use std::path::Path;

use crate::domain::{ResolverError, Vma};

/// Something that may hold an external resource until closed.
pub trait Collaborator {
    /// Release the underlying resource. Must be idempotent.
    fn close(&mut self) {}
}

/// Maps a VMA to the name of the enclosing symbol.
pub trait SymbolResolver: Collaborator {
    fn resolve(&mut self, vma: Vma) -> Option<String>;
}

/// Maps a VMA to its `file:line` source location.
pub trait LineResolver: Collaborator {
    fn resolve(&mut self, vma: Vma) -> Option<String>;
}

/// Turns a mangled symbol into a readable one.
///
/// Implementations return the input unchanged when they cannot demangle it.
pub trait Demangler: Collaborator {
    fn demangle(&mut self, symbol: &str) -> String;
}

/// Factory for the per-module collaborators.
pub trait Toolchain {
    /// Build the Segment Load Table of a module.
    ///
    /// # Errors
    /// Returns an error if the file is unreadable or not an object file
    fn segments(&self, local: &Path) -> Result<SegmentTable, ResolverError>;

    /// # Errors
    /// Returns an error if no symbol lookup can be offered for this file
    fn symbol_resolver(&self, local: &Path) -> Result<Box<dyn SymbolResolver>, ResolverError>;

    /// # Errors
    /// Returns an error if no line lookup can be offered for this file
    fn line_resolver(&self, local: &Path) -> Result<Box<dyn LineResolver>, ResolverError>;

    /// A demangler for rendering; never fails, at worst it passes names through.
    fn demangler(&self) -> Box<dyn Demangler>;
}

/// ELF program-header file offset -> stated VMA of each LOAD segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTable {
    segments: HashMap<u64, Vma>,
}

impl SegmentTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a LOAD segment. A later segment at the same offset wins.
    pub fn insert(&mut self, file_offset: u64, vma: Vma) {
        self.segments.insert(file_offset, vma);
    }

    #[must_use]
    pub fn vma_at_offset(&self, file_offset: u64) -> Option<Vma> {
        self.segments.get(&file_offset).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromIterator<(u64, Vma)> for SegmentTable {
    fn from_iter<I: IntoIterator<Item = (u64, Vma)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (offset, vma) in iter {
            table.insert(offset, vma);
        }
        table
    }
}

/// A collaborator that either came up or is permanently out of service.
pub enum ResolverState<R: ?Sized> {
    Disabled,
    Active(Box<R>),
}

impl<R: ?Sized + Collaborator> ResolverState<R> {
    /// Wrap a construction result, warning once on failure.
    pub fn open(kind: &str, module: &str, result: Result<Box<R>, ResolverError>) -> Self {
        match result {
            Ok(resolver) => Self::Active(resolver),
            Err(e) => {
                warn!("won't be able to resolve {kind} inside {module}: {e}");
                Self::Disabled
            }
        }
    }

    /// Run a query against the active collaborator.
    pub fn query<T>(&mut self, f: impl FnOnce(&mut R) -> Option<T>) -> Option<T> {
        match self {
            Self::Disabled => None,
            Self::Active(resolver) => f(&mut **resolver),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn close(&mut self) {
        if let Self::Active(resolver) = self {
            resolver.close();
        }
        *self = Self::Disabled;
    }
}

/// Pass-through demangler, used when no real one is available.
#[derive(Debug, Default)]
pub struct IdentityDemangler;

impl Collaborator for IdentityDemangler {}

impl Demangler for IdentityDemangler {
    fn demangle(&mut self, symbol: &str) -> String {
        symbol.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl Collaborator for Fixed {}

    impl SymbolResolver for Fixed {
        fn resolve(&mut self, _vma: Vma) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn test_segment_table_lookup() {
        let table: SegmentTable = [(0, Vma(0)), (0x1000, Vma(0x8000))].into_iter().collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.vma_at_offset(0x1000), Some(Vma(0x8000)));
        assert_eq!(table.vma_at_offset(0x2000), None);
    }

    #[test]
    fn test_disabled_state_answers_none() {
        let mut state: ResolverState<dyn SymbolResolver> = ResolverState::open(
            "symbols",
            "/system/lib/libfoo.so",
            Err(ResolverError::ToolRejected {
                program: "readelf".to_string(),
                path: "/tmp/libfoo.so".into(),
            }),
        );
        assert!(!state.is_active());
        assert_eq!(state.query(|r| r.resolve(Vma(0x10))), None);
    }

    #[test]
    fn test_close_disables() {
        let resolver: Box<dyn SymbolResolver> = Box::new(Fixed("main"));
        let mut state = ResolverState::open("symbols", "libfoo.so", Ok(resolver));
        assert_eq!(state.query(|r| r.resolve(Vma(0x10))), Some("main".to_string()));

        state.close();
        state.close();
        assert!(!state.is_active());
    }
}

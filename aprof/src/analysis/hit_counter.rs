//! Hit tallies keyed by attribution granularity.
//!
//! Keys hold `Option`s; `None` is "unresolved". Ordering, however, must match
//! the rendered report: an unresolved module, symbol or line sorts exactly
//! where the text `<unknown>` would. The VMA is always present: an address no
//! module maps is keyed by its raw PC. Reports list keys by descending
//! `(count, key)`, so equal counts come out in a reproducible order.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::domain::{Vma, UNKNOWN};

/// Rendered text of an optional name.
#[must_use]
pub fn label(name: Option<&str>) -> &str {
    name.unwrap_or(UNKNOWN)
}

/// Compare two optional names as their labels would compare.
///
/// A real name spelled `<unknown>` still sorts apart from an unresolved one,
/// keeping the order consistent with equality.
fn cmp_name(a: Option<&Rc<str>>, b: Option<&Rc<str>>) -> Ordering {
    label(a.map(|s| &**s))
        .cmp(label(b.map(|s| &**s)))
        .then_with(|| a.is_some().cmp(&b.is_some()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    pub module: Option<Rc<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    pub module: Option<Rc<str>>,
    pub symbol: Option<Rc<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub module: Option<Rc<str>>,
    pub symbol: Option<Rc<str>>,
    pub line: Option<Rc<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressKey {
    pub module: Option<Rc<str>>,
    pub symbol: Option<Rc<str>>,
    pub line: Option<Rc<str>>,
    pub vma: Vma,
}

impl Ord for ModuleKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_name(self.module.as_ref(), other.module.as_ref())
    }
}

impl Ord for SymbolKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_name(self.module.as_ref(), other.module.as_ref())
            .then_with(|| cmp_name(self.symbol.as_ref(), other.symbol.as_ref()))
    }
}

impl Ord for LineKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_name(self.module.as_ref(), other.module.as_ref())
            .then_with(|| cmp_name(self.symbol.as_ref(), other.symbol.as_ref()))
            .then_with(|| cmp_name(self.line.as_ref(), other.line.as_ref()))
    }
}

impl Ord for AddressKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_name(self.module.as_ref(), other.module.as_ref())
            .then_with(|| cmp_name(self.symbol.as_ref(), other.symbol.as_ref()))
            .then_with(|| cmp_name(self.line.as_ref(), other.line.as_ref()))
            .then_with(|| self.vma.cmp(&other.vma))
    }
}

macro_rules! partial_ord_from_ord {
    ($($key:ty),*) => {
        $(impl PartialOrd for $key {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        })*
    };
}

partial_ord_from_ord!(ModuleKey, SymbolKey, LineKey, AddressKey);

/// Monotonic hit counts per key.
#[derive(Debug, Clone)]
pub struct HitCounter<K> {
    counts: HashMap<K, u64>,
}

impl<K> Default for HitCounter<K> {
    fn default() -> Self {
        Self { counts: HashMap::new() }
    }
}

impl<K: Hash + Eq> HitCounter<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&mut self, key: K) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    #[must_use]
    pub fn count(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl<K: Hash + Eq + Ord + Clone> HitCounter<K> {
    /// `(count, key)` pairs, largest first; ties by descending key.
    #[must_use]
    pub fn sorted_hits(&self) -> Vec<(u64, K)> {
        let mut hits: Vec<(u64, K)> =
            self.counts.iter().map(|(key, &count)| (count, key.clone())).collect();
        hits.sort_unstable_by(|a, b| b.cmp(a));
        hits
    }
}

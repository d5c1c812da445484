//! Per-address memoization of module, symbol, line and VMA lookups.
//!
//! A capture holds thousands of samples but only a few hundred distinct PCs,
//! and every lookup may cost a round trip to an external tool. Each query
//! kind therefore has its own address -> answer map, negative answers
//! included, so a given address reaches a resolver at most once per kind.

use std::collections::HashMap;
use std::rc::Rc;

use crate::domain::Vma;
use crate::symbolization::ModuleTable;

/// Module and symbol attribution of one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolIdentity {
    pub module: Option<Rc<str>>,
    pub symbol: Option<Rc<str>>,
}

/// Everything known about one captured address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub module: Option<Rc<str>>,
    pub symbol: Option<Rc<str>>,
    pub line: Option<Rc<str>>,
    /// Relocated address, or the raw PC when no module maps it.
    pub vma: Vma,
}

/// Lookup counters, for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub symbol_lookups: usize,
    pub line_lookups: usize,
    pub vma_lookups: usize,
}

pub struct ResolutionCache {
    modules: ModuleTable,
    symbols: HashMap<u64, SymbolIdentity>,
    lines: HashMap<u64, Option<Rc<str>>>,
    vmas: HashMap<u64, Option<Vma>>,
    stats: CacheStats,
}

/// Insert-if-absent lookup that also caches `None`.
fn memoize<V: Clone>(cache: &mut HashMap<u64, V>, addr: u64, lookup: impl FnOnce() -> V) -> V {
    cache.entry(addr).or_insert_with(lookup).clone()
}

impl ResolutionCache {
    #[must_use]
    pub fn new(modules: ModuleTable) -> Self {
        Self {
            modules,
            symbols: HashMap::new(),
            lines: HashMap::new(),
            vmas: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Module and symbol of `addr`.
    ///
    /// The first module whose symbol resolver knows the address wins. If
    /// none does, the first module whose mappings contain the address is
    /// still reported, with no symbol.
    pub fn symbol(&mut self, addr: u64) -> SymbolIdentity {
        let (modules, stats) = (&mut self.modules, &mut self.stats);
        memoize(&mut self.symbols, addr, || {
            stats.symbol_lookups += 1;
            let mut containing = None;
            for module in modules.iter_mut() {
                if containing.is_none() && module.virtual_address(addr).is_some() {
                    containing = Some(Rc::clone(module.name()));
                }
                if let Some(symbol) = module.symbol_at(addr) {
                    return SymbolIdentity {
                        module: Some(Rc::clone(module.name())),
                        symbol: Some(Rc::from(symbol)),
                    };
                }
            }
            SymbolIdentity { module: containing, symbol: None }
        })
    }

    /// `file:line` of `addr` from the first module that can tell.
    pub fn line(&mut self, addr: u64) -> Option<Rc<str>> {
        let (modules, stats) = (&mut self.modules, &mut self.stats);
        memoize(&mut self.lines, addr, || {
            stats.line_lookups += 1;
            modules.iter_mut().find_map(|module| module.line_at(addr)).map(Rc::from)
        })
    }

    /// Relocated VMA of `addr` in the first module that maps it.
    pub fn vma(&mut self, addr: u64) -> Option<Vma> {
        let (modules, stats) = (&self.modules, &mut self.stats);
        memoize(&mut self.vmas, addr, || {
            stats.vma_lookups += 1;
            modules.iter().find_map(|module| module.virtual_address(addr))
        })
    }

    /// All four answers for `addr`.
    pub fn resolve(&mut self, addr: u64) -> ResolvedAddress {
        let SymbolIdentity { module, symbol } = self.symbol(addr);
        let vma = self.vma(addr).unwrap_or(Vma(addr));
        ResolvedAddress { module, symbol, line: self.line(addr), vma }
    }

    /// Shut down every module's resolvers.
    pub fn close(&mut self) {
        self.modules.close();
    }
}

//! Single-pass tallying of resolved samples into the four report views.
//!
//! Every sample increments exactly one entry in each table, so each view
//! sums to the number of samples in the capture.

use log::debug;

use super::hit_counter::{AddressKey, HitCounter, LineKey, ModuleKey, SymbolKey};
use super::resolution_cache::{ResolutionCache, ResolvedAddress};

/// Hit tallies by module, symbol, source line and VMA.
#[derive(Debug, Clone, Default)]
pub struct HitAggregator {
    modules: HitCounter<ModuleKey>,
    symbols: HitCounter<SymbolKey>,
    lines: HitCounter<LineKey>,
    addresses: HitCounter<AddressKey>,
    total_samples: u64,
}

impl HitAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and tally every sample.
    pub fn from_samples(samples: &[u64], cache: &mut ResolutionCache) -> Self {
        let mut aggregator = Self::new();
        for &addr in samples {
            aggregator.record(&cache.resolve(addr));
        }
        debug!(
            "Tallied {} samples: {} modules, {} symbols, {} lines, {} addresses",
            aggregator.total_samples,
            aggregator.modules.len(),
            aggregator.symbols.len(),
            aggregator.lines.len(),
            aggregator.addresses.len()
        );
        aggregator
    }

    /// Count one sample.
    pub fn record(&mut self, resolved: &ResolvedAddress) {
        let module = resolved.module.clone();
        let symbol = resolved.symbol.clone();
        let line = resolved.line.clone();

        self.modules.hit(ModuleKey { module: module.clone() });
        self.symbols.hit(SymbolKey { module: module.clone(), symbol: symbol.clone() });
        self.lines.hit(LineKey {
            module: module.clone(),
            symbol: symbol.clone(),
            line: line.clone(),
        });
        self.addresses.hit(AddressKey { module, symbol, line, vma: resolved.vma });
        self.total_samples += 1;
    }

    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    #[must_use]
    pub fn modules(&self) -> &HitCounter<ModuleKey> {
        &self.modules
    }

    #[must_use]
    pub fn symbols(&self) -> &HitCounter<SymbolKey> {
        &self.symbols
    }

    #[must_use]
    pub fn lines(&self) -> &HitCounter<LineKey> {
        &self.lines
    }

    #[must_use]
    pub fn addresses(&self) -> &HitCounter<AddressKey> {
        &self.addresses
    }
}

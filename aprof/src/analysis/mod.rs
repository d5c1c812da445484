//! Sample attribution and tallying.
//!
//! - [`ResolutionCache`] answers "which module, symbol, line and VMA is this
//!   PC?" once per distinct address.
//! - [`HitAggregator`] folds every sample into four [`HitCounter`] views.

pub mod aggregator;
pub mod hit_counter;
pub mod resolution_cache;

pub use aggregator::HitAggregator;
pub use hit_counter::{label, AddressKey, HitCounter, LineKey, ModuleKey, SymbolKey};
pub use resolution_cache::{CacheStats, ResolutionCache, ResolvedAddress, SymbolIdentity};

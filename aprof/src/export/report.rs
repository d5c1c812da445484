//! Sorted, percentage-annotated views of a finished tally.
//!
//! A [`Report`] is built once from a [`HitAggregator`] and then rendered by
//! the CSV or JSON writer. Symbols are demangled here, while building, so
//! each distinct mangled name reaches the demangler once.

// Percentages intentionally convert sample counts to f64
#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use crate::analysis::HitAggregator;
use crate::domain::Vma;
use crate::symbolization::Demangler;

// =============================================================================
// DEMANGLING
// =============================================================================

/// Memoizing front end for a [`Demangler`].
pub struct DemangleCache {
    demangler: Box<dyn Demangler>,
    names: HashMap<Rc<str>, Rc<str>>,
}

impl DemangleCache {
    #[must_use]
    pub fn new(demangler: Box<dyn Demangler>) -> Self {
        Self { demangler, names: HashMap::new() }
    }

    pub fn demangle(&mut self, symbol: &Rc<str>) -> Rc<str> {
        if let Some(name) = self.names.get(symbol) {
            return Rc::clone(name);
        }
        let name: Rc<str> = Rc::from(self.demangler.demangle(symbol));
        self.names.insert(Rc::clone(symbol), Rc::clone(&name));
        name
    }

    /// Number of distinct names seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn close(&mut self) {
        self.demangler.close();
    }
}

impl Drop for DemangleCache {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// ROWS
// =============================================================================

/// `100 * count / total`; zero when there is nothing to divide by.
#[must_use]
pub fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

/// Split `file:line` on its last colon.
///
/// Text without a colon is all file, with no line.
#[must_use]
pub fn split_location(location: Option<&str>) -> (Option<String>, Option<String>) {
    match location {
        None => (None, None),
        Some(text) => match text.rfind(':') {
            Some(idx) => (Some(text[..idx].to_string()), Some(text[idx + 1..].to_string())),
            None => (Some(text.to_string()), None),
        },
    }
}

fn owned(name: Option<&Rc<str>>) -> Option<String> {
    name.map(|s| s.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRow {
    pub module: Option<String>,
    pub samples: u64,
    #[serde(serialize_with = "two_decimals")]
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolRow {
    pub module: Option<String>,
    pub symbol: Option<String>,
    pub samples: u64,
    #[serde(serialize_with = "two_decimals")]
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRow {
    pub module: Option<String>,
    pub symbol: Option<String>,
    pub file: Option<String>,
    pub line: Option<String>,
    pub samples: u64,
    #[serde(serialize_with = "two_decimals")]
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressRow {
    pub module: Option<String>,
    pub symbol: Option<String>,
    pub file: Option<String>,
    pub line: Option<String>,
    #[serde(serialize_with = "hex_vma")]
    pub vma: Vma,
    pub samples: u64,
    #[serde(serialize_with = "two_decimals")]
    pub percent: f64,
}

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 100.0).round() / 100.0)
}

fn hex_vma<S: Serializer>(vma: &Vma, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(vma)
}

// =============================================================================
// REPORT
// =============================================================================

/// The four views, each sorted by descending `(count, key)`.
///
/// A view whose total is zero has no rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub total_samples: u64,
    pub modules: Vec<ModuleRow>,
    pub symbols: Vec<SymbolRow>,
    pub lines: Vec<LineRow>,
    pub addresses: Vec<AddressRow>,
}

impl Report {
    pub fn build(aggregator: &HitAggregator, demangler: &mut DemangleCache) -> Self {
        let mut demangle = |symbol: Option<&Rc<str>>| {
            symbol.map(|s| demangler.demangle(s).to_string())
        };

        let total = aggregator.modules().total();
        let modules = aggregator
            .modules()
            .sorted_hits()
            .into_iter()
            .map(|(count, key)| ModuleRow {
                module: owned(key.module.as_ref()),
                samples: count,
                percent: percent(count, total),
            })
            .collect();

        let total = aggregator.symbols().total();
        let symbols = aggregator
            .symbols()
            .sorted_hits()
            .into_iter()
            .map(|(count, key)| SymbolRow {
                module: owned(key.module.as_ref()),
                symbol: demangle(key.symbol.as_ref()),
                samples: count,
                percent: percent(count, total),
            })
            .collect();

        let total = aggregator.lines().total();
        let lines = aggregator
            .lines()
            .sorted_hits()
            .into_iter()
            .map(|(count, key)| {
                let (file, line) = split_location(key.line.as_deref());
                LineRow {
                    module: owned(key.module.as_ref()),
                    symbol: demangle(key.symbol.as_ref()),
                    file,
                    line,
                    samples: count,
                    percent: percent(count, total),
                }
            })
            .collect();

        let total = aggregator.addresses().total();
        let addresses = aggregator
            .addresses()
            .sorted_hits()
            .into_iter()
            .map(|(count, key)| {
                let (file, line) = split_location(key.line.as_deref());
                AddressRow {
                    module: owned(key.module.as_ref()),
                    symbol: demangle(key.symbol.as_ref()),
                    file,
                    line,
                    vma: key.vma,
                    samples: count,
                    percent: percent(count, total),
                }
            })
            .collect();

        Self { total_samples: aggregator.total_samples(), modules, symbols, lines, addresses }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ResolvedAddress;
    use crate::symbolization::{Collaborator, IdentityDemangler};
    use std::cell::Cell;

    struct CountingDemangler {
        calls: Rc<Cell<usize>>,
    }

    impl Collaborator for CountingDemangler {}

    impl Demangler for CountingDemangler {
        fn demangle(&mut self, symbol: &str) -> String {
            self.calls.set(self.calls.get() + 1);
            format!("demangled({symbol})")
        }
    }

    fn sample(module: &str, symbol: &str, line: &str, vma: u64) -> ResolvedAddress {
        ResolvedAddress {
            module: Some(Rc::from(module)),
            symbol: Some(Rc::from(symbol)),
            line: Some(Rc::from(line)),
            vma: Vma(vma),
        }
    }

    #[test]
    fn test_split_location() {
        assert_eq!(split_location(None), (None, None));
        assert_eq!(
            split_location(Some("src/main.c:42")),
            (Some("src/main.c".to_string()), Some("42".to_string()))
        );
        // Last colon wins
        assert_eq!(
            split_location(Some("C:/src/main.c:7")),
            (Some("C:/src/main.c".to_string()), Some("7".to_string()))
        );
        assert_eq!(split_location(Some("main.c")), (Some("main.c".to_string()), None));
    }

    #[test]
    fn test_percent() {
        assert!((percent(1, 4) - 25.0).abs() < f64::EPSILON);
        assert!(percent(3, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_rows_are_sorted_and_annotated() {
        let mut aggregator = HitAggregator::new();
        aggregator.record(&sample("/lib/a.so", "f", "a.c:1", 0x10));
        aggregator.record(&sample("/lib/b.so", "g", "b.c:2", 0x20));
        aggregator.record(&sample("/lib/b.so", "g", "b.c:2", 0x20));
        aggregator.record(&ResolvedAddress::default());

        let mut demangler = DemangleCache::new(Box::new(IdentityDemangler));
        let report = Report::build(&aggregator, &mut demangler);

        assert_eq!(report.total_samples, 4);
        assert_eq!(report.modules[0].module.as_deref(), Some("/lib/b.so"));
        assert_eq!(report.modules[0].samples, 2);
        assert!((report.modules[0].percent - 50.0).abs() < 1e-9);

        let row = &report.addresses[0];
        assert_eq!(row.file.as_deref(), Some("b.c"));
        assert_eq!(row.line.as_deref(), Some("2"));
        assert_eq!(row.vma, Vma(0x20));

        let unknown = report.lines.iter().find(|row| row.module.is_none()).unwrap();
        assert_eq!((unknown.symbol.as_ref(), unknown.file.as_ref()), (None, None));
    }

    #[test]
    fn test_each_name_is_demangled_once() {
        let calls = Rc::new(Cell::new(0));
        let mut aggregator = HitAggregator::new();
        aggregator.record(&sample("/lib/a.so", "_Z1fv", "a.c:1", 0x10));
        aggregator.record(&sample("/lib/a.so", "_Z1fv", "a.c:2", 0x14));
        aggregator.record(&sample("/lib/a.so", "_Z1gv", "a.c:9", 0x40));

        let mut demangler =
            DemangleCache::new(Box::new(CountingDemangler { calls: Rc::clone(&calls) }));
        let report = Report::build(&aggregator, &mut demangler);

        assert_eq!(calls.get(), 2);
        assert_eq!(demangler.len(), 2);
        assert!(report.symbols.iter().any(|row| row.symbol.as_deref() == Some("demangled(_Z1fv)")));
    }

    #[test]
    fn test_empty_report() {
        let mut demangler = DemangleCache::new(Box::new(IdentityDemangler));
        let report = Report::build(&HitAggregator::new(), &mut demangler);
        assert_eq!(report, Report::default());
    }
}

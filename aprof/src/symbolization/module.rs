//! One captured module and its relocation state.
//!
//! Shared objects are loaded wherever the dynamic linker finds room, so a
//! captured PC cannot be looked up in the binary's tables directly. Each
//! executable mapping in the maps dump carries the file offset it was mapped
//! from; matching that offset against the ELF LOAD segments gives the VMA the
//! mapping was linked at, and the difference is the relocation tweak:
//!
//! ```text
//! LOAD offset 0x1000 -> VMA 0x8000
//! mapping 0x6000-0x7000 @ offset 0x1000
//! tweak = 0x8000 - 0x6000 = 0x2000
//! PC 0x6050 -> VMA 0x8050
//! ```

use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::domain::{Mapping, Permissions, Vma};
use crate::symbolization::module_cache::ModuleCache;
use crate::symbolization::toolchain::{
    LineResolver, ResolverState, SegmentTable, SymbolResolver, Toolchain,
};

/// An accepted mapping: `[begin, end)` plus the additive VMA correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRange {
    pub begin: u64,
    pub end: u64,
    /// `segment VMA - begin`, in wrapping arithmetic.
    pub tweak: u64,
}

impl MappedRange {
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.begin && addr < self.end
    }

    #[must_use]
    pub fn translate(&self, addr: u64) -> Vma {
        Vma(addr.wrapping_add(self.tweak))
    }
}

struct LoadedModule {
    local: PathBuf,
    segments: SegmentTable,
    ranges: Vec<MappedRange>,
    /// `None` until first use.
    symbols: Option<ResolverState<dyn SymbolResolver>>,
    lines: Option<ResolverState<dyn LineResolver>>,
}

impl LoadedModule {
    fn translate(&self, addr: u64) -> Option<Vma> {
        self.ranges.iter().find(|r| r.contains(addr)).map(|r| r.translate(addr))
    }
}

enum ModuleState {
    /// Content missing or not an object file; every query answers `None`.
    Unavailable,
    Loaded(LoadedModule),
}

/// A binary as mapped into the captured process.
pub struct Module {
    name: Rc<str>,
    toolchain: Rc<dyn Toolchain>,
    state: ModuleState,
}

impl Module {
    /// Fetch the module through the cache and read its segment table.
    ///
    /// Never fails: problems leave the module permanently unavailable.
    pub fn load(remote: &str, cache: &mut ModuleCache, toolchain: Rc<dyn Toolchain>) -> Self {
        let local = cache.get(remote);
        if local.is_none() {
            warn!("Module {remote} could not be found (make sure the device is connected)");
        }
        Self::from_local(remote, local.as_deref(), toolchain)
    }

    /// Build from an already available local copy (or none).
    pub fn from_local(remote: &str, local: Option<&Path>, toolchain: Rc<dyn Toolchain>) -> Self {
        let state = match local {
            None => ModuleState::Unavailable,
            Some(local) => match toolchain.segments(local) {
                Ok(segments) => {
                    debug!("{remote}: {} LOAD segments", segments.len());
                    ModuleState::Loaded(LoadedModule {
                        local: local.to_path_buf(),
                        segments,
                        ranges: Vec::new(),
                        symbols: None,
                        lines: None,
                    })
                }
                Err(e) => {
                    warn!("Module {remote} is not a valid ELF file: {e}");
                    ModuleState::Unavailable
                }
            },
        };
        Self { name: Rc::from(remote), toolchain, state }
    }

    /// Remote path, the module's identity.
    #[must_use]
    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.state, ModuleState::Loaded(_))
    }

    /// Accepted ranges in insertion order.
    #[must_use]
    pub fn ranges(&self) -> &[MappedRange] {
        match &self.state {
            ModuleState::Unavailable => &[],
            ModuleState::Loaded(loaded) => &loaded.ranges,
        }
    }

    /// Record a mapping of this module.
    ///
    /// Mappings whose file offset is not the start of a LOAD segment are
    /// ignored.
    pub fn add_mapping(&mut self, begin: u64, end: u64, file_offset: u64, perm: &Permissions) {
        let ModuleState::Loaded(loaded) = &mut self.state else {
            return;
        };
        let Some(segment_vma) = loaded.segments.vma_at_offset(file_offset) else {
            info!("ignoring strange mapping: {}+0x{file_offset:x} ({perm})", self.name);
            return;
        };
        loaded.ranges.push(MappedRange { begin, end, tweak: segment_vma.0.wrapping_sub(begin) });
    }

    /// Relocated VMA of a captured address, if one of our ranges holds it.
    ///
    /// Overlapping ranges only occur with malformed maps; the first one
    /// recorded wins.
    #[must_use]
    pub fn virtual_address(&self, addr: u64) -> Option<Vma> {
        match &self.state {
            ModuleState::Unavailable => None,
            ModuleState::Loaded(loaded) => loaded.translate(addr),
        }
    }

    /// Symbol enclosing a captured address.
    pub fn symbol_at(&mut self, addr: u64) -> Option<String> {
        let ModuleState::Loaded(loaded) = &mut self.state else {
            return None;
        };
        let vma = loaded.translate(addr)?;
        let (name, toolchain) = (&self.name, &self.toolchain);
        loaded
            .symbols
            .get_or_insert_with(|| {
                ResolverState::open("symbols", name, toolchain.symbol_resolver(&loaded.local))
            })
            .query(|resolver| resolver.resolve(vma))
    }

    /// `file:line` of a captured address.
    pub fn line_at(&mut self, addr: u64) -> Option<String> {
        let ModuleState::Loaded(loaded) = &mut self.state else {
            return None;
        };
        let vma = loaded.translate(addr)?;
        let (name, toolchain) = (&self.name, &self.toolchain);
        loaded
            .lines
            .get_or_insert_with(|| {
                ResolverState::open("line numbers", name, toolchain.line_resolver(&loaded.local))
            })
            .query(|resolver| resolver.resolve(vma))
    }

    /// Shut down any resolver that was started. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let ModuleState::Loaded(loaded) = &mut self.state {
            if let Some(mut symbols) = loaded.symbols.take() {
                symbols.close();
            }
            if let Some(mut lines) = loaded.lines.take() {
                lines.close();
            }
        }
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        self.close();
    }
}

/// All modules of one capture, in first-seen order.
#[derive(Default)]
pub struct ModuleTable {
    modules: Vec<Module>,
    index: HashMap<Rc<str>, usize>,
}

impl ModuleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from parsed mappings, loading each module once.
    pub fn build(
        mappings: &[Mapping],
        cache: &mut ModuleCache,
        toolchain: &Rc<dyn Toolchain>,
    ) -> Self {
        let mut table = Self::new();
        for mapping in mappings {
            if !table.index.contains_key(mapping.path.as_str()) {
                table.insert(Module::load(&mapping.path, cache, Rc::clone(toolchain)));
            }
            if let Some(module) = table.get_mut(&mapping.path) {
                module.add_mapping(
                    mapping.begin,
                    mapping.end,
                    mapping.file_offset,
                    &mapping.permissions,
                );
            }
        }
        info!("Loaded {} modules", table.len());
        table
    }

    /// Add a module; a module with the same name is replaced in place.
    pub fn insert(&mut self, module: Module) {
        if let Some(&idx) = self.index.get(module.name()) {
            self.modules[idx] = module;
        } else {
            self.index.insert(Rc::clone(module.name()), self.modules.len());
            self.modules.push(module);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.index.get(name).map(|&idx| &self.modules[idx])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.index.get(name).map(|&idx| &mut self.modules[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Module> {
        self.modules.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn close(&mut self) {
        for module in &mut self.modules {
            module.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResolverError;
    use crate::symbolization::toolchain::{Collaborator, Demangler, IdentityDemangler};
    use std::cell::Cell;

    /// Toolchain with a fixed segment table; symbols are named after the VMA.
    struct FakeToolchain {
        segments: SegmentTable,
        opened: Rc<Cell<usize>>,
        closed: Rc<Cell<usize>>,
    }

    struct VmaNamer {
        closed: Rc<Cell<usize>>,
    }

    impl Collaborator for VmaNamer {
        fn close(&mut self) {
            self.closed.set(self.closed.get() + 1);
        }
    }

    impl SymbolResolver for VmaNamer {
        fn resolve(&mut self, vma: Vma) -> Option<String> {
            Some(format!("sym_{vma}"))
        }
    }

    impl LineResolver for VmaNamer {
        fn resolve(&mut self, vma: Vma) -> Option<String> {
            Some(format!("src/{vma}.c:1"))
        }
    }

    impl Toolchain for FakeToolchain {
        fn segments(&self, _local: &Path) -> Result<SegmentTable, ResolverError> {
            Ok(self.segments.clone())
        }

        fn symbol_resolver(
            &self,
            _local: &Path,
        ) -> Result<Box<dyn SymbolResolver>, ResolverError> {
            self.opened.set(self.opened.get() + 1);
            Ok(Box::new(VmaNamer { closed: Rc::clone(&self.closed) }))
        }

        fn line_resolver(&self, _local: &Path) -> Result<Box<dyn LineResolver>, ResolverError> {
            self.opened.set(self.opened.get() + 1);
            Ok(Box::new(VmaNamer { closed: Rc::clone(&self.closed) }))
        }

        fn demangler(&self) -> Box<dyn Demangler> {
            Box::new(IdentityDemangler)
        }
    }

    fn fake(segments: &[(u64, u64)]) -> (Rc<dyn Toolchain>, Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let opened = Rc::new(Cell::new(0));
        let closed = Rc::new(Cell::new(0));
        let toolchain = FakeToolchain {
            segments: segments.iter().map(|&(o, v)| (o, Vma(v))).collect(),
            opened: Rc::clone(&opened),
            closed: Rc::clone(&closed),
        };
        (Rc::new(toolchain), opened, closed)
    }

    fn rx() -> Permissions {
        Permissions::parse("r-xp").unwrap()
    }

    #[test]
    fn test_relocation_tweak() {
        let (toolchain, _, _) = fake(&[(0x1000, 0x8000)]);
        let mut module = Module::from_local("/lib/libx.so", Some(Path::new("x")), toolchain);
        module.add_mapping(0x6000, 0x7000, 0x1000, &rx());

        assert_eq!(module.ranges()[0].tweak, 0x2000);
        assert_eq!(module.virtual_address(0x6050), Some(Vma(0x8050)));
        assert_eq!(module.virtual_address(0x7000), None);
        assert_eq!(module.symbol_at(0x6050), Some("sym_0x8050".to_string()));
        assert_eq!(module.line_at(0x6050), Some("src/0x8050.c:1".to_string()));
    }

    #[test]
    fn test_negative_tweak() {
        let (toolchain, _, _) = fake(&[(0, 0)]);
        let mut module = Module::from_local("/lib/liby.so", Some(Path::new("y")), toolchain);
        module.add_mapping(0x4000_0000, 0x4001_0000, 0, &rx());
        assert_eq!(module.virtual_address(0x4000_0123), Some(Vma(0x123)));
    }

    #[test]
    fn test_unknown_offset_is_dropped() {
        let (toolchain, opened, _) = fake(&[(0x1000, 0x8000)]);
        let mut module = Module::from_local("/lib/libx.so", Some(Path::new("x")), toolchain);
        module.add_mapping(0x6000, 0x7000, 0x3000, &rx());

        assert!(module.ranges().is_empty());
        assert_eq!(module.virtual_address(0x6050), None);
        assert_eq!(module.symbol_at(0x6050), None);
        // No containing mapping, so no resolver was started
        assert_eq!(opened.get(), 0);
    }

    #[test]
    fn test_first_mapping_wins_on_overlap() {
        let (toolchain, _, _) = fake(&[(0, 0x1_0000), (0x1000, 0x2_0000)]);
        let mut module = Module::from_local("/lib/libz.so", Some(Path::new("z")), toolchain);
        module.add_mapping(0x5000, 0x7000, 0, &rx());
        module.add_mapping(0x6000, 0x8000, 0x1000, &rx());

        assert_eq!(module.virtual_address(0x6000), Some(Vma(0x1_1000)));
        assert_eq!(module.virtual_address(0x7800), Some(Vma(0x2_1800)));
    }

    #[test]
    fn test_unavailable_module_is_inert() {
        let (toolchain, opened, _) = fake(&[(0, 0)]);
        let mut module = Module::from_local("/lib/gone.so", None, toolchain);
        module.add_mapping(0x1000, 0x2000, 0, &rx());

        assert!(!module.is_ok());
        assert_eq!(module.virtual_address(0x1000), None);
        assert_eq!(module.symbol_at(0x1000), None);
        assert_eq!(module.line_at(0x1000), None);
        assert_eq!(opened.get(), 0);
        module.close();
    }

    #[test]
    fn test_resolvers_open_lazily_and_close_once() {
        let (toolchain, opened, closed) = fake(&[(0, 0)]);
        let mut module = Module::from_local("/lib/libw.so", Some(Path::new("w")), toolchain);
        module.add_mapping(0x1000, 0x2000, 0, &rx());
        assert_eq!(opened.get(), 0);

        module.symbol_at(0x1001);
        module.symbol_at(0x1002);
        assert_eq!(opened.get(), 1);
        module.line_at(0x1001);
        assert_eq!(opened.get(), 2);

        module.close();
        module.close();
        drop(module);
        assert_eq!(closed.get(), 2);
    }

    #[test]
    fn test_table_keeps_first_seen_order() {
        let (toolchain, _, _) = fake(&[(0, 0)]);
        let mut table = ModuleTable::new();
        table.insert(Module::from_local("/b.so", Some(Path::new("b")), Rc::clone(&toolchain)));
        table.insert(Module::from_local("/a.so", Some(Path::new("a")), Rc::clone(&toolchain)));

        let names: Vec<&str> = table.iter().map(|m| &**m.name()).collect();
        assert_eq!(names, vec!["/b.so", "/a.so"]);
        assert!(table.get("/a.so").is_some());
        assert!(table.get("/c.so").is_none());
    }
}

//! In-process collaborators built on `object`, `addr2line` and the demangler
//! crates. This is the default toolchain: it needs nothing installed on the
//! host beyond the module files themselves.

use addr2line::Context;
use gimli::{EndianRcSlice, RunTimeEndian};
use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol};
use rustc_demangle::try_demangle;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::domain::{ResolverError, Vma};
use crate::symbolization::toolchain::{
    Collaborator, Demangler, LineResolver, SegmentTable, SymbolResolver, Toolchain,
};

fn read_file(path: &Path) -> Result<Vec<u8>, ResolverError> {
    fs::read(path).map_err(|source| ResolverError::Read { path: path.to_path_buf(), source })
}

fn parse_object<'data>(
    path: &Path,
    data: &'data [u8],
) -> Result<object::File<'data>, ResolverError> {
    object::File::parse(data)
        .map_err(|source| ResolverError::InvalidObject { path: path.to_path_buf(), source })
}

/// Read the LOAD program headers of an object file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed
pub fn read_segment_table(path: &Path) -> Result<SegmentTable, ResolverError> {
    let data = read_file(path)?;
    let obj = parse_object(path, &data)?;
    Ok(obj.segments().map(|segment| (segment.file_range().0, Vma(segment.address()))).collect())
}

/// One `(address, size, name)` row of a symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub address: u64,
    pub size: u64,
    pub name: String,
}

impl SymbolEntry {
    #[must_use]
    pub fn contains(&self, vma: Vma) -> bool {
        vma.0 >= self.address && vma.0 - self.address < self.size
    }
}

/// Symbol lookup over `.dynsym` followed by `.symtab`.
///
/// Aliases overlap freely, so lookups keep table order and return the
/// first row that encloses the address.
#[derive(Debug, Clone, Default)]
pub struct ElfSymbolTable {
    symbols: Vec<SymbolEntry>,
}

impl ElfSymbolTable {
    /// Load the symbol tables of an object file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_path(path: &Path) -> Result<Self, ResolverError> {
        let data = read_file(path)?;
        let obj = parse_object(path, &data)?;

        let symbols = obj
            .dynamic_symbols()
            .chain(obj.symbols())
            .filter(|sym| sym.size() > 0)
            .filter_map(|sym| {
                let name = sym.name().ok().filter(|n| !n.is_empty())?;
                Some(SymbolEntry {
                    address: sym.address(),
                    size: sym.size(),
                    name: name.to_string(),
                })
            })
            .collect();

        Ok(Self { symbols })
    }

    #[must_use]
    pub fn from_entries(symbols: Vec<SymbolEntry>) -> Self {
        Self { symbols }
    }

    #[must_use]
    pub fn lookup(&self, vma: Vma) -> Option<&str> {
        self.symbols.iter().find(|s| s.contains(vma)).map(|s| s.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Collaborator for ElfSymbolTable {}

impl SymbolResolver for ElfSymbolTable {
    fn resolve(&mut self, vma: Vma) -> Option<String> {
        self.lookup(vma).map(str::to_string)
    }
}

/// Source line lookup through DWARF debug information
pub struct DwarfLineResolver {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
}

impl DwarfLineResolver {
    /// Load DWARF sections for the given binary
    ///
    /// # Errors
    /// Returns an error if the binary file cannot be read or parsed
    pub fn new(path: &Path) -> Result<Self, ResolverError> {
        let binary_data = read_file(path)?;
        let obj_file = parse_object(path, &binary_data)?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf_error = |source| ResolverError::Dwarf { path: path.to_path_buf(), source };
        let dwarf = gimli::Dwarf::load(&load_section).map_err(dwarf_error)?;
        let ctx = Context::from_dwarf(dwarf).map_err(dwarf_error)?;

        Ok(Self { ctx })
    }
}

impl Collaborator for DwarfLineResolver {}

impl LineResolver for DwarfLineResolver {
    fn resolve(&mut self, vma: Vma) -> Option<String> {
        let location = self.ctx.find_location(vma.0).ok()??;
        let file = location.file?;
        Some(match location.line {
            Some(line) => format!("{file}:{line}"),
            None => format!("{file}:?"),
        })
    }
}

/// Rust (legacy and v0) and Itanium C++ demangling.
#[derive(Debug, Default)]
pub struct NativeDemangler;

impl NativeDemangler {
    /// Demangle a symbol name, returning it unchanged if no scheme matches
    #[must_use]
    pub fn demangle_symbol(symbol: &str) -> String {
        if let Ok(demangled) = try_demangle(symbol) {
            return format!("{demangled:#}");
        }
        if symbol.starts_with("_Z") {
            if let Ok(parsed) = cpp_demangle::Symbol::new(symbol) {
                if let Ok(demangled) = parsed.demangle(&cpp_demangle::DemangleOptions::default()) {
                    return demangled;
                }
            }
        }
        symbol.to_string()
    }
}

impl Collaborator for NativeDemangler {}

impl Demangler for NativeDemangler {
    fn demangle(&mut self, symbol: &str) -> String {
        Self::demangle_symbol(symbol)
    }
}

/// Everything in-process.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeToolchain;

impl Toolchain for NativeToolchain {
    fn segments(&self, local: &Path) -> Result<SegmentTable, ResolverError> {
        read_segment_table(local)
    }

    fn symbol_resolver(&self, local: &Path) -> Result<Box<dyn SymbolResolver>, ResolverError> {
        Ok(Box::new(ElfSymbolTable::from_path(local)?))
    }

    fn line_resolver(&self, local: &Path) -> Result<Box<dyn LineResolver>, ResolverError> {
        Ok(Box::new(DwarfLineResolver::new(local)?))
    }

    fn demangler(&self) -> Box<dyn Demangler> {
        Box::new(NativeDemangler)
    }
}

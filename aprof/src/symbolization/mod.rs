//! # Symbol Resolution and Address Translation
//!
//! This module turns raw program counters captured on the device into
//! module, symbol and source line names. This process is called
//! **symbolization**.
//!
//! ## The Symbolization Problem
//!
//! A capture records addresses like `0xb6f1c4d8`. To be useful they must be
//! translated to:
//! - **Module**: `/system/lib/libc.so`
//! - **Symbol**: `memcpy`
//! - **Source location**: `bionic/libc/arch-arm/memcpy.S:112`
//!
//! ## Key Concepts
//!
//! ### Relocation
//!
//! Symbol and line tables are keyed by the VMA the binary was linked at, but
//! shared objects are loaded wherever there is room. The maps dump tells us
//! where each segment landed and which file offset it came from; the ELF
//! program headers tell us which VMA that file offset was linked at. The
//! difference is the per-mapping relocation tweak (see [`module`]).
//!
//! ### Collaborators
//!
//! Reading the binaries is delegated to a [`Toolchain`]:
//! - [`NativeToolchain`] (default): `object` for program headers and symbol
//!   tables, `addr2line`/`gimli` for DWARF lines, `rustc-demangle` and
//!   `cpp_demangle` for names
//! - [`BinutilsToolchain`]: long-lived `addr2line` and `c++filt` processes
//!   from a cross toolchain, e.g. `arm-linux-androideabi-`
//!
//! Any collaborator that fails to start is permanently disabled for that
//! module; lookups then answer "unknown" instead of aborting the run.
//!
//! ## Address Translation Flow
//!
//! ```text
//! 1. Maps dump:   b6f00000-b6f40000 r-xp 00000000 ... /system/lib/libc.so
//! 2. ModuleCache: /system/lib/libc.so -> .aprof_cache/__system__lib__libc.so
//! 3. Segments:    LOAD offset 0x0 -> VMA 0x0       => tweak = -0xb6f00000
//! 4. Sample:      0xb6f1c4d8 -> VMA 0x1c4d8
//! 5. Symbols:     0x1c4d8 in [memcpy, +0x1a0)       => memcpy
//! 6. Lines:       0x1c4d8 -> memcpy.S:112
//! ```
//!
//! ## Module Structure
//!
//! - **`module_cache`**: local copies of device modules (overrides, cache, pull)
//! - **`module`**: per-module mappings and relocation, lazy resolvers
//! - **`toolchain`**: collaborator traits and the `Disabled | Active` state
//! - **`native`** / **`binutils`**: the two shipped toolchains

pub mod binutils;
pub mod module;
pub mod module_cache;
pub mod native;
pub mod toolchain;

pub use binutils::BinutilsToolchain;
pub use module::{MappedRange, Module, ModuleTable};
pub use module_cache::{AdbFetcher, Fetcher, ModuleCache, DEFAULT_CACHE_DIR};
pub use native::NativeToolchain;
pub use toolchain::{
    Collaborator, Demangler, IdentityDemangler, LineResolver, ResolverState, SegmentTable,
    SymbolResolver, Toolchain,
};

//! # aprof - PC-sample profile post-processor
//!
//! aprof turns a PROFDAT1 capture (raw program-counter samples plus a
//! `/proc/<pid>/maps` snapshot taken on the device) into hit reports by
//! module, symbol, source line and address.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Profile    │──▶│  Resolution  │──▶│     Hit      │──▶│    Export    │
//! │   Parser     │   │    Cache     │   │  Aggregator  │   │  (CSV/JSON)  │
//! └──────┬───────┘   └──────┬───────┘   └──────────────┘   └──────────────┘
//!        │ mappings         │ per-address lookups
//!        ▼                  ▼
//! ┌──────────────────────────────────────┐
//! │ Symbolization                        │
//! │  ModuleCache ─▶ Module ─▶ Toolchain  │
//! │  (adb pull)    (relocation) (ELF,    │
//! │                              DWARF)  │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`profile`]: PROFDAT1 container parser and maps grammar
//! - [`symbolization`]: module fetching, relocation and the resolver traits
//!   - `native`: in-process ELF symbols, DWARF lines and demangling
//!   - `binutils`: long-lived `addr2line` / `c++filt` workers
//! - [`analysis`]: per-address memoization and the four hit tallies
//! - [`export`]: sorted, percentage-annotated report as CSV or JSON
//! - [`session`]: the end-to-end pipeline
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: shared types and error enums
//!
//! ## Typical Usage
//!
//! ```bash
//! # Modules are pulled from the device with adb and cached
//! aprof capture.prof
//!
//! # Prefer local unstripped copies, matched by file name
//! aprof capture.prof out/symbols/system/lib/*.so
//! ```
//!
//! ## Key Concepts
//!
//! - **VMA**: the address a module's symbol and line tables were linked at
//! - **Relocation tweak**: `segment VMA - mapping begin`, added to a sampled
//!   PC to get its VMA
//! - **Segment Load Table**: ELF LOAD file offset -> VMA, per module

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod profile;
pub mod session;
pub mod symbolization;

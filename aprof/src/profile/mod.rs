//! # PROFDAT1 Container Parsing
//!
//! A capture is a single file written by the on-target sampler:
//!
//! ```text
//! offset 0   "PROFDAT1"                   8-byte chunk ID
//! offset 8   u32 LE  sample width         4 (8 is reserved for 64-bit targets)
//! offset 12  u64 LE  sample count
//! offset 20  count * width bytes          raw PC samples, little-endian
//! then       "MAPSDATA"                   8-byte chunk ID
//! then       4 reserved bytes             never a valid length, always skipped
//! then       /proc/self/maps text         to end of file
//! ```
//!
//! - **`parser`**: the chunk state machine, fatal on any corruption
//! - **`maps`**: the `/proc/<pid>/maps` line grammar and the filter that
//!   keeps only executable, file-backed mappings

pub mod maps;
pub mod parser;

pub use maps::{parse_map_line, parse_maps};
pub use parser::{parse_profile, read_profile, RawProfile};

//! Domain model for aprof
//!
//! This module contains core domain types and errors that provide:
//! - Newtypes for the two address spaces (captured runtime addresses vs. VMAs)
//! - Structured error handling for fatal and degraded conditions

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{Mapping, Permissions, Vma, UNKNOWN};

pub use errors::{FetchError, ProfileError, ResolverError};

//! Structured error types for aprof
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! [`ProfileError`] is fatal; the other two are absorbed where they occur and
//! only ever surface as warnings.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("corrupted file: bad chunk ID (expected PROFDAT1)")]
    BadChunkId,

    #[error("corrupted file: too short (reading {0})")]
    TooShort(&'static str),

    #[error("corrupted file: crazy PC size {0}")]
    InvalidSampleWidth(u32),

    #[error("{0}-byte PC samples are not supported yet")]
    UnsupportedSampleWidth(u32),

    #[error("corrupted file: expected {expected} samples, found {found}")]
    TruncatedSamples { expected: u64, found: u64 },

    #[error("corrupted file: no MAPSDATA chunk")]
    MissingMapsChunk,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status} while pulling {remote}")]
    ExitStatus { program: String, remote: String, status: std::process::ExitStatus },

    #[error("{0} was not produced")]
    Missing(PathBuf),
}

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid object file: {source}")]
    InvalidObject {
        path: PathBuf,
        #[source]
        source: object::Error,
    },

    #[error("failed to load DWARF from {path}: {source}")]
    Dwarf {
        path: PathBuf,
        #[source]
        source: gimli::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} rejected {path}")]
    ToolRejected { program: String, path: PathBuf },
}

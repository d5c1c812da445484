//! Command-line interface for aprof
//!
//! This module contains CLI argument parsing and configuration

pub mod args;

pub use args::Args;

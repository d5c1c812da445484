//! # aprof - Main Entry Point
//!
//! Reads a PROFDAT1 capture, attributes every sample and prints the report.
//! Diagnostics go to stderr through `env_logger` (`RUST_LOG`, default `warn`);
//! the report goes to stdout or `--output`.

use anyhow::Result;
use clap::Parser;

use aprof::cli::Args;
use aprof::session;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run() -> Result<()> {
    let args = Args::parse();
    session::run(&args.to_config())
}

//! CLI argument definitions

use clap::Parser;
use log::warn;
use std::path::PathBuf;

use crate::export::OutputFormat;
use crate::session::Config;
use crate::symbolization::DEFAULT_CACHE_DIR;

#[derive(Parser, Debug)]
#[command(
    name = "aprof",
    version,
    about = "Attribute PC samples from a PROFDAT1 capture to modules, symbols and source lines",
    after_help = "\
EXAMPLES:
    aprof capture.prof                               Fetch modules with adb, print CSV
    aprof capture.prof out/symbols/system/lib/*.so   Prefer local unstripped copies
    aprof capture.prof 'out/symbols/**/*.so'         Same, with the pattern expanded by aprof
    aprof --format json -o report.json capture.prof  Write a JSON report"
)]
pub struct Args {
    /// PROFDAT1 file to analyse
    #[arg(value_name = "PROFILE")]
    pub profile: PathBuf,

    /// Local copies of modules (glob patterns), matched against remote paths by basename
    #[arg(value_name = "LOCAL")]
    pub local: Vec<PathBuf>,

    /// Persistent directory for fetched modules
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Re-fetch every module without a local copy, even if cached
    #[arg(long)]
    pub fresh: bool,

    /// Program used to pull modules, run as `<PROGRAM> pull <remote> <local>`
    #[arg(long, value_name = "PROGRAM", default_value = "adb")]
    pub adb: String,

    /// Use external `<PREFIX>addr2line` and `<PREFIX>c++filt` (e.g. "arm-linux-androideabi-")
    #[arg(long, value_name = "PREFIX")]
    pub toolchain_prefix: Option<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Write the report to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Convert parsed arguments into a pipeline configuration.
    #[must_use]
    pub fn to_config(&self) -> Config {
        Config {
            profile: self.profile.clone(),
            overrides: expand_overrides(&self.local),
            cache_dir: self.cache_dir.clone(),
            fresh: self.fresh,
            fetch_program: self.adb.clone(),
            toolchain_prefix: self.toolchain_prefix.clone(),
            format: self.format,
            output: self.output.clone(),
        }
    }
}

/// Expand every local override pattern into the files it matches.
///
/// Patterns that match nothing contribute nothing; invalid ones are skipped
/// with a warning.
fn expand_overrides(patterns: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let pattern = pattern.to_string_lossy();
        let matches = match glob::glob(&pattern) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Ignoring invalid local module pattern {pattern}: {e}");
                continue;
            }
        };
        let before = paths.len();
        paths.extend(matches.filter_map(Result::ok));
        if paths.len() == before {
            warn!("No local modules match {pattern}");
        }
    }
    paths
}

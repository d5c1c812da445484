//! End-to-end pipeline: parse, resolve, tally, report.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::info;

use crate::analysis::{HitAggregator, ResolutionCache};
use crate::export::{DemangleCache, OutputFormat, Report};
use crate::profile::{read_profile, RawProfile};
use crate::symbolization::{
    AdbFetcher, BinutilsToolchain, ModuleCache, ModuleTable, NativeToolchain, Toolchain,
    DEFAULT_CACHE_DIR,
};

/// Everything one run needs, independent of how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub profile: PathBuf,
    /// Local copies of modules, matched against remote paths by basename.
    pub overrides: Vec<PathBuf>,
    pub cache_dir: PathBuf,
    /// Re-fetch every module that has no local override.
    pub fresh: bool,
    pub fetch_program: String,
    /// Use `<prefix>addr2line` and `<prefix>c++filt` instead of the in-process readers.
    pub toolchain_prefix: Option<String>,
    pub format: OutputFormat,
    /// `None` writes to stdout.
    pub output: Option<PathBuf>,
}

impl Config {
    #[must_use]
    pub fn new(profile: impl Into<PathBuf>) -> Self {
        Self {
            profile: profile.into(),
            overrides: Vec::new(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            fresh: false,
            fetch_program: "adb".to_string(),
            toolchain_prefix: None,
            format: OutputFormat::default(),
            output: None,
        }
    }

    /// The toolchain this configuration asks for.
    #[must_use]
    pub fn toolchain(&self) -> Rc<dyn Toolchain> {
        match &self.toolchain_prefix {
            Some(prefix) => Rc::new(BinutilsToolchain::new(prefix.clone())),
            None => Rc::new(NativeToolchain),
        }
    }
}

/// Module cache plus toolchain, shared by every step of a run.
pub struct Session {
    cache: ModuleCache,
    toolchain: Rc<dyn Toolchain>,
}

impl Session {
    #[must_use]
    pub fn new(cache: ModuleCache, toolchain: Rc<dyn Toolchain>) -> Self {
        Self { cache, toolchain }
    }

    /// # Errors
    /// Returns an error if the cache directory cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = AdbFetcher::new(config.fetch_program.clone());
        let cache = ModuleCache::new(
            config.cache_dir.clone(),
            config.overrides.clone(),
            Box::new(fetcher),
        )
        .with_context(|| {
            format!("Failed to create cache directory {}", config.cache_dir.display())
        })?
        .always_fresh(config.fresh);
        Ok(Self::new(cache, config.toolchain()))
    }

    /// Resolve every sample and tally the hits.
    pub fn analyze(&mut self, profile: &RawProfile) -> HitAggregator {
        let modules = ModuleTable::build(&profile.mappings, &mut self.cache, &self.toolchain);
        let mut resolution = ResolutionCache::new(modules);
        let aggregator = HitAggregator::from_samples(&profile.samples, &mut resolution);

        let stats = resolution.stats();
        info!(
            "Resolved {} distinct addresses ({} line lookups)",
            stats.symbol_lookups, stats.line_lookups
        );
        resolution.close();
        aggregator
    }

    /// Analyze and build the demangled report.
    pub fn report(&mut self, profile: &RawProfile) -> Report {
        let aggregator = self.analyze(profile);
        let mut demangler = DemangleCache::new(self.toolchain.demangler());
        let report = Report::build(&aggregator, &mut demangler);
        demangler.close();
        report
    }
}

/// Render `profile` completely before writing a byte of it.
///
/// # Errors
/// Returns an error if writing the rendered report fails
pub fn render(session: &mut Session, profile: &RawProfile, format: OutputFormat) -> Result<Vec<u8>> {
    let report = session.report(profile);
    let mut buffer = Vec::new();
    report.write_to(format, &mut buffer)?;
    Ok(buffer)
}

/// Run the whole pipeline for `config`.
///
/// # Errors
/// Returns an error if the profile is unreadable or malformed, or the
/// report cannot be written. No output is produced in that case.
pub fn run(config: &Config) -> Result<()> {
    let profile = read_profile(&config.profile)
        .with_context(|| format!("Failed to read profile {}", config.profile.display()))?;
    info!(
        "{} samples, {} code mappings",
        profile.samples.len(),
        profile.mappings.len()
    );

    let mut session = Session::from_config(config)?;
    let rendered = render(&mut session, &profile, config.format)?;

    match &config.output {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            file.write_all(&rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&rendered)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new("capture.prof");
        assert_eq!(config.cache_dir, PathBuf::from(".aprof_cache"));
        assert_eq!(config.fetch_program, "adb");
        assert_eq!(config.format, OutputFormat::Csv);
        assert!(!config.fresh);
        assert!(config.overrides.is_empty());
    }

    #[test]
    fn test_malformed_profile_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.prof");
        std::fs::write(&path, b"NOTAPROF").unwrap();
        let output = dir.path().join("report.csv");

        let mut config = Config::new(&path);
        config.cache_dir = dir.path().join("cache");
        config.output = Some(output.clone());

        let err = run(&config).unwrap_err();
        assert!(format!("{err:#}").contains("bad chunk ID"));
        assert!(!output.exists());
    }
}

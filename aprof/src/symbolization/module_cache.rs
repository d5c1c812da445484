//! Local copies of on-device modules.
//!
//! Every module named in the maps dump lives on the target device. Before it
//! can be inspected we need a local file, taken (in order) from:
//!
//! 1. the copy already resolved earlier in this run
//! 2. a user-supplied override whose basename matches
//! 3. the persistent cache directory, pulling from the device when missing

use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::domain::FetchError;

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".aprof_cache";

/// Pulls a remote module to a local path.
pub trait Fetcher {
    /// # Errors
    /// Returns an error if the module could not be copied to `dest`
    fn fetch(&self, remote: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Fetches with `adb pull <remote> <dest>`.
#[derive(Debug, Clone)]
pub struct AdbFetcher {
    program: String,
}

impl AdbFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for AdbFetcher {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl Fetcher for AdbFetcher {
    fn fetch(&self, remote: &str, dest: &Path) -> Result<(), FetchError> {
        info!("Pulling {remote} -> {}", dest.display());
        let status = Command::new(&self.program)
            .arg("pull")
            .arg(remote)
            .arg(dest)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| FetchError::Spawn { program: self.program.clone(), source })?;

        if !status.success() {
            return Err(FetchError::ExitStatus {
                program: self.program.clone(),
                remote: remote.to_string(),
                status,
            });
        }
        if !dest.is_file() {
            return Err(FetchError::Missing(dest.to_path_buf()));
        }
        Ok(())
    }
}

/// Resolves remote module paths to local files.
pub struct ModuleCache {
    cache_dir: PathBuf,
    overrides: Vec<PathBuf>,
    fetcher: Box<dyn Fetcher>,
    always_fresh: bool,
    /// Successful resolutions only; failures are retried on the next request.
    resolved: HashMap<String, PathBuf>,
}

impl ModuleCache {
    /// Create a cache rooted at `cache_dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the cache directory cannot be created
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        overrides: Vec<PathBuf>,
        fetcher: Box<dyn Fetcher>,
    ) -> io::Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir, overrides, fetcher, always_fresh: false, resolved: HashMap::new() })
    }

    /// Re-fetch every cached module on its first request in this run.
    #[must_use]
    pub fn always_fresh(mut self, fresh: bool) -> Self {
        self.always_fresh = fresh;
        self
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local copy of `remote`, honouring the cache-wide freshness setting.
    pub fn get(&mut self, remote: &str) -> Option<PathBuf> {
        self.get_with(remote, self.always_fresh)
    }

    /// Local copy of `remote`; `fresh` forces a new pull for cached files.
    ///
    /// A failed pull is logged and answered with `None`.
    pub fn get_with(&mut self, remote: &str, fresh: bool) -> Option<PathBuf> {
        if let Some(local) = self.resolved.get(remote) {
            return Some(local.clone());
        }

        let local = match self.find_override(remote) {
            Some(local) => local,
            None => {
                let target = self.cache_dir.join(cache_file_name(remote));
                if fresh || !target.is_file() {
                    if let Err(e) = self.fetcher.fetch(remote, &target) {
                        warn!("failed to download {remote}: {e}");
                        return None;
                    }
                }
                target
            }
        };

        self.resolved.insert(remote.to_string(), local.clone());
        Some(local)
    }

    fn find_override(&self, remote: &str) -> Option<PathBuf> {
        let wanted = remote.rsplit('/').next().unwrap_or(remote);
        for candidate in &self.overrides {
            if candidate.file_name().and_then(|n| n.to_str()) != Some(wanted) {
                continue;
            }
            if !candidate.is_file() {
                warn!("local file {} doesn't exist, ignoring", candidate.display());
                continue;
            }
            return Some(candidate.clone());
        }
        None
    }
}

/// Flatten a remote path into a single cache file name.
#[must_use]
pub fn cache_file_name(remote: &str) -> String {
    remote.replace('/', "__")
}

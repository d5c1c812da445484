//! Collaborators backed by a cross binutils installation.
//!
//! `addr2line` and `c++filt` both answer one line per input line, so each is
//! kept running for the whole run and fed queries over its stdin instead of
//! being spawned per address. Segment and symbol tables still come from
//! [`super::native`]; parsing `readelf` text buys nothing over reading the
//! headers directly.

use log::{debug, warn};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::domain::{ResolverError, Vma};
use crate::symbolization::native::{read_segment_table, ElfSymbolTable};
use crate::symbolization::toolchain::{
    Collaborator, Demangler, LineResolver, SegmentTable, SymbolResolver, Toolchain,
};

/// Address used to check that addr2line accepts a file before going live.
const PROBE_ADDRESS: &str = "123";

struct Running {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// A long-lived line-oriented request/response process.
pub struct ToolWorker {
    program: String,
    running: Option<Running>,
}

impl ToolWorker {
    /// Start `program` with piped stdin/stdout.
    ///
    /// # Errors
    /// Returns an error if the process cannot be spawned
    pub fn spawn<I, S>(program: &str, args: I) -> Result<Self, ResolverError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let spawn_error = |source| ResolverError::Spawn { program: program.to_string(), source };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(spawn_error)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(spawn_error(std::io::Error::other("missing stdio pipes")));
        };

        debug!("Started {program} (pid {})", child.id());
        Ok(Self {
            program: program.to_string(),
            running: Some(Running { child, stdin, stdout: BufReader::new(stdout) }),
        })
    }

    /// Send one request line and read one response line.
    ///
    /// A broken pipe or EOF shuts the worker down; later queries return `None`.
    pub fn query(&mut self, request: &str) -> Option<String> {
        let running = self.running.as_mut()?;

        let mut response = String::new();
        let result = writeln!(running.stdin, "{request}")
            .and_then(|()| running.stdin.flush())
            .and_then(|()| running.stdout.read_line(&mut response));

        match result {
            Ok(n) if n > 0 => Some(response.trim().to_string()),
            Ok(_) => {
                warn!("{} exited unexpectedly", self.program);
                self.close();
                None
            }
            Err(e) => {
                warn!("lost connection to {}: {e}", self.program);
                self.close();
                None
            }
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Collaborator for ToolWorker {
    fn close(&mut self) {
        if let Some(Running { mut child, stdin, stdout }) = self.running.take() {
            // Closing stdin lets the tool exit on its own.
            drop(stdin);
            drop(stdout);
            if let Err(e) = child.wait() {
                warn!("failed to reap {}: {e}", self.program);
            }
        }
    }
}

impl Drop for ToolWorker {
    fn drop(&mut self) {
        self.close();
    }
}

/// Normalise one addr2line answer: `??:0` / `??:?` mean "not found".
#[must_use]
pub fn normalize_location(response: &str) -> Option<String> {
    let response = response.trim();
    let response = match response.find(" (discriminator") {
        Some(idx) => &response[..idx],
        None => response,
    };
    if response.is_empty() || response.starts_with("??:") {
        None
    } else {
        Some(response.to_string())
    }
}

/// `addr2line -C -e <file>` kept alive for one module.
pub struct Addr2LineResolver {
    worker: ToolWorker,
}

impl Addr2LineResolver {
    /// Check that addr2line accepts `path`, then start the worker
    ///
    /// # Errors
    /// Returns an error if addr2line cannot run or rejects the file
    pub fn new(program: &str, path: &Path) -> Result<Self, ResolverError> {
        let probe = Command::new(program)
            .arg("-C")
            .arg("-e")
            .arg(path)
            .arg(PROBE_ADDRESS)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ResolverError::Spawn { program: program.to_string(), source })?;
        if !probe.status.success() {
            return Err(ResolverError::ToolRejected {
                program: program.to_string(),
                path: path.to_path_buf(),
            });
        }

        let args = [PathBuf::from("-C"), PathBuf::from("-e"), path.to_path_buf()];
        Ok(Self { worker: ToolWorker::spawn(program, &args)? })
    }
}

impl Collaborator for Addr2LineResolver {
    fn close(&mut self) {
        self.worker.close();
    }
}

impl LineResolver for Addr2LineResolver {
    fn resolve(&mut self, vma: Vma) -> Option<String> {
        self.worker.query(&vma.to_string()).as_deref().and_then(normalize_location)
    }
}

/// `c++filt` kept alive for the whole report; passes names through if it
/// cannot be started or dies.
pub struct CxxFiltDemangler {
    worker: Option<ToolWorker>,
}

impl CxxFiltDemangler {
    #[must_use]
    pub fn new(program: &str) -> Self {
        let worker = match ToolWorker::spawn(program, std::iter::empty::<&str>()) {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!("symbol names will not be demangled: {e}");
                None
            }
        };
        Self { worker }
    }
}

impl Collaborator for CxxFiltDemangler {
    fn close(&mut self) {
        if let Some(worker) = self.worker.as_mut() {
            worker.close();
        }
    }
}

impl Demangler for CxxFiltDemangler {
    fn demangle(&mut self, symbol: &str) -> String {
        self.worker
            .as_mut()
            .and_then(|worker| worker.query(symbol))
            .unwrap_or_else(|| symbol.to_string())
    }
}

/// Cross binutils named `<prefix>addr2line` / `<prefix>c++filt`.
#[derive(Debug, Clone, Default)]
pub struct BinutilsToolchain {
    prefix: String,
}

impl BinutilsToolchain {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn tool(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }
}

impl Toolchain for BinutilsToolchain {
    fn segments(&self, local: &Path) -> Result<SegmentTable, ResolverError> {
        read_segment_table(local)
    }

    fn symbol_resolver(&self, local: &Path) -> Result<Box<dyn SymbolResolver>, ResolverError> {
        Ok(Box::new(ElfSymbolTable::from_path(local)?))
    }

    fn line_resolver(&self, local: &Path) -> Result<Box<dyn LineResolver>, ResolverError> {
        Ok(Box::new(Addr2LineResolver::new(&self.tool("addr2line"), local)?))
    }

    fn demangler(&self) -> Box<dyn Demangler> {
        Box::new(CxxFiltDemangler::new(&self.tool("c++filt")))
    }
}

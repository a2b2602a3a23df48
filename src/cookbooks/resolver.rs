//! Delegated dependency resolvers (Berkshelf, Librarian-Chef).
//!
//! Wraps the `berks` and `librarian-chef` CLIs. Neither tool is safe to run
//! concurrently against shared resolver state, so every invocation happens
//! under the matching lock in [`ResolverLocks`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::{Error, Result};

/// Installs a resolved cookbook set from a manifest into a target directory.
pub trait DependencyResolver: Send + Sync {
    /// Short resolver name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Resolves `manifest` and installs every cookbook into `target`.
    fn resolve(&self, manifest: &Path, target: &Path) -> Result<()>;
}

/// Process-wide mutual exclusion for the delegated resolvers.
///
/// Holding the lock for the whole resolver call is required for correctness:
/// the resolvers mutate shared on-disk state (shelf, tmp and lockfiles).
#[derive(Debug, Default)]
pub struct ResolverLocks {
    berkshelf: Mutex<()>,
    librarian: Mutex<()>,
}

static GLOBAL_LOCKS: OnceLock<Arc<ResolverLocks>> = OnceLock::new();

impl ResolverLocks {
    /// Creates a private set of locks (useful for tests).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the locks shared by every builder in this process.
    pub fn global() -> Arc<ResolverLocks> {
        Arc::clone(GLOBAL_LOCKS.get_or_init(|| Arc::new(ResolverLocks::new())))
    }

    /// Acquires the Berkshelf lock.
    pub fn berkshelf(&self) -> MutexGuard<'_, ()> {
        self.berkshelf.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the Librarian lock.
    pub fn librarian(&self) -> MutexGuard<'_, ()> {
        self.librarian.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolvers and locks used by the cookbook strategies.
#[derive(Clone)]
pub struct ResolverContext {
    pub(crate) locks: Arc<ResolverLocks>,
    pub(crate) berkshelf: Arc<dyn DependencyResolver>,
    pub(crate) librarian: Arc<dyn DependencyResolver>,
}

impl Default for ResolverContext {
    fn default() -> Self {
        Self {
            locks: ResolverLocks::global(),
            berkshelf: Arc::new(BerkshelfCli::default()),
            librarian: Arc::new(LibrarianCli::default()),
        }
    }
}

impl ResolverContext {
    /// Uses `locks` instead of the process-wide locks.
    pub fn with_locks(mut self, locks: Arc<ResolverLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Replaces the Berkshelf resolver.
    pub fn with_berkshelf(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.berkshelf = resolver;
        self
    }

    /// Replaces the Librarian resolver.
    pub fn with_librarian(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.librarian = resolver;
        self
    }
}

/// Berkshelf via `berks vendor`.
#[derive(Debug, Clone)]
pub struct BerkshelfCli {
    program: PathBuf,
}

impl Default for BerkshelfCli {
    fn default() -> Self {
        Self::new("berks")
    }
}

impl BerkshelfCli {
    /// Creates a resolver that runs `program` instead of `berks` on `PATH`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DependencyResolver for BerkshelfCli {
    fn name(&self) -> &'static str {
        "berkshelf"
    }

    fn resolve(&self, manifest: &Path, target: &Path) -> Result<()> {
        // berks runs from the manifest's directory, so relative paths would shift.
        let manifest = std::path::absolute(manifest)?;
        let target = std::path::absolute(target)?;
        let (manifest, target) = (manifest.as_path(), target.as_path());

        // `berks vendor` refuses to write into an existing directory.
        if target.is_dir() && std::fs::read_dir(target)?.next().is_none() {
            std::fs::remove_dir(target)?;
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg("vendor")
            .arg(target)
            .arg("--berksfile")
            .arg(manifest);
        if let Some(dir) = manifest.parent() {
            cmd.current_dir(dir);
        }

        run(self.name(), BERKSHELF_REMEDIATION, &mut cmd)?;
        tracing::info!(berksfile = ?manifest, target = ?target, "berkshelf vendored cookbooks");
        Ok(())
    }
}

/// Librarian-Chef via `librarian-chef resolve` then `librarian-chef install`.
#[derive(Debug, Clone)]
pub struct LibrarianCli {
    program: PathBuf,
}

impl Default for LibrarianCli {
    fn default() -> Self {
        Self::new("librarian-chef")
    }
}

impl LibrarianCli {
    /// Creates a resolver that runs `program` instead of `librarian-chef` on `PATH`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DependencyResolver for LibrarianCli {
    fn name(&self) -> &'static str {
        "librarian-chef"
    }

    fn resolve(&self, manifest: &Path, target: &Path) -> Result<()> {
        let manifest = std::path::absolute(manifest)?;
        let target = std::path::absolute(target)?;
        let (manifest, target) = (manifest.as_path(), target.as_path());
        let project = manifest.parent().unwrap_or_else(|| Path::new("/"));

        let mut resolve = Command::new(&self.program);
        resolve.arg("resolve").current_dir(project);
        run(self.name(), LIBRARIAN_REMEDIATION, &mut resolve)?;
        tracing::debug!(cheffile = ?manifest, "librarian resolved dependency graph");

        let mut install = Command::new(&self.program);
        install
            .arg("install")
            .arg("--path")
            .arg(target)
            .current_dir(project);
        run(self.name(), LIBRARIAN_REMEDIATION, &mut install)?;

        tracing::info!(cheffile = ?manifest, target = ?target, "librarian installed cookbooks");
        Ok(())
    }
}

const BERKSHELF_REMEDIATION: &str =
    "install Berkshelf (`gem install berkshelf` or ChefDK/Chef Workstation) and make sure `berks` is on PATH";

const LIBRARIAN_REMEDIATION: &str =
    "install Librarian-Chef (`gem install librarian-chef`) and make sure `librarian-chef` is on PATH";

fn run(resolver: &'static str, remediation: &str, cmd: &mut Command) -> Result<Output> {
    let output = cmd.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            Error::CapabilityUnavailable {
                resolver,
                remediation: remediation.to_string(),
            }
        } else {
            Error::Io(e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(Error::Resolution { resolver, message });
    }

    Ok(output)
}

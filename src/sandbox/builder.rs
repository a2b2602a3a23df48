//! Sandbox assembly and teardown.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::cookbooks::{filter_cookbook, CookbookStrategy, ResolverContext};
use crate::error::{Error, Result};

use super::dna::RunMetadata;
use super::layout::{OptionalSource, SandboxSources, CACHE_DIR, COOKBOOKS_DIR, DNA_FILE};
use super::materialize::materialize_source;

/// Removes a sandbox directory tree.
///
/// A path that does not exist is not an error, so this is safe to call
/// repeatedly and from failure paths.
pub fn destroy(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::info!(path = ?path, "destroyed sandbox");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::SandboxCleanup {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Shared flag used to abort an in-progress build.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The build stops at its next step boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A fully assembled sandbox.
///
/// The directory is removed when the handle is dropped unless it was
/// destroyed explicitly or released with [`Sandbox::keep`].
#[derive(Debug)]
pub struct Sandbox {
    path: PathBuf,
    strategy: CookbookStrategy,
    cleaned_up: bool,
}

impl Sandbox {
    /// Returns the sandbox root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the directory holding resolved cookbooks.
    pub fn cookbooks_path(&self) -> PathBuf {
        self.path.join(COOKBOOKS_DIR)
    }

    /// Returns the strategy that populated the cookbooks.
    pub fn strategy(&self) -> CookbookStrategy {
        self.strategy
    }

    /// Removes the sandbox. Calling it again is a no-op.
    pub fn destroy(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        destroy(&self.path)?;
        self.cleaned_up = true;
        Ok(())
    }

    /// Releases the directory from this handle; the caller becomes responsible
    /// for calling [`destroy`] on the returned path.
    pub fn keep(mut self) -> PathBuf {
        self.cleaned_up = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if !self.cleaned_up {
            if let Err(e) = self.destroy() {
                tracing::error!(error = %e, path = ?self.path, "failed to cleanup sandbox on drop");
            }
        }
    }
}

/// Assembles sandboxes for one instance.
#[derive(Clone)]
pub struct SandboxBuilder {
    instance: String,
    project_root: PathBuf,
    base_dir: Option<PathBuf>,
    sources: SandboxSources,
    metadata: RunMetadata,
    resolvers: ResolverContext,
    cancel: CancelFlag,
}

impl SandboxBuilder {
    /// Creates a builder for `instance` whose cookbooks come from `project_root`.
    ///
    /// Sandboxes go under the system temp directory unless
    /// [`with_base_dir`](Self::with_base_dir) is set.
    pub fn new(instance: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            instance: instance.into(),
            project_root: project_root.into(),
            base_dir: None,
            sources: SandboxSources::default(),
            metadata: RunMetadata::default(),
            resolvers: ResolverContext::default(),
            cancel: CancelFlag::default(),
        }
    }

    /// Creates a builder from a loaded configuration.
    pub fn from_config(config: &SandboxConfig) -> Self {
        let mut builder = Self::new(config.instance.clone(), config.kitchen_root.clone())
            .with_sources(config.sources())
            .with_metadata(config.run_metadata());
        builder.base_dir = config
            .sandbox_base_dir
            .as_ref()
            .map(|dir| config.resolve_path(dir));
        builder
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_sources(mut self, sources: SandboxSources) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_metadata(mut self, metadata: RunMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_resolvers(mut self, resolvers: ResolverContext) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Builds a new sandbox.
    ///
    /// Any failure removes the partially built directory before the error is
    /// returned.
    pub fn create(&self) -> Result<Sandbox> {
        let path = self.allocate()?;
        tracing::info!(instance = %self.instance, path = ?path, "created sandbox directory");

        let mut sandbox = Sandbox {
            path,
            strategy: CookbookStrategy::SingleCookbook,
            cleaned_up: false,
        };

        match self.populate(sandbox.path()) {
            Ok(strategy) => {
                sandbox.strategy = strategy;
                tracing::info!(
                    instance = %self.instance,
                    path = ?sandbox.path(),
                    strategy = %strategy,
                    "sandbox ready"
                );
                Ok(sandbox)
            }
            Err(e) => {
                tracing::warn!(instance = %self.instance, error = %e, "sandbox build failed, cleaning up");
                if let Err(cleanup) = sandbox.destroy() {
                    tracing::error!(error = %cleanup, "failed to remove partial sandbox");
                }
                Err(e)
            }
        }
    }

    fn allocate(&self) -> Result<PathBuf> {
        let base = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join("kitchen-sandboxes"),
        };
        fs::create_dir_all(&base)?;

        let path = base.join(format!(
            "{}-sandbox-{}",
            sanitize_instance_name(&self.instance),
            Uuid::new_v4()
        ));
        fs::create_dir(&path).map_err(|e| {
            Error::SandboxCreation(format!("cannot create {}: {}", path.display(), e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o700))?;
        }

        Ok(path)
    }

    fn populate(&self, root: &Path) -> Result<CookbookStrategy> {
        self.checkpoint()?;
        self.metadata.write(&root.join(DNA_FILE))?;

        for source in OptionalSource::ALL {
            self.checkpoint()?;
            let dest = root.join(source.dest_name());
            if materialize_source(source, self.sources.origin(source), &dest)? {
                tracing::debug!(source = source.dest_name(), "materialized source");
            }
        }
        fs::create_dir_all(root.join(CACHE_DIR))?;

        self.checkpoint()?;
        let strategy = CookbookStrategy::select(&self.project_root)?;
        let cookbooks = root.join(COOKBOOKS_DIR);
        strategy.resolve(&self.project_root, &cookbooks, &self.resolvers)?;
        fs::create_dir_all(&cookbooks)?;

        self.checkpoint()?;
        for entry in fs::read_dir(&cookbooks)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                filter_cookbook(&entry.path())?;
            }
        }

        Ok(strategy)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

fn sanitize_instance_name(instance: &str) -> String {
    let name: String = instance
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if name.is_empty() {
        "instance".to_string()
    } else {
        name
    }
}

//! Cookbook resolution into the sandbox.
//!
//! The project root is inspected once for marker files and exactly one
//! [`CookbookStrategy`] is chosen. Precedence, highest first:
//!
//! 1. `Berksfile` → [`CookbookStrategy::Berkshelf`]
//! 2. `Cheffile` → [`CookbookStrategy::Librarian`]
//! 3. `cookbooks/` directory → [`CookbookStrategy::Vendored`]
//! 4. `metadata.rb` / `metadata.json` → [`CookbookStrategy::SingleCookbook`]

mod ignore;
mod metadata;
mod resolver;

pub use ignore::{filter_cookbook, IgnoreFilter, CHEFIGNORE};
pub use metadata::{cookbook_name, metadata_file, METADATA_JSON, METADATA_RB};
pub use resolver::{
    BerkshelfCli, DependencyResolver, LibrarianCli, ResolverContext, ResolverLocks,
};

use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::sandbox::copy_tree;

/// Berkshelf manifest.
pub const BERKSFILE: &str = "Berksfile";

/// Librarian-Chef manifest.
pub const CHEFFILE: &str = "Cheffile";

/// Vendored cookbooks directory.
pub const COOKBOOKS_DIR: &str = "cookbooks";

/// Site-local cookbooks, flattened alongside `cookbooks/`.
pub const SITE_COOKBOOKS_DIR: &str = "site-cookbooks";

/// Project-local directories never copied when the project is wrapped as a cookbook.
const SKIPPED_PROJECT_DIRS: &[&str] = &[".git", ".kitchen"];

/// How the sandbox `cookbooks/` directory gets populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookbookStrategy {
    /// Resolve with Berkshelf from a `Berksfile`.
    Berkshelf,
    /// Resolve with Librarian-Chef from a `Cheffile`.
    Librarian,
    /// Copy a vendored `cookbooks/` (and `site-cookbooks/`) directory.
    Vendored,
    /// Treat the project itself as a single cookbook.
    SingleCookbook,
}

impl CookbookStrategy {
    /// Picks the strategy for `project_root`.
    pub fn select(project_root: &Path) -> Result<Self> {
        let berksfile = project_root.join(BERKSFILE).is_file();
        let cheffile = project_root.join(CHEFFILE).is_file();
        let cookbooks = project_root.join(COOKBOOKS_DIR).is_dir();
        let has_metadata = metadata_file(project_root).is_some();

        let strategy = if berksfile {
            CookbookStrategy::Berkshelf
        } else if cheffile {
            CookbookStrategy::Librarian
        } else if cookbooks {
            CookbookStrategy::Vendored
        } else if has_metadata {
            CookbookStrategy::SingleCookbook
        } else {
            return Err(Error::Config(format!(
                "no cookbooks found in {}: expected a {}, a {}, a {}/ directory, or a {} / {}",
                project_root.display(),
                BERKSFILE,
                CHEFFILE,
                COOKBOOKS_DIR,
                METADATA_RB,
                METADATA_JSON
            )));
        };

        let markers = [berksfile, cheffile, cookbooks, has_metadata];
        if markers.iter().filter(|present| **present).count() > 1 {
            tracing::debug!(
                strategy = %strategy,
                berksfile,
                cheffile,
                cookbooks,
                metadata = has_metadata,
                "multiple cookbook markers present, using highest precedence"
            );
        }

        Ok(strategy)
    }

    /// Returns a short, stable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CookbookStrategy::Berkshelf => "berkshelf",
            CookbookStrategy::Librarian => "librarian",
            CookbookStrategy::Vendored => "vendored",
            CookbookStrategy::SingleCookbook => "single-cookbook",
        }
    }

    /// Populates `dest` with the project's cookbooks.
    ///
    /// On error `dest` may be partially written; callers must discard it.
    pub fn resolve(&self, project_root: &Path, dest: &Path, ctx: &ResolverContext) -> Result<()> {
        tracing::info!(strategy = %self, project = ?project_root, "resolving cookbooks");

        match self {
            CookbookStrategy::Berkshelf => {
                let _guard = ctx.locks.berkshelf();
                ctx.berkshelf.resolve(&project_root.join(BERKSFILE), dest)
            }
            CookbookStrategy::Librarian => {
                let _guard = ctx.locks.librarian();
                ctx.librarian.resolve(&project_root.join(CHEFFILE), dest)
            }
            CookbookStrategy::Vendored => copy_vendored(project_root, dest),
            CookbookStrategy::SingleCookbook => wrap_single_cookbook(project_root, dest),
        }
    }
}

impl fmt::Display for CookbookStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn copy_vendored(project_root: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;

    for dir in [COOKBOOKS_DIR, SITE_COOKBOOKS_DIR] {
        let src = project_root.join(dir);
        if !src.is_dir() {
            continue;
        }
        let copied = copy_tree(&src, dest, |_| true)?;
        tracing::debug!(src = ?src, files = copied, "copied vendored cookbooks");
    }

    if metadata_file(project_root).is_some() {
        wrap_single_cookbook(project_root, dest)?;
    }

    Ok(())
}

fn wrap_single_cookbook(project_root: &Path, dest: &Path) -> Result<()> {
    let name = cookbook_name(project_root)?;
    let target = dest.join(&name);
    fs::create_dir_all(&target)?;

    // The sandbox may live inside the project; never copy it into itself.
    let target_canonical = fs::canonicalize(&target)?;
    let copied = copy_tree(project_root, &target, |entry| {
        if entry.depth() == 1 {
            let name = entry.file_name().to_string_lossy();
            if SKIPPED_PROJECT_DIRS.iter().any(|dir| name == *dir) {
                return false;
            }
        }
        match fs::canonicalize(entry.path()) {
            Ok(path) => !target_canonical.starts_with(&path),
            Err(_) => true,
        }
    })?;

    tracing::info!(cookbook = %name, files = copied, "wrapped project as cookbook");
    Ok(())
}

//! `chefignore` filtering for resolved cookbooks.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::Result;

/// Name of the per-cookbook ignore file.
pub const CHEFIGNORE: &str = "chefignore";

/// Compiled patterns from a `chefignore` file.
///
/// Patterns use fnmatch-style globs where `*` may cross directory
/// separators. A pattern also matches every file below a directory it
/// matches. Lines starting with `#` are comments and `!pattern` re-includes
/// files that an earlier pattern ignored.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    ignore: GlobSet,
    ignore_dirs: GlobSet,
    keep: GlobSet,
}

impl IgnoreFilter {
    /// Parses `chefignore` contents. Invalid patterns are logged and skipped.
    pub fn parse(contents: &str) -> Self {
        let mut ignore = GlobSetBuilder::new();
        let mut ignore_dirs = GlobSetBuilder::new();
        let mut keep = GlobSetBuilder::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (negated, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let pattern = pattern.trim_start_matches("./");
            let (dir_only, pattern) = match pattern.strip_suffix('/') {
                Some(rest) => (true, rest),
                None => (false, pattern),
            };
            if pattern.is_empty() {
                continue;
            }

            let glob = match GlobBuilder::new(pattern).literal_separator(false).build() {
                Ok(glob) => glob,
                Err(e) => {
                    tracing::warn!(pattern = %line, error = %e, "skipping invalid chefignore pattern");
                    continue;
                }
            };

            match (negated, dir_only) {
                (true, _) => keep.add(glob),
                (false, true) => ignore_dirs.add(glob),
                (false, false) => ignore.add(glob),
            };
        }

        Self {
            ignore: build_set(ignore),
            ignore_dirs: build_set(ignore_dirs),
            keep: build_set(keep),
        }
    }

    /// Loads `chefignore` from `cookbook_dir`, returning `None` if there is none.
    pub fn load(cookbook_dir: &Path) -> Result<Option<Self>> {
        let path = cookbook_dir.join(CHEFIGNORE);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(Self::parse(&contents)))
    }

    /// Returns true if the file at `rel` (relative to the cookbook root) is ignored.
    pub fn is_ignored(&self, rel: &Path) -> bool {
        let ancestors: Vec<&Path> = rel
            .ancestors()
            .skip(1)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();

        let ignored = self.ignore.is_match(rel)
            || ancestors
                .iter()
                .any(|dir| self.ignore.is_match(dir) || self.ignore_dirs.is_match(dir));
        if !ignored {
            return false;
        }

        let kept =
            self.keep.is_match(rel) || ancestors.iter().any(|dir| self.keep.is_match(dir));
        !kept
    }

    /// Lists files under `cookbook_dir` that this filter ignores.
    pub fn ignored_files(&self, cookbook_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut ignored = Vec::new();

        for entry in WalkDir::new(cookbook_dir).min_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(cookbook_dir) else {
                continue;
            };
            if self.is_ignored(rel) {
                ignored.push(entry.path().to_path_buf());
            }
        }

        Ok(ignored)
    }
}

/// Removes the files a cookbook's `chefignore` excludes. Returns how many were removed.
///
/// Directories are left in place even when emptied.
pub fn filter_cookbook(cookbook_dir: &Path) -> Result<usize> {
    let Some(filter) = IgnoreFilter::load(cookbook_dir)? else {
        return Ok(0);
    };

    let ignored = filter.ignored_files(cookbook_dir)?;
    for path in &ignored {
        std::fs::remove_file(path)?;
    }

    if !ignored.is_empty() {
        tracing::debug!(cookbook = ?cookbook_dir, removed = ignored.len(), "applied chefignore");
    }
    Ok(ignored.len())
}

fn build_set(builder: GlobSetBuilder) -> GlobSet {
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to compile chefignore patterns, ignoring none");
        GlobSet::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn removes_exactly_the_matching_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, CHEFIGNORE, "*.tmp\nsecrets/**\n");
        write(root, "a.tmp", "");
        write(root, "secrets/key.pem", "");
        write(root, "README.md", "");

        let removed = filter_cookbook(root).unwrap();

        assert_eq!(removed, 2);
        assert!(!root.join("a.tmp").exists());
        assert!(!root.join("secrets/key.pem").exists());
        assert!(root.join("README.md").exists());
        // Emptied directories stay.
        assert!(root.join("secrets").is_dir());
    }

    #[test]
    fn no_chefignore_is_a_noop() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.tmp", "");

        assert_eq!(filter_cookbook(temp_dir.path()).unwrap(), 0);
        assert!(temp_dir.path().join("a.tmp").exists());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let filter = IgnoreFilter::parse("# editor files\n\n   \n*~\n");

        assert!(filter.is_ignored(Path::new("recipes/default.rb~")));
        assert!(!filter.is_ignored(Path::new("# editor files")));
    }

    #[test]
    fn star_crosses_directory_separators() {
        let filter = IgnoreFilter::parse("*.swp\n");

        assert!(filter.is_ignored(Path::new(".default.rb.swp")));
        assert!(filter.is_ignored(Path::new("recipes/.default.rb.swp")));
        assert!(!filter.is_ignored(Path::new("recipes/default.rb")));
    }

    #[test]
    fn exact_path_matches_only_that_file() {
        let filter = IgnoreFilter::parse("Vagrantfile\n");

        assert!(filter.is_ignored(Path::new("Vagrantfile")));
        assert!(!filter.is_ignored(Path::new("Vagrantfile.bak")));
    }

    #[test]
    fn directory_patterns_match_everything_below() {
        let filter = IgnoreFilter::parse("test\nspec/\n.git\n");

        assert!(filter.is_ignored(Path::new("test/integration/default/serverspec.rb")));
        assert!(filter.is_ignored(Path::new("spec/spec_helper.rb")));
        assert!(filter.is_ignored(Path::new(".git/HEAD")));
        assert!(!filter.is_ignored(Path::new("recipes/test.rb")));
        // Trailing slash only applies to directories.
        assert!(!filter.is_ignored(Path::new("spec")));
    }

    #[test]
    fn negation_reincludes_files() {
        let filter = IgnoreFilter::parse("*.md\n!README.md\n");

        assert!(filter.is_ignored(Path::new("CHANGELOG.md")));
        assert!(!filter.is_ignored(Path::new("README.md")));
    }

    #[test]
    fn hidden_files_are_considered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, CHEFIGNORE, ".*\n");
        write(root, ".kitchen.yml", "");
        write(root, "metadata.rb", "");

        filter_cookbook(root).unwrap();

        assert!(!root.join(".kitchen.yml").exists());
        assert!(root.join("metadata.rb").exists());
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let filter = IgnoreFilter::parse("[unclosed\n*.log\n");

        assert!(filter.is_ignored(Path::new("debug.log")));
        assert!(!filter.is_ignored(Path::new("README.md")));
    }
}

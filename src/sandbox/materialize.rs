//! Copies optional sources and directory trees into the sandbox.

use std::fs;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use super::layout::OptionalSource;
use crate::error::{Error, Result};

/// Copies `origin` to `dest` when it exists.
///
/// Directories are copied recursively into `dest` (created with parents).
/// A file origin is copied to `dest` as a single file. Returns `false`
/// without touching `dest` when `origin` is `None` or missing on disk.
pub fn materialize(origin: Option<&Path>, dest: &Path) -> Result<bool> {
    let Some(origin) = origin.filter(|p| p.exists()) else {
        tracing::debug!(dest = ?dest, "source not configured, skipping");
        return Ok(false);
    };

    if origin.is_dir() {
        fs::create_dir_all(dest)?;
        let copied = copy_tree(origin, dest, |_| true)?;
        tracing::debug!(origin = ?origin, dest = ?dest, files = copied, "copied source directory");
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(origin, dest)?;
        tracing::debug!(origin = ?origin, dest = ?dest, "copied source file");
    }

    Ok(true)
}

/// Copies the origin of `source` to `dest`, checking it has the expected kind.
///
/// The secret must be a file and every other source a directory; a mismatch
/// is a configuration error and nothing is copied.
pub fn materialize_source(
    source: OptionalSource,
    origin: Option<&Path>,
    dest: &Path,
) -> Result<bool> {
    if let Some(origin) = origin.filter(|p| p.exists()) {
        let expected = if source.is_file() { "a file" } else { "a directory" };
        if origin.is_dir() == source.is_file() {
            return Err(Error::Config(format!(
                "{} source '{}' must be {}",
                source.dest_name(),
                origin.display(),
                expected
            )));
        }
    }

    materialize(origin, dest)
}

/// Recursively copies the contents of `src` into `dest`.
///
/// Entries for which `include` returns `false` are skipped along with their
/// descendants. Symlinks are followed. Returns the number of files copied.
pub(crate) fn copy_tree<F>(src: &Path, dest: &Path, include: F) -> Result<usize>
where
    F: FnMut(&DirEntry) -> bool,
{
    let mut copied = 0;

    for entry in WalkDir::new(src)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(include)
    {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

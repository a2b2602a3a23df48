//! Cookbook metadata parsing.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Ruby DSL metadata file.
pub const METADATA_RB: &str = "metadata.rb";

/// Compiled JSON metadata file.
pub const METADATA_JSON: &str = "metadata.json";

static NAME_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*name\s*\(?\s*['"]([^'"]+)['"]"#).expect("valid metadata name regex")
});

/// Returns the metadata file at the project root, preferring `metadata.rb`.
pub fn metadata_file(project_root: &Path) -> Option<PathBuf> {
    [METADATA_RB, METADATA_JSON]
        .iter()
        .map(|name| project_root.join(name))
        .find(|path| path.is_file())
}

/// Reads the declared cookbook name from the project's metadata.
pub fn cookbook_name(project_root: &Path) -> Result<String> {
    let path = metadata_file(project_root).ok_or_else(|| {
        Error::Config(format!(
            "no {} or {} found in {}",
            METADATA_RB,
            METADATA_JSON,
            project_root.display()
        ))
    })?;

    let content = std::fs::read_to_string(&path)?;
    let name = if path.ends_with(METADATA_JSON) {
        name_from_json(&content)
            .map_err(|e| Error::Config(format!("malformed {}: {}", path.display(), e)))?
    } else {
        name_from_ruby(&content)
    };

    let name = match name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => {
            return Err(Error::Config(format!(
                "{} does not declare a cookbook name",
                path.display()
            )))
        }
    };

    // The name becomes a directory under the sandbox; it must stay there.
    if !is_single_component(&name) {
        return Err(Error::Config(format!(
            "{} declares invalid cookbook name '{}': must be a single path component",
            path.display(),
            name
        )));
    }

    Ok(name)
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn name_from_ruby(content: &str) -> Option<String> {
    NAME_STATEMENT
        .captures(content)
        .map(|caps| caps[1].to_string())
}

fn name_from_json(content: &str) -> std::result::Result<Option<String>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    Ok(value
        .get("name")
        .and_then(|name| name.as_str())
        .map(str::to_string))
}

//! Instance configuration and validation.
//!
//! Configuration is loaded from YAML or TOML and validated before a sandbox
//! is built to catch errors early.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::install::{install_command, OmnibusRequirement, DEFAULT_OMNIBUS_URL};
use crate::sandbox::{OptionalSource, RunMetadata, SandboxSources};

/// Configuration for building one instance's sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Instance name; used to name the sandbox directory.
    pub instance: String,

    /// Project root holding the cookbook markers.
    #[serde(default = "default_kitchen_root")]
    pub kitchen_root: PathBuf,

    /// Base directory searched for default source locations.
    #[serde(default = "default_test_base_path")]
    pub test_base_path: PathBuf,

    /// Suite name; narrows the default source search.
    #[serde(default)]
    pub suite: Option<String>,

    #[serde(default)]
    pub data_bags_path: Option<PathBuf>,

    #[serde(default)]
    pub roles_path: Option<PathBuf>,

    #[serde(default)]
    pub nodes_path: Option<PathBuf>,

    #[serde(default)]
    pub environments_path: Option<PathBuf>,

    #[serde(default)]
    pub data_path: Option<PathBuf>,

    #[serde(default)]
    pub encrypted_data_bag_secret_key_path: Option<PathBuf>,

    /// Node name written into the run metadata.
    #[serde(default)]
    pub node_name: Option<String>,

    /// Run list for the convergence.
    #[serde(default)]
    pub run_list: Vec<String>,

    /// Attribute overrides merged into the run metadata.
    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// Where sandboxes are created. Defaults to the system temp directory.
    #[serde(default)]
    pub sandbox_base_dir: Option<PathBuf>,

    /// Whether (and which) Chef runtime to install on the target.
    #[serde(default)]
    pub require_chef_omnibus: Option<OmnibusRequirement>,

    #[serde(default = "default_omnibus_url")]
    pub chef_omnibus_url: String,

    /// Run the installer through sudo.
    #[serde(default = "default_sudo")]
    pub sudo: bool,
}

fn default_kitchen_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_test_base_path() -> PathBuf {
    PathBuf::from("test/integration")
}

fn default_omnibus_url() -> String {
    DEFAULT_OMNIBUS_URL.to_string()
}

fn default_sudo() -> bool {
    true
}

impl SandboxConfig {
    /// Creates a configuration with defaults for `instance` rooted at `kitchen_root`.
    pub fn new(instance: impl Into<String>, kitchen_root: impl Into<PathBuf>) -> Self {
        Self {
            instance: instance.into(),
            kitchen_root: kitchen_root.into(),
            test_base_path: default_test_base_path(),
            suite: None,
            data_bags_path: None,
            roles_path: None,
            nodes_path: None,
            environments_path: None,
            data_path: None,
            encrypted_data_bag_secret_key_path: None,
            node_name: None,
            run_list: Vec::new(),
            attributes: Map::new(),
            sandbox_base_dir: None,
            require_chef_omnibus: None,
            chef_omnibus_url: default_omnibus_url(),
            sudo: default_sudo(),
        }
    }

    /// Loads configuration from a `.yml`/`.yaml` or `.toml` file.
    ///
    /// A relative `kitchen_root` is resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;

        let mut config: SandboxConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?,
            Some("yml") | Some("yaml") => serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?,
            _ => {
                return Err(Error::Config(format!(
                    "unsupported config format for {} (expected .yml, .yaml or .toml)",
                    path.display()
                )))
            }
        };

        if config.kitchen_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.kitchen_root = std::path::absolute(base.join(&config.kitchen_root))?;
        }

        Ok(config)
    }

    /// Resolves `path` against the kitchen root unless it is absolute.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.kitchen_root.join(path)
        }
    }

    /// Returns the explicitly configured origin for `source`.
    pub fn configured_path(&self, source: OptionalSource) -> Option<&PathBuf> {
        match source {
            OptionalSource::DataBags => self.data_bags_path.as_ref(),
            OptionalSource::Roles => self.roles_path.as_ref(),
            OptionalSource::Nodes => self.nodes_path.as_ref(),
            OptionalSource::Environments => self.environments_path.as_ref(),
            OptionalSource::Data => self.data_path.as_ref(),
            OptionalSource::Secret => self.encrypted_data_bag_secret_key_path.as_ref(),
        }
    }

    /// Returns the origin for `source`.
    ///
    /// An explicit setting always wins, even when it does not exist. Otherwise
    /// the first existing candidate is used: `<test_base>/<suite>/<name>`,
    /// `<test_base>/<name>`, then `<kitchen_root>/<name>`.
    pub fn calculate_path(&self, source: OptionalSource) -> Option<PathBuf> {
        if let Some(path) = self.configured_path(source) {
            return Some(self.resolve_path(path));
        }

        let name = default_source_name(source);
        let test_base = self.resolve_path(&self.test_base_path);
        let mut candidates = Vec::with_capacity(3);
        if let Some(suite) = &self.suite {
            candidates.push(test_base.join(suite).join(name));
        }
        candidates.push(test_base.join(name));
        candidates.push(self.kitchen_root.join(name));

        candidates.into_iter().find(|candidate| candidate.exists())
    }

    /// Returns the origins of every optional source.
    pub fn sources(&self) -> SandboxSources {
        let mut sources = SandboxSources::default();
        for source in OptionalSource::ALL {
            sources.set(source, self.calculate_path(source));
        }
        sources
    }

    /// Returns the run metadata for the `dna.json` file.
    pub fn run_metadata(&self) -> RunMetadata {
        RunMetadata {
            node_name: self.node_name.clone(),
            run_list: self.run_list.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Returns the remote install command, if installation was requested.
    pub fn install_command(&self) -> Option<String> {
        install_command(
            self.require_chef_omnibus.as_ref(),
            &self.chef_omnibus_url,
            self.sudo,
        )
    }
}

fn default_source_name(source: OptionalSource) -> &'static str {
    match source {
        OptionalSource::Secret => "encrypted_data_bag_secret_key",
        other => other.dest_name(),
    }
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

impl Validate for SandboxConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.instance.trim().is_empty() {
            result.add_error("instance name cannot be empty");
        }

        if !self.kitchen_root.is_dir() {
            result.add_error(format!(
                "kitchen_root '{}' is not a directory",
                self.kitchen_root.display()
            ));
        }

        // Explicit paths that are missing are tolerated, but likely typos.
        for source in OptionalSource::ALL {
            if let Some(path) = self.configured_path(source) {
                let resolved = self.resolve_path(path);
                if !resolved.exists() {
                    result.add_warning(format!(
                        "{} path '{}' does not exist and will be skipped",
                        source.dest_name(),
                        resolved.display()
                    ));
                }
            }
        }

        if let Some(secret) = &self.encrypted_data_bag_secret_key_path {
            if self.resolve_path(secret).is_dir() {
                result.add_error(format!(
                    "encrypted_data_bag_secret_key_path '{}' must be a file",
                    secret.display()
                ));
            }
        }

        if self.run_list.iter().any(|item| item.trim().is_empty()) {
            result.add_error("run_list entries cannot be empty");
        }

        if self.attributes.contains_key("run_list") {
            result.add_warning("attributes.run_list is shadowed by run_list");
        }

        if self.node_name.is_some() && self.attributes.contains_key("name") {
            result.add_warning("attributes.name is shadowed by node_name");
        }

        if let Some(OmnibusRequirement::Version(v)) = &self.require_chef_omnibus {
            if v.trim().is_empty() {
                result.add_error("require_chef_omnibus version cannot be empty");
            } else if !is_version_token(v.trim()) {
                result.add_error(format!(
                    "require_chef_omnibus version '{}' may only contain letters, digits, '.', '-', '+' and '_'",
                    v
                ));
            }
        }

        if self
            .chef_omnibus_url
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            result.add_error("chef_omnibus_url cannot contain whitespace");
        }

        result
    }
}

fn is_version_token(version: &str) -> bool {
    version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_minimal_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kitchen.yml");
        std::fs::write(&path, "instance: default-ubuntu\n").unwrap();

        let config = SandboxConfig::load(&path).unwrap();

        assert_eq!(config.instance, "default-ubuntu");
        assert_eq!(config.kitchen_root, temp_dir.path());
        assert_eq!(config.test_base_path, PathBuf::from("test/integration"));
        assert_eq!(config.chef_omnibus_url, DEFAULT_OMNIBUS_URL);
        assert!(config.sudo);
        assert!(config.require_chef_omnibus.is_none());
    }

    #[test]
    fn parses_full_yaml() {
        let yaml = r#"
instance: web-centos
kitchen_root: /srv/project
suite: web
roles_path: chef/roles
run_list:
  - "recipe[web::default]"
attributes:
  nginx:
    port: 8080
require_chef_omnibus: "12.5.1"
sudo: false
"#;
        let config: SandboxConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.suite.as_deref(), Some("web"));
        assert_eq!(config.run_list, vec!["recipe[web::default]"]);
        assert_eq!(config.attributes["nginx"]["port"], 8080);
        assert_eq!(
            config.require_chef_omnibus,
            Some(OmnibusRequirement::Version("12.5.1".to_string()))
        );
        assert_eq!(
            config.resolve_path(config.roles_path.as_ref().unwrap()),
            PathBuf::from("/srv/project/chef/roles")
        );
    }

    #[test]
    fn parses_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sandbox.toml");
        std::fs::write(
            &path,
            "instance = \"db\"\nrun_list = [\"recipe[db]\"]\nrequire_chef_omnibus = true\n",
        )
        .unwrap();

        let config = SandboxConfig::load(&path).unwrap();

        assert_eq!(config.instance, "db");
        assert_eq!(
            config.require_chef_omnibus,
            Some(OmnibusRequirement::Enabled(true))
        );
        assert!(config.install_command().is_some());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sandbox.ini");
        std::fs::write(&path, "instance=x").unwrap();

        assert!(matches!(SandboxConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn default_paths_prefer_suite_then_test_base_then_root() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("roles")).unwrap();
        std::fs::create_dir_all(root.path().join("test/integration/roles")).unwrap();
        std::fs::create_dir_all(root.path().join("test/integration/web/roles")).unwrap();
        std::fs::create_dir_all(root.path().join("data_bags")).unwrap();

        let mut config = SandboxConfig::new("i", root.path());
        assert_eq!(
            config.calculate_path(OptionalSource::Roles),
            Some(root.path().join("test/integration/roles"))
        );

        config.suite = Some("web".to_string());
        assert_eq!(
            config.calculate_path(OptionalSource::Roles),
            Some(root.path().join("test/integration/web/roles"))
        );
        assert_eq!(
            config.calculate_path(OptionalSource::DataBags),
            Some(root.path().join("data_bags"))
        );
        assert_eq!(config.calculate_path(OptionalSource::Nodes), None);
    }

    #[test]
    fn explicit_path_wins_even_if_missing() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("nodes")).unwrap();
        let mut config = SandboxConfig::new("i", root.path());
        config.nodes_path = Some(PathBuf::from("elsewhere/nodes"));

        assert_eq!(
            config.calculate_path(OptionalSource::Nodes),
            Some(root.path().join("elsewhere/nodes"))
        );
    }

    #[test]
    fn default_secret_name_is_the_key_file() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("encrypted_data_bag_secret_key"), "k").unwrap();
        let config = SandboxConfig::new("i", root.path());

        assert_eq!(
            config.sources().secret,
            Some(root.path().join("encrypted_data_bag_secret_key"))
        );
    }

    #[test]
    fn run_metadata_carries_node_run_list_and_attributes() {
        let mut config = SandboxConfig::new("i", ".");
        config.node_name = Some("web-01".to_string());
        config.run_list = vec!["role[web]".to_string()];
        config
            .attributes
            .insert("env".to_string(), Value::String("qa".to_string()));

        let metadata = config.run_metadata();

        assert_eq!(metadata.node_name.as_deref(), Some("web-01"));
        assert_eq!(metadata.run_list, vec!["role[web]"]);
        assert_eq!(metadata.attributes["env"], "qa");
    }

    #[test]
    fn valid_config_passes() {
        let root = TempDir::new().unwrap();
        let config = SandboxConfig::new("default", root.path());

        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn empty_instance_fails() {
        let root = TempDir::new().unwrap();
        let config = SandboxConfig::new("  ", root.path());

        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("instance"));
    }

    #[test]
    fn missing_explicit_source_warns() {
        let root = TempDir::new().unwrap();
        let mut config = SandboxConfig::new("default", root.path());
        config.roles_path = Some(PathBuf::from("missing-roles"));

        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("roles")));
    }

    #[test]
    fn directory_secret_fails() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("secret")).unwrap();
        let mut config = SandboxConfig::new("default", root.path());
        config.encrypted_data_bag_secret_key_path = Some(PathBuf::from("secret"));

        let err = config.validate().into_result().unwrap_err();
        assert!(err.to_string().contains("must be a file"));
    }

    #[test]
    fn empty_run_list_entry_fails() {
        let root = TempDir::new().unwrap();
        let mut config = SandboxConfig::new("default", root.path());
        config.run_list = vec!["recipe[a]".to_string(), "".to_string()];

        assert!(!config.validate().is_valid());
    }

    #[test]
    fn attribute_name_with_node_name_warns() {
        let root = TempDir::new().unwrap();
        let mut config = SandboxConfig::new("default", root.path());
        config.attributes.insert("name".to_string(), Value::from("web"));

        let result = config.validate();
        assert!(!result.warnings.iter().any(|w| w.contains("attributes.name")));

        config.node_name = Some("web-01".to_string());
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("attributes.name is shadowed by node_name")));
    }

    #[test]
    fn version_with_shell_metacharacters_fails() {
        let root = TempDir::new().unwrap();
        let mut config = SandboxConfig::new("default", root.path());
        config.require_chef_omnibus = Some(OmnibusRequirement::Version("1.0'; rm -rf /".to_string()));
        assert!(!config.validate().is_valid());

        config.require_chef_omnibus = Some(OmnibusRequirement::Version("11.8.0-rc.1+build_2".to_string()));
        assert!(config.validate().is_valid());
    }

    #[test]
    fn omnibus_url_with_whitespace_fails() {
        let root = TempDir::new().unwrap();
        let mut config = SandboxConfig::new("default", root.path());
        config.chef_omnibus_url = "https://example.com/install.sh; reboot".to_string();

        let err = config.validate().into_result().unwrap_err();
        assert!(err.to_string().contains("chef_omnibus_url"));
    }
}

//! Fixed layout of a sandbox directory and the optional sources copied into it.

use std::path::{Path, PathBuf};

/// Serialized run metadata (the node "dna").
pub const DNA_FILE: &str = "dna.json";

/// Scratch directory for the remote run; always created, always empty.
pub const CACHE_DIR: &str = "cache";

/// Resolved cookbooks, one subdirectory per cookbook.
pub const COOKBOOKS_DIR: &str = "cookbooks";

/// An optional data source that may be copied into the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionalSource {
    DataBags,
    Roles,
    Nodes,
    Environments,
    Data,
    /// Encrypted data bag secret, copied as a single file.
    Secret,
}

impl OptionalSource {
    /// All sources, in the order they are materialized.
    pub const ALL: [OptionalSource; 6] = [
        OptionalSource::DataBags,
        OptionalSource::Roles,
        OptionalSource::Nodes,
        OptionalSource::Environments,
        OptionalSource::Data,
        OptionalSource::Secret,
    ];

    /// Name of the entry inside the sandbox root.
    pub fn dest_name(&self) -> &'static str {
        match self {
            OptionalSource::DataBags => "data_bags",
            OptionalSource::Roles => "roles",
            OptionalSource::Nodes => "nodes",
            OptionalSource::Environments => "environments",
            OptionalSource::Data => "data",
            OptionalSource::Secret => "encrypted_data_bag_secret",
        }
    }

    /// Whether the source is a single file rather than a directory.
    pub fn is_file(&self) -> bool {
        matches!(self, OptionalSource::Secret)
    }
}

/// Origins of every optional source. `None` means "not configured".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxSources {
    pub data_bags: Option<PathBuf>,
    pub roles: Option<PathBuf>,
    pub nodes: Option<PathBuf>,
    pub environments: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub secret: Option<PathBuf>,
}

impl SandboxSources {
    /// Returns the configured origin for `source`, if any.
    pub fn origin(&self, source: OptionalSource) -> Option<&Path> {
        let origin = match source {
            OptionalSource::DataBags => &self.data_bags,
            OptionalSource::Roles => &self.roles,
            OptionalSource::Nodes => &self.nodes,
            OptionalSource::Environments => &self.environments,
            OptionalSource::Data => &self.data,
            OptionalSource::Secret => &self.secret,
        };
        origin.as_deref()
    }

    /// Sets the origin for `source`.
    pub fn set(&mut self, source: OptionalSource, origin: Option<PathBuf>) {
        let slot = match source {
            OptionalSource::DataBags => &mut self.data_bags,
            OptionalSource::Roles => &mut self.roles,
            OptionalSource::Nodes => &mut self.nodes,
            OptionalSource::Environments => &mut self.environments,
            OptionalSource::Data => &mut self.data,
            OptionalSource::Secret => &mut self.secret,
        };
        *slot = origin;
    }
}

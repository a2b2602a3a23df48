//! Sandbox module for assembling Chef run directories.
//!
//! [`SandboxBuilder`] creates a private temp directory, writes the run
//! metadata, copies the optional data sources, resolves cookbooks and
//! applies `chefignore` filtering. The returned [`Sandbox`] owns the
//! directory and removes it on teardown.

mod builder;
mod dna;
mod layout;
mod materialize;

pub use builder::{destroy, CancelFlag, Sandbox, SandboxBuilder};
pub use dna::RunMetadata;
pub use layout::{OptionalSource, SandboxSources, CACHE_DIR, COOKBOOKS_DIR, DNA_FILE};
pub use materialize::{materialize, materialize_source};

pub(crate) use materialize::copy_tree;

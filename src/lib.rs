//! Kitchen Sandbox - assembles ephemeral Chef sandboxes for convergence runs
//!
//! This library builds a private, self-contained directory holding run
//! metadata, optional data sources and a resolved set of cookbooks, ready to
//! be transferred to a target and used by `chef-solo` / `chef-zero`.

pub mod config;
pub mod cookbooks;
pub mod error;
pub mod install;
pub mod sandbox;

pub use error::{Error, Result};

pub use config::{SandboxConfig, Validate, ValidationResult};
pub use cookbooks::{
    filter_cookbook, BerkshelfCli, CookbookStrategy, DependencyResolver, IgnoreFilter,
    LibrarianCli, ResolverContext, ResolverLocks,
};
pub use install::{install_command, ChefVersion, OmnibusRequirement};
pub use sandbox::{
    destroy, materialize, materialize_source, CancelFlag, OptionalSource, RunMetadata, Sandbox,
    SandboxBuilder, SandboxSources,
};

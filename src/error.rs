//! Error types for sandbox assembly.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for sandbox operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to create a sandbox.
    #[error("failed to create sandbox: {0}")]
    SandboxCreation(String),

    /// Failed to clean up a sandbox.
    #[error("failed to clean up sandbox at {path}: {reason}")]
    SandboxCleanup { path: PathBuf, reason: String },

    /// IO error during sandbox operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error: missing cookbook markers, bad metadata, bad config file.
    #[error("configuration error: {0}")]
    Config(String),

    /// A delegated dependency resolver is not installed.
    #[error("{resolver} is not available: {remediation}")]
    CapabilityUnavailable {
        resolver: &'static str,
        remediation: String,
    },

    /// A delegated dependency resolver ran and reported a failure.
    #[error("{resolver} failed to resolve cookbooks: {message}")]
    Resolution {
        resolver: &'static str,
        message: String,
    },

    /// The build was cancelled before it finished.
    #[error("sandbox build cancelled")]
    Cancelled,
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Io(err.into())
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for pingnoo_deploy operations.
//!
//! This module defines the top level error with actionable messages and
//! recovery suggestions. Packaging failures live in [`crate::bundler::Error`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pingnoo_deploy operations
pub type Result<T> = std::result::Result<T, DeployError>;

/// Main error type for all pingnoo_deploy operations
#[derive(Error, Debug)]
pub enum DeployError {
    /// Packaging, signing and notarization errors
    #[error("{0}")]
    Bundler(#[from] crate::bundler::Error),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Version string errors
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("could not read {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys
    #[error("could not parse {path}: {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },
}

/// Version string errors
#[derive(Error, Debug)]
pub enum VersionError {
    /// Invalid version format
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion {
        /// Version string
        version: String,
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Current directory could not be resolved
    #[error("could not determine the project root: {reason}")]
    ProjectRoot {
        /// Reason for the error
        reason: String,
    },
}

impl DeployError {
    /// Whether the step printer has already shown this error to the user.
    pub fn is_reported(&self) -> bool {
        matches!(self, DeployError::Bundler(e) if e.is_reported())
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        use crate::bundler::Error as B;

        let bundler = match self {
            DeployError::Bundler(e) => Some(innermost(e)),
            _ => None,
        };

        match (self, bundler) {
            (_, Some(B::ToolMissing { tool, hint })) => vec![
                format!("Install {tool} or make sure it is on PATH"),
                format!("Point at an existing installation with {hint}"),
            ],
            (_, Some(B::Resolution { library, .. })) => vec![
                format!("Install the package that provides {library} on the build host"),
                "Bundle the library with the application so it is excluded from dependencies"
                    .to_string(),
            ],
            (_, Some(B::NotarizationTimeout { request_id, .. })) => vec![
                format!("Check the request later: xcrun altool --notarization-info {request_id}"),
                "Raise the limit with --notarize-timeout".to_string(),
            ],
            (_, Some(B::NotarizationRejected { .. })) => vec![
                "Fetch the notarization log with xcrun altool --notarization-info <id>".to_string(),
                "Confirm every binary is signed with the hardened runtime".to_string(),
            ],
            (DeployError::Config(ConfigError::Parse { path, .. }), _) => vec![format!(
                "Fix the syntax in {} or remove it to use defaults",
                path.display()
            )],
            (DeployError::Version(_), _) => {
                vec!["Pass a version such as --version 2021.03.15-R3".to_string()]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}

/// The error underneath any context and reporting wrappers.
fn innermost(error: &crate::bundler::Error) -> &crate::bundler::Error {
    use crate::bundler::Error as B;

    match error {
        B::Context(_, inner) | B::Reported(inner) => innermost(inner),
        other => other,
    }
}

//! Error types for the packaging pipelines.
//!
//! [`Context`] wraps an error with a description of what was being done and
//! [`ErrorExt::fs_context`] attaches the path an I/O call failed on.
//!
//! # Expected vs. internal failures
//!
//! Every variant except [`Error::Internal`] describes a condition the user
//! can act on (a missing tool, a tool that exited non-zero, output that could
//! not be parsed). The step printer reports those and stops the run.
//! [`Error::Internal`] signals a bug in this crate and is propagated untouched.

use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
    time::Duration,
};
use thiserror::Error as DeriveError;

/// Errors returned by the bundler.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "copying binary")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// A required external executable could not be located.
    #[error("{tool} could not be found. (see {hint}).")]
    ToolMissing {
        /// Executable name
        tool: String,
        /// Remediation hint, usually the flag that overrides the lookup
        hint: String,
    },

    /// An external command exited with a non-zero status.
    ///
    /// The captured combined output is kept verbatim for diagnosis.
    #[error("{message}\r\n\r\n{output}")]
    ToolFailed {
        /// Caller supplied failure message
        message: String,
        /// Combined stdout and stderr of the command
        output: String,
    },

    /// The shell could not be spawned at all.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command that failed to execute
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// Structured output expected from a tool could not be extracted.
    #[error("could not parse {what} from {tool} output:\n{output}")]
    Parse {
        /// Tool whose output was parsed
        tool: String,
        /// What was being looked for (e.g. "request id")
        what: String,
        /// Raw output
        output: String,
    },

    /// A shared library could not be mapped to a providing package.
    #[error("could not determine the package providing {library}: {reason}")]
    Resolution {
        /// Library soname
        library: String,
        /// Why resolution failed
        reason: String,
    },

    /// The notarization service reached a terminal state other than success.
    #[error("there was a problem notarizing {artifact} ({status})")]
    NotarizationRejected {
        /// Artifact that was submitted
        artifact: String,
        /// Terminal status reported by the service
        status: String,
    },

    /// The notarization service did not reach a terminal state in time.
    #[error("notarization request {request_id} still in progress after {}s", .elapsed.as_secs())]
    NotarizationTimeout {
        /// Server issued request id
        request_id: String,
        /// Time spent polling
        elapsed: Duration,
    },

    /// Package template could not be parsed or rendered.
    #[error("template {template}: {reason}")]
    Template {
        /// Template name (usually the file name)
        template: String,
        /// What went wrong
        reason: String,
    },

    /// I/O error without path context.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Error walking a directory tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// Invalid regular expression.
    #[error("{0}")]
    RegexError(#[from] regex::Error),

    /// Invalid glob pattern.
    #[error("{0}")]
    GlobPattern(#[from] glob::PatternError),

    /// Glob execution error.
    #[error("{0}")]
    Glob(#[from] glob::GlobError),

    /// Downloading a helper tool failed.
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Architecture not supported by the selected package type.
    #[error("unsupported architecture: {0}")]
    ArchError(String),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),

    /// The error has already been shown to the user by the step printer.
    #[error("{0}")]
    Reported(Box<Self>),

    /// Programming error inside this crate.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this is a recognised failure condition rather than a bug.
    pub fn is_expected(&self) -> bool {
        match self {
            Error::Internal(_) => false,
            Error::Context(_, inner) | Error::Reported(inner) => inner.is_expected(),
            _ => true,
        }
    }

    /// Whether the step printer has already displayed this error.
    pub fn is_reported(&self) -> bool {
        match self {
            Error::Reported(_) => true,
            Error::Context(_, inner) => inner.is_reported(),
            _ => false,
        }
    }
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach a description to a failing `Result` or a missing `Option` value.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Wrap an I/O error with `context` (a verb phrase like "copying icon")
    /// and the path involved.
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

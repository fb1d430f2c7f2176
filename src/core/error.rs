//! Error handling for cortex-fetch
//!
//! The error system is split along the line the resolver cares about:
//!
//! - [`CortexError`] covers process-level failures (configuration, the root
//!   manifest, the working directory, a missing `git` binary). These abort the
//!   run and are rendered for the user through [`user_friendly_error`].
//! - [`ResolveError`] covers failures that belong to a single package in the
//!   dependency tree. They never abort the run: the owning node is marked
//!   failed (or, for soft failures, merely annotated) and a diagnostic is
//!   recorded while sibling resolution carries on.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cortex_fetch::core::{CortexError, ErrorContext, user_friendly_error};
//!
//! let ctx = user_friendly_error(anyhow::Error::from(CortexError::GitNotFound));
//! ctx.display(); // Shows colored error with suggestions
//!
//! let manual = ErrorContext::new(CortexError::ManifestNotFound {
//!     path: "/work/app".to_string(),
//! })
//! .with_suggestion("Create a cortex.json with a \"dependencies\" section");
//! println!("{manual}");
//! ```

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Process-level errors that stop a cortex-fetch run.
#[derive(Error, Debug, Clone)]
pub enum CortexError {
    /// A git command exited unsuccessfully or timed out
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git subcommand that failed (e.g. "rev-parse")
        operation: String,
        /// Captured stderr of the command
        stderr: String,
    },

    /// The `git` executable could not be found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// `git clone` failed
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// URL that was being cloned
        url: String,
        /// Git's explanation
        reason: String,
    },

    /// `git reset --hard <commit>` failed
    #[error("Failed to reset working tree to '{reference}'")]
    GitResetFailed {
        /// The revision the reset targeted
        reference: String,
        /// Git's explanation
        reason: String,
    },

    /// The configuration file is unreadable or invalid
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// No root manifest exists in the project directory
    #[error("No cortex.json or package.json found in {path}")]
    ManifestNotFound {
        /// Project directory that was searched
        path: String,
    },

    /// The root manifest exists but could not be parsed
    #[error("Invalid manifest file syntax in {file}")]
    ManifestParseError {
        /// Manifest path
        file: String,
        /// Parser message
        reason: String,
    },

    /// The working directory cannot safely be cleared and reused
    #[error("Refusing to use working directory {path}: {reason}")]
    UnsafeWorkDir {
        /// The offending directory
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// A filesystem operation outside the per-package snapshots failed
    #[error("File system error: {operation}")]
    FileSystemError {
        /// What was being attempted
        operation: String,
        /// The path involved
        path: String,
    },

    /// The registry client could not be constructed
    #[error("Network error: {operation}")]
    NetworkError {
        /// What was being attempted
        operation: String,
        /// Underlying reason
        reason: String,
    },

    /// No prior resolution exists to display
    #[error("No resolution found at {path}")]
    ResolutionNotFound {
        /// Expected location of the hand-off document
        path: String,
    },

    /// `--strict` was requested and some packages failed
    #[error("{failed} package(s) failed to resolve")]
    ResolutionIncomplete {
        /// Number of failed packages
        failed: usize,
    },

    /// Anything else
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// Failures scoped to a single package of the dependency tree.
///
/// Every variant carries the package name so a diagnostic can be reported
/// without further context. Only [`ResolveError::CommitNotFound`] and
/// [`ResolveError::ManifestUnreadable`] are soft; see [`ResolveError::is_soft`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The name cannot be mapped to its own snapshot directory
    #[error("invalid package name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Transport failure, non-2xx status or malformed payload from the registry
    #[error("registry lookup for '{name}' failed: {reason}")]
    Registry { name: String, reason: String },

    /// No published version satisfies the requested range
    #[error("no published version of '{name}' satisfies '{range}'")]
    NoSatisfyingVersion { name: String, range: String },

    /// The requested range is not a valid semantic-version range
    #[error("invalid version range '{range}' for '{name}': {reason}")]
    InvalidVersionRange { name: String, range: String, reason: String },

    /// The fallback chain produced no repository location
    #[error("no repository location found for '{name}'")]
    RepositoryNotFound { name: String },

    /// Clone, reset or disk failure while acquiring the snapshot
    #[error("failed to fetch '{name}' from {url}: {reason}")]
    Fetch { name: String, url: String, reason: String },

    /// The pinned commit is not reachable from the cloned default branch
    #[error("commit {commit} of '{name}' not found; using default branch snapshot")]
    CommitNotFound { name: String, commit: String },

    /// The snapshot's manifests exist but none could be parsed
    #[error("manifest of '{name}' unreadable: {reason}")]
    ManifestUnreadable { name: String, reason: String },

    /// An invariant of the tree was violated
    #[error("internal error while resolving '{name}': {reason}")]
    Internal { name: String, reason: String },
}

/// Category of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    InvalidName,
    Registry,
    NoSatisfyingVersion,
    InvalidVersionRange,
    RepositoryNotFound,
    Fetch,
    CommitNotFound,
    ManifestUnreadable,
    Internal,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidName => "invalid-name",
            Self::Registry => "registry",
            Self::NoSatisfyingVersion => "no-satisfying-version",
            Self::InvalidVersionRange => "invalid-version-range",
            Self::RepositoryNotFound => "repository-not-found",
            Self::Fetch => "fetch",
            Self::CommitNotFound => "commit-not-found",
            Self::ManifestUnreadable => "manifest-unreadable",
            Self::Internal => "internal",
        };
        f.write_str(label)
    }
}

impl ResolveError {
    /// Name of the package the error belongs to.
    #[must_use]
    pub fn package(&self) -> &str {
        match self {
            Self::InvalidName { name, .. }
            | Self::Registry { name, .. }
            | Self::NoSatisfyingVersion { name, .. }
            | Self::InvalidVersionRange { name, .. }
            | Self::RepositoryNotFound { name }
            | Self::Fetch { name, .. }
            | Self::CommitNotFound { name, .. }
            | Self::ManifestUnreadable { name, .. }
            | Self::Internal { name, .. } => name,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> DiagnosticKind {
        match self {
            Self::InvalidName { .. } => DiagnosticKind::InvalidName,
            Self::Registry { .. } => DiagnosticKind::Registry,
            Self::NoSatisfyingVersion { .. } => DiagnosticKind::NoSatisfyingVersion,
            Self::InvalidVersionRange { .. } => DiagnosticKind::InvalidVersionRange,
            Self::RepositoryNotFound { .. } => DiagnosticKind::RepositoryNotFound,
            Self::Fetch { .. } => DiagnosticKind::Fetch,
            Self::CommitNotFound { .. } => DiagnosticKind::CommitNotFound,
            Self::ManifestUnreadable { .. } => DiagnosticKind::ManifestUnreadable,
            Self::Internal { .. } => DiagnosticKind::Internal,
        }
    }

    /// Soft failures are recorded but do not stop discovery from the node.
    #[must_use]
    pub const fn is_soft(&self) -> bool {
        matches!(self, Self::CommitNotFound { .. } | Self::ManifestUnreadable { .. })
    }
}

/// Error wrapper that adds a suggestion and details for CLI display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: CortexError,
    /// Actionable next step, shown in green
    pub suggestion: Option<String>,
    /// Extra explanation, shown in yellow
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: CortexError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`CortexError`] anywhere in the chain, [`std::io::Error`] and
/// [`toml::de::Error`]; everything else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    // downcast_ref also sees errors attached with .context(); chain() covers sources
    let cortex_error = error
        .downcast_ref::<CortexError>()
        .or_else(|| error.chain().find_map(|e| e.downcast_ref::<CortexError>()));
    if let Some(cortex_error) = cortex_error {
        return create_error_context(cortex_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(CortexError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check ownership of the project and working directories")
                .with_details(io_error.to_string());
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(CortexError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct")
                .with_details(io_error.to_string());
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(CortexError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your cortex-fetch config file");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(CortexError::Other {
        message,
    })
}

fn create_error_context(error: CortexError) -> ErrorContext {
    match &error {
        CortexError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ and make sure it is in PATH")
            .with_details("cortex-fetch uses the system git binary to clone package snapshots"),
        CortexError::GitCommandError {
            stderr, ..
        } => {
            let ctx = ErrorContext::new(error.clone())
                .with_suggestion("Run the git command manually to see the full output");
            if stderr.is_empty() {
                ctx
            } else {
                ctx.with_details(stderr.clone())
            }
        }
        CortexError::ManifestNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion(
                "Create a cortex.json containing a \"dependencies\" object, or pass --project-dir",
            )
            .with_details(
                "The root manifest may also be a package.json with a \"cortex.dependencies\" section",
            ),
        CortexError::ManifestParseError {
            reason, ..
        } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Check the JSON syntax: quotes, commas and braces")
        }
        CortexError::ConfigError {
            ..
        } => ErrorContext::new(error).with_suggestion(format!(
            "Fix or remove the config file (set with --config or ${})",
            crate::constants::CONFIG_ENV
        )),
        CortexError::UnsafeWorkDir {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Point --work-dir at a dedicated directory inside the project")
            .with_details("The working directory is deleted and recreated on every install"),
        CortexError::ResolutionNotFound {
            ..
        } => ErrorContext::new(error).with_suggestion("Run `cortex-fetch install` first"),
        CortexError::ResolutionIncomplete {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run `cortex-fetch tree --failed` to see each failure"),
        CortexError::NetworkError {
            reason, ..
        } => {
            let reason = reason.clone();
            ErrorContext::new(error).with_details(reason)
        }
        _ => ErrorContext::new(error),
    }
}

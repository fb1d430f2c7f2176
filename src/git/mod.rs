//! Git operations wrapper for cortex-fetch
//!
//! Snapshots are acquired with the system `git` binary rather than an
//! embedded implementation, so proxies, CA bundles and `insteadOf` rewrites
//! configured for the user's git apply unchanged. All operations are async
//! and built on Tokio, which lets every package in the dependency tree clone
//! concurrently.
//!
//! Only the handful of operations the snapshot fetcher needs are exposed:
//!
//! - [`GitRepo::clone`] - clone a repository's default branch
//! - [`GitRepo::has_commit`] - check whether a commit object is present
//! - [`GitRepo::reset_hard`] - move the working tree to an exact commit
//! - [`GitRepo::head_commit`] - read back the checked out revision
//!
//! # Example
//!
//! ```rust,no_run
//! use cortex_fetch::git::GitRepo;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repo = GitRepo::clone(
//!     "https://github.com/jquery/jquery.git",
//!     "browserify-cortex/jquery",
//!     Some(Duration::from_secs(120)),
//! )
//! .await?;
//!
//! if repo.has_commit("a1b2c3d").await? {
//!     repo.reset_hard("a1b2c3d").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod command_builder;

use crate::core::CortexError;
use crate::git::command_builder::GitCommand;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A handle to a local clone. Holds only the path; state is always read
/// back from git.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Creates a handle for an existing local repository without checking it.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Clones the default branch of `url` into `target`.
    ///
    /// `target` must not exist or be an empty directory.
    ///
    /// # Errors
    ///
    /// Returns [`CortexError::GitCloneFailed`] when git rejects the clone
    /// (unreachable host, unknown repository, non-empty target) and
    /// [`CortexError::GitCommandError`] when the clone times out.
    pub async fn clone(
        url: &str,
        target: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let target_path = target.as_ref();
        let label = target_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut cmd = GitCommand::clone(url, target_path).with_context(label);
        if timeout.is_some() {
            cmd = cmd.with_timeout(timeout);
        }
        cmd.execute_success().await?;

        Ok(Self::new(target_path))
    }

    /// Returns true when `commit` resolves to a commit object in this clone.
    ///
    /// # Errors
    ///
    /// Fails when git cannot answer at all, for example outside a repository
    /// or on timeout. An unknown revision is `Ok(false)`.
    pub async fn has_commit(&self, commit: &str) -> Result<bool> {
        match GitCommand::verify_commit(commit).current_dir(&self.path).execute().await {
            Ok(_) => Ok(true),
            Err(e) => match e.downcast_ref::<CortexError>() {
                // `--quiet` keeps stderr empty for a plain miss
                Some(CortexError::GitCommandError {
                    stderr, ..
                }) if stderr.trim().is_empty() || is_missing_revision(stderr) => Ok(false),
                _ => Err(e),
            },
        }
    }

    /// Hard-resets the working tree to `commit`, discarding local changes.
    ///
    /// # Errors
    ///
    /// Returns [`CortexError::GitResetFailed`] if the revision is unknown or
    /// the working tree cannot be updated.
    pub async fn reset_hard(&self, commit: &str) -> Result<()> {
        GitCommand::reset_hard(commit).current_dir(&self.path).execute_success().await
    }

    /// Full hash of the checked out commit.
    pub async fn head_commit(&self) -> Result<String> {
        GitCommand::current_commit()
            .current_dir(&self.path)
            .execute_stdout()
            .await
            .context("Failed to get current commit")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Returns true when git's error output says a revision does not exist.
///
/// Used to tell a pinned commit that is missing from the cloned history
/// apart from every other reset failure.
#[must_use]
pub fn is_missing_revision(message: &str) -> bool {
    const PATTERNS: [&str; 6] = [
        "unknown revision",
        "bad object",
        "not a valid object name",
        "ambiguous argument",
        "could not parse object",
        "not a tree object",
    ];
    let lower = message.to_lowercase();
    PATTERNS.iter().any(|p| lower.contains(p))
}

#[must_use]
pub fn is_git_installed() -> bool {
    which::which(crate::utils::platform::get_git_command()).is_ok()
}

/// Fails with [`CortexError::GitNotFound`] when git is not in PATH.
pub fn ensure_git_available() -> Result<()> {
    if is_git_installed() {
        Ok(())
    } else {
        Err(CortexError::GitNotFound.into())
    }
}

//! Snapshot acquisition.
//!
//! A snapshot is the exact commit a package version was published from,
//! checked out into `work_dir/<name>`. The git-backed fetcher clones the
//! repository's default branch and hard-resets it to the pinned commit.
//!
//! Outcomes:
//!
//! - [`FetchOutcome::Exact`] - the pinned commit is checked out
//! - [`FetchOutcome::Approximate`] - the clone succeeded but the commit is not
//!   in the cloned history (or the registry published none); the default
//!   branch HEAD is kept and discovery continues from it
//! - `Err(ResolveError::Fetch)` - anything else; the package fails

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::{CortexError, ResolveError};
use crate::git::{GitRepo, is_missing_revision};

/// Everything needed to materialise one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub name: String,
    /// Normalized repository URL.
    pub url: String,
    /// Commit to check out; `None` when the registry published no `gitHead`.
    pub commit: Option<String>,
    /// Directory the snapshot is written to. Must not exist yet.
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Exact,
    /// Snapshot kept at the default branch; carries the soft diagnostic.
    Approximate(ResolveError),
}

/// Source of package snapshots.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<FetchOutcome, ResolveError>> + Send;
}

/// Checks that `name` maps to a snapshot directory no other name can share.
///
/// Accepted forms are `pkg` and `@scope/pkg`. Empty segments, segments
/// starting with `.`, backslashes and any other use of `/` or `@` are
/// rejected.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidName`] describing the first problem found.
pub fn check_package_name(name: &str) -> Result<(), ResolveError> {
    let invalid = |reason: &str| ResolveError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('\\') {
        return Err(invalid("name contains a backslash"));
    }

    let segments: Vec<&str> = name.split('/').collect();
    match segments.as_slice() {
        [single] if !single.starts_with('@') => {}
        [scope, _] if scope.len() > 1 && scope.starts_with('@') => {}
        _ => return Err(invalid("expected 'name' or '@scope/name'")),
    }
    if segments.iter().any(|s| s.is_empty() || s.starts_with('.')) {
        return Err(invalid("name has an empty segment or one starting with '.'"));
    }
    Ok(())
}

/// Where a package's snapshot lives inside the working directory.
///
/// Scoped names nest (`@scope/pkg` → `work_dir/@scope/pkg`). Names that pass
/// [`check_package_name`] never share a directory.
#[must_use]
pub fn snapshot_dir(work_dir: &Path, name: &str) -> PathBuf {
    name.split('/').filter(|part| !part.is_empty() && *part != "." && *part != "..").fold(
        work_dir.to_path_buf(),
        |path, part| path.join(part),
    )
}

/// Fetches snapshots with the system git binary.
#[derive(Debug, Clone, Default)]
pub struct GitSnapshotFetcher {
    timeout: Option<Duration>,
}

impl GitSnapshotFetcher {
    /// `timeout` bounds each git command; `None` uses the built-in defaults.
    #[must_use]
    pub const fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
        }
    }
}

/// Pulls git's own explanation out of a git-layer error.
fn git_failure_reason(error: &anyhow::Error) -> String {
    match error.chain().find_map(|e| e.downcast_ref::<CortexError>()) {
        Some(CortexError::GitCloneFailed {
            reason, ..
        })
        | Some(CortexError::GitResetFailed {
            reason, ..
        }) => reason.clone(),
        Some(CortexError::GitCommandError {
            stderr, ..
        }) => stderr.clone(),
        _ => format!("{error:#}"),
    }
}

impl SnapshotSource for GitSnapshotFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, ResolveError> {
        let hard = |reason: String| ResolveError::Fetch {
            name: request.name.clone(),
            url: request.url.clone(),
            reason,
        };

        if let Some(parent) = request.destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| hard(format!("cannot create {}: {e}", parent.display())))?;
        }

        debug!("{}: cloning {}", request.name, request.url);
        let repo = GitRepo::clone(&request.url, &request.destination, self.timeout)
            .await
            .map_err(|e| hard(git_failure_reason(&e)))?;

        let Some(commit) = request.commit.as_deref().filter(|c| !c.trim().is_empty()) else {
            warn!("{}: no commit published, keeping default branch", request.name);
            return Ok(FetchOutcome::Approximate(ResolveError::CommitNotFound {
                name: request.name.clone(),
                commit: "(none published)".to_string(),
            }));
        };

        let not_found = || ResolveError::CommitNotFound {
            name: request.name.clone(),
            commit: commit.to_string(),
        };

        if !repo.has_commit(commit).await.map_err(|e| hard(git_failure_reason(&e)))? {
            warn!("{}: commit {} not in cloned history", request.name, commit);
            return Ok(FetchOutcome::Approximate(not_found()));
        }

        match repo.reset_hard(commit).await {
            Ok(()) => {
                debug!("{}: checked out {}", request.name, commit);
                Ok(FetchOutcome::Exact)
            }
            Err(e) => {
                let reason = git_failure_reason(&e);
                if is_missing_revision(&reason) {
                    warn!("{}: commit {} could not be checked out", request.name, commit);
                    Ok(FetchOutcome::Approximate(not_found()))
                } else {
                    Err(hard(reason))
                }
            }
        }
    }
}

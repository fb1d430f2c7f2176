//! Platform helpers: the git executable name, home directory lookup and
//! shell-style path expansion for user supplied paths.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Returns true when compiled for Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Name of the git executable to invoke.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Returns the current user's home directory.
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Unable to determine home directory")
}

/// Resolves a user supplied path: `~` and `$VAR` are expanded and relative
/// results are anchored at `base`.
///
/// ```rust
/// use cortex_fetch::utils::platform::resolve_path;
/// use std::path::Path;
///
/// let resolved = resolve_path("deps", Path::new("/work/app")).unwrap();
/// assert_eq!(resolved, Path::new("/work/app/deps"));
/// ```
pub fn resolve_path(path: &str, base: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand path: {path}"))?
        .into_owned();

    let expanded = PathBuf::from(expanded);
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base.join(expanded))
    }
}

/// Returns true if `candidate` is `ancestor` or lies inside it.
///
/// Both paths are compared component-wise after lexical normalization of
/// `.` and `..`; the filesystem is not consulted.
#[must_use]
pub fn is_same_or_ancestor(ancestor: &Path, candidate: &Path) -> bool {
    normalize(candidate).starts_with(normalize(ancestor))
}

fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

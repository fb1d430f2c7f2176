//! Hand-off from the resolver to the external builder.
//!
//! Once the tree is complete, every `Done` node becomes a [`PlannedModule`]
//! in a [`BuildPlan`]; `Failed` nodes are listed separately with their
//! diagnostics and are never handed to the builder. The shipped
//! [`Builder`] is [`HandoffWriter`], which serialises the plan to
//! `resolution.json` in the working directory for a bundler to pick up.
//!
//! ```json
//! {
//!   "generated_at": "2024-05-01T10:00:00Z",
//!   "project_entry": "/work/app/index.js",
//!   "modules": [
//!     { "name": "zepto", "version": "1.1.6", "commit": "9f3c…",
//!       "snapshot_path": "/work/app/browserify-cortex/zepto",
//!       "entry": "/work/app/browserify-cortex/zepto/zepto.js" }
//!   ],
//!   "failed": []
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::{DEFAULT_ENTRY, RESOLUTION_FILE};
use crate::core::CortexError;
use crate::resolver::{DependencyTree, Diagnostic};

/// A resolved module ready for bundling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedModule {
    pub name: String,
    pub version: String,
    /// Commit the snapshot was pinned to; absent for a default-branch snapshot
    /// without a published commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub repository: String,
    pub snapshot_path: PathBuf,
    /// Absolute path of the module's main file.
    pub entry: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    /// True when the snapshot is the default branch, not the pinned commit.
    #[serde(default)]
    pub approximate: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// A package left out of the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedModule {
    pub name: String,
    pub version_range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Everything the builder needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub generated_at: DateTime<Utc>,
    /// The project's own main module.
    pub project_entry: PathBuf,
    pub work_dir: PathBuf,
    pub modules: Vec<PlannedModule>,
    pub failed: Vec<FailedModule>,
}

impl BuildPlan {
    /// Builds the plan from a completed tree.
    ///
    /// `project_main` is the root manifest's `main`, relative to
    /// `project_dir`.
    #[must_use]
    pub fn from_tree(
        tree: &DependencyTree,
        project_dir: &Path,
        project_main: Option<&str>,
        work_dir: &Path,
    ) -> Self {
        let modules = tree
            .done()
            .filter_map(|node| {
                let snapshot_path = node.snapshot_path.clone()?;
                let main = node.entry_point.as_deref().unwrap_or(DEFAULT_ENTRY);
                Some(PlannedModule {
                    name: node.name.clone(),
                    version: node.resolved_version.clone().unwrap_or_default(),
                    commit: if node.approximate { None } else { node.commit_id.clone() },
                    repository: node.repository_url.clone().unwrap_or_default(),
                    entry: snapshot_path.join(main.trim_start_matches("./")),
                    snapshot_path,
                    requested_by: node.requested_by.clone(),
                    approximate: node.approximate,
                    diagnostics: node.diagnostics.clone(),
                })
            })
            .collect();

        let failed = tree
            .failed()
            .map(|node| FailedModule {
                name: node.name.clone(),
                version_range: node.version_range.clone(),
                requested_by: node.requested_by.clone(),
                diagnostics: node.diagnostics.clone(),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            project_entry: project_dir.join(project_main.unwrap_or(DEFAULT_ENTRY).trim_start_matches("./")),
            work_dir: work_dir.to_path_buf(),
            modules,
            failed,
        }
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<&PlannedModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Soft diagnostics of resolved modules followed by failures.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.modules
            .iter()
            .flat_map(|m| m.diagnostics.iter())
            .chain(self.failed.iter().flat_map(|f| f.diagnostics.iter()))
    }
}

/// Consumer of a finished resolution.
pub trait Builder {
    fn build(&self, plan: &BuildPlan) -> Result<()>;
}

/// Writes the plan as JSON for an external bundler.
#[derive(Debug, Clone)]
pub struct HandoffWriter {
    path: PathBuf,
}

impl HandoffWriter {
    /// Writer targeting `work_dir/resolution.json`.
    pub fn new(work_dir: &Path) -> Self {
        Self {
            path: work_dir.join(RESOLUTION_FILE),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Builder for HandoffWriter {
    fn build(&self, plan: &BuildPlan) -> Result<()> {
        let json = serde_json::to_string_pretty(plan).context("Failed to serialize build plan")?;
        std::fs::write(&self.path, json + "\n").map_err(|e| {
            anyhow::Error::from(e).context(CortexError::FileSystemError {
                operation: "write resolution".to_string(),
                path: self.path.display().to_string(),
            })
        })?;
        info!("Wrote {} module(s) to {}", plan.modules.len(), self.path.display());
        Ok(())
    }
}

/// Reads a previously written `resolution.json` from `work_dir`.
///
/// # Errors
///
/// [`CortexError::ResolutionNotFound`] when no file exists; a parse error
/// when it is not a build plan.
pub async fn load_resolution(work_dir: &Path) -> Result<BuildPlan> {
    let path = work_dir.join(RESOLUTION_FILE);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CortexError::ResolutionNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    serde_json::from_str(&content).with_context(|| format!("Invalid resolution file {}", path.display()))
}

//! Reading dependency declarations from package manifests.
//!
//! A cortex package declares its dependencies in one of two places:
//!
//! ```json
//! // cortex.json
//! { "name": "app", "main": "index.js", "dependencies": { "zepto": "^1.1.0" } }
//!
//! // package.json
//! { "name": "app", "cortex": { "dependencies": { "zepto": "^1.1.0" } } }
//! ```
//!
//! `cortex.json` wins when it parses and carries a `dependencies` object;
//! otherwise `package.json`'s `cortex.dependencies` is used; otherwise the
//! package has no dependencies. The same rules apply to the project root and
//! to every fetched snapshot, with one difference: at the root a missing or
//! unparsable manifest is fatal ([`load_root`]), while inside a snapshot it is
//! at most a soft diagnostic ([`read_dependencies`]).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{CORTEX_JSON, PACKAGE_JSON};
use crate::core::{CortexError, ResolveError};

/// Which file the dependencies were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestSource {
    CortexJson,
    PackageJson,
    /// Neither file declared dependencies.
    None,
}

/// Shape of `cortex.json`.
#[derive(Debug, Clone, Default, Deserialize)]
struct CortexJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    main: Option<String>,
    #[serde(default)]
    dependencies: Option<BTreeMap<String, String>>,
}

/// The parts of `package.json` cortex cares about.
#[derive(Debug, Clone, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    main: Option<String>,
    #[serde(default)]
    cortex: Option<CortexSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CortexSection {
    #[serde(default)]
    dependencies: Option<BTreeMap<String, String>>,
}

/// Dependencies and entry point of one package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: Option<String>,
    pub main: Option<String>,
    /// Dependency name → version range.
    pub dependencies: BTreeMap<String, String>,
    pub source: ManifestSource,
}

impl Manifest {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            name: None,
            main: None,
            dependencies: BTreeMap::new(),
            source: ManifestSource::None,
        }
    }
}

/// Result of inspecting a directory, including what went wrong along the way.
#[derive(Debug, Clone)]
pub struct ManifestReport {
    pub manifest: Manifest,
    /// Manifest files that exist in the directory.
    pub files_found: Vec<PathBuf>,
    /// Files that exist but could not be read or parsed, with the reason.
    pub problems: Vec<(PathBuf, String)>,
}

impl ManifestReport {
    /// True when a manifest file was present but nothing usable came of it.
    #[must_use]
    pub fn is_unreadable(&self) -> bool {
        self.manifest.source == ManifestSource::None && !self.problems.is_empty()
    }

    fn problem_summary(&self) -> String {
        self.problems
            .iter()
            .map(|(path, reason)| format!("{}: {}", display_name(path), reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Reads a file, distinguishing "absent" (`Ok(None)`) from unreadable.
async fn read_optional(path: &Path) -> Result<Option<String>, String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

/// Inspects `dir` and applies the cortex.json → package.json precedence.
pub async fn inspect(dir: &Path) -> ManifestReport {
    let mut report = ManifestReport {
        manifest: Manifest::empty(),
        files_found: Vec::new(),
        problems: Vec::new(),
    };

    let cortex_path = dir.join(CORTEX_JSON);
    let mut cortex: Option<CortexJson> = None;
    match read_optional(&cortex_path).await {
        Ok(Some(content)) => {
            report.files_found.push(cortex_path.clone());
            match serde_json::from_str::<CortexJson>(&content) {
                Ok(parsed) => cortex = Some(parsed),
                Err(e) => report.problems.push((cortex_path, e.to_string())),
            }
        }
        Ok(None) => {}
        Err(reason) => {
            report.files_found.push(cortex_path.clone());
            report.problems.push((cortex_path, reason));
        }
    }

    if let Some(CortexJson {
        name,
        main,
        dependencies: Some(dependencies),
    }) = cortex.clone()
    {
        report.manifest = Manifest {
            name,
            main,
            dependencies,
            source: ManifestSource::CortexJson,
        };
        return report;
    }

    let package_path = dir.join(PACKAGE_JSON);
    match read_optional(&package_path).await {
        Ok(Some(content)) => {
            report.files_found.push(package_path.clone());
            match serde_json::from_str::<PackageJson>(&content) {
                Ok(package) => {
                    let cortex_name = cortex.as_ref().and_then(|c| c.name.clone());
                    let cortex_main = cortex.as_ref().and_then(|c| c.main.clone());
                    report.manifest.name = cortex_name.or(package.name);
                    report.manifest.main = cortex_main.or(package.main);
                    if let Some(dependencies) = package.cortex.and_then(|c| c.dependencies) {
                        report.manifest.dependencies = dependencies;
                        report.manifest.source = ManifestSource::PackageJson;
                    }
                }
                Err(e) => report.problems.push((package_path, e.to_string())),
            }
        }
        Ok(None) => {}
        Err(reason) => {
            report.files_found.push(package_path.clone());
            report.problems.push((package_path, reason));
        }
    }

    if report.manifest.source == ManifestSource::None {
        if let Some(parsed) = cortex {
            report.manifest.name = report.manifest.name.take().or(parsed.name);
            report.manifest.main = report.manifest.main.take().or(parsed.main);
        }
    }

    report
}

/// Reads the dependencies declared inside a fetched snapshot.
///
/// Never fails: a directory without manifests has no dependencies. When a
/// manifest exists but none could be parsed, the empty manifest is returned
/// together with a soft [`ResolveError::ManifestUnreadable`].
pub async fn read_dependencies(name: &str, dir: &Path) -> (Manifest, Option<ResolveError>) {
    let report = inspect(dir).await;
    debug!(
        "{}: {} dependencies from {:?}",
        name,
        report.manifest.dependencies.len(),
        report.manifest.source
    );

    let problem = report.is_unreadable().then(|| ResolveError::ManifestUnreadable {
        name: name.to_string(),
        reason: report.problem_summary(),
    });
    (report.manifest, problem)
}

/// Loads the project's root manifest.
///
/// # Errors
///
/// - [`CortexError::ManifestNotFound`] when neither `cortex.json` nor
///   `package.json` exists in `project_dir`
/// - [`CortexError::ManifestParseError`] when a manifest exists but none
///   could be parsed
pub async fn load_root(project_dir: &Path) -> Result<Manifest> {
    let report = inspect(project_dir).await;

    if report.files_found.is_empty() {
        return Err(CortexError::ManifestNotFound {
            path: project_dir.display().to_string(),
        }
        .into());
    }

    if report.is_unreadable() {
        let (file, reason) = report.problems[0].clone();
        return Err(CortexError::ManifestParseError {
            file: file.display().to_string(),
            reason,
        }
        .into());
    }

    Ok(report.manifest)
}

//! Common test utilities for the cortex-fetch integration and stress suites
//!
//! A [`TestProject`] owns a temporary directory laid out as
//!
//! ```text
//! <tmp>/
//! ├── home/       HOME for the binary, so no real config file is picked up
//! ├── project/    the project being installed
//! └── upstream/   one git repository per package
//! ```

// Not every suite uses every helper
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use cortex_fetch::constants::{CONFIG_ENV, CORTEX_JSON, DEFAULT_WORK_DIR, NO_PROGRESS_ENV};
use cortex_fetch::test_utils::TestGit;

/// Test project with isolated home and upstream directories.
pub struct TestProject {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    home_dir: PathBuf,
    project_dir: PathBuf,
    upstream_dir: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let home_dir = temp_dir.path().join("home");
        let project_dir = temp_dir.path().join("project");
        let upstream_dir = temp_dir.path().join("upstream");

        fs::create_dir_all(&home_dir)?;
        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(&upstream_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            home_dir,
            project_dir,
            upstream_dir,
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    pub fn work_path(&self) -> PathBuf {
        self.project_dir.join(DEFAULT_WORK_DIR)
    }

    /// Writes `cortex.json` declaring `dependencies`.
    pub fn write_manifest(&self, dependencies: &[(&str, &str)]) -> Result<()> {
        let deps: serde_json::Map<String, serde_json::Value> = dependencies
            .iter()
            .map(|(name, range)| ((*name).to_string(), serde_json::Value::String((*range).to_string())))
            .collect();
        let manifest = serde_json::json!({ "name": "app", "dependencies": deps });
        self.write_file(CORTEX_JSON, &serde_json::to_string_pretty(&manifest)?)
    }

    /// Writes a file relative to the project directory.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.project_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Creates an upstream repository for `name` whose only commit contains
    /// a `cortex.json` with `dependencies` and an `index.js`.
    ///
    /// Returns the repository's `file://` URL and the commit SHA.
    pub fn create_upstream(&self, name: &str, dependencies: &[(&str, &str)]) -> Result<UpstreamRepo> {
        let deps: serde_json::Map<String, serde_json::Value> = dependencies
            .iter()
            .map(|(dep, range)| ((*dep).to_string(), serde_json::Value::String((*range).to_string())))
            .collect();
        let manifest = serde_json::json!({ "name": name, "dependencies": deps });
        let manifest = serde_json::to_string_pretty(&manifest)?;
        let index = format!("module.exports = '{name}';\n");

        let (git, commit) = TestGit::with_files(
            self.upstream_dir.join(name.replace('/', "__")),
            &[(CORTEX_JSON, manifest.as_str()), ("index.js", index.as_str())],
        )?;

        Ok(UpstreamRepo {
            url: git.file_url(),
            commit,
            git,
        })
    }

    /// Runs the binary inside the project directory with an isolated home,
    /// no colours and no progress output.
    pub fn cortex_fetch(&self) -> Command {
        let mut cmd = Command::cargo_bin("cortex-fetch").expect("binary is built for integration tests");
        cmd.current_dir(&self.project_dir)
            .env("HOME", &self.home_dir)
            .env("NO_COLOR", "1")
            .env(NO_PROGRESS_ENV, "1")
            .env_remove(CONFIG_ENV)
            .env_remove("RUST_LOG");
        cmd
    }
}

/// An upstream package repository.
pub struct UpstreamRepo {
    pub url: String,
    pub commit: String,
    pub git: TestGit,
}

impl UpstreamRepo {
    /// Adds a second commit and returns its SHA; the first commit stays
    /// reachable.
    pub fn commit_more(&self, files: &[(&str, &str)]) -> Result<String> {
        self.git.write_files(files)?;
        self.git.add_all()?;
        self.git.commit("more")?;
        self.git.rev_parse_head()
    }
}

/// Registry document for one package with a single version published from
/// `commit` (or with no `gitHead` when `None`).
pub fn registry_document(name: &str, version: &str, repository: &str, commit: Option<&str>) -> String {
    let mut version_doc = serde_json::json!({ "version": version });
    if let Some(commit) = commit {
        version_doc["gitHead"] = serde_json::Value::String(commit.to_string());
    }
    serde_json::json!({
        "name": name,
        "repository": { "type": "git", "url": repository },
        "versions": { version: version_doc },
    })
    .to_string()
}

/// Path in the registry for a package name, as the client requests it.
pub fn registry_path(name: &str) -> String {
    format!("/{}", name.replace('/', "%2F"))
}

/// File assertion helpers
pub struct FileAssert;

impl FileAssert {
    pub fn exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }

    pub fn not_exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(!path.exists(), "Expected file to not exist: {}", path.display());
    }

    pub fn contains(path: impl AsRef<Path>, expected: &str) {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));
        assert!(
            content.contains(expected),
            "Expected file {} to contain '{}'\nActual content: {}",
            path.display(),
            expected,
            content
        );
    }
}

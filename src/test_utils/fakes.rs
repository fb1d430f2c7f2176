//! In-memory stand-ins for the registry and the snapshot fetcher.
//!
//! Both fakes count calls per package, which is how tests check that a name
//! is queried and fetched at most once per run.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::constants::CORTEX_JSON;
use crate::core::ResolveError;
use crate::registry::{MetadataSource, PackageMetadata, RepositoryField, VersionMetadata};
use crate::snapshot::{FetchOutcome, FetchRequest, SnapshotSource};

fn bump(counts: &Mutex<HashMap<String, usize>>, name: &str) {
    *counts.lock().unwrap_or_else(PoisonError::into_inner).entry(name.to_string()).or_default() += 1;
}

fn count(counts: &Mutex<HashMap<String, usize>>, name: &str) -> usize {
    counts.lock().unwrap_or_else(PoisonError::into_inner).get(name).copied().unwrap_or(0)
}

fn total(counts: &Mutex<HashMap<String, usize>>) -> usize {
    counts.lock().unwrap_or_else(PoisonError::into_inner).values().sum()
}

/// Fluent builder for [`PackageMetadata`].
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    metadata: PackageMetadata,
}

impl PackageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            metadata: PackageMetadata {
                name: name.to_string(),
                ..PackageMetadata::default()
            },
        }
    }

    /// Package-level repository.
    #[must_use]
    pub fn repository(mut self, url: &str) -> Self {
        self.metadata.repository = Some(RepositoryField::Url(url.to_string()));
        self
    }

    /// A published version with a commit and no version-level repository.
    #[must_use]
    pub fn version(self, version: &str, git_head: &str) -> Self {
        self.version_with(
            version,
            VersionMetadata {
                git_head: Some(git_head.to_string()),
                ..VersionMetadata::default()
            },
        )
    }

    #[must_use]
    pub fn version_with(mut self, version: &str, metadata: VersionMetadata) -> Self {
        self.metadata.versions.insert(version.to_string(), metadata);
        self
    }

    pub fn build(self) -> PackageMetadata {
        self.metadata
    }
}

/// Registry serving fixed documents.
///
/// Unknown names answer like a registry 404.
#[derive(Debug, Default)]
pub struct MockRegistry {
    packages: HashMap<String, PackageMetadata>,
    failures: HashMap<String, String>,
    delay: Option<Duration>,
    queries: Mutex<HashMap<String, usize>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_package(mut self, metadata: PackageMetadata) -> Self {
        self.packages.insert(metadata.name.clone(), metadata);
        self
    }

    /// Makes `name` fail with a registry error carrying `reason`.
    #[must_use]
    pub fn with_failure(mut self, name: &str, reason: &str) -> Self {
        self.failures.insert(name.to_string(), reason.to_string());
        self
    }

    /// Sleeps before answering, to widen race windows.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn query_count(&self, name: &str) -> usize {
        count(&self.queries, name)
    }

    pub fn total_queries(&self) -> usize {
        total(&self.queries)
    }
}

impl MetadataSource for MockRegistry {
    async fn fetch_metadata(&self, name: &str) -> Result<PackageMetadata, ResolveError> {
        bump(&self.queries, name);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self.failures.get(name) {
            return Err(ResolveError::Registry {
                name: name.to_string(),
                reason: reason.clone(),
            });
        }
        self.packages.get(name).cloned().ok_or_else(|| ResolveError::Registry {
            name: name.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })
    }
}

/// Fetcher that writes a `cortex.json` into the destination instead of
/// cloning anything.
#[derive(Debug, Default)]
pub struct MockFetcher {
    manifests: HashMap<String, String>,
    missing_commits: HashSet<String>,
    failures: HashMap<String, String>,
    panics: HashSet<String>,
    delay: Option<Duration>,
    fetches: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot of `name` declares these dependencies in `cortex.json`.
    #[must_use]
    pub fn with_dependencies(mut self, name: &str, dependencies: &[(&str, &str)]) -> Self {
        let deps: serde_json::Map<String, serde_json::Value> = dependencies
            .iter()
            .map(|(dep, range)| ((*dep).to_string(), serde_json::Value::String((*range).to_string())))
            .collect();
        let manifest = serde_json::json!({ "name": name, "dependencies": deps });
        self.manifests.insert(name.to_string(), manifest.to_string());
        self
    }

    /// The snapshot of `name` contains a `cortex.json` with this exact text.
    #[must_use]
    pub fn with_raw_manifest(mut self, name: &str, content: &str) -> Self {
        self.manifests.insert(name.to_string(), content.to_string());
        self
    }

    /// The pinned commit of `name` is absent from its repository.
    #[must_use]
    pub fn with_missing_commit(mut self, name: &str) -> Self {
        self.missing_commits.insert(name.to_string());
        self
    }

    /// Fetching `name` fails hard.
    #[must_use]
    pub fn with_failure(mut self, name: &str, reason: &str) -> Self {
        self.failures.insert(name.to_string(), reason.to_string());
        self
    }

    /// Fetching `name` panics.
    #[must_use]
    pub fn with_panic(mut self, name: &str) -> Self {
        self.panics.insert(name.to_string());
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self, name: &str) -> usize {
        count(&self.fetches, name)
    }

    pub fn total_fetches(&self) -> usize {
        total(&self.fetches)
    }

    /// Highest number of fetches observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn materialise(&self, request: &FetchRequest) -> Result<FetchOutcome, ResolveError> {
        let hard = |reason: String| ResolveError::Fetch {
            name: request.name.clone(),
            url: request.url.clone(),
            reason,
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics.contains(&request.name) {
            panic!("simulated fetch panic for {}", request.name);
        }
        if let Some(reason) = self.failures.get(&request.name) {
            return Err(hard(reason.clone()));
        }

        tokio::fs::create_dir_all(&request.destination).await.map_err(|e| hard(e.to_string()))?;
        if let Some(manifest) = self.manifests.get(&request.name) {
            write_manifest(&request.destination, manifest).await.map_err(|e| hard(e.to_string()))?;
        }

        if self.missing_commits.contains(&request.name) {
            return Ok(FetchOutcome::Approximate(ResolveError::CommitNotFound {
                name: request.name.clone(),
                commit: request.commit.clone().unwrap_or_default(),
            }));
        }
        Ok(FetchOutcome::Exact)
    }
}

async fn write_manifest(dir: &Path, content: &str) -> std::io::Result<()> {
    tokio::fs::write(dir.join(CORTEX_JSON), content).await
}

impl SnapshotSource for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, ResolveError> {
        bump(&self.fetches, &request.name);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.materialise(request).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

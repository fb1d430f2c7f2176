//! Repository location for resolved package versions.
//!
//! A package version knows where its source lives in one of three places,
//! tried in order until one yields a URL:
//!
//! 1. [`VersionRepository`] - the `repository` of the selected version
//! 2. [`PackageRepository`] - the package-level `repository`
//! 3. [`FallbackTable`] - a static name → URL table for packages published
//!    without repository information
//!
//! Each link implements [`RepositoryResolver`], and [`RepositoryLocator`] runs
//! the chain. Whatever URL wins is passed through [`normalize_url`] so git can
//! fetch it without SSH keys.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

use crate::core::ResolveError;
use crate::registry::{PackageMetadata, RepositoryField, VersionMetadata};

/// Compiled fallback locations for well-known packages that were published
/// to the cortex registry without a `repository` field.
const BUILTIN_FALLBACKS: &[(&str, &str)] = &[
    ("jquery", "https://github.com/jquery/jquery.git"),
    ("zepto", "https://github.com/madrobby/zepto.git"),
    ("underscore", "https://github.com/jashkenas/underscore.git"),
    ("backbone", "https://github.com/jashkenas/backbone.git"),
    ("events", "https://github.com/browserify/events.git"),
    ("util", "https://github.com/browserify/node-util.git"),
    ("json", "https://github.com/douglascrockford/JSON-js.git"),
];

/// The compiled fallback table.
#[must_use]
pub fn builtin_fallbacks() -> BTreeMap<String, String> {
    BUILTIN_FALLBACKS.iter().map(|(name, url)| ((*name).to_string(), (*url).to_string())).collect()
}

/// One link of the fallback chain.
pub trait RepositoryResolver: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &'static str;

    /// Returns the raw URL this link knows for the package, if any.
    fn resolve(&self, version: &VersionMetadata, package: &PackageMetadata) -> Option<String>;
}

/// Reads `versions[v].repository`.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionRepository;

impl RepositoryResolver for VersionRepository {
    fn label(&self) -> &'static str {
        "version"
    }

    fn resolve(&self, version: &VersionMetadata, _package: &PackageMetadata) -> Option<String> {
        version.repository.as_ref().and_then(RepositoryField::url).map(str::to_string)
    }
}

/// Reads the package-level `repository`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackageRepository;

impl RepositoryResolver for PackageRepository {
    fn label(&self) -> &'static str {
        "package"
    }

    fn resolve(&self, _version: &VersionMetadata, package: &PackageMetadata) -> Option<String> {
        package.repository.as_ref().and_then(RepositoryField::url).map(str::to_string)
    }
}

/// Static name → URL table.
#[derive(Debug, Default, Clone)]
pub struct FallbackTable {
    entries: BTreeMap<String, String>,
}

impl FallbackTable {
    #[must_use]
    pub const fn new(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries,
        }
    }

    /// The compiled table with `overrides` layered on top; an override
    /// replaces a compiled entry of the same name.
    #[must_use]
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut entries = builtin_fallbacks();
        entries.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::new(entries)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }
}

impl RepositoryResolver for FallbackTable {
    fn label(&self) -> &'static str {
        "fallback"
    }

    fn resolve(&self, _version: &VersionMetadata, package: &PackageMetadata) -> Option<String> {
        self.get(&package.name).map(str::trim).filter(|url| !url.is_empty()).map(str::to_string)
    }
}

/// Ordered chain of [`RepositoryResolver`]s; the first non-empty answer wins.
pub struct RepositoryLocator {
    chain: Vec<Box<dyn RepositoryResolver>>,
}

impl std::fmt::Debug for RepositoryLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<_> = self.chain.iter().map(|link| link.label()).collect();
        f.debug_struct("RepositoryLocator").field("chain", &labels).finish()
    }
}

impl Default for RepositoryLocator {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl RepositoryLocator {
    /// Version → package → fallback table (compiled entries plus `overrides`).
    #[must_use]
    pub fn new(overrides: &BTreeMap<String, String>) -> Self {
        Self::with_chain(vec![
            Box::new(VersionRepository),
            Box::new(PackageRepository),
            Box::new(FallbackTable::with_overrides(overrides)),
        ])
    }

    #[must_use]
    pub fn with_chain(chain: Vec<Box<dyn RepositoryResolver>>) -> Self {
        Self {
            chain,
        }
    }

    /// Finds and normalizes the repository URL of a selected version.
    ///
    /// # Errors
    ///
    /// [`ResolveError::RepositoryNotFound`] when every link comes up empty.
    pub fn locate(
        &self,
        version: &VersionMetadata,
        package: &PackageMetadata,
    ) -> Result<String, ResolveError> {
        for link in &self.chain {
            if let Some(raw) = link.resolve(version, package) {
                let url = normalize_url(&raw);
                debug!("{}: repository from {} link: {}", package.name, link.label(), url);
                return Ok(url);
            }
        }

        Err(ResolveError::RepositoryNotFound {
            name: package.name.clone(),
        })
    }
}

struct Rewrite {
    pattern: Regex,
    replacement: &'static str,
}

fn rewrites() -> &'static [Rewrite] {
    static REWRITES: OnceLock<Vec<Rewrite>> = OnceLock::new();
    REWRITES.get_or_init(|| {
        [
            // ssh://git@host[:port]/path and ssh://git@host:path; the port is dropped
            (r"^ssh://(?:[^@/]+@)?([^/:]+)(?::\d+)?[:/](.+)$", "https://$1/$2"),
            // git@host:owner/repo
            (r"^[^@/:]+@([^/:]+):/?(.+)$", "https://$1/$2"),
            (r"^git://(.+)$", "https://$1"),
            (r"^github:(.+)$", "https://github.com/$1"),
            (r"^gitlab:(.+)$", "https://gitlab.com/$1"),
            (r"^bitbucket:(.+)$", "https://bitbucket.org/$1"),
            // owner/repo
            (r"^([A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+)$", "https://github.com/$1"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|pattern| Rewrite {
                pattern,
                replacement,
            })
        })
        .collect()
    })
}

/// Rewrites a published repository URL into an anonymous, fetchable form.
///
/// Purely textual and idempotent: the host and path are preserved, only the
/// transport changes. URLs no rule applies to are returned trimmed but
/// otherwise unchanged.
///
/// ```rust
/// use cortex_fetch::source::normalize_url;
///
/// assert_eq!(normalize_url("git@github.com:owner/repo.git"), "https://github.com/owner/repo.git");
/// assert_eq!(normalize_url("git+https://github.com/owner/repo"), "https://github.com/owner/repo");
/// assert_eq!(normalize_url("git://github.com/owner/repo.git"), "https://github.com/owner/repo.git");
/// ```
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let stripped = trimmed.strip_prefix("git+").unwrap_or(trimmed);

    for rewrite in rewrites() {
        if rewrite.pattern.is_match(stripped) {
            return rewrite.pattern.replace(stripped, rewrite.replacement).into_owned();
        }
    }
    stripped.to_string()
}

//! Registry client
//!
//! Fetches a package's full metadata document (every published version plus
//! per-version repository, commit and entry point) from a cortex/npm style
//! registry with one `GET {registry}/{name}` per package.
//!
//! Any transport error, non-2xx status or malformed payload becomes a
//! [`ResolveError::Registry`] for that package only. Responses are never
//! cached: each run queries the registry afresh, and the resolver guarantees
//! a name is queried at most once per run.
//!
//! The resolver talks to the registry through the [`MetadataSource`] trait so
//! it can be driven by an in-memory registry in tests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::{CortexError, ResolveError};

/// A `repository` field as published: either a bare URL string or an object
/// carrying `url` and optionally `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepositoryField {
    Url(String),
    Detailed {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// Anything else a registry might hold; treated as absent.
    Unrecognized(serde_json::Value),
}

impl RepositoryField {
    /// The non-empty URL carried by this field, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        let url = match self {
            Self::Url(url) => Some(url.as_str()),
            Self::Detailed {
                url, ..
            } => url.as_deref(),
            Self::Unrecognized(_) => None,
        };
        url.map(str::trim).filter(|u| !u.is_empty())
    }
}

/// Metadata of one published version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryField>,

    /// Commit the version was published from.
    #[serde(rename = "gitHead", default, skip_serializing_if = "Option::is_none")]
    pub git_head: Option<String>,

    /// Entry point relative to the package root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
}

/// A registry document for one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub versions: BTreeMap<String, VersionMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryField>,
}

/// Source of package metadata.
pub trait MetadataSource: Send + Sync + 'static {
    /// Retrieves the full metadata of `name`.
    fn fetch_metadata(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<PackageMetadata, ResolveError>> + Send;
}

/// HTTP client for a registry base URL.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    /// Builds a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CortexError::NetworkError`] when the HTTP client cannot be
    /// initialised (for example, no TLS backend is available).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CortexError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CortexError::NetworkError {
                operation: "create registry client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a package document; the `/` of a scoped name is escaped.
    #[must_use]
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.replace('/', "%2F"))
    }
}

impl MetadataSource for RegistryClient {
    async fn fetch_metadata(&self, name: &str) -> Result<PackageMetadata, ResolveError> {
        let url = self.package_url(name);
        let registry_error = |reason: String| ResolveError::Registry {
            name: name.to_string(),
            reason,
        };

        debug!(target: "registry", "GET {}", url);
        let response =
            self.client.get(&url).send().await.map_err(|e| registry_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(registry_error(format!("HTTP {status} from {url}")));
        }

        let body = response.text().await.map_err(|e| registry_error(e.to_string()))?;
        let mut metadata: PackageMetadata = serde_json::from_str(&body)
            .map_err(|e| registry_error(format!("malformed metadata: {e}")))?;

        if metadata.name.is_empty() {
            metadata.name = name.to_string();
        } else if metadata.name != name {
            warn!(
                target: "registry",
                "Registry returned '{}' for requested package '{}'",
                metadata.name,
                name
            );
        }

        debug!(
            target: "registry",
            "{}: {} published version(s)",
            name,
            metadata.versions.len()
        );
        Ok(metadata)
    }
}

//! Version range parsing and version selection.
//!
//! Registry manifests use npm-style ranges (`^1.0.0`, `~1.2`, `1.x`,
//! `>=1.0.0 <2.0.0`, `1.0.0 - 1.4.0`, `^1.0.0 || ^2.0.0`). This module
//! translates them into [`semver::VersionReq`] alternatives and picks the
//! highest published version that satisfies one of them.
//!
//! Selection always compares precedence explicitly, so the result never
//! depends on the order in which the registry happened to list versions.
//!
//! # Examples
//!
//! ```rust
//! use cortex_fetch::version::select_version;
//!
//! let published = ["2.0.0", "1.0.0", "1.2.0"];
//! assert_eq!(select_version("^1.0.0", published).unwrap(), "1.2.0");
//! assert_eq!(select_version("*", published).unwrap(), "2.0.0");
//! assert!(select_version("^3", published).is_err());
//! ```

use semver::{Version, VersionReq};
use thiserror::Error;

use crate::core::ResolveError;

/// Failure modes of [`select_version`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("no published version satisfies '{range}'")]
    NoSatisfyingVersion { range: String },

    #[error("invalid version range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },
}

impl VersionError {
    /// Attaches the package name, producing the node-level error.
    #[must_use]
    pub fn for_package(self, name: &str) -> ResolveError {
        match self {
            Self::NoSatisfyingVersion {
                range,
            } => ResolveError::NoSatisfyingVersion {
                name: name.to_string(),
                range,
            },
            Self::InvalidRange {
                range,
                reason,
            } => ResolveError::InvalidVersionRange {
                name: name.to_string(),
                range,
                reason,
            },
        }
    }
}

/// A parsed range: satisfied when any alternative matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parses an npm-style range.
    ///
    /// `""`, `*`, `x` and `latest` accept every stable version. A bare full
    /// version (`1.2.3`) is an exact match; a bare partial version (`1.2`)
    /// accepts its patch range, as npm does.
    pub fn parse(range: &str) -> Result<Self, VersionError> {
        let invalid = |reason: String| VersionError::InvalidRange {
            range: range.to_string(),
            reason,
        };

        let mut alternatives = Vec::new();
        for alternative in range.split("||") {
            let translated = translate_alternative(alternative.trim());
            let req = VersionReq::parse(&translated).map_err(|e| invalid(e.to_string()))?;
            alternatives.push(req);
        }

        Ok(Self {
            alternatives,
        })
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

fn is_wildcard(token: &str) -> bool {
    matches!(token, "" | "*" | "x" | "X" | "latest")
}

/// Turns one `||` alternative into the comma separated syntax of `semver`.
fn translate_alternative(alternative: &str) -> String {
    if is_wildcard(alternative) {
        return "*".to_string();
    }

    // Hyphen range: "1.0.0 - 2.0.0"
    if let Some((low, high)) = alternative.split_once(" - ") {
        return format!(
            ">={}, <={}",
            strip_v(low.trim()),
            strip_v(high.trim())
        );
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in alternative.split_whitespace() {
        let token = token.trim_end_matches(',');
        if token.is_empty() {
            continue;
        }
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            // Operator separated from its version, as in ">= 1.0.0"
            pending_op = Some(token);
            continue;
        }
        let comparator = match pending_op.take() {
            Some(op) => format!("{op}{}", strip_v(token)),
            None => translate_comparator(token),
        };
        comparators.push(comparator);
    }

    if comparators.is_empty() {
        "*".to_string()
    } else {
        comparators.join(", ")
    }
}

fn translate_comparator(token: &str) -> String {
    let split = token.find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^')).unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let version = strip_v(version);

    if is_wildcard(version) {
        return "*".to_string();
    }
    if !op.is_empty() {
        return format!("{op}{version}");
    }
    if version.contains(['x', 'X', '*']) {
        return version.to_string();
    }
    if Version::parse(version).is_ok() {
        format!("={version}")
    } else {
        format!("~{version}")
    }
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix(['v', 'V']).unwrap_or(version)
}

/// Parses a published version key, tolerating a leading `v`.
#[must_use]
pub fn parse_published(version: &str) -> Option<Version> {
    Version::parse(strip_v(version.trim())).ok()
}

/// Returns the highest published version satisfying `range`.
///
/// Keys that are not valid semantic versions are skipped. When two keys
/// parse to the same version (`1.0.0` and `v1.0.0`) the lexically smaller
/// key is returned so the outcome stays deterministic.
///
/// # Errors
///
/// [`VersionError::InvalidRange`] when `range` cannot be parsed, and
/// [`VersionError::NoSatisfyingVersion`] when nothing matches.
pub fn select_version<'a, I>(range: &str, available: I) -> Result<String, VersionError>
where
    I: IntoIterator<Item = &'a str>,
{
    let parsed = VersionRange::parse(range)?;

    available
        .into_iter()
        .filter_map(|key| parse_published(key).map(|v| (v, key)))
        .filter(|(version, _)| parsed.matches(version))
        .max_by(|(a, a_key), (b, b_key)| a.cmp(b).then_with(|| b_key.cmp(a_key)))
        .map(|(_, key)| key.to_string())
        .ok_or_else(|| VersionError::NoSatisfyingVersion {
            range: range.to_string(),
        })
}

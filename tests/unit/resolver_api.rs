//! Resolution scenarios through `TreeResolver`'s public interface.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use tempfile::TempDir;

use cortex_fetch::core::DiagnosticKind;
use cortex_fetch::resolver::{NodeState, ResolverOptions, TreeResolver};
use cortex_fetch::source::RepositoryLocator;
use cortex_fetch::test_utils::{MockFetcher, MockRegistry, PackageBuilder};

fn roots(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

fn published(name: &str, versions: &[&str]) -> PackageBuilder {
    versions.iter().fold(
        PackageBuilder::new(name).repository(&format!("git@github.com:cortex/{name}.git")),
        |builder, v| builder.version(v, &format!("{name}@{v}")),
    )
}

#[tokio::test]
async fn test_diamond_dependency_is_resolved_once() -> Result<()> {
    let temp = TempDir::new()?;
    let registry = MockRegistry::new()
        .with_package(published("app-a", &["1.0.0"]).build())
        .with_package(published("app-b", &["1.0.0"]).build())
        .with_package(published("shared", &["1.1.0", "1.5.0", "2.0.0"]).build());
    let fetcher = MockFetcher::new()
        .with_dependencies("app-a", &[("shared", "^1.0.0")])
        .with_dependencies("app-b", &[("shared", "^2.0.0")]);

    let resolver = TreeResolver::new(
        registry,
        fetcher,
        RepositoryLocator::default(),
        ResolverOptions::new(temp.path()),
    );
    let tree = resolver.resolve(&roots(&[("app-a", "*"), ("app-b", "*")])).await?;

    assert_eq!(tree.len(), 3);
    assert!(tree.is_complete());
    assert_eq!(resolver.registry().query_count("shared"), 1);
    assert_eq!(resolver.fetcher().fetch_count("shared"), 1);

    // Whichever parent got there first decided the range
    let shared = tree.get("shared").unwrap();
    let expected = match shared.requested_by.as_deref() {
        Some("app-a") => "1.5.0",
        Some("app-b") => "2.0.0",
        other => panic!("unexpected requester {other:?}"),
    };
    assert_eq!(shared.resolved_version.as_deref(), Some(expected));
    Ok(())
}

#[tokio::test]
async fn test_repository_urls_are_normalized() -> Result<()> {
    let temp = TempDir::new()?;
    let registry = MockRegistry::new().with_package(published("widget", &["0.3.1"]).build());
    let resolver =
        TreeResolver::new(registry, MockFetcher::new(), RepositoryLocator::default(), ResolverOptions::new(temp.path()));

    let tree = resolver.resolve(&roots(&[("widget", "0.3.x")])).await?;

    let widget = tree.get("widget").unwrap();
    assert_eq!(widget.repository_url.as_deref(), Some("https://github.com/cortex/widget.git"));
    assert_eq!(widget.commit_id.as_deref(), Some("widget@0.3.1"));
    Ok(())
}

#[tokio::test]
async fn test_configured_fallback_supplies_repository() -> Result<()> {
    let temp = TempDir::new()?;
    let registry = MockRegistry::new().with_package(PackageBuilder::new("legacy").version("1.0.0", "abc").build());
    let overrides = BTreeMap::from([("legacy".to_string(), "git://git.example.com/legacy.git".to_string())]);

    let resolver = TreeResolver::new(
        registry,
        MockFetcher::new(),
        RepositoryLocator::new(&overrides),
        ResolverOptions::new(temp.path()),
    );
    let tree = resolver.resolve(&roots(&[("legacy", "*")])).await?;

    let legacy = tree.get("legacy").unwrap();
    assert_eq!(legacy.state(), NodeState::Done);
    assert_eq!(legacy.repository_url.as_deref(), Some("https://git.example.com/legacy.git"));
    Ok(())
}

#[tokio::test]
async fn test_completion_hook_sees_every_node_settled() -> Result<()> {
    let temp = TempDir::new()?;
    let registry = MockRegistry::new()
        .with_package(published("root", &["1.0.0"]).build())
        .with_package(published("leaf", &["1.0.0"]).build())
        .with_failure("flaky", "connection reset by peer");
    let fetcher = MockFetcher::new()
        .with_dependencies("root", &[("leaf", "*"), ("flaky", "*")])
        .with_missing_commit("leaf");

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let resolver = TreeResolver::new(registry, fetcher, RepositoryLocator::default(), ResolverOptions::new(temp.path()))
        .on_complete(move |tree| {
            assert_eq!(tree.outstanding(), 0);
            assert!(tree.nodes().all(|node| node.state().is_terminal()));
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let tree = resolver.resolve(&roots(&[("root", "^1")])).await?;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(tree.done().count(), 2);
    assert_eq!(tree.failed().count(), 1);

    let kinds: Vec<(DiagnosticKind, bool)> = tree.diagnostics().map(|d| (d.kind, d.soft)).collect();
    assert!(kinds.contains(&(DiagnosticKind::CommitNotFound, true)));
    assert!(kinds.contains(&(DiagnosticKind::Registry, false)));
    Ok(())
}

#[tokio::test]
async fn test_invalid_range_fails_with_its_own_kind() -> Result<()> {
    let temp = TempDir::new()?;
    let registry = MockRegistry::new().with_package(published("a", &["1.0.0"]).build());
    let resolver =
        TreeResolver::new(registry, MockFetcher::new(), RepositoryLocator::default(), ResolverOptions::new(temp.path()));

    let tree = resolver.resolve(&roots(&[("a", "not a range!")])).await?;

    let a = tree.get("a").unwrap();
    assert_eq!(a.state(), NodeState::Failed);
    assert_eq!(a.diagnostics[0].kind, DiagnosticKind::InvalidVersionRange);
    assert_eq!(resolver.fetcher().total_fetches(), 0);
    Ok(())
}

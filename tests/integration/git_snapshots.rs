//! The resolver driving the real git fetcher over `file://` upstreams.

use std::collections::BTreeMap;

use cortex_fetch::core::DiagnosticKind;
use cortex_fetch::resolver::{NodeState, ResolverOptions, TreeResolver};
use cortex_fetch::snapshot::GitSnapshotFetcher;
use cortex_fetch::source::RepositoryLocator;
use cortex_fetch::test_utils::{MockRegistry, PackageBuilder, TestGit, init_test_logging};

use crate::common::{FileAssert, TestProject};

fn roots(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

fn resolver(project: &TestProject, registry: MockRegistry) -> TreeResolver<MockRegistry, GitSnapshotFetcher> {
    init_test_logging(None);
    TreeResolver::new(
        registry,
        GitSnapshotFetcher::default(),
        RepositoryLocator::default(),
        ResolverOptions::new(project.work_path()),
    )
}

#[tokio::test]
async fn test_transitive_snapshots_are_checked_out_at_published_commits() {
    let project = TestProject::new().unwrap();
    let a = project.create_upstream("a", &[("b", "^0.2.0")]).unwrap();
    let b = project.create_upstream("b", &[]).unwrap();

    let registry = MockRegistry::new()
        .with_package(PackageBuilder::new("a").repository(&a.url).version("1.0.0", &a.commit).build())
        .with_package(
            PackageBuilder::new("b")
                .repository(&b.url)
                .version("0.2.0", &b.commit)
                .version("0.3.0", "0000000000000000000000000000000000000000")
                .build(),
        );

    let tree = resolver(&project, registry).resolve(&roots(&[("a", "*")])).await.unwrap();

    assert_eq!(tree.len(), 2);
    for (name, commit) in [("a", &a.commit), ("b", &b.commit)] {
        let node = tree.get(name).unwrap();
        assert_eq!(node.state(), NodeState::Done, "{name}: {:?}", node.diagnostics);
        assert!(!node.approximate);
        assert_eq!(node.commit_id.as_ref(), Some(commit));

        let snapshot = project.work_path().join(name);
        FileAssert::exists(snapshot.join("index.js"));
        assert_eq!(&TestGit::new(&snapshot).rev_parse_head().unwrap(), commit);
    }
    assert_eq!(tree.get("b").unwrap().resolved_version.as_deref(), Some("0.2.0"));
}

#[tokio::test]
async fn test_snapshot_is_reset_to_an_older_commit() {
    let project = TestProject::new().unwrap();
    let a = project.create_upstream("a", &[]).unwrap();
    let head = a.commit_more(&[("later.js", "// added after publishing\n")]).unwrap();
    assert_ne!(head, a.commit);

    let registry = MockRegistry::new()
        .with_package(PackageBuilder::new("a").repository(&a.url).version("1.0.0", &a.commit).build());

    let tree = resolver(&project, registry).resolve(&roots(&[("a", "1.0.0")])).await.unwrap();

    assert_eq!(tree.get("a").unwrap().state(), NodeState::Done);
    let snapshot = project.work_path().join("a");
    assert_eq!(TestGit::new(&snapshot).rev_parse_head().unwrap(), a.commit);
    FileAssert::not_exists(snapshot.join("later.js"));
}

#[tokio::test]
async fn test_missing_commit_keeps_default_branch_and_follows_dependencies() {
    let project = TestProject::new().unwrap();
    let a = project.create_upstream("a", &[("b", "*")]).unwrap();
    let b = project.create_upstream("b", &[]).unwrap();
    let missing = "1234567890abcdef1234567890abcdef12345678";

    let registry = MockRegistry::new()
        .with_package(PackageBuilder::new("a").repository(&a.url).version("1.0.0", missing).build())
        .with_package(PackageBuilder::new("b").repository(&b.url).version("1.0.0", &b.commit).build());

    let tree = resolver(&project, registry).resolve(&roots(&[("a", "*")])).await.unwrap();

    let node = tree.get("a").unwrap();
    assert_eq!(node.state(), NodeState::Done);
    assert!(node.approximate);
    assert_eq!(node.diagnostics.len(), 1);
    assert_eq!(node.diagnostics[0].kind, DiagnosticKind::CommitNotFound);
    assert!(node.diagnostics[0].soft);
    assert_eq!(TestGit::new(project.work_path().join("a")).rev_parse_head().unwrap(), a.commit);

    assert_eq!(tree.get("b").unwrap().state(), NodeState::Done);
    assert_eq!(tree.get("b").unwrap().requested_by.as_deref(), Some("a"));
}

#[tokio::test]
async fn test_unreachable_repository_fails_the_node() {
    let project = TestProject::new().unwrap();
    let gone = format!("file://{}", project.project_path().join("no-such-repo").display());

    let registry = MockRegistry::new()
        .with_package(PackageBuilder::new("ghost").repository(&gone).version("1.0.0", "abc").build());

    let tree = resolver(&project, registry).resolve(&roots(&[("ghost", "*")])).await.unwrap();

    let node = tree.get("ghost").unwrap();
    assert_eq!(node.state(), NodeState::Failed);
    assert_eq!(node.diagnostics[0].kind, DiagnosticKind::Fetch);
    assert!(!node.diagnostics[0].soft);
    assert!(tree.is_complete());
}

#[tokio::test]
async fn test_scoped_package_snapshot_is_nested() {
    let project = TestProject::new().unwrap();
    let scoped = project.create_upstream("@ui/button", &[]).unwrap();

    let registry = MockRegistry::new().with_package(
        PackageBuilder::new("@ui/button").repository(&scoped.url).version("2.1.0", &scoped.commit).build(),
    );

    let tree = resolver(&project, registry).resolve(&roots(&[("@ui/button", "^2.0.0")])).await.unwrap();

    assert_eq!(tree.get("@ui/button").unwrap().state(), NodeState::Done);
    FileAssert::exists(project.work_path().join("@ui").join("button").join("index.js"));
}

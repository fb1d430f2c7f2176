//! Deep graphs: long chains, cycles and a complete binary tree.

use std::time::Instant;

use tempfile::TempDir;

use cortex_fetch::resolver::NodeState;
use cortex_fetch::test_utils::MockFetcher;

use crate::{registry_for, resolver, roots};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_long_chain() {
    let temp = TempDir::new().unwrap();
    let names: Vec<String> = (0..400).map(|i| format!("link-{i}")).collect();
    let fetcher = names
        .windows(2)
        .fold(MockFetcher::new(), |fetcher, pair| fetcher.with_dependencies(&pair[0], &[(pair[1].as_str(), "*")]));

    let start = Instant::now();
    let tree = resolver(registry_for(&names), fetcher, temp.path(), None).resolve(&roots(&names[..1])).await.unwrap();
    println!("chain of {} in {:?}", tree.len(), start.elapsed());

    assert_eq!(tree.len(), 400);
    assert!(tree.nodes().all(|n| n.state() == NodeState::Done));
    assert_eq!(tree.get("link-399").unwrap().requested_by.as_deref(), Some("link-398"));
}

/// Every package depends on every other one.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fully_connected_cycle() {
    let temp = TempDir::new().unwrap();
    let names: Vec<String> = (0..40).map(|i| format!("ring-{i}")).collect();
    let fetcher = names.iter().fold(MockFetcher::new(), |fetcher, name| {
        let others: Vec<(&str, &str)> = names.iter().filter(|n| *n != name).map(|n| (n.as_str(), "*")).collect();
        fetcher.with_dependencies(name, &others)
    });

    let resolver = resolver(registry_for(&names), fetcher, temp.path(), None);
    let tree = resolver.resolve(&roots(&names[..1])).await.unwrap();

    assert_eq!(tree.len(), 40);
    assert!(tree.is_complete());
    assert_eq!(resolver.fetcher().total_fetches(), 40);
    assert_eq!(resolver.registry().total_queries(), 40);
}

/// Complete binary tree of depth 9 (1023 packages).
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_binary_tree() {
    let temp = TempDir::new().unwrap();
    let count = (1 << 10) - 1;
    let names: Vec<String> = (0..count).map(|i| format!("node-{i}")).collect();
    let fetcher = (0..count / 2).fold(MockFetcher::new(), |fetcher, i| {
        fetcher.with_dependencies(&names[i], &[(names[2 * i + 1].as_str(), "*"), (names[2 * i + 2].as_str(), "*")])
    });

    let start = Instant::now();
    let tree =
        resolver(registry_for(&names), fetcher, temp.path(), Some(16)).resolve(&roots(&names[..1])).await.unwrap();
    println!("binary tree of {} in {:?}", tree.len(), start.elapsed());

    assert_eq!(tree.len(), count);
    assert_eq!(tree.done().count(), count);
}

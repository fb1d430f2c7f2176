//! Concurrent dependency tree resolution.
//!
//! [`TreeResolver`] turns a root dependency map into a complete
//! [`DependencyTree`]. Every package name gets its own Tokio task that runs
//! the pipeline
//!
//! ```text
//! Pending → Resolving → Fetching → Discovering → Done
//!     registry + version    git clone     read manifest,
//!     + repository          + reset       register children
//! ```
//!
//! and any step may end the node in `Failed` instead. Failures stay local to
//! the node: they are recorded as [`Diagnostic`]s and sibling tasks carry on.
//!
//! # Completion
//!
//! The tree, behind a single mutex, is the only shared mutable state. Two
//! rules make the completion check race-free:
//!
//! 1. A name is inserted (Pending) in the same critical section that observes
//!    it, and all names of one manifest are inserted together, before any of
//!    their tasks is spawned.
//! 2. A node registers its children while still `Discovering` and only then
//!    becomes `Done`, so its own outstanding count covers them.
//!
//! The outstanding-node counter therefore reaches zero exactly once, when the
//! last reachable node is terminal; that transition fires the
//! [`CompletionNotifier`], which hands a copy of the finished tree to the
//! waiting caller.

mod notifier;
pub mod tree;


pub use notifier::{CompletionNotifier, CompletionSignal, completion_channel};
pub use tree::{DependencyNode, DependencyTree, Diagnostic, NodeState, TreeError};

use anyhow::Result;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::core::{CortexError, ResolveError};
use crate::manifest::read_dependencies;
use crate::registry::MetadataSource;
use crate::snapshot::{FetchOutcome, FetchRequest, SnapshotSource, check_package_name, snapshot_dir};
use crate::source::RepositoryLocator;
use crate::utils::progress::ProgressBar;
use crate::version::select_version;

/// Called with the finished tree when the completion event fires.
pub type CompletionHook = Arc<dyn Fn(&DependencyTree) + Send + Sync>;

/// Knobs of a resolution run.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Directory receiving one snapshot per package.
    pub work_dir: PathBuf,
    /// Upper bound on concurrent snapshot fetches; `None` is unbounded.
    pub max_parallel: Option<usize>,
}

impl ResolverOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            max_parallel: None,
        }
    }

    #[must_use]
    pub const fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.max_parallel = max_parallel;
        self
    }
}

/// Resolves dependency trees against a metadata source and a snapshot source.
pub struct TreeResolver<R, F> {
    registry: Arc<R>,
    fetcher: Arc<F>,
    locator: Arc<RepositoryLocator>,
    options: ResolverOptions,
    progress: Option<ProgressBar>,
    on_complete: Option<CompletionHook>,
}

impl<R: MetadataSource, F: SnapshotSource> TreeResolver<R, F> {
    pub fn new(registry: R, fetcher: F, locator: RepositoryLocator, options: ResolverOptions) -> Self {
        Self {
            registry: Arc::new(registry),
            fetcher: Arc::new(fetcher),
            locator: Arc::new(locator),
            options,
            progress: None,
            on_complete: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Registers a hook run once per resolution, at completion.
    #[must_use]
    pub fn on_complete(mut self, hook: impl Fn(&DependencyTree) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(hook));
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolves `dependencies` (name → range) and everything they pull in.
    ///
    /// Package-level failures never make this fail; they end up as `Failed`
    /// nodes in the returned tree.
    ///
    /// # Errors
    ///
    /// Only if the completion event can no longer arrive, which indicates a
    /// bug in the resolver rather than a problem with any package.
    pub async fn resolve(&self, dependencies: &BTreeMap<String, String>) -> Result<DependencyTree> {
        let start = Instant::now();
        let (notifier, signal) = completion_channel();

        let run = Arc::new(Run {
            registry: Arc::clone(&self.registry),
            fetcher: Arc::clone(&self.fetcher),
            locator: Arc::clone(&self.locator),
            work_dir: self.options.work_dir.clone(),
            limiter: self.options.max_parallel.map(|n| Semaphore::new(n.max(1))),
            tree: Mutex::new(DependencyTree::new()),
            notifier,
            progress: self.progress.clone(),
            on_complete: self.on_complete.clone(),
        });

        let roots = {
            let mut tree = run.lock_tree();
            let roots = tree.try_insert_all(dependencies, None);
            // Nothing to resolve: complete right away
            run.complete_if_done(&tree);
            roots
        };
        info!("Resolving {} root dependencies", roots.len());

        for name in roots {
            run.spawn_node(name);
        }

        let tree = signal.wait().await.ok_or_else(|| CortexError::Other {
            message: "dependency resolution ended without a completion event".to_string(),
        })?;

        info!(
            "Resolved {} package(s) in {:.2}s: {} done, {} failed",
            tree.len(),
            start.elapsed().as_secs_f64(),
            tree.done().count(),
            tree.failed().count()
        );
        Ok(tree)
    }
}

/// State shared by the tasks of one resolution.
struct Run<R, F> {
    registry: Arc<R>,
    fetcher: Arc<F>,
    locator: Arc<RepositoryLocator>,
    work_dir: PathBuf,
    limiter: Option<Semaphore>,
    tree: Mutex<DependencyTree>,
    notifier: CompletionNotifier<DependencyTree>,
    progress: Option<ProgressBar>,
    on_complete: Option<CompletionHook>,
}

impl<R: MetadataSource, F: SnapshotSource> Run<R, F> {
    fn lock_tree(&self) -> MutexGuard<'_, DependencyTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the task of a freshly inserted node.
    ///
    /// A panic inside the pipeline fails the node instead of leaving it
    /// outstanding forever.
    fn spawn_node(self: &Arc<Self>, name: String) {
        let run = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(run.process(&name)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(ResolveError::Internal {
                    name: name.clone(),
                    reason: "resolution task panicked".to_string(),
                }),
            };
            run.finish(&name, outcome);
        });
    }

    fn advance(&self, name: &str, next: NodeState) -> Result<(), ResolveError> {
        let mut tree = self.lock_tree();
        tree.transition(name, next).map_err(TreeError::into_resolve_error)?;
        self.report_progress(&tree);
        Ok(())
    }

    fn record(&self, name: &str, error: &ResolveError) {
        warn!("{}: {}", name, error);
        self.lock_tree().record(name, Diagnostic::new(name, error));
    }

    /// Runs one node from Pending up to (but not including) Done.
    async fn process(self: &Arc<Self>, name: &str) -> Result<(), ResolveError> {
        self.advance(name, NodeState::Resolving)?;
        check_package_name(name)?;
        let range = {
            let tree = self.lock_tree();
            tree.get(name).map(|n| n.version_range.clone()).unwrap_or_default()
        };

        let metadata = self.registry.fetch_metadata(name).await?;
        let version = select_version(&range, metadata.versions.keys().map(String::as_str))
            .map_err(|e| e.for_package(name))?;
        let version_meta = metadata.versions.get(&version).cloned().unwrap_or_default();
        let url = self.locator.locate(&version_meta, &metadata).map_err(|_| {
            ResolveError::RepositoryNotFound {
                name: name.to_string(),
            }
        })?;
        debug!("{}: '{}' resolved to {} at {}", name, range, version, url);

        let request = FetchRequest {
            name: name.to_string(),
            url: url.clone(),
            commit: version_meta.git_head.clone(),
            destination: snapshot_dir(&self.work_dir, name),
        };

        {
            let mut tree = self.lock_tree();
            if let Some(node) = tree.node_mut(name) {
                node.resolved_version = Some(version);
                node.commit_id = version_meta.git_head.clone();
                node.repository_url = Some(url);
                node.entry_point = version_meta.main.clone();
                node.snapshot_path = Some(request.destination.clone());
            }
            tree.transition(name, NodeState::Fetching).map_err(TreeError::into_resolve_error)?;
            self.report_progress(&tree);
        }

        let outcome = {
            let _permit = match &self.limiter {
                Some(limiter) => Some(limiter.acquire().await.map_err(|e| ResolveError::Internal {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?),
                None => None,
            };
            self.fetcher.fetch(&request).await?
        };

        if let FetchOutcome::Approximate(soft) = outcome {
            self.record(name, &soft);
            if let Some(node) = self.lock_tree().node_mut(name) {
                node.approximate = true;
            }
        }

        self.advance(name, NodeState::Discovering)?;
        let (manifest, problem) = read_dependencies(name, &request.destination).await;
        if let Some(problem) = problem {
            self.record(name, &problem);
        }

        let children = {
            let mut tree = self.lock_tree();
            if let Some(node) = tree.node_mut(name) {
                if node.entry_point.is_none() {
                    node.entry_point = manifest.main.clone();
                }
            }
            let children = tree.try_insert_all(&manifest.dependencies, Some(name));
            self.report_progress(&tree);
            children
        };

        let skipped = manifest.dependencies.len() - children.len();
        debug!("{}: {} new dependencies, {} already known", name, children.len(), skipped);
        for child in children {
            self.spawn_node(child);
        }
        Ok(())
    }

    /// Moves a node to its terminal state and checks for completion.
    fn finish(&self, name: &str, outcome: Result<(), ResolveError>) {
        let mut tree = self.lock_tree();
        let next = match outcome {
            Ok(()) => NodeState::Done,
            Err(err) => {
                error!("{}: {}", name, err);
                tree.record(name, Diagnostic::new(name, &err));
                NodeState::Failed
            }
        };

        if let Err(e) = tree.transition(name, next) {
            error!("{}", e);
        }
        self.report_progress(&tree);
        self.complete_if_done(&tree);
    }

    /// Fires the completion event if no node is outstanding. Must be called
    /// with the tree lock held so the check cannot interleave with an insert.
    fn complete_if_done(&self, tree: &DependencyTree) {
        if !tree.is_complete() || self.notifier.has_fired() {
            return;
        }
        if let Some(hook) = &self.on_complete {
            hook(tree);
        }
        self.notifier.notify(tree.clone());
    }

    fn report_progress(&self, tree: &DependencyTree) {
        if let Some(progress) = &self.progress {
            let settled = tree.len() - tree.outstanding();
            progress.set_message(format!("{settled}/{} packages resolved", tree.len()));
        }
    }
}

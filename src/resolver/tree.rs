//! The shared dependency tree.
//!
//! One [`DependencyNode`] per package name. Insertion doubles as
//! deduplication: a name that is already present is never inserted (and so
//! never resolved) again, whatever range the later requester asked for.
//!
//! The tree also counts *outstanding* nodes, those not yet in a terminal
//! state. The count goes up on insert and down on the transition into
//! `Done`/`Failed`, so "complete" is simply `outstanding == 0`. The caller
//! holds a single lock around the tree, which makes insert, transition and
//! the completion check one atomic step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::{DiagnosticKind, ResolveError};

/// Lifecycle of a node. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeState {
    Pending,
    Resolving,
    Fetching,
    Discovering,
    Done,
    Failed,
}

impl NodeState {
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Resolving => 1,
            Self::Fetching => 2,
            Self::Discovering => 3,
            Self::Done | Self::Failed => 4,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// A non-terminal state may advance to any later state, skipping is
    /// allowed (any state may fail directly).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Discovering => "discovering",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A recorded soft or hard failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub package: String,
    pub kind: DiagnosticKind,
    pub message: String,
    pub soft: bool,
}

impl Diagnostic {
    /// Builds a diagnostic attributed to `package`.
    #[must_use]
    pub fn new(package: &str, error: &ResolveError) -> Self {
        Self {
            package: package.to_string(),
            kind: error.kind(),
            message: error.to_string(),
            soft: error.is_soft(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Resolution record of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub name: String,
    /// Range declared by the first requester.
    pub version_range: String,
    pub resolved_version: Option<String>,
    pub commit_id: Option<String>,
    pub repository_url: Option<String>,
    /// Main module, relative to the snapshot root.
    pub entry_point: Option<String>,
    /// The parent that first declared this node; `None` for root dependencies.
    pub requested_by: Option<String>,
    pub snapshot_path: Option<PathBuf>,
    /// The snapshot is the default branch rather than the pinned commit.
    pub approximate: bool,
    pub diagnostics: Vec<Diagnostic>,
    state: NodeState,
}

impl DependencyNode {
    fn new(name: &str, version_range: &str, requested_by: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            version_range: version_range.to_string(),
            resolved_version: None,
            commit_id: None,
            repository_url: None,
            entry_point: None,
            requested_by: requested_by.map(str::to_string),
            snapshot_path: None,
            approximate: false,
            diagnostics: Vec::new(),
            state: NodeState::Pending,
        }
    }

    #[must_use]
    pub const fn state(&self) -> NodeState {
        self.state
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("package '{name}' is not in the dependency tree")]
    UnknownNode { name: String },

    #[error("package '{name}' cannot move from {from} to {to}")]
    InvalidTransition { name: String, from: NodeState, to: NodeState },
}

impl TreeError {
    #[must_use]
    pub fn into_resolve_error(self) -> ResolveError {
        let name = match &self {
            Self::UnknownNode {
                name,
            }
            | Self::InvalidTransition {
                name, ..
            } => name.clone(),
        };
        ResolveError::Internal {
            name,
            reason: self.to_string(),
        }
    }
}

/// All discovered packages keyed by name.
#[derive(Debug, Clone, Default)]
pub struct DependencyTree {
    nodes: BTreeMap<String, DependencyNode>,
    outstanding: usize,
}

impl DependencyTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a Pending node unless `name` is already known.
    ///
    /// Returns `true` when the node was created; the caller then owns
    /// starting its resolution.
    pub fn try_insert(&mut self, name: &str, version_range: &str, requested_by: Option<&str>) -> bool {
        if self.nodes.contains_key(name) {
            return false;
        }
        self.nodes.insert(name.to_string(), DependencyNode::new(name, version_range, requested_by));
        self.outstanding += 1;
        true
    }

    /// Inserts every unknown name from `dependencies` in one step and returns
    /// the names that were created, in iteration order.
    pub fn try_insert_all<I, K, V>(&mut self, dependencies: I, requested_by: Option<&str>) -> Vec<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        dependencies
            .into_iter()
            .filter(|(name, range)| self.try_insert(name.as_ref(), range.as_ref(), requested_by))
            .map(|(name, _)| name.as_ref().to_string())
            .collect()
    }

    /// Moves `name` to `next`, returning the previous state.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidTransition`] when the move would regress or leave
    /// a terminal state; the node is left unchanged.
    pub fn transition(&mut self, name: &str, next: NodeState) -> Result<NodeState, TreeError> {
        let node = self.nodes.get_mut(name).ok_or_else(|| TreeError::UnknownNode {
            name: name.to_string(),
        })?;

        let previous = node.state;
        if !previous.can_transition_to(next) {
            return Err(TreeError::InvalidTransition {
                name: name.to_string(),
                from: previous,
                to: next,
            });
        }

        node.state = next;
        if next.is_terminal() {
            self.outstanding -= 1;
        }
        Ok(previous)
    }

    /// Appends a diagnostic to a node; unknown names are ignored.
    pub fn record(&mut self, name: &str, diagnostic: Diagnostic) {
        if let Some(node) = self.nodes.get_mut(name) {
            node.diagnostics.push(diagnostic);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DependencyNode> {
        self.nodes.get(name)
    }

    /// Mutable access to a node's data. The state can only be changed through
    /// [`DependencyTree::transition`].
    pub fn node_mut(&mut self, name: &str) -> Option<&mut DependencyNode> {
        self.nodes.get_mut(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes not yet Done or Failed.
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// True iff every node is terminal.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.outstanding == 0
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values()
    }

    pub fn done(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values().filter(|n| n.state == NodeState::Done)
    }

    pub fn failed(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values().filter(|n| n.state == NodeState::Failed)
    }

    /// Every diagnostic in the tree, grouped by package name.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.nodes.values().flat_map(|n| n.diagnostics.iter())
    }
}

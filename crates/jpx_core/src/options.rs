//! Result post-processing and branch execution settings

use crate::node::Node;
use std::collections::HashSet;

/// How the branches of a multi-branch bracket are evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One branch after the other, on the calling thread
    #[default]
    Sequential,
    /// Branches run concurrently on the rayon thread pool
    Parallel,
}

/// Options applied around a single query
///
/// ```
/// use jpx_core::{ExecutionMode, QueryOptions};
///
/// let options = QueryOptions::new().with_sort(true).with_no_duplicates(true);
/// assert_eq!(options.mode, ExecutionMode::Sequential);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Keep only the first node for each distinct path
    pub no_duplicates: bool,
    /// Order nodes by path instead of traversal order
    pub sort: bool,
    pub mode: ExecutionMode,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_no_duplicates(mut self, no_duplicates: bool) -> Self {
        self.no_duplicates = no_duplicates;
        self
    }

    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `with_mode(ExecutionMode::Parallel)`
    pub fn parallel(self) -> Self {
        self.with_mode(ExecutionMode::Parallel)
    }

    /// Sort first, then drop duplicates, so a sorted result stays sorted
    pub fn apply<'a>(&self, mut nodes: Vec<Node<'a>>) -> Vec<Node<'a>> {
        if self.sort {
            sort_by_path(&mut nodes);
        }
        if self.no_duplicates {
            nodes = dedup_by_path(nodes);
        }
        nodes
    }
}

/// Keep the first node for each path, preserving order
pub fn dedup_by_path(nodes: Vec<Node<'_>>) -> Vec<Node<'_>> {
    let mut seen = HashSet::with_capacity(nodes.len());
    let before = nodes.len();
    let kept: Vec<_> = nodes
        .into_iter()
        .filter(|node| seen.insert(node.path.clone()))
        .collect();
    log::trace!("dropped {} duplicate node(s)", before - kept.len());
    kept
}

/// Stable sort by normalized path
pub fn sort_by_path(nodes: &mut [Node<'_>]) {
    nodes.sort_by(|a, b| a.path.cmp(&b.path));
}

//! Memo of nodes proven to hold constant values.
use std::collections::HashSet;

use log::debug;

use crate::{
    differentiability::traversal::upward_bfs,
    graph::{NodeGraph, NodeId},
};

/// Set of node ids proven constant-valued during one top-level call.
///
/// Append-only. A fresh cache should be created per analysis; reusing one
/// across calls is only sound while no observation in the graph changes.
#[derive(Debug, Clone, Default)]
pub struct ConstantCache {
    known: HashSet<NodeId>,
}

impl ConstantCache {
    pub fn new() -> Self {
        Self { known: HashSet::new() }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.known.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Constant without any traversal: a literal, an observation, or a
    /// previously proven node.
    pub fn is_known_constant<G: NodeGraph + ?Sized>(&self, graph: &G, id: NodeId) -> bool {
        graph.is_constant_literal(id) || graph.is_observed(id) || self.contains(id)
    }

    /// Record `id` as constant. Returns `false` if it was already known.
    ///
    /// The caller vouches for the proof, typically by having checked every
    /// parent with [`Self::is_known_constant`] in topological order.
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.known.insert(id)
    }

    fn absorb(&mut self, proven: HashSet<NodeId>) {
        let before = self.known.len();
        self.known.extend(proven);
        debug!("constant cache grew from {} to {} nodes", before, self.known.len());
    }
}

/// Decide whether `id` holds a value that cannot change given the current
/// observations.
///
/// Known constants answer immediately. Otherwise an upward walk from `id`
/// expands through every node not yet known constant and fails on the first
/// unobserved random variable. On success every visited node is recorded in
/// `cache`, not just `id`.
pub fn is_provably_constant<G: NodeGraph + ?Sized>(
    graph: &G, id: NodeId, cache: &mut ConstantCache,
) -> bool {
    if cache.is_known_constant(graph, id) {
        return true;
    }

    let outcome = {
        let known: &ConstantCache = cache;
        upward_bfs(
            graph,
            [id],
            |n| graph.is_unobserved_random_variable(n),
            |n| !known.is_known_constant(graph, n),
        )
    };

    match outcome {
        Ok(visited) => {
            cache.absorb(visited);
            true
        }
        Err(latent) => {
            debug!("node {id} is not constant: latent ancestor {latent}");
            false
        }
    }
}

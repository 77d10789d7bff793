//! differentiability::checker — can a gradient be taken w.r.t. the latents?
//!
//! Purpose
//! -------
//! Decide whether the derivative of a set of target nodes with respect to
//! every unobserved random variable upstream of them exists. The answer is
//! purely structural: it depends on node kinds, observation flags, and the
//! per-node local differentiability flag.
//!
//! Key behaviors
//! -------------
//! - Random-variable targets must be real valued or observed.
//! - Starting from the targets' parents, walk upward. Random variables are
//!   visited but never expanded, so the walk stops at the latent boundary.
//! - Each visited node must be locally differentiable or provably constant.
//!
//! Invariants & assumptions
//! ------------------------
//! - One [`ConstantCache`] is shared by every constant check within a call and
//!   dropped at the end of it.
//! - Never errors: structural problems become a `false` answer, with the
//!   offending node reported by [`check_differentiable_wrt_latents`].
use log::debug;

use crate::{
    differentiability::{
        cache::{ConstantCache, is_provably_constant},
        traversal::upward_bfs,
    },
    graph::{NodeGraph, NodeId},
};

/// Outcome of a differentiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Differentiability {
    Differentiable,
    /// A random-variable target is latent and not real valued.
    DiscreteLatentTarget(NodeId),
    /// A node on the path to the latents is neither differentiable nor constant.
    NonDifferentiablePath(NodeId),
}

impl Differentiability {
    pub fn is_differentiable(&self) -> bool {
        matches!(self, Differentiability::Differentiable)
    }
}

/// Classify the targets, reporting the first node that blocks a gradient.
///
/// An empty target set is trivially differentiable.
pub fn check_differentiable_wrt_latents<G: NodeGraph + ?Sized>(
    graph: &G, targets: &[NodeId],
) -> Differentiability {
    if let Some(&discrete) = targets.iter().find(|&&t| {
        graph.is_random_variable(t) && !graph.is_real_valued(t) && !graph.is_observed(t)
    }) {
        debug!("target {discrete} is a latent discrete random variable");
        return Differentiability::DiscreteLatentTarget(discrete);
    }

    let frontier: Vec<NodeId> =
        targets.iter().flat_map(|&t| graph.parents(t).iter().copied()).collect();

    let mut cache = ConstantCache::new();
    let outcome = upward_bfs(
        graph,
        frontier,
        |n| !graph.is_locally_differentiable(n) && !is_provably_constant(graph, n, &mut cache),
        |n| !graph.is_random_variable(n),
    );

    match outcome {
        Ok(visited) => {
            debug!(
                "{} targets differentiable after visiting {} nodes",
                targets.len(),
                visited.len()
            );
            Differentiability::Differentiable
        }
        Err(blocker) => {
            debug!("non-differentiable, non-constant node {blocker} blocks the gradient");
            Differentiability::NonDifferentiablePath(blocker)
        }
    }
}

/// Whether the gradient of `targets` w.r.t. all upstream latents exists.
pub fn is_differentiable_wrt_latents<G: NodeGraph + ?Sized>(
    graph: &G, targets: &[NodeId],
) -> bool {
    check_differentiable_wrt_latents(graph, targets).is_differentiable()
}

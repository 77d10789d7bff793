//! jacobian::accumulate — forward and reverse accumulation over a valued graph.
//!
//! Purpose
//! -------
//! Build the Jacobian of a target with respect to every latent upstream of
//! it by visiting ancestors in topological order and invoking each
//! deterministic node's registered rule.
//!
//! Key behaviors
//! -------------
//! - [`accumulate`] runs forward: unobserved random variables seed
//!   `identity(id, shape)` and each node combines its parents' Jacobians.
//!   One pass serves any number of targets.
//! - [`accumulate_reverse`] runs backward from a single target: the target
//!   seeds `identity(target, shape)` and each node hands its adjoint to its
//!   parents. One pass serves any number of latents, which is the cheaper
//!   direction for a scalar log-density.
//! - Observed random variables and literals contribute the zero derivative.
//!   Deterministic nodes whose parents are all constant are constant too,
//!   and are zero without consulting a rule.
//!
//! Invariants & assumptions
//! ------------------------
//! - Each node is visited once per pass and queried for its parents a fixed
//!   number of times, so a pass is linear in the nodes and edges above the
//!   targets.
//! - Topological order comes from an explicit-stack DFS, so depth is bounded
//!   by heap, not stack.
//! - Constness is decided parents-first along that order and recorded in a
//!   [`ConstantCache`] scoped to the call.
//! - Both directions return the same map: output block shaped like the
//!   target, one entry per latent it depends on.
use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, trace};

use crate::{
    differentiability::ConstantCache,
    graph::{NodeId, NodeKind, ValuedGraph},
    jacobian::{
        errors::{JacobianError, JacobianResult},
        partials::{JacobianMap, TensorMap},
        rules::{DerivativeRule, ReverseContext, RuleContext, RuleRegistry},
    },
};

/// Jacobians of `targets` with respect to their upstream latents.
///
/// # Errors
/// - [`JacobianError::NonDifferentiable`] for a non-constant node on the path
///   whose local derivative is undefined.
/// - [`JacobianError::UnsupportedDerivative`] for a differentiable node with
///   no rule under its transform key.
/// - [`JacobianError::ShapeMismatch`] if a rule returns a map whose output
///   shape is not the node's shape, or any error the rule itself raises.
pub fn accumulate<G: ValuedGraph + ?Sized>(
    graph: &G, registry: &RuleRegistry, targets: &[NodeId],
) -> JacobianResult<BTreeMap<NodeId, JacobianMap>> {
    let order = topological_order(graph, targets);
    let cache = constant_nodes(graph, &order);
    debug!("accumulating Jacobians over {} nodes for {} targets", order.len(), targets.len());

    let mut memo: HashMap<NodeId, JacobianMap> = HashMap::with_capacity(order.len());
    for id in order {
        let jacobian = differentiate_node(graph, registry, id, &memo, &cache)?;
        memo.insert(id, jacobian);
    }

    Ok(targets.iter().filter_map(|&t| memo.get(&t).map(|j| (t, j.clone()))).collect())
}

/// Jacobian of `target` with respect to its upstream latents, accumulated
/// from the target back to the latents.
///
/// Produces the same map as `accumulate(graph, registry, &[target])[&target]`.
///
/// # Errors
/// - [`JacobianError::NonDifferentiable`] and
///   [`JacobianError::UnsupportedDerivative`] as for [`accumulate`].
/// - [`JacobianError::UnsupportedReverse`] for a rule with no reverse form.
/// - [`JacobianError::RuleArity`] if a reverse rule returns the wrong number
///   of contributions, and [`JacobianError::ShapeMismatch`] if one does not
///   match its parent's shape.
pub fn accumulate_reverse<G: ValuedGraph + ?Sized>(
    graph: &G, registry: &RuleRegistry, target: NodeId,
) -> JacobianResult<JacobianMap> {
    let order = topological_order(graph, &[target]);
    let cache = constant_nodes(graph, &order);
    let target_shape = graph.shape(target);
    debug!("reverse accumulation over {} nodes from target {target}", order.len());

    let mut adjoints: HashMap<NodeId, JacobianMap> = HashMap::with_capacity(order.len());
    adjoints.insert(target, JacobianMap::identity(target, target_shape));
    let mut latents = TensorMap::new();

    for &id in order.iter().rev() {
        let Some(adjoint) = adjoints.remove(&id) else {
            continue;
        };
        match graph.kind(id) {
            NodeKind::RandomVariable if !graph.is_observed(id) => {
                if let Some(t) = adjoint.with_respect_to(target) {
                    latents.insert(id, t.clone());
                }
                continue;
            }
            NodeKind::RandomVariable | NodeKind::ConstantLiteral => continue,
            NodeKind::Deterministic if cache.contains(id) => continue,
            NodeKind::Deterministic => {}
        }

        let (rule, transform) = rule_for(graph, registry, id)?;
        let parents = graph.parents(id);
        let ctx = ReverseContext {
            node: id,
            transform,
            output_shape: graph.shape(id),
            output_value: graph.value(id),
            parent_values: parents.iter().map(|&p| graph.value(p)).collect(),
            adjoint: &adjoint,
        };
        trace!("reversing rule '{transform}' at node {id}");
        let contributions = rule.reverse(&ctx)?;
        if contributions.len() != parents.len() {
            return Err(JacobianError::RuleArity {
                transform: transform.to_string(),
                expected: parents.len(),
                found: contributions.len(),
            });
        }

        for (&parent, contribution) in parents.iter().zip(contributions) {
            if contribution.is_empty() || cache.is_known_constant(graph, parent) {
                continue;
            }
            if contribution.source_shape(target) != Some(graph.shape(parent)) {
                return Err(JacobianError::ShapeMismatch {
                    context: "reverse rule output",
                    expected: graph.shape(parent).to_vec(),
                    found: contribution.source_shape(target).map(<[usize]>::to_vec).unwrap_or_default(),
                });
            }
            let merged = match adjoints.remove(&parent) {
                Some(previous) => JacobianMap::add(&previous, &contribution, target_shape)?,
                None => contribution,
            };
            adjoints.insert(parent, merged);
        }
    }

    JacobianMap::from_partials(target_shape, latents)
}

/// Jacobian of a single node given the memoized Jacobians of its parents.
fn differentiate_node<G: ValuedGraph + ?Sized>(
    graph: &G, registry: &RuleRegistry, id: NodeId, memo: &HashMap<NodeId, JacobianMap>,
    cache: &ConstantCache,
) -> JacobianResult<JacobianMap> {
    let shape = graph.shape(id);
    match graph.kind(id) {
        NodeKind::RandomVariable if !graph.is_observed(id) => {
            return Ok(JacobianMap::identity(id, shape));
        }
        NodeKind::RandomVariable | NodeKind::ConstantLiteral => {
            return Ok(JacobianMap::constant(shape));
        }
        NodeKind::Deterministic if cache.contains(id) => {
            trace!("node {id} is constant; zero derivative");
            return Ok(JacobianMap::constant(shape));
        }
        NodeKind::Deterministic => {}
    }

    let (rule, transform) = rule_for(graph, registry, id)?;
    let parents = graph.parents(id);
    let ctx = RuleContext {
        node: id,
        transform,
        output_shape: shape,
        output_value: graph.value(id),
        parent_values: parents.iter().map(|&p| graph.value(p)).collect(),
        parent_partials: parents.iter().filter_map(|p| memo.get(p)).collect(),
    };
    trace!("applying rule '{transform}' at node {id}");
    let jacobian = rule.partials(&ctx)?;

    if jacobian.output_shape() != shape {
        return Err(JacobianError::ShapeMismatch {
            context: "rule output",
            expected: shape.to_vec(),
            found: jacobian.output_shape().to_vec(),
        });
    }
    Ok(jacobian)
}

/// The rule of a non-constant deterministic node, with its transform key.
fn rule_for<'g, 'r, G: ValuedGraph + ?Sized>(
    graph: &'g G, registry: &'r RuleRegistry, id: NodeId,
) -> JacobianResult<(&'r dyn DerivativeRule, &'g str)> {
    if !graph.is_locally_differentiable(id) {
        return Err(JacobianError::NonDifferentiable { node: id });
    }
    let transform = graph.transform(id).unwrap_or_default();
    let rule = registry.get(transform).ok_or_else(|| JacobianError::UnsupportedDerivative {
        node: id,
        transform: transform.to_string(),
    })?;
    Ok((rule, transform))
}

/// Post-order over the ancestors of `targets`, parents before children.
///
/// Random variables and literals are leaves: their Jacobian does not depend
/// on their parents.
fn topological_order<G: ValuedGraph + ?Sized>(graph: &G, targets: &[NodeId]) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut entered: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<(NodeId, bool)> = targets.iter().rev().map(|&t| (t, false)).collect();

    while let Some((id, children_done)) = stack.pop() {
        if children_done {
            order.push(id);
            continue;
        }
        if !entered.insert(id) {
            continue;
        }
        stack.push((id, true));

        if graph.kind(id) == NodeKind::Deterministic {
            for &parent in graph.parents(id).iter().rev() {
                if !entered.contains(&parent) {
                    stack.push((parent, false));
                }
            }
        }
    }

    order
}

/// Deterministic nodes in `order` whose every parent is constant.
///
/// `order` lists parents first, so one sweep settles every node.
fn constant_nodes<G: ValuedGraph + ?Sized>(graph: &G, order: &[NodeId]) -> ConstantCache {
    let mut cache = ConstantCache::new();
    for &id in order {
        if graph.kind(id) == NodeKind::Deterministic
            && graph.parents(id).iter().all(|&p| cache.is_known_constant(graph, p))
        {
            cache.insert(id);
        }
    }
    trace!("{} constant deterministic nodes", cache.len());
    cache
}

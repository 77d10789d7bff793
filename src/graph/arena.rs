//! graph::arena — a minimal in-memory computation graph.
//!
//! Purpose
//! -------
//! Provide a concrete [`ValuedGraph`] for callers that do not bring their own
//! graph machinery, and for tests. Nodes are stored in creation order and a
//! node may only reference nodes created before it, so the arena is a DAG by
//! construction.
//!
//! Key behaviors
//! -------------
//! - Builders for random variables, deterministic transforms, and constant
//!   literals, each validating parent ids.
//! - `observe` / `unobserve` / `set_value` mutate values between calls, with
//!   shape checks against the declared node shape.
//!
//! Conventions
//! -----------
//! - A node's declared shape is the shape of the value it was created with.
//! - Random variables are locally differentiable iff they are real valued.
//! - Deterministic nodes name their derivative rule with a transform key
//!   (e.g. `"multiply"`); see [`RuleRegistry`](crate::jacobian::RuleRegistry).
use crate::graph::{
    errors::{GraphError, GraphResult},
    node::{NodeGraph, NodeId, NodeKind, Tensor, ValuedGraph},
};

#[derive(Debug, Clone)]
struct NodeRecord {
    kind: NodeKind,
    observed: bool,
    real_valued: bool,
    differentiable: bool,
    shape: Vec<usize>,
    parents: Vec<NodeId>,
    value: Tensor,
    transform: Option<String>,
}

/// Append-only store of graph nodes in topological order.
#[derive(Debug, Clone, Default)]
pub struct GraphArena {
    nodes: Vec<NodeRecord>,
}

impl GraphArena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of every node, in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Add a random variable whose distribution is parameterized by `parents`.
    ///
    /// Discrete variables (`real_valued == false`) have no local derivative.
    ///
    /// # Errors
    /// - [`GraphError::UnknownParent`] if any parent id is not in the arena.
    pub fn add_random_variable(
        &mut self, value: Tensor, parents: &[NodeId], real_valued: bool,
    ) -> GraphResult<NodeId> {
        self.push(NodeRecord {
            kind: NodeKind::RandomVariable,
            observed: false,
            real_valued,
            differentiable: real_valued,
            shape: value.shape().to_vec(),
            parents: parents.to_vec(),
            value,
            transform: None,
        })
    }

    /// Add a deterministic node computed by `transform` from `parents`.
    ///
    /// `value` is the transform's current output; the arena does not evaluate
    /// transforms itself.
    ///
    /// # Errors
    /// - [`GraphError::UnknownParent`] if any parent id is not in the arena.
    pub fn add_deterministic(
        &mut self, transform: &str, value: Tensor, parents: &[NodeId], differentiable: bool,
    ) -> GraphResult<NodeId> {
        self.push(NodeRecord {
            kind: NodeKind::Deterministic,
            observed: false,
            real_valued: true,
            differentiable,
            shape: value.shape().to_vec(),
            parents: parents.to_vec(),
            value,
            transform: Some(transform.to_string()),
        })
    }

    /// Add a constant literal. Constants have no parents and never fail.
    pub fn add_constant(&mut self, value: Tensor) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeRecord {
            kind: NodeKind::ConstantLiteral,
            observed: false,
            real_valued: true,
            differentiable: true,
            shape: value.shape().to_vec(),
            parents: Vec::new(),
            value,
            transform: None,
        });
        id
    }

    /// Fix a random variable to an observed value.
    ///
    /// # Errors
    /// - [`GraphError::UnknownNode`] for an id outside the arena.
    /// - [`GraphError::NotRandomVariable`] if `id` is not a random variable.
    /// - [`GraphError::ShapeMismatch`] if `value` has the wrong shape.
    pub fn observe(&mut self, id: NodeId, value: Tensor) -> GraphResult<()> {
        let record = self.record_mut(id)?;
        if record.kind != NodeKind::RandomVariable {
            return Err(GraphError::NotRandomVariable { node: id });
        }
        check_shape(id, &record.shape, &value)?;
        record.value = value;
        record.observed = true;
        Ok(())
    }

    /// Release an observation; the variable becomes latent again.
    pub fn unobserve(&mut self, id: NodeId) -> GraphResult<()> {
        let record = self.record_mut(id)?;
        if record.kind != NodeKind::RandomVariable {
            return Err(GraphError::NotRandomVariable { node: id });
        }
        record.observed = false;
        Ok(())
    }

    /// Replace a node's current value, keeping its declared shape.
    pub fn set_value(&mut self, id: NodeId, value: Tensor) -> GraphResult<()> {
        let record = self.record_mut(id)?;
        check_shape(id, &record.shape, &value)?;
        record.value = value;
        Ok(())
    }

    // ---- Helper methods ----

    fn push(&mut self, record: NodeRecord) -> GraphResult<NodeId> {
        let len = self.nodes.len();
        if let Some(&parent) = record.parents.iter().find(|p| p.0 >= len) {
            return Err(GraphError::UnknownParent { parent, len });
        }
        self.nodes.push(record);
        Ok(NodeId(len))
    }

    fn record_mut(&mut self, id: NodeId) -> GraphResult<&mut NodeRecord> {
        self.nodes.get_mut(id.0).ok_or(GraphError::UnknownNode { node: id })
    }
}

fn check_shape(id: NodeId, expected: &[usize], value: &Tensor) -> GraphResult<()> {
    if value.shape() != expected {
        return Err(GraphError::ShapeMismatch {
            node: id,
            expected: expected.to_vec(),
            found: value.shape().to_vec(),
        });
    }
    Ok(())
}

impl NodeGraph for GraphArena {
    fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].parents
    }

    fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    fn is_observed(&self, id: NodeId) -> bool {
        self.nodes[id.0].observed
    }

    fn is_real_valued(&self, id: NodeId) -> bool {
        self.nodes[id.0].real_valued
    }

    fn is_locally_differentiable(&self, id: NodeId) -> bool {
        self.nodes[id.0].differentiable
    }

    fn shape(&self, id: NodeId) -> &[usize] {
        &self.nodes[id.0].shape
    }
}

impl ValuedGraph for GraphArena {
    fn value(&self, id: NodeId) -> &Tensor {
        &self.nodes[id.0].value
    }

    fn transform(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].transform.as_deref()
    }
}

//! graph::node — node identity, node kinds, and the read-only graph capability.
//!
//! Purpose
//! -------
//! Define the narrow surface through which the differentiation core looks at
//! a probabilistic computation graph. The core never owns nodes and never
//! classifies a node's transform on its own; it only asks the questions in
//! [`NodeGraph`] and, when derivatives are accumulated, reads current values
//! through [`ValuedGraph`].
//!
//! Key behaviors
//! -------------
//! - [`NodeId`] is a stable, `Copy` handle; ordering follows creation order in
//!   [`GraphArena`](crate::graph::GraphArena) and makes sparse maps iterate
//!   deterministically.
//! - [`NodeKind`] is a closed tagged variant over random variables,
//!   deterministic transforms, and constant literals.
//! - [`NodeGraph`] exposes parents (ordered), kind, flags, and shape.
//! - [`ValuedGraph`] adds the current tensor value and the transform key used
//!   to look up a node's derivative rule.
//!
//! Invariants & assumptions
//! ------------------------
//! - Parent edges point from child to parent and never form a cycle.
//! - `value(id).shape() == shape(id)` for every node.
//! - Values are stable for the duration of one analysis or gradient call;
//!   implementations hand out shared borrows so mutation mid-call cannot
//!   compile.
//! - Every `NodeId` passed in must have been issued by the same graph; an
//!   unknown id is a caller contract violation.
use std::fmt;

use ndarray::ArrayD;

/// Dense tensor of `f64` values with a runtime rank.
pub type Tensor = ArrayD<f64>;

/// Boolean tensor used as a branch selector.
pub type Mask = ArrayD<bool>;

/// Stable identifier of a node in a computation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Closed classification of graph nodes.
///
/// - `RandomVariable`: a stochastic node; a latent when unobserved.
/// - `Deterministic`: a transform of its parents.
/// - `ConstantLiteral`: a fixed value with no parents of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    RandomVariable,
    Deterministic,
    ConstantLiteral,
}

/// Read-only structural view of a computation graph.
pub trait NodeGraph {
    /// Parents of `id`, in operand order.
    fn parents(&self, id: NodeId) -> &[NodeId];

    fn kind(&self, id: NodeId) -> NodeKind;

    fn is_observed(&self, id: NodeId) -> bool;

    /// `true` when the node takes continuous (real) values.
    fn is_real_valued(&self, id: NodeId) -> bool;

    /// `true` when the node's own transform has a local derivative.
    ///
    /// Supplied per node by the graph; the core never second-guesses it.
    fn is_locally_differentiable(&self, id: NodeId) -> bool;

    fn shape(&self, id: NodeId) -> &[usize];

    fn is_random_variable(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::RandomVariable
    }

    fn is_constant_literal(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::ConstantLiteral
    }

    /// An unobserved random variable is a latent: its value can move.
    fn is_unobserved_random_variable(&self, id: NodeId) -> bool {
        self.is_random_variable(id) && !self.is_observed(id)
    }
}

/// A [`NodeGraph`] whose nodes also carry current values.
pub trait ValuedGraph: NodeGraph {
    fn value(&self, id: NodeId) -> &Tensor;

    /// Registration key of the node's derivative rule, if it has one.
    fn transform(&self, id: NodeId) -> Option<&str>;
}

//! Errors raised by the Jacobian algebra and the accumulation driver.
//!
//! Shape and axis errors are contract violations by the caller (usually a
//! derivative rule); nothing here is transient or retried.
use crate::graph::NodeId;

/// Result alias for Jacobian operations.
pub type JacobianResult<T> = Result<T, JacobianError>;

#[derive(Debug, Clone, PartialEq)]
pub enum JacobianError {
    // ---- Shapes ----
    /// Operand shapes violate the output/source layout or broadcasting rules.
    ShapeMismatch { context: &'static str, expected: Vec<usize>, found: Vec<usize> },

    /// An axis index is not below the rank it addresses.
    AxisOutOfRange { axis: usize, rank: usize },

    /// A permutation is not a rearrangement of `0..rank`.
    InvalidPermutation { order: Vec<usize>, rank: usize },

    // ---- Graph ----
    /// The node claims to be differentiable but no rule is registered for it.
    UnsupportedDerivative { node: NodeId, transform: String },

    /// The node's rule has no reverse form, so adjoints cannot pass through it.
    UnsupportedReverse { node: NodeId, transform: String },

    /// A non-constant node on the gradient path has no local derivative.
    NonDifferentiable { node: NodeId },

    /// A rule was invoked with the wrong number of parents.
    RuleArity { transform: String, expected: usize, found: usize },
}

impl std::error::Error for JacobianError {}

impl std::fmt::Display for JacobianError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Shapes ----
            JacobianError::ShapeMismatch { context, expected, found } => {
                write!(f, "Shape mismatch in {context}: expected {expected:?}, found {found:?}")
            }
            JacobianError::AxisOutOfRange { axis, rank } => {
                write!(f, "Axis {axis} out of range for output rank {rank}")
            }
            JacobianError::InvalidPermutation { order, rank } => {
                write!(f, "Invalid permutation {order:?} for rank {rank}")
            }

            // ---- Graph ----
            JacobianError::UnsupportedDerivative { node, transform } => {
                write!(f, "No derivative rule registered for '{transform}' at node {node}")
            }
            JacobianError::UnsupportedReverse { node, transform } => {
                write!(f, "Rule '{transform}' at node {node} has no reverse form")
            }
            JacobianError::NonDifferentiable { node } => {
                write!(f, "Node {node} is not differentiable and not constant")
            }
            JacobianError::RuleArity { transform, expected, found } => {
                write!(f, "Rule '{transform}' expects {expected} parents, found {found}")
            }
        }
    }
}

//! Errors raised while building or mutating a [`GraphArena`](crate::graph::GraphArena).
//!
//! The analysis and algebra layers never produce these; they only arise when
//! a caller wires nodes together or replaces values.
use crate::graph::node::NodeId;

/// Result alias for graph construction and mutation.
pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    // ---- Structure ----
    /// A parent id does not refer to an existing node.
    UnknownParent { parent: NodeId, len: usize },

    /// An id passed to a mutator does not refer to an existing node.
    UnknownNode { node: NodeId },

    // ---- Values ----
    /// A supplied value does not have the node's declared shape.
    ShapeMismatch { node: NodeId, expected: Vec<usize>, found: Vec<usize> },

    /// Only random variables can be observed.
    NotRandomVariable { node: NodeId },
}

impl std::error::Error for GraphError {}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Structure ----
            GraphError::UnknownParent { parent, len } => {
                write!(f, "Unknown parent {parent}: graph only has {len} nodes")
            }
            GraphError::UnknownNode { node } => {
                write!(f, "Unknown node {node}")
            }

            // ---- Values ----
            GraphError::ShapeMismatch { node, expected, found } => {
                write!(f, "Value shape mismatch at {node}: expected {expected:?}, found {found:?}")
            }
            GraphError::NotRandomVariable { node } => {
                write!(f, "Node {node} is not a random variable and cannot be observed")
            }
        }
    }
}

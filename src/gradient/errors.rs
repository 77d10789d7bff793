//! Errors raised when moving between sparse per-variable maps and flat
//! vectors.
use crate::graph::NodeId;

/// Result alias for gradient extraction.
pub type GradientResult<T> = Result<T, GradientError>;

#[derive(Debug, Clone, PartialEq)]
pub enum GradientError {
    // ---- Layout ----
    /// Flat vector length differs from the ordering's total element count.
    DimensionMismatch { expected: usize, found: usize },

    /// A map entry's element count differs from its declared shape.
    EntryLengthMismatch { node: NodeId, expected: usize, found: usize },

    // ---- Ordering ----
    /// A variable appears more than once in an ordering.
    DuplicateVariable { node: NodeId },
}

impl std::error::Error for GradientError {}

impl std::fmt::Display for GradientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Layout ----
            GradientError::DimensionMismatch { expected, found } => {
                write!(f, "Dimension mismatch: expected {expected} elements, found {found}")
            }
            GradientError::EntryLengthMismatch { node, expected, found } => {
                write!(f, "Entry for {node} has {found} elements, declared shape holds {expected}")
            }

            // ---- Ordering ----
            GradientError::DuplicateVariable { node } => {
                write!(f, "Variable {node} appears more than once in the ordering")
            }
        }
    }
}

//! graph — the node capability consumed by the differentiation core.
//!
//! Purpose
//! -------
//! Describe the read-only view of a probabilistic computation graph that the
//! analysis and Jacobian layers depend on, and ship a small in-memory
//! implementation ([`GraphArena`]) for callers and tests.
//!
//! Key behaviors
//! -------------
//! - [`NodeGraph`]: parents, kind, observed / real-valued / differentiable
//!   flags, and shape for any node id.
//! - [`ValuedGraph`]: current values and derivative-rule keys on top of that.
//! - [`GraphArena`]: append-only DAG implementing both traits.
//!
//! Conventions
//! -----------
//! - Tensors are `ndarray::ArrayD<f64>` ([`Tensor`]); masks are
//!   `ArrayD<bool>` ([`Mask`]).
//! - Construction mistakes are reported as [`GraphError`]; the traits
//!   themselves are infallible.

pub mod arena;
pub mod errors;
pub mod node;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::arena::GraphArena;
pub use self::errors::{GraphError, GraphResult};
pub use self::node::{Mask, NodeGraph, NodeId, NodeKind, Tensor, ValuedGraph};

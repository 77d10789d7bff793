//! latent_diff — differentiation subsystem for probabilistic computation graphs.
//!
//! Purpose
//! -------
//! Decide whether the gradient of a set of graph nodes with respect to the
//! latent (unobserved, continuous) random variables upstream of them exists,
//! build those gradients as sparse shape-aware Jacobians, and hand them to a
//! numerical optimizer as flat vectors.
//!
//! Key behaviors
//! -------------
//! - `graph`: the [`NodeGraph`](graph::NodeGraph) / [`ValuedGraph`](graph::ValuedGraph)
//!   capabilities the rest of the crate consumes, plus a concrete
//!   [`GraphArena`](graph::GraphArena).
//! - `differentiability`: structural reachability analysis with a shared
//!   constant-proof cache.
//! - `jacobian`: the sparse [`JacobianMap`](jacobian::JacobianMap) algebra,
//!   a per-transform rule registry, and forward accumulation over a graph.
//! - `gradient`: [`flatten`](gradient::flatten) /
//!   [`unflatten`](gradient::unflatten) between per-latent maps and vectors.
//! - `optimization`: an argmin L-BFGS driver over a model's log-density.
//!
//! Invariants & assumptions
//! ------------------------
//! - Graphs are DAGs; every traversal uses an explicit worklist.
//! - A missing Jacobian or gradient entry means an identically zero
//!   derivative.
//! - Everything is synchronous and single-threaded; no global state.
//!
//! Conventions
//! -----------
//! - Jacobian entries are laid out `output_shape ++ source_shape`, row-major.
//! - Flat vectors follow a [`VariableOrdering`](gradient::VariableOrdering).
//! - Each layer has its own error enum; the optimization layer wraps them
//!   into [`OptError`](optimization::errors::OptError).
//!
//! Downstream usage
//! ----------------
//! - Check a graph with
//!   [`is_differentiable_wrt_latents`](differentiability::is_differentiable_wrt_latents),
//!   build Jacobians with [`accumulate`](jacobian::accumulate) (or
//!   [`accumulate_reverse`](jacobian::accumulate_reverse) for one scalar
//!   target), reduce them to
//!   gradients, and fit latents with
//!   [`maximize`](optimization::fitness::maximize).
//! - The crate uses the `log` facade and never installs a logger.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module; stock derivative rules are checked
//!   against central finite differences.
//! - `tests/integration_gradient_pipeline.rs` runs graph → analysis →
//!   accumulation → flatten → `maximize` end to end.

pub mod differentiability;
pub mod gradient;
pub mod graph;
pub mod jacobian;
pub mod optimization;

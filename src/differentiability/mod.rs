//! differentiability — structural reachability analysis for gradients.
//!
//! Purpose
//! -------
//! Answer "can the gradient of these targets with respect to every latent
//! upstream of them be computed?" before any Jacobian is built.
//!
//! Key behaviors
//! -------------
//! - [`is_differentiable_wrt_latents`] / [`check_differentiable_wrt_latents`]
//!   run the outer walk from the targets' parents to the latent boundary.
//! - [`is_provably_constant`] proves a node's value fixed by the current
//!   observations, memoizing everything it visits in a [`ConstantCache`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Worklist traversals only; no recursion.
//! - Linear in the number of nodes and edges reachable from the targets,
//!   amortized over the cache.
//!
//! Downstream usage
//! ----------------
//! - `jacobian::accumulate` reuses [`is_provably_constant`] to assign zero
//!   derivatives to constant deterministic nodes.

pub mod cache;
pub mod checker;
mod traversal;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::cache::{ConstantCache, is_provably_constant};
pub use self::checker::{
    Differentiability, check_differentiable_wrt_latents, is_differentiable_wrt_latents,
};

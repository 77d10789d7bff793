//! jacobian — sparse, shape-aware partial-derivative algebra.
//!
//! Purpose
//! -------
//! Represent `∂(node)/∂(latent)` for every latent a node depends on, compose
//! those Jacobians through deterministic transforms, and drive the
//! composition over a graph.
//!
//! Key behaviors
//! -------------
//! - [`JacobianMap`]: the immutable sparse map, with identity/constant seeds,
//!   output-side structural operators, and the source-side transposes used
//!   by reverse rules (`partials`).
//! - Multiplier-driven operators with an explicit [`BroadcastSide`]
//!   (`combine`) and one-axis matrix contractions (`contraction`).
//! - [`DerivativeRule`] / [`RuleRegistry`]: the per-transform extension point,
//!   with stock rules in `builtin`. A rule's reverse form is optional.
//! - [`accumulate`]: topological forward accumulation over a
//!   [`ValuedGraph`](crate::graph::ValuedGraph); [`accumulate_reverse`]
//!   builds the same map from a single target back to its latents.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every entry has shape `output_shape ++ source_shape`; output axes lead.
//! - An absent source key is an identically zero derivative.
//! - Output-side operators touch only the output block; `*_source`
//!   operators touch only the source block.
//!
//! Conventions
//! -----------
//! - Broadcasting follows numpy rules; anything else is a
//!   [`JacobianError::ShapeMismatch`], never coerced.
//!
//! Testing notes
//! -------------
//! - Stock rules are checked against central finite differences from the
//!   `finitediff` crate.

pub mod accumulate;
pub mod builtin;
pub mod combine;
pub mod contraction;
pub mod errors;
pub mod partials;
pub mod rules;
mod shape;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::accumulate::{accumulate, accumulate_reverse};
pub use self::builtin::Concat;
pub use self::combine::{BroadcastSide, Operand};
pub use self::errors::{JacobianError, JacobianResult};
pub use self::partials::{JacobianMap, TensorMap, tensor_maps_equivalent};
pub use self::rules::{DerivativeRule, FnRule, ReverseContext, RuleContext, RuleRegistry};

//! fitness — argmin-backed fitting of latent values.
//!
//! Purpose
//! -------
//! Turn a model's log-density over its latent variables into an L-BFGS
//! problem over the flat vector laid out by a
//! [`VariableOrdering`](crate::gradient::VariableOrdering), and return a
//! normalized [`OptimOutcome`].
//!
//! Key behaviors
//! -------------
//! - [`LogDensity`] is the only trait a model implements: `log_prob` is
//!   required; the likelihood and analytic gradients are optional.
//! - [`Objective`] selects MAP (`Posterior`) or maximum likelihood
//!   (`Likelihood`).
//! - [`adapter::FitnessAdapter`] minimizes `-objective(θ)`, flattening
//!   per-latent gradient maps and negating them, or finite-differencing the
//!   cost when the model has no gradients.
//! - [`maximize`] builds the solver for the configured line search and runs
//!   it; [`initial_theta`] flattens current values into a start point.
//!
//! Invariants & assumptions
//! ------------------------
//! - `θ` always has `ordering().total_len()` entries; anything else is
//!   rejected before the solver starts.
//! - Gradient maps are sparse: an absent latent contributes zeros.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover sign conventions and the finite
//!   difference fallback ([`adapter`], [`finite_diff`]), solver wiring
//!   ([`builders`]), configuration invariants ([`traits`]), and mode
//!   recovery on quadratic log-densities ([`api`]).
//! - `tests/integration_gradient_pipeline.rs` fits a graph end to end.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::adapter::FitnessAdapter;
pub use self::api::{initial_theta, maximize};
pub use self::traits::{LineSearcher, LogDensity, Objective, OptimOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::api::{initial_theta, maximize};
    pub use super::traits::{LogDensity, Objective, OptimOptions, OptimOutcome, Tolerances};
    pub use super::types::{Grad, Theta};
}

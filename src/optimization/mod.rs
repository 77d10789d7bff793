//! optimization — fitting latent values and the unified error surface.
//!
//! Purpose
//! -------
//! Connect the graph-facing modules to a numerical optimizer. Callers
//! implement [`fitness::LogDensity`] for their model, choose options, and
//! get fitted latent values back without touching argmin directly.
//!
//! Conventions
//! -----------
//! - Solvers maximize an objective by minimizing its negation; all
//!   user-facing values are in objective space.
//! - Every fallible entry point returns [`errors::OptResult`]; graph,
//!   Jacobian and layout errors are wrapped into [`errors::OptError`].
//! - Nothing here installs a logger; `log` records are emitted at `trace`
//!   and `debug` level only.

pub mod errors;
pub mod fitness;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use latent_diff::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::fitness::prelude::*;
}

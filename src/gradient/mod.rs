//! gradient — flat-vector layout for latent variables.
//!
//! Purpose
//! -------
//! Define the canonical order of latent variables in a parameter vector
//! ([`VariableOrdering`]) and convert between per-variable tensor maps and
//! that vector ([`flatten`] / [`unflatten`]). This is the only seam between
//! the graph-shaped sparse representation and dense optimizers.
//!
//! Conventions
//! -----------
//! - Row-major element order within each variable.
//! - A variable absent from a map is a zero block.

pub mod errors;
pub mod extractor;
pub mod ordering;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{GradientError, GradientResult};
pub use self::extractor::{flatten, unflatten};
pub use self::ordering::VariableOrdering;

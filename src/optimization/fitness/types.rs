//! fitness::types — numeric aliases and solver wiring for latent fitting.
//!
//! Purpose
//! -------
//! Keep the flat parameter/gradient types and the pre-wired L-BFGS aliases in
//! one place so the adapter, builders and runner never name `ndarray` or
//! argmin generics directly.
//!
//! Conventions
//! -----------
//! - `Theta` is the flat vector laid out by a
//!   [`VariableOrdering`](crate::gradient::VariableOrdering).
//! - `Cost` is the negated objective; user-facing values are never costs.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::Array1;
use std::collections::HashMap;

/// Flat vector of every latent variable's value.
pub type Theta = Array1<f64>;

/// Flat gradient with the same layout as [`Theta`].
pub type Grad = Array1<f64>;

/// Scalar cost `c(θ) = -objective(θ)` seen by argmin.
pub type Cost = f64;

/// Function-evaluation counters as reported by the solver.
pub type FnEvalMap = HashMap<String, u64>;

/// Default history size (`m`) for L-BFGS runs.
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;

pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;

pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;

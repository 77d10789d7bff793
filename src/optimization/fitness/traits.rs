//! Public API surface for fitting latent values.
//!
//! - [`LogDensity`]: trait a model implements to expose its log-probability
//!   (and optionally its likelihood and gradients) over latent values.
//! - [`Objective`]: which of the two densities to maximize.
//! - [`OptimOptions`] and [`Tolerances`]: configuration for the optimizer.
//! - [`LineSearcher`]: choice of line search used by L-BFGS.
//! - [`OptimOutcome`]: normalized result returned by `maximize`.
//!
//! Convention: we *maximize* the chosen objective by minimizing
//! `c(θ) = -objective(θ)`. Gradients supplied by a model are gradients of the
//! objective; the adapter flips the sign.
use crate::{
    gradient::{VariableOrdering, unflatten},
    jacobian::TensorMap,
    optimization::{
        errors::{OptError, OptResult},
        fitness::{
            types::{FnEvalMap, Grad, Theta},
            validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
        },
    },
};
use argmin::core::TerminationStatus;
use argmin_math::ArgminL2Norm;
use std::str::FromStr;

/// Log-density of a model over its latent variables.
///
/// Values are passed as a [`TensorMap`] keyed by the latent ids of
/// [`ordering`](LogDensity::ordering), each tensor shaped as declared there.
/// Gradient maps follow the same keys; an absent key is a zero gradient.
///
/// Required:
/// - `ordering()`: the latent variables and their flat layout.
/// - `log_prob(values)`: joint log-probability (prior plus likelihood).
///
/// Optional:
/// - `log_likelihood(values)`: likelihood of the observed nodes only.
/// - `log_prob_gradients` / `log_likelihood_gradients`: analytic gradients
///   w.r.t. each latent. When absent, finite differences are used.
/// - `check(values)`: reject an invalid starting point before optimizing.
pub trait LogDensity {
    // Required methods
    fn ordering(&self) -> &VariableOrdering;
    fn log_prob(&self, values: &TensorMap) -> OptResult<f64>;

    // Optional methods
    fn log_likelihood(&self, _values: &TensorMap) -> OptResult<f64> {
        Err(OptError::ObjectiveNotImplemented { objective: Objective::Likelihood.name() })
    }

    fn log_prob_gradients(&self, _values: &TensorMap) -> OptResult<TensorMap> {
        Err(OptError::GradientNotImplemented)
    }

    fn log_likelihood_gradients(&self, _values: &TensorMap) -> OptResult<TensorMap> {
        Err(OptError::GradientNotImplemented)
    }

    fn check(&self, _values: &TensorMap) -> OptResult<()> {
        Ok(())
    }
}

/// Which density the optimizer maximizes.
///
/// - `Posterior`: [`LogDensity::log_prob`] (MAP estimate).
/// - `Likelihood`: [`LogDensity::log_likelihood`] (maximum likelihood).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    #[default]
    Posterior,
    Likelihood,
}

impl Objective {
    pub fn name(self) -> &'static str {
        match self {
            Objective::Posterior => "posterior",
            Objective::Likelihood => "likelihood",
        }
    }

    /// Evaluate this objective on `model` at `values`.
    pub fn value<M: LogDensity + ?Sized>(self, model: &M, values: &TensorMap) -> OptResult<f64> {
        match self {
            Objective::Posterior => model.log_prob(values),
            Objective::Likelihood => model.log_likelihood(values),
        }
    }

    /// Per-latent gradients of this objective on `model` at `values`.
    pub fn gradients<M: LogDensity + ?Sized>(
        self, model: &M, values: &TensorMap,
    ) -> OptResult<TensorMap> {
        match self {
            Objective::Posterior => model.log_prob_gradients(values),
            Objective::Likelihood => model.log_likelihood_gradients(values),
        }
    }
}

/// Choice of line search used inside the L-BFGS solver.
///
/// Parsing is case-insensitive (`"MoreThuente"`, `"hagerzhang"`, ...).
/// Unknown names return `OptError::InvalidLineSearch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Optimizer-level configuration.
///
/// Fields:
/// - `tols: Tolerances`: numerical tolerances and iteration limits.
/// - `line_searcher: LineSearcher`: line-search algorithm used by L-BFGS.
/// - `verbose: bool`: if `true`, attaches an observer (behind the `obs_slog`
///   feature) and prints the starting objective.
/// - `lbfgs_mem: Option<usize>`: L-BFGS history size; `None` uses
///   [`DEFAULT_LBFGS_MEM`](crate::optimization::fitness::DEFAULT_LBFGS_MEM).
///
/// Default:
/// - `tols`: `tol_grad = 1e-6`, `tol_cost = None`, `max_iter = 300`
/// - `line_searcher`: `MoreThuente`
/// - `verbose`: `false`
/// - `lbfgs_mem`: `None`
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl OptimOptions {
    /// Create a new set of optimizer options.
    ///
    /// # Errors
    /// - [`OptError::InvalidLBFGSMem`] if `lbfgs_mem == Some(0)`.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if lbfgs_mem == Some(0) {
            return Err(OptError::InvalidLBFGSMem {
                mem: 0,
                reason: "L-BFGS memory must be greater than zero.",
            });
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for OptimOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances { tol_grad: Some(1e-6), tol_cost: None, max_iter: Some(300) },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Numerical tolerances and iteration limits used by the optimizer.
///
/// - `tol_grad`: terminate when the gradient norm falls below this threshold.
/// - `tol_cost`: terminate when the change in cost falls below this threshold.
/// - `max_iter`: hard cap on the number of iterations.
///
/// At least one of the three must be provided (see [`Tolerances::new`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for
    ///   non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_tol_grad(tol_grad)?;
        if max_iter == Some(0) {
            return Err(OptError::InvalidMaxIter {
                max_iter: 0,
                reason: "Maximum iterations must be greater than zero.",
            });
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

/// Canonical result returned by `maximize`.
///
/// - `theta_hat`: best flat parameter vector found.
/// - `value`: best **objective** value (not the cost).
/// - `converged`: `true` if the solver reported a terminating status.
/// - `status`: human-readable termination status.
/// - `iterations`: number of optimizer iterations performed.
/// - `fn_evals`: argmin's counters, e.g. `cost_count`, `gradient_count`.
/// - `grad_norm`: norm of the last available gradient, if present.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Build a validated [`OptimOutcome`] from raw solver state.
    ///
    /// # Errors
    /// - Propagates validation errors for `theta_hat` or `value`.
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let (converged, status) = match termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            other => (true, format!("{other:?}")),
        };
        let grad_norm = grad.map(|g| g.l2_norm());
        Ok(Self {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm,
        })
    }

    /// `theta_hat` split back into one tensor per latent variable.
    ///
    /// # Errors
    /// - [`OptError::Layout`] if `ordering` is not the layout of `theta_hat`.
    pub fn values(&self, ordering: &VariableOrdering) -> OptResult<TensorMap> {
        Ok(unflatten(self.theta_hat.view(), ordering)?)
    }
}

//! High-level entry points for fitting latent values of a [`LogDensity`].
//!
//! [`maximize`] selects an L-BFGS solver with the configured line search,
//! wraps the model in a [`FitnessAdapter`] (which *minimizes* the negated
//! objective), and delegates the run to [`run_lbfgs`].
use crate::{
    gradient::flatten,
    jacobian::TensorMap,
    optimization::{
        errors::{OptError, OptResult},
        fitness::{
            adapter::FitnessAdapter,
            builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
            run::run_lbfgs,
            traits::{LineSearcher, LogDensity, Objective, OptimOptions, OptimOutcome},
            types::Theta,
        },
    },
};

/// Maximize `objective` of `model` over its latent variables with L-BFGS.
///
/// # Behavior
/// - Checks `theta0` against the model's ordering and passes the unflattened
///   values to [`LogDensity::check`].
/// - Builds an L-BFGS solver with **Hager–Zhang** or **More–Thuente** line
///   search based on `opts.line_searcher`.
/// - Runs it through [`run_lbfgs`] and returns the [`OptimOutcome`]; use
///   [`OptimOutcome::values`] to get per-latent tensors back.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if `theta0` has the wrong length.
/// - Any error from `model.check`, the builders, or the solver run.
///
/// # Example
/// ```no_run
/// use latent_diff::gradient::VariableOrdering;
/// use latent_diff::graph::NodeId;
/// use latent_diff::jacobian::TensorMap;
/// use latent_diff::optimization::errors::OptResult;
/// use latent_diff::optimization::fitness::{
///     LogDensity, Objective, OptimOptions, maximize,
/// };
/// use ndarray::array;
///
/// struct Bowl(VariableOrdering);
///
/// impl LogDensity for Bowl {
///     fn ordering(&self) -> &VariableOrdering {
///         &self.0
///     }
///     fn log_prob(&self, values: &TensorMap) -> OptResult<f64> {
///         Ok(-values.values().flat_map(|t| t.iter()).map(|v| v * v).sum::<f64>())
///     }
/// }
///
/// let model = Bowl(VariableOrdering::new(vec![(NodeId(0), vec![2])])?);
/// let out = maximize(&model, Objective::Posterior, array![0.3, -0.2], &OptimOptions::default())?;
/// println!("theta_hat = {:?}", out.theta_hat);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn maximize<M: LogDensity>(
    model: &M, objective: Objective, theta0: Theta, opts: &OptimOptions,
) -> OptResult<OptimOutcome> {
    let expected = model.ordering().total_len();
    if theta0.len() != expected {
        return Err(OptError::GradientDimMismatch { expected, found: theta0.len() });
    }
    let problem = FitnessAdapter::new(model, objective);
    model.check(&problem.values(&theta0)?)?;
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}

/// Flatten current latent `values` into a starting point for [`maximize`].
///
/// Latents absent from `values` start at zero.
///
/// # Errors
/// - [`OptError::Layout`] if an entry does not match its declared shape.
pub fn initial_theta<M: LogDensity + ?Sized>(model: &M, values: &TensorMap) -> OptResult<Theta> {
    Ok(flatten(values, model.ordering())?)
}

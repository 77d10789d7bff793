//! Execution helper that runs an argmin solver on a [`FitnessAdapter`] and
//! returns an [`OptimOutcome`].
use crate::optimization::{
    errors::OptResult,
    fitness::{
        adapter::FitnessAdapter,
        traits::{LogDensity, OptimOptions, OptimOutcome},
        types::{Grad, Theta},
    },
};
#[cfg(feature = "obs_slog")]
use argmin::core::Gradient;
use argmin::core::{Executor, State};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;
use log::debug;

/// Run `solver` on `problem` starting from `theta0`.
///
/// Wires the initial parameter, the optional `max_iters` cap and, behind the
/// `obs_slog` feature with `opts.verbose`, a terminal slog observer with
/// `ObserverMode::Always`. The reported `value` is the objective, i.e. the
/// negated best cost.
///
/// # Errors
/// - Any argmin runtime error, mapped through `From<argmin::core::Error>`.
/// - Validation errors while building the [`OptimOutcome`].
pub fn run_lbfgs<'a, M, S>(
    theta0: Theta, opts: &OptimOptions, problem: FitnessAdapter<'a, M>, solver: S,
) -> OptResult<OptimOutcome>
where
    M: LogDensity,
    S: argmin::core::Solver<
            FitnessAdapter<'a, M>,
            argmin::core::IterState<Theta, Grad, (), (), (), f64>,
        > + Send
        + 'static,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        log_initial_state(&theta0, &problem)?;
    }
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    debug!("solver stopped after {iterations} iterations: {termination:?}");
    let grad = result.take_gradient();
    OptimOutcome::new(
        result.take_best_param(),
        -result.get_best_cost(),
        termination,
        iterations,
        function_counts,
        grad,
    )
}

// ---- Helper Methods ----

#[cfg(feature = "obs_slog")]
fn log_initial_state<M: LogDensity>(theta0: &Theta, problem: &FitnessAdapter<'_, M>) -> OptResult<()> {
    let f0 = problem.objective_value(theta0)?;
    let g0n = problem.gradient(theta0).ok().map(|g| g.l2_norm());

    eprintln!(
        "init: {}(theta0) = {:.6}{}",
        problem.objective.name(),
        f0,
        g0n.map(|n| format!(", ||grad|| = {:.6}", n)).unwrap_or_default()
    );
    Ok(())
}

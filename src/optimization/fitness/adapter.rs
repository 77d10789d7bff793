//! Adapter that exposes a [`LogDensity`] as an argmin problem over the flat
//! latent vector.
//!
//! Maximizing the chosen objective becomes minimizing `c(θ) = -objective(θ)`.
//! Each evaluation unflattens `θ` into per-latent tensors, and analytic
//! gradient maps are flattened back in ordering order and negated. Without
//! analytic gradients the cost itself is finite-differenced, so no sign flip
//! is needed on that branch.
use crate::{
    gradient::{flatten, unflatten},
    jacobian::TensorMap,
    optimization::{
        errors::{OptError, OptResult},
        fitness::{
            finite_diff::fd_gradient,
            traits::{LogDensity, Objective},
            types::{Cost, Grad, Theta},
            validation::validate_grad,
        },
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use log::trace;

/// Bridges a [`LogDensity`] to argmin's `CostFunction` and `Gradient`.
#[derive(Debug, Clone)]
pub struct FitnessAdapter<'a, M: LogDensity> {
    pub model: &'a M,
    pub objective: Objective,
}

impl<'a, M: LogDensity> FitnessAdapter<'a, M> {
    pub fn new(model: &'a M, objective: Objective) -> Self {
        Self { model, objective }
    }

    /// Per-latent values encoded by `theta`.
    ///
    /// # Errors
    /// - [`OptError::Layout`] if `theta` does not match the model's ordering.
    pub fn values(&self, theta: &Theta) -> OptResult<TensorMap> {
        Ok(unflatten(theta.view(), self.model.ordering())?)
    }

    /// Objective (not cost) at `theta`, checked for finiteness.
    ///
    /// # Errors
    /// - Layout and model errors, or [`OptError::NonFiniteCost`].
    pub fn objective_value(&self, theta: &Theta) -> OptResult<f64> {
        let values = self.values(theta)?;
        let value = self.objective.value(self.model, &values)?;
        if !value.is_finite() {
            return Err(OptError::NonFiniteCost { value });
        }
        trace!("{} objective = {value}", self.objective.name());
        Ok(value)
    }

    /// Analytic cost gradient `-∇objective(θ)`, flattened in ordering order.
    ///
    /// # Errors
    /// - [`OptError::GradientNotImplemented`] if the model has none.
    /// - Layout errors for mis-shaped gradient entries and validation errors
    ///   for non-finite ones.
    pub fn analytic_cost_gradient(&self, theta: &Theta) -> OptResult<Grad> {
        let values = self.values(theta)?;
        let grads = self.objective.gradients(self.model, &values)?;
        let flat = flatten(&grads, self.model.ordering())?;
        validate_grad(&flat, theta.len())?;
        Ok(-flat)
    }
}

impl<'a, M: LogDensity> CostFunction for FitnessAdapter<'a, M> {
    type Param = Theta;
    type Output = Cost;

    /// Evaluate the cost `c(θ) = -objective(θ)`.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        Ok(-self.objective_value(theta)?)
    }
}

impl<'a, M: LogDensity> Gradient for FitnessAdapter<'a, M> {
    type Param = Theta;
    type Gradient = Grad;

    /// Evaluate the gradient of the cost at `θ`.
    ///
    /// Uses the model's analytic gradients when provided; on
    /// `GradientNotImplemented` falls back to [`fd_gradient`] on the cost.
    /// Any other error is propagated.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        match self.analytic_cost_gradient(theta) {
            Ok(g) => Ok(g),
            Err(OptError::GradientNotImplemented) => {
                trace!("no analytic gradient, using finite differences");
                Ok(fd_gradient(theta, |t: &Theta| self.cost(t))?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

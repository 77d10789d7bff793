//! Validation helpers for the fitness layer.
//!
//! - **Tolerance checks**: [`verify_tol_grad`], [`verify_tol_cost`] ensure
//!   numeric tolerances are finite and strictly positive when provided.
//! - **Gradient validation**: [`validate_grad`] enforces the flat layout's
//!   length and finite entries.
//! - **Parameter estimates**: [`validate_theta_hat`] ensures the solver
//!   returned a vector and that it is finite.
//! - **Objective values**: [`validate_value`] rejects `NaN`/`±∞`.
use crate::optimization::{
    errors::{OptError, OptResult},
    fitness::types::{Grad, Theta},
};

/// Validate the optional gradient-norm tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolGrad`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the optional cost-change tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolCost`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate a flat gradient against the layout length and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if `grad.len() != dim`.
/// - [`OptError::InvalidGradient`] for the first non-finite entry.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate and unwrap the solver's best parameter vector.
///
/// # Errors
/// - [`OptError::MissingThetaHat`] if no vector was provided.
/// - [`OptError::InvalidThetaHat`] if any element is non-finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let theta = theta_hat.ok_or(OptError::MissingThetaHat)?;
    if let Some((index, &value)) = theta.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(OptError::InvalidThetaHat {
            index,
            value,
            reason: "Parameter estimates must be finite.",
        });
    }
    Ok(theta)
}

/// Validate that an objective value is finite.
///
/// # Errors
/// Returns [`OptError::NonFiniteCost`] if the value is `NaN` or infinite.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Verify tolerance checks accept `None` and positive values and reject
    // non-positive or non-finite ones.
    //
    // Given
    // -----
    // - `None`, `1e-8`, `0.0`, and `NaN`.
    //
    // Expect
    // ------
    // - Ok, Ok, InvalidTolGrad, InvalidTolCost.
    fn tolerances_must_be_finite_and_positive() {
        // Act / Assert
        assert!(verify_tol_grad(None).is_ok());
        assert!(verify_tol_cost(Some(1e-8)).is_ok());
        assert!(matches!(verify_tol_grad(Some(0.0)), Err(OptError::InvalidTolGrad { .. })));
        assert!(matches!(verify_tol_cost(Some(f64::NAN)), Err(OptError::InvalidTolCost { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Ensure gradient validation reports length first, then the first
    // non-finite entry.
    //
    // Given
    // -----
    // - A length-2 gradient checked against 3, and [1, ∞] checked against 2.
    //
    // Expect
    // ------
    // - GradientDimMismatch, then InvalidGradient at index 1.
    fn gradient_checks_length_then_entries() {
        // Arrange
        let grad = array![1.0, f64::INFINITY];

        // Act
        let wrong_len = validate_grad(&grad, 3);
        let non_finite = validate_grad(&grad, 2);

        // Assert
        assert_eq!(wrong_len, Err(OptError::GradientDimMismatch { expected: 3, found: 2 }));
        assert!(matches!(non_finite, Err(OptError::InvalidGradient { index: 1, .. })));
    }

    #[test]
    // Purpose
    // -------
    // Check that a missing or non-finite estimate is rejected.
    //
    // Given
    // -----
    // - `None` and `Some([0, NaN])`.
    //
    // Expect
    // ------
    // - MissingThetaHat and InvalidThetaHat at index 1.
    fn theta_hat_must_exist_and_be_finite() {
        // Act
        let missing = validate_theta_hat(None);
        let bad = validate_theta_hat(Some(array![0.0, f64::NAN]));

        // Assert
        assert_eq!(missing, Err(OptError::MissingThetaHat));
        assert!(matches!(bad, Err(OptError::InvalidThetaHat { index: 1, .. })));
    }
}

//! fitness::finite_diff — finite-difference gradients with error capture.
//!
//! Purpose
//! -------
//! Approximate the cost gradient when a model provides no analytic
//! gradients, without losing errors raised by the model inside the
//! `finitediff` closures (which must return a bare `f64`).
//!
//! Key behaviors
//! -------------
//! - [`fd_gradient`] tries central differences first and retries with
//!   forward differences when a cost evaluation failed or the central
//!   estimate is not finite.
//! - [`run_fd_diff`] is the forward-difference step with error capture
//!   and post-hoc validation.
//!
//! Invariants & assumptions
//! ------------------------
//! - The first error raised by the cost closure is stored in `closure_err`
//!   and the closure returns `NaN`; it is surfaced after differencing.
//! - Returned gradients always pass [`validate_grad`].
use crate::optimization::{
    errors::OptResult,
    fitness::{
        types::{Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Finite-difference gradient of a fallible `cost` at `theta`.
///
/// # Errors
/// - The first error raised by `cost` on the forward-difference retry.
/// - Validation errors if the forward estimate is still non-finite.
pub fn fd_gradient<C>(theta: &Theta, cost: C) -> OptResult<Grad>
where
    C: Fn(&Theta) -> Result<f64, Error>,
{
    let closure_err: RefCell<Option<Error>> = RefCell::new(None);
    let cost_func = |theta: &Theta| -> f64 {
        match cost(theta) {
            Ok(val) => val,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                f64::NAN
            }
        }
    };

    let central = theta.central_diff(&cost_func);
    if closure_err.borrow().is_some() {
        return run_fd_diff(theta, &cost_func, &closure_err);
    }
    match validate_grad(&central, theta.len()) {
        Ok(()) => Ok(central),
        Err(_) => run_fd_diff(theta, &cost_func, &closure_err),
    }
}

/// Forward-difference gradient of `func` at `theta`, with error capture.
///
/// Clears `closure_err`, differences, returns any captured error, then
/// validates the result.
///
/// # Errors
/// - Any error captured in `closure_err`, converted into `OptError`.
/// - [`OptError::InvalidGradient`](crate::optimization::errors::OptError::InvalidGradient)
///   if an entry is non-finite.
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}

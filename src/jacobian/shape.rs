//! Shape utilities shared by the Jacobian operators.
//!
//! All helpers are row-major and never coerce: anything outside numpy-style
//! broadcasting is reported as [`JacobianError::ShapeMismatch`].
use ndarray::{ArrayD, IxDyn};

use crate::{
    graph::Tensor,
    jacobian::errors::{JacobianError, JacobianResult},
};

pub(crate) fn concat_shape(output: &[usize], source: &[usize]) -> Vec<usize> {
    output.iter().chain(source).copied().collect()
}

pub(crate) fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// `ones(lead) ++ shape ++ ones(trail)`.
pub(crate) fn padded(shape: &[usize], lead: usize, trail: usize) -> Vec<usize> {
    let mut out = vec![1; lead];
    out.extend_from_slice(shape);
    out.extend(std::iter::repeat(1).take(trail));
    out
}

/// Reinterpret `tensor` with `shape`, reading elements in row-major order.
pub(crate) fn reshape_row_major(
    tensor: &Tensor, shape: &[usize], context: &'static str,
) -> JacobianResult<Tensor> {
    let mismatch = || JacobianError::ShapeMismatch {
        context,
        expected: shape.to_vec(),
        found: tensor.shape().to_vec(),
    };
    if element_count(shape) != tensor.len() {
        return Err(mismatch());
    }
    ArrayD::from_shape_vec(IxDyn(shape), tensor.iter().copied().collect()).map_err(|_| mismatch())
}

/// Broadcast `tensor` to exactly `shape` and materialize it.
pub(crate) fn broadcast_to(
    tensor: &Tensor, shape: &[usize], context: &'static str,
) -> JacobianResult<Tensor> {
    tensor.broadcast(IxDyn(shape)).map(|view| view.to_owned()).ok_or_else(|| {
        JacobianError::ShapeMismatch {
            context,
            expected: shape.to_vec(),
            found: tensor.shape().to_vec(),
        }
    })
}

/// Numpy broadcast shape of two operands, aligned on trailing axes.
pub(crate) fn co_broadcast_shape(
    a: &[usize], b: &[usize], context: &'static str,
) -> JacobianResult<Vec<usize>> {
    let rank = a.len().max(b.len());
    let a = padded(a, rank - a.len(), 0);
    let b = padded(b, rank - b.len(), 0);
    a.iter()
        .zip(&b)
        .map(|(&x, &y)| match (x, y) {
            _ if x == y => Ok(x),
            (1, _) => Ok(y),
            (_, 1) => Ok(x),
            _ => Err(JacobianError::ShapeMismatch { context, expected: a.clone(), found: b.clone() }),
        })
        .collect()
}

/// Elementwise product under numpy broadcasting.
pub(crate) fn broadcast_mul(
    a: &Tensor, b: &Tensor, context: &'static str,
) -> JacobianResult<Tensor> {
    let shape = co_broadcast_shape(a.shape(), b.shape(), context)?;
    let a = broadcast_to(a, &shape, context)?;
    let b = broadcast_to(b, &shape, context)?;
    Ok(&a * &b)
}

pub(crate) fn check_axis(axis: usize, rank: usize) -> JacobianResult<()> {
    if axis >= rank {
        return Err(JacobianError::AxisOutOfRange { axis, rank });
    }
    Ok(())
}

/// Reorder axes of `tensor` and return a standard-layout copy.
pub(crate) fn permute(tensor: &Tensor, order: &[usize]) -> JacobianResult<Tensor> {
    check_permutation(order, tensor.ndim())?;
    Ok(tensor.view().permuted_axes(IxDyn(order)).as_standard_layout().into_owned())
}

pub(crate) fn check_permutation(order: &[usize], rank: usize) -> JacobianResult<()> {
    let mut seen = vec![false; rank];
    let valid = order.len() == rank
        && order.iter().all(|&axis| axis < rank && !std::mem::replace(&mut seen[axis], true));
    if !valid {
        return Err(JacobianError::InvalidPermutation { order: order.to_vec(), rank });
    }
    Ok(())
}

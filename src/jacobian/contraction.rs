//! jacobian::contraction — matrix products chained through a Jacobian.
//!
//! Each operator contracts exactly one axis of every entry against a plain
//! tensor, then restores the canonical layout: output axes first, source
//! axes last. A contracted length mismatch is a
//! [`JacobianError::ShapeMismatch`].
use ndarray::Array2;

use crate::{
    graph::Tensor,
    jacobian::{
        errors::{JacobianError, JacobianResult},
        partials::JacobianMap,
        shape::{check_axis, concat_shape, element_count, permute, reshape_row_major},
    },
};

impl JacobianMap {
    /// Chain a matrix product on the output side.
    ///
    /// - `partial_is_left`: the node is `P · m`. The last output axis of `P`
    ///   contracts with axis 0 of `m`; the new output shape is
    ///   `out[..-1] ++ m[1..]`.
    /// - otherwise the node is `m · P`. The last axis of `m` contracts with
    ///   output axis 0 of `P`; the new output shape is `m[..-1] ++ out[1..]`.
    pub fn matrix_multiply_along_output_dims(
        &self, m: &Tensor, partial_is_left: bool,
    ) -> JacobianResult<Self> {
        let out = self.output_shape();
        let r = out.len();
        check_axis(0, r)?;
        check_axis(0, m.ndim())?;
        let mr = m.ndim();

        if partial_is_left {
            let output_shape = concat_shape(&out[..r - 1], &m.shape()[1..]);
            self.map_entries(output_shape, |p, source| {
                let s = source.len();
                // p[out.., k, src..] · m[k, rest..] -> [out[..-1], src.., rest..]
                let d = tensordot(p, r - 1, m, 0)?;
                let order: Vec<usize> =
                    (0..r - 1).chain(r - 1 + s..r - 1 + s + mr - 1).chain(r - 1..r - 1 + s).collect();
                permute(&d, &order)
            })
        } else {
            let output_shape = concat_shape(&m.shape()[..mr - 1], &out[1..]);
            // m[rest.., k] · p[k, out[1..], src..] is already canonical.
            self.map_entries(output_shape, |p, _| tensordot(m, mr - 1, p, 0))
        }
    }

    /// Chain a matrix product on the source side (a reparameterization of the
    /// source).
    ///
    /// - `partial_is_left`: `J · m`. The last source axis contracts with axis
    ///   0 of `m`.
    /// - otherwise `m · J`. The first source axis contracts with the last axis
    ///   of `m`, whose leading axes become the first source axes.
    pub fn matrix_multiply_along_source_dims(
        &self, m: &Tensor, partial_is_left: bool,
    ) -> JacobianResult<Self> {
        let r = self.output_rank();
        let mr = m.ndim();
        check_axis(0, mr)?;

        self.map_entries(self.output_shape().to_vec(), |p, source| {
            let s = source.len();
            check_axis(0, s)?;
            if partial_is_left {
                tensordot(p, r + s - 1, m, 0)
            } else {
                // [out.., src[1..].., m[..-1]..] -> [out.., m[..-1].., src[1..]..]
                let d = tensordot(p, r, m, mr - 1)?;
                let order: Vec<usize> =
                    (0..r).chain(r + s - 1..r + s - 1 + mr - 1).chain(r..r + s - 1).collect();
                permute(&d, &order)
            }
        })
    }
}

/// Contract axis `a_axis` of `a` with axis `b_axis` of `b`.
///
/// The result's axes are `a`'s remaining axes followed by `b`'s remaining
/// axes, each in their original order.
fn tensordot(a: &Tensor, a_axis: usize, b: &Tensor, b_axis: usize) -> JacobianResult<Tensor> {
    let k = a.shape()[a_axis];
    if b.shape()[b_axis] != k {
        return Err(JacobianError::ShapeMismatch {
            context: "matrix multiply",
            expected: a.shape().to_vec(),
            found: b.shape().to_vec(),
        });
    }

    let a_order: Vec<usize> = (0..a.ndim()).filter(|&i| i != a_axis).chain([a_axis]).collect();
    let b_order: Vec<usize> = [b_axis].into_iter().chain((0..b.ndim()).filter(|&i| i != b_axis)).collect();
    let a_rest: Vec<usize> = a_order[..a.ndim() - 1].iter().map(|&i| a.shape()[i]).collect();
    let b_rest: Vec<usize> = b_order[1..].iter().map(|&i| b.shape()[i]).collect();

    let lhs = as_matrix(&permute(a, &a_order)?, element_count(&a_rest), k)?;
    let rhs = as_matrix(&permute(b, &b_order)?, k, element_count(&b_rest))?;
    let product = lhs.dot(&rhs).into_dyn();
    reshape_row_major(&product, &concat_shape(&a_rest, &b_rest), "matrix multiply")
}

fn as_matrix(t: &Tensor, rows: usize, cols: usize) -> JacobianResult<Array2<f64>> {
    Array2::from_shape_vec((rows, cols), t.iter().copied().collect()).map_err(|_| {
        JacobianError::ShapeMismatch {
            context: "matrix multiply",
            expected: vec![rows, cols],
            found: t.shape().to_vec(),
        }
    })
}

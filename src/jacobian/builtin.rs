//! jacobian::builtin — stock derivative rules.
//!
//! Purpose
//! -------
//! Provide rules for the common deterministic transforms so that a fresh
//! [`RuleRegistry::with_builtin_rules`] can differentiate arithmetic,
//! reductions, reshapes and selections out of the box.
//!
//! Key behaviors
//! -------------
//! - Elementwise binary rules broadcast with numpy semantics; the local
//!   derivative of each side is an output-side multiplier.
//! - `matmul` is the 2-D matrix product.
//! - `min` / `max` route the derivative to the selected operand; ties go to
//!   the first operand.
//! - `if_then_else` takes `[predicate, then, else]` and treats the predicate
//!   as piecewise constant (nonzero is true).
//! - Every stock rule also has a reverse form. It applies the same local
//!   derivative on the source side of the adjoint, then sums away any axes
//!   the parent was broadcast along.
//!
//! Invariants & assumptions
//! ------------------------
//! - Rules read parents in the node's parent order and never inspect the
//!   graph directly.
use ndarray::Zip;

use crate::{
    graph::{Mask, Tensor},
    jacobian::{
        combine::{BroadcastSide, Operand},
        errors::{JacobianError, JacobianResult},
        partials::JacobianMap,
        rules::{DerivativeRule, FnRule, ReverseContext, RuleContext, RuleRegistry},
        shape::{broadcast_mul, broadcast_to},
    },
};

type Contributions = JacobianResult<Vec<JacobianMap>>;

pub(crate) fn register_all(registry: &mut RuleRegistry) {
    registry
        .register("add", FnRule::new(add, add_reverse))
        .register("subtract", FnRule::new(subtract, subtract_reverse))
        .register("multiply", FnRule::new(multiply, multiply_reverse))
        .register("divide", FnRule::new(divide, divide_reverse))
        .register("matmul", FnRule::new(matmul, matmul_reverse))
        .register("sum", FnRule::new(sum, sum_reverse))
        .register("reshape", FnRule::new(reshape, reshape_reverse))
        .register("min", FnRule::new(min, min_reverse))
        .register("max", FnRule::new(max, max_reverse))
        .register("if_then_else", FnRule::new(if_then_else, if_then_else_reverse))
        .register("concat", Concat::new(0))
        .register("exp", FnRule::new(exp, exp_reverse))
        .register("log", FnRule::new(log, log_reverse));
}

// ---- Forward rules ----

fn add(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(2)?;
    JacobianMap::add(ctx.parent_partials[0], ctx.parent_partials[1], ctx.output_shape)
}

fn subtract(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(2)?;
    JacobianMap::subtract(ctx.parent_partials[0], ctx.parent_partials[1], ctx.output_shape)
}

fn multiply(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(2)?;
    let (a, b) = (ctx.parent_values[0], ctx.parent_values[1]);
    JacobianMap::elementwise_combine(
        Operand::new(ctx.parent_partials[0], b.clone()),
        Operand::new(ctx.parent_partials[1], a.clone()),
        ctx.output_shape,
        BroadcastSide::Output,
    )
}

/// d(a/b) = da / b - db · (a/b) / b
fn divide(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(2)?;
    let recip = ctx.parent_values[1].mapv(f64::recip);
    let wrt_divisor = broadcast_mul(ctx.output_value, &recip, "divide")?.mapv(|v| -v);
    JacobianMap::elementwise_combine(
        Operand::new(ctx.parent_partials[0], recip),
        Operand::new(ctx.parent_partials[1], wrt_divisor),
        ctx.output_shape,
        BroadcastSide::Output,
    )
}

fn matmul(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(2)?;
    let (a, b) = (ctx.parent_values[0], ctx.parent_values[1]);
    check_matrices(a, b)?;
    let via_left = ctx.parent_partials[0].matrix_multiply_along_output_dims(b, true)?;
    let via_right = ctx.parent_partials[1].matrix_multiply_along_output_dims(a, false)?;
    JacobianMap::add(&via_left, &via_right, ctx.output_shape)
}

/// Sum over every axis to a scalar.
fn sum(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(1)?;
    let partial = ctx.parent_partials[0];
    let axes: Vec<usize> = (0..partial.output_rank()).collect();
    partial.reduce_sum(&axes, false)
}

fn reshape(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(1)?;
    ctx.parent_partials[0].reshape(ctx.output_shape)
}

fn min(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    select_by(ctx, |a, b| a <= b)
}

fn max(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    select_by(ctx, |a, b| a >= b)
}

fn select_by(ctx: &RuleContext<'_>, take_first: fn(f64, f64) -> bool) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(2)?;
    let mask = selection_mask(ctx.parent_values[0], ctx.parent_values[1], ctx.output_shape, take_first)?;
    JacobianMap::merge_conditional(&mask, ctx.parent_partials[0], ctx.parent_partials[1])
}

fn if_then_else(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(3)?;
    let mask = predicate_mask(ctx.parent_values[0], ctx.output_shape)?;
    JacobianMap::merge_conditional(&mask, ctx.parent_partials[1], ctx.parent_partials[2])
}

fn exp(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(1)?;
    ctx.parent_partials[0].scale_by(ctx.output_value, BroadcastSide::Output)
}

fn log(ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
    ctx.expect_arity(1)?;
    ctx.parent_partials[0].divide_by(ctx.parent_values[0])
}

// ---- Reverse rules ----

fn add_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(2)?;
    let w = ctx.adjoint;
    Ok(vec![w.reduce_source_to(ctx.parent_shape(0))?, w.reduce_source_to(ctx.parent_shape(1))?])
}

fn subtract_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(2)?;
    let w = ctx.adjoint;
    Ok(vec![
        w.reduce_source_to(ctx.parent_shape(0))?,
        w.scale(-1.0).reduce_source_to(ctx.parent_shape(1))?,
    ])
}

fn multiply_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(2)?;
    let (a, b) = (ctx.parent_values[0], ctx.parent_values[1]);
    Ok(vec![through(ctx, b, 0)?, through(ctx, a, 1)?])
}

fn divide_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(2)?;
    let recip = ctx.parent_values[1].mapv(f64::recip);
    let wrt_divisor = broadcast_mul(ctx.output_value, &recip, "divide")?.mapv(|v| -v);
    Ok(vec![through(ctx, &recip, 0)?, through(ctx, &wrt_divisor, 1)?])
}

fn matmul_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(2)?;
    let (a, b) = (ctx.parent_values[0], ctx.parent_values[1]);
    check_matrices(a, b)?;
    let w = ctx.adjoint;
    Ok(vec![
        w.matrix_multiply_along_source_dims(&b.t().to_owned(), true)?,
        w.matrix_multiply_along_source_dims(&a.t().to_owned(), false)?,
    ])
}

fn sum_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(1)?;
    Ok(vec![ctx.adjoint.broadcast_source(ctx.parent_shape(0))?])
}

fn reshape_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(1)?;
    Ok(vec![ctx.adjoint.reshape_source(ctx.parent_shape(0))?])
}

fn min_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    select_by_reverse(ctx, |a, b| a <= b)
}

fn max_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    select_by_reverse(ctx, |a, b| a >= b)
}

fn select_by_reverse(ctx: &ReverseContext<'_>, take_first: fn(f64, f64) -> bool) -> Contributions {
    ctx.expect_arity(2)?;
    let mask = selection_mask(ctx.parent_values[0], ctx.parent_values[1], ctx.output_shape, take_first)?;
    let (taken, not_taken) = mask_weights(&mask);
    Ok(vec![through(ctx, &taken, 0)?, through(ctx, &not_taken, 1)?])
}

fn if_then_else_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(3)?;
    let mask = predicate_mask(ctx.parent_values[0], ctx.output_shape)?;
    let (taken, not_taken) = mask_weights(&mask);
    Ok(vec![
        JacobianMap::constant(ctx.adjoint.output_shape()),
        through(ctx, &taken, 1)?,
        through(ctx, &not_taken, 2)?,
    ])
}

fn exp_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(1)?;
    Ok(vec![ctx.adjoint.scale_by(ctx.output_value, BroadcastSide::Source)?])
}

fn log_reverse(ctx: &ReverseContext<'_>) -> Contributions {
    ctx.expect_arity(1)?;
    let recip = ctx.parent_values[0].mapv(f64::recip);
    Ok(vec![ctx.adjoint.scale_by(&recip, BroadcastSide::Source)?])
}

// ---- Helpers ----

/// Adjoint for parent `index` of an elementwise operator whose local
/// derivative w.r.t. that parent is `local`.
fn through(ctx: &ReverseContext<'_>, local: &Tensor, index: usize) -> JacobianResult<JacobianMap> {
    ctx.adjoint.scale_by(local, BroadcastSide::Source)?.reduce_source_to(ctx.parent_shape(index))
}

fn check_matrices(a: &Tensor, b: &Tensor) -> JacobianResult<()> {
    if a.ndim() != 2 || b.ndim() != 2 {
        return Err(JacobianError::ShapeMismatch {
            context: "matmul operands must be matrices",
            expected: a.shape().to_vec(),
            found: b.shape().to_vec(),
        });
    }
    Ok(())
}

fn selection_mask(
    a: &Tensor, b: &Tensor, output_shape: &[usize], take_first: fn(f64, f64) -> bool,
) -> JacobianResult<Mask> {
    let a = broadcast_to(a, output_shape, "min/max operand")?;
    let b = broadcast_to(b, output_shape, "min/max operand")?;
    Ok(Zip::from(&a).and(&b).map_collect(|&x, &y| take_first(x, y)))
}

fn predicate_mask(predicate: &Tensor, output_shape: &[usize]) -> JacobianResult<Mask> {
    let predicate = broadcast_to(predicate, output_shape, "if_then_else predicate")?;
    Ok(predicate.mapv(|v| v != 0.0))
}

/// `(m, 1 - m)` as 0/1 weights.
fn mask_weights(mask: &Mask) -> (Tensor, Tensor) {
    let taken = mask.mapv(|m| if m { 1.0 } else { 0.0 });
    let not_taken = taken.mapv(|m| 1.0 - m);
    (taken, not_taken)
}

/// Concatenation of any number of parents along one output axis.
#[derive(Debug, Clone, Copy)]
pub struct Concat {
    axis: usize,
}

impl Concat {
    pub fn new(axis: usize) -> Self {
        Self { axis }
    }
}

impl DerivativeRule for Concat {
    fn partials(&self, ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
        JacobianMap::concat(self.axis, &ctx.parent_partials)
    }

    /// Each parent receives its own stretch of the concatenated axis.
    fn reverse(&self, ctx: &ReverseContext<'_>) -> Contributions {
        let mut start = 0;
        let mut contributions = Vec::with_capacity(ctx.arity());
        for index in 0..ctx.arity() {
            let shape = ctx.parent_shape(index);
            let len = *shape.get(self.axis).ok_or(JacobianError::AxisOutOfRange {
                axis: self.axis,
                rank: shape.len(),
            })?;
            contributions.push(ctx.adjoint.slice_source(self.axis, start, len)?);
            start += len;
        }
        Ok(contributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeId, Tensor};
    use finitediff::FiniteDiff;
    use ndarray::{Array1, Array2, ArrayD, IxDyn, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Every stock rule against central finite differences of the forward
    //   transform, with each parent seeded as its own latent.
    // - Broadcasting operands of unequal rank.
    // - Predicates of `if_then_else` contributing no derivative.
    // - Reverse forms against the forward Jacobians they transpose.
    //
    // They intentionally DO NOT cover:
    // - Graph traversal (see `accumulate`).
    // -------------------------------------------------------------------------

    const TOL: f64 = 1e-5;

    /// Run the registered rule `key` with every parent seeded by identity.
    fn run_rule(key: &str, values: &[Tensor], output: &Tensor) -> JacobianMap {
        let registry = RuleRegistry::with_builtin_rules();
        let seeds: Vec<JacobianMap> = values
            .iter()
            .enumerate()
            .map(|(i, v)| JacobianMap::identity(NodeId(i), v.shape()))
            .collect();
        let ctx = RuleContext {
            node: NodeId(values.len()),
            transform: key,
            output_shape: output.shape(),
            output_value: output,
            parent_values: values.iter().collect(),
            parent_partials: seeds.iter().collect(),
        };
        registry.get(key).unwrap().partials(&ctx).unwrap()
    }

    /// Run the reverse form of `key` from an identity adjoint on the output.
    fn run_reverse(key: &str, values: &[Tensor], output: &Tensor) -> Vec<JacobianMap> {
        let registry = RuleRegistry::with_builtin_rules();
        let out_id = NodeId(values.len());
        let adjoint = JacobianMap::identity(out_id, output.shape());
        let ctx = ReverseContext {
            node: out_id,
            transform: key,
            output_shape: output.shape(),
            output_value: output,
            parent_values: values.iter().collect(),
            adjoint: &adjoint,
        };
        registry.get(key).unwrap().reverse(&ctx).unwrap()
    }

    /// The reverse contribution to parent `i` must hold the same numbers as
    /// the forward entry for that parent, laid out `output ++ parent`.
    fn assert_reverse_matches_forward(key: &str, values: &[Tensor], output: &Tensor) {
        let forward = run_rule(key, values, output);
        let reverse = run_reverse(key, values, output);
        let out_id = NodeId(values.len());
        assert_eq!(reverse.len(), values.len(), "{key}");
        for (i, v) in values.iter().enumerate() {
            let rev = match reverse[i].with_respect_to(out_id) {
                Some(t) => {
                    assert_eq!(t.shape(), [output.shape(), v.shape()].concat().as_slice(), "{key}");
                    Array2::from_shape_vec((output.len(), v.len()), t.iter().copied().collect())
                        .unwrap()
                }
                None => Array2::zeros((output.len(), v.len())),
            };
            assert_close(&rev, &analytic(&forward, i, v.len()));
        }
    }

    /// Central-difference Jacobian of `f` at `x`, as an [out, in] matrix.
    fn fd_jacobian<F: Fn(&Tensor) -> Tensor>(f: F, x: &Tensor) -> Array2<f64> {
        let shape = x.shape().to_vec();
        let flat = Array1::from_iter(x.iter().copied());
        let out_len = f(x).len();
        let mut jac = Array2::zeros((out_len, flat.len()));
        for i in 0..out_len {
            let component = |v: &Array1<f64>| {
                let t = ArrayD::from_shape_vec(IxDyn(&shape), v.to_vec()).unwrap();
                f(&t).iter().copied().nth(i).unwrap()
            };
            jac.row_mut(i).assign(&flat.central_diff(&component));
        }
        jac
    }

    /// The analytic entry for `source` flattened to [out, in].
    fn analytic(j: &JacobianMap, source: usize, in_len: usize) -> Array2<f64> {
        let out_len: usize = j.output_shape().iter().product();
        match j.with_respect_to(NodeId(source)) {
            Some(t) => Array2::from_shape_vec((out_len, in_len), t.iter().copied().collect()).unwrap(),
            None => Array2::zeros((out_len, in_len)),
        }
    }

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < TOL, "analytic {x} vs numeric {y}");
        }
    }

    /// Check a binary rule against `op` for both parents.
    fn check_binary(key: &str, a: Tensor, b: Tensor, op: fn(&Tensor, &Tensor) -> Tensor) {
        let out = op(&a, &b);
        let j = run_rule(key, &[a.clone(), b.clone()], &out);
        assert_eq!(j.output_shape(), out.shape());
        assert_close(&analytic(&j, 0, a.len()), &fd_jacobian(|x| op(x, &b), &a));
        assert_close(&analytic(&j, 1, b.len()), &fd_jacobian(|x| op(&a, x), &b));
    }

    #[test]
    // Purpose
    // -------
    // Verify the elementwise arithmetic rules, including a rank-1 operand
    // broadcast against a matrix.
    //
    // Given
    // -----
    // - a of shape [2, 3] and b of shape [3] with nonzero entries.
    //
    // Expect
    // ------
    // - add, subtract, multiply and divide match finite differences for both
    //   operands.
    fn elementwise_rules_match_finite_differences() {
        // Arrange
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
        let b = array![0.5, -1.5, 2.0].into_dyn();

        // Act / Assert
        check_binary("add", a.clone(), b.clone(), |x, y| x + y);
        check_binary("subtract", a.clone(), b.clone(), |x, y| x - y);
        check_binary("multiply", a.clone(), b.clone(), |x, y| x * y);
        check_binary("divide", a, b, |x, y| x / y);
    }

    #[test]
    // Purpose
    // -------
    // Verify the matrix-product rule for both operands.
    //
    // Given
    // -----
    // - a of shape [2, 3] and b of shape [3, 2].
    //
    // Expect
    // ------
    // - Output [2, 2]; both partials match finite differences.
    fn matmul_rule_matches_finite_differences() {
        // Arrange
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
        let b = array![[0.5, 1.0], [-1.0, 2.0], [3.0, 0.0]].into_dyn();
        let dot = |x: &Tensor, y: &Tensor| {
            let x = x.view().into_dimensionality::<ndarray::Ix2>().unwrap();
            let y = y.view().into_dimensionality::<ndarray::Ix2>().unwrap();
            x.dot(&y).into_dyn()
        };

        // Act / Assert
        check_binary("matmul", a, b, dot);
    }

    #[test]
    // Purpose
    // -------
    // Verify the unary rules.
    //
    // Given
    // -----
    // - x of shape [2, 2] with positive entries.
    //
    // Expect
    // ------
    // - exp, log, sum and reshape([4]) match finite differences.
    fn unary_rules_match_finite_differences() {
        // Arrange
        let x = array![[0.5, 1.0], [1.5, 2.0]].into_dyn();
        let cases: [(&str, fn(&Tensor) -> Tensor); 4] = [
            ("exp", |t| t.mapv(f64::exp)),
            ("log", |t| t.mapv(f64::ln)),
            ("sum", |t| ndarray::arr0(t.sum()).into_dyn()),
            ("reshape", |t| Array1::from_iter(t.iter().copied()).into_dyn()),
        ];

        for (key, op) in cases {
            // Act
            let out = op(&x);
            let j = run_rule(key, &[x.clone()], &out);

            // Assert
            assert_eq!(j.output_shape(), out.shape(), "{key}");
            assert_close(&analytic(&j, 0, x.len()), &fd_jacobian(op, &x));
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify min and max route derivatives to the selected operand away from
    // ties.
    //
    // Given
    // -----
    // - a = [1, 5, 3] and b = [2, 4, 6].
    //
    // Expect
    // ------
    // - Both rules match finite differences for both operands.
    fn min_max_rules_match_finite_differences() {
        // Arrange
        let a = array![1.0, 5.0, 3.0].into_dyn();
        let b = array![2.0, 4.0, 6.0].into_dyn();

        // Act / Assert
        check_binary("min", a.clone(), b.clone(), |x, y| {
            ndarray::Zip::from(x).and(y).map_collect(|&p, &q| p.min(q))
        });
        check_binary("max", a, b, |x, y| ndarray::Zip::from(x).and(y).map_collect(|&p, &q| p.max(q)));
    }

    #[test]
    // Purpose
    // -------
    // Verify the select rule takes rows from the branch named by the
    // predicate and gives the predicate no derivative.
    //
    // Given
    // -----
    // - predicate [1, 0, 1], then = [1, 2, 3], else = [4, 5, 6].
    //
    // Expect
    // ------
    // - ∂/∂then = diag(1, 0, 1), ∂/∂else = diag(0, 1, 0), no predicate entry.
    fn if_then_else_selects_by_predicate() {
        // Arrange
        let p = array![1.0, 0.0, 1.0].into_dyn();
        let t = array![1.0, 2.0, 3.0].into_dyn();
        let e = array![4.0, 5.0, 6.0].into_dyn();
        let out = array![1.0, 5.0, 3.0].into_dyn();

        // Act
        let j = run_rule("if_then_else", &[p, t, e], &out);

        // Assert
        assert!(j.with_respect_to(NodeId(0)).is_none());
        assert_eq!(analytic(&j, 1, 3), Array2::from_diag(&array![1.0, 0.0, 1.0]));
        assert_eq!(analytic(&j, 2, 3), Array2::from_diag(&array![0.0, 1.0, 0.0]));
    }

    #[test]
    // Purpose
    // -------
    // Verify the concatenation rule stacks identity blocks.
    //
    // Given
    // -----
    // - a of shape [2] and b of shape [3].
    //
    // Expect
    // ------
    // - Output [5]; ∂/∂a is the top 2x2 identity, ∂/∂b the bottom 3x3 one.
    fn concat_rule_stacks_blocks() {
        // Arrange
        let a = array![1.0, 2.0].into_dyn();
        let b = array![3.0, 4.0, 5.0].into_dyn();
        let out = array![1.0, 2.0, 3.0, 4.0, 5.0].into_dyn();

        // Act
        let j = run_rule("concat", &[a, b], &out);

        // Assert
        let da = analytic(&j, 0, 2);
        let db = analytic(&j, 1, 3);
        assert_eq!(j.output_shape(), &[5]);
        assert_eq!(da.slice(ndarray::s![..2, ..]), Array2::<f64>::eye(2));
        assert_eq!(db.slice(ndarray::s![2.., ..]), Array2::<f64>::eye(3));
        assert_eq!(da.sum() + db.sum(), 5.0);
    }

    #[test]
    // Purpose
    // -------
    // Verify every reverse form transposes its forward rule, including
    // operands broadcast against a larger output.
    //
    // Given
    // -----
    // - The operands used by the forward tests above: a [2, 3] matrix with a
    //   [3] vector, a [2, 3] by [3, 2] product, a [2, 2] unary input, the
    //   min/max and select triples, and a [2] + [3] concatenation.
    //
    // Expect
    // ------
    // - Each parent's reverse contribution has shape `output ++ parent` and
    //   equals the forward entry; the select predicate receives nothing.
    fn reverse_rules_transpose_forward_rules() {
        // Arrange
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
        let b = array![0.5, -1.5, 2.0].into_dyn();
        let m = array![[0.5, 1.0], [-1.0, 2.0], [3.0, 0.0]].into_dyn();
        let x = array![[0.5, 1.0], [1.5, 2.0]].into_dyn();
        let lo = array![1.0, 5.0, 3.0].into_dyn();
        let hi = array![2.0, 4.0, 6.0].into_dyn();
        let p = array![1.0, 0.0, 1.0].into_dyn();
        let dot = {
            let l = a.view().into_dimensionality::<ndarray::Ix2>().unwrap();
            let r = m.view().into_dimensionality::<ndarray::Ix2>().unwrap();
            l.dot(&r).into_dyn()
        };
        let cases: Vec<(&str, Vec<Tensor>, Tensor)> = vec![
            ("add", vec![a.clone(), b.clone()], &a + &b),
            ("subtract", vec![a.clone(), b.clone()], &a - &b),
            ("multiply", vec![a.clone(), b.clone()], &a * &b),
            ("divide", vec![a.clone(), b.clone()], &a / &b),
            ("matmul", vec![a.clone(), m], dot),
            ("exp", vec![x.clone()], x.mapv(f64::exp)),
            ("log", vec![x.clone()], x.mapv(f64::ln)),
            ("sum", vec![x.clone()], ndarray::arr0(x.sum()).into_dyn()),
            ("reshape", vec![x.clone()], Array1::from_iter(x.iter().copied()).into_dyn()),
            ("min", vec![lo.clone(), hi.clone()], array![1.0, 4.0, 3.0].into_dyn()),
            ("max", vec![lo.clone(), hi.clone()], array![2.0, 5.0, 6.0].into_dyn()),
            ("if_then_else", vec![p.clone(), lo.clone(), hi.clone()], array![1.0, 4.0, 3.0].into_dyn()),
            ("concat", vec![b.clone(), lo.clone()], array![0.5, -1.5, 2.0, 1.0, 5.0, 3.0].into_dyn()),
        ];

        for (key, values, output) in &cases {
            // Act / Assert
            assert_reverse_matches_forward(key, values, output);
        }

        // Assert
        let select = run_reverse("if_then_else", &cases[11].1, &cases[11].2);
        assert!(select[0].is_empty());
    }
}

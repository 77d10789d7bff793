//! jacobian::combine — multiplier-driven Jacobian operators.
//!
//! Purpose
//! -------
//! Chain a plain local-derivative tensor into existing Jacobians: elementwise
//! binary operators, scaling, division and the conditional select.
//!
//! Key behaviors
//! -------------
//! - A multiplier is stretched along an explicit [`BroadcastSide`]:
//!   - `Output`: it covers output axes (aligned to the trailing output axes)
//!     and is padded with trailing ones over every source axis.
//!   - `Source`: it covers source axes (aligned to the trailing source axes)
//!     and is padded with leading ones over every output axis.
//! - Results are materialized at `output_shape ++ source_shape`.
//!
//! Invariants & assumptions
//! ------------------------
//! - The side is always supplied by the caller. Both alignments are often
//!   valid for the same shapes, so it is never guessed.
//! - For a key missing from one operand, that operand contributes zero.
use std::collections::BTreeSet;

use ndarray::arr0;

use crate::{
    graph::{Mask, NodeId, Tensor},
    jacobian::{
        errors::{JacobianError, JacobianResult},
        partials::{JacobianMap, TensorMap},
        shape::{broadcast_mul, broadcast_to, co_broadcast_shape, concat_shape, padded, reshape_row_major},
    },
};

/// Which block of a Jacobian a plain multiplier tensor lines up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastSide {
    Output,
    Source,
}

/// One side of a binary operator: its Jacobian and its local derivative.
#[derive(Debug, Clone)]
pub struct Operand<'a> {
    pub partials: &'a JacobianMap,
    pub weight: Tensor,
}

impl<'a> Operand<'a> {
    pub fn new(partials: &'a JacobianMap, weight: Tensor) -> Self {
        Self { partials, weight }
    }

    /// Local derivative of one, as for either side of `a + b`.
    pub fn unit(partials: &'a JacobianMap) -> Self {
        Self::new(partials, arr0(1.0).into_dyn())
    }

    /// Local derivative of minus one, as for `b` in `a - b`.
    pub fn negated(partials: &'a JacobianMap) -> Self {
        Self::new(partials, arr0(-1.0).into_dyn())
    }
}

impl JacobianMap {
    /// Combine the two operands of an elementwise binary operator.
    ///
    /// Each entry becomes `weight · partial`, stretched along `side` and
    /// broadcast to `output_shape ++ source_shape`; entries for the same
    /// source are summed.
    ///
    /// # Errors
    /// - [`JacobianError::ShapeMismatch`] if a weight or partial cannot be
    ///   broadcast to `output_shape`.
    pub fn elementwise_combine(
        left: Operand<'_>, right: Operand<'_>, output_shape: &[usize], side: BroadcastSide,
    ) -> JacobianResult<Self> {
        let sources: BTreeSet<NodeId> =
            left.partials.sources().chain(right.partials.sources()).collect();

        let mut partials = TensorMap::new();
        for id in sources {
            let mut total: Option<Tensor> = None;
            for operand in [&left, &right] {
                let Some(partial) = operand.partials.with_respect_to(id) else {
                    continue;
                };
                let term = weighted(
                    partial,
                    operand.partials.output_rank(),
                    &operand.weight,
                    side,
                    output_shape,
                )?;
                total = Some(match total {
                    None => term,
                    Some(acc) if acc.shape() == term.shape() => acc + &term,
                    Some(acc) => {
                        return Err(JacobianError::ShapeMismatch {
                            context: "combine source block",
                            expected: acc.shape().to_vec(),
                            found: term.shape().to_vec(),
                        });
                    }
                });
            }
            if let Some(total) = total {
                partials.insert(id, total);
            }
        }

        Ok(JacobianMap::from_parts(output_shape.to_vec(), partials))
    }

    /// Jacobian of `a + b` for a node of `output_shape`.
    pub fn add(left: &JacobianMap, right: &JacobianMap, output_shape: &[usize]) -> JacobianResult<Self> {
        Self::elementwise_combine(
            Operand::unit(left),
            Operand::unit(right),
            output_shape,
            BroadcastSide::Output,
        )
    }

    /// Jacobian of `a - b` for a node of `output_shape`.
    pub fn subtract(
        left: &JacobianMap, right: &JacobianMap, output_shape: &[usize],
    ) -> JacobianResult<Self> {
        Self::elementwise_combine(
            Operand::unit(left),
            Operand::negated(right),
            output_shape,
            BroadcastSide::Output,
        )
    }

    /// Jacobian of `where(mask, then, else)`.
    ///
    /// The mask is output shaped; it is lifted to `mask_shape ++ ones(source)`
    /// before blending so it never lines up with source axes. A branch with no
    /// entry for a source contributes zero.
    pub fn merge_conditional(
        mask: &Mask, then_branch: &JacobianMap, else_branch: &JacobianMap,
    ) -> JacobianResult<Self> {
        let taken = mask.mapv(|m| if m { 1.0 } else { 0.0 });
        let not_taken = taken.mapv(|m| 1.0 - m);
        Self::elementwise_combine(
            Operand::new(then_branch, taken),
            Operand::new(else_branch, not_taken),
            mask.shape(),
            BroadcastSide::Output,
        )
    }

    /// Multiply every entry by `weight` stretched along `side`.
    ///
    /// With [`BroadcastSide::Output`] the output shape becomes the broadcast
    /// of the current output shape and the weight's shape.
    pub fn scale_by(&self, weight: &Tensor, side: BroadcastSide) -> JacobianResult<Self> {
        let output_shape = match side {
            BroadcastSide::Output => {
                co_broadcast_shape(self.output_shape(), weight.shape(), "scale_by")?
            }
            BroadcastSide::Source => self.output_shape().to_vec(),
        };
        let rank = self.output_rank();
        self.map_entries(output_shape.clone(), |t, _| weighted(t, rank, weight, side, &output_shape))
    }

    /// Divide every entry elementwise by an output-shaped `divisor`.
    pub fn divide_by(&self, divisor: &Tensor) -> JacobianResult<Self> {
        self.scale_by(&divisor.mapv(f64::recip), BroadcastSide::Output)
    }
}

/// `weight · partial`, with the partial's output block left-padded to
/// `target_output` and the weight placed on `side`, materialized at
/// `target_output ++ source_shape`.
fn weighted(
    partial: &Tensor, partial_rank: usize, weight: &Tensor, side: BroadcastSide,
    target_output: &[usize],
) -> JacobianResult<Tensor> {
    let (output, source) = partial.shape().split_at(partial_rank);
    let target_rank = target_output.len();
    let mismatch = |found: &[usize]| JacobianError::ShapeMismatch {
        context: "broadcast multiplier",
        expected: concat_shape(target_output, source),
        found: found.to_vec(),
    };
    if output.len() > target_rank {
        return Err(mismatch(output));
    }

    let lifted_partial =
        reshape_row_major(partial, &padded(partial.shape(), target_rank - output.len(), 0), "lift")?;

    let weight_shape = weight.shape();
    let lifted_shape = match side {
        BroadcastSide::Output if weight_shape.len() <= target_rank => {
            padded(weight_shape, target_rank - weight_shape.len(), source.len())
        }
        BroadcastSide::Source if weight_shape.len() <= source.len() => {
            padded(weight_shape, target_rank + source.len() - weight_shape.len(), 0)
        }
        _ => return Err(mismatch(weight_shape)),
    };
    let lifted_weight = reshape_row_major(weight, &lifted_shape, "lift")?;

    let product = broadcast_mul(&lifted_partial, &lifted_weight, "broadcast multiplier")?;
    broadcast_to(&product, &concat_shape(target_output, source), "broadcast multiplier")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, array};
    use std::collections::BTreeMap;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Output- vs source-side stretching of a multiplier.
    // - Key union and zero defaults in elementwise combination.
    // - The conditional select with a non-scalar source.
    //
    // They intentionally DO NOT cover:
    // - Structural operators (see `partials`).
    // -------------------------------------------------------------------------

    const A: NodeId = NodeId(0);
    const B: NodeId = NodeId(1);

    #[test]
    // Purpose
    // -------
    // Show that the same multiplier lands on different axes depending on the
    // side, even though both layouts are broadcast-compatible.
    //
    // Given
    // -----
    // - A 2x2 all-ones Jacobian (output [2], source [2]) and the multiplier
    //   [3, 5].
    //
    // Expect
    // ------
    // - Output side scales rows: [[3, 3], [5, 5]].
    // - Source side scales columns: [[3, 5], [3, 5]].
    fn scale_by_respects_broadcast_side() {
        // Arrange
        let full = JacobianMap::from_partials(
            &[2],
            BTreeMap::from([(A, array![[1.0, 1.0], [1.0, 1.0]].into_dyn())]),
        )
        .unwrap();
        let w = array![3.0, 5.0].into_dyn();

        // Act
        let by_output = full.scale_by(&w, BroadcastSide::Output).unwrap();
        let by_source = full.scale_by(&w, BroadcastSide::Source).unwrap();

        // Assert
        assert_eq!(by_output.with_respect_to(A).unwrap(), &array![[3.0, 3.0], [5.0, 5.0]].into_dyn());
        assert_eq!(by_source.with_respect_to(A).unwrap(), &array![[3.0, 5.0], [3.0, 5.0]].into_dyn());
    }

    #[test]
    // Purpose
    // -------
    // Verify that a product's Jacobian is the weighted union of its operands'
    // Jacobians, with scalar operands broadcast over the output.
    //
    // Given
    // -----
    // - a: scalar latent A (value 2); b: latent B of shape [3] (value [1,2,3]).
    // - c = a * b with output [3].
    //
    // Expect
    // ------
    // - ∂c/∂A = b = [1, 2, 3] with shape [3].
    // - ∂c/∂B = a · I(3).
    fn elementwise_combine_unions_keys_and_broadcasts() {
        // Arrange
        let ja = JacobianMap::identity(A, &[]);
        let jb = JacobianMap::identity(B, &[3]);
        let a = arr0(2.0).into_dyn();
        let b = array![1.0, 2.0, 3.0].into_dyn();

        // Act
        let jc = JacobianMap::elementwise_combine(
            Operand::new(&ja, b.clone()),
            Operand::new(&jb, a),
            &[3],
            BroadcastSide::Output,
        )
        .unwrap();

        // Assert
        assert_eq!(jc.output_shape(), &[3]);
        assert_eq!(jc.with_respect_to(A).unwrap(), &b);
        assert_eq!(jc.with_respect_to(B).unwrap(), &(Array::eye(3) * 2.0).into_dyn());
    }

    #[test]
    // Purpose
    // -------
    // Ensure subtracting a map from itself cancels and adding an empty map is
    // neutral.
    //
    // Given
    // -----
    // - identity([2]) w.r.t. A and the zero map.
    //
    // Expect
    // ------
    // - j - j has an all-zero entry for A; j + 0 equals j.
    fn add_and_subtract_with_zero_defaults() {
        // Arrange
        let j = JacobianMap::identity(A, &[2]);
        let zero = JacobianMap::constant(&[2]);

        // Act
        let diff = JacobianMap::subtract(&j, &j, &[2]).unwrap();
        let sum = JacobianMap::add(&j, &zero, &[2]).unwrap();

        // Assert
        assert!(diff.with_respect_to(A).unwrap().iter().all(|&v| v == 0.0));
        assert_eq!(sum, j);
    }

    #[test]
    // Purpose
    // -------
    // Verify the select operator lifts the output-shaped mask over a
    // non-scalar source instead of aligning it with source axes.
    //
    // Given
    // -----
    // - then = identity([2]) w.r.t. A, else = 3 · identity([2]) w.r.t. B.
    // - mask = [true, false].
    //
    // Expect
    // ------
    // - ∂/∂A = [[1, 0], [0, 0]] (row 0 from then).
    // - ∂/∂B = [[0, 0], [0, 3]] (row 1 from else).
    fn merge_conditional_masks_output_rows() {
        // Arrange
        let then_branch = JacobianMap::identity(A, &[2]);
        let else_branch = JacobianMap::identity(B, &[2]).scale(3.0);
        let mask = array![true, false].into_dyn();

        // Act
        let merged = JacobianMap::merge_conditional(&mask, &then_branch, &else_branch).unwrap();

        // Assert
        assert_eq!(merged.with_respect_to(A).unwrap(), &array![[1.0, 0.0], [0.0, 0.0]].into_dyn());
        assert_eq!(merged.with_respect_to(B).unwrap(), &array![[0.0, 0.0], [0.0, 3.0]].into_dyn());
    }

    #[test]
    // Purpose
    // -------
    // Confirm incompatible multipliers fail instead of being coerced.
    //
    // Given
    // -----
    // - identity([2]) and an output-side multiplier of shape [3].
    //
    // Expect
    // ------
    // - ShapeMismatch.
    fn scale_by_rejects_incompatible_multiplier() {
        // Arrange
        let j = JacobianMap::identity(A, &[2]);

        // Act
        let result = j.scale_by(&array![1.0, 2.0, 3.0].into_dyn(), BroadcastSide::Output);

        // Assert
        assert!(matches!(result, Err(JacobianError::ShapeMismatch { .. })));
    }
}

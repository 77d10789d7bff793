//! gradient::extractor — sparse per-variable maps <-> flat vectors.
//!
//! Purpose
//! -------
//! Bridge graph-shaped gradients (one tensor per latent, absent meaning
//! zero) and the dense parameter/gradient vectors consumed by numerical
//! optimizers.
//!
//! Key behaviors
//! -------------
//! - [`flatten`] writes each variable's tensor row-major at its offset and
//!   zero-fills variables absent from the map.
//! - [`unflatten`] partitions a vector by declared shapes and returns an
//!   entry for every variable in the ordering.
//!
//! Invariants & assumptions
//! ------------------------
//! - `flatten(unflatten(v)) == v` for any correctly sized `v`.
//! - `unflatten(flatten(m))` equals `m` plus explicit zero tensors for the
//!   variables `m` left implicit, i.e. the two are
//!   [`tensor_maps_equivalent`](crate::jacobian::tensor_maps_equivalent).
//!   Entries for ids outside the ordering are ignored by `flatten`.
//! - Each variable's block is addressed by a slice at its offset; neither
//!   direction rescans the vector from the start.
use ndarray::{Array1, ArrayView1, IxDyn, s};

use crate::{
    gradient::{
        errors::{GradientError, GradientResult},
        ordering::VariableOrdering,
    },
    jacobian::TensorMap,
};

/// Dense vector of every variable's tensor in ordering order.
///
/// # Errors
/// - [`GradientError::EntryLengthMismatch`] if an entry's element count is
///   not that of its declared shape.
pub fn flatten(map: &TensorMap, ordering: &VariableOrdering) -> GradientResult<Array1<f64>> {
    let mut flat = Array1::zeros(ordering.total_len());
    for (id, shape, offset) in ordering.iter() {
        let Some(tensor) = map.get(&id) else {
            continue;
        };
        let expected: usize = shape.iter().product();
        if tensor.len() != expected {
            return Err(GradientError::EntryLengthMismatch {
                node: id,
                expected,
                found: tensor.len(),
            });
        }
        let mut block = flat.slice_mut(s![offset..offset + expected]);
        for (slot, &value) in block.iter_mut().zip(tensor.iter()) {
            *slot = value;
        }
    }
    Ok(flat)
}

/// Split `flat` into one tensor per variable, shaped as declared.
///
/// # Errors
/// - [`GradientError::DimensionMismatch`] unless `flat.len()` equals
///   `ordering.total_len()`.
pub fn unflatten(flat: ArrayView1<'_, f64>, ordering: &VariableOrdering) -> GradientResult<TensorMap> {
    if flat.len() != ordering.total_len() {
        return Err(GradientError::DimensionMismatch {
            expected: ordering.total_len(),
            found: flat.len(),
        });
    }

    let mut map = TensorMap::new();
    for (id, shape, offset) in ordering.iter() {
        let len: usize = shape.iter().product();
        let block = flat.slice(s![offset..offset + len]).to_owned();
        let tensor = block.into_shape(IxDyn(shape)).map_err(|_| {
            GradientError::EntryLengthMismatch { node: id, expected: len, found: len }
        })?;
        map.insert(id, tensor);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::NodeId, jacobian::tensor_maps_equivalent};
    use ndarray::{arr0, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Row-major layout and zero fill for absent variables.
    // - Length checks in both directions.
    // - The round trip under the sparse-zero convention.
    // -------------------------------------------------------------------------

    const A: NodeId = NodeId(3);
    const B: NodeId = NodeId(7);
    const C: NodeId = NodeId(1);

    fn ordering() -> VariableOrdering {
        VariableOrdering::new(vec![(A, vec![2, 2]), (B, vec![]), (C, vec![3])]).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify row-major placement at each variable's offset and zero fill for
    // an absent variable.
    //
    // Given
    // -----
    // - A = [[1, 2], [3, 4]], C = [5, 6, 7], B absent.
    //
    // Expect
    // ------
    // - [1, 2, 3, 4, 0, 5, 6, 7].
    fn flatten_places_blocks_and_zero_fills() {
        // Arrange
        let map = TensorMap::from([
            (A, array![[1.0, 2.0], [3.0, 4.0]].into_dyn()),
            (C, array![5.0, 6.0, 7.0].into_dyn()),
        ]);

        // Act
        let flat = flatten(&map, &ordering()).unwrap();

        // Assert
        assert_eq!(flat, array![1.0, 2.0, 3.0, 4.0, 0.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    // Purpose
    // -------
    // Verify blocks are addressed by offset slices regardless of the memory
    // layout on either side.
    //
    // Given
    // -----
    // - A stored transposed (logical [[1, 2], [3, 4]]), C = [5, 6, 7].
    // - A strided view taking every other element of a longer vector.
    //
    // Expect
    // ------
    // - flatten writes logical row-major order at each offset.
    // - unflatten reads each block from the view at its offset.
    fn blocks_follow_offsets_for_non_contiguous_inputs() {
        // Arrange
        let map = TensorMap::from([
            (A, array![[1.0, 3.0], [2.0, 4.0]].reversed_axes().into_dyn()),
            (C, array![5.0, 6.0, 7.0].into_dyn()),
        ]);
        let padded = array![1.0, -1.0, 2.0, -1.0, 3.0, -1.0, 4.0, -1.0, 0.0, -1.0, 5.0, -1.0, 6.0, -1.0, 7.0, -1.0];

        // Act
        let flat = flatten(&map, &ordering()).unwrap();
        let split = unflatten(padded.slice(s![..;2]), &ordering()).unwrap();

        // Assert
        assert_eq!(flat, array![1.0, 2.0, 3.0, 4.0, 0.0, 5.0, 6.0, 7.0]);
        assert_eq!(split[&A], array![[1.0, 2.0], [3.0, 4.0]].into_dyn());
        assert_eq!(split[&B], arr0(0.0).into_dyn());
        assert_eq!(split[&C], array![5.0, 6.0, 7.0].into_dyn());
    }

    #[test]
    // Purpose
    // -------
    // Ensure mis-sized inputs fail in both directions.
    //
    // Given
    // -----
    // - An entry for C with 2 elements; a flat vector of length 7.
    //
    // Expect
    // ------
    // - EntryLengthMismatch from flatten; DimensionMismatch from unflatten.
    fn length_mismatches_are_errors() {
        // Arrange
        let map = TensorMap::from([(C, array![1.0, 2.0].into_dyn())]);
        let short = Array1::<f64>::zeros(7);

        // Act
        let flat = flatten(&map, &ordering());
        let split = unflatten(short.view(), &ordering());

        // Assert
        assert_eq!(flat, Err(GradientError::EntryLengthMismatch { node: C, expected: 3, found: 2 }));
        assert_eq!(split, Err(GradientError::DimensionMismatch { expected: 8, found: 7 }));
    }

    #[test]
    // Purpose
    // -------
    // Check the round trip for a sparse map: absent variables come back as
    // explicit zeros and flattening again reproduces the vector.
    //
    // Given
    // -----
    // - A sparse map with only B = 2.5.
    //
    // Expect
    // ------
    // - unflatten(flatten(m)) has B = 2.5 and all-zero A and C, which is
    //   equivalent to m once absent entries count as zeros.
    // - flatten(unflatten(v)) == v.
    fn round_trip_respects_sparse_zero_convention() {
        // Arrange
        let map = TensorMap::from([(B, arr0(2.5).into_dyn())]);

        // Act
        let flat = flatten(&map, &ordering()).unwrap();
        let back = unflatten(flat.view(), &ordering()).unwrap();
        let again = flatten(&back, &ordering()).unwrap();

        // Assert
        assert_eq!(back[&B], arr0(2.5).into_dyn());
        assert!(back[&A].iter().chain(back[&C].iter()).all(|&v| v == 0.0));
        assert_eq!(back[&A].shape(), &[2, 2]);
        assert!(tensor_maps_equivalent(&back, &map));
        assert!(!tensor_maps_equivalent(&back, &TensorMap::new()));
        assert_eq!(again, flat);
    }
}

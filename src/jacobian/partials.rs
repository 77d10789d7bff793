//! jacobian::partials — the sparse partial-derivative map.
//!
//! Purpose
//! -------
//! Hold `∂(node)/∂(source)` for every source the node depends on, keyed by
//! source id. Sparsity is the scaling mechanism: a source absent from the map
//! has an identically zero derivative, so independent variables cost nothing.
//!
//! Key behaviors
//! -------------
//! - Seeds: [`JacobianMap::identity`] for a latent w.r.t. itself and
//!   [`JacobianMap::constant`] for the zero derivative.
//! - Structural operators that only touch the output block: `reduce_sum`,
//!   `reshape`, `slice`, `permute`, `concat`, `scale`.
//! - Source-block counterparts used when adjoints flow from a node to its
//!   parents: `reshape_source`, `broadcast_source`, `reduce_source_to`,
//!   `slice_source`.
//! - [`tensor_maps_equivalent`] / [`JacobianMap::equivalent`] compare maps
//!   with a missing key and an all-zero entry treated as equal.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every entry has shape `output_shape ++ source_shape`, output axes first.
//! - Maps are immutable; each operator returns a new map.
//!
//! Conventions
//! -----------
//! - Multiplier-driven operators live in `combine`; matrix contractions live
//!   in `contraction`.
use std::collections::{BTreeMap, BTreeSet};

use ndarray::{ArrayD, Axis, Dimension, IxDyn, Slice, concatenate};

use crate::{
    graph::{NodeId, Tensor},
    jacobian::{
        errors::{JacobianError, JacobianResult},
        shape::{
            broadcast_to, check_axis, check_permutation, concat_shape, element_count, padded, permute,
            reshape_row_major,
        },
    },
};

/// Per-variable tensors keyed by node id (values, or scalar gradients).
pub type TensorMap = BTreeMap<NodeId, Tensor>;

/// Sparse Jacobian of one node with respect to its latent sources.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianMap {
    output_shape: Vec<usize>,
    partials: TensorMap,
}

impl JacobianMap {
    /// `∂x/∂x` for a node of `shape`: an identity of size `n = prod(shape)`
    /// laid out as `shape ++ shape`.
    pub fn identity(id: NodeId, shape: &[usize]) -> Self {
        let rank = shape.len();
        let eye = ArrayD::from_shape_fn(IxDyn(&concat_shape(shape, shape)), |idx: IxDyn| {
            let idx = idx.slice();
            if idx[..rank] == idx[rank..] { 1.0 } else { 0.0 }
        });
        Self { output_shape: shape.to_vec(), partials: BTreeMap::from([(id, eye)]) }
    }

    /// The zero derivative of a node with `output_shape`.
    pub fn constant(output_shape: &[usize]) -> Self {
        Self { output_shape: output_shape.to_vec(), partials: BTreeMap::new() }
    }

    /// Wrap caller-built partials after checking each leads with `output_shape`.
    ///
    /// # Errors
    /// - [`JacobianError::ShapeMismatch`] for an entry whose leading axes are
    ///   not `output_shape`.
    pub fn from_partials(output_shape: &[usize], partials: TensorMap) -> JacobianResult<Self> {
        let rank = output_shape.len();
        for tensor in partials.values() {
            if tensor.ndim() < rank || &tensor.shape()[..rank] != output_shape {
                return Err(JacobianError::ShapeMismatch {
                    context: "jacobian entry",
                    expected: output_shape.to_vec(),
                    found: tensor.shape().to_vec(),
                });
            }
        }
        Ok(Self { output_shape: output_shape.to_vec(), partials })
    }

    pub(crate) fn from_parts(output_shape: Vec<usize>, partials: TensorMap) -> Self {
        Self { output_shape, partials }
    }

    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    pub fn output_rank(&self) -> usize {
        self.output_shape.len()
    }

    /// `∂(node)/∂(source)`, or `None` when the derivative is zero.
    pub fn with_respect_to(&self, source: NodeId) -> Option<&Tensor> {
        self.partials.get(&source)
    }

    /// Shape of `source` as recorded in this map's trailing axes.
    pub fn source_shape(&self, source: NodeId) -> Option<&[usize]> {
        self.partials.get(&source).map(|t| &t.shape()[self.output_rank()..])
    }

    pub fn sources(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.partials.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Tensor)> + '_ {
        self.partials.iter().map(|(&id, t)| (id, t))
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    pub fn into_partials(self) -> TensorMap {
        self.partials
    }

    /// Gradients of a single-element node, each shaped like its source.
    ///
    /// # Errors
    /// - [`JacobianError::ShapeMismatch`] unless the output has exactly one
    ///   element.
    pub fn into_gradients(self) -> JacobianResult<TensorMap> {
        if element_count(&self.output_shape) != 1 {
            return Err(JacobianError::ShapeMismatch {
                context: "gradient of a non-scalar node",
                expected: Vec::new(),
                found: self.output_shape,
            });
        }
        let rank = self.output_shape.len();
        self.partials
            .into_iter()
            .map(|(id, t)| {
                let source = t.shape()[rank..].to_vec();
                Ok((id, reshape_row_major(&t, &source, "gradient")?))
            })
            .collect()
    }

    /// Multiply every entry by a scalar.
    pub fn scale(&self, factor: f64) -> Self {
        let partials = self.partials.iter().map(|(&id, t)| (id, t * factor)).collect();
        Self { output_shape: self.output_shape.clone(), partials }
    }

    /// Sum over output axes. `keep_dims` collapses them to size 1 instead of
    /// dropping them. Source axes are never touched.
    ///
    /// # Errors
    /// - [`JacobianError::AxisOutOfRange`] for an axis beyond the output rank.
    pub fn reduce_sum(&self, over_axes: &[usize], keep_dims: bool) -> JacobianResult<Self> {
        let rank = self.output_rank();
        let mut axes = over_axes.to_vec();
        axes.sort_unstable();
        axes.dedup();
        for &axis in &axes {
            check_axis(axis, rank)?;
        }

        let output_shape = self
            .output_shape
            .iter()
            .enumerate()
            .filter_map(|(i, &d)| if axes.contains(&i) { keep_dims.then_some(1) } else { Some(d) })
            .collect();

        self.map_entries(output_shape, |t, _| {
            let mut reduced = t.clone();
            for &axis in axes.iter().rev() {
                reduced = reduced.sum_axis(Axis(axis));
                if keep_dims {
                    reduced = reduced.insert_axis(Axis(axis));
                }
            }
            Ok(reduced)
        })
    }

    /// Reinterpret the output block as `shape` (row-major).
    ///
    /// # Errors
    /// - [`JacobianError::ShapeMismatch`] if the element counts differ.
    pub fn reshape(&self, shape: &[usize]) -> JacobianResult<Self> {
        if element_count(shape) != element_count(&self.output_shape) {
            return Err(JacobianError::ShapeMismatch {
                context: "reshape",
                expected: self.output_shape.clone(),
                found: shape.to_vec(),
            });
        }
        self.map_entries(shape.to_vec(), |t, source| {
            reshape_row_major(t, &concat_shape(shape, source), "reshape")
        })
    }

    /// Select `index` along output `axis`, keeping the axis with size 1.
    ///
    /// # Errors
    /// - [`JacobianError::AxisOutOfRange`] for a bad axis or index.
    pub fn slice(&self, axis: usize, index: usize) -> JacobianResult<Self> {
        check_axis(axis, self.output_rank())?;
        check_axis(index, self.output_shape[axis])?;
        let mut output_shape = self.output_shape.clone();
        output_shape[axis] = 1;
        self.map_entries(output_shape, |t, _| {
            Ok(t.slice_axis(Axis(axis), Slice::from(index..index + 1)).to_owned())
        })
    }

    /// Reorder output axes; source axes keep their trailing positions.
    ///
    /// # Errors
    /// - [`JacobianError::InvalidPermutation`] unless `order` permutes
    ///   `0..output_rank`.
    pub fn permute(&self, order: &[usize]) -> JacobianResult<Self> {
        let rank = self.output_rank();
        check_permutation(order, rank)?;
        let output_shape = order.iter().map(|&i| self.output_shape[i]).collect();
        self.map_entries(output_shape, |t, source| {
            let full: Vec<usize> = order.iter().copied().chain(rank..rank + source.len()).collect();
            permute(t, &full)
        })
    }

    /// Concatenate Jacobians along output `axis`. A source missing from one
    /// part contributes zeros of that part's shape.
    ///
    /// # Errors
    /// - [`JacobianError::ShapeMismatch`] for no parts, differing ranks, or
    ///   differing sizes off the concatenation axis.
    /// - [`JacobianError::AxisOutOfRange`] for a bad axis.
    pub fn concat(axis: usize, parts: &[&JacobianMap]) -> JacobianResult<Self> {
        let first = parts.first().ok_or(JacobianError::ShapeMismatch {
            context: "concat of zero parts",
            expected: Vec::new(),
            found: Vec::new(),
        })?;
        check_axis(axis, first.output_rank())?;

        let mut output_shape = first.output_shape.clone();
        output_shape[axis] = 0;
        for part in parts {
            let compatible = part.output_rank() == first.output_rank()
                && part
                    .output_shape
                    .iter()
                    .zip(&first.output_shape)
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !compatible {
                return Err(JacobianError::ShapeMismatch {
                    context: "concat",
                    expected: first.output_shape.clone(),
                    found: part.output_shape.clone(),
                });
            }
            output_shape[axis] += part.output_shape[axis];
        }

        let sources: BTreeSet<NodeId> = parts.iter().flat_map(|p| p.sources()).collect();
        let mut partials = TensorMap::new();
        for id in sources {
            let source: Vec<usize> = parts
                .iter()
                .find_map(|p| p.source_shape(id))
                .map(<[usize]>::to_vec)
                .unwrap_or_default();
            let blocks: Vec<Tensor> = parts
                .iter()
                .map(|p| match p.with_respect_to(id) {
                    Some(t) => t.clone(),
                    None => ArrayD::zeros(IxDyn(&concat_shape(&p.output_shape, &source))),
                })
                .collect();
            let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
            let joined = concatenate(Axis(axis), &views).map_err(|_| JacobianError::ShapeMismatch {
                context: "concat source block",
                expected: concat_shape(&output_shape, &source),
                found: blocks.iter().flat_map(|b| b.shape().to_vec()).collect(),
            })?;
            partials.insert(id, joined);
        }

        Ok(Self { output_shape, partials })
    }

    /// Equality under the sparse-zero convention: same output shape, and a
    /// source missing from one side is all zeros on the other.
    pub fn equivalent(&self, other: &JacobianMap) -> bool {
        self.output_shape == other.output_shape
            && tensor_maps_equivalent(&self.partials, &other.partials)
    }

    // ---- Source-side operators ----

    /// Reinterpret every entry's source block as `source_shape` (row-major).
    ///
    /// # Errors
    /// - [`JacobianError::ShapeMismatch`] if an entry's source element count
    ///   differs from that of `source_shape`.
    pub fn reshape_source(&self, source_shape: &[usize]) -> JacobianResult<Self> {
        let output = self.output_shape.clone();
        self.map_entries(output.clone(), |t, _| {
            reshape_row_major(t, &concat_shape(&output, source_shape), "reshape source")
        })
    }

    /// Broadcast every entry's source block up to `source_shape`, with source
    /// axes aligned on the right as in numpy.
    ///
    /// # Errors
    /// - [`JacobianError::ShapeMismatch`] if a source block does not broadcast
    ///   to `source_shape`.
    pub fn broadcast_source(&self, source_shape: &[usize]) -> JacobianResult<Self> {
        let output = self.output_shape.clone();
        self.map_entries(output.clone(), |t, source| {
            if source.len() > source_shape.len() {
                return Err(JacobianError::ShapeMismatch {
                    context: "broadcast source",
                    expected: source_shape.to_vec(),
                    found: source.to_vec(),
                });
            }
            let lifted_source = padded(source, source_shape.len() - source.len(), 0);
            let lifted = reshape_row_major(t, &concat_shape(&output, &lifted_source), "broadcast source")?;
            broadcast_to(&lifted, &concat_shape(&output, source_shape), "broadcast source")
        })
    }

    /// Sum every entry's source block down to `source_shape`: the adjoint of
    /// broadcasting `source_shape` up to the current source block.
    ///
    /// # Errors
    /// - [`JacobianError::ShapeMismatch`] unless `source_shape` broadcasts to
    ///   each entry's source block.
    pub fn reduce_source_to(&self, source_shape: &[usize]) -> JacobianResult<Self> {
        let rank = self.output_rank();
        self.map_entries(self.output_shape.clone(), |t, source| {
            let mismatch = || JacobianError::ShapeMismatch {
                context: "reduce source",
                expected: source_shape.to_vec(),
                found: source.to_vec(),
            };
            if source_shape.len() > source.len() {
                return Err(mismatch());
            }
            let extra = source.len() - source_shape.len();
            let mut reduced = t.clone();
            for _ in 0..extra {
                reduced = reduced.sum_axis(Axis(rank));
            }
            for (i, (&want, &have)) in source_shape.iter().zip(&source[extra..]).enumerate() {
                if want == have {
                    continue;
                }
                if want != 1 {
                    return Err(mismatch());
                }
                reduced = reduced.sum_axis(Axis(rank + i)).insert_axis(Axis(rank + i));
            }
            Ok(reduced)
        })
    }

    /// Keep positions `start..start + len` of source `axis` in every entry.
    ///
    /// # Errors
    /// - [`JacobianError::AxisOutOfRange`] for a bad axis.
    /// - [`JacobianError::ShapeMismatch`] if the range runs past the axis.
    pub fn slice_source(&self, axis: usize, start: usize, len: usize) -> JacobianResult<Self> {
        let rank = self.output_rank();
        self.map_entries(self.output_shape.clone(), |t, source| {
            check_axis(axis, source.len())?;
            if start + len > source[axis] {
                return Err(JacobianError::ShapeMismatch {
                    context: "slice source",
                    expected: vec![start + len],
                    found: source.to_vec(),
                });
            }
            Ok(t.slice_axis(Axis(rank + axis), Slice::from(start..start + len)).to_owned())
        })
    }

    // ---- Helper methods ----

    /// Apply `f(entry, source_shape)` to every entry under a new output shape.
    pub(crate) fn map_entries<F>(&self, output_shape: Vec<usize>, f: F) -> JacobianResult<Self>
    where
        F: Fn(&Tensor, &[usize]) -> JacobianResult<Tensor>,
    {
        let rank = self.output_rank();
        let partials = self
            .partials
            .iter()
            .map(|(&id, t)| Ok((id, f(t, &t.shape()[rank..])?)))
            .collect::<JacobianResult<TensorMap>>()?;
        Ok(Self { output_shape, partials })
    }
}

/// Compare two tensor maps under the sparse-zero convention: a key present
/// on one side only must hold an all-zero tensor there.
pub fn tensor_maps_equivalent(a: &TensorMap, b: &TensorMap) -> bool {
    let keys: BTreeSet<NodeId> = a.keys().chain(b.keys()).copied().collect();
    keys.into_iter().all(|id| match (a.get(&id), b.get(&id)) {
        (Some(x), Some(y)) => x == y,
        (Some(t), None) | (None, Some(t)) => t.iter().all(|&v| v == 0.0),
        (None, None) => true,
    })
}

//! Canonical flat layout for a set of latent variables.
use std::collections::HashSet;

use crate::{
    gradient::errors::{GradientError, GradientResult},
    graph::{NodeGraph, NodeId},
};

/// Ordered `(variable, shape)` pairs defining where each variable lives in a
/// flat parameter vector.
///
/// Variable `i` occupies `offset(i)..offset(i) + element_count(i)`, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableOrdering {
    variables: Vec<(NodeId, Vec<usize>)>,
    offsets: Vec<usize>,
    total_len: usize,
}

impl VariableOrdering {
    /// # Errors
    /// - [`GradientError::DuplicateVariable`] if an id repeats.
    pub fn new(variables: Vec<(NodeId, Vec<usize>)>) -> GradientResult<Self> {
        let mut seen = HashSet::with_capacity(variables.len());
        if let Some(&(node, _)) = variables.iter().find(|(id, _)| !seen.insert(*id)) {
            return Err(GradientError::DuplicateVariable { node });
        }

        let mut offsets = Vec::with_capacity(variables.len());
        let mut total_len = 0;
        for (_, shape) in &variables {
            offsets.push(total_len);
            total_len += shape.iter().product::<usize>();
        }
        Ok(Self { variables, offsets, total_len })
    }

    /// Ordering over `ids` with shapes read from `graph`.
    pub fn from_graph<G: NodeGraph + ?Sized>(graph: &G, ids: &[NodeId]) -> GradientResult<Self> {
        Self::new(ids.iter().map(|&id| (id, graph.shape(id).to_vec())).collect())
    }

    /// Every unobserved random variable among `ids`, in the given order.
    pub fn latents_of<G: NodeGraph + ?Sized>(
        graph: &G, ids: impl IntoIterator<Item = NodeId>,
    ) -> GradientResult<Self> {
        let latents: Vec<NodeId> =
            ids.into_iter().filter(|&id| graph.is_unobserved_random_variable(id)).collect();
        Self::from_graph(graph, &latents)
    }

    /// Total number of scalars across all variables.
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.variables.iter().map(|(id, _)| *id)
    }

    /// `(id, shape, offset)` for each variable in order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[usize], usize)> + '_ {
        self.variables
            .iter()
            .zip(&self.offsets)
            .map(|((id, shape), &offset)| (*id, shape.as_slice(), offset))
    }

    /// Offset of `id` in the flat layout, if it is part of the ordering.
    pub fn offset_of(&self, id: NodeId) -> Option<usize> {
        self.variables.iter().position(|(v, _)| *v == id).map(|i| self.offsets[i])
    }
}

//! Upward breadth-first traversal with short-circuit failure.
//!
//! Both the outer differentiability walk and the inner constant-value walk
//! share this worklist. It uses an explicit queue so deep graphs cannot
//! exhaust the stack.
use std::collections::{HashSet, VecDeque};

use crate::graph::{NodeGraph, NodeId};

/// Walk from `seeds` toward parents.
///
/// Every dequeued node is first tested with `fails`; the first node for which
/// it returns `true` aborts the walk and is returned as `Err(node)`. Otherwise
/// the node's unvisited parents are queued when `expand(node)` is `true`.
///
/// Returns the full visited set (seeds included) when the queue drains
/// without a failure.
pub(crate) fn upward_bfs<G, F, E>(
    graph: &G, seeds: impl IntoIterator<Item = NodeId>, mut fails: F, mut expand: E,
) -> Result<HashSet<NodeId>, NodeId>
where
    G: NodeGraph + ?Sized,
    F: FnMut(NodeId) -> bool,
    E: FnMut(NodeId) -> bool,
{
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    for seed in seeds {
        if visited.insert(seed) {
            queue.push_back(seed);
        }
    }

    while let Some(visiting) = queue.pop_front() {
        if fails(visiting) {
            return Err(visiting);
        }
        if expand(visiting) {
            for &parent in graph.parents(visiting) {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
    }

    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphArena;
    use ndarray::arr0;

    #[test]
    // Purpose
    // -------
    // Verify that the walk visits a shared ancestor once and reports the
    // whole visited set on success.
    //
    // Given
    // -----
    // - A diamond: c -> (a, b) -> d.
    //
    // Expect
    // ------
    // - Starting from d with no failures, all four nodes are visited.
    fn upward_bfs_visits_diamond_once() {
        // Arrange
        let mut g = GraphArena::new();
        let c = g.add_constant(arr0(1.0).into_dyn());
        let a = g.add_deterministic("exp", arr0(1.0).into_dyn(), &[c], true).unwrap();
        let b = g.add_deterministic("log", arr0(1.0).into_dyn(), &[c], true).unwrap();
        let d = g.add_deterministic("add", arr0(1.0).into_dyn(), &[a, b], true).unwrap();
        let mut dequeued = 0;

        // Act
        let visited = upward_bfs(
            &g,
            [d],
            |_| {
                dequeued += 1;
                false
            },
            |_| true,
        );

        // Assert
        let visited = visited.expect("no failure condition was set");
        assert_eq!(visited.len(), 4);
        assert_eq!(dequeued, 4);
    }

    #[test]
    // Purpose
    // -------
    // Ensure the first failing node stops the walk before its parents are
    // expanded.
    //
    // Given
    // -----
    // - A chain c -> a -> d with `a` flagged as failing.
    //
    // Expect
    // ------
    // - The walk returns Err(a) and never dequeues c.
    fn upward_bfs_short_circuits_on_failure() {
        // Arrange
        let mut g = GraphArena::new();
        let c = g.add_constant(arr0(1.0).into_dyn());
        let a = g.add_deterministic("exp", arr0(1.0).into_dyn(), &[c], true).unwrap();
        let d = g.add_deterministic("log", arr0(1.0).into_dyn(), &[a], true).unwrap();
        let mut saw_c = false;

        // Act
        let result = upward_bfs(
            &g,
            [d],
            |n| {
                saw_c |= n == c;
                n == a
            },
            |_| true,
        );

        // Assert
        assert_eq!(result, Err(a));
        assert!(!saw_c);
    }
}

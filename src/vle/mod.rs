//! Variable-length edge (VLE) runtime.
//!
//! The planner emits `vle(start, end, constraint, lo, hi, direction)` as a
//! lateral set-returning call; at execution time the host drives
//! [`traversal::VleTraversal`] one path per invocation over the in-memory
//! [`graph::Graph`] index.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub mod graph;
pub mod traversal;

pub use graph::{Edge, Graph, Vertex};
pub use traversal::{TraversalError, VlePath, VleSpec, VleTraversal};

/// Traversal direction of a variable-length relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
    Either,
}

/// Runtime form of the `enforce_edge_uniqueness` predicate: each group is
/// the id set of one edge handle (a single id for a plain edge, every edge
/// id of the path for a VLE handle). False as soon as any id occurs twice.
pub fn enforce_edge_uniqueness(groups: &[Vec<i64>]) -> bool {
    let mut seen: HashSet<i64> = HashSet::new();
    for group in groups {
        for id in group {
            if !seen.insert(*id) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_uniqueness_accepts_disjoint_sets() {
        assert!(enforce_edge_uniqueness(&[vec![1], vec![2, 3], vec![4]]));
    }

    #[test]
    fn test_edge_uniqueness_rejects_collisions() {
        assert!(!enforce_edge_uniqueness(&[vec![1], vec![2, 1]]));
        assert!(!enforce_edge_uniqueness(&[vec![5, 5]]));
    }

    #[test]
    fn test_edge_uniqueness_trivial_cases() {
        assert!(enforce_edge_uniqueness(&[]));
        assert!(enforce_edge_uniqueness(&[vec![7]]));
    }
}

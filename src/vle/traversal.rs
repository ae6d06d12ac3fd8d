//! Restartable depth-first VLE traversal.
//!
//! One [`VleTraversal`] holds the per-call-site state of a variable-length
//! expansion: the edge/vertex/path stacks and the visited-edge map. Each
//! `next()` resumes where the previous call yielded and returns at most one
//! path; when the edge stack drains the traversal releases its state and
//! stays exhausted. Nothing here blocks — the host's tuple loop drives it.
//!
//! An edge stays on the edge stack while its subtree is explored; peeking a
//! visited edge that is the current path head therefore means the subtree
//! is done and the walk backtracks.

use std::collections::HashMap;

use thiserror::Error;

use super::graph::Graph;
use super::Direction;
use crate::graph_catalog::{GraphCatalog, LabelKind};
use crate::query_planner::logical_expr::LogicalExpr;
use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraversalError {
    #[error("invalid variable-length range: {lo}..{hi}")]
    InvalidRange { lo: u32, hi: u32 },
    #[error("malformed vle call site: {0}")]
    BadCallSite(String),
}

/// Call-site arguments of one `vle()` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct VleSpec {
    pub start: i64,
    /// Target vertex; `None` accepts any endpoint
    pub end: Option<i64>,
    pub lo: u32,
    /// `None` means unbounded
    pub hi: Option<u32>,
    pub direction: Direction,
    /// Edge label filter, already resolved to a label id
    pub label_id: Option<i32>,
    /// Per-edge property containment template
    pub props: Option<Value>,
}

impl VleSpec {
    /// Build the runtime spec from the argument list of an emitted
    /// `vle(start, end, constraint, lo, hi, direction)` call. The endpoint
    /// arguments are row-dependent and supplied by the caller; the plan
    /// provides the constants, with the edge label of the constraint
    /// resolved against the catalog.
    pub fn from_plan_args(
        args: &[LogicalExpr],
        catalog: &GraphCatalog,
        graph_oid: u32,
        start: i64,
        end: Option<i64>,
    ) -> Result<VleSpec, TraversalError> {
        if args.len() != 6 {
            return Err(TraversalError::BadCallSite(format!(
                "expected 6 arguments, found {}",
                args.len()
            )));
        }

        let constraint = args[2]
            .as_constant_value()
            .ok_or_else(|| TraversalError::BadCallSite("non-constant edge constraint".into()))?;
        let (label, props) = match constraint {
            Value::Map(mut entries) => {
                let label = match entries.remove("label") {
                    Some(Value::String(name)) => Some(name),
                    Some(Value::Null) | None => None,
                    Some(other) => {
                        return Err(TraversalError::BadCallSite(format!(
                            "constraint label must be a string, found {}",
                            other
                        )))
                    }
                };
                let props = match entries.remove("properties") {
                    Some(Value::Null) | None => None,
                    Some(template) => Some(template),
                };
                (label, props)
            }
            other => {
                return Err(TraversalError::BadCallSite(format!(
                    "constraint must be a map, found {}",
                    other
                )))
            }
        };

        let label_id = match label {
            None => None,
            Some(name) => Some(
                catalog
                    .label_of_kind(graph_oid, &name, LabelKind::Edge)
                    .map_err(|e| TraversalError::BadCallSite(e.to_string()))?
                    .id,
            ),
        };

        let lo = match args[3].as_constant_value() {
            Some(Value::Integer(lo)) if lo >= 0 => lo as u32,
            other => {
                return Err(TraversalError::BadCallSite(format!(
                    "lower bound must be a non-negative integer, found {:?}",
                    other
                )))
            }
        };
        let hi = match args[4].as_constant_value() {
            Some(Value::Null) => None,
            Some(Value::Integer(hi)) if hi >= 0 => Some(hi as u32),
            other => {
                return Err(TraversalError::BadCallSite(format!(
                    "upper bound must be a non-negative integer or null, found {:?}",
                    other
                )))
            }
        };

        let direction = match args[5].as_constant_value() {
            Some(Value::String(name)) => match name.as_str() {
                "outgoing" => Direction::Outgoing,
                "incoming" => Direction::Incoming,
                "either" => Direction::Either,
                other => {
                    return Err(TraversalError::BadCallSite(format!(
                        "unknown direction \"{}\"",
                        other
                    )))
                }
            },
            other => {
                return Err(TraversalError::BadCallSite(format!(
                    "direction must be a string, found {:?}",
                    other
                )))
            }
        };

        Ok(VleSpec {
            start,
            end,
            lo,
            hi,
            direction,
            label_id,
            props,
        })
    }
}

/// One materialized path: `vertices.len() == edges.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct VlePath {
    pub vertices: Vec<i64>,
    pub edges: Vec<i64>,
}

impl VlePath {
    pub fn start(&self) -> i64 {
        self.vertices[0]
    }

    pub fn end(&self) -> i64 {
        *self.vertices.last().expect("paths have at least one vertex")
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[derive(Debug)]
pub struct VleTraversal<'g> {
    graph: &'g Graph,
    spec: VleSpec,
    /// Expansion guard applied when `spec.hi` is unbounded
    depth_limit: Option<u32>,

    initialized: bool,
    done: bool,
    yielded_zero_length: bool,

    edge_stack: Vec<i64>,
    path_stack: Vec<i64>,
    /// Parent vertices, maintained only for undirected traversals: one push
    /// per pushed edge, one pop per backtracked edge
    vertex_stack: Vec<i64>,
    /// Vertices along the current path, head last
    trail: Vec<i64>,
    visited: HashMap<i64, bool>,
}

impl<'g> VleTraversal<'g> {
    pub fn new(graph: &'g Graph, spec: VleSpec) -> Result<Self, TraversalError> {
        if let Some(hi) = spec.hi {
            if spec.lo > hi {
                return Err(TraversalError::InvalidRange { lo: spec.lo, hi });
            }
        }
        Ok(VleTraversal {
            graph,
            spec,
            depth_limit: None,
            initialized: false,
            done: false,
            yielded_zero_length: false,
            edge_stack: Vec::new(),
            path_stack: Vec::new(),
            vertex_stack: Vec::new(),
            trail: Vec::new(),
            visited: HashMap::new(),
        })
    }

    /// Cap expansion depth when the range is unbounded. The embedding host
    /// wires this from its configuration.
    pub fn with_depth_limit(mut self, limit: u32) -> Self {
        self.depth_limit = Some(limit);
        self
    }

    /// Host-driven cancellation: drop all traversal state immediately.
    pub fn cancel(&mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.done = true;
        self.edge_stack = Vec::new();
        self.path_stack = Vec::new();
        self.vertex_stack = Vec::new();
        self.trail = Vec::new();
        self.visited = HashMap::new();
    }

    fn edge_matches(&self, edge_id: i64) -> bool {
        let Some(edge) = self.graph.edge(edge_id) else {
            return false;
        };
        if let Some(label_id) = self.spec.label_id {
            if edge.label_id != label_id {
                return false;
            }
        }
        if let Some(template) = &self.spec.props {
            if !edge.properties.contains(template) {
                return false;
            }
        }
        true
    }

    /// Push the candidate edges of `vertex`, skipping visited ones. For
    /// undirected traversals the source vertex is pushed alongside each
    /// edge so the walk can tell which endpoint it came from.
    fn expand(&mut self, vertex: i64) {
        for edge_id in self.graph.incident_edges(vertex, self.spec.direction) {
            if self.visited.get(&edge_id).copied().unwrap_or(false) {
                continue;
            }
            if !self.edge_matches(edge_id) {
                continue;
            }
            self.edge_stack.push(edge_id);
            if self.spec.direction == Direction::Either {
                self.vertex_stack.push(vertex);
            }
        }
    }

    fn next_vertex(&self, edge_id: i64) -> i64 {
        let edge = self.graph.edge(edge_id).expect("stack holds known edges");
        match self.spec.direction {
            Direction::Outgoing => edge.end_id,
            Direction::Incoming => edge.start_id,
            Direction::Either => {
                let parent = *self
                    .vertex_stack
                    .last()
                    .expect("undirected walks track parents");
                if edge.start_id == parent {
                    edge.end_id
                } else {
                    edge.start_id
                }
            }
        }
    }

    fn expansion_cap(&self) -> Option<u32> {
        self.spec.hi.or(self.depth_limit)
    }

    fn current_path(&self) -> VlePath {
        VlePath {
            vertices: self.trail.clone(),
            edges: self.path_stack.clone(),
        }
    }
}

impl Iterator for VleTraversal<'_> {
    type Item = VlePath;

    fn next(&mut self) -> Option<VlePath> {
        if self.done {
            return None;
        }

        if !self.initialized {
            self.initialized = true;
            self.trail.push(self.spec.start);
            self.expand(self.spec.start);
            log::debug!(
                "vle: traversal from {} initialized with {} candidate edges",
                self.spec.start,
                self.edge_stack.len()
            );
        }

        // a zero-length range matches the start vertex itself, once
        if self.spec.lo == 0 && !self.yielded_zero_length {
            self.yielded_zero_length = true;
            let matches_target = self
                .spec
                .end
                .map_or(true, |end| end == self.spec.start);
            if matches_target {
                return Some(VlePath {
                    vertices: vec![self.spec.start],
                    edges: Vec::new(),
                });
            }
        }

        while let Some(&edge_id) = self.edge_stack.last() {
            if self.visited.get(&edge_id).copied().unwrap_or(false) {
                if self.path_stack.last() == Some(&edge_id) {
                    // subtree exhausted: backtrack
                    self.path_stack.pop();
                    self.trail.pop();
                    self.visited.insert(edge_id, false);
                    self.edge_stack.pop();
                    if self.spec.direction == Direction::Either {
                        self.vertex_stack.pop();
                    }
                } else {
                    // a stale duplicate push: drop it
                    self.edge_stack.pop();
                }
                continue;
            }

            // advance along the edge; it stays on the stack under its
            // children until the walk backtracks through it
            self.visited.insert(edge_id, true);
            self.path_stack.push(edge_id);
            let vertex = self.next_vertex(edge_id);
            self.trail.push(vertex);

            let length = self.path_stack.len() as u32;
            let at_target = self.spec.end.map_or(true, |end| end == vertex);
            let in_bounds =
                length >= self.spec.lo && self.spec.hi.map_or(true, |hi| length <= hi);

            if self.expansion_cap().map_or(true, |cap| length < cap) {
                self.expand(vertex);
            }

            if at_target && in_bounds {
                return Some(self.current_path());
            }
        }

        log::debug!("vle: traversal from {} exhausted", self.spec.start);
        self.release();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vle::graph::{Edge, Vertex};

    fn vertex(id: i64) -> Vertex {
        Vertex {
            id,
            label_id: 1,
            properties: Value::Null,
        }
    }

    fn edge(id: i64, start: i64, end: i64) -> Edge {
        Edge {
            id,
            start_id: start,
            end_id: end,
            label_id: 2,
            properties: Value::Null,
        }
    }

    /// 1 → 2 → 3 → 4, plus a shortcut 1 → 3
    fn chain_graph() -> Graph {
        let mut g = Graph::new();
        for id in 1..=4 {
            g.add_vertex(vertex(id));
        }
        g.add_edge(edge(10, 1, 2));
        g.add_edge(edge(11, 2, 3));
        g.add_edge(edge(12, 3, 4));
        g.add_edge(edge(13, 1, 3));
        g
    }

    fn spec(start: i64, end: Option<i64>, lo: u32, hi: Option<u32>) -> VleSpec {
        VleSpec {
            start,
            end,
            lo,
            hi,
            direction: Direction::Outgoing,
            label_id: None,
            props: None,
        }
    }

    fn collect(graph: &Graph, spec: VleSpec) -> Vec<VlePath> {
        VleTraversal::new(graph, spec).unwrap().collect()
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let g = chain_graph();
        let err = VleTraversal::new(&g, spec(1, None, 3, Some(1))).unwrap_err();
        assert_eq!(err, TraversalError::InvalidRange { lo: 3, hi: 1 });
    }

    #[test]
    fn test_paths_to_fixed_target() {
        let g = chain_graph();
        let mut paths = collect(&g, spec(1, Some(3), 1, None));
        paths.sort_by_key(|p| p.len());
        // 1-(13)->3 and 1-(10)->2-(11)->3
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].edges, vec![13]);
        assert_eq!(paths[1].edges, vec![10, 11]);
        for p in &paths {
            assert_eq!(p.start(), 1);
            assert_eq!(p.end(), 3);
        }
    }

    #[test]
    fn test_length_bounds_are_honored() {
        let g = chain_graph();
        // exactly two hops from 1: 1→2→3 and 1→3→4
        let paths = collect(&g, spec(1, None, 2, Some(2)));
        let mut edge_sets: Vec<Vec<i64>> = paths.iter().map(|p| p.edges.clone()).collect();
        edge_sets.sort();
        assert_eq!(edge_sets, vec![vec![10, 11], vec![13, 12]]);
        for p in &paths {
            assert_eq!(p.len(), 2);
        }
    }

    #[test]
    fn test_no_edge_repeats_within_a_path() {
        // a cycle: 1 → 2 → 3 → 1
        let mut g = Graph::new();
        for id in 1..=3 {
            g.add_vertex(vertex(id));
        }
        g.add_edge(edge(10, 1, 2));
        g.add_edge(edge(11, 2, 3));
        g.add_edge(edge(12, 3, 1));

        let paths = collect(&g, spec(1, Some(1), 1, None));
        // only the full cycle returns to 1; it uses each edge once
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].edges, vec![10, 11, 12]);
        let mut ids = paths[0].edges.clone();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_each_path_yields_once() {
        let g = chain_graph();
        let paths = collect(&g, spec(1, None, 1, None));
        let mut seen: Vec<Vec<i64>> = paths.iter().map(|p| p.edges.clone()).collect();
        let total = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total, "duplicate path emitted");
        // all edge-acyclic outgoing paths from 1:
        // [10], [10,11], [10,11,12], [13], [13,12]
        assert_eq!(total, 5);
    }

    #[test]
    fn test_undirected_traversal_uses_parent_tracking() {
        // undirected square: 1 - 2 - 3 - 4 - 1
        let mut g = Graph::new();
        for id in 1..=4 {
            g.add_vertex(vertex(id));
        }
        g.add_edge(edge(10, 1, 2));
        g.add_edge(edge(11, 2, 3));
        g.add_edge(edge(12, 3, 4));
        g.add_edge(edge(13, 4, 1));

        let mut s = spec(1, Some(3), 1, None);
        s.direction = Direction::Either;
        let mut paths = collect(&g, s);
        paths.sort_by_key(|p| p.edges.clone());
        // both ways around the square
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].vertices, vec![1, 2, 3]);
        assert_eq!(paths[1].vertices, vec![1, 4, 3]);
    }

    #[test]
    fn test_zero_length_range_yields_start() {
        let g = chain_graph();
        let paths = collect(&g, spec(1, Some(1), 0, Some(0)));
        assert_eq!(paths.len(), 1);
        assert!(paths[0].is_empty());
        assert_eq!(paths[0].vertices, vec![1]);
    }

    #[test]
    fn test_label_and_property_filters() {
        let mut g = Graph::new();
        for id in 1..=3 {
            g.add_vertex(vertex(id));
        }
        let mut labeled = edge(10, 1, 2);
        labeled.label_id = 7;
        labeled.properties = Value::map([("weight", Value::Integer(5))]);
        g.add_edge(labeled);
        g.add_edge(edge(11, 1, 3));

        let mut s = spec(1, None, 1, None);
        s.label_id = Some(7);
        let paths = collect(&g, s.clone());
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].edges, vec![10]);

        s.label_id = None;
        s.props = Some(Value::map([("weight", Value::Integer(5))]));
        let paths = collect(&g, s);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].edges, vec![10]);
    }

    #[test]
    fn test_depth_limit_guards_unbounded_ranges() {
        // 1 → 2 → 3 → 4 chain, unbounded spec but capped at 2
        let g = chain_graph();
        let traversal = VleTraversal::new(&g, spec(1, None, 1, None))
            .unwrap()
            .with_depth_limit(2);
        let paths: Vec<VlePath> = traversal.collect();
        assert!(paths.iter().all(|p| p.len() <= 2));
        assert!(!paths.is_empty());
    }

    #[test]
    fn test_cancel_releases_state() {
        let g = chain_graph();
        let mut traversal = VleTraversal::new(&g, spec(1, None, 1, None)).unwrap();
        assert!(traversal.next().is_some());
        traversal.cancel();
        assert!(traversal.next().is_none());
    }

    #[test]
    fn test_self_loop_is_taken_once() {
        let mut g = Graph::new();
        g.add_vertex(vertex(1));
        g.add_edge(edge(10, 1, 1));

        let paths = collect(&g, spec(1, Some(1), 1, None));
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].edges, vec![10]);
        assert_eq!(paths[0].vertices, vec![1, 1]);
    }
}

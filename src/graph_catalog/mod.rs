//! Graph/label catalog consulted by the planner.
//!
//! Mirrors the three catalog relations the host engine exposes: a graph
//! table `(oid, name, namespace)`, a label table `(graph_oid, name, id,
//! kind, relation_oid)` and, per label, a fact table holding `id`
//! (plus `start_id`/`end_id` for edges) and `properties`. The host DBMS owns
//! the real catalog; this in-memory mirror is the seam the transformer and
//! the tests program against.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Every graph owns one label of each kind that entities fall into when the
/// pattern names none.
pub const DEFAULT_VERTEX_LABEL: &str = "_vertex";
pub const DEFAULT_EDGE_LABEL: &str = "_edge";
pub const DEFAULT_VERTEX_LABEL_ID: i32 = 1;
pub const DEFAULT_EDGE_LABEL_ID: i32 = 2;

/// Entity ids carry their label id in the top bits so a label check never
/// needs the label table.
const ENTITY_LOCAL_BITS: u32 = 48;
const ENTITY_LOCAL_MASK: i64 = (1 << ENTITY_LOCAL_BITS) - 1;

/// Compose an entity id from a label id and a per-label local id.
pub fn make_entity_id(label_id: i32, local: i64) -> i64 {
    ((label_id as i64) << ENTITY_LOCAL_BITS) | (local & ENTITY_LOCAL_MASK)
}

/// Recover the label id packed into an entity id.
pub fn extract_label_id(id: i64) -> i32 {
    (id >> ENTITY_LOCAL_BITS) as i32
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("graph \"{0}\" does not exist")]
    GraphNotFound(String),
    #[error("label \"{name}\" does not exist in graph oid {graph_oid}")]
    LabelNotFound { graph_oid: u32, name: String },
    #[error("label \"{name}\" is a {actual} label, not a {expected} label")]
    LabelKindMismatch {
        name: String,
        expected: LabelKind,
        actual: LabelKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Vertex,
    Edge,
}

impl std::fmt::Display for LabelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelKind::Vertex => f.write_str("vertex"),
            LabelKind::Edge => f.write_str("edge"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub oid: u32,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub graph_oid: u32,
    pub name: String,
    pub id: i32,
    pub kind: LabelKind,
    /// Oid of the per-label fact table
    pub relation_oid: u32,
}

/// In-memory catalog. Graph and label creation hand out oids from a single
/// counter so relation oids never collide with graph oids.
#[derive(Debug, Clone)]
pub struct GraphCatalog {
    graphs: HashMap<String, GraphRecord>,
    labels: HashMap<(u32, String), LabelRecord>,
    next_oid: u32,
    next_label_id: HashMap<u32, i32>,
}

impl GraphCatalog {
    pub fn new() -> Self {
        GraphCatalog {
            graphs: HashMap::new(),
            labels: HashMap::new(),
            next_oid: 16384,
            next_label_id: HashMap::new(),
        }
    }

    fn allocate_oid(&mut self) -> u32 {
        let oid = self.next_oid;
        self.next_oid += 1;
        oid
    }

    /// Create a graph together with its two default labels.
    pub fn create_graph(&mut self, name: &str) -> GraphRecord {
        if let Some(existing) = self.graphs.get(name) {
            return existing.clone();
        }
        let oid = self.allocate_oid();
        let record = GraphRecord {
            oid,
            name: name.to_string(),
            namespace: name.to_string(),
        };
        self.graphs.insert(name.to_string(), record.clone());
        self.next_label_id.insert(oid, DEFAULT_EDGE_LABEL_ID + 1);

        let vertex_rel = self.allocate_oid();
        self.labels.insert(
            (oid, DEFAULT_VERTEX_LABEL.to_string()),
            LabelRecord {
                graph_oid: oid,
                name: DEFAULT_VERTEX_LABEL.to_string(),
                id: DEFAULT_VERTEX_LABEL_ID,
                kind: LabelKind::Vertex,
                relation_oid: vertex_rel,
            },
        );
        let edge_rel = self.allocate_oid();
        self.labels.insert(
            (oid, DEFAULT_EDGE_LABEL.to_string()),
            LabelRecord {
                graph_oid: oid,
                name: DEFAULT_EDGE_LABEL.to_string(),
                id: DEFAULT_EDGE_LABEL_ID,
                kind: LabelKind::Edge,
                relation_oid: edge_rel,
            },
        );

        log::debug!("catalog: created graph \"{}\" (oid {})", name, oid);
        record
    }

    pub fn graph(&self, name: &str) -> Result<&GraphRecord, CatalogError> {
        self.graphs
            .get(name)
            .ok_or_else(|| CatalogError::GraphNotFound(name.to_string()))
    }

    pub fn label(&self, graph_oid: u32, name: &str) -> Result<&LabelRecord, CatalogError> {
        self.labels
            .get(&(graph_oid, name.to_string()))
            .ok_or_else(|| CatalogError::LabelNotFound {
                graph_oid,
                name: name.to_string(),
            })
    }

    /// Like [`Self::label`] but also checks the label kind, surfacing the
    /// vertex-vs-edge mismatch the resolver reports.
    pub fn label_of_kind(
        &self,
        graph_oid: u32,
        name: &str,
        kind: LabelKind,
    ) -> Result<&LabelRecord, CatalogError> {
        let record = self.label(graph_oid, name)?;
        if record.kind != kind {
            return Err(CatalogError::LabelKindMismatch {
                name: name.to_string(),
                expected: kind,
                actual: record.kind,
            });
        }
        Ok(record)
    }

    /// The default label of the given kind for `graph_oid`.
    pub fn default_label(&self, graph_oid: u32, kind: LabelKind) -> Result<&LabelRecord, CatalogError> {
        let name = match kind {
            LabelKind::Vertex => DEFAULT_VERTEX_LABEL,
            LabelKind::Edge => DEFAULT_EDGE_LABEL,
        };
        self.label(graph_oid, name)
    }

    /// Fetch-or-create, used by CREATE/MERGE directives where labels come
    /// into existence on demand.
    pub fn create_label_if_missing(
        &mut self,
        graph_oid: u32,
        name: &str,
        kind: LabelKind,
    ) -> Result<LabelRecord, CatalogError> {
        if let Some(existing) = self.labels.get(&(graph_oid, name.to_string())) {
            if existing.kind != kind {
                return Err(CatalogError::LabelKindMismatch {
                    name: name.to_string(),
                    expected: kind,
                    actual: existing.kind,
                });
            }
            return Ok(existing.clone());
        }
        let id = {
            let counter = self.next_label_id.entry(graph_oid).or_insert(DEFAULT_EDGE_LABEL_ID + 1);
            let id = *counter;
            *counter += 1;
            id
        };
        let relation_oid = self.allocate_oid();
        let record = LabelRecord {
            graph_oid,
            name: name.to_string(),
            id,
            kind,
            relation_oid,
        };
        self.labels
            .insert((graph_oid, name.to_string()), record.clone());
        log::debug!(
            "catalog: created {} label \"{}\" (id {}) in graph oid {}",
            kind,
            name,
            id,
            graph_oid
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_graph_installs_default_labels() {
        let mut catalog = GraphCatalog::new();
        let g = catalog.create_graph("g");
        let v = catalog.label(g.oid, DEFAULT_VERTEX_LABEL).unwrap();
        let e = catalog.label(g.oid, DEFAULT_EDGE_LABEL).unwrap();
        assert_eq!(v.id, DEFAULT_VERTEX_LABEL_ID);
        assert_eq!(e.id, DEFAULT_EDGE_LABEL_ID);
        assert_eq!(v.kind, LabelKind::Vertex);
        assert_eq!(e.kind, LabelKind::Edge);
    }

    #[test]
    fn test_create_label_on_demand_is_idempotent() {
        let mut catalog = GraphCatalog::new();
        let g = catalog.create_graph("g");
        let a = catalog
            .create_label_if_missing(g.oid, "Person", LabelKind::Vertex)
            .unwrap();
        let b = catalog
            .create_label_if_missing(g.oid, "Person", LabelKind::Vertex)
            .unwrap();
        assert_eq!(a, b);
        assert!(a.id > DEFAULT_EDGE_LABEL_ID);
    }

    #[test]
    fn test_label_kind_mismatch() {
        let mut catalog = GraphCatalog::new();
        let g = catalog.create_graph("g");
        catalog
            .create_label_if_missing(g.oid, "KNOWS", LabelKind::Edge)
            .unwrap();
        let err = catalog
            .label_of_kind(g.oid, "KNOWS", LabelKind::Vertex)
            .unwrap_err();
        assert!(matches!(err, CatalogError::LabelKindMismatch { .. }));
    }

    #[test]
    fn test_entity_id_roundtrip() {
        let id = make_entity_id(7, 42);
        assert_eq!(extract_label_id(id), 7);
        assert_eq!(id & ((1 << 48) - 1), 42);
    }

    #[test]
    fn test_unknown_graph() {
        let catalog = GraphCatalog::new();
        assert!(matches!(
            catalog.graph("nope"),
            Err(CatalogError::GraphNotFound(_))
        ));
    }
}

//! Relational output model.
//!
//! The transform emits a tree of [`Query`] values: each clause becomes a
//! query whose range table starts with the previous clause's query as a
//! subquery entry, so clause order on input equals subquery nesting on
//! output. The host engine consumes this tree in place of the parse tree
//! its SQL front-end would have produced.
//!
//! ```text
//! MATCH (a)-[r]->(b) WHERE a.k = 1 RETURN a
//!
//! → Query                       (RETURN projection)
//!     └─ rte[0] "_prev": Query  (MATCH)
//!          ├─ rte[0] "a": Relation(_vertex)
//!          ├─ rte[1] "r": Relation(_edge)
//!          ├─ rte[2] "b": Relation(_vertex)
//!          └─ quals: a.id = r.start_id AND b.id = r.end_id AND …
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::graph_catalog::LabelKind;
use crate::query_planner::logical_expr::{FuncCall, LogicalExpr};
use crate::query_planner::types::TypeTag;
use crate::utils::serde_arc;

pub mod directives;
pub mod match_clause;
pub mod optional_match_clause;
pub mod plan_builder;
pub mod return_clause;
pub mod union_clause;
pub mod unwind_clause;
pub mod validate;
pub mod with_clause;
pub mod write_clauses;

/// Alias under which the previous clause's subquery enters the range table.
pub const PREVIOUS_CLAUSE_ALIAS: &str = "_prev";

/// One relational source referenced by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeTblEntry {
    pub alias: String,
    pub kind: RteKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RteKind {
    /// A label table, scoped by the graph namespace. The default labels
    /// stand for all vertices/edges of the graph (the per-label tables
    /// inherit from them on the host).
    Relation {
        graph: String,
        label: String,
        label_kind: LabelKind,
        relation_oid: u32,
    },
    Subquery {
        #[serde(with = "serde_arc")]
        query: Arc<Query>,
        lateral: bool,
    },
    /// A set-returning function call, e.g. the VLE expansion
    Function {
        call: FuncCall,
        lateral: bool,
        /// Output column names of the function
        columns: Vec<String>,
    },
}

/// The join tree over range-table entries. Entries in the top-level `from`
/// list are implicitly inner-joined (comma join); OPTIONAL MATCH and MERGE
/// introduce explicit lateral left joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FromItem {
    Rte(usize),
    Join(Box<JoinItem>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinItem {
    pub join_type: JoinType,
    pub left: FromItem,
    pub right: FromItem,
    pub quals: Option<LogicalExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    LeftLateral,
}

/// One output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub expr: LogicalExpr,
    pub name: String,
    pub ty: TypeTag,
}

impl TargetEntry {
    pub fn new(expr: LogicalExpr, name: impl Into<String>, ty: TypeTag) -> Self {
        TargetEntry {
            expr,
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortClauseItem {
    pub expr: LogicalExpr,
    pub descending: bool,
}

/// Set-operation tree for UNION statements. Leaves index into the owning
/// query's range table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetOpTree {
    Leaf {
        rte_index: usize,
    },
    Branch {
        all: bool,
        /// Per-column equality operators used for duplicate elimination
        /// when `all` is false; empty otherwise
        dedup_operators: Vec<String>,
        left: Box<SetOpTree>,
        right: Box<SetOpTree>,
    },
}

/// One relational query: a projection over a range table with filters,
/// ordering, paging and an optional set operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    pub range_table: Vec<RangeTblEntry>,
    pub from: Vec<FromItem>,
    pub quals: Option<LogicalExpr>,
    pub targets: Vec<TargetEntry>,
    pub distinct: bool,
    pub sort: Vec<SortClauseItem>,
    pub skip: Option<LogicalExpr>,
    pub limit: Option<LogicalExpr>,
    pub set_op: Option<SetOpTree>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    /// Append an RTE and reference it in the from-list; returns its index.
    pub fn add_rte(&mut self, entry: RangeTblEntry) -> usize {
        let index = self.range_table.len();
        self.range_table.push(entry);
        self.from.push(FromItem::Rte(index));
        index
    }

    /// Append an RTE without touching the from-list (joined explicitly or
    /// referenced only by a set operation); returns its index.
    pub fn add_rte_unjoined(&mut self, entry: RangeTblEntry) -> usize {
        let index = self.range_table.len();
        self.range_table.push(entry);
        index
    }

    pub fn add_qual(&mut self, qual: LogicalExpr) {
        self.quals =
            crate::query_planner::logical_expr::combinators::add_qual(self.quals.take(), qual);
    }

    pub fn target_named(&self, name: &str) -> Option<&TargetEntry> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn target_position(&self, name: &str) -> Option<usize> {
        self.targets.iter().position(|t| t.name == name)
    }

    /// Indented explain form of the whole tree.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        use std::fmt::Write;

        let pad = "  ".repeat(depth);
        let _ = write!(out, "{}Query", pad);
        if self.distinct {
            let _ = write!(out, " DISTINCT");
        }
        let _ = writeln!(out);

        for target in &self.targets {
            let _ = writeln!(out, "{}  project {} := {}", pad, target.name, target.expr);
        }
        for rte in &self.range_table {
            match &rte.kind {
                RteKind::Relation { graph, label, .. } => {
                    let _ = writeln!(out, "{}  scan {} := {}.{}", pad, rte.alias, graph, label);
                }
                RteKind::Function { call, lateral, .. } => {
                    let _ = writeln!(
                        out,
                        "{}  {}function {} := {}",
                        pad,
                        if *lateral { "lateral " } else { "" },
                        rte.alias,
                        LogicalExpr::FuncCall(call.clone())
                    );
                }
                RteKind::Subquery { query, lateral } => {
                    let _ = writeln!(
                        out,
                        "{}  {}subquery {}:",
                        pad,
                        if *lateral { "lateral " } else { "" },
                        rte.alias
                    );
                    query.explain_into(out, depth + 2);
                }
            }
        }
        if let Some(quals) = &self.quals {
            let _ = writeln!(out, "{}  where {}", pad, quals);
        }
        for item in &self.sort {
            let _ = writeln!(
                out,
                "{}  order by {}{}",
                pad,
                item.expr,
                if item.descending { " DESC" } else { "" }
            );
        }
        if let Some(skip) = &self.skip {
            let _ = writeln!(out, "{}  skip {}", pad, skip);
        }
        if let Some(limit) = &self.limit {
            let _ = writeln!(out, "{}  limit {}", pad, limit);
        }
        if self.set_op.is_some() {
            let _ = writeln!(out, "{}  set operation over branches", pad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_planner::logical_expr::ColumnRef;
    use crate::value::Value;

    #[test]
    fn test_add_rte_links_from_list() {
        let mut q = Query::new();
        let idx = q.add_rte(RangeTblEntry {
            alias: "a".into(),
            kind: RteKind::Relation {
                graph: "g".into(),
                label: "_vertex".into(),
                label_kind: LabelKind::Vertex,
                relation_oid: 1,
            },
        });
        assert_eq!(idx, 0);
        assert_eq!(q.from, vec![FromItem::Rte(0)]);
    }

    #[test]
    fn test_add_qual_conjoins() {
        let mut q = Query::new();
        q.add_qual(LogicalExpr::Literal(Value::Bool(true)));
        q.add_qual(LogicalExpr::equals(
            ColumnRef::new("a", "id"),
            LogicalExpr::Literal(Value::Integer(1)),
        ));
        match q.quals.as_ref().unwrap() {
            LogicalExpr::Operator(app) => assert_eq!(app.operands.len(), 2),
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_round_trips_through_serde() {
        let mut q = Query::new();
        q.add_rte(RangeTblEntry {
            alias: "a".into(),
            kind: RteKind::Relation {
                graph: "g".into(),
                label: "Person".into(),
                label_kind: LabelKind::Vertex,
                relation_oid: 42,
            },
        });
        q.targets.push(TargetEntry::new(
            ColumnRef::new("a", "id"),
            "a",
            TypeTag::Vertex,
        ));
        let outer = Query {
            range_table: vec![RangeTblEntry {
                alias: PREVIOUS_CLAUSE_ALIAS.into(),
                kind: RteKind::Subquery {
                    query: Arc::new(q),
                    lateral: false,
                },
            }],
            from: vec![FromItem::Rte(0)],
            ..Query::default()
        };

        let json = serde_json::to_string(&outer).unwrap();
        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(outer, back);
    }
}

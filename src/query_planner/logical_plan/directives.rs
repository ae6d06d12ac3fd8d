//! Writer directives.
//!
//! Updating clauses do not mutate anything during transform. Each packs a
//! directive — target tables, default expressions, property constructors,
//! tuple positions — into an opaque function-call target entry that the
//! host executor interprets. Directives are plain serde values so they
//! survive plan serialization unchanged.

use serde::{Deserialize, Serialize};

use crate::graph_catalog::LabelKind;
use crate::query_planner::logical_expr::LogicalExpr;

pub const CREATE_CLAUSE_FUNC: &str = "_create_clause";
pub const SET_CLAUSE_FUNC: &str = "_set_clause";
pub const DELETE_CLAUSE_FUNC: &str = "_delete_clause";
pub const MERGE_CLAUSE_FUNC: &str = "_merge_clause";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriterDirective {
    Create(CreateDirective),
    Set(SetDirective),
    Delete(DeleteDirective),
    Merge(MergeDirective),
}

impl WriterDirective {
    /// The opaque constant form handed across the plan-serialization
    /// boundary.
    pub fn to_opaque(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("directives contain no non-serializable state")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDirective {
    /// No RETURN or further clause follows; the executor need not project
    pub terminal: bool,
    pub targets: Vec<CreateTarget>,
}

/// One entity the executor must create (or pass through when it was bound
/// by a previous clause).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTarget {
    pub kind: LabelKind,
    pub label: String,
    /// Fact table of the label, created on demand during transform
    pub relation_oid: u32,
    pub variable_name: Option<String>,
    /// Default expression producing the new entity id; absent for
    /// previously-bound entities
    pub id_expr: Option<LogicalExpr>,
    /// Property-map constructor; absent when the pattern had no properties
    pub prop_expr: Option<LogicalExpr>,
    /// Position in the owning query's target list where the entity value
    /// lives (a placeholder for new entities, the passthrough column for
    /// previously-bound ones)
    pub tuple_position: usize,
    /// The entity was bound by a previous clause and is only referenced
    pub previous_clause: bool,
    /// The entity is part of a named path variable
    pub in_path_var: bool,
    /// For edges: target-list positions of the endpoint entities
    pub start_position: Option<usize>,
    pub end_position: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDirective {
    pub is_remove: bool,
    pub items: Vec<SetDirectiveItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDirectiveItem {
    pub var_name: String,
    /// Target-list position of the entity being updated
    pub entity_position: usize,
    pub prop_name: String,
    /// Target-list position of the value expression; absent for REMOVE
    pub prop_position: Option<usize>,
    pub remove_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteDirective {
    pub detach: bool,
    pub items: Vec<DeleteDirectiveItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteDirectiveItem {
    pub var_name: String,
    pub entity_position: usize,
    pub kind: LabelKind,
}

/// MERGE: create-shape targets plus the range-table index of the rewritten
/// MATCH-shape subquery, so the executor passes matches through and creates
/// only when the lateral side produced no row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDirective {
    pub create: CreateDirective,
    pub match_rte_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_directive_survives_opaque_round_trip() {
        let directive = WriterDirective::Create(CreateDirective {
            terminal: true,
            targets: vec![CreateTarget {
                kind: LabelKind::Vertex,
                label: "Person".into(),
                relation_oid: 99,
                variable_name: Some("n".into()),
                id_expr: None,
                prop_expr: Some(LogicalExpr::Literal(Value::map([(
                    "name",
                    Value::String("Ada".into()),
                )]))),
                tuple_position: 0,
                previous_clause: false,
                in_path_var: false,
                start_position: None,
                end_position: None,
            }],
        });

        let opaque = directive.to_opaque();
        let back: WriterDirective = serde_json::from_value(opaque).unwrap();
        assert_eq!(directive, back);
    }
}

//! Pattern-to-join transformation.
//!
//! Each path `(n0)-[e0]-(n1)-…` becomes range-table entries over label
//! tables plus join predicates on the edge `start_id`/`end_id` columns.
//! Nodes enter the join tree only when something references them (a
//! user-declared name, a property map, a named path); an anonymous
//! label-only node is checked with `extract_label_id` on the adjacent edge
//! column instead of joining its label table, and a fully anonymous node
//! disappears into the edge columns entirely.
//!
//! A clause with more than one edge additionally gets
//! `enforce_edge_uniqueness(e0.id, e1.id, …)` over every edge it matched,
//! variable-length handles included.

use std::sync::Arc;

use crate::graph_catalog::LabelKind;
use crate::open_cypher_parser::ast::{
    Direction, Expression, MatchClause, NodePattern, PathPattern, RelationshipPattern,
};
use crate::query_planner::errors::{PlanError, PlanResult};
use crate::query_planner::logical_expr::combinators::{conjoin, disjoin};
use crate::query_planner::logical_expr::{
    ColumnRef, ExistsSubquery, FuncCall, LogicalExpr, Operator,
};
use crate::query_planner::logical_plan::plan_builder::{
    edge_value_expr, field_access, vertex_value_expr, Planner,
};
use crate::query_planner::logical_plan::{Query, RangeTblEntry, RteKind, TargetEntry};
use crate::query_planner::plan_ctx::{Binding, BindingKind};
use crate::query_planner::types::TypeTag;
use crate::value::Value;

pub(crate) fn plan_match<'t>(
    planner: &mut Planner<'t>,
    clause: &MatchClause<'t>,
    prev: Option<Arc<Query>>,
) -> PlanResult<Arc<Query>> {
    // `plan_match` also serves OPTIONAL MATCH with no previous clause,
    // where the left side of the would-be join is empty.
    let mut query = planner.begin_clause(prev);

    let mut edge_refs: Vec<(String, LogicalExpr)> = Vec::new();
    for path in &clause.patterns {
        edge_refs.extend(transform_path(planner, &mut query, path, false)?.edge_refs);
    }
    add_edge_uniqueness(&mut query, edge_refs);

    if let Some(cond) = &clause.where_clause {
        let lowered = planner.lower_boolean(cond)?;
        query.add_qual(lowered);
    }

    planner.passthrough_targets(&mut query);
    Ok(Arc::new(query))
}

/// Emit the clause-wide edge-uniqueness predicate. Reused edge variables
/// contribute one handle, so a self-comparison cannot filter them out.
pub(crate) fn add_edge_uniqueness(query: &mut Query, edge_refs: Vec<(String, LogicalExpr)>) {
    let mut seen = std::collections::HashSet::new();
    let refs: Vec<LogicalExpr> = edge_refs
        .into_iter()
        .filter(|(alias, _)| seen.insert(alias.clone()))
        .map(|(_, expr)| expr)
        .collect();
    if refs.len() >= 2 {
        query.add_qual(FuncCall::new("enforce_edge_uniqueness", refs));
    }
}

/// How one pattern node participates in the join tree.
enum NodeSlot {
    /// Bound by a previous clause or an earlier path: joined via its id
    /// expression, no new range-table entry.
    InScope { id: LogicalExpr },
    /// Scanned from a label table under `alias`.
    Materialized { alias: String },
    /// Folded into adjacent edge columns. `ref_expr` is assigned when the
    /// providing edge is planned; `label_filter` holds a pending label id
    /// check to apply to that column.
    Folded {
        ref_expr: Option<LogicalExpr>,
        label_filter: Option<i32>,
    },
}

impl NodeSlot {
    fn reference(&self) -> Option<LogicalExpr> {
        match self {
            NodeSlot::InScope { id } => Some(id.clone()),
            NodeSlot::Materialized { alias } => Some(ColumnRef::new(alias.as_str(), "id")),
            NodeSlot::Folded { ref_expr, .. } => ref_expr.clone(),
        }
    }
}

/// Assign the column expression a folded node resolves to, applying any
/// pending label filter to it.
fn assign_folded_ref(slot: &mut NodeSlot, expr: LogicalExpr, query: &mut Query) {
    if let NodeSlot::Folded {
        ref_expr,
        label_filter,
    } = slot
    {
        if ref_expr.is_none() {
            if let Some(label_id) = label_filter.take() {
                query.add_qual(label_id_filter(expr.clone(), label_id));
            }
            *ref_expr = Some(expr);
        }
    }
}

fn label_id_filter(column: LogicalExpr, label_id: i32) -> LogicalExpr {
    LogicalExpr::equals(
        FuncCall::new("extract_label_id", vec![column]),
        LogicalExpr::Literal(Value::Integer(label_id as i64)),
    )
}

fn prop_containment(properties: LogicalExpr, template: LogicalExpr) -> LogicalExpr {
    LogicalExpr::operator(Operator::PropContains, vec![properties, template])
}

/// Everything the path walk produced that callers may need: edge handles
/// for the uniqueness predicate plus the binding name of every entity (a
/// folded node has none).
pub(crate) struct PathArtifacts<'t> {
    pub edge_refs: Vec<(String, LogicalExpr)>,
    pub node_bindings: Vec<Option<&'t str>>,
    pub edge_bindings: Vec<&'t str>,
}

/// Transform one path into range-table entries, join predicates and
/// bindings. `materialize_all` forces every node into the join tree (named
/// paths and MERGE need a binding per entity).
pub(crate) fn transform_path<'t>(
    planner: &mut Planner<'t>,
    query: &mut Query,
    path: &PathPattern<'t>,
    materialize_all: bool,
) -> PlanResult<PathArtifacts<'t>> {
    let nodes: Vec<&NodePattern> = path.nodes().collect();
    let rels: Vec<&RelationshipPattern> = path.relationships().collect();
    let in_path_var = path.var_name.is_some() || materialize_all;

    let mut slots: Vec<NodeSlot> = Vec::with_capacity(nodes.len());
    let mut node_bindings: Vec<Option<&'t str>> = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        let (slot, name) = plan_node_slot(planner, query, node, i, &rels, in_path_var)?;
        slots.push(slot);
        node_bindings.push(name);
    }

    let mut edge_refs: Vec<(String, LogicalExpr)> = Vec::new();
    let mut edge_bindings: Vec<&'t str> = Vec::with_capacity(rels.len());
    // node and edge value expressions in path order, for build_traversal
    let mut path_elems: Vec<LogicalExpr> = Vec::new();

    for (i, rel) in rels.iter().enumerate() {
        let (left, right) = slots.split_at_mut(i + 1);
        let left_slot = &mut left[i];
        let right_slot = &mut right[0];

        let handle = if rel.varlen.is_some() {
            transform_vle_edge(planner, query, rel, left_slot, right_slot)?
        } else {
            transform_plain_edge(planner, query, rel, left_slot, right_slot)?
        };
        edge_refs.push((handle.alias, handle.id_ref));
        edge_bindings.push(handle.binding_name);
        path_elems.push(handle.value);
    }

    if let Some(var_name) = path.var_name {
        // every node was materialized (forced by in_path_var), so each has
        // a binding carrying its value expression
        let mut elems = Vec::with_capacity(nodes.len() + rels.len());
        for (i, slot) in slots.iter().enumerate() {
            let node_value = match slot {
                NodeSlot::InScope { .. } => {
                    let name = nodes[i].name.expect("in-scope nodes are named");
                    planner.ctx.lookup_required(name)?.expr.clone()
                }
                NodeSlot::Materialized { alias } => {
                    planner.ctx.lookup_required(alias)?.expr.clone()
                }
                NodeSlot::Folded { .. } => {
                    unreachable!("path variables materialize every node")
                }
            };
            elems.push(node_value);
            if i < path_elems.len() {
                elems.push(path_elems[i].clone());
            }
        }
        let traversal = FuncCall::new("build_traversal", elems);
        planner.ctx.declare(Binding {
            name: var_name,
            kind: BindingKind::Scalar,
            declared_in_current_clause: true,
            expr: traversal,
            properties_expr: None,
            id_expr: None,
            label: None,
            ty: TypeTag::Traversal,
        })?;
    }

    Ok(PathArtifacts {
        edge_refs,
        node_bindings,
        edge_bindings,
    })
}

/// Decide how a node participates and create its range-table entry and
/// binding when it is materialized. Returns the slot plus the binding name
/// the node resolved to, if any.
fn plan_node_slot<'t>(
    planner: &mut Planner<'t>,
    query: &mut Query,
    node: &NodePattern<'t>,
    index: usize,
    rels: &[&RelationshipPattern<'t>],
    in_path_var: bool,
) -> PlanResult<(NodeSlot, Option<&'t str>)> {
    let graph_oid = planner.graph.oid;

    // a name bound earlier joins by id instead of re-scanning
    if let Some(name) = node.name {
        if let Some(binding) = planner.ctx.lookup(name) {
            if binding.kind != BindingKind::Vertex {
                return Err(PlanError::BindingKindConflict(name.to_string()));
            }
            let id = binding
                .id_expr
                .clone()
                .expect("vertex bindings carry an id expression");
            let properties = binding.properties_expr.clone();
            if let Some(label) = node.label {
                let record = planner
                    .catalog
                    .label_of_kind(graph_oid, label, LabelKind::Vertex)?;
                query.add_qual(label_id_filter(id.clone(), record.id));
            }
            if let Some(props) = &node.props {
                let template = planner.lower_property_map(props)?;
                let properties =
                    properties.expect("vertex bindings carry a properties expression");
                query.add_qual(prop_containment(properties, template));
            }
            return Ok((NodeSlot::InScope { id }, Some(name)));
        }
    }

    let degree = usize::from(index > 0) + usize::from(index < rels.len());
    let adjacent_either = (index > 0 && rels[index - 1].direction == Direction::Either)
        || (index < rels.len() && rels[index].direction == Direction::Either);
    let first_edge_is_vle = index == 0 && rels.first().is_some_and(|r| r.varlen.is_some());

    let materialize = node.name.is_some()
        || node.props.is_some()
        || in_path_var
        || (adjacent_either && (node.label.is_some() || degree == 2))
        || first_edge_is_vle;

    if materialize {
        let label_record = match node.label {
            Some(label) => planner
                .catalog
                .label_of_kind(graph_oid, label, LabelKind::Vertex)?
                .clone(),
            None => planner
                .catalog
                .default_label(graph_oid, LabelKind::Vertex)?
                .clone(),
        };
        let name = match node.name {
            Some(name) => name,
            None => planner.ctx.anonymous_name(),
        };

        query.add_rte(RangeTblEntry {
            alias: name.to_string(),
            kind: RteKind::Relation {
                graph: planner.graph.namespace.clone(),
                label: label_record.name.clone(),
                label_kind: LabelKind::Vertex,
                relation_oid: label_record.relation_oid,
            },
        });

        planner.ctx.declare(Binding {
            name,
            kind: BindingKind::Vertex,
            declared_in_current_clause: true,
            expr: vertex_value_expr(name, &label_record.name),
            properties_expr: Some(ColumnRef::new(name, "properties")),
            id_expr: Some(ColumnRef::new(name, "id")),
            label: Some(label_record.name.clone()),
            ty: TypeTag::Vertex,
        })?;

        if let Some(props) = &node.props {
            let template = planner.lower_property_map(props)?;
            query.add_qual(prop_containment(ColumnRef::new(name, "properties"), template));
        }

        return Ok((
            NodeSlot::Materialized {
                alias: name.to_string(),
            },
            Some(name),
        ));
    }

    // folded: resolve the label id now so the filter lands on the adjacent
    // edge column once it is known
    let label_filter = match node.label {
        Some(label) => Some(
            planner
                .catalog
                .label_of_kind(graph_oid, label, LabelKind::Vertex)?
                .id,
        ),
        None => None,
    };

    Ok((
        NodeSlot::Folded {
            ref_expr: None,
            label_filter,
        },
        None,
    ))
}

/// What an edge hands back to the path walk.
struct EdgeHandle<'t> {
    alias: String,
    binding_name: &'t str,
    /// Expression for the uniqueness predicate (edge id, or the VLE handle)
    id_ref: LogicalExpr,
    /// Entity value for build_traversal
    value: LogicalExpr,
}

fn transform_plain_edge<'t>(
    planner: &mut Planner<'t>,
    query: &mut Query,
    rel: &RelationshipPattern<'t>,
    left: &mut NodeSlot,
    right: &mut NodeSlot,
) -> PlanResult<EdgeHandle<'t>> {
    let graph_oid = planner.graph.oid;

    // a reused edge variable joins the existing entity's columns
    if let Some(name) = rel.name {
        if let Some(binding) = planner.ctx.lookup(name) {
            if binding.kind != BindingKind::Edge {
                return Err(PlanError::BindingKindConflict(name.to_string()));
            }
            let value = binding.expr.clone();
            let id_ref = binding
                .id_expr
                .clone()
                .expect("edge bindings carry an id expression");
            let properties = binding
                .properties_expr
                .clone()
                .expect("edge bindings carry a properties expression");
            let start_col = field_access(value.clone(), "start_id");
            let end_col = field_access(value.clone(), "end_id");
            emit_edge_join_quals(query, rel.direction, left, right, start_col, end_col)?;
            if let Some(props) = &rel.props {
                let template = planner.lower_property_map(props)?;
                query.add_qual(prop_containment(properties, template));
            }
            return Ok(EdgeHandle {
                alias: name.to_string(),
                binding_name: name,
                id_ref,
                value,
            });
        }
    }

    let label_record = match rel.label {
        Some(label) => planner
            .catalog
            .label_of_kind(graph_oid, label, LabelKind::Edge)?
            .clone(),
        None => planner
            .catalog
            .default_label(graph_oid, LabelKind::Edge)?
            .clone(),
    };
    let name = match rel.name {
        Some(name) => name,
        None => planner.ctx.anonymous_name(),
    };

    query.add_rte(RangeTblEntry {
        alias: name.to_string(),
        kind: RteKind::Relation {
            graph: planner.graph.namespace.clone(),
            label: label_record.name.clone(),
            label_kind: LabelKind::Edge,
            relation_oid: label_record.relation_oid,
        },
    });

    planner.ctx.declare(Binding {
        name,
        kind: BindingKind::Edge,
        declared_in_current_clause: true,
        expr: edge_value_expr(name, &label_record.name),
        properties_expr: Some(ColumnRef::new(name, "properties")),
        id_expr: Some(ColumnRef::new(name, "id")),
        label: Some(label_record.name.clone()),
        ty: TypeTag::Edge,
    })?;

    if let Some(props) = &rel.props {
        let template = planner.lower_property_map(props)?;
        query.add_qual(prop_containment(ColumnRef::new(name, "properties"), template));
    }

    emit_edge_join_quals(
        query,
        rel.direction,
        left,
        right,
        ColumnRef::new(name, "start_id"),
        ColumnRef::new(name, "end_id"),
    )?;

    Ok(EdgeHandle {
        alias: name.to_string(),
        binding_name: name,
        id_ref: ColumnRef::new(name, "id"),
        value: edge_value_expr(name, &label_record.name),
    })
}

/// Join predicates for one edge given its `start_id`/`end_id` columns.
///
/// Directed edges equate each endpoint with the matching column; a folded
/// endpoint *becomes* the column (predicates to its other edge follow when
/// that edge is planned). Undirected edges take the disjunction of both
/// orientations over whichever endpoints are constrained.
fn emit_edge_join_quals(
    query: &mut Query,
    direction: Direction,
    left: &mut NodeSlot,
    right: &mut NodeSlot,
    start_col: LogicalExpr,
    end_col: LogicalExpr,
) -> PlanResult<()> {
    match direction {
        Direction::Outgoing | Direction::Incoming => {
            let (left_col, right_col) = if direction == Direction::Outgoing {
                (start_col, end_col)
            } else {
                (end_col, start_col)
            };

            match left.reference() {
                Some(reference) => {
                    query.add_qual(LogicalExpr::equals(reference, left_col.clone()));
                }
                None => assign_folded_ref(left, left_col.clone(), query),
            }
            match right.reference() {
                Some(reference) => {
                    query.add_qual(LogicalExpr::equals(reference, right_col.clone()));
                }
                None => assign_folded_ref(right, right_col.clone(), query),
            }
        }
        Direction::Either => {
            let l_ref = left.reference();
            let r_ref = right.reference();
            let disjuncts = match (l_ref, r_ref) {
                (Some(l), Some(r)) => vec![
                    conjoin(vec![
                        LogicalExpr::equals(l.clone(), start_col.clone()),
                        LogicalExpr::equals(r.clone(), end_col.clone()),
                    ])
                    .expect("two conjuncts"),
                    conjoin(vec![
                        LogicalExpr::equals(l, end_col.clone()),
                        LogicalExpr::equals(r, start_col.clone()),
                    ])
                    .expect("two conjuncts"),
                ],
                (Some(l), None) => vec![
                    LogicalExpr::equals(l.clone(), start_col.clone()),
                    LogicalExpr::equals(l, end_col.clone()),
                ],
                (None, Some(r)) => vec![
                    LogicalExpr::equals(r.clone(), end_col.clone()),
                    LogicalExpr::equals(r, start_col.clone()),
                ],
                // both endpoints unconstrained: the scan itself is enough
                (None, None) => Vec::new(),
            };
            if let Some(qual) = disjoin(disjuncts) {
                query.add_qual(qual);
            }
        }
    }
    Ok(())
}

/// A `*lo..hi` relationship becomes a lateral set-returning call to the
/// traversal engine instead of a label-table scan. Its `edges` output
/// column is the binding's value, and the endpoint joins use the
/// `start_of`/`end_of` accessors on that handle.
fn transform_vle_edge<'t>(
    planner: &mut Planner<'t>,
    query: &mut Query,
    rel: &RelationshipPattern<'t>,
    left: &mut NodeSlot,
    right: &mut NodeSlot,
) -> PlanResult<EdgeHandle<'t>> {
    let range = rel.varlen.expect("caller checked varlen");
    let graph_oid = planner.graph.oid;

    // label names in the constraint are validated against the catalog even
    // though the engine resolves them at runtime
    let label_expr = match rel.label {
        Some(label) => {
            planner
                .catalog
                .label_of_kind(graph_oid, label, LabelKind::Edge)?;
            LogicalExpr::Literal(Value::String(label.to_string()))
        }
        None => LogicalExpr::Literal(Value::Null),
    };
    let props_expr = match &rel.props {
        Some(props) => planner.lower_property_map(props)?,
        None => LogicalExpr::Literal(Value::Null),
    };
    let constraint = LogicalExpr::Map(vec![
        ("label".to_string(), label_expr),
        ("properties".to_string(), props_expr),
    ]);

    let left_ref = left
        .reference()
        .expect("VLE start endpoints are always materialized or folded with a reference");
    let right_ref = right.reference();

    let direction_name = match rel.direction {
        Direction::Outgoing => "outgoing",
        Direction::Incoming => "incoming",
        Direction::Either => "either",
    };

    let name = match rel.name {
        Some(name) => name,
        None => planner.ctx.anonymous_name(),
    };

    let args = vec![
        left_ref.clone(),
        right_ref.clone().unwrap_or(LogicalExpr::Literal(Value::Null)),
        constraint,
        LogicalExpr::Literal(Value::Integer(range.lo as i64)),
        match range.hi {
            Some(hi) => LogicalExpr::Literal(Value::Integer(hi as i64)),
            None => LogicalExpr::Literal(Value::Null),
        },
        LogicalExpr::Literal(Value::String(direction_name.to_string())),
    ];

    query.add_rte(RangeTblEntry {
        alias: name.to_string(),
        kind: RteKind::Function {
            call: FuncCall {
                name: "vle".to_string(),
                distinct: false,
                args,
            },
            lateral: true,
            columns: vec!["edges".to_string()],
        },
    });

    let handle = ColumnRef::new(name, "edges");
    planner.ctx.declare(Binding {
        name,
        kind: BindingKind::VleEdge,
        declared_in_current_clause: true,
        expr: handle.clone(),
        properties_expr: None,
        id_expr: None,
        label: rel.label.map(|l| l.to_string()),
        ty: TypeTag::VariableEdge,
    })?;

    query.add_qual(LogicalExpr::equals(
        FuncCall::new("start_of", vec![handle.clone()]),
        left_ref,
    ));
    match right_ref {
        Some(reference) => {
            query.add_qual(LogicalExpr::equals(
                FuncCall::new("end_of", vec![handle.clone()]),
                reference,
            ));
        }
        None => {
            assign_folded_ref(right, FuncCall::new("end_of", vec![handle.clone()]), query);
        }
    }

    Ok(EdgeHandle {
        alias: name.to_string(),
        binding_name: name,
        id_ref: handle.clone(),
        value: handle,
    })
}

impl<'t> Planner<'t> {
    /// `EXISTS { pattern [WHERE …] }`: the sub-pattern runs through the
    /// same transform in a child scope and becomes a correlated existence
    /// subquery projecting a constant.
    pub(crate) fn lower_exists(
        &mut self,
        pattern: &PathPattern<'t>,
        where_clause: Option<&Expression<'t>>,
    ) -> PlanResult<LogicalExpr> {
        self.ctx.push_scope();
        let mut subquery = Query::new();

        let outcome = (|| -> PlanResult<()> {
            let artifacts = transform_path(self, &mut subquery, pattern, false)?;
            add_edge_uniqueness(&mut subquery, artifacts.edge_refs);
            if let Some(cond) = where_clause {
                let lowered = self.lower_boolean(cond)?;
                subquery.add_qual(lowered);
            }
            subquery.targets.push(TargetEntry::new(
                LogicalExpr::Literal(Value::Integer(1)),
                "exists",
                TypeTag::Integer,
            ));
            Ok(())
        })();

        self.ctx.pop_scope();
        outcome?;

        Ok(LogicalExpr::Exists(ExistsSubquery {
            subplan: Arc::new(subquery),
        }))
    }
}

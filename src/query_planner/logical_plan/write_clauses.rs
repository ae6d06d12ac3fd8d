//! Updating clauses: CREATE, SET/REMOVE, DELETE, MERGE.
//!
//! None of them touch the graph during transform. Each projects the
//! previous clause through, appends placeholder or value columns as needed,
//! and packs a writer directive into one opaque function-call target entry
//! the executor interprets. MERGE additionally carries the MATCH-shape
//! subquery of its path as a lateral left join, so the executor can pass
//! matches through and create only when nothing matched.

use std::sync::Arc;

use crate::graph_catalog::{LabelKind, LabelRecord};
use crate::open_cypher_parser::ast::{
    CreateClause, DeleteClause, Direction, Expression, MergeClause, NodePattern, PathPattern,
    PropertyMap, RelationshipPattern, SetClause,
};
use crate::query_planner::errors::{PlanError, PlanResult};
use crate::query_planner::logical_expr::{
    ColumnRef, DirectiveCall, FuncCall, LogicalExpr,
};
use crate::query_planner::logical_plan::directives::{
    CreateDirective, CreateTarget, DeleteDirective, DeleteDirectiveItem, MergeDirective,
    SetDirective, SetDirectiveItem, WriterDirective, CREATE_CLAUSE_FUNC, DELETE_CLAUSE_FUNC,
    MERGE_CLAUSE_FUNC, SET_CLAUSE_FUNC,
};
use crate::query_planner::logical_plan::match_clause::{add_edge_uniqueness, transform_path};
use crate::query_planner::logical_plan::plan_builder::{rebound_binding, Planner};
use crate::query_planner::logical_plan::{
    FromItem, JoinItem, JoinType, Query, RangeTblEntry, RteKind, TargetEntry,
    PREVIOUS_CLAUSE_ALIAS,
};
use crate::query_planner::plan_ctx::{Binding, BindingKind};
use crate::query_planner::types::TypeTag;
use crate::value::Value;

/// Alias of the lateral MATCH-shape subquery a MERGE carries.
const MERGE_SIDE_ALIAS: &str = "_merge";

fn directive_target(name: &str, directive: WriterDirective) -> TargetEntry {
    TargetEntry::new(
        LogicalExpr::DirectiveCall(DirectiveCall {
            name: name.to_string(),
            directive,
        }),
        name,
        TypeTag::Unknown,
    )
}

/// Default expression generating a fresh entity id from the label's
/// sequence on the host.
fn entity_id_default(relation_oid: u32) -> LogicalExpr {
    FuncCall::new(
        "entity_id_default",
        vec![LogicalExpr::Literal(Value::Integer(relation_oid as i64))],
    )
}

// ---------------------------------------------------------------------------
// CREATE
// ---------------------------------------------------------------------------

pub(crate) fn plan_create<'t>(
    planner: &mut Planner<'t>,
    clause: &CreateClause<'t>,
    prev: Option<Arc<Query>>,
    is_last: bool,
) -> PlanResult<Arc<Query>> {
    let mut query = planner.begin_clause(prev);
    planner.passthrough_targets(&mut query);

    let mut targets: Vec<CreateTarget> = Vec::new();
    for path in &clause.patterns {
        plan_create_path(planner, &mut query, path, &mut targets)?;
    }

    let directive = WriterDirective::Create(CreateDirective {
        terminal: is_last,
        targets,
    });
    query
        .targets
        .push(directive_target(CREATE_CLAUSE_FUNC, directive));

    Ok(Arc::new(query))
}

fn plan_create_path<'t>(
    planner: &mut Planner<'t>,
    query: &mut Query,
    path: &PathPattern<'t>,
    out: &mut Vec<CreateTarget>,
) -> PlanResult<()> {
    let in_path_var = path.var_name.is_some();

    let mut node_positions: Vec<usize> = Vec::new();
    for node in path.nodes() {
        node_positions.push(plan_create_node(planner, query, node, in_path_var, out)?);
    }

    for (i, rel) in path.relationships().enumerate() {
        let (start_position, end_position) = match rel.direction {
            Direction::Outgoing => (node_positions[i], node_positions[i + 1]),
            Direction::Incoming => (node_positions[i + 1], node_positions[i]),
            Direction::Either => return Err(PlanError::DirectedEdgeRequired),
        };
        plan_create_edge(
            planner,
            query,
            rel,
            start_position,
            end_position,
            in_path_var,
            out,
        )?;
    }

    if let Some(var_name) = path.var_name {
        let position = query.targets.len();
        query.targets.push(TargetEntry::new(
            LogicalExpr::Literal(Value::Null),
            var_name,
            TypeTag::Traversal,
        ));
        planner.ctx.declare(Binding {
            name: var_name,
            kind: BindingKind::Scalar,
            declared_in_current_clause: true,
            expr: LogicalExpr::Literal(Value::Null),
            properties_expr: None,
            id_expr: None,
            label: None,
            ty: TypeTag::Traversal,
        })?;
        log::debug!(
            "write_clauses: path variable \"{}\" at position {}",
            var_name,
            position
        );
    }

    Ok(())
}

fn plan_create_node<'t>(
    planner: &mut Planner<'t>,
    query: &mut Query,
    node: &NodePattern<'t>,
    in_path_var: bool,
    out: &mut Vec<CreateTarget>,
) -> PlanResult<usize> {
    let graph_oid = planner.graph.oid;

    if let Some(name) = node.name {
        if let Some(binding) = planner.ctx.lookup(name) {
            if binding.kind != BindingKind::Vertex {
                return Err(PlanError::BindingKindConflict(name.to_string()));
            }
            // an existing variable may be referenced, never re-shaped
            if node.label.is_some() || node.props.is_some() {
                return Err(PlanError::CreateRedeclaresVariable(name.to_string()));
            }
            let declared_here = binding.declared_in_current_clause;
            let label = binding.label.clone();
            let position = query
                .target_position(name)
                .expect("visible bindings are projected through");
            if declared_here {
                // referenced again within this CREATE: already has a target
                return Ok(position);
            }
            let label_record = match label.as_deref() {
                Some(label) => planner
                    .catalog
                    .label_of_kind(graph_oid, label, LabelKind::Vertex)?
                    .clone(),
                None => planner
                    .catalog
                    .default_label(graph_oid, LabelKind::Vertex)?
                    .clone(),
            };
            out.push(CreateTarget {
                kind: LabelKind::Vertex,
                label: label_record.name,
                relation_oid: label_record.relation_oid,
                variable_name: Some(name.to_string()),
                id_expr: None,
                prop_expr: None,
                tuple_position: position,
                previous_clause: true,
                in_path_var,
                start_position: None,
                end_position: None,
            });
            return Ok(position);
        }
    }

    // labels come into existence on demand for writers
    let label_record: LabelRecord = match node.label {
        Some(label) => planner
            .catalog
            .create_label_if_missing(graph_oid, label, LabelKind::Vertex)?,
        None => planner
            .catalog
            .default_label(graph_oid, LabelKind::Vertex)?
            .clone(),
    };

    let name = match node.name {
        Some(name) => name,
        None => planner.ctx.anonymous_name(),
    };
    let prop_expr = lower_writer_properties(planner, node.props.as_ref(), "CREATE")?;

    let position = query.targets.len();
    query.targets.push(TargetEntry::new(
        LogicalExpr::Literal(Value::Null),
        name,
        TypeTag::Vertex,
    ));
    planner.ctx.declare(Binding {
        name,
        kind: BindingKind::Vertex,
        declared_in_current_clause: true,
        expr: LogicalExpr::Literal(Value::Null),
        properties_expr: None,
        id_expr: None,
        label: Some(label_record.name.clone()),
        ty: TypeTag::Vertex,
    })?;

    out.push(CreateTarget {
        kind: LabelKind::Vertex,
        label: label_record.name.clone(),
        relation_oid: label_record.relation_oid,
        variable_name: node.name.map(|n| n.to_string()),
        id_expr: Some(entity_id_default(label_record.relation_oid)),
        prop_expr,
        tuple_position: position,
        previous_clause: false,
        in_path_var,
        start_position: None,
        end_position: None,
    });
    Ok(position)
}

fn plan_create_edge<'t>(
    planner: &mut Planner<'t>,
    query: &mut Query,
    rel: &RelationshipPattern<'t>,
    start_position: usize,
    end_position: usize,
    in_path_var: bool,
    out: &mut Vec<CreateTarget>,
) -> PlanResult<()> {
    if rel.varlen.is_some() {
        return Err(PlanError::VarLenNotAllowedHere("CREATE"));
    }
    let label = rel.label.ok_or(PlanError::CreateEdgeLabelRequired)?;

    if let Some(name) = rel.name {
        if planner.ctx.lookup(name).is_some() {
            return Err(PlanError::DuplicateBinding(name.to_string()));
        }
    }

    let label_record =
        planner
            .catalog
            .create_label_if_missing(planner.graph.oid, label, LabelKind::Edge)?;

    let name = match rel.name {
        Some(name) => name,
        None => planner.ctx.anonymous_name(),
    };
    let prop_expr = lower_writer_properties(planner, rel.props.as_ref(), "CREATE")?;

    let position = query.targets.len();
    query.targets.push(TargetEntry::new(
        LogicalExpr::Literal(Value::Null),
        name,
        TypeTag::Edge,
    ));
    planner.ctx.declare(Binding {
        name,
        kind: BindingKind::Edge,
        declared_in_current_clause: true,
        expr: LogicalExpr::Literal(Value::Null),
        properties_expr: None,
        id_expr: None,
        label: Some(label_record.name.clone()),
        ty: TypeTag::Edge,
    })?;

    out.push(CreateTarget {
        kind: LabelKind::Edge,
        label: label_record.name.clone(),
        relation_oid: label_record.relation_oid,
        variable_name: rel.name.map(|n| n.to_string()),
        id_expr: Some(entity_id_default(label_record.relation_oid)),
        prop_expr,
        tuple_position: position,
        previous_clause: false,
        in_path_var,
        start_position: Some(start_position),
        end_position: Some(end_position),
    });
    Ok(())
}

/// Property constructors for writers. `$param` maps are rejected — the
/// directive must be self-contained at plan time.
fn lower_writer_properties<'t>(
    planner: &mut Planner<'t>,
    props: Option<&PropertyMap<'t>>,
    clause_name: &'static str,
) -> PlanResult<Option<LogicalExpr>> {
    match props {
        None => Ok(None),
        Some(PropertyMap::Parameter(_)) => {
            Err(PlanError::PropertyParameterInWriter(clause_name))
        }
        Some(map @ PropertyMap::Literal(_)) => Ok(Some(planner.lower_property_map(map)?)),
    }
}

// ---------------------------------------------------------------------------
// SET / REMOVE
// ---------------------------------------------------------------------------

pub(crate) fn plan_set<'t>(
    planner: &mut Planner<'t>,
    clause: &SetClause<'t>,
    prev: Option<Arc<Query>>,
    _is_last: bool,
) -> PlanResult<Arc<Query>> {
    let clause_name: &'static str = if clause.is_remove { "REMOVE" } else { "SET" };

    let mut query = planner.begin_clause(prev);
    planner.passthrough_targets(&mut query);

    let mut items = Vec::with_capacity(clause.items.len());
    for (index, item) in clause.items.iter().enumerate() {
        let (var_name, prop_name) = match &item.target {
            Expression::PropertyAccess { base, key } => match base.as_ref() {
                Expression::Variable(v) => (*v, *key),
                _ => return Err(PlanError::InvalidSetTarget(clause_name)),
            },
            _ => return Err(PlanError::InvalidSetTarget(clause_name)),
        };

        let binding = planner.ctx.lookup_required(var_name)?;
        if !matches!(binding.kind, BindingKind::Vertex | BindingKind::Edge) {
            return Err(PlanError::InvalidSetTarget(clause_name));
        }
        let entity_position = query
            .target_position(var_name)
            .expect("visible bindings are projected through");

        let prop_position = match &item.value {
            Some(value) => {
                let lowered = planner.lower_expression(value)?;
                let position = query.targets.len();
                query.targets.push(TargetEntry::new(
                    lowered,
                    format!("_set_expr_{}", index),
                    TypeTag::Unknown,
                ));
                Some(position)
            }
            None => None,
        };

        items.push(SetDirectiveItem {
            var_name: var_name.to_string(),
            entity_position,
            prop_name: prop_name.to_string(),
            prop_position,
            remove_flag: clause.is_remove,
        });
    }

    let directive = WriterDirective::Set(SetDirective {
        is_remove: clause.is_remove,
        items,
    });
    query.targets.push(directive_target(SET_CLAUSE_FUNC, directive));

    Ok(Arc::new(query))
}

// ---------------------------------------------------------------------------
// DELETE
// ---------------------------------------------------------------------------

pub(crate) fn plan_delete<'t>(
    planner: &mut Planner<'t>,
    clause: &DeleteClause<'t>,
    prev: Option<Arc<Query>>,
    _is_last: bool,
) -> PlanResult<Arc<Query>> {
    if prev.is_none() {
        return Err(PlanError::DeleteWithoutSource);
    }

    let mut query = planner.begin_clause(prev);
    planner.passthrough_targets(&mut query);

    let mut items = Vec::with_capacity(clause.exprs.len());
    for expr in &clause.exprs {
        let var_name = match expr {
            Expression::Variable(v) => *v,
            _ => return Err(PlanError::InvalidDeleteTarget),
        };
        let binding = planner.ctx.lookup_required(var_name)?;
        let kind = match binding.kind {
            BindingKind::Vertex => LabelKind::Vertex,
            BindingKind::Edge => LabelKind::Edge,
            _ => return Err(PlanError::InvalidDeleteTarget),
        };
        let entity_position = query
            .target_position(var_name)
            .expect("visible bindings are projected through");
        items.push(DeleteDirectiveItem {
            var_name: var_name.to_string(),
            entity_position,
            kind,
        });
    }

    let directive = WriterDirective::Delete(DeleteDirective {
        detach: clause.detach,
        items,
    });
    query
        .targets
        .push(directive_target(DELETE_CLAUSE_FUNC, directive));

    Ok(Arc::new(query))
}

// ---------------------------------------------------------------------------
// MERGE
// ---------------------------------------------------------------------------

pub(crate) fn plan_merge<'t>(
    planner: &mut Planner<'t>,
    clause: &MergeClause<'t>,
    prev: Option<Arc<Query>>,
    is_last: bool,
) -> PlanResult<Arc<Query>> {
    let path = &clause.path;

    // validate the path up front: merge-created entities need labels and
    // directions just like CREATE, and its edge variables must be fresh
    for rel in path.relationships() {
        if rel.varlen.is_some() {
            return Err(PlanError::VarLenNotAllowedHere("MERGE"));
        }
        if rel.direction == Direction::Either {
            return Err(PlanError::DirectedEdgeRequired);
        }
        if rel.label.is_none() {
            return Err(PlanError::CreateEdgeLabelRequired);
        }
        if let Some(name) = rel.name {
            if planner.ctx.lookup(name).is_some() {
                return Err(PlanError::MergeEdgeReused(name.to_string()));
            }
        }
        if matches!(rel.props, Some(PropertyMap::Parameter(_))) {
            return Err(PlanError::PropertyParameterInWriter("MERGE"));
        }
    }
    for node in path.nodes() {
        if matches!(node.props, Some(PropertyMap::Parameter(_))) {
            return Err(PlanError::PropertyParameterInWriter("MERGE"));
        }
    }

    // labels first: the match side reads the catalog, the create side may
    // extend it
    for node in path.nodes() {
        if let Some(label) = node.label {
            planner
                .catalog
                .create_label_if_missing(planner.graph.oid, label, LabelKind::Vertex)?;
        }
    }
    for rel in path.relationships() {
        if let Some(label) = rel.label {
            planner
                .catalog
                .create_label_if_missing(planner.graph.oid, label, LabelKind::Edge)?;
        }
    }

    let has_prev = prev.is_some();
    let mut outer = Query::new();
    let prev_index = match prev {
        Some(prev) => {
            let index = outer.add_rte_unjoined(RangeTblEntry {
                alias: PREVIOUS_CLAUSE_ALIAS.to_string(),
                kind: RteKind::Subquery {
                    query: prev,
                    lateral: false,
                },
            });
            planner.rebind_to(PREVIOUS_CLAUSE_ALIAS);
            Some(index)
        }
        None => {
            planner.ctx.advance(|b| b.clone());
            None
        }
    };
    let left_count = planner.ctx.bindings().len();

    // the MATCH-shape side; every entity is materialized so the directive
    // can reference it by position
    let mut inner = Query::new();
    let artifacts = transform_path(planner, &mut inner, path, true)?;
    add_edge_uniqueness(&mut inner, artifacts.edge_refs);
    for binding in planner.ctx.bindings().iter().skip(left_count) {
        inner
            .targets
            .push(TargetEntry::new(binding.expr.clone(), binding.name, binding.ty));
    }

    let inner_index = outer.add_rte_unjoined(RangeTblEntry {
        alias: MERGE_SIDE_ALIAS.to_string(),
        kind: RteKind::Subquery {
            query: Arc::new(inner),
            lateral: has_prev,
        },
    });

    outer.from = match prev_index {
        Some(prev_index) => vec![FromItem::Join(Box::new(JoinItem {
            join_type: JoinType::LeftLateral,
            left: FromItem::Rte(prev_index),
            right: FromItem::Rte(inner_index),
            quals: None,
        }))],
        None => vec![FromItem::Rte(inner_index)],
    };

    // merged columns: previous clause first, path entities appended
    let mut rebound = Vec::with_capacity(planner.ctx.bindings().len());
    for (i, binding) in planner.ctx.bindings().iter().enumerate() {
        let alias = if i < left_count {
            PREVIOUS_CLAUSE_ALIAS
        } else {
            MERGE_SIDE_ALIAS
        };
        outer.targets.push(TargetEntry::new(
            ColumnRef::new(alias, binding.name),
            binding.name,
            binding.ty,
        ));
        rebound.push(rebound_binding(binding, alias));
    }
    planner.ctx.reset(rebound);

    // the create-equivalent directive
    let mut create_targets: Vec<CreateTarget> = Vec::new();
    let nodes: Vec<&NodePattern> = path.nodes().collect();
    let rels: Vec<&RelationshipPattern> = path.relationships().collect();

    let mut node_positions: Vec<usize> = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        let name = artifacts.node_bindings[i].expect("merge paths materialize every node");
        let position = outer
            .target_position(name)
            .expect("path entities are projected through");
        node_positions.push(position);

        let previous_clause = node
            .name
            .map(|n| {
                planner
                    .ctx
                    .lookup(n)
                    .is_some_and(|b| !b.declared_in_current_clause)
            })
            .unwrap_or(false);

        let label_record = match node.label {
            Some(label) => planner
                .catalog
                .label_of_kind(planner.graph.oid, label, LabelKind::Vertex)?
                .clone(),
            None => planner
                .catalog
                .default_label(planner.graph.oid, LabelKind::Vertex)?
                .clone(),
        };
        let prop_expr = lower_writer_properties(planner, node.props.as_ref(), "MERGE")?;

        create_targets.push(CreateTarget {
            kind: LabelKind::Vertex,
            label: label_record.name,
            relation_oid: label_record.relation_oid,
            variable_name: node.name.map(|n| n.to_string()),
            id_expr: if previous_clause {
                None
            } else {
                Some(entity_id_default(label_record.relation_oid))
            },
            prop_expr,
            tuple_position: position,
            previous_clause,
            in_path_var: path.var_name.is_some(),
            start_position: None,
            end_position: None,
        });
    }

    for (i, rel) in rels.iter().enumerate() {
        let name = artifacts.edge_bindings[i];
        let position = outer
            .target_position(name)
            .expect("path entities are projected through");
        let (start_position, end_position) = match rel.direction {
            Direction::Outgoing => (node_positions[i], node_positions[i + 1]),
            Direction::Incoming => (node_positions[i + 1], node_positions[i]),
            Direction::Either => unreachable!("validated above"),
        };
        let label_record = planner
            .catalog
            .label_of_kind(
                planner.graph.oid,
                rel.label.expect("validated above"),
                LabelKind::Edge,
            )?
            .clone();
        let prop_expr = lower_writer_properties(planner, rel.props.as_ref(), "MERGE")?;

        create_targets.push(CreateTarget {
            kind: LabelKind::Edge,
            label: label_record.name,
            relation_oid: label_record.relation_oid,
            variable_name: rel.name.map(|n| n.to_string()),
            id_expr: Some(entity_id_default(label_record.relation_oid)),
            prop_expr,
            tuple_position: position,
            previous_clause: false,
            in_path_var: path.var_name.is_some(),
            start_position: Some(start_position),
            end_position: Some(end_position),
        });
    }

    let directive = WriterDirective::Merge(MergeDirective {
        create: CreateDirective {
            terminal: is_last,
            targets: create_targets,
        },
        match_rte_index: inner_index,
    });
    outer
        .targets
        .push(directive_target(MERGE_CLAUSE_FUNC, directive));

    Ok(Arc::new(outer))
}

//! UNION planning.
//!
//! The statement's set-operation tree is normalized recursively: every leaf
//! single-query becomes a subquery in the outer range table, column types
//! unify per position under the SQL common-type rule, unknown-typed
//! constants get explicit casts, and trailing ORDER BY/SKIP/LIMIT (parsed
//! into the rightmost leaf) hoist to the outer query, where they may only
//! name output columns.

use std::sync::Arc;

use crate::open_cypher_parser::ast::CypherStatement;
use crate::query_planner::errors::{PlanError, PlanResult};
use crate::query_planner::logical_expr::{ColumnRef, LogicalExpr};
use crate::query_planner::logical_plan::plan_builder::Planner;
use crate::query_planner::logical_plan::{Query, RangeTblEntry, RteKind, SetOpTree, TargetEntry};
use crate::query_planner::types::{self, TypeTag};

pub(crate) fn plan_union<'t>(
    planner: &mut Planner<'t>,
    statement: &CypherStatement<'t>,
) -> PlanResult<Arc<Query>> {
    let mut leaves: Vec<Arc<Query>> = Vec::new();
    let tree = collect_branches(planner, statement, &mut leaves)?;

    // ---- column-count and type unification -----------------------------
    let width = leaves[0].targets.len();
    for leaf in &leaves[1..] {
        if leaf.targets.len() != width {
            return Err(PlanError::UnionColumnCount {
                left: width,
                right: leaf.targets.len(),
            });
        }
    }

    let mut common: Vec<TypeTag> = leaves[0].targets.iter().map(|t| t.ty).collect();
    for leaf in &leaves[1..] {
        for (position, target) in leaf.targets.iter().enumerate() {
            common[position] = types::common_type(common[position], target.ty).ok_or(
                PlanError::UnionColumnType {
                    position,
                    left: common[position],
                    right: target.ty,
                },
            )?;
        }
    }

    // unknown-typed constants take the common type; non-constant unknowns
    // are left to the host
    for leaf in leaves.iter_mut() {
        let query = Arc::make_mut(leaf);
        for (position, target) in query.targets.iter_mut().enumerate() {
            if target.ty == TypeTag::Unknown
                && common[position] != TypeTag::Unknown
                && target.expr.is_constant()
            {
                let expr = std::mem::replace(&mut target.expr, LogicalExpr::Star);
                target.expr = LogicalExpr::TypeCast {
                    expr: Box::new(expr),
                    target: common[position],
                };
                target.ty = common[position];
            }
        }
    }

    // ---- hoist ordering/paging from the rightmost leaf -----------------
    let column_names: Vec<String> = leaves[0].targets.iter().map(|t| t.name.clone()).collect();
    let (sort, skip, limit) = {
        let rightmost = Arc::make_mut(leaves.last_mut().expect("at least two leaves"));
        (
            std::mem::take(&mut rightmost.sort),
            rightmost.skip.take(),
            rightmost.limit.take(),
        )
    };
    for item in &sort {
        match &item.expr {
            LogicalExpr::OutputColumn(name) if column_names.contains(name) => {}
            _ => return Err(PlanError::InvalidUnionOrderBy),
        }
    }

    // ---- assemble the outer query --------------------------------------
    let mut outer = Query::new();
    for (i, leaf) in leaves.into_iter().enumerate() {
        outer.add_rte_unjoined(RangeTblEntry {
            alias: format!("branch_{}", i),
            kind: RteKind::Subquery {
                query: leaf,
                lateral: false,
            },
        });
    }

    for (position, name) in column_names.iter().enumerate() {
        outer.targets.push(TargetEntry::new(
            ColumnRef::new("branch_0", name.as_str()),
            name.as_str(),
            common[position],
        ));
    }

    outer.set_op = Some(attach_dedup_operators(tree, &common));
    outer.sort = sort;
    outer.skip = skip;
    outer.limit = limit;

    Ok(Arc::new(outer))
}

/// Depth-first walk of the statement tree; leaves plan in isolated binding
/// scopes and land in `leaves` left to right.
fn collect_branches<'t>(
    planner: &mut Planner<'t>,
    statement: &CypherStatement<'t>,
    leaves: &mut Vec<Arc<Query>>,
) -> PlanResult<SetOpTree> {
    match statement {
        CypherStatement::Single(query) => {
            let planned = planner.plan_isolated(query)?;
            leaves.push(planned);
            Ok(SetOpTree::Leaf {
                rte_index: leaves.len() - 1,
            })
        }
        CypherStatement::Union { all, larg, rarg } => {
            let left = collect_branches(planner, larg, leaves)?;
            let right = collect_branches(planner, rarg, leaves)?;
            Ok(SetOpTree::Branch {
                all: *all,
                dedup_operators: Vec::new(),
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    }
}

/// UNION (not ALL) nodes eliminate duplicates with one equality operator
/// per output column, chosen by the unified column type.
fn attach_dedup_operators(tree: SetOpTree, common: &[TypeTag]) -> SetOpTree {
    match tree {
        SetOpTree::Leaf { rte_index } => SetOpTree::Leaf { rte_index },
        SetOpTree::Branch {
            all,
            left,
            right,
            ..
        } => {
            let dedup_operators = if all {
                Vec::new()
            } else {
                common
                    .iter()
                    .map(|tag| types::equality_operator(*tag).to_string())
                    .collect()
            };
            SetOpTree::Branch {
                all,
                dedup_operators,
                left: Box::new(attach_dedup_operators(*left, common)),
                right: Box::new(attach_dedup_operators(*right, common)),
            }
        }
    }
}

//! OPTIONAL MATCH with a preceding clause: a lateral left join between the
//! previous subquery (left) and the match-only subquery (right). Left
//! columns keep their names and positions; new right-side columns are
//! appended. Without a preceding clause OPTIONAL MATCH degrades to a plain
//! MATCH and is handled there.

use std::sync::Arc;

use crate::open_cypher_parser::ast::MatchClause;
use crate::query_planner::errors::PlanResult;
use crate::query_planner::logical_expr::ColumnRef;
use crate::query_planner::logical_plan::match_clause::{add_edge_uniqueness, transform_path};
use crate::query_planner::logical_plan::plan_builder::{rebound_binding, Planner};
use crate::query_planner::logical_plan::{
    FromItem, JoinItem, JoinType, Query, RangeTblEntry, RteKind, TargetEntry,
    PREVIOUS_CLAUSE_ALIAS,
};

/// Alias of the lateral match-only subquery on the right of the join.
const OPTIONAL_SIDE_ALIAS: &str = "_optional";

pub(crate) fn plan_optional_match<'t>(
    planner: &mut Planner<'t>,
    clause: &MatchClause<'t>,
    prev: Arc<Query>,
) -> PlanResult<Arc<Query>> {
    let mut outer = Query::new();
    let prev_index = outer.add_rte_unjoined(RangeTblEntry {
        alias: PREVIOUS_CLAUSE_ALIAS.to_string(),
        kind: RteKind::Subquery {
            query: prev,
            lateral: false,
        },
    });
    planner.rebind_to(PREVIOUS_CLAUSE_ALIAS);

    let left_count = planner.ctx.bindings().len();

    // The right side sees the left side's columns laterally, so in-scope
    // references inside the pattern resolve to `_prev` columns unchanged.
    let mut inner = Query::new();
    let mut edge_refs = Vec::new();
    for path in &clause.patterns {
        edge_refs.extend(transform_path(planner, &mut inner, path, false)?.edge_refs);
    }
    add_edge_uniqueness(&mut inner, edge_refs);
    if let Some(cond) = &clause.where_clause {
        let lowered = planner.lower_boolean(cond)?;
        inner.add_qual(lowered);
    }

    // project only the bindings this pattern introduced
    for binding in planner.ctx.bindings().iter().skip(left_count) {
        inner
            .targets
            .push(TargetEntry::new(binding.expr.clone(), binding.name, binding.ty));
    }

    let inner_index = outer.add_rte_unjoined(RangeTblEntry {
        alias: OPTIONAL_SIDE_ALIAS.to_string(),
        kind: RteKind::Subquery {
            query: Arc::new(inner),
            lateral: true,
        },
    });

    outer.from = vec![FromItem::Join(Box::new(JoinItem {
        join_type: JoinType::LeftLateral,
        left: FromItem::Rte(prev_index),
        right: FromItem::Rte(inner_index),
        quals: None,
    }))];

    // merged column list: left takes precedence, new right columns append
    let mut rebound = Vec::with_capacity(planner.ctx.bindings().len());
    for (i, binding) in planner.ctx.bindings().iter().enumerate() {
        if i < left_count {
            outer.targets.push(TargetEntry::new(
                ColumnRef::new(PREVIOUS_CLAUSE_ALIAS, binding.name),
                binding.name,
                binding.ty,
            ));
            rebound.push(binding.clone());
        } else {
            outer.targets.push(TargetEntry::new(
                ColumnRef::new(OPTIONAL_SIDE_ALIAS, binding.name),
                binding.name,
                binding.ty,
            ));
            rebound.push(rebound_binding(binding, OPTIONAL_SIDE_ALIAS));
        }
    }
    planner.ctx.reset(rebound);

    Ok(Arc::new(outer))
}

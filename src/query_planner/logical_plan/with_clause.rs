//! WITH: the same projection shape as RETURN, plus a downstream WHERE over
//! the projected rows and a binding reset so later clauses only see the
//! projected names.

use std::sync::Arc;

use crate::open_cypher_parser::ast::WithClause;
use crate::query_planner::errors::PlanResult;
use crate::query_planner::logical_plan::plan_builder::Planner;
use crate::query_planner::logical_plan::return_clause::{plan_projection, ProjectionSpec};
use crate::query_planner::logical_plan::{Query, RangeTblEntry, RteKind, PREVIOUS_CLAUSE_ALIAS};

pub(crate) fn plan_with<'t>(
    planner: &mut Planner<'t>,
    clause: &WithClause<'t>,
    prev: Option<Arc<Query>>,
) -> PlanResult<Arc<Query>> {
    let spec = ProjectionSpec {
        items: &clause.items,
        distinct: clause.distinct,
        order_by: &clause.order_by,
        skip: clause.skip.as_ref(),
        limit: clause.limit.as_ref(),
        require_alias: true,
    };
    let (projection, bindings) = plan_projection(planner, spec, prev)?;
    planner.ctx.reset(bindings);

    let result = match &clause.where_clause {
        None => projection,
        Some(cond) => {
            // the filter applies to the projected rows, so it wraps the
            // projection as one more subquery level
            let mut wrapper = Query::new();
            wrapper.add_rte(RangeTblEntry {
                alias: PREVIOUS_CLAUSE_ALIAS.to_string(),
                kind: RteKind::Subquery {
                    query: Arc::new(projection),
                    lateral: false,
                },
            });
            planner.rebind_to(PREVIOUS_CLAUSE_ALIAS);
            let lowered = planner.lower_boolean(cond)?;
            wrapper.add_qual(lowered);
            planner.passthrough_targets(&mut wrapper);
            wrapper
        }
    };

    Ok(Arc::new(result))
}

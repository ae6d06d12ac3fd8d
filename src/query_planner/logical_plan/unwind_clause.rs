//! UNWIND: project the previous clause through and append an `unnest` call
//! over the list expression, aliased to the new variable.

use std::sync::Arc;

use crate::open_cypher_parser::ast::UnwindClause;
use crate::query_planner::errors::{PlanError, PlanResult};
use crate::query_planner::logical_expr::FuncCall;
use crate::query_planner::logical_plan::plan_builder::Planner;
use crate::query_planner::logical_plan::{Query, TargetEntry};
use crate::query_planner::plan_ctx::{Binding, BindingKind};
use crate::query_planner::types::TypeTag;

pub(crate) fn plan_unwind<'t>(
    planner: &mut Planner<'t>,
    clause: &UnwindClause<'t>,
    prev: Option<Arc<Query>>,
) -> PlanResult<Arc<Query>> {
    let mut query = planner.begin_clause(prev);
    planner.passthrough_targets(&mut query);

    // duplicate-alias detection runs against the active target list
    if query.target_named(clause.as_name).is_some() {
        return Err(PlanError::DuplicateBinding(clause.as_name.to_string()));
    }

    let list = planner.lower_expression(&clause.expr)?;
    let unnested = FuncCall::new("unnest", vec![list]);

    query.targets.push(TargetEntry::new(
        unnested.clone(),
        clause.as_name,
        TypeTag::Unknown,
    ));

    planner.ctx.declare(Binding {
        name: clause.as_name,
        kind: BindingKind::Scalar,
        declared_in_current_clause: true,
        expr: unnested,
        properties_expr: None,
        id_expr: None,
        label: None,
        ty: TypeTag::Unknown,
    })?;

    Ok(Arc::new(query))
}

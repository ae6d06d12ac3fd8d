//! RETURN (and the projection shape WITH shares): one target entry per
//! item, `*` expanded to every visible binding in binding order, ORDER
//! BY/SKIP/LIMIT on the projection.

use std::sync::Arc;

use crate::open_cypher_parser::ast::{
    Expression, ProjectionItem, ReturnClause, SortItem as AstSortItem,
};
use crate::query_planner::errors::{PlanError, PlanResult};
use crate::query_planner::logical_expr::ast_conversion::check_paging_expression;
use crate::query_planner::logical_expr::LogicalExpr;
use crate::query_planner::logical_plan::plan_builder::{rebound_binding, Planner};
use crate::query_planner::logical_plan::{
    Query, SortClauseItem, TargetEntry, PREVIOUS_CLAUSE_ALIAS,
};
use crate::query_planner::plan_ctx::{Binding, BindingKind};

pub(crate) struct ProjectionSpec<'c, 't> {
    pub items: &'c [ProjectionItem<'t>],
    pub distinct: bool,
    pub order_by: &'c [AstSortItem<'t>],
    pub skip: Option<&'c Expression<'t>>,
    pub limit: Option<&'c Expression<'t>>,
    /// WITH requires an alias on every non-variable expression
    pub require_alias: bool,
}

pub(crate) fn plan_return<'t>(
    planner: &mut Planner<'t>,
    clause: &ReturnClause<'t>,
    prev: Option<Arc<Query>>,
) -> PlanResult<Arc<Query>> {
    let spec = ProjectionSpec {
        items: &clause.items,
        distinct: clause.distinct,
        order_by: &clause.order_by,
        skip: clause.skip.as_ref(),
        limit: clause.limit.as_ref(),
        require_alias: false,
    };
    let (query, bindings) = plan_projection(planner, spec, prev)?;
    planner.ctx.reset(bindings);
    Ok(Arc::new(query))
}

/// Build the projection query and the binding set visible after it.
pub(crate) fn plan_projection<'c, 't>(
    planner: &mut Planner<'t>,
    spec: ProjectionSpec<'c, 't>,
    prev: Option<Arc<Query>>,
) -> PlanResult<(Query, Vec<Binding<'t>>)> {
    let mut query = planner.begin_clause(prev);
    let mut new_bindings: Vec<Binding<'t>> = Vec::new();

    for item in spec.items {
        match item {
            ProjectionItem::Star => {
                // `*` is every visible binding, in binding order
                let visible: Vec<Binding<'t>> = planner.ctx.bindings().to_vec();
                for binding in visible {
                    if query.target_named(binding.name).is_some() {
                        return Err(PlanError::DuplicateBinding(binding.name.to_string()));
                    }
                    query.targets.push(TargetEntry::new(
                        binding.expr.clone(),
                        binding.name,
                        binding.ty,
                    ));
                    new_bindings.push(rebound_binding(&binding, PREVIOUS_CLAUSE_ALIAS));
                }
            }
            ProjectionItem::Expr { expr, alias } => {
                let (name, kind, ty) = projection_item_name(planner, expr, *alias, spec.require_alias)?;
                if query.target_named(name).is_some() {
                    return Err(PlanError::DuplicateBinding(name.to_string()));
                }
                let lowered = planner.lower_expression(expr)?;
                let ty = ty.unwrap_or_else(|| lowered.type_tag());
                query.targets.push(TargetEntry::new(lowered, name, ty));

                let template = Binding {
                    name,
                    kind,
                    declared_in_current_clause: true,
                    expr: LogicalExpr::Literal(crate::value::Value::Null),
                    properties_expr: None,
                    id_expr: None,
                    label: None,
                    ty,
                };
                new_bindings.push(rebound_binding(&template, PREVIOUS_CLAUSE_ALIAS));
            }
        }
    }

    for sort_item in spec.order_by {
        let lowered = lower_sort_expression(planner, &query, &sort_item.expr)?;
        query.sort.push(SortClauseItem {
            expr: lowered,
            descending: sort_item.descending,
        });
    }

    if let Some(skip) = spec.skip {
        check_paging_expression(skip)?;
        query.skip = Some(planner.lower_expression(skip)?);
    }
    if let Some(limit) = spec.limit {
        check_paging_expression(limit)?;
        query.limit = Some(planner.lower_expression(limit)?);
    }

    query.distinct = spec.distinct;
    Ok((query, new_bindings))
}

/// Output name for a projection item: the alias, the variable's own name,
/// or (RETURN only) the canonical printed form of the expression.
fn projection_item_name<'t>(
    planner: &Planner<'t>,
    expr: &Expression<'t>,
    alias: Option<&'t str>,
    require_alias: bool,
) -> PlanResult<(&'t str, BindingKind, Option<crate::query_planner::types::TypeTag>)> {
    if let Some(alias) = alias {
        let kind = match expr {
            Expression::Variable(v) => planner
                .ctx
                .lookup(v)
                .map(|b| b.kind)
                .unwrap_or(BindingKind::Scalar),
            _ => BindingKind::Scalar,
        };
        let ty = match expr {
            Expression::Variable(v) => planner.ctx.lookup(v).map(|b| b.ty),
            _ => None,
        };
        return Ok((alias, kind, ty));
    }

    if let Expression::Variable(name) = expr {
        let binding = planner.ctx.lookup_required(name)?;
        return Ok((name, binding.kind, Some(binding.ty)));
    }

    if require_alias {
        return Err(PlanError::MissingAlias);
    }

    // unaliased RETURN expressions name themselves after their text
    let printed = expr.to_string();
    Ok((planner.ctx.intern(&printed), BindingKind::Scalar, None))
}

/// ORDER BY resolves output aliases first, then visible bindings.
fn lower_sort_expression<'t>(
    planner: &mut Planner<'t>,
    query: &Query,
    expr: &Expression<'t>,
) -> PlanResult<LogicalExpr> {
    if let Expression::Variable(name) = expr {
        if query.target_named(name).is_some() {
            return Ok(LogicalExpr::OutputColumn(name.to_string()));
        }
    }
    planner.lower_expression(expr)
}

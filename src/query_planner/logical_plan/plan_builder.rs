//! Clause pipeline.
//!
//! [`Planner`] walks the clause list of a single query in program order and
//! stitches one [`Query`] per clause, each wrapping its predecessor as the
//! `_prev` subquery range-table entry. The per-clause shapes live in their
//! own modules; this file owns the shared state (catalog handle, binding
//! context, configuration) and the boundary bookkeeping between clauses.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::FrontendConfig;
use crate::graph_catalog::{GraphCatalog, GraphRecord};
use crate::open_cypher_parser::ast::{Clause, CypherStatement, SingleQuery};
use crate::query_planner::errors::{PlanError, PlanResult};
use crate::query_planner::logical_expr::{ColumnRef, FuncCall, LogicalExpr};
use crate::query_planner::logical_plan::{
    match_clause, optional_match_clause, return_clause, union_clause, unwind_clause, with_clause,
    write_clauses, Query, RangeTblEntry, RteKind, TargetEntry, PREVIOUS_CLAUSE_ALIAS,
};
use crate::query_planner::plan_ctx::{Binding, BindingKind, NameArena, PlanCtx};
use crate::value::Value;

pub struct Planner<'t> {
    pub catalog: &'t mut GraphCatalog,
    pub graph: GraphRecord,
    pub config: &'t FrontendConfig,
    pub params: Option<&'t HashMap<String, Value>>,
    pub ctx: PlanCtx<'t>,
}

impl<'t> Planner<'t> {
    pub fn new(
        catalog: &'t mut GraphCatalog,
        graph: GraphRecord,
        config: &'t FrontendConfig,
        params: Option<&'t HashMap<String, Value>>,
        arena: &'t NameArena,
    ) -> Self {
        Planner {
            catalog,
            graph,
            config,
            params,
            ctx: PlanCtx::new(arena),
        }
    }

    /// Plan a whole statement: a single query or a UNION tree.
    pub fn plan_statement(&mut self, statement: &CypherStatement<'t>) -> PlanResult<Arc<Query>> {
        match statement {
            CypherStatement::Single(query) => self.plan_single_query(query),
            CypherStatement::Union { .. } => union_clause::plan_union(self, statement),
        }
    }

    /// Plan one clause list, left to right.
    pub fn plan_single_query(&mut self, query: &SingleQuery<'t>) -> PlanResult<Arc<Query>> {
        let mut prev: Option<Arc<Query>> = None;
        let count = query.clauses.len();

        for (index, clause) in query.clauses.iter().enumerate() {
            let is_last = index + 1 == count;
            log::debug!("plan_builder: clause {} ({})", index, clause.name());
            prev = Some(self.plan_clause(clause, prev, is_last)?);
        }

        prev.ok_or_else(|| PlanError::UnknownVariable("<empty query>".to_string()))
    }

    /// Plan a query in a fresh binding scope (UNION branches are siblings,
    /// not nested scopes).
    pub fn plan_isolated(&mut self, query: &SingleQuery<'t>) -> PlanResult<Arc<Query>> {
        let saved = self.ctx.take_scope();
        let result = self.plan_single_query(query);
        self.ctx.reset(saved);
        result
    }

    fn plan_clause(
        &mut self,
        clause: &Clause<'t>,
        prev: Option<Arc<Query>>,
        is_last: bool,
    ) -> PlanResult<Arc<Query>> {
        match clause {
            Clause::Match(m) if m.optional && prev.is_some() => {
                optional_match_clause::plan_optional_match(
                    self,
                    m,
                    prev.expect("checked by guard"),
                )
            }
            Clause::Match(m) => match_clause::plan_match(self, m, prev),
            Clause::Unwind(u) => unwind_clause::plan_unwind(self, u, prev),
            Clause::With(w) => with_clause::plan_with(self, w, prev),
            Clause::Return(r) => return_clause::plan_return(self, r, prev),
            Clause::Create(c) => write_clauses::plan_create(self, c, prev, is_last),
            Clause::Merge(m) => write_clauses::plan_merge(self, m, prev, is_last),
            Clause::Set(s) => write_clauses::plan_set(self, s, prev, is_last),
            Clause::Delete(d) => write_clauses::plan_delete(self, d, prev, is_last),
            Clause::Call(_) => Err(PlanError::CallNotSupported),
        }
    }

    // ------------------------------------------------------------------
    // Clause-boundary bookkeeping
    // ------------------------------------------------------------------

    /// Open a clause query. When a previous clause exists it enters the
    /// range table as the `_prev` subquery and every visible binding is
    /// re-pointed at its output columns.
    pub(crate) fn begin_clause(&mut self, prev: Option<Arc<Query>>) -> Query {
        let mut query = Query::new();
        match prev {
            Some(prev) => {
                query.add_rte(RangeTblEntry {
                    alias: PREVIOUS_CLAUSE_ALIAS.to_string(),
                    kind: RteKind::Subquery {
                        query: prev,
                        lateral: false,
                    },
                });
                self.rebind_to(PREVIOUS_CLAUSE_ALIAS);
            }
            None => self.ctx.advance(|b| b.clone()),
        }
        query
    }

    /// Re-point every binding at the columns of the subquery aliased
    /// `alias` (which projects one column per binding name).
    pub(crate) fn rebind_to(&mut self, alias: &str) {
        let alias = alias.to_string();
        self.ctx.advance(|b| rebound_binding(b, &alias));
    }

    /// Project every visible binding through, in binding order.
    pub(crate) fn passthrough_targets(&self, query: &mut Query) {
        for binding in self.ctx.bindings() {
            query.targets.push(TargetEntry::new(
                binding.expr.clone(),
                binding.name,
                binding.ty,
            ));
        }
    }
}

/// A binding as seen through the output of a projection/subquery aliased
/// `alias`. Entity kinds regain `id`/`properties` accessors as field
/// accesses into the composed entity value.
pub(crate) fn rebound_binding<'t>(binding: &Binding<'t>, alias: &str) -> Binding<'t> {
    let column = ColumnRef::new(alias, binding.name);
    match binding.kind {
        BindingKind::Vertex | BindingKind::Edge => Binding {
            expr: column.clone(),
            properties_expr: Some(field_access(column.clone(), "properties")),
            id_expr: Some(field_access(column, "id")),
            ..binding.clone()
        },
        BindingKind::VleEdge | BindingKind::Scalar => Binding {
            expr: column,
            properties_expr: None,
            id_expr: None,
            ..binding.clone()
        },
    }
}

pub(crate) fn field_access(base: LogicalExpr, key: &str) -> LogicalExpr {
    LogicalExpr::FieldAccess {
        base: Box::new(base),
        key: key.to_string(),
    }
}

/// Entity constructor for a vertex scanned from a label table.
pub(crate) fn vertex_value_expr(alias: &str, label: &str) -> LogicalExpr {
    FuncCall::new(
        "build_vertex",
        vec![
            ColumnRef::new(alias, "id"),
            LogicalExpr::Literal(Value::String(label.to_string())),
            ColumnRef::new(alias, "properties"),
        ],
    )
}

/// Entity constructor for an edge scanned from a label table.
pub(crate) fn edge_value_expr(alias: &str, label: &str) -> LogicalExpr {
    FuncCall::new(
        "build_edge",
        vec![
            ColumnRef::new(alias, "id"),
            ColumnRef::new(alias, "start_id"),
            ColumnRef::new(alias, "end_id"),
            LogicalExpr::Literal(Value::String(label.to_string())),
            ColumnRef::new(alias, "properties"),
        ],
    )
}

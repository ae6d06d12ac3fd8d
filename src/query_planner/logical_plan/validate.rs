//! Plan sanity pass.
//!
//! Walks a finished [`Query`] tree and checks the structural invariants the
//! transform promises: boolean trees are maximally flattened, column
//! references resolve against a visible range-table alias, target names are
//! unique per query, set-operation leaves index real range-table entries,
//! and sort-by-name items name real output columns. `compile()` runs it in
//! debug builds; tests call it directly.

use std::collections::HashSet;
use std::fmt;

use crate::query_planner::logical_expr::{LogicalExpr, Operator};
use crate::query_planner::logical_plan::{FromItem, Query, RteKind, SetOpTree};

#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation(pub String);

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan invariant violated: {}", self.0)
    }
}

fn violation<T>(message: impl Into<String>) -> Result<T, InvariantViolation> {
    Err(InvariantViolation(message.into()))
}

/// Check every invariant over the whole tree.
pub fn check_invariants(query: &Query) -> Result<(), InvariantViolation> {
    check_query(query, &HashSet::new())
}

fn check_query(query: &Query, outer_aliases: &HashSet<String>) -> Result<(), InvariantViolation> {
    let mut visible: HashSet<String> = outer_aliases.clone();
    for rte in &query.range_table {
        visible.insert(rte.alias.clone());
    }

    // nested subqueries first, with this level's aliases visible (lateral
    // and correlated references resolve against them)
    for rte in &query.range_table {
        match &rte.kind {
            RteKind::Subquery { query: inner, .. } => check_query(inner, &visible)?,
            RteKind::Function { call, .. } => {
                for arg in &call.args {
                    check_expr(arg, &visible)?;
                }
            }
            RteKind::Relation { .. } => {}
        }
    }

    for item in &query.from {
        check_from_item(item, query, &visible)?;
    }

    if let Some(quals) = &query.quals {
        check_expr(quals, &visible)?;
    }

    let mut names: HashSet<&str> = HashSet::new();
    for target in &query.targets {
        if !names.insert(target.name.as_str()) {
            return violation(format!("duplicate target name \"{}\"", target.name));
        }
        check_expr(&target.expr, &visible)?;
    }

    for sort_item in &query.sort {
        if let LogicalExpr::OutputColumn(name) = &sort_item.expr {
            if !names.contains(name.as_str()) {
                return violation(format!("sort references unknown output column \"{}\"", name));
            }
        } else {
            check_expr(&sort_item.expr, &visible)?;
        }
    }
    if let Some(skip) = &query.skip {
        check_expr(skip, &visible)?;
    }
    if let Some(limit) = &query.limit {
        check_expr(limit, &visible)?;
    }

    if let Some(set_op) = &query.set_op {
        check_set_op(set_op, query)?;
    }

    Ok(())
}

fn check_from_item(
    item: &FromItem,
    query: &Query,
    visible: &HashSet<String>,
) -> Result<(), InvariantViolation> {
    match item {
        FromItem::Rte(index) => {
            if *index >= query.range_table.len() {
                return violation(format!("from-list references range-table entry {}", index));
            }
            Ok(())
        }
        FromItem::Join(join) => {
            check_from_item(&join.left, query, visible)?;
            check_from_item(&join.right, query, visible)?;
            if let Some(quals) = &join.quals {
                check_expr(quals, visible)?;
            }
            Ok(())
        }
    }
}

fn check_set_op(tree: &SetOpTree, query: &Query) -> Result<(), InvariantViolation> {
    match tree {
        SetOpTree::Leaf { rte_index } => {
            match query.range_table.get(*rte_index) {
                Some(rte) if matches!(rte.kind, RteKind::Subquery { .. }) => Ok(()),
                Some(_) => violation(format!(
                    "set-operation leaf {} is not a subquery entry",
                    rte_index
                )),
                None => violation(format!("set-operation leaf {} out of range", rte_index)),
            }
        }
        SetOpTree::Branch {
            all,
            dedup_operators,
            left,
            right,
        } => {
            if *all && !dedup_operators.is_empty() {
                return violation("UNION ALL carries dedup operators");
            }
            if !*all && dedup_operators.len() != query.targets.len() {
                return violation("UNION dedup operators do not match output width");
            }
            check_set_op(left, query)?;
            check_set_op(right, query)
        }
    }
}

fn check_expr(expr: &LogicalExpr, visible: &HashSet<String>) -> Result<(), InvariantViolation> {
    match expr {
        LogicalExpr::Column(col) => {
            if !visible.contains(&col.relation) {
                return violation(format!(
                    "column {}.{} references no visible range-table alias",
                    col.relation, col.column
                ));
            }
            Ok(())
        }
        LogicalExpr::Operator(app) => {
            if matches!(app.operator, Operator::And | Operator::Or) {
                for operand in &app.operands {
                    if let LogicalExpr::Operator(inner) = operand {
                        if inner.operator == app.operator {
                            return violation(format!(
                                "{} tree is not maximally flattened",
                                app.operator
                            ));
                        }
                    }
                }
            }
            for operand in &app.operands {
                check_expr(operand, visible)?;
            }
            Ok(())
        }
        LogicalExpr::FuncCall(call) => {
            for arg in &call.args {
                check_expr(arg, visible)?;
            }
            Ok(())
        }
        LogicalExpr::FieldAccess { base, .. } => check_expr(base, visible),
        LogicalExpr::Subscript { base, index } => {
            check_expr(base, visible)?;
            check_expr(index, visible)
        }
        LogicalExpr::Slice { base, lo, hi } => {
            check_expr(base, visible)?;
            if let Some(lo) = lo {
                check_expr(lo, visible)?;
            }
            if let Some(hi) = hi {
                check_expr(hi, visible)?;
            }
            Ok(())
        }
        LogicalExpr::List(items) => {
            for item in items {
                check_expr(item, visible)?;
            }
            Ok(())
        }
        LogicalExpr::Map(entries) => {
            for (_, value) in entries {
                check_expr(value, visible)?;
            }
            Ok(())
        }
        LogicalExpr::TypeCast { expr, .. } => check_expr(expr, visible),
        LogicalExpr::Case {
            operand,
            branches,
            else_expr,
        } => {
            if let Some(operand) = operand {
                check_expr(operand, visible)?;
            }
            for (when, then) in branches {
                check_expr(when, visible)?;
                check_expr(then, visible)?;
            }
            check_expr(else_expr, visible)
        }
        LogicalExpr::Exists(sub) => check_query(&sub.subplan, visible),
        LogicalExpr::Literal(_)
        | LogicalExpr::Parameter(_)
        | LogicalExpr::OutputColumn(_)
        | LogicalExpr::Star
        | LogicalExpr::DirectiveCall(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::LabelKind;
    use crate::query_planner::logical_expr::ColumnRef;
    use crate::query_planner::logical_plan::{RangeTblEntry, TargetEntry};
    use crate::query_planner::types::TypeTag;
    use crate::value::Value;

    fn scan(alias: &str) -> RangeTblEntry {
        RangeTblEntry {
            alias: alias.to_string(),
            kind: RteKind::Relation {
                graph: "g".into(),
                label: "_vertex".into(),
                label_kind: LabelKind::Vertex,
                relation_oid: 1,
            },
        }
    }

    #[test]
    fn test_accepts_well_formed_query() {
        let mut q = Query::new();
        q.add_rte(scan("a"));
        q.add_qual(LogicalExpr::equals(
            ColumnRef::new("a", "id"),
            LogicalExpr::Literal(Value::Integer(1)),
        ));
        q.targets
            .push(TargetEntry::new(ColumnRef::new("a", "id"), "a", TypeTag::Vertex));
        assert!(check_invariants(&q).is_ok());
    }

    #[test]
    fn test_rejects_unknown_alias() {
        let mut q = Query::new();
        q.add_rte(scan("a"));
        q.add_qual(LogicalExpr::equals(
            ColumnRef::new("ghost", "id"),
            LogicalExpr::Literal(Value::Integer(1)),
        ));
        let err = check_invariants(&q).unwrap_err();
        assert!(err.0.contains("ghost"));
    }

    #[test]
    fn test_rejects_duplicate_targets() {
        let mut q = Query::new();
        q.add_rte(scan("a"));
        q.targets
            .push(TargetEntry::new(ColumnRef::new("a", "id"), "x", TypeTag::Unknown));
        q.targets
            .push(TargetEntry::new(ColumnRef::new("a", "id"), "x", TypeTag::Unknown));
        assert!(check_invariants(&q).is_err());
    }

    #[test]
    fn test_rejects_nested_and() {
        use crate::query_planner::logical_expr::{Operator, OperatorApplication};

        let mut q = Query::new();
        q.add_rte(scan("a"));
        // hand-built nested AND, bypassing the combinators
        q.quals = Some(LogicalExpr::Operator(OperatorApplication {
            operator: Operator::And,
            operands: vec![
                LogicalExpr::Literal(Value::Bool(true)),
                LogicalExpr::Operator(OperatorApplication {
                    operator: Operator::And,
                    operands: vec![
                        LogicalExpr::Literal(Value::Bool(true)),
                        LogicalExpr::Literal(Value::Bool(false)),
                    ],
                }),
            ],
        }));
        let err = check_invariants(&q).unwrap_err();
        assert!(err.0.contains("flattened"));
    }

    #[test]
    fn test_sort_must_name_output_column() {
        use crate::query_planner::logical_plan::SortClauseItem;

        let mut q = Query::new();
        q.add_rte(scan("a"));
        q.targets
            .push(TargetEntry::new(ColumnRef::new("a", "id"), "a", TypeTag::Unknown));
        q.sort.push(SortClauseItem {
            expr: LogicalExpr::OutputColumn("missing".into()),
            descending: false,
        });
        assert!(check_invariants(&q).is_err());
    }
}

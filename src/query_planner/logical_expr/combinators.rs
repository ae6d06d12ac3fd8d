//! Predicate combinators.
//!
//! Everything that conjoins filters goes through [`conjoin`]/[`disjoin`] so
//! AND/OR trees stay maximally flat: no `And` node ever has an `And` child,
//! likewise for `Or`.

use super::{LogicalExpr, Operator, OperatorApplication};

fn flatten_into(acc: &mut Vec<LogicalExpr>, expr: LogicalExpr, op: Operator) {
    match expr {
        LogicalExpr::Operator(OperatorApplication { operator, operands }) if operator == op => {
            for operand in operands {
                flatten_into(acc, operand, op);
            }
        }
        other => acc.push(other),
    }
}

fn combine(predicates: Vec<LogicalExpr>, op: Operator) -> Option<LogicalExpr> {
    let mut flat = Vec::with_capacity(predicates.len());
    for p in predicates {
        flatten_into(&mut flat, p, op);
    }
    match flat.len() {
        0 => None,
        1 => flat.into_iter().next(),
        _ => Some(LogicalExpr::Operator(OperatorApplication {
            operator: op,
            operands: flat,
        })),
    }
}

/// AND together any number of predicates; `None` when the list is empty.
pub fn conjoin(predicates: Vec<LogicalExpr>) -> Option<LogicalExpr> {
    combine(predicates, Operator::And)
}

/// OR together any number of predicates; `None` when the list is empty.
pub fn disjoin(predicates: Vec<LogicalExpr>) -> Option<LogicalExpr> {
    combine(predicates, Operator::Or)
}

/// Add `extra` onto an optional existing filter.
pub fn add_qual(quals: Option<LogicalExpr>, extra: LogicalExpr) -> Option<LogicalExpr> {
    match quals {
        None => Some(extra),
        Some(existing) => conjoin(vec![existing, extra]),
    }
}

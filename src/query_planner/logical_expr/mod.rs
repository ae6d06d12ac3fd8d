//! Host-side expression tree.
//!
//! [`LogicalExpr`] is what target lists, join predicates and filters are
//! made of after lowering. It is serde-serializable end to end so a plan
//! (writer directives included) survives serialization to the host.
//!
//! - **mod.rs** (this file): type definitions and helpers
//! - **ast_conversion.rs**: lowering from the parsed AST
//! - **combinators.rs**: predicate conjunction/disjunction helpers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::query_planner::logical_plan::directives::WriterDirective;
use crate::query_planner::logical_plan::Query;
use crate::query_planner::types::TypeTag;
use crate::utils::serde_arc;
use crate::value::Value;

pub mod ast_conversion;
pub mod combinators;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalExpr {
    /// A constant value
    Literal(Value),

    /// `$name`, bound by the host at execution time
    Parameter(String),

    /// `relation.column` over the current range table
    Column(ColumnRef),

    /// Reference to a projection output column by name. Only meaningful in
    /// sort clauses and UNION ordering.
    OutputColumn(String),

    /// `*` inside `count(*)`
    Star,

    /// Field access into a map-shaped value
    FieldAccess {
        base: Box<LogicalExpr>,
        key: String,
    },

    /// `base[index]`; out-of-range evaluates to null on the host
    Subscript {
        base: Box<LogicalExpr>,
        index: Box<LogicalExpr>,
    },

    /// `base[lo..hi]`, half-open, either bound optional
    Slice {
        base: Box<LogicalExpr>,
        lo: Option<Box<LogicalExpr>>,
        hi: Option<Box<LogicalExpr>>,
    },

    List(Vec<LogicalExpr>),
    Map(Vec<(String, LogicalExpr)>),

    Operator(OperatorApplication),

    FuncCall(FuncCall),

    TypeCast {
        expr: Box<LogicalExpr>,
        target: TypeTag,
    },

    Case {
        operand: Option<Box<LogicalExpr>>,
        branches: Vec<(LogicalExpr, LogicalExpr)>,
        else_expr: Box<LogicalExpr>,
    },

    /// Correlated existence test over a sub-pattern
    Exists(ExistsSubquery),

    /// Opaque writer-directive invocation in a target list
    DirectiveCall(DirectiveCall),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub relation: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(relation: impl Into<String>, column: impl Into<String>) -> LogicalExpr {
        LogicalExpr::Column(ColumnRef {
            relation: relation.into(),
            column: column.into(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Negate,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
    In,
    NotIn,
    StartsWith,
    EndsWith,
    Contains,
    /// Property containment: `properties ⊇ template`
    PropContains,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<LogicalExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncCall {
    pub name: String,
    pub distinct: bool,
    pub args: Vec<LogicalExpr>,
}

impl FuncCall {
    pub fn new(name: impl Into<String>, args: Vec<LogicalExpr>) -> LogicalExpr {
        LogicalExpr::FuncCall(FuncCall {
            name: name.into(),
            distinct: false,
            args,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsSubquery {
    #[serde(with = "serde_arc")]
    pub subplan: Arc<Query>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveCall {
    /// Conventional function name the executor dispatches on
    /// (`_create_clause`, `_set_clause`, `_delete_clause`, `_merge_clause`)
    pub name: String,
    pub directive: WriterDirective,
}

impl LogicalExpr {
    pub fn operator(op: Operator, operands: Vec<LogicalExpr>) -> LogicalExpr {
        LogicalExpr::Operator(OperatorApplication {
            operator: op,
            operands,
        })
    }

    pub fn equals(left: LogicalExpr, right: LogicalExpr) -> LogicalExpr {
        LogicalExpr::operator(Operator::Eq, vec![left, right])
    }

    /// Evaluate a constant expression down to a [`Value`], for the plan
    /// constants runtime components consume (VLE constraints, bounds).
    /// Anything row-dependent yields `None`.
    pub fn as_constant_value(&self) -> Option<Value> {
        match self {
            LogicalExpr::Literal(v) => Some(v.clone()),
            LogicalExpr::List(items) => items
                .iter()
                .map(|e| e.as_constant_value())
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            LogicalExpr::Map(entries) => entries
                .iter()
                .map(|(k, v)| v.as_constant_value().map(|v| (k.clone(), v)))
                .collect::<Option<std::collections::BTreeMap<_, _>>>()
                .map(Value::Map),
            _ => None,
        }
    }

    /// Constant expressions can be coerced at plan time; everything else is
    /// the host's business.
    pub fn is_constant(&self) -> bool {
        match self {
            LogicalExpr::Literal(_) => true,
            LogicalExpr::List(items) => items.iter().all(|e| e.is_constant()),
            LogicalExpr::Map(entries) => entries.iter().all(|(_, e)| e.is_constant()),
            LogicalExpr::TypeCast { expr, .. } => expr.is_constant(),
            LogicalExpr::Operator(app) => app.operands.iter().all(|e| e.is_constant()),
            _ => false,
        }
    }

    /// Plan-time type of the expression, `Unknown` whenever the host will
    /// decide.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            LogicalExpr::Literal(Value::Bool(_)) => TypeTag::Boolean,
            LogicalExpr::Literal(Value::Integer(_)) => TypeTag::Integer,
            LogicalExpr::Literal(Value::Float(_)) => TypeTag::Float,
            // string constants behave like SQL's untyped literals
            LogicalExpr::Literal(_) => TypeTag::Unknown,
            LogicalExpr::TypeCast { target, .. } => *target,
            LogicalExpr::Operator(app) => match app.operator {
                Operator::Eq
                | Operator::NotEq
                | Operator::Lt
                | Operator::LtEq
                | Operator::Gt
                | Operator::GtEq
                | Operator::And
                | Operator::Or
                | Operator::Not
                | Operator::In
                | Operator::NotIn
                | Operator::StartsWith
                | Operator::EndsWith
                | Operator::Contains
                | Operator::PropContains
                | Operator::IsNull
                | Operator::IsNotNull => TypeTag::Boolean,
                _ => TypeTag::Unknown,
            },
            LogicalExpr::Exists(_) => TypeTag::Boolean,
            _ => TypeTag::Unknown,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
            Operator::Power => "^",
            Operator::Negate => "-",
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::StartsWith => "STARTS WITH",
            Operator::EndsWith => "ENDS WITH",
            Operator::Contains => "CONTAINS",
            Operator::PropContains => "@>",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        })
    }
}

impl fmt::Display for LogicalExpr {
    /// Compact one-line rendering for plan explain output and error
    /// messages. Not re-parseable; the canonical printable form lives on
    /// the surface AST.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalExpr::Literal(v) => write!(f, "{}", v),
            LogicalExpr::Parameter(name) => write!(f, "${}", name),
            LogicalExpr::Column(col) => write!(f, "{}.{}", col.relation, col.column),
            LogicalExpr::OutputColumn(name) => write!(f, "out({})", name),
            LogicalExpr::Star => f.write_str("*"),
            LogicalExpr::FieldAccess { base, key } => write!(f, "({}).{}", base, key),
            LogicalExpr::Subscript { base, index } => write!(f, "({})[{}]", base, index),
            LogicalExpr::Slice { base, lo, hi } => {
                write!(f, "({})[", base)?;
                if let Some(lo) = lo {
                    write!(f, "{}", lo)?;
                }
                f.write_str("..")?;
                if let Some(hi) = hi {
                    write!(f, "{}", hi)?;
                }
                f.write_str("]")
            }
            LogicalExpr::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            LogicalExpr::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            LogicalExpr::Operator(app) => match app.operands.len() {
                1 => write!(f, "({} {})", app.operator, app.operands[0]),
                _ => {
                    f.write_str("(")?;
                    for (i, operand) in app.operands.iter().enumerate() {
                        if i > 0 {
                            write!(f, " {} ", app.operator)?;
                        }
                        write!(f, "{}", operand)?;
                    }
                    f.write_str(")")
                }
            },
            LogicalExpr::FuncCall(call) => {
                write!(f, "{}(", call.name)?;
                if call.distinct {
                    f.write_str("DISTINCT ")?;
                }
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            LogicalExpr::TypeCast { expr, target } => write!(f, "({} :: {})", expr, target),
            LogicalExpr::Case { .. } => f.write_str("CASE(..)"),
            LogicalExpr::Exists(_) => f.write_str("EXISTS(<subquery>)"),
            LogicalExpr::DirectiveCall(call) => write!(f, "{}(<directive>)", call.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_compact() {
        let e = LogicalExpr::operator(
            Operator::And,
            vec![
                LogicalExpr::equals(
                    ColumnRef::new("a", "id"),
                    ColumnRef::new("r", "start_id"),
                ),
                LogicalExpr::operator(Operator::IsNull, vec![ColumnRef::new("b", "id")]),
            ],
        );
        assert_eq!(
            e.to_string(),
            "((a.id = r.start_id) AND (IS NULL b.id))"
        );
    }

    #[test]
    fn test_type_tags_of_literals() {
        assert_eq!(
            LogicalExpr::Literal(Value::Integer(1)).type_tag(),
            TypeTag::Integer
        );
        assert_eq!(
            LogicalExpr::Literal(Value::String("x".into())).type_tag(),
            TypeTag::Unknown
        );
        assert_eq!(
            LogicalExpr::Literal(Value::Bool(true)).type_tag(),
            TypeTag::Boolean
        );
    }

    #[test]
    fn test_comparisons_are_boolean() {
        let e = LogicalExpr::equals(
            ColumnRef::new("a", "id"),
            LogicalExpr::Literal(Value::Integer(1)),
        );
        assert_eq!(e.type_tag(), TypeTag::Boolean);
    }

    #[test]
    fn test_is_constant() {
        assert!(LogicalExpr::Literal(Value::Null).is_constant());
        assert!(LogicalExpr::List(vec![LogicalExpr::Literal(Value::Integer(1))]).is_constant());
        assert!(!ColumnRef::new("a", "id").is_constant());
        assert!(!LogicalExpr::Parameter("p".into()).is_constant());
    }
}

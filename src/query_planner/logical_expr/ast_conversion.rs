//! Lowering from the parsed expression AST to [`LogicalExpr`].
//!
//! Variable references resolve through the binding context; property access
//! on an entity binding goes through its `properties` column; comparison
//! chains become flat conjunctions of pairwise comparisons; `=~` becomes a
//! `regex_match` call (validating literal patterns eagerly); `x :: t`
//! checks the target type name.

use crate::open_cypher_parser::ast::{
    ArithOp, CompOp, Expression, Literal, PropertyMap, StringOp,
};
use crate::query_planner::errors::{PlanError, PlanResult};
use crate::query_planner::logical_expr::combinators::conjoin;
use crate::query_planner::logical_expr::{FuncCall, LogicalExpr, Operator};
use crate::query_planner::logical_plan::plan_builder::{field_access, Planner};
use crate::query_planner::types::{self, TypeTag};
use crate::value::Value;

impl<'t> Planner<'t> {
    pub(crate) fn lower_expression(&mut self, expr: &Expression<'t>) -> PlanResult<LogicalExpr> {
        match expr {
            Expression::Literal(lit) => Ok(LogicalExpr::Literal(lower_literal(lit))),

            Expression::Variable("*") => Ok(LogicalExpr::Star),
            Expression::Variable(name) => {
                Ok(self.ctx.lookup_required(name)?.expr.clone())
            }

            Expression::Parameter(name) => {
                if self.config.validate_parameters {
                    if let Some(params) = self.params {
                        if !params.contains_key(*name) {
                            return Err(PlanError::UnboundParameter(name.to_string()));
                        }
                    }
                }
                Ok(LogicalExpr::Parameter(name.to_string()))
            }

            Expression::List(items) => Ok(LogicalExpr::List(
                items
                    .iter()
                    .map(|e| self.lower_expression(e))
                    .collect::<PlanResult<Vec<_>>>()?,
            )),

            Expression::Map(entries) => Ok(LogicalExpr::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.to_string(), self.lower_expression(v)?)))
                    .collect::<PlanResult<Vec<_>>>()?,
            )),

            Expression::FunctionCall {
                name,
                distinct,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|e| self.lower_expression(e))
                    .collect::<PlanResult<Vec<_>>>()?;
                Ok(LogicalExpr::FuncCall(FuncCall {
                    name: name.to_ascii_lowercase(),
                    distinct: *distinct,
                    args,
                }))
            }

            Expression::PropertyAccess { base, key } => self.lower_property_access(base, key),

            Expression::Subscript { base, index } => Ok(LogicalExpr::Subscript {
                base: Box::new(self.lower_expression(base)?),
                index: Box::new(self.lower_expression(index)?),
            }),

            Expression::Slice { base, lo, hi } => Ok(LogicalExpr::Slice {
                base: Box::new(self.lower_expression(base)?),
                lo: lo
                    .as_deref()
                    .map(|e| self.lower_expression(e))
                    .transpose()?
                    .map(Box::new),
                hi: hi
                    .as_deref()
                    .map(|e| self.lower_expression(e))
                    .transpose()?
                    .map(Box::new),
            }),

            Expression::Arithmetic { op, left, right } => Ok(LogicalExpr::operator(
                lower_arith_op(*op),
                vec![self.lower_expression(left)?, self.lower_expression(right)?],
            )),

            Expression::Negate(e) => Ok(LogicalExpr::operator(
                Operator::Negate,
                vec![self.lower_expression(e)?],
            )),

            Expression::And(operands) => {
                let lowered = operands
                    .iter()
                    .map(|e| self.lower_expression(e))
                    .collect::<PlanResult<Vec<_>>>()?;
                Ok(conjoin(lowered).expect("AND has at least two operands"))
            }

            Expression::Or(operands) => {
                let lowered = operands
                    .iter()
                    .map(|e| self.lower_expression(e))
                    .collect::<PlanResult<Vec<_>>>()?;
                Ok(super::combinators::disjoin(lowered).expect("OR has at least two operands"))
            }

            Expression::Not(e) => Ok(LogicalExpr::operator(
                Operator::Not,
                vec![self.lower_expression(e)?],
            )),

            Expression::ChainCmp { terms, ops } => self.lower_chain(terms, ops),

            Expression::StringMatch { op, left, right } => {
                self.lower_string_match(*op, left, right)
            }

            Expression::In {
                needle,
                list,
                negated,
            } => Ok(LogicalExpr::operator(
                if *negated { Operator::NotIn } else { Operator::In },
                vec![self.lower_expression(needle)?, self.lower_expression(list)?],
            )),

            Expression::IsNull { expr, negated } => Ok(LogicalExpr::operator(
                if *negated {
                    Operator::IsNotNull
                } else {
                    Operator::IsNull
                },
                vec![self.lower_expression(expr)?],
            )),

            Expression::Case {
                operand,
                branches,
                else_expr,
            } => {
                let operand = operand
                    .as_deref()
                    .map(|e| self.lower_expression(e))
                    .transpose()?
                    .map(Box::new);
                let branches = branches
                    .iter()
                    .map(|(when, then)| {
                        Ok((self.lower_expression(when)?, self.lower_expression(then)?))
                    })
                    .collect::<PlanResult<Vec<_>>>()?;
                // an elided ELSE defaults to NULL
                let else_expr = match else_expr.as_deref() {
                    Some(e) => self.lower_expression(e)?,
                    None => LogicalExpr::Literal(Value::Null),
                };
                Ok(LogicalExpr::Case {
                    operand,
                    branches,
                    else_expr: Box::new(else_expr),
                })
            }

            Expression::Exists {
                pattern,
                where_clause,
            } => self.lower_exists(pattern, where_clause.as_deref()),

            Expression::TypeCast { expr, type_name } => {
                let target = types::typecast_target(type_name)
                    .ok_or_else(|| PlanError::UnknownTypecastTarget(type_name.to_string()))?;
                Ok(LogicalExpr::TypeCast {
                    expr: Box::new(self.lower_expression(expr)?),
                    target,
                })
            }
        }
    }

    /// Lower a predicate position (WHERE). Boolean and unknown-typed
    /// expressions pass; anything else is a type error. Unknown constants
    /// get an explicit cast so the host does not guess.
    pub(crate) fn lower_boolean(&mut self, expr: &Expression<'t>) -> PlanResult<LogicalExpr> {
        let lowered = self.lower_expression(expr)?;
        match lowered.type_tag() {
            TypeTag::Boolean => Ok(lowered),
            TypeTag::Unknown if lowered.is_constant() => Ok(LogicalExpr::TypeCast {
                expr: Box::new(lowered),
                target: TypeTag::Boolean,
            }),
            TypeTag::Unknown => Ok(lowered),
            other => Err(PlanError::NonBooleanWhere(other)),
        }
    }

    /// `a.b`: entity bindings route through their `properties` column, any
    /// other value gets a plain map-field access.
    fn lower_property_access(
        &mut self,
        base: &Expression<'t>,
        key: &str,
    ) -> PlanResult<LogicalExpr> {
        if let Expression::Variable(name) = base {
            let binding = self.ctx.lookup_required(name)?;
            if let Some(properties) = &binding.properties_expr {
                return Ok(field_access(properties.clone(), key));
            }
            return Ok(field_access(binding.expr.clone(), key));
        }
        Ok(field_access(self.lower_expression(base)?, key))
    }

    /// `a < b <= c` lowers to `a < b AND b <= c`. The middle terms are
    /// duplicated, not re-evaluated differently, matching the chained
    /// comparison semantics of the surface language.
    fn lower_chain(
        &mut self,
        terms: &[Expression<'t>],
        ops: &[CompOp],
    ) -> PlanResult<LogicalExpr> {
        let lowered: Vec<LogicalExpr> = terms
            .iter()
            .map(|t| self.lower_expression(t))
            .collect::<PlanResult<Vec<_>>>()?;

        let mut comparisons = Vec::with_capacity(ops.len());
        for (i, op) in ops.iter().enumerate() {
            comparisons.push(LogicalExpr::operator(
                lower_comp_op(*op),
                vec![lowered[i].clone(), lowered[i + 1].clone()],
            ));
        }
        Ok(conjoin(comparisons).expect("chain has at least one comparison"))
    }

    fn lower_string_match(
        &mut self,
        op: StringOp,
        left: &Expression<'t>,
        right: &Expression<'t>,
    ) -> PlanResult<LogicalExpr> {
        let left = self.lower_expression(left)?;
        let right = self.lower_expression(right)?;

        match op {
            StringOp::StartsWith => Ok(LogicalExpr::operator(Operator::StartsWith, vec![left, right])),
            StringOp::EndsWith => Ok(LogicalExpr::operator(Operator::EndsWith, vec![left, right])),
            StringOp::Contains => Ok(LogicalExpr::operator(Operator::Contains, vec![left, right])),
            StringOp::Regex => {
                // a literal pattern that cannot compile should fail the
                // query now, not every row later
                if let LogicalExpr::Literal(Value::String(pattern)) = &right {
                    regex::Regex::new(pattern)
                        .map_err(|e| PlanError::InvalidRegex(e.to_string()))?;
                }
                Ok(FuncCall::new("regex_match", vec![left, right]))
            }
        }
    }

    /// Lower a property map to its constructor expression. `Literal` maps
    /// lower entry-wise; `$param` maps lower to the parameter itself.
    pub(crate) fn lower_property_map(
        &mut self,
        props: &PropertyMap<'t>,
    ) -> PlanResult<LogicalExpr> {
        match props {
            PropertyMap::Literal(entries) => Ok(LogicalExpr::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.to_string(), self.lower_expression(v)?)))
                    .collect::<PlanResult<Vec<_>>>()?,
            )),
            PropertyMap::Parameter(name) => {
                let marker = Expression::Parameter(*name);
                self.lower_expression(&marker)
            }
        }
    }
}

fn lower_literal(lit: &Literal<'_>) -> Value {
    match lit {
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Float(x) => Value::Float(*x),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::String(s) => Value::String((*s).to_string()),
        Literal::Null => Value::Null,
    }
}

fn lower_arith_op(op: ArithOp) -> Operator {
    match op {
        ArithOp::Add => Operator::Add,
        ArithOp::Subtract => Operator::Subtract,
        ArithOp::Multiply => Operator::Multiply,
        ArithOp::Divide => Operator::Divide,
        ArithOp::Modulo => Operator::Modulo,
        ArithOp::Power => Operator::Power,
    }
}

pub(crate) fn lower_comp_op(op: CompOp) -> Operator {
    match op {
        CompOp::Eq => Operator::Eq,
        CompOp::NotEq => Operator::NotEq,
        CompOp::Lt => Operator::Lt,
        CompOp::LtEq => Operator::LtEq,
        CompOp::Gt => Operator::Gt,
        CompOp::GtEq => Operator::GtEq,
    }
}

/// SKIP/LIMIT may only use parameters and constants (arithmetic over them
/// included); a variable reference is a type error.
pub(crate) fn check_paging_expression(expr: &Expression<'_>) -> PlanResult<()> {
    match expr {
        Expression::Literal(_) | Expression::Parameter(_) => Ok(()),
        Expression::Negate(e) => check_paging_expression(e),
        Expression::Arithmetic { left, right, .. } => {
            check_paging_expression(left)?;
            check_paging_expression(right)
        }
        _ => Err(PlanError::IllegalLimit),
    }
}

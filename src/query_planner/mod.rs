//! AST → relational-plan transform: name resolution, expression lowering,
//! pattern-to-join planning, the clause pipeline, UNION normalization and
//! writer-directive packaging.

pub mod errors;
pub mod logical_expr;
pub mod logical_plan;
pub mod plan_ctx;
pub mod types;

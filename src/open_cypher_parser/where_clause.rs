use nom::Parser;

use super::ast::Expression;
use super::common::ws;
use super::expression;
use super::lexer::{keyword, PResult};

/// `WHERE <expression>`, shared by MATCH, WITH and EXISTS sub-patterns.
pub fn parse_where_clause(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, _) = ws(keyword("WHERE")).parse(input)?;
    expression::parse_expression(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::{CompOp, Literal};

    #[test]
    fn test_parse_where_clause() {
        let (rest, expr) = parse_where_clause("WHERE a.age > 21").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            expr,
            Expression::ChainCmp {
                terms: vec![
                    Expression::PropertyAccess {
                        base: Box::new(Expression::Variable("a")),
                        key: "age",
                    },
                    Expression::Literal(Literal::Integer(21)),
                ],
                ops: vec![CompOp::Gt],
            }
        );
    }

    #[test]
    fn test_where_requires_keyword() {
        assert!(parse_where_clause("a.age > 21").is_err());
    }
}

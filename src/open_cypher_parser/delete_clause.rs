use nom::character::complete::char;
use nom::combinator::opt;
use nom::multi::separated_list1;
use nom::Parser;

use super::ast::{DeleteClause, UnwindClause};
use super::common::ws;
use super::expression;
use super::lexer::{keyword, PResult};

/// `[DETACH] DELETE <expr> [, …]`
pub fn parse_delete_clause(input: &str) -> PResult<'_, DeleteClause<'_>> {
    let (input, detach) = opt(ws(keyword("DETACH"))).parse(input)?;
    let (input, _) = ws(keyword("DELETE")).parse(input)?;
    let (input, exprs) =
        separated_list1(ws(char(',')), expression::parse_expression).parse(input)?;
    Ok((
        input,
        DeleteClause {
            detach: detach.is_some(),
            exprs,
        },
    ))
}

/// `UNWIND <expr> AS <name>`
pub fn parse_unwind_clause(input: &str) -> PResult<'_, UnwindClause<'_>> {
    let (input, _) = ws(keyword("UNWIND")).parse(input)?;
    let (input, expr) = expression::parse_expression(input)?;
    let (input, _) = ws(keyword("AS")).parse(input)?;
    let (input, as_name) = ws(super::lexer::scan_identifier).parse(input)?;
    Ok((input, UnwindClause { expr, as_name }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::Expression;

    #[test]
    fn test_delete() {
        let (rest, clause) = parse_delete_clause("DELETE a, b").unwrap();
        assert_eq!(rest, "");
        assert!(!clause.detach);
        assert_eq!(clause.exprs.len(), 2);
    }

    #[test]
    fn test_detach_delete() {
        let (_, clause) = parse_delete_clause("DETACH DELETE n").unwrap();
        assert!(clause.detach);
        assert_eq!(clause.exprs, vec![Expression::Variable("n")]);
    }

    #[test]
    fn test_unwind() {
        let (rest, clause) = parse_unwind_clause("UNWIND [1, 2, 3] AS i").unwrap();
        assert_eq!(rest, "");
        assert_eq!(clause.as_name, "i");
        assert!(matches!(clause.expr, Expression::List(_)));
    }

    #[test]
    fn test_unwind_requires_alias() {
        assert!(parse_unwind_clause("UNWIND [1] x").is_err());
    }
}

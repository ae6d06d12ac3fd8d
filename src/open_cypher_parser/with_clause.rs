use nom::combinator::opt;
use nom::Parser;

use super::ast::WithClause;
use super::common::ws;
use super::lexer::{keyword, PResult};
use super::return_clause::{parse_limit, parse_order_by, parse_projection_items, parse_skip};
use super::where_clause;

/// `WITH [DISTINCT] items [ORDER BY …] [SKIP …] [LIMIT …] [WHERE …]`
///
/// Same projection shape as RETURN, plus the trailing WHERE that filters the
/// projected rows.
pub fn parse_with_clause(input: &str) -> PResult<'_, WithClause<'_>> {
    let (input, _) = ws(keyword("WITH")).parse(input)?;
    let (input, distinct) = opt(ws(keyword("DISTINCT"))).parse(input)?;
    let (input, items) = parse_projection_items(input)?;
    let (input, order_by) = parse_order_by(input)?;
    let (input, skip) = parse_skip(input)?;
    let (input, limit) = parse_limit(input)?;
    let (input, where_clause) = opt(where_clause::parse_where_clause).parse(input)?;

    Ok((
        input,
        WithClause {
            distinct: distinct.is_some(),
            items,
            order_by,
            skip,
            limit,
            where_clause,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::{Expression, ProjectionItem};

    #[test]
    fn test_with_items_and_where() {
        let (rest, clause) = parse_with_clause("WITH a, count(*) AS c WHERE c > 1").unwrap();
        assert_eq!(rest, "");
        assert_eq!(clause.items.len(), 2);
        assert!(clause.where_clause.is_some());
        match &clause.items[0] {
            ProjectionItem::Expr { expr, alias } => {
                assert_eq!(*expr, Expression::Variable("a"));
                assert!(alias.is_none());
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn test_with_star() {
        let (_, clause) = parse_with_clause("WITH *").unwrap();
        assert_eq!(clause.items, vec![ProjectionItem::Star]);
    }

    #[test]
    fn test_with_distinct_and_paging() {
        let (_, clause) = parse_with_clause("WITH DISTINCT a ORDER BY a LIMIT 3").unwrap();
        assert!(clause.distinct);
        assert_eq!(clause.order_by.len(), 1);
        assert!(clause.limit.is_some());
        assert!(clause.skip.is_none());
    }
}

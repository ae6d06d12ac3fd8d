use nom::character::complete::char;
use nom::combinator::opt;
use nom::multi::separated_list1;
use nom::Parser;

use super::ast::{Expression, ProjectionItem, ReturnClause, SortItem};
use super::common::ws;
use super::expression;
use super::lexer::{self, keyword, PResult};

/// `RETURN [DISTINCT] items [ORDER BY …] [SKIP …] [LIMIT …]`
pub fn parse_return_clause(input: &str) -> PResult<'_, ReturnClause<'_>> {
    let (input, _) = ws(keyword("RETURN")).parse(input)?;
    let (input, distinct) = opt(ws(keyword("DISTINCT"))).parse(input)?;
    let (input, items) = parse_projection_items(input)?;
    let (input, order_by) = parse_order_by(input)?;
    let (input, skip) = parse_skip(input)?;
    let (input, limit) = parse_limit(input)?;

    Ok((
        input,
        ReturnClause {
            distinct: distinct.is_some(),
            items,
            order_by,
            skip,
            limit,
        },
    ))
}

pub(crate) fn parse_projection_items(input: &str) -> PResult<'_, Vec<ProjectionItem<'_>>> {
    separated_list1(ws(char(',')), parse_projection_item).parse(input)
}

fn parse_projection_item(input: &str) -> PResult<'_, ProjectionItem<'_>> {
    // a bare `*` expands to every visible binding
    if let Ok((rest, _)) = ws::<_, super::errors::CypherParseError<'_>, _>(char('*')).parse(input) {
        return Ok((rest, ProjectionItem::Star));
    }

    let (input, expr) = expression::parse_expression(input)?;
    let (input, alias) = opt(nom::combinator::map(
        (ws(keyword("AS")), ws(lexer::scan_identifier)),
        |(_, alias)| alias,
    ))
    .parse(input)?;

    Ok((input, ProjectionItem::Expr { expr, alias }))
}

pub(crate) fn parse_order_by(input: &str) -> PResult<'_, Vec<SortItem<'_>>> {
    match (ws(keyword("ORDER")), ws(keyword("BY"))).parse(input) {
        Ok((rest, _)) => separated_list1(ws(char(',')), parse_sort_item).parse(rest),
        Err(nom::Err::Error(_)) => Ok((input, Vec::new())),
        Err(e) => Err(e),
    }
}

fn parse_sort_item(input: &str) -> PResult<'_, SortItem<'_>> {
    let (input, expr) = expression::parse_expression(input)?;
    let (input, direction) = opt(ws(nom::branch::alt((
        keyword("ASCENDING"),
        keyword("ASC"),
        keyword("DESCENDING"),
        keyword("DESC"),
    ))))
    .parse(input)?;

    let descending = direction
        .map(|d| d.to_ascii_uppercase().starts_with("DESC"))
        .unwrap_or(false);

    Ok((input, SortItem { expr, descending }))
}

pub(crate) fn parse_skip(input: &str) -> PResult<'_, Option<Expression<'_>>> {
    match ws(keyword("SKIP")).parse(input) {
        Ok((rest, _)) => {
            let (rest, expr) = expression::parse_expression(rest)?;
            Ok((rest, Some(expr)))
        }
        Err(nom::Err::Error(_)) => Ok((input, None)),
        Err(e) => Err(e),
    }
}

pub(crate) fn parse_limit(input: &str) -> PResult<'_, Option<Expression<'_>>> {
    match ws(keyword("LIMIT")).parse(input) {
        Ok((rest, _)) => {
            let (rest, expr) = expression::parse_expression(rest)?;
            Ok((rest, Some(expr)))
        }
        Err(nom::Err::Error(_)) => Ok((input, None)),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::Literal;

    #[test]
    fn test_return_items_and_aliases() {
        let (rest, clause) = parse_return_clause("RETURN a, b.name AS name").unwrap();
        assert_eq!(rest, "");
        assert!(!clause.distinct);
        assert_eq!(clause.items.len(), 2);
        match &clause.items[1] {
            ProjectionItem::Expr { alias, .. } => assert_eq!(*alias, Some("name")),
            other => panic!("expected aliased item, got {other:?}"),
        }
    }

    #[test]
    fn test_return_star() {
        let (_, clause) = parse_return_clause("RETURN *").unwrap();
        assert_eq!(clause.items, vec![ProjectionItem::Star]);
    }

    #[test]
    fn test_return_with_paging() {
        let (rest, clause) =
            parse_return_clause("RETURN DISTINCT a ORDER BY a.name DESC, a.id SKIP 5 LIMIT 10")
                .unwrap();
        assert_eq!(rest, "");
        assert!(clause.distinct);
        assert_eq!(clause.order_by.len(), 2);
        assert!(clause.order_by[0].descending);
        assert!(!clause.order_by[1].descending);
        assert_eq!(
            clause.skip,
            Some(Expression::Literal(Literal::Integer(5)))
        );
        assert_eq!(
            clause.limit,
            Some(Expression::Literal(Literal::Integer(10)))
        );
    }

    #[test]
    fn test_limit_allows_parameter() {
        let (_, clause) = parse_return_clause("RETURN a LIMIT $n").unwrap();
        assert_eq!(clause.limit, Some(Expression::Parameter("n")));
    }
}

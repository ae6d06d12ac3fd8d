use nom::character::complete::char;
use nom::multi::separated_list1;
use nom::Parser;

use super::ast::{SetClause, SetItem};
use super::common::ws;
use super::expression;
use super::lexer::{keyword, PResult};

/// `SET <target> = <expr> [, …]`. Targets parse as postfix expressions; the
/// transform enforces the `variable.property` shape so it can report the
/// offending clause rather than a generic parse failure.
pub fn parse_set_clause(input: &str) -> PResult<'_, SetClause<'_>> {
    let (input, _) = ws(keyword("SET")).parse(input)?;
    let (input, items) = separated_list1(ws(char(',')), parse_set_item).parse(input)?;
    Ok((
        input,
        SetClause {
            is_remove: false,
            items,
        },
    ))
}

fn parse_set_item(input: &str) -> PResult<'_, SetItem<'_>> {
    let (input, target) = expression::parse_postfix(input)?;
    let (input, _) = ws(char('=')).parse(input)?;
    let (input, value) = expression::parse_expression(input)?;
    Ok((
        input,
        SetItem {
            target,
            value: Some(value),
        },
    ))
}

/// `REMOVE <target> [, …]` — the property-erasing twin of SET.
pub fn parse_remove_clause(input: &str) -> PResult<'_, SetClause<'_>> {
    let (input, _) = ws(keyword("REMOVE")).parse(input)?;
    let (input, items) = separated_list1(
        ws(char(',')),
        nom::combinator::map(expression::parse_postfix, |target| SetItem {
            target,
            value: None,
        }),
    )
    .parse(input)?;
    Ok((
        input,
        SetClause {
            is_remove: true,
            items,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::{Expression, Literal};

    #[test]
    fn test_set_items() {
        let (rest, clause) = parse_set_clause("SET n.name = 'Ada', n.age = 36").unwrap();
        assert_eq!(rest, "");
        assert!(!clause.is_remove);
        assert_eq!(clause.items.len(), 2);
        assert_eq!(
            clause.items[0].target,
            Expression::PropertyAccess {
                base: Box::new(Expression::Variable("n")),
                key: "name",
            }
        );
        assert_eq!(
            clause.items[1].value,
            Some(Expression::Literal(Literal::Integer(36)))
        );
    }

    #[test]
    fn test_remove_items() {
        let (rest, clause) = parse_remove_clause("REMOVE n.age, n.temp").unwrap();
        assert_eq!(rest, "");
        assert!(clause.is_remove);
        assert_eq!(clause.items.len(), 2);
        assert!(clause.items.iter().all(|i| i.value.is_none()));
    }
}

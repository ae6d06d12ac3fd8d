//! Path pattern parsing: `(a:Person {k: 1})-[r:KNOWS*1..3]->(b)`.
//!
//! A path is one node followed by any number of relationship/node steps;
//! adjacent dashes around the bracket body determine direction. Ranges on a
//! `*` relationship default the way the surface syntax reads: `*` is
//! one-or-more, `*n` exactly n, `*..u` one-to-u, `*l..` l-or-more.

use nom::character::complete::{char, digit1, multispace0};
use nom::combinator::opt;
use nom::multi::separated_list0;
use nom::sequence::{delimited, preceded};
use nom::Parser;

use super::ast::{
    Direction, Expression, NodePattern, PathPattern, PathStep, PropertyMap, RelationshipPattern,
    VarLenRange,
};
use super::common::ws;
use super::errors::CypherParseError;
use super::expression;
use super::lexer::{self, PResult};

/// Parse a path with an optional leading `var =` binding.
pub fn parse_path_pattern_with_var(input: &str) -> PResult<'_, PathPattern<'_>> {
    let (input, var_name) = opt(nom::combinator::map(
        (ws(lexer::scan_identifier), char('='), multispace0),
        |(name, _, _)| name,
    ))
    .parse(input)?;

    let (input, mut path) = parse_path_pattern(input)?;
    path.var_name = var_name;
    Ok((input, path))
}

/// Parse a bare path pattern (no `var =` prefix).
pub fn parse_path_pattern(input: &str) -> PResult<'_, PathPattern<'_>> {
    let (mut input, start) = parse_node_pattern(input)?;

    let mut steps = Vec::new();
    loop {
        match parse_step(input) {
            Ok((rest, step)) => {
                steps.push(step);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((
        input,
        PathPattern {
            var_name: None,
            start,
            steps,
        },
    ))
}

fn parse_step(input: &str) -> PResult<'_, PathStep<'_>> {
    let (input, rel) = parse_relationship_pattern(input)?;
    let (input, node) = parse_node_pattern(input)?;
    Ok((input, PathStep { rel, node }))
}

pub(crate) fn parse_node_pattern(input: &str) -> PResult<'_, NodePattern<'_>> {
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char('(').parse(input)?;
    let (input, name) = opt(ws(lexer::scan_identifier)).parse(input)?;
    let (input, label) = opt(preceded(ws(char(':')), ws(lexer::scan_identifier))).parse(input)?;
    let (input, props) = opt(parse_property_map).parse(input)?;
    let (input, _) = ws(char(')')).parse(input)?;

    Ok((input, NodePattern { name, label, props }))
}

fn parse_relationship_pattern(input: &str) -> PResult<'_, RelationshipPattern<'_>> {
    let (input, _) = multispace0.parse(input)?;
    let (input, left_arrow) = opt(char('<')).parse(input)?;
    let (input, _) = preceded(multispace0, char('-')).parse(input)?;
    let (input, body) = opt(parse_relationship_body).parse(input)?;
    let (input, _) = preceded(multispace0, char('-')).parse(input)?;
    let (input, right_arrow) = opt(preceded(multispace0, char('>'))).parse(input)?;

    let direction = match (left_arrow, right_arrow) {
        (Some(_), Some(_)) => {
            return Err(nom::Err::Failure(CypherParseError::new(
                input,
                "a relationship cannot point both ways",
            )))
        }
        (Some(_), None) => Direction::Incoming,
        (None, Some(_)) => Direction::Outgoing,
        (None, None) => Direction::Either,
    };

    let (name, label, varlen, props) = body.unwrap_or((None, None, None, None));

    Ok((
        input,
        RelationshipPattern {
            name,
            label,
            direction,
            props,
            varlen,
        },
    ))
}

type RelationshipBody<'a> = (
    Option<&'a str>,
    Option<&'a str>,
    Option<VarLenRange>,
    Option<PropertyMap<'a>>,
);

fn parse_relationship_body(input: &str) -> PResult<'_, RelationshipBody<'_>> {
    let (input, _) = ws(char('[')).parse(input)?;
    let (input, name) = opt(ws(lexer::scan_identifier)).parse(input)?;
    let (input, label) = opt(preceded(ws(char(':')), ws(lexer::scan_identifier))).parse(input)?;
    let (input, varlen) = parse_varlen_range(input)?;
    let (input, props) = opt(parse_property_map).parse(input)?;
    let (input, _) = ws(char(']')).parse(input)?;
    Ok((input, (name, label, varlen, props)))
}

fn parse_bound(input: &str) -> PResult<'_, u32> {
    let (rest, digits) = ws(digit1).parse(input)?;
    match digits.parse::<u32>() {
        Ok(n) => Ok((rest, n)),
        Err(_) => Err(nom::Err::Failure(CypherParseError::new(
            input,
            "variable-length bound out of range",
        ))),
    }
}

/// `*`, `*n`, `*l..`, `*..u`, `*l..u` — absent bounds default to 1 and
/// unbounded respectively.
fn parse_varlen_range(input: &str) -> PResult<'_, Option<VarLenRange>> {
    let (input, star) = opt(ws(char('*'))).parse(input)?;
    if star.is_none() {
        return Ok((input, None));
    }

    let (input, lo) = opt(parse_bound).parse(input)?;
    let (input, dots) = opt(ws(nom::bytes::complete::tag(".."))).parse(input)?;
    let (input, hi) = if dots.is_some() {
        opt(parse_bound).parse(input)?
    } else {
        (input, None)
    };

    let range = match (lo, dots.is_some()) {
        (Some(lo), true) => VarLenRange { lo, hi },
        (Some(lo), false) => VarLenRange { lo, hi: Some(lo) },
        (None, true) => VarLenRange { lo: 1, hi },
        (None, false) => VarLenRange { lo: 1, hi: None },
    };

    Ok((input, Some(range)))
}

/// `{key: expr, …}` or a `$param` standing in for the whole map.
pub(crate) fn parse_property_map(input: &str) -> PResult<'_, PropertyMap<'_>> {
    if let Ok((rest, param)) = preceded(multispace0, lexer::scan_parameter).parse(input) {
        return Ok((rest, PropertyMap::Parameter(param)));
    }

    let (input, entries) = delimited(
        ws(char('{')),
        separated_list0(
            ws(char(',')),
            nom::combinator::map(
                (
                    ws(lexer::scan_identifier),
                    char(':'),
                    multispace0,
                    expression::parse_expression,
                ),
                |(key, _, _, value): (&str, char, &str, Expression)| (key, value),
            ),
        ),
        ws(char('}')),
    )
    .parse(input)?;

    Ok((input, PropertyMap::Literal(entries)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::Literal;
    use test_case::test_case;

    fn parse_all(input: &str) -> PathPattern<'_> {
        let (rest, path) = parse_path_pattern_with_var(input).expect("parse failed");
        assert_eq!(rest.trim(), "", "unparsed input: {rest}");
        path
    }

    #[test]
    fn test_single_node() {
        let path = parse_all("(a:Person {name: 'Ada'})");
        assert!(path.single_node());
        assert_eq!(path.start.name, Some("a"));
        assert_eq!(path.start.label, Some("Person"));
        match &path.start.props {
            Some(PropertyMap::Literal(entries)) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].0, "name");
                assert_eq!(
                    entries[0].1,
                    Expression::Literal(Literal::String("Ada"))
                );
            }
            other => panic!("expected literal property map, got {other:?}"),
        }
    }

    #[test]
    fn test_anonymous_and_empty_nodes() {
        let path = parse_all("()");
        assert_eq!(path.start.name, None);
        assert_eq!(path.start.label, None);

        let path = parse_all("(:Person)");
        assert_eq!(path.start.name, None);
        assert_eq!(path.start.label, Some("Person"));
    }

    #[test_case("(a)-[r]->(b)", Direction::Outgoing; "outgoing")]
    #[test_case("(a)<-[r]-(b)", Direction::Incoming; "incoming")]
    #[test_case("(a)-[r]-(b)", Direction::Either; "either")]
    fn test_directions(input: &str, direction: Direction) {
        let path = parse_all(input);
        assert_eq!(path.steps.len(), 1);
        assert_eq!(path.steps[0].rel.direction, direction);
        assert_eq!(path.steps[0].rel.name, Some("r"));
    }

    #[test_case("(a)-->(b)", Direction::Outgoing; "abbreviated outgoing")]
    #[test_case("(a)<--(b)", Direction::Incoming; "abbreviated incoming")]
    #[test_case("(a)--(b)", Direction::Either; "abbreviated either")]
    fn test_abbreviated_relationships(input: &str, direction: Direction) {
        let path = parse_all(input);
        assert_eq!(path.steps.len(), 1);
        assert_eq!(path.steps[0].rel.direction, direction);
        assert_eq!(path.steps[0].rel.name, None);
        assert_eq!(path.steps[0].rel.label, None);
    }

    #[test]
    fn test_bidirectional_arrow_is_rejected() {
        assert!(matches!(
            parse_path_pattern("(a)<-[r]->(b)"),
            Err(nom::Err::Failure(_))
        ));
    }

    #[test]
    fn test_multi_step_chain() {
        let path = parse_all("(a)-[r1:KNOWS]->(b)<-[r2:LIKES]-(c)");
        assert_eq!(path.entity_count(), 5);
        assert_eq!(path.steps[0].rel.label, Some("KNOWS"));
        assert_eq!(path.steps[1].rel.direction, Direction::Incoming);
        let names: Vec<_> = path.nodes().map(|n| n.name).collect();
        assert_eq!(names, vec![Some("a"), Some("b"), Some("c")]);
    }

    #[test]
    fn test_path_variable() {
        let path = parse_all("p = (a)-[]->(b)");
        assert_eq!(path.var_name, Some("p"));
    }

    #[test_case("(a)-[*]->(b)", 1, None; "bare star")]
    #[test_case("(a)-[*3]->(b)", 3, Some(3); "fixed")]
    #[test_case("(a)-[*2..5]->(b)", 2, Some(5); "bounded range")]
    #[test_case("(a)-[*2..]->(b)", 2, None; "lower bound only")]
    #[test_case("(a)-[*..4]->(b)", 1, Some(4); "upper bound only")]
    #[test_case("(a)-[r:KNOWS*2..3]->(b)", 2, Some(3); "with name and label")]
    fn test_varlen_ranges(input: &str, lo: u32, hi: Option<u32>) {
        let path = parse_all(input);
        let range = path.steps[0].rel.varlen.expect("expected varlen range");
        assert_eq!(range.lo, lo);
        assert_eq!(range.hi, hi);
    }

    #[test]
    fn test_relationship_properties_and_param_map() {
        let path = parse_all("(a)-[r:RATED {stars: 5}]->(b)");
        assert!(matches!(
            path.steps[0].rel.props,
            Some(PropertyMap::Literal(_))
        ));

        let path = parse_all("(n $props)");
        assert_eq!(path.start.props, Some(PropertyMap::Parameter("props")));
    }
}

//! Expression parsing.
//!
//! One function per precedence level, lowest binding first:
//! `OR` → `AND` → `XOR` → `NOT` → comparison chains → `+`/`-` → `*`/`/`/`%`
//! → `^` → `IN`/`IS` → unary minus → string matching → postfix
//! (subscript, slice, dot access, typecast) → atoms.
//!
//! Three rewrites happen during parsing rather than later:
//! - `XOR` desugars to `(A OR B) AND NOT (A AND B)`;
//! - chained comparisons accumulate into a single [`Expression::ChainCmp`];
//! - unary minus folds into numeric literals.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, multispace0};
use nom::combinator::opt;
use nom::multi::separated_list0;
use nom::sequence::delimited;
use nom::Parser;

use super::ast::{ArithOp, CompOp, Expression, Literal, StringOp};
use super::common::ws;
use super::errors::CypherParseError;
use super::lexer::{self, keyword, PResult};
use super::path_pattern;
use super::where_clause;

pub fn parse_expression(input: &str) -> PResult<'_, Expression<'_>> {
    parse_or(input)
}

fn push_flattened<'a>(
    operands: &mut Vec<Expression<'a>>,
    expr: Expression<'a>,
    conjunction: bool,
) {
    match expr {
        Expression::And(items) if conjunction => operands.extend(items),
        Expression::Or(items) if !conjunction => operands.extend(items),
        other => operands.push(other),
    }
}

fn parse_or(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, first) = parse_and(input)?;
    let mut operands: Vec<Expression> = Vec::new();
    push_flattened(&mut operands, first, false);

    loop {
        match ws(keyword("OR")).parse(input) {
            Ok((rest, _)) => {
                let (rest, rhs) = parse_and(rest)?;
                push_flattened(&mut operands, rhs, false);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    if operands.len() == 1 {
        Ok((input, operands.pop().expect("nonempty")))
    } else {
        Ok((input, Expression::Or(operands)))
    }
}

fn parse_and(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, first) = parse_xor(input)?;
    let mut operands: Vec<Expression> = Vec::new();
    push_flattened(&mut operands, first, true);

    loop {
        match ws(keyword("AND")).parse(input) {
            Ok((rest, _)) => {
                let (rest, rhs) = parse_xor(rest)?;
                push_flattened(&mut operands, rhs, true);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    if operands.len() == 1 {
        Ok((input, operands.pop().expect("nonempty")))
    } else {
        Ok((input, Expression::And(operands)))
    }
}

/// `A XOR B` has no host operator and desugars immediately:
/// `(A OR B) AND NOT (A AND B)`.
fn desugar_xor<'a>(a: Expression<'a>, b: Expression<'a>) -> Expression<'a> {
    Expression::And(vec![
        Expression::Or(vec![a.clone(), b.clone()]),
        Expression::Not(Box::new(Expression::And(vec![a, b]))),
    ])
}

fn parse_xor(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut acc) = parse_not(input)?;

    loop {
        match ws(keyword("XOR")).parse(input) {
            Ok((rest, _)) => {
                let (rest, rhs) = parse_not(rest)?;
                acc = desugar_xor(acc, rhs);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((input, acc))
}

fn parse_not(input: &str) -> PResult<'_, Expression<'_>> {
    match ws(keyword("NOT")).parse(input) {
        Ok((rest, _)) => {
            let (rest, operand) = parse_not(rest)?;
            Ok((rest, Expression::Not(Box::new(operand))))
        }
        Err(nom::Err::Error(_)) => parse_comparison(input),
        Err(e) => Err(e),
    }
}

/// Comparison operators. `=` is refused when it starts `=~` so the regex
/// operator survives to the string-match level.
fn parse_comp_op<'a>(input: &'a str) -> PResult<'a, CompOp> {
    alt((
        nom::combinator::map(tag("<>"), |_| CompOp::NotEq),
        nom::combinator::map(tag("<="), |_| CompOp::LtEq),
        nom::combinator::map(tag(">="), |_| CompOp::GtEq),
        |i: &'a str| -> PResult<'a, CompOp> {
            let (rest, _) = char::<&'a str, CypherParseError<'a>>('=').parse(i)?;
            if rest.starts_with('~') {
                Err(nom::Err::Error(CypherParseError::new(i, "regex operator")))
            } else {
                Ok((rest, CompOp::Eq))
            }
        },
        nom::combinator::map(tag("<"), |_| CompOp::Lt),
        nom::combinator::map(tag(">"), |_| CompOp::Gt),
    ))
    .parse(input)
}

/// Appending `⊙ rhs` to an existing chain extends it; anything else starts
/// a fresh two-term chain.
fn extend_chain<'a>(lhs: Expression<'a>, op: CompOp, rhs: Expression<'a>) -> Expression<'a> {
    match lhs {
        Expression::ChainCmp { mut terms, mut ops } => {
            terms.push(rhs);
            ops.push(op);
            Expression::ChainCmp { terms, ops }
        }
        other => Expression::ChainCmp {
            terms: vec![other, rhs],
            ops: vec![op],
        },
    }
}

fn parse_comparison(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut acc) = parse_additive(input)?;

    loop {
        match ws(parse_comp_op).parse(input) {
            Ok((rest, op)) => {
                let (rest, rhs) = parse_additive(rest)?;
                acc = extend_chain(acc, op, rhs);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((input, acc))
}

fn parse_additive_op(input: &str) -> PResult<'_, ArithOp> {
    alt((
        nom::combinator::map(char('+'), |_| ArithOp::Add),
        nom::combinator::map(char('-'), |_| ArithOp::Subtract),
    ))
    .parse(input)
}

fn parse_additive(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut acc) = parse_multiplicative(input)?;

    loop {
        match ws(parse_additive_op).parse(input) {
            Ok((rest, op)) => {
                let (rest, rhs) = parse_multiplicative(rest)?;
                acc = Expression::Arithmetic {
                    op,
                    left: Box::new(acc),
                    right: Box::new(rhs),
                };
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((input, acc))
}

fn parse_multiplicative_op(input: &str) -> PResult<'_, ArithOp> {
    alt((
        nom::combinator::map(char('*'), |_| ArithOp::Multiply),
        nom::combinator::map(char('/'), |_| ArithOp::Divide),
        nom::combinator::map(char('%'), |_| ArithOp::Modulo),
    ))
    .parse(input)
}

fn parse_multiplicative(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut acc) = parse_power(input)?;

    loop {
        match ws(parse_multiplicative_op).parse(input) {
            Ok((rest, op)) => {
                let (rest, rhs) = parse_power(rest)?;
                acc = Expression::Arithmetic {
                    op,
                    left: Box::new(acc),
                    right: Box::new(rhs),
                };
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((input, acc))
}

fn parse_power(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut acc) = parse_in_is(input)?;

    loop {
        match ws(char('^')).parse(input) {
            Ok((rest, _)) => {
                let (rest, rhs) = parse_in_is(rest)?;
                acc = Expression::Arithmetic {
                    op: ArithOp::Power,
                    left: Box::new(acc),
                    right: Box::new(rhs),
                };
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((input, acc))
}

/// `IN`, `NOT IN`, `IS [NOT] NULL` — postfix-ish operators at one level.
fn parse_in_is(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut acc) = parse_unary(input)?;

    loop {
        if let Ok((rest, _)) = ws(keyword("IS")).parse(input) {
            let (rest, negated) = opt(ws(keyword("NOT"))).parse(rest)?;
            let (rest, _) = ws(keyword("NULL")).parse(rest).map_err(|_| {
                nom::Err::Failure(CypherParseError::new(rest, "expected NULL after IS"))
            })?;
            acc = Expression::IsNull {
                expr: Box::new(acc),
                negated: negated.is_some(),
            };
            input = rest;
            continue;
        }

        if let Ok((rest, _)) = (ws(keyword("NOT")), ws(keyword("IN"))).parse(input) {
            let (rest, list) = parse_unary(rest)?;
            acc = Expression::In {
                needle: Box::new(acc),
                list: Box::new(list),
                negated: true,
            };
            input = rest;
            continue;
        }

        if let Ok((rest, _)) = ws(keyword("IN")).parse(input) {
            let (rest, list) = parse_unary(rest)?;
            acc = Expression::In {
                needle: Box::new(acc),
                list: Box::new(list),
                negated: false,
            };
            input = rest;
            continue;
        }

        break;
    }

    Ok((input, acc))
}

/// Unary minus. On a numeric literal the sign folds into the value instead
/// of producing a negation node.
fn parse_unary(input: &str) -> PResult<'_, Expression<'_>> {
    match ws(char('-')).parse(input) {
        Ok((rest, _)) => {
            let (rest, operand) = parse_unary(rest)?;
            let folded = match operand {
                Expression::Literal(Literal::Integer(i)) => {
                    Expression::Literal(Literal::Integer(-i))
                }
                Expression::Literal(Literal::Float(x)) => Expression::Literal(Literal::Float(-x)),
                other => Expression::Negate(Box::new(other)),
            };
            Ok((rest, folded))
        }
        Err(nom::Err::Error(_)) => parse_string_match(input),
        Err(e) => Err(e),
    }
}

fn parse_string_match_op(input: &str) -> PResult<'_, StringOp> {
    alt((
        nom::combinator::map((ws(keyword("STARTS")), ws(keyword("WITH"))), |_| {
            StringOp::StartsWith
        }),
        nom::combinator::map((ws(keyword("ENDS")), ws(keyword("WITH"))), |_| {
            StringOp::EndsWith
        }),
        nom::combinator::map(ws(keyword("CONTAINS")), |_| StringOp::Contains),
        nom::combinator::map(ws(tag("=~")), |_| StringOp::Regex),
    ))
    .parse(input)
}

fn parse_string_match(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut acc) = parse_postfix(input)?;

    loop {
        match parse_string_match_op(input) {
            Ok((rest, op)) => {
                let (rest, rhs) = parse_postfix(rest)?;
                acc = Expression::StringMatch {
                    op,
                    left: Box::new(acc),
                    right: Box::new(rhs),
                };
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((input, acc))
}

fn parse_slice_tail<'a>(
    input: &'a str,
    base: Expression<'a>,
) -> PResult<'a, Expression<'a>> {
    let (input, lo) = opt(parse_expression).parse(input)?;
    let (input, _) = ws(tag("..")).parse(input)?;
    let (input, hi) = opt(parse_expression).parse(input)?;
    let (input, _) = ws(char(']')).parse(input)?;
    Ok((
        input,
        Expression::Slice {
            base: Box::new(base),
            lo: lo.map(Box::new),
            hi: hi.map(Box::new),
        },
    ))
}

fn parse_subscript_tail<'a>(
    input: &'a str,
    base: Expression<'a>,
) -> PResult<'a, Expression<'a>> {
    let (input, index) = parse_expression(input)?;
    let (input, _) = ws(char(']')).parse(input)?;
    Ok((
        input,
        Expression::Subscript {
            base: Box::new(base),
            index: Box::new(index),
        },
    ))
}

/// Postfix forms: dot access, subscription, slicing, typecast.
pub(crate) fn parse_postfix(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut acc) = parse_atom(input)?;

    loop {
        // property access: a.b
        if let Ok((rest, key)) = (ws(char('.')), lexer::scan_identifier)
            .parse(input)
            .map(|(rest, (_, key))| (rest, key))
        {
            acc = Expression::PropertyAccess {
                base: Box::new(acc),
                key,
            };
            input = rest;
            continue;
        }

        // subscription or slice: a[i], a[lo..hi]
        if let Ok((rest, _)) = ws(char::<&str, CypherParseError<'_>>('[')).parse(input) {
            let (rest, expr) = match parse_slice_tail(rest, acc.clone()) {
                Ok(done) => done,
                Err(nom::Err::Error(_)) => parse_subscript_tail(rest, acc)?,
                Err(e) => return Err(e),
            };
            acc = expr;
            input = rest;
            continue;
        }

        // typecast: a :: integer
        if let Ok((rest, _)) = ws(tag::<&str, &str, CypherParseError<'_>>("::")).parse(input) {
            let (rest, type_name) = lexer::scan_identifier(rest)?;
            acc = Expression::TypeCast {
                expr: Box::new(acc),
                type_name,
            };
            input = rest;
            continue;
        }

        break;
    }

    Ok((input, acc))
}

fn parse_case(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, _) = ws(keyword("CASE")).parse(input)?;

    // `CASE WHEN …` is the searched form; `CASE x WHEN …` the simple form.
    let (input, operand) = if ws(keyword("WHEN")).parse(input).is_ok() {
        (input, None)
    } else {
        let (input, operand) = parse_expression(input)?;
        (input, Some(Box::new(operand)))
    };

    let mut branches = Vec::new();
    let mut input = input;
    loop {
        match ws(keyword("WHEN")).parse(input) {
            Ok((rest, _)) => {
                let (rest, when) = parse_expression(rest)?;
                let (rest, _) = ws(keyword("THEN")).parse(rest)?;
                let (rest, then) = parse_expression(rest)?;
                branches.push((when, then));
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    if branches.is_empty() {
        return Err(nom::Err::Error(CypherParseError::new(
            input,
            "CASE requires at least one WHEN branch",
        )));
    }

    let (input, else_expr) = match ws(keyword("ELSE")).parse(input) {
        Ok((rest, _)) => {
            let (rest, e) = parse_expression(rest)?;
            (rest, Some(Box::new(e)))
        }
        Err(_) => (input, None),
    };

    let (input, _) = ws(keyword("END")).parse(input)?;

    Ok((
        input,
        Expression::Case {
            operand,
            branches,
            else_expr,
        },
    ))
}

/// `EXISTS { (pattern) [WHERE cond] }`, with an optional leading MATCH
/// keyword inside the braces.
fn parse_exists(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, _) = ws(keyword("EXISTS")).parse(input)?;
    let (input, _) = ws(char('{')).parse(input)?;
    let (input, _) = opt(ws(keyword("MATCH"))).parse(input)?;
    let (input, pattern) = path_pattern::parse_path_pattern(input)?;
    let (input, where_clause) = opt(where_clause::parse_where_clause).parse(input)?;
    let (input, _) = ws(char('}')).parse(input)?;

    Ok((
        input,
        Expression::Exists {
            pattern: Box::new(pattern),
            where_clause: where_clause.map(Box::new),
        },
    ))
}

fn parse_list_literal(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, items) = delimited(
        ws(char('[')),
        separated_list0(ws(char(',')), parse_expression),
        ws(char(']')),
    )
    .parse(input)?;
    Ok((input, Expression::List(items)))
}

fn parse_map_literal(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, entries) = delimited(
        ws(char('{')),
        separated_list0(
            ws(char(',')),
            nom::combinator::map(
                (
                    ws(lexer::scan_identifier),
                    char(':'),
                    multispace0,
                    parse_expression,
                ),
                |(key, _, _, value)| (key, value),
            ),
        ),
        ws(char('}')),
    )
    .parse(input)?;
    Ok((input, Expression::Map(entries)))
}

fn parse_parameter(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, _) = multispace0.parse(input)?;
    let (input, name) = lexer::scan_parameter(input)?;
    Ok((input, Expression::Parameter(name)))
}

/// Function call arguments: empty, `*`, or a comma-separated expression
/// list with an optional leading DISTINCT.
fn parse_call_args(input: &str) -> PResult<'_, (bool, Vec<Expression<'_>>)> {
    if let Ok((rest, _)) = (
        ws(char::<&str, CypherParseError<'_>>('*')),
        ws(char::<&str, CypherParseError<'_>>(')')),
    )
        .parse(input)
    {
        return Ok((rest, (false, vec![Expression::Variable("*")])));
    }
    let (input, distinct) = opt(ws(keyword("DISTINCT"))).parse(input)?;
    let (input, args) = separated_list0(ws(char(',')), parse_expression).parse(input)?;
    let (input, _) = ws(char(')')).parse(input)?;
    Ok((input, (distinct.is_some(), args)))
}

fn parse_identifier_headed(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, _) = multispace0.parse(input)?;
    let (input, name) = lexer::scan_identifier(input)?;

    if let Ok((rest, _)) = ws::<_, CypherParseError<'_>, _>(char('(')).parse(input) {
        let (rest, (distinct, args)) = parse_call_args(rest)?;
        return Ok((
            rest,
            Expression::FunctionCall {
                name,
                distinct,
                args,
            },
        ));
    }

    Ok((input, Expression::Variable(name)))
}

fn parse_atom(input: &str) -> PResult<'_, Expression<'_>> {
    alt((
        parse_case,
        parse_exists,
        parse_parameter,
        nom::combinator::map(ws(lexer::scan_string), |s| {
            Expression::Literal(Literal::String(s))
        }),
        parse_number_literal,
        parse_keyword_literal,
        parse_list_literal,
        parse_map_literal,
        parse_identifier_headed,
        delimited(ws(char('(')), parse_expression, ws(char(')'))),
    ))
    .parse(input)
}

fn parse_number_literal(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, _) = multispace0.parse(input)?;
    let (rest, (lexeme, is_float)) = lexer::scan_number(input)?;
    let literal = if is_float {
        match lexeme.parse::<f64>() {
            Ok(x) => Literal::Float(x),
            Err(_) => {
                return Err(nom::Err::Error(CypherParseError::new(input, "malformed number")))
            }
        }
    } else {
        match lexeme.parse::<i64>() {
            Ok(i) => Literal::Integer(i),
            // past i64 range: fall back to a float the way SQL numerics do
            Err(_) => match lexeme.parse::<f64>() {
                Ok(x) => Literal::Float(x),
                Err(_) => {
                    return Err(nom::Err::Error(CypherParseError::new(input, "malformed number")))
                }
            },
        }
    };
    Ok((rest, Expression::Literal(literal)))
}

fn parse_keyword_literal(input: &str) -> PResult<'_, Expression<'_>> {
    alt((
        nom::combinator::map(ws(keyword("TRUE")), |_| {
            Expression::Literal(Literal::Boolean(true))
        }),
        nom::combinator::map(ws(keyword("FALSE")), |_| {
            Expression::Literal(Literal::Boolean(false))
        }),
        nom::combinator::map(ws(keyword("NULL")), |_| Expression::Literal(Literal::Null)),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &str) -> Expression<'_> {
        let (rest, expr) = parse_expression(input).expect("parse failed");
        assert_eq!(rest.trim(), "", "unparsed input: {rest}");
        expr
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse_all("42"), Expression::Literal(Literal::Integer(42)));
        assert_eq!(parse_all("2.5"), Expression::Literal(Literal::Float(2.5)));
        assert_eq!(parse_all("'hi'"), Expression::Literal(Literal::String("hi")));
        assert_eq!(parse_all("TRUE"), Expression::Literal(Literal::Boolean(true)));
        assert_eq!(parse_all("null"), Expression::Literal(Literal::Null));
    }

    #[test]
    fn test_unary_minus_folds_into_literals() {
        assert_eq!(parse_all("-7"), Expression::Literal(Literal::Integer(-7)));
        assert_eq!(parse_all("- 2.5"), Expression::Literal(Literal::Float(-2.5)));
        assert_eq!(parse_all("--3"), Expression::Literal(Literal::Integer(3)));
        assert_eq!(
            parse_all("-x"),
            Expression::Negate(Box::new(Expression::Variable("x")))
        );
    }

    #[test]
    fn test_and_or_flattening() {
        let e = parse_all("a AND b AND c");
        assert_eq!(
            e,
            Expression::And(vec![
                Expression::Variable("a"),
                Expression::Variable("b"),
                Expression::Variable("c"),
            ])
        );

        // parenthesized operands flatten too: the tree root absorbs them
        let e = parse_all("(a OR b) OR c OR d");
        assert_eq!(
            e,
            Expression::Or(vec![
                Expression::Variable("a"),
                Expression::Variable("b"),
                Expression::Variable("c"),
                Expression::Variable("d"),
            ])
        );
    }

    #[test]
    fn test_xor_desugars() {
        let e = parse_all("a XOR b");
        assert_eq!(
            e,
            Expression::And(vec![
                Expression::Or(vec![Expression::Variable("a"), Expression::Variable("b")]),
                Expression::Not(Box::new(Expression::And(vec![
                    Expression::Variable("a"),
                    Expression::Variable("b"),
                ]))),
            ])
        );
    }

    #[test]
    fn test_comparison_chain_accumulates() {
        let e = parse_all("a < b <= c");
        assert_eq!(
            e,
            Expression::ChainCmp {
                terms: vec![
                    Expression::Variable("a"),
                    Expression::Variable("b"),
                    Expression::Variable("c"),
                ],
                ops: vec![CompOp::Lt, CompOp::LtEq],
            }
        );
    }

    #[test]
    fn test_arithmetic_precedence() {
        let e = parse_all("a + b * c");
        assert_eq!(
            e,
            Expression::Arithmetic {
                op: ArithOp::Add,
                left: Box::new(Expression::Variable("a")),
                right: Box::new(Expression::Arithmetic {
                    op: ArithOp::Multiply,
                    left: Box::new(Expression::Variable("b")),
                    right: Box::new(Expression::Variable("c")),
                }),
            }
        );
    }

    #[test]
    fn test_in_and_not_in() {
        let e = parse_all("x IN [1, 2]");
        assert_eq!(
            e,
            Expression::In {
                needle: Box::new(Expression::Variable("x")),
                list: Box::new(Expression::List(vec![
                    Expression::Literal(Literal::Integer(1)),
                    Expression::Literal(Literal::Integer(2)),
                ])),
                negated: false,
            }
        );
        assert!(matches!(
            parse_all("x NOT IN y"),
            Expression::In { negated: true, .. }
        ));
    }

    #[test]
    fn test_is_null_postfix() {
        assert_eq!(
            parse_all("a IS NULL"),
            Expression::IsNull {
                expr: Box::new(Expression::Variable("a")),
                negated: false,
            }
        );
        assert_eq!(
            parse_all("a IS NOT NULL"),
            Expression::IsNull {
                expr: Box::new(Expression::Variable("a")),
                negated: true,
            }
        );
    }

    #[test]
    fn test_string_match_operators() {
        assert!(matches!(
            parse_all("a STARTS WITH 'x'"),
            Expression::StringMatch {
                op: StringOp::StartsWith,
                ..
            }
        ));
        assert!(matches!(
            parse_all("a ENDS WITH 'x'"),
            Expression::StringMatch {
                op: StringOp::EndsWith,
                ..
            }
        ));
        assert!(matches!(
            parse_all("a CONTAINS b"),
            Expression::StringMatch {
                op: StringOp::Contains,
                ..
            }
        ));
        assert!(matches!(
            parse_all("a =~ '[0-9]+'"),
            Expression::StringMatch {
                op: StringOp::Regex,
                ..
            }
        ));
    }

    #[test]
    fn test_property_access_chain() {
        let e = parse_all("a.b.c");
        assert_eq!(
            e,
            Expression::PropertyAccess {
                base: Box::new(Expression::PropertyAccess {
                    base: Box::new(Expression::Variable("a")),
                    key: "b",
                }),
                key: "c",
            }
        );
    }

    #[test]
    fn test_subscript_and_slice() {
        assert_eq!(
            parse_all("xs[0]"),
            Expression::Subscript {
                base: Box::new(Expression::Variable("xs")),
                index: Box::new(Expression::Literal(Literal::Integer(0))),
            }
        );
        assert_eq!(
            parse_all("xs[1..3]"),
            Expression::Slice {
                base: Box::new(Expression::Variable("xs")),
                lo: Some(Box::new(Expression::Literal(Literal::Integer(1)))),
                hi: Some(Box::new(Expression::Literal(Literal::Integer(3)))),
            }
        );
        assert_eq!(
            parse_all("xs[..2]"),
            Expression::Slice {
                base: Box::new(Expression::Variable("xs")),
                lo: None,
                hi: Some(Box::new(Expression::Literal(Literal::Integer(2)))),
            }
        );
    }

    #[test]
    fn test_typecast() {
        assert_eq!(
            parse_all("x :: integer"),
            Expression::TypeCast {
                expr: Box::new(Expression::Variable("x")),
                type_name: "integer",
            }
        );
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(
            parse_all("count(*)"),
            Expression::FunctionCall {
                name: "count",
                distinct: false,
                args: vec![Expression::Variable("*")],
            }
        );
        assert_eq!(
            parse_all("count(DISTINCT x)"),
            Expression::FunctionCall {
                name: "count",
                distinct: true,
                args: vec![Expression::Variable("x")],
            }
        );
        assert_eq!(
            parse_all("coalesce(a, 1)"),
            Expression::FunctionCall {
                name: "coalesce",
                distinct: false,
                args: vec![
                    Expression::Variable("a"),
                    Expression::Literal(Literal::Integer(1)),
                ],
            }
        );
    }

    #[test]
    fn test_case_forms() {
        let searched = parse_all("CASE WHEN a THEN 1 ELSE 2 END");
        assert!(matches!(
            searched,
            Expression::Case {
                operand: None,
                ..
            }
        ));

        let simple = parse_all("CASE x WHEN 1 THEN 'a' END");
        if let Expression::Case {
            operand, branches, else_expr, ..
        } = simple
        {
            assert!(operand.is_some());
            assert_eq!(branches.len(), 1);
            assert!(else_expr.is_none());
        } else {
            panic!("expected CASE expression");
        }
    }

    #[test]
    fn test_exists_subpattern() {
        let e = parse_all("EXISTS { (a)-[:KNOWS]->(b) WHERE b.age > 1 }");
        if let Expression::Exists {
            pattern,
            where_clause,
        } = e
        {
            assert_eq!(pattern.steps.len(), 1);
            assert!(where_clause.is_some());
        } else {
            panic!("expected EXISTS expression");
        }
    }

    #[test]
    fn test_map_literal() {
        let e = parse_all("{days: 5, label: 'x'}");
        assert_eq!(
            e,
            Expression::Map(vec![
                ("days", Expression::Literal(Literal::Integer(5))),
                ("label", Expression::Literal(Literal::String("x"))),
            ])
        );
    }

    #[test]
    fn test_round_trip_printing() {
        for source in [
            "a AND b AND (c OR d)",
            "a < b <= 3",
            "-x",
            "a.b.c",
            "xs[1..3]",
            "n.age IS NOT NULL",
            "x NOT IN [1, 2]",
            "'s' STARTS WITH 't'",
            "count(*)",
            "(a + b) * c",
        ] {
            let printed = parse_all(source).to_string();
            let reparsed = parse_all(&printed).to_string();
            assert_eq!(printed, reparsed, "round trip failed for {source}");
        }
    }
}

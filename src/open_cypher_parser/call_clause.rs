use nom::character::complete::char;
use nom::combinator::opt;
use nom::multi::separated_list0;
use nom::multi::separated_list1;
use nom::Parser;

use super::ast::CallClause;
use super::common::ws;
use super::expression;
use super::lexer::{self, keyword, PResult};

/// `CALL proc.name(args) [YIELD a, b]`.
///
/// Parsed so the planner can reject procedures with a proper
/// not-supported error instead of a parse failure at the CALL keyword.
pub fn parse_call_clause(input: &str) -> PResult<'_, CallClause<'_>> {
    let (input, _) = ws(keyword("CALL")).parse(input)?;
    let (input, procedure) = parse_dotted_name(input)?;

    let (input, args) = opt(nom::sequence::delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression::parse_expression),
        ws(char(')')),
    ))
    .parse(input)?;

    let (input, yield_items) = match ws(keyword("YIELD")).parse(input) {
        Ok((rest, _)) => {
            let (rest, items) =
                separated_list1(ws(char(',')), ws(lexer::scan_identifier)).parse(rest)?;
            (rest, Some(items))
        }
        Err(nom::Err::Error(_)) => (input, None),
        Err(e) => return Err(e),
    };

    Ok((
        input,
        CallClause {
            procedure,
            args: args.unwrap_or_default(),
            yield_items,
        },
    ))
}

/// A dotted procedure name like `db.labels`, returned as one source slice.
fn parse_dotted_name(input: &str) -> PResult<'_, &str> {
    let (after_ws, _) = nom::character::complete::multispace0::<_, super::errors::CypherParseError<'_>>
        .parse(input)?;
    let start = after_ws;
    let (mut rest, _) = lexer::scan_identifier(after_ws)?;
    while let Ok((next, _)) = (char::<_, super::errors::CypherParseError<'_>>('.'), lexer::scan_identifier)
        .parse(rest)
    {
        rest = next;
    }
    let len = start.len() - rest.len();
    Ok((rest, &start[..len]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_with_yield() {
        let (rest, clause) = parse_call_clause("CALL db.labels() YIELD label").unwrap();
        assert_eq!(rest, "");
        assert_eq!(clause.procedure, "db.labels");
        assert!(clause.args.is_empty());
        assert_eq!(clause.yield_items, Some(vec!["label"]));
    }

    #[test]
    fn test_call_with_args() {
        let (_, clause) = parse_call_clause("CALL my.proc(1, 'x')").unwrap();
        assert_eq!(clause.procedure, "my.proc");
        assert_eq!(clause.args.len(), 2);
        assert!(clause.yield_items.is_none());
    }
}

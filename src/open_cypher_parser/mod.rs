//! openCypher lexing and parsing.
//!
//! [`parse_cypher`] turns (comment-stripped) source text into a
//! [`ast::CypherStatement`]: a UNION tree whose leaves are single queries,
//! each a clause list in program order. Statement shape is enforced here —
//! reading clauses may not follow updating clauses without a WITH boundary,
//! and a query ends with RETURN or an updating clause.

use nom::character::complete::{char, multispace0};
use nom::combinator::opt;
use nom::Parser;

use ast::{Clause, CypherStatement, SingleQuery};
pub use common::strip_comments;
pub use errors::SyntaxError;
use errors::CypherParseError;
use lexer::{keyword, PResult};

pub mod ast;
mod call_clause;
mod common;
mod create_clause;
mod delete_clause;
pub mod errors;
mod expression;
pub mod lexer;
mod match_clause;
mod path_pattern;
mod return_clause;
mod set_clause;
mod where_clause;
mod with_clause;

/// Parse a complete statement. `source` must already be comment-stripped
/// (see [`strip_comments`]); byte offsets in errors refer to it.
pub fn parse_cypher(source: &str) -> Result<CypherStatement<'_>, SyntaxError> {
    match parse_statement(source) {
        Ok((rest, statement)) => {
            let trailing = rest.trim_start();
            if !trailing.is_empty() {
                return Err(SyntaxError::new(
                    source.len() - trailing.len(),
                    lexer::offending_token(trailing),
                    "unexpected input after statement",
                ));
            }
            Ok(statement)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e.into_syntax_error(source)),
        Err(nom::Err::Incomplete(_)) => {
            Err(SyntaxError::new(source.len(), "<end of input>", "incomplete input"))
        }
    }
}

fn parse_statement(input: &str) -> PResult<'_, CypherStatement<'_>> {
    let (input, first) = parse_single_query(input)?;
    let mut statement = CypherStatement::Single(first);
    let mut input = input;

    loop {
        let union_at = input;
        match ws_keyword("UNION").parse(input) {
            Ok((rest, _)) => {
                // every UNION leaf must be a projection
                if let CypherStatement::Single(q) = &statement {
                    ensure_ends_with_return(q, union_at)?;
                }
                let (rest, all) = parse_union_modifier(rest)?;
                let (rest, next) = parse_single_query(rest)?;
                ensure_ends_with_return(&next, union_at)?;

                statement = CypherStatement::Union {
                    all,
                    larg: Box::new(statement),
                    rarg: Box::new(CypherStatement::Single(next)),
                };
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    let (input, _) = opt(ws_char(';')).parse(input)?;
    Ok((input, statement))
}

fn parse_union_modifier(input: &str) -> PResult<'_, bool> {
    if let Ok((rest, _)) = ws_keyword("ALL").parse(input) {
        return Ok((rest, true));
    }
    if let Ok((rest, _)) = ws_keyword("DISTINCT").parse(input) {
        return Ok((rest, false));
    }
    Ok((input, false))
}

fn ensure_ends_with_return<'a>(query: &SingleQuery<'a>, at: &'a str) -> Result<(), nom::Err<CypherParseError<'a>>> {
    match query.clauses.last() {
        Some(Clause::Return(_)) => Ok(()),
        _ => Err(nom::Err::Failure(CypherParseError::new(
            at,
            "misplaced UNION: every UNION branch must end with RETURN",
        ))),
    }
}

fn parse_single_query(input: &str) -> PResult<'_, SingleQuery<'_>> {
    let mut clauses: Vec<Clause> = Vec::new();
    let mut marks: Vec<&str> = Vec::new();
    let mut input = input;

    let stopped_with = loop {
        let at = input;
        match parse_clause(input) {
            Ok((rest, clause)) => {
                clauses.push(clause);
                marks.push(at);
                input = rest;
            }
            Err(nom::Err::Error(e)) => break e,
            Err(e) => return Err(e),
        }
    };

    if clauses.is_empty() {
        return Err(nom::Err::Error(stopped_with));
    }

    validate_query_shape(&clauses, &marks)?;
    Ok((input, SingleQuery { clauses }))
}

/// How far into the input an error got; smaller remaining input means more
/// progress, which is the error worth reporting.
fn error_progress(e: &CypherParseError<'_>) -> usize {
    e.errors.first().map(|(at, _)| at.len()).unwrap_or(usize::MAX)
}

fn parse_clause<'a>(input: &'a str) -> PResult<'a, Clause<'a>> {
    let mut best: Option<CypherParseError<'a>> = None;
    let consider = |e: CypherParseError<'a>, best: &mut Option<CypherParseError<'a>>| {
        if best
            .as_ref()
            .is_none_or(|b| error_progress(&e) < error_progress(b))
        {
            *best = Some(e);
        }
    };

    macro_rules! attempt {
        ($parser:expr, $wrap:expr) => {
            match $parser(input) {
                Ok((rest, c)) => return Ok((rest, $wrap(c))),
                Err(nom::Err::Error(e)) => consider(e, &mut best),
                Err(e) => return Err(e),
            }
        };
    }

    attempt!(match_clause::parse_match_clause, Clause::Match);
    attempt!(delete_clause::parse_unwind_clause, Clause::Unwind);
    attempt!(with_clause::parse_with_clause, Clause::With);
    attempt!(return_clause::parse_return_clause, Clause::Return);
    attempt!(create_clause::parse_create_clause, Clause::Create);
    attempt!(create_clause::parse_merge_clause, Clause::Merge);
    attempt!(set_clause::parse_set_clause, Clause::Set);
    attempt!(set_clause::parse_remove_clause, Clause::Set);
    attempt!(delete_clause::parse_delete_clause, Clause::Delete);
    attempt!(call_clause::parse_call_clause, Clause::Call);

    Err(nom::Err::Error(
        best.unwrap_or_else(|| CypherParseError::new(input, "expected a clause")),
    ))
}

/// Enforce the statement grammar over the flat clause list:
/// `(reading* updating* WITH)* reading* (updating+ | updating* RETURN)`.
fn validate_query_shape<'a>(
    clauses: &[Clause<'a>],
    marks: &[&'a str],
) -> Result<(), nom::Err<CypherParseError<'a>>> {
    let mut updating_seen = false;
    let mut return_seen = false;
    for (clause, mark) in clauses.iter().zip(marks.iter()) {
        if return_seen {
            return Err(nom::Err::Failure(CypherParseError::new(
                mark,
                "no clause may follow RETURN",
            )));
        }
        match clause {
            Clause::Match(_) | Clause::Unwind(_) | Clause::Call(_) => {
                if updating_seen {
                    return Err(nom::Err::Failure(CypherParseError::new(
                        mark,
                        "a reading clause after an updating clause requires WITH",
                    )));
                }
            }
            Clause::With(_) => updating_seen = false,
            Clause::Return(_) => return_seen = true,
            c if c.is_updating() => updating_seen = true,
            _ => {}
        }
    }

    let last = clauses.last().expect("nonempty");
    if !return_seen && !last.is_updating() {
        let mark = marks.last().expect("nonempty");
        return Err(nom::Err::Failure(CypherParseError::new(
            mark,
            "a query must end with RETURN or an updating clause",
        )));
    }

    Ok(())
}

fn ws_keyword<'a>(kw: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = CypherParseError<'a>> {
    common::ws(keyword(kw))
}

fn ws_char<'a>(c: char) -> impl Parser<&'a str, Output = char, Error = CypherParseError<'a>> {
    nom::sequence::preceded(multispace0, char(c))
}

#[cfg(test)]
mod tests {
    use super::ast::*;
    use super::*;

    fn parse(source: &str) -> CypherStatement<'_> {
        parse_cypher(source).expect("parse failed")
    }

    fn single(source: &str) -> SingleQuery<'_> {
        match parse(source) {
            CypherStatement::Single(q) => q,
            other => panic!("expected single query, got {other:?}"),
        }
    }

    #[test]
    fn test_full_read_query() {
        let q = single(
            "MATCH (p:Person {name: 'Ada'})-[r:KNOWS]->(f) \
             WHERE f.age > 30 \
             RETURN p, f.name AS name \
             ORDER BY name DESC SKIP 1 LIMIT 10;",
        );
        assert_eq!(q.clauses.len(), 2);
        match &q.clauses[0] {
            Clause::Match(m) => {
                assert!(!m.optional);
                assert!(m.where_clause.is_some());
                assert_eq!(m.patterns[0].steps.len(), 1);
            }
            other => panic!("expected MATCH, got {}", other.name()),
        }
        match &q.clauses[1] {
            Clause::Return(r) => {
                assert_eq!(r.items.len(), 2);
                assert_eq!(r.order_by.len(), 1);
                assert!(r.skip.is_some());
                assert!(r.limit.is_some());
            }
            other => panic!("expected RETURN, got {}", other.name()),
        }
    }

    #[test]
    fn test_clause_order_preserved() {
        let q = single("MATCH (a) UNWIND a.xs AS x WITH x WHERE x > 1 RETURN x");
        let names: Vec<_> = q.clauses.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["MATCH", "UNWIND", "WITH", "RETURN"]);
    }

    #[test]
    fn test_optional_match_interleaving() {
        let q = single("MATCH (a) OPTIONAL MATCH (a)-[]->(b) RETURN a, b");
        match (&q.clauses[0], &q.clauses[1]) {
            (Clause::Match(m1), Clause::Match(m2)) => {
                assert!(!m1.optional);
                assert!(m2.optional);
            }
            _ => panic!("expected two MATCH clauses"),
        }
    }

    #[test]
    fn test_write_query() {
        let q = single(
            "MATCH (a), (b) WHERE a.k = 1 \
             CREATE (a)-[r:KNOWS]->(b) \
             SET r.since = 2020 \
             RETURN r",
        );
        let names: Vec<_> = q.clauses.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["MATCH", "CREATE", "SET", "RETURN"]);
    }

    #[test]
    fn test_terminal_writer_without_return() {
        let q = single("MATCH (n {k: 1}) DETACH DELETE n");
        assert_eq!(q.clauses.len(), 2);
        assert!(q.clauses[1].is_updating());
    }

    #[test]
    fn test_remove_parses_as_set_with_flag() {
        let q = single("MATCH (n) REMOVE n.age RETURN n");
        match &q.clauses[1] {
            Clause::Set(s) => assert!(s.is_remove),
            other => panic!("expected REMOVE, got {}", other.name()),
        }
    }

    #[test]
    fn test_union_tree() {
        let stmt = parse(
            "MATCH (a:Person) RETURN a.name \
             UNION MATCH (b:Company) RETURN b.name \
             UNION ALL MATCH (c:City) RETURN c.name",
        );
        match stmt {
            CypherStatement::Union { all, larg, .. } => {
                assert!(all);
                assert!(matches!(*larg, CypherStatement::Union { all: false, .. }));
            }
            other => panic!("expected UNION tree, got {other:?}"),
        }
    }

    #[test]
    fn test_union_branch_must_return() {
        let err = parse_cypher("MATCH (a) DELETE a UNION MATCH (b) RETURN b").unwrap_err();
        assert!(err.message.contains("UNION"));
    }

    #[test]
    fn test_reading_after_updating_requires_with() {
        let err = parse_cypher("CREATE (a) MATCH (b) RETURN b").unwrap_err();
        assert!(err.message.contains("WITH"));

        // and the WITH boundary makes it legal
        assert!(parse_cypher("CREATE (a) WITH a MATCH (b) RETURN a, b").is_ok());
    }

    #[test]
    fn test_query_must_project_or_update() {
        let err = parse_cypher("MATCH (a)").unwrap_err();
        assert!(err.message.contains("RETURN"));
    }

    #[test]
    fn test_syntax_error_carries_offset_and_token() {
        let err = parse_cypher("MATCH (a RETURN a").unwrap_err();
        assert!(err.offset > 0);
        assert!(!err.token.is_empty());
    }

    #[test]
    fn test_call_clause_parses() {
        let q = single("CALL db.labels() YIELD label RETURN label");
        assert!(matches!(q.clauses[0], Clause::Call(_)));
    }

    #[test]
    fn test_standalone_unwind_chain() {
        let q = single("UNWIND [[1,2],[3,4],5] AS n UNWIND n AS x RETURN x");
        assert_eq!(q.clauses.len(), 3);
        assert!(matches!(q.clauses[0], Clause::Unwind(_)));
        assert!(matches!(q.clauses[1], Clause::Unwind(_)));
    }
}

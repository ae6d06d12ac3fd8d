use nom::character::complete::char;
use nom::combinator::opt;
use nom::multi::separated_list1;
use nom::Parser;

use super::ast::MatchClause;
use super::common::ws;
use super::lexer::{keyword, PResult};
use super::path_pattern;
use super::where_clause;

/// `[OPTIONAL] MATCH <pattern> [, <pattern>]* [WHERE <expr>]`
pub fn parse_match_clause(input: &str) -> PResult<'_, MatchClause<'_>> {
    let (input, optional) = opt(ws(keyword("OPTIONAL"))).parse(input)?;
    let (input, _) = ws(keyword("MATCH")).parse(input)?;

    let (input, patterns) =
        separated_list1(ws(char(',')), path_pattern::parse_path_pattern_with_var).parse(input)?;

    let (input, where_clause) = opt(where_clause::parse_where_clause).parse(input)?;

    Ok((
        input,
        MatchClause {
            optional: optional.is_some(),
            patterns,
            where_clause,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_with_where() {
        let (rest, clause) = parse_match_clause("MATCH (a)-[r]->(b) WHERE a.k = 1").unwrap();
        assert_eq!(rest, "");
        assert!(!clause.optional);
        assert_eq!(clause.patterns.len(), 1);
        assert!(clause.where_clause.is_some());
    }

    #[test]
    fn test_optional_match() {
        let (_, clause) = parse_match_clause("OPTIONAL MATCH (a)-[]->(b)").unwrap();
        assert!(clause.optional);
    }

    #[test]
    fn test_multiple_patterns() {
        let (_, clause) = parse_match_clause("MATCH (a), (b), p = (c)-[]->(d)").unwrap();
        assert_eq!(clause.patterns.len(), 3);
        assert_eq!(clause.patterns[2].var_name, Some("p"));
    }

    #[test]
    fn test_optional_alone_is_not_match() {
        assert!(parse_match_clause("OPTIONAL (a)").is_err());
    }
}

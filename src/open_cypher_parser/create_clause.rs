use nom::character::complete::char;
use nom::multi::separated_list1;
use nom::Parser;

use super::ast::{CreateClause, MergeClause};
use super::common::ws;
use super::lexer::{keyword, PResult};
use super::path_pattern;

/// `CREATE <pattern> [, <pattern>]*`
pub fn parse_create_clause(input: &str) -> PResult<'_, CreateClause<'_>> {
    let (input, _) = ws(keyword("CREATE")).parse(input)?;
    let (input, patterns) =
        separated_list1(ws(char(',')), path_pattern::parse_path_pattern_with_var).parse(input)?;
    Ok((input, CreateClause { patterns }))
}

/// `MERGE <path>` — exactly one path per clause.
pub fn parse_merge_clause(input: &str) -> PResult<'_, MergeClause<'_>> {
    let (input, _) = ws(keyword("MERGE")).parse(input)?;
    let (input, path) = path_pattern::parse_path_pattern_with_var(input)?;
    Ok((input, MergeClause { path }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::Direction;

    #[test]
    fn test_create_single_node() {
        let (rest, clause) = parse_create_clause("CREATE (n:Person {name: 'Ada'})").unwrap();
        assert_eq!(rest, "");
        assert_eq!(clause.patterns.len(), 1);
        assert!(clause.patterns[0].single_node());
    }

    #[test]
    fn test_create_edge_pattern() {
        let (_, clause) = parse_create_clause("CREATE (a)-[r:KNOWS]->(b), (c)").unwrap();
        assert_eq!(clause.patterns.len(), 2);
        assert_eq!(
            clause.patterns[0].steps[0].rel.direction,
            Direction::Outgoing
        );
    }

    #[test]
    fn test_merge_path() {
        let (rest, clause) = parse_merge_clause("MERGE (a)-[:KNOWS]->(b)").unwrap();
        assert_eq!(rest, "");
        assert_eq!(clause.path.steps.len(), 1);
    }
}

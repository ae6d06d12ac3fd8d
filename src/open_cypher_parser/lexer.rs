//! Lexical layer of the parser.
//!
//! The clause and expression parsers are nom combinators over `&str`, but
//! every identifier, keyword, literal and parameter they consume goes
//! through the scanners in this module, so the token vocabulary and the
//! keyword classification live in exactly one place. [`tokenize`] exposes
//! the same scanners as a plain token stream, which error reporting uses to
//! name the offending token at a byte offset.

use lazy_static::lazy_static;
use nom::bytes::complete::{tag, tag_no_case, take_until};
use nom::character::complete::char;
use nom::{IResult, Parser};
use std::collections::HashMap;

use super::errors::{CypherParseError, SyntaxError};

/// Result type shared by every text-level parser in this crate.
pub type PResult<'a, T> = IResult<&'a str, T, CypherParseError<'a>>;

/// Keyword classification. *Safe* keywords may double as identifiers or
/// schema names; *reserved-conflicted* ones only ever appear in their own
/// syntactic slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordClass {
    Safe,
    Reserved,
}

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, KeywordClass> = {
        use KeywordClass::*;
        let mut m = HashMap::new();
        for kw in [
            "ALL", "AND", "AS", "ASC", "ASCENDING", "BY", "CALL", "CASE", "CONTAINS", "CREATE",
            "DELETE", "DESC", "DESCENDING", "DETACH", "DISTINCT", "ELSE", "ENDS", "EXISTS", "IN",
            "IS", "LIMIT", "MATCH", "MERGE", "NOT", "OPTIONAL", "OR", "ORDER", "REMOVE", "RETURN",
            "SET", "SKIP", "STARTS", "THEN", "UNION", "UNWIND", "WHEN", "WHERE", "WITH", "XOR",
            "YIELD",
        ] {
            m.insert(kw, Safe);
        }
        for kw in ["END", "FALSE", "NULL", "TRUE"] {
            m.insert(kw, Reserved);
        }
        m
    };
}

/// Classify a word, if it is a keyword at all.
pub fn keyword_class(word: &str) -> Option<KeywordClass> {
    KEYWORDS.get(word.to_ascii_uppercase().as_str()).copied()
}

/// Reserved-conflicted keywords can never act as identifiers.
pub fn is_reserved_word(word: &str) -> bool {
    keyword_class(word) == Some(KeywordClass::Reserved)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Keyword,
    Integer,
    Float,
    String,
    Parameter,
    Operator,
    Punct,
}

/// One scanned token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub offset: usize,
}

fn identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub fn identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Scan one identifier-shaped word. Keyword classification is the caller's
/// concern; this accepts reserved words too.
pub fn scan_word(input: &str) -> PResult<'_, &str> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if identifier_start(c) => {}
        _ => return Err(nom::Err::Error(CypherParseError::new(input, "expected identifier"))),
    }
    let end = chars
        .find(|(_, c)| !identifier_continue(*c))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    Ok((&input[end..], &input[..end]))
}

/// Scan an identifier: a word that is not a reserved-conflicted keyword.
pub fn scan_identifier(input: &str) -> PResult<'_, &str> {
    let (rest, word) = scan_word(input)?;
    if is_reserved_word(word) {
        return Err(nom::Err::Error(CypherParseError::new(
            input,
            "reserved keyword cannot be used as an identifier",
        )));
    }
    Ok((rest, word))
}

/// Case-insensitive keyword matcher that refuses to match a prefix of a
/// longer word (`IN` must not match `INdex`).
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input: &'a str| {
        let (rest, matched) = tag_no_case::<_, _, CypherParseError<'a>>(kw).parse(input)?;
        if rest.chars().next().is_some_and(identifier_continue) {
            return Err(nom::Err::Error(CypherParseError::new(input, "expected keyword")));
        }
        Ok((rest, matched))
    }
}

/// Scan a numeric literal. Returns the lexeme and whether it is a float.
///
/// A dot only belongs to the number when a digit follows it, so `1..3`
/// scans as the integer `1` with `..3` left over.
pub fn scan_number(input: &str) -> PResult<'_, (&str, bool)> {
    let digits_end = input
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    if digits_end == 0 {
        return Err(nom::Err::Error(CypherParseError::new(input, "expected number")));
    }

    let mut end = digits_end;
    let mut is_float = false;

    let rest = &input[end..];
    if let Some(frac) = rest.strip_prefix('.') {
        let frac_digits = frac
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(frac.len());
        if frac_digits > 0 {
            is_float = true;
            end += 1 + frac_digits;
        }
    }

    let rest = &input[end..];
    if rest.starts_with(['e', 'E']) {
        let exp = &rest[1..];
        let signed = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        let sign_len = exp.len() - signed.len();
        let exp_digits = signed
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(signed.len());
        if exp_digits > 0 {
            is_float = true;
            end += 1 + sign_len + exp_digits;
        }
    }

    Ok((&input[end..], (&input[..end], is_float)))
}

/// Scan a quoted string literal, returning its inner content. Both quote
/// characters are accepted; the lexer does not process escapes.
pub fn scan_string(input: &str) -> PResult<'_, &str> {
    if input.starts_with('\'') {
        let (rest, s) =
            nom::sequence::delimited(char('\''), take_until("'"), char('\'')).parse(input)?;
        Ok((rest, s))
    } else if input.starts_with('"') {
        let (rest, s) =
            nom::sequence::delimited(char('"'), take_until("\""), char('"')).parse(input)?;
        Ok((rest, s))
    } else {
        Err(nom::Err::Error(CypherParseError::new(input, "expected string literal")))
    }
}

/// Scan a `$name` parameter marker, returning the bare name.
pub fn scan_parameter(input: &str) -> PResult<'_, &str> {
    let (rest, _) = tag::<_, _, CypherParseError<'_>>("$").parse(input)?;
    let end = rest
        .char_indices()
        .find(|(_, c)| !identifier_continue(*c))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    if end == 0 {
        return Err(nom::Err::Error(CypherParseError::new(input, "expected parameter name")));
    }
    Ok((&rest[end..], &rest[..end]))
}

const MULTI_CHAR_OPERATORS: [&str; 8] = ["<=", ">=", "<>", "=~", "::", "..", "->", "<-"];
const SINGLE_CHAR_OPERATORS: &str = "+-*/%^=<>|";
const PUNCTUATION: &str = "()[]{},.:;";

/// Scan the whole source into a token stream.
///
/// The combinator parsers do not consume this stream directly (they scan the
/// text in place with the functions above); the stream form exists for error
/// reporting and for tests that pin the keyword classification.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut rest = source;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(tokens);
        }
        let offset = source.len() - rest.len();

        if rest.starts_with('\'') || rest.starts_with('"') {
            match scan_string(rest) {
                Ok((next, _)) => {
                    tokens.push(Token {
                        kind: TokenKind::String,
                        lexeme: &rest[..rest.len() - next.len()],
                        offset,
                    });
                    rest = next;
                    continue;
                }
                Err(_) => {
                    return Err(SyntaxError::new(offset, &rest[..1], "unterminated string literal"));
                }
            }
        }

        if rest.starts_with('$') {
            let (next, _) = scan_parameter(rest)
                .map_err(|_| SyntaxError::new(offset, "$", "malformed parameter marker"))?;
            tokens.push(Token {
                kind: TokenKind::Parameter,
                lexeme: &rest[..rest.len() - next.len()],
                offset,
            });
            rest = next;
            continue;
        }

        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            let (next, (lexeme, is_float)) = scan_number(rest)
                .map_err(|_| SyntaxError::new(offset, &rest[..1], "malformed number"))?;
            tokens.push(Token {
                kind: if is_float { TokenKind::Float } else { TokenKind::Integer },
                lexeme,
                offset,
            });
            rest = next;
            continue;
        }

        if let Ok((next, word)) = scan_word(rest) {
            tokens.push(Token {
                kind: if keyword_class(word).is_some() {
                    TokenKind::Keyword
                } else {
                    TokenKind::Identifier
                },
                lexeme: word,
                offset,
            });
            rest = next;
            continue;
        }

        if let Some(op) = MULTI_CHAR_OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Token {
                kind: TokenKind::Operator,
                lexeme: &rest[..op.len()],
                offset,
            });
            rest = &rest[op.len()..];
            continue;
        }

        let c = rest.chars().next().unwrap_or_default();
        if SINGLE_CHAR_OPERATORS.contains(c) {
            tokens.push(Token {
                kind: TokenKind::Operator,
                lexeme: &rest[..c.len_utf8()],
                offset,
            });
            rest = &rest[c.len_utf8()..];
            continue;
        }
        if PUNCTUATION.contains(c) {
            tokens.push(Token {
                kind: TokenKind::Punct,
                lexeme: &rest[..c.len_utf8()],
                offset,
            });
            rest = &rest[c.len_utf8()..];
            continue;
        }

        return Err(SyntaxError::new(
            offset,
            &rest[..c.len_utf8()],
            "unrecognized character",
        ));
    }
}

/// The token at the start of `rest`, for error messages. Falls back to the
/// first character (or `<end of input>`) when nothing scans.
pub fn offending_token(rest: &str) -> String {
    let trimmed = rest.trim_start();
    if trimmed.is_empty() {
        return "<end of input>".to_string();
    }
    match tokenize(trimmed) {
        Ok(tokens) if !tokens.is_empty() => tokens[0].lexeme.to_string(),
        _ => trimmed.chars().take(1).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("END"; "end is reserved")]
    #[test_case("false"; "false is reserved")]
    #[test_case("Null"; "null is reserved")]
    #[test_case("TRUE"; "true is reserved")]
    fn test_reserved_conflicted_keywords(word: &str) {
        assert_eq!(keyword_class(word), Some(KeywordClass::Reserved));
        assert!(scan_identifier(word).is_err());
    }

    #[test_case("MATCH")]
    #[test_case("contains")]
    #[test_case("Union")]
    #[test_case("xor")]
    fn test_safe_keywords_are_identifiers(word: &str) {
        assert_eq!(keyword_class(word), Some(KeywordClass::Safe));
        let (rest, ident) = scan_identifier(word).unwrap();
        assert_eq!(rest, "");
        assert_eq!(ident, word);
    }

    #[test]
    fn test_scan_word_shapes() {
        assert_eq!(scan_word("abc_1 rest").unwrap(), (" rest", "abc_1"));
        assert_eq!(scan_word("_x)").unwrap(), (")", "_x"));
        assert!(scan_word("1abc").is_err());
    }

    #[test]
    fn test_scan_number_integer_vs_float() {
        assert_eq!(scan_number("42 ").unwrap(), (" ", ("42", false)));
        assert_eq!(scan_number("3.25)").unwrap(), ((")"), ("3.25", true)));
        assert_eq!(scan_number("1e10,").unwrap(), ((","), ("1e10", true)));
        assert_eq!(scan_number("2.5e-3").unwrap(), (("") , ("2.5e-3", true)));
        // a slice bound: the dots stay out of the number
        assert_eq!(scan_number("1..3]").unwrap(), (("..3]"), ("1", false)));
    }

    #[test]
    fn test_scan_string_both_quotes() {
        assert_eq!(scan_string("'abc' x").unwrap(), (" x", "abc"));
        assert_eq!(scan_string("\"abc\"").unwrap(), ("", "abc"));
        assert!(scan_string("'open").is_err());
    }

    #[test]
    fn test_scan_parameter() {
        assert_eq!(scan_parameter("$p1 ").unwrap(), (" ", "p1"));
        assert!(scan_parameter("$ x").is_err());
    }

    #[test]
    fn test_keyword_does_not_match_prefix() {
        assert!(keyword("IN")("INDEX").is_err());
        assert!(keyword("IN")("IN [1]").is_ok());
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("MATCH (n) RETURN n.age >= 21").unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword,
                TokenKind::Punct,
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Integer,
            ]
        );
        assert_eq!(tokens[0].offset, 0);
        assert_eq!(tokens[4].lexeme, "RETURN");
        assert_eq!(tokens[4].offset, 10);
        assert_eq!(tokens[8].lexeme, ">=");
    }

    #[test]
    fn test_tokenize_rejects_garbage() {
        let err = tokenize("RETURN @").unwrap_err();
        assert_eq!(err.offset, 7);
        assert_eq!(err.token, "@");
    }

    #[test]
    fn test_offending_token() {
        assert_eq!(offending_token("  RETURN x"), "RETURN");
        assert_eq!(offending_token(""), "<end of input>");
    }
}

use nom::error::{ContextError, ParseError};
use std::fmt;
use thiserror::Error;

use super::lexer;

/// Accumulating nom-side parse error. Each entry pairs the remaining input
/// at the failure point with a static description; the first entry is the
/// innermost failure.
#[derive(Debug, PartialEq)]
pub struct CypherParseError<'a> {
    pub errors: Vec<(&'a str, &'static str)>,
}

impl<'a> CypherParseError<'a> {
    pub fn new(at: &'a str, message: &'static str) -> Self {
        CypherParseError {
            errors: vec![(at, message)],
        }
    }

    /// Convert into an owned [`SyntaxError`] with a byte offset into
    /// `source`. The remaining-input slices recorded by nom are always
    /// suffixes of the original source, so the offset is just the length
    /// difference.
    pub fn into_syntax_error(self, source: &str) -> SyntaxError {
        let (at, message) = self
            .errors
            .first()
            .copied()
            .unwrap_or((source, "unable to parse query"));
        SyntaxError {
            offset: source.len().saturating_sub(at.len()),
            token: lexer::offending_token(at),
            message: message.to_string(),
        }
    }
}

impl<'a> ParseError<&'a str> for CypherParseError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        CypherParseError::new(input, "unexpected input")
    }

    fn append(input: &'a str, _kind: nom::error::ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, "while parsing"));
        other
    }
}

impl<'a> ContextError<&'a str> for CypherParseError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx));
        other
    }
}

impl fmt::Display for CypherParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (input, ctx) in &self.errors {
            writeln!(f, "{}: {}", ctx, input)?;
        }
        Ok(())
    }
}

/// Owned syntax error surfaced to callers.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("syntax error at byte {offset} near \"{token}\": {message}")]
pub struct SyntaxError {
    /// Byte offset of the failure in the (comment-stripped) source
    pub offset: usize,
    /// The offending token, re-scanned at the failure point
    pub token: String,
    pub message: String,
}

impl SyntaxError {
    pub fn new(offset: usize, token: impl Into<String>, message: impl Into<String>) -> Self {
        SyntaxError {
            offset,
            token: token.into(),
            message: message.into(),
        }
    }
}

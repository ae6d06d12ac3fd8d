use nom::character::complete::multispace0;
use nom::error::ParseError;
use nom::sequence::delimited;
use nom::Parser;

/// Whitespace-tolerant combinator wrapper.
pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

#[derive(PartialEq)]
enum StripState {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Strip `//` and `--` line comments and `/* */` block comments before
/// parsing. Content inside string literals ('), quoted identifiers (") and
/// backticked names (`) is preserved, including escaped quotes.
///
/// Newlines that end line comments are kept so byte offsets stay close to
/// the user's source lines.
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut state = StripState::Code;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            StripState::Code => match ch {
                '\'' | '"' | '`' => {
                    state = StripState::Quoted(ch);
                    out.push(ch);
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = StripState::LineComment;
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = StripState::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = StripState::BlockComment;
                }
                _ => out.push(ch),
            },
            StripState::Quoted(quote) => {
                out.push(ch);
                if ch == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if ch == quote {
                    state = StripState::Code;
                }
            }
            StripState::LineComment => {
                if ch == '\n' {
                    out.push('\n');
                    state = StripState::Code;
                }
            }
            StripState::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = StripState::Code;
                }
            }
        }
    }

    out
}

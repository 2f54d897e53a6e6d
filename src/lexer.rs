//! Greedy longest-match lexer for `$filter` input.
//!
//! Matching is driven by an ordered rule table; the first rule that matches
//! at the current position wins. Keyword operators (`eq`, `and`, …) only
//! match when followed by whitespace, function names (`contains`, `length`,
//! …) only when immediately followed by `(`. Matching is case-insensitive
//! via a pre-lowercased shadow buffer; token text preserves the original
//! case.

use crate::ast::{Token, TokenKind};
use crate::error::Error;

enum Rule {
    /// Exact string, token covers the whole match.
    Literal(TokenKind, &'static str),
    /// Keyword operator: requires trailing whitespace. The whitespace byte is
    /// consumed as part of the token range but excluded from its text.
    Keyword(TokenKind, &'static str),
    /// Function name: requires an immediately-following `(`, which is not
    /// consumed with the name.
    Function(TokenKind, &'static str),
    /// Matcher function returning the matched byte length.
    Matcher(TokenKind, fn(&[u8]) -> Option<usize>),
}

use Rule::{Function, Keyword, Literal, Matcher};
use TokenKind::*;

/// Ordered rule table; order resolves all ambiguities (`in` vs an identifier
/// starting with `in`, float vs dotted property path, and so on).
static RULES: &[Rule] = &[
    Literal(TokenTrue, "true"),
    Literal(TokenFalse, "false"),
    Matcher(SingleQuotedString, single_quoted),
    Matcher(DoubleQuotedString, double_quoted),
    Literal(OpenParens, "("),
    Literal(CloseParens, ")"),
    Literal(OpenSquareBracket, "["),
    Literal(CloseSquareBracket, "]"),
    Literal(OpenCurlyBrace, "{"),
    Literal(CloseCurlyBrace, "}"),
    Literal(Colon, ":"),
    Keyword(Equals, "eq"),
    Keyword(NotEquals, "ne"),
    Keyword(GreaterThan, "gt"),
    Keyword(GreaterThanOrEqual, "ge"),
    Keyword(LessThan, "lt"),
    Keyword(LessThanOrEqual, "le"),
    Keyword(And, "and"),
    Keyword(Or, "or"),
    Keyword(Not, "not"),
    Keyword(Has, "has"),
    Keyword(In, "in"),
    Function(Concat, "concat"),
    Function(Contains, "contains"),
    Function(EndsWith, "endswith"),
    Function(IndexOf, "indexof"),
    Function(Length, "length"),
    Function(StartsWith, "startswith"),
    Function(Substring, "substring"),
    Function(HasSubset, "hassubset"),
    Function(HasSubsequence, "hassubsequence"),
    Function(MatchesPattern, "matchespattern"),
    Function(ToLower, "tolower"),
    Function(ToUpper, "toupper"),
    Function(Trim, "trim"),
    Function(Day, "day"),
    Function(FractionalSeconds, "fractionalseconds"),
    Function(Hour, "hour"),
    Function(Minute, "minute"),
    Function(Month, "month"),
    Function(Second, "second"),
    Function(Year, "year"),
    Function(Ceiling, "ceiling"),
    Function(Floor, "floor"),
    Function(Round, "round"),
    Keyword(Add, "add"),
    Keyword(Subtract, "sub"),
    Keyword(Multiply, "mul"),
    Keyword(Divide, "div"),
    Keyword(DivideFloat, "divby"),
    Keyword(Modulo, "mod"),
    Literal(NullLiteral, "null"),
    Literal(Comma, ","),
    Matcher(FloatingPointLiteral, float_literal),
    Matcher(IntegerLiteral, integer_literal),
    // Near the end, otherwise it would match everything.
    Matcher(UnquotedString, unquoted_string),
];

fn single_quoted(s: &[u8]) -> Option<usize> {
    quoted(s, b'\'')
}

fn double_quoted(s: &[u8]) -> Option<usize> {
    quoted(s, b'"')
}

fn quoted(s: &[u8], quote: u8) -> Option<usize> {
    if s.first() != Some(&quote) {
        return None;
    }
    s[1..].iter().position(|&b| b == quote).map(|i| i + 2)
}

fn float_literal(s: &[u8]) -> Option<usize> {
    let start = match s.first() {
        Some(b'-') | Some(b'+') => 1,
        _ => 0,
    };
    if !s.get(start)?.is_ascii_digit() {
        return None;
    }
    let mut found_dot = false;
    for (i, &b) in s.iter().enumerate().skip(start + 1) {
        if b == b'.' {
            if found_dot {
                return Some(i);
            }
            found_dot = true;
        } else if !b.is_ascii_digit() {
            return found_dot.then_some(i);
        }
    }
    found_dot.then_some(s.len())
}

fn is_value_terminator(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b',' | b')' | b']' | b'}')
}

/// Digits terminated by whitespace, `,`, `)`, `]`, `}`, or end of input. Any
/// other byte adjacent to the digits (a hex-like id such as
/// `6206b158000e1859781d5e16`) rejects the whole token so the
/// unquoted-string rule can take it instead.
fn integer_literal(s: &[u8]) -> Option<usize> {
    let start = match s.first() {
        Some(b'-') | Some(b'+') => 1,
        _ => 0,
    };
    if !s.get(start)?.is_ascii_digit() {
        return None;
    }
    for (i, &b) in s.iter().enumerate().skip(start + 1) {
        if is_value_terminator(b) {
            return Some(i);
        }
        if !b.is_ascii_digit() {
            return None;
        }
    }
    Some(s.len())
}

fn unquoted_string(s: &[u8]) -> Option<usize> {
    let len = s
        .iter()
        .position(|&b| is_value_terminator(b) || b == b'\'' || b == b'"')
        .unwrap_or(s.len());
    (len > 0).then_some(len)
}

/// Cursor over an input string, producing one [`Token`] per call.
pub struct Lexer {
    text: String,
    lower: String,
    position: usize,
}

impl Lexer {
    /// Builds a lexer over `input`.
    ///
    /// Fails when lowercasing the input changes its byte length: offsets into
    /// the original and the shadow buffer must stay interchangeable.
    pub fn new(input: &str) -> Result<Self, Error> {
        let lower = input.to_lowercase();
        if lower.len() != input.len() {
            return Err(Error::parsing(
                "input changes byte length under case folding",
            ));
        }
        Ok(Lexer {
            text: input.to_string(),
            lower,
            position: 0,
        })
    }

    /// Returns the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, Error> {
        let bytes = self.text.as_bytes();
        while self.position < bytes.len() && bytes[self.position].is_ascii_whitespace() {
            self.position += 1;
        }
        if self.position >= bytes.len() {
            return Ok(None);
        }
        let rest = &self.lower.as_bytes()[self.position..];
        for rule in RULES {
            if let Some((kind, text_len, consumed)) = try_rule(rule, rest) {
                let start = self.position;
                let token = Token::new(
                    kind,
                    start,
                    start + consumed,
                    &self.text[start..start + text_len],
                );
                self.position += consumed;
                return Ok(Some(token));
            }
        }
        Err(Error::NoMatchingToken {
            position: self.position,
        })
    }
}

fn try_rule(rule: &Rule, rest: &[u8]) -> Option<(TokenKind, usize, usize)> {
    match rule {
        Literal(kind, lit) => rest
            .starts_with(lit.as_bytes())
            .then_some((*kind, lit.len(), lit.len())),
        Keyword(kind, word) => {
            let terminated = rest.starts_with(word.as_bytes())
                && rest.get(word.len()).is_some_and(|b| b.is_ascii_whitespace());
            terminated.then_some((*kind, word.len(), word.len() + 1))
        }
        Function(kind, name) => {
            let called = rest.starts_with(name.as_bytes()) && rest.get(name.len()) == Some(&b'(');
            called.then_some((*kind, name.len(), name.len()))
        }
        Matcher(kind, f) => f(rest).map(|len| (*kind, len, len)),
    }
}

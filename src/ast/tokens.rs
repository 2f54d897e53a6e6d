use std::fmt;

use crate::error::Error;
use crate::value::Value;

/// The closed token alphabet, ordered here roughly as the lexer's rule table
/// tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    TokenTrue,
    TokenFalse,
    UnquotedString,
    SingleQuotedString,
    DoubleQuotedString,
    NullLiteral,
    FloatingPointLiteral,
    IntegerLiteral,

    // Punctuation
    OpenParens,
    CloseParens,
    OpenSquareBracket,
    CloseSquareBracket,
    OpenCurlyBrace,
    CloseCurlyBrace,
    Colon,
    Comma,

    // Keyword operators (matched only when followed by whitespace)
    Not,
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    And,
    Or,
    Has,
    In,
    Add,
    Subtract,
    Multiply,
    Divide,
    DivideFloat,
    Modulo,

    // Function names (matched only when immediately followed by `(`)
    Concat,
    Contains,
    EndsWith,
    IndexOf,
    Length,
    StartsWith,
    Substring,
    HasSubset,
    HasSubsequence,
    MatchesPattern,
    ToLower,
    ToUpper,
    Trim,
    Day,
    FractionalSeconds,
    Hour,
    Minute,
    Month,
    Second,
    Year,
    Ceiling,
    Floor,
    Round,
}

impl TokenKind {
    pub fn is_unary(self) -> bool {
        self == TokenKind::Not
    }

    pub fn is_multiplicative(self) -> bool {
        matches!(
            self,
            TokenKind::Multiply | TokenKind::Divide | TokenKind::DivideFloat | TokenKind::Modulo
        )
    }

    pub fn is_additive(self) -> bool {
        matches!(self, TokenKind::Add | TokenKind::Subtract)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            TokenKind::GreaterThan
                | TokenKind::GreaterThanOrEqual
                | TokenKind::LessThan
                | TokenKind::LessThanOrEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(
            self,
            TokenKind::Equals | TokenKind::NotEquals | TokenKind::Has
        )
    }

    pub fn is_conjunction(self) -> bool {
        matches!(self, TokenKind::And | TokenKind::Or)
    }

    /// Function-name tokens take a parenthesized argument list.
    pub fn has_parameters(self) -> bool {
        matches!(
            self,
            TokenKind::Concat
                | TokenKind::Contains
                | TokenKind::EndsWith
                | TokenKind::IndexOf
                | TokenKind::Length
                | TokenKind::StartsWith
                | TokenKind::Substring
                | TokenKind::HasSubset
                | TokenKind::HasSubsequence
                | TokenKind::MatchesPattern
                | TokenKind::ToLower
                | TokenKind::ToUpper
                | TokenKind::Trim
                | TokenKind::Day
                | TokenKind::FractionalSeconds
                | TokenKind::Hour
                | TokenKind::Minute
                | TokenKind::Month
                | TokenKind::Second
                | TokenKind::Year
                | TokenKind::Ceiling
                | TokenKind::Floor
                | TokenKind::Round
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A lexical unit: kind, half-open byte range into the original input, and
/// the exact source slice.
///
/// For keyword operators the range includes the terminating space but `text`
/// does not. Tokens are immutable after production except during placeholder
/// substitution, which rewrites `text` and `kind` together.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, start: usize, end: usize, text: impl Into<String>) -> Self {
        Token {
            kind,
            start,
            end,
            text: text.into(),
        }
    }

    /// Decodes the token into its literal value.
    ///
    /// Quoted strings lose their quotes, numbers parse, `true`/`false`/`null`
    /// decode to their values, and everything else (identifiers, property
    /// paths, opaque ids) stays as raw text.
    pub fn get_data(&self) -> Result<Value, Error> {
        match self.kind {
            TokenKind::TokenTrue => Ok(Value::Boolean(true)),
            TokenKind::TokenFalse => Ok(Value::Boolean(false)),
            TokenKind::SingleQuotedString | TokenKind::DoubleQuotedString => {
                Ok(Value::String(self.text[1..self.text.len() - 1].to_string()))
            }
            TokenKind::NullLiteral => Ok(Value::Null),
            TokenKind::FloatingPointLiteral => self
                .text
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| Error::parsing(format!("invalid float literal {:?}: {}", self.text, e))),
            TokenKind::IntegerLiteral => self
                .text
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| Error::parsing(format!("invalid integer literal {:?}: {}", self.text, e))),
            _ => Ok(Value::String(self.text.clone())),
        }
    }

    /// True when this token is the positional placeholder for `index`, i.e.
    /// its text is exactly `':N'` or `":N"`.
    pub fn is_placeholder(&self, index: usize) -> bool {
        match self.kind {
            TokenKind::SingleQuotedString => self.text == format!("':{}'", index),
            TokenKind::DoubleQuotedString => self.text == format!("\":{}\"", index),
            _ => false,
        }
    }

    /// Rewrites this token in place with a replacement value. Strings become
    /// single-quoted string tokens; integers and floats change the kind
    /// accordingly. Any other value shape is unsupported.
    pub fn replace(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::String(s) => {
                self.text = format!("'{}'", s);
                self.kind = TokenKind::SingleQuotedString;
            }
            Value::Integer(n) => {
                self.text = n.to_string();
                self.kind = TokenKind::IntegerLiteral;
            }
            Value::Float(n) => {
                self.text = n.to_string();
                self.kind = TokenKind::FloatingPointLiteral;
            }
            other => {
                return Err(Error::UnsupportedReplacement(other.type_name().to_string()));
            }
        }
        Ok(())
    }
}

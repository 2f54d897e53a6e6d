use std::fmt;

use crate::ast::tokens::{Token, TokenKind};
use crate::error::Error;
use crate::value::Value;

/// The operator applied by an [`Operation`].
///
/// Operators are drawn from the token-kind alphabet; `NoOp` is a sentinel
/// that only appears at a degenerate root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    NoOp,
    Op(TokenKind),
}

impl Operator {
    pub fn kind(self) -> Option<TokenKind> {
        match self {
            Operator::NoOp => None,
            Operator::Op(kind) => Some(kind),
        }
    }

    pub fn has_parameters(self) -> bool {
        matches!(self, Operator::Op(kind) if kind.has_parameters())
    }
}

impl From<TokenKind> for Operator {
    fn from(kind: TokenKind) -> Self {
        Operator::Op(kind)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::NoOp => write!(f, "NoOp"),
            Operator::Op(kind) => write!(f, "{}", kind),
        }
    }
}

/// An ordered sequence of operands, produced for `in`-lists, bracketed
/// `[…]` literals, and multi-argument call sites after comma stripping.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceOperand {
    pub items: Vec<Operand>,
}

/// A JSON object literal, captured verbatim between matching curly braces.
/// Well-formedness is only checked when the data is requested.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectOperand {
    pub properties: String,
}

impl ObjectOperand {
    /// Parses the captured text as a JSON object.
    pub fn get_data(&self) -> Result<Value, Error> {
        let parsed: serde_json::Value = serde_json::from_str(&self.properties)
            .map_err(|e| Error::parsing(format!("invalid object literal: {}", e)))?;
        Ok(Value::from(parsed))
    }
}

/// A child of an [`Operation`]. This is a closed set: the parser's transient
/// group nodes never appear in a finished tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Leaf literal or identifier reference
    Token(Token),
    /// Sub-expression
    Operation(Box<Operation>),
    /// Ordered operand sequence
    Slice(SliceOperand),
    /// Verbatim JSON object literal
    Object(ObjectOperand),
}

/// An AST node: an operator and its ordered operands.
///
/// Arity follows the operator: two for comparisons and arithmetic, the
/// comma-stripped argument list for function calls, one for `not`, and none
/// for the literal booleans.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: Operator,
    pub operands: Vec<Operand>,
}

impl Operation {
    pub fn new(operator: impl Into<Operator>, operands: Vec<Operand>) -> Self {
        Operation {
            operator: operator.into(),
            operands,
        }
    }

    /// Returns a copy of this tree with every positional placeholder token
    /// (`':N'` / `":N"`) rewritten to the N-th supplied value. The original
    /// tree is never mutated.
    pub fn replace_operands(&self, args: &[Value]) -> Result<Operation, Error> {
        let mut cloned = self.clone();
        for (index, value) in args.iter().enumerate() {
            cloned.replace_operand(index, value)?;
        }
        Ok(cloned)
    }

    fn replace_operand(&mut self, index: usize, value: &Value) -> Result<(), Error> {
        for operand in &mut self.operands {
            replace_in_operand(operand, index, value)?;
        }
        Ok(())
    }
}

fn replace_in_operand(operand: &mut Operand, index: usize, value: &Value) -> Result<(), Error> {
    match operand {
        Operand::Token(token) => {
            if token.is_placeholder(index) {
                token.replace(value)?;
            }
        }
        Operand::Operation(op) => op.replace_operand(index, value)?,
        Operand::Slice(slice) => {
            for item in &mut slice.items {
                replace_in_operand(item, index, value)?;
            }
        }
        // Object literals are opaque JSON text; placeholders never live there.
        Operand::Object(_) => {}
    }
    Ok(())
}

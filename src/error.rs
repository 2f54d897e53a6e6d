use thiserror::Error;

use crate::ast::Operator;

/// Errors produced by the lexer, the parser, and the lowering backends.
///
/// Every pipeline stage returns these as values; the first failure aborts the
/// current operation and propagates unchanged to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The lexer cannot advance at a non-whitespace position.
    #[error("no matching token at position {position}")]
    NoMatchingToken { position: usize },

    /// Structural failure while building the operation tree.
    #[error("{0}")]
    Parsing(String),

    /// A backend has no lowering for this operator.
    #[error("unsupported operator: {0}")]
    UnknownOperator(Operator),

    /// The evaluator could not find a field referenced by the expression.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// A backend cannot emit a value of this shape.
    #[error("unsupported operand: {0}")]
    UnsupportedOperand(String),

    /// The evaluator encountered a runtime value it cannot compare.
    #[error("unsupported data type")]
    UnsupportedDataType,

    /// Placeholder substitution was given a value of an unsupported type.
    #[error("unsupported replacement type: {0}")]
    UnsupportedReplacement(String),

    /// Backend registry lookup miss.
    #[error("no such backend: {0}")]
    NoSuchBackend(String),
}

impl Error {
    pub(crate) fn parsing(msg: impl Into<String>) -> Self {
        Error::Parsing(msg.into())
    }
}

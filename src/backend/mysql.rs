//! MySQL `WHERE`-fragment lowering.
//!
//! Column identifiers are backtick-escaped unless they already contain a
//! function call or backticks; string values are single-quoted; object
//! literals serialize to JSON with escaped double quotes. The dialect is
//! MySQL-specific (`DIV`, `MOD`, `JSON_CONTAINS`) — don't reuse this output
//! for other SQL engines.

use regex::Regex;

use crate::ast::{Operand, Operation, TokenKind};
use crate::backend::{Backend, Query};
use crate::error::Error;
use crate::value::Value;

pub struct MySqlBackend {
    function_call: Regex,
    already_escaped: Regex,
}

/// A lowered operand: either a plain value or an already-compiled SQL
/// fragment from a sub-operation.
enum SqlOperand {
    Value(Value),
    Compiled(String),
}

impl MySqlBackend {
    pub fn new() -> Self {
        MySqlBackend {
            function_call: Regex::new(r"[A-Z]+\(").expect("static pattern"),
            already_escaped: Regex::new(r"`\w+`").expect("static pattern"),
        }
    }

    fn lower(&self, op: &Operation) -> Result<String, Error> {
        let operands = op
            .operands
            .iter()
            .map(|operand| self.lower_operand(operand))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(kind) = op.operator.kind() else {
            return Err(Error::UnknownOperator(op.operator));
        };
        match kind {
            TokenKind::TokenTrue => Ok("1=1".to_string()),
            TokenKind::TokenFalse => Ok("1=0".to_string()),
            TokenKind::Equals => self.comparison("=", &operands),
            TokenKind::NotEquals => self.comparison("!=", &operands),
            TokenKind::GreaterThan => self.comparison(">", &operands),
            TokenKind::GreaterThanOrEqual => self.comparison(">=", &operands),
            TokenKind::LessThan => self.comparison("<", &operands),
            TokenKind::LessThanOrEqual => self.comparison("<=", &operands),
            TokenKind::In => {
                let (lhs, rhs) = pair(&operands)?;
                Ok(format!("{} IN {}", self.column(lhs)?, self.value_sql(rhs)?))
            }
            TokenKind::And | TokenKind::Or => {
                let joiner = if kind == TokenKind::Or { " OR " } else { " AND " };
                let (lhs, rhs) = pair(&operands)?;
                match (lhs, rhs) {
                    (SqlOperand::Compiled(a), SqlOperand::Compiled(b)) => {
                        Ok(format!("{}{}{}", a, joiner, b))
                    }
                    _ => Err(Error::parsing("attempting to combine a non-clause operand")),
                }
            }
            TokenKind::StartsWith => self.like("", "%", &operands),
            TokenKind::EndsWith => self.like("%", "", &operands),
            TokenKind::Contains => self.like("%", "%", &operands),
            TokenKind::Not => {
                match operands.first() {
                    Some(SqlOperand::Compiled(clause)) => Ok(insert_not(clause)),
                    _ => Err(Error::UnsupportedOperand("not over a non-clause".to_string())),
                }
            }
            TokenKind::Length => {
                let first = operands
                    .first()
                    .ok_or_else(|| Error::parsing("length requires an operand"))?;
                Ok(format!("LENGTH({})", self.column(first)?))
            }
            TokenKind::HasSubset => {
                let (lhs, rhs) = pair(&operands)?;
                let SqlOperand::Value(value) = rhs else {
                    return Err(Error::UnsupportedOperand("hassubset value".to_string()));
                };
                Ok(format!(
                    "JSON_CONTAINS({},'{}')",
                    self.column(lhs)?,
                    json_value(value)?
                ))
            }
            TokenKind::Add => self.arithmetic("+", &operands),
            TokenKind::Subtract => self.arithmetic("-", &operands),
            TokenKind::Multiply => self.arithmetic("*", &operands),
            TokenKind::Divide => {
                // Integer divisors use the DIV operator per the OData spec.
                if matches!(operands.get(1), Some(SqlOperand::Value(Value::Integer(_)))) {
                    self.arithmetic(" DIV ", &operands)
                } else {
                    self.arithmetic("/", &operands)
                }
            }
            TokenKind::DivideFloat => self.arithmetic("/", &operands),
            TokenKind::Modulo => self.arithmetic(" MOD ", &operands),
            _ => Err(Error::UnknownOperator(op.operator)),
        }
    }

    fn lower_operand(&self, operand: &Operand) -> Result<SqlOperand, Error> {
        match operand {
            Operand::Token(token) => match token.get_data()? {
                value @ (Value::String(_) | Value::Integer(_) | Value::Float(_)) => {
                    Ok(SqlOperand::Value(value))
                }
                other => Err(Error::UnsupportedOperand(format!("{:?}", other))),
            },
            Operand::Operation(inner) => Ok(SqlOperand::Compiled(self.lower(inner)?)),
            Operand::Object(object) => Ok(SqlOperand::Value(object.get_data()?)),
            Operand::Slice(slice) => {
                let items = slice
                    .items
                    .iter()
                    .map(|item| {
                        self.lower_operand(item).map(|lowered| match lowered {
                            SqlOperand::Value(value) => value,
                            SqlOperand::Compiled(sql) => Value::String(sql),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SqlOperand::Value(Value::Array(items)))
            }
        }
    }

    fn comparison(&self, symbol: &str, operands: &[SqlOperand]) -> Result<String, Error> {
        let (lhs, rhs) = pair(operands)?;
        Ok(format!(
            "{}{}{}",
            self.column(lhs)?,
            symbol,
            self.value_sql(rhs)?
        ))
    }

    fn like(&self, prefix: &str, postfix: &str, operands: &[SqlOperand]) -> Result<String, Error> {
        let (lhs, rhs) = pair(operands)?;
        let SqlOperand::Value(Value::String(pattern)) = rhs else {
            return Err(Error::parsing("attempting to do a LIKE with a non-string value"));
        };
        Ok(format!(
            "{} LIKE '{}{}{}'",
            self.column(lhs)?,
            prefix,
            pattern,
            postfix
        ))
    }

    fn arithmetic(&self, symbol: &str, operands: &[SqlOperand]) -> Result<String, Error> {
        let (lhs, rhs) = pair(operands)?;
        let left = match lhs {
            // A compiled sub-expression keeps its grouping explicit.
            SqlOperand::Compiled(sql) => format!("({})", sql),
            SqlOperand::Value(value) => self.escape_column(value)?,
        };
        let right = match rhs {
            SqlOperand::Compiled(sql) => format!("({})", sql),
            SqlOperand::Value(value) => escape_value(value)?,
        };
        Ok(format!("{}{}{}", left, symbol, right))
    }

    /// Column position: compiled fragments pass through, values escape.
    fn column(&self, operand: &SqlOperand) -> Result<String, Error> {
        match operand {
            SqlOperand::Compiled(sql) => Ok(sql.clone()),
            SqlOperand::Value(value) => self.escape_column(value),
        }
    }

    fn value_sql(&self, operand: &SqlOperand) -> Result<String, Error> {
        match operand {
            SqlOperand::Compiled(sql) => Ok(sql.clone()),
            SqlOperand::Value(value) => escape_value(value),
        }
    }

    fn escape_column(&self, value: &Value) -> Result<String, Error> {
        match value {
            Value::String(name) => {
                if self.function_call.is_match(name) || self.already_escaped.is_match(name) {
                    Ok(name.clone())
                } else {
                    Ok(format!("`{}`", name))
                }
            }
            Value::Integer(n) => Ok(n.to_string()),
            Value::Float(n) => Ok(n.to_string()),
            other => Err(Error::UnsupportedOperand(format!("{:?}", other))),
        }
    }
}

impl Default for MySqlBackend {
    fn default() -> Self {
        MySqlBackend::new()
    }
}

impl Backend for MySqlBackend {
    fn compile(&self, op: &Operation) -> Result<Query, Error> {
        self.lower(op).map(Query::Sql)
    }
}

fn pair(operands: &[SqlOperand]) -> Result<(&SqlOperand, &SqlOperand), Error> {
    match operands {
        [lhs, rhs, ..] => Ok((lhs, rhs)),
        _ => Err(Error::parsing("expected item before and after operator")),
    }
}

/// Splices NOT after the first whitespace-separated word of an
/// already-compiled clause, or prefixes it when the clause is a single word.
fn insert_not(clause: &str) -> String {
    match clause.split_once(' ') {
        Some((first, rest)) => format!("{} NOT {}", first, rest),
        None => format!("NOT {}", clause),
    }
}

fn escape_value(value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(format!("'{}'", s)),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Float(n) => Ok(n.to_string()),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(escape_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("({})", parts.join(",")))
        }
        Value::Object(_) => {
            let json = serde_json::to_string(&value.to_json())
                .map_err(|e| Error::UnsupportedOperand(e.to_string()))?;
            Ok(format!("'{}'", json.replace('"', "\\\"")))
        }
        other => Err(Error::UnsupportedOperand(format!("{:?}", other))),
    }
}

/// JSON-shaped value text for `JSON_CONTAINS`: strings double-quoted, arrays
/// bracketed.
fn json_value(value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(format!("\"{}\"", s)),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Float(n) => Ok(n.to_string()),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(json_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", parts.join(",")))
        }
        other => Err(Error::UnsupportedOperand(format!("{:?}", other))),
    }
}

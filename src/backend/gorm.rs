//! Parameterized-clause lowering: a `?`-placeholder SQL fragment plus its
//! positional arguments, the shape GORM-style query builders take.

use crate::ast::{Operand, Operation, TokenKind};
use crate::backend::{Backend, Query};
use crate::error::Error;
use crate::value::Value;

const LIKE: &str = " LIKE ?";

/// A `?`-placeholder fragment and the arguments that bind to it, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlClause {
    pub clause: String,
    pub args: Vec<Value>,
}

impl SqlClause {
    fn new(clause: impl Into<String>, args: Vec<Value>) -> Self {
        SqlClause {
            clause: clause.into(),
            args,
        }
    }
}

pub struct GormBackend;

enum GormOperand {
    Value(Value),
    Clause(SqlClause),
}

impl GormBackend {
    fn lower(&self, op: &Operation) -> Result<SqlClause, Error> {
        let operands = op
            .operands
            .iter()
            .map(|operand| self.lower_operand(operand))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(kind) = op.operator.kind() else {
            return Err(Error::UnknownOperator(op.operator));
        };
        match kind {
            TokenKind::Equals => comparison("=", &operands),
            TokenKind::NotEquals => comparison("!=", &operands),
            TokenKind::GreaterThan => comparison(">", &operands),
            TokenKind::GreaterThanOrEqual => comparison(">=", &operands),
            TokenKind::LessThan => comparison("<", &operands),
            TokenKind::LessThanOrEqual => comparison("<=", &operands),
            TokenKind::And | TokenKind::Or => {
                let joiner = if kind == TokenKind::Or { " OR " } else { " AND " };
                let (lhs, rhs) = pair(&operands)?;
                match (lhs, rhs) {
                    (GormOperand::Clause(a), GormOperand::Clause(b)) => {
                        let mut args = a.args.clone();
                        args.extend(b.args.iter().cloned());
                        Ok(SqlClause::new(
                            format!("{}{}{}", a.clause, joiner, b.clause),
                            args,
                        ))
                    }
                    _ => Err(Error::parsing("attempting to combine a non-clause operand")),
                }
            }
            TokenKind::In => {
                let (lhs, rhs) = pair(&operands)?;
                let field = field_name(lhs)?;
                let GormOperand::Value(list @ Value::Array(_)) = rhs else {
                    return Err(Error::UnsupportedOperand("in over a non-list".to_string()));
                };
                Ok(SqlClause::new(format!("{} IN ?", field), vec![list.clone()]))
            }
            TokenKind::Contains => like(&operands, "%", "%"),
            TokenKind::EndsWith => like(&operands, "%", ""),
            TokenKind::StartsWith => like(&operands, "", "%"),
            TokenKind::Not => match operands.first() {
                Some(GormOperand::Clause(clause)) => Ok(insert_not(clause)),
                _ => Err(Error::UnsupportedOperand("not over a non-clause".to_string())),
            },
            _ => Err(Error::UnknownOperator(op.operator)),
        }
    }

    fn lower_operand(&self, operand: &Operand) -> Result<GormOperand, Error> {
        match operand {
            Operand::Token(token) => match token.get_data()? {
                value @ (Value::String(_) | Value::Integer(_) | Value::Float(_)) => {
                    Ok(GormOperand::Value(value))
                }
                other => Err(Error::UnsupportedOperand(format!("{:?}", other))),
            },
            Operand::Operation(inner) => Ok(GormOperand::Clause(self.lower(inner)?)),
            Operand::Object(object) => Ok(GormOperand::Value(object.get_data()?)),
            Operand::Slice(slice) => {
                let items = slice
                    .items
                    .iter()
                    .map(|item| {
                        self.lower_operand(item).map(|lowered| match lowered {
                            GormOperand::Value(value) => value,
                            GormOperand::Clause(clause) => Value::String(clause.clause),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(GormOperand::Value(Value::Array(items)))
            }
        }
    }
}

impl Backend for GormBackend {
    fn compile(&self, op: &Operation) -> Result<Query, Error> {
        self.lower(op).map(Query::Clause)
    }
}

fn pair(operands: &[GormOperand]) -> Result<(&GormOperand, &GormOperand), Error> {
    match operands {
        [lhs, rhs, ..] => Ok((lhs, rhs)),
        _ => Err(Error::parsing("expected item before and after operator")),
    }
}

fn field_name(operand: &GormOperand) -> Result<&str, Error> {
    match operand {
        GormOperand::Value(Value::String(name)) => Ok(name),
        _ => Err(Error::UnsupportedOperand("expected a field name".to_string())),
    }
}

fn comparison(symbol: &str, operands: &[GormOperand]) -> Result<SqlClause, Error> {
    let (lhs, rhs) = pair(operands)?;
    let field = field_name(lhs)?;
    let GormOperand::Value(value) = rhs else {
        return Err(Error::UnsupportedOperand("expected a value".to_string()));
    };
    Ok(SqlClause::new(
        format!("{} {} ?", field, symbol),
        vec![value.clone()],
    ))
}

fn like(operands: &[GormOperand], prefix: &str, postfix: &str) -> Result<SqlClause, Error> {
    let (lhs, rhs) = pair(operands)?;
    let field = field_name(lhs)?;
    let GormOperand::Value(Value::String(pattern)) = rhs else {
        return Err(Error::parsing("attempting to do a LIKE with a non-string value"));
    };
    Ok(SqlClause::new(
        format!("{}{}", field, LIKE),
        vec![Value::String(format!("{}{}{}", prefix, pattern, postfix))],
    ))
}

/// Splices NOT into the clause fragment after its first word; the argument
/// list is untouched.
fn insert_not(clause: &SqlClause) -> SqlClause {
    let rewritten = match clause.clause.split_once(' ') {
        Some((first, rest)) => format!("{} NOT {}", first, rest),
        None => format!("NOT {}", clause.clause),
    };
    SqlClause::new(rewritten, clause.args.clone())
}

//! In-memory record filtering.
//!
//! The evaluator walks the operation tree once per record. Field access goes
//! through serde reflection: each record serializes to a field-name → value
//! map, so `#[serde(rename)]` annotations behave exactly like column
//! renames. Per-record type mismatches yield `false` for that record rather
//! than aborting the whole filter — real-world data streams are rarely
//! uniform. Unknown fields still abort: a typo in the filter should not
//! silently select nothing.
//!
//! Arithmetic on decimal-shaped operands runs through `rust_decimal` so that
//! `Price add 2.45 eq 5.00` holds for records stored as exact decimals.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike};
use regex::Regex;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::ast::{Operand, Operation, SliceOperand, TokenKind};
use crate::backend::{Backend, Query};
use crate::error::Error;
use crate::value::Value;

pub struct MemoryBackend;

impl Backend for MemoryBackend {
    fn compile(&self, op: &Operation) -> Result<Query, Error> {
        Ok(Query::Evaluator(Evaluator { op: op.clone() }))
    }
}

/// A compiled filter that selects records from a slice.
#[derive(Debug, Clone)]
pub struct Evaluator {
    op: Operation,
}

impl Evaluator {
    /// Returns the records that pass the filter, in input order.
    pub fn filter_slice<T: Serialize + Clone>(&self, records: &[T]) -> Result<Vec<T>, Error> {
        let mut kept = Vec::new();
        for record in records {
            if self.matches(record)? {
                kept.push(record.clone());
            }
        }
        tracing::trace!(total = records.len(), kept = kept.len(), "filtered records");
        Ok(kept)
    }

    /// True when a single record passes the filter.
    pub fn matches<T: Serialize>(&self, record: &T) -> Result<bool, Error> {
        let fields = record_fields(record)?;
        RecordState { fields: &fields }.passes(&self.op)
    }
}

fn record_fields<T: Serialize>(record: &T) -> Result<HashMap<String, Value>, Error> {
    let json = serde_json::to_value(record).map_err(|_| Error::UnsupportedDataType)?;
    match Value::from(json) {
        Value::Object(map) => Ok(map),
        _ => Err(Error::UnsupportedDataType),
    }
}

/// Evaluation context for one record.
struct RecordState<'a> {
    fields: &'a HashMap<String, Value>,
}

impl RecordState<'_> {
    fn passes(&self, op: &Operation) -> Result<bool, Error> {
        let Some(kind) = op.operator.kind() else {
            // NoOp at a degenerate root selects everything.
            return Ok(true);
        };
        match kind {
            TokenKind::TokenTrue => Ok(true),
            TokenKind::TokenFalse => Ok(false),
            TokenKind::Equals
            | TokenKind::NotEquals
            | TokenKind::GreaterThan
            | TokenKind::GreaterThanOrEqual
            | TokenKind::LessThan
            | TokenKind::LessThanOrEqual
            | TokenKind::Contains
            | TokenKind::EndsWith
            | TokenKind::StartsWith
            | TokenKind::HasSubset
            | TokenKind::HasSubsequence
            | TokenKind::MatchesPattern => self.compare(kind, op),
            // Both sides evaluate eagerly; a sub-expression that does not
            // pass counts as an absent result.
            TokenKind::And => {
                let left = self.operand_passes(op, 0)?;
                let right = self.operand_passes(op, 1)?;
                Ok(left && right)
            }
            TokenKind::Or => {
                let left = self.operand_passes(op, 0)?;
                let right = self.operand_passes(op, 1)?;
                Ok(left || right)
            }
            TokenKind::In => self.member_of(op),
            TokenKind::Not => Ok(!self.operand_passes(op, 0)?),
            TokenKind::Length
            | TokenKind::Add
            | TokenKind::Subtract
            | TokenKind::Multiply
            | TokenKind::Divide
            | TokenKind::DivideFloat
            | TokenKind::Modulo
            | TokenKind::Concat
            | TokenKind::IndexOf
            | TokenKind::Substring
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
            | TokenKind::Round => {
                self.compute(op)?;
                Ok(true)
            }
            _ => Err(Error::UnknownOperator(op.operator)),
        }
    }

    fn operand_passes(&self, op: &Operation, index: usize) -> Result<bool, Error> {
        let operand = op
            .operands
            .get(index)
            .ok_or_else(|| Error::parsing("expected item before and after operator"))?;
        match operand {
            Operand::Operation(inner) => self.passes(inner),
            _ => Ok(true),
        }
    }

    fn compare(&self, kind: TokenKind, op: &Operation) -> Result<bool, Error> {
        let [lhs, rhs] = &op.operands[..] else {
            return Err(Error::parsing("expected item before and after operator"));
        };
        let left = self.left_value(lhs)?;
        let right = self.right_value(rhs)?;
        Ok(match kind {
            TokenKind::Equals => loose_eq(&left, &right),
            TokenKind::NotEquals => !loose_eq(&left, &right),
            TokenKind::GreaterThan => {
                compare_order(&left, &right) == Some(std::cmp::Ordering::Greater)
            }
            TokenKind::GreaterThanOrEqual => matches!(
                compare_order(&left, &right),
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
            TokenKind::LessThan => compare_order(&left, &right) == Some(std::cmp::Ordering::Less),
            TokenKind::LessThanOrEqual => matches!(
                compare_order(&left, &right),
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            TokenKind::Contains => string_pair(&left, &right)
                .map(|(a, b)| a.contains(b))
                .unwrap_or(false),
            TokenKind::StartsWith => string_pair(&left, &right)
                .map(|(a, b)| a.starts_with(b))
                .unwrap_or(false),
            TokenKind::EndsWith => string_pair(&left, &right)
                .map(|(a, b)| a.ends_with(b))
                .unwrap_or(false),
            TokenKind::MatchesPattern => string_pair(&left, &right)
                .map(|(a, b)| Regex::new(b).map(|re| re.is_match(a)).unwrap_or(false))
                .unwrap_or(false),
            TokenKind::HasSubset => array_pair(&left, &right)
                .map(|(a, b)| b.iter().all(|needle| a.iter().any(|v| loose_eq(v, needle))))
                .unwrap_or(false),
            TokenKind::HasSubsequence => array_pair(&left, &right)
                .map(|(a, b)| has_subsequence(a, b))
                .unwrap_or(false),
            _ => false,
        })
    }

    fn member_of(&self, op: &Operation) -> Result<bool, Error> {
        let [lhs, rhs] = &op.operands[..] else {
            return Err(Error::parsing("expected item before and after operator"));
        };
        let Operand::Token(token) = lhs else {
            return Err(Error::UnsupportedDataType);
        };
        let Value::String(name) = token.get_data()? else {
            return Err(Error::UnsupportedDataType);
        };
        let field = self
            .fields
            .get(&name)
            .ok_or(Error::UnknownField(name))?;
        let Operand::Slice(slice) = rhs else {
            return Err(Error::UnsupportedDataType);
        };
        let values = self.slice_values(slice)?;
        Ok(values.iter().any(|v| loose_eq(v, field)))
    }

    /// Left side of a comparison: a computed sub-expression or a field
    /// reference.
    fn left_value(&self, operand: &Operand) -> Result<Value, Error> {
        match operand {
            Operand::Operation(inner) => self.compute(inner),
            Operand::Token(token) => match token.get_data()? {
                Value::String(name) => self
                    .fields
                    .get(&name)
                    .cloned()
                    .ok_or(Error::UnknownField(name)),
                _ => Err(Error::UnsupportedDataType),
            },
            Operand::Slice(slice) => Ok(Value::Array(self.slice_values(slice)?)),
            Operand::Object(_) => Err(Error::UnsupportedDataType),
        }
    }

    /// Right side of a comparison: literals stand as themselves, but a
    /// string that names a record field resolves to that field's value
    /// (`trim(Name) eq Name`).
    fn right_value(&self, operand: &Operand) -> Result<Value, Error> {
        match operand {
            Operand::Operation(inner) => self.compute(inner),
            Operand::Token(token) => {
                let value = token.get_data()?;
                if let Value::String(name) = &value {
                    if let Some(field) = self.fields.get(name) {
                        return Ok(field.clone());
                    }
                }
                Ok(value)
            }
            Operand::Slice(slice) => Ok(Value::Array(self.slice_values(slice)?)),
            Operand::Object(object) => object.get_data(),
        }
    }

    fn slice_values(&self, slice: &SliceOperand) -> Result<Vec<Value>, Error> {
        slice
            .items
            .iter()
            .map(|item| match item {
                Operand::Token(token) => token.get_data(),
                Operand::Slice(nested) => self.slice_values(nested).map(Value::Array),
                Operand::Object(object) => object.get_data(),
                Operand::Operation(_) => {
                    Err(Error::UnsupportedOperand("operation in list".to_string()))
                }
            })
            .collect()
    }

    /// Evaluates a computed operation (`length`, arithmetic, string and date
    /// functions) for this record.
    fn compute(&self, op: &Operation) -> Result<Value, Error> {
        let Some(kind) = op.operator.kind() else {
            return Err(Error::UnknownOperator(op.operator));
        };
        let base = match op.operands.first() {
            Some(Operand::Operation(inner)) => self.compute(inner)?,
            Some(Operand::Token(token)) => match token.get_data()? {
                Value::String(name) => self
                    .fields
                    .get(&name)
                    .cloned()
                    .ok_or(Error::UnknownField(name))?,
                _ => return Err(Error::UnsupportedDataType),
            },
            Some(Operand::Slice(slice)) => Value::Array(self.slice_values(slice)?),
            Some(Operand::Object(_)) => return Err(Error::UnsupportedDataType),
            None => {
                return Err(Error::parsing(
                    "computed operations require at least one operand",
                ))
            }
        };
        match kind {
            TokenKind::Length => Ok(match base {
                Value::String(s) => Value::Integer(s.len() as i64),
                _ => Value::Integer(0),
            }),
            TokenKind::Add | TokenKind::Subtract | TokenKind::Multiply | TokenKind::Divide => {
                let arg = self.arg_value(op, 1)?;
                Ok(arithmetic(kind, &base, &arg))
            }
            TokenKind::DivideFloat => {
                let arg = self.arg_value(op, 1)?;
                let quotient = as_decimal(&base)
                    .checked_div(as_decimal(&arg))
                    .unwrap_or_default();
                Ok(Value::Float(quotient.to_f64().unwrap_or(0.0)))
            }
            TokenKind::Modulo => {
                let arg = self.arg_value(op, 1)?;
                Ok(match base {
                    Value::Integer(n) => {
                        Value::Integer(n.checked_rem(as_integer(&arg)).unwrap_or(0))
                    }
                    _ => Value::Integer(0),
                })
            }
            TokenKind::Concat => Ok(match base {
                Value::String(s) => Value::String(s + &self.string_arg(op, 1)?),
                _ => Value::Integer(0),
            }),
            TokenKind::IndexOf => Ok(match base {
                Value::String(s) => {
                    let needle = self.string_arg(op, 1)?;
                    Value::Integer(s.find(&needle).map(|i| i as i64).unwrap_or(-1))
                }
                _ => Value::Integer(0),
            }),
            TokenKind::Substring => Ok(match base {
                Value::String(s) => Value::String(self.substring(&s, op)?),
                _ => Value::Integer(0),
            }),
            TokenKind::ToLower => Ok(match base {
                Value::String(s) => Value::String(s.to_lowercase()),
                _ => Value::Integer(0),
            }),
            TokenKind::ToUpper => Ok(match base {
                Value::String(s) => Value::String(s.to_uppercase()),
                _ => Value::Integer(0),
            }),
            TokenKind::Trim => Ok(match base {
                Value::String(s) => Value::String(s.trim().to_string()),
                _ => Value::Integer(0),
            }),
            TokenKind::Day
            | TokenKind::FractionalSeconds
            | TokenKind::Hour
            | TokenKind::Minute
            | TokenKind::Month
            | TokenKind::Second
            | TokenKind::Year => Ok(date_component(kind, &base)),
            TokenKind::Ceiling => Ok(rounded(&base, |d| d.ceil())),
            TokenKind::Floor => Ok(rounded(&base, |d| d.floor())),
            TokenKind::Round => Ok(rounded(&base, |d| {
                d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            })),
            _ => Err(Error::UnknownOperator(op.operator)),
        }
    }

    /// Additional arguments to computed operations are literals or nested
    /// computations; they do not resolve through record fields.
    fn arg_value(&self, op: &Operation, index: usize) -> Result<Value, Error> {
        let operand = op.operands.get(index).ok_or_else(|| {
            Error::parsing("computed operation requires an additional operand")
        })?;
        match operand {
            Operand::Token(token) => token.get_data(),
            Operand::Operation(inner) => self.compute(inner),
            _ => Err(Error::UnsupportedDataType),
        }
    }

    /// String arguments do resolve through record fields when they name one
    /// (`concat(City,', ')` with `City` a column).
    fn string_arg(&self, op: &Operation, index: usize) -> Result<String, Error> {
        let value = self.arg_value(op, index)?;
        let resolved = match &value {
            Value::String(name) => self.fields.get(name).cloned(),
            _ => None,
        };
        Ok(match resolved.unwrap_or(value) {
            Value::String(s) => s,
            _ => String::new(),
        })
    }

    fn substring(&self, s: &str, op: &Operation) -> Result<String, Error> {
        let start = (as_integer(&self.arg_value(op, 1)?)).max(0) as usize;
        let start = start.min(s.len());
        let end = match op.operands.get(2) {
            Some(_) => {
                let len = (as_integer(&self.arg_value(op, 2)?)).max(0) as usize;
                (start + len).min(s.len())
            }
            None => s.len(),
        };
        Ok(s.get(start..end).unwrap_or_default().to_string())
    }
}

fn string_pair<'a>(a: &'a Value, b: &'a Value) -> Option<(&'a str, &'a str)> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some((a, b)),
        _ => None,
    }
}

fn array_pair<'a>(a: &'a Value, b: &'a Value) -> Option<(&'a [Value], &'a [Value])> {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => Some((a, b)),
        _ => None,
    }
}

/// Equality with int↔float coercion. `null` compares equal only to `null`.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            a.as_float() == b.as_float()
        }
        _ => a == b,
    }
}

/// Ordering for relational comparisons: numeric with coercion, strings
/// lexicographic, everything else incomparable.
fn compare_order(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            a.as_float()?.partial_cmp(&b.as_float()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn has_subsequence(a: &[Value], b: &[Value]) -> bool {
    if b.is_empty() {
        return true;
    }
    if b.len() > a.len() {
        return false;
    }
    for i in 0..a.len() {
        if loose_eq(&a[i], &b[0]) {
            if b.len() == 1 {
                return true;
            }
            if i + 1 < a.len() && has_subsequence(&a[i + 1..], &b[1..]) {
                return true;
            }
        }
    }
    false
}

fn as_integer(value: &Value) -> i64 {
    match value {
        Value::Integer(n) => *n,
        Value::Float(n) => *n as i64,
        _ => 0,
    }
}

fn as_decimal(value: &Value) -> Decimal {
    match value {
        Value::Integer(n) => Decimal::from_i64(*n).unwrap_or_default(),
        Value::Float(n) => Decimal::from_f64(*n).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

/// `add`/`sub`/`mul`/`div`. Two integers stay in integer arithmetic (`div`
/// truncates); anything involving a float goes through decimals to avoid
/// binary rounding drift.
fn arithmetic(kind: TokenKind, base: &Value, arg: &Value) -> Value {
    match (base, arg) {
        (Value::Integer(a), Value::Integer(b)) => Value::Integer(match kind {
            TokenKind::Add => a.wrapping_add(*b),
            TokenKind::Subtract => a.wrapping_sub(*b),
            TokenKind::Multiply => a.wrapping_mul(*b),
            TokenKind::Divide => a.checked_div(*b).unwrap_or(0),
            _ => 0,
        }),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let a = as_decimal(base);
            let b = as_decimal(arg);
            let result = match kind {
                TokenKind::Add => a.checked_add(b),
                TokenKind::Subtract => a.checked_sub(b),
                TokenKind::Multiply => a.checked_mul(b),
                TokenKind::Divide => a.checked_div(b),
                _ => None,
            };
            Value::Float(result.unwrap_or_default().to_f64().unwrap_or(0.0))
        }
        _ => Value::Integer(0),
    }
}

fn date_component(kind: TokenKind, value: &Value) -> Value {
    let Value::String(text) = value else {
        return Value::Integer(0);
    };
    let Ok(timestamp) = DateTime::parse_from_rfc3339(text) else {
        return Value::Integer(0);
    };
    match kind {
        TokenKind::Day => Value::Integer(timestamp.day() as i64),
        TokenKind::Hour => Value::Integer(timestamp.hour() as i64),
        TokenKind::Minute => Value::Integer(timestamp.minute() as i64),
        TokenKind::Month => Value::Integer(timestamp.month() as i64),
        TokenKind::Second => Value::Integer(timestamp.second() as i64),
        TokenKind::Year => Value::Integer(timestamp.year() as i64),
        TokenKind::FractionalSeconds => {
            Value::Float(timestamp.nanosecond() as f64 / 1_000_000.0)
        }
        _ => Value::Integer(0),
    }
}

fn rounded(value: &Value, f: impl Fn(&Decimal) -> Decimal) -> Value {
    match value {
        Value::Float(n) => {
            let d = Decimal::from_f64(*n).unwrap_or_default();
            Value::Float(f(&d).to_f64().unwrap_or(0.0))
        }
        Value::Integer(n) => Value::Integer(*n),
        _ => Value::Integer(0),
    }
}

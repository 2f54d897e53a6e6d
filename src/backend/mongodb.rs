//! MongoDB query-document lowering.
//!
//! Produces an ordered [`bson::Document`]. Comparisons nest the operator
//! under the field key (`{"Name":{"$eq":"Milk"}}`), combinators collect
//! sub-documents under `$and`/`$or`, string functions become `$regex`
//! patterns, and `length` emits an `$expr` with `$strLenCP`. A hex string
//! compared against `_id` converts to an object id.

use bson::oid::ObjectId;
use bson::{Bson, Document};

use crate::ast::{Operand, Operation, TokenKind};
use crate::backend::{Backend, Query};
use crate::error::Error;
use crate::value::Value;

pub struct MongoBackend;

enum MongoOperand {
    /// A literal value (string, number, object literal, list, object id).
    Value(Bson),
    /// A compiled sub-query document.
    Doc(Document),
}

impl MongoOperand {
    fn as_bson(&self) -> Bson {
        match self {
            MongoOperand::Value(value) => value.clone(),
            MongoOperand::Doc(doc) => Bson::Document(doc.clone()),
        }
    }
}

impl MongoBackend {
    fn lower(&self, op: &Operation) -> Result<Document, Error> {
        let mut operands = op
            .operands
            .iter()
            .map(|operand| self.lower_operand(operand))
            .collect::<Result<Vec<_>, _>>()?;
        convert_object_id(&mut operands)?;
        let Some(kind) = op.operator.kind() else {
            return Err(Error::UnknownOperator(op.operator));
        };
        match kind {
            TokenKind::TokenTrue => Ok(Document::new()),
            TokenKind::TokenFalse => {
                // Real _id values are never strings, so this matches nothing.
                let mut probe = Document::new();
                probe.insert("$type", "string");
                Ok(wrap("_id", probe))
            }
            TokenKind::Equals => simple_op("$eq", &operands),
            TokenKind::NotEquals => simple_op("$ne", &operands),
            TokenKind::GreaterThan => simple_op("$gt", &operands),
            TokenKind::GreaterThanOrEqual => simple_op("$gte", &operands),
            TokenKind::LessThan => simple_op("$lt", &operands),
            TokenKind::LessThanOrEqual => simple_op("$lte", &operands),
            TokenKind::And => combine("$and", &operands),
            TokenKind::Or => combine("$or", &operands),
            TokenKind::In => array_op("$in", &operands),
            TokenKind::HasSubset => array_op("$all", &operands),
            TokenKind::Contains => regex_op("", "", &operands),
            TokenKind::StartsWith => regex_op("^", "", &operands),
            TokenKind::EndsWith => regex_op("", "$", &operands),
            TokenKind::Not => {
                let Some(MongoOperand::Doc(child)) = operands.first() else {
                    return Err(Error::parsing(
                        "attempting to do a not on a non-document field",
                    ));
                };
                let (key, value) = child
                    .iter()
                    .next()
                    .ok_or_else(|| Error::parsing("empty document under not"))?;
                let mut negated = Document::new();
                negated.insert("$not", value.clone());
                Ok(wrap(key, negated))
            }
            TokenKind::Length => {
                let Some(MongoOperand::Value(Bson::String(field))) = operands.first() else {
                    return Err(Error::parsing(
                        "attempting to do a length on a non-string field",
                    ));
                };
                let mut strlen = Document::new();
                strlen.insert("$strLenCP", format!("${}", field));
                let mut expr = Document::new();
                expr.insert("$expr", Bson::Array(vec![Bson::Document(strlen)]));
                Ok(expr)
            }
            _ => Err(Error::UnknownOperator(op.operator)),
        }
    }

    fn lower_operand(&self, operand: &Operand) -> Result<MongoOperand, Error> {
        match operand {
            Operand::Token(token) => match token.get_data()? {
                value @ (Value::String(_) | Value::Integer(_) | Value::Float(_)) => {
                    Ok(MongoOperand::Value(to_bson(&value)))
                }
                other => Err(Error::UnsupportedOperand(format!("{:?}", other))),
            },
            Operand::Operation(inner) => Ok(MongoOperand::Doc(self.lower(inner)?)),
            Operand::Object(object) => Ok(MongoOperand::Value(to_bson(&object.get_data()?))),
            Operand::Slice(slice) => {
                let items = slice
                    .items
                    .iter()
                    .map(|item| self.lower_operand(item).map(|o| o.as_bson()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MongoOperand::Value(Bson::Array(items)))
            }
        }
    }
}

impl Backend for MongoBackend {
    fn compile(&self, op: &Operation) -> Result<Query, Error> {
        self.lower(op).map(Query::Document)
    }
}

/// `_id eq <hex>` carries the id as an unquoted string; convert it to a real
/// object id before building the document.
fn convert_object_id(operands: &mut [MongoOperand]) -> Result<(), Error> {
    if operands.len() < 2 {
        return Ok(());
    }
    let is_id_field = matches!(&operands[0], MongoOperand::Value(Bson::String(f)) if f == "_id");
    if !is_id_field {
        return Ok(());
    }
    if let MongoOperand::Value(Bson::String(hex)) = &operands[1] {
        let oid = ObjectId::parse_str(hex)
            .map_err(|e| Error::parsing(format!("invalid object id: {}", e)))?;
        operands[1] = MongoOperand::Value(Bson::ObjectId(oid));
    }
    Ok(())
}

fn wrap(key: &str, value: impl Into<Bson>) -> Document {
    let mut doc = Document::new();
    doc.insert(key, value.into());
    doc
}

fn simple_op(key: &str, operands: &[MongoOperand]) -> Result<Document, Error> {
    let [lhs, rhs, ..] = operands else {
        return Err(Error::parsing("expected item before and after operator"));
    };
    match lhs {
        MongoOperand::Value(Bson::String(field)) => {
            Ok(wrap(field, wrap(key, rhs.as_bson())))
        }
        // The $expr case: append the comparison value to the expression's
        // argument array as a decimal literal.
        MongoOperand::Doc(doc) => {
            let (expr_key, expr_value) = doc
                .iter()
                .next()
                .ok_or_else(|| Error::parsing("empty expression document"))?;
            let Bson::Array(args) = expr_value else {
                return Err(Error::parsing(
                    "attempting to compare an expression that is not in argument form",
                ));
            };
            let MongoOperand::Value(Bson::Int64(n)) = rhs else {
                return Err(Error::parsing(
                    "attempting to compare an expression with a non-integer value",
                ));
            };
            let mut args = args.clone();
            args.push(Bson::Document(wrap("$numberDecimal", n.to_string())));
            Ok(wrap(expr_key, wrap(key, Bson::Array(args))))
        }
        _ => Err(Error::parsing("attempting to compare an unknown field")),
    }
}

fn combine(key: &str, operands: &[MongoOperand]) -> Result<Document, Error> {
    let docs = operands.iter().map(|o| o.as_bson()).collect::<Vec<_>>();
    Ok(wrap(key, Bson::Array(docs)))
}

fn array_op(key: &str, operands: &[MongoOperand]) -> Result<Document, Error> {
    let [lhs, rhs, ..] = operands else {
        return Err(Error::parsing("expected item before and after operator"));
    };
    let MongoOperand::Value(Bson::String(field)) = lhs else {
        return Err(Error::parsing("attempting to do an array op on a non-string field"));
    };
    let MongoOperand::Value(list @ Bson::Array(_)) = rhs else {
        return Err(Error::parsing("attempting to do an array op on a non-array value"));
    };
    Ok(wrap(field, wrap(key, list.clone())))
}

fn regex_op(prefix: &str, postfix: &str, operands: &[MongoOperand]) -> Result<Document, Error> {
    let [lhs, rhs, ..] = operands else {
        return Err(Error::parsing("expected item before and after operator"));
    };
    let MongoOperand::Value(Bson::String(field)) = lhs else {
        return Err(Error::parsing("attempting to do a regex on a non-string field"));
    };
    let MongoOperand::Value(Bson::String(pattern)) = rhs else {
        return Err(Error::parsing("attempting to do a regex with a non-string value"));
    };
    Ok(wrap(
        field,
        wrap("$regex", format!("{}{}{}", prefix, pattern, postfix)),
    ))
}

/// Values convert with order-preserving documents; object-literal maps are
/// inserted in sorted key order for deterministic output.
fn to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Boolean(b) => Bson::Boolean(*b),
        Value::Integer(n) => Bson::Int64(*n),
        Value::Float(n) => Bson::Double(*n),
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(to_bson).collect()),
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let mut doc = Document::new();
            for key in keys {
                doc.insert(key.clone(), to_bson(&map[key]));
            }
            Bson::Document(doc)
        }
    }
}

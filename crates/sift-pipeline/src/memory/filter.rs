use bson::{Bson, Document};
use regex::Regex;

use super::error::MemoryError;
use super::value::{compare_values, resolve_path, values_equal};

/// A `$match` filter, parsed once per stage.
#[derive(Debug, Clone)]
pub(crate) enum Expression {
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Eq(String, Bson),
    Ne(String, Bson),
    Gt(String, Bson),
    Gte(String, Bson),
    Lt(String, Bson),
    Lte(String, Bson),
    In(String, Vec<Bson>),
    Regex(String, Regex),
    Exists(String, bool),
}

/// Parse a filter document into an [`Expression`] tree.
///
/// Follows MongoDB query semantics:
/// - the top-level document is an implicit AND of its entries
/// - `{ "field": value }` is an implicit `$eq`
/// - `{ "field": { "$gt": v } }` uses operator sub-documents
/// - `{ "$or": [...] }` / `{ "$and": [...] }` for explicit logical ops
/// - `{ "field": { "$regex": "pattern", "$options": "i" } }` for regex
///
/// An empty document matches everything.
pub(crate) fn parse_filter(doc: &Document) -> Result<Expression, MemoryError> {
    let mut children = Vec::with_capacity(doc.len());

    for (key, value) in doc {
        match key.as_str() {
            "$and" => children.push(parse_logical_array(value, Expression::And)?),
            "$or" => children.push(parse_logical_array(value, Expression::Or)?),
            k if k.starts_with('$') => {
                return Err(MemoryError::InvalidFilter(format!(
                    "unknown top-level operator: {k}"
                )));
            }
            _ => children.push(parse_field_condition(key, value)?),
        }
    }

    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return Ok(only);
        }
    }
    Ok(Expression::And(children))
}

fn parse_logical_array(
    value: &Bson,
    make: fn(Vec<Expression>) -> Expression,
) -> Result<Expression, MemoryError> {
    let Bson::Array(items) = value else {
        return Err(MemoryError::InvalidFilter(
            "$and/$or value must be an array".into(),
        ));
    };
    if items.is_empty() {
        return Err(MemoryError::InvalidFilter(
            "$and/$or array must not be empty".into(),
        ));
    }

    let children = items
        .iter()
        .map(|item| match item {
            Bson::Document(sub) => parse_filter(sub),
            _ => Err(MemoryError::InvalidFilter(
                "$and/$or array elements must be documents".into(),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(make(children))
}

/// Either an implicit `$eq` or an operator sub-document.
fn parse_field_condition(field: &str, value: &Bson) -> Result<Expression, MemoryError> {
    if let Bson::Document(sub) = value {
        if sub.keys().next().is_some_and(|k| k.starts_with('$')) {
            return parse_operator_doc(field, sub);
        }
    }
    Ok(Expression::Eq(field.to_string(), value.clone()))
}

/// Parse an operator sub-document like `{ "$gt": 21, "$lte": 100 }`.
fn parse_operator_doc(field: &str, doc: &Document) -> Result<Expression, MemoryError> {
    if doc.contains_key("$regex") {
        return parse_regex(field, doc);
    }

    let mut conditions = Vec::with_capacity(doc.len());
    for (op, operand) in doc {
        let field = field.to_string();
        let expr = match op.as_str() {
            "$eq" => Expression::Eq(field, operand.clone()),
            "$ne" => Expression::Ne(field, operand.clone()),
            "$gt" => Expression::Gt(field, operand.clone()),
            "$gte" => Expression::Gte(field, operand.clone()),
            "$lt" => Expression::Lt(field, operand.clone()),
            "$lte" => Expression::Lte(field, operand.clone()),
            "$in" => match operand {
                Bson::Array(values) => Expression::In(field, values.clone()),
                _ => return Err(MemoryError::InvalidFilter("$in value must be an array".into())),
            },
            "$exists" => match operand {
                Bson::Boolean(b) => Expression::Exists(field, *b),
                _ => {
                    return Err(MemoryError::InvalidFilter(
                        "$exists value must be a boolean".into(),
                    ));
                }
            },
            "$options" => {
                return Err(MemoryError::InvalidFilter("$options without $regex".into()));
            }
            k => {
                return Err(MemoryError::InvalidFilter(format!(
                    "unknown field operator: {k}"
                )));
            }
        };
        conditions.push(expr);
    }

    match conditions.len() {
        1 => Ok(conditions.remove(0)),
        _ => Ok(Expression::And(conditions)),
    }
}

/// `$regex` plus an optional `$options` sibling.
fn parse_regex(field: &str, doc: &Document) -> Result<Expression, MemoryError> {
    let mut pattern: Option<&str> = None;
    let mut options: Option<&str> = None;

    for (key, value) in doc {
        match (key.as_str(), value) {
            ("$regex", Bson::String(s)) => pattern = Some(s.as_str()),
            ("$regex", Bson::RegularExpression(re)) => {
                pattern = Some(re.pattern.as_str());
                if options.is_none() && !re.options.as_str().is_empty() {
                    options = Some(re.options.as_str());
                }
            }
            ("$options", Bson::String(s)) => options = Some(s.as_str()),
            ("$regex", _) => {
                return Err(MemoryError::InvalidFilter("$regex value must be a string".into()));
            }
            ("$options", _) => {
                return Err(MemoryError::InvalidFilter(
                    "$options value must be a string".into(),
                ));
            }
            (k, _) => {
                return Err(MemoryError::InvalidFilter(format!(
                    "unexpected key alongside $regex: {k}"
                )));
            }
        }
    }

    let pattern = pattern.ok_or_else(|| MemoryError::InvalidFilter("missing $regex pattern".into()))?;

    let full_pattern = match options {
        Some(opts) if !opts.is_empty() => {
            let mut prefix = String::with_capacity(4 + opts.len() + pattern.len());
            prefix.push_str("(?");
            for ch in opts.chars() {
                match ch {
                    'i' | 's' | 'm' | 'x' => prefix.push(ch),
                    c => {
                        return Err(MemoryError::InvalidFilter(format!(
                            "unknown regex option: {c}"
                        )));
                    }
                }
            }
            prefix.push(')');
            prefix.push_str(pattern);
            prefix
        }
        _ => pattern.to_string(),
    };

    let re = Regex::new(&full_pattern)
        .map_err(|e| MemoryError::InvalidFilter(format!("invalid regex pattern: {e}")))?;
    Ok(Expression::Regex(field.to_string(), re))
}

/// Evaluate whether a document matches the expression.
///
/// A field holding an array matches when any element does, as in MongoDB.
pub(crate) fn matches(doc: &Document, expr: &Expression) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|c| matches(doc, c)),
        Expression::Or(children) => children.iter().any(|c| matches(doc, c)),
        Expression::Eq(field, expected) => field_eq(doc, field, expected),
        Expression::Ne(field, expected) => !field_eq(doc, field, expected),
        Expression::In(field, candidates) => candidates.iter().any(|c| field_eq(doc, field, c)),
        Expression::Gt(field, bound)
        | Expression::Gte(field, bound)
        | Expression::Lt(field, bound)
        | Expression::Lte(field, bound) => {
            let predicate: fn(std::cmp::Ordering) -> bool = match expr {
                Expression::Gt(..) => |o| o.is_gt(),
                Expression::Gte(..) => |o| o.is_ge(),
                Expression::Lt(..) => |o| o.is_lt(),
                _ => |o| o.is_le(),
            };
            any_value(doc, field, |v| compare_values(v, bound).is_some_and(predicate))
        }
        Expression::Regex(field, re) => any_value(doc, field, |v| match v {
            Bson::String(s) => re.is_match(s),
            _ => false,
        }),
        Expression::Exists(field, expected) => resolve_path(doc, field).is_some() == *expected,
    }
}

/// `$eq: null` matches both missing fields and explicit nulls.
fn field_eq(doc: &Document, field: &str, expected: &Bson) -> bool {
    match resolve_path(doc, field) {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(&value, expected),
    }
}

fn any_value(doc: &Document, field: &str, test: impl Fn(&Bson) -> bool) -> bool {
    match resolve_path(doc, field) {
        Some(Bson::Array(items)) => items.iter().any(&test),
        Some(value) => test(&value),
        None => false,
    }
}

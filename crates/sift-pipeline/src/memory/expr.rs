use bson::{Bson, Document};

use super::error::MemoryError;
use super::value::resolve_path;

/// Evaluate an aggregation expression against a document.
///
/// `"$path"` reads a field, `{ "$op": args }` applies an operator, nested
/// documents and arrays are evaluated element-wise, anything else is a
/// literal. `None` means the result is missing.
pub(crate) fn evaluate(expr: &Bson, doc: &Document) -> Result<Option<Bson>, MemoryError> {
    match expr {
        Bson::String(s) => match s.strip_prefix('$') {
            Some(path) => Ok(resolve_path(doc, path)),
            None => Ok(Some(expr.clone())),
        },
        Bson::Document(spec) => match single_operator(spec) {
            Some((op, args)) => evaluate_operator(op, args, doc),
            None => {
                let mut out = Document::new();
                for (key, value) in spec {
                    if let Some(v) = evaluate(value, doc)? {
                        out.insert(key.clone(), v);
                    }
                }
                Ok(Some(Bson::Document(out)))
            }
        },
        Bson::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evaluate(item, doc)?.unwrap_or(Bson::Null));
            }
            Ok(Some(Bson::Array(out)))
        }
        literal => Ok(Some(literal.clone())),
    }
}

fn single_operator(spec: &Document) -> Option<(&str, &Bson)> {
    let mut iter = spec.iter();
    let (key, value) = iter.next()?;
    (key.starts_with('$') && iter.next().is_none()).then_some((key.as_str(), value))
}

fn evaluate_operator(op: &str, args: &Bson, doc: &Document) -> Result<Option<Bson>, MemoryError> {
    match op {
        "$literal" => Ok(Some(args.clone())),
        "$arrayElemAt" => {
            let [array, index] = two_args(op, args)?;
            let array = match evaluate(array, doc)? {
                Some(Bson::Array(items)) => items,
                None | Some(Bson::Null) => return Ok(None),
                Some(_) => {
                    return Err(MemoryError::InvalidPipeline(
                        "$arrayElemAt first argument must be an array".into(),
                    ));
                }
            };
            let index = match evaluate(index, doc)? {
                Some(Bson::Int32(n)) => i64::from(n),
                Some(Bson::Int64(n)) => n,
                _ => {
                    return Err(MemoryError::InvalidPipeline(
                        "$arrayElemAt index must be an integer".into(),
                    ));
                }
            };
            let len = i64::try_from(array.len()).unwrap_or(i64::MAX);
            let position = if index < 0 { len + index } else { index };
            Ok(usize::try_from(position)
                .ok()
                .and_then(|p| array.into_iter().nth(p)))
        }
        "$ifNull" => {
            let Bson::Array(candidates) = args else {
                return Err(MemoryError::InvalidPipeline(
                    "$ifNull expects an array".into(),
                ));
            };
            let Some((fallback, leading)) = candidates.split_last() else {
                return Err(MemoryError::InvalidPipeline(
                    "$ifNull needs at least one argument".into(),
                ));
            };
            for candidate in leading {
                match evaluate(candidate, doc)? {
                    None | Some(Bson::Null) => continue,
                    found => return Ok(found),
                }
            }
            evaluate(fallback, doc)
        }
        other => Err(MemoryError::InvalidPipeline(format!(
            "unsupported expression operator: {other}"
        ))),
    }
}

fn two_args<'a>(op: &str, args: &'a Bson) -> Result<[&'a Bson; 2], MemoryError> {
    match args {
        Bson::Array(items) if items.len() == 2 => Ok([&items[0], &items[1]]),
        _ => Err(MemoryError::InvalidPipeline(format!(
            "{op} expects two arguments"
        ))),
    }
}

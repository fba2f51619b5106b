use std::cmp::Ordering;
use std::collections::HashMap;

use bson::{Bson, Document};

use super::error::MemoryError;
use super::expr::evaluate;
use super::filter::{matches, parse_filter};
use super::value::{as_count, remove_path, resolve_path, set_path, sort_cmp, values_equal};

/// Point-in-time view of every collection, used by `$lookup`.
pub(crate) type Snapshot = HashMap<String, imbl::Vector<Document>>;

/// Run `pipeline` over `docs`, one stage at a time.
pub(crate) fn run_pipeline(
    mut docs: Vec<Document>,
    pipeline: &[Document],
    snapshot: &Snapshot,
) -> Result<Vec<Document>, MemoryError> {
    for stage in pipeline {
        let (name, args) = split_stage(stage)?;
        docs = match name {
            "$match" => match_docs(docs, as_document(name, args)?)?,
            "$sort" => sort_docs(docs, as_document(name, args)?)?,
            "$project" => project_docs(docs, as_document(name, args)?)?,
            "$addFields" | "$set" => add_fields(docs, as_document(name, args)?)?,
            "$skip" => {
                let n = count_arg(name, args)?;
                docs.into_iter().skip(n).collect()
            }
            "$limit" => {
                let n = count_arg(name, args)?;
                docs.truncate(n);
                docs
            }
            "$count" => count_docs(docs, args)?,
            "$facet" => facet(docs, as_document(name, args)?, snapshot)?,
            "$lookup" => lookup(docs, as_document(name, args)?, snapshot)?,
            "$unwind" => unwind(docs, args)?,
            other => return Err(MemoryError::UnknownStage(other.to_string())),
        };
    }
    Ok(docs)
}

fn split_stage(stage: &Document) -> Result<(&str, &Bson), MemoryError> {
    let mut iter = stage.iter();
    match (iter.next(), iter.next()) {
        (Some((name, args)), None) => Ok((name.as_str(), args)),
        _ => Err(MemoryError::InvalidPipeline(
            "a stage must have exactly one field".into(),
        )),
    }
}

fn as_document<'a>(stage: &str, args: &'a Bson) -> Result<&'a Document, MemoryError> {
    match args {
        Bson::Document(doc) => Ok(doc),
        _ => Err(MemoryError::InvalidPipeline(format!(
            "{stage} expects a document"
        ))),
    }
}

fn count_arg(stage: &str, args: &Bson) -> Result<usize, MemoryError> {
    as_count(args).ok_or_else(|| {
        MemoryError::InvalidPipeline(format!("{stage} expects a non-negative integer"))
    })
}

fn match_docs(docs: Vec<Document>, filter: &Document) -> Result<Vec<Document>, MemoryError> {
    let expr = parse_filter(filter)?;
    Ok(docs.into_iter().filter(|doc| matches(doc, &expr)).collect())
}

fn sort_docs(docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, MemoryError> {
    let mut keys = Vec::with_capacity(spec.len());
    for (field, direction) in spec {
        let descending = match direction {
            Bson::Int32(1) | Bson::Int64(1) => false,
            Bson::Int32(-1) | Bson::Int64(-1) => true,
            Bson::Double(d) if *d == 1.0 => false,
            Bson::Double(d) if *d == -1.0 => true,
            _ => {
                return Err(MemoryError::InvalidPipeline(format!(
                    "$sort direction for {field} must be 1 or -1"
                )));
            }
        };
        keys.push((field.as_str(), descending));
    }

    // Resolve sort keys once instead of on every comparison.
    let mut decorated: Vec<(Vec<Option<Bson>>, Document)> = docs
        .into_iter()
        .map(|doc| {
            let values = keys.iter().map(|(field, _)| resolve_path(&doc, field)).collect();
            (values, doc)
        })
        .collect();

    decorated.sort_by(|(a, _), (b, _)| {
        for (i, (_, descending)) in keys.iter().enumerate() {
            let ord = sort_cmp(a[i].as_ref(), b[i].as_ref());
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    Ok(decorated.into_iter().map(|(_, doc)| doc).collect())
}

enum Projection<'a> {
    Include,
    Exclude,
    Computed(&'a Bson),
}

fn projection_kind(value: &Bson) -> Projection<'_> {
    match value {
        Bson::Boolean(true) => Projection::Include,
        Bson::Boolean(false) => Projection::Exclude,
        Bson::Int32(0) | Bson::Int64(0) => Projection::Exclude,
        Bson::Double(d) if *d == 0.0 => Projection::Exclude,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Projection::Include,
        other => Projection::Computed(other),
    }
}

fn project_docs(docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, MemoryError> {
    let mut keep_id = true;
    let mut excluded = Vec::new();
    let mut included = Vec::new();

    for (field, value) in spec {
        match (field.as_str(), projection_kind(value)) {
            ("_id", Projection::Exclude) => keep_id = false,
            ("_id", Projection::Include) => {}
            (_, Projection::Exclude) => excluded.push(field.as_str()),
            (_, kind) => included.push((field.as_str(), kind)),
        }
    }

    if !excluded.is_empty() && !included.is_empty() {
        return Err(MemoryError::InvalidPipeline(
            "$project cannot mix inclusion and exclusion".into(),
        ));
    }

    // Exclusion mode, including the `{ _id: 0 }` only case.
    if included.is_empty() {
        return Ok(docs
            .into_iter()
            .map(|mut doc| {
                for field in &excluded {
                    remove_path(&mut doc, field);
                }
                if !keep_id {
                    doc.remove("_id");
                }
                doc
            })
            .collect());
    }

    docs.into_iter()
        .map(|doc| {
            let mut out = Document::new();
            if keep_id {
                if let Some(id) = doc.get("_id") {
                    out.insert("_id", id.clone());
                }
            }
            for (field, kind) in &included {
                let value = match kind {
                    Projection::Computed(expr) => evaluate(expr, &doc)?,
                    _ => resolve_path(&doc, field),
                };
                if let Some(value) = value {
                    set_path(&mut out, field, value);
                }
            }
            Ok(out)
        })
        .collect()
}

fn add_fields(docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, MemoryError> {
    if spec.is_empty() {
        return Ok(docs);
    }
    docs.into_iter()
        .map(|mut doc| {
            for (field, expr) in spec {
                if let Some(value) = evaluate(expr, &doc)? {
                    set_path(&mut doc, field, value);
                }
            }
            Ok(doc)
        })
        .collect()
}

/// `$count` yields nothing at all for empty input.
fn count_docs(docs: Vec<Document>, args: &Bson) -> Result<Vec<Document>, MemoryError> {
    let name = match args {
        Bson::String(name) if !name.is_empty() && !name.starts_with('$') => name,
        _ => {
            return Err(MemoryError::InvalidPipeline(
                "$count expects a non-empty field name".into(),
            ));
        }
    };
    if docs.is_empty() {
        return Ok(Vec::new());
    }
    let count = match i32::try_from(docs.len()) {
        Ok(n) => Bson::Int32(n),
        Err(_) => Bson::Int64(i64::try_from(docs.len()).unwrap_or(i64::MAX)),
    };
    let mut out = Document::new();
    out.insert(name.clone(), count);
    Ok(vec![out])
}

fn facet(
    docs: Vec<Document>,
    spec: &Document,
    snapshot: &Snapshot,
) -> Result<Vec<Document>, MemoryError> {
    let mut out = Document::new();
    for (name, sub) in spec {
        let Bson::Array(stages) = sub else {
            return Err(MemoryError::InvalidPipeline(format!(
                "$facet.{name} must be an array of stages"
            )));
        };
        let stages = stages
            .iter()
            .map(|stage| match stage {
                Bson::Document(doc) => Ok(doc.clone()),
                _ => Err(MemoryError::InvalidPipeline(format!(
                    "$facet.{name} stages must be documents"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let result = run_pipeline(docs.clone(), &stages, snapshot)?;
        out.insert(
            name.clone(),
            result.into_iter().map(Bson::Document).collect::<Vec<_>>(),
        );
    }
    Ok(vec![out])
}

fn lookup(
    docs: Vec<Document>,
    spec: &Document,
    snapshot: &Snapshot,
) -> Result<Vec<Document>, MemoryError> {
    let arg = |key: &str| {
        spec.get_str(key).map_err(|_| {
            MemoryError::InvalidPipeline(format!("$lookup requires a string {key}"))
        })
    };
    let from = arg("from")?;
    let local_field = arg("localField")?;
    let foreign_field = arg("foreignField")?;
    let as_field = arg("as")?;

    let empty = imbl::Vector::new();
    let foreign = snapshot.get(from).unwrap_or(&empty);

    Ok(docs
        .into_iter()
        .map(|mut doc| {
            let local = resolve_path(&doc, local_field).unwrap_or(Bson::Null);
            let joined: Vec<Bson> = foreign
                .iter()
                .filter(|other| {
                    let value = resolve_path(other, foreign_field).unwrap_or(Bson::Null);
                    lookup_matches(&local, &value)
                })
                .cloned()
                .map(Bson::Document)
                .collect();
            set_path(&mut doc, as_field, Bson::Array(joined));
            doc
        })
        .collect())
}

/// Array values on either side match when any element does.
fn lookup_matches(local: &Bson, foreign: &Bson) -> bool {
    match (local, foreign) {
        (Bson::Array(items), _) => items.iter().any(|item| lookup_matches(item, foreign)),
        (_, Bson::Array(items)) => items.iter().any(|item| values_equal(local, item)),
        _ => values_equal(local, foreign),
    }
}

fn unwind(docs: Vec<Document>, args: &Bson) -> Result<Vec<Document>, MemoryError> {
    let (path, preserve) = match args {
        Bson::String(path) => (path.as_str(), false),
        Bson::Document(spec) => {
            let path = spec.get_str("path").map_err(|_| {
                MemoryError::InvalidPipeline("$unwind requires a string path".into())
            })?;
            let preserve = spec
                .get_bool("preserveNullAndEmptyArrays")
                .unwrap_or(false);
            (path, preserve)
        }
        _ => {
            return Err(MemoryError::InvalidPipeline(
                "$unwind expects a path or a document".into(),
            ));
        }
    };
    let path = path.strip_prefix('$').ok_or_else(|| {
        MemoryError::InvalidPipeline("$unwind path must start with '$'".into())
    })?;

    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match resolve_path(&doc, path) {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    set_path(&mut copy, path, item);
                    out.push(copy);
                }
            }
            Some(Bson::Array(_)) => {
                if preserve {
                    let mut copy = doc;
                    remove_path(&mut copy, path);
                    out.push(copy);
                }
            }
            None | Some(Bson::Null) => {
                if preserve {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    Ok(out)
}

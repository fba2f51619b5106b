//! Constructors for the individual pipeline stages.

use bson::{Bson, Document, doc};

/// Name of the facet holding the page of documents.
pub const DATA_FACET: &str = "data";
/// Name of the facet holding the match count.
pub const TOTAL_FACET: &str = "total";

/// `{ field: { $regex: term, $options: "i" } }` for every search field,
/// under an `$or`. `None` when the term or the field list is empty.
///
/// The term is escaped, so it matches as a literal substring and regex
/// syntax such as `^` or `.` has no special meaning.
pub fn search_clause<S: AsRef<str>>(term: &str, fields: &[S]) -> Option<Document> {
    if term.is_empty() || fields.is_empty() {
        return None;
    }
    let pattern = regex::escape(term);
    let conditions: Vec<Bson> = fields
        .iter()
        .map(|field| {
            let mut condition = Document::new();
            condition.insert(
                field.as_ref(),
                doc! { "$regex": pattern.as_str(), "$options": "i" },
            );
            Bson::Document(condition)
        })
        .collect();
    Some(doc! { "$or": conditions })
}

/// `$match` over `AND(filters, search)`. Either part may be absent; with
/// neither there is no match stage at all.
pub fn match_stage(filters: &Document, search: Option<Document>) -> Option<Document> {
    let mut clauses: Vec<Bson> = Vec::with_capacity(2);
    if !filters.is_empty() {
        clauses.push(Bson::Document(filters.clone()));
    }
    if let Some(search) = search {
        clauses.push(Bson::Document(search));
    }
    if clauses.is_empty() {
        return None;
    }
    Some(doc! { "$match": { "$and": clauses } })
}

pub fn sort_stage(sort: Document) -> Document {
    doc! { "$sort": sort }
}

/// `$project` when fields were requested, otherwise an empty `$addFields`
/// that passes documents through.
pub fn project_stage(fields: &Document) -> Document {
    if fields.is_empty() {
        doc! { "$addFields": {} }
    } else {
        doc! { "$project": fields.clone() }
    }
}

/// `$skip` + `$limit`, only when a limit is set.
pub fn pagination_stages(skip: u64, limit: Option<u64>) -> Vec<Document> {
    match limit {
        Some(limit) => vec![
            doc! { "$skip": to_i64(skip) },
            doc! { "$limit": to_i64(limit) },
        ],
        None => Vec::new(),
    }
}

/// Run the page (pagination then `extra`) and the count side by side.
pub fn facet_stage(data: Vec<Document>) -> Document {
    let data: Vec<Bson> = data.into_iter().map(Bson::Document).collect();
    doc! {
        "$facet": {
            DATA_FACET: data,
            TOTAL_FACET: [ { "$count": TOTAL_FACET } ],
        }
    }
}

/// Flatten the facet output to `{ total: n, data: [...] }`, with `total`
/// set to `0` when nothing matched.
pub fn total_projection() -> Document {
    doc! {
        "$project": {
            TOTAL_FACET: {
                "$ifNull": [ { "$arrayElemAt": [ "$total.total", 0 ] }, 0 ]
            },
            DATA_FACET: 1,
        }
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

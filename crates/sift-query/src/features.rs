use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::sort::{Sort, sort_document};

/// Parameter names with a fixed meaning. None of them is ever a filter.
pub const RESERVED_PARAMS: [&str; 6] = ["page", "sort", "limit", "fields", "search", "populate"];

/// Sort applied when the request does not ask for one.
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

pub fn is_reserved(name: &str) -> bool {
    RESERVED_PARAMS.contains(&name)
}

/// Normalized description of a list request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFeatures {
    /// 1-based page number.
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// `(page - 1) * limit` when both are set, otherwise `0`.
    pub skip: u64,
    /// Projection allow-list, `field -> 1`.
    pub fields: Document,
    /// `field -> value` or `field -> { "$op": value }`.
    pub filters: Document,
    pub sort: Vec<Sort>,
    pub search: String,
    /// Relations to expand, in request order, without duplicates.
    pub populate: Vec<String>,
}

impl Default for QueryFeatures {
    fn default() -> Self {
        Self {
            page: None,
            limit: None,
            skip: 0,
            fields: Document::new(),
            filters: Document::new(),
            sort: vec![Sort::desc(DEFAULT_SORT_FIELD)],
            search: String::new(),
            populate: Vec::new(),
        }
    }
}

impl QueryFeatures {
    pub fn sort_document(&self) -> Document {
        sort_document(&self.sort)
    }

    /// `relation -> true` for every requested relation.
    pub fn populate_document(&self) -> Document {
        self.populate
            .iter()
            .map(|name| (name.clone(), Bson::Boolean(true)))
            .collect()
    }

    pub fn populates(&self, relation: &str) -> bool {
        self.populate.iter().any(|p| p == relation)
    }
}

/// Normalized description of a single-document request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleQueryFeatures {
    pub fields: Document,
    /// Relation names joined with single spaces.
    pub populate: String,
}

impl SingleQueryFeatures {
    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.populate.split_whitespace()
    }
}

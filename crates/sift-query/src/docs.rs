//! Query-parameter documentation built from a static list of entity field
//! names, for API docs or a discovery endpoint.

use serde::{Deserialize, Serialize};

use crate::features::is_reserved;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDoc {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl ParamDoc {
    fn new(name: &str, description: impl Into<String>, example: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            description: description.into(),
            example: example.map(str::to_string),
        }
    }
}

/// Parameters accepted by a list endpoint: the reserved ones, then one
/// equality/range filter per entity field not listed in `excluded`.
pub fn describe_list_params(fields: &[&str], excluded: &[&str]) -> Vec<ParamDoc> {
    let visible = visible_fields(fields, excluded);
    let example_fields = visible.iter().take(2).copied().collect::<Vec<_>>().join(",");

    let mut docs = vec![
        ParamDoc::new("page", "1-based page number", Some("1")),
        ParamDoc::new("limit", "Page size; omit for all documents", Some("10")),
        ParamDoc::new(
            "sort",
            "Comma-separated fields; prefix with `-` for descending. Defaults to `-createdAt`",
            Some("-createdAt,name"),
        ),
        ParamDoc::new(
            "fields",
            "Comma-separated fields to return",
            non_empty(&example_fields),
        ),
        ParamDoc::new("search", "Case-insensitive text search", None),
        ParamDoc::new("populate", "Comma-separated relations to expand", None),
    ];

    docs.extend(visible.into_iter().map(|field| {
        ParamDoc::new(
            field,
            format!("Filter by `{field}`: a value, or `gte|gt|lte|lt,value` for a range"),
            None,
        )
    }));
    docs
}

/// Parameters accepted by a single-document endpoint.
pub fn describe_single_params(fields: &[&str], excluded: &[&str]) -> Vec<ParamDoc> {
    let example_fields = visible_fields(fields, excluded)
        .into_iter()
        .take(2)
        .collect::<Vec<_>>()
        .join(",");
    vec![
        ParamDoc::new(
            "fields",
            "Comma-separated fields to return",
            non_empty(&example_fields),
        ),
        ParamDoc::new("populate", "Comma-separated relations to expand", None),
    ]
}

fn visible_fields<'a>(fields: &[&'a str], excluded: &[&str]) -> Vec<&'a str> {
    fields
        .iter()
        .copied()
        .filter(|f| !is_reserved(f) && !excluded.contains(f))
        .collect()
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_skip_excluded_fields() {
        let docs = describe_list_params(&["name", "email", "password"], &["password"]);
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["page", "limit", "sort", "fields", "search", "populate", "name", "email"]
        );
        assert_eq!(docs[3].example.as_deref(), Some("name,email"));
    }

    #[test]
    fn entity_field_named_like_reserved_is_not_a_filter() {
        let docs = describe_list_params(&["page", "title"], &[]);
        assert_eq!(docs.iter().filter(|d| d.name == "page").count(), 1);
        assert!(docs.iter().any(|d| d.name == "title"));
    }

    #[test]
    fn single_params() {
        let docs = describe_single_params(&[], &[]);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].example, None);
    }

    #[test]
    fn serializes_without_empty_example() {
        let docs = describe_single_params(&[], &[]);
        let json = serde_json::to_value(&docs[1]).unwrap();
        assert!(json.get("example").is_none());
    }
}

use bson::{Bson, Document};

use crate::coerce::coerce_scalar;
use crate::features::{QueryFeatures, SingleQueryFeatures, is_reserved};
use crate::operator::parse_comparison;
use crate::params::QueryParams;
use crate::sort::Sort;

/// Which kind of endpoint the parameters were sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Single,
    Multiple,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedQuery {
    Single(SingleQueryFeatures),
    Multiple(QueryFeatures),
}

pub fn parse(params: &QueryParams, mode: Mode) -> ParsedQuery {
    match mode {
        Mode::Single => ParsedQuery::Single(parse_single(params)),
        Mode::Multiple => ParsedQuery::Multiple(parse_many(params)),
    }
}

/// Normalize the parameters of a list request.
///
/// Never fails: anything that does not parse as a more specific type is
/// kept as a string.
pub fn parse_many(params: &QueryParams) -> QueryFeatures {
    let page = parse_positive(params.get("page").as_deref());
    let limit = parse_positive(params.get("limit").as_deref());
    let skip = match (page, limit) {
        (Some(page), Some(limit)) => (page - 1).saturating_mul(limit),
        _ => 0,
    };

    let mut features = QueryFeatures {
        page,
        limit,
        skip,
        fields: parse_fields(params),
        filters: parse_filters(params),
        search: params
            .get("search")
            .map(|s| s.into_owned())
            .unwrap_or_default(),
        populate: params
            .get("populate")
            .map(|raw| {
                let mut relations: Vec<String> = Vec::new();
                for token in split_list(&raw) {
                    if !relations.iter().any(|r| r == token) {
                        relations.push(token.to_string());
                    }
                }
                relations
            })
            .unwrap_or_default(),
        ..QueryFeatures::default()
    };

    if let Some(sort) = params.get("sort").as_deref().map(parse_sort) {
        if !sort.is_empty() {
            features.sort = sort;
        }
    }

    features
}

/// Normalize the parameters of a single-document request. Only `fields`
/// and `populate` are read.
pub fn parse_single(params: &QueryParams) -> SingleQueryFeatures {
    SingleQueryFeatures {
        fields: parse_fields(params),
        populate: params
            .get("populate")
            .map(|raw| split_list(&raw).collect::<Vec<_>>().join(" "))
            .unwrap_or_default(),
    }
}

/// Comma- or space-separated list, empty tokens dropped.
fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

fn parse_fields(params: &QueryParams) -> Document {
    let mut fields = Document::new();
    if let Some(raw) = params.get("fields") {
        for field in split_list(&raw) {
            fields.insert(field, Bson::Int32(1));
        }
    }
    fields
}

/// Repeated fields keep their first position and take the last direction.
fn parse_sort(raw: &str) -> Vec<Sort> {
    let mut sorts: Vec<Sort> = Vec::new();
    for sort in split_list(raw).filter_map(Sort::parse) {
        match sorts.iter_mut().find(|s| s.field == sort.field) {
            Some(existing) => existing.direction = sort.direction,
            None => sorts.push(sort),
        }
    }
    sorts
}

/// Leading-integer parse (`"2"`, `" 2"`, `"2abc"` → 2). Zero, negatives and
/// non-numeric input are treated as absent.
fn parse_positive(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim_start();
    let raw = raw.strip_prefix('+').unwrap_or(raw);
    let end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    raw[..end].parse::<u64>().ok().filter(|n| *n > 0)
}

fn parse_filters(params: &QueryParams) -> Document {
    let mut filters = Document::new();
    for (key, raw) in params.iter() {
        if key.is_empty() || key.starts_with('$') || is_reserved(key) {
            continue;
        }
        filters.insert(key, filter_value(&raw));
    }
    filters
}

/// boolean → number → identifier → `op,value` → string, in that order.
fn filter_value(raw: &str) -> Bson {
    if let Some(value) = coerce_scalar(raw) {
        return value;
    }
    if raw.contains(',') {
        if let Some(comparison) = parse_comparison(raw) {
            return Bson::Document(comparison);
        }
    }
    Bson::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().copied().collect()
    }

    #[test]
    fn empty_params() {
        let features = parse_many(&QueryParams::new());
        assert_eq!(features.filters, doc! {});
        assert_eq!(features.sort_document(), doc! { "createdAt": -1 });
        assert_eq!(features.fields, doc! {});
        assert_eq!(features.populate_document(), doc! {});
        assert_eq!(features.skip, 0);
        assert_eq!(features.limit, None);
        assert_eq!(features.page, None);
        assert_eq!(features.search, "");
    }

    #[test]
    fn boolean_filters() {
        let features = parse_many(&params(&[("active", "true"), ("deleted", "false")]));
        assert_eq!(features.filters, doc! { "active": true, "deleted": false });
    }

    #[test]
    fn zero_filter_is_numeric() {
        let features = parse_many(&params(&[("stock", "0")]));
        assert_eq!(features.filters.get("stock"), Some(&Bson::Int64(0)));
    }

    #[test]
    fn numeric_filters() {
        let features = parse_many(&params(&[("age", "30"), ("rating", "4.5")]));
        assert_eq!(features.filters, doc! { "age": 30_i64, "rating": 4.5 });
    }

    #[test]
    fn identifier_filter() {
        let hex = "65a1f0c2b3d4e5f601234567";
        let features = parse_many(&params(&[("organizationId", hex)]));
        assert_eq!(
            features.filters.get("organizationId"),
            Some(&Bson::ObjectId(ObjectId::parse_str(hex).unwrap()))
        );
    }

    #[test]
    fn range_filter_and_multi_sort() {
        let features = parse_many(&params(&[("price", "gte,100"), ("sort", "-createdAt,name")]));
        assert_eq!(features.filters, doc! { "price": { "$gte": 100_i64 } });
        assert_eq!(features.sort_document(), doc! { "createdAt": -1, "name": 1 });
    }

    #[test]
    fn unrecognized_comma_value_stays_string() {
        let features = parse_many(&params(&[("tags", "red,blue")]));
        assert_eq!(features.filters, doc! { "tags": "red,blue" });
    }

    #[test]
    fn plain_strings_are_not_dates() {
        let features = parse_many(&params(&[("name", "alice"), ("joined", "2024-01-15")]));
        assert_eq!(features.filters, doc! { "name": "alice", "joined": "2024-01-15" });
    }

    #[test]
    fn reserved_names_never_filter() {
        let features = parse_many(&params(&[
            ("page", "1"),
            ("sort", "name"),
            ("limit", "5"),
            ("fields", "name"),
            ("search", "x"),
            ("populate", "org"),
            ("status", "active"),
        ]));
        assert_eq!(features.filters, doc! { "status": "active" });
    }

    #[test]
    fn operator_keys_are_dropped() {
        let features = parse_many(&params(&[("$where", "1"), ("", "x"), ("ok", "1")]));
        assert_eq!(features.filters, doc! { "ok": 1_i64 });
    }

    #[test]
    fn repeated_key_values_join_into_comparison() {
        let features = parse_many(&params(&[("price", "gte"), ("price", "100")]));
        assert_eq!(features.filters, doc! { "price": { "$gte": 100_i64 } });
    }

    #[test]
    fn search_and_pagination() {
        let features = parse_many(&params(&[("search", "john"), ("page", "2"), ("limit", "10")]));
        assert_eq!(features.search, "john");
        assert_eq!(features.page, Some(2));
        assert_eq!(features.limit, Some(10));
        assert_eq!(features.skip, 10);
    }

    #[test]
    fn skip_needs_both_page_and_limit() {
        assert_eq!(parse_many(&params(&[("page", "3")])).skip, 0);
        assert_eq!(parse_many(&params(&[("limit", "3")])).skip, 0);
        assert_eq!(parse_many(&params(&[("page", "3"), ("limit", "4")])).skip, 8);
    }

    #[test]
    fn bad_pagination_is_absent() {
        let features = parse_many(&params(&[("page", "abc"), ("limit", "0")]));
        assert_eq!(features.page, None);
        assert_eq!(features.limit, None);

        let features = parse_many(&params(&[("page", "-2"), ("limit", "5items")]));
        assert_eq!(features.page, None);
        assert_eq!(features.limit, Some(5));
    }

    #[test]
    fn fields_projection() {
        let features = parse_many(&params(&[("fields", "name,email,,")]));
        assert_eq!(features.fields, doc! { "name": 1, "email": 1 });
    }

    #[test]
    fn sort_repeated_field_keeps_position() {
        let features = parse_many(&params(&[("sort", "name,-age,-name")]));
        assert_eq!(features.sort_document(), doc! { "name": -1, "age": -1 });
    }

    #[test]
    fn empty_sort_falls_back_to_default() {
        let features = parse_many(&params(&[("sort", ",")]));
        assert_eq!(features.sort_document(), doc! { "createdAt": -1 });
    }

    #[test]
    fn populate_mapping() {
        let features = parse_many(&params(&[("populate", "organization,roles,organization")]));
        assert_eq!(features.populate, vec!["organization", "roles"]);
        assert_eq!(
            features.populate_document(),
            doc! { "organization": true, "roles": true }
        );
        assert!(features.populates("roles"));
        assert!(!features.populates("owner"));
    }

    #[test]
    fn single_mode_reads_fields_and_populate_only() {
        let single = parse_single(&params(&[
            ("fields", "name,email"),
            ("populate", "organization,roles"),
            ("status", "active"),
            ("page", "2"),
        ]));
        assert_eq!(single.fields, doc! { "name": 1, "email": 1 });
        assert_eq!(single.populate, "organization roles");
        assert_eq!(single.relations().collect::<Vec<_>>(), vec!["organization", "roles"]);
    }

    #[test]
    fn parse_dispatches_on_mode() {
        let p = params(&[("fields", "name")]);
        assert!(matches!(parse(&p, Mode::Single), ParsedQuery::Single(_)));
        assert!(matches!(parse(&p, Mode::Multiple), ParsedQuery::Multiple(_)));
    }
}

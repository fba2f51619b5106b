use std::sync::LazyLock;

use bson::Document;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::coerce::coerce_operand;

static COMPARATOR_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(gte|gt|lte|lt)\b").expect("comparator pattern compiles"));

/// Range comparators accepted in `field=op,value` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparator {
    /// The aggregation operator key, e.g. `$gte`.
    pub fn key(self) -> &'static str {
        match self {
            Comparator::Gt => "$gt",
            Comparator::Gte => "$gte",
            Comparator::Lt => "$lt",
            Comparator::Lte => "$lte",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "$gt" => Some(Comparator::Gt),
            "$gte" => Some(Comparator::Gte),
            "$lt" => Some(Comparator::Lt),
            "$lte" => Some(Comparator::Lte),
            _ => None,
        }
    }
}

/// Prefix every whole-word `gte`, `gt`, `lte`, `lt` with `$`.
pub fn rewrite_comparators(raw: &str) -> String {
    COMPARATOR_WORD
        .replace_all(raw, |caps: &Captures| format!("${}", &caps[1]))
        .into_owned()
}

/// Turn an `op,value` token into `{ "$op": value }`.
///
/// The token is split on its first comma; the operand is coerced as an
/// integer, then a date, then a float, and otherwise kept as a string.
/// Returns `None` when the part before the comma is not a comparator, in
/// which case the caller keeps the raw string.
pub fn parse_comparison(raw: &str) -> Option<Document> {
    let rewritten = rewrite_comparators(raw);
    let (key, operand) = rewritten.split_once(',')?;
    let comparator = Comparator::from_key(key.trim())?;

    let mut doc = Document::new();
    doc.insert(comparator.key(), coerce_operand(operand.trim()));
    Some(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc};

    #[test]
    fn rewrites_whole_words_only() {
        assert_eq!(rewrite_comparators("gte,100"), "$gte,100");
        assert_eq!(rewrite_comparators("lt,5"), "$lt,5");
        assert_eq!(rewrite_comparators("gt,lte"), "$gt,$lte");
        assert_eq!(rewrite_comparators("gtx,100"), "gtx,100");
        assert_eq!(rewrite_comparators("light,1"), "light,1");
    }

    #[test]
    fn gte_integer() {
        assert_eq!(parse_comparison("gte,100"), Some(doc! { "$gte": 100_i64 }));
    }

    #[test]
    fn each_comparator() {
        assert_eq!(parse_comparison("gt,1"), Some(doc! { "$gt": 1_i64 }));
        assert_eq!(parse_comparison("lt,2"), Some(doc! { "$lt": 2_i64 }));
        assert_eq!(parse_comparison("lte,3"), Some(doc! { "$lte": 3_i64 }));
    }

    #[test]
    fn float_operand() {
        assert_eq!(parse_comparison("lt,9.99"), Some(doc! { "$lt": 9.99 }));
    }

    #[test]
    fn date_operand() {
        let parsed = parse_comparison("gte,2024-01-15").unwrap();
        assert!(matches!(parsed.get("$gte"), Some(Bson::DateTime(_))));
    }

    #[test]
    fn string_operand() {
        assert_eq!(parse_comparison("gt,m"), Some(doc! { "$gt": "m" }));
    }

    #[test]
    fn splits_on_first_comma() {
        assert_eq!(parse_comparison("gte,1,2"), Some(doc! { "$gte": "1,2" }));
    }

    #[test]
    fn non_comparator_head_is_rejected() {
        assert_eq!(parse_comparison("red,blue"), None);
        assert_eq!(parse_comparison("100,gte"), None);
        assert_eq!(parse_comparison("gte"), None);
    }

    #[test]
    fn whitespace_around_parts() {
        assert_eq!(parse_comparison("gte, 100"), Some(doc! { "$gte": 100_i64 }));
    }
}

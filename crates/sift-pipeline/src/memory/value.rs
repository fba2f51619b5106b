use std::cmp::Ordering;

use bson::{Bson, Document};

/// Resolve a dotted path. Crossing an array maps the rest of the path over
/// its elements, so `"total.total"` on `{ total: [{ total: 3 }] }` is `[3]`.
pub(crate) fn resolve_path(doc: &Document, path: &str) -> Option<Bson> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let value = doc.get(head)?;
    match rest {
        None => Some(value.clone()),
        Some(rest) => resolve_in(value, rest),
    }
}

fn resolve_in(value: &Bson, path: &str) -> Option<Bson> {
    match value {
        Bson::Document(doc) => resolve_path(doc, path),
        Bson::Array(items) => Some(Bson::Array(
            items.iter().filter_map(|item| resolve_in(item, path)).collect(),
        )),
        _ => None,
    }
}

/// Set a dotted path, creating intermediate documents.
pub(crate) fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

/// Remove a dotted path if present.
pub(crate) fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Equality with numeric widths unified.
pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x == y,
        (Bson::Int64(x), Bson::Int64(y)) => x == y,
        (Bson::Int32(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Int32(x)) => i64::from(*x) == *y,
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Canonical BSON type order used when sorting mixed types.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        _ => 12,
    }
}

/// Compare two values of the same type family. `None` when the types are
/// not comparable, which makes range operators exclude the document.
pub(crate) fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => Some(x.cmp(y)),
        (Bson::Int64(x), Bson::Int64(y)) => Some(x.cmp(y)),
        (Bson::Int32(x), Bson::Int64(y)) => Some(i64::from(*x).cmp(y)),
        (Bson::Int64(x), Bson::Int32(y)) => Some(x.cmp(&i64::from(*y))),
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

/// Total order for `$sort`: missing and null first, then by type rank, then
/// by value.
pub(crate) fn sort_cmp(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let rank = |v: Option<&Bson>| v.map_or(0, type_rank).max(1);
    match (a, b) {
        (Some(a), Some(b)) => rank(Some(a))
            .cmp(&rank(Some(b)))
            .then_with(|| compare_values(a, b).unwrap_or(Ordering::Equal)),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Read a non-negative count such as a `$skip`/`$limit` argument.
pub(crate) fn as_count(value: &Bson) -> Option<usize> {
    match value {
        Bson::Int32(n) => usize::try_from(*n).ok(),
        Bson::Int64(n) => usize::try_from(*n).ok(),
        Bson::Double(n) if n.fract() == 0.0 && *n >= 0.0 => Some(*n as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn resolves_nested_and_array_paths() {
        let d = doc! { "org": { "name": "acme" }, "total": [ { "total": 3 } ] };
        assert_eq!(resolve_path(&d, "org.name"), Some(Bson::String("acme".into())));
        assert_eq!(resolve_path(&d, "total.total"), Some(Bson::Array(vec![Bson::Int32(3)])));
        assert_eq!(resolve_path(&d, "missing.path"), None);
    }

    #[test]
    fn set_and_remove_paths() {
        let mut d = doc! {};
        set_path(&mut d, "a.b", Bson::Int32(1));
        assert_eq!(d, doc! { "a": { "b": 1 } });
        remove_path(&mut d, "a.b");
        assert_eq!(d, doc! { "a": {} });
    }

    #[test]
    fn sort_order_puts_missing_first() {
        let one = Bson::Int32(1);
        let null = Bson::Null;
        assert_eq!(sort_cmp(None, Some(&one)), Ordering::Less);
        assert_eq!(sort_cmp(None, Some(&null)), Ordering::Equal);
        assert_eq!(sort_cmp(Some(&one), Some(&Bson::String("a".into()))), Ordering::Less);
        assert_eq!(sort_cmp(Some(&Bson::Double(2.5)), Some(&one)), Ordering::Greater);
    }

    #[test]
    fn cross_width_equality() {
        assert!(values_equal(&Bson::Int32(5), &Bson::Int64(5)));
        assert!(values_equal(&Bson::Double(5.0), &Bson::Int64(5)));
        assert!(!values_equal(&Bson::String("5".into()), &Bson::Int64(5)));
    }

    #[test]
    fn counts() {
        assert_eq!(as_count(&Bson::Int64(10)), Some(10));
        assert_eq!(as_count(&Bson::Int32(-1)), None);
        assert_eq!(as_count(&Bson::String("1".into())), None);
    }
}

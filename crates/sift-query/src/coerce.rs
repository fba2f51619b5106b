use bson::Bson;
use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Coerce a raw query-string value into the most specific BSON value.
///
/// Precedence:
/// 1. `"true"` / `"false"` → boolean
/// 2. strictly numeric → `Int64`, or `Double` when not integral
/// 3. 24-character hex → `ObjectId`
/// 4. contains a comma → left as a string (operator rewriting owns it)
/// 5. integer, then date, then float, else string
pub fn coerce(raw: &str) -> Bson {
    if let Some(value) = coerce_scalar(raw) {
        return value;
    }
    if raw.contains(',') {
        return Bson::String(raw.to_string());
    }
    coerce_operand(raw)
}

/// Steps 1–3 of [`coerce`]: boolean, number, identifier.
///
/// Returns `None` when the value is none of those, so the caller can
/// decide between operator rewriting and a plain string.
pub fn coerce_scalar(raw: &str) -> Option<Bson> {
    match raw {
        "true" => Some(Bson::Boolean(true)),
        "false" => Some(Bson::Boolean(false)),
        _ => parse_number(raw).or_else(|| parse_object_id(raw).map(Bson::ObjectId)),
    }
}

/// Coerce the operand of a comparison: integer, then date, then float,
/// falling back to the string itself.
pub fn coerce_operand(raw: &str) -> Bson {
    if let Ok(n) = raw.parse::<i64>() {
        return Bson::Int64(n);
    }
    if let Some(dt) = parse_date(raw) {
        return Bson::DateTime(dt);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Bson::Double(f),
        _ => Bson::String(raw.to_string()),
    }
}

/// Strict numeric parse. The whole string must be a number; `"0"` is a
/// number like any other. `NaN` and infinities spelled out are not.
pub fn parse_number(raw: &str) -> Option<Bson> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Bson::Int64(n));
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(Bson::Double(f)),
        _ => None,
    }
}

/// Parse a 24-character hex string as a document identifier.
pub fn parse_object_id(raw: &str) -> Option<ObjectId> {
    if raw.len() != 24 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    ObjectId::parse_str(raw).ok()
}

/// Accepted forms: RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` read as
/// UTC, or a bare `YYYY-MM-DD` at UTC midnight.
pub fn parse_date(raw: &str) -> Option<bson::DateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(bson::DateTime::from_chrono(dt.with_timezone(&Utc)));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(bson::DateTime::from_chrono(dt.and_utc()));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(bson::DateTime::from_chrono(date.and_hms_opt(0, 0, 0)?.and_utc()))
}

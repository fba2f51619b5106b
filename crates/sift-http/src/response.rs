use bson::Bson;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The envelope every endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            meta: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_page: u64,
}

impl Meta {
    /// `page` defaults to 1 and `limit` to `total`.
    pub fn new(page: Option<u64>, limit: Option<u64>, total: u64) -> Self {
        let limit = limit.unwrap_or(total);
        let total_page = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page: page.unwrap_or(1),
            limit,
            total,
            total_page,
        }
    }
}

/// Plain JSON for a BSON value: identifiers as hex strings and dates as
/// RFC 3339, everything else in relaxed extended JSON.
pub fn to_json(value: Bson) -> Value {
    match value {
        Bson::Document(doc) => Value::Object(
            doc.into_iter()
                .map(|(key, value)| (key, to_json(value)))
                .collect(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(to_json).collect()),
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::from(dt.timestamp_millis()),
        },
        other => other.into_relaxed_extjson(),
    }
}

use bson::{Bson, Document};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::stage::{DATA_FACET, TOTAL_FACET};

/// One page of results plus the number of documents the match stage
/// selected, independent of pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
        }
    }
}

impl<T: DeserializeOwned> Page<T> {
    /// Decode the `{ total, data }` document produced by the final stage.
    pub fn from_facet(mut doc: Document) -> Result<Self, bson::error::Error> {
        let total = match doc.get(TOTAL_FACET) {
            Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
            Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
            Some(Bson::Double(n)) if *n > 0.0 => *n as u64,
            _ => 0,
        };
        let data = match doc.remove(DATA_FACET) {
            Some(data @ Bson::Array(_)) => bson::deserialize_from_bson(data)?,
            _ => Vec::new(),
        };
        Ok(Self { data, total })
    }
}

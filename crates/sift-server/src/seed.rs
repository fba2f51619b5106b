use std::path::{Path, PathBuf};

use bson::{Bson, Document};
use serde_json::Value;
use sift_pipeline::memory::{MemoryDatabase, MemoryError};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid seed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid extended json: {0}")]
    ExtJson(#[from] bson::error::Error),

    #[error("seed must be an array of objects, or an object mapping collection names to arrays")]
    Shape,

    #[error(transparent)]
    Store(#[from] MemoryError),
}

/// Load a seed file into `db` and return the number of documents inserted.
pub fn load_file(db: &MemoryDatabase, collection: &str, path: &Path) -> Result<usize, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(db, collection, &raw)
}

/// A top-level array goes into `collection`. A top-level object maps
/// collection names to arrays, for seeding related collections together.
/// Values are extended JSON, so `{"$oid": ...}` and `{"$date": ...}` become
/// identifiers and dates.
pub fn load_str(db: &MemoryDatabase, collection: &str, raw: &str) -> Result<usize, SeedError> {
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Array(items) => insert(db, collection, items),
        Value::Object(map) => {
            let mut inserted = 0;
            for (name, items) in map {
                let Value::Array(items) = items else {
                    return Err(SeedError::Shape);
                };
                inserted += insert(db, &name, items)?;
            }
            Ok(inserted)
        }
        _ => Err(SeedError::Shape),
    }
}

fn insert(db: &MemoryDatabase, collection: &str, items: Vec<Value>) -> Result<usize, SeedError> {
    let docs = items
        .into_iter()
        .map(|item| match Bson::try_from(item)? {
            Bson::Document(doc) => Ok(doc),
            _ => Err(SeedError::Shape),
        })
        .collect::<Result<Vec<Document>, _>>()?;
    Ok(db.insert_many(collection, docs)?.len())
}

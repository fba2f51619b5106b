use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use arc_swap::ArcSwap;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use tracing::trace;

use super::error::MemoryError;
use super::stages::{Snapshot, run_pipeline};
use crate::collection::Collection;

type Documents = imbl::Vector<Document>;

#[derive(Default)]
struct Inner {
    collections: RwLock<HashMap<String, Arc<ArcSwap<Documents>>>>,
    write_lock: Mutex<()>,
}

/// A set of named in-memory collections.
///
/// Readers aggregate over a snapshot taken when the call starts, so a
/// concurrent insert is either fully visible to a pipeline or not at all.
/// Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Inner>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to a collection. The collection need not exist yet.
    pub fn collection(&self, name: impl Into<String>) -> MemoryCollection {
        MemoryCollection {
            db: self.clone(),
            name: name.into(),
        }
    }

    pub fn collection_names(&self) -> Vec<String> {
        let collections = self
            .inner
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Append documents, assigning an ObjectId `_id` to any that lack one.
    /// Returns the ids in insertion order.
    pub fn insert_many(
        &self,
        collection: &str,
        docs: impl IntoIterator<Item = Document>,
    ) -> Result<Vec<Bson>, MemoryError> {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .map_err(|e| MemoryError::Storage(format!("write lock poisoned: {e}")))?;

        let slot = self.slot(collection);
        let mut data = (**slot.load()).clone();
        let mut ids = Vec::new();
        for mut doc in docs {
            if !doc.contains_key("_id") {
                let mut with_id = Document::new();
                with_id.insert("_id", ObjectId::new());
                for (key, value) in doc {
                    with_id.insert(key, value);
                }
                doc = with_id;
            }
            if let Some(id) = doc.get("_id") {
                ids.push(id.clone());
            }
            data.push_back(doc);
        }
        slot.store(Arc::new(data));

        trace!(collection, inserted = ids.len(), "inserted documents");
        Ok(ids)
    }

    /// Number of documents in `collection`; zero when it does not exist.
    pub fn count(&self, collection: &str) -> usize {
        let collections = self
            .inner
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        collections.get(collection).map_or(0, |slot| slot.load().len())
    }

    /// Run a pipeline against `collection`. A missing collection behaves
    /// as an empty one.
    pub fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, MemoryError> {
        let snapshot = self.snapshot();
        let docs = snapshot
            .get(collection)
            .map(|docs| docs.iter().cloned().collect())
            .unwrap_or_default();
        let out = run_pipeline(docs, pipeline, &snapshot)?;
        trace!(collection, stages = pipeline.len(), results = out.len(), "aggregated");
        Ok(out)
    }

    /// Cheap due to imbl structural sharing.
    fn snapshot(&self) -> Snapshot {
        let collections = self
            .inner
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .iter()
            .map(|(name, slot)| (name.clone(), (**slot.load()).clone()))
            .collect()
    }

    fn slot(&self, collection: &str) -> Arc<ArcSwap<Documents>> {
        let mut collections = self
            .inner
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(Documents::new())))
            .clone()
    }
}

/// One named collection of a [`MemoryDatabase`].
#[derive(Clone)]
pub struct MemoryCollection {
    db: MemoryDatabase,
    name: String,
}

impl MemoryCollection {
    pub fn insert_many(
        &self,
        docs: impl IntoIterator<Item = Document>,
    ) -> Result<Vec<Bson>, MemoryError> {
        self.db.insert_many(&self.name, docs)
    }

    pub fn count(&self) -> usize {
        self.db.count(&self.name)
    }
}

impl Collection for MemoryCollection {
    type Error = MemoryError;

    fn aggregate(
        &self,
        pipeline: Vec<Document>,
    ) -> impl Future<Output = Result<Vec<Document>, MemoryError>> + Send {
        std::future::ready(self.db.aggregate(&self.name, &pipeline))
    }
}

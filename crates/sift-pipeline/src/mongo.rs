//! [`Collection`] over a MongoDB collection.

use std::future::Future;

use bson::Document;
use futures::TryStreamExt;
use tracing::trace;

use crate::collection::Collection;

impl Collection for mongodb::Collection<Document> {
    type Error = mongodb::error::Error;

    fn aggregate(
        &self,
        pipeline: Vec<Document>,
    ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send {
        async move {
            let stages = pipeline.len();
            let cursor = mongodb::Collection::aggregate(self, pipeline).await?;
            let docs: Vec<Document> = cursor.try_collect().await?;
            trace!(collection = %self.name(), stages, results = docs.len(), "aggregated");
            Ok(docs)
        }
    }
}

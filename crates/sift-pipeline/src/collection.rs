use std::future::Future;
use std::sync::Arc;

use bson::Document;

/// A document collection that can run an aggregation pipeline.
///
/// Implementations own connection handling, timeouts and cancellation; the
/// whole pipeline is sent in one call and the resulting documents come back
/// in one piece.
pub trait Collection: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn aggregate(
        &self,
        pipeline: Vec<Document>,
    ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send;
}

impl<C: Collection> Collection for &C {
    type Error = C::Error;

    fn aggregate(
        &self,
        pipeline: Vec<Document>,
    ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send {
        (**self).aggregate(pipeline)
    }
}

impl<C: Collection> Collection for Arc<C> {
    type Error = C::Error;

    fn aggregate(
        &self,
        pipeline: Vec<Document>,
    ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send {
        (**self).aggregate(pipeline)
    }
}

use std::marker::PhantomData;

use bson::Document;
use serde::de::DeserializeOwned;
use sift_query::QueryFeatures;
use tracing::debug;

use crate::collection::Collection;
use crate::error::PipelineError;
use crate::page::Page;
use crate::stage;

/// Compiles a [`QueryFeatures`] into an aggregation pipeline and runs it.
///
/// Built fresh for every request and consumed by [`execute`](Self::execute).
/// Every configuration method takes the builder by value and hands it back,
/// so nothing accumulates outside the one request that owns it.
///
/// Stage order is fixed:
///
/// 1. stages added with [`with_stage`](Self::with_stage)
/// 2. `$match` on `AND(filters + base filter, OR(search))`
/// 3. `$sort`
/// 4. `$project` of the requested fields, or a pass-through `$addFields`
/// 5. `$facet` with `data` (skip, limit, then the extra stages) and `total`
/// 6. `$project` to `{ total, data }`
pub struct PipelineBuilder<'c, T, C> {
    collection: &'c C,
    features: QueryFeatures,
    search_fields: Vec<String>,
    base_filter: Document,
    custom_stages: Vec<Document>,
    extra_stages: Vec<Document>,
    _entity: PhantomData<fn() -> T>,
}

impl<'c, T, C> PipelineBuilder<'c, T, C>
where
    T: DeserializeOwned,
    C: Collection,
{
    pub fn new(collection: &'c C, features: QueryFeatures) -> Self {
        Self {
            collection,
            features,
            search_fields: Vec::new(),
            base_filter: Document::new(),
            custom_stages: Vec::new(),
            extra_stages: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Fields matched against the `search` term.
    pub fn search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Shallow-merge `filter` into the match filter. Later calls win over
    /// earlier ones, and the base filter wins over request filters.
    pub fn with_base_filter(mut self, filter: Document) -> Self {
        for (key, value) in filter {
            self.base_filter.insert(key, value);
        }
        self
    }

    /// Stages run on the paginated slice only, after `$skip`/`$limit`.
    pub fn with_extra_stages(mut self, stages: impl IntoIterator<Item = Document>) -> Self {
        self.extra_stages.extend(stages);
        self
    }

    /// A raw stage placed ahead of the match stage.
    pub fn with_stage(mut self, stage: Document) -> Self {
        self.custom_stages.push(stage);
        self
    }

    pub fn compile(&self) -> Vec<Document> {
        let mut pipeline = self.custom_stages.clone();

        let mut filters = self.features.filters.clone();
        for (key, value) in &self.base_filter {
            filters.insert(key.clone(), value.clone());
        }
        let search = stage::search_clause(&self.features.search, &self.search_fields);
        if let Some(match_stage) = stage::match_stage(&filters, search) {
            pipeline.push(match_stage);
        }

        pipeline.push(stage::sort_stage(self.features.sort_document()));
        pipeline.push(stage::project_stage(&self.features.fields));

        let mut data = stage::pagination_stages(self.features.skip, self.features.limit);
        data.extend(self.extra_stages.iter().cloned());
        pipeline.push(stage::facet_stage(data));
        pipeline.push(stage::total_projection());

        pipeline
    }

    /// Run the pipeline in a single round trip to the store.
    pub async fn execute(self) -> Result<Page<T>, PipelineError<C::Error>> {
        let pipeline = self.compile();
        debug!(stages = pipeline.len(), pipeline = ?pipeline, "running aggregation");

        let results = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(PipelineError::Store)?;

        let page = match results.into_iter().next() {
            Some(doc) => Page::from_facet(doc)?,
            None => Page::default(),
        };
        debug!(total = page.total, returned = page.data.len(), "aggregation finished");
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use sift_query::{QueryParams, parse_many};

    struct NoStore;

    #[derive(Debug)]
    struct Never;

    impl std::fmt::Display for Never {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "never")
        }
    }

    impl std::error::Error for Never {}

    impl Collection for NoStore {
        type Error = Never;

        async fn aggregate(&self, _pipeline: Vec<Document>) -> Result<Vec<Document>, Never> {
            Ok(Vec::new())
        }
    }

    fn features(pairs: &[(&str, &str)]) -> QueryFeatures {
        parse_many(&pairs.iter().copied().collect::<QueryParams>())
    }

    fn builder(features: QueryFeatures) -> PipelineBuilder<'static, Document, NoStore> {
        PipelineBuilder::new(&NoStore, features)
    }

    #[test]
    fn empty_request_pipeline() {
        let pipeline = builder(QueryFeatures::default()).compile();
        assert_eq!(
            pipeline,
            vec![
                doc! { "$sort": { "createdAt": -1 } },
                doc! { "$addFields": {} },
                doc! { "$facet": { "data": [], "total": [ { "$count": "total" } ] } },
                stage::total_projection(),
            ]
        );
    }

    #[test]
    fn search_with_pagination() {
        let pipeline = builder(features(&[("search", "john"), ("page", "2"), ("limit", "10")]))
            .search_fields(["name", "email"])
            .compile();

        assert_eq!(
            pipeline[0],
            doc! { "$match": { "$and": [ { "$or": [
                { "name": { "$regex": "john", "$options": "i" } },
                { "email": { "$regex": "john", "$options": "i" } },
            ] } ] } }
        );
        assert_eq!(
            pipeline[3],
            doc! { "$facet": {
                "data": [ { "$skip": 10_i64 }, { "$limit": 10_i64 } ],
                "total": [ { "$count": "total" } ],
            } }
        );
    }

    #[test]
    fn search_without_fields_adds_no_clause() {
        let pipeline = builder(features(&[("search", "john")])).compile();
        assert!(pipeline[0].contains_key("$sort"));
    }

    #[test]
    fn filters_and_search_share_one_match() {
        let pipeline = builder(features(&[("price", "gte,100"), ("search", "x")]))
            .search_fields(["name"])
            .compile();
        assert_eq!(
            pipeline[0],
            doc! { "$match": { "$and": [
                { "price": { "$gte": 100_i64 } },
                { "$or": [ { "name": { "$regex": "x", "$options": "i" } } ] },
            ] } }
        );
    }

    #[test]
    fn base_filter_merges_last_write_wins() {
        let pipeline = builder(features(&[("status", "draft"), ("kind", "a")]))
            .with_base_filter(doc! { "status": "published", "tenant": "t1" })
            .with_base_filter(doc! { "tenant": "t2" })
            .compile();
        assert_eq!(
            pipeline[0],
            doc! { "$match": { "$and": [
                { "status": "published", "kind": "a", "tenant": "t2" },
            ] } }
        );
    }

    #[test]
    fn extra_stages_run_after_pagination() {
        let lookup = doc! { "$lookup": { "from": "orgs", "localField": "org", "foreignField": "_id", "as": "org" } };
        let pipeline = builder(features(&[("limit", "5")]))
            .with_extra_stages([lookup.clone()])
            .compile();
        let facet = pipeline[2].get_document("$facet").unwrap();
        let data = facet.get_array("data").unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[2].as_document(), Some(&lookup));
    }

    #[test]
    fn custom_stage_precedes_match() {
        let pipeline = builder(features(&[("a", "1")]))
            .with_stage(doc! { "$addFields": { "score": 1 } })
            .compile();
        assert_eq!(pipeline[0], doc! { "$addFields": { "score": 1 } });
        assert!(pipeline[1].contains_key("$match"));
    }

    #[test]
    fn projection_when_fields_requested() {
        let pipeline = builder(features(&[("fields", "name,email")])).compile();
        assert_eq!(pipeline[1], doc! { "$project": { "name": 1, "email": 1 } });
    }

    #[tokio::test]
    async fn empty_store_result_is_an_empty_page() {
        let page = builder(QueryFeatures::default()).execute().await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.data.is_empty());
    }
}

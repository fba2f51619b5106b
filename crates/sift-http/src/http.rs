use bson::{Bson, Document, doc};
use http::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use sift_pipeline::{Collection, PipelineBuilder};
use sift_query::{
    QueryFeatures, QueryParams, describe_list_params, describe_single_params, parse_many,
    parse_object_id, parse_single,
};
use tracing::{debug, warn};

use crate::config::CollectionConfig;
use crate::error::CollectionHttpError;
use crate::response::{ApiResponse, Meta, to_json};

/// Read-only REST surface over one collection.
///
/// - `GET /` lists documents per the query string
/// - `GET /{id}` returns one document by ObjectId
/// - `GET /_params` describes the accepted query parameters
pub struct CollectionHttp<C> {
    config: CollectionConfig,
    collection: C,
}

impl<C: Collection> CollectionHttp<C> {
    pub fn new(config: CollectionConfig, collection: C) -> Self {
        Self { config, collection }
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub async fn handle(&self, req: Request<Vec<u8>>) -> Response<Vec<u8>> {
        let path = req.uri().path().trim_end_matches('/');
        let query = req.uri().query().unwrap_or("");

        if req.method() != Method::GET {
            return not_found();
        }

        let result = match path {
            "" => self.list(query).await,
            "/_params" => self.params(),
            _ => match path.strip_prefix('/') {
                Some(id) if !id.contains('/') => self.find_one(id, query).await,
                _ => return not_found(),
            },
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                if e.status_code().is_server_error() {
                    warn!(collection = %self.config.name, error = %e, "request failed");
                }
                error_response(e.status_code(), &e.to_string())
            }
        }
    }

    async fn list(&self, query: &str) -> Result<Response<Vec<u8>>, CollectionHttpError<C::Error>> {
        let mut features = parse_many(&QueryParams::parse(query)?);
        self.strip_hidden(&mut features);

        let relations: Vec<_> = features
            .populate
            .iter()
            .filter_map(|name| self.config.relation(name))
            .collect();
        if !features.fields.is_empty() {
            for relation in &relations {
                features.fields.insert(relation.local_field.as_str(), 1);
            }
        }
        let relation_stages: Vec<Document> = relations
            .iter()
            .flat_map(|relation| relation.stages())
            .collect();

        let (page, limit) = (features.page, features.limit);
        let result = PipelineBuilder::<Document, _>::new(&self.collection, features)
            .search_fields(self.config.search_fields.iter().cloned())
            .with_extra_stages(relation_stages)
            .execute()
            .await?;

        let total = result.total;
        let data: Vec<Value> = result
            .data
            .into_iter()
            .map(|doc| to_json(Bson::Document(self.redact(doc))))
            .collect();
        debug!(collection = %self.config.name, total, returned = data.len(), "listed documents");

        let body = ApiResponse::ok(format!("{} retrieved successfully", self.config.name), data)
            .with_meta(Meta::new(page, limit, total));
        Ok(json_ok(&body))
    }

    async fn find_one(
        &self,
        id: &str,
        query: &str,
    ) -> Result<Response<Vec<u8>>, CollectionHttpError<C::Error>> {
        let oid = parse_object_id(id).ok_or_else(|| CollectionHttpError::InvalidId(id.to_string()))?;
        let mut features = parse_single(&QueryParams::parse(query)?);
        features.fields = self.visible(std::mem::take(&mut features.fields));

        let relations: Vec<_> = features
            .relations()
            .filter_map(|name| self.config.relation(name))
            .collect();

        let mut pipeline = vec![doc! { "$match": { "_id": oid } }, doc! { "$limit": 1_i64 }];
        if !features.fields.is_empty() {
            let mut projection = features.fields.clone();
            projection.insert("_id", 1);
            for relation in &relations {
                projection.insert(relation.local_field.as_str(), 1);
            }
            pipeline.push(doc! { "$project": projection });
        }
        pipeline.extend(relations.iter().flat_map(|relation| relation.stages()));

        let doc = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(CollectionHttpError::Store)?
            .into_iter()
            .next()
            .ok_or_else(|| CollectionHttpError::NotFound(self.config.name.clone()))?;

        let body = ApiResponse::ok(
            format!("{} retrieved successfully", self.config.name),
            to_json(Bson::Document(self.redact(doc))),
        );
        Ok(json_ok(&body))
    }

    fn params(&self) -> Result<Response<Vec<u8>>, CollectionHttpError<C::Error>> {
        let fields: Vec<&str> = self.config.field_names.iter().map(String::as_str).collect();
        let hidden: Vec<&str> = self.config.hidden_fields.iter().map(String::as_str).collect();

        let body = ApiResponse::ok(
            format!("{} query parameters", self.config.name),
            serde_json::json!({
                "list": describe_list_params(&fields, &hidden),
                "single": describe_single_params(&fields, &hidden),
            }),
        );
        Ok(json_ok(&body))
    }

    /// Hidden fields never reach the pipeline, so match counts and ordering
    /// cannot reveal their values.
    fn strip_hidden(&self, features: &mut QueryFeatures) {
        features.filters = self.visible(std::mem::take(&mut features.filters));
        features.fields = self.visible(std::mem::take(&mut features.fields));
        features.sort.retain(|sort| !self.config.is_hidden(&sort.field));
        if features.sort.is_empty() {
            features.sort = QueryFeatures::default().sort;
        }
    }

    fn visible(&self, doc: Document) -> Document {
        doc.into_iter()
            .filter(|(field, _)| !self.config.is_hidden(field))
            .collect()
    }

    fn redact(&self, mut doc: Document) -> Document {
        for field in &self.config.hidden_fields {
            doc.remove(field);
        }
        doc
    }
}

fn json_ok(body: &impl Serialize) -> Response<Vec<u8>> {
    match serde_json::to_vec(body) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn not_found() -> Response<Vec<u8>> {
    error_response(StatusCode::NOT_FOUND, "not found")
}

fn json_response(status: StatusCode, body: impl Into<Vec<u8>>) -> Response<Vec<u8>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn error_response(status: StatusCode, message: &str) -> Response<Vec<u8>> {
    let body = serde_json::to_vec(&ApiResponse::error(message)).unwrap_or_default();
    json_response(status, body)
}

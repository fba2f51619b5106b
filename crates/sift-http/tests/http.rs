use bson::doc;
use bson::oid::ObjectId;
use http::{Method, Request, StatusCode};
use sift_http::*;
use sift_pipeline::memory::{MemoryCollection, MemoryDatabase};

const COLLECTION: &str = "accounts";

fn seed_data() -> (MemoryDatabase, Vec<ObjectId>) {
    let db = MemoryDatabase::new();
    db.insert_many(
        "owners",
        [
            doc! { "_id": "own-1", "name": "Wile E." },
            doc! { "_id": "own-2", "name": "Road Runner" },
        ],
    )
    .unwrap();

    let ids: Vec<ObjectId> = (0..5).map(|_| ObjectId::new()).collect();
    db.insert_many(
        COLLECTION,
        vec![
            doc! { "_id": ids[0], "name": "Acme Corp", "status": "active", "revenue": 50000.0, "owner": "own-1", "secret": "x", "createdAt": bson::DateTime::from_millis(1_000) },
            doc! { "_id": ids[1], "name": "Globex", "status": "rejected", "revenue": 80000.0, "owner": "own-2", "secret": "x", "createdAt": bson::DateTime::from_millis(2_000) },
            doc! { "_id": ids[2], "name": "Initech", "status": "active", "revenue": 12000.0, "secret": "x", "createdAt": bson::DateTime::from_millis(3_000) },
            doc! { "_id": ids[3], "name": "Umbrella", "status": "active", "revenue": 95000.0, "owner": "own-1", "secret": "x", "createdAt": bson::DateTime::from_millis(4_000) },
            doc! { "_id": ids[4], "name": "Stark Industries", "status": "snoozed", "revenue": 200000.0, "secret": "x", "createdAt": bson::DateTime::from_millis(5_000) },
        ],
    )
    .unwrap();
    (db, ids)
}

fn build_handler(db: &MemoryDatabase) -> CollectionHttp<MemoryCollection> {
    let config = CollectionConfig {
        name: COLLECTION.into(),
        search_fields: vec!["name".into(), "status".into()],
        relations: vec![Relation::parse("owner=owners:owner:one").unwrap()],
        hidden_fields: vec!["secret".into()],
        field_names: vec!["name".into(), "status".into(), "revenue".into(), "secret".into()],
    };
    CollectionHttp::new(config, db.collection(COLLECTION))
}

async fn get(handler: &CollectionHttp<MemoryCollection>, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Vec::new())
        .unwrap();
    let resp = handler.handle(req).await;
    let status = resp.status();
    let body = serde_json::from_slice(resp.body()).unwrap();
    (status, body)
}

fn names(body: &serde_json::Value) -> Vec<&str> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect()
}

// ── GET / ───────────────────────────────────────────────────────

#[tokio::test]
async fn list_returns_all_records_newest_first() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (status, body) = get(&handler, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "accounts retrieved successfully");
    assert_eq!(body["meta"], serde_json::json!({ "page": 1, "limit": 5, "total": 5, "totalPage": 1 }));
    assert_eq!(names(&body)[0], "Stark Industries");
}

#[tokio::test]
async fn list_hides_configured_fields() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (_, body) = get(&handler, "/").await;
    for doc in body["data"].as_array().unwrap() {
        assert!(doc.get("secret").is_none());
        assert!(doc["_id"].is_string());
    }
}

#[tokio::test]
async fn hidden_fields_are_not_queryable() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    for uri in ["/?secret=x", "/?secret=wrong", "/?secret=lt,i"] {
        let (status, body) = get(&handler, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["meta"]["total"], 5, "{uri}");
    }

    let (_, body) = get(&handler, "/?secret=x&status=active").await;
    assert_eq!(body["meta"]["total"], 3);
}

#[tokio::test]
async fn sorting_on_hidden_field_uses_default_order() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (_, body) = get(&handler, "/?sort=secret").await;
    assert_eq!(names(&body)[0], "Stark Industries");

    let (_, body) = get(&handler, "/?sort=secret,name").await;
    assert_eq!(names(&body)[0], "Acme Corp");
}

#[tokio::test]
async fn list_with_filters() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (status, body) = get(&handler, "/?status=active").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn list_with_range_and_sort() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (_, body) = get(&handler, "/?revenue=gte,50000&sort=revenue").await;
    assert_eq!(names(&body), ["Acme Corp", "Globex", "Umbrella", "Stark Industries"]);
}

#[tokio::test]
async fn list_with_pagination() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (_, body) = get(&handler, "/?page=2&limit=2&sort=name").await;
    assert_eq!(names(&body), ["Initech", "Stark Industries"]);
    assert_eq!(body["meta"], serde_json::json!({ "page": 2, "limit": 2, "total": 5, "totalPage": 3 }));
}

#[tokio::test]
async fn list_with_search() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (_, body) = get(&handler, "/?search=CORP").await;
    assert_eq!(names(&body), ["Acme Corp"]);

    let (_, body) = get(&handler, "/?search=snooz").await;
    assert_eq!(names(&body), ["Stark Industries"]);
}

#[tokio::test]
async fn list_with_fields() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (_, body) = get(&handler, "/?fields=name&limit=1").await;
    let doc = body["data"][0].as_object().unwrap();
    let mut keys: Vec<&str> = doc.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, ["_id", "name"]);
}

#[tokio::test]
async fn list_with_populate() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (_, body) = get(&handler, "/?populate=owner&sort=name").await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data[0]["owner"]["name"], "Wile E.");
    assert_eq!(data[1]["owner"]["name"], "Road Runner");
    assert!(data[2].get("owner").is_none());
}

#[tokio::test]
async fn list_with_fields_and_populate() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (_, body) = get(&handler, "/?fields=name&populate=owner&sort=name").await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data[0]["name"], "Acme Corp");
    assert_eq!(data[0]["owner"]["name"], "Wile E.");
    assert_eq!(data[1]["owner"]["name"], "Road Runner");
    assert!(data[0].get("status").is_none());
    assert!(data[0].get("revenue").is_none());
}

#[tokio::test]
async fn unknown_relation_is_ignored() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (status, body) = get(&handler, "/?populate=ghost&sort=name").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["owner"], "own-1");
}

#[tokio::test]
async fn list_without_matches() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (status, body) = get(&handler, "/?status=closed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!([]));
    assert_eq!(body["meta"], serde_json::json!({ "page": 1, "limit": 0, "total": 0, "totalPage": 0 }));
}

// ── GET /{id} ───────────────────────────────────────────────────

#[tokio::test]
async fn find_one_by_id() {
    let (db, ids) = seed_data();
    let handler = build_handler(&db);

    let (status, body) = get(&handler, &format!("/{}", ids[1].to_hex())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Globex");
    assert_eq!(body["data"]["_id"], ids[1].to_hex());
    assert!(body["data"].get("secret").is_none());
    assert!(body.get("meta").is_none());
}

#[tokio::test]
async fn find_one_with_fields_and_populate() {
    let (db, ids) = seed_data();
    let handler = build_handler(&db);

    let uri = format!("/{}?fields=name&populate=owner", ids[0].to_hex());
    let (_, body) = get(&handler, &uri).await;
    assert_eq!(body["data"]["name"], "Acme Corp");
    assert_eq!(body["data"]["owner"]["name"], "Wile E.");
    assert!(body["data"].get("status").is_none());
}

#[tokio::test]
async fn find_one_missing() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (status, body) = get(&handler, &format!("/{}", ObjectId::new().to_hex())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, serde_json::json!({ "success": false, "message": "accounts not found" }));
}

#[tokio::test]
async fn find_one_rejects_malformed_id() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (status, body) = get(&handler, "/not-an-id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// ── GET /_params ────────────────────────────────────────────────

#[tokio::test]
async fn params_lists_visible_fields() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (status, body) = get(&handler, "/_params").await;
    assert_eq!(status, StatusCode::OK);
    let list: Vec<&str> = body["data"]["list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        list,
        ["page", "limit", "sort", "fields", "search", "populate", "name", "status", "revenue"]
    );
    assert_eq!(body["data"]["single"].as_array().unwrap().len(), 2);
}

// ── Routing ─────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_routes_return_404() {
    let (db, _) = seed_data();
    let handler = build_handler(&db);

    let (status, body) = get(&handler, "/a/b").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, serde_json::json!({ "success": false, "message": "not found" }));

    let req = Request::builder()
        .method(Method::POST)
        .uri("/")
        .body(Vec::new())
        .unwrap();
    assert_eq!(handler.handle(req).await.status(), StatusCode::NOT_FOUND);
}

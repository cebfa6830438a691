use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use hybrid_recommender::{
    api::{create_router, AppState, RequestDefaults},
    error::AppResult,
    loaders::DatasetLoader,
    models::{CatalogEntry, ItemId, RatingRecord},
    services::DatasetSnapshot,
};

const FLOOR: usize = 1;

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 3, day, 12, 0, 0).unwrap()
}

/// Users 1, 2 and 4 agree; user 3 is inverted. Items 50 and 60 are rated once and fall below
/// the popularity floor. User 9 rated nothing else.
fn ratings() -> Vec<RatingRecord> {
    vec![
        RatingRecord::new(1, 1, 5.0, at(1)),
        RatingRecord::new(1, 2, 4.0, at(1)),
        RatingRecord::new(1, 3, 1.0, at(1)),
        RatingRecord::new(1, 4, 2.0, at(2)),
        RatingRecord::new(2, 1, 5.0, at(1)),
        RatingRecord::new(2, 2, 4.5, at(1)),
        RatingRecord::new(2, 3, 1.5, at(1)),
        RatingRecord::new(2, 4, 2.0, at(1)),
        RatingRecord::new(2, 50, 4.5, at(1)),
        RatingRecord::new(3, 1, 1.0, at(1)),
        RatingRecord::new(3, 2, 2.0, at(1)),
        RatingRecord::new(3, 3, 5.0, at(1)),
        RatingRecord::new(3, 4, 4.0, at(1)),
        RatingRecord::new(4, 1, 4.0, at(1)),
        RatingRecord::new(4, 2, 4.0, at(1)),
        RatingRecord::new(4, 3, 2.0, at(1)),
        RatingRecord::new(9, 60, 3.0, at(1)),
    ]
}

fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new(ItemId(1), "Toy Story (1995)".to_string(), "Animation|Comedy"),
        CatalogEntry::new(ItemId(2), "Heat (1995)".to_string(), "Action|Crime|Thriller"),
        CatalogEntry::new(ItemId(3), "Sabrina (1995)".to_string(), "Comedy|Romance"),
        CatalogEntry::new(ItemId(4), "GoldenEye (1995)".to_string(), "Action"),
        CatalogEntry::new(ItemId(50), "Usual Suspects, The (1995)".to_string(), "Crime|Mystery"),
    ]
}

struct FixtureLoader;

#[async_trait::async_trait]
impl DatasetLoader for FixtureLoader {
    async fn load_ratings(&self) -> AppResult<Vec<RatingRecord>> {
        Ok(ratings())
    }

    async fn load_catalog(&self) -> AppResult<Vec<CatalogEntry>> {
        Ok(catalog())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

fn create_test_server() -> TestServer {
    let snapshot = DatasetSnapshot::build(&ratings(), catalog(), FLOOR).unwrap();
    let state = AppState::new(
        snapshot,
        FLOOR,
        Arc::new(FixtureLoader),
        RequestDefaults::default(),
    );
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

fn item_ids(items: &Value) -> Vec<u64> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["item_id"].as_u64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_dataset_stats() {
    let server = create_test_server();
    let response = server.get("/api/v1/dataset").await;
    response.assert_status_ok();

    let stats: Value = response.json();
    assert_eq!(stats["popularity_floor"], 1);
    assert_eq!(stats["users"], 4);
    assert_eq!(stats["items"], 4);
    assert_eq!(stats["matrix_ratings"], 15);
    assert_eq!(stats["ratings"], 17);
    assert_eq!(stats["catalog_size"], 5);
}

#[tokio::test]
async fn test_user_recommendations() {
    let server = create_test_server();
    let response = server.get("/api/v1/users/1/recommendations").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["user_id"], 1);
    // item 50 is below the popularity floor but still scored from raw ratings
    assert_eq!(item_ids(&body["items"]), vec![50, 1, 2]);
    assert_eq!(body["items"][0]["title"], "Usual Suspects, The (1995)");
    assert!(body["items"][0]["score"].as_f64().unwrap() > 3.5);
}

#[tokio::test]
async fn test_user_recommendations_exclude_watched() {
    let server = create_test_server();
    let response = server
        .get("/api/v1/users/1/recommendations")
        .add_query_param("exclude_watched", true)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(item_ids(&body["items"]), vec![50]);
}

#[tokio::test]
async fn test_user_recommendations_strict_threshold_is_empty() {
    let server = create_test_server();
    let response = server
        .get("/api/v1/users/1/recommendations")
        .add_query_param("corr_threshold", 0.999)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_user_recommendations_top_n() {
    let server = create_test_server();
    let response = server
        .get("/api/v1/users/1/recommendations")
        .add_query_param("top_n", 1)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(item_ids(&body["items"]), vec![50]);
}

#[tokio::test]
async fn test_unknown_user_not_found() {
    let server = create_test_server();
    let response = server.get("/api/v1/users/999/recommendations").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["error"], "Unknown user: 999");
}

#[tokio::test]
async fn test_user_with_only_unpopular_ratings() {
    let server = create_test_server();
    let response = server.get("/api/v1/users/9/recommendations").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_coverage_ratio() {
    let server = create_test_server();
    let response = server
        .get("/api/v1/users/1/recommendations")
        .add_query_param("coverage_ratio", 1.5)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_similar_items() {
    let server = create_test_server();
    let response = server.get("/api/v1/items/1/similar").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["item_id"], 1);
    assert_eq!(body["title"], "Toy Story (1995)");
    // item 2 tracks item 1; 3 and 4 move against it
    assert_eq!(item_ids(&body["items"]), vec![2, 3, 4]);
}

#[tokio::test]
async fn test_similar_items_include_self() {
    let server = create_test_server();
    let response = server
        .get("/api/v1/items/1/similar")
        .add_query_param("include_self", true)
        .add_query_param("top_n", 2)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(item_ids(&body["items"]), vec![1, 2]);
    assert!((body["items"][0]["score"].as_f64().unwrap() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_unknown_item_not_found() {
    let server = create_test_server();

    let response = server.get("/api/v1/items/999/similar").await;
    response.assert_status(StatusCode::NOT_FOUND);

    // present in the raw ratings but filtered out of the matrix
    let response = server.get("/api/v1/items/50/similar").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hybrid_recommendations() {
    let server = create_test_server();
    let response = server.get("/api/v1/users/1/hybrid").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["seed_item"], 1);
    assert_eq!(body["seed_title"], "Toy Story (1995)");
    assert_eq!(item_ids(&body["user_based"]), vec![50, 1, 2]);
    assert_eq!(item_ids(&body["item_based"]), vec![2, 3, 4]);
}

#[tokio::test]
async fn test_hybrid_without_seed_rating() {
    let server = create_test_server();
    // user 4 never gave a 5.0
    let response = server.get("/api/v1/users/4/hybrid").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = server
        .get("/api/v1/users/4/hybrid")
        .add_query_param("seed_rating", 4.0)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    // items 1 and 2 share a timestamp; the smaller id wins
    assert_eq!(body["seed_item"], 1);
}

#[tokio::test]
async fn test_reload_with_new_floor() {
    let server = create_test_server();
    let before: Value = server.get("/api/v1/dataset").await.json();

    let response = server
        .post("/api/v1/dataset/reload")
        .json(&json!({ "popularity_floor": 3 }))
        .await;
    response.assert_status_ok();

    let stats: Value = response.json();
    assert_eq!(stats["popularity_floor"], 3);
    assert_eq!(stats["items"], 3);
    assert_ne!(stats["snapshot_id"], before["snapshot_id"]);

    let after: Value = server.get("/api/v1/dataset").await.json();
    assert_eq!(after["snapshot_id"], stats["snapshot_id"]);
}

#[tokio::test]
async fn test_reload_without_body_keeps_floor() {
    let server = create_test_server();
    let response = server.post("/api/v1/dataset/reload").await;
    response.assert_status_ok();

    let stats: Value = response.json();
    assert_eq!(stats["popularity_floor"], 1);
    assert_eq!(stats["items"], 4);
}

#[tokio::test]
async fn test_malformed_reload_body_rejected() {
    let server = create_test_server();
    let before: Value = server.get("/api/v1/dataset").await.json();

    let response = server
        .post("/api/v1/dataset/reload")
        .json(&json!({ "popularity_floor": "three" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let after: Value = server.get("/api/v1/dataset").await.json();
    assert_eq!(after["snapshot_id"], before["snapshot_id"]);
    assert_eq!(after["popularity_floor"], 1);
}

#[tokio::test]
async fn test_failed_reload_keeps_snapshot() {
    let server = create_test_server();
    let before: Value = server.get("/api/v1/dataset").await.json();

    let response = server
        .post("/api/v1/dataset/reload")
        .json(&json!({ "popularity_floor": 100 }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let after: Value = server.get("/api/v1/dataset").await.json();
    assert_eq!(after["snapshot_id"], before["snapshot_id"]);
}

#[tokio::test]
async fn test_request_id_header() {
    let server = create_test_server();

    let response = server.get("/health").await;
    assert!(response.headers().contains_key("x-request-id"));

    let id = "6f1c1a4e-8a54-4c1e-9a0b-3d2f3c6a9b10";
    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static(id),
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], id);
}

//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use devmart_cache::{api::create_router, AppState, Config, MemoryExecutor};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn seed() -> Value {
    json!({
        "pages": [{"id": 1, "slug": "home", "status": "published"}],
        "services": [
            {"id": 1, "title": "Web", "status": "published", "display_order": 2},
            {"id": 2, "title": "Apps", "status": "published", "display_order": 1},
            {"id": 3, "title": "Legacy", "status": "archived", "display_order": 3}
        ],
        "projects": [{"id": 1, "status": "published", "featured": true, "display_order": 1}],
        "blog_posts": [
            {"id": 1, "status": "published", "published_at": "2024-01-01"},
            {"id": 2, "status": "published", "published_at": "2024-02-01"}
        ],
        "testimonials": [{"id": 1, "status": "published"}],
        "settings": [{"key": "site_name", "value": "Devmart"}]
    })
}

fn create_test_state() -> AppState {
    let executor = MemoryExecutor::from_json(seed()).unwrap();
    AppState::from_config(&Config::default(), Arc::new(executor))
}

fn create_test_app(state: AppState) -> Router {
    create_router(state)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// == Health and Stats ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(create_test_state());

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

#[tokio::test]
async fn test_stats_reflect_hits_and_batches() {
    let state = create_test_state();
    let app = create_test_app(state.clone());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(get("/collections/services?status=published"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;

    assert_eq!(json["cache"]["hits"], 1);
    assert_eq!(json["cache"]["misses"], 1);
    assert_eq!(json["cache"]["total_entries"], 1);
    assert_eq!(json["optimizer"]["total_queries"], 2);
    assert_eq!(json["optimizer"]["batches"], 1);
}

// == Collections ==

#[tokio::test]
async fn test_collection_query_with_params() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(get(
            "/collections/services?status=published&order_by=display_order&limit=1&select=id,title",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["collection"], "services");
    assert_eq!(json["count"], 1);
    assert_eq!(json["rows"][0], json!({"id": 2, "title": "Apps"}));
}

#[tokio::test]
async fn test_collection_unbatched_query() {
    let state = create_test_state();
    let app = create_test_app(state.clone());

    let response = app
        .oneshot(get("/collections/services?batch=false"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.optimizer.stats().direct_executions, 1);
}

// == Composites ==

#[tokio::test]
async fn test_homepage_and_settings() {
    let state = create_test_state();
    let app = create_test_app(state.clone());

    let response = app.clone().oneshot(get("/homepage")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["services"].as_array().unwrap().len(), 2);
    assert_eq!(json["blog_posts"][0]["id"], 2);

    let response = app.oneshot(get("/settings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["site_name"], "Devmart");

    assert!(state.cache.has("homepage:data"));
    assert!(state.cache.has("settings:all"));
}

// == Invalidation ==

#[tokio::test]
async fn test_invalidate_cascades_to_homepage() {
    let state = create_test_state();
    let app = create_test_app(state.clone());

    app.clone().oneshot(get("/homepage")).await.unwrap();
    app.clone()
        .oneshot(get("/collections/blog_posts?status=published"))
        .await
        .unwrap();
    app.clone().oneshot(get("/collections/services")).await.unwrap();
    assert!(state.cache.has("homepage:data"));

    let response = app
        .oneshot(post_json(
            "/invalidate",
            json!({"collection": "blog_posts", "operation": "update", "id": "2"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["operation"], "update");
    assert_eq!(json["prefixes"][0], "blog_posts:");
    assert_eq!(json["removed"], 2);

    assert!(!state.cache.has("homepage:data"));
    assert!(state.cache.keys().iter().any(|k| k.starts_with("services:")));
}

#[tokio::test]
async fn test_invalidate_rejects_unknown_operation() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(post_json(
            "/invalidate",
            json!({"collection": "blog_posts", "operation": "upsert"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("upsert"));
}

#[tokio::test]
async fn test_pattern_invalidation() {
    let state = create_test_state();
    for key in ["user:profile:1", "user:profile:2", "user:settings:1"] {
        state
            .cache
            .set(key, &json!({"k": key}), Default::default())
            .unwrap();
    }
    let app = create_test_app(state.clone());

    let response = app
        .oneshot(post_json(
            "/invalidate/pattern",
            json!({"pattern": "^user:profile:", "regex": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 2);
    assert_eq!(state.cache.keys(), vec!["user:settings:1".to_string()]);
}

#[tokio::test]
async fn test_pattern_invalidation_bad_regex() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(post_json(
            "/invalidate/pattern",
            json!({"pattern": "(", "regex": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_cache() {
    let state = create_test_state();
    let app = create_test_app(state.clone());
    app.clone().oneshot(get("/settings")).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["removed"].as_u64().unwrap() >= 1);
    assert!(state.cache.is_empty());
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/invalidate")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

//! Route-level tests driving the full middleware stack via `oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use wanvid_worker::config::WorkerConfig;
use wanvid_worker::router::build_app_router;
use wanvid_worker::state::AppState;

/// State pointing at an engine host where nothing is listening.
fn test_state(input_dir: &std::path::Path) -> AppState {
    let config = WorkerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        engine_host: "127.0.0.1".into(),
        input_dir: input_dir.to_path_buf(),
    };
    AppState::new(config, "test-client".to_string())
}

fn post_run(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/run")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn run_rejects_both_image_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app_router(test_state(dir.path()));

    let body = serde_json::json!({
        "input": {
            "image_path": "/tmp/in.png",
            "image_base64": "AAAA",
            "prompt": "a cat",
            "seed": 1,
            "cfg": 3.5,
            "width": 480,
            "height": 832,
        }
    });

    let response = app.oneshot(post_run(body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("not both"), "unexpected error: {error}");

    // Rejected before any side effect.
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn run_rejects_missing_image_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app_router(test_state(dir.path()));

    let body = serde_json::json!({
        "input": {
            "prompt": "a cat",
            "seed": 1,
            "cfg": 3.5,
            "width": 480,
            "height": 832,
        }
    });

    let response = app.oneshot(post_run(body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("required"));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn run_with_malformed_body_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app_router(test_state(dir.path()));

    let response = app.oneshot(post_run("{not json".to_string())).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn health_answers_without_an_engine() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app_router(test_state(dir.path()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["engine_reachable"].is_boolean());
    assert!(json["status"].is_string());
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#![allow(dead_code)]

use std::sync::Arc;

use assetlink_api::config::ServerConfig;
use assetlink_api::router::build_app_router;
use assetlink_api::state::AppState;
use assetlink_db::transition::{ProcedureTransition, TransitionMode};
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

/// Test `ServerConfig` with the development defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        lock_ttl_mins: 5,
        lock_sweep_interval_secs: 60,
        transition_mode: TransitionMode::Procedure,
    }
}

/// Build the full application over `pool`, behind the production middleware.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(test_state(pool))
}

pub fn test_state(pool: PgPool) -> AppState {
    AppState::new(pool, test_config(), Arc::new(ProcedureTransition))
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

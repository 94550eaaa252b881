//! Integration tests for the `/associations` and `/locks` endpoints.

mod common;

use assetlink_core::locking::LockScope;
use axum::http::StatusCode;
use common::{body_json, build_test_app, delete, get, post, post_json, test_state};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed(pool: &PgPool) -> (i64, i64) {
    let client = post_json(
        build_test_app(pool.clone()),
        "/api/v1/clients",
        json!({ "name": "Acme Telecom" }),
    )
    .await;
    let client_id = body_json(client).await["data"]["id"].as_i64().unwrap();

    let asset = post_json(
        build_test_app(pool.clone()),
        "/api/v1/assets",
        json!({ "kind": "chip", "identifier": "89550000000000000042" }),
    )
    .await;
    let asset_id = body_json(asset).await["data"]["id"].as_i64().unwrap();

    (client_id, asset_id)
}

fn rental(asset_id: i64, client_id: i64) -> serde_json::Value {
    json!({
        "asset_id": asset_id,
        "client_id": client_id,
        "association_type_id": 1,
        "entry_date": "2024-03-01",
        "notes": "customer site"
    })
}

async fn asset_status(pool: &PgPool, asset_id: i64) -> i64 {
    let response = get(build_test_app(pool.clone()), &format!("/api/v1/assets/{asset_id}")).await;
    body_json(response).await["data"]["status_id"].as_i64().unwrap()
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_returns_201_and_marks_asset_rented(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/associations",
        rental(asset_id, client_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["status"], "created");
    assert_eq!(json["data"]["asset_id"], asset_id);
    assert_eq!(json["data"]["exit_date"], serde_json::Value::Null);
    assert_eq!(asset_status(&pool, asset_id).await, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn repeated_create_is_a_noop(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    post_json(build_test_app(pool.clone()), "/api/v1/associations", rental(asset_id, client_id))
        .await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/associations",
        rental(asset_id, client_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "already_associated");
    assert_eq!(json["data"], serde_json::Value::Null);

    let history = get(
        build_test_app(pool),
        &format!("/api/v1/assets/{asset_id}/associations"),
    )
    .await;
    assert_eq!(body_json(history).await["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_with_unknown_type_is_validation_error(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    let mut body = rental(asset_id, client_id);
    body["association_type_id"] = json!(7);

    let response = post_json(build_test_app(pool.clone()), "/api/v1/associations", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert_eq!(asset_status(&pool, asset_id).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_for_unknown_client_is_404(pool: PgPool) {
    let (_, asset_id) = seed(&pool).await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/associations",
        rental(asset_id, 123_456),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(asset_status(&pool, asset_id).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_while_locked_returns_409_resource_locked(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    let state = test_state(pool.clone());
    let guard = state
        .associations
        .locks()
        .acquire_guard(LockScope::Association, asset_id, json!({ "holder": "test" }))
        .await
        .unwrap();

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/associations",
        rental(asset_id, client_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "RESOURCE_LOCKED");
    assert!(json["error"].as_str().unwrap().contains("retry"));

    let lock = get(
        build_test_app(pool.clone()),
        &format!("/api/v1/locks/association/{asset_id}"),
    )
    .await;
    assert_eq!(body_json(lock).await["data"]["operation_data"]["holder"], "test");

    guard.release().await;
    let retry = post_json(
        build_test_app(pool),
        "/api/v1/associations",
        rental(asset_id, client_id),
    )
    .await;
    assert_eq!(retry.status(), StatusCode::CREATED);
}

// ---------------------------------------------------------------------------
// End
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn end_twice_reports_already_ended(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    let created = post_json(
        build_test_app(pool.clone()),
        "/api/v1/associations",
        rental(asset_id, client_id),
    )
    .await;
    let id = body_json(created).await["data"]["id"].as_i64().unwrap();
    let uri = format!("/api/v1/associations/{id}/end");

    let response = post_json(
        build_test_app(pool.clone()),
        &uri,
        json!({ "exit_date": "2024-04-01" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ended");
    assert_eq!(json["data"]["exit_date"], "2024-04-01");
    assert_eq!(asset_status(&pool, asset_id).await, 1);

    let response = post_json(
        build_test_app(pool.clone()),
        &uri,
        json!({ "exit_date": "2024-05-01" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "already_ended");

    let stored = get(build_test_app(pool), &format!("/api/v1/associations/{id}")).await;
    assert_eq!(body_json(stored).await["data"]["exit_date"], "2024-04-01");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn end_defaults_exit_date_to_today(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    let created = post_json(
        build_test_app(pool.clone()),
        "/api/v1/associations",
        rental(asset_id, client_id),
    )
    .await;
    let id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let response = post_json(
        build_test_app(pool),
        &format!("/api/v1/associations/{id}/end"),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let today = chrono::Utc::now().date_naive().to_string();
    assert_eq!(body_json(response).await["data"]["exit_date"], today);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn end_without_body_defaults_exit_date(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    let created = post_json(
        build_test_app(pool.clone()),
        "/api/v1/associations",
        rental(asset_id, client_id),
    )
    .await;
    let id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let response = post(
        build_test_app(pool.clone()),
        &format!("/api/v1/associations/{id}/end"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ended");
    let today = chrono::Utc::now().date_naive().to_string();
    assert_eq!(body["data"]["exit_date"], today);
    assert_eq!(asset_status(&pool, asset_id).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn end_before_entry_date_is_rejected(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    let created = post_json(
        build_test_app(pool.clone()),
        "/api/v1/associations",
        rental(asset_id, client_id),
    )
    .await;
    let id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/associations/{id}/end"),
        json!({ "exit_date": "2024-01-01" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(asset_status(&pool, asset_id).await, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn end_unknown_association_is_validation_error(pool: PgPool) {
    let response = post_json(
        build_test_app(pool),
        "/api/v1/associations/4242/end",
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn end_then_reassociate_to_new_client(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    let created = post_json(
        build_test_app(pool.clone()),
        "/api/v1/associations",
        rental(asset_id, client_id),
    )
    .await;
    let id = body_json(created).await["data"]["id"].as_i64().unwrap();
    post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/associations/{id}/end"),
        json!({ "exit_date": "2024-04-01" }),
    )
    .await;

    let other = post_json(
        build_test_app(pool.clone()),
        "/api/v1/clients",
        json!({ "name": "Globex" }),
    )
    .await;
    let other_id = body_json(other).await["data"]["id"].as_i64().unwrap();

    let mut body = rental(asset_id, other_id);
    body["association_type_id"] = json!(2);
    body["entry_date"] = json!("2024-04-02");
    let response = post_json(build_test_app(pool.clone()), "/api/v1/associations", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(asset_status(&pool, asset_id).await, 3);

    let active = get(
        build_test_app(pool),
        &format!("/api/v1/clients/{other_id}/associations?active_only=true"),
    )
    .await;
    assert_eq!(body_json(active).await["data"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Asset deletion and locks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_associated_asset_conflicts(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    post_json(build_test_app(pool.clone()), "/api/v1/associations", rental(asset_id, client_id))
        .await;

    let response = delete(build_test_app(pool), &format!("/api/v1/assets/{asset_id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn no_lock_remains_after_a_request(pool: PgPool) {
    let (client_id, asset_id) = seed(&pool).await;
    post_json(build_test_app(pool.clone()), "/api/v1/associations", rental(asset_id, client_id))
        .await;

    let response = get(
        build_test_app(pool),
        &format!("/api/v1/locks/ASSOCIATION/{asset_id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], serde_json::Value::Null);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_lock_type_is_bad_request(pool: PgPool) {
    let response = get(build_test_app(pool), "/api/v1/locks/reservation/1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_purges_expired_locks(pool: PgPool) {
    sqlx::query(
        "INSERT INTO operation_locks \
            (lock_id, operation_type, resource_id, owner_token, expires_at) \
         VALUES (gen_random_uuid(), 'ASSOCIATION', 1, gen_random_uuid(), NOW() - INTERVAL '1 minute'), \
                (gen_random_uuid(), 'ASSOCIATION', 2, gen_random_uuid(), NOW() + INTERVAL '5 minutes')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let response = post_json(build_test_app(pool), "/api/v1/locks/sweep", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["swept"], 1);
}

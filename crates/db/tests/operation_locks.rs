//! Integration tests for Postgres-backed operation locks.

use std::sync::Arc;

use assert_matches::assert_matches;
use assetlink_core::association::store::{LockAttempt, LockRequest, ResourceStore};
use assetlink_core::locking::LockScope;
use assetlink_db::repositories::OperationLockRepo;
use assetlink_db::store::PgResourceStore;
use assetlink_db::transition::ManualTransition;
use sqlx::PgPool;
use uuid::Uuid;

fn store(pool: &PgPool) -> PgResourceStore {
    PgResourceStore::new(pool.clone(), Arc::new(ManualTransition))
}

fn request(scope: LockScope, resource_id: i64, owner_token: Uuid) -> LockRequest {
    LockRequest {
        scope,
        resource_id,
        owner_token,
        ttl_mins: 5,
        operation_data: serde_json::json!({ "operation": "CREATE" }),
    }
}

async fn expire_all(pool: &PgPool) {
    sqlx::query("UPDATE operation_locks SET expires_at = NOW() - INTERVAL '1 second'")
        .execute(pool)
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fresh_lock_is_granted(pool: PgPool) {
    let store = store(&pool);
    let owner = Uuid::new_v4();

    let attempt = store
        .acquire_lock(&request(LockScope::Association, 1, owner))
        .await
        .unwrap();
    let LockAttempt::Granted { lock, renewed } = attempt else {
        panic!("expected a grant, got {attempt:?}");
    };
    assert!(!renewed);
    assert_eq!(lock.owner_token, owner);
    assert_eq!(lock.operation_type, LockScope::Association);
    assert_eq!(lock.operation_data["operation"], "CREATE");
    assert!(lock.expires_at > lock.acquired_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_live_lock_blocks_other_owner(pool: PgPool) {
    let store = store(&pool);
    let holder = Uuid::new_v4();
    store
        .acquire_lock(&request(LockScope::Association, 1, holder))
        .await
        .unwrap();

    let attempt = store
        .acquire_lock(&request(LockScope::Association, 1, Uuid::new_v4()))
        .await
        .unwrap();
    assert_matches!(attempt, LockAttempt::Held { holder: h } if h.owner_token == holder);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_same_owner_renews_in_place(pool: PgPool) {
    let store = store(&pool);
    let owner = Uuid::new_v4();
    let LockAttempt::Granted { lock: first, .. } = store
        .acquire_lock(&request(LockScope::Association, 1, owner))
        .await
        .unwrap()
    else {
        panic!("expected a grant");
    };

    let again = store
        .acquire_lock(&request(LockScope::Association, 1, owner))
        .await
        .unwrap();
    assert_matches!(
        again,
        LockAttempt::Granted { lock, renewed: true } if lock.lock_id == first.lock_id
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_expired_lock_is_taken_over(pool: PgPool) {
    let store = store(&pool);
    let LockAttempt::Granted { lock: stale, .. } = store
        .acquire_lock(&request(LockScope::Association, 1, Uuid::new_v4()))
        .await
        .unwrap()
    else {
        panic!("expected a grant");
    };
    expire_all(&pool).await;

    let newcomer = Uuid::new_v4();
    let attempt = store
        .acquire_lock(&request(LockScope::Association, 1, newcomer))
        .await
        .unwrap();
    assert_matches!(
        attempt,
        LockAttempt::Granted { lock, renewed: false }
            if lock.owner_token == newcomer && lock.lock_id != stale.lock_id
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_scopes_do_not_contend(pool: PgPool) {
    let store = store(&pool);
    store
        .acquire_lock(&request(LockScope::Association, 1, Uuid::new_v4()))
        .await
        .unwrap();

    let other = store
        .acquire_lock(&request(LockScope::StatusUpdate, 1, Uuid::new_v4()))
        .await
        .unwrap();
    assert_matches!(other, LockAttempt::Granted { renewed: false, .. });
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_release_removes_only_live_lock(pool: PgPool) {
    let store = store(&pool);
    let LockAttempt::Granted { lock, .. } = store
        .acquire_lock(&request(LockScope::Association, 1, Uuid::new_v4()))
        .await
        .unwrap()
    else {
        panic!("expected a grant");
    };

    assert!(store.release_lock(lock.lock_id).await.unwrap());
    assert!(!store.release_lock(lock.lock_id).await.unwrap());
    assert!(store
        .find_live_lock(LockScope::Association, 1)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cleanup_expired_only_removes_expired(pool: PgPool) {
    let store = store(&pool);
    for resource_id in 1..=3 {
        store
            .acquire_lock(&request(LockScope::Association, resource_id, Uuid::new_v4()))
            .await
            .unwrap();
    }
    expire_all(&pool).await;
    store
        .acquire_lock(&request(LockScope::Association, 4, Uuid::new_v4()))
        .await
        .unwrap();

    assert_eq!(store.sweep_expired_locks().await.unwrap(), 3);
    assert_eq!(OperationLockRepo::cleanup_expired(&pool).await.unwrap(), 0);
    assert!(store
        .find_live_lock(LockScope::Association, 4)
        .await
        .unwrap()
        .is_some());
}

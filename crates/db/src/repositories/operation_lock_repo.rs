//! Repository for the `operation_locks` table.
//!
//! A lock is a row keyed by `(operation_type, resource_id)`. Acquisition is a
//! single upsert whose `WHERE` clause only lets the write through when the
//! existing row has expired or belongs to the same owner, so concurrent
//! callers are serialized by the unique constraint.

use assetlink_core::locking::LockScope;
use assetlink_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::operation_lock::OperationLockRow;

/// Column list for `operation_locks` queries.
const COLUMNS: &str = "\
    id, lock_id, operation_type, resource_id, owner_token, \
    acquired_at, expires_at, operation_data";

pub struct OperationLockRepo;

impl OperationLockRepo {
    /// Take, renew, or take over a lock.
    ///
    /// - No row: insert with `lock_id`.
    /// - Live row of the same owner: keep its id, push the expiry.
    /// - Expired row: replace it with `lock_id`.
    /// - Live row of another owner: nothing written, returns `None`.
    pub async fn acquire(
        pool: &PgPool,
        lock_id: Uuid,
        scope: LockScope,
        resource_id: DbId,
        owner_token: Uuid,
        ttl_mins: i64,
        operation_data: &serde_json::Value,
    ) -> Result<Option<OperationLockRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO operation_locks \
                (lock_id, operation_type, resource_id, owner_token, expires_at, operation_data) \
             VALUES ($1, $2, $3, $4, NOW() + make_interval(mins => $5::INT), $6) \
             ON CONFLICT (operation_type, resource_id) DO UPDATE SET \
                lock_id = CASE WHEN operation_locks.expires_at > NOW() \
                               THEN operation_locks.lock_id ELSE EXCLUDED.lock_id END, \
                acquired_at = CASE WHEN operation_locks.expires_at > NOW() \
                                   THEN operation_locks.acquired_at ELSE NOW() END, \
                owner_token = EXCLUDED.owner_token, \
                expires_at = EXCLUDED.expires_at, \
                operation_data = EXCLUDED.operation_data \
             WHERE operation_locks.expires_at <= NOW() \
                OR operation_locks.owner_token = EXCLUDED.owner_token \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OperationLockRow>(&query)
            .bind(lock_id)
            .bind(scope.as_str())
            .bind(resource_id)
            .bind(owner_token)
            .bind(ttl_mins)
            .bind(operation_data)
            .fetch_optional(pool)
            .await
    }

    /// Delete a live lock. Expired rows are left for the sweep.
    pub async fn release(pool: &PgPool, lock_id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM operation_locks WHERE lock_id = $1 AND expires_at > NOW()")
                .bind(lock_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The live lock for a key, if any.
    pub async fn find_live(
        pool: &PgPool,
        scope: LockScope,
        resource_id: DbId,
    ) -> Result<Option<OperationLockRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM operation_locks \
             WHERE operation_type = $1 AND resource_id = $2 AND expires_at > NOW()"
        );
        sqlx::query_as::<_, OperationLockRow>(&query)
            .bind(scope.as_str())
            .bind(resource_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete every expired lock. Returns the number of rows removed.
    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM operation_locks WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

//! Operation lock rows.

use assetlink_core::association::store::OperationLock;
use assetlink_core::error::CoreError;
use assetlink_core::locking::LockScope;
use assetlink_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `operation_locks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OperationLockRow {
    pub id: DbId,
    pub lock_id: Uuid,
    pub operation_type: String,
    pub resource_id: DbId,
    pub owner_token: Uuid,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
    pub operation_data: serde_json::Value,
}

impl TryFrom<OperationLockRow> for OperationLock {
    type Error = CoreError;

    fn try_from(row: OperationLockRow) -> Result<Self, Self::Error> {
        let operation_type = LockScope::parse(&row.operation_type).ok_or_else(|| {
            CoreError::Internal(format!("Unknown lock scope '{}'", row.operation_type))
        })?;
        Ok(OperationLock {
            lock_id: row.lock_id,
            operation_type,
            resource_id: row.resource_id,
            owner_token: row.owner_token,
            acquired_at: row.acquired_at,
            expires_at: row.expires_at,
            operation_data: row.operation_data,
        })
    }
}

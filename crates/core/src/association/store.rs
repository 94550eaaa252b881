//! The Resource Store seam.
//!
//! Durable storage for assets, associations, and operation locks. The
//! controller only ever reaches persistence through [`ResourceStore`]; the
//! Postgres implementation lives in the db crate and
//! [`super::memory::MemoryStore`] backs the unit tests.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::locking::LockScope;
use crate::status::{AssetStatus, AssociationType};
use crate::types::{Date, DbId, Timestamp};

use super::{AssetState, Association};

/// Errors reported by a [`ResourceStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// A store-enforced constraint rejected the write.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    /// The store failed for a reason the caller cannot act on.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Fully resolved input for an atomic association insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationInsert {
    pub asset_id: DbId,
    pub client_id: DbId,
    pub association_type: AssociationType,
    pub entry_date: Date,
    pub notes: Option<String>,
}

/// A stored advisory lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationLock {
    pub lock_id: Uuid,
    pub operation_type: LockScope,
    pub resource_id: DbId,
    pub owner_token: Uuid,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
    pub operation_data: serde_json::Value,
}

/// Parameters of a lock acquisition.
#[derive(Debug, Clone)]
pub struct LockRequest {
    pub scope: LockScope,
    pub resource_id: DbId,
    pub owner_token: Uuid,
    pub ttl_mins: i64,
    pub operation_data: serde_json::Value,
}

/// What the store did with a lock request.
#[derive(Debug, Clone, PartialEq)]
pub enum LockAttempt {
    /// The caller now holds the lock. `renewed` is set when the caller
    /// already held it and only the expiry moved.
    Granted { lock: OperationLock, renewed: bool },
    /// A live lock for the same key belongs to another owner.
    Held { holder: OperationLock },
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Current status and soft-delete marker of an asset, `None` if unknown.
    async fn read_asset_status(&self, asset_id: DbId) -> Result<Option<AssetState>, StoreError>;

    /// The asset's association with no exit date, if any.
    async fn read_active_association(
        &self,
        asset_id: DbId,
    ) -> Result<Option<Association>, StoreError>;

    /// Any association by id, active or closed.
    async fn read_association(
        &self,
        association_id: DbId,
    ) -> Result<Option<Association>, StoreError>;

    /// Insert the association and set the asset status as one atomic unit.
    async fn create_association_atomic(
        &self,
        input: &AssociationInsert,
        new_status: AssetStatus,
    ) -> Result<Association, StoreError>;

    /// Set the exit date of an active association and revert the asset
    /// status as one atomic unit. An already-closed association is reported
    /// as [`StoreError::NotFound`] and left untouched.
    async fn close_association_atomic(
        &self,
        association_id: DbId,
        exit_date: Date,
        revert_status: AssetStatus,
    ) -> Result<Association, StoreError>;

    /// Grant, renew, or refuse an advisory lock. Expired locks never block.
    async fn acquire_lock(&self, request: &LockRequest) -> Result<LockAttempt, StoreError>;

    /// Drop a lock. Returns `false` when no such live lock exists.
    async fn release_lock(&self, lock_id: Uuid) -> Result<bool, StoreError>;

    /// Delete every lock whose expiry has passed. Returns the number removed.
    async fn sweep_expired_locks(&self) -> Result<u64, StoreError>;

    /// The live lock for a key, if any.
    async fn find_live_lock(
        &self,
        scope: LockScope,
        resource_id: DbId,
    ) -> Result<Option<OperationLock>, StoreError>;
}

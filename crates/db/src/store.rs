//! Postgres-backed [`ResourceStore`].

use std::sync::Arc;

use assetlink_core::association::store::{
    AssociationInsert, LockAttempt, LockRequest, OperationLock, ResourceStore, StoreError,
};
use assetlink_core::association::{AssetState, Association};
use assetlink_core::error::CoreError;
use assetlink_core::locking::LockScope;
use assetlink_core::status::AssetStatus;
use assetlink_core::types::{Date, DbId};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repositories::{AssetRepo, AssociationRepo, OperationLockRepo};
use crate::transition::{store_error, TransitionStrategy};

pub struct PgResourceStore {
    pool: PgPool,
    strategy: Arc<dyn TransitionStrategy>,
}

impl PgResourceStore {
    pub fn new(pool: PgPool, strategy: Arc<dyn TransitionStrategy>) -> Self {
        Self { pool, strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}

fn decode(err: CoreError) -> StoreError {
    StoreError::Backend(format!("Undecodable row: {err}"))
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn read_asset_status(&self, asset_id: DbId) -> Result<Option<AssetState>, StoreError> {
        AssetRepo::find_by_id_include_deleted(&self.pool, asset_id)
            .await
            .map_err(store_error)?
            .map(|asset| asset.to_state().map_err(decode))
            .transpose()
    }

    async fn read_active_association(
        &self,
        asset_id: DbId,
    ) -> Result<Option<Association>, StoreError> {
        AssociationRepo::find_active_for_asset(&self.pool, asset_id)
            .await
            .map_err(store_error)?
            .map(|row| Association::try_from(row).map_err(decode))
            .transpose()
    }

    async fn read_association(
        &self,
        association_id: DbId,
    ) -> Result<Option<Association>, StoreError> {
        AssociationRepo::find_by_id(&self.pool, association_id)
            .await
            .map_err(store_error)?
            .map(|row| Association::try_from(row).map_err(decode))
            .transpose()
    }

    async fn create_association_atomic(
        &self,
        input: &AssociationInsert,
        new_status: AssetStatus,
    ) -> Result<Association, StoreError> {
        let row = self.strategy.create(&self.pool, input, new_status).await?;
        Association::try_from(row).map_err(decode)
    }

    async fn close_association_atomic(
        &self,
        association_id: DbId,
        exit_date: Date,
        revert_status: AssetStatus,
    ) -> Result<Association, StoreError> {
        let row = self
            .strategy
            .close(&self.pool, association_id, exit_date, revert_status)
            .await?;
        Association::try_from(row).map_err(decode)
    }

    async fn acquire_lock(&self, request: &LockRequest) -> Result<LockAttempt, StoreError> {
        // The holder may release between the upsert and the holder read;
        // one retry covers that window.
        for _ in 0..2 {
            let lock_id = Uuid::new_v4();
            let granted = OperationLockRepo::acquire(
                &self.pool,
                lock_id,
                request.scope,
                request.resource_id,
                request.owner_token,
                request.ttl_mins,
                &request.operation_data,
            )
            .await
            .map_err(store_error)?;

            if let Some(row) = granted {
                let lock = OperationLock::try_from(row).map_err(decode)?;
                let renewed = lock.lock_id != lock_id;
                return Ok(LockAttempt::Granted { lock, renewed });
            }

            if let Some(holder) = self.find_live_lock(request.scope, request.resource_id).await? {
                return Ok(LockAttempt::Held { holder });
            }
        }

        Err(StoreError::Backend(format!(
            "Lock {}:{} was contended but no live holder was found",
            request.scope, request.resource_id
        )))
    }

    async fn release_lock(&self, lock_id: Uuid) -> Result<bool, StoreError> {
        OperationLockRepo::release(&self.pool, lock_id)
            .await
            .map_err(store_error)
    }

    async fn sweep_expired_locks(&self) -> Result<u64, StoreError> {
        OperationLockRepo::cleanup_expired(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn find_live_lock(
        &self,
        scope: LockScope,
        resource_id: DbId,
    ) -> Result<Option<OperationLock>, StoreError> {
        OperationLockRepo::find_live(&self.pool, scope, resource_id)
            .await
            .map_err(store_error)?
            .map(|row| OperationLock::try_from(row).map_err(decode))
            .transpose()
    }
}

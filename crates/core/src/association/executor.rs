//! Atomic association transitions.
//!
//! Maps the association type to the asset status through the fixed table in
//! [`AssociationType::leased_status`] and hands the paired write to the
//! store's atomic primitives. Partial writes are the store's job to prevent;
//! this layer only decides *what* is written.

use std::sync::Arc;

use crate::error::CoreError;
use crate::status::{AssetStatus, AssociationType};
use crate::types::{Date, DbId};

use super::store::{AssociationInsert, ResourceStore, StoreError};
use super::{check_notes, Association, NewAssociation};

/// Performs the paired asset-status / association writes.
pub struct TransitionExecutor {
    store: Arc<dyn ResourceStore>,
}

impl TransitionExecutor {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Open an association and move the asset into the matching leased status.
    pub async fn execute(&self, input: &NewAssociation) -> Result<Association, CoreError> {
        let association_type = AssociationType::try_from(input.association_type_id)?;
        check_notes(input.notes.as_deref())?;
        let new_status = association_type.leased_status();

        let insert = AssociationInsert {
            asset_id: input.asset_id,
            client_id: input.client_id,
            association_type,
            entry_date: input.entry_date,
            notes: input.notes.clone(),
        };

        let association = self
            .store
            .create_association_atomic(&insert, new_status)
            .await
            .map_err(store_to_core)?;

        tracing::info!(
            association_id = association.id,
            asset_id = association.asset_id,
            client_id = association.client_id,
            association_type = %association_type,
            new_status = %new_status,
            "Association created"
        );
        Ok(association)
    }

    /// Close an active association and release the asset.
    pub async fn end(&self, association_id: DbId, exit_date: Date) -> Result<Association, CoreError> {
        let association = self
            .store
            .close_association_atomic(association_id, exit_date, AssetStatus::RELEASED)
            .await
            .map_err(store_to_core)?;

        tracing::info!(
            association_id,
            asset_id = association.asset_id,
            %exit_date,
            "Association ended"
        );
        Ok(association)
    }
}

/// Translate a store failure into the domain error taxonomy.
pub fn store_to_core(err: StoreError) -> CoreError {
    match err {
        StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
        StoreError::Conflict(msg) => CoreError::Conflict(msg),
        StoreError::Backend(msg) => CoreError::Internal(msg),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;
    use crate::association::memory::MemoryStore;

    fn march_first() -> Date {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn input(asset_id: DbId, type_id: i16) -> NewAssociation {
        NewAssociation {
            asset_id,
            client_id: 7,
            association_type_id: type_id,
            entry_date: march_first(),
            notes: Some("first lease".to_string()),
        }
    }

    #[tokio::test]
    async fn rental_marks_asset_rented() {
        let store = Arc::new(MemoryStore::new());
        let asset_id = store.insert_asset(AssetStatus::Available).await;
        let executor = TransitionExecutor::new(store.clone());

        let association = executor.execute(&input(asset_id, 1)).await.unwrap();
        assert!(association.is_active());
        assert_eq!(association.entry_date, march_first());
        assert_eq!(association.notes.as_deref(), Some("first lease"));
        assert_eq!(store.asset_status(asset_id).await, Some(AssetStatus::Rented));
    }

    #[tokio::test]
    async fn subscription_marks_asset_subscribed() {
        let store = Arc::new(MemoryStore::new());
        let asset_id = store.insert_asset(AssetStatus::Available).await;
        let executor = TransitionExecutor::new(store.clone());

        executor.execute(&input(asset_id, 2)).await.unwrap();
        assert_eq!(store.asset_status(asset_id).await, Some(AssetStatus::Subscribed));
    }

    #[tokio::test]
    async fn unknown_type_is_hard_error_without_writes() {
        let store = Arc::new(MemoryStore::new());
        let asset_id = store.insert_asset(AssetStatus::Available).await;
        let executor = TransitionExecutor::new(store.clone());

        let result = executor.execute(&input(asset_id, 3)).await;
        assert_matches!(result, Err(CoreError::Validation(_)));
        assert!(store.associations_for(asset_id).await.is_empty());
        assert_eq!(store.asset_status(asset_id).await, Some(AssetStatus::Available));
    }

    #[tokio::test]
    async fn failed_status_update_rolls_back_association() {
        let store = Arc::new(MemoryStore::new());
        let asset_id = store.insert_asset(AssetStatus::Available).await;
        let executor = TransitionExecutor::new(store.clone());

        store.faults().fail_status_update(true);
        let result = executor.execute(&input(asset_id, 1)).await;
        assert_matches!(result, Err(CoreError::Internal(_)));

        assert!(store.associations_for(asset_id).await.is_empty());
        assert_eq!(store.asset_status(asset_id).await, Some(AssetStatus::Available));
    }

    #[tokio::test]
    async fn end_reverts_asset_to_available() {
        let store = Arc::new(MemoryStore::new());
        let asset_id = store.insert_asset(AssetStatus::Available).await;
        let executor = TransitionExecutor::new(store.clone());
        let created = executor.execute(&input(asset_id, 1)).await.unwrap();

        let exit = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let ended = executor.end(created.id, exit).await.unwrap();
        assert_eq!(ended.exit_date, Some(exit));
        assert_eq!(store.asset_status(asset_id).await, Some(AssetStatus::Available));
    }

    #[tokio::test]
    async fn failed_status_update_keeps_association_open() {
        let store = Arc::new(MemoryStore::new());
        let asset_id = store.insert_asset(AssetStatus::Available).await;
        let executor = TransitionExecutor::new(store.clone());
        let created = executor.execute(&input(asset_id, 1)).await.unwrap();

        store.faults().fail_status_update(true);
        let result = executor
            .end(created.id, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
            .await;
        assert_matches!(result, Err(CoreError::Internal(_)));

        let rows = store.associations_for(asset_id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].exit_date, None);
        assert_eq!(rows[0].updated_at, created.updated_at);
        assert_eq!(store.asset_status(asset_id).await, Some(AssetStatus::Rented));
    }

    #[tokio::test]
    async fn end_twice_keeps_first_exit_date() {
        let store = Arc::new(MemoryStore::new());
        let asset_id = store.insert_asset(AssetStatus::Available).await;
        let executor = TransitionExecutor::new(store.clone());
        let created = executor.execute(&input(asset_id, 1)).await.unwrap();

        let exit = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        executor.end(created.id, exit).await.unwrap();
        let again = executor
            .end(created.id, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
            .await;
        assert_matches!(again, Err(CoreError::NotFound { .. }));
        assert_eq!(store.associations_for(asset_id).await[0].exit_date, Some(exit));
    }

    #[tokio::test]
    async fn second_active_association_is_refused_by_store() {
        let store = Arc::new(MemoryStore::new());
        let asset_id = store.insert_asset(AssetStatus::Available).await;
        let executor = TransitionExecutor::new(store.clone());
        executor.execute(&input(asset_id, 1)).await.unwrap();

        let second = executor.execute(&input(asset_id, 2)).await;
        assert_matches!(second, Err(CoreError::Conflict(_)));
        assert_eq!(store.associations_for(asset_id).await.len(), 1);
    }
}

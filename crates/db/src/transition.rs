//! Atomic association transitions against Postgres.
//!
//! Two interchangeable strategies perform the paired association/asset
//! write. [`ProcedureTransition`] calls the `create_association_tx` and
//! `close_association_tx` functions in one round trip;
//! [`ManualTransition`] runs the same steps inside an explicit transaction.
//! Which one is used is decided once at startup by probing `pg_proc`, never
//! by inspecting error text at call time.

use std::str::FromStr;
use std::sync::Arc;

use assetlink_core::association::store::{AssociationInsert, StoreError};
use assetlink_core::status::AssetStatus;
use assetlink_core::types::{Date, DbId};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use crate::models::association::AssociationRow;
use crate::repositories::association_repo::COLUMNS;

/// Names of the stored functions the procedure strategy depends on.
pub const TRANSITION_PROCEDURES: [&str; 2] = ["create_association_tx", "close_association_tx"];

#[async_trait]
pub trait TransitionStrategy: Send + Sync {
    /// Short name for logs and the health report.
    fn name(&self) -> &'static str;

    async fn create(
        &self,
        pool: &PgPool,
        input: &AssociationInsert,
        new_status: AssetStatus,
    ) -> Result<AssociationRow, StoreError>;

    async fn close(
        &self,
        pool: &PgPool,
        association_id: DbId,
        exit_date: Date,
        revert_status: AssetStatus,
    ) -> Result<AssociationRow, StoreError>;
}

// ---------------------------------------------------------------------------
// Stored-procedure path
// ---------------------------------------------------------------------------

pub struct ProcedureTransition;

#[async_trait]
impl TransitionStrategy for ProcedureTransition {
    fn name(&self) -> &'static str {
        "procedure"
    }

    async fn create(
        &self,
        pool: &PgPool,
        input: &AssociationInsert,
        new_status: AssetStatus,
    ) -> Result<AssociationRow, StoreError> {
        let query =
            format!("SELECT {COLUMNS} FROM create_association_tx($1, $2, $3, $4, $5, $6)");
        sqlx::query_as::<_, AssociationRow>(&query)
            .bind(input.asset_id)
            .bind(input.client_id)
            .bind(input.association_type.id())
            .bind(input.entry_date)
            .bind(input.notes.as_deref())
            .bind(new_status.id())
            .fetch_one(pool)
            .await
            .map_err(|e| create_error(e, input))
    }

    async fn close(
        &self,
        pool: &PgPool,
        association_id: DbId,
        exit_date: Date,
        revert_status: AssetStatus,
    ) -> Result<AssociationRow, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM close_association_tx($1, $2, $3)");
        sqlx::query_as::<_, AssociationRow>(&query)
            .bind(association_id)
            .bind(exit_date)
            .bind(revert_status.id())
            .fetch_one(pool)
            .await
            .map_err(|e| close_error(e, association_id))
    }
}

// ---------------------------------------------------------------------------
// Manual transaction path
// ---------------------------------------------------------------------------

/// Association write first, asset update second, explicit rollback on any
/// failure in between.
pub struct ManualTransition;

impl ManualTransition {
    async fn create_steps(
        conn: &mut PgConnection,
        input: &AssociationInsert,
        new_status: AssetStatus,
    ) -> Result<AssociationRow, StoreError> {
        let query = format!(
            "INSERT INTO associations \
                (asset_id, client_id, association_type_id, entry_date, notes) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AssociationRow>(&query)
            .bind(input.asset_id)
            .bind(input.client_id)
            .bind(input.association_type.id())
            .bind(input.entry_date)
            .bind(input.notes.as_deref())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| create_error(e, input))?;

        let updated = sqlx::query(
            "UPDATE assets SET status_id = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(input.asset_id)
        .bind(new_status.id())
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "Asset",
                id: input.asset_id,
            });
        }
        Ok(row)
    }

    async fn close_steps(
        conn: &mut PgConnection,
        association_id: DbId,
        exit_date: Date,
        revert_status: AssetStatus,
    ) -> Result<AssociationRow, StoreError> {
        let query = format!(
            "UPDATE associations SET exit_date = $2 \
             WHERE id = $1 AND exit_date IS NULL \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AssociationRow>(&query)
            .bind(association_id)
            .bind(exit_date)
            .fetch_optional(&mut *conn)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound {
                entity: "Active association",
                id: association_id,
            })?;

        sqlx::query("UPDATE assets SET status_id = $2 WHERE id = $1")
            .bind(row.asset_id)
            .bind(revert_status.id())
            .execute(&mut *conn)
            .await
            .map_err(store_error)?;
        Ok(row)
    }
}

#[async_trait]
impl TransitionStrategy for ManualTransition {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn create(
        &self,
        pool: &PgPool,
        input: &AssociationInsert,
        new_status: AssetStatus,
    ) -> Result<AssociationRow, StoreError> {
        let mut tx = pool.begin().await.map_err(store_error)?;
        match Self::create_steps(&mut tx, input, new_status).await {
            Ok(row) => {
                tx.commit().await.map_err(store_error)?;
                Ok(row)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn close(
        &self,
        pool: &PgPool,
        association_id: DbId,
        exit_date: Date,
        revert_status: AssetStatus,
    ) -> Result<AssociationRow, StoreError> {
        let mut tx = pool.begin().await.map_err(store_error)?;
        match Self::close_steps(&mut tx, association_id, exit_date, revert_status).await {
            Ok(row) => {
                tx.commit().await.map_err(store_error)?;
                Ok(row)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }
}

async fn rollback(tx: sqlx::Transaction<'_, sqlx::Postgres>) {
    if let Err(e) = tx.rollback().await {
        // The connection is discarded by the pool; nothing was committed.
        tracing::error!(error = %e, "Association transaction rollback failed");
    }
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const NO_DATA_FOUND: &str = "P0002";

/// Map a database error with no operation-specific meaning.
pub fn store_error(err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Conflict(db.constraint().unwrap_or(db.message()).to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

fn create_error(err: sqlx::Error, input: &AssociationInsert) -> StoreError {
    if let Some(db) = err.as_database_error() {
        match (db.code().as_deref(), db.constraint()) {
            (Some(FOREIGN_KEY_VIOLATION), Some("fk_associations_client")) => {
                return StoreError::NotFound {
                    entity: "Client",
                    id: input.client_id,
                };
            }
            (Some(FOREIGN_KEY_VIOLATION), Some("fk_associations_asset"))
            | (Some(NO_DATA_FOUND), _) => {
                return StoreError::NotFound {
                    entity: "Asset",
                    id: input.asset_id,
                };
            }
            _ => {}
        }
    }
    store_error(err)
}

fn close_error(err: sqlx::Error, association_id: DbId) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.code().as_deref() == Some(NO_DATA_FOUND) {
            return StoreError::NotFound {
                entity: "Active association",
                id: association_id,
            };
        }
    }
    store_error(err)
}

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

/// Operator override for strategy selection (`ASSOCIATION_TRANSITION_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionMode {
    /// Use the procedures when installed, else the manual transaction.
    #[default]
    Auto,
    Procedure,
    Manual,
}

impl FromStr for TransitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "procedure" => Ok(Self::Procedure),
            "manual" => Ok(Self::Manual),
            other => Err(format!(
                "Unknown transition mode '{other}', expected auto, procedure, or manual"
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("Transition procedures are not installed in this database")]
    ProceduresMissing,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Whether both transition functions exist in the connected database.
pub async fn procedures_available(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let (found,): (i64,) = sqlx::query_as(
        "SELECT COUNT(DISTINCT proname) FROM pg_proc WHERE proname = ANY($1)",
    )
    .bind(TRANSITION_PROCEDURES.to_vec())
    .fetch_one(pool)
    .await?;
    Ok(found == TRANSITION_PROCEDURES.len() as i64)
}

/// Pick the transition strategy for this process.
pub async fn select_strategy(
    pool: &PgPool,
    mode: TransitionMode,
) -> Result<Arc<dyn TransitionStrategy>, StrategyError> {
    let strategy: Arc<dyn TransitionStrategy> = match mode {
        TransitionMode::Manual => Arc::new(ManualTransition),
        TransitionMode::Procedure => {
            if !procedures_available(pool).await? {
                return Err(StrategyError::ProceduresMissing);
            }
            Arc::new(ProcedureTransition)
        }
        TransitionMode::Auto => {
            if procedures_available(pool).await? {
                Arc::new(ProcedureTransition)
            } else {
                tracing::warn!("Transition procedures missing, using manual transactions");
                Arc::new(ManualTransition)
            }
        }
    };
    tracing::info!(strategy = strategy.name(), ?mode, "Association transition strategy selected");
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("AUTO".parse::<TransitionMode>(), Ok(TransitionMode::Auto));
        assert_eq!(" procedure ".parse::<TransitionMode>(), Ok(TransitionMode::Procedure));
        assert_eq!("Manual".parse::<TransitionMode>(), Ok(TransitionMode::Manual));
    }

    #[test]
    fn unknown_mode_rejected() {
        let err = "fastest".parse::<TransitionMode>().unwrap_err();
        assert!(err.contains("fastest"));
    }

    #[test]
    fn default_mode_is_auto() {
        assert_eq!(TransitionMode::default(), TransitionMode::Auto);
    }
}

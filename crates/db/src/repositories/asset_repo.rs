//! Repository for the `assets` table.
//!
//! Status changes caused by associations never go through here; they are
//! written by [`crate::transition`] together with the association row.

use assetlink_core::status::StatusId;
use assetlink_core::types::DbId;
use sqlx::PgPool;

use crate::models::asset::{Asset, CreateAsset};

use super::page;

/// Column list for `assets` queries.
const COLUMNS: &str = "\
    id, kind, identifier, status_id, notes, \
    deleted_at, created_at, updated_at";

pub struct AssetRepo;

impl AssetRepo {
    /// Register a new asset with the given initial status.
    pub async fn create(
        pool: &PgPool,
        input: &CreateAsset,
        status_id: StatusId,
    ) -> Result<Asset, sqlx::Error> {
        let query = format!(
            "INSERT INTO assets (kind, identifier, status_id, notes) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(&input.kind)
            .bind(&input.identifier)
            .bind(status_id)
            .bind(input.notes.as_deref())
            .fetch_one(pool)
            .await
    }

    /// Find a live (non-deleted) asset.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Asset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assets WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Asset>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an asset regardless of its soft-delete marker.
    pub async fn find_by_id_include_deleted(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Asset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assets WHERE id = $1");
        sqlx::query_as::<_, Asset>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List live assets, newest first, optionally filtered by status.
    pub async fn list(
        pool: &PgPool,
        status_id: Option<StatusId>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Asset>, sqlx::Error> {
        let (limit, offset) = page(limit, offset);
        let query = format!(
            "SELECT {COLUMNS} FROM assets \
             WHERE deleted_at IS NULL AND ($1::SMALLINT IS NULL OR status_id = $1) \
             ORDER BY id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(status_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Soft-delete an asset that has no active association.
    ///
    /// Returns `false` when the asset is missing, already deleted, or still
    /// associated. The association check and the update are one statement.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE assets SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
               AND NOT EXISTS (\
                   SELECT 1 FROM associations WHERE asset_id = $1 AND exit_date IS NULL\
               )",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

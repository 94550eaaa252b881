//! Read access to the `associations` table.

use assetlink_core::types::DbId;
use sqlx::PgPool;

use crate::models::association::AssociationRow;

/// Column list for `associations` queries.
pub(crate) const COLUMNS: &str = "\
    id, asset_id, client_id, association_type_id, \
    entry_date, exit_date, notes, created_at, updated_at";

pub struct AssociationRepo;

impl AssociationRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<AssociationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM associations WHERE id = $1");
        sqlx::query_as::<_, AssociationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The asset's association with no exit date, if any.
    pub async fn find_active_for_asset(
        pool: &PgPool,
        asset_id: DbId,
    ) -> Result<Option<AssociationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM associations WHERE asset_id = $1 AND exit_date IS NULL"
        );
        sqlx::query_as::<_, AssociationRow>(&query)
            .bind(asset_id)
            .fetch_optional(pool)
            .await
    }

    /// Full association history of an asset, newest first.
    pub async fn list_for_asset(
        pool: &PgPool,
        asset_id: DbId,
    ) -> Result<Vec<AssociationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM associations WHERE asset_id = $1 \
             ORDER BY entry_date DESC, id DESC"
        );
        sqlx::query_as::<_, AssociationRow>(&query)
            .bind(asset_id)
            .fetch_all(pool)
            .await
    }

    /// Associations of a client, optionally only the active ones.
    pub async fn list_for_client(
        pool: &PgPool,
        client_id: DbId,
        active_only: bool,
    ) -> Result<Vec<AssociationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM associations \
             WHERE client_id = $1 AND (NOT $2 OR exit_date IS NULL) \
             ORDER BY entry_date DESC, id DESC"
        );
        sqlx::query_as::<_, AssociationRow>(&query)
            .bind(client_id)
            .bind(active_only)
            .fetch_all(pool)
            .await
    }
}

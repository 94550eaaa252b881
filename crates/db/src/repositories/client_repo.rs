//! Repository for the `clients` table.

use assetlink_core::types::DbId;
use sqlx::PgPool;

use crate::models::client::{Client, CreateClient};

use super::page;

/// Column list for `clients` queries.
const COLUMNS: &str = "id, name, document, email, phone, deleted_at, created_at, updated_at";

pub struct ClientRepo;

impl ClientRepo {
    pub async fn create(pool: &PgPool, input: &CreateClient) -> Result<Client, sqlx::Error> {
        let query = format!(
            "INSERT INTO clients (name, document, email, phone) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(&input.name)
            .bind(input.document.as_deref())
            .bind(input.email.as_deref())
            .bind(input.phone.as_deref())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Client>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM clients WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Client>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List live clients ordered by name.
    pub async fn list(
        pool: &PgPool,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Client>, sqlx::Error> {
        let (limit, offset) = page(limit, offset);
        let query = format!(
            "SELECT {COLUMNS} FROM clients WHERE deleted_at IS NULL \
             ORDER BY name, id LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}

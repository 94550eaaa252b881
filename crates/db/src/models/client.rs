//! Client models.

use assetlink_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `clients` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Client {
    pub id: DbId,
    pub name: String,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClient {
    pub name: String,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

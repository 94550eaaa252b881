//! Asset registry models (chips, routers, equipment).

use assetlink_core::association::AssetState;
use assetlink_core::error::CoreError;
use assetlink_core::status::{AssetStatus, StatusId};
use assetlink_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Asset {
    pub id: DbId,
    pub kind: String,
    pub identifier: String,
    pub status_id: StatusId,
    pub notes: Option<String>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Asset {
    /// The slice of the row the association controller reasons about.
    pub fn to_state(&self) -> Result<AssetState, CoreError> {
        Ok(AssetState {
            asset_id: self.id,
            status: AssetStatus::try_from(self.status_id)?,
            deleted_at: self.deleted_at,
        })
    }
}

/// DTO for registering an asset. `status_id` defaults to available.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAsset {
    pub kind: String,
    pub identifier: String,
    pub status_id: Option<StatusId>,
    pub notes: Option<String>,
}

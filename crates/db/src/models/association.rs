//! Association rows.
//!
//! Rows are only written through the strategies in [`crate::transition`],
//! which pair every insert or close with the asset status change.

use assetlink_core::association::Association;
use assetlink_core::error::CoreError;
use assetlink_core::status::{AssociationType, StatusId};
use assetlink_core::types::{Date, DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `associations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssociationRow {
    pub id: DbId,
    pub asset_id: DbId,
    pub client_id: DbId,
    pub association_type_id: StatusId,
    pub entry_date: Date,
    pub exit_date: Option<Date>,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<AssociationRow> for Association {
    type Error = CoreError;

    fn try_from(row: AssociationRow) -> Result<Self, Self::Error> {
        Ok(Association {
            id: row.id,
            asset_id: row.asset_id,
            client_id: row.client_id,
            association_type_id: AssociationType::try_from(row.association_type_id)?,
            entry_date: row.entry_date,
            exit_date: row.exit_date,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

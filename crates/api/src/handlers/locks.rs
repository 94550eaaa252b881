//! Read-only lock inspection and the on-demand sweep.

use assetlink_core::association::executor::store_to_core;
use assetlink_core::association::store::OperationLock;
use assetlink_core::locking::LockScope;
use assetlink_core::types::DbId;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SweepResult {
    pub swept: u64,
}

/// GET /api/v1/locks/{operation_type}/{resource_id}
///
/// The live lock on the key, or `data: null`.
pub async fn get_lock(
    State(state): State<AppState>,
    Path((operation_type, resource_id)): Path<(String, DbId)>,
) -> AppResult<Json<DataResponse<Option<OperationLock>>>> {
    let scope = LockScope::parse(&operation_type.to_ascii_uppercase()).ok_or_else(|| {
        let valid: Vec<&str> = LockScope::ALL.iter().map(|s| s.as_str()).collect();
        AppError::BadRequest(format!(
            "Unknown operation type: '{operation_type}'. Valid types: {}",
            valid.join(", ")
        ))
    })?;

    let lock = state
        .associations
        .locks()
        .current(scope, resource_id)
        .await
        .map_err(store_to_core)?;
    Ok(Json(DataResponse { data: lock }))
}

/// POST /api/v1/locks/sweep
pub async fn sweep_expired(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<SweepResult>>> {
    let swept = state
        .associations
        .locks()
        .sweep_expired()
        .await
        .map_err(store_to_core)?;
    tracing::info!(swept, "Expired locks swept on request");
    Ok(Json(DataResponse {
        data: SweepResult { swept },
    }))
}

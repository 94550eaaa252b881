//! Handlers for the `/assets` resource.
//!
//! Registration and soft-delete only. An asset's leased status is owned by
//! the association endpoints and cannot be set here.

use assetlink_core::error::CoreError;
use assetlink_core::registry::{initial_asset_status, validate_asset_kind, validate_identifier};
use assetlink_core::status::StatusId;
use assetlink_core::types::DbId;
use assetlink_db::models::asset::{Asset, CreateAsset};
use assetlink_db::models::association::AssociationRow;
use assetlink_db::repositories::{AssetRepo, AssociationRepo};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AssetListParams {
    pub status_id: Option<StatusId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/v1/assets
pub async fn create_asset(
    State(state): State<AppState>,
    Json(input): Json<CreateAsset>,
) -> AppResult<(StatusCode, Json<DataResponse<Asset>>)> {
    validate_asset_kind(&input.kind)?;
    validate_identifier(&input.identifier)?;
    let status = initial_asset_status(input.status_id)?;

    let asset = AssetRepo::create(&state.pool, &input, status.id()).await?;
    tracing::info!(asset_id = asset.id, kind = %asset.kind, %status, "Asset registered");
    Ok((StatusCode::CREATED, Json(DataResponse { data: asset })))
}

/// GET /api/v1/assets
pub async fn list_assets(
    State(state): State<AppState>,
    Query(params): Query<AssetListParams>,
) -> AppResult<Json<DataResponse<Vec<Asset>>>> {
    let assets =
        AssetRepo::list(&state.pool, params.status_id, params.limit, params.offset).await?;
    Ok(Json(DataResponse { data: assets }))
}

/// GET /api/v1/assets/{id}
pub async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Asset>>> {
    let asset = AssetRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Asset", id })?;
    Ok(Json(DataResponse { data: asset }))
}

/// DELETE /api/v1/assets/{id}
///
/// 204 on success, 409 while an association is open, 404 otherwise.
pub async fn delete_asset(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if AssetRepo::soft_delete(&state.pool, id).await? {
        tracing::info!(asset_id = id, "Asset soft-deleted");
        return Ok(StatusCode::NO_CONTENT);
    }

    match AssetRepo::find_by_id(&state.pool, id).await? {
        Some(_) => Err(CoreError::Conflict(format!(
            "Asset {id} has an active association; end it before deleting"
        ))
        .into()),
        None => Err(CoreError::NotFound { entity: "Asset", id }.into()),
    }
}

/// GET /api/v1/assets/{id}/associations
pub async fn list_asset_associations(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<AssociationRow>>>> {
    AssetRepo::find_by_id_include_deleted(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Asset", id })?;

    let rows = AssociationRepo::list_for_asset(&state.pool, id).await?;
    Ok(Json(DataResponse { data: rows }))
}

//! Handlers for the `/clients` resource.

use assetlink_core::error::CoreError;
use assetlink_core::registry::{validate_client_name, validate_email};
use assetlink_core::types::DbId;
use assetlink_db::models::association::AssociationRow;
use assetlink_db::models::client::{Client, CreateClient};
use assetlink_db::repositories::{AssociationRepo, ClientRepo};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ListParams;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// Only associations without an exit date.
    #[serde(default)]
    pub active_only: bool,
}

/// POST /api/v1/clients
pub async fn create_client(
    State(state): State<AppState>,
    Json(input): Json<CreateClient>,
) -> AppResult<(StatusCode, Json<DataResponse<Client>>)> {
    validate_client_name(&input.name)?;
    if let Some(email) = input.email.as_deref() {
        validate_email(email)?;
    }

    let client = ClientRepo::create(&state.pool, &input).await?;
    tracing::info!(client_id = client.id, "Client created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: client })))
}

/// GET /api/v1/clients
pub async fn list_clients(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<DataResponse<Vec<Client>>>> {
    let clients = ClientRepo::list(&state.pool, params.limit, params.offset).await?;
    Ok(Json(DataResponse { data: clients }))
}

/// GET /api/v1/clients/{id}
pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Client>>> {
    let client = ClientRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Client", id })?;
    Ok(Json(DataResponse { data: client }))
}

/// GET /api/v1/clients/{id}/associations
pub async fn list_client_associations(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<DataResponse<Vec<AssociationRow>>>> {
    ClientRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Client", id })?;

    let rows = AssociationRepo::list_for_client(&state.pool, id, params.active_only).await?;
    Ok(Json(DataResponse { data: rows }))
}

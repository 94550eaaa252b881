//! Handlers for the `/associations` resource.
//!
//! Opening and closing go through [`AssociationService`], which makes both
//! safe to retry: a repeated request answers 200 with `data: null` and a
//! status naming the state that already holds.
//!
//! [`AssociationService`]: assetlink_core::association::service::AssociationService

use assetlink_core::association::{Association, NewAssociation};
use assetlink_core::error::CoreError;
use assetlink_core::types::{Date, DbId};
use assetlink_db::models::association::AssociationRow;
use assetlink_db::repositories::AssociationRepo;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::{DataResponse, TransitionResponse};
use crate::state::AppState;

/// Body of `POST /associations/{id}/end`. The body is optional and
/// `exit_date` defaults to today (UTC).
#[derive(Debug, Default, Deserialize)]
pub struct EndAssociationRequest {
    pub exit_date: Option<Date>,
}

/// POST /api/v1/associations
pub async fn create_association(
    State(state): State<AppState>,
    Json(input): Json<NewAssociation>,
) -> AppResult<(StatusCode, Json<TransitionResponse<Association>>)> {
    let outcome = state.associations.request_association_create(input).await?;
    let body = TransitionResponse::from_outcome(outcome, "created", "already_associated");
    let status = if body.is_noop() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(body)))
}

/// POST /api/v1/associations/{id}/end
pub async fn end_association(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    input: Option<Json<EndAssociationRequest>>,
) -> AppResult<Json<TransitionResponse<Association>>> {
    let exit_date = input
        .and_then(|Json(body)| body.exit_date)
        .unwrap_or_else(|| Utc::now().date_naive());
    let outcome = state
        .associations
        .request_association_end(id, exit_date)
        .await?;
    Ok(Json(TransitionResponse::from_outcome(
        outcome,
        "ended",
        "already_ended",
    )))
}

/// GET /api/v1/associations/{id}
pub async fn get_association(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<AssociationRow>>> {
    let row = AssociationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Association",
            id,
        })?;
    Ok(Json(DataResponse { data: row }))
}

use axum::routing::get;
use axum::Router;

use crate::handlers::clients;
use crate::state::AppState;

/// Routes mounted at `/clients`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(clients::list_clients).post(clients::create_client))
        .route("/{id}", get(clients::get_client))
        .route("/{id}/associations", get(clients::list_client_associations))
}

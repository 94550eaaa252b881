use axum::routing::{get, post};
use axum::Router;

use crate::handlers::locks;
use crate::state::AppState;

/// Routes mounted at `/locks`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sweep", post(locks::sweep_expired))
        .route("/{operation_type}/{resource_id}", get(locks::get_lock))
}
